//! Console picker
//!
//! Serves the selection requests written by the runner: reads the request
//! file, shows the rows on stderr, reads the answer on stdin and prints one
//! JSON response line on stdout.
//!
//!   guardian-picker single --request temp_gui_data.json
//!   guardian-picker multi --request temp_gui_data.json

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use guardian::picker::schema::{parse_multi_selection, parse_single_choice};
use guardian::picker::{PickerMode, PickerRequest, PickerResponse};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "guardian-picker")]
#[command(about = "Console picker for Guardian workflow selections")]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Choose exactly one row
    Single(PickArgs),
    /// Choose any number of rows
    Multi(PickArgs),
}

#[derive(Args, Debug)]
struct PickArgs {
    /// Request file written by the runner
    #[arg(long)]
    request: PathBuf,
}

fn render_single(request: &PickerRequest) {
    eprintln!("\n{}", request.title.bold());
    for (idx, item) in request.items.iter().enumerate() {
        eprintln!(" {:>3}  {}", (idx + 1).to_string().cyan(), item.display);
    }
}

fn render_table(request: &PickerRequest) {
    // The first header names the checkbox column, which the row number replaces.
    let headers: Vec<&str> = request.headers.iter().skip(1).map(String::as_str).collect();
    let rows: Vec<Vec<&str>> = request
        .items
        .iter()
        .map(|item| {
            if item.columns.is_empty() {
                vec![item.display.as_str()]
            } else {
                item.columns.iter().map(String::as_str).collect()
            }
        })
        .collect();

    let columns = rows.iter().map(Vec::len).max().unwrap_or(0).max(headers.len());
    let mut widths = vec![0; columns];
    for line in rows.iter().chain(std::iter::once(&headers)) {
        for (col, cell) in line.iter().enumerate() {
            widths[col] = widths[col].max(cell.chars().count());
        }
    }
    let format_line = |cells: &[&str]| {
        cells
            .iter()
            .enumerate()
            .map(|(col, cell)| format!("{cell:<width$}", width = widths[col]))
            .collect::<Vec<_>>()
            .join("  ")
    };

    eprintln!("\n{}", request.title.bold());
    if !headers.is_empty() {
        eprintln!("{}  {}", "   #".dimmed(), format_line(&headers).underline());
    }
    for (idx, row) in rows.iter().enumerate() {
        eprintln!(" {:>3}  {}", (idx + 1).to_string().cyan(), format_line(row));
    }
}

fn prompt(text: &str) -> Result<Option<String>> {
    eprint!("{text}");
    std::io::stderr().flush()?;
    let mut line = String::new();
    let read = std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read the selection")?;
    Ok((read > 0).then_some(line))
}

/// Asks until the answer parses; end of input counts as cancelling.
fn ask<T>(
    text: &str,
    parse: impl Fn(&str) -> std::result::Result<Option<T>, String>,
) -> Result<Option<T>> {
    loop {
        let Some(line) = prompt(text)? else {
            return Ok(None);
        };
        match parse(&line) {
            Ok(answer) => return Ok(answer),
            Err(message) => eprintln!("{}", message.red()),
        }
    }
}

fn select(mode: PickerMode, request: &PickerRequest) -> Result<PickerResponse> {
    if request.mode != mode {
        eprintln!(
            "{}",
            format!(
                "Request was written for a {} picker, answering as {}",
                request.mode, mode
            )
            .yellow()
        );
    }
    let len = request.items.len();
    let response = match mode {
        PickerMode::Single => {
            render_single(request);
            ask("Row number [Enter = 1, q = cancel]: ", |input| {
                parse_single_choice(input, len)
            })?
            .map(|row| request.respond(&[row]))
        }
        PickerMode::Multi => {
            render_table(request);
            ask("Rows (e.g. 1,3,5-7 or *) [q = cancel]: ", |input| {
                parse_multi_selection(input, len)
            })?
            .map(|rows| request.respond(&rows))
        }
    };
    Ok(response.unwrap_or(PickerResponse::Cancelled))
}

fn emit(response: &PickerResponse) -> Result<()> {
    let line = response.to_json()?;
    let mut stdout = std::io::stdout();
    writeln!(stdout, "{line}")?;
    stdout.flush()?;
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let (mode, args) = match cli.mode {
        Mode::Single(args) => (PickerMode::Single, args),
        Mode::Multi(args) => (PickerMode::Multi, args),
    };

    let request = match PickerRequest::read(&args.request) {
        Ok(request) => request,
        Err(e) => {
            eprintln!("{} {}", "Could not load selection data:".red().bold(), e);
            let _ = emit(&PickerResponse::Error {
                message: e.to_string(),
            });
            return ExitCode::FAILURE;
        }
    };

    let outcome = select(mode, &request).and_then(|response| emit(&response));
    if let Err(e) = outcome {
        eprintln!("{} {:#}", "Selection failed:".red().bold(), e);
        let _ = emit(&PickerResponse::Error {
            message: format!("{e:#}"),
        });
    }
    ExitCode::SUCCESS
}
