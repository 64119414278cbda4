//! Guardian rehearsal runner
//!
//! Interactive menu over the workflow drivers. Guardian must already be
//! open and logged in on this desktop.
//!
//! Usage:
//!   guardian                     # config/guardian.yaml, config/selectors.json
//!   guardian --config D:\guardian\config

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use guardian::database::{FieldLookup, Gateway, ReferenceData};
use guardian::picker::ProcessPicker;
use guardian::workflow::{run_dav, run_load, ConsoleOperator, WorkflowContext};
use guardian::{AppConfig, ConfigNote, Desktop, LoadedConfig, SelectorRegistry};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "guardian")]
#[command(about = "Guardian ERP workflow rehearsal runner")]
struct Cli {
    /// Directory holding guardian.yaml and selectors.json
    #[arg(long, default_value = "config")]
    config: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum MenuChoice {
    Dav,
    Load,
    Quit,
    Invalid(String),
}

impl MenuChoice {
    fn parse(input: &str) -> Self {
        match input.trim().to_uppercase().as_str() {
            "1" => MenuChoice::Dav,
            "2" => MenuChoice::Load,
            "Q" => MenuChoice::Quit,
            other => MenuChoice::Invalid(other.to_string()),
        }
    }
}

fn init_logging(log_dir: &Path) -> Result<()> {
    use tracing_appender::rolling;

    if let Err(e) = std::fs::create_dir_all(log_dir) {
        eprintln!("Failed to create log directory {}: {e}", log_dir.display());
    }
    let file_appender = rolling::daily(log_dir, "guardian.log");

    let filter = || EnvFilter::from_default_env().add_directive(Level::INFO.into());

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(filter()),
        )
        .with(
            fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(filter()),
        )
        .try_init()
        .context("Failed to initialize logging")?;
    Ok(())
}

fn print_menu() {
    let rule = "=".repeat(50);
    println!("\n{rule}");
    println!("{}", " GUARDIAN AUTOMATION TEST MENU".bold());
    println!("{rule}");
    println!(
        "{}",
        "IMPORTANT: Guardian must already be open and logged in.".yellow()
    );
    println!("{rule}");
    println!(" {} - Sales document (DAV) creation", "1".cyan());
    println!(" {} - Load assembly", "2".cyan());
    println!(" {} - Quit", "Q".cyan());
    println!("{}", "-".repeat(50));
}

async fn read_choice() -> Result<Option<String>> {
    tokio::task::spawn_blocking(|| -> Result<Option<String>> {
        print!("Choose the test to run: ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        let read = std::io::stdin().lock().read_line(&mut line)?;
        Ok((read > 0).then_some(line))
    })
    .await
    .context("Menu input task failed")?
}

async fn menu_loop(ctx: &WorkflowContext) -> Result<()> {
    loop {
        print_menu();
        let Some(line) = read_choice().await? else {
            info!("Standard input closed, leaving the menu");
            return Ok(());
        };

        match MenuChoice::parse(&line) {
            MenuChoice::Quit => return Ok(()),
            MenuChoice::Dav => {
                let report = run_dav(ctx).await;
                if let Err(e) = &report.result {
                    println!("{} {}", "DAV creation stopped:".red().bold(), e);
                }
            }
            MenuChoice::Load => {
                let report = run_load(ctx).await;
                if let Err(e) = &report.result {
                    println!("{} {}", "Load assembly stopped:".red().bold(), e);
                }
            }
            MenuChoice::Invalid(choice) => {
                println!("{} '{}'. Try again.", "Invalid option".red(), choice);
            }
        }
    }
}

async fn run(config: AppConfig) -> Result<()> {
    let registry =
        SelectorRegistry::load(&config.selectors_path).context("Failed to load selectors")?;

    let gateway = Arc::new(
        Gateway::connect(&config.database)
            .await
            .context("Failed to connect to the Guardian database")?
            .with_branch_columns(config.branch_columns.clone()),
    );

    let result = drive(&config, registry, gateway.clone()).await;
    gateway.close().await;
    result
}

async fn drive(
    config: &AppConfig,
    mut registry: SelectorRegistry,
    gateway: Arc<Gateway>,
) -> Result<()> {
    match gateway.app_version().await {
        FieldLookup::Found(version) => registry.set_app_version(version.to_string()),
        FieldLookup::Absent => warn!("No Guardian version recorded, using fallback selectors"),
        FieldLookup::Failed(e) => {
            warn!("Guardian version probe failed ({}), using fallback selectors", e)
        }
    }

    let desktop = Desktop::new().context("Failed to initialize UI automation")?;
    let ctx = WorkflowContext::new(
        desktop,
        Arc::new(registry),
        gateway,
        Arc::new(ProcessPicker::from_config(&config.picker)),
        Arc::new(ConsoleOperator),
        config.timings.clone(),
    );
    menu_loop(&ctx).await
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // The log directory comes from the configuration, so it is read first;
    // its notes are only logged once the subscriber is installed.
    let loaded = AppConfig::load(&cli.config);
    let log_dir = loaded
        .as_ref()
        .map(|l| l.config.logging.directory.clone())
        .unwrap_or_else(|_| {
            std::env::var("GUARDIAN_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("logs"))
        });
    if let Err(e) = init_logging(&log_dir) {
        eprintln!("{e:#}");
    }

    info!("================ STARTING TEST RUNNER ================");
    let outcome = match loaded {
        Ok(LoadedConfig { config, notes }) => {
            notes.iter().for_each(ConfigNote::log);
            run(config).await
        }
        Err(e) => Err(anyhow::Error::new(e).context(format!(
            "Failed to load configuration from {}",
            cli.config.display()
        ))),
    };
    if let Err(e) = outcome {
        error!("Critical failure: {:#}", e);
    }
    info!("================ FINISHING EXECUTION ================");
}
