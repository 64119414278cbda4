//! Versioned request/response contract shared by the driver and the picker process.

use crate::errors::PickerError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PickerMode {
    Single,
    Multi,
}

impl fmt::Display for PickerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PickerMode::Single => f.write_str("single"),
            PickerMode::Multi => f.write_str("multi"),
        }
    }
}

impl FromStr for PickerMode {
    type Err = PickerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(PickerMode::Single),
            "multi" => Ok(PickerMode::Multi),
            other => Err(PickerError::MalformedResponse(format!(
                "unknown picker mode '{other}'"
            ))),
        }
    }
}

/// One selectable row: the code handed back to the driver, the label shown
/// in single-select lists and the cells shown in multi-select tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub code: String,
    pub display: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<String>,
}

/// Ordered choices for one picker invocation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChoiceSet {
    pub title: String,
    /// Column headers for multi-select tables; the first names the checkbox column.
    pub headers: Vec<String>,
    pub items: Vec<Choice>,
}

impl ChoiceSet {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.headers = headers.into_iter().map(Into::into).collect();
        self
    }

    pub fn push(
        &mut self,
        code: impl Into<String>,
        display: impl Into<String>,
        columns: Vec<String>,
    ) {
        self.items.push(Choice {
            code: code.into(),
            display: display.into(),
            columns,
        });
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickerRequest {
    pub schema_version: u32,
    pub mode: PickerMode,
    pub title: String,
    #[serde(default)]
    pub headers: Vec<String>,
    pub items: Vec<Choice>,
}

impl PickerRequest {
    pub fn new(mode: PickerMode, choices: &ChoiceSet) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            mode,
            title: choices.title.clone(),
            headers: choices.headers.clone(),
            items: choices.items.clone(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, PickerError> {
        let request: PickerRequest = serde_json::from_str(json)
            .map_err(|e| PickerError::MalformedResponse(format!("invalid request: {e}")))?;
        if request.schema_version != SCHEMA_VERSION {
            return Err(PickerError::SchemaVersion {
                found: request.schema_version,
                expected: SCHEMA_VERSION,
            });
        }
        Ok(request)
    }

    pub fn read(path: &Path) -> Result<Self, PickerError> {
        let content =
            std::fs::read_to_string(path).map_err(|source| PickerError::RequestFile {
                path: path.display().to_string(),
                source,
            })?;
        Self::from_json_str(&content)
    }

    pub fn write(&self, path: &Path) -> Result<(), PickerError> {
        let json = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, json).map_err(|source| PickerError::RequestFile {
            path: path.display().to_string(),
            source,
        })
    }

    /// Response selecting the rows at `indices` (zero based, in display order).
    pub fn respond(&self, indices: &[usize]) -> PickerResponse {
        let codes = indices
            .iter()
            .filter_map(|&idx| self.items.get(idx))
            .map(|item| item.code.clone())
            .collect();
        PickerResponse::Selected { codes }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PickerResponse {
    Selected { codes: Vec<String> },
    Cancelled,
    Error { message: String },
}

impl PickerResponse {
    /// Parses the picker's standard output; the response is its last non-empty line.
    pub fn parse(stdout: &str) -> Result<Self, PickerError> {
        let line = stdout
            .lines()
            .map(str::trim)
            .rev()
            .find(|l| !l.is_empty())
            .ok_or_else(|| PickerError::MalformedResponse("picker wrote nothing".to_string()))?;
        serde_json::from_str(line)
            .map_err(|e| PickerError::MalformedResponse(format!("{e}: {line}")))
    }

    pub fn to_json(&self) -> Result<String, PickerError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Interprets a single-select answer: empty keeps the first row, `q` cancels.
pub fn parse_single_choice(input: &str, len: usize) -> Result<Option<usize>, String> {
    let input = input.trim();
    if input.eq_ignore_ascii_case("q") {
        return Ok(None);
    }
    if input.is_empty() {
        return if len > 0 {
            Ok(Some(0))
        } else {
            Err("nothing to select".to_string())
        };
    }
    let number: usize = input
        .parse()
        .map_err(|_| format!("'{input}' is not a row number"))?;
    if (1..=len).contains(&number) {
        Ok(Some(number - 1))
    } else {
        Err(format!("row {number} is out of range 1-{len}"))
    }
}

/// Interprets a multi-select answer such as `1,3,5-7` or `*`; `q` cancels.
/// Rows come back zero based, deduplicated and in display order.
pub fn parse_multi_selection(input: &str, len: usize) -> Result<Option<Vec<usize>>, String> {
    let input = input.trim();
    if input.eq_ignore_ascii_case("q") {
        return Ok(None);
    }
    if input == "*" {
        return Ok(Some((0..len).collect()));
    }

    let mut selected = vec![false; len];
    for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (start, end) = match part.split_once('-') {
            Some((a, b)) => (parse_row(a, len)?, parse_row(b, len)?),
            None => {
                let row = parse_row(part, len)?;
                (row, row)
            }
        };
        if start > end {
            return Err(format!("range '{part}' is reversed"));
        }
        for flag in &mut selected[start - 1..end] {
            *flag = true;
        }
    }
    Ok(Some(
        selected
            .iter()
            .enumerate()
            .filter_map(|(idx, on)| on.then_some(idx))
            .collect(),
    ))
}

fn parse_row(s: &str, len: usize) -> Result<usize, String> {
    let s = s.trim();
    let row: usize = s.parse().map_err(|_| format!("'{s}' is not a row number"))?;
    if (1..=len).contains(&row) {
        Ok(row)
    } else {
        Err(format!("row {row} is out of range 1-{len}"))
    }
}
