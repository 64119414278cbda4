use super::schema::{ChoiceSet, PickerMode, PickerRequest, PickerResponse};
use crate::config::PickerConfig;
use crate::errors::PickerError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

/// What the human chose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Selected(Vec<String>),
    Cancelled,
}

impl Selection {
    /// The chosen code of a single-select, `None` when cancelled.
    pub fn into_single(self) -> Option<String> {
        match self {
            Selection::Selected(codes) => codes.into_iter().next(),
            Selection::Cancelled => None,
        }
    }

    /// Chosen codes of a multi-select; cancelled is the empty list.
    pub fn into_codes(self) -> Vec<String> {
        match self {
            Selection::Selected(codes) => codes,
            Selection::Cancelled => Vec::new(),
        }
    }
}

#[async_trait]
pub trait Picker: Send + Sync {
    async fn select_one(&self, choices: &ChoiceSet) -> Result<Selection, PickerError>;

    async fn select_many(&self, choices: &ChoiceSet) -> Result<Selection, PickerError>;
}

/// Deletes the request file when dropped, whatever the picker did.
struct RequestFile {
    path: PathBuf,
}

impl RequestFile {
    fn create(path: &Path, request: &PickerRequest) -> Result<Self, PickerError> {
        let guard = Self {
            path: path.to_path_buf(),
        };
        request.write(path)?;
        Ok(guard)
    }
}

impl Drop for RequestFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed picker request {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to remove picker request {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

/// Runs the picker executable as `<program> <mode> --request <path>`.
#[derive(Debug, Clone)]
pub struct ProcessPicker {
    program: PathBuf,
    request_path: PathBuf,
}

impl ProcessPicker {
    pub fn new(program: impl Into<PathBuf>, request_path: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            request_path: request_path.into(),
        }
    }

    /// Bare program names resolve next to the running executable when a
    /// binary of that name is installed there, otherwise through `PATH`.
    pub fn from_config(config: &PickerConfig) -> Self {
        let program = if config.program.components().count() == 1 {
            std::env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(Path::to_path_buf))
                .map(|dir| {
                    let mut name = config.program.clone().into_os_string();
                    name.push(std::env::consts::EXE_SUFFIX);
                    dir.join(name)
                })
                .filter(|candidate| candidate.is_file())
                .unwrap_or_else(|| config.program.clone())
        } else {
            config.program.clone()
        };
        Self::new(program, config.request_path.clone())
    }

    async fn run(&self, mode: PickerMode, choices: &ChoiceSet) -> Result<Selection, PickerError> {
        if choices.is_empty() {
            warn!("No items found for selection: {}", choices.title);
            return Ok(Selection::Cancelled);
        }

        let request = PickerRequest::new(mode, choices);
        let _request_file = RequestFile::create(&self.request_path, &request)?;

        info!(
            "Opening {} picker '{}' with {} items",
            mode,
            choices.title,
            choices.len()
        );
        let output = Command::new(&self.program)
            .arg(mode.to_string())
            .arg("--request")
            .arg(&self.request_path)
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .output()
            .await
            .map_err(|source| PickerError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            error!(
                "Picker '{}' exited with {:?}",
                choices.title,
                output.status.code()
            );
            return Err(PickerError::Exit {
                code: output.status.code(),
                message: stdout.trim().to_string(),
            });
        }

        match PickerResponse::parse(&stdout)? {
            PickerResponse::Selected { codes } if codes.is_empty() => {
                warn!("No item was selected in '{}'", choices.title);
                Ok(Selection::Cancelled)
            }
            PickerResponse::Selected { codes } => {
                if mode == PickerMode::Single && codes.len() > 1 {
                    return Err(PickerError::MalformedResponse(format!(
                        "single-select picker returned {} codes",
                        codes.len()
                    )));
                }
                info!("User selected {} item(s): {:?}", codes.len(), codes);
                Ok(Selection::Selected(codes))
            }
            PickerResponse::Cancelled => {
                warn!("Picker '{}' was closed without a selection", choices.title);
                Ok(Selection::Cancelled)
            }
            PickerResponse::Error { message } => Err(PickerError::Reported(message)),
        }
    }
}

#[async_trait]
impl Picker for ProcessPicker {
    async fn select_one(&self, choices: &ChoiceSet) -> Result<Selection, PickerError> {
        self.run(PickerMode::Single, choices).await
    }

    async fn select_many(&self, choices: &ChoiceSet) -> Result<Selection, PickerError> {
        self.run(PickerMode::Multi, choices).await
    }
}
