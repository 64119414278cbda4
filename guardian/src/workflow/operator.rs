use crate::errors::WorkflowError;
use async_trait::async_trait;
use std::io::{BufRead, Write};
use tokio::task;
use tracing::info;

/// A human at the Guardian screen, for decisions the script cannot make.
#[async_trait]
pub trait OperatorInput: Send + Sync {
    /// Shows `prompt` and returns once the operator signals they are done.
    async fn await_operator(&self, prompt: &str) -> Result<(), WorkflowError>;
}

/// Operator answering on the terminal that launched the runner.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleOperator;

#[async_trait]
impl OperatorInput for ConsoleOperator {
    async fn await_operator(&self, prompt: &str) -> Result<(), WorkflowError> {
        info!("Waiting for operator: {}", prompt);
        let prompt = prompt.to_string();
        task::spawn_blocking(move || {
            let mut stdout = std::io::stdout();
            write!(stdout, "{prompt} ")
                .and_then(|_| stdout.flush())
                .map_err(|e| WorkflowError::OperatorInput(e.to_string()))?;

            let mut line = String::new();
            let read = std::io::stdin()
                .lock()
                .read_line(&mut line)
                .map_err(|e| WorkflowError::OperatorInput(e.to_string()))?;
            if read == 0 {
                return Err(WorkflowError::OperatorInput(
                    "standard input closed while waiting for the operator".to_string(),
                ));
            }
            Ok(())
        })
        .await
        .map_err(|e| WorkflowError::OperatorInput(format!("Task join error: {e}")))??;
        info!("Operator resumed the workflow");
        Ok(())
    }
}
