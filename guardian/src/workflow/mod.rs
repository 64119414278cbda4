//! Workflow drivers
//!
//! Each driver is an explicit state machine. Phase one gathers every
//! selection from the database and the human before the live application is
//! touched; phase two replays keystrokes against Guardian, probing for the
//! configuration-dependent dialogs along the way.

use crate::config::Timings;
use crate::database::{QueryOutcome, ReferenceData, Table};
use crate::errors::WorkflowError;
use crate::keys::KeySequence;
use crate::picker::{ChoiceSet, Picker};
use crate::prober::DialogProber;
use crate::registry::{SelectorRegistry, UiTarget};
use crate::{Backend, Desktop, UIElement};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

pub mod dav;
pub mod load;
pub mod operator;
pub mod quantity;

pub use dav::{run_dav, run_dav_with_rng, DavState, IssueDatePrompt, ItemPricing, SalesRepMode};
pub use load::{order_keystrokes, run_load, run_load_for, LoadState};
pub use operator::{ConsoleOperator, OperatorInput};
pub use quantity::{sample_quantity, SampledQuantity};

/// Everything a driver needs: the desktop, the selectors, the data source,
/// the picker and the operator.
#[derive(Clone)]
pub struct WorkflowContext {
    pub desktop: Desktop,
    pub registry: Arc<SelectorRegistry>,
    pub prober: DialogProber,
    pub data: Arc<dyn ReferenceData>,
    pub picker: Arc<dyn Picker>,
    pub operator: Arc<dyn OperatorInput>,
    pub timings: Timings,
}

impl WorkflowContext {
    pub fn new(
        desktop: Desktop,
        registry: Arc<SelectorRegistry>,
        data: Arc<dyn ReferenceData>,
        picker: Arc<dyn Picker>,
        operator: Arc<dyn OperatorInput>,
        timings: Timings,
    ) -> Self {
        let prober = DialogProber::new(desktop.clone(), registry.clone(), timings.clone());
        Self {
            desktop,
            registry,
            prober,
            data,
            picker,
            operator,
            timings,
        }
    }

    /// Waits for a required window; not finding it ends the workflow.
    pub(crate) async fn find_window(
        &self,
        target: UiTarget,
        parent: Option<&UIElement>,
        timeout: Duration,
    ) -> Result<UIElement, WorkflowError> {
        let selector = self.registry.resolve(target)?.clone();
        let mut locator = self
            .desktop
            .locator(selector)
            .with_backend(Backend::Win32);
        if let Some(parent) = parent {
            locator = locator.within(parent.clone());
        }
        Ok(locator.wait(Some(timeout)).await?)
    }

    /// Shows a single-select picker; cancelling ends the workflow.
    pub(crate) async fn pick_one(
        &self,
        choices: &ChoiceSet,
        what: &str,
    ) -> Result<String, WorkflowError> {
        let code = self
            .picker
            .select_one(choices)
            .await?
            .into_single()
            .ok_or_else(|| WorkflowError::Cancelled(what.to_string()))?;
        info!("User selected {} code: {}", what, code);
        Ok(code)
    }

    /// Shows a multi-select picker; an empty selection ends the workflow.
    pub(crate) async fn pick_many(
        &self,
        choices: &ChoiceSet,
        what: &str,
    ) -> Result<Vec<String>, WorkflowError> {
        let codes = self.picker.select_many(choices).await?.into_codes();
        if codes.is_empty() {
            return Err(WorkflowError::Cancelled(what.to_string()));
        }
        Ok(codes)
    }
}

/// States visited by a driver run, and how it ended.
#[derive(Debug)]
pub struct WorkflowReport<S> {
    pub visited: Vec<S>,
    pub result: Result<(), WorkflowError>,
}

impl<S: PartialEq> WorkflowReport<S> {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn visited(&self, state: &S) -> bool {
        self.visited.contains(state)
    }
}

/// Drives `step` from `start` until `done`, recording every state entered.
///
/// The first error stops the machine; it is logged once here together with
/// the state it happened in.
pub(crate) async fn run_machine<S, F>(
    workflow: &str,
    start: S,
    done: S,
    mut step: F,
) -> WorkflowReport<S>
where
    S: Clone + PartialEq + fmt::Debug + Send + Sync,
    F: AsyncStep<S>,
{
    let mut visited = vec![start.clone()];
    let mut state = start;
    while state != done {
        match step.step(&state).await {
            Ok(next) => {
                visited.push(next.clone());
                state = next;
            }
            Err(e) => {
                error!(
                    "An error occurred during the {} workflow in state {:?}: {}",
                    workflow, state, e
                );
                return WorkflowReport {
                    visited,
                    result: Err(e),
                };
            }
        }
    }
    WorkflowReport {
        visited,
        result: Ok(()),
    }
}

/// One transition of a driver's state machine.
#[async_trait::async_trait]
pub(crate) trait AsyncStep<S: Send + Sync>: Send {
    async fn step(&mut self, state: &S) -> Result<S, WorkflowError>;
}

/// Table rows as `code - label` choices.
pub(crate) fn choices_from(
    title: &str,
    table: &Table,
    code_col: &str,
    label_col: &str,
) -> ChoiceSet {
    let mut set = ChoiceSet::new(title);
    for row in table.rows() {
        let Some(code) = row.text(code_col) else {
            warn!("Skipping row without '{}' in {}", code_col, title);
            continue;
        };
        let label = row.text(label_col).unwrap_or_default();
        let display = format!("{code} - {label}");
        set.push(code, display, Vec::new());
    }
    set
}

/// Rows of a required query; a failed query ends the workflow.
pub(crate) fn rows_or_fail(outcome: QueryOutcome) -> Result<Table, WorkflowError> {
    Ok(outcome.into_result()?)
}

pub(crate) async fn settle(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

pub(crate) fn send(element: &UIElement, spec: &str) -> Result<(), WorkflowError> {
    Ok(element.send_keys(&KeySequence::parse(spec)?)?)
}

pub(crate) fn send_text(element: &UIElement, text: &str) -> Result<(), WorkflowError> {
    Ok(element.type_text(text)?)
}
