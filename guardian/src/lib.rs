//! Scripted rehearsal of Guardian ERP sales workflows.
//!
//! The crate drives an already running Guardian client through the Windows
//! accessibility tree. Reference data comes from the ERP database, human
//! choices from an out-of-process picker, and every configuration-dependent
//! dialog is handled by the [`prober::DialogProber`].

use std::sync::Arc;
use tracing::instrument;

pub mod config;
pub mod database;
pub mod element;
pub mod errors;
pub mod keys;
pub mod locator;
pub mod picker;
pub mod platforms;
pub mod prober;
pub mod registry;
pub mod selector;
#[cfg(test)]
mod tests;
pub mod workflow;

pub use config::{AppConfig, ConfigNote, LoadedConfig, Timings};
pub use element::{UIElement, UIElementAttributes};
pub use errors::{AutomationError, ConfigError, GatewayError, PickerError, WorkflowError};
pub use keys::KeySequence;
pub use locator::Locator;
pub use platforms::{AccessibilityEngine, Backend};
pub use registry::{SelectorRegistry, UiTarget};
pub use selector::Selector;

/// The main entry point for UI automation
#[derive(Clone)]
pub struct Desktop {
    engine: Arc<dyn AccessibilityEngine>,
}

impl Desktop {
    #[instrument]
    pub fn new() -> Result<Self, AutomationError> {
        let engine = platforms::create_engine()?;
        Ok(Self { engine })
    }

    /// Builds a desktop over an existing engine.
    pub fn with_engine(engine: Arc<dyn AccessibilityEngine>) -> Self {
        Self { engine }
    }

    #[instrument(level = "debug", skip(self, selector))]
    pub fn locator(&self, selector: impl Into<Selector>) -> Locator {
        Locator::new(self.engine.clone(), selector.into())
    }
}
