use tracing::{debug, instrument};

use crate::element::UIElement;
use crate::errors::AutomationError;
use crate::platforms::{AccessibilityEngine, Backend};
use crate::selector::Selector;
use std::sync::Arc;
use std::time::Duration;
use tokio::task;

// Used when `wait` is given no timeout
const DEFAULT_LOCATOR_TIMEOUT: Duration = Duration::from_secs(5);

/// A handle for finding one window or control, optionally scoped under a parent.
#[derive(Clone)]
pub struct Locator {
    engine: Arc<dyn AccessibilityEngine>,
    selector: Selector,
    root: Option<UIElement>,
    backend: Backend,
}

impl Locator {
    /// Create a new locator with the given selector
    pub(crate) fn new(engine: Arc<dyn AccessibilityEngine>, selector: Selector) -> Self {
        Self {
            engine,
            selector,
            root: None,
            backend: Backend::default(),
        }
    }

    /// Set the root element for this locator
    pub fn within(mut self, element: UIElement) -> Self {
        self.root = Some(element);
        self
    }

    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    /// Wait for a visible element matching the locator, up to the specified timeout.
    /// If no timeout is provided, waits five seconds.
    #[instrument(
        level = "debug",
        skip(self, timeout),
        fields(selector = %self.selector, backend = %self.backend)
    )]
    pub async fn wait(&self, timeout: Option<Duration>) -> Result<UIElement, AutomationError> {
        let effective_timeout = timeout.unwrap_or(DEFAULT_LOCATOR_TIMEOUT);
        debug!(
            "Waiting up to {:?} for element matching selector: {}",
            effective_timeout, self.selector
        );

        // The engine's find_element polls and blocks, so it runs on a
        // blocking-safe thread instead of stalling the async runtime.
        let engine = self.engine.clone();
        let selector = self.selector.clone();
        let root = self.root.clone();
        let backend = self.backend;

        task::spawn_blocking(move || {
            engine.find_element(&selector, root.as_ref(), effective_timeout, backend)
        })
        .await
        .map_err(|e| AutomationError::Internal(format!("Task join error: {e}")))?
        .map_err(|e| {
            // The engine reports a timeout as ElementNotFound; surface it as Timeout.
            if let AutomationError::ElementNotFound(inner_msg) = e {
                AutomationError::Timeout(format!(
                    "Timed out after {effective_timeout:?} waiting for element '{}'. Original error: {inner_msg}",
                    self.selector
                ))
            } else {
                e
            }
        })
    }
}
