use crate::errors::AutomationError;
use crate::keys::KeySequence;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Attributes a selector is matched against.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UIElementAttributes {
    /// Window title or control name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub automation_id: Option<String>,
    #[serde(default)]
    pub is_visible: bool,
}

/// Interface for platform-specific element implementations
pub trait UIElementImpl: Send + Sync + Debug {
    fn attributes(&self) -> UIElementAttributes;

    fn is_visible(&self) -> Result<bool, AutomationError>;

    /// Bring the element's window to the foreground and give it keyboard focus.
    fn focus(&self) -> Result<(), AutomationError>;

    /// Send a keystroke sequence to the element.
    fn send_keys(&self, keys: &KeySequence) -> Result<(), AutomationError>;

    /// Activate the element through its default action (buttons).
    fn invoke(&self) -> Result<(), AutomationError>;

    /// Enable downcasting to concrete element types
    fn as_any(&self) -> &dyn std::any::Any;
}

/// Represents a window or control of the target application
#[derive(Debug, Clone)]
pub struct UIElement {
    inner: Arc<dyn UIElementImpl>,
}

impl UIElement {
    pub fn new(impl_: Arc<dyn UIElementImpl>) -> Self {
        Self { inner: impl_ }
    }

    pub fn attributes(&self) -> UIElementAttributes {
        self.inner.attributes()
    }

    pub fn name(&self) -> Option<String> {
        self.inner.attributes().name
    }

    pub fn name_or_empty(&self) -> String {
        self.name().unwrap_or_default()
    }

    pub fn class_name(&self) -> Option<String> {
        self.inner.attributes().class_name
    }

    pub fn control_type(&self) -> Option<String> {
        self.inner.attributes().control_type
    }

    pub fn is_visible(&self) -> Result<bool, AutomationError> {
        self.inner.is_visible()
    }

    #[instrument(level = "debug", skip(self))]
    pub fn focus(&self) -> Result<(), AutomationError> {
        self.inner.focus()
    }

    #[instrument(level = "debug", skip(self, keys), fields(keys = %keys))]
    pub fn send_keys(&self, keys: &KeySequence) -> Result<(), AutomationError> {
        if keys.is_empty() {
            debug!("Skipping empty key sequence");
            return Ok(());
        }
        self.inner.send_keys(keys)
    }

    /// Type literal text (codes, quantities) without macro interpretation.
    pub fn type_text(&self, text: &str) -> Result<(), AutomationError> {
        self.send_keys(&KeySequence::text(text))
    }

    #[instrument(level = "debug", skip(self))]
    pub fn invoke(&self) -> Result<(), AutomationError> {
        self.inner.invoke()
    }

    pub fn as_any(&self) -> &dyn std::any::Any {
        self.inner.as_any()
    }
}
