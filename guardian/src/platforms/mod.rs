use crate::{AutomationError, Selector, UIElement};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Which view of the window tree a search runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Backend {
    /// Native window list (title and class only). Cheap, no tree walk.
    #[default]
    Win32,
    /// Full UI Automation tree: control types, named buttons, invoke.
    Uia,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Win32 => f.write_str("win32"),
            Backend::Uia => f.write_str("uia"),
        }
    }
}

/// The common trait that all platform-specific engines must implement
pub trait AccessibilityEngine: Send + Sync {
    /// Find the first visible element matching `selector`, polling until `timeout`.
    ///
    /// With `root` the search is scoped to that element's descendants,
    /// otherwise it covers the top-level windows of the desktop.
    fn find_element(
        &self,
        selector: &Selector,
        root: Option<&UIElement>,
        timeout: Duration,
        backend: Backend,
    ) -> Result<UIElement, AutomationError>;

    /// Enable downcasting to concrete engine types
    fn as_any(&self) -> &dyn std::any::Any;
}

#[cfg(target_os = "windows")]
pub mod windows;

/// Create the appropriate engine for the current platform
pub fn create_engine() -> Result<Arc<dyn AccessibilityEngine>, AutomationError> {
    #[cfg(target_os = "windows")]
    {
        Ok(Arc::new(windows::WindowsEngine::new()?))
    }
    #[cfg(not(target_os = "windows"))]
    {
        Err(AutomationError::UnsupportedPlatform(
            "Guardian only runs on Windows; no accessibility engine for this platform".to_string(),
        ))
    }
}
