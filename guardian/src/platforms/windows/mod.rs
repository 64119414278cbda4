//! Windows platform implementation for UI automation
//!
//! Two views of the same desktop: the native window list (cheap title/class
//! lookups through `EnumWindows`) and the UI Automation tree through the
//! uiautomation crate.

pub mod element;
pub mod engine;
pub mod types;
pub mod utils;

pub use element::{Win32Window, WindowsUIElement};
pub use engine::WindowsEngine;
