//! Windows element implementations: UI Automation nodes and native windows.

use super::types::ThreadSafeWinUIElement;
use super::utils::{hwnd_from, window_attributes};
use crate::element::UIElementImpl;
use crate::{AutomationError, KeySequence, UIElementAttributes};
use std::fmt;
use tracing::debug;
use uiautomation::inputs::Keyboard;
use uiautomation::patterns;
use windows::Win32::Foundation::HWND;
use windows::Win32::UI::WindowsAndMessaging::{
    BringWindowToTop, IsIconic, IsWindow, SetForegroundWindow, ShowWindow, SW_RESTORE,
};

fn activate_hwnd(hwnd: HWND) -> Result<(), AutomationError> {
    unsafe {
        if !IsWindow(Some(hwnd)).as_bool() {
            return Err(AutomationError::ElementNotFound(
                "Window handle is no longer valid".to_string(),
            ));
        }

        // Check if the window is minimized and restore it if needed
        if IsIconic(hwnd).as_bool() {
            debug!("Window is minimized, restoring it");
            let _ = ShowWindow(hwnd, SW_RESTORE);
        }

        // Bring the window to the top of the Z order
        let _ = BringWindowToTop(hwnd);

        if !SetForegroundWindow(hwnd).as_bool() {
            debug!("SetForegroundWindow failed, but continuing");
        }
    }
    Ok(())
}

pub(crate) fn uia_attributes(element: &uiautomation::UIElement) -> UIElementAttributes {
    UIElementAttributes {
        name: element.get_name().ok(),
        class_name: element.get_classname().ok(),
        control_type: element.get_control_type().ok().map(|ct| ct.to_string()),
        automation_id: element
            .get_automation_id()
            .ok()
            .filter(|id| !id.is_empty()),
        is_visible: element.is_offscreen().map(|off| !off).unwrap_or(false),
    }
}

/// Element backed by the UI Automation tree.
pub struct WindowsUIElement {
    pub(crate) element: ThreadSafeWinUIElement,
}

impl fmt::Debug for WindowsUIElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowsUIElement")
            .field("name", &self.element.0.get_name().unwrap_or_default())
            .finish()
    }
}

impl UIElementImpl for WindowsUIElement {
    fn attributes(&self) -> UIElementAttributes {
        uia_attributes(&self.element.0)
    }

    fn is_visible(&self) -> Result<bool, AutomationError> {
        let offscreen = self.element.0.is_offscreen()?;
        Ok(!offscreen)
    }

    fn focus(&self) -> Result<(), AutomationError> {
        if let Ok(handle) = self.element.0.get_native_window_handle() {
            let hwnd: HWND = handle.into();
            if !hwnd.is_invalid() {
                activate_hwnd(hwnd)?;
            }
        }
        self.element
            .0
            .set_focus()
            .map_err(|e| AutomationError::PlatformError(e.to_string()))
    }

    fn send_keys(&self, keys: &KeySequence) -> Result<(), AutomationError> {
        let syntax = keys.to_uia_syntax();
        debug!("sending keys {:?} to {:?}", syntax, self);
        self.element
            .0
            .send_keys(&syntax, 10)
            .map_err(|e| AutomationError::PlatformError(format!("Failed to send keys: {e:?}")))
    }

    fn invoke(&self) -> Result<(), AutomationError> {
        let invoke_pat = self
            .element
            .0
            .get_pattern::<patterns::UIInvokePattern>()
            .map_err(|e| {
                AutomationError::UnsupportedOperation(format!(
                    "Element does not support InvokePattern: {e}"
                ))
            })?;
        invoke_pat
            .invoke()
            .map_err(|e| AutomationError::PlatformError(e.to_string()))
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// Element backed by a native window handle from the Win32 window list.
#[derive(Debug, Clone, Copy)]
pub struct Win32Window {
    pub(crate) hwnd: isize,
}

impl UIElementImpl for Win32Window {
    fn attributes(&self) -> UIElementAttributes {
        window_attributes(self.hwnd)
    }

    fn is_visible(&self) -> Result<bool, AutomationError> {
        Ok(window_attributes(self.hwnd).is_visible)
    }

    fn focus(&self) -> Result<(), AutomationError> {
        activate_hwnd(hwnd_from(self.hwnd))
    }

    fn send_keys(&self, keys: &KeySequence) -> Result<(), AutomationError> {
        // Synthesized input goes to the foreground window.
        self.focus()?;
        let syntax = keys.to_uia_syntax();
        debug!("sending keys {:?} to hwnd {:#x}", syntax, self.hwnd);
        Keyboard::new()
            .send_keys(&syntax)
            .map_err(|e| AutomationError::PlatformError(format!("Failed to send keys: {e:?}")))
    }

    fn invoke(&self) -> Result<(), AutomationError> {
        Err(AutomationError::UnsupportedOperation(
            "Native window handles cannot be invoked; locate the control through the uia backend"
                .to_string(),
        ))
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
