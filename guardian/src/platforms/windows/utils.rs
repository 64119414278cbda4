//! Utility functions for Windows platform

use crate::{AutomationError, UIElementAttributes};
use uiautomation::UIAutomation;
use windows::core::{BOOL, HRESULT};
use windows::Win32::Foundation::{HWND, LPARAM};
use windows::Win32::System::Com::{CoInitializeEx, COINIT_MULTITHREADED};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumChildWindows, EnumWindows, GetClassNameW, GetWindowTextW, IsWindowVisible,
};

/// Helper function to create UIAutomation instance with proper COM initialization
pub(crate) fn create_ui_automation_with_com_init() -> Result<UIAutomation, AutomationError> {
    unsafe {
        let hr = CoInitializeEx(None, COINIT_MULTITHREADED);
        if hr.is_err() && hr != HRESULT(0x80010106u32 as i32) {
            // Only return error if it's not the "already initialized" case
            return Err(AutomationError::PlatformError(format!(
                "Failed to initialize COM: {hr}"
            )));
        }
    }

    UIAutomation::new_direct().map_err(|e| AutomationError::PlatformError(e.to_string()))
}

pub(crate) fn hwnd_from(raw: isize) -> HWND {
    HWND(raw as *mut std::ffi::c_void)
}

unsafe extern "system" fn collect_hwnd(hwnd: HWND, lparam: LPARAM) -> BOOL {
    let handles = &mut *(lparam.0 as *mut Vec<isize>);
    handles.push(hwnd.0 as isize);
    BOOL::from(true) // Continue enumeration
}

/// Handles of all top-level windows, in z-order.
pub(crate) fn top_level_windows() -> Vec<isize> {
    let mut handles: Vec<isize> = Vec::new();
    unsafe {
        let _ = EnumWindows(
            Some(collect_hwnd),
            LPARAM(&mut handles as *mut Vec<isize> as isize),
        );
    }
    handles
}

/// Handles of every descendant window of `parent`.
pub(crate) fn child_windows(parent: isize) -> Vec<isize> {
    let mut handles: Vec<isize> = Vec::new();
    unsafe {
        let _ = EnumChildWindows(
            Some(hwnd_from(parent)),
            Some(collect_hwnd),
            LPARAM(&mut handles as *mut Vec<isize> as isize),
        );
    }
    handles
}

pub(crate) fn window_attributes(raw: isize) -> UIElementAttributes {
    let hwnd = hwnd_from(raw);
    let mut title = [0u16; 512];
    let mut class_name = [0u16; 256];
    unsafe {
        let title_len = GetWindowTextW(hwnd, &mut title).max(0) as usize;
        let class_len = GetClassNameW(hwnd, &mut class_name).max(0) as usize;
        UIElementAttributes {
            name: Some(String::from_utf16_lossy(&title[..title_len])),
            class_name: Some(String::from_utf16_lossy(&class_name[..class_len])),
            control_type: None,
            automation_id: None,
            is_visible: IsWindowVisible(hwnd).as_bool(),
        }
    }
}
