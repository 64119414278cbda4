#![allow(clippy::arc_with_non_send_sync)]

use super::element::{uia_attributes, Win32Window, WindowsUIElement};
use super::types::{ThreadSafeWinUIAutomation, ThreadSafeWinUIElement};
use super::utils::{
    child_windows, create_ui_automation_with_com_init, hwnd_from, top_level_windows,
    window_attributes,
};
use crate::platforms::{AccessibilityEngine, Backend};
use crate::{AutomationError, Selector, UIElement};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, trace};
use uiautomation::types::Handle;

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const UIA_SEARCH_DEPTH: u32 = 30;

pub struct WindowsEngine {
    automation: ThreadSafeWinUIAutomation,
}

impl WindowsEngine {
    pub fn new() -> Result<Self, AutomationError> {
        let automation = create_ui_automation_with_com_init()?;
        Ok(Self {
            automation: ThreadSafeWinUIAutomation(Arc::new(automation)),
        })
    }

    fn wrap_uia(element: uiautomation::UIElement) -> UIElement {
        UIElement::new(Arc::new(WindowsUIElement {
            element: ThreadSafeWinUIElement(Arc::new(element)),
        }))
    }

    /// Native handle behind `element`, whichever backend produced it.
    fn native_handle(element: &UIElement) -> Option<isize> {
        if let Some(window) = element.as_any().downcast_ref::<Win32Window>() {
            return Some(window.hwnd);
        }
        element
            .as_any()
            .downcast_ref::<WindowsUIElement>()
            .and_then(|e| e.element.0.get_native_window_handle().ok())
            .map(|handle| {
                let hwnd: windows::Win32::Foundation::HWND = handle.into();
                hwnd.0 as isize
            })
            .filter(|raw| *raw != 0)
    }

    fn find_win32(
        &self,
        selector: &Selector,
        root: Option<&UIElement>,
        timeout: Duration,
    ) -> Result<UIElement, AutomationError> {
        let scope = match root {
            Some(root) => Some(Self::native_handle(root).ok_or_else(|| {
                AutomationError::InvalidArgument(format!(
                    "Cannot scope a win32 search under '{}': element has no window handle",
                    root.name_or_empty()
                ))
            })?),
            None => None,
        };

        let deadline = Instant::now() + timeout;
        loop {
            let candidates = match scope {
                Some(parent) => child_windows(parent),
                None => top_level_windows(),
            };
            trace!("win32 scan over {} windows for {}", candidates.len(), selector);

            if let Some(hwnd) = candidates.into_iter().find(|raw| {
                let attrs = window_attributes(*raw);
                attrs.is_visible && selector.matches(&attrs)
            }) {
                debug!("win32 match for {} at {:#x}", selector, hwnd);
                return Ok(UIElement::new(Arc::new(Win32Window { hwnd })));
            }

            if Instant::now() >= deadline {
                return Err(AutomationError::ElementNotFound(format!(
                    "No visible window matching {selector} within {}ms",
                    timeout.as_millis()
                )));
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    fn find_uia(
        &self,
        selector: &Selector,
        root: Option<&UIElement>,
        timeout: Duration,
    ) -> Result<UIElement, AutomationError> {
        let root_ele = match root {
            Some(root) => {
                if let Some(uia) = root.as_any().downcast_ref::<WindowsUIElement>() {
                    uia.element.0.as_ref().clone()
                } else {
                    let raw = Self::native_handle(root).ok_or_else(|| {
                        AutomationError::InvalidArgument(format!(
                            "Cannot scope a uia search under '{}'",
                            root.name_or_empty()
                        ))
                    })?;
                    self.automation
                        .0
                        .element_from_handle(Handle::from(hwnd_from(raw)))?
                }
            }
            None => self.automation.0.get_root_element()?,
        };

        let target = selector.clone();
        debug!(
            "searching uia tree for {} under '{}', timeout {}ms",
            selector,
            root_ele.get_name().unwrap_or_default(),
            timeout.as_millis()
        );
        let matcher = self
            .automation
            .0
            .create_matcher()
            .from_ref(&root_ele)
            .depth(UIA_SEARCH_DEPTH)
            .filter_fn(Box::new(move |e: &uiautomation::UIElement| {
                let attrs = uia_attributes(e);
                Ok(attrs.is_visible && target.matches(&attrs))
            }))
            .timeout(timeout.as_millis() as u64);

        let element = matcher.find_first().map_err(|e| {
            AutomationError::ElementNotFound(format!("Selector: {selector}, Err: {e}"))
        })?;
        Ok(Self::wrap_uia(element))
    }
}

impl AccessibilityEngine for WindowsEngine {
    fn find_element(
        &self,
        selector: &Selector,
        root: Option<&UIElement>,
        timeout: Duration,
        backend: Backend,
    ) -> Result<UIElement, AutomationError> {
        match backend {
            Backend::Win32 => self.find_win32(selector, root, timeout),
            Backend::Uia => self.find_uia(selector, root, timeout),
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
