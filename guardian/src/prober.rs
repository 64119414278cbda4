//! Optional-dialog prober
//!
//! Guardian shows a number of modal dialogs only under some server-side
//! configurations. The prober waits a bounded time for one of them and
//! answers it with a keystroke macro; absence is the common, expected case.

use crate::config::Timings;
use crate::element::UIElement;
use crate::errors::AutomationError;
use crate::keys::KeySequence;
use crate::platforms::Backend;
use crate::registry::{SelectorRegistry, UiTarget};
use crate::selector::Selector;
use crate::Desktop;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Where a dialog is searched.
#[derive(Debug, Clone)]
pub enum ProbeScope {
    /// Any top-level window on the desktop.
    Desktop,
    /// Descendants of a known parent window.
    Within(UIElement),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Handled,
    Absent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationOutcome {
    /// The cheap pre-check saw no authorization window.
    Absent,
    /// Both buttons were invoked.
    Authorized,
    /// The window was seen but could not be driven to completion.
    Failed,
}

#[derive(Clone)]
pub struct DialogProber {
    desktop: Desktop,
    registry: Arc<SelectorRegistry>,
    timings: Timings,
}

impl DialogProber {
    pub fn new(desktop: Desktop, registry: Arc<SelectorRegistry>, timings: Timings) -> Self {
        Self {
            desktop,
            registry,
            timings,
        }
    }

    /// Probes for `target` with the default optional-dialog timeout.
    pub async fn probe(&self, target: UiTarget, keys: &str, scope: ProbeScope) -> ProbeOutcome {
        self.probe_and_act(target, keys, scope, self.timings.optional_dialog())
            .await
    }

    /// Waits up to `timeout` for `target`; if it shows up, focuses it and types `keys`.
    ///
    /// Never fails: absence is logged at info, any other problem at warn.
    pub async fn probe_and_act(
        &self,
        target: UiTarget,
        keys: &str,
        scope: ProbeScope,
        timeout: Duration,
    ) -> ProbeOutcome {
        let selector = match self.registry.resolve(target) {
            Ok(selector) => selector.clone(),
            Err(e) => {
                warn!("Cannot probe for '{}': {}", target, e);
                return ProbeOutcome::Absent;
            }
        };
        let keys = match KeySequence::parse(keys) {
            Ok(keys) => keys,
            Err(e) => {
                warn!("Invalid keystrokes '{}' for '{}': {}", keys, target, e);
                return ProbeOutcome::Absent;
            }
        };
        self.probe_selector(target, &selector, &keys, scope, timeout)
            .await
    }

    async fn probe_selector(
        &self,
        target: UiTarget,
        selector: &Selector,
        keys: &KeySequence,
        scope: ProbeScope,
        timeout: Duration,
    ) -> ProbeOutcome {
        let mut locator = self
            .desktop
            .locator(selector.clone())
            .with_backend(Backend::Win32);
        if let ProbeScope::Within(parent) = scope {
            locator = locator.within(parent);
        }

        let dialog = match locator.wait(Some(timeout)).await {
            Ok(dialog) => dialog,
            Err(e) if e.is_not_found() => {
                info!(
                    "Optional dialog '{}' did not appear. Continuing...",
                    selector.label()
                );
                return ProbeOutcome::Absent;
            }
            Err(e) => {
                warn!("Could not interact with optional dialog '{}': {}", target, e);
                return ProbeOutcome::Absent;
            }
        };
        info!("Dialog '{}' found.", selector.label());

        let acted = dialog.focus().and_then(|_| dialog.send_keys(keys));
        match acted {
            Ok(()) => {
                info!("--> Keystrokes '{}' sent to '{}'.", keys, target);
                ProbeOutcome::Handled
            }
            Err(e) => {
                warn!("Could not interact with optional dialog '{}': {}", target, e);
                ProbeOutcome::Absent
            }
        }
    }

    /// Two-phase handling of the authorization request window.
    ///
    /// A title-only search of the native window list under `main_window`
    /// decides whether the window exists at all. Only then is the UI
    /// Automation tree searched for the dialog and its two buttons, which
    /// are invoked in order: authorize, then confirm.
    pub async fn probe_authorization(&self, main_window: &UIElement) -> AuthorizationOutcome {
        info!("Checking whether the authorization window appeared...");
        match self.authorization_precheck(main_window).await {
            Ok(true) => info!("Pre-check (win32): authorization window detected."),
            Ok(false) => {
                info!("Pre-check (win32): authorization window did not appear in time.");
                return AuthorizationOutcome::Absent;
            }
            Err(e) => {
                warn!("Pre-check (win32): unexpected error. {}", e);
                return AuthorizationOutcome::Absent;
            }
        }

        match self.authorize().await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Could not interact with the authorization window: {}", e);
                AuthorizationOutcome::Failed
            }
        }
    }

    async fn authorization_precheck(
        &self,
        main_window: &UIElement,
    ) -> Result<bool, AutomationError> {
        let selector = self
            .registry
            .resolve(UiTarget::AuthorizationDialog)?
            .title_only()?;
        let found = self
            .desktop
            .locator(selector)
            .with_backend(Backend::Win32)
            .within(main_window.clone())
            .wait(Some(self.timings.authorization_precheck()))
            .await;
        match found {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn authorize(&self) -> Result<AuthorizationOutcome, AutomationError> {
        info!("Connecting through the uia backend to handle the authorization window...");
        let button_timeout = self.timings.authorization_button();

        let main_uia = self
            .desktop
            .locator(self.registry.resolve(UiTarget::MainWindow)?.clone())
            .with_backend(Backend::Uia)
            .wait(Some(self.timings.main_window()))
            .await?;

        let dialog = match self
            .desktop
            .locator(self.registry.resolve(UiTarget::AuthorizationDialog)?.clone())
            .with_backend(Backend::Uia)
            .within(main_uia)
            .wait(Some(button_timeout))
            .await
        {
            Ok(dialog) => dialog,
            Err(e) if e.is_not_found() => {
                info!("Authorization window did not appear. Continuing...");
                return Ok(AuthorizationOutcome::Absent);
            }
            Err(e) => return Err(e),
        };
        info!("Authorization window found: '{}'", dialog.name_or_empty());
        dialog.focus()?;

        for target in [UiTarget::AuthorizeButton, UiTarget::ConfirmAuthorizationButton] {
            let selector = self.registry.resolve(target)?;
            let button = self
                .desktop
                .locator(selector.clone())
                .with_backend(Backend::Uia)
                .within(dialog.clone())
                .wait(Some(button_timeout))
                .await?;
            info!("Button '{}' found. Invoking...", selector.label());
            button.invoke()?;
            info!("--> Invoke sent to '{}'.", selector.label());
        }
        Ok(AuthorizationOutcome::Authorized)
    }
}
