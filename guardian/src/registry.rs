//! Logical names for every Guardian window and control the drivers touch,
//! resolved against the selector file for the running application version.

use crate::errors::{AutomationError, ConfigError};
use crate::selector::{RawSelector, Selector};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UiTarget {
    MainWindow,
    DavInclusionWindow,
    ConfirmationDialog,
    WarningDialog,
    NotificationDialog,
    AddressDialog,
    LastPricePracticed,
    AttentionDialog,
    AuthorizationDialog,
    AuthorizeButton,
    ConfirmAuthorizationButton,
    LogisticsWindow,
}

impl UiTarget {
    pub const ALL: [UiTarget; 12] = [
        UiTarget::MainWindow,
        UiTarget::DavInclusionWindow,
        UiTarget::ConfirmationDialog,
        UiTarget::WarningDialog,
        UiTarget::NotificationDialog,
        UiTarget::AddressDialog,
        UiTarget::LastPricePracticed,
        UiTarget::AttentionDialog,
        UiTarget::AuthorizationDialog,
        UiTarget::AuthorizeButton,
        UiTarget::ConfirmAuthorizationButton,
        UiTarget::LogisticsWindow,
    ];

    /// Key used in `selectors.json`.
    pub fn key(self) -> &'static str {
        match self {
            UiTarget::MainWindow => "main_window",
            UiTarget::DavInclusionWindow => "dav_inclusion_window",
            UiTarget::ConfirmationDialog => "confirmation_dialog",
            UiTarget::WarningDialog => "warning_dialog",
            UiTarget::NotificationDialog => "notification_dialog",
            UiTarget::AddressDialog => "adress_dialog",
            UiTarget::LastPricePracticed => "last_price_pratice",
            UiTarget::AttentionDialog => "atention_dialog",
            UiTarget::AuthorizationDialog => "authorization_dialog",
            UiTarget::AuthorizeButton => "authorization_authorize_button",
            UiTarget::ConfirmAuthorizationButton => "authorization_confirm_button",
            UiTarget::LogisticsWindow => "logistics_window",
        }
    }
}

impl fmt::Display for UiTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, PartialEq)]
struct VersionedSelector {
    /// Application version prefix this matcher applies to; `None` is the fallback.
    version: Option<String>,
    selector: Selector,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SelectorEntry {
    Versioned(Vec<VersionedEntry>),
    Single(RawSelector),
}

#[derive(Deserialize)]
struct VersionedEntry {
    #[serde(default)]
    version: Option<String>,
    #[serde(flatten)]
    selector: RawSelector,
}

#[derive(Debug, Clone, Default)]
pub struct SelectorRegistry {
    entries: HashMap<UiTarget, Vec<VersionedSelector>>,
    app_version: Option<String>,
}

impl SelectorRegistry {
    pub fn from_json_str(json: &str) -> Result<Self, AutomationError> {
        let raw: HashMap<String, SelectorEntry> = serde_json::from_str(json)
            .map_err(|e| AutomationError::InvalidSelector(format!("Invalid selector file: {e}")))?;

        let mut registry = SelectorRegistry::default();
        for (key, entry) in raw {
            let Some(target) = UiTarget::ALL.iter().copied().find(|t| t.key() == key) else {
                debug!("Ignoring selector '{}' not used by any workflow", key);
                continue;
            };
            let variants = match entry {
                SelectorEntry::Single(raw) => vec![VersionedSelector {
                    version: None,
                    selector: Selector::try_from(raw)?,
                }],
                SelectorEntry::Versioned(list) => list
                    .into_iter()
                    .map(|v| {
                        Ok(VersionedSelector {
                            version: v.version,
                            selector: Selector::try_from(v.selector)?,
                        })
                    })
                    .collect::<Result<Vec<_>, AutomationError>>()?,
            };
            registry.entries.insert(target, variants);
        }

        for target in UiTarget::ALL {
            if !registry.entries.contains_key(&target) {
                warn!("No selector configured for '{}'", target);
            }
        }
        Ok(registry)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let registry = Self::from_json_str(&content)
            .map_err(|e| ConfigError::Missing(format!("{}: {e}", path.display())))?;
        info!(
            "Loaded {} selector targets from {}",
            registry.entries.len(),
            path.display()
        );
        Ok(registry)
    }

    /// Sets the application version reported by the database version probe.
    pub fn set_app_version(&mut self, version: impl Into<String>) {
        let version = version.into();
        info!("Resolving selectors for Guardian version {}", version);
        self.app_version = Some(version);
    }

    pub fn app_version(&self) -> Option<&str> {
        self.app_version.as_deref()
    }

    /// Matcher for `target`: the longest version prefix matching the detected
    /// application version wins, otherwise the unversioned fallback.
    pub fn resolve(&self, target: UiTarget) -> Result<&Selector, AutomationError> {
        let variants = self.entries.get(&target).ok_or_else(|| {
            AutomationError::InvalidSelector(format!("No selector configured for '{target}'"))
        })?;

        let versioned = self.app_version.as_deref().and_then(|app_version| {
            variants
                .iter()
                .filter_map(|v| v.version.as_deref().map(|prefix| (prefix, v)))
                .filter(|(prefix, _)| app_version.starts_with(prefix))
                .max_by_key(|(prefix, _)| prefix.len())
                .map(|(_, v)| v)
        });

        versioned
            .or_else(|| variants.iter().find(|v| v.version.is_none()))
            .map(|v| &v.selector)
            .ok_or_else(|| {
                AutomationError::InvalidSelector(format!(
                    "No selector for '{target}' matches version {:?} and no fallback is configured",
                    self.app_version
                ))
            })
    }
}
