use crate::element::UIElementAttributes;
use crate::errors::AutomationError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Structural criteria locating one window or control.
///
/// Every criterion that is set must match. A selector with no criteria is
/// rejected at construction so it can never match the whole desktop by accident.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "RawSelector", into = "RawSelector")]
pub struct Selector {
    title: Option<String>,
    title_re: Option<TitlePattern>,
    class_name: Option<String>,
    control_type: Option<String>,
    auto_id: Option<String>,
}

/// Title regex, anchored at the start of the title like the window-spec
/// matching the Guardian selectors were written against.
#[derive(Clone)]
struct TitlePattern {
    source: String,
    regex: Regex,
}

impl TitlePattern {
    fn new(source: &str) -> Result<Self, AutomationError> {
        let regex = Regex::new(&format!("^(?:{source})")).map_err(|e| {
            AutomationError::InvalidSelector(format!("Invalid title_re '{source}': {e}"))
        })?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }
}

impl fmt::Debug for TitlePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.source)
    }
}

/// On-disk shape of a selector, keyed the way `config/selectors.json` is written.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct RawSelector {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_re: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_id: Option<String>,
}

impl TryFrom<RawSelector> for Selector {
    type Error = AutomationError;

    fn try_from(raw: RawSelector) -> Result<Self, Self::Error> {
        let selector = Selector {
            title: raw.title,
            title_re: raw.title_re.as_deref().map(TitlePattern::new).transpose()?,
            class_name: raw.class_name,
            control_type: raw.control_type,
            auto_id: raw.auto_id,
        };
        if selector.is_empty() {
            return Err(AutomationError::InvalidSelector(
                "Selector needs at least one of title, title_re, class_name, control_type or auto_id"
                    .to_string(),
            ));
        }
        Ok(selector)
    }
}

impl From<Selector> for RawSelector {
    fn from(selector: Selector) -> Self {
        RawSelector {
            title: selector.title,
            title_re: selector.title_re.map(|p| p.source),
            class_name: selector.class_name,
            control_type: selector.control_type,
            auto_id: selector.auto_id,
        }
    }
}

impl Selector {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    pub fn title_re(pattern: &str) -> Result<Self, AutomationError> {
        Ok(Self {
            title_re: Some(TitlePattern::new(pattern)?),
            ..Default::default()
        })
    }

    pub fn with_class_name(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }

    pub fn with_control_type(mut self, control_type: impl Into<String>) -> Self {
        self.control_type = Some(control_type.into());
        self
    }

    fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.title_re.is_none()
            && self.class_name.is_none()
            && self.control_type.is_none()
            && self.auto_id.is_none()
    }

    /// Reduced selector keeping only the title criteria.
    ///
    /// Class names reported by the Win32 window list differ from the ones UI
    /// Automation reports for the same dialog, so the cheap pre-check only
    /// trusts the title.
    pub fn title_only(&self) -> Result<Selector, AutomationError> {
        let reduced = Selector {
            title: self.title.clone(),
            title_re: self.title_re.clone(),
            ..Default::default()
        };
        if reduced.is_empty() {
            return Err(AutomationError::InvalidSelector(format!(
                "Selector {self} has no title criteria"
            )));
        }
        Ok(reduced)
    }

    /// Best human-readable label for log lines.
    pub fn label(&self) -> &str {
        self.title
            .as_deref()
            .or(self.title_re.as_ref().map(|p| p.source.as_str()))
            .or(self.auto_id.as_deref())
            .or(self.class_name.as_deref())
            .unwrap_or("<unnamed>")
    }

    pub fn matches(&self, attrs: &UIElementAttributes) -> bool {
        let name = attrs.name.as_deref().unwrap_or_default();

        if let Some(title) = &self.title {
            if name != title {
                return false;
            }
        }
        if let Some(pattern) = &self.title_re {
            if !pattern.regex.is_match(name) {
                return false;
            }
        }
        if let Some(class_name) = &self.class_name {
            if attrs.class_name.as_deref() != Some(class_name.as_str()) {
                return false;
            }
        }
        if let Some(control_type) = &self.control_type {
            match attrs.control_type.as_deref() {
                Some(actual) if actual.eq_ignore_ascii_case(control_type) => {}
                _ => return false,
            }
        }
        if let Some(auto_id) = &self.auto_id {
            if attrs.automation_id.as_deref() != Some(auto_id.as_str()) {
                return false;
            }
        }
        true
    }
}

impl PartialEq for Selector {
    fn eq(&self, other: &Self) -> bool {
        self.title == other.title
            && self.title_re.as_ref().map(|p| &p.source)
                == other.title_re.as_ref().map(|p| &p.source)
            && self.class_name == other.class_name
            && self.control_type == other.control_type
            && self.auto_id == other.auto_id
    }
}

impl Eq for Selector {}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(title) = &self.title {
            parts.push(format!("title:{title}"));
        }
        if let Some(pattern) = &self.title_re {
            parts.push(format!("title_re:{}", pattern.source));
        }
        if let Some(class_name) = &self.class_name {
            parts.push(format!("classname:{class_name}"));
        }
        if let Some(control_type) = &self.control_type {
            parts.push(format!("role:{control_type}"));
        }
        if let Some(auto_id) = &self.auto_id {
            parts.push(format!("nativeid:{auto_id}"));
        }
        write!(f, "{}", parts.join("|"))
    }
}

impl std::str::FromStr for Selector {
    type Err = AutomationError;

    /// Parses the compact `key:value|key:value` form, e.g.
    /// `title_re:Space Guardian.*|classname:TFrmPrincipal`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut raw = RawSelector::default();
        for part in s.split('|').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = part.split_once(':').ok_or_else(|| {
                AutomationError::InvalidSelector(format!(
                    "Unknown selector format: \"{part}\". Use prefixes like 'title:', 'title_re:', 'classname:', 'role:' or 'nativeid:'."
                ))
            })?;
            let value = value.to_string();
            match key.to_lowercase().as_str() {
                "title" | "name" => raw.title = Some(value),
                "title_re" => raw.title_re = Some(value),
                "classname" | "class_name" => raw.class_name = Some(value),
                "role" | "control_type" => raw.control_type = Some(value),
                "nativeid" | "auto_id" => raw.auto_id = Some(value),
                other => {
                    return Err(AutomationError::InvalidSelector(format!(
                        "Unknown selector key '{other}' in \"{s}\""
                    )))
                }
            }
        }
        Selector::try_from(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(name: &str, class_name: &str) -> UIElementAttributes {
        UIElementAttributes {
            name: Some(name.to_string()),
            class_name: Some(class_name.to_string()),
            control_type: Some("Window".to_string()),
            automation_id: None,
            is_visible: true,
        }
    }

    #[test]
    fn title_re_is_anchored_at_start() {
        let selector = Selector::title_re("Space Guardian.*").unwrap();
        assert!(selector.matches(&window("Space Guardian - Filial 1", "TFrm")));
        assert!(!selector.matches(&window("Sobre o Space Guardian", "TFrm")));
    }

    #[test]
    fn every_criterion_must_match() {
        let selector = Selector::title("Confirmação").with_class_name("#32770");
        assert!(selector.matches(&window("Confirmação", "#32770")));
        assert!(!selector.matches(&window("Confirmação", "TForm")));
        assert!(!selector.matches(&window("Atenção", "#32770")));
    }

    #[test]
    fn control_type_is_case_insensitive() {
        let selector = Selector::title("<< Autorizar").with_control_type("button");
        let mut attrs = window("<< Autorizar", "TButton");
        attrs.control_type = Some("Button".to_string());
        assert!(selector.matches(&attrs));
    }

    #[test]
    fn parses_compact_form() {
        let selector: Selector = "title_re:Autoriza.*|classname:TFrmAutoriza".parse().unwrap();
        assert_eq!(
            selector,
            Selector::title_re("Autoriza.*")
                .unwrap()
                .with_class_name("TFrmAutoriza")
        );
        assert_eq!(selector.to_string(), "title_re:Autoriza.*|classname:TFrmAutoriza");
    }

    #[test]
    fn rejects_empty_and_unknown_keys() {
        assert!("".parse::<Selector>().is_err());
        assert!("colour:blue".parse::<Selector>().is_err());
        assert!(serde_json::from_str::<Selector>("{}").is_err());
    }

    #[test]
    fn deserializes_window_spec_keys() {
        let json = r#"{"title_re": "Space Guardian.*", "class_name": "2.52_39c000000"}"#;
        let selector: Selector = serde_json::from_str(json).unwrap();
        assert!(selector.matches(&window("Space Guardian", "2.52_39c000000")));
        assert_eq!(selector.label(), "Space Guardian.*");
    }

    #[test]
    fn title_only_drops_class_name() {
        let selector = Selector::title_re("Autoriza.*")
            .unwrap()
            .with_class_name("TFrmAutoriza");
        let reduced = selector.title_only().unwrap();
        assert!(reduced.matches(&window("Autorizações", "#32770")));
        assert!(Selector::default()
            .with_class_name("#32770")
            .title_only()
            .is_err());
    }
}
