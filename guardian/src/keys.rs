//! Keystroke macros.
//!
//! The Guardian scripts are written as key-combination strings: `%` holds Alt,
//! `^` holds Ctrl and `+` holds Shift for the next key or parenthesized group,
//! `{NAME}` is a named key, `{NAME N}` repeats it N times and `~` is Enter.
//! Anything else is typed literally.

use crate::errors::AutomationError;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modifier {
    Alt,
    Ctrl,
    Shift,
}

impl Modifier {
    fn from_char(c: char) -> Option<Self> {
        match c {
            '%' => Some(Modifier::Alt),
            '^' => Some(Modifier::Ctrl),
            '+' => Some(Modifier::Shift),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Modifier::Alt => "ALT",
            Modifier::Ctrl => "CTRL",
            Modifier::Shift => "SHIFT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyStroke {
    /// Literal characters.
    Text(String),
    /// Named key (upper-case, e.g. `ENTER`, `F2`, `DELETE`) pressed `repeat` times.
    Key { name: String, repeat: u32 },
    /// Strokes typed while the modifiers are held.
    Chord {
        modifiers: Vec<Modifier>,
        strokes: Vec<KeyStroke>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySequence {
    strokes: Vec<KeyStroke>,
}

/// Upper bound for `{NAME N}`.
const MAX_REPEAT: u32 = 255;

const NAMED_KEYS: &[&str] = &[
    "ENTER", "TAB", "ESC", "DELETE", "DEL", "BACKSPACE", "BACK", "SPACE", "HOME", "END", "UP",
    "DOWN", "LEFT", "RIGHT", "PGUP", "PGDN", "INSERT", "F1", "F2", "F3", "F4", "F5", "F6", "F7",
    "F8", "F9", "F10", "F11", "F12",
];

impl KeySequence {
    /// Literal text that is never interpreted as a macro (codes, quantities).
    pub fn text(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.is_empty() {
            return Self::default();
        }
        Self {
            strokes: vec![KeyStroke::Text(text)],
        }
    }

    pub fn key(name: &str, repeat: u32) -> Self {
        Self {
            strokes: vec![KeyStroke::Key {
                name: name.to_uppercase(),
                repeat,
            }],
        }
    }

    pub fn enter(repeat: u32) -> Self {
        Self::key("ENTER", repeat)
    }

    pub fn then(mut self, other: KeySequence) -> Self {
        self.strokes.extend(other.strokes);
        self
    }

    pub fn strokes(&self) -> &[KeyStroke] {
        &self.strokes
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }

    /// Number of times `name` is pressed, counting repeats and chords.
    pub fn count_key(&self, name: &str) -> u32 {
        fn count(strokes: &[KeyStroke], name: &str) -> u32 {
            strokes
                .iter()
                .map(|s| match s {
                    KeyStroke::Key { name: n, repeat } if n.eq_ignore_ascii_case(name) => *repeat,
                    KeyStroke::Chord { strokes, .. } => count(strokes, name),
                    _ => 0,
                })
                .sum()
        }
        count(&self.strokes, name)
    }

    /// Concatenation of all literal text in the sequence.
    pub fn typed_text(&self) -> String {
        self.strokes
            .iter()
            .filter_map(|s| match s {
                KeyStroke::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Render in the `uiautomation` keyboard syntax: `{NAME}` for named and
    /// hold keys, `{ALT}(...)` for chords, `{(}`-style escapes for literal
    /// braces and parentheses. Repeats are unrolled.
    pub fn to_uia_syntax(&self) -> String {
        fn render(out: &mut String, strokes: &[KeyStroke]) {
            for stroke in strokes {
                match stroke {
                    KeyStroke::Text(text) => {
                        for c in text.chars() {
                            match c {
                                '{' | '}' | '(' | ')' => {
                                    out.push('{');
                                    out.push(c);
                                    out.push('}');
                                }
                                _ => out.push(c),
                            }
                        }
                    }
                    KeyStroke::Key { name, repeat } => {
                        let uia_name = match name.as_str() {
                            "PGUP" => "PAGEUP",
                            "PGDN" => "PAGEDOWN",
                            "BACKSPACE" => "BACK",
                            "DEL" => "DELETE",
                            other => other,
                        };
                        for _ in 0..*repeat {
                            out.push('{');
                            out.push_str(uia_name);
                            out.push('}');
                        }
                    }
                    KeyStroke::Chord { modifiers, strokes } => {
                        for m in modifiers {
                            out.push('{');
                            out.push_str(m.name());
                            out.push('}');
                        }
                        out.push('(');
                        render(out, strokes);
                        out.push(')');
                    }
                }
            }
        }
        let mut out = String::new();
        render(&mut out, &self.strokes);
        out
    }

    pub fn parse(spec: &str) -> Result<Self, AutomationError> {
        let chars: Vec<char> = spec.chars().collect();
        let mut pos = 0;
        let strokes = parse_strokes(&chars, &mut pos, false)?;
        Ok(Self { strokes })
    }
}

fn push_char(strokes: &mut Vec<KeyStroke>, c: char) {
    if let Some(KeyStroke::Text(text)) = strokes.last_mut() {
        text.push(c);
    } else {
        strokes.push(KeyStroke::Text(c.to_string()));
    }
}

fn parse_strokes(
    chars: &[char],
    pos: &mut usize,
    in_group: bool,
) -> Result<Vec<KeyStroke>, AutomationError> {
    let mut strokes = Vec::new();
    while *pos < chars.len() {
        let c = chars[*pos];
        match c {
            ')' if in_group => {
                *pos += 1;
                return Ok(strokes);
            }
            '%' | '^' | '+' => {
                let mut modifiers = Vec::new();
                while let Some(m) = chars.get(*pos).copied().and_then(Modifier::from_char) {
                    modifiers.push(m);
                    *pos += 1;
                }
                let target = parse_single(chars, pos)?;
                strokes.push(KeyStroke::Chord {
                    modifiers,
                    strokes: target,
                });
            }
            _ => {
                for stroke in parse_single(chars, pos)? {
                    match stroke {
                        KeyStroke::Text(t) => t.chars().for_each(|c| push_char(&mut strokes, c)),
                        other => strokes.push(other),
                    }
                }
            }
        }
    }
    if in_group {
        return Err(AutomationError::InvalidArgument(
            "Unclosed '(' in key sequence".to_string(),
        ));
    }
    Ok(strokes)
}

/// One key, named key or parenthesized group at `pos`.
fn parse_single(chars: &[char], pos: &mut usize) -> Result<Vec<KeyStroke>, AutomationError> {
    let Some(&c) = chars.get(*pos) else {
        return Err(AutomationError::InvalidArgument(
            "Modifier at end of key sequence".to_string(),
        ));
    };
    *pos += 1;
    match c {
        '(' => parse_strokes(chars, pos, true),
        '{' => {
            let start = *pos;
            // `{}}` and `{{}` escape braces, so a closing brace right after the
            // opening one belongs to the key name.
            let mut end = start + 1;
            while end < chars.len() && chars[end] != '}' {
                end += 1;
            }
            if end >= chars.len() {
                return Err(AutomationError::InvalidArgument(
                    "Unclosed '{' in key sequence".to_string(),
                ));
            }
            let body: String = chars[start..end].iter().collect();
            *pos = end + 1;
            parse_named(&body).map(|k| vec![k])
        }
        '~' => Ok(vec![KeyStroke::Key {
            name: "ENTER".to_string(),
            repeat: 1,
        }]),
        other => Ok(vec![KeyStroke::Text(other.to_string())]),
    }
}

fn parse_named(body: &str) -> Result<KeyStroke, AutomationError> {
    let (name, repeat) = match body.rsplit_once(' ') {
        Some((name, count)) if !name.is_empty() => {
            let repeat = count.parse::<u32>().map_err(|_| {
                AutomationError::InvalidArgument(format!("Invalid repeat count in '{{{body}}}'"))
            })?;
            if repeat > MAX_REPEAT {
                return Err(AutomationError::InvalidArgument(format!(
                    "Repeat count in '{{{body}}}' exceeds {MAX_REPEAT}"
                )));
            }
            (name, repeat)
        }
        _ => (body, 1),
    };
    if name.chars().count() == 1 {
        return Ok(KeyStroke::Text(name.repeat(repeat as usize)));
    }
    let upper = name.to_uppercase();
    if !NAMED_KEYS.contains(&upper.as_str()) {
        return Err(AutomationError::InvalidArgument(format!(
            "Unknown key name '{name}'"
        )));
    }
    Ok(KeyStroke::Key {
        name: upper,
        repeat,
    })
}

impl FromStr for KeySequence {
    type Err = AutomationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        KeySequence::parse(s)
    }
}

impl fmt::Display for KeySequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn write_strokes(f: &mut fmt::Formatter<'_>, strokes: &[KeyStroke]) -> fmt::Result {
            for stroke in strokes {
                match stroke {
                    KeyStroke::Text(text) => {
                        for c in text.chars() {
                            match c {
                                '%' | '^' | '+' | '~' | '(' | ')' | '{' | '}' => {
                                    write!(f, "{{{c}}}")?
                                }
                                _ => write!(f, "{c}")?,
                            }
                        }
                    }
                    KeyStroke::Key { name, repeat: 1 } => write!(f, "{{{name}}}")?,
                    KeyStroke::Key { name, repeat } => write!(f, "{{{name} {repeat}}}")?,
                    KeyStroke::Chord { modifiers, strokes } => {
                        for m in modifiers {
                            let c = match m {
                                Modifier::Alt => '%',
                                Modifier::Ctrl => '^',
                                Modifier::Shift => '+',
                            };
                            write!(f, "{c}")?;
                        }
                        write!(f, "(")?;
                        write_strokes(f, strokes)?;
                        write!(f, ")")?;
                    }
                }
            }
            Ok(())
        }
        write_strokes(f, &self.strokes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alt_letter() {
        let seq = KeySequence::parse("%n").unwrap();
        assert_eq!(
            seq.strokes(),
            &[KeyStroke::Chord {
                modifiers: vec![Modifier::Alt],
                strokes: vec![KeyStroke::Text("n".to_string())],
            }]
        );
    }

    #[test]
    fn alt_group_and_named_keys() {
        let seq = KeySequence::parse("%(s)").unwrap();
        assert_eq!(seq.to_string(), "%(s)");

        let seq = KeySequence::parse("^a{DELETE}").unwrap();
        assert_eq!(seq.strokes().len(), 2);
        assert_eq!(seq.count_key("DELETE"), 1);
    }

    #[test]
    fn repeat_counts() {
        let seq = KeySequence::parse("{ENTER 5}").unwrap();
        assert_eq!(seq.count_key("enter"), 5);

        let seq = KeySequence::parse("{TAB}{TAB}{TAB}{ENTER}").unwrap();
        assert_eq!(seq.count_key("TAB"), 3);
        assert_eq!(seq.count_key("ENTER"), 1);
    }

    #[test]
    fn literal_text_is_merged() {
        let seq = KeySequence::parse("1234{ENTER}AB").unwrap();
        assert_eq!(seq.typed_text(), "1234AB");
        assert_eq!(seq.strokes().len(), 3);
    }

    #[test]
    fn tilde_is_enter() {
        assert_eq!(KeySequence::parse("~").unwrap(), KeySequence::enter(1));
    }

    #[test]
    fn text_constructor_keeps_macro_characters() {
        let seq = KeySequence::text("10%+2");
        assert_eq!(seq.typed_text(), "10%+2");
        assert_eq!(seq.to_string(), "10{%}{+}2");
        assert_eq!(KeySequence::parse(&seq.to_string()).unwrap(), seq);
    }

    #[test]
    fn renders_uiautomation_syntax() {
        let seq = KeySequence::parse("%n").unwrap();
        assert_eq!(seq.to_uia_syntax(), "{ALT}(n)");

        let seq = KeySequence::parse("^a{DEL}{ENTER 2}").unwrap();
        assert_eq!(seq.to_uia_syntax(), "{CTRL}(a){DELETE}{ENTER}{ENTER}");

        assert_eq!(KeySequence::text("A(1)").to_uia_syntax(), "A{(}1{)}");
    }

    #[test]
    fn malformed_sequences_are_rejected() {
        assert!(KeySequence::parse("{ENTER").is_err());
        assert!(KeySequence::parse("%(ab").is_err());
        assert!(KeySequence::parse("%").is_err());
        assert!(KeySequence::parse("{NOPE}").is_err());
        assert!(KeySequence::parse("{ENTER x}").is_err());
    }

    #[test]
    fn repeat_counts_are_capped() {
        assert_eq!(KeySequence::parse("{ENTER 255}").unwrap().count_key("ENTER"), 255);
        assert!(KeySequence::parse("{ENTER 256}").is_err());
        assert!(KeySequence::parse("{ENTER 4000000000}").is_err());
        assert!(KeySequence::parse("{a 100000}").is_err());
    }
}
