//! Injection-form key syntax.
//!
//! Turns text such as `^c`, `%({TAB}{TAB})`, `{LEFT 3}` or `hello~` into a tree
//! of [`KeyStroke`]s that an injector can play back:
//!
//! - `^` Control, `%` Alt and `+` Shift apply to the next key or `( )` group.
//! - `~` is Enter.
//! - `{NAME}` is a named key, `{NAME n}` repeats it, and a single character in
//!   braces (`{+}`, `{{}`) is that character typed literally.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyParseError {
    #[error("unknown key name '{{{0}}}'")]
    UnknownKey(String),
    #[error("missing '}}' after '{{' at offset {0}")]
    UnclosedBrace(usize),
    #[error("missing ')' for group opened at offset {0}")]
    UnclosedGroup(usize),
    #[error("unexpected ')' at offset {0}")]
    UnexpectedClose(usize),
    #[error("modifier '{0}' is not followed by a key")]
    DanglingModifier(char),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Modifier {
    Control,
    Alt,
    Shift,
}

impl Modifier {
    fn from_char(c: char) -> Option<Self> {
        match c {
            '^' => Some(Modifier::Control),
            '%' => Some(Modifier::Alt),
            '+' => Some(Modifier::Shift),
            _ => None,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NamedKey {
    Enter,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    Insert,
    Delete,
    Tab,
    Escape,
    Backspace,
    Break,
    CapsLock,
    Clear,
    NumLock,
    ScrollLock,
    PrintScreen,
    F(u8),
}

impl NamedKey {
    /// Resolve a brace name, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        let upper = name.to_ascii_uppercase();
        let key = match upper.as_str() {
            "ENTER" => NamedKey::Enter,
            "UP" => NamedKey::Up,
            "DOWN" => NamedKey::Down,
            "LEFT" => NamedKey::Left,
            "RIGHT" => NamedKey::Right,
            "HOME" => NamedKey::Home,
            "END" => NamedKey::End,
            "PGUP" => NamedKey::PageUp,
            "PGDN" => NamedKey::PageDown,
            "INSERT" | "INS" => NamedKey::Insert,
            "DELETE" | "DEL" => NamedKey::Delete,
            "TAB" => NamedKey::Tab,
            "ESC" => NamedKey::Escape,
            "BACKSPACE" | "BS" | "BKSP" => NamedKey::Backspace,
            "BREAK" => NamedKey::Break,
            "CAPSLOCK" => NamedKey::CapsLock,
            "CLEAR" => NamedKey::Clear,
            "NUMLOCK" => NamedKey::NumLock,
            "SCROLLLOCK" => NamedKey::ScrollLock,
            "PRTSC" => NamedKey::PrintScreen,
            other => {
                let n: u8 = other.strip_prefix('F')?.parse().ok()?;
                if !(1..=24).contains(&n) {
                    return None;
                }
                NamedKey::F(n)
            }
        };
        Some(key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyStroke {
    /// Literal characters.
    Text(String),
    Key { key: NamedKey, repeat: u32 },
    /// `strokes` played while `modifiers` are held.
    Chord {
        modifiers: Vec<Modifier>,
        strokes: Vec<KeyStroke>,
    },
}

/// Parse injection-form text.
pub fn parse_keys(input: &str) -> Result<Vec<KeyStroke>, KeyParseError> {
    let mut parser = KeyParser {
        chars: input.chars().collect(),
        pos: 0,
    };
    parser.sequence(None)
}

struct KeyParser {
    chars: Vec<char>,
    pos: usize,
}

impl KeyParser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    /// Parse until end of input, or until the `)` closing a group opened at `group`.
    fn sequence(&mut self, group: Option<usize>) -> Result<Vec<KeyStroke>, KeyParseError> {
        let mut out = Vec::new();
        while let Some(c) = self.peek() {
            if c == ')' {
                return match group {
                    Some(_) => {
                        self.pos += 1;
                        Ok(out)
                    }
                    None => Err(KeyParseError::UnexpectedClose(self.pos)),
                };
            }
            let stroke = self.stroke()?;
            push_stroke(&mut out, stroke);
        }
        match group {
            Some(start) => Err(KeyParseError::UnclosedGroup(start)),
            None => Ok(out),
        }
    }

    fn stroke(&mut self) -> Result<KeyStroke, KeyParseError> {
        let start = self.pos;
        let Some(c) = self.peek() else {
            return Ok(KeyStroke::Text(String::new()));
        };
        self.pos += 1;

        if let Some(first) = Modifier::from_char(c) {
            let mut modifiers = vec![first];
            while let Some(m) = self.peek().and_then(Modifier::from_char) {
                modifiers.push(m);
                self.pos += 1;
            }
            let strokes = match self.peek() {
                None | Some(')') => return Err(KeyParseError::DanglingModifier(c)),
                Some('(') => {
                    self.pos += 1;
                    self.sequence(Some(self.pos - 1))?
                }
                Some(_) => vec![self.stroke()?],
            };
            return Ok(KeyStroke::Chord { modifiers, strokes });
        }

        match c {
            '~' => Ok(KeyStroke::Key {
                key: NamedKey::Enter,
                repeat: 1,
            }),
            '{' => self.braced(start),
            '(' => {
                let strokes = self.sequence(Some(start))?;
                Ok(KeyStroke::Chord {
                    modifiers: Vec::new(),
                    strokes,
                })
            }
            other => Ok(KeyStroke::Text(other.to_string())),
        }
    }

    /// Called just after `{`.
    fn braced(&mut self, open: usize) -> Result<KeyStroke, KeyParseError> {
        // `{}}` is a literal closing brace.
        if self.peek() == Some('}') && self.chars.get(self.pos + 1) == Some(&'}') {
            self.pos += 2;
            return Ok(KeyStroke::Text("}".into()));
        }
        let close = self.chars[self.pos..]
            .iter()
            .position(|&c| c == '}')
            .map(|offset| self.pos + offset)
            .ok_or(KeyParseError::UnclosedBrace(open))?;
        let body: String = self.chars[self.pos..close].iter().collect();
        self.pos = close + 1;

        let (name, repeat) = match body.rsplit_once(' ') {
            Some((name, count)) if !name.is_empty() => match count.parse::<u32>() {
                Ok(n) => (name, n),
                Err(_) => (body.as_str(), 1),
            },
            _ => (body.as_str(), 1),
        };

        let mut chars = name.chars();
        if let (Some(single), None) = (chars.next(), chars.next()) {
            return Ok(KeyStroke::Text(single.to_string().repeat(repeat as usize)));
        }
        let key = NamedKey::from_name(name).ok_or_else(|| KeyParseError::UnknownKey(name.to_string()))?;
        Ok(KeyStroke::Key { key, repeat })
    }
}

fn push_stroke(out: &mut Vec<KeyStroke>, stroke: KeyStroke) {
    if let KeyStroke::Text(text) = &stroke {
        if text.is_empty() {
            return;
        }
        if let Some(KeyStroke::Text(prev)) = out.last_mut() {
            prev.push_str(text);
            return;
        }
    }
    out.push(stroke);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> KeyStroke {
        KeyStroke::Text(s.into())
    }

    fn key(key: NamedKey) -> KeyStroke {
        KeyStroke::Key { key, repeat: 1 }
    }

    #[test]
    fn plain_text_is_merged() {
        assert_eq!(parse_keys("explorer.exe").unwrap(), vec![text("explorer.exe")]);
        assert!(parse_keys("").unwrap().is_empty());
    }

    #[test]
    fn named_keys_and_enter() {
        assert_eq!(
            parse_keys("ok{ENTER}~").unwrap(),
            vec![text("ok"), key(NamedKey::Enter), key(NamedKey::Enter)]
        );
        assert_eq!(parse_keys("{f11}").unwrap(), vec![key(NamedKey::F(11))]);
        assert_eq!(
            parse_keys("{LEFT 3}").unwrap(),
            vec![KeyStroke::Key {
                key: NamedKey::Left,
                repeat: 3
            }]
        );
    }

    #[test]
    fn escaped_characters_are_literal() {
        assert_eq!(parse_keys("a{{}b{}}c{+}{;}").unwrap(), vec![text("a{b}c+;")]);
        assert_eq!(parse_keys("{x 3}").unwrap(), vec![text("xxx")]);
    }

    #[test]
    fn modifiers_bind_to_next_key_or_group() {
        assert_eq!(
            parse_keys("^c").unwrap(),
            vec![KeyStroke::Chord {
                modifiers: vec![Modifier::Control],
                strokes: vec![text("c")]
            }]
        );
        assert_eq!(
            parse_keys("%({TAB}{TAB})x").unwrap(),
            vec![
                KeyStroke::Chord {
                    modifiers: vec![Modifier::Alt],
                    strokes: vec![key(NamedKey::Tab), key(NamedKey::Tab)]
                },
                text("x")
            ]
        );
        assert_eq!(
            parse_keys("^+{ESC}").unwrap(),
            vec![KeyStroke::Chord {
                modifiers: vec![Modifier::Control, Modifier::Shift],
                strokes: vec![key(NamedKey::Escape)]
            }]
        );
    }

    #[test]
    fn window_menu_sequence() {
        assert_eq!(
            parse_keys("%( x)").unwrap(),
            vec![KeyStroke::Chord {
                modifiers: vec![Modifier::Alt],
                strokes: vec![text(" x")]
            }]
        );
    }

    #[test]
    fn malformed_input() {
        assert_eq!(parse_keys("{ENTER").unwrap_err(), KeyParseError::UnclosedBrace(0));
        assert_eq!(parse_keys("%(ab").unwrap_err(), KeyParseError::UnclosedGroup(1));
        assert_eq!(parse_keys("a)").unwrap_err(), KeyParseError::UnexpectedClose(1));
        assert_eq!(parse_keys("x^").unwrap_err(), KeyParseError::DanglingModifier('^'));
        assert!(matches!(parse_keys("{NOPE}"), Err(KeyParseError::UnknownKey(_))));
    }

    #[test]
    fn injection_form_of_any_text_parses_back() {
        let raw = "a{b}(c)+d^e%f~g[h];\r\nnext";
        let injected = crate::macros::to_injection_form(raw);
        let strokes = parse_keys(&injected).unwrap();
        assert_eq!(
            strokes,
            vec![text("a{b}(c)+d^e%f~g[h];"), key(NamedKey::Enter), text("next")]
        );
    }
}
