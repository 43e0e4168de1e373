use anyhow::{Context, Result, bail};
use enigo::Keyboard as _;
use enigo::Mouse as _;
use enigo::{Button as EButton, Coordinate, Direction, Enigo, Key, Settings};
use tracing::{info, trace, warn};

use crate::executor::keys::{KeyStroke, Modifier, NamedKey, parse_keys};
use crate::executor::services::{InputInjector, MouseButton};
use crate::locator::Point;

/// Keyboard and mouse injection over Enigo, with optional dry-run mode.
/// In dry-run mode, actions are only logged and no real input is simulated.
pub struct EnigoInjector {
    dry_run: bool,
    enigo: Option<Enigo>,
}

impl EnigoInjector {
    /// Create a new injector.
    /// - dry_run: when true, only logs instead of simulating real input.
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            enigo: None,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn ensure_enigo(&mut self) -> Result<&mut Enigo> {
        if self.enigo.is_none() {
            trace!(target: "caserpa::actions", "Initializing Enigo");
            self.enigo =
                Some(Enigo::new(&Settings::default()).context("Failed to initialize Enigo")?);
        }
        self.enigo
            .as_mut()
            .context("Enigo unavailable after initialization")
    }

    fn press_at(&mut self, at: Point, button: EButton, direction: Direction) -> Result<()> {
        let enigo = self.ensure_enigo()?;
        enigo.move_mouse(at.x, at.y, Coordinate::Abs)?;
        enigo.button(button, direction)?;
        Ok(())
    }
}

impl InputInjector for EnigoInjector {
    fn send_text(&mut self, text: &str) -> Result<()> {
        let strokes =
            parse_keys(text).with_context(|| format!("Invalid key sequence '{text}'"))?;
        if self.dry_run {
            info!(target: "caserpa::actions", %text, "DRY-RUN send_text");
            return Ok(());
        }
        trace!(target: "caserpa::actions", %text, "send_text");
        let enigo = self.ensure_enigo()?;
        play(enigo, &strokes, false)
    }

    fn click(&mut self, at: Point, button: MouseButton) -> Result<()> {
        if self.dry_run {
            info!(target: "caserpa::actions", %at, ?button, "DRY-RUN click");
            return Ok(());
        }
        trace!(target: "caserpa::actions", %at, ?button, "click");
        self.press_at(at, map_mouse_button(button), Direction::Click)
    }

    fn move_and_hold(&mut self, at: Point) -> Result<()> {
        if self.dry_run {
            info!(target: "caserpa::actions", %at, "DRY-RUN move_and_hold");
            return Ok(());
        }
        trace!(target: "caserpa::actions", %at, "move_and_hold");
        self.press_at(at, EButton::Left, Direction::Press)
    }

    fn release(&mut self, at: Point) -> Result<()> {
        if self.dry_run {
            info!(target: "caserpa::actions", %at, "DRY-RUN release");
            return Ok(());
        }
        trace!(target: "caserpa::actions", %at, "release");
        self.press_at(at, EButton::Left, Direction::Release)
    }

    /// Enigo only injects input; live captures fail so the engine logs them.
    fn capture_screen(&mut self) -> Result<()> {
        if self.dry_run {
            info!(target: "caserpa::actions", "DRY-RUN capture_screen");
            return Ok(());
        }
        bail!("screen capture needs a capture backend; Enigo only injects input")
    }
}

/// Play parsed strokes. Inside a chord, text goes out as individual key
/// clicks so the held modifiers apply to it.
fn play(enigo: &mut Enigo, strokes: &[KeyStroke], chorded: bool) -> Result<()> {
    for stroke in strokes {
        match stroke {
            KeyStroke::Text(text) if chorded => {
                for c in text.chars() {
                    enigo.key(Key::Unicode(c), Direction::Click)?;
                }
            }
            KeyStroke::Text(text) => enigo.text(text)?,
            KeyStroke::Key { key, repeat } => match map_named_key(*key) {
                Some(k) => {
                    for _ in 0..*repeat {
                        enigo.key(k, Direction::Click)?;
                    }
                }
                None => warn!(target: "caserpa::actions", ?key, "Key not supported on this platform; skipped"),
            },
            KeyStroke::Chord { modifiers, strokes } => {
                for m in modifiers {
                    enigo.key(map_modifier(*m), Direction::Press)?;
                }
                let played = play(enigo, strokes, chorded || !modifiers.is_empty());
                for m in modifiers.iter().rev() {
                    enigo.key(map_modifier(*m), Direction::Release)?;
                }
                played?;
            }
        }
    }
    Ok(())
}

fn map_mouse_button(btn: MouseButton) -> EButton {
    match btn {
        MouseButton::Left => EButton::Left,
        MouseButton::Right => EButton::Right,
    }
}

fn map_modifier(m: Modifier) -> Key {
    match m {
        Modifier::Control => Key::Control,
        Modifier::Alt => Key::Alt,
        Modifier::Shift => Key::Shift,
    }
}

/// Keys Enigo exposes on every platform; the rest are skipped.
fn map_named_key(key: NamedKey) -> Option<Key> {
    Some(match key {
        NamedKey::Enter => Key::Return,
        NamedKey::Up => Key::UpArrow,
        NamedKey::Down => Key::DownArrow,
        NamedKey::Left => Key::LeftArrow,
        NamedKey::Right => Key::RightArrow,
        NamedKey::Home => Key::Home,
        NamedKey::End => Key::End,
        NamedKey::PageUp => Key::PageUp,
        NamedKey::PageDown => Key::PageDown,
        NamedKey::Delete => Key::Delete,
        NamedKey::Tab => Key::Tab,
        NamedKey::Escape => Key::Escape,
        NamedKey::Backspace => Key::Backspace,
        NamedKey::CapsLock => Key::CapsLock,
        NamedKey::F(n) => function_key(n)?,
        NamedKey::Insert
        | NamedKey::Break
        | NamedKey::Clear
        | NamedKey::NumLock
        | NamedKey::ScrollLock
        | NamedKey::PrintScreen => return None,
    })
}

fn function_key(n: u8) -> Option<Key> {
    Some(match n {
        1 => Key::F1,
        2 => Key::F2,
        3 => Key::F3,
        4 => Key::F4,
        5 => Key::F5,
        6 => Key::F6,
        7 => Key::F7,
        8 => Key::F8,
        9 => Key::F9,
        10 => Key::F10,
        11 => Key::F11,
        12 => Key::F12,
        13 => Key::F13,
        14 => Key::F14,
        15 => Key::F15,
        16 => Key::F16,
        17 => Key::F17,
        18 => Key::F18,
        19 => Key::F19,
        20 => Key::F20,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dry_run_never_touches_enigo() {
        let mut injector = EnigoInjector::new(true);
        assert!(injector.is_dry_run());
        injector.send_text("^c%({TAB}{TAB})hello~").unwrap();
        injector.click(Point::new(10, 20), MouseButton::Right).unwrap();
        injector.move_and_hold(Point::new(1, 1)).unwrap();
        injector.release(Point::new(2, 2)).unwrap();
        injector.capture_screen().unwrap();
        assert!(injector.enigo.is_none());
    }

    #[test]
    fn live_capture_reports_an_error() {
        let mut injector = EnigoInjector::new(false);
        let err = injector.capture_screen().unwrap_err();
        assert!(err.to_string().contains("capture backend"), "{err}");
        assert!(injector.enigo.is_none());
    }

    #[test]
    fn invalid_key_sequences_error_even_in_dry_run() {
        let mut injector = EnigoInjector::new(true);
        let err = injector.send_text("{ENTER").unwrap_err();
        assert!(err.to_string().contains("Invalid key sequence"));
    }

    #[test]
    fn key_mapping() {
        assert_eq!(map_named_key(NamedKey::Enter), Some(Key::Return));
        assert_eq!(map_named_key(NamedKey::F(12)), Some(Key::F12));
        assert_eq!(map_named_key(NamedKey::F(24)), None);
        assert_eq!(map_named_key(NamedKey::ScrollLock), None);
        assert_eq!(map_modifier(Modifier::Alt), Key::Alt);
    }
}
