//! Collaborator contracts consumed by the engine.
//!
//! The engine owns none of these: stored commands, the screen locator and the
//! input injector are supplied by the caller through [`Services`]. Settings are
//! only read by validation.

use std::thread;
use std::time::Duration;

use anyhow::{Result, bail};

use crate::locator::{Point, ScreenLocator};

/// Looks up stored macro text by command name.
pub trait CommandResolver {
    fn lookup(&self, name: &str) -> Option<String>;
}

/// Read-only key/value settings.
pub trait SettingsStore {
    fn get(&self, key: &str) -> Option<String>;

    fn exists(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

/// Mouse buttons the macro language can press.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
}

/// Simulated keyboard and mouse input.
///
/// `send_text` takes injection-form text (`{ENTER}`, `^c`, `%({TAB})`, ...).
pub trait InputInjector {
    fn send_text(&mut self, text: &str) -> Result<()>;

    fn click(&mut self, at: Point, button: MouseButton) -> Result<()>;

    /// Two clicks separated by `gap`.
    fn double_click(&mut self, at: Point, button: MouseButton, gap: Duration) -> Result<()> {
        self.click(at, button)?;
        thread::sleep(gap);
        self.click(at, button)
    }

    /// Move to `at` and press the left button without releasing it.
    fn move_and_hold(&mut self, at: Point) -> Result<()>;

    /// Move to `at` and release the left button.
    fn release(&mut self, at: Point) -> Result<()>;

    /// Save a capture of the screen. Unsupported unless overridden.
    fn capture_screen(&mut self) -> Result<()> {
        bail!("screen capture is not supported by this injector")
    }
}

/// Everything one execution needs from the outside world.
pub struct Services<'a> {
    pub locator: &'a mut dyn ScreenLocator,
    pub injector: &'a mut dyn InputInjector,
    pub commands: &'a dyn CommandResolver,
}
