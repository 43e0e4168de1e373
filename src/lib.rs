#![forbid(unsafe_code)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! Caserpa: a compact macro language for desktop automation, executed over Enigo.
//!
//! A macro is a `;`-separated list of one-letter instructions (`e;snotepad~;t500;fsave.png`)
//! with optional loop headers (`[3]…`, `[2:5]…`). This crate organizes the codebase into
//! cohesive modules and exposes a convenient prelude:
//! - `macros`: opcode registry, parser, validator, text escaping and readable translations.
//! - `locator`: screen-locate protocol (image references, anchors, polling with timeouts).
//! - `executor`: the execution engine, key parsing, Enigo injector and runtime.
//! - `config`: configuration models, loader, schema helpers.
//! - `sources`: trigger sources (file, directory, clipboard, stdin) and the execution gate.
//!
//! Use `caserpa::prelude::*` to bring commonly used items into scope quickly.

/// Public module: configuration (models, loader, schema helpers).
pub mod config;
/// Public module: execution engine, injector and runtime.
pub mod executor;
/// Public module: screen-locate protocol.
pub mod locator;
/// Public module: the macro language itself.
pub mod macros;
/// Public module: trigger sources (file, directory, clipboard, stdin).
pub mod sources;

/// Crate-level constants for consumers that want to inspect package metadata at runtime.
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the crate version (e.g., "0.1.0").
#[inline]
pub const fn version() -> &'static str {
    PKG_VERSION
}

/// Parse a level name (trace|debug|info|warn|error), case-insensitively.
pub fn parse_level(name: &str) -> Option<tracing::Level> {
    use tracing::Level;
    match name.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Initialize tracing (logging) with a reasonable default.
/// - Honors the `RUST_LOG` environment variable if set.
/// - Falls back to `info` level.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init_tracing() {
    let level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|s| parse_level(&s))
        .unwrap_or(tracing::Level::INFO);
    init_tracing_with_level(level);
}

/// Initialize tracing at an explicit level, ignoring `RUST_LOG`.
pub fn init_tracing_with_level(level: tracing::Level) {
    // Ignore the error if the global subscriber was already set.
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .try_init();
}

/// A convenient set of exports for most consumers.
///
/// Bring this into scope with:
/// `use caserpa::prelude::*;`
pub mod prelude {
    // Common result/error handling
    pub use anyhow::{Context, Error, Result, anyhow, bail, ensure};

    // Tracing macros
    pub use tracing::{debug, error, info, instrument, trace, warn};

    pub use std::time::Duration;

    pub use crate as caserpa;
    pub use enigo;

    // Frequently used items
    pub use crate::config::{Config, load_from_path};
    pub use crate::executor::{Outcome, Runtime};
    pub use crate::locator::{ImageRef, LocateMode, LocateResult, Point, ScreenLocator};
    pub use crate::macros::{ValidationOutcome, describe, parse, to_short_code, to_verbose, validate};
    pub use crate::sources::TriggerRequest;
    pub use crate::{config, executor, locator, macros, sources};
}
