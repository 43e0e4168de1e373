/*!
Trigger sources (orchestration layer).

This module defines the `TriggerRequest` every source produces, the
`TriggerSource` trait, and orchestration helpers (`build_sources_from_config`,
`spawn_all_sources`). Concrete implementations live in their own files:

- `file.rs`         -> `FileSource`      (poll a single request file)
- `clipboard.rs`    -> `ClipboardSource` (poll the clipboard text)
- `directory.rs`    -> `DirectorySource` (watch a directory of request files)
- `stdin_source.rs` -> `StdinSource`     (one request per stdin line)
- `gate.rs`         -> `ExecutionGate`   (one execution at a time)

Each source implementation is responsible for:
- Turning raw input into a `TriggerRequest` via [`parse_trigger`]
- Pushing requests via `Sender<TriggerRequest>` (`send().await`)
- Logging errors and continuing (never panicking inside tasks)
- Ending cleanly when the channel closes or the `CancellationToken` fires
*/

use serde::{Deserialize, Serialize};
use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{Config, TriggerConfig};

pub mod clipboard;
pub mod directory;
pub mod file;
pub mod gate;
pub mod stdin_source;

pub use clipboard::{ClipboardReader, ClipboardSource, SystemClipboard};
pub use directory::DirectorySource;
pub use file::FileSource;
pub use gate::{ExecutionGate, GateGuard};
pub use stdin_source::StdinSource;

/// What a trigger asks the runtime to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerRequest {
    /// Run macro text, given in short-code form or, with `verbose`, in verbose form.
    Execute {
        #[serde(rename = "macro")]
        macro_text: String,
        #[serde(default)]
        verbose: bool,
    },
    /// Run a stored command.
    Command { name: String },
}

/// Interpret raw trigger input.
///
/// JSON objects are decoded as a [`TriggerRequest`]; any other non-empty text is
/// taken as a stored command name. Returns `None` for blank or undecodable input.
pub fn parse_trigger(raw: &str) -> Option<TriggerRequest> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if !raw.starts_with('{') {
        return Some(TriggerRequest::Command {
            name: raw.to_string(),
        });
    }
    match serde_json::from_str(raw) {
        Ok(request) => Some(request),
        Err(e) => {
            warn!(target: "caserpa::sources", error = %e, "Failed to decode trigger request");
            None
        }
    }
}

/// Trait implemented by all trigger sources.
///
/// A source spawns an asynchronous task that produces requests and sends them
/// into the provided channel until cancelled. Tasks should never panic.
pub trait TriggerSource: Send + Sync {
    /// Static human-readable identifier (used in logs).
    fn name(&self) -> &'static str;

    /// Start the source in the background.
    fn start(&self, sender: Sender<TriggerRequest>, cancel: CancellationToken) -> JoinHandle<()>;
}

/// Construct all configured sources, in config order.
///
/// Sources that hold off while a macro runs observe `gate`.
pub fn build_sources_from_config(cfg: &Config, gate: &ExecutionGate) -> Vec<Box<dyn TriggerSource>> {
    cfg.triggers
        .iter()
        .map(|tc| -> Box<dyn TriggerSource> {
            match tc {
                TriggerConfig::File {
                    path,
                    poll_ms,
                    delete_on_success,
                } => Box::new(FileSource::new(path.clone(), *poll_ms, *delete_on_success)),
                TriggerConfig::Directory {
                    path,
                    pattern,
                    recursive,
                } => Box::new(DirectorySource::new(
                    path.clone(),
                    pattern.clone(),
                    recursive.unwrap_or(false),
                )),
                TriggerConfig::Clipboard { poll_ms } => {
                    Box::new(ClipboardSource::new(*poll_ms, gate.clone()))
                }
                TriggerConfig::Stdin => Box::new(StdinSource::new()),
            }
        })
        .collect()
}

/// Spawn every source, returning their `JoinHandle`s.
pub fn spawn_all_sources(
    sources: &[Box<dyn TriggerSource>],
    sender: Sender<TriggerRequest>,
    cancel: &CancellationToken,
) -> Vec<JoinHandle<()>> {
    sources
        .iter()
        .map(|src| {
            info!(
                target: "caserpa::sources",
                source = %src.name(),
                "Starting trigger source"
            );
            src.start(sender.clone(), cancel.clone())
        })
        .collect()
}
