//! File trigger source.
//!
//! Polls a single file path at a fixed interval.
//!
//! Behavior:
//! - If `delete_on_success = true`: every non-empty read dispatches a request
//!   and the file is deleted (so the next trigger requires recreating the file).
//! - If `delete_on_success = false`: the file is dispatched only when its
//!   (length, mtime_seconds) signature changes to avoid duplicate triggers.
//! - Empty / whitespace-only files are ignored.
//! - Undecodable JSON is logged and retried on the next poll without deletion.
//! - Missing file is silent until it appears.
//!
//! The task ends when the channel closes or the cancellation token fires.

use std::fs;
use std::time::{Duration, SystemTime};

use tokio::{
    fs as afs,
    sync::mpsc::Sender,
    task::JoinHandle,
    time::{Instant, sleep_until},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, trace, warn};

use super::{TriggerRequest, TriggerSource, parse_trigger};

/// Source that polls a single file for trigger requests.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: String,
    poll_ms: u64,
    delete_on_success: bool,
}

impl FileSource {
    /// Create a new `FileSource`.
    ///
    /// Arguments:
    /// - `path`: target file path (absolute or relative).
    /// - `poll_ms`: optional polling interval (defaults to 100ms; minimum 10ms).
    /// - `delete_on_success`: whether to delete the file after a successful dispatch.
    pub fn new(path: String, poll_ms: Option<u64>, delete_on_success: Option<bool>) -> Self {
        Self {
            path,
            poll_ms: poll_ms.unwrap_or(100).max(10),
            delete_on_success: delete_on_success.unwrap_or(false),
        }
    }

    /// Coarse change signature (length, mtime seconds).
    fn file_signature(meta: &fs::Metadata) -> (u64, u64) {
        let len = meta.len();
        let mtime = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(SystemTime::UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or(0);
        (len, mtime)
    }
}

impl TriggerSource for FileSource {
    fn name(&self) -> &'static str {
        "file"
    }

    fn start(&self, sender: Sender<TriggerRequest>, cancel: CancellationToken) -> JoinHandle<()> {
        let path = self.path.clone();
        let poll_ms = self.poll_ms;
        let delete_on_success = self.delete_on_success;

        tokio::spawn(async move {
            info!(
                target: "caserpa::sources",
                %path, poll_ms, delete_on_success,
                "FileSource task started"
            );

            let mut last_sig: Option<(u64, u64)> = None;
            let interval = Duration::from_millis(poll_ms);
            let mut next_tick = Instant::now();

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = sleep_until(next_tick) => {}
                }
                next_tick += interval;

                let meta = match fs::metadata(&path) {
                    Ok(m) if m.is_file() => m,
                    Ok(_) => {
                        warn!(
                            target: "caserpa::sources",
                            %path,
                            "Path exists but is not a regular file"
                        );
                        continue;
                    }
                    Err(_) => continue,
                };

                let sig = Self::file_signature(&meta);
                if !delete_on_success && last_sig == Some(sig) {
                    trace!(target: "caserpa::sources", %path, "File unchanged; skipping");
                    continue;
                }

                let content = match afs::read_to_string(&path).await {
                    Ok(content) => content,
                    Err(e) => {
                        warn!(target: "caserpa::sources", %path, error = %e, "Failed to read file");
                        continue;
                    }
                };
                if content.trim().is_empty() {
                    trace!(target: "caserpa::sources", %path, "File is empty/whitespace; ignoring");
                    continue;
                }
                let Some(request) = parse_trigger(&content) else {
                    // Possibly a half-written file; retry on the next change.
                    if !delete_on_success {
                        last_sig = Some(sig);
                    }
                    continue;
                };

                if let Err(e) = sender.send(request).await {
                    error!(
                        target: "caserpa::sources",
                        %path, error = %e,
                        "Channel closed; FileSource terminating"
                    );
                    break;
                }
                info!(target: "caserpa::sources", %path, delete_on_success, "Dispatched trigger from file");

                if delete_on_success {
                    if let Err(e) = afs::remove_file(&path).await {
                        warn!(
                            target: "caserpa::sources",
                            %path, error = %e,
                            "Failed to delete file after dispatch"
                        );
                    }
                } else {
                    last_sig = Some(sig);
                }
            }

            info!(target: "caserpa::sources", %path, "FileSource task ended");
        })
    }
}
