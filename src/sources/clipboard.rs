//! Clipboard trigger source.
//!
//! Polls the clipboard text at a fixed interval and dispatches it through
//! [`parse_trigger`], so copying `open_notepad` runs that stored command.
//!
//! Behavior:
//! - Empty text, and text equal to the last dispatched value, are ignored.
//! - While the execution gate is held the clipboard is not read at all, so a
//!   value copied during a run is picked up once the run ends.
//! - Read failures (no text content, clipboard locked) are logged and retried.
//!
//! Reads go through [`ClipboardReader`] on the blocking pool; the system
//! implementation opens a fresh `arboard::Clipboard` per read.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::{
    sync::mpsc::Sender,
    task::{self, JoinHandle},
    time::{Instant, sleep_until},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::{ExecutionGate, TriggerRequest, TriggerSource, parse_trigger};

/// Reads the current clipboard text.
pub trait ClipboardReader: Send + Sync + 'static {
    /// `Ok(None)` when the clipboard holds no text.
    fn read_text(&self) -> Result<Option<String>>;
}

/// The desktop clipboard via `arboard`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClipboard;

impl ClipboardReader for SystemClipboard {
    fn read_text(&self) -> Result<Option<String>> {
        let mut clipboard = arboard::Clipboard::new()?;
        match clipboard.get_text() {
            Ok(text) => Ok(Some(text)),
            Err(arboard::Error::ContentNotAvailable) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Source that turns clipboard changes into trigger requests.
#[derive(Clone)]
pub struct ClipboardSource {
    reader: Arc<dyn ClipboardReader>,
    poll_ms: u64,
    gate: ExecutionGate,
}

impl ClipboardSource {
    /// Poll the system clipboard (interval defaults to 500ms; minimum 10ms).
    pub fn new(poll_ms: Option<u64>, gate: ExecutionGate) -> Self {
        Self::with_reader(SystemClipboard, poll_ms, gate)
    }

    pub fn with_reader(
        reader: impl ClipboardReader,
        poll_ms: Option<u64>,
        gate: ExecutionGate,
    ) -> Self {
        Self {
            reader: Arc::new(reader),
            poll_ms: poll_ms.unwrap_or(500).max(10),
            gate,
        }
    }
}

impl TriggerSource for ClipboardSource {
    fn name(&self) -> &'static str {
        "clipboard"
    }

    fn start(&self, sender: Sender<TriggerRequest>, cancel: CancellationToken) -> JoinHandle<()> {
        let reader = Arc::clone(&self.reader);
        let gate = self.gate.clone();
        let poll_ms = self.poll_ms;

        tokio::spawn(async move {
            info!(target: "caserpa::sources", poll_ms, "ClipboardSource task started");

            let interval = Duration::from_millis(poll_ms);
            let mut next_tick = Instant::now();
            let mut last_dispatched = String::new();

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = sleep_until(next_tick) => {}
                }
                next_tick += interval;

                if gate.is_busy() {
                    trace!(target: "caserpa::sources", "Execution in progress; clipboard not read");
                    continue;
                }

                let reader = Arc::clone(&reader);
                let text = match task::spawn_blocking(move || reader.read_text()).await {
                    Ok(Ok(Some(text))) => text,
                    Ok(Ok(None)) => continue,
                    Ok(Err(e)) => {
                        debug!(target: "caserpa::sources", error = %e, "Failed to read clipboard");
                        continue;
                    }
                    Err(e) => {
                        warn!(target: "caserpa::sources", error = %e, "Clipboard read task failed");
                        continue;
                    }
                };

                if text.trim().is_empty() || text == last_dispatched {
                    continue;
                }
                last_dispatched = text;

                let Some(request) = parse_trigger(&last_dispatched) else {
                    continue;
                };
                if let Err(e) = sender.send(request).await {
                    error!(
                        target: "caserpa::sources",
                        error = %e,
                        "Channel closed; ClipboardSource terminating"
                    );
                    break;
                }
                info!(target: "caserpa::sources", "Dispatched trigger from clipboard");
            }

            info!(target: "caserpa::sources", "ClipboardSource task ended");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    /// Serves queued clipboard contents, then keeps repeating the last one.
    #[derive(Default)]
    struct Queued(Mutex<VecDeque<Option<String>>>);

    impl Queued {
        fn new(values: &[Option<&str>]) -> Self {
            Self(Mutex::new(
                values.iter().map(|v| v.map(str::to_string)).collect(),
            ))
        }
    }

    impl ClipboardReader for Queued {
        fn read_text(&self) -> Result<Option<String>> {
            let mut values = self.0.lock().unwrap();
            if values.len() > 1 {
                Ok(values.pop_front().flatten())
            } else {
                Ok(values.front().cloned().flatten())
            }
        }
    }

    fn command(name: &str) -> Option<TriggerRequest> {
        Some(TriggerRequest::Command { name: name.into() })
    }

    #[test]
    fn poll_interval_has_a_floor() {
        assert_eq!(ClipboardSource::new(Some(1), ExecutionGate::new()).poll_ms, 10);
        assert_eq!(ClipboardSource::new(None, ExecutionGate::new()).poll_ms, 500);
    }

    #[tokio::test]
    async fn repeated_text_dispatches_once() {
        let reader = Queued::new(&[
            None,
            Some("open"),
            Some("open"),
            Some("  "),
            Some("close"),
            Some("close"),
        ]);
        let (tx, mut rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let source = ClipboardSource::with_reader(reader, Some(10), ExecutionGate::new());
        let handle = source.start(tx, cancel.clone());

        assert_eq!(timeout(Duration::from_secs(5), rx.recv()).await.unwrap(), command("open"));
        assert_eq!(timeout(Duration::from_secs(5), rx.recv()).await.unwrap(), command("close"));
        assert!(timeout(Duration::from_millis(100), rx.recv()).await.is_err());

        cancel.cancel();
        timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn clipboard_is_left_alone_while_a_macro_runs() {
        let gate = ExecutionGate::new();
        let guard = gate.try_acquire().unwrap();
        let (tx, mut rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let source = ClipboardSource::with_reader(Queued::new(&[Some("open")]), Some(10), gate);
        let handle = source.start(tx, cancel.clone());

        assert!(timeout(Duration::from_millis(100), rx.recv()).await.is_err());
        drop(guard);
        assert_eq!(timeout(Duration::from_secs(5), rx.recv()).await.unwrap(), command("open"));

        cancel.cancel();
        timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    }
}
