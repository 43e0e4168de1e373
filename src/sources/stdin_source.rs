//! Stdin trigger source.
//!
//! Reads one trigger request per line from standard input: a JSON request or a
//! bare command name, e.g.
//!     echo open_notepad | caserpa --watch --config config/default.json
//!
//! Blank and undecodable lines are skipped. EOF, a closed channel or
//! cancellation ends the task.

use tokio::{
    io::{self, AsyncBufRead, AsyncBufReadExt, BufReader},
    sync::mpsc::Sender,
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, trace, warn};

use super::{TriggerRequest, TriggerSource, parse_trigger};

/// Source that reads trigger requests from stdin.
#[derive(Debug, Clone, Default)]
pub struct StdinSource;

impl StdinSource {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl TriggerSource for StdinSource {
    fn name(&self) -> &'static str {
        "stdin"
    }

    fn start(&self, sender: Sender<TriggerRequest>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(target: "caserpa::sources", "StdinSource task started (reading lines)");
            pump_lines(BufReader::new(io::stdin()), sender, cancel).await;
            trace!(target: "caserpa::sources", "StdinSource task ended");
        })
    }
}

/// Forward each decodable line of `reader` until EOF, channel close or cancel.
async fn pump_lines<R>(mut reader: R, sender: Sender<TriggerRequest>, cancel: CancellationToken)
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        let read = tokio::select! {
            _ = cancel.cancelled() => break,
            read = reader.read_line(&mut line) => read,
        };
        match read {
            Ok(0) => {
                info!(target: "caserpa::sources", "EOF on stdin; StdinSource exiting");
                break;
            }
            Ok(_) => {
                let Some(request) = parse_trigger(&line) else {
                    continue;
                };
                trace!(target: "caserpa::sources", ?request, "Trigger read from stdin");
                if let Err(e) = sender.send(request).await {
                    error!(
                        target: "caserpa::sources",
                        error = %e,
                        "Channel closed while sending stdin trigger; terminating task"
                    );
                    break;
                }
            }
            Err(e) => {
                warn!(
                    target: "caserpa::sources",
                    error = %e,
                    "Error reading from stdin; terminating task"
                );
                break;
            }
        }
    }
}
