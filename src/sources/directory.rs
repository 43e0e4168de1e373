//! Directory trigger source.
//!
//! Watches a directory with `notify`. Every file created or written there whose
//! name matches the optional pattern is read as one trigger request and then
//! removed. Files already present when the watch starts are consumed first.
//!
//! Patterns support `*` (any run of characters) and `?` (one character).

use std::path::{Path, PathBuf};

use notify::{Event, EventKind, RecursiveMode, Watcher};
use tokio::{
    fs as afs,
    sync::mpsc::{self, Sender},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::{TriggerRequest, TriggerSource, parse_trigger};

/// Source that turns files dropped into a directory into trigger requests.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    path: PathBuf,
    pattern: Option<String>,
    recursive: bool,
}

impl DirectorySource {
    pub fn new(path: impl Into<PathBuf>, pattern: Option<String>, recursive: bool) -> Self {
        Self {
            path: path.into(),
            pattern,
            recursive,
        }
    }

    fn accepts(pattern: Option<&str>, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        pattern.is_none_or(|p| matches_pattern(p, name))
    }
}

impl TriggerSource for DirectorySource {
    fn name(&self) -> &'static str {
        "directory"
    }

    fn start(&self, sender: Sender<TriggerRequest>, cancel: CancellationToken) -> JoinHandle<()> {
        let source = self.clone();

        tokio::spawn(async move {
            let path = source.path.display().to_string();
            let (event_tx, mut events) = mpsc::unbounded_channel::<notify::Result<Event>>();
            let mut watcher = match notify::recommended_watcher(move |res| {
                let _ = event_tx.send(res);
            }) {
                Ok(w) => w,
                Err(e) => {
                    error!(target: "caserpa::sources", %path, error = %e, "Failed to create watcher");
                    return;
                }
            };
            let mode = if source.recursive {
                RecursiveMode::Recursive
            } else {
                RecursiveMode::NonRecursive
            };
            if let Err(e) = watcher.watch(&source.path, mode) {
                error!(target: "caserpa::sources", %path, error = %e, "Failed to watch directory");
                return;
            }
            info!(
                target: "caserpa::sources",
                %path, pattern = ?source.pattern, recursive = source.recursive,
                "DirectorySource task started"
            );

            let pattern = source.pattern.as_deref();
            for existing in existing_files(&source.path).await {
                if DirectorySource::accepts(pattern, &existing) && !consume(&existing, &sender).await {
                    return;
                }
            }

            loop {
                let event = tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = events.recv() => event,
                };
                match event {
                    Some(Ok(event)) => {
                        if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                            continue;
                        }
                        for file in &event.paths {
                            if DirectorySource::accepts(pattern, file) && !consume(file, &sender).await {
                                return;
                            }
                        }
                    }
                    Some(Err(e)) => warn!(target: "caserpa::sources", %path, error = %e, "Watch error"),
                    None => break,
                }
            }

            info!(target: "caserpa::sources", %path, "DirectorySource task ended");
        })
    }
}

async fn existing_files(dir: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let Ok(mut entries) = afs::read_dir(dir).await else {
        return out;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        if entry.file_type().await.is_ok_and(|t| t.is_file()) {
            out.push(entry.path());
        }
    }
    out.sort();
    out
}

/// Read, dispatch and remove one request file. Returns false once the channel is closed.
async fn consume(file: &Path, sender: &Sender<TriggerRequest>) -> bool {
    let content = match afs::read_to_string(file).await {
        Ok(content) => content,
        Err(e) => {
            // Already consumed by an earlier event for the same file.
            trace!(target: "caserpa::sources", file = %file.display(), error = %e, "Skipping unreadable file");
            return true;
        }
    };
    if content.trim().is_empty() {
        // Created but not written yet; a modify event follows.
        return true;
    }
    let Some(request) = parse_trigger(&content) else {
        return true;
    };
    if let Err(e) = afs::remove_file(file).await {
        warn!(target: "caserpa::sources", file = %file.display(), error = %e, "Failed to remove request file");
    }
    debug!(target: "caserpa::sources", file = %file.display(), ?request, "Dispatching trigger from directory");
    if sender.send(request).await.is_err() {
        error!(target: "caserpa::sources", "Channel closed; DirectorySource terminating");
        return false;
    }
    true
}

/// Glob match with `*` and `?`.
pub fn matches_pattern(pattern: &str, name: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let n: Vec<char> = name.chars().collect();
    let (mut pi, mut ni) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while ni < n.len() {
        match p.get(pi) {
            Some('*') => {
                backtrack = Some((pi, ni));
                pi += 1;
            }
            Some(&c) if c == '?' || c == n[ni] => {
                pi += 1;
                ni += 1;
            }
            _ => match backtrack {
                Some((star, matched)) => {
                    pi = star + 1;
                    ni = matched + 1;
                    backtrack = Some((star, matched + 1));
                }
                None => return false,
            },
        }
    }
    p[pi..].iter().all(|&c| c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[test]
    fn glob_patterns() {
        assert!(matches_pattern("*.json", "a.json"));
        assert!(matches_pattern("*.json", ".json"));
        assert!(!matches_pattern("*.json", "a.json.tmp"));
        assert!(matches_pattern("trigger_*", "trigger_42"));
        assert!(matches_pattern("t?.txt", "t1.txt"));
        assert!(!matches_pattern("t?.txt", "t12.txt"));
        assert!(matches_pattern("*a*b*", "xxaxxbxx"));
        assert!(matches_pattern("*", ""));
        assert!(!matches_pattern("a", ""));
    }

    #[test]
    fn pattern_applies_to_file_name_only() {
        assert!(DirectorySource::accepts(Some("*.json"), Path::new("/tmp/in/x.json")));
        assert!(!DirectorySource::accepts(Some("*.json"), Path::new("/tmp/in.json/x.txt")));
        assert!(DirectorySource::accepts(None, Path::new("anything")));
    }

    #[tokio::test]
    async fn consumes_files_present_at_start() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.json"), r#"{"type":"command","name":"open"}"#).unwrap();
        std::fs::write(dir.path().join("ignored.tmp"), "close").unwrap();

        let (tx, mut rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let source = DirectorySource::new(dir.path(), Some("*.json".into()), false);
        let handle = source.start(tx, cancel.clone());

        let request = timeout(Duration::from_secs(5), rx.recv()).await.unwrap();
        assert_eq!(
            request,
            Some(TriggerRequest::Command {
                name: "open".into()
            })
        );
        assert!(!dir.path().join("a.json").exists());
        assert!(dir.path().join("ignored.tmp").exists());

        cancel.cancel();
        timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    }
}
