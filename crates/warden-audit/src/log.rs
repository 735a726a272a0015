// log.rs — Buffered, append-only JSONL audit log.
//
// The log is stored as a JSONL file: one JSON object per line, easy to
// parse with standard tools (jq, grep, etc.). Each line links to the
// previous one via `previous_hash`, so inserting, deleting, or modifying
// events breaks the chain and is detectable.
//
// Writes go through a bounded channel drained by a dedicated writer
// thread. `record` never blocks and never fails: when the buffer is full
// the event is dropped, a counter is incremented, and the log reports
// itself as degraded. Callers that must observe a consistent file (query,
// chain verification) first round-trip a flush through the writer thread.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{sync_channel, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::JoinHandle;

use chrono::{DateTime, Utc};
use tracing::{error, warn};
use uuid::Uuid;
use warden_policy::{tag_matches, Boundary, RuleAction};

use crate::error::AuditError;
use crate::event::AuditEvent;
use crate::hasher;

enum Msg {
    Record(Box<AuditEvent>),
    Flush(SyncSender<()>),
}

/// Criteria for querying recorded events. All fields are conjunctive;
/// `None` means "any".
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub boundary: Option<Boundary>,
    pub action: Option<RuleAction>,
    pub agent_id: Option<String>,
    pub tool_name: Option<String>,
    /// Hierarchical tag filter: matches events carrying this tag or any
    /// descendant of it.
    pub tag: Option<String>,
    pub rule: Option<String>,
    pub session_id: Option<String>,
    pub event_id: Option<Uuid>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl AuditFilter {
    fn matches(&self, event: &AuditEvent) -> bool {
        if let Some(boundary) = self.boundary {
            if event.boundary != boundary {
                return false;
            }
        }
        if let Some(action) = self.action {
            if event.action != action {
                return false;
            }
        }
        if let Some(agent_id) = &self.agent_id {
            if event.agent_id.as_deref() != Some(agent_id.as_str()) {
                return false;
            }
        }
        if let Some(tool_name) = &self.tool_name {
            if event.tool_name.as_deref() != Some(tool_name.as_str()) {
                return false;
            }
        }
        if let Some(tag) = &self.tag {
            if !event.data_tags.iter().any(|t| tag_matches(tag, t)) {
                return false;
            }
        }
        if let Some(rule) = &self.rule {
            if event.matched_rule.as_deref() != Some(rule.as_str()) {
                return false;
            }
        }
        if let Some(session_id) = &self.session_id {
            if event.session_id.as_deref() != Some(session_id.as_str()) {
                return false;
            }
        }
        if let Some(event_id) = self.event_id {
            if event.event_id != event_id {
                return false;
            }
        }
        if let Some(since) = self.since {
            if event.timestamp < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if event.timestamp > until {
                return false;
            }
        }
        true
    }
}

/// An append-only audit log backed by a JSONL file, with a background
/// writer thread.
pub struct AuditLog {
    path: PathBuf,
    sender: Option<SyncSender<Msg>>,
    handle: Option<JoinHandle<()>>,
    degraded: Arc<AtomicBool>,
    dropped: Arc<AtomicU64>,
}

impl AuditLog {
    /// Open (or create) an audit log at the given path, buffering up to
    /// `capacity` events between the decision path and the writer thread.
    ///
    /// If the file already exists, the last line is read back so new events
    /// continue the hash chain instead of restarting it.
    pub fn open(path: impl AsRef<Path>, capacity: usize) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();

        let last_hash = if path.exists() {
            Self::read_last_hash(&path)?
        } else {
            String::new()
        };

        // Append mode so existing data is never overwritten.
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| AuditError::OpenFailed {
                path: path.clone(),
                source,
            })?;

        let (sender, receiver) = sync_channel::<Msg>(capacity);
        let degraded = Arc::new(AtomicBool::new(false));
        let writer_degraded = Arc::clone(&degraded);

        let handle = std::thread::Builder::new()
            .name("warden-audit-writer".to_string())
            .spawn(move || {
                let mut writer = BufWriter::new(file);
                let mut last_hash = last_hash;
                for msg in receiver {
                    match msg {
                        Msg::Record(mut event) => {
                            event.previous_hash = last_hash.clone();
                            let json = match event.to_json_line() {
                                Ok(json) => json,
                                Err(err) => {
                                    error!(error = %err, "failed to serialize audit event");
                                    writer_degraded.store(true, Ordering::Relaxed);
                                    continue;
                                }
                            };
                            if let Err(err) = writeln!(writer, "{}", json)
                                .and_then(|_| writer.flush())
                            {
                                error!(error = %err, "failed to write audit event");
                                writer_degraded.store(true, Ordering::Relaxed);
                                continue;
                            }
                            last_hash = hasher::hash_str(&json);
                        }
                        Msg::Flush(ack) => {
                            if let Err(err) = writer.flush() {
                                error!(error = %err, "failed to flush audit log");
                                writer_degraded.store(true, Ordering::Relaxed);
                            }
                            let _ = ack.send(());
                        }
                    }
                }
                let _ = writer.flush();
            })
            .map_err(|source| AuditError::OpenFailed {
                path: path.clone(),
                source,
            })?;

        Ok(Self {
            path,
            sender: Some(sender),
            handle: Some(handle),
            degraded,
            dropped: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Enqueue an event for writing. Never blocks and never fails.
    ///
    /// If the buffer is full or the writer thread has stopped, the event is
    /// dropped, the drop counter is incremented, and the log enters the
    /// degraded state.
    pub fn record(&self, event: AuditEvent) {
        let sender = match &self.sender {
            Some(sender) => sender,
            None => return,
        };
        match sender.try_send(Msg::Record(Box::new(event))) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                if !self.degraded.swap(true, Ordering::Relaxed) {
                    warn!(
                        path = %self.path.display(),
                        "audit buffer full, dropping events; log is degraded"
                    );
                }
            }
        }
    }

    /// Whether any event has been lost or any write has failed since open.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    /// Number of events dropped because the buffer was full.
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Block until every event enqueued before this call is on disk.
    pub fn flush(&self) {
        let sender = match &self.sender {
            Some(sender) => sender,
            None => return,
        };
        let (ack_tx, ack_rx) = sync_channel(1);
        if sender.send(Msg::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.recv();
        }
    }

    /// Read back all recorded events matching `filter`, oldest first.
    ///
    /// Flushes the write buffer first so the result reflects every event
    /// recorded before the call.
    pub fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditEvent>, AuditError> {
        self.flush();
        let events = Self::read_all(&self.path)?;
        Ok(events.into_iter().filter(|e| filter.matches(e)).collect())
    }

    /// Verify the hash chain of this log's file. Returns the number of
    /// events checked.
    pub fn verify(&self) -> Result<usize, AuditError> {
        self.flush();
        Self::verify_chain(&self.path)
    }

    /// Read all events from a log file, oldest first. Blank lines are
    /// skipped.
    pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<AuditEvent>, AuditError> {
        let file = File::open(path.as_ref()).map_err(|source| AuditError::OpenFailed {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        let reader = BufReader::new(file);
        let mut events = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            events.push(serde_json::from_str(&line)?);
        }
        Ok(events)
    }

    /// Verify the hash chain of a log file.
    ///
    /// Checks that each event's `previous_hash` equals the hash of the
    /// preceding line. Returns the number of events checked, or an
    /// `IntegrityViolation` naming the first broken link.
    pub fn verify_chain(path: impl AsRef<Path>) -> Result<usize, AuditError> {
        let file = File::open(path.as_ref()).map_err(|source| AuditError::OpenFailed {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        let reader = BufReader::new(file);
        let mut expected = String::new();
        let mut count = 0usize;
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let event: AuditEvent = serde_json::from_str(&line)?;
            if event.previous_hash != expected {
                return Err(AuditError::IntegrityViolation {
                    line: index + 1,
                    expected,
                    actual: event.previous_hash,
                });
            }
            expected = hasher::hash_str(&line);
            count += 1;
        }
        Ok(count)
    }

    fn read_last_hash(path: &Path) -> Result<String, AuditError> {
        let file = File::open(path).map_err(|source| AuditError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let reader = BufReader::new(file);
        let mut last = String::new();
        for line in reader.lines() {
            let line = line?;
            if !line.trim().is_empty() {
                last = line;
            }
        }
        if last.is_empty() {
            Ok(String::new())
        } else {
            Ok(hasher::hash_str(&last))
        }
    }
}

impl Drop for AuditLog {
    fn drop(&mut self) {
        // Closing the channel lets the writer thread drain and exit.
        drop(self.sender.take());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
