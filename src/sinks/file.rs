//! Append-only JSONL file sink.

use std::fs::{File, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::events::Event;

use super::Sink;

/// Writes each event as one JSON line, appended to `path`.
///
/// The file is opened lazily on first write. All I/O failures degrade to a
/// `false` return plus a fallback-channel record; the sink itself never
/// raises into the dispatcher.
pub struct JsonlFileSink {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl JsonlFileSink {
    /// Creates a sink that appends to `path`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            file: Mutex::new(None),
        }
    }

    fn with_file<R>(&self, op: impl FnOnce(&mut File) -> std::io::Result<R>) -> std::io::Result<R> {
        let mut guard = match self.file.lock() {
            Ok(guard) => guard,
            // A poisoned lock means a previous writer panicked mid-write;
            // reopen rather than refuse all further output.
            Err(poisoned) => poisoned.into_inner(),
        };
        if guard.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            *guard = Some(file);
        }
        // The option was just populated above.
        match guard.as_mut() {
            Some(file) => op(file),
            None => unreachable!("file opened above"),
        }
    }
}

impl Sink for JsonlFileSink {
    fn name(&self) -> &'static str {
        "jsonl_file"
    }

    fn write(&self, event: &Event) -> bool {
        let line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(e) => {
                tracing::error!(sink = self.name(), error = %e, "event serialization failed");
                return false;
            }
        };
        match self.with_file(|f| writeln!(f, "{line}")) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(sink = self.name(), path = %self.path.display(), error = %e, "write failed");
                false
            }
        }
    }

    fn flush(&self) -> bool {
        match self.with_file(|f| f.flush()) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(sink = self.name(), path = %self.path.display(), error = %e, "flush failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventSource, EventType};

    #[test]
    fn appends_one_json_line_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let sink = JsonlFileSink::new(&path);

        for i in 0..3 {
            let ev = Event::new(
                format!("exec-{i}"),
                EventType::ExecutionStarted,
                EventSource::Executor,
            );
            assert!(sink.write(&ev));
        }
        assert!(sink.flush());

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["event_type"], "execution.started");
        assert_eq!(first["execution_id"], "exec-0");
    }

    #[test]
    fn unwritable_path_reports_false_without_raising() {
        let sink = JsonlFileSink::new("/nonexistent-dir/events.jsonl");
        let ev = Event::new("e", EventType::ExecutionStarted, EventSource::Executor);
        assert!(!sink.write(&ev));
    }
}
