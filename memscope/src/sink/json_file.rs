//! JSON array file sink.

use crate::domain::{ProfileEntry, SinkError};
use crate::sink::ProfileSink;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

/// Writes entries as one growing JSON array, flushed after every entry so
/// a crash loses at most the entry in flight.
pub struct JsonFileSink {
    state: Mutex<WriterState>,
}

struct WriterState {
    writer: BufWriter<File>,
    entries_written: usize,
    closed: bool,
}

impl JsonFileSink {
    /// Create (or truncate) the output file and start the array.
    pub fn create(path: &Path) -> Result<Self, SinkError> {
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(b"[")?;
        writer.flush()?;
        Ok(Self {
            state: Mutex::new(WriterState { writer, entries_written: 0, closed: false }),
        })
    }
}

impl ProfileSink for JsonFileSink {
    fn handle(&self, entry: &ProfileEntry) -> Result<(), SinkError> {
        let mut state = self.state.lock().map_err(|_| SinkError::Poisoned)?;
        if state.closed {
            return Err(SinkError::Closed);
        }
        if state.entries_written > 0 {
            state.writer.write_all(b",")?;
        }
        state.writer.write_all(b"\n")?;
        serde_json::to_writer_pretty(&mut state.writer, entry)?;
        state.writer.flush()?;
        state.entries_written += 1;
        Ok(())
    }

    /// Terminate the array. Idempotent.
    fn close(&self) -> Result<(), SinkError> {
        let mut state = self.state.lock().map_err(|_| SinkError::Poisoned)?;
        if state.closed {
            return Ok(());
        }
        state.closed = true;
        state.writer.write_all(b"\n]\n")?;
        state.writer.flush()?;
        Ok(())
    }
}

impl Drop for JsonFileSink {
    fn drop(&mut self) {
        // Keep the file parseable even when shutdown never reached close.
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(func: &str, log: &str) -> ProfileEntry {
        ProfileEntry::new(func, 10.0, 11.0, 1_700_000_000.0, log.to_string())
    }

    fn read_entries(path: &Path) -> Vec<ProfileEntry> {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn test_empty_run_yields_empty_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let sink = JsonFileSink::create(&path).unwrap();
        sink.close().unwrap();
        assert!(read_entries(&path).is_empty());
    }

    #[test]
    fn test_entries_form_a_valid_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let sink = JsonFileSink::create(&path).unwrap();
        sink.handle(&entry("f", "trace f")).unwrap();
        sink.handle(&entry("g", "trace g")).unwrap();
        sink.close().unwrap();
        let entries = read_entries(&path);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].func, "f");
        assert_eq!(entries[1].log, "trace g");
    }

    #[test]
    fn test_write_after_close_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let sink = JsonFileSink::create(&path).unwrap();
        sink.close().unwrap();
        let err = sink.handle(&entry("f", "")).unwrap_err();
        assert!(matches!(err, SinkError::Closed));
    }

    #[test]
    fn test_close_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let sink = JsonFileSink::create(&path).unwrap();
        sink.handle(&entry("f", "")).unwrap();
        sink.close().unwrap();
        sink.close().unwrap();
        assert_eq!(read_entries(&path).len(), 1);
    }

    #[test]
    fn test_drop_finalizes_the_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        {
            let sink = JsonFileSink::create(&path).unwrap();
            sink.handle(&entry("f", "trace")).unwrap();
        }
        assert_eq!(read_entries(&path).len(), 1);
    }
}
