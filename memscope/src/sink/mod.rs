//! Persistence backends for profile entries.
//!
//! Sinks are driven from the pipeline's consumer thread. Every entry is
//! durable once `handle` returns; `close` finalizes the backing store and
//! later writes fail with [`SinkError::Closed`].

pub mod json_file;
pub mod sqlite;

pub use json_file::JsonFileSink;
pub use sqlite::SqliteSink;

use crate::domain::{ProfileEntry, SinkError};

/// Where the pipeline writes entries.
pub trait ProfileSink: Send {
    fn handle(&self, entry: &ProfileEntry) -> Result<(), SinkError>;
    fn close(&self) -> Result<(), SinkError>;
}
