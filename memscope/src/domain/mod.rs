//! Domain model for memscope
//!
//! Core data types and errors shared by the transform, probe, pipeline and
//! sink layers.

pub mod entry;
pub mod errors;

pub use entry::{hash_log, ProfileEntry};
pub use errors::{HostError, ReportError, SinkError, TransformError};
