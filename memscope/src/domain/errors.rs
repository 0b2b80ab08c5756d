//! Structured error types for memscope
//!
//! Using thiserror for automatic Display implementation and error chaining.

use std::path::PathBuf;
use thiserror::Error;

/// Source rewriting failures.
///
/// Carries enough position detail to log a useful diagnostic; for module
/// loads the host falls back to the untransformed source, for the entry
/// script the failure is fatal.
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Syntax error in {path}: line {line}, column {column}: {message}")]
    Parse { path: PathBuf, line: u32, column: u32, message: String },

    #[error("{path} already binds the probe alias `{alias}` to something else")]
    AliasConflict { path: PathBuf, alias: String },
}

/// Persistence backend failures.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Sink is closed")]
    Closed,

    #[error("Sink lock poisoned by a panicked writer")]
    Poisoned,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

/// Failures preparing or tearing down a script run.
#[derive(Error, Debug)]
pub enum HostError {
    #[error("Failed to resolve entry script {path}: {source}")]
    ResolveEntry {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read entry script {path}: {source}")]
    ReadEntry {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to switch working directory to {path}: {source}")]
    Chdir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Transform(#[from] TransformError),
}

/// Failures loading persisted entries or writing a rendered report.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Cannot tell the format of {path}: expected a .json or .db/.sqlite file")]
    UnknownFormat { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_parse_error_display() {
        let err = TransformError::Parse {
            path: PathBuf::from("demo.mss"),
            line: 4,
            column: 9,
            message: "expected `;`".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("demo.mss"));
        assert!(text.contains("line 4"));
        assert!(text.contains("expected `;`"));
    }

    #[test]
    fn test_sink_closed_display() {
        assert_eq!(SinkError::Closed.to_string(), "Sink is closed");
    }
}
