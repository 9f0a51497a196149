//! Error types for manga-import
//!
//! Failures are scoped to the smallest unit that can fail. The orchestrator
//! turns an [`ImportError`] into a persisted `failed` status for one volume or
//! one batch and keeps the pass going; only infrastructure errors (database,
//! configuration) surface to the caller of a pass.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for manga-import operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for manga-import
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "IMPORT_INTERVAL")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Import pipeline error (extraction, detection, copying)
    #[error("import error: {0}")]
    Import(#[from] ImportError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Record not found
    #[error("record not found: {0}")]
    NotFound(String),
}

/// Errors raised while turning a completed download into library volumes
#[derive(Debug, Error)]
pub enum ImportError {
    /// File has an archive-looking name but no extractor handles it
    #[error("unsupported archive format: {path}")]
    UnsupportedFormat {
        /// The file that could not be handled
        path: PathBuf,
    },

    /// Archive extraction failed (corrupt archive, non-zero archiver exit, ...)
    #[error("extraction failed for {archive}: {reason}")]
    ExtractionFailed {
        /// The archive file that failed to extract
        archive: PathBuf,
        /// The reason extraction failed
        reason: String,
    },

    /// The external archiver did not finish within the configured timeout
    #[error("extraction of {archive} timed out after {}s", timeout.as_secs())]
    ArchiverTimeout {
        /// The archive being extracted
        archive: PathBuf,
        /// The timeout that elapsed
        timeout: Duration,
    },

    /// Neither an archiver binary nor an in-process decoder could run
    #[error("no archiver available for {archive}: {reason}")]
    ArchiverUnavailable {
        /// The archive that could not be extracted
        archive: PathBuf,
        /// Why no backend could be used
        reason: String,
    },

    /// The download tree contains no folder with page images
    #[error("no volume folders detected under {path}")]
    NoVolumeFoldersDetected {
        /// Root of the scanned tree
        path: PathBuf,
    },

    /// A volume folder contained no usable page images
    #[error("no image files found in {path}")]
    NoImageFiles {
        /// The volume source folder
        path: PathBuf,
    },

    /// Several folders had no recognizable volume number next to resolved ones
    #[error("{} folder(s) have no recognizable volume number", folders.len())]
    AmbiguousVolumeNumbers {
        /// The folders that were skipped
        folders: Vec<PathBuf>,
    },
}

impl Error {
    /// Build a configuration error tied to a specific key
    pub fn config(message: impl Into<String>, key: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Whether this error is scoped to a single download or volume rather than
    /// the infrastructure the pass runs on
    pub fn is_import_failure(&self) -> bool {
        matches!(self, Error::Import(_) | Error::Io(_))
    }
}
