//! Error taxonomy for step extraction.
//!
//! Every failure is a condition the user can fix by choosing another file,
//! so nothing here is retried or recovered internally. The host collapses
//! all kinds into one "could not process this file" outcome, but each kind
//! stays distinct for diagnosis.

use std::io;
use std::path::PathBuf;

/// Result alias used throughout the library.
pub type Result<T, E = ExtractError> = std::result::Result<T, E>;

/// Errors produced by the extraction pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// The archive could not be opened or is not a readable ZIP file.
    #[error("cannot open '{}' as a zip archive: {source}", path.display())]
    ArchiveNotFound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The archive does not contain the requested member.
    #[error("'{entry}' was not found in the zip archive")]
    EntryNotFound { entry: String },

    /// The member uses a compression method we cannot stream.
    #[error("'{entry}' uses unsupported compression method {method}")]
    UnsupportedCompression { entry: String, method: u16 },

    /// The XML scan failed: malformed markup, empty input, bad record
    /// attributes, or corrupted entry data.
    #[error("invalid health export document: {0}")]
    InvalidDocument(String),

    /// No step-count records remained after date filtering.
    #[error("no step-count records found in the health export")]
    EmptyResult,

    /// The caller cancelled the extraction while it was running.
    #[error("extraction cancelled")]
    Cancelled,
}

/// Field-less discriminant of [`ExtractError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ArchiveNotFound,
    EntryNotFound,
    UnsupportedCompression,
    InvalidDocument,
    EmptyResult,
    Cancelled,
}

impl ExtractError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExtractError::ArchiveNotFound { .. } => ErrorKind::ArchiveNotFound,
            ExtractError::EntryNotFound { .. } => ErrorKind::EntryNotFound,
            ExtractError::UnsupportedCompression { .. } => ErrorKind::UnsupportedCompression,
            ExtractError::InvalidDocument(_) => ErrorKind::InvalidDocument,
            ExtractError::EmptyResult => ErrorKind::EmptyResult,
            ExtractError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Map an I/O error raised while opening the archive.
    pub(crate) fn archive(path: impl Into<PathBuf>, source: io::Error) -> Self {
        if crate::io::is_cancelled(&source) {
            return ExtractError::Cancelled;
        }
        ExtractError::ArchiveNotFound {
            path: path.into(),
            source,
        }
    }

    /// Map an I/O error raised while streaming the entry data.
    pub(crate) fn stream(source: &io::Error) -> Self {
        if crate::io::is_cancelled(source) {
            return ExtractError::Cancelled;
        }
        ExtractError::InvalidDocument(source.to_string())
    }
}
