//! Unified error types for sitekeep.
//!
//! Cache operations never surface these; everything else propagates them to
//! the caller, which decides how to present the failure.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

/// Unified error types for the sitekeep service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., priority out of range).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Edit target or stored entry does not exist, or the static sitemap file is missing.
    #[error("NOT_FOUND: {0}")]
    NotFound(String),

    /// The static sitemap could not be decoded.
    #[error("MALFORMED_DOCUMENT: {0}")]
    MalformedDocument(String),

    /// The external sitemap generator exited nonzero or wrote diagnostics.
    #[error("REGENERATION_FAILED: {0}")]
    RegenerationFailed(String),

    /// An entry with the same URL is already stored.
    #[error("DUPLICATE_URL: {0}")]
    DuplicateUrl(String),

    /// Database operation failed.
    #[error("STORAGE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Database failure reported by the connection layer without a typed cause.
    #[error("STORAGE_ERROR: {0}")]
    Storage(String),

    /// Migration failed to apply.
    #[error("STORAGE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Reading or writing the static sitemap file failed.
    #[error("IO_ERROR: {0}")]
    Io(String),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            other => Error::Storage(other.to_string()),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let (code, message) = match &err {
            Error::InvalidInput(msg) => (-32602, msg.clone()),
            Error::NotFound(msg) => (-32001, msg.clone()),
            Error::MalformedDocument(msg) => (-32003, msg.clone()),
            Error::RegenerationFailed(msg) => (-32004, msg.clone()),
            Error::DuplicateUrl(msg) => (-32005, msg.clone()),
            Error::Io(msg) => (-32006, msg.clone()),
            Error::Database(e) => (-32002, e.to_string()),
            Error::Storage(msg) | Error::MigrationFailed(msg) => (-32002, msg.clone()),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}
