// src/error.rs

use std::fmt;
use thiserror::Error;

/// Core error types for pkcore
#[derive(Error, Debug)]
pub enum Error {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Database initialization error
    #[error("Failed to initialize database: {0}")]
    InitError(String),

    /// Database not found
    #[error("Database not found at path: {0}")]
    DatabaseNotFound(String),

    /// Package id that does not split into exactly four fields
    #[error("Invalid package id: {0}")]
    InvalidPackageId(String),

    /// Malformed metadata (index files, stored JSON, timestamps)
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Named entity does not exist
    #[error("Not found: {0}")]
    NotFoundError(String),

    /// Entity already exists
    #[error("Conflict: {0}")]
    ConflictError(String),

    /// Repository cannot be read
    #[error("Repository unavailable: {0}")]
    SourceUnavailable(String),

    /// Reverse-dependency walk returned to a package already on the path
    #[error("Dependency cycle detected: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),
}

/// Result type alias using pkcore's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Failure categories reported to the host runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    LockUnavailable,
    AlreadySatisfied,
    NotFound,
    NotInstalled,
    SelfUpdateRequired,
    DependencyError,
    ConflictError,
    ResourceExhausted,
    SourceUnavailable,
    InternalError,
    TransactionFailed,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &str {
        match self {
            ErrorKind::LockUnavailable => "cannot-get-lock",
            ErrorKind::AlreadySatisfied => "package-already-installed",
            ErrorKind::NotFound => "package-not-found",
            ErrorKind::NotInstalled => "package-not-installed",
            ErrorKind::SelfUpdateRequired => "package-install-blocked",
            ErrorKind::DependencyError => "dep-resolution-failed",
            ErrorKind::ConflictError => "package-conflicts",
            ErrorKind::ResourceExhausted => "no-space-on-device",
            ErrorKind::SourceUnavailable => "repo-not-found",
            ErrorKind::InternalError => "internal-error",
            ErrorKind::TransactionFailed => "transaction-error",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error notification for the host: a category plus a human readable message
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct JobError {
    pub kind: ErrorKind,
    pub message: String,
}

impl JobError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}
