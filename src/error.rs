//! Error handling for agrolink
//!
//! This module defines the crate error type and a Result alias. The first
//! five variants are the failure taxonomy every subsystem reports through;
//! the rest cover configuration and storage plumbing.

use thiserror::Error;

/// Main error type for agrolink operations
#[derive(Error, Debug)]
pub enum AgrolinkError {
    /// Scan, connect, service discovery or subscription failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A frame matched none of the known reading shapes
    #[error("Parsing failed: {0}")]
    ParsingFailed(String),

    /// A required prediction input was missing
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// The scoring service could not be reached
    #[error("Network error: {0}")]
    NetworkFailed(String),

    /// The scoring service answered with a non-success status
    #[error("Service rejected request (HTTP {status}): {message}")]
    ServiceRejected { status: u16, message: String },

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors related to the persistence provider
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<AgrolinkError>,
    },
}

/// Coarse classification of an [`AgrolinkError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ConnectionFailed,
    ParsingFailed,
    ValidationFailed,
    NetworkFailed,
    ServiceRejected,
    Internal,
}

impl AgrolinkError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        AgrolinkError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Taxonomy bucket of this error, looking through context wrappers
    pub fn kind(&self) -> ErrorKind {
        match self {
            AgrolinkError::ConnectionFailed(_) => ErrorKind::ConnectionFailed,
            AgrolinkError::ParsingFailed(_) => ErrorKind::ParsingFailed,
            AgrolinkError::ValidationFailed(_) => ErrorKind::ValidationFailed,
            AgrolinkError::NetworkFailed(_) => ErrorKind::NetworkFailed,
            AgrolinkError::ServiceRejected { .. } => ErrorKind::ServiceRejected,
            AgrolinkError::WithContext { source, .. } => source.kind(),
            _ => ErrorKind::Internal,
        }
    }

    /// Short status text suitable for showing to a user
    pub fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::ConnectionFailed => "Connection Failed".to_string(),
            ErrorKind::ParsingFailed => {
                "Could not recognize the data format to send for prediction.".to_string()
            }
            ErrorKind::ValidationFailed => "Please fill all fields".to_string(),
            ErrorKind::NetworkFailed | ErrorKind::ServiceRejected => {
                "Failed to get a prediction. Please try again.".to_string()
            }
            ErrorKind::Internal => self.to_string(),
        }
    }
}

impl From<serde_json::Error> for AgrolinkError {
    fn from(err: serde_json::Error) -> Self {
        AgrolinkError::Serialization(err.to_string())
    }
}

/// Result type alias for agrolink operations
pub type Result<T> = std::result::Result<T, AgrolinkError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
