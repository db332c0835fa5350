//! Typed error model for the ingestion pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Broad failure class, used by embedding jobs to decide what to do with a
/// failed import.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Required setting missing or malformed. Fatal at construction time.
    Config,
    /// A record could not be converted to a document shape.
    Conversion,
    /// The store reported a failed create/upsert at a batch boundary.
    Write,
    /// Host-side plumbing failure (task join, panic).
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config => write!(f, "config"),
            Self::Conversion => write!(f, "conversion"),
            Self::Write => write!(f, "write"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

/// Pipeline error with a stable machine-readable code.
///
/// `retryable` is a hint for the embedding job: the pipeline itself never
/// retries (throttle retry lives in the transport), but a transient write
/// failure is safe to replay under upsert semantics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SinkError {
    pub category: ErrorCategory,
    pub code: String,
    pub message: String,
    pub retryable: bool,
}

impl SinkError {
    /// Configuration error (not retryable).
    pub fn config(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            category: ErrorCategory::Config,
            code: code.into(),
            message: message.into(),
            retryable: false,
        }
    }

    /// Record conversion error (not retryable).
    pub fn conversion(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            category: ErrorCategory::Conversion,
            code: code.into(),
            message: message.into(),
            retryable: false,
        }
    }

    /// Write failure surfaced at a batch boundary.
    pub fn write(code: impl Into<String>, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            category: ErrorCategory::Write,
            code: code.into(),
            message: message.into(),
            retryable,
        }
    }

    /// Internal error (not retryable).
    pub fn internal(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            category: ErrorCategory::Internal,
            code: code.into(),
            message: message.into(),
            retryable: false,
        }
    }
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({}): {}",
            self.category,
            self.code,
            if self.retryable { "retryable" } else { "fatal" },
            self.message
        )
    }
}

impl std::error::Error for SinkError {}
