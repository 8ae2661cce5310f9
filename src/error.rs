//! Error handling for the C-Measure client
//!
//! This module defines the error taxonomy shared by the backend seam, the
//! session state machines and the host binary, plus a Result alias.
//!
//! Errors fall into four families:
//!
//! - **Transient network**: [`PanelError::Transport`] and
//!   [`PanelError::HttpStatus`]. Surfaced as notifications and retried only
//!   by the next scheduled poll.
//! - **Validation**: [`PanelError::Validation`]. Raised before any request
//!   is made.
//! - **Workflow conflict**: [`PanelError::WorkflowConflict`]. Raised when an
//!   action is attempted while its control is disabled.
//! - **Startup**: [`PanelError::Startup`]. Fatal to a session.

use thiserror::Error;

/// Reason the backend asked for an explicit confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmReason {
    /// The imported file belongs to a different system serial
    SerialMismatch,
    /// A calibration already exists and would be overwritten
    Overwrite,
    /// The backend did not say
    Unspecified,
}

impl ConfirmReason {
    /// Parse the backend's `reason` field
    pub fn from_wire(reason: Option<&str>) -> Self {
        match reason {
            Some("serial") => ConfirmReason::SerialMismatch,
            Some("overwrite") => ConfirmReason::Overwrite,
            _ => ConfirmReason::Unspecified,
        }
    }
}

impl std::fmt::Display for ConfirmReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfirmReason::SerialMismatch => write!(f, "serial mismatch"),
            ConfirmReason::Overwrite => write!(f, "calibration exists"),
            ConfirmReason::Unspecified => write!(f, "confirmation required"),
        }
    }
}

/// Main error type for C-Measure client operations
#[derive(Error, Debug)]
pub enum PanelError {
    /// The request could not be sent or its body could not be read
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The backend answered with a non-2xx status
    #[error("Request failed: {status} ({path})")]
    HttpStatus { path: String, status: u16 },

    /// Operator input did not validate; no request was made
    #[error("Validation error: {0}")]
    Validation(String),

    /// Action attempted while the same action is still in flight
    #[error("Action already in progress: {0}")]
    WorkflowConflict(String),

    /// Backend requires the operator to confirm before proceeding
    #[error("Confirmation required: {reason}")]
    ConfirmationRequired { reason: ConfirmReason },

    /// Backend unreachable while starting a session
    #[error("Startup failed: {0}")]
    Startup(String),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors related to channel communication
    #[error("Channel error: {0}")]
    Channel(String),

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
        source: Box<PanelError>,
    },
}

impl PanelError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        PanelError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Whether the next scheduled poll may succeed where this one failed
    pub fn is_transient(&self) -> bool {
        match self {
            PanelError::Transport(_) | PanelError::HttpStatus { .. } => true,
            PanelError::WithContext { source, .. } => source.is_transient(),
            _ => false,
        }
    }

    /// Whether this error was raised before reaching the backend
    pub fn is_validation(&self) -> bool {
        match self {
            PanelError::Validation(_) => true,
            PanelError::WithContext { source, .. } => source.is_validation(),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for PanelError {
    fn from(err: serde_json::Error) -> Self {
        PanelError::Serialization(err.to_string())
    }
}

/// Result type alias for C-Measure client operations
pub type Result<T> = std::result::Result<T, PanelError>;

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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PanelError::Validation("Enter a valid gain weight".to_string());
        assert_eq!(err.to_string(), "Validation error: Enter a valid gain weight");
    }

    #[test]
    fn test_http_status_display() {
        let err = PanelError::HttpStatus {
            path: "/api/status".to_string(),
            status: 503,
        };
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("/api/status"));
    }

    #[test]
    fn test_error_with_context() {
        let err = PanelError::HttpStatus {
            path: "/api/measurements".to_string(),
            status: 500,
        };
        let with_ctx = err.with_context("Failed to refresh measurements");
        assert!(with_ctx.to_string().contains("Failed to refresh measurements"));
        assert!(with_ctx.is_transient());
    }

    #[test]
    fn test_classification() {
        assert!(PanelError::Validation("x".into()).is_validation());
        assert!(!PanelError::Validation("x".into()).is_transient());
        assert!(!PanelError::Startup("down".into()).is_transient());
    }

    #[test]
    fn test_confirm_reason_from_wire() {
        assert_eq!(ConfirmReason::from_wire(Some("serial")), ConfirmReason::SerialMismatch);
        assert_eq!(ConfirmReason::from_wire(Some("overwrite")), ConfirmReason::Overwrite);
        assert_eq!(ConfirmReason::from_wire(None), ConfirmReason::Unspecified);
    }
}
