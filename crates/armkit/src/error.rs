//! Error types for resource provider operations.
//!
//! Errors are categorized so callers can decide whether an operation is
//! worth retrying. Every variant carries the identifier or operation needed
//! to diagnose the failure without extra logging.

use std::fmt;

/// Result type alias for provider operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of provider errors for retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Network failure, throttling or server-side error (transient, retryable).
    Transient,
    /// The resource vanished or never existed.
    NotFound,
    /// A resource identifier could not be parsed.
    Identifier,
    /// The caller cancelled the operation or its deadline passed.
    Cancelled,
    /// The provider rejected the request (auth, validation, conflict).
    Rejected,
    /// Other/unknown errors.
    Other,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Transient => "Transient provider failure",
            Self::NotFound => "Resource not found",
            Self::Identifier => "Malformed resource identifier",
            Self::Cancelled => "Operation cancelled",
            Self::Rejected => "Request rejected by provider",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Transient => "Check connectivity or wait for throttling to clear, then retry",
            Self::NotFound => "The resource may have been deleted since the scan; rescan and retry",
            Self::Identifier => "Check that the id has the form subscriptions/../resourceGroups/../providers/..",
            Self::Cancelled => "Increase --timeout or rerun the command",
            Self::Rejected => "Check the access token, subscription and permissions",
            Self::Other => "Check the error details for more information",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while talking to a resource provider.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Network error, rate limiting or a 5xx response.
    #[error("transient failure during {operation}: {message}")]
    Transient {
        /// Operation that failed (e.g. `list resources in rg-app`).
        operation: String,
        /// Underlying message.
        message: String,
        /// HTTP status code if one was received.
        status: Option<u16>,
    },

    /// Resource does not exist (anymore).
    #[error("resource not found: {id}")]
    NotFound {
        /// Identifier that could not be found.
        id: String,
    },

    /// Identifier does not follow the resource ID grammar.
    #[error("malformed resource identifier: {id}")]
    MalformedIdentifier {
        /// The offending identifier.
        id: String,
    },

    /// Provider answered with a non-retryable error status.
    #[error("{operation} rejected with HTTP {status}")]
    Http {
        /// Operation that was rejected.
        operation: String,
        /// HTTP status code.
        status: u16,
    },

    /// Response body could not be decoded.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    /// Caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,

    /// The call context deadline passed.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// Generic error.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a transient error without a status code.
    pub fn transient(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transient {
            operation: operation.into(),
            message: message.into(),
            status: None,
        }
    }

    /// Create a not-found error.
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Classify an HTTP status code returned for `operation` on `id`.
    pub fn from_status(status: u16, operation: &str, id: Option<&str>) -> Self {
        match status {
            404 => Self::NotFound {
                id: id.unwrap_or(operation).to_string(),
            },
            408 | 429 | 500..=599 => Self::Transient {
                operation: operation.to_string(),
                message: format!("HTTP {status}"),
                status: Some(status),
            },
            _ => Self::Http {
                operation: operation.to_string(),
                status,
            },
        }
    }

    /// Get the error category for retry logic.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Transient { .. } => ErrorCategory::Transient,
            Error::NotFound { .. } => ErrorCategory::NotFound,
            Error::MalformedIdentifier { .. } => ErrorCategory::Identifier,
            Error::Http { .. } => ErrorCategory::Rejected,
            Error::Cancelled | Error::DeadlineExceeded => ErrorCategory::Cancelled,
            Error::InvalidResponse(_) | Error::Other(_) => ErrorCategory::Other,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Whether this error means the resource is gone.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category_retryable() {
        assert!(ErrorCategory::Transient.is_retryable());
        assert!(!ErrorCategory::NotFound.is_retryable());
        assert!(!ErrorCategory::Identifier.is_retryable());
        assert!(!ErrorCategory::Cancelled.is_retryable());
        assert!(!ErrorCategory::Rejected.is_retryable());
        assert!(!ErrorCategory::Other.is_retryable());
    }

    #[test]
    fn test_from_status_classification() {
        assert!(matches!(
            Error::from_status(404, "get", Some("/subscriptions/s/x")),
            Error::NotFound { id } if id == "/subscriptions/s/x"
        ));
        assert!(Error::from_status(429, "list groups", None).is_retryable());
        assert!(Error::from_status(503, "list groups", None).is_retryable());
        assert!(Error::from_status(408, "list groups", None).is_retryable());

        let forbidden = Error::from_status(403, "update tags", Some("id"));
        assert_eq!(forbidden.category(), ErrorCategory::Rejected);
        assert!(!forbidden.is_retryable());
    }

    #[test]
    fn test_cancellation_is_not_retryable() {
        assert_eq!(Error::Cancelled.category(), ErrorCategory::Cancelled);
        assert_eq!(Error::DeadlineExceeded.category(), ErrorCategory::Cancelled);
        assert!(!Error::DeadlineExceeded.is_retryable());
    }

    #[test]
    fn test_error_display_carries_context() {
        let err = Error::transient("list resources in rg-app", "connection reset");
        let display = err.to_string();
        assert!(display.contains("rg-app"));
        assert!(display.contains("connection reset"));
    }

    #[test]
    fn test_error_category_display() {
        let display = format!("{}", ErrorCategory::Transient);
        assert!(display.contains("Transient"));
    }
}
