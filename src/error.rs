//! # Error Handling
//!
//! Error taxonomy for viewport comparison runs, with context and
//! classification traits.
//!
//! ## Error Kinds
//!
//! - **Precondition errors** (`InvalidDimension`, `DegenerateViewport`, `Config`):
//!   raised before any page session is touched; never retried.
//! - **Run errors** (`CaptureFailure`, `SessionInit`, `Cancelled`): a page
//!   session failed or the caller aborted. The whole run is discarded; callers
//!   retry the entire run, not a single tile.
//! - **Output errors** (`Io`, `External`): writing or encoding a report.
//!
//! A capture that cannot be decoded is *not* an error: the tile is kept with an
//! undefined similarity score.
//!
//! ## Usage
//!
//! ```rust
//! use viewport_compare::error::{CompareError, Retryable};
//!
//! let error = CompareError::capture_failure(900, "second", anyhow::anyhow!("tab crashed"))
//!     .with_context("scrolling before capture")
//!     .with_recovery_suggestion("Re-run the comparison; the page may have been reloading");
//!
//! assert!(error.is_retryable());
//! assert_eq!(error.offset(), Some(900));
//! ```

use std::{error::Error as StdError, fmt, time::SystemTime};

/// Severity levels for errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Warnings that may indicate potential issues
    Warning,
    /// Errors that abort the current run but leave the process usable
    Error,
    /// Fatal errors that cannot be recovered from
    Fatal,
}

/// Metadata about when and where an error occurred
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// When the error occurred
    pub timestamp: SystemTime,
    /// The operation being performed when the error occurred
    pub operation: Option<String>,
    /// Additional context about the error
    pub context: Option<String>,
    /// Suggested recovery action
    pub recovery_suggestion: Option<String>,
    /// Error severity level
    pub severity: ErrorSeverity,
    /// Whether this error is retryable regardless of its kind
    pub retryable: bool,
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self {
            timestamp: SystemTime::now(),
            operation: None,
            context: None,
            recovery_suggestion: None,
            severity: ErrorSeverity::Error,
            retryable: false,
        }
    }
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }
}

/// Base error type for comparison runs
#[derive(Debug)]
pub enum CompareError {
    /// A page height or viewport dimension was not positive
    InvalidDimension {
        field: String,
        value: u32,
        context: ErrorContext,
    },
    /// Viewport too short to produce a positive scroll step
    DegenerateViewport {
        viewport_height: u32,
        context: ErrorContext,
    },
    /// A page session failed to scroll, measure or capture mid-run
    CaptureFailure {
        offset: u32,
        session: String,
        cause: Box<dyn StdError + Send + Sync>,
        context: ErrorContext,
    },
    /// The run was aborted between tiles
    Cancelled {
        completed_tiles: usize,
        context: ErrorContext,
    },
    /// Configuration validation errors
    Config {
        field: String,
        value: String,
        reason: String,
        context: ErrorContext,
    },
    /// A page session could not be opened
    SessionInit {
        session: String,
        reason: String,
        context: ErrorContext,
    },
    /// I/O errors
    Io {
        operation: String,
        path: Option<String>,
        source: std::io::Error,
        context: ErrorContext,
    },
    /// External library errors
    External {
        library: String,
        source: Box<dyn StdError + Send + Sync>,
        context: ErrorContext,
    },
}

impl CompareError {
    /// Create an invalid dimension error
    pub fn invalid_dimension(field: impl Into<String>, value: u32) -> Self {
        Self::InvalidDimension {
            field: field.into(),
            value,
            context: ErrorContext::new().with_severity(ErrorSeverity::Fatal),
        }
    }

    /// Create a degenerate viewport error
    pub fn degenerate_viewport(viewport_height: u32) -> Self {
        Self::DegenerateViewport {
            viewport_height,
            context: ErrorContext::new().with_severity(ErrorSeverity::Fatal),
        }
    }

    /// Create a capture failure at `offset` for the named session
    pub fn capture_failure(
        offset: u32,
        session: impl Into<String>,
        cause: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Self::CaptureFailure {
            offset,
            session: session.into(),
            cause: cause.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a cancellation error
    pub fn cancelled(completed_tiles: usize) -> Self {
        Self::Cancelled {
            completed_tiles,
            context: ErrorContext::new().with_severity(ErrorSeverity::Warning),
        }
    }

    /// Create a configuration error
    pub fn config(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Config {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
            context: ErrorContext::new().with_severity(ErrorSeverity::Fatal),
        }
    }

    /// Create a session initialization error
    pub fn session_init(session: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SessionInit {
            session: session.into(),
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create an I/O error
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            path: None,
            source,
            context: ErrorContext::new(),
        }
    }

    /// Create an I/O error tied to a path
    pub fn io_at(
        operation: impl Into<String>,
        path: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Self::Io {
            operation: operation.into(),
            path: Some(path.into()),
            source,
            context: ErrorContext::new(),
        }
    }

    /// Create an external library error
    pub fn external(
        library: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            library: library.into(),
            source: Box::new(source),
            context: ErrorContext::new(),
        }
    }

    /// Add context to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context_mut().context = Some(context.into());
        self
    }

    /// Add operation context
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.context_mut().operation = Some(operation.into());
        self
    }

    /// Add recovery suggestion
    pub fn with_recovery_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.context_mut().recovery_suggestion = Some(suggestion.into());
        self
    }

    /// Mark as retryable
    pub fn retryable(mut self) -> Self {
        self.context_mut().retryable = true;
        self
    }

    /// Scroll offset the error is tied to, if any.
    pub fn offset(&self) -> Option<u32> {
        match self {
            Self::CaptureFailure { offset, .. } => Some(*offset),
            _ => None,
        }
    }

    /// Get the error context
    pub fn context(&self) -> &ErrorContext {
        match self {
            Self::InvalidDimension { context, .. } => context,
            Self::DegenerateViewport { context, .. } => context,
            Self::CaptureFailure { context, .. } => context,
            Self::Cancelled { context, .. } => context,
            Self::Config { context, .. } => context,
            Self::SessionInit { context, .. } => context,
            Self::Io { context, .. } => context,
            Self::External { context, .. } => context,
        }
    }

    fn context_mut(&mut self) -> &mut ErrorContext {
        match self {
            Self::InvalidDimension { context, .. } => context,
            Self::DegenerateViewport { context, .. } => context,
            Self::CaptureFailure { context, .. } => context,
            Self::Cancelled { context, .. } => context,
            Self::Config { context, .. } => context,
            Self::SessionInit { context, .. } => context,
            Self::Io { context, .. } => context,
            Self::External { context, .. } => context,
        }
    }

    /// Get the error category as a string
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidDimension { .. } => "invalid_dimension",
            Self::DegenerateViewport { .. } => "degenerate_viewport",
            Self::CaptureFailure { .. } => "capture_failure",
            Self::Cancelled { .. } => "cancelled",
            Self::Config { .. } => "config",
            Self::SessionInit { .. } => "session_init",
            Self::Io { .. } => "io",
            Self::External { .. } => "external",
        }
    }
}

impl fmt::Display for CompareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompareError::InvalidDimension { field, value, .. } => {
                write!(f, "Invalid dimension '{}': {} (must be positive)", field, value)
            }
            CompareError::DegenerateViewport {
                viewport_height, ..
            } => {
                write!(
                    f,
                    "Viewport height {}px is too small to scroll in half-viewport steps",
                    viewport_height
                )
            }
            CompareError::CaptureFailure {
                offset,
                session,
                cause,
                ..
            } => {
                write!(
                    f,
                    "Capture failed on {} page at scroll offset {}px: {}",
                    session, offset, cause
                )
            }
            CompareError::Cancelled {
                completed_tiles, ..
            } => {
                write!(f, "Run cancelled after {} tile(s)", completed_tiles)
            }
            CompareError::Config {
                field,
                value,
                reason,
                ..
            } => {
                write!(
                    f,
                    "Configuration error in '{}': {} (value: {})",
                    field, reason, value
                )
            }
            CompareError::SessionInit {
                session, reason, ..
            } => {
                write!(f, "Failed to open {} page session: {}", session, reason)
            }
            CompareError::Io {
                operation,
                path,
                source,
                ..
            } => {
                if let Some(path) = path {
                    write!(
                        f,
                        "I/O error during {} on '{}': {}",
                        operation, path, source
                    )
                } else {
                    write!(f, "I/O error during {}: {}", operation, source)
                }
            }
            CompareError::External {
                library, source, ..
            } => {
                write!(f, "External library error in {}: {}", library, source)
            }
        }
    }
}

impl StdError for CompareError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::CaptureFailure { cause, .. } => Some(cause.as_ref()),
            Self::Io { source, .. } => Some(source),
            Self::External { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// Result type alias using our custom error type
pub type CompareResult<T> = Result<T, CompareError>;

/// Trait for errors that can be retried
///
/// A retry always means re-running the whole comparison.
pub trait Retryable {
    /// Check if this error can be retried
    fn is_retryable(&self) -> bool;
}

impl Retryable for CompareError {
    fn is_retryable(&self) -> bool {
        self.context().retryable
            || matches!(
                self,
                Self::CaptureFailure { .. } | Self::SessionInit { .. } | Self::Io { .. }
            )
    }
}

/// Trait for errors with severity levels
pub trait HasSeverity {
    /// Get the severity level of this error
    fn severity(&self) -> ErrorSeverity;
}

impl HasSeverity for CompareError {
    fn severity(&self) -> ErrorSeverity {
        self.context().severity
    }
}

/// Trait for errors that provide recovery suggestions
pub trait HasRecoverySuggestion {
    /// Get recovery suggestion for this error
    fn recovery_suggestion(&self) -> Option<&str>;
}

impl HasRecoverySuggestion for CompareError {
    fn recovery_suggestion(&self) -> Option<&str> {
        self.context().recovery_suggestion.as_deref()
    }
}

/// Error classification utilities
pub mod classify {
    use super::*;

    /// Precondition violations: fix the input, retrying will not help.
    pub fn is_fatal(error: &CompareError) -> bool {
        matches!(
            error,
            CompareError::InvalidDimension { .. }
                | CompareError::DegenerateViewport { .. }
                | CompareError::Config { .. }
        ) || error.severity() == ErrorSeverity::Fatal
    }

    /// Failures of the browser side that may not happen on the next run.
    pub fn is_transient(error: &CompareError) -> bool {
        matches!(
            error,
            CompareError::CaptureFailure { .. } | CompareError::SessionInit { .. }
        )
    }

    /// Caller-initiated aborts.
    pub fn is_cancellation(error: &CompareError) -> bool {
        matches!(error, CompareError::Cancelled { .. })
    }

    /// Process exit code for the command-line front end.
    pub fn exit_code(error: &CompareError) -> i32 {
        match error {
            CompareError::InvalidDimension { .. }
            | CompareError::DegenerateViewport { .. }
            | CompareError::Config { .. } => 2,
            CompareError::Cancelled { .. } => 130,
            _ => 1,
        }
    }
}

impl From<std::io::Error> for CompareError {
    fn from(error: std::io::Error) -> Self {
        Self::io("unknown", error)
    }
}

impl From<serde_json::Error> for CompareError {
    fn from(error: serde_json::Error) -> Self {
        Self::external("serde_json", error)
    }
}

impl From<image::ImageError> for CompareError {
    fn from(error: image::ImageError) -> Self {
        Self::external("image", error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precondition_errors_are_fatal() {
        let error = CompareError::invalid_dimension("height1", 0);
        assert_eq!(error.category(), "invalid_dimension");
        assert!(classify::is_fatal(&error));
        assert!(!error.is_retryable());

        let error = CompareError::degenerate_viewport(1);
        assert!(classify::is_fatal(&error));
        assert_eq!(classify::exit_code(&error), 2);
    }

    #[test]
    fn test_capture_failure_carries_offset_and_cause() {
        let error = CompareError::capture_failure(600, "first", anyhow::anyhow!("disconnected"));
        assert_eq!(error.offset(), Some(600));
        assert!(error.is_retryable());
        assert!(classify::is_transient(&error));

        let source = error.source().expect("cause is exposed as source");
        assert_eq!(source.to_string(), "disconnected");
        assert!(error.to_string().contains("600px"));
    }

    #[test]
    fn test_error_with_context() {
        let error = CompareError::config("settle_ms", "99999", "must be at most 60000")
            .with_operation("validate")
            .with_recovery_suggestion("use a shorter settle delay");

        assert_eq!(error.context().operation.as_deref(), Some("validate"));
        assert_eq!(error.recovery_suggestion(), Some("use a shorter settle delay"));
        assert_eq!(error.category(), "config");
        assert_eq!(classify::exit_code(&error), 2);
    }

    #[test]
    fn test_cancellation_classification() {
        let error = CompareError::cancelled(2);
        assert!(classify::is_cancellation(&error));
        assert!(!classify::is_fatal(&error));
        assert_eq!(error.severity(), ErrorSeverity::Warning);
        assert_eq!(classify::exit_code(&error), 130);
    }
}
