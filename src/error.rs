//! Unified error hierarchy for ergscore
//!
//! Boundary rejections, scoring failures and store failures each get their own
//! enum; `ErgScoreError` wraps them for callers that only want one type.

use thiserror::Error;

/// Top-level error type for all ergscore operations
#[derive(Debug, Error)]
pub enum ErgScoreError {
    /// A submitted field violates the accepted boundary range
    #[error("Input range error: {0}")]
    InputRange(#[from] InputRangeError),

    /// The workout cannot be scored
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Personal-best or workout store failure
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON payload errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Boundary violations on submitted workout data.
///
/// These are rejected, never silently corrected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputRangeError {
    /// A field required at workout creation is absent
    #[error("Missing required field: {field}")]
    MissingField { field: &'static str },

    /// A numeric field is outside its accepted range
    #[error("{field}={value} is outside the accepted range {range}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        range: String,
    },

    /// The interval payload is not a JSON array
    #[error("Intervals payload must be an array, got {found}")]
    NotAnArray { found: &'static str },

    /// Too many intervals in one workout
    #[error("Too many intervals: {count} (max {max})")]
    TooManyIntervals { count: usize, max: usize },

    /// An interval element failed to parse or is out of range
    #[error("Malformed interval at index {index}: {reason}")]
    MalformedInterval { index: usize, reason: String },
}

/// Failures of the effort scoring engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A workout with no segments has no defined effort
    #[error("Workout has no intervals to score")]
    EmptyIntervals,
}

/// Personal-best and workout store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite failure
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A lock guarding store state was poisoned by a panicking writer
    #[error("Store lock poisoned: {0}")]
    Poisoned(String),

    /// A persisted row could not be decoded
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Database file or directory could not be accessed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for ergscore operations
pub type Result<T> = std::result::Result<T, ErgScoreError>;

impl ErgScoreError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErgScoreError::Store(StoreError::Sqlite(_))
                | ErgScoreError::Store(StoreError::Io(_))
                | ErgScoreError::Io(_)
        )
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ErgScoreError::InputRange(_) => ErrorSeverity::Warning,
            ErgScoreError::Validation(_) => ErrorSeverity::Warning,
            ErgScoreError::Store(StoreError::NotFound(_)) => ErrorSeverity::Warning,
            ErgScoreError::Store(StoreError::Poisoned(_)) => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            ErgScoreError::InputRange(InputRangeError::MissingField { field }) => {
                format!("Please enter a value for {}.", field)
            }
            ErgScoreError::InputRange(InputRangeError::OutOfRange { field, range, .. }) => {
                format!("{} must be within {}.", field, range)
            }
            ErgScoreError::Validation(ValidationError::EmptyIntervals) => {
                "This workout has no timed segments, so no effort can be scored.".to_string()
            }
            ErgScoreError::Store(_) => {
                "Unable to save workout data right now. Please try again.".to_string()
            }
            _ => self.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Critical system error requiring immediate attention
    Critical,
    /// Error that prevents operation but system can continue
    Error,
    /// Warning that doesn't prevent operation
    Warning,
    /// Informational message
    Info,
}

impl ErrorSeverity {
    /// Convert to tracing level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            ErrorSeverity::Critical => tracing::Level::ERROR,
            ErrorSeverity::Error => tracing::Level::ERROR,
            ErrorSeverity::Warning => tracing::Level::WARN,
            ErrorSeverity::Info => tracing::Level::INFO,
        }
    }
}
