//! Unified error hierarchy for athlete-monitor
//!
//! The analytics core is total over validated input: insufficient or
//! degenerate data yields `None` or a neutral value, never an error. The
//! types below are raised at the boundaries only (record construction,
//! date windows, configuration, storage and import).

use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for all athlete-monitor operations
#[derive(Debug, Error)]
pub enum AthleteMonitorError {
    /// Record or window validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Calculation errors
    #[error("Calculation error: {0}")]
    Calculation(#[from] CalculationError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Record store errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// CSV import errors
    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Input validation errors raised when constructing records or windows
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A rating fell outside its declared range
    #[error("{field} out of range: {value} (expected {min}..={max})")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// Training duration must be strictly positive
    #[error("Training duration must be positive, got {minutes} minutes")]
    NonPositiveDuration { minutes: f64 },

    /// A value was NaN or infinite
    #[error("{field} is not a finite number")]
    NotFinite { field: &'static str },

    /// Start date after end date
    #[error("Invalid date range: {start} is after {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    /// Analysis window longer than the supported maximum
    #[error("Window of {days} days exceeds the maximum of {max} days")]
    WindowTooLong { days: u64, max: u32 },
}

/// Calculation errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalculationError {
    /// Fewer observations than the calculation's floor
    #[error("Insufficient data for {calculation}: need {required}, got {available}")]
    InsufficientData {
        calculation: String,
        required: usize,
        available: usize,
    },
}

/// Record store errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StorageError {
    /// Record kind does not match the requested collection
    #[error("Record kind mismatch: expected {expected}, got {actual}")]
    KindMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// Unknown user
    #[error("Unknown user: {user_id}")]
    UnknownUser { user_id: String },

    /// Backend failure
    #[error("Store unavailable: {reason}")]
    Unavailable { reason: String },
}

/// CSV import errors
#[derive(Debug, Error)]
pub enum ImportError {
    /// File not found at specified path
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    /// CSV reader failure
    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// Required column missing from header
    #[error("Missing required column '{column}' in {path}")]
    MissingColumn { path: PathBuf, column: String },

    /// Unparseable date cell
    #[error("Unable to parse date: {value}")]
    InvalidDate { value: String },
}

/// Result type alias for athlete-monitor operations
pub type Result<T> = std::result::Result<T, AthleteMonitorError>;

impl AthleteMonitorError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AthleteMonitorError::Storage(StorageError::Unavailable { .. })
                | AthleteMonitorError::Io(_)
        )
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            AthleteMonitorError::Validation(_) => ErrorSeverity::Warning,
            AthleteMonitorError::Calculation(CalculationError::InsufficientData { .. }) => {
                ErrorSeverity::Info
            }
            AthleteMonitorError::Import(ImportError::InvalidDate { .. }) => ErrorSeverity::Warning,
            AthleteMonitorError::Storage(StorageError::Unavailable { .. }) => {
                ErrorSeverity::Critical
            }
            _ => ErrorSeverity::Error,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            AthleteMonitorError::Validation(ValidationError::OutOfRange {
                field, min, max, ..
            }) => {
                format!("Please enter a value for {} between {} and {}.", field, min, max)
            }
            AthleteMonitorError::Calculation(CalculationError::InsufficientData {
                calculation,
                ..
            }) => {
                format!(
                    "Not enough data yet to calculate {}. Keep logging daily.",
                    calculation
                )
            }
            AthleteMonitorError::Import(ImportError::FileNotFound { path }) => {
                format!("Could not find data file: {}", path.display())
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
