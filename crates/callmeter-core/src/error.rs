//! Shared error type across callmeter crates.

use thiserror::Error;

/// Stable error codes (safe to match on or export as a label).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// An operation was declared incorrectly (bad tags, bad percentiles, bad config).
    Configuration,
    /// The registry refused to create or look up an instrument.
    Registration,
    /// An instrument refused a sample.
    Record,
    /// Unsupported configuration version.
    UnsupportedVersion,
    /// Internal failure.
    Internal,
}

impl ErrorCode {
    /// String representation used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Configuration => "CONFIGURATION",
            ErrorCode::Registration => "REGISTRATION",
            ErrorCode::Record => "RECORD",
            ErrorCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, CallMeterError>;

/// Unified error type used by core, engine, and registries.
///
/// Only `Configuration` and `UnsupportedVersion` ever reach a caller of the
/// engine, and only at wiring time. `Registration` and `Record` are produced by
/// registries and are always discarded on the call path.
#[derive(Debug, Error)]
pub enum CallMeterError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("registration failed: {0}")]
    Registration(String),
    #[error("record failed: {0}")]
    Record(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("internal: {0}")]
    Internal(String),
}

impl CallMeterError {
    /// Map the error to its stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            CallMeterError::Configuration(_) => ErrorCode::Configuration,
            CallMeterError::Registration(_) => ErrorCode::Registration,
            CallMeterError::Record(_) => ErrorCode::Record,
            CallMeterError::UnsupportedVersion => ErrorCode::UnsupportedVersion,
            CallMeterError::Internal(_) => ErrorCode::Internal,
        }
    }
}
