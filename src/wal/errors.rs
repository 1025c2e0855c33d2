//! WAL error types
//!
//! Error codes:
//! - AERO_WAL_DIRECTORY (FATAL severity)
//! - AERO_WAL_ROTATE_FAILED (ERROR severity)
//! - AERO_WAL_APPEND_FAILED (ERROR severity)
//! - AERO_WAL_READ_FAILED (ERROR severity)
//! - AERO_WAL_OUT_OF_RANGE (ERROR severity)
//! - AERO_WAL_GC_FAILED (ERROR severity)
//! - AERO_WAL_BATCH_TOO_LARGE (ERROR severity)

use std::fmt;
use std::io;

/// Severity levels for WAL errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Operation fails, engine continues
    Error,
    /// Engine cannot proceed without a recoverable WAL
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// WAL-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalErrorCode {
    /// Log directory could not be created or listed
    AeroWalDirectory,
    /// New segment could not be created during rotation
    AeroWalRotateFailed,
    /// Append to the current segment failed
    AeroWalAppendFailed,
    /// Positioned read or segment open for reading failed
    AeroWalReadFailed,
    /// Requested LSN is older than every retained segment
    AeroWalOutOfRange,
    /// Segment could not be removed during garbage collection
    AeroWalGcFailed,
    /// Batch does not fit the 32-bit header fields
    AeroWalBatchTooLarge,
}

impl WalErrorCode {
    /// Returns the stable string code
    pub fn code(&self) -> &'static str {
        match self {
            WalErrorCode::AeroWalDirectory => "AERO_WAL_DIRECTORY",
            WalErrorCode::AeroWalRotateFailed => "AERO_WAL_ROTATE_FAILED",
            WalErrorCode::AeroWalAppendFailed => "AERO_WAL_APPEND_FAILED",
            WalErrorCode::AeroWalReadFailed => "AERO_WAL_READ_FAILED",
            WalErrorCode::AeroWalOutOfRange => "AERO_WAL_OUT_OF_RANGE",
            WalErrorCode::AeroWalGcFailed => "AERO_WAL_GC_FAILED",
            WalErrorCode::AeroWalBatchTooLarge => "AERO_WAL_BATCH_TOO_LARGE",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            WalErrorCode::AeroWalDirectory => Severity::Fatal,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for WalErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// WAL error type with full context
#[derive(Debug)]
pub struct WalError {
    /// Error code
    code: WalErrorCode,
    /// Human-readable message
    message: String,
    /// Optional details about the error context
    details: Option<String>,
    /// Underlying IO error if applicable
    source: Option<io::Error>,
}

impl WalError {
    fn with_source(code: WalErrorCode, message: impl Into<String>, source: io::Error) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            source: Some(source),
        }
    }

    /// Log directory create/list failure at startup
    pub fn directory(message: impl Into<String>, source: io::Error) -> Self {
        Self::with_source(WalErrorCode::AeroWalDirectory, message, source)
    }

    /// Segment creation failed while rotating
    pub fn rotate_failed(id: u64, source: io::Error) -> Self {
        Self {
            details: Some(format!("segment: {}", id)),
            ..Self::with_source(
                WalErrorCode::AeroWalRotateFailed,
                "Failed to create WAL segment",
                source,
            )
        }
    }

    /// Append to the current segment failed
    pub fn append_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self::with_source(WalErrorCode::AeroWalAppendFailed, message, source)
    }

    /// Read from a segment failed
    pub fn read_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self::with_source(WalErrorCode::AeroWalReadFailed, message, source)
    }

    /// Read failure with a byte offset for context
    pub fn read_failed_at(id: u64, offset: u64, source: io::Error) -> Self {
        Self {
            details: Some(format!("segment: {}, byte_offset: {}", id, offset)),
            ..Self::read_failed("Failed to read WAL batch", source)
        }
    }

    /// The requested LSN is no longer (or not yet) retained
    pub fn out_of_range(lsn: u64) -> Self {
        Self {
            code: WalErrorCode::AeroWalOutOfRange,
            message: "LSN is not retained by the log".to_string(),
            details: Some(format!("lsn: {}", lsn)),
            source: None,
        }
    }

    /// Segment unlink failure during GC
    pub fn gc_failed(id: u64, source: io::Error) -> Self {
        Self {
            details: Some(format!("segment: {}", id)),
            ..Self::with_source(
                WalErrorCode::AeroWalGcFailed,
                "Failed to remove WAL segment",
                source,
            )
        }
    }

    /// Encoded size or operation count overflows the batch header
    pub fn batch_too_large(size: u64, count: u64) -> Self {
        Self {
            code: WalErrorCode::AeroWalBatchTooLarge,
            message: "WAL batch exceeds the header limits".to_string(),
            details: Some(format!("size: {}, count: {}", size, count)),
            source: None,
        }
    }

    /// Returns the error code
    pub fn code(&self) -> WalErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns additional error details
    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// Returns whether this error is fatal (requires process termination)
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for WalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        if let Some(ref source) = self.source {
            write!(f, ": {}", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for WalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for WAL operations
pub type WalResult<T> = Result<T, WalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(WalErrorCode::AeroWalDirectory.code(), "AERO_WAL_DIRECTORY");
        assert_eq!(WalErrorCode::AeroWalRotateFailed.code(), "AERO_WAL_ROTATE_FAILED");
        assert_eq!(WalErrorCode::AeroWalOutOfRange.code(), "AERO_WAL_OUT_OF_RANGE");
        assert_eq!(
            WalErrorCode::AeroWalBatchTooLarge.code(),
            "AERO_WAL_BATCH_TOO_LARGE"
        );
    }

    #[test]
    fn test_directory_failure_is_fatal() {
        let err = WalError::directory(
            "cannot list",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.is_fatal());
    }

    #[test]
    fn test_rotate_failure_is_not_fatal() {
        let err = WalError::rotate_failed(7, io::Error::new(io::ErrorKind::Other, "disk full"));
        assert!(!err.is_fatal());
        assert_eq!(err.details(), Some("segment: 7"));
    }

    #[test]
    fn test_error_display_contains_required_fields() {
        let err = WalError::out_of_range(42);
        let display = format!("{}", err);
        assert!(display.contains("AERO_WAL_OUT_OF_RANGE"));
        assert!(display.contains("ERROR"));
        assert!(display.contains("lsn: 42"));
    }

    #[test]
    fn test_source_is_exposed() {
        use std::error::Error;

        let err = WalError::gc_failed(1, io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert!(err.source().is_some());
        assert!(WalError::out_of_range(1).source().is_none());
    }
}
