//! Unified error type for Tracedex.
//!
//! Wraps the layer errors and presents the handful of cases a caller
//! actually distinguishes.

use thiserror::Error;

/// All Tracedex errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Trace file missing or nothing loaded
    #[error("not found: {0}")]
    NotFound(String),

    /// Not a trace file
    #[error("invalid trace: {0}")]
    InvalidFormat(String),

    /// Trace written by a newer format version
    #[error("unsupported format version {found} (supported up to {supported})")]
    UnsupportedVersion {
        /// Version in the file header
        found: u16,
        /// Newest version this build reads
        supported: u16,
    },

    /// Damaged call data
    #[error("corrupt trace: {0}")]
    Corruption(String),

    /// Frame or call query past the end
    #[error("out of range: {0}")]
    OutOfRange(String),

    /// Operation cancelled
    #[error("cancelled")]
    Cancelled,

    /// Operation the trace cannot support
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for Tracedex operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Check if the trace could not be opened at all.
    pub fn is_open_failure(&self) -> bool {
        matches!(
            self,
            Error::NotFound(_) | Error::InvalidFormat(_) | Error::UnsupportedVersion { .. } | Error::Io(_)
        )
    }

    /// Check if this is a corruption error.
    pub fn is_corruption(&self) -> bool {
        matches!(self, Error::Corruption(_))
    }

    /// Check if the operation was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

// Convert from layer errors
impl From<tracedex_core::Error> for Error {
    fn from(e: tracedex_core::Error) -> Self {
        use tracedex_core::Error as CoreError;
        match e {
            CoreError::NotFound(msg) => Error::NotFound(msg),
            CoreError::InvalidFormat(msg) => Error::InvalidFormat(msg),
            CoreError::UnsupportedVersion { found, supported } => Error::UnsupportedVersion { found, supported },
            CoreError::Io(io_err) => Error::Io(io_err),
            e @ CoreError::Corruption { .. } => Error::Corruption(e.to_string()),
            e @ CoreError::UnexpectedEof { .. } => Error::Corruption(e.to_string()),
            e @ CoreError::IndexOutOfRange { .. } => Error::OutOfRange(e.to_string()),
            CoreError::Cancelled => Error::Cancelled,
            CoreError::Unsupported(msg) => Error::Unsupported(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_errors_map() {
        let e: Error = tracedex_core::Error::frame_out_of_range(12, 10).into();
        assert_eq!(e.to_string(), "out of range: frame 12 out of range (count is 10)");

        let e: Error = tracedex_core::Error::corruption(64, "checksum mismatch").into();
        assert!(e.is_corruption());

        let e: Error = tracedex_core::Error::UnsupportedVersion { found: 9, supported: 1 }.into();
        assert!(e.is_open_failure());
        assert!(!e.is_not_found());

        let e: Error = tracedex_core::Error::Cancelled.into();
        assert!(e.is_cancelled());
    }
}
