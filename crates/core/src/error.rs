//! Error types for trace loading
//!
//! One enum covers the three failure families of the loader:
//! - open failures (missing file, unrecognized format, newer version)
//! - stream damage (corrupt event, truncated stream)
//! - query failures (out of range, cancelled, unsupported capability)

use thiserror::Error;

/// Result type alias for trace operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while opening, decoding or querying a trace
#[derive(Debug, Error)]
pub enum Error {
    /// Trace file does not exist
    #[error("trace not found: {0}")]
    NotFound(String),

    /// File is not a trace, or its header is damaged
    #[error("invalid trace format: {0}")]
    InvalidFormat(String),

    /// Trace was written by a newer format revision
    #[error("unsupported trace version {found} (newest supported is {supported})")]
    UnsupportedVersion {
        /// Version found in the header
        found: u16,
        /// Newest version this build reads
        supported: u16,
    },

    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An event failed validation
    #[error("corruption at offset {offset}: {reason}")]
    Corruption {
        /// Byte offset of the damaged event
        offset: u64,
        /// What was wrong with it
        reason: String,
    },

    /// Stream ended in the middle of an event
    #[error("unexpected end of stream at offset {offset}")]
    UnexpectedEof {
        /// Byte offset of the truncated event
        offset: u64,
    },

    /// Frame or call query past the end of the index
    #[error("{what} {index} out of range (count is {len})")]
    IndexOutOfRange {
        /// Kind of thing that was looked up ("frame", "call")
        what: &'static str,
        /// Requested index
        index: u64,
        /// Number of available items
        len: u64,
    },

    /// A long-running operation observed its cancel token
    #[error("operation cancelled")]
    Cancelled,

    /// The source lacks a capability the operation needs
    #[error("unsupported operation: {0}")]
    Unsupported(String),
}

impl Error {
    /// Build a corruption error at `offset`
    pub fn corruption(offset: u64, reason: impl Into<String>) -> Self {
        Error::Corruption {
            offset,
            reason: reason.into(),
        }
    }

    /// Build an out-of-range error for a frame number
    pub fn frame_out_of_range(index: u64, len: u64) -> Self {
        Error::IndexOutOfRange {
            what: "frame",
            index,
            len,
        }
    }

    /// Build an out-of-range error for a call sequence number
    pub fn call_out_of_range(index: u64, len: u64) -> Self {
        Error::IndexOutOfRange {
            what: "call",
            index,
            len,
        }
    }

    /// True for errors that make a trace unopenable
    pub fn is_open_failure(&self) -> bool {
        matches!(
            self,
            Error::NotFound(_)
                | Error::InvalidFormat(_)
                | Error::UnsupportedVersion { .. }
                | Error::Io(_)
        )
    }

    /// Check if this is a not-found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Check if the operation was cancelled
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Check if the stream is damaged at some offset
    pub fn is_corruption(&self) -> bool {
        matches!(self, Error::Corruption { .. } | Error::UnexpectedEof { .. })
    }

    /// Byte offset associated with the error, when known
    pub fn offset(&self) -> Option<u64> {
        match self {
            Error::Corruption { offset, .. } | Error::UnexpectedEof { offset } => Some(*offset),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_failures() {
        assert!(Error::NotFound("a.trace".into()).is_open_failure());
        assert!(Error::InvalidFormat("bad magic".into()).is_open_failure());
        assert!(Error::UnsupportedVersion {
            found: 9,
            supported: 1
        }
        .is_open_failure());
        assert!(!Error::Cancelled.is_open_failure());
        assert!(!Error::corruption(10, "crc").is_open_failure());
    }

    #[test]
    fn test_offset_reporting() {
        assert_eq!(Error::corruption(42, "crc").offset(), Some(42));
        assert_eq!(Error::UnexpectedEof { offset: 7 }.offset(), Some(7));
        assert_eq!(Error::Cancelled.offset(), None);
    }

    #[test]
    fn test_display_messages() {
        let e = Error::frame_out_of_range(12, 10);
        assert_eq!(e.to_string(), "frame 12 out of range (count is 10)");

        let e = Error::UnsupportedVersion {
            found: 3,
            supported: 1,
        };
        assert!(e.to_string().contains("version 3"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let e: Error = io.into();
        assert!(matches!(e, Error::Io(_)));
        assert!(e.is_open_failure());
    }
}
