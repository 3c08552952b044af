//! Trace file header
//!
//! ```text
//! offset  size  field
//! 0       4     magic "TDXT"
//! 4       2     version (LE)
//! 6       1     api
//! 7       1     flags
//! 8       8     reserved (zero)
//! ```

use byteorder::{ByteOrder, LittleEndian};
use tracedex_core::{Api, Error, Result};

/// Magic bytes: "TDXT"
pub const MAGIC: [u8; 4] = *b"TDXT";

/// Newest format version this build reads and writes
pub const FORMAT_VERSION: u16 = 1;

/// Header size in bytes
pub const HEADER_SIZE: usize = 16;

/// Header flag bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeaderFlags(u8);

impl HeaderFlags {
    /// Bookmarks taken on this stream can be seeked to
    pub const SUPPORTS_OFFSETS: u8 = 0b0000_0001;

    /// No flags
    pub fn new() -> Self {
        Self(0)
    }

    /// Set the offset-support bit
    pub fn with_offsets(mut self) -> Self {
        self.0 |= Self::SUPPORTS_OFFSETS;
        self
    }

    /// Wrap a raw flags byte
    pub fn from_byte(b: u8) -> Self {
        Self(b)
    }

    /// Raw flags byte
    pub fn to_byte(self) -> u8 {
        self.0
    }

    /// Is the offset-support bit set?
    pub fn supports_offsets(self) -> bool {
        self.0 & Self::SUPPORTS_OFFSETS != 0
    }
}

/// Decoded file header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceHeader {
    /// Format version
    pub version: u16,
    /// Recorded API
    pub api: Api,
    /// Capability flags
    pub flags: HeaderFlags,
}

impl TraceHeader {
    /// Header for a new trace in the current format
    pub fn new(api: Api, flags: HeaderFlags) -> Self {
        TraceHeader {
            version: FORMAT_VERSION,
            api,
            flags,
        }
    }

    /// Serialize to bytes
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&MAGIC);
        LittleEndian::write_u16(&mut buf[4..6], self.version);
        buf[6] = self.api.as_u8();
        buf[7] = self.flags.to_byte();
        buf
    }

    /// Parse and validate header bytes
    ///
    /// Wrong magic is `InvalidFormat`; a version newer than `FORMAT_VERSION`
    /// is `UnsupportedVersion`.
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(Error::InvalidFormat(format!(
                "header too short: {} bytes",
                buf.len()
            )));
        }
        if buf[0..4] != MAGIC {
            return Err(Error::InvalidFormat("bad magic".to_string()));
        }
        let version = LittleEndian::read_u16(&buf[4..6]);
        if version == 0 {
            return Err(Error::InvalidFormat("version 0".to_string()));
        }
        if version > FORMAT_VERSION {
            return Err(Error::UnsupportedVersion {
                found: version,
                supported: FORMAT_VERSION,
            });
        }
        Ok(TraceHeader {
            version,
            api: Api::from_u8(buf[6]),
            flags: HeaderFlags::from_byte(buf[7]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_roundtrip() {
        let h = TraceHeader::new(Api::Vulkan, HeaderFlags::new().with_offsets());
        let parsed = TraceHeader::from_bytes(&h.to_bytes()).unwrap();
        assert_eq!(parsed, h);
        assert!(parsed.flags.supports_offsets());
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = TraceHeader::new(Api::Gl, HeaderFlags::new()).to_bytes();
        bytes[0] = b'X';
        assert!(matches!(
            TraceHeader::from_bytes(&bytes),
            Err(Error::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_newer_version_rejected() {
        let mut bytes = TraceHeader::new(Api::Gl, HeaderFlags::new()).to_bytes();
        LittleEndian::write_u16(&mut bytes[4..6], FORMAT_VERSION + 1);
        match TraceHeader::from_bytes(&bytes) {
            Err(Error::UnsupportedVersion { found, supported }) => {
                assert_eq!(found, FORMAT_VERSION + 1);
                assert_eq!(supported, FORMAT_VERSION);
            }
            other => panic!("expected UnsupportedVersion, got {:?}", other),
        }
    }

    #[test]
    fn test_short_header() {
        assert!(matches!(
            TraceHeader::from_bytes(&MAGIC),
            Err(Error::InvalidFormat(_))
        ));
    }
}
