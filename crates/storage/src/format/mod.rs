//! On-disk byte format of trace files.
//!
//! This module centralizes the wire layout shared by the reader and the
//! writer. Keeping the layout separate from the decode loop makes format
//! evolution easier to manage.
//!
//! # Module Structure
//!
//! - `header`: 16-byte file header (magic, version, api, flags)
//! - `varint`: LEB128 and zigzag integer encoding
//! - `value`: tagged argument value encoding
//! - `cursor`: checksumming, position-tracking reader for one event

pub mod cursor;
pub mod header;
pub mod value;
pub mod varint;

pub use cursor::EventCursor;
pub use header::{HeaderFlags, TraceHeader, FORMAT_VERSION, HEADER_SIZE, MAGIC};
pub use value::{decode_value, encode_value, SignatureTables, ValueTag};
pub use varint::{encode_varint, encode_zigzag, zigzag_decode, zigzag_encode, MAX_VARINT_BYTES};

/// Event tag for a recorded call
pub const EVENT_CALL: u8 = 0x01;

/// Size of the trailing CRC32 of every event
pub const CRC_SIZE: usize = 4;
