//! Per-event reader
//!
//! `EventCursor` wraps the underlying reader for the duration of one event.
//! Every byte it hands out is fed to a CRC32 hasher and counted, so the
//! caller can verify the trailing checksum and advance its bookmark by the
//! exact event size. Length prefixes are checked against the bytes left in
//! the stream before anything is allocated; one that runs past the end is a
//! truncated stream.

use byteorder::{ByteOrder, LittleEndian};
use crc32fast::Hasher as Crc32Hasher;
use std::io::{self, Read};
use tracedex_core::{Error, Result};

use super::varint::{zigzag_decode, MAX_VARINT_BYTES};

const SKIP_CHUNK: usize = 8 * 1024;

/// Checksumming reader for one event
pub struct EventCursor<R> {
    inner: R,
    hasher: Crc32Hasher,
    start: u64,
    consumed: u64,
    limit: u64,
}

impl<R: Read> EventCursor<R> {
    /// Start an event at absolute offset `start` with `limit` bytes left in the stream
    pub fn new(inner: R, start: u64, limit: u64) -> Self {
        EventCursor {
            inner,
            hasher: Crc32Hasher::new(),
            start,
            consumed: 0,
            limit,
        }
    }

    /// Absolute offset where the event began
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Bytes consumed so far, checksum included
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.consumed)
    }

    fn eof(&self) -> Error {
        Error::UnexpectedEof { offset: self.start }
    }

    /// Corruption error located at this event
    pub fn corrupt(&self, reason: impl Into<String>) -> Error {
        Error::corruption(self.start, reason)
    }

    fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        match self.inner.read_exact(buf) {
            Ok(()) => {
                self.hasher.update(buf);
                self.consumed += buf.len() as u64;
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(self.eof()),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Read the event tag; `None` on a clean end of stream
    pub fn try_read_tag(&mut self) -> Result<Option<u8>> {
        let mut b = [0u8; 1];
        loop {
            match self.inner.read(&mut b) {
                Ok(0) => return Ok(None),
                Ok(_) => {
                    self.hasher.update(&b);
                    self.consumed += 1;
                    return Ok(Some(b[0]));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::Io(e)),
            }
        }
    }

    /// Read one byte
    pub fn read_u8(&mut self) -> Result<u8> {
        let mut b = [0u8; 1];
        self.fill(&mut b)?;
        Ok(b[0])
    }

    /// Read a little-endian u64
    pub fn read_u64(&mut self) -> Result<u64> {
        let mut b = [0u8; 8];
        self.fill(&mut b)?;
        Ok(LittleEndian::read_u64(&b))
    }

    /// Read a little-endian f64
    pub fn read_f64(&mut self) -> Result<f64> {
        let mut b = [0u8; 8];
        self.fill(&mut b)?;
        Ok(LittleEndian::read_f64(&b))
    }

    /// Read a LEB128 varint
    pub fn read_varint(&mut self) -> Result<u64> {
        let mut result: u64 = 0;
        let mut shift = 0;
        for _ in 0..MAX_VARINT_BYTES {
            let byte = self.read_u8()?;
            result |= ((byte & 0x7F) as u64) << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
        }
        Err(self.corrupt("varint exceeds maximum length"))
    }

    /// Read a zigzag-encoded signed varint
    pub fn read_zigzag(&mut self) -> Result<i64> {
        Ok(zigzag_decode(self.read_varint()?))
    }

    /// Read a varint length or count
    ///
    /// A length running past the end of the stream means the stream was cut
    /// off inside this event and reports `UnexpectedEof`.
    pub fn read_len(&mut self) -> Result<usize> {
        let len = self.read_varint()?;
        let len = usize::try_from(len).map_err(|_| self.corrupt("length does not fit in memory"))?;
        if len as u64 > self.remaining() {
            return Err(self.eof());
        }
        Ok(len)
    }

    /// Read `len` raw bytes
    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.fill(&mut buf)?;
        Ok(buf)
    }

    /// Consume `len` bytes without keeping them
    pub fn skip(&mut self, len: usize) -> Result<()> {
        let mut chunk = [0u8; SKIP_CHUNK];
        let mut left = len;
        while left > 0 {
            let n = left.min(SKIP_CHUNK);
            self.fill(&mut chunk[..n])?;
            left -= n;
        }
        Ok(())
    }

    /// Read a length-prefixed UTF-8 string
    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_len()?;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes).map_err(|_| self.corrupt("string is not valid UTF-8"))
    }

    /// Skip a length-prefixed string or blob
    pub fn skip_prefixed(&mut self) -> Result<()> {
        let len = self.read_len()?;
        self.skip(len)
    }

    /// Read the trailing checksum and compare it with the bytes seen so far
    pub fn finish(&mut self, verify: bool) -> Result<()> {
        let computed = self.hasher.clone().finalize();
        let mut b = [0u8; 4];
        self.fill(&mut b)?;
        let stored = LittleEndian::read_u32(&b);
        if verify && stored != computed {
            return Err(self.corrupt(format!(
                "checksum mismatch: stored {:08x}, computed {:08x}",
                stored, computed
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::varint::{encode_varint, encode_zigzag};

    fn with_crc(mut body: Vec<u8>) -> Vec<u8> {
        let crc = crc32fast::hash(&body);
        body.extend_from_slice(&crc.to_le_bytes());
        body
    }

    #[test]
    fn test_reads_and_verifies() {
        let mut body = vec![0x01];
        encode_varint(300, &mut body);
        encode_zigzag(-5, &mut body);
        encode_varint(3, &mut body);
        body.extend_from_slice(b"abc");
        let bytes = with_crc(body);

        let mut cur = EventCursor::new(&bytes[..], 100, bytes.len() as u64);
        assert_eq!(cur.try_read_tag().unwrap(), Some(0x01));
        assert_eq!(cur.read_varint().unwrap(), 300);
        assert_eq!(cur.read_zigzag().unwrap(), -5);
        assert_eq!(cur.read_string().unwrap(), "abc");
        cur.finish(true).unwrap();
        assert_eq!(cur.consumed(), bytes.len() as u64);
    }

    #[test]
    fn test_checksum_mismatch_is_corruption() {
        let mut bytes = with_crc(vec![0x01, 0x05]);
        bytes[1] = 0x06;
        let mut cur = EventCursor::new(&bytes[..], 64, bytes.len() as u64);
        cur.try_read_tag().unwrap();
        cur.read_u8().unwrap();
        match cur.finish(true) {
            Err(Error::Corruption { offset, .. }) => assert_eq!(offset, 64),
            other => panic!("expected corruption, got {:?}", other),
        }
    }

    #[test]
    fn test_checksum_ignored_when_not_verifying() {
        let mut bytes = with_crc(vec![0x01, 0x05]);
        bytes[1] = 0x06;
        let mut cur = EventCursor::new(&bytes[..], 0, bytes.len() as u64);
        cur.try_read_tag().unwrap();
        cur.read_u8().unwrap();
        cur.finish(false).unwrap();
    }

    #[test]
    fn test_clean_eof_and_truncation() {
        let empty: &[u8] = &[];
        let mut cur = EventCursor::new(empty, 16, 0);
        assert_eq!(cur.try_read_tag().unwrap(), None);

        let truncated: &[u8] = &[0x01, 0x80];
        let mut cur = EventCursor::new(truncated, 16, 2);
        cur.try_read_tag().unwrap();
        assert!(matches!(
            cur.read_varint(),
            Err(Error::UnexpectedEof { offset: 16 })
        ));
    }

    #[test]
    fn test_length_past_end_is_truncation() {
        let mut body = Vec::new();
        encode_varint(1_000_000, &mut body);
        let mut cur = EventCursor::new(&body[..], 40, body.len() as u64);
        assert!(matches!(
            cur.read_len(),
            Err(Error::UnexpectedEof { offset: 40 })
        ));
    }

    #[test]
    fn test_skip_large_payload() {
        let mut body = Vec::new();
        encode_varint(20_000, &mut body);
        body.extend(std::iter::repeat(7u8).take(20_000));
        body.push(0x2A);
        let mut cur = EventCursor::new(&body[..], 0, body.len() as u64);
        cur.skip_prefixed().unwrap();
        assert_eq!(cur.read_u8().unwrap(), 0x2A);
    }
}
