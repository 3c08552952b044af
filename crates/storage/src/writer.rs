//! Trace file writer
//!
//! Encodes already-decoded calls into the trace format. Used by tests and by
//! tools that convert other trace formats; it does not capture live API calls.

use rustc_hash::FxHashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracedex_core::{Api, RawCall, Result};

use crate::format::{
    encode_value, encode_varint, HeaderFlags, TraceHeader, CRC_SIZE, EVENT_CALL, HEADER_SIZE,
};

/// Streaming trace encoder
pub struct TraceWriter<W: Write> {
    out: W,
    defined_calls: FxHashSet<u32>,
    defined_enums: FxHashSet<u32>,
    scratch: Vec<u8>,
    calls_written: u64,
    bytes_written: u64,
}

impl TraceWriter<BufWriter<File>> {
    /// Create a trace file with offset support
    pub fn create(path: impl AsRef<Path>, api: Api) -> Result<Self> {
        let file = File::create(path)?;
        TraceWriter::new(BufWriter::new(file), api)
    }
}

impl<W: Write> TraceWriter<W> {
    /// Start a trace with offset support
    pub fn new(out: W, api: Api) -> Result<Self> {
        Self::with_flags(out, api, HeaderFlags::new().with_offsets())
    }

    /// Start a trace whose bookmarks cannot be seeked to
    pub fn without_offsets(out: W, api: Api) -> Result<Self> {
        Self::with_flags(out, api, HeaderFlags::new())
    }

    fn with_flags(mut out: W, api: Api, flags: HeaderFlags) -> Result<Self> {
        out.write_all(&TraceHeader::new(api, flags).to_bytes())?;
        Ok(TraceWriter {
            out,
            defined_calls: FxHashSet::default(),
            defined_enums: FxHashSet::default(),
            scratch: Vec::with_capacity(256),
            calls_written: 0,
            bytes_written: HEADER_SIZE as u64,
        })
    }

    /// Append one call event
    ///
    /// The call's signature and any enum signatures in its arguments are
    /// written inline the first time their ids appear.
    pub fn write_call(&mut self, call: &RawCall) -> Result<()> {
        let buf = &mut self.scratch;
        buf.clear();
        buf.push(EVENT_CALL);
        encode_varint(call.no, buf);

        let sig = &call.sig;
        let defines = self.defined_calls.insert(sig.id);
        encode_varint(((sig.id as u64) << 1) | u64::from(defines), buf);
        if defines {
            encode_varint(sig.name.len() as u64, buf);
            buf.extend_from_slice(sig.name.as_bytes());
            encode_varint(sig.arg_names.len() as u64, buf);
            for name in &sig.arg_names {
                encode_varint(name.len() as u64, buf);
                buf.extend_from_slice(name.as_bytes());
            }
        }

        buf.push(call.flags.bits());
        encode_varint(call.args.len() as u64, buf);
        for arg in &call.args {
            encode_value(arg, buf, &mut self.defined_enums);
        }
        let crc = crc32fast::hash(buf);
        buf.extend_from_slice(&crc.to_le_bytes());

        self.out.write_all(buf)?;
        self.calls_written += 1;
        self.bytes_written += buf.len() as u64;
        Ok(())
    }

    /// Append every call in order
    pub fn write_all<'a>(&mut self, calls: impl IntoIterator<Item = &'a RawCall>) -> Result<()> {
        for call in calls {
            self.write_call(call)?;
        }
        Ok(())
    }

    /// Calls written so far
    pub fn calls_written(&self) -> u64 {
        self.calls_written
    }

    /// Bytes written so far, header included
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Flush and return the underlying writer
    pub fn finish(mut self) -> Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}

/// Smallest possible call event: tag, no, id, flags, argc, crc
pub const MIN_EVENT_SIZE: usize = 5 + CRC_SIZE;
