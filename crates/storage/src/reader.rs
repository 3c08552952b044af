//! File-backed call source
//!
//! `FileCallSource` decodes the trace format from a buffered file handle.
//! Bookmarks are byte offsets of the next event. Signature definitions are
//! kept for the lifetime of the source, so after one sequential pass any
//! bookmark can be resumed.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracedex_core::{
    Api, ArgList, Bookmark, CallFlags, CallNo, Error, RawCall, Result, ScannedCall, Signature,
};
use tracing::{debug, warn};

use crate::format::{
    decode_value, EventCursor, SignatureTables, TraceHeader, EVENT_CALL, HEADER_SIZE,
};
use crate::source::CallSource;

/// Read buffer size
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Decoded call event before it is packaged as a `RawCall` or `ScannedCall`
struct DecodedEvent {
    no: CallNo,
    sig: Arc<Signature>,
    args: ArgList,
    flags: CallFlags,
}

/// Call source reading a trace file
pub struct FileCallSource {
    path: PathBuf,
    reader: BufReader<File>,
    header: TraceHeader,
    file_len: u64,
    pos: u64,
    tables: SignatureTables,
    verify_checksums: bool,
}

impl FileCallSource {
    /// Open a trace, verifying event checksums
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, true)
    }

    /// Open a trace
    ///
    /// A missing file is `NotFound`, a damaged or foreign header is
    /// `InvalidFormat`, and a newer format revision is `UnsupportedVersion`.
    pub fn open_with(path: impl AsRef<Path>, verify_checksums: bool) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::NotFound(path.display().to_string()),
            _ => Error::Io(e),
        })?;
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);

        let mut buf = [0u8; HEADER_SIZE];
        reader.read_exact(&mut buf).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => {
                Error::InvalidFormat(format!("file is {} bytes, shorter than the header", file_len))
            }
            _ => Error::Io(e),
        })?;
        let header = TraceHeader::from_bytes(&buf)?;

        debug!(
            path = %path.display(),
            version = header.version,
            api = %header.api,
            offsets = header.flags.supports_offsets(),
            "opened trace"
        );

        Ok(FileCallSource {
            path: path.to_path_buf(),
            reader,
            header,
            file_len,
            pos: HEADER_SIZE as u64,
            tables: SignatureTables::new(),
            verify_checksums,
        })
    }

    /// File this source reads
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parsed file header
    pub fn header(&self) -> &TraceHeader {
        &self.header
    }

    /// Number of call signatures seen so far
    pub fn signature_count(&self) -> usize {
        self.tables.call_count()
    }

    fn read_event(&mut self, keep: bool) -> Result<Option<DecodedEvent>> {
        let start = self.pos;
        match self.decode_event(start, keep) {
            Ok(Some((event, consumed))) => {
                self.pos = start + consumed;
                Ok(Some(event))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                if let Err(seek_err) = self.reader.seek(SeekFrom::Start(start)) {
                    warn!(offset = start, error = %seek_err, "failed to rewind after decode error");
                }
                Err(e)
            }
        }
    }

    fn decode_event(&mut self, start: u64, keep: bool) -> Result<Option<(DecodedEvent, u64)>> {
        let limit = self.file_len.saturating_sub(start);
        let mut cur = EventCursor::new(&mut self.reader, start, limit);

        let tag = match cur.try_read_tag()? {
            Some(tag) => tag,
            None => return Ok(None),
        };
        if tag != EVENT_CALL {
            return Err(cur.corrupt(format!("unknown event tag {:#04x}", tag)));
        }

        let no = cur.read_varint()?;
        let raw_id = cur.read_varint()?;
        let id = u32::try_from(raw_id >> 1).map_err(|_| cur.corrupt("signature id overflows u32"))?;
        let sig = if raw_id & 1 == 1 {
            let name = cur.read_string()?;
            let argc = cur.read_len()?;
            let mut arg_names = Vec::with_capacity(argc);
            for _ in 0..argc {
                arg_names.push(cur.read_string()?);
            }
            self.tables.define_call(Signature::new(id, name, arg_names))
        } else {
            self.tables
                .call(id)
                .ok_or_else(|| cur.corrupt(format!("reference to undefined signature {}", id)))?
        };

        let flags = CallFlags::from_bits_truncate(cur.read_u8()?);
        let argc = cur.read_len()?;
        let mut args = ArgList::new();
        for _ in 0..argc {
            let value = decode_value(&mut cur, &mut self.tables, keep)?;
            if keep {
                args.push(value);
            }
        }
        cur.finish(self.verify_checksums)?;

        Ok(Some((
            DecodedEvent {
                no,
                sig,
                args,
                flags,
            },
            cur.consumed(),
        )))
    }
}

impl CallSource for FileCallSource {
    fn parse_call(&mut self) -> Result<Option<RawCall>> {
        Ok(self
            .read_event(true)?
            .map(|e| RawCall::new(e.no, e.sig, e.args, e.flags)))
    }

    fn scan_call(&mut self) -> Result<Option<ScannedCall>> {
        Ok(self.read_event(false)?.map(|e| ScannedCall {
            no: e.no,
            sig: e.sig,
            flags: e.flags,
        }))
    }

    fn supports_offsets(&self) -> bool {
        self.header.flags.supports_offsets()
    }

    fn bookmark(&self) -> Bookmark {
        Bookmark::new(self.pos)
    }

    fn set_bookmark(&mut self, bookmark: Bookmark) -> Result<()> {
        if !self.supports_offsets() {
            return Err(Error::Unsupported(
                "trace was written without offset support".to_string(),
            ));
        }
        if bookmark.offset < HEADER_SIZE as u64 || bookmark.offset > self.file_len {
            return Err(Error::corruption(bookmark.offset, "bookmark outside the event stream"));
        }
        self.reader.seek(SeekFrom::Start(bookmark.offset))?;
        self.pos = bookmark.offset;
        Ok(())
    }

    fn percent_read(&self) -> u8 {
        let header = HEADER_SIZE as u64;
        if self.file_len <= header {
            return 100;
        }
        let done = self.pos.saturating_sub(header) * 100 / (self.file_len - header);
        done.min(100) as u8
    }

    fn api(&self) -> Api {
        self.header.api
    }
}
