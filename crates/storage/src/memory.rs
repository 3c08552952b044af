//! In-memory call source
//!
//! Serves a `Vec<RawCall>` through the `CallSource` trait. Bookmarks are call
//! indices. Offset support can be switched off to exercise the sequential
//! fallback, and every decode is counted so tests can observe caching.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracedex_core::{Api, Bookmark, Error, RawCall, Result, ScannedCall};

use crate::source::CallSource;

/// Call source over a vector of calls
#[derive(Debug)]
pub struct MemorySource {
    calls: Arc<[RawCall]>,
    pos: usize,
    offsets: bool,
    api: Api,
    decoded: Arc<AtomicU64>,
}

impl MemorySource {
    /// Source with offset support
    pub fn new(calls: Vec<RawCall>) -> Self {
        MemorySource {
            calls: calls.into(),
            pos: 0,
            offsets: true,
            api: Api::Unknown,
            decoded: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Source whose bookmarks cannot be restored
    pub fn without_offsets(calls: Vec<RawCall>) -> Self {
        MemorySource {
            offsets: false,
            ..Self::new(calls)
        }
    }

    /// Report `api` as the recorded API
    pub fn with_api(mut self, api: Api) -> Self {
        self.api = api;
        self
    }

    /// Shared counter of decoded calls (parse and scan)
    pub fn decode_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.decoded)
    }

    /// Number of calls in the source
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    /// Check if the source holds no calls
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    fn next(&mut self) -> Option<&RawCall> {
        let call = self.calls.get(self.pos)?;
        self.pos += 1;
        self.decoded.fetch_add(1, Ordering::Relaxed);
        Some(call)
    }
}

impl CallSource for MemorySource {
    fn parse_call(&mut self) -> Result<Option<RawCall>> {
        Ok(self.next().cloned())
    }

    fn scan_call(&mut self) -> Result<Option<ScannedCall>> {
        Ok(self.next().map(|c| ScannedCall {
            no: c.no,
            sig: Arc::clone(&c.sig),
            flags: c.flags,
        }))
    }

    fn supports_offsets(&self) -> bool {
        self.offsets
    }

    fn bookmark(&self) -> Bookmark {
        Bookmark::new(self.pos as u64)
    }

    fn set_bookmark(&mut self, bookmark: Bookmark) -> Result<()> {
        if !self.offsets {
            return Err(Error::Unsupported("source has no offset support".to_string()));
        }
        let pos = usize::try_from(bookmark.offset)
            .ok()
            .filter(|p| *p <= self.calls.len())
            .ok_or_else(|| Error::corruption(bookmark.offset, "bookmark past end of source"))?;
        self.pos = pos;
        Ok(())
    }

    fn percent_read(&self) -> u8 {
        if self.calls.is_empty() {
            return 100;
        }
        (self.pos * 100 / self.calls.len()) as u8
    }

    fn api(&self) -> Api {
        self.api
    }
}
