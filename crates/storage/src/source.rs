//! The call source seam
//!
//! The loader never touches bytes directly. It drives a `CallSource`, a
//! sequential decoder with optional random access through bookmarks.

use tracedex_core::{Api, Bookmark, RawCall, Result, ScannedCall};

/// Sequential decoder over a recorded call stream
///
/// A source yields calls in sequence-number order. `parse_call` decodes the
/// full argument list; `scan_call` decodes only what indexing needs. Both
/// return `Ok(None)` at end of stream.
pub trait CallSource: Send {
    /// Decode the next call with its arguments
    fn parse_call(&mut self) -> Result<Option<RawCall>>;

    /// Decode the next call's number, signature and flags, skipping argument payloads
    fn scan_call(&mut self) -> Result<Option<ScannedCall>>;

    /// Can bookmarks taken on this source be restored?
    fn supports_offsets(&self) -> bool;

    /// Position of the next call
    fn bookmark(&self) -> Bookmark;

    /// Resume decoding at `bookmark`
    ///
    /// Sources without offset support return `Error::Unsupported`.
    fn set_bookmark(&mut self, bookmark: Bookmark) -> Result<()>;

    /// Fraction of the stream consumed, 0-100
    fn percent_read(&self) -> u8;

    /// API recorded in the stream header, if any
    fn api(&self) -> Api {
        Api::Unknown
    }
}

impl<S: CallSource + ?Sized> CallSource for Box<S> {
    fn parse_call(&mut self) -> Result<Option<RawCall>> {
        (**self).parse_call()
    }

    fn scan_call(&mut self) -> Result<Option<ScannedCall>> {
        (**self).scan_call()
    }

    fn supports_offsets(&self) -> bool {
        (**self).supports_offsets()
    }

    fn bookmark(&self) -> Bookmark {
        (**self).bookmark()
    }

    fn set_bookmark(&mut self, bookmark: Bookmark) -> Result<()> {
        (**self).set_bookmark(bookmark)
    }

    fn percent_read(&self) -> u8 {
        (**self).percent_read()
    }

    fn api(&self) -> Api {
        (**self).api()
    }
}
