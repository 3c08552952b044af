//! Substring search over the whole stream
//!
//! Search decodes raw calls straight from the source, starting at a frame's
//! bookmark, and never touches the index or materialized frames. The loader
//! turns a hit into a `CallRef` by materializing the owning frame afterwards.

use tracedex_core::{CallNo, CaseSensitivity, Error, RawCall, Result};
use tracedex_storage::CallSource;
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::frame::CallRef;
use crate::index::BookmarkIndex;

/// Direction of a search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchDirection {
    /// From the start of the frame towards the end of the stream
    #[default]
    Forward,
    /// From the end of the frame towards the start of the stream
    Backward,
}

/// What to search for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    /// Frame the search starts in
    pub frame: usize,
    /// Substring to find in the call name or argument text
    pub text: String,
    /// Case handling
    pub case: CaseSensitivity,
    /// Direction
    pub direction: SearchDirection,
}

impl SearchRequest {
    /// Case-sensitive forward search from `frame`
    pub fn forward(frame: usize, text: impl Into<String>) -> Self {
        SearchRequest {
            frame,
            text: text.into(),
            case: CaseSensitivity::Sensitive,
            direction: SearchDirection::Forward,
        }
    }

    /// Case-sensitive backward search from `frame`
    pub fn backward(frame: usize, text: impl Into<String>) -> Self {
        SearchRequest {
            direction: SearchDirection::Backward,
            ..Self::forward(frame, text)
        }
    }

    /// Set case handling
    pub fn with_case(mut self, case: CaseSensitivity) -> Self {
        self.case = case;
        self
    }

    fn matches(&self, call: &RawCall) -> bool {
        call.contains(&self.text, self.case)
    }
}

/// Outcome of a search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStatus {
    /// A call matched
    Found,
    /// No call matched
    NotFound,
    /// The source cannot seek; treated as not found
    Unsupported,
}

/// Search outcome with the matched call
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// Status
    pub status: SearchStatus,
    /// Matched call, when found
    pub call: Option<CallRef>,
}

impl SearchResult {
    /// Match at `call`
    pub fn found(call: CallRef) -> Self {
        SearchResult {
            status: SearchStatus::Found,
            call: Some(call),
        }
    }

    /// No match
    pub fn not_found() -> Self {
        SearchResult {
            status: SearchStatus::NotFound,
            call: None,
        }
    }

    /// Source cannot seek
    pub fn unsupported() -> Self {
        SearchResult {
            status: SearchStatus::Unsupported,
            call: None,
        }
    }

    /// Did the search find a call?
    pub fn is_found(&self) -> bool {
        self.status == SearchStatus::Found
    }
}

/// Position of a matching call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchHit {
    /// Owning frame
    pub frame: usize,
    /// Sequence number of the call
    pub no: CallNo,
}

/// Run `request` against `source`
///
/// Requires offset support; `set_bookmark` reports `Unsupported` otherwise.
pub fn find(
    source: &mut dyn CallSource,
    index: &BookmarkIndex,
    request: &SearchRequest,
    cancel: &CancelToken,
) -> Result<Option<SearchHit>> {
    if request.frame >= index.len() {
        return Err(Error::frame_out_of_range(request.frame as u64, index.len() as u64));
    }
    let hit = match request.direction {
        SearchDirection::Forward => find_forward(source, index, request, cancel)?,
        SearchDirection::Backward => find_backward(source, index, request, cancel)?,
    };
    debug!(
        frame = request.frame,
        direction = ?request.direction,
        found = hit.is_some(),
        "search finished"
    );
    Ok(hit)
}

fn next_call(source: &mut dyn CallSource) -> Result<Option<RawCall>> {
    match source.parse_call() {
        Err(Error::UnexpectedEof { offset }) => {
            warn!(offset, "search reached a truncated call");
            Ok(None)
        }
        other => other,
    }
}

fn find_forward(
    source: &mut dyn CallSource,
    index: &BookmarkIndex,
    request: &SearchRequest,
    cancel: &CancelToken,
) -> Result<Option<SearchHit>> {
    let entries = index.entries();
    source.set_bookmark(entries[request.frame].start)?;

    let mut frame = request.frame;
    let mut remaining = entries[frame].num_calls;
    while let Some(call) = next_call(source)? {
        cancel.check()?;
        // Advance past frames whose calls were all consumed.
        while remaining == 0 && frame + 1 < entries.len() {
            frame += 1;
            remaining = entries[frame].num_calls;
        }
        remaining = remaining.saturating_sub(1);
        if request.matches(&call) {
            return Ok(Some(SearchHit { frame, no: call.no }));
        }
    }
    Ok(None)
}

fn find_backward(
    source: &mut dyn CallSource,
    index: &BookmarkIndex,
    request: &SearchRequest,
    cancel: &CancelToken,
) -> Result<Option<SearchHit>> {
    let mut buffer = Vec::new();
    for (frame, entry) in index.entries().iter().enumerate().take(request.frame + 1).rev() {
        source.set_bookmark(entry.start)?;
        buffer.clear();
        while (buffer.len() as u64) < entry.num_calls {
            cancel.check()?;
            match next_call(source)? {
                Some(call) => buffer.push(call),
                None => break,
            }
        }
        if let Some(call) = buffer.iter().rev().find(|c| request.matches(c)) {
            return Ok(Some(SearchHit { frame, no: call.no }));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventSink, ProgressReporter};
    use crate::index::build_index;
    use tracedex_core::Value;
    use tracedex_storage::{CallScript, MemorySource};

    fn ten_frames() -> CallScript {
        let mut s = CallScript::new();
        for frame in 0..10 {
            s.ordinary("glClear");
            if frame == 7 {
                s.call("glBindTexture", &[("target", Value::UInt(3553)), ("texture", Value::UInt(42))], Default::default());
            }
            s.render("glDrawArrays");
            s.swap();
        }
        s
    }

    fn indexed(script: CallScript) -> (MemorySource, BookmarkIndex) {
        let mut source = MemorySource::new(script.into_calls());
        let sink = EventSink::new();
        let index = build_index(&mut source, &CancelToken::new(), &mut ProgressReporter::new(&sink, 5))
            .unwrap()
            .index;
        (source, index)
    }

    #[test]
    fn test_forward_finds_later_frame() {
        let (mut source, index) = indexed(ten_frames());
        let hit = find(&mut source, &index, &SearchRequest::forward(0, "texture=42"), &CancelToken::new())
            .unwrap()
            .unwrap();
        assert_eq!(hit.frame, 7);
        assert_eq!(hit.no, 7 * 3 + 1);
    }

    #[test]
    fn test_backward_finds_same_call() {
        let (mut source, index) = indexed(ten_frames());
        let hit = find(&mut source, &index, &SearchRequest::backward(9, "glBindTexture"), &CancelToken::new())
            .unwrap()
            .unwrap();
        assert_eq!(hit, SearchHit { frame: 7, no: 22 });
    }

    #[test]
    fn test_not_found() {
        let (mut source, index) = indexed(ten_frames());
        let cancel = CancelToken::new();
        assert!(find(&mut source, &index, &SearchRequest::forward(0, "glFenceSync"), &cancel)
            .unwrap()
            .is_none());
        assert!(find(&mut source, &index, &SearchRequest::backward(6, "glBindTexture"), &cancel)
            .unwrap()
            .is_none());
        assert!(find(&mut source, &index, &SearchRequest::forward(8, "glBindTexture"), &cancel)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_case_insensitive() {
        let (mut source, index) = indexed(ten_frames());
        let request = SearchRequest::forward(0, "GLBINDTEXTURE").with_case(CaseSensitivity::Insensitive);
        assert!(find(&mut source, &index, &request, &CancelToken::new()).unwrap().is_some());
    }

    #[test]
    fn test_frame_out_of_range() {
        let (mut source, index) = indexed(ten_frames());
        let err = find(&mut source, &index, &SearchRequest::forward(10, "x"), &CancelToken::new()).unwrap_err();
        assert!(matches!(err, Error::IndexOutOfRange { what: "frame", .. }));
    }
}
