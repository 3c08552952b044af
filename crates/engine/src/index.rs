//! Bookmark index
//!
//! One scan over the stream in flags-only mode records, for every frame, the
//! bookmark of its first call and its call count. Frame contents are then
//! decoded on demand by seeking to these bookmarks.
//!
//! ## Invariants
//!
//! - Entries are in frame order and cover every call exactly once
//! - The sum of the counts before frame `i` is the sequence-number offset of
//!   frame `i`'s first call
//! - Entries are immutable once built; a reload builds a new index

use tracedex_core::{Api, CallNo, Error, FrameBookmark, Result};
use tracedex_storage::CallSource;
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::events::ProgressReporter;

/// Per-frame bookmarks of a scanned stream
#[derive(Debug, Clone, Default)]
pub struct BookmarkIndex {
    entries: Vec<FrameBookmark>,
    /// Calls before each frame
    first_offsets: Vec<u64>,
    last_call_nos: Vec<Option<CallNo>>,
    base_no: CallNo,
    total_calls: u64,
}

impl BookmarkIndex {
    /// Index over `entries`, whose first call has sequence number `base_no`
    pub fn new(entries: Vec<FrameBookmark>, last_call_nos: Vec<Option<CallNo>>, base_no: CallNo) -> Self {
        let mut first_offsets = Vec::with_capacity(entries.len());
        let mut total_calls = 0u64;
        for entry in &entries {
            first_offsets.push(total_calls);
            total_calls += entry.num_calls;
        }
        BookmarkIndex {
            entries,
            first_offsets,
            last_call_nos,
            base_no,
            total_calls,
        }
    }

    /// Number of frames
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the stream held no calls
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries, in frame order
    pub fn entries(&self) -> &[FrameBookmark] {
        &self.entries
    }

    /// Entry of frame `frame`
    pub fn entry(&self, frame: usize) -> Option<&FrameBookmark> {
        self.entries.get(frame)
    }

    /// Declared calls of `frame`, 0 when out of range
    pub fn calls_in_frame(&self, frame: usize) -> u64 {
        self.entries.get(frame).map_or(0, |e| e.num_calls)
    }

    /// Calls over all frames
    pub fn total_calls(&self) -> u64 {
        self.total_calls
    }

    /// Sequence number of the stream's first call
    pub fn base_no(&self) -> CallNo {
        self.base_no
    }

    /// Sequence number of the first call of `frame`
    pub fn first_call_no(&self, frame: usize) -> Option<CallNo> {
        self.first_offsets.get(frame).map(|off| self.base_no + off)
    }

    /// Sequence number of the last call of `frame`, when recorded
    pub fn last_call_no(&self, frame: usize) -> Option<CallNo> {
        self.last_call_nos.get(frame).copied().flatten()
    }

    /// Frame owning the call with sequence number `no`
    pub fn frame_of_call(&self, no: CallNo) -> Option<usize> {
        let offset = no.checked_sub(self.base_no)?;
        if offset >= self.total_calls {
            return None;
        }
        // first_offsets[0] == 0 <= offset, so the partition point is at least 1.
        Some(self.first_offsets.partition_point(|&start| start <= offset) - 1)
    }
}

/// Result of an index scan
#[derive(Debug, Clone)]
pub struct IndexScan {
    /// The index
    pub index: BookmarkIndex,
    /// API inferred from the first recognizable call name
    pub api_hint: Option<Api>,
}

/// Scan `source` from its current position and index every frame
///
/// Cancellation returns `Error::Cancelled` and no index. A stream cut off
/// inside a call is indexed up to the last complete call.
pub fn build_index(
    source: &mut dyn CallSource,
    cancel: &CancelToken,
    progress: &mut ProgressReporter<'_>,
) -> Result<IndexScan> {
    let mut entries = Vec::new();
    let mut last_call_nos = Vec::new();
    let mut base_no = None;
    let mut api_hint = None;

    let mut start = source.bookmark();
    let mut counter = 0u64;
    let mut last_no = None;

    loop {
        cancel.check()?;
        let call = match source.scan_call() {
            Ok(Some(call)) => call,
            Ok(None) => break,
            Err(Error::UnexpectedEof { offset }) => {
                warn!(offset, frames = entries.len(), "trace truncated, indexing complete calls only");
                break;
            }
            Err(e) => return Err(e),
        };
        base_no.get_or_insert(call.no);
        if api_hint.is_none() {
            api_hint = Api::guess_from_call_name(&call.sig.name);
        }
        counter += 1;
        last_no = Some(call.no);

        if call.flags.is_end_frame() {
            entries.push(FrameBookmark {
                start,
                num_calls: counter,
            });
            last_call_nos.push(Some(call.no));
            counter = 0;
            start = source.bookmark();
            progress.update(source.percent_read());
        }
    }

    if counter > 0 {
        entries.push(FrameBookmark {
            start,
            num_calls: counter,
        });
        last_call_nos.push(last_no);
    }
    progress.finish();

    let index = BookmarkIndex::new(entries, last_call_nos, base_no.unwrap_or(0));
    debug!(
        frames = index.len(),
        calls = index.total_calls(),
        "built bookmark index"
    );
    Ok(IndexScan { index, api_hint })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventSink, LoaderEvent};
    use proptest::prelude::*;
    use tracedex_core::Bookmark;
    use tracedex_storage::{CallScript, MemorySource};

    fn scan(script: CallScript) -> IndexScan {
        let mut source = MemorySource::new(script.into_calls());
        let sink = EventSink::new();
        let mut progress = ProgressReporter::new(&sink, 5);
        build_index(&mut source, &CancelToken::new(), &mut progress).unwrap()
    }

    #[test]
    fn test_frames_and_counts() {
        let mut s = CallScript::new();
        s.ordinary("glClear");
        s.render("glDrawArrays");
        s.swap();
        s.ordinary("glViewport");
        s.swap();
        let index = scan(s).index;

        assert_eq!(index.len(), 2);
        assert_eq!(index.calls_in_frame(0), 3);
        assert_eq!(index.calls_in_frame(1), 2);
        assert_eq!(index.calls_in_frame(2), 0);
        assert_eq!(index.entry(1).unwrap().start, Bookmark::new(3));
        assert_eq!(index.last_call_no(0), Some(2));
        assert_eq!(index.last_call_no(1), Some(4));
    }

    #[test]
    fn test_trailing_frame() {
        let mut s = CallScript::new();
        s.swap();
        s.ordinary("glFlush");
        s.ordinary("glFinish");
        let index = scan(s).index;
        assert_eq!(index.len(), 2);
        assert_eq!(index.calls_in_frame(1), 2);
        assert_eq!(index.last_call_no(1), Some(2));
    }

    #[test]
    fn test_frame_of_call() {
        let mut s = CallScript::new();
        for _ in 0..3 {
            s.ordinary("glClear");
            s.swap();
        }
        let index = scan(s).index;
        assert_eq!(index.frame_of_call(0), Some(0));
        assert_eq!(index.frame_of_call(1), Some(0));
        assert_eq!(index.frame_of_call(2), Some(1));
        assert_eq!(index.frame_of_call(5), Some(2));
        assert_eq!(index.frame_of_call(6), None);
        assert_eq!(index.first_call_no(2), Some(4));
    }

    #[test]
    fn test_empty_stream() {
        let index = scan(CallScript::new()).index;
        assert!(index.is_empty());
        assert_eq!(index.total_calls(), 0);
        assert_eq!(index.frame_of_call(0), None);
    }

    #[test]
    fn test_api_hint() {
        let mut s = CallScript::new();
        s.ordinary("vkQueueSubmit");
        s.ordinary("glClear");
        assert_eq!(scan(s).api_hint, Some(Api::Vulkan));
    }

    #[test]
    fn test_progress_ends_at_100() {
        let mut s = CallScript::new();
        for _ in 0..40 {
            s.ordinary("glClear");
            s.swap();
        }
        let mut source = MemorySource::new(s.into_calls());
        let sink = EventSink::new();
        let rx = sink.subscribe();
        let mut progress = ProgressReporter::new(&sink, 5);
        build_index(&mut source, &CancelToken::new(), &mut progress).unwrap();

        let seen: Vec<u8> = rx
            .try_iter()
            .filter_map(|e| match e {
                LoaderEvent::Parsed(p) => Some(p),
                _ => None,
            })
            .collect();
        assert!(seen.windows(2).all(|w| w[0] + 5 <= w[1] || w[1] == 100));
        assert_eq!(seen.last(), Some(&100));
    }

    #[test]
    fn test_cancelled_scan() {
        let mut s = CallScript::new();
        s.swap();
        let mut source = MemorySource::new(s.into_calls());
        let sink = EventSink::new();
        let mut progress = ProgressReporter::new(&sink, 5);
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = build_index(&mut source, &cancel, &mut progress).unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    proptest! {
        #[test]
        fn prop_index_covers_every_call(ends in proptest::collection::vec(any::<bool>(), 0..200)) {
            let mut s = CallScript::new();
            for end in &ends {
                if *end { s.swap(); } else { s.ordinary("glEnable"); }
            }
            let markers = ends.iter().filter(|e| **e).count();
            let trailing = ends.last().map_or(false, |e| !*e);
            let index = scan(s).index;

            prop_assert_eq!(index.total_calls(), ends.len() as u64);
            prop_assert_eq!(index.len(), markers + trailing as usize);
            for no in 0..ends.len() as u64 {
                let frame = index.frame_of_call(no).unwrap();
                let first = index.first_call_no(frame).unwrap();
                prop_assert!(first <= no && no < first + index.calls_in_frame(frame));
            }
        }
    }
}
