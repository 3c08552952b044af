//! Frame materialization
//!
//! Indexed streams decode one frame at a time from its bookmark. Streams
//! without offset support are decoded once, front to back, with every frame
//! grouped as it completes.

use std::sync::Arc;
use tracedex_core::{Api, Error, FrameBookmark, Result};
use tracedex_storage::CallSource;
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::events::ProgressReporter;
use crate::filter::CallFilter;
use crate::frame::{Frame, FrameContents};
use crate::grouping::FrameAssembler;
use crate::signature_cache::SignatureCache;

/// Shared inputs of every materialization
#[derive(Clone, Copy)]
pub struct MaterializeContext<'a> {
    /// Signature cache of the loaded stream
    pub sigs: &'a SignatureCache,
    /// Group-root predicate
    pub filter: &'a dyn CallFilter,
    /// Cancellation flag, checked per call
    pub cancel: &'a CancelToken,
}

/// Decode and group frame `frame` starting at its bookmark
///
/// Decoding stops after the end-frame call or after the declared number of
/// calls. A stream that ends early yields the calls decoded so far.
pub fn materialize_frame(
    source: &mut dyn CallSource,
    frame: usize,
    entry: &FrameBookmark,
    ctx: MaterializeContext<'_>,
) -> Result<FrameContents> {
    source.set_bookmark(entry.start)?;
    let mut assembler = FrameAssembler::new(ctx.sigs, ctx.filter);
    let mut decoded = 0u64;

    while decoded < entry.num_calls {
        ctx.cancel.check()?;
        match source.parse_call() {
            Ok(Some(call)) => {
                decoded += 1;
                if assembler.push(call) {
                    break;
                }
            }
            Ok(None) => {
                warn!(frame, decoded, declared = entry.num_calls, "stream ended inside frame");
                break;
            }
            Err(Error::UnexpectedEof { offset }) => {
                warn!(frame, decoded, offset, "truncated call inside frame");
                break;
            }
            Err(e) => return Err(e),
        }
    }

    debug!(frame, calls = decoded, "materialized frame");
    Ok(assembler.finish())
}

/// Outcome of a sequential load
#[derive(Debug)]
pub struct SequentialLoad {
    /// Frames completed, in order
    pub frames: Vec<Arc<Frame>>,
    /// API inferred from the first recognizable call name
    pub api_hint: Option<Api>,
    /// Error or cancellation that stopped the load early
    pub interrupted: Option<Error>,
}

/// Decode every frame of `source` in one pass
///
/// Completed frames are handed to `on_batch` in groups of
/// `frames_per_batch`, in frame order. A frame interrupted by cancellation
/// or corruption is discarded; a stream truncated mid-call ends with the
/// calls decoded so far.
pub fn materialize_all(
    source: &mut dyn CallSource,
    ctx: MaterializeContext<'_>,
    frames_per_batch: usize,
    progress: &mut ProgressReporter<'_>,
    on_batch: &mut dyn FnMut(Vec<Arc<Frame>>),
) -> SequentialLoad {
    let frames_per_batch = frames_per_batch.max(1);
    let mut frames: Vec<Arc<Frame>> = Vec::new();
    let mut batch = Vec::with_capacity(frames_per_batch);
    let mut api_hint = None;
    let mut assembler = FrameAssembler::new(ctx.sigs, ctx.filter);

    let interrupted = loop {
        if let Err(e) = ctx.cancel.check() {
            break Some(e);
        }
        let call = match source.parse_call() {
            Ok(Some(call)) => call,
            Ok(None) => break None,
            Err(Error::UnexpectedEof { offset }) => {
                warn!(offset, frames = frames.len(), "trace truncated, keeping decoded calls");
                break None;
            }
            Err(e) => break Some(e),
        };
        if api_hint.is_none() {
            api_hint = Api::guess_from_call_name(call.name());
        }
        if assembler.push(call) {
            let done = std::mem::replace(&mut assembler, FrameAssembler::new(ctx.sigs, ctx.filter));
            let last_no = done.last_call_no();
            let frame = Arc::new(Frame::loaded(frames.len(), done.finish(), last_no));
            frames.push(Arc::clone(&frame));
            batch.push(frame);
            if batch.len() >= frames_per_batch {
                on_batch(std::mem::replace(&mut batch, Vec::with_capacity(frames_per_batch)));
            }
            progress.update(source.percent_read());
        }
    };

    if interrupted.is_none() && !assembler.is_empty() {
        let last_no = assembler.last_call_no();
        let frame = Arc::new(Frame::loaded(frames.len(), assembler.finish(), last_no));
        frames.push(Arc::clone(&frame));
        batch.push(frame);
    }
    if !batch.is_empty() {
        on_batch(batch);
    }
    if interrupted.is_none() {
        progress.finish();
    }

    debug!(frames = frames.len(), complete = interrupted.is_none(), "sequential load done");
    SequentialLoad {
        frames,
        api_hint,
        interrupted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventSink;
    use crate::filter::AcceptAll;
    use crate::index::build_index;
    use std::sync::atomic::Ordering;
    use tracedex_storage::{CallScript, MemorySource};

    fn three_frames() -> CallScript {
        let mut s = CallScript::new();
        s.ordinary("glClear");
        s.render("glDrawArrays");
        s.swap();
        s.push_group("shadow");
        s.upload("glBufferData", 64);
        s.render("glDrawElements");
        s.pop_group();
        s.swap();
        s.ordinary("glFlush");
        s
    }

    #[test]
    fn test_materialize_single_frame() {
        let mut source = MemorySource::new(three_frames().into_calls());
        let sink = EventSink::new();
        let cancel = CancelToken::new();
        let index = build_index(&mut source, &cancel, &mut ProgressReporter::new(&sink, 5))
            .unwrap()
            .index;
        let sigs = SignatureCache::new();
        let ctx = MaterializeContext {
            sigs: &sigs,
            filter: &AcceptAll,
            cancel: &cancel,
        };

        let counter = source.decode_counter();
        let before = counter.load(Ordering::Relaxed);
        let contents = materialize_frame(&mut source, 1, index.entry(1).unwrap(), ctx).unwrap();
        assert_eq!(counter.load(Ordering::Relaxed) - before, 5);
        assert_eq!(contents.len(), 5);
        assert_eq!(contents.binary_bytes(), 64);
        assert_eq!(contents.calls()[0].name(), "glPushDebugGroup");
    }

    #[test]
    fn test_short_frame_is_tolerated() {
        let mut source = MemorySource::new(three_frames().into_calls());
        let sigs = SignatureCache::new();
        let cancel = CancelToken::new();
        let ctx = MaterializeContext {
            sigs: &sigs,
            filter: &AcceptAll,
            cancel: &cancel,
        };
        // Declares more calls than remain after the bookmark.
        let entry = FrameBookmark {
            start: tracedex_core::Bookmark::new(8),
            num_calls: 10,
        };
        let contents = materialize_frame(&mut source, 2, &entry, ctx).unwrap();
        assert_eq!(contents.len(), 1);
    }

    #[test]
    fn test_sequential_batches() {
        let mut s = CallScript::new();
        for _ in 0..7 {
            s.ordinary("glClear");
            s.swap();
        }
        let mut source = MemorySource::without_offsets(s.into_calls());
        let sigs = SignatureCache::new();
        let cancel = CancelToken::new();
        let sink = EventSink::new();
        let ctx = MaterializeContext {
            sigs: &sigs,
            filter: &AcceptAll,
            cancel: &cancel,
        };
        let mut batches: Vec<Vec<usize>> = Vec::new();
        let load = materialize_all(&mut source, ctx, 3, &mut ProgressReporter::new(&sink, 5), &mut |b| {
            batches.push(b.iter().map(|f| f.number()).collect())
        });

        assert!(load.interrupted.is_none());
        assert_eq!(load.frames.len(), 7);
        assert_eq!(batches, vec![vec![0, 1, 2], vec![3, 4, 5], vec![6]]);
        assert!(load.frames.iter().all(|f| f.is_loaded()));
        assert_eq!(load.api_hint, Some(Api::Gl));
    }

    #[test]
    fn test_sequential_cancel_keeps_nothing_partial() {
        let mut source = MemorySource::without_offsets(three_frames().into_calls());
        let sigs = SignatureCache::new();
        let cancel = CancelToken::new();
        cancel.cancel();
        let sink = EventSink::new();
        let ctx = MaterializeContext {
            sigs: &sigs,
            filter: &AcceptAll,
            cancel: &cancel,
        };
        let load = materialize_all(&mut source, ctx, 100, &mut ProgressReporter::new(&sink, 5), &mut |_| {});
        assert!(matches!(load.interrupted, Some(Error::Cancelled)));
        assert!(load.frames.is_empty());
    }
}
