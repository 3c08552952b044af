//! The trace loader
//!
//! `TraceLoader` owns one call source and everything derived from it: the
//! bookmark index, the frame list and the signature cache. All decoding goes
//! through a single mutex around the source.
//!
//! ## Loading
//!
//! - Sources with offset support are indexed in one scan; frames are
//!   materialized later, one at a time, on request.
//! - Other sources are decoded completely in one pass and every frame is
//!   materialized immediately.
//!
//! Either way the loader emits `StartedParsing`, `Parsed` progress,
//! `FramesLoaded`, `GuessedApi` and `FinishedParsing` in that order.
//!
//! ## Locking
//!
//! Lock order is frame cell, then source. Nothing holds the source lock while
//! waiting on a frame cell, so search releases the source before it
//! materializes the frame of a hit.

use parking_lot::{Mutex, RwLock};
use std::path::Path;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use tracedex_core::{Api, CallNo, Error, Result};
use tracedex_storage::{CallSource, FileCallSource};
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::events::{EventSink, LoaderEvent, ProgressReporter};
use crate::filter::{CallFilter, DefaultCallFilter};
use crate::frame::{CallRef, Frame, FrameContents};
use crate::index::{build_index, BookmarkIndex};
use crate::materializer::{materialize_all, materialize_frame, MaterializeContext};
use crate::options::LoaderOptions;
use crate::search::{self, SearchRequest, SearchResult};
use crate::signature_cache::SignatureCache;

// ============================================================================
// State
// ============================================================================

/// Everything known about the loaded stream
#[derive(Debug, Default)]
struct TraceState {
    generation: u64,
    index: Option<BookmarkIndex>,
    frames: Vec<Arc<Frame>>,
    api: Api,
}

/// The source together with the load it belongs to
#[derive(Default)]
struct SourceSlot {
    generation: u64,
    source: Option<Box<dyn CallSource>>,
}

impl SourceSlot {
    fn get(&mut self, generation: u64) -> Result<&mut dyn CallSource> {
        if self.generation != generation {
            return Err(Error::NotFound("trace was reloaded".to_string()));
        }
        match self.source.as_mut() {
            Some(source) => Ok(source.as_mut()),
            None => Err(Error::NotFound("no trace loaded".to_string())),
        }
    }
}

// ============================================================================
// TraceLoader
// ============================================================================

/// Frame-indexed loader over a recorded call stream
pub struct TraceLoader {
    options: LoaderOptions,
    source: Mutex<SourceSlot>,
    state: RwLock<Arc<TraceState>>,
    sigs: SignatureCache,
    filter: RwLock<Arc<dyn CallFilter>>,
    events: EventSink,
    cancel: CancelToken,
}

impl Default for TraceLoader {
    fn default() -> Self {
        Self::new(LoaderOptions::default())
    }
}

impl std::fmt::Debug for TraceLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.snapshot();
        f.debug_struct("TraceLoader")
            .field("options", &self.options)
            .field("frames", &state.frames.len())
            .field("indexed", &state.index.is_some())
            .field("api", &state.api)
            .finish()
    }
}

impl TraceLoader {
    /// Loader with nothing loaded
    pub fn new(options: LoaderOptions) -> Self {
        TraceLoader {
            options,
            source: Mutex::new(SourceSlot::default()),
            state: RwLock::new(Arc::new(TraceState::default())),
            sigs: SignatureCache::new(),
            filter: RwLock::new(Arc::new(DefaultCallFilter::default())),
            events: EventSink::new(),
            cancel: CancelToken::new(),
        }
    }

    /// Replace the default filter
    pub fn with_filter(self, filter: impl CallFilter + 'static) -> Self {
        self.set_filter(Arc::new(filter));
        self
    }

    /// Active options
    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    /// Set the group-root predicate for frames materialized from now on
    pub fn set_filter(&self, filter: Arc<dyn CallFilter>) {
        *self.filter.write() = filter;
    }

    /// Receive loader events
    pub fn subscribe(&self) -> Receiver<LoaderEvent> {
        self.events.subscribe()
    }

    /// Event fan-out
    pub fn events(&self) -> &EventSink {
        &self.events
    }

    /// Token that cancels the running operation
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Signature cache of the loaded stream
    pub fn signatures(&self) -> &SignatureCache {
        &self.sigs
    }

    fn snapshot(&self) -> Arc<TraceState> {
        Arc::clone(&self.state.read())
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Open the trace file at `path` and load it
    ///
    /// Whatever was loaded before is dropped first, even if opening fails.
    pub fn load_trace(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let source = match FileCallSource::open_with(path, self.options.verify_checksums) {
            Ok(source) => source,
            Err(e) => {
                self.unload();
                warn!(path = %path.display(), error = %e, "failed to open trace");
                return Err(e);
            }
        };
        info!(path = %path.display(), "loading trace");
        self.load_source(source)
    }

    /// Load from an already opened source
    pub fn load_source(&self, source: impl CallSource + 'static) -> Result<()> {
        let mut slot = self.source.lock();
        let generation = self.reset(&mut slot);
        let _clear = self.cancel.clear_on_exit();

        let mut source: Box<dyn CallSource> = Box::new(source);
        self.events.emit(LoaderEvent::StartedParsing);
        let mut progress = ProgressReporter::new(&self.events, self.options.progress_step);

        let (state, outcome) = if source.supports_offsets() {
            let scan = build_index(source.as_mut(), &self.cancel, &mut progress)?;
            let frames: Vec<Arc<Frame>> = scan
                .index
                .entries()
                .iter()
                .enumerate()
                .map(|(n, entry)| Arc::new(Frame::new(n, entry.num_calls, scan.index.last_call_no(n))))
                .collect();
            if !frames.is_empty() {
                self.events.emit(LoaderEvent::FramesLoaded(frames.clone()));
            }
            let state = TraceState {
                generation,
                api: pick_api(source.api(), scan.api_hint),
                index: Some(scan.index),
                frames,
            };
            (state, Ok(()))
        } else {
            let filter = Arc::clone(&self.filter.read());
            let ctx = MaterializeContext {
                sigs: &self.sigs,
                filter: filter.as_ref(),
                cancel: &self.cancel,
            };
            let events = &self.events;
            let load = materialize_all(
                source.as_mut(),
                ctx,
                self.options.frames_per_batch,
                &mut progress,
                &mut |batch| events.emit(LoaderEvent::FramesLoaded(batch)),
            );
            let state = TraceState {
                generation,
                api: pick_api(source.api(), load.api_hint),
                index: None,
                frames: load.frames,
            };
            (state, load.interrupted.map_or(Ok(()), Err))
        };

        info!(
            frames = state.frames.len(),
            indexed = state.index.is_some(),
            api = %state.api,
            "trace loaded"
        );
        let api = state.api;
        slot.source = Some(source);
        *self.state.write() = Arc::new(state);
        drop(slot);

        if let Err(e) = outcome {
            warn!(error = %e, "sequential load stopped early");
            return Err(e);
        }
        self.events.emit(LoaderEvent::GuessedApi(api));
        self.events.emit(LoaderEvent::FinishedParsing);
        Ok(())
    }

    /// Drop the loaded stream
    pub fn unload(&self) {
        let mut slot = self.source.lock();
        self.reset(&mut slot);
    }

    fn reset(&self, slot: &mut SourceSlot) -> u64 {
        let generation = slot.generation + 1;
        slot.generation = generation;
        slot.source = None;
        self.sigs.clear();
        *self.state.write() = Arc::new(TraceState {
            generation,
            ..TraceState::default()
        });
        generation
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Number of frames
    pub fn num_frames(&self) -> usize {
        self.snapshot().frames.len()
    }

    /// Calls the index recorded for `frame`; 0 when out of range
    pub fn calls_in_frame(&self, frame: usize) -> u64 {
        self.snapshot().frames.get(frame).map_or(0, |f| f.declared_calls())
    }

    /// Frame `frame`
    pub fn frame(&self, frame: usize) -> Option<Arc<Frame>> {
        self.snapshot().frames.get(frame).cloned()
    }

    /// All frames
    pub fn frames(&self) -> Vec<Arc<Frame>> {
        self.snapshot().frames.clone()
    }

    /// API of the loaded stream
    pub fn api(&self) -> Api {
        self.snapshot().api
    }

    /// Are frames materialized on demand?
    pub fn is_indexed(&self) -> bool {
        self.snapshot().index.is_some()
    }

    /// Calls over all frames
    pub fn total_calls(&self) -> u64 {
        let state = self.snapshot();
        match &state.index {
            Some(index) => index.total_calls(),
            None => state.frames.iter().map(|f| f.declared_calls()).sum(),
        }
    }

    /// Materialize `frame`
    ///
    /// A loaded frame is returned from cache without decoding. Concurrent
    /// callers for the same frame share one materialization.
    pub fn load_frame(&self, frame: usize) -> Result<Arc<FrameContents>> {
        let state = self.snapshot();
        let target = state
            .frames
            .get(frame)
            .cloned()
            .ok_or_else(|| Error::frame_out_of_range(frame as u64, state.frames.len() as u64))?;
        if let Some(contents) = target.contents() {
            return Ok(contents);
        }
        let entry = state
            .index
            .as_ref()
            .and_then(|index| index.entry(frame))
            .copied()
            .ok_or_else(|| Error::Unsupported(format!("frame {} has no bookmark", frame)))?;

        let filter = Arc::clone(&self.filter.read());
        let mut materialized = false;
        let contents = target.get_or_try_load(|| {
            let mut slot = self.source.lock();
            let _clear = self.cancel.clear_on_exit();
            let source = slot.get(state.generation)?;
            materialized = true;
            let ctx = MaterializeContext {
                sigs: &self.sigs,
                filter: filter.as_ref(),
                cancel: &self.cancel,
            };
            materialize_frame(source, frame, &entry, ctx)
        })?;

        if materialized {
            self.events.emit(LoaderEvent::FrameContentsLoaded {
                frame,
                contents: Arc::clone(&contents),
            });
        }
        Ok(contents)
    }

    /// Find the call with sequence number `no`, loading its frame
    pub fn find_call_index(&self, no: CallNo) -> Result<Option<CallRef>> {
        let state = self.snapshot();
        let frame = match &state.index {
            Some(index) => index.frame_of_call(no),
            None => {
                let n = state
                    .frames
                    .partition_point(|f| f.last_call_no().map_or(true, |last| last < no));
                (n < state.frames.len()).then_some(n)
            }
        };
        let Some(frame) = frame else {
            return Err(Error::call_out_of_range(no, self.total_calls()));
        };
        let contents = self.load_frame(frame)?;
        let found = contents
            .find_by_no(no)
            .map(|id| CallRef::new(frame, Arc::clone(&contents), id));
        debug!(no, frame, found = found.is_some(), "call lookup");
        self.events.emit(LoaderEvent::FoundCallIndex(found.clone()));
        Ok(found)
    }

    /// First call of `frame`, loading it if needed
    pub fn find_frame_start(&self, frame: usize) -> Result<Option<CallRef>> {
        let contents = self.load_frame(frame)?;
        let call = contents.first().map(|id| CallRef::new(frame, Arc::clone(&contents), id));
        self.events.emit(LoaderEvent::FoundFrameStart {
            frame,
            call: call.clone(),
        });
        Ok(call)
    }

    /// Last call of `frame`, loading it if needed
    pub fn find_frame_end(&self, frame: usize) -> Result<Option<CallRef>> {
        let contents = self.load_frame(frame)?;
        let call = contents.last().map(|id| CallRef::new(frame, Arc::clone(&contents), id));
        self.events.emit(LoaderEvent::FoundFrameEnd {
            frame,
            call: call.clone(),
        });
        Ok(call)
    }

    /// Search the stream for `request.text`
    ///
    /// Streams without offset support report `SearchStatus::Unsupported`.
    pub fn search(&self, request: SearchRequest) -> Result<SearchResult> {
        let state = self.snapshot();
        let result = match &state.index {
            None => SearchResult::unsupported(),
            Some(index) => {
                let hit = {
                    let mut slot = self.source.lock();
                    let _clear = self.cancel.clear_on_exit();
                    let source = slot.get(state.generation)?;
                    search::find(source, index, &request, &self.cancel)?
                };
                match hit {
                    Some(hit) => {
                        let contents = self.load_frame(hit.frame)?;
                        match contents.find_by_no(hit.no) {
                            Some(id) => SearchResult::found(CallRef::new(hit.frame, contents, id)),
                            None => SearchResult::not_found(),
                        }
                    }
                    None => SearchResult::not_found(),
                }
            }
        };
        self.events.emit(LoaderEvent::SearchResult {
            request,
            result: result.clone(),
        });
        Ok(result)
    }
}

fn pick_api(recorded: Api, hint: Option<Api>) -> Api {
    match recorded {
        Api::Unknown => hint.unwrap_or(Api::Unknown),
        api => api,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::AcceptAll;
    use crate::search::SearchStatus;
    use std::sync::atomic::Ordering;
    use tracedex_storage::{CallScript, MemorySource};

    fn script(frames: usize) -> CallScript {
        let mut s = CallScript::new();
        for _ in 0..frames {
            s.ordinary("glClear");
            s.render("glDrawArrays");
            s.swap();
        }
        s
    }

    #[test]
    fn test_indexed_load() {
        let loader = TraceLoader::default();
        let rx = loader.subscribe();
        loader.load_source(MemorySource::new(script(4).into_calls())).unwrap();

        assert!(loader.is_indexed());
        assert_eq!(loader.num_frames(), 4);
        assert_eq!(loader.calls_in_frame(2), 3);
        assert_eq!(loader.calls_in_frame(9), 0);
        assert_eq!(loader.api(), Api::Gl);
        assert!(loader.frames().iter().all(|f| !f.is_loaded()));

        let events: Vec<LoaderEvent> = rx.try_iter().collect();
        assert!(matches!(events.first(), Some(LoaderEvent::StartedParsing)));
        assert!(matches!(events.last(), Some(LoaderEvent::FinishedParsing)));
        assert!(events.iter().any(|e| matches!(e, LoaderEvent::GuessedApi(Api::Gl))));
    }

    #[test]
    fn test_load_frame_is_idempotent() {
        let source = MemorySource::new(script(3).into_calls());
        let counter = source.decode_counter();
        let loader = TraceLoader::default();
        loader.load_source(source).unwrap();

        let before = counter.load(Ordering::Relaxed);
        let first = loader.load_frame(1).unwrap();
        let after_first = counter.load(Ordering::Relaxed);
        assert_eq!(after_first - before, 3);
        let second = loader.load_frame(1).unwrap();
        assert_eq!(counter.load(Ordering::Relaxed), after_first);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_frame_out_of_range() {
        let loader = TraceLoader::default();
        loader.load_source(MemorySource::new(script(2).into_calls())).unwrap();
        let err = loader.load_frame(2).unwrap_err();
        assert_eq!(err.to_string(), "frame 2 out of range (count is 2)");
    }

    #[test]
    fn test_find_call_and_frame_bounds() {
        let loader = TraceLoader::default();
        loader.load_source(MemorySource::new(script(3).into_calls())).unwrap();

        let call = loader.find_call_index(4).unwrap().unwrap();
        assert_eq!(call.frame(), 1);
        assert_eq!(call.call().name(), "glDrawArrays");

        assert_eq!(loader.find_frame_start(2).unwrap().unwrap().no(), 6);
        assert_eq!(loader.find_frame_end(2).unwrap().unwrap().no(), 8);
        assert!(loader.find_call_index(9).is_err());
    }

    #[test]
    fn test_sequential_fallback() {
        let loader = TraceLoader::new(LoaderOptions::default().with_frames_per_batch(2));
        let rx = loader.subscribe();
        loader
            .load_source(MemorySource::without_offsets(script(5).into_calls()))
            .unwrap();

        assert!(!loader.is_indexed());
        assert_eq!(loader.num_frames(), 5);
        assert!(loader.frames().iter().all(|f| f.is_loaded()));
        let batches: Vec<usize> = rx
            .try_iter()
            .filter_map(|e| match e {
                LoaderEvent::FramesLoaded(b) => Some(b.len()),
                _ => None,
            })
            .collect();
        assert_eq!(batches, vec![2, 2, 1]);

        let call = loader.find_call_index(7).unwrap().unwrap();
        assert_eq!(call.frame(), 2);

        let result = loader.search(SearchRequest::forward(0, "glDrawArrays")).unwrap();
        assert_eq!(result.status, SearchStatus::Unsupported);
    }

    #[test]
    fn test_reload_clears_state() {
        let loader = TraceLoader::new(LoaderOptions::default()).with_filter(AcceptAll);
        loader.load_source(MemorySource::new(script(4).into_calls())).unwrap();
        assert_eq!(loader.signatures().len(), 0);
        loader.load_frame(0).unwrap();
        assert!(loader.signatures().len() > 0);

        let mut s = CallScript::new();
        s.ordinary("vkCmdDraw");
        loader.load_source(MemorySource::new(s.into_calls())).unwrap();
        assert_eq!(loader.num_frames(), 1);
        assert_eq!(loader.signatures().len(), 0);
        assert_eq!(loader.api(), Api::Vulkan);
        assert!(!loader.frame(0).unwrap().is_loaded());
    }

    #[test]
    fn test_recorded_api_wins() {
        let loader = TraceLoader::default();
        loader
            .load_source(MemorySource::new(script(1).into_calls()).with_api(Api::D3D))
            .unwrap();
        assert_eq!(loader.api(), Api::D3D);
    }

    #[test]
    fn test_cancel_between_operations_stops_next_one() {
        let loader = TraceLoader::default();
        loader.load_source(MemorySource::new(script(2).into_calls())).unwrap();
        loader.cancel_token().cancel();
        assert!(loader.load_frame(0).unwrap_err().is_cancelled());
        assert!(!loader.frame(0).unwrap().is_loaded());
        // The cancel is used up by the operation it stopped.
        assert!(loader.load_frame(0).is_ok());
    }

    #[test]
    fn test_cancel_before_search() {
        let loader = TraceLoader::default();
        loader.load_source(MemorySource::new(script(3).into_calls())).unwrap();
        loader.cancel_token().cancel();
        let err = loader.search(SearchRequest::forward(0, "glDrawArrays")).unwrap_err();
        assert!(err.is_cancelled());
        assert!(loader.search(SearchRequest::forward(0, "glDrawArrays")).unwrap().is_found());
    }
}
