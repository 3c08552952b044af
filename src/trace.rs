//! Main entry point for Tracedex.
//!
//! `Trace` wraps a loaded `TraceLoader` with a small, blocking API: open a
//! file, ask for frames, look calls up, search.

use crate::error::Result;
use serde::Serialize;
use std::path::Path;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use tracedex_core::{Api, CallNo, CaseSensitivity};
use tracedex_engine::{
    AcceptAll, CallFilter, CallRef, CancelToken, DefaultCallFilter, FilterOptions, FrameContents,
    LoaderEvent, LoaderHandle, LoaderOptions, SearchRequest, SearchResult, TraceLoader,
};
use tracedex_storage::CallSource;

/// A loaded trace.
///
/// # Example
///
/// ```ignore
/// use tracedex::prelude::*;
///
/// let trace = Trace::open("./frame.tdx")?;
/// let contents = trace.frame(0)?;
/// for call in contents.top_level_calls() {
///     println!("{}", call.display_text());
/// }
/// ```
#[derive(Debug)]
pub struct Trace {
    loader: TraceLoader,
}

/// Counts describing a loaded trace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TraceSummary {
    /// Number of frames
    pub frames: usize,
    /// Number of calls
    pub calls: u64,
    /// Recorded or inferred API
    pub api: Api,
    /// Frames are materialized on demand
    pub indexed: bool,
}

impl Trace {
    /// Open the trace at `path` with default settings.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::builder().open(path)
    }

    /// Load from an already opened call source.
    pub fn from_source(source: impl CallSource + 'static) -> Result<Self> {
        Self::builder().from_source(source)
    }

    /// Create a builder for loader configuration.
    pub fn builder() -> TracedexBuilder {
        TracedexBuilder::new()
    }

    /// Number of frames.
    pub fn num_frames(&self) -> usize {
        self.loader.num_frames()
    }

    /// Calls in `frame` as recorded by the index; 0 when out of range.
    pub fn calls_in_frame(&self, frame: usize) -> u64 {
        self.loader.calls_in_frame(frame)
    }

    /// Recorded or inferred API.
    pub fn api(&self) -> Api {
        self.loader.api()
    }

    /// Frame, call and API counts.
    pub fn summary(&self) -> TraceSummary {
        TraceSummary {
            frames: self.loader.num_frames(),
            calls: self.loader.total_calls(),
            api: self.loader.api(),
            indexed: self.loader.is_indexed(),
        }
    }

    /// Grouped contents of `frame`, materializing it on first use.
    pub fn frame(&self, frame: usize) -> Result<Arc<FrameContents>> {
        Ok(self.loader.load_frame(frame)?)
    }

    /// Has `frame` been materialized?
    pub fn is_frame_loaded(&self, frame: usize) -> bool {
        self.loader.frame(frame).map_or(false, |f| f.is_loaded())
    }

    /// Call with sequence number `no`.
    pub fn call(&self, no: CallNo) -> Result<Option<CallRef>> {
        Ok(self.loader.find_call_index(no)?)
    }

    /// First call of `frame`.
    pub fn frame_start(&self, frame: usize) -> Result<Option<CallRef>> {
        Ok(self.loader.find_frame_start(frame)?)
    }

    /// Last call of `frame`.
    pub fn frame_end(&self, frame: usize) -> Result<Option<CallRef>> {
        Ok(self.loader.find_frame_end(frame)?)
    }

    /// Case-sensitive forward search for `text` from the first frame.
    pub fn find(&self, text: &str) -> Result<Option<CallRef>> {
        Ok(self.search(SearchRequest::forward(0, text))?.call)
    }

    /// Case-insensitive forward search for `text` from the first frame.
    pub fn find_ignore_case(&self, text: &str) -> Result<Option<CallRef>> {
        let request = SearchRequest::forward(0, text).with_case(CaseSensitivity::Insensitive);
        Ok(self.search(request)?.call)
    }

    /// Run a search request.
    pub fn search(&self, request: SearchRequest) -> Result<SearchResult> {
        Ok(self.loader.search(request)?)
    }

    /// Receive loader events.
    pub fn subscribe(&self) -> Receiver<LoaderEvent> {
        self.loader.subscribe()
    }

    /// Token that cancels the running operation.
    pub fn cancel_token(&self) -> CancelToken {
        self.loader.cancel_token()
    }

    /// The underlying loader.
    pub fn loader(&self) -> &TraceLoader {
        &self.loader
    }

    /// Move the loader onto a background thread.
    pub fn into_background(self) -> LoaderHandle {
        self.loader.spawn()
    }
}

/// Builder for loader configuration.
///
/// # Example
///
/// ```ignore
/// let trace = Trace::builder()
///     .frames_per_batch(10)
///     .accept_all()
///     .open("./frame.tdx")?;
/// ```
pub struct TracedexBuilder {
    options: LoaderOptions,
    filter: Option<Arc<dyn CallFilter>>,
}

impl TracedexBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            options: LoaderOptions::default(),
            filter: None,
        }
    }

    /// Replace all loader options.
    pub fn options(mut self, options: LoaderOptions) -> Self {
        self.options = options;
        self
    }

    /// Frames per `FramesLoaded` batch when the trace cannot seek.
    pub fn frames_per_batch(mut self, n: usize) -> Self {
        self.options = self.options.with_frames_per_batch(n);
        self
    }

    /// Minimum progress step, in percent.
    pub fn progress_step(mut self, step: u8) -> Self {
        self.options = self.options.with_progress_step(step);
        self
    }

    /// Check per-call checksums while decoding.
    pub fn verify_checksums(mut self, verify: bool) -> Self {
        self.options = self.options.with_verify_checksums(verify);
        self
    }

    /// Let every call head a group.
    pub fn accept_all(mut self) -> Self {
        self.filter = Some(Arc::new(AcceptAll));
        self
    }

    /// Use the default filter with `options` and an optional exclude substring.
    pub fn hide(mut self, options: FilterOptions, custom_exclude: &str) -> Self {
        let filter = DefaultCallFilter::new(options).with_custom_exclude(custom_exclude);
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Use a custom group-root predicate.
    pub fn filter(mut self, filter: impl CallFilter + 'static) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }

    fn build(self) -> TraceLoader {
        let loader = TraceLoader::new(self.options);
        if let Some(filter) = self.filter {
            loader.set_filter(filter);
        }
        loader
    }

    /// Open and load the trace at `path`.
    pub fn open(self, path: impl AsRef<Path>) -> Result<Trace> {
        let loader = self.build();
        loader.load_trace(path)?;
        Ok(Trace { loader })
    }

    /// Load from an already opened call source.
    pub fn from_source(self, source: impl CallSource + 'static) -> Result<Trace> {
        let loader = self.build();
        loader.load_source(source)?;
        Ok(Trace { loader })
    }
}

impl Default for TracedexBuilder {
    fn default() -> Self {
        Self::new()
    }
}
