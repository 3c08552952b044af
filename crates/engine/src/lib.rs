//! Frame-indexed trace loading
//!
//! This crate turns a `CallSource` into browsable frames:
//! - index: one flags-only scan recording a bookmark per frame
//! - materializer: on-demand decoding of single frames, or of the whole
//!   stream when the source cannot seek
//! - grouping: reconstruction of debug-marker and render groups
//! - search: forward and backward substring search from a frame bookmark
//! - signature_cache: per-stream cache of call and enum signatures
//! - loader: `TraceLoader`, which ties these together and emits events
//! - worker: `LoaderHandle`, the loader on its own thread

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod call;
pub mod cancel;
pub mod events;
pub mod filter;
pub mod frame;
pub mod grouping;
pub mod index;
pub mod loader;
pub mod materializer;
pub mod options;
pub mod search;
pub mod signature_cache;
pub mod worker;

pub use call::{Call, CallId, Parent};
pub use cancel::CancelToken;
pub use events::{EventSink, LoaderEvent, ProgressReporter};
pub use filter::{AcceptAll, CallFilter, DefaultCallFilter, FilterOptions};
pub use frame::{CallRef, Frame, FrameContents};
pub use grouping::{group_calls, FrameAssembler, GroupState, STATE_GROUP};
pub use index::{build_index, BookmarkIndex, IndexScan};
pub use loader::TraceLoader;
pub use materializer::{materialize_all, materialize_frame, MaterializeContext, SequentialLoad};
pub use options::LoaderOptions;
pub use search::{SearchDirection, SearchHit, SearchRequest, SearchResult, SearchStatus};
pub use signature_cache::{CacheStats, CallSignature, SignatureCache};
pub use worker::{Command, LoaderHandle};
