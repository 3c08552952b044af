//! # Tracedex
//!
//! Frame-indexed loader for recorded graphics API call traces.
//!
//! A trace is a long stream of API calls split into frames by end-of-frame
//! calls. Tracedex indexes the frames with one quick scan and decodes a frame
//! only when it is asked for, grouping its calls by debug markers and render
//! calls on the way.
//!
//! ## Quick Start
//!
//! ```ignore
//! use tracedex::prelude::*;
//!
//! let trace = Trace::open("./frame.tdx")?;
//! println!("{} frames", trace.num_frames());
//!
//! // Frames are decoded on first use
//! let contents = trace.frame(3)?;
//!
//! // Search the whole stream
//! if let Some(call) = trace.find("glBindTexture")? {
//!     println!("frame {}: {}", call.frame(), call.call().text());
//! }
//! ```
//!
//! ## Layers
//!
//! - `tracedex-core` (re-exported as `model`) - values, signatures, calls, errors
//! - `tracedex-storage` - the trace file format and call sources
//! - `tracedex-engine` - index, materialization, grouping, search

#![warn(missing_docs)]

mod error;
mod trace;

pub mod prelude;

// Re-export main entry points
pub use error::{Error, Result};
pub use trace::{Trace, TraceSummary, TracedexBuilder};

// Re-export layer crates
pub use tracedex_core as model;
pub use tracedex_engine as engine;
pub use tracedex_storage as storage;
