//! Convenient imports for Tracedex.
//!
//! ```ignore
//! use tracedex::prelude::*;
//!
//! let trace = Trace::open("./frame.tdx")?;
//! ```

// Main entry point
pub use crate::trace::{Trace, TraceSummary, TracedexBuilder};

// Error handling
pub use crate::error::{Error, Result};

// Calls and frames
pub use tracedex_engine::{Call, CallRef, FrameContents, LoaderEvent, SearchRequest, SearchStatus};

// Core types
pub use tracedex_core::{Api, CallFlags, CallNo, CaseSensitivity, Value};
