//! Trace storage layer
//!
//! This crate implements the decoder side of the trace loader:
//! - CallSource: the sequential decoder seam the loader drives
//! - FileCallSource: decoder for the on-disk trace format
//! - MemorySource: in-memory source with a decode counter
//! - TraceWriter: encoder for the on-disk trace format
//! - CallScript: builder for call sequences

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod format;
pub mod memory;
pub mod reader;
pub mod script;
pub mod source;
pub mod writer;

pub use memory::MemorySource;
pub use reader::FileCallSource;
pub use script::CallScript;
pub use source::CallSource;
pub use writer::TraceWriter;
