//! Core types for Tracedex
//!
//! This crate defines the vocabulary shared by every layer of the trace loader:
//! - Error: the canonical error enum for decoding, indexing and querying
//! - Value: tagged argument values carried by recorded calls
//! - Signature / EnumSignature: id-bound call and enum descriptions
//! - RawCall / ScannedCall: what a call source yields in parse and scan mode
//! - CallFlags, Api, Bookmark, FrameBookmark: small shared value types

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod call;
pub mod error;
pub mod signature;
pub mod types;
pub mod value;

pub use call::{render_call_text, ArgList, RawCall, ScannedCall};
pub use error::{Error, Result};
pub use signature::{EnumSignature, Signature};
pub use types::{text_contains, Api, Bookmark, CallFlags, CallNo, CaseSensitivity, FrameBookmark};
pub use value::Value;
