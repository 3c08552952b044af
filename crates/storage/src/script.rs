//! Call sequence builder
//!
//! `CallScript` assembles `RawCall` sequences with consecutive sequence numbers
//! and interned signatures. Tests and the CLI's sample generator use it to
//! produce traces without hand-building signatures.

use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracedex_core::{ArgList, CallFlags, CallNo, RawCall, Signature, Value};

/// Argument names of the standard debug-group push call
const PUSH_GROUP_ARGS: [&str; 4] = ["source", "id", "length", "message"];

/// Builder for call sequences
#[derive(Debug, Default)]
pub struct CallScript {
    calls: Vec<RawCall>,
    sigs: FxHashMap<String, Arc<Signature>>,
    next_no: CallNo,
}

impl CallScript {
    /// Empty script numbering calls from 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Signature for `name`, created on first use
    ///
    /// A name keeps the argument names it was first declared with.
    pub fn signature(&mut self, name: &str, arg_names: &[&str]) -> Arc<Signature> {
        let next_id = self.sigs.len() as u32;
        self.sigs
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(Signature::new(
                    next_id,
                    name,
                    arg_names.iter().map(|s| s.to_string()).collect(),
                ))
            })
            .clone()
    }

    /// Append a call with named arguments
    pub fn call(&mut self, name: &str, args: &[(&str, Value)], flags: CallFlags) -> CallNo {
        let names: Vec<&str> = args.iter().map(|(n, _)| *n).collect();
        let sig = self.signature(name, &names);
        let args: ArgList = args.iter().map(|(_, v)| v.clone()).collect();
        let no = self.next_no;
        self.next_no += 1;
        self.calls.push(RawCall::new(no, sig, args, flags));
        no
    }

    /// Append an argument-less call with no flags
    pub fn ordinary(&mut self, name: &str) -> CallNo {
        self.call(name, &[], CallFlags::NONE)
    }

    /// Append a render call
    pub fn render(&mut self, name: &str) -> CallNo {
        self.call(name, &[], CallFlags::RENDER)
    }

    /// Append an argument-less group push
    pub fn push(&mut self, name: &str) -> CallNo {
        self.call(name, &[], CallFlags::MARKER_PUSH)
    }

    /// Append `glPushDebugGroup` with `label` as its message
    pub fn push_group(&mut self, label: &str) -> CallNo {
        let values = [
            Value::UInt(0x824A),
            Value::UInt(0),
            Value::SInt(-1),
            Value::String(label.to_string()),
        ];
        let args: Vec<(&str, Value)> = PUSH_GROUP_ARGS.iter().copied().zip(values).collect();
        self.call("glPushDebugGroup", &args, CallFlags::MARKER_PUSH)
    }

    /// Append a group pop named `name`
    pub fn pop(&mut self, name: &str) -> CallNo {
        self.call(name, &[], CallFlags::MARKER_POP)
    }

    /// Append `glPopDebugGroup`
    pub fn pop_group(&mut self) -> CallNo {
        self.pop("glPopDebugGroup")
    }

    /// Append a frame terminator named `name`
    pub fn end_frame(&mut self, name: &str) -> CallNo {
        self.call(name, &[], CallFlags::END_FRAME)
    }

    /// Append `glXSwapBuffers`
    pub fn swap(&mut self) -> CallNo {
        self.end_frame("glXSwapBuffers")
    }

    /// Append a call carrying a blob payload of `len` bytes
    pub fn upload(&mut self, name: &str, len: usize) -> CallNo {
        self.call(
            name,
            &[("size", Value::UInt(len as u64)), ("data", Value::Blob(vec![0xAB; len]))],
            CallFlags::NONE,
        )
    }

    /// Calls so far
    pub fn calls(&self) -> &[RawCall] {
        &self.calls
    }

    /// Number of calls so far
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    /// Check if no calls were added
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Finish and take the calls
    pub fn into_calls(self) -> Vec<RawCall> {
        self.calls
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_numbers_and_interning() {
        let mut s = CallScript::new();
        assert_eq!(s.ordinary("glEnable"), 0);
        assert_eq!(s.render("glDrawArrays"), 1);
        assert_eq!(s.ordinary("glEnable"), 2);
        let calls = s.into_calls();
        assert!(Arc::ptr_eq(&calls[0].sig, &calls[2].sig));
        assert_ne!(calls[0].sig.id, calls[1].sig.id);
        assert!(calls[1].flags.is_render());
    }

    #[test]
    fn test_push_group_carries_message() {
        let mut s = CallScript::new();
        s.push_group("shadow pass");
        let call = &s.calls()[0];
        assert!(call.flags.is_push());
        assert_eq!(call.sig.arg_name(3), Some("message"));
        assert_eq!(call.args[3].as_str(), Some("shadow pass"));
    }

    #[test]
    fn test_upload_blob() {
        let mut s = CallScript::new();
        s.upload("glBufferData", 32);
        assert_eq!(s.calls()[0].blob_bytes(), 32);
    }
}
