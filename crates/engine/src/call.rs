//! Materialized calls
//!
//! Calls of one frame live in an arena (`FrameContents::calls`) and refer to
//! each other by `CallId`. A call's parent is either the frame itself or
//! another call of the same frame; grouping re-parents a call by rewriting
//! these indices.

use std::sync::Arc;
use tracedex_core::call::render_call_text;
use tracedex_core::{text_contains, ArgList, CallFlags, CallNo, CaseSensitivity, Value};

use crate::signature_cache::CallSignature;

/// Index of a call within its frame's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CallId(pub(crate) u32);

impl CallId {
    /// Arena position
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Owner of a call in the group tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parent {
    /// Top level of the frame
    Frame,
    /// Child of another call
    Call(CallId),
}

/// One decoded call, placed in its frame's group tree
#[derive(Debug, Clone)]
pub struct Call {
    no: CallNo,
    sig: Arc<CallSignature>,
    args: ArgList,
    flags: CallFlags,
    pub(crate) parent: Parent,
    pub(crate) children: Vec<CallId>,
    pub(crate) alternate_text: Option<String>,
    pub(crate) children_finished: bool,
}

impl Call {
    /// New call, attached to the frame until grouping places it
    pub fn new(no: CallNo, sig: Arc<CallSignature>, args: ArgList, flags: CallFlags) -> Self {
        Call {
            no,
            sig,
            args,
            flags,
            parent: Parent::Frame,
            children: Vec::new(),
            alternate_text: None,
            children_finished: false,
        }
    }

    /// Global sequence number
    pub fn no(&self) -> CallNo {
        self.no
    }

    /// Function name
    pub fn name(&self) -> &str {
        self.sig.name()
    }

    /// Bound signature
    pub fn signature(&self) -> &Arc<CallSignature> {
        &self.sig
    }

    /// Argument values
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Value of the argument called `name`
    pub fn arg(&self, name: &str) -> Option<&Value> {
        let idx = self.sig.signature().arg_index(name)?;
        self.args.get(idx)
    }

    /// Marker flags
    pub fn flags(&self) -> CallFlags {
        self.flags
    }

    /// Owner in the group tree
    pub fn parent(&self) -> Parent {
        self.parent
    }

    /// Calls grouped under this one
    pub fn children(&self) -> &[CallId] {
        &self.children
    }

    /// Does this call head a group?
    pub fn is_group(&self) -> bool {
        !self.children.is_empty()
    }

    /// Label assigned by grouping, if this call heads a group
    pub fn alternate_text(&self) -> Option<&str> {
        self.alternate_text.as_deref()
    }

    /// Whether grouping closed this call's child list
    pub fn children_finished(&self) -> bool {
        self.children_finished
    }

    /// Total size of blob arguments
    pub fn blob_bytes(&self) -> u64 {
        self.args.iter().map(Value::blob_bytes).sum()
    }

    /// Rendered call text: `name(arg=value, ...)`
    pub fn text(&self) -> String {
        render_call_text(self.sig.signature(), &self.args)
    }

    /// Group label if one was assigned, else the call text
    pub fn display_text(&self) -> String {
        match &self.alternate_text {
            Some(label) => label.clone(),
            None => self.text(),
        }
    }

    /// Debug-group label carried in the arguments
    ///
    /// Uses the argument named like a label; push calls without one fall back
    /// to argument 3, the message of the standard debug-group calls.
    pub fn group_name(&self) -> Option<String> {
        let idx = match self.sig.label_arg() {
            Some(idx) => idx,
            None if self.flags.is_push() => 3,
            None => return None,
        };
        self.args.get(idx).map(|v| match v.as_str() {
            Some(s) => s.to_string(),
            None => v.to_string(),
        })
    }

    /// Does the name or rendered text contain `needle`?
    pub fn contains(&self, needle: &str, case: CaseSensitivity) -> bool {
        text_contains(self.name(), needle, case) || text_contains(&self.text(), needle, case)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;
    use tracedex_core::Signature;

    fn bound(name: &str, args: &[&str]) -> Arc<CallSignature> {
        Arc::new(CallSignature::new(Arc::new(Signature::new(
            0,
            name,
            args.iter().map(|s| s.to_string()).collect(),
        ))))
    }

    #[test]
    fn test_group_name_from_message() {
        let call = Call::new(
            1,
            bound("glPushDebugGroup", &["source", "id", "length", "message"]),
            smallvec![
                Value::UInt(0),
                Value::UInt(0),
                Value::SInt(-1),
                Value::from("lighting")
            ],
            CallFlags::MARKER_PUSH,
        );
        assert_eq!(call.group_name().as_deref(), Some("lighting"));
    }

    #[test]
    fn test_group_name_positional_for_push() {
        let call = Call::new(
            1,
            bound("glPushGroupMarkerEXT", &["length", "a", "b", "c"]),
            smallvec![Value::SInt(0), Value::Null, Value::Null, Value::from("blur")],
            CallFlags::MARKER_PUSH,
        );
        assert_eq!(call.group_name().as_deref(), Some("blur"));

        let plain = Call::new(
            2,
            bound("glDrawElements", &["mode", "count", "type", "indices"]),
            smallvec![Value::UInt(4), Value::SInt(3), Value::UInt(0), Value::Pointer(0)],
            CallFlags::RENDER,
        );
        assert_eq!(plain.group_name(), None);
    }

    #[test]
    fn test_display_text_prefers_label() {
        let mut call = Call::new(3, bound("glEnable", &["cap"]), smallvec![Value::UInt(1)], CallFlags::NONE);
        assert_eq!(call.display_text(), "glEnable(cap=1)");
        call.alternate_text = Some("State changes".into());
        assert_eq!(call.display_text(), "State changes");
        assert_eq!(call.arg("cap"), Some(&Value::UInt(1)));
    }

    #[test]
    fn test_contains_case() {
        let call = Call::new(3, bound("glEnable", &["cap"]), smallvec![Value::UInt(2929)], CallFlags::NONE);
        assert!(call.contains("cap=2929", CaseSensitivity::Sensitive));
        assert!(call.contains("GLENABLE", CaseSensitivity::Insensitive));
        assert!(!call.contains("GLENABLE", CaseSensitivity::Sensitive));
    }
}
