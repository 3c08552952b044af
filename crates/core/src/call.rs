//! Calls as yielded by a call source
//!
//! `RawCall` is a fully parsed call with its arguments. `ScannedCall` is what
//! scan mode produces: the sequence number, flags and signature, with argument
//! payloads skipped.

use crate::signature::Signature;
use crate::types::{text_contains, CallFlags, CallNo, CaseSensitivity};
use crate::value::Value;
use smallvec::SmallVec;
use std::fmt::Write as _;
use std::sync::Arc;

/// Argument list; most graphics calls take a handful of arguments
pub type ArgList = SmallVec<[Value; 6]>;

/// A fully decoded call
#[derive(Debug, Clone, PartialEq)]
pub struct RawCall {
    /// Global sequence number
    pub no: CallNo,
    /// Bound function signature
    pub sig: Arc<Signature>,
    /// Argument values, in declaration order
    pub args: ArgList,
    /// Marker flags
    pub flags: CallFlags,
}

impl RawCall {
    /// Create a call
    pub fn new(no: CallNo, sig: Arc<Signature>, args: ArgList, flags: CallFlags) -> Self {
        RawCall {
            no,
            sig,
            args,
            flags,
        }
    }

    /// Function name
    pub fn name(&self) -> &str {
        &self.sig.name
    }

    /// Total size of blob arguments
    pub fn blob_bytes(&self) -> u64 {
        self.args.iter().map(Value::blob_bytes).sum()
    }

    /// Rendered call text: `name(arg=value, ...)`
    pub fn text(&self) -> String {
        render_call_text(&self.sig, &self.args)
    }

    /// Does the name or rendered argument list contain `needle`?
    pub fn contains(&self, needle: &str, case: CaseSensitivity) -> bool {
        text_contains(self.name(), needle, case) || text_contains(&self.text(), needle, case)
    }
}

/// A call decoded in scan mode
#[derive(Debug, Clone)]
pub struct ScannedCall {
    /// Global sequence number
    pub no: CallNo,
    /// Bound function signature
    pub sig: Arc<Signature>,
    /// Marker flags
    pub flags: CallFlags,
}

/// Render `name(arg=value, ...)`
///
/// Arguments past the declared names are shown positionally.
pub fn render_call_text(sig: &Signature, args: &[Value]) -> String {
    let mut out = String::with_capacity(sig.name.len() + 2 + args.len() * 8);
    out.push_str(&sig.name);
    out.push('(');
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        match sig.arg_name(i) {
            Some(name) => {
                let _ = write!(out, "{}={}", name, arg);
            }
            None => {
                let _ = write!(out, "{}", arg);
            }
        }
    }
    out.push(')');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    fn draw_call() -> RawCall {
        let sig = Arc::new(Signature::new(
            1,
            "glDrawArrays",
            vec!["mode".into(), "first".into(), "count".into()],
        ));
        RawCall::new(
            10,
            sig,
            smallvec![Value::UInt(4), Value::SInt(0), Value::SInt(36)],
            CallFlags::RENDER,
        )
    }

    #[test]
    fn test_text_rendering() {
        assert_eq!(draw_call().text(), "glDrawArrays(mode=4, first=0, count=36)");
    }

    #[test]
    fn test_text_rendering_extra_args_positional() {
        let sig = Arc::new(Signature::new(2, "glFoo", vec!["a".into()]));
        let call = RawCall::new(0, sig, smallvec![Value::SInt(1), Value::SInt(2)], CallFlags::NONE);
        assert_eq!(call.text(), "glFoo(a=1, 2)");
    }

    #[test]
    fn test_contains_name_and_args() {
        let call = draw_call();
        assert!(call.contains("DrawArrays", CaseSensitivity::Sensitive));
        assert!(call.contains("count=36", CaseSensitivity::Sensitive));
        assert!(call.contains("DRAWARRAYS", CaseSensitivity::Insensitive));
        assert!(!call.contains("DRAWARRAYS", CaseSensitivity::Sensitive));
        assert!(!call.contains("glClear", CaseSensitivity::Insensitive));
    }

    #[test]
    fn test_blob_bytes() {
        let sig = Arc::new(Signature::new(
            3,
            "glBufferData",
            vec!["target".into(), "size".into(), "data".into()],
        ));
        let call = RawCall::new(
            0,
            sig,
            smallvec![Value::UInt(1), Value::UInt(64), Value::Blob(vec![0; 64])],
            CallFlags::NONE,
        );
        assert_eq!(call.blob_bytes(), 64);
    }
}
