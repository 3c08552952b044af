//! Tagged value encoding
//!
//! ```text
//! 0 Null
//! 1 Bool     u8
//! 2 SInt     zigzag varint
//! 3 UInt     varint
//! 4 Float    f64 LE
//! 5 String   varint len + utf8
//! 6 Blob     varint len + bytes
//! 7 Enum     varint (id << 1 | defines) [varint count, count x (string, zigzag)] zigzag
//! 8 Array    varint n + n values
//! 9 Pointer  u64 LE
//! ```

use rustc_hash::{FxHashMap, FxHashSet};
use std::io::Read;
use std::sync::Arc;
use tracedex_core::{EnumSignature, Result, Signature, Value};

use super::cursor::EventCursor;
use super::varint::{encode_varint, encode_zigzag};

/// Deepest array nesting accepted by the decoder
pub const MAX_NESTING: usize = 16;

/// Value type tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ValueTag {
    /// Null
    Null = 0,
    /// Bool
    Bool = 1,
    /// Signed integer
    SInt = 2,
    /// Unsigned integer
    UInt = 3,
    /// Double
    Float = 4,
    /// String
    String = 5,
    /// Blob
    Blob = 6,
    /// Enum
    Enum = 7,
    /// Array
    Array = 8,
    /// Pointer
    Pointer = 9,
}

impl ValueTag {
    /// Parse a tag byte
    pub fn from_byte(b: u8) -> Option<Self> {
        Some(match b {
            0 => ValueTag::Null,
            1 => ValueTag::Bool,
            2 => ValueTag::SInt,
            3 => ValueTag::UInt,
            4 => ValueTag::Float,
            5 => ValueTag::String,
            6 => ValueTag::Blob,
            7 => ValueTag::Enum,
            8 => ValueTag::Array,
            9 => ValueTag::Pointer,
            _ => return None,
        })
    }

    /// Tag for a value
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => ValueTag::Null,
            Value::Bool(_) => ValueTag::Bool,
            Value::SInt(_) => ValueTag::SInt,
            Value::UInt(_) => ValueTag::UInt,
            Value::Float(_) => ValueTag::Float,
            Value::String(_) => ValueTag::String,
            Value::Blob(_) => ValueTag::Blob,
            Value::Enum { .. } => ValueTag::Enum,
            Value::Array(_) => ValueTag::Array,
            Value::Pointer(_) => ValueTag::Pointer,
        }
    }
}

// ============================================================================
// Signature tables
// ============================================================================

/// Signatures defined so far in a stream
///
/// Definitions are kept for the lifetime of the source so that decoding can
/// resume at any bookmark after the first sequential pass.
#[derive(Debug, Default)]
pub struct SignatureTables {
    calls: FxHashMap<u32, Arc<Signature>>,
    enums: FxHashMap<u32, Arc<EnumSignature>>,
}

impl SignatureTables {
    /// Empty tables
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a call signature; an id already bound keeps its first definition
    pub fn define_call(&mut self, sig: Signature) -> Arc<Signature> {
        self.calls.entry(sig.id).or_insert_with(|| Arc::new(sig)).clone()
    }

    /// Look up a call signature
    pub fn call(&self, id: u32) -> Option<Arc<Signature>> {
        self.calls.get(&id).cloned()
    }

    /// Bind an enum signature; an id already bound keeps its first definition
    pub fn define_enum(&mut self, sig: EnumSignature) -> Arc<EnumSignature> {
        self.enums.entry(sig.id).or_insert_with(|| Arc::new(sig)).clone()
    }

    /// Look up an enum signature
    pub fn enum_sig(&self, id: u32) -> Option<Arc<EnumSignature>> {
        self.enums.get(&id).cloned()
    }

    /// Number of bound call signatures
    pub fn call_count(&self) -> usize {
        self.calls.len()
    }

    /// Forget every definition
    pub fn clear(&mut self) {
        self.calls.clear();
        self.enums.clear();
    }
}

// ============================================================================
// Encoding
// ============================================================================

/// Append `value` to `buf`
///
/// Enum signatures are written inline the first time their id appears;
/// `defined_enums` tracks which ids the stream already carries.
pub fn encode_value(value: &Value, buf: &mut Vec<u8>, defined_enums: &mut FxHashSet<u32>) {
    buf.push(ValueTag::of(value) as u8);
    match value {
        Value::Null => {}
        Value::Bool(b) => buf.push(u8::from(*b)),
        Value::SInt(i) => encode_zigzag(*i, buf),
        Value::UInt(u) => encode_varint(*u, buf),
        Value::Float(x) => buf.extend_from_slice(&x.to_le_bytes()),
        Value::String(s) => {
            encode_varint(s.len() as u64, buf);
            buf.extend_from_slice(s.as_bytes());
        }
        Value::Blob(b) => {
            encode_varint(b.len() as u64, buf);
            buf.extend_from_slice(b);
        }
        Value::Enum { sig, value } => {
            let defines = defined_enums.insert(sig.id);
            encode_varint(((sig.id as u64) << 1) | u64::from(defines), buf);
            if defines {
                encode_varint(sig.values.len() as u64, buf);
                for (name, v) in &sig.values {
                    encode_varint(name.len() as u64, buf);
                    buf.extend_from_slice(name.as_bytes());
                    encode_zigzag(*v, buf);
                }
            }
            encode_zigzag(*value, buf);
        }
        Value::Array(items) => {
            encode_varint(items.len() as u64, buf);
            for item in items {
                encode_value(item, buf, defined_enums);
            }
        }
        Value::Pointer(p) => buf.extend_from_slice(&p.to_le_bytes()),
    }
}

// ============================================================================
// Decoding
// ============================================================================

/// Decode one value
///
/// With `keep == false` string and blob payloads are skipped and `Value::Null`
/// is returned, but enum definitions are still bound in `tables`.
pub fn decode_value<R: Read>(
    cur: &mut EventCursor<R>,
    tables: &mut SignatureTables,
    keep: bool,
) -> Result<Value> {
    decode_nested(cur, tables, keep, 0)
}

fn decode_nested<R: Read>(
    cur: &mut EventCursor<R>,
    tables: &mut SignatureTables,
    keep: bool,
    depth: usize,
) -> Result<Value> {
    let tag_byte = cur.read_u8()?;
    let tag = ValueTag::from_byte(tag_byte)
        .ok_or_else(|| cur.corrupt(format!("unknown value tag {}", tag_byte)))?;
    let value = match tag {
        ValueTag::Null => Value::Null,
        ValueTag::Bool => Value::Bool(cur.read_u8()? != 0),
        ValueTag::SInt => Value::SInt(cur.read_zigzag()?),
        ValueTag::UInt => Value::UInt(cur.read_varint()?),
        ValueTag::Float => Value::Float(cur.read_f64()?),
        ValueTag::String => {
            if !keep {
                cur.skip_prefixed()?;
                return Ok(Value::Null);
            }
            Value::String(cur.read_string()?)
        }
        ValueTag::Blob => {
            if !keep {
                cur.skip_prefixed()?;
                return Ok(Value::Null);
            }
            let len = cur.read_len()?;
            Value::Blob(cur.read_bytes(len)?)
        }
        ValueTag::Enum => {
            let sig = decode_enum_signature(cur, tables)?;
            let value = cur.read_zigzag()?;
            Value::Enum { sig, value }
        }
        ValueTag::Array => {
            if depth >= MAX_NESTING {
                return Err(cur.corrupt("array nesting too deep"));
            }
            let n = cur.read_len()?;
            let mut items = Vec::with_capacity(if keep { n } else { 0 });
            for _ in 0..n {
                let item = decode_nested(cur, tables, keep, depth + 1)?;
                if keep {
                    items.push(item);
                }
            }
            Value::Array(items)
        }
        ValueTag::Pointer => Value::Pointer(cur.read_u64()?),
    };
    Ok(if keep { value } else { Value::Null })
}

fn decode_enum_signature<R: Read>(
    cur: &mut EventCursor<R>,
    tables: &mut SignatureTables,
) -> Result<Arc<EnumSignature>> {
    let raw = cur.read_varint()?;
    let id = u32::try_from(raw >> 1).map_err(|_| cur.corrupt("enum id overflows u32"))?;
    if raw & 1 == 1 {
        let count = cur.read_len()?;
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            let name = cur.read_string()?;
            let v = cur.read_zigzag()?;
            values.push((name, v));
        }
        Ok(tables.define_enum(EnumSignature::new(id, values)))
    } else {
        tables
            .enum_sig(id)
            .ok_or_else(|| cur.corrupt(format!("reference to undefined enum {}", id)))
    }
}
