//! Argument values carried by recorded calls
//!
//! ## Value Types
//!
//! - Null, Bool, SInt, UInt, Float: scalars
//! - String: text arguments such as shader sources or debug labels
//! - Blob: opaque binary payloads (buffer and texture uploads)
//! - Enum: integer with a symbolic name table
//! - Array: nested values
//! - Pointer: opaque address
//!
//! `Display` renders each value the way the call list shows it; search matches
//! against that rendering.

use crate::signature::EnumSignature;
use std::fmt;
use std::sync::Arc;

/// A decoded argument value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Null / absent value
    Null,
    /// Boolean
    Bool(bool),
    /// Signed integer
    SInt(i64),
    /// Unsigned integer
    UInt(u64),
    /// IEEE-754 double
    Float(f64),
    /// UTF-8 string
    String(String),
    /// Raw bytes
    Blob(Vec<u8>),
    /// Enum value with its signature
    Enum {
        /// Symbol table shared by every value of this enum type
        sig: Arc<EnumSignature>,
        /// Numeric value
        value: i64,
    },
    /// Ordered list of values
    Array(Vec<Value>),
    /// Opaque pointer
    Pointer(u64),
}

impl Value {
    /// Short name of the variant
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::SInt(_) => "SInt",
            Value::UInt(_) => "UInt",
            Value::Float(_) => "Float",
            Value::String(_) => "String",
            Value::Blob(_) => "Blob",
            Value::Enum { .. } => "Enum",
            Value::Array(_) => "Array",
            Value::Pointer(_) => "Pointer",
        }
    }

    /// Borrow as str if this is a String
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow as bytes if this is a Blob
    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            Value::Blob(b) => Some(b),
            _ => None,
        }
    }

    /// Integer view of SInt, UInt and Enum values
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::SInt(i) => Some(*i),
            Value::UInt(u) => i64::try_from(*u).ok(),
            Value::Enum { value, .. } => Some(*value),
            _ => None,
        }
    }

    /// Total blob bytes in this value, including blobs nested in arrays
    pub fn blob_bytes(&self) -> u64 {
        match self {
            Value::Blob(b) => b.len() as u64,
            Value::Array(items) => items.iter().map(Value::blob_bytes).sum(),
            _ => 0,
        }
    }

    /// Check if this is Null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::SInt(i) => write!(f, "{}", i),
            Value::UInt(u) => write!(f, "{}", u),
            Value::Float(x) => write!(f, "{}", x),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Blob(b) => write!(f, "blob({})", b.len()),
            Value::Enum { sig, value } => match sig.name_of(*value) {
                Some(name) => f.write_str(name),
                None => write!(f, "{}", value),
            },
            Value::Array(items) => {
                f.write_str("{")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("}")
            }
            Value::Pointer(p) => write!(f, "0x{:x}", p),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::SInt(i)
    }
}

impl From<u64> for Value {
    fn from(u: u64) -> Self {
        Value::UInt(u)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Blob(b)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn primitive_enum() -> Arc<EnumSignature> {
        Arc::new(EnumSignature::new(
            0,
            vec![("GL_LINES".into(), 1), ("GL_TRIANGLES".into(), 4)],
        ))
    }

    #[test]
    fn test_display_scalars() {
        assert_eq!(Value::Null.to_string(), "NULL");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::SInt(-3).to_string(), "-3");
        assert_eq!(Value::UInt(7).to_string(), "7");
        assert_eq!(Value::Float(0.5).to_string(), "0.5");
        assert_eq!(Value::Pointer(0xdead).to_string(), "0xdead");
    }

    #[test]
    fn test_display_string_is_quoted() {
        assert_eq!(Value::from("shadow pass").to_string(), "\"shadow pass\"");
    }

    #[test]
    fn test_display_enum_uses_symbol() {
        let sig = primitive_enum();
        let v = Value::Enum {
            sig: sig.clone(),
            value: 4,
        };
        assert_eq!(v.to_string(), "GL_TRIANGLES");

        let unknown = Value::Enum { sig, value: 99 };
        assert_eq!(unknown.to_string(), "99");
    }

    #[test]
    fn test_display_array_and_blob() {
        let v = Value::Array(vec![Value::SInt(1), Value::Blob(vec![0; 16])]);
        assert_eq!(v.to_string(), "{1, blob(16)}");
    }

    #[test]
    fn test_blob_bytes_nested() {
        let v = Value::Array(vec![
            Value::Blob(vec![1, 2, 3]),
            Value::Array(vec![Value::Blob(vec![0; 10])]),
            Value::SInt(5),
        ]);
        assert_eq!(v.blob_bytes(), 13);
        assert_eq!(Value::SInt(5).blob_bytes(), 0);
    }

    #[test]
    fn test_accessors() {
        assert_eq!(Value::from("x").as_str(), Some("x"));
        assert_eq!(Value::SInt(1).as_str(), None);
        assert_eq!(Value::from(vec![9u8]).as_blob(), Some(&[9u8][..]));
        assert_eq!(Value::UInt(u64::MAX).as_i64(), None);
        assert_eq!(
            Value::Enum {
                sig: primitive_enum(),
                value: 1
            }
            .as_i64(),
            Some(1)
        );
        assert!(Value::Null.is_null());
        assert_eq!(Value::Float(1.0).type_name(), "Float");
    }
}
