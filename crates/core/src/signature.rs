//! Call and enum signatures
//!
//! A trace describes each distinct function and enum once, under a numeric id.
//! Every later call refers to the id. Once bound, a signature never changes.

use std::fmt;

/// Function signature: id, name and argument names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// Id the trace uses to refer to this function
    pub id: u32,
    /// Function name, e.g. `glDrawArrays`
    pub name: String,
    /// Names of the declared arguments, in order
    pub arg_names: Vec<String>,
}

impl Signature {
    /// Create a signature
    pub fn new(id: u32, name: impl Into<String>, arg_names: Vec<String>) -> Self {
        Signature {
            id,
            name: name.into(),
            arg_names,
        }
    }

    /// Name of argument `index`, if declared
    pub fn arg_name(&self, index: usize) -> Option<&str> {
        self.arg_names.get(index).map(String::as_str)
    }

    /// Position of the argument called `name`
    pub fn arg_index(&self, name: &str) -> Option<usize> {
        self.arg_names.iter().position(|n| n == name)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.arg_names.join(", "))
    }
}

/// Enum signature: the symbolic names of an enum type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumSignature {
    /// Id the trace uses to refer to this enum
    pub id: u32,
    /// `(name, value)` pairs
    pub values: Vec<(String, i64)>,
}

impl EnumSignature {
    /// Create an enum signature
    pub fn new(id: u32, values: Vec<(String, i64)>) -> Self {
        EnumSignature { id, values }
    }

    /// Symbolic name for `value`, if any
    pub fn name_of(&self, value: i64) -> Option<&str> {
        self.values
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(n, _)| n.as_str())
    }
}
