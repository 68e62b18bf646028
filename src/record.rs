//! Data model (spec section 3): scalar values, records, and schemas.

use std::cmp::Ordering;
use std::fmt;

/// A single scalar field value. Records carry no per-field type tags beyond
/// this; encoders/decoders own type coercion from their wire format.
#[derive(Clone, Debug, PartialEq, PartialOrd, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Stringify for hashing (spec 4.1: "Integer keys are stringified before hashing").
    pub fn hash_bytes(&self) -> Vec<u8> {
        match self {
            Value::Null => Vec::new(),
            Value::Bool(b) => b.to_string().into_bytes(),
            Value::Int(i) => i.to_string().into_bytes(),
            Value::Float(f) => f.to_string().into_bytes(),
            Value::Str(s) => s.clone().into_bytes(),
        }
    }

    /// Ordering used by the external sort and the merge-join kernel: lexicographic
    /// for strings, numeric for numbers (spec section 3). Mixing types within one
    /// key column is unsupported by the data model; we fall back to a stable but
    /// otherwise unspecified ordering rather than panicking.
    pub fn key_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b).unwrap_or(Ordering::Equal),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)).unwrap_or(Ordering::Equal),
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Null, Value::Null) => Ordering::Equal,
            // Unsupported mixed-type key column: order by a type rank so sorts
            // stay total (and thus still stable), per-type comparisons above win.
            (a, b) => type_rank(a).cmp(&type_rank(b)),
        }
    }
}

fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Int(_) => 2,
        Value::Float(_) => 3,
        Value::Str(_) => 4,
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s}"),
        }
    }
}

/// An ordered tuple of scalar values. Field count and order are fixed by the
/// enclosing `Schema`.
pub type Record = Vec<Value>;

/// A list of field names plus the designated join-key field index.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Schema {
    pub field_names: Vec<String>,
    pub key_index: usize,
}

impl Schema {
    pub fn new(field_names: Vec<String>, key_index: usize) -> Self {
        assert!(
            key_index < field_names.len(),
            "key_index {key_index} out of bounds for {} fields",
            field_names.len()
        );
        Self { field_names, key_index }
    }

    pub fn key_name(&self) -> &str {
        &self.field_names[self.key_index]
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.field_names.iter().position(|f| f == name)
    }

    pub fn len(&self) -> usize {
        self.field_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.field_names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_cmp_numeric_vs_lexicographic() {
        assert_eq!(Value::Int(2).key_cmp(&Value::Int(10)), Ordering::Less);
        assert_eq!(
            Value::Str("2".into()).key_cmp(&Value::Str("10".into())),
            Ordering::Greater
        );
    }

    #[test]
    fn hash_bytes_stringifies_integers() {
        assert_eq!(Value::Int(42).hash_bytes(), b"42".to_vec());
        assert_eq!(Value::Str("42".into()).hash_bytes(), b"42".to_vec());
    }
}
