//! Property values
//!
//! The value types the harness' records use. Anything else the remote store
//! returns is decoded as `Null`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Key;

/// Named properties of an entity, ordered by name
pub type Properties = BTreeMap<String, Value>;

/// A single property value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    String(String),
    Integer(i64),
    Boolean(bool),
    Key(Key),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_key(&self) -> Option<&Key> {
        match self {
            Value::Key(k) => Some(k),
            _ => None,
        }
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

impl From<Option<Key>> for Value {
    fn from(key: Option<Key>) -> Self {
        key.map_or(Value::Null, Value::Key)
    }
}
