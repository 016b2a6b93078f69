//! Entity keys
//!
//! Keys are always named (string id); the harness never asks the store to
//! allocate numeric ids.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Identifies one entity: kind, name, and an optional ancestor chain
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Key {
    pub kind: String,
    pub name: String,
    pub parent: Option<Box<Key>>,
}

impl Key {
    /// Create a root key
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            parent: None,
        }
    }

    /// Create a key under `parent`
    pub fn with_parent(kind: impl Into<String>, name: impl Into<String>, parent: Key) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            parent: Some(Box::new(parent)),
        }
    }

    /// A key is complete when every element of its path has a kind and a name
    pub fn is_complete(&self) -> bool {
        !self.kind.is_empty()
            && !self.name.is_empty()
            && self.parent.as_ref().map_or(true, |p| p.is_complete())
    }

    /// Fail with `InvalidKey` unless complete
    pub fn ensure_complete(&self) -> Result<()> {
        if self.is_complete() {
            Ok(())
        } else {
            Err(StoreError::InvalidKey(format!("incomplete key {}", self)))
        }
    }

    /// Path elements from the root ancestor down to this key
    pub fn path(&self) -> Vec<(&str, &str)> {
        let mut path = match &self.parent {
            Some(parent) => parent.path(),
            None => Vec::new(),
        };
        path.push((self.kind.as_str(), self.name.as_str()));
        path
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(parent) = &self.parent {
            write!(f, "{}/", parent)?;
        }
        write!(f, "{},{:?}", self.kind, self.name)
    }
}
