//! Typed entities and their untyped record form

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

use super::{Key, Properties, Value};

/// Untyped entity as it travels to and from a backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub key: Key,
    pub properties: Properties,
}

impl EntityRecord {
    pub fn new(key: Key, properties: Properties) -> Self {
        Self { key, properties }
    }

    /// String property, `None` when absent or of another type
    pub fn string(&self, name: &str) -> Option<&str> {
        self.properties.get(name).and_then(Value::as_str)
    }

    /// Key property, `None` when absent, null, or of another type
    pub fn key_property(&self, name: &str) -> Option<&Key> {
        self.properties.get(name).and_then(Value::as_key)
    }
}

/// A record type the client can store and load
///
/// The key is derived from the kind and `id()`; the id itself is not stored
/// as a property.
pub trait Entity: Sized {
    /// Kind name in the store
    const KIND: &'static str;

    /// Key name
    fn id(&self) -> &str;

    /// Properties to persist
    fn to_properties(&self) -> Properties;

    /// Rebuild from a loaded record
    fn from_record(record: EntityRecord) -> Result<Self>;

    /// Key for this entity
    fn key(&self) -> Key {
        Key::new(Self::KIND, self.id())
    }

    /// Record form, ready to be written
    fn to_record(&self) -> EntityRecord {
        EntityRecord::new(self.key(), self.to_properties())
    }
}

/// Check a loaded record belongs to `E` before decoding it
pub(crate) fn expect_kind<E: Entity>(record: &EntityRecord) -> Result<()> {
    if record.key.kind == E::KIND {
        Ok(())
    } else {
        Err(StoreError::InvalidArgument(format!(
            "expected kind {}, got {}",
            E::KIND,
            record.key.kind
        )))
    }
}
