//! Benchmark fixtures
//!
//! The three record kinds the operations write, and generators producing
//! fixed-size batches of them with fresh UUID identifiers.

use uuid::Uuid;

use crate::datastore::{Entity, EntityRecord, Key, Properties, Value};
use crate::error::Result;

/// Records per generated batch
pub const BATCH_SIZE: usize = 5;

/// Value written to every `Name` property
pub const PLACEHOLDER_NAME: &str = "Hoge";

const NAME: &str = "Name";
const PARENT: &str = "Parent";

/// A record that can be generated with a fresh identifier
pub trait Fixture: Entity {
    fn generate() -> Self;
}

/// `BATCH_SIZE` freshly generated records
pub fn generate_batch<F: Fixture>() -> Vec<F> {
    (0..BATCH_SIZE).map(|_| F::generate()).collect()
}

/// A fresh UUID v4 string
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// DummyObject
// =============================================================================

/// Record with an optional reference to another record's key
///
/// `parent` is an ordinary key-valued property; it does not place the
/// record under an ancestor.
#[derive(Debug, Clone, PartialEq)]
pub struct DummyObject {
    pub id: String,
    pub parent: Option<Key>,
    pub name: String,
}

impl DummyObject {
    pub fn with_parent(id: impl Into<String>, parent: Key) -> Self {
        Self {
            id: id.into(),
            parent: Some(parent),
            name: String::new(),
        }
    }
}

impl Entity for DummyObject {
    const KIND: &'static str = "DummyObject";

    fn id(&self) -> &str {
        &self.id
    }

    fn to_properties(&self) -> Properties {
        let mut properties = Properties::new();
        properties.insert(PARENT.to_string(), Value::from(self.parent.clone()));
        properties.insert(NAME.to_string(), Value::from(self.name.as_str()));
        properties
    }

    fn from_record(record: EntityRecord) -> Result<Self> {
        Ok(Self {
            name: record.string(NAME).unwrap_or_default().to_string(),
            parent: record.key_property(PARENT).cloned(),
            id: record.key.name,
        })
    }
}

impl Fixture for DummyObject {
    fn generate() -> Self {
        Self {
            id: new_id(),
            parent: None,
            name: PLACEHOLDER_NAME.to_string(),
        }
    }
}

// =============================================================================
// DummyObject2 / DummyObject3
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct DummyObject2 {
    pub id: String,
    pub name: String,
}

impl DummyObject2 {
    /// Record carrying only an id, used for key construction
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
        }
    }
}

impl Entity for DummyObject2 {
    const KIND: &'static str = "DummyObject2";

    fn id(&self) -> &str {
        &self.id
    }

    fn to_properties(&self) -> Properties {
        name_only(&self.name)
    }

    fn from_record(record: EntityRecord) -> Result<Self> {
        Ok(Self {
            name: record.string(NAME).unwrap_or_default().to_string(),
            id: record.key.name,
        })
    }
}

impl Fixture for DummyObject2 {
    fn generate() -> Self {
        Self {
            id: new_id(),
            name: PLACEHOLDER_NAME.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DummyObject3 {
    pub id: String,
    pub name: String,
}

impl Entity for DummyObject3 {
    const KIND: &'static str = "DummyObject3";

    fn id(&self) -> &str {
        &self.id
    }

    fn to_properties(&self) -> Properties {
        name_only(&self.name)
    }

    fn from_record(record: EntityRecord) -> Result<Self> {
        Ok(Self {
            name: record.string(NAME).unwrap_or_default().to_string(),
            id: record.key.name,
        })
    }
}

impl Fixture for DummyObject3 {
    fn generate() -> Self {
        Self {
            id: new_id(),
            name: PLACEHOLDER_NAME.to_string(),
        }
    }
}

fn name_only(name: &str) -> Properties {
    let mut properties = Properties::new();
    properties.insert(NAME.to_string(), Value::from(name));
    properties
}
