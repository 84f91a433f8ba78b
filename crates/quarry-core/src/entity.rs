//! # Entity Contract
//!
//! The minimal capability set every storable record type implements.
//!
//! ## What An Entity Provides
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Entity Contract                                 │
//! │                                                                         │
//! │  Entity::schema()        → TableSchema (name, columns, primary key)    │
//! │  entity.base()           → EntityBase { pkid, date_created,            │
//! │                                         date_updated }                 │
//! │  entity.fields()         → Record of the entity's own columns          │
//! │  Entity::from_record(r)  → rebuild from a stored row                   │
//! │                                                                         │
//! │  Provided:                                                              │
//! │  entity.to_record()      → base + fields, ready to insert              │
//! │  entity.primary_key()    → Option<&Value>                              │
//! │  entity.same_identity(o) → primary keys equal                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Implementing
//! ```rust
//! use quarry_core::entity::{Entity, EntityBase};
//! use quarry_core::schema::{ColumnDef, TableSchema};
//! use quarry_core::{ColumnType, EntityError, Record};
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Tag {
//!     base: EntityBase,
//!     label: String,
//! }
//!
//! impl Entity for Tag {
//!     fn schema() -> TableSchema {
//!         TableSchema::new("tags")
//!             .column(ColumnDef::new("label", ColumnType::Text).not_null().unique())
//!     }
//!
//!     fn base(&self) -> &EntityBase {
//!         &self.base
//!     }
//!
//!     fn base_mut(&mut self) -> &mut EntityBase {
//!         &mut self.base
//!     }
//!
//!     fn fields(&self) -> Record {
//!         Record::new().with("label", self.label.as_str())
//!     }
//!
//!     fn from_record(record: Record) -> Result<Self, EntityError> {
//!         Ok(Tag {
//!             base: EntityBase::from_record(&record)?,
//!             label: record.get_text("label")?,
//!         })
//!     }
//! }
//!
//! let tag = Tag { base: EntityBase::new(), label: "rust".into() };
//! assert!(tag.primary_key().is_none());
//! assert_eq!(tag.to_record().len(), 1);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EntityResult;
use crate::schema::{
    KeyStrategy, TableSchema, DATE_CREATED_COLUMN, DATE_UPDATED_COLUMN, PRIMARY_KEY_COLUMN,
};
use crate::value::{Record, Value};

// =============================================================================
// Entity Base
// =============================================================================

/// The columns every entity carries.
///
/// Fields are `None` until the data layer assigns them on insert; callers
/// may pre-fill any of them (a pre-filled `pkid` is kept as-is).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityBase {
    pub pkid: Option<Value>,
    pub date_created: Option<DateTime<Utc>>,
    pub date_updated: Option<DateTime<Utc>>,
}

impl EntityBase {
    /// An unsaved entity: no key, no timestamps.
    pub fn new() -> Self {
        EntityBase::default()
    }

    /// An unsaved entity with a caller-chosen key.
    pub fn with_pkid(pkid: impl Into<Value>) -> Self {
        EntityBase {
            pkid: Some(pkid.into()),
            ..EntityBase::default()
        }
    }

    /// Reads the base columns out of a stored row.
    pub fn from_record(record: &Record) -> EntityResult<Self> {
        let pkid = match record.get(PRIMARY_KEY_COLUMN) {
            None | Some(Value::Null) => None,
            Some(value) => Some(value.clone()),
        };
        Ok(EntityBase {
            pkid,
            date_created: record.get_opt_timestamp(DATE_CREATED_COLUMN)?,
            date_updated: record.get_opt_timestamp(DATE_UPDATED_COLUMN)?,
        })
    }

    /// Writes the populated base columns into `record`.
    pub fn write_into(&self, record: &mut Record) {
        if let Some(pkid) = &self.pkid {
            record.insert(PRIMARY_KEY_COLUMN, pkid.clone());
        }
        if let Some(created) = self.date_created {
            record.insert(DATE_CREATED_COLUMN, created);
        }
        if let Some(updated) = self.date_updated {
            record.insert(DATE_UPDATED_COLUMN, updated);
        }
    }

    /// True once the entity has been stored (or given a key by the caller).
    pub fn has_key(&self) -> bool {
        self.pkid.as_ref().map(|v| !v.is_null()).unwrap_or(false)
    }
}

// =============================================================================
// Entity Trait
// =============================================================================

/// A storable record type.
///
/// Implementations are plain structs owned by the caller. The data layer
/// never keeps references to them past a single operation.
pub trait Entity: Sized + Send + Sync + Unpin + 'static {
    /// Table identity: name, columns, primary key.
    fn schema() -> TableSchema;

    /// Key and timestamps.
    fn base(&self) -> &EntityBase;

    fn base_mut(&mut self) -> &mut EntityBase;

    /// Values of the entity's own columns (base columns excluded).
    fn fields(&self) -> Record;

    /// Rebuilds the entity from a full stored row.
    fn from_record(record: Record) -> EntityResult<Self>;

    /// The full record: base columns plus `fields()`.
    fn to_record(&self) -> Record {
        let mut record = self.fields();
        self.base().write_into(&mut record);
        record
    }

    fn primary_key(&self) -> Option<&Value> {
        self.base().pkid.as_ref().filter(|v| !v.is_null())
    }

    /// Identity comparison: two entities are the same row when both have
    /// a primary key and the keys are equal.
    fn same_identity(&self, other: &Self) -> bool {
        match (self.primary_key(), other.primary_key()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

// =============================================================================
// Insert Preparation
// =============================================================================

/// Fills in the key and timestamps a record needs before insert.
///
/// ## Rules
/// - `KeyStrategy::Uuid`: missing/null `pkid` gets a fresh UUID v4
/// - `KeyStrategy::AutoIncrement`: missing/null `pkid` is dropped so the
///   store assigns the rowid
/// - missing/null `date_created` / `date_updated` become `now`
pub fn prepare_insert(schema: &TableSchema, record: &mut Record, now: DateTime<Utc>) {
    if record.is_missing(PRIMARY_KEY_COLUMN) {
        match schema.strategy() {
            KeyStrategy::Uuid => {
                record.insert(PRIMARY_KEY_COLUMN, Uuid::new_v4());
            }
            KeyStrategy::AutoIncrement => {
                record.remove(PRIMARY_KEY_COLUMN);
            }
        }
    }
    if record.is_missing(DATE_CREATED_COLUMN) {
        record.insert(DATE_CREATED_COLUMN, now);
    }
    if record.is_missing(DATE_UPDATED_COLUMN) {
        record.insert(DATE_UPDATED_COLUMN, now);
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
