//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use quarry_core::{
    ColumnDef, ColumnType, DbSettings, Entity, EntityBase, EntityError, KeyStrategy, Record,
    TableSchema,
};
use quarry_db::Database;
use tempfile::TempDir;

// =============================================================================
// Entities
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub base: EntityBase,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
}

impl User {
    pub fn new(first: &str, last: &str, email: &str) -> Self {
        User {
            base: EntityBase::new(),
            first_name: first.to_string(),
            last_name: last.to_string(),
            email: Some(email.to_string()),
        }
    }

    /// The pkid as text. Panics on an unsaved user.
    pub fn id(&self) -> String {
        self.base.pkid.as_ref().unwrap().to_string()
    }
}

impl Entity for User {
    fn schema() -> TableSchema {
        TableSchema::new("users")
            .column(
                ColumnDef::new("first_name", ColumnType::Text)
                    .max_length(50)
                    .indexed(),
            )
            .column(
                ColumnDef::new("last_name", ColumnType::Text)
                    .max_length(50)
                    .indexed(),
            )
            .column(ColumnDef::new("email", ColumnType::Text).max_length(200).unique())
    }

    fn base(&self) -> &EntityBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut EntityBase {
        &mut self.base
    }

    fn fields(&self) -> Record {
        Record::new()
            .with("first_name", self.first_name.as_str())
            .with("last_name", self.last_name.as_str())
            .with("email", self.email.clone())
    }

    fn from_record(record: Record) -> Result<Self, EntityError> {
        Ok(User {
            base: EntityBase::from_record(&record)?,
            first_name: record.get_text("first_name")?,
            last_name: record.get_text("last_name")?,
            email: record.get_opt_text("email")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Address {
    pub base: EntityBase,
    pub city: String,
    pub user_id: String,
}

impl Entity for Address {
    fn schema() -> TableSchema {
        TableSchema::new("addresses")
            .column(ColumnDef::new("city", ColumnType::Text).max_length(200).indexed())
            .column(
                ColumnDef::new("user_id", ColumnType::Text)
                    .max_length(36)
                    .not_null()
                    .references("users", "pkid"),
            )
    }

    fn base(&self) -> &EntityBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut EntityBase {
        &mut self.base
    }

    fn fields(&self) -> Record {
        Record::new()
            .with("city", self.city.as_str())
            .with("user_id", self.user_id.as_str())
    }

    fn from_record(record: Record) -> Result<Self, EntityError> {
        Ok(Address {
            base: EntityBase::from_record(&record)?,
            city: record.get_text("city")?,
            user_id: record.get_text("user_id")?,
        })
    }
}

/// A table whose key the store assigns.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub base: EntityBase,
    pub name: String,
}

impl Event {
    pub fn new(name: &str) -> Self {
        Event {
            base: EntityBase::new(),
            name: name.to_string(),
        }
    }
}

impl Entity for Event {
    fn schema() -> TableSchema {
        TableSchema::new("events")
            .key_strategy(KeyStrategy::AutoIncrement)
            .column(ColumnDef::new("name", ColumnType::Text).not_null())
    }

    fn base(&self) -> &EntityBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut EntityBase {
        &mut self.base
    }

    fn fields(&self) -> Record {
        Record::new().with("name", self.name.as_str())
    }

    fn from_record(record: Record) -> Result<Self, EntityError> {
        Ok(Event {
            base: EntityBase::from_record(&record)?,
            name: record.get_text("name")?,
        })
    }
}

// =============================================================================
// Database Setup
// =============================================================================

/// A file-backed database in a temp dir. Keep the `TempDir` alive for the
/// duration of the test.
pub async fn file_db(settings: impl FnOnce(DbSettings) -> DbSettings) -> (Database, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = settings(DbSettings::sqlite_file(dir.path().join("quarry.db")))
        .validate()
        .unwrap();
    let db = Database::open(config).await.unwrap();
    db.create_schema(&[User::schema(), Address::schema(), Event::schema()])
        .await
        .unwrap();
    (db, dir)
}

pub async fn default_db() -> (Database, TempDir) {
    file_db(|s| s).await
}

/// `count` users with distinct emails, tagged for later filtering.
pub fn users(count: usize, tag: &str) -> Vec<User> {
    (0..count)
        .map(|i| User::new(&format!("First{i}"), tag, &format!("{tag}{i}@example.com")))
        .collect()
}
