//! # Schema Creation and Introspection
//!
//! Creates tables from [`TableSchema`] definitions and answers questions
//! about the tables created through this handle.
//!
//! ## Generated DDL
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  TableSchema::new("users")                                              │
//! │      .column(ColumnDef::new("email", Text).max_length(200).unique())   │
//! │                                                                         │
//! │  CREATE TABLE IF NOT EXISTS "users" (                                  │
//! │      "pkid" VARCHAR(36) NOT NULL PRIMARY KEY,                          │
//! │      "date_created" TIMESTAMP NOT NULL,                                │
//! │      "date_updated" TIMESTAMP NOT NULL,                                │
//! │      "email" VARCHAR(200) UNIQUE                                       │
//! │  )                                                                      │
//! │  CREATE INDEX IF NOT EXISTS "ix_users_date_created" ON ...             │
//! │  CREATE INDEX IF NOT EXISTS "ix_users_date_updated" ON ...             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every statement uses `IF NOT EXISTS`, so creating the same schema twice
//! is a no-op. All tables of one call are created in a single transaction.

use std::collections::HashMap;
use tracing::{debug, info};

use quarry_core::{ColumnDef, ColumnMeta, KeyStrategy, TableSchema};

use crate::error::{DataError, DataResult, SchemaError, SchemaResult};
use crate::pool::Database;
use crate::session::Session;
use crate::sql::quote_ident;

// =============================================================================
// DDL
// =============================================================================

/// `CREATE TABLE` plus one `CREATE INDEX` per indexed column.
pub(crate) fn create_statements(schema: &TableSchema) -> Vec<String> {
    let table = quote_ident(schema.name());
    let columns: Vec<String> = schema
        .columns()
        .iter()
        .map(|col| column_sql(schema, col))
        .collect();

    let mut statements = vec![format!(
        "CREATE TABLE IF NOT EXISTS {table} (\n    {}\n)",
        columns.join(",\n    ")
    )];

    for col in schema.columns() {
        if col.indexed && !col.unique && !col.primary_key {
            statements.push(format!(
                "CREATE INDEX IF NOT EXISTS {} ON {table} ({})",
                quote_ident(&format!("ix_{}_{}", schema.name(), col.name)),
                quote_ident(&col.name)
            ));
        }
    }
    statements
}

fn column_sql(schema: &TableSchema, col: &ColumnDef) -> String {
    let name = quote_ident(&col.name);
    if col.primary_key {
        return match schema.strategy() {
            KeyStrategy::AutoIncrement => format!("{name} INTEGER PRIMARY KEY AUTOINCREMENT"),
            KeyStrategy::Uuid => format!(
                "{name} {} NOT NULL PRIMARY KEY",
                col.column_type.sql_type(col.max_length)
            ),
        };
    }

    let mut sql = format!("{name} {}", col.column_type.sql_type(col.max_length));
    if !col.nullable {
        sql.push_str(" NOT NULL");
    }
    if col.unique {
        sql.push_str(" UNIQUE");
    }
    if let Some(fk) = &col.references {
        sql.push_str(&format!(
            " REFERENCES {} ({})",
            quote_ident(&fk.table),
            quote_ident(&fk.column)
        ));
    }
    sql
}

/// Runs one DDL statement inside the session's transaction.
async fn execute_ddl(session: &mut Session, table: &str, statement: &str) -> SchemaResult<()> {
    let conn = session
        .executing(statement)
        .map_err(|e| SchemaError::CreationFailed {
            table: table.to_string(),
            message: e.to_string(),
        })?;
    sqlx::query(statement)
        .execute(conn)
        .await
        .map_err(|e| SchemaError::creation_failed(table, e))?;
    Ok(())
}

// =============================================================================
// Schema Lifecycle
// =============================================================================

impl Database {
    /// Creates the tables (and their indexes) if they don't exist yet.
    ///
    /// ## What This Does
    /// 1. Validates every definition, including foreign key targets
    /// 2. Runs all DDL in one transaction
    /// 3. Registers the schemas for introspection
    ///
    /// Idempotent: safe to run on every start.
    ///
    /// ## Errors
    /// * `SchemaError::InvalidDefinition` - bad name, duplicate column,
    ///   missing primary key, unknown foreign key target
    /// * `SchemaError::CreationFailed` - the store refused a statement
    /// * `SchemaError::Connection` - closed handle or pool timeout
    pub async fn create_schema(&self, schemas: &[TableSchema]) -> SchemaResult<()> {
        self.validate_schemas(schemas)?;

        info!(tables = schemas.len(), "Creating schema");

        let mut session = self.acquire_session().await?;
        let result = async {
            for schema in schemas {
                for statement in create_statements(schema) {
                    execute_ddl(&mut session, schema.name(), &statement).await?;
                }
                debug!(table = %schema.name(), "Table ready");
            }
            Ok::<_, SchemaError>(())
        }
        .await;
        if let Err(err) = result {
            session.abort(&err).await;
            return Err(err);
        }
        session.commit().await.map_err(|e| SchemaError::CreationFailed {
            table: schemas
                .last()
                .map(|s| s.name().to_string())
                .unwrap_or_default(),
            message: e.to_string(),
        })?;

        let mut registry = self.registry_mut();
        for schema in schemas {
            registry.insert(schema.name().to_string(), schema.clone());
        }

        info!("Schema created");
        Ok(())
    }

    /// Drops the tables, in reverse order, and unregisters them.
    ///
    /// Pass schemas in the same order given to `create_schema` so that
    /// referencing tables are dropped before the tables they reference.
    pub async fn drop_schema(&self, schemas: &[TableSchema]) -> SchemaResult<()> {
        info!(tables = schemas.len(), "Dropping schema");

        let mut session = self.acquire_session().await?;
        let result = async {
            for schema in schemas.iter().rev() {
                let statement = format!("DROP TABLE IF EXISTS {}", quote_ident(schema.name()));
                execute_ddl(&mut session, schema.name(), &statement).await?;
            }
            Ok::<_, SchemaError>(())
        }
        .await;
        if let Err(err) = result {
            session.abort(&err).await;
            return Err(err);
        }
        session
            .commit()
            .await
            .map_err(|e| SchemaError::CreationFailed {
                table: String::new(),
                message: e.to_string(),
            })?;

        let mut registry = self.registry_mut();
        for schema in schemas {
            registry.remove(schema.name());
        }
        Ok(())
    }

    fn validate_schemas(&self, schemas: &[TableSchema]) -> SchemaResult<()> {
        let mut known: HashMap<String, TableSchema> = self.registry().clone().into_iter().collect();
        for schema in schemas {
            schema
                .validate_definition()
                .map_err(|e| SchemaError::invalid(schema.name(), e))?;
            known.insert(schema.name().to_string(), schema.clone());
        }

        for schema in schemas {
            for col in schema.columns() {
                let Some(fk) = &col.references else {
                    continue;
                };
                let target = known.get(&fk.table).ok_or_else(|| {
                    SchemaError::invalid(
                        schema.name(),
                        format!("column '{}' references unknown table '{}'", col.name, fk.table),
                    )
                })?;
                if !target.has_column(&fk.column) {
                    return Err(SchemaError::invalid(
                        schema.name(),
                        format!(
                            "column '{}' references unknown column '{}.{}'",
                            col.name, fk.table, fk.column
                        ),
                    ));
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Names of every table created through this handle, sorted.
    pub fn get_table_names(&self) -> DataResult<Vec<String>> {
        self.ensure_open()?;
        Ok(self.registry().keys().cloned().collect())
    }

    /// Primary key column names of `table`.
    pub fn get_primary_keys(&self, table: &str) -> DataResult<Vec<String>> {
        self.with_registered(table, |schema| {
            schema
                .primary_keys()
                .into_iter()
                .map(str::to_string)
                .collect()
        })
    }

    /// Column details of `table`, in declaration order.
    pub fn get_columns_details(&self, table: &str) -> DataResult<Vec<ColumnMeta>> {
        self.with_registered(table, TableSchema::column_details)
    }

    /// The registered definition of `table`.
    pub fn get_table_schema(&self, table: &str) -> DataResult<TableSchema> {
        self.with_registered(table, TableSchema::clone)
    }

    fn with_registered<T>(&self, table: &str, f: impl FnOnce(&TableSchema) -> T) -> DataResult<T> {
        self.ensure_open()?;
        let registry = self.registry();
        registry
            .get(table)
            .map(f)
            .ok_or_else(|| DataError::not_found("table", table))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::{ColumnType, DbSettings};

    fn users() -> TableSchema {
        TableSchema::new("users")
            .column(
                ColumnDef::new("first_name", ColumnType::Text)
                    .max_length(50)
                    .indexed(),
            )
            .column(ColumnDef::new("email", ColumnType::Text).max_length(200).unique())
    }

    fn addresses() -> TableSchema {
        TableSchema::new("addresses")
            .column(ColumnDef::new("city", ColumnType::Text).not_null())
            .column(
                ColumnDef::new("user_id", ColumnType::Text)
                    .max_length(36)
                    .references("users", "pkid"),
            )
    }

    async fn memory_db() -> Database {
        Database::open(DbSettings::in_memory().validate().unwrap())
            .await
            .unwrap()
    }

    #[test]
    fn test_create_statements() {
        let statements = create_statements(&users());
        assert!(statements[0].starts_with("CREATE TABLE IF NOT EXISTS \"users\""));
        assert!(statements[0].contains("\"pkid\" VARCHAR(36) NOT NULL PRIMARY KEY"));
        assert!(statements[0].contains("\"email\" VARCHAR(200) UNIQUE"));
        // date_created, date_updated, first_name
        assert_eq!(statements.len(), 4);
        assert!(statements[3].contains("\"ix_users_first_name\""));
    }

    #[test]
    fn test_autoincrement_key() {
        let schema = TableSchema::new("events").key_strategy(KeyStrategy::AutoIncrement);
        let statements = create_statements(&schema);
        assert!(statements[0].contains("\"pkid\" INTEGER PRIMARY KEY AUTOINCREMENT"));
    }

    #[tokio::test]
    async fn test_create_schema_is_idempotent() {
        let db = memory_db().await;
        db.create_schema(&[users(), addresses()]).await.unwrap();
        db.create_schema(&[users(), addresses()]).await.unwrap();

        assert_eq!(db.get_table_names().unwrap(), vec!["addresses", "users"]);
        assert_eq!(db.get_primary_keys("users").unwrap(), vec!["pkid"]);

        let columns = db.get_columns_details("addresses").unwrap();
        let user_id = columns.iter().find(|c| c.name == "user_id").unwrap();
        assert_eq!(user_id.foreign_key.as_deref(), Some("users.pkid"));
    }

    #[tokio::test]
    async fn test_unknown_foreign_key_target() {
        let db = memory_db().await;
        let err = db.create_schema(&[addresses()]).await.unwrap_err();
        assert!(matches!(err, SchemaError::InvalidDefinition { .. }));
        assert!(db.get_table_names().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_refused_statement_rolls_back_whole_call() {
        let db = memory_db().await;
        // Passes identifier checks, but SQLite reserves the prefix.
        let reserved = TableSchema::new("sqlite_stats");

        let err = db.create_schema(&[users(), reserved]).await.unwrap_err();
        assert!(matches!(
            err,
            SchemaError::CreationFailed { ref table, .. } if table == "sqlite_stats"
        ));
        assert!(db.get_table_names().unwrap().is_empty());

        let exists: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'users'",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(exists, 0);
    }

    #[tokio::test]
    async fn test_unknown_table_introspection() {
        let db = memory_db().await;
        assert!(matches!(
            db.get_primary_keys("ghosts"),
            Err(DataError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_drop_schema_unregisters() {
        let db = memory_db().await;
        db.create_schema(&[users(), addresses()]).await.unwrap();
        db.drop_schema(&[users(), addresses()]).await.unwrap();
        assert!(db.get_table_names().unwrap().is_empty());

        let exists: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'users'",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(exists, 0);
    }

    #[tokio::test]
    async fn test_introspection_on_closed_handle() {
        let db = memory_db().await;
        db.close().await;
        assert!(matches!(
            db.get_table_names(),
            Err(DataError::Connection(_))
        ));
    }
}
