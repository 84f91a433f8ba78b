//! # Generic Data Operations
//!
//! Schema-agnostic CRUD over any [`Entity`]. Every operation checks out its
//! own session, commits on success and rolls back on any failure.
//!
//! ## Operation Set
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create_one(entity)            INSERT ... RETURNING *        → E       │
//! │  create_many(&[entity])        chunked INSERTs, atomic       → count   │
//! │  read_one_record(query, mode)  SELECT ... LIMIT 1|2          → Option  │
//! │  read_query(query, off, lim)   SELECT ... ORDER BY ... LIMIT → Vec<E>  │
//! │  count_query(query)            SELECT COUNT(*)               → i64     │
//! │  update_one(id, values)        UPDATE ... RETURNING *        → E       │
//! │  delete_one(id)                DELETE ... RETURNING *        → E       │
//! │  delete_many(column, ids)      chunked DELETEs, atomic       → count   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Writes start with the write statement itself (`RETURNING` instead of a
//! read-then-write), so a transaction takes the write lock up front and
//! waits on the busy timeout instead of failing mid-way.

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite};
use std::collections::HashSet;
use tracing::debug;

use quarry_core::entity::prepare_insert;
use quarry_core::validation::{require_column, validate_insert, validate_key, validate_update};
use quarry_core::{
    Entity, OnMultiple, Query, Record, TableSchema, Value, DATE_UPDATED_COLUMN,
    MAX_BIND_PARAMETERS, PRIMARY_KEY_COLUMN,
};

use crate::error::{DataError, DataResult};
use crate::pool::Database;
use crate::session::Session;
use crate::sql::{
    decode_row, push_column_list, push_filters, push_order, push_value, push_value_list,
    quote_ident,
};

impl Database {
    // =========================================================================
    // Create
    // =========================================================================

    /// Stores a new entity and returns it as stored.
    ///
    /// ## What This Does
    /// 1. Assigns `pkid` (UUID v4, or left to the store for `AutoIncrement`)
    ///    and both timestamps when the entity doesn't carry them
    /// 2. Validates every value against `E::schema()`
    /// 3. Inserts and reads the row back in the same statement
    ///
    /// ## Errors
    /// * `DataError::Conflict` - unique or primary key violation
    /// * `DataError::Integrity` - foreign key or NOT NULL violation
    /// * `DataError::Invalid` - unknown column or type mismatch
    pub async fn create_one<E: Entity>(&self, entity: E) -> DataResult<E> {
        let schema = E::schema();
        let mut record = entity.to_record();
        prepare_insert(&schema, &mut record, Utc::now());
        let record = validate_insert(&schema, record)?;

        let mut session = self.acquire_session().await?;
        let result = insert_returning(&mut session, &schema, &record).await;
        let stored = session.finish(result).await?;

        debug!(table = %schema.name(), pkid = ?stored.get(PRIMARY_KEY_COLUMN), "Created record");
        Ok(E::from_record(stored)?)
    }

    /// Stores many entities atomically. Returns the number stored.
    ///
    /// Rows go in as multi-row INSERTs of at most `batch_chunk_size` rows
    /// (fewer for wide tables), all inside one transaction. If any row
    /// violates a constraint nothing is stored, and a `Conflict` names the
    /// offending entity by batch index and primary key.
    pub async fn create_many<E: Entity>(&self, entities: &[E]) -> DataResult<u64> {
        if entities.is_empty() {
            return Ok(0);
        }

        let schema = E::schema();
        let now = Utc::now();
        let mut records = Vec::with_capacity(entities.len());
        for (index, entity) in entities.iter().enumerate() {
            let mut record = entity.to_record();
            prepare_insert(&schema, &mut record, now);
            let record = validate_insert(&schema, record)
                .map_err(|e| DataError::invalid(format!("entity at batch index {index}: {e}")))?;
            records.push(record);
        }

        let columns = insert_columns(&schema, &records);
        let chunk_rows = chunk_size(self.config().batch_chunk_size(), columns.len());

        let mut session = self.acquire_session().await?;
        let result = insert_chunks(&mut session, &schema, &columns, &records, chunk_rows).await;
        let inserted = session.finish(result).await?;

        debug!(table = %schema.name(), count = inserted, chunk_rows, "Created records");
        Ok(inserted)
    }

    // =========================================================================
    // Read
    // =========================================================================

    /// Returns the first matching entity, or `None` when nothing matches.
    ///
    /// With `OnMultiple::Fail`, a second match is `DataError::MultipleResults`.
    pub async fn read_one_record<E: Entity>(
        &self,
        query: &Query<E>,
        on_multiple: OnMultiple,
    ) -> DataResult<Option<E>> {
        let schema = E::schema();
        query.validate(&schema)?;

        let fetch = match on_multiple {
            OnMultiple::TakeFirst => 1,
            OnMultiple::Fail => 2,
        };

        let mut session = self.acquire_session().await?;
        let result = select_records(&mut session, &schema, query, 0, fetch).await;
        let mut rows = session.finish(result).await?;

        if rows.len() > 1 {
            return Err(DataError::MultipleResults {
                table: schema.name().to_string(),
            });
        }
        rows.pop().map(E::from_record).transpose().map_err(Into::into)
    }

    /// Returns one page of matching entities.
    ///
    /// Rows are ordered by the query's order terms with the primary key as
    /// the final tiebreaker, so paging through an unchanging table visits
    /// every row exactly once.
    ///
    /// ## Errors
    /// * `DataError::Invalid` - `limit` is zero, or an unknown column
    /// * `DataError::LimitExceeded` - `limit` is above `max_page_size`
    pub async fn read_query<E: Entity>(
        &self,
        query: &Query<E>,
        offset: u64,
        limit: u64,
    ) -> DataResult<Vec<E>> {
        let schema = E::schema();
        if limit == 0 {
            return Err(DataError::invalid("limit must be at least 1"));
        }
        let max = self.config().max_page_size();
        if limit > max {
            return Err(DataError::LimitExceeded {
                requested: limit,
                max,
            });
        }
        query.validate(&schema)?;

        let mut session = self.acquire_session().await?;
        let result = select_records(&mut session, &schema, query, offset, limit).await;
        let rows = session.finish(result).await?;

        debug!(table = %schema.name(), offset, limit, count = rows.len(), "Read page");
        rows.into_iter()
            .map(|record| E::from_record(record).map_err(Into::into))
            .collect()
    }

    /// Counts the matching rows.
    pub async fn count_query<E: Entity>(&self, query: &Query<E>) -> DataResult<i64> {
        let schema = E::schema();
        query.validate(&schema)?;

        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM ");
        qb.push(quote_ident(schema.name()));
        push_filters(&mut qb, &schema, query.filters());

        let mut session = self.acquire_session().await?;
        let result = async {
            let conn = session.executing(qb.sql())?;
            let count = qb
                .build_query_scalar::<i64>()
                .fetch_one(conn)
                .await
                .map_err(|e| DataError::from_sqlx(schema.name(), e))?;
            Ok::<_, DataError>(count)
        }
        .await;
        session.finish(result).await
    }

    // =========================================================================
    // Update
    // =========================================================================

    /// Applies a partial update and returns the updated entity.
    ///
    /// `date_updated` is refreshed unless `new_values` sets it explicitly.
    ///
    /// ## Errors
    /// * `DataError::NotFound` - no row with `record_id`
    /// * `DataError::Invalid` - unknown column, type mismatch, or an attempt
    ///   to change `pkid` / `date_created`
    /// * `DataError::Conflict` - unique violation
    pub async fn update_one<E: Entity>(
        &self,
        record_id: impl Into<Value>,
        new_values: Record,
    ) -> DataResult<E> {
        let schema = E::schema();
        let key = validate_key(&schema, &record_id.into())?;
        let mut values = validate_update(&schema, new_values)?;
        if values.is_missing(DATE_UPDATED_COLUMN) {
            values.insert(DATE_UPDATED_COLUMN, Utc::now());
        }

        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE ");
        qb.push(quote_ident(schema.name())).push(" SET ");
        for (i, (column, value)) in values.iter().enumerate() {
            if i > 0 {
                qb.push(", ");
            }
            qb.push(quote_ident(column)).push(" = ");
            push_value(&mut qb, value);
        }
        push_key_match(&mut qb, &key);
        qb.push(" RETURNING *");

        let mut session = self.acquire_session().await?;
        let result = fetch_optional_record(&mut session, &schema, &mut qb).await;
        let updated = session.finish(result).await?;

        match updated {
            Some(record) => {
                debug!(table = %schema.name(), pkid = %key, columns = values.len(), "Updated record");
                Ok(E::from_record(record)?)
            }
            None => Err(DataError::not_found(schema.name(), &key)),
        }
    }

    // =========================================================================
    // Delete
    // =========================================================================

    /// Deletes one row and returns its prior state.
    pub async fn delete_one<E: Entity>(&self, record_id: impl Into<Value>) -> DataResult<E> {
        let schema = E::schema();
        let key = validate_key(&schema, &record_id.into())?;

        let mut qb = QueryBuilder::<Sqlite>::new("DELETE FROM ");
        qb.push(quote_ident(schema.name()));
        push_key_match(&mut qb, &key);
        qb.push(" RETURNING *");

        let mut session = self.acquire_session().await?;
        let result = fetch_optional_record(&mut session, &schema, &mut qb).await;
        let deleted = session.finish(result).await?;

        match deleted {
            Some(record) => {
                debug!(table = %schema.name(), pkid = %key, "Deleted record");
                Ok(E::from_record(record)?)
            }
            None => Err(DataError::not_found(schema.name(), &key)),
        }
    }

    /// Deletes every row whose `id_column` value is in `id_values`.
    ///
    /// `id_column` must be the primary key or a unique column. Duplicate ids
    /// are collapsed and ids with no row are ignored. Atomic: if any chunk
    /// fails nothing is deleted. Returns the number of rows deleted.
    pub async fn delete_many<E: Entity>(
        &self,
        id_column: &str,
        id_values: Vec<Value>,
    ) -> DataResult<u64> {
        let schema = E::schema();
        let column = require_column(&schema, id_column)?;
        if !schema.is_unique_column(id_column) {
            return Err(DataError::invalid(format!(
                "'{id_column}' on {} is not a unique column",
                schema.name()
            )));
        }

        let mut seen = HashSet::new();
        let mut ids = Vec::with_capacity(id_values.len());
        for value in id_values {
            if value.is_null() {
                continue;
            }
            let value = value.coerce_to(column.column_type).ok_or_else(|| {
                DataError::invalid(format!(
                    "'{id_column}' expects {}, got {}",
                    column.column_type,
                    value.type_name()
                ))
            })?;
            if seen.insert(value.to_string()) {
                ids.push(value);
            }
        }
        if ids.is_empty() {
            return Ok(0);
        }

        let chunk_rows = self.config().batch_chunk_size().min(MAX_BIND_PARAMETERS);

        let mut session = self.acquire_session().await?;
        let result = delete_chunks(&mut session, &schema, id_column, &ids, chunk_rows).await;
        let deleted = session.finish(result).await?;

        debug!(table = %schema.name(), column = %id_column, count = deleted, "Deleted records");
        Ok(deleted)
    }
}

// =============================================================================
// Statement Helpers
// =============================================================================

/// Rows per INSERT so that `rows * columns` stays within the bind limit.
fn chunk_size(batch_chunk_size: usize, columns: usize) -> usize {
    let by_binds = MAX_BIND_PARAMETERS / columns.max(1);
    batch_chunk_size.min(by_binds).max(1)
}

/// Columns a multi-row INSERT needs: every schema column that any record
/// sets. Records missing one bind NULL for it.
fn insert_columns<'s>(schema: &'s TableSchema, records: &[Record]) -> Vec<&'s str> {
    schema
        .columns()
        .iter()
        .map(|c| c.name.as_str())
        .filter(|name| records.iter().any(|r| r.contains(name)))
        .collect()
}

fn push_key_match(qb: &mut QueryBuilder<'_, Sqlite>, key: &Value) {
    qb.push(" WHERE ").push(quote_ident(PRIMARY_KEY_COLUMN)).push(" = ");
    push_value(qb, key);
}

async fn fetch_optional_record(
    session: &mut Session,
    schema: &TableSchema,
    qb: &mut QueryBuilder<'_, Sqlite>,
) -> DataResult<Option<Record>> {
    let conn = session.executing(qb.sql())?;
    let row = qb
        .build()
        .fetch_optional(conn)
        .await
        .map_err(|e| DataError::from_sqlx(schema.name(), e))?;
    row.map(|row| decode_row(schema, &row))
        .transpose()
        .map_err(|e| DataError::from_sqlx(schema.name(), e))
}

async fn insert_returning(
    session: &mut Session,
    schema: &TableSchema,
    record: &Record,
) -> DataResult<Record> {
    let mut qb = QueryBuilder::<Sqlite>::new("INSERT INTO ");
    qb.push(quote_ident(schema.name())).push(" ");
    push_column_list(&mut qb, record.columns());
    qb.push(" VALUES ");
    push_value_list(&mut qb, record.iter().map(|(_, v)| v));
    qb.push(" RETURNING *");

    fetch_optional_record(session, schema, &mut qb)
        .await?
        .ok_or_else(|| DataError::Query("insert returned no row".to_string()))
}

async fn insert_chunks(
    session: &mut Session,
    schema: &TableSchema,
    columns: &[&str],
    records: &[Record],
    chunk_rows: usize,
) -> DataResult<u64> {
    let mut inserted = 0;
    for (chunk_index, chunk) in records.chunks(chunk_rows).enumerate() {
        let mut qb = QueryBuilder::<Sqlite>::new("INSERT INTO ");
        qb.push(quote_ident(schema.name())).push(" ");
        push_column_list(&mut qb, columns.iter().copied());
        qb.push(" VALUES ");
        for (i, record) in chunk.iter().enumerate() {
            if i > 0 {
                qb.push(", ");
            }
            let row: Vec<Value> = columns
                .iter()
                .map(|c| record.get(c).cloned().unwrap_or(Value::Null))
                .collect();
            push_value_list(&mut qb, &row);
        }

        let conn = session.executing(qb.sql())?;
        match qb.build().execute(conn).await {
            Ok(result) => inserted += result.rows_affected(),
            Err(e) => {
                let err = DataError::from_sqlx(schema.name(), e);
                if !matches!(err, DataError::Conflict { .. }) {
                    return Err(err);
                }
                let offset = chunk_index * chunk_rows;
                return Err(locate_conflict(session, schema, chunk, offset).await.unwrap_or(err));
            }
        }
    }
    Ok(inserted)
}

/// Re-inserts a failed chunk one row at a time to find the first row that
/// conflicts. Runs inside the failing transaction, which is rolled back
/// afterwards either way.
async fn locate_conflict(
    session: &mut Session,
    schema: &TableSchema,
    chunk: &[Record],
    offset: usize,
) -> Option<DataError> {
    for (i, record) in chunk.iter().enumerate() {
        if let Err(err) = insert_returning(session, schema, record).await {
            let key = record.get(PRIMARY_KEY_COLUMN).map(|v| v.to_string());
            return Some(err.at_position(offset + i, key));
        }
    }
    None
}

async fn delete_chunks(
    session: &mut Session,
    schema: &TableSchema,
    id_column: &str,
    ids: &[Value],
    chunk_rows: usize,
) -> DataResult<u64> {
    let mut deleted = 0;
    for chunk in ids.chunks(chunk_rows) {
        let mut qb = QueryBuilder::<Sqlite>::new("DELETE FROM ");
        qb.push(quote_ident(schema.name()))
            .push(" WHERE ")
            .push(quote_ident(id_column))
            .push(" IN ");
        push_value_list(&mut qb, chunk);

        let conn = session.executing(qb.sql())?;
        let result = qb
            .build()
            .execute(conn)
            .await
            .map_err(|e| DataError::from_sqlx(schema.name(), e))?;
        deleted += result.rows_affected();
    }
    Ok(deleted)
}

async fn select_records<E: Entity>(
    session: &mut Session,
    schema: &TableSchema,
    query: &Query<E>,
    offset: u64,
    limit: u64,
) -> DataResult<Vec<Record>> {
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM ");
    qb.push(quote_ident(schema.name()));
    push_filters(&mut qb, schema, query.filters());
    push_order(&mut qb, &query.effective_order());
    qb.push(" LIMIT ");
    qb.push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
    qb.push(" OFFSET ");
    qb.push_bind(i64::try_from(offset).unwrap_or(i64::MAX));

    let conn = session.executing(qb.sql())?;
    let rows = qb
        .build()
        .fetch_all(conn)
        .await
        .map_err(|e| DataError::from_sqlx(schema.name(), e))?;
    rows.iter()
        .map(|row| decode_row(schema, row).map_err(|e| DataError::from_sqlx(schema.name(), e)))
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================
