//! SQL building and row decoding shared by the generic operations.
//!
//! Identifiers are always double-quoted and values are always bound; no
//! caller-supplied text is spliced into a statement.

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};

use quarry_core::query::{Comparison, Filter, OrderBy};
use quarry_core::{ColumnType, Record, TableSchema, Value};

/// Quotes a table or column name.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Fixed-width UTC text, so stored timestamps sort chronologically.
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn push_value(qb: &mut QueryBuilder<'_, Sqlite>, value: &Value) {
    match value {
        Value::Null => qb.push_bind(None::<String>),
        Value::Boolean(b) => qb.push_bind(*b),
        Value::Integer(i) => qb.push_bind(*i),
        Value::Real(r) => qb.push_bind(*r),
        Value::Timestamp(ts) => qb.push_bind(format_timestamp(ts)),
        Value::Text(s) => qb.push_bind(s.clone()),
        Value::Blob(b) => qb.push_bind(b.clone()),
    };
}

/// Pushes `(v1, v2, ...)`.
pub(crate) fn push_value_list<'v>(
    qb: &mut QueryBuilder<'_, Sqlite>,
    values: impl IntoIterator<Item = &'v Value>,
) {
    qb.push("(");
    for (i, value) in values.into_iter().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        push_value(qb, value);
    }
    qb.push(")");
}

/// Pushes `("a", "b", ...)`.
pub(crate) fn push_column_list<'c>(
    qb: &mut QueryBuilder<'_, Sqlite>,
    columns: impl IntoIterator<Item = &'c str>,
) {
    let quoted: Vec<String> = columns.into_iter().map(quote_ident).collect();
    qb.push("(").push(quoted.join(", ")).push(")");
}

/// Pushes a `WHERE` clause joining `filters` with `AND`.
///
/// Filter values are coerced to the column type where possible so that,
/// for example, an integer compared against a real column binds as a real.
pub(crate) fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, schema: &TableSchema, filters: &[Filter]) {
    if filters.is_empty() {
        return;
    }
    qb.push(" WHERE ");
    for (i, filter) in filters.iter().enumerate() {
        if i > 0 {
            qb.push(" AND ");
        }
        let column = quote_ident(filter.column());
        match filter {
            Filter::Compare { op, value, .. } if value.is_null() => {
                // `= NULL` never matches; treat it as the caller meant.
                let test = match op {
                    Comparison::Ne => " IS NOT NULL",
                    _ => " IS NULL",
                };
                qb.push(column).push(test);
            }
            Filter::Compare { column: name, op, value } => {
                qb.push(column).push(" ").push(op.as_sql()).push(" ");
                push_value(qb, &coerce_for(schema, name, *op, value));
            }
            Filter::In { values, .. } if values.is_empty() => {
                qb.push("0 = 1");
            }
            Filter::In { column: name, values } => {
                let coerced: Vec<Value> = values
                    .iter()
                    .map(|v| coerce_for(schema, name, Comparison::Eq, v))
                    .collect();
                qb.push(column).push(" IN ");
                push_value_list(qb, &coerced);
            }
            Filter::IsNull { .. } => {
                qb.push(column).push(" IS NULL");
            }
            Filter::IsNotNull { .. } => {
                qb.push(column).push(" IS NOT NULL");
            }
        }
    }
}

fn coerce_for(schema: &TableSchema, column: &str, op: Comparison, value: &Value) -> Value {
    if op == Comparison::Like {
        return value.clone();
    }
    schema
        .column_def(column)
        .and_then(|col| value.coerce_to(col.column_type))
        .unwrap_or_else(|| value.clone())
}

/// Pushes ` ORDER BY ...`.
pub(crate) fn push_order(qb: &mut QueryBuilder<'_, Sqlite>, order: &[OrderBy]) {
    if order.is_empty() {
        return;
    }
    let terms: Vec<String> = order
        .iter()
        .map(|o| format!("{} {}", quote_ident(&o.column), o.direction.as_sql()))
        .collect();
    qb.push(" ORDER BY ").push(terms.join(", "));
}

/// Reads every schema column out of a row.
pub(crate) fn decode_row(schema: &TableSchema, row: &SqliteRow) -> Result<Record, sqlx::Error> {
    let mut record = Record::new();
    for col in schema.columns() {
        let name = col.name.as_str();
        let value = match col.column_type {
            ColumnType::Integer => row.try_get::<Option<i64>, _>(name)?.map(Value::Integer),
            ColumnType::Real => row.try_get::<Option<f64>, _>(name)?.map(Value::Real),
            ColumnType::Text => row.try_get::<Option<String>, _>(name)?.map(Value::Text),
            ColumnType::Boolean => row.try_get::<Option<bool>, _>(name)?.map(Value::Boolean),
            ColumnType::Timestamp => row
                .try_get::<Option<DateTime<Utc>>, _>(name)?
                .map(Value::Timestamp),
            ColumnType::Blob => row.try_get::<Option<Vec<u8>>, _>(name)?.map(Value::Blob),
        };
        record.insert(name, value.unwrap_or(Value::Null));
    }
    Ok(record)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::query::Direction;
    use quarry_core::ColumnDef;

    fn users() -> TableSchema {
        TableSchema::new("users")
            .column(ColumnDef::new("email", ColumnType::Text))
            .column(ColumnDef::new("score", ColumnType::Real))
    }

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("users"), "\"users\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn test_filters_bind_values() {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM \"users\"");
        let filters = vec![
            Filter::Compare {
                column: "email".into(),
                op: Comparison::Like,
                value: Value::from("%@x.com"),
            },
            Filter::In {
                column: "score".into(),
                values: vec![Value::from(1), Value::from(2.5)],
            },
            Filter::IsNull {
                column: "email".into(),
            },
        ];
        push_filters(&mut qb, &users(), &filters);
        assert_eq!(
            qb.sql(),
            "SELECT * FROM \"users\" WHERE \"email\" LIKE ? AND \"score\" IN (?, ?) AND \"email\" IS NULL"
        );
    }

    #[test]
    fn test_empty_in_matches_nothing() {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM \"users\"");
        let filters = vec![Filter::In {
            column: "email".into(),
            values: vec![],
        }];
        push_filters(&mut qb, &users(), &filters);
        assert!(qb.sql().ends_with("WHERE 0 = 1"));
    }

    #[test]
    fn test_null_comparison_becomes_is_null() {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT 1");
        let filters = vec![Filter::Compare {
            column: "email".into(),
            op: Comparison::Eq,
            value: Value::Null,
        }];
        push_filters(&mut qb, &users(), &filters);
        assert_eq!(qb.sql(), "SELECT 1 WHERE \"email\" IS NULL");
    }

    #[test]
    fn test_order() {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT 1");
        push_order(
            &mut qb,
            &[
                OrderBy {
                    column: "score".into(),
                    direction: Direction::Desc,
                },
                OrderBy {
                    column: "pkid".into(),
                    direction: Direction::Asc,
                },
            ],
        );
        assert_eq!(qb.sql(), "SELECT 1 ORDER BY \"score\" DESC, \"pkid\" ASC");
    }

    #[test]
    fn test_timestamps_are_fixed_width() {
        let a = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let b = DateTime::parse_from_rfc3339("2024-01-01T00:00:00.5Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(format_timestamp(&a), "2024-01-01T00:00:00.000000Z");
        assert!(format_timestamp(&a) < format_timestamp(&b));
    }
}
