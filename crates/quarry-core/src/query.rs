//! # Query Model
//!
//! A small, typed description of "which rows of `E`, in which order".
//!
//! The query only names columns and values; quarry-db turns it into SQL,
//! quoting identifiers and binding every value. Column names are checked
//! against `E::schema()` with [`Query::validate`] before execution.
//!
//! ## Example
//! ```rust,ignore
//! let page = db
//!     .read_query(
//!         &Query::<User>::new()
//!             .like("email", "%@example.com")
//!             .order_by("last_name", Direction::Asc),
//!         0,
//!         100,
//!     )
//!     .await?;
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

use crate::entity::Entity;
use crate::error::ValidationError;
use crate::schema::{TableSchema, PRIMARY_KEY_COLUMN};
use crate::validation::require_column;
use crate::value::Value;

// =============================================================================
// Building Blocks
// =============================================================================

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// Binary comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
}

impl Comparison {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Comparison::Eq => "=",
            Comparison::Ne => "<>",
            Comparison::Lt => "<",
            Comparison::Le => "<=",
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
            Comparison::Like => "LIKE",
        }
    }
}

/// A single condition. Conditions in a query are AND-ed together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Filter {
    Compare {
        column: String,
        op: Comparison,
        value: Value,
    },
    /// `column IN (values)`; an empty list matches nothing.
    In { column: String, values: Vec<Value> },
    IsNull { column: String },
    IsNotNull { column: String },
}

impl Filter {
    pub fn column(&self) -> &str {
        match self {
            Filter::Compare { column, .. }
            | Filter::In { column, .. }
            | Filter::IsNull { column }
            | Filter::IsNotNull { column } => column,
        }
    }
}

/// One ORDER BY term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub column: String,
    pub direction: Direction,
}

/// What `read_one_record` does when more than one row matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnMultiple {
    /// Return the first row in query order.
    #[default]
    TakeFirst,
    /// Fail with `MultipleResults`.
    Fail,
}

// =============================================================================
// Query
// =============================================================================

/// Which rows of `E` to read, count or page through.
pub struct Query<E> {
    filters: Vec<Filter>,
    order: Vec<OrderBy>,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for Query<E> {
    fn clone(&self) -> Self {
        Query {
            filters: self.filters.clone(),
            order: self.order.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E> fmt::Debug for Query<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("filters", &self.filters)
            .field("order", &self.order)
            .finish()
    }
}

impl<E> Default for Query<E> {
    fn default() -> Self {
        Query {
            filters: Vec::new(),
            order: Vec::new(),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> Query<E> {
    /// Matches every row.
    pub fn new() -> Self {
        Query::default()
    }

    /// Matches the row with the given primary key.
    pub fn by_key(pkid: impl Into<Value>) -> Self {
        Query::new().eq(PRIMARY_KEY_COLUMN, pkid)
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    fn compare(self, column: impl Into<String>, op: Comparison, value: impl Into<Value>) -> Self {
        self.filter(Filter::Compare {
            column: column.into(),
            op,
            value: value.into(),
        })
    }

    pub fn eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(column, Comparison::Eq, value)
    }

    pub fn ne(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(column, Comparison::Ne, value)
    }

    pub fn lt(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(column, Comparison::Lt, value)
    }

    pub fn le(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(column, Comparison::Le, value)
    }

    pub fn gt(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(column, Comparison::Gt, value)
    }

    pub fn ge(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(column, Comparison::Ge, value)
    }

    /// SQL `LIKE`; `%` and `_` are wildcards.
    pub fn like(self, column: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.compare(column, Comparison::Like, Value::Text(pattern.into()))
    }

    pub fn in_list<V: Into<Value>>(
        self,
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.filter(Filter::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
        })
    }

    pub fn is_null(self, column: impl Into<String>) -> Self {
        self.filter(Filter::IsNull {
            column: column.into(),
        })
    }

    pub fn is_not_null(self, column: impl Into<String>) -> Self {
        self.filter(Filter::IsNotNull {
            column: column.into(),
        })
    }

    /// Adds an ORDER BY term. Terms apply in the order they are added.
    pub fn order_by(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.order.push(OrderBy {
            column: column.into(),
            direction,
        });
        self
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn order(&self) -> &[OrderBy] {
        &self.order
    }

    /// Checks every referenced column against the schema.
    pub fn validate(&self, schema: &TableSchema) -> Result<(), ValidationError> {
        for filter in &self.filters {
            require_column(schema, filter.column())?;
        }
        for term in &self.order {
            require_column(schema, &term.column)?;
        }
        Ok(())
    }

    /// The ordering actually used for reads.
    ///
    /// The caller's terms come first; the primary key (ascending) is
    /// appended unless already present, so that pagination over a static
    /// table never skips or repeats rows.
    pub fn effective_order(&self) -> Vec<OrderBy> {
        let mut order = self.order.clone();
        if !order.iter().any(|o| o.column == PRIMARY_KEY_COLUMN) {
            order.push(OrderBy {
                column: PRIMARY_KEY_COLUMN.to_string(),
                direction: Direction::Asc,
            });
        }
        order
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
