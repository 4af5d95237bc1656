//! Query builder utilities for consistent SQL query construction
//!
//! Catalog searches and list endpoints share the same shape: a fixed base
//! query, a handful of optional filters, an ordering and a hard row limit.

use sqlx::{postgres::PgRow, FromRow, Postgres, QueryBuilder};
use tracing::trace;

/// Escape `%`, `_` and `\` so user text is matched literally by ILIKE.
pub fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

/// Filtered, ordered and limited query builder
///
/// Example usage:
/// ```rust,ignore
/// let mut query = SearchQuery::new("SELECT id, national_id, name FROM patients WHERE 1=1");
/// query
///     .filter_contains_any(&["national_id", "name"], params.query.as_deref())
///     .order_by("updated_at", "DESC")
///     .order_by("name", "ASC")
///     .limit(20);
///
/// let patients: Vec<Patient> = query.build().fetch_all(&pool).await?;
/// ```
pub struct SearchQuery<'a> {
    query: QueryBuilder<'a, Postgres>,
    ordered: bool,
}

impl<'a> SearchQuery<'a> {
    /// Create a new builder. The base query must already contain a WHERE
    /// clause so that filters can be appended with AND.
    pub fn new(base_query: impl Into<String>) -> Self {
        Self {
            query: QueryBuilder::new(base_query),
            ordered: false,
        }
    }

    /// Add an equality filter (only if value is Some)
    pub fn filter_eq<T>(&mut self, column: &str, value: Option<T>) -> &mut Self
    where
        T: 'a + sqlx::Encode<'a, Postgres> + sqlx::Type<Postgres> + Send,
    {
        if let Some(val) = value {
            self.query.push(format!(" AND {} = ", column));
            self.query.push_bind(val);
        }
        self
    }

    /// Add an `= ANY(...)` filter (only if values is non-empty)
    pub fn filter_in<T>(&mut self, column: &str, values: Vec<T>) -> &mut Self
    where
        T: 'a + sqlx::Type<Postgres> + Send,
        Vec<T>: sqlx::Encode<'a, Postgres> + sqlx::Type<Postgres>,
    {
        if !values.is_empty() {
            self.query.push(format!(" AND {} = ANY(", column));
            self.query.push_bind(values);
            self.query.push(")");
        }
        self
    }

    /// Case-insensitive substring match on any of `columns`. Blank terms add
    /// no filter.
    pub fn filter_contains_any(&mut self, columns: &[&str], term: Option<&str>) -> &mut Self {
        let term = match term.map(str::trim) {
            Some(t) if !t.is_empty() => t,
            _ => return self,
        };
        let pattern = like_pattern(term);

        self.query.push(" AND (");
        for (i, column) in columns.iter().enumerate() {
            if i > 0 {
                self.query.push(" OR ");
            }
            self.query.push(format!("{} ILIKE ", column));
            self.query.push_bind(pattern.clone());
        }
        self.query.push(")");
        self
    }

    /// Append a raw condition that carries no user input
    pub fn filter_raw(&mut self, condition: &str) -> &mut Self {
        self.query.push(" AND ");
        self.query.push(condition);
        self
    }

    /// Append ` AND ` and hand out the builder for a condition that binds
    /// its own values.
    pub fn and_where(&mut self) -> &mut QueryBuilder<'a, Postgres> {
        self.query.push(" AND ");
        &mut self.query
    }

    pub fn group_by(&mut self, columns: &str) -> &mut Self {
        self.query.push(format!(" GROUP BY {}", columns));
        self
    }

    /// Add a sort key. The first call opens the ORDER BY clause, later calls
    /// append tie-breakers in call order.
    pub fn order_by(&mut self, column: &str, direction: &str) -> &mut Self {
        let lead = if self.ordered { ", " } else { " ORDER BY " };
        self.query.push(format!("{}{} {}", lead, column, direction));
        self.ordered = true;
        self
    }

    /// Add a LIMIT clause
    pub fn limit(&mut self, limit: i64) -> &mut Self {
        self.query.push(" LIMIT ");
        self.query.push_bind(limit.max(1));
        self
    }

    /// Build the final query
    pub fn build<T>(&mut self) -> sqlx::query::QueryAs<'_, Postgres, T, sqlx::postgres::PgArguments>
    where
        T: for<'r> FromRow<'r, PgRow>,
    {
        trace!(sql = self.query.sql(), "Search query built");
        self.query.build_query_as()
    }

    #[cfg(test)]
    fn sql(&self) -> &str {
        self.query.sql()
    }
}
