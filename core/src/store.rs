//! # Result Store
//!
//! Persistence for flat result rows. A run writes each batch into a staging
//! table as soon as it is scanned, so an interrupted run loses at most the
//! batch in flight; the staging rows are appended to the permanent table at
//! the end.
//!
//! Table names are checked against a strict identifier pattern before they
//! reach any statement, and every value is a bound parameter.

use once_cell::sync::Lazy;
use regex::Regex;

use netsift_common::models::{FlatRecord, HttpUpdate};
use netsift_common::predicate::{Condition, Operator, Predicate};

use crate::error::{Error, Result};

pub mod sqlite;

pub use sqlite::SqliteStore;

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier pattern"));

/// Data columns of a result table, in insertion order.
pub const COLUMNS: [&str; 14] = [
    "cidr", "ip", "domain", "port", "state", "reason", "name", "product", "version", "extrainfo",
    "conf", "cpe", "title", "status",
];

pub trait Store {
    /// Creates `table` with the result schema unless it already exists.
    fn create_table(&self, table: &str) -> Result<()>;

    /// Number of tables named `table`: `0` or `1`.
    fn table_exists(&self, table: &str) -> Result<usize>;

    fn drop_table(&self, table: &str) -> Result<()>;

    fn insert(&self, table: &str, rows: &[FlatRecord]) -> Result<usize>;

    /// Sets title and status on every row matching (ip, port).
    fn update_http(&self, table: &str, updates: &[HttpUpdate]) -> Result<usize>;

    fn query(&self, table: &str, predicate: &Predicate) -> Result<Vec<FlatRecord>>;

    /// Appends every row of `src` to `dst`, then empties `src`.
    fn merge_tables(&self, src: &str, dst: &str) -> Result<usize>;

    /// Drops `table` if present.
    fn clean(&self, table: &str) -> Result<()>;

    fn list_tables(&self) -> Result<Vec<String>>;

    fn rows(&self, table: &str) -> Result<Vec<FlatRecord>> {
        self.query(table, &Predicate::default())
    }
}

pub fn validate_identifier(name: &str) -> Result<&str> {
    if IDENTIFIER.is_match(name) {
        Ok(name)
    } else {
        Err(Error::InvalidIdentifier(name.to_string()))
    }
}

/// Rows worth requesting: open, HTTP-like and not yet titled.
pub fn http_candidates() -> Predicate {
    Predicate::new(vec![
        Condition::new("name", Operator::Like, "http"),
        Condition::new("state", Operator::Eq, "open"),
        Condition::new("title", Operator::IsNull, ""),
    ])
}

/// `WHERE` clause and its parameters. Fields outside [`COLUMNS`] are refused.
pub(crate) fn where_clause(predicate: &Predicate) -> Result<(String, Vec<String>)> {
    if predicate.is_empty() {
        return Ok((String::new(), Vec::new()));
    }

    let mut parts = Vec::with_capacity(predicate.conditions.len());
    let mut params = Vec::new();

    for cond in &predicate.conditions {
        let column = COLUMNS
            .iter()
            .find(|c| **c == cond.field)
            .ok_or_else(|| Error::InvalidIdentifier(cond.field.clone()))?;

        let sql = match cond.operator {
            Operator::IsNull => format!("{column} IS NULL"),
            Operator::NotNull => format!("{column} IS NOT NULL"),
            Operator::Like => {
                params.push(format!("%{}%", cond.value));
                format!("{column} LIKE ?")
            }
            op => {
                params.push(cond.value.clone());
                let symbol = match op {
                    Operator::Eq => "=",
                    Operator::Ne => "!=",
                    Operator::Lt => "<",
                    Operator::Le => "<=",
                    Operator::Gt => ">",
                    _ => ">=",
                };
                format!("{column} {symbol} ?")
            }
        };
        parts.push(sql);
    }

    Ok((format!(" WHERE {}", parts.join(" AND ")), params))
}
