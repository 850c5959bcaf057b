//! The relational database boundary (spec §6: "a generic handle supporting
//! `Exec`, `Query`, `QueryRow`, each with context"). Modeled on the
//! teacher's `connectors/database.rs` query/result shapes, generalized
//! behind an `async_trait`.
//!
//! [`MockDatabase`] is the documented mock-fallback collaborator (spec §9
//! "Mock fallbacks"): every query against a table with no matching rows
//! returns `Ok` with an empty row set rather than an error, so handler
//! code exercises its real `ErrNoRows`-equivalent default path.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use crate::error::{AutomationError, AutomationResult};

#[derive(Debug, Clone, Default)]
pub struct DbRow(pub HashMap<String, Value>);

impl DbRow {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(|v| v.as_f64())
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct DbResult {
    pub rows_affected: u64,
    pub rows: Vec<DbRow>,
}

impl DbResult {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// The database boundary the core is built against. Every handler takes a
/// `&dyn Database` (or `Arc<dyn Database>`) rather than a concrete client,
/// matching §6's framing of the database as an external collaborator.
#[async_trait]
pub trait Database: Send + Sync {
    async fn execute(&self, statement: &str, params: &[Value]) -> AutomationResult<DbResult>;
    async fn query(&self, statement: &str, params: &[Value]) -> AutomationResult<Vec<DbRow>>;
    async fn query_row(&self, statement: &str, params: &[Value]) -> AutomationResult<Option<DbRow>> {
        Ok(self.query(statement, params).await?.into_iter().next())
    }
}

/// In-memory table store used for tests and for the documented
/// smooth-startup-on-empty-database behavior. `statement` is interpreted
/// as `"<verb> <table>"` (e.g. `"select strategies"`, `"upsert hotlist_scores"`)
/// — enough structure for handlers to route reads/writes without a real
/// SQL engine, while keeping the trait boundary identical to a production
/// client's.
pub struct MockDatabase {
    tables: RwLock<HashMap<String, Vec<DbRow>>>,
}

impl MockDatabase {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn seed(&self, table: &str, rows: Vec<DbRow>) {
        self.tables.write().insert(table.to_string(), rows);
    }

    pub fn table_rows(&self, table: &str) -> Vec<DbRow> {
        self.tables
            .read()
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    fn table_name(statement: &str) -> Option<&str> {
        statement.split_whitespace().nth(1)
    }
}

impl Default for MockDatabase {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Database for MockDatabase {
    async fn execute(&self, statement: &str, params: &[Value]) -> AutomationResult<DbResult> {
        let Some(table) = Self::table_name(statement) else {
            return Err(AutomationError::Database(format!(
                "cannot resolve table from statement: {statement}"
            )));
        };
        let mut tables = self.tables.write();
        let entry = tables.entry(table.to_string()).or_default();
        if statement.starts_with("insert") || statement.starts_with("upsert") {
            if let Some(row) = params.first().and_then(|v| v.as_object()) {
                let row = DbRow(row.clone().into_iter().collect());
                if statement.starts_with("upsert") {
                    if let Some(key) = params.get(1).and_then(|v| v.as_str()) {
                        entry.retain(|r| r.get_str("id") != Some(key));
                    }
                }
                entry.push(row);
            }
        }
        Ok(DbResult {
            rows_affected: 1,
            rows: Vec::new(),
        })
    }

    async fn query(&self, statement: &str, _params: &[Value]) -> AutomationResult<Vec<DbRow>> {
        let Some(table) = Self::table_name(statement) else {
            return Err(AutomationError::Database(format!(
                "cannot resolve table from statement: {statement}"
            )));
        };
        Ok(self.table_rows(table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn missing_table_returns_empty_not_error() {
        let db = MockDatabase::new();
        let rows = db.query("select strategies", &[]).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn seeded_rows_are_queryable() {
        let db = MockDatabase::new();
        let mut row = HashMap::new();
        row.insert("id".to_string(), json!("s1"));
        db.seed("strategies", vec![DbRow(row)]);

        let rows = db.query("select strategies", &[]).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_str("id"), Some("s1"));
    }
}
