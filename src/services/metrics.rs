//! Query log persisted to SQLite for the `status` command.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS query_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    latency_ms INTEGER NOT NULL,
    model TEXT NOT NULL,
    total_tokens INTEGER NOT NULL,
    cost REAL NOT NULL,
    success INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_query_log_timestamp ON query_log(timestamp);
"#;

pub struct QueryLog {
    conn: Mutex<Connection>,
}

impl QueryLog {
    pub fn open(path: &Path) -> Result<Self, rusqlite::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Recording is best effort; a failed insert never fails the query.
    pub fn record(&self, latency_ms: u64, model: &str, total_tokens: u32, cost: f64, success: bool) {
        let Ok(conn) = self.conn.lock() else {
            return;
        };
        let _ = conn.execute(
            "INSERT INTO query_log (timestamp, latency_ms, model, total_tokens, cost, success)
             VALUES (datetime('now'), ?1, ?2, ?3, ?4, ?5)",
            params![latency_ms as i64, model, total_tokens as i64, cost, success as i32],
        );
    }

    pub fn summary(&self, retention_days: u32) -> QuerySummary {
        let query = format!(
            r#"
            SELECT
                COUNT(*) as total_queries,
                COALESCE(AVG(latency_ms), 0) as avg_latency_ms,
                COALESCE(SUM(cost), 0) as total_cost,
                COALESCE(SUM(CASE WHEN success = 0 THEN 1 ELSE 0 END) * 100.0 / NULLIF(COUNT(*), 0), 0) as error_rate
            FROM query_log
            WHERE timestamp >= datetime('now', '-{} days')
            "#,
            retention_days
        );

        let Ok(conn) = self.conn.lock() else {
            return QuerySummary::default();
        };
        conn.query_row(&query, [], |row| {
            Ok(QuerySummary {
                total_queries: row.get::<_, i64>(0)? as u64,
                avg_latency_ms: row.get::<_, f64>(1)? as u64,
                total_cost: row.get::<_, f64>(2)?,
                error_rate: row.get::<_, f64>(3)? as f32,
            })
        })
        .unwrap_or_default()
    }

    pub fn cleanup(&self, retention_days: u32) {
        let query = format!(
            "DELETE FROM query_log WHERE timestamp < datetime('now', '-{} days')",
            retention_days
        );
        let Ok(conn) = self.conn.lock() else {
            return;
        };
        let _ = conn.execute(&query, []);
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuerySummary {
    pub total_queries: u64,
    pub avg_latency_ms: u64,
    pub total_cost: f64,
    pub error_rate: f32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_record_and_summary() {
        let dir = TempDir::new().unwrap();
        let log = QueryLog::open(&dir.path().join("metrics.db")).unwrap();

        log.record(120, "gpt-4o", 350, 0.002, true);
        log.record(80, "gpt-4o", 200, 0.001, true);
        log.record(500, "gpt-4o", 0, 0.0, false);

        let summary = log.summary(7);
        assert_eq!(summary.total_queries, 3);
        assert!((summary.total_cost - 0.003).abs() < 1e-9);
        assert!((summary.error_rate - 100.0 / 3.0).abs() < 0.01);
    }

    #[test]
    fn test_empty_summary() {
        let dir = TempDir::new().unwrap();
        let log = QueryLog::open(&dir.path().join("metrics.db")).unwrap();
        let summary = log.summary(7);
        assert_eq!(summary.total_queries, 0);
        assert_eq!(summary.total_cost, 0.0);
    }
}
