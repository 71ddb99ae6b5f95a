//! SQLite-backed dataset registry.
//!
//! Tracks every ingested dataset with its chunking configuration and
//! enabled flag. The vector index holds the chunks themselves; this
//! registry is the authority on which datasets exist and which are
//! eligible for retrieval.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension, params};

use crate::error::RegistryError;
use crate::models::{ChunkingStrategy, Dataset};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS datasets (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    enabled INTEGER NOT NULL DEFAULT 1,
    chunk_size INTEGER NOT NULL,
    chunk_overlap INTEGER NOT NULL,
    chunking_strategy TEXT NOT NULL,
    num_chunks INTEGER NOT NULL DEFAULT 0,
    file_size INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_datasets_name ON datasets(name);
"#;

pub struct DatasetRegistry {
    conn: Mutex<Connection>,
}

fn row_to_dataset(row: &rusqlite::Row<'_>) -> rusqlite::Result<Dataset> {
    let strategy: String = row.get("chunking_strategy")?;
    Ok(Dataset {
        id: row.get("id")?,
        name: row.get("name")?,
        enabled: row.get::<_, i64>("enabled")? != 0,
        chunk_size: row.get::<_, i64>("chunk_size")? as u32,
        chunk_overlap: row.get::<_, i64>("chunk_overlap")? as u32,
        strategy: strategy.parse().unwrap_or(ChunkingStrategy::Sentences),
        num_chunks: row.get::<_, i64>("num_chunks")? as u32,
        file_size: row.get::<_, i64>("file_size")? as u64,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

impl DatasetRegistry {
    pub fn open(path: &Path) -> Result<Self, RegistryError> {
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

    pub fn open_in_memory() -> Result<Self, RegistryError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, RegistryError> {
        self.conn.lock().map_err(|_| RegistryError::Lock)
    }

    pub fn create(&self, dataset: &Dataset) -> Result<(), RegistryError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO datasets
                (id, name, enabled, chunk_size, chunk_overlap, chunking_strategy,
                 num_chunks, file_size, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                dataset.id,
                dataset.name,
                dataset.enabled as i64,
                dataset.chunk_size as i64,
                dataset.chunk_overlap as i64,
                dataset.strategy.to_string(),
                dataset.num_chunks as i64,
                dataset.file_size as i64,
                dataset.created_at,
                dataset.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn list(&self) -> Result<Vec<Dataset>, RegistryError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT * FROM datasets ORDER BY created_at")?;
        let rows = stmt.query_map([], row_to_dataset)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn get(&self, id: &str) -> Result<Dataset, RegistryError> {
        let conn = self.conn()?;
        conn.prepare("SELECT * FROM datasets WHERE id = ?1")?
            .query_row(params![id], row_to_dataset)
            .optional()?
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    pub fn find_by_name(&self, name: &str) -> Result<Option<Dataset>, RegistryError> {
        let conn = self.conn()?;
        Ok(conn
            .prepare("SELECT * FROM datasets WHERE name = ?1")?
            .query_row(params![name], row_to_dataset)
            .optional()?)
    }

    /// Resolves an id or a name to a dataset, ids taking precedence.
    pub fn resolve(&self, id_or_name: &str) -> Result<Dataset, RegistryError> {
        match self.get(id_or_name) {
            Ok(dataset) => Ok(dataset),
            Err(RegistryError::NotFound(_)) => self
                .find_by_name(id_or_name)?
                .ok_or_else(|| RegistryError::NotFound(id_or_name.to_string())),
            Err(e) => Err(e),
        }
    }

    pub fn rename(&self, id: &str, new_name: &str) -> Result<(), RegistryError> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE datasets SET name = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, new_name, chrono::Utc::now().to_rfc3339()],
        )?;
        if updated == 0 {
            return Err(RegistryError::NotFound(id.to_string()));
        }
        Ok(())
    }

    pub fn set_enabled(&self, id: &str, enabled: bool) -> Result<(), RegistryError> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE datasets SET enabled = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, enabled as i64, chrono::Utc::now().to_rfc3339()],
        )?;
        if updated == 0 {
            return Err(RegistryError::NotFound(id.to_string()));
        }
        Ok(())
    }

    pub fn update_stats(
        &self,
        id: &str,
        num_chunks: u32,
        file_size: u64,
    ) -> Result<(), RegistryError> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE datasets SET num_chunks = ?2, file_size = ?3, updated_at = ?4
             WHERE id = ?1",
            params![
                id,
                num_chunks as i64,
                file_size as i64,
                chrono::Utc::now().to_rfc3339()
            ],
        )?;
        if updated == 0 {
            return Err(RegistryError::NotFound(id.to_string()));
        }
        Ok(())
    }

    pub fn delete(&self, id: &str) -> Result<(), RegistryError> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM datasets WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(RegistryError::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// Ids of all datasets currently eligible for retrieval.
    pub fn enabled_ids(&self) -> Result<Vec<String>, RegistryError> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT id FROM datasets WHERE enabled = 1 ORDER BY created_at")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with(name: &str) -> (DatasetRegistry, Dataset) {
        let registry = DatasetRegistry::open_in_memory().unwrap();
        let dataset = Dataset::new(name, 500, 50, ChunkingStrategy::Sentences);
        registry.create(&dataset).unwrap();
        (registry, dataset)
    }

    #[test]
    fn test_create_and_get() {
        let (registry, dataset) = registry_with("aesop");
        let loaded = registry.get(&dataset.id).unwrap();
        assert_eq!(loaded.name, "aesop");
        assert!(loaded.enabled);
        assert_eq!(loaded.strategy, ChunkingStrategy::Sentences);
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let registry = DatasetRegistry::open_in_memory().unwrap();
        assert!(matches!(
            registry.get("nope"),
            Err(RegistryError::NotFound(_))
        ));
    }

    #[test]
    fn test_resolve_by_name() {
        let (registry, dataset) = registry_with("fables");
        let loaded = registry.resolve("fables").unwrap();
        assert_eq!(loaded.id, dataset.id);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let (registry, _) = registry_with("aesop");
        let other = Dataset::new("aesop", 500, 50, ChunkingStrategy::Characters);
        assert!(registry.create(&other).is_err());
    }

    #[test]
    fn test_toggle_enabled() {
        let (registry, dataset) = registry_with("aesop");
        registry.set_enabled(&dataset.id, false).unwrap();
        assert!(!registry.get(&dataset.id).unwrap().enabled);
        assert!(registry.enabled_ids().unwrap().is_empty());

        registry.set_enabled(&dataset.id, true).unwrap();
        assert_eq!(registry.enabled_ids().unwrap(), vec![dataset.id]);
    }

    #[test]
    fn test_rename_updates_timestamp() {
        let (registry, dataset) = registry_with("old");
        registry.rename(&dataset.id, "new").unwrap();
        let loaded = registry.get(&dataset.id).unwrap();
        assert_eq!(loaded.name, "new");
        assert!(loaded.updated_at >= loaded.created_at);
    }

    #[test]
    fn test_update_stats() {
        let (registry, dataset) = registry_with("aesop");
        registry.update_stats(&dataset.id, 12, 4096).unwrap();
        let loaded = registry.get(&dataset.id).unwrap();
        assert_eq!(loaded.num_chunks, 12);
        assert_eq!(loaded.file_size, 4096);
    }

    #[test]
    fn test_delete() {
        let (registry, dataset) = registry_with("aesop");
        registry.delete(&dataset.id).unwrap();
        assert!(registry.list().unwrap().is_empty());
        assert!(matches!(
            registry.delete(&dataset.id),
            Err(RegistryError::NotFound(_))
        ));
    }
}
