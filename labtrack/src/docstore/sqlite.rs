use crate::docstore::DocStore;
use crate::error::Result;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;

/// SQLite backend: one `documents` table keyed by the same relative
/// paths the filesystem backend uses. Node locations have no on-disk
/// shape of their own, so `create_node` is a no-op here.
pub struct SqliteDocStore {
    conn: Connection,
}

impl SqliteDocStore {
    /// Open or create the document database at the given file path.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = SqliteDocStore { conn };
        store.initialize_tables()?;
        Ok(store)
    }

    /// Open an in-memory document database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = SqliteDocStore { conn };
        store.initialize_tables()?;
        Ok(store)
    }

    fn initialize_tables(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS documents (
                path TEXT PRIMARY KEY,
                json TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }
}

impl DocStore for SqliteDocStore {
    fn read(&self, path: &str) -> Result<Option<Value>> {
        let text: Option<String> = self
            .conn
            .query_row(
                "SELECT json FROM documents WHERE path = ?1",
                params![path],
                |row| row.get(0),
            )
            .optional()?;
        match text {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    fn write(&self, path: &str, doc: &Value) -> Result<()> {
        self.conn.execute(
            "INSERT INTO documents (path, json) VALUES (?1, ?2)
             ON CONFLICT(path) DO UPDATE SET json = excluded.json",
            params![path, serde_json::to_string(doc)?],
        )?;
        Ok(())
    }

    fn create_node(&self, _prefix: &str) -> Result<()> {
        Ok(())
    }

    fn remove_subtree(&self, prefix: &str) -> Result<()> {
        // Not LIKE: '_' is legal in node names but is a LIKE wildcard.
        self.conn.execute(
            "DELETE FROM documents
             WHERE path = ?1 OR substr(path, 1, length(?1) + 1) = ?1 || '/'",
            params![prefix],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_write_then_read_round_trip() {
        let store = SqliteDocStore::open_in_memory().unwrap();
        let doc = json!({"name": "proj1", "tasks": ["t1"]});
        store.write("projects/proj1/metadata.json", &doc).unwrap();
        assert_eq!(store.read("projects/proj1/metadata.json").unwrap(), Some(doc));
    }

    #[test]
    fn test_read_missing_is_none() {
        let store = SqliteDocStore::open_in_memory().unwrap();
        assert!(store.read("database.json").unwrap().is_none());
    }

    #[test]
    fn test_write_replaces_whole_document() {
        let store = SqliteDocStore::open_in_memory().unwrap();
        store.write("database.json", &json!({"a": 1})).unwrap();
        store.write("database.json", &json!({"b": 2})).unwrap();
        assert_eq!(store.read("database.json").unwrap(), Some(json!({"b": 2})));
    }

    #[test]
    fn test_remove_subtree_deletes_by_prefix_only() {
        let store = SqliteDocStore::open_in_memory().unwrap();
        store.write("projects/p/metadata.json", &json!({})).unwrap();
        store
            .write("projects/p/tasks/t/metadata.json", &json!({}))
            .unwrap();
        // Sibling with a shared name prefix must survive.
        store.write("projects/p2/metadata.json", &json!({})).unwrap();

        store.remove_subtree("projects/p").unwrap();
        assert!(store.read("projects/p/metadata.json").unwrap().is_none());
        assert!(store
            .read("projects/p/tasks/t/metadata.json")
            .unwrap()
            .is_none());
        assert!(store.read("projects/p2/metadata.json").unwrap().is_some());
    }
}
