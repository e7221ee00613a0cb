use crate::docstore::DocStore;
use crate::error::Result;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Filesystem backend: each document is a JSON file under a root
/// directory, so the whole store stays inspectable with ordinary tools.
pub struct FsDocStore {
    root: PathBuf,
}

impl FsDocStore {
    /// Open the store rooted at the given directory, creating it if needed.
    pub fn open(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root)?;
        Ok(FsDocStore {
            root: root.to_path_buf(),
        })
    }

    fn resolve(&self, rel: &str) -> PathBuf {
        let mut path = self.root.clone();
        for segment in rel.split('/').filter(|s| !s.is_empty()) {
            path.push(segment);
        }
        path
    }
}

impl DocStore for FsDocStore {
    fn read(&self, path: &str) -> Result<Option<Value>> {
        let abs = self.resolve(path);
        if !abs.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&abs)?;
        Ok(Some(serde_json::from_str(&text)?))
    }

    fn write(&self, path: &str, doc: &Value) -> Result<()> {
        let abs = self.resolve(path);
        if let Some(parent) = abs.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // Full rewrite on every mutation; the documents are small.
        std::fs::write(&abs, serde_json::to_string_pretty(doc)?)?;
        Ok(())
    }

    fn create_node(&self, prefix: &str) -> Result<()> {
        std::fs::create_dir_all(self.resolve(prefix))?;
        Ok(())
    }

    fn remove_subtree(&self, prefix: &str) -> Result<()> {
        let abs = self.resolve(prefix);
        if abs.is_dir() {
            std::fs::remove_dir_all(&abs)?;
        } else if abs.is_file() {
            std::fs::remove_file(&abs)?;
        }
        Ok(())
    }
}
