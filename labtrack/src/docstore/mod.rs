// Document storage - whole-document read/write behind a pluggable backend

mod fs;
mod sqlite;

pub use fs::FsDocStore;
pub use sqlite::SqliteDocStore;

use crate::error::Result;
use serde_json::Value;

/// Backend abstraction for persisted documents.
///
/// Documents are addressed by slash-joined relative paths
/// (e.g. `projects/proj1/tasks/task1/metadata.json`) and read or
/// replaced only as whole units — there is no partial merge. Node
/// logic never branches on the backend.
pub trait DocStore {
    /// Read a full document, or `None` if it does not exist.
    fn read(&self, path: &str) -> Result<Option<Value>>;

    /// Replace a full document, creating it if absent.
    fn write(&self, path: &str, doc: &Value) -> Result<()>;

    /// Ensure a node location exists so documents can be written under it.
    fn create_node(&self, prefix: &str) -> Result<()>;

    /// Remove every document at or below the given node location.
    /// Removing a location that does not exist is not an error.
    fn remove_subtree(&self, prefix: &str) -> Result<()>;
}
