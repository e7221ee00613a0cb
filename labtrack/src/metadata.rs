use crate::docstore::DocStore;
use crate::error::{LabtrackError, Result};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Per-node metadata document handle.
///
/// The handle holds no state beyond its location: every operation is a
/// full read-modify-write cycle against the persisted document, and
/// every mutation rewrites the document as a whole. Concurrent writers
/// to the same node therefore race with last-write-wins semantics.
pub struct MetadataStore {
    store: Arc<dyn DocStore>,
    doc_path: String,
}

impl MetadataStore {
    pub fn new(store: Arc<dyn DocStore>, doc_path: String) -> Self {
        MetadataStore { store, doc_path }
    }

    fn load(&self) -> Result<Map<String, Value>> {
        match self.store.read(&self.doc_path)? {
            Some(Value::Object(map)) => Ok(map),
            Some(_) => Err(LabtrackError::Other(format!(
                "metadata document '{}' is not a JSON object",
                self.doc_path
            ))),
            None => Err(LabtrackError::NotFound(format!(
                "No metadata document at '{}'",
                self.doc_path
            ))),
        }
    }

    fn save(&self, map: Map<String, Value>) -> Result<()> {
        self.store.write(&self.doc_path, &Value::Object(map))
    }

    /// Full snapshot of the document.
    pub fn read(&self) -> Result<Map<String, Value>> {
        self.load()
    }

    /// Value of one key, if present.
    pub fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.load()?.get(key).cloned())
    }

    /// Upsert a key and persist synchronously.
    pub fn add(&self, key: &str, value: Value) -> Result<()> {
        let mut map = self.load()?;
        map.insert(key.to_string(), value);
        self.save(map)
    }

    /// Remove a key, returning the removed value.
    pub fn delete(&self, key: &str) -> Result<Value> {
        let mut map = self.load()?;
        let removed = map.remove(key).ok_or_else(|| {
            LabtrackError::NotFound(format!("No metadata key '{key}' in '{}'", self.doc_path))
        })?;
        self.save(map)?;
        Ok(removed)
    }

    /// Append an item to a list-valued key. A missing key is initialized
    /// to a one-element list; a present non-list value is a type error.
    pub fn append_item(&self, key: &str, item: Value) -> Result<()> {
        let mut map = self.load()?;
        match map.get_mut(key) {
            None => {
                map.insert(key.to_string(), Value::Array(vec![item]));
            }
            Some(Value::Array(items)) => items.push(item),
            Some(_) => {
                return Err(LabtrackError::TypeMismatch(format!(
                    "Metadata key '{key}' in '{}' is not a list",
                    self.doc_path
                )))
            }
        }
        self.save(map)
    }

    /// Remove the first matching item from a list-valued key. A missing
    /// key or missing item fails; a missing key is never initialized.
    pub fn remove_item(&self, key: &str, item: &Value) -> Result<()> {
        let mut map = self.load()?;
        let items = match map.get_mut(key) {
            None => {
                return Err(LabtrackError::NotFound(format!(
                    "No metadata key '{key}' in '{}'",
                    self.doc_path
                )))
            }
            Some(Value::Array(items)) => items,
            Some(_) => {
                return Err(LabtrackError::TypeMismatch(format!(
                    "Metadata key '{key}' in '{}' is not a list",
                    self.doc_path
                )))
            }
        };
        let position = items.iter().position(|candidate| candidate == item).ok_or_else(|| {
            LabtrackError::NotFound(format!(
                "Item {item} is not in metadata list '{key}' in '{}'",
                self.doc_path
            ))
        })?;
        items.remove(position);
        self.save(map)
    }
}
