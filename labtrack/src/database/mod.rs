// Root container - owns the projects collection and the dispatch surface

mod ops;

use crate::docstore::{DocStore, FsDocStore};
use crate::error::{LabtrackError, Result};
use crate::node::{Container, NodeRef, Project};
use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

const ROOT_DOC: &str = "database.json";

/// The root of the tree. Owns the top-level projects collection and the
/// single dispatch surface (`api`) used by adapters.
pub struct Database {
    store: Arc<dyn DocStore>,
}

impl Database {
    /// Open a database stored as JSON files under the given directory,
    /// creating and initializing it on first use.
    pub fn open(root: &Path) -> Result<Self> {
        let store: Arc<dyn DocStore> = Arc::new(FsDocStore::open(root)?);
        Self::with_store(store)
    }

    /// Open a database over an explicit document-store backend.
    pub fn with_store(store: Arc<dyn DocStore>) -> Result<Self> {
        let db = Database { store };
        db.initialize()?;
        Ok(db)
    }

    /// First-run bootstrap: write the root document and create the
    /// projects location. Guarded — runs only when no root document
    /// exists yet.
    fn initialize(&self) -> Result<()> {
        if self.store.read(ROOT_DOC)?.is_some() {
            return Ok(());
        }
        self.store.create_node("projects")?;
        let mut meta = Map::new();
        meta.insert("projects".to_string(), Value::Array(Vec::new()));
        // Reserved; nothing writes to it yet.
        meta.insert("archived".to_string(), Value::Array(Vec::new()));
        meta.insert("create_time".to_string(), Value::from(Utc::now().timestamp()));
        self.store.write(ROOT_DOC, &Value::Object(meta))
    }

    pub fn create_project(&self, name: &str, desc: &str) -> Result<()> {
        self.create_child(name, desc)
    }

    pub fn delete_project(&self, name: &str) -> Result<()> {
        self.delete_child(name)
    }

    pub fn get_project(&self, name: &str) -> Result<Project> {
        if self.has_child(name)? {
            Ok(Project::new(self.store.clone(), name))
        } else {
            Err(LabtrackError::NotFound(format!(
                "Project '{name}' does not exist"
            )))
        }
    }

    /// Project names, or full project info with each project's `tasks`
    /// expanded into task-metadata snapshots — exactly one level deep;
    /// the tasks' own `subtasks` stay bare name lists.
    pub fn list_projects(&self, with_info: bool) -> Result<Value> {
        if !with_info {
            return self.list_children(false);
        }

        let mut projects = Vec::new();
        for name in self.child_names()? {
            let meta_path = format!("projects/{name}/metadata.json");
            match self.store.read(&meta_path)? {
                Some(Value::Object(mut doc)) => {
                    let project = Project::new(self.store.clone(), &name);
                    doc.insert("tasks".to_string(), project.list_children(true)?);
                    projects.push(Value::Object(doc));
                }
                Some(_) => log::warn!("project '{name}' has a malformed metadata document"),
                None => log::warn!("project '{name}' has no metadata document"),
            }
        }
        Ok(Value::Array(projects))
    }

    /// The single call surface for adapters. Arguments arrive as a flat
    /// string-keyed, string-valued mapping; the response is either a
    /// success payload or a failure message. Every failure — unknown
    /// operation, coercion error, handler error — is logged and
    /// converted here; nothing escapes as a panic or raw error.
    pub fn api(&self, op: &str, args: &HashMap<String, String>) -> (bool, Value) {
        match ops::dispatch(self, op, args) {
            Ok(payload) => (true, payload),
            Err(err) => {
                log::error!("operation '{op}' failed: {err}");
                (false, Value::String(err.to_string()))
            }
        }
    }
}

impl Container for Database {
    fn store(&self) -> &Arc<dyn DocStore> {
        &self.store
    }

    fn identifier(&self) -> &str {
        ""
    }

    fn metadata_path(&self) -> String {
        ROOT_DOC.to_string()
    }

    fn children_dir(&self) -> String {
        "projects".to_string()
    }

    fn child_list_key(&self) -> &'static str {
        "projects"
    }

    fn child_ref(&self, name: &str) -> NodeRef {
        NodeRef::Project(Project::new(self.store.clone(), name))
    }

    fn child_metadata(
        &self,
        name: &str,
        identifier: &str,
        desc: &str,
        created: i64,
    ) -> Map<String, Value> {
        let mut meta = Map::new();
        meta.insert("name".to_string(), Value::String(name.to_string()));
        meta.insert("identifier".to_string(), Value::String(identifier.to_string()));
        meta.insert("desc".to_string(), Value::String(desc.to_string()));
        meta.insert("tasks".to_string(), Value::Array(Vec::new()));
        meta.insert("create_time".to_string(), Value::from(created));
        meta
    }

    fn child_aux_docs(&self) -> &'static [&'static str] {
        // Projects carry no config/result documents.
        &[]
    }

    fn describe(&self) -> String {
        "the database root".to_string()
    }
}
