// Tree containers - projects, tasks and recursively nested subtasks

use crate::docstore::DocStore;
use crate::error::{LabtrackError, Result};
use crate::metadata::MetadataStore;
use crate::typed_doc::TypedDoc;
use crate::validation;
use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Shared contract for anything that owns named children: the database
/// root owns projects, a project owns tasks, a task owns subtasks.
///
/// The parent's own child-name list in metadata is the source of truth
/// for membership — never the storage layout. The two can diverge after
/// a crash between the two writes of `create_child`/`delete_child`;
/// when they do, the metadata wins.
pub trait Container {
    fn store(&self) -> &Arc<dyn DocStore>;

    /// Fully qualified slash-joined identifier; empty at the root.
    fn identifier(&self) -> &str;

    /// Location of this node's metadata document.
    fn metadata_path(&self) -> String;

    /// Location prefix under which children live.
    fn children_dir(&self) -> String;

    /// Metadata key holding the ordered child-name list.
    fn child_list_key(&self) -> &'static str;

    /// Handle for a child, without any existence check.
    fn child_ref(&self, name: &str) -> NodeRef;

    /// Initial metadata document for a new child.
    fn child_metadata(
        &self,
        name: &str,
        identifier: &str,
        desc: &str,
        created: i64,
    ) -> Map<String, Value>;

    /// Auxiliary documents created empty alongside a new child's
    /// metadata. Task nodes carry config and result documents.
    fn child_aux_docs(&self) -> &'static [&'static str] {
        &["config.json", "result.json"]
    }

    /// Context used in error messages about this node's children.
    fn describe(&self) -> String {
        format!("'{}'", self.identifier())
    }

    /// Fresh metadata handle. Constructed per call — nothing is cached
    /// between operations.
    fn metadata(&self) -> MetadataStore {
        MetadataStore::new(self.store().clone(), self.metadata_path())
    }

    /// The ordered child-name list from this node's metadata.
    fn child_names(&self) -> Result<Vec<String>> {
        match self.metadata().get(self.child_list_key())? {
            None => Ok(Vec::new()),
            Some(Value::Array(items)) => Ok(items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()),
            Some(_) => Err(LabtrackError::TypeMismatch(format!(
                "Metadata key '{}' of {} is not a list",
                self.child_list_key(),
                self.describe()
            ))),
        }
    }

    fn has_child(&self, name: &str) -> Result<bool> {
        Ok(self.child_names()?.iter().any(|candidate| candidate == name))
    }

    /// Create a named child: write its metadata and empty auxiliary
    /// documents, then add its name to this node's child list. The two
    /// writes are separate and not atomic; a crash in between leaves an
    /// orphan subtree that membership checks will not see.
    fn create_child(&self, name: &str, desc: &str) -> Result<()> {
        if self.has_child(name)? {
            return Err(LabtrackError::AlreadyExists(format!(
                "Child '{name}' under {}",
                self.describe()
            )));
        }
        validation::check_name(name)?;

        let location = format!("{}/{}", self.children_dir(), name);
        let identifier = join_identifier(self.identifier(), name);
        let created = Utc::now().timestamp();

        self.store().create_node(&location)?;
        let meta = self.child_metadata(name, &identifier, desc, created);
        self.store()
            .write(&format!("{location}/metadata.json"), &Value::Object(meta))?;
        for doc in self.child_aux_docs() {
            self.store()
                .write(&format!("{location}/{doc}"), &Value::Object(Map::new()))?;
        }

        self.metadata()
            .append_item(self.child_list_key(), Value::String(name.to_string()))
    }

    /// Delete a named child: remove its whole storage subtree, then drop
    /// its name from this node's child list. Same non-atomicity as
    /// `create_child`.
    fn delete_child(&self, name: &str) -> Result<()> {
        if !self.has_child(name)? {
            return Err(LabtrackError::NotFound(format!(
                "No child '{name}' under {}",
                self.describe()
            )));
        }
        self.store()
            .remove_subtree(&format!("{}/{}", self.children_dir(), name))?;
        self.metadata()
            .remove_item(self.child_list_key(), &Value::String(name.to_string()))
    }

    fn get_child(&self, name: &str) -> Result<NodeRef> {
        if self.has_child(name)? {
            Ok(self.child_ref(name))
        } else {
            Err(LabtrackError::NotFound(format!(
                "No child '{name}' under {}",
                self.describe()
            )))
        }
    }

    /// Child names, or one metadata snapshot per child when `with_info`
    /// is set (one re-read per child, never memoized). A listed child
    /// whose metadata document cannot be read is skipped with a warning.
    fn list_children(&self, with_info: bool) -> Result<Value> {
        let names = self.child_names()?;
        if !with_info {
            return Ok(Value::Array(
                names.into_iter().map(Value::String).collect(),
            ));
        }

        let mut infos = Vec::new();
        for name in &names {
            let meta_path = format!("{}/{name}/metadata.json", self.children_dir());
            match self.store().read(&meta_path)? {
                Some(doc) => infos.push(doc),
                None => log::warn!(
                    "child '{name}' listed under {} has no metadata document",
                    self.describe()
                ),
            }
        }
        Ok(Value::Array(infos))
    }
}

fn join_identifier(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

fn task_metadata(name: &str, identifier: &str, desc: &str, created: i64) -> Map<String, Value> {
    let mut meta = Map::new();
    meta.insert("name".to_string(), Value::String(name.to_string()));
    meta.insert("identifier".to_string(), Value::String(identifier.to_string()));
    meta.insert("desc".to_string(), Value::String(desc.to_string()));
    meta.insert("status".to_string(), Value::String("running".to_string()));
    meta.insert("subtasks".to_string(), Value::Array(Vec::new()));
    meta.insert("create_time".to_string(), Value::from(created));
    meta
}

/// A top-level project. Children are tasks.
pub struct Project {
    store: Arc<dyn DocStore>,
    identifier: String,
    location: String,
}

impl Project {
    pub(crate) fn new(store: Arc<dyn DocStore>, name: &str) -> Self {
        Project {
            store,
            identifier: name.to_string(),
            location: format!("projects/{name}"),
        }
    }
}

impl Container for Project {
    fn store(&self) -> &Arc<dyn DocStore> {
        &self.store
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn metadata_path(&self) -> String {
        format!("{}/metadata.json", self.location)
    }

    fn children_dir(&self) -> String {
        format!("{}/tasks", self.location)
    }

    fn child_list_key(&self) -> &'static str {
        "tasks"
    }

    fn child_ref(&self, name: &str) -> NodeRef {
        NodeRef::Task(Task {
            store: self.store.clone(),
            identifier: join_identifier(&self.identifier, name),
            location: format!("{}/{name}", self.children_dir()),
        })
    }

    fn child_metadata(
        &self,
        name: &str,
        identifier: &str,
        desc: &str,
        created: i64,
    ) -> Map<String, Value> {
        task_metadata(name, identifier, desc, created)
    }
}

/// A task, or a subtask at any depth. Children are again tasks; nesting
/// is unbounded. Each task additionally owns a config document and a
/// result document.
pub struct Task {
    store: Arc<dyn DocStore>,
    identifier: String,
    location: String,
}

impl Task {
    /// The typed config document scoped to this task.
    pub fn configs(&self) -> TypedDoc {
        TypedDoc::config(self.store.clone(), format!("{}/config.json", self.location))
    }

    /// The typed result document scoped to this task.
    pub fn results(&self) -> TypedDoc {
        TypedDoc::result(self.store.clone(), format!("{}/result.json", self.location))
    }
}

impl Container for Task {
    fn store(&self) -> &Arc<dyn DocStore> {
        &self.store
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn metadata_path(&self) -> String {
        format!("{}/metadata.json", self.location)
    }

    fn children_dir(&self) -> String {
        format!("{}/subtasks", self.location)
    }

    fn child_list_key(&self) -> &'static str {
        "subtasks"
    }

    fn child_ref(&self, name: &str) -> NodeRef {
        NodeRef::Task(Task {
            store: self.store.clone(),
            identifier: join_identifier(&self.identifier, name),
            location: format!("{}/{name}", self.children_dir()),
        })
    }

    fn child_metadata(
        &self,
        name: &str,
        identifier: &str,
        desc: &str,
        created: i64,
    ) -> Map<String, Value> {
        task_metadata(name, identifier, desc, created)
    }
}

/// A resolved node of either concrete kind, for code that walks the
/// tree without caring which level it is on.
pub enum NodeRef {
    Project(Project),
    Task(Task),
}

impl NodeRef {
    pub fn as_task(&self) -> Option<&Task> {
        match self {
            NodeRef::Task(task) => Some(task),
            NodeRef::Project(_) => None,
        }
    }

    pub fn into_task(self) -> Option<Task> {
        match self {
            NodeRef::Task(task) => Some(task),
            NodeRef::Project(_) => None,
        }
    }
}

impl Container for NodeRef {
    fn store(&self) -> &Arc<dyn DocStore> {
        match self {
            NodeRef::Project(project) => project.store(),
            NodeRef::Task(task) => task.store(),
        }
    }

    fn identifier(&self) -> &str {
        match self {
            NodeRef::Project(project) => project.identifier(),
            NodeRef::Task(task) => task.identifier(),
        }
    }

    fn metadata_path(&self) -> String {
        match self {
            NodeRef::Project(project) => project.metadata_path(),
            NodeRef::Task(task) => task.metadata_path(),
        }
    }

    fn children_dir(&self) -> String {
        match self {
            NodeRef::Project(project) => project.children_dir(),
            NodeRef::Task(task) => task.children_dir(),
        }
    }

    fn child_list_key(&self) -> &'static str {
        match self {
            NodeRef::Project(project) => project.child_list_key(),
            NodeRef::Task(task) => task.child_list_key(),
        }
    }

    fn child_ref(&self, name: &str) -> NodeRef {
        match self {
            NodeRef::Project(project) => project.child_ref(name),
            NodeRef::Task(task) => task.child_ref(name),
        }
    }

    fn child_metadata(
        &self,
        name: &str,
        identifier: &str,
        desc: &str,
        created: i64,
    ) -> Map<String, Value> {
        match self {
            NodeRef::Project(project) => project.child_metadata(name, identifier, desc, created),
            NodeRef::Task(task) => task.child_metadata(name, identifier, desc, created),
        }
    }
}

impl std::fmt::Debug for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Project")
            .field("identifier", &self.identifier)
            .field("location", &self.location)
            .finish()
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("identifier", &self.identifier)
            .field("location", &self.location)
            .finish()
    }
}

impl std::fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeRef::Project(project) => f.debug_tuple("Project").field(project).finish(),
            NodeRef::Task(task) => f.debug_tuple("Task").field(task).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docstore::FsDocStore;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Project) {
        let tmp = TempDir::new().unwrap();
        let store: Arc<dyn DocStore> = Arc::new(FsDocStore::open(tmp.path()).unwrap());
        store
            .write(
                "projects/proj1/metadata.json",
                &json!({
                    "name": "proj1",
                    "identifier": "proj1",
                    "desc": "",
                    "tasks": [],
                    "create_time": 1700000000,
                }),
            )
            .unwrap();
        let project = Project::new(store, "proj1");
        (tmp, project)
    }

    #[test]
    fn test_create_then_has_then_delete() {
        let (_tmp, project) = setup();
        project.create_child("task1", "").unwrap();
        assert!(project.has_child("task1").unwrap());
        project.delete_child("task1").unwrap();
        assert!(!project.has_child("task1").unwrap());
    }

    #[test]
    fn test_created_task_metadata_shape() {
        let (_tmp, project) = setup();
        project.create_child("task1", "first run").unwrap();

        let task = project.get_child("task1").unwrap();
        let meta = task.metadata().read().unwrap();
        assert_eq!(meta["name"], json!("task1"));
        assert_eq!(meta["identifier"], json!("proj1/task1"));
        assert_eq!(meta["desc"], json!("first run"));
        assert_eq!(meta["status"], json!("running"));
        assert_eq!(meta["subtasks"], json!([]));
        assert!(meta["create_time"].is_i64());
    }

    #[test]
    fn test_create_writes_empty_aux_docs() {
        let (_tmp, project) = setup();
        project.create_child("task1", "").unwrap();
        let store = project.store();
        assert_eq!(
            store.read("projects/proj1/tasks/task1/config.json").unwrap(),
            Some(json!({}))
        );
        assert_eq!(
            store.read("projects/proj1/tasks/task1/result.json").unwrap(),
            Some(json!({}))
        );
    }

    #[test]
    fn test_duplicate_create_fails_without_mutation() {
        let (_tmp, project) = setup();
        project.create_child("task1", "baseline").unwrap();
        let err = project.create_child("task1", "clobber").unwrap_err();
        assert!(matches!(err, LabtrackError::AlreadyExists(_)));

        // Neither the parent list nor the child document changed.
        assert_eq!(project.child_names().unwrap(), vec!["task1"]);
        let meta = project.get_child("task1").unwrap().metadata().read().unwrap();
        assert_eq!(meta["desc"], json!("baseline"));
    }

    #[test]
    fn test_invalid_child_name_is_rejected() {
        let (_tmp, project) = setup();
        let err = project.create_child("a/b", "").unwrap_err();
        assert!(matches!(err, LabtrackError::InvalidName(_)));
        assert!(project.child_names().unwrap().is_empty());
    }

    #[test]
    fn test_nested_subtask_identifier() {
        let (_tmp, project) = setup();
        project.create_child("task1", "").unwrap();
        let task = project.get_child("task1").unwrap();
        task.create_child("sub1", "").unwrap();

        let sub = task.get_child("sub1").unwrap();
        assert_eq!(sub.identifier(), "proj1/task1/sub1");
        let meta = sub.metadata().read().unwrap();
        assert_eq!(meta["identifier"], json!("proj1/task1/sub1"));
    }

    #[test]
    fn test_delete_removes_whole_subtree() {
        let (_tmp, project) = setup();
        project.create_child("task1", "").unwrap();
        let task = project.get_child("task1").unwrap();
        task.create_child("sub1", "").unwrap();

        project.delete_child("task1").unwrap();
        assert!(project
            .store()
            .read("projects/proj1/tasks/task1/metadata.json")
            .unwrap()
            .is_none());
        assert!(project
            .store()
            .read("projects/proj1/tasks/task1/subtasks/sub1/metadata.json")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_delete_missing_child_fails() {
        let (_tmp, project) = setup();
        let err = project.delete_child("ghost").unwrap_err();
        assert!(matches!(err, LabtrackError::NotFound(_)));
    }

    #[test]
    fn test_get_child_error_names_parent() {
        let (_tmp, project) = setup();
        let err = project.get_child("ghost").unwrap_err();
        assert!(err.to_string().contains("'proj1'"));
    }

    #[test]
    fn test_list_children_bare_and_with_info() {
        let (_tmp, project) = setup();
        project.create_child("task1", "").unwrap();
        project.create_child("task2", "").unwrap();

        assert_eq!(
            project.list_children(false).unwrap(),
            json!(["task1", "task2"])
        );

        let infos = project.list_children(true).unwrap();
        let infos = infos.as_array().unwrap();
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0]["identifier"], json!("proj1/task1"));
        assert_eq!(infos[1]["identifier"], json!("proj1/task2"));
    }

    #[test]
    fn test_membership_follows_metadata_not_storage() {
        let (_tmp, project) = setup();
        project.create_child("task1", "").unwrap();
        // Remove the subtree behind the metadata's back.
        project
            .store()
            .remove_subtree("projects/proj1/tasks/task1")
            .unwrap();
        // The metadata list is the source of truth.
        assert!(project.has_child("task1").unwrap());
    }

    #[test]
    fn test_task_config_and_result_docs_are_scoped() {
        let (_tmp, project) = setup();
        project.create_child("task1", "").unwrap();
        let node = project.get_child("task1").unwrap();
        let task = node.as_task().unwrap();

        task.configs().insert("lr", "0.1", "float", false).unwrap();
        task.results().insert("loss", "[\"x\"]", "plot2d", false).unwrap();

        assert!(task.configs().get("lr").unwrap().is_some());
        assert!(task.configs().get("loss").unwrap().is_none());
        assert!(task.results().get("loss").unwrap().is_some());
    }
}
