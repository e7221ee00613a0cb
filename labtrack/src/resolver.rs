use crate::database::Database;
use crate::error::{LabtrackError, Result};
use crate::node::{Container, NodeRef, Task};

/// Resolve a slash-delimited identifier to a node.
///
/// An identifier without a separator is a bare project name. Otherwise
/// the first segment names a project and every further segment walks
/// exactly one child level. No `..`, no wildcards, and no caching —
/// each step re-reads the implicated node's metadata.
pub fn resolve(db: &Database, identifier: &str) -> Result<NodeRef> {
    if !identifier.contains('/') {
        return Ok(NodeRef::Project(db.get_project(identifier)?));
    }

    let mut segments = identifier.split('/');
    let first = segments.next().unwrap_or_default();
    let mut node = NodeRef::Project(db.get_project(first)?);
    for segment in segments {
        node = node.get_child(segment)?;
    }
    Ok(node)
}

/// Resolve an identifier that must name a task or subtask. Config and
/// result documents are attached to tasks only.
pub fn resolve_task(db: &Database, identifier: &str) -> Result<Task> {
    resolve(db, identifier)?.into_task().ok_or_else(|| {
        LabtrackError::UnsupportedOperation(format!(
            "'{identifier}' is a project; configs and results are attached to tasks"
        ))
    })
}
