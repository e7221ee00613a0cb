// Dispatch table - operation name to handler plus typed parameter schema

use super::Database;
use crate::error::{LabtrackError, Result};
use crate::node::Container;
use crate::resolver::{resolve, resolve_task};
use serde_json::Value;
use std::collections::HashMap;

enum ParamKind {
    Str,
    Bool,
}

struct ParamSpec {
    name: &'static str,
    kind: ParamKind,
    default: Option<&'static str>,
}

const fn required(name: &'static str) -> ParamSpec {
    ParamSpec {
        name,
        kind: ParamKind::Str,
        default: None,
    }
}

const fn optional(name: &'static str, default: &'static str) -> ParamSpec {
    ParamSpec {
        name,
        kind: ParamKind::Str,
        default: Some(default),
    }
}

const fn flag(name: &'static str) -> ParamSpec {
    ParamSpec {
        name,
        kind: ParamKind::Bool,
        default: Some("false"),
    }
}

enum OpValue {
    Str(String),
    Bool(bool),
}

/// Coerced arguments handed to a handler. Lookups fall back to neutral
/// values; the schema guarantees every declared parameter is present.
struct OpArgs {
    values: HashMap<&'static str, OpValue>,
}

impl OpArgs {
    fn str(&self, name: &str) -> &str {
        match self.values.get(name) {
            Some(OpValue::Str(value)) => value.as_str(),
            _ => "",
        }
    }

    fn flag(&self, name: &str) -> bool {
        matches!(self.values.get(name), Some(OpValue::Bool(true)))
    }
}

type Handler = fn(&Database, &OpArgs) -> Result<Value>;

struct OpSpec {
    name: &'static str,
    params: &'static [ParamSpec],
    handler: Handler,
}

const OPERATIONS: &[OpSpec] = &[
    OpSpec {
        name: "create_project",
        params: &[required("name"), optional("desc", "")],
        handler: create_project,
    },
    OpSpec {
        name: "delete_project",
        params: &[required("name")],
        handler: delete_project,
    },
    OpSpec {
        name: "list_projects",
        params: &[flag("info")],
        handler: list_projects,
    },
    OpSpec {
        name: "list_children",
        params: &[required("identifier"), flag("info")],
        handler: list_children,
    },
    OpSpec {
        name: "create_task",
        params: &[required("identifier"), required("name"), optional("desc", "")],
        handler: create_task,
    },
    OpSpec {
        name: "insert_task_result",
        params: &[
            required("identifier"),
            required("key"),
            required("value"),
            required("type"),
            flag("overwrite"),
        ],
        handler: insert_task_result,
    },
    OpSpec {
        name: "delete_task_result",
        params: &[required("identifier"), required("key")],
        handler: delete_task_result,
    },
    OpSpec {
        name: "insert_task_config",
        params: &[
            required("identifier"),
            required("key"),
            required("value"),
            required("type"),
            flag("overwrite"),
        ],
        handler: insert_task_config,
    },
    OpSpec {
        name: "delete_task_config",
        params: &[required("identifier"), required("key")],
        handler: delete_task_config,
    },
    OpSpec {
        name: "append_task_result",
        params: &[
            required("identifier"),
            required("key"),
            required("value"),
            required("type"),
        ],
        handler: append_task_result,
    },
    OpSpec {
        name: "update_child_metadata",
        params: &[required("identifier"), required("key"), required("value")],
        handler: update_child_metadata,
    },
    OpSpec {
        name: "get_task_configs",
        params: &[required("identifier")],
        handler: get_task_configs,
    },
    OpSpec {
        name: "get_task_results",
        params: &[required("identifier")],
        handler: get_task_results,
    },
];

/// Look up the operation, coerce each declared parameter from the raw
/// argument bag, and invoke the handler.
pub(super) fn dispatch(
    db: &Database,
    op: &str,
    args: &HashMap<String, String>,
) -> Result<Value> {
    let spec = OPERATIONS
        .iter()
        .find(|candidate| candidate.name == op)
        .ok_or_else(|| LabtrackError::UnknownOperation(op.to_string()))?;

    let mut values = HashMap::new();
    for param in spec.params {
        let raw = match args.get(param.name) {
            Some(value) => value.as_str(),
            None => param.default.ok_or_else(|| {
                LabtrackError::Other(format!("Missing parameter: {}", param.name))
            })?,
        };
        values.insert(param.name, coerce_param(&param.kind, raw));
    }
    (spec.handler)(db, &OpArgs { values })
}

fn coerce_param(kind: &ParamKind, raw: &str) -> OpValue {
    match kind {
        ParamKind::Str => OpValue::Str(raw.to_string()),
        // Case-insensitive literal "true"; anything else is false.
        ParamKind::Bool => OpValue::Bool(raw.eq_ignore_ascii_case("true")),
    }
}

// ── Handlers ────────────────────────────────────────────────────

fn create_project(db: &Database, a: &OpArgs) -> Result<Value> {
    db.create_project(a.str("name"), a.str("desc"))?;
    Ok(Value::Null)
}

fn delete_project(db: &Database, a: &OpArgs) -> Result<Value> {
    db.delete_project(a.str("name"))?;
    Ok(Value::Null)
}

fn list_projects(db: &Database, a: &OpArgs) -> Result<Value> {
    db.list_projects(a.flag("info"))
}

fn list_children(db: &Database, a: &OpArgs) -> Result<Value> {
    resolve(db, a.str("identifier"))?.list_children(a.flag("info"))
}

fn create_task(db: &Database, a: &OpArgs) -> Result<Value> {
    resolve(db, a.str("identifier"))?.create_child(a.str("name"), a.str("desc"))?;
    Ok(Value::Null)
}

fn insert_task_result(db: &Database, a: &OpArgs) -> Result<Value> {
    resolve_task(db, a.str("identifier"))?.results().insert(
        a.str("key"),
        a.str("value"),
        a.str("type"),
        a.flag("overwrite"),
    )?;
    Ok(Value::Null)
}

fn delete_task_result(db: &Database, a: &OpArgs) -> Result<Value> {
    resolve_task(db, a.str("identifier"))?
        .results()
        .delete(a.str("key"))?;
    Ok(Value::Null)
}

fn insert_task_config(db: &Database, a: &OpArgs) -> Result<Value> {
    resolve_task(db, a.str("identifier"))?.configs().insert(
        a.str("key"),
        a.str("value"),
        a.str("type"),
        a.flag("overwrite"),
    )?;
    Ok(Value::Null)
}

fn delete_task_config(db: &Database, a: &OpArgs) -> Result<Value> {
    resolve_task(db, a.str("identifier"))?
        .configs()
        .delete(a.str("key"))?;
    Ok(Value::Null)
}

fn append_task_result(db: &Database, a: &OpArgs) -> Result<Value> {
    resolve_task(db, a.str("identifier"))?.results().append(
        a.str("key"),
        a.str("value"),
        a.str("type"),
    )?;
    Ok(Value::Null)
}

fn update_child_metadata(db: &Database, a: &OpArgs) -> Result<Value> {
    resolve(db, a.str("identifier"))?
        .metadata()
        .add(a.str("key"), Value::String(a.str("value").to_string()))?;
    Ok(Value::Null)
}

fn get_task_configs(db: &Database, a: &OpArgs) -> Result<Value> {
    Ok(Value::Object(
        resolve_task(db, a.str("identifier"))?.configs().entries()?,
    ))
}

fn get_task_results(db: &Database, a: &OpArgs) -> Result<Value> {
    Ok(Value::Object(
        resolve_task(db, a.str("identifier"))?.results().entries()?,
    ))
}
