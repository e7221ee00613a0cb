// Typed key/value documents - config and result records attached to tasks

use crate::docstore::DocStore;
use crate::error::{LabtrackError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Declared type tag carried by every config/result value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Str,
    Int,
    Float,
    File,
    List,
    Json,
    Table,
    Plot2d,
    Html,
}

impl ValueType {
    pub fn parse(tag: &str) -> Option<ValueType> {
        match tag {
            "str" => Some(ValueType::Str),
            "int" => Some(ValueType::Int),
            "float" => Some(ValueType::Float),
            "file" => Some(ValueType::File),
            "list" => Some(ValueType::List),
            "json" => Some(ValueType::Json),
            "table" => Some(ValueType::Table),
            "plot2d" => Some(ValueType::Plot2d),
            "html" => Some(ValueType::Html),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Str => "str",
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::File => "file",
            ValueType::List => "list",
            ValueType::Json => "json",
            ValueType::Table => "table",
            ValueType::Plot2d => "plot2d",
            ValueType::Html => "html",
        }
    }
}

const CONFIG_TYPES: &[ValueType] = &[
    ValueType::Str,
    ValueType::Int,
    ValueType::Float,
    ValueType::File,
    ValueType::List,
    ValueType::Json,
];

const RESULT_TYPES: &[ValueType] = &[
    ValueType::Str,
    ValueType::Int,
    ValueType::Float,
    ValueType::List,
    ValueType::File,
    ValueType::Table,
    ValueType::Plot2d,
    ValueType::Html,
    ValueType::Json,
];

/// One stored entry: the coerced value plus its declared type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypedEntry {
    pub value: Value,
    #[serde(rename = "type")]
    pub value_type: ValueType,
}

/// Coerce a raw string value according to its declared type.
fn coerce(value_type: ValueType, raw: &str) -> Result<Value> {
    match value_type {
        ValueType::Str | ValueType::File | ValueType::Html => Ok(Value::String(raw.to_string())),
        ValueType::Int => {
            let parsed: i64 = raw.trim().parse().map_err(|_| {
                LabtrackError::TypeMismatch(format!("'{raw}' is not an int value"))
            })?;
            Ok(Value::from(parsed))
        }
        ValueType::Float => {
            let parsed: f64 = raw.trim().parse().map_err(|_| {
                LabtrackError::TypeMismatch(format!("'{raw}' is not a float value"))
            })?;
            serde_json::Number::from_f64(parsed)
                .map(Value::Number)
                .ok_or_else(|| {
                    LabtrackError::TypeMismatch(format!("'{raw}' is not a finite float value"))
                })
        }
        ValueType::List => {
            let parsed: Value = serde_json::from_str(raw)?;
            if parsed.is_array() {
                Ok(parsed)
            } else {
                Err(LabtrackError::TypeMismatch(format!(
                    "'{raw}' is not a list value"
                )))
            }
        }
        ValueType::Json => Ok(serde_json::from_str(raw)?),
        ValueType::Table => {
            let cols = parse_header(raw, "table")?;
            Ok(serde_json::json!({ "cols": cols, "data": [] }))
        }
        ValueType::Plot2d => {
            let series = parse_header(raw, "plot2d")?;
            Ok(serde_json::json!({ "series": series, "data": [] }))
        }
    }
}

fn parse_header(raw: &str, label: &str) -> Result<Value> {
    let parsed: Value = serde_json::from_str(raw)?;
    if parsed.is_array() {
        Ok(parsed)
    } else {
        Err(LabtrackError::TypeMismatch(format!(
            "'{raw}' is not a {label} header list"
        )))
    }
}

type AppendFn = fn(&mut TypedEntry, Value) -> Result<()>;

/// Append strategies by declared result type. Types absent from this
/// mapping do not support append.
fn append_strategy(value_type: ValueType) -> Option<AppendFn> {
    match value_type {
        ValueType::Table | ValueType::Plot2d => Some(push_record),
        _ => None,
    }
}

fn push_record(entry: &mut TypedEntry, record: Value) -> Result<()> {
    let data = entry
        .value
        .get_mut("data")
        .and_then(Value::as_array_mut)
        .ok_or_else(|| {
            LabtrackError::TypeMismatch("entry has no growable data list".to_string())
        })?;
    data.push(record);
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocKind {
    Config,
    Result,
}

impl DocKind {
    fn allowed(&self) -> &'static [ValueType] {
        match self {
            DocKind::Config => CONFIG_TYPES,
            DocKind::Result => RESULT_TYPES,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            DocKind::Config => "config",
            DocKind::Result => "result",
        }
    }
}

/// A typed key/value document scoped to one task.
///
/// Like the metadata store, the handle is stateless: each call re-reads
/// the persisted document and each mutation rewrites it whole. A missing
/// document reads as empty — both documents are created empty at task
/// creation, so this only matters when files vanish underneath us.
pub struct TypedDoc {
    store: Arc<dyn DocStore>,
    doc_path: String,
    kind: DocKind,
}

impl TypedDoc {
    pub fn config(store: Arc<dyn DocStore>, doc_path: String) -> Self {
        TypedDoc {
            store,
            doc_path,
            kind: DocKind::Config,
        }
    }

    pub fn result(store: Arc<dyn DocStore>, doc_path: String) -> Self {
        TypedDoc {
            store,
            doc_path,
            kind: DocKind::Result,
        }
    }

    fn load(&self) -> Result<Map<String, Value>> {
        match self.store.read(&self.doc_path)? {
            Some(Value::Object(map)) => Ok(map),
            Some(_) => Err(LabtrackError::Other(format!(
                "{} document '{}' is not a JSON object",
                self.kind.label(),
                self.doc_path
            ))),
            None => Ok(Map::new()),
        }
    }

    fn save(&self, map: Map<String, Value>) -> Result<()> {
        self.store.write(&self.doc_path, &Value::Object(map))
    }

    fn check_type(&self, tag: &str) -> Result<ValueType> {
        ValueType::parse(tag)
            .filter(|value_type| self.kind.allowed().contains(value_type))
            .ok_or_else(|| {
                LabtrackError::UnknownType(format!(
                    "'{tag}' is not a valid {} type",
                    self.kind.label()
                ))
            })
    }

    /// Insert a typed entry. First writer wins: when the key already
    /// exists the call is a silent no-op unless `overwrite` is set.
    pub fn insert(&self, key: &str, raw: &str, tag: &str, overwrite: bool) -> Result<()> {
        let value_type = self.check_type(tag)?;
        let value = coerce(value_type, raw)?;
        let mut map = self.load()?;
        if map.contains_key(key) && !overwrite {
            return Ok(());
        }
        map.insert(key.to_string(), serde_json::to_value(TypedEntry { value, value_type })?);
        self.save(map)
    }

    /// Look up one entry; absence is not an error.
    pub fn get(&self, key: &str) -> Result<Option<TypedEntry>> {
        match self.load()?.get(key) {
            Some(entry) => Ok(Some(serde_json::from_value(entry.clone())?)),
            None => Ok(None),
        }
    }

    /// Remove an entry by exact key.
    pub fn delete(&self, key: &str) -> Result<()> {
        let mut map = self.load()?;
        if map.remove(key).is_none() {
            return Err(LabtrackError::NotFound(format!(
                "No {} entry '{key}' in '{}'",
                self.kind.label(),
                self.doc_path
            )));
        }
        self.save(map)
    }

    /// Full document snapshot, entries keyed by name.
    pub fn entries(&self) -> Result<Map<String, Value>> {
        self.load()
    }

    /// Push one record onto a growable entry. Only result entries whose
    /// declared type carries an append strategy (table, plot2d) grow;
    /// config documents reject every append.
    pub fn append(&self, key: &str, raw: &str, tag: &str) -> Result<()> {
        if self.kind == DocKind::Config {
            return Err(LabtrackError::UnsupportedOperation(
                "config entries do not support append".to_string(),
            ));
        }
        self.check_type(tag)?;

        let mut map = self.load()?;
        let stored = map.get(key).ok_or_else(|| {
            LabtrackError::NotFound(format!(
                "No {} entry '{key}' in '{}'",
                self.kind.label(),
                self.doc_path
            ))
        })?;
        let mut entry: TypedEntry = serde_json::from_value(stored.clone())?;

        let strategy = append_strategy(entry.value_type).ok_or_else(|| {
            LabtrackError::UnsupportedOperation(format!(
                "result type '{}' does not support append",
                entry.value_type.as_str()
            ))
        })?;
        let record: Value = serde_json::from_str(raw)?;
        strategy(&mut entry, record)?;

        map.insert(key.to_string(), serde_json::to_value(entry)?);
        self.save(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docstore::FsDocStore;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    fn setup(kind: &str) -> (TempDir, TypedDoc) {
        let tmp = TempDir::new().unwrap();
        let store: Arc<dyn DocStore> = Arc::new(FsDocStore::open(tmp.path()).unwrap());
        let doc = match kind {
            "config" => TypedDoc::config(store, "config.json".to_string()),
            _ => TypedDoc::result(store, "result.json".to_string()),
        };
        (tmp, doc)
    }

    #[test]
    fn test_insert_coerces_int() {
        let (_tmp, config) = setup("config");
        config.insert("k", "1", "int", false).unwrap();
        let entry = config.get("k").unwrap().unwrap();
        assert_eq!(entry.value, json!(1));
        assert_eq!(entry.value_type, ValueType::Int);
    }

    #[test]
    fn test_insert_without_overwrite_is_first_writer_wins() {
        let (_tmp, config) = setup("config");
        config.insert("k", "1", "int", false).unwrap();
        config.insert("k", "2", "int", false).unwrap();
        assert_eq!(config.get("k").unwrap().unwrap().value, json!(1));

        config.insert("k", "2", "int", true).unwrap();
        assert_eq!(config.get("k").unwrap().unwrap().value, json!(2));
    }

    #[test]
    fn test_insert_rejects_unknown_tag() {
        let (_tmp, config) = setup("config");
        let err = config.insert("k", "x", "blob", false).unwrap_err();
        assert!(matches!(err, LabtrackError::UnknownType(_)));
    }

    #[test]
    fn test_config_rejects_result_only_types() {
        let (_tmp, config) = setup("config");
        let err = config.insert("t", "[\"a\"]", "table", false).unwrap_err();
        assert!(matches!(err, LabtrackError::UnknownType(_)));
    }

    #[test]
    fn test_int_coercion_failure() {
        let (_tmp, config) = setup("config");
        let err = config.insert("k", "twelve", "int", false).unwrap_err();
        assert!(matches!(err, LabtrackError::TypeMismatch(_)));
    }

    #[test]
    fn test_list_requires_json_array() {
        let (_tmp, config) = setup("config");
        let err = config.insert("k", "{\"a\":1}", "list", false).unwrap_err();
        assert!(matches!(err, LabtrackError::TypeMismatch(_)));

        config.insert("k", "[1, 2, 3]", "list", false).unwrap();
        assert_eq!(config.get("k").unwrap().unwrap().value, json!([1, 2, 3]));
    }

    #[test]
    fn test_delete_missing_key_fails() {
        let (_tmp, config) = setup("config");
        let err = config.delete("ghost").unwrap_err();
        assert!(matches!(err, LabtrackError::NotFound(_)));
    }

    #[test]
    fn test_get_missing_is_none() {
        let (_tmp, result) = setup("result");
        assert!(result.get("ghost").unwrap().is_none());
    }

    #[test]
    fn test_table_insert_wraps_header() {
        let (_tmp, result) = setup("result");
        result.insert("t", "[\"a\",\"b\"]", "table", false).unwrap();
        assert_eq!(
            result.get("t").unwrap().unwrap().value,
            json!({"cols": ["a", "b"], "data": []})
        );
    }

    #[test]
    fn test_plot2d_insert_wraps_series() {
        let (_tmp, result) = setup("result");
        result.insert("curve", "[\"x\",\"loss\"]", "plot2d", false).unwrap();
        assert_eq!(
            result.get("curve").unwrap().unwrap().value,
            json!({"series": ["x", "loss"], "data": []})
        );
    }

    #[test]
    fn test_table_append_grows_data() {
        let (_tmp, result) = setup("result");
        result.insert("t", "[\"a\",\"b\"]", "table", false).unwrap();
        result.append("t", "[1,2]", "table").unwrap();
        result.append("t", "[1,2]", "table").unwrap();
        assert_eq!(
            result.get("t").unwrap().unwrap().value,
            json!({"cols": ["a", "b"], "data": [[1, 2], [1, 2]]})
        );
    }

    #[test]
    fn test_append_on_str_entry_is_unsupported() {
        let (_tmp, result) = setup("result");
        result.insert("note", "all good", "str", false).unwrap();
        let err = result.append("note", "[1]", "str").unwrap_err();
        assert!(matches!(err, LabtrackError::UnsupportedOperation(_)));
        // Entry is left unchanged.
        assert_eq!(result.get("note").unwrap().unwrap().value, json!("all good"));
    }

    #[test]
    fn test_append_on_missing_key_fails() {
        let (_tmp, result) = setup("result");
        let err = result.append("ghost", "[1]", "table").unwrap_err();
        assert!(matches!(err, LabtrackError::NotFound(_)));
    }

    #[test]
    fn test_config_rejects_every_append() {
        let (_tmp, config) = setup("config");
        config.insert("k", "[1]", "list", false).unwrap();
        let err = config.append("k", "[2]", "list").unwrap_err();
        assert!(matches!(err, LabtrackError::UnsupportedOperation(_)));
    }

    #[test]
    fn test_result_accepts_html() {
        let (_tmp, result) = setup("result");
        result
            .insert("report", "<h1>Run 1</h1>", "html", false)
            .unwrap();
        let entry = result.get("report").unwrap().unwrap();
        assert_eq!(entry.value_type, ValueType::Html);
        assert_eq!(entry.value, json!("<h1>Run 1</h1>"));
    }
}
