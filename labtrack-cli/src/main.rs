use clap::{Parser, Subcommand, ValueEnum};
use labtrack::{Database, DocStore, FsDocStore, SqliteDocStore};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

/// Labtrack CLI — manage projects, tasks and their typed records from the command line
#[derive(Parser)]
#[command(name = "labtrack", version, about)]
struct Cli {
    /// Path to the database directory
    #[arg(long, default_value = "database")]
    db_dir: PathBuf,

    /// Storage backend
    #[arg(long, default_value = "fs")]
    backend: Backend,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, ValueEnum)]
enum Backend {
    Fs,
    Sqlite,
}

#[derive(Subcommand)]
enum Command {
    /// Create a project
    CreateProject {
        /// Project name
        name: String,
        /// Description
        #[arg(long, default_value = "")]
        desc: String,
    },

    /// Delete a project and its whole subtree
    DeleteProject {
        /// Project name
        name: String,
    },

    /// List projects
    ListProjects {
        /// Include full metadata with tasks expanded
        #[arg(long)]
        info: bool,
    },

    /// List the children of a project or task
    ListChildren {
        /// Slash-delimited identifier (e.g. proj1/task1)
        identifier: String,
        /// Include each child's full metadata
        #[arg(long)]
        info: bool,
    },

    /// Create a task or subtask under a project or task
    CreateTask {
        /// Parent identifier (e.g. proj1 or proj1/task1)
        identifier: String,
        /// Task name
        name: String,
        /// Description
        #[arg(long, default_value = "")]
        desc: String,
    },

    /// Insert a typed config entry on a task
    InsertConfig {
        /// Task identifier
        identifier: String,
        /// Entry key
        key: String,
        /// Raw value (coerced per type)
        value: String,
        /// Value type (str, int, float, file, list, json)
        r#type: String,
        /// Replace an existing entry
        #[arg(long)]
        overwrite: bool,
    },

    /// Delete a config entry
    DeleteConfig {
        /// Task identifier
        identifier: String,
        /// Entry key
        key: String,
    },

    /// Show a task's config document
    GetConfigs {
        /// Task identifier
        identifier: String,
    },

    /// Insert a typed result entry on a task
    InsertResult {
        /// Task identifier
        identifier: String,
        /// Entry key
        key: String,
        /// Raw value (coerced per type)
        value: String,
        /// Value type (str, int, float, list, file, table, plot2d, html, json)
        r#type: String,
        /// Replace an existing entry
        #[arg(long)]
        overwrite: bool,
    },

    /// Delete a result entry
    DeleteResult {
        /// Task identifier
        identifier: String,
        /// Entry key
        key: String,
    },

    /// Append one record to a growable (table/plot2d) result entry
    AppendResult {
        /// Task identifier
        identifier: String,
        /// Entry key
        key: String,
        /// Record to append, as JSON (e.g. [1, 0.5])
        value: String,
        /// Declared type of the entry
        r#type: String,
    },

    /// Upsert one metadata key on a project or task
    UpdateMetadata {
        /// Node identifier
        identifier: String,
        /// Metadata key (e.g. status, desc)
        key: String,
        /// New value
        value: String,
    },

    /// Show a task's result document
    GetResults {
        /// Task identifier
        identifier: String,
    },

    /// Invoke a dispatch operation directly
    Api {
        /// Operation name (e.g. create_project)
        op: String,
        /// Operation arguments (e.g. --arg name=proj1)
        #[arg(long = "arg", value_parser = parse_key_value)]
        args: Vec<(String, String)>,
    },
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("Invalid key=value pair: no '=' found in '{s}'"))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("ERROR:{e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let store: Arc<dyn DocStore> = match cli.backend {
        Backend::Fs => Arc::new(FsDocStore::open(&cli.db_dir)?),
        Backend::Sqlite => {
            std::fs::create_dir_all(&cli.db_dir)?;
            Arc::new(SqliteDocStore::open(&cli.db_dir.join("labtrack.db"))?)
        }
    };
    let db = Database::with_store(store)?;
    log::debug!("database ready at {}", cli.db_dir.display());

    let (op, pairs): (&str, Vec<(String, String)>) = match cli.command {
        Command::CreateProject { name, desc } => (
            "create_project",
            vec![("name".into(), name), ("desc".into(), desc)],
        ),
        Command::DeleteProject { name } => ("delete_project", vec![("name".into(), name)]),
        Command::ListProjects { info } => {
            ("list_projects", vec![("info".into(), info.to_string())])
        }
        Command::ListChildren { identifier, info } => (
            "list_children",
            vec![
                ("identifier".into(), identifier),
                ("info".into(), info.to_string()),
            ],
        ),
        Command::CreateTask {
            identifier,
            name,
            desc,
        } => (
            "create_task",
            vec![
                ("identifier".into(), identifier),
                ("name".into(), name),
                ("desc".into(), desc),
            ],
        ),
        Command::InsertConfig {
            identifier,
            key,
            value,
            r#type,
            overwrite,
        } => (
            "insert_task_config",
            vec![
                ("identifier".into(), identifier),
                ("key".into(), key),
                ("value".into(), value),
                ("type".into(), r#type),
                ("overwrite".into(), overwrite.to_string()),
            ],
        ),
        Command::DeleteConfig { identifier, key } => (
            "delete_task_config",
            vec![("identifier".into(), identifier), ("key".into(), key)],
        ),
        Command::GetConfigs { identifier } => (
            "get_task_configs",
            vec![("identifier".into(), identifier)],
        ),
        Command::InsertResult {
            identifier,
            key,
            value,
            r#type,
            overwrite,
        } => (
            "insert_task_result",
            vec![
                ("identifier".into(), identifier),
                ("key".into(), key),
                ("value".into(), value),
                ("type".into(), r#type),
                ("overwrite".into(), overwrite.to_string()),
            ],
        ),
        Command::DeleteResult { identifier, key } => (
            "delete_task_result",
            vec![("identifier".into(), identifier), ("key".into(), key)],
        ),
        Command::AppendResult {
            identifier,
            key,
            value,
            r#type,
        } => (
            "append_task_result",
            vec![
                ("identifier".into(), identifier),
                ("key".into(), key),
                ("value".into(), value),
                ("type".into(), r#type),
            ],
        ),
        Command::UpdateMetadata {
            identifier,
            key,
            value,
        } => (
            "update_child_metadata",
            vec![
                ("identifier".into(), identifier),
                ("key".into(), key),
                ("value".into(), value),
            ],
        ),
        Command::GetResults { identifier } => (
            "get_task_results",
            vec![("identifier".into(), identifier)],
        ),
        Command::Api { op, args } => {
            let pairs = args;
            let args: HashMap<String, String> = pairs.into_iter().collect();
            return invoke(&db, &op, &args);
        }
    };

    let args: HashMap<String, String> = pairs.into_iter().collect();
    invoke(&db, op, &args)
}

fn invoke(
    db: &Database,
    op: &str,
    args: &HashMap<String, String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (ok, payload) = db.api(op, args);
    if ok {
        if !payload.is_null() {
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
        Ok(())
    } else {
        Err(payload
            .as_str()
            .unwrap_or("operation failed")
            .to_string()
            .into())
    }
}
