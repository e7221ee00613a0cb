pub mod docstore;
pub mod metadata;
pub mod typed_doc;
pub mod node;
pub mod resolver;
pub mod database;
pub mod validation;
pub mod error;

pub use error::{LabtrackError, Result};
pub use database::Database;
pub use docstore::{DocStore, FsDocStore, SqliteDocStore};
pub use node::{Container, NodeRef, Project, Task};
pub use typed_doc::{TypedDoc, TypedEntry, ValueType};
