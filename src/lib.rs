//! tresql-ort: Object-relational transformation compiler
//!
//! This library compiles a hierarchical data object plus a save descriptor
//! into a TRESQL expression that persists the object tree: the correct
//! combination of insert, update and delete statements, with child rows
//! linked to their parents through foreign keys and symbolic id references.
//! It consults a read-only relational metadata snapshot, never a database;
//! the emitted expression is executed by a separate engine implementing the
//! macro contracts of [`macros`].

pub mod compile;
pub mod descriptor;
pub mod error;
pub mod macros;
pub mod metadata;
pub mod normalize;
pub mod save;
pub mod value;

// Re-export commonly used types
pub use descriptor::{Property, SaveOptions, TableLink, parse_property};
pub use error::OrtError;
pub use macros::{EditAction, IdRegistry, MacroError};
pub use metadata::{Metadata, TableDef, builder::MetadataBuilder};
pub use save::{ExecResult, Ort, QueryEngine, SaveQuery};
pub use value::{Object, Value, object_from_json};
