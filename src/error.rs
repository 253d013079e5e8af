//! Compile-time error kinds.
//!
//! Every error here is fatal to the single compile call that raised it;
//! there is no retry at this layer. Execution-time failures (macro shape
//! mismatches) live in [`crate::macros::MacroError`] instead.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OrtError {
    /// The descriptor's primary table has no metadata entry.
    #[error("table '{0}' not found in metadata")]
    TableNotFound(String),

    /// An update compile produced no settable columns.
    #[error("update of '{0}' produced no updatable columns")]
    NoUpdatableColumns(String),

    /// More than one single-column foreign key links the child to the
    /// parent and the descriptor did not pin one.
    #[error("ambiguous references from '{table}' to '{parent}': {candidates:?}")]
    AmbiguousReference {
        table: String,
        parent: String,
        candidates: Vec<String>,
    },

    /// No usable foreign key links the child to the parent: the catalog
    /// carries none, or only composite ones.
    #[error("no usable reference from '{table}' to '{parent}'")]
    MissingReference { table: String, parent: String },

    /// Delete by id requires a single-column primary key.
    #[error("table '{0}' has no single-column primary key")]
    NoPrimaryKey(String),

    /// The descriptor string does not match the grammar.
    #[error("malformed save descriptor '{0}'")]
    BadDescriptor(String),
}
