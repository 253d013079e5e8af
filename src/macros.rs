//! Macro contracts between emitted TRESQL and the execution engine.
//!
//! Four macro sites may appear in compiled output. The engine that parses
//! and runs the DSL must recognize them and apply these semantics:
//!
//! * `_id_ref_id(ref, name)`: yield the last id observed under `ref` and
//!   register it under `name` for subsequent descendants (two statements
//!   sharing one key value).
//! * `_lookup_edit(col, pk, ins, upd)`: if the environment object bound
//!   under `col` carries a non-null `pk`, run `upd` and yield that value;
//!   otherwise run `ins` and yield the generated id. The result is bound to
//!   `:col` in the enclosing statement.
//! * `_insert_or_update(table, ins, upd)`: run `upd` when the nearest
//!   environment carries the table's single-column pk non-null, else `ins`.
//! * `_delete_children(name, table, del)`: the environment value under
//!   `name` must be a sequence; collect its non-null pk values under `:ids`
//!   and run `del` (whose `pk !in :ids` predicate removes only the rows
//!   missing from the collection).
//!
//! The decision logic is pure and lives here so engines share one
//! implementation and the compiler tests can exercise it without a
//! database. Shape mismatches surface as [`MacroError`] at execution time.

use crate::value::{Object, Value};
use std::collections::HashMap;
use thiserror::Error;

pub const ID_REF_ID: &str = "_id_ref_id";
pub const LOOKUP_EDIT: &str = "_lookup_edit";
pub const INSERT_OR_UPDATE: &str = "_insert_or_update";
pub const DELETE_CHILDREN: &str = "_delete_children";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MacroError {
    /// The environment value under `name` does not have the shape the
    /// macro requires.
    #[error("'{name}' is bound to {found}, expected {expected}")]
    Shape {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    /// `_id_ref_id` was evaluated before any id was registered under the
    /// referenced name.
    #[error("no id registered under '{0}'")]
    MissingId(String),
}

/// Which way an edit macro dispatches at one environment row.
#[derive(Debug, Clone, PartialEq)]
pub enum EditAction {
    Insert,
    /// Update, carrying the pk value found in the environment.
    Update(Value),
}

/// Last-id bookkeeping behind `#table`, `:#table` and `_id_ref_id`.
#[derive(Debug, Clone, Default)]
pub struct IdRegistry {
    ids: HashMap<String, Value>,
}

impl IdRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the id most recently produced under `name` (a `#table`
    /// generator site or an engine-observed insert id).
    pub fn register(&mut self, name: impl Into<String>, id: Value) {
        self.ids.insert(name.into(), id);
    }

    /// The id a `:#name` reference resolves to.
    pub fn last(&self, name: &str) -> Option<&Value> {
        self.ids.get(name)
    }

    /// `_id_ref_id`: read the last id under `id_ref`, register it also
    /// under `id`, and yield it.
    pub fn id_ref_id(&mut self, id_ref: &str, id: &str) -> Result<Value, MacroError> {
        let value = self
            .ids
            .get(id_ref)
            .cloned()
            .ok_or_else(|| MacroError::MissingId(id_ref.to_string()))?;
        self.ids.insert(id.to_string(), value.clone());
        Ok(value)
    }
}

/// `_lookup_edit` dispatch: the value bound under the ref column must be an
/// object; a non-null pk field selects the update branch.
pub fn lookup_edit_action(
    name: &str,
    bound: &Value,
    pk: Option<&str>,
) -> Result<EditAction, MacroError> {
    let Some(obj) = bound.as_object() else {
        return Err(MacroError::Shape {
            name: name.to_string(),
            expected: "an object",
            found: bound.kind(),
        });
    };
    Ok(edit_action(obj, pk))
}

/// `_insert_or_update` dispatch over the nearest environment object.
pub fn insert_or_update_action(env: &Object, pk: &str) -> EditAction {
    edit_action(env, Some(pk))
}

fn edit_action(env: &Object, pk: Option<&str>) -> EditAction {
    match pk.and_then(|p| env.get(p)) {
        Some(v) if !v.is_null() => EditAction::Update(v.clone()),
        _ => EditAction::Insert,
    }
}

/// `_delete_children` ids: the value bound under `name` must be a sequence;
/// yield the non-null pk values of its element objects, for the `:ids`
/// binding of the delete expression.
pub fn collect_child_ids(name: &str, bound: &Value, pk: &str) -> Result<Vec<Value>, MacroError> {
    let Some(seq) = bound.as_sequence() else {
        return Err(MacroError::Shape {
            name: name.to_string(),
            expected: "a sequence",
            found: bound.kind(),
        });
    };
    Ok(seq
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|o| o.get(pk))
        .filter(|v| !v.is_null())
        .cloned()
        .collect())
}
