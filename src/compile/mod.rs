//! Shared compiler plumbing: parent context, reference resolution, and
//! fragment rendering used by both the insert and update compilers.
//!
//! Compilation is a recursive descent over the shape map. Context flows
//! downward through an explicit `parents` stack; every statement below the
//! root is linked to its parent through resolved foreign-key columns, and
//! identity flows across statements through the id-reference bind forms
//! (`#table`, `:#table`, `_id_ref_id`).

pub mod insert;
pub mod multi;
pub mod update;

use crate::descriptor::SaveOptions;
use crate::error::OrtError;
use crate::macros::{ID_REF_ID, LOOKUP_EDIT};
use crate::metadata::{Metadata, Ref, TableDef};
use crate::value::Object;

/// One level of upward context: the enclosing table a nested statement is
/// linked to.
#[derive(Debug, Clone)]
pub struct ParentRef {
    pub table: String,
}

impl ParentRef {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
        }
    }
}

/// Resolve the foreign-key columns linking `table` to `parent`.
///
/// Pinned descriptor columns win when every one of them is a single-column
/// foreign key to the parent; otherwise exactly one single-column foreign
/// key must exist in the catalog. Anything else fails the compile.
pub(crate) fn resolve_refs(
    table: &TableDef,
    pinned: &[String],
    parent: &str,
) -> Result<Vec<String>, OrtError> {
    let to_parent = table.refs_to(parent);
    if !pinned.is_empty() {
        let all_fk = pinned
            .iter()
            .all(|c| to_parent.iter().any(|r| r.cols.len() == 1 && r.cols[0] == *c));
        if all_fk {
            return Ok(pinned.to_vec());
        }
    }
    let singles: Vec<&Ref> = to_parent
        .iter()
        .filter(|r| r.cols.len() == 1)
        .copied()
        .collect();
    match singles.as_slice() {
        [one] => Ok(vec![one.cols[0].clone()]),
        [] => Err(OrtError::MissingReference {
            table: table.name.clone(),
            parent: parent.to_string(),
        }),
        many => Err(OrtError::AmbiguousReference {
            table: table.name.clone(),
            parent: parent.to_string(),
            candidates: many.iter().map(|r| r.cols[0].clone()).collect(),
        }),
    }
}

/// Bind expression for a resolved ref column. When the column is also this
/// table's primary key the statement shares its parent's key value
/// (one-to-one case); otherwise it references the last id registered for
/// the parent table.
pub(crate) fn ref_expr(col: &str, pk: Option<&str>, parent: &str, table: &str) -> String {
    if Some(col) == pk {
        format!("{ID_REF_ID}({parent}, {table})")
    } else {
        format!(":#{parent}")
    }
}

/// Split `(column, value)` pairs into the `{…}` and `[…]` lists.
pub(crate) fn cols_vals(pairs: &[(String, String)]) -> (String, String) {
    let cols: Vec<&str> = pairs.iter().map(|(c, _)| c.as_str()).collect();
    let vals: Vec<&str> = pairs.iter().map(|(_, v)| v.as_str()).collect();
    (cols.join(", "), vals.join(", "))
}

/// Render `c1 = v1 & c2 = v2 & …`.
pub(crate) fn conjunction(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(c, v)| format!("{c} = {v}"))
        .collect::<Vec<_>>()
        .join(" & ")
}

/// Wrap a statement with its lookup-edit fragments: `[l1, …, base]`.
/// Without lookups the statement stands alone.
pub(crate) fn wrap_lookups(lookups: Vec<String>, base: String) -> String {
    if lookups.is_empty() {
        base
    } else {
        format!("[{}, {}]", lookups.join(", "), base)
    }
}

/// Remove the trailing ` 'name'` column alias from a child fragment so it
/// can be recomposed (e.g. inside `_insert_or_update`).
pub(crate) fn strip_child_alias<'a>(fragment: &'a str, name: &str) -> &'a str {
    fragment
        .strip_suffix(&format!(" '{name}'"))
        .unwrap_or(fragment)
}

/// Compile a lookup edit for a field whose name is a single-column foreign
/// key and whose value is a nested object: the referenced row is inserted
/// or updated first and its id is bound to the field's bind variable.
pub(crate) fn lookup_tresql(
    md: &Metadata,
    field: &str,
    lookup_table: &str,
    obj: &Object,
) -> Result<Option<String>, OrtError> {
    let Some(table) = md.table(lookup_table) else {
        return Ok(None);
    };
    let Some(ins) = insert::insert_tresql(md, lookup_table, obj, &[], None)? else {
        return Ok(None);
    };
    let upd = update::update_tresql(md, lookup_table, obj, &[], None, SaveOptions::default())?;
    let pk_lit = table
        .single_key()
        .map(|p| format!("'{p}'"))
        .unwrap_or_else(|| "null".to_string());
    let upd_lit = upd.unwrap_or_else(|| "null".to_string());
    Ok(Some(format!(
        ":{field} = |{LOOKUP_EDIT}('{field}', {pk_lit}, {ins}, {upd_lit})"
    )))
}
