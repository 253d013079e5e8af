//! Insert compiler.
//!
//! Emits `+table{cols}[vals]` statements for a shape map, recursing into
//! child collections, emitting lookup edits for referenced-row objects, and
//! adding the one-to-one linked tables of the descriptor tail. Values never
//! appear literally; every column renders through the bind-expression form
//! supplied by the metadata snapshot.

use super::{
    ParentRef, cols_vals, lookup_tresql, ref_expr, resolve_refs, wrap_lookups,
};
use crate::descriptor::{TableLink, parse_property};
use crate::error::OrtError;
use crate::metadata::{Metadata, TableDef};
use crate::value::Object;

/// Compile an insert for `name` from a normalized shape map. Returns
/// `Ok(None)` when the primary table is unknown or nothing is insertable;
/// the public entry point turns that into an error for the root statement,
/// while child compiles simply drop the fragment.
pub fn insert_tresql(
    md: &Metadata,
    name: &str,
    shape: &Object,
    parents: &[ParentRef],
    filter: Option<&str>,
) -> Result<Option<String>, OrtError> {
    let prop = parse_property(name)?;
    let link = prop.primary();
    let Some(table) = md.table(&link.table) else {
        return Ok(None);
    };
    let parent = parents.last().map(|p| p.table.as_str());
    let pk = table.single_key();

    // Linkage pairs are synthesized only below the root: a top-level insert
    // binds its pk column like any other field.
    let refs_and_pk = match parent {
        Some(p) => link_pairs(&resolve_refs(table, &link.refs, p)?, pk, p, &table.name),
        None => vec![],
    };

    let mut lookups = Vec::new();
    let mut pairs: Vec<(String, String)> = Vec::new();
    let mut children = Vec::new();

    for (field, value) in shape {
        if let Some(obj) = value.as_object() {
            if let Some(lookup_table) = table.ref_table_for(field) {
                if let Some(fragment) = lookup_tresql(md, field, lookup_table, obj)? {
                    lookups.push(fragment);
                    let col = canonical(table, field);
                    pairs.push((col, md.value_expr(&table.name, field)));
                }
                continue;
            }
            let mut child_parents = parents.to_vec();
            child_parents.push(ParentRef::new(table.name.clone()));
            // The user filter applies to the root statement only.
            if let Some(child) = insert_tresql(md, field, obj, &child_parents, None)? {
                children.push(child);
            }
            continue;
        }
        let Some(col) = table.col(field) else {
            continue; // unknown fields are tolerated, not errors
        };
        if refs_and_pk.iter().any(|(c, _)| c == &col.name) {
            continue; // provided by the parent linkage
        }
        pairs.push((col.name.clone(), md.value_expr(&table.name, field)));
    }

    pairs.extend(refs_and_pk);
    if pairs.is_empty() {
        return Ok(None);
    }

    let base = render_insert(table, &pairs, prop.alias.as_deref(), filter);

    let mut fragments = vec![wrap_lookups(lookups, base)];
    fragments.extend(children);
    for linked in prop.linked() {
        if let Some(fragment) = linked_insert(md, linked, table, shape)? {
            fragments.push(fragment);
        }
    }

    let mut out = fragments.join(", ");
    if !parents.is_empty() {
        // Column alias correlating the nested statement with the object key.
        out.push_str(&format!(" '{name}'"));
    }
    Ok(Some(out))
}

/// The synthesized `(column, bind)` pairs linking a parented statement:
/// resolved ref columns first, then the generated-and-registered primary
/// key when it is not itself one of the refs.
fn link_pairs(
    refs: &[String],
    pk: Option<&str>,
    parent: &str,
    table: &str,
) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = refs
        .iter()
        .map(|r| (r.clone(), ref_expr(r, pk, parent, table)))
        .collect();
    if let Some(pk) = pk
        && !refs.iter().any(|r| r == pk)
    {
        pairs.push((pk.to_string(), format!("#{table}")));
    }
    pairs
}

fn render_insert(
    table: &TableDef,
    pairs: &[(String, String)],
    alias: Option<&str>,
    filter: Option<&str>,
) -> String {
    let (cols, vals) = cols_vals(pairs);
    match filter {
        None => format!("+{}{{{}}}[{}]", table.name, cols, vals),
        Some(f) => {
            // Conditional insert: select the bind values through an inline
            // one-row view and keep only rows passing the filter.
            let a = alias.unwrap_or(&table.name);
            let inner = pairs
                .iter()
                .map(|(c, v)| format!("{v} {c}"))
                .collect::<Vec<_>>()
                .join(", ");
            let outer = pairs
                .iter()
                .map(|(c, _)| format!("{a}.{c}"))
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                "+{}{{{}}} ({}{{{}}}@(1)) {}[{}]{{{}}}",
                table.name, cols, table.name, inner, a, f, outer
            )
        }
    }
}

/// One-to-one linked table of the descriptor tail: emitted against the same
/// shape, keyed through the primary table, with no children and no filter.
fn linked_insert(
    md: &Metadata,
    link: &TableLink,
    primary: &TableDef,
    shape: &Object,
) -> Result<Option<String>, OrtError> {
    let Some(table) = md.table(&link.table) else {
        return Ok(None);
    };
    let pk = table.single_key();
    let refs = if link.refs.is_empty() {
        resolve_refs(table, &[], &primary.name)?
    } else {
        link.refs.clone()
    };
    let refs_and_pk = link_pairs(&refs, pk, &primary.name, &table.name);

    let mut pairs: Vec<(String, String)> = Vec::new();
    for (field, value) in shape {
        if value.as_object().is_some() {
            continue;
        }
        let Some(col) = table.col(field) else {
            continue;
        };
        if refs_and_pk.iter().any(|(c, _)| c == &col.name) {
            continue;
        }
        pairs.push((col.name.clone(), md.value_expr(&table.name, field)));
    }
    pairs.extend(refs_and_pk);
    if pairs.is_empty() {
        return Ok(None);
    }
    let (cols, vals) = cols_vals(&pairs);
    Ok(Some(format!("+{}{{{}}}[{}]", table.name, cols, vals)))
}

fn canonical(table: &TableDef, field: &str) -> String {
    table
        .col(field)
        .map(|c| c.name.clone())
        .unwrap_or_else(|| field.to_string())
}
