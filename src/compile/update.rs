//! Update compiler.
//!
//! Emits `=table[filter]{cols}[vals]` statements and, per child collection,
//! the combination of delete/insert/update fragments selected by the save
//! options in force at that level. A child key may carry its own bracket
//! group; without one it inherits the enclosing descriptor's options.

use super::insert::insert_tresql;
use super::{
    ParentRef, cols_vals, conjunction, lookup_tresql, ref_expr, resolve_refs, strip_child_alias,
    wrap_lookups,
};
use crate::descriptor::{SaveOptions, TableLink, parse_property};
use crate::error::OrtError;
use crate::macros::{DELETE_CHILDREN, INSERT_OR_UPDATE};
use crate::metadata::{Metadata, TableDef};
use crate::value::Object;

/// Compile an update for `name` from a normalized shape map. Returns
/// `Ok(None)` when the table is unknown, the row cannot be addressed (no
/// parent and no single-column primary key), or no settable columns were
/// produced; the policy composition treats such null fragments as absent.
pub fn update_tresql(
    md: &Metadata,
    name: &str,
    shape: &Object,
    parents: &[ParentRef],
    filter: Option<&str>,
    inherited: SaveOptions,
) -> Result<Option<String>, OrtError> {
    let prop = parse_property(name)?;
    let link = prop.primary();
    let Some(table) = md.table(&link.table) else {
        return Ok(None);
    };
    let opts = prop.options_or(inherited);
    let parent = parents.last().map(|p| p.table.as_str());
    let pk = table.single_key();

    let link_pairs = match (parent, pk) {
        (None, None) => return Ok(None),
        (None, Some(pk)) => vec![(pk.to_string(), format!(":{pk}"))],
        (Some(p), _) => {
            let refs = resolve_refs(table, &link.refs, p)?;
            update_link_pairs(&refs, pk, p, &table.name)
        }
    };

    let mut lookups = Vec::new();
    let mut pairs: Vec<(String, String)> = Vec::new();
    let mut children = Vec::new();

    for (field, value) in shape {
        if let Some(obj) = value.as_object() {
            if let Some(lookup_table) = table.ref_table_for(field) {
                if let Some(fragment) = lookup_tresql(md, field, lookup_table, obj)? {
                    lookups.push(fragment);
                    let col = table
                        .col(field)
                        .map(|c| c.name.clone())
                        .unwrap_or_else(|| field.to_string());
                    pairs.push((col, md.value_expr(&table.name, field)));
                }
                continue;
            }
            let mut child_parents = parents.to_vec();
            child_parents.push(ParentRef::new(table.name.clone()));
            if let Some(child) = child_save_tresql(md, field, obj, &child_parents, opts)? {
                children.push(child);
            }
            continue;
        }
        let Some(col) = table.col(field) else {
            continue;
        };
        if link_pairs.iter().any(|(c, _)| c == &col.name) {
            continue; // addressed through the filter, never set
        }
        pairs.push((col.name.clone(), md.value_expr(&table.name, field)));
    }

    if pairs.is_empty() {
        return Ok(None);
    }

    let mut filter_str = conjunction(&link_pairs);
    if let Some(f) = filter {
        filter_str = format!("{filter_str} & ({f})");
    }
    let alias = prop
        .alias
        .as_deref()
        .map(|a| format!(" {a}"))
        .unwrap_or_default();
    let (cols, vals) = cols_vals(&pairs);
    let base = format!("={}{}[{}]{{{}}}[{}]", table.name, alias, filter_str, cols, vals);

    let mut fragments = vec![wrap_lookups(lookups, base)];
    fragments.extend(children);
    for linked in prop.linked() {
        if let Some(fragment) = linked_update(md, linked, table, shape)? {
            fragments.push(fragment);
        }
    }
    Ok(Some(fragments.join(", ")))
}

/// Linkage pairs forming the update's ref filter: resolved ref columns,
/// then the primary key bound from the environment when it is not itself
/// one of the refs.
fn update_link_pairs(
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
        pairs.push((pk.to_string(), format!(":{pk}")));
    }
    pairs
}

/// Compile the save of one child collection during an update.
///
/// The policy machine: a one-to-one child (its pk is a ref to the parent)
/// only ever updates. Otherwise the delete flag clears all children of the
/// parent; without it, the update flag prunes the children missing from the
/// collection. Insert and update combine through `_insert_or_update`, which
/// dispatches per row on the presence of the primary key.
fn child_save_tresql(
    md: &Metadata,
    name: &str,
    shape: &Object,
    parents: &[ParentRef],
    inherited: SaveOptions,
) -> Result<Option<String>, OrtError> {
    let prop = parse_property(name)?;
    let link = prop.primary();
    let Some(table) = md.table(&link.table) else {
        return Ok(None); // unknown child tables are tolerated
    };
    let Some(parent_ref) = parents.last() else {
        return Ok(None);
    };
    let parent = parent_ref.table.as_str();
    let opts = prop.options_or(inherited);
    let refs = resolve_refs(table, &link.refs, parent)?;
    let pk = table.single_key();

    if pk.is_some_and(|k| refs.iter().any(|r| r == k)) {
        let upd = update_tresql(md, name, shape, parents, None, opts)?;
        return Ok(upd.map(|u| format!("{u} '{name}'")));
    }

    let mut fragments = Vec::new();

    let ref_filter = refs
        .iter()
        .map(|r| format!("{r} = :#{parent}"))
        .collect::<Vec<_>>()
        .join(" & ");
    if opts.delete {
        fragments.push(format!("-{}[{}]", table.name, ref_filter));
    } else if opts.update && let Some(pk) = pk {
        fragments.push(format!(
            "{DELETE_CHILDREN}('{name}', '{}', -{}[{} & {} !in :ids])",
            table.name, table.name, ref_filter, pk
        ));
    }

    let ins = if opts.insert {
        insert_tresql(md, name, shape, parents, None)?
    } else {
        None
    };
    let upd = if opts.update && pk.is_some() {
        update_tresql(md, name, shape, parents, None, opts)?
    } else {
        None
    };
    match (ins, upd) {
        (Some(i), Some(u)) => {
            let unaliased = strip_child_alias(&i, name);
            fragments.push(format!(
                "{INSERT_OR_UPDATE}('{}', {}, {}) '{name}'",
                table.name, unaliased, u
            ));
        }
        (Some(i), None) => fragments.push(i),
        (None, Some(u)) => fragments.push(format!("{u} '{name}'")),
        (None, None) => {}
    }

    if fragments.is_empty() {
        Ok(None)
    } else {
        Ok(Some(fragments.join(", ")))
    }
}

/// One-to-one linked table of the descriptor tail, updated against the same
/// shape and addressed through the primary table's identity.
fn linked_update(
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
    let link_pairs = update_link_pairs(&refs, pk, &primary.name, &table.name);

    let mut pairs: Vec<(String, String)> = Vec::new();
    for (field, value) in shape {
        if value.as_object().is_some() {
            continue;
        }
        let Some(col) = table.col(field) else {
            continue;
        };
        if link_pairs.iter().any(|(c, _)| c == &col.name) {
            continue;
        }
        pairs.push((col.name.clone(), md.value_expr(&table.name, field)));
    }
    if pairs.is_empty() {
        return Ok(None);
    }
    let (cols, vals) = cols_vals(&pairs);
    Ok(Some(format!(
        "={}[{}]{{{}}}[{}]",
        table.name,
        conjunction(&link_pairs),
        cols,
        vals
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::builder::MetadataBuilder;
    use crate::normalize::normalize;
    use crate::value::object_from_json;
    use serde_json::json;

    fn sample() -> Metadata {
        MetadataBuilder::new()
            .table("dept", |t| {
                t.column("deptno").column("dname").pk(&["deptno"]);
            })
            .table("emp", |t| {
                t.column("empno")
                    .column("ename")
                    .column("deptno")
                    .pk(&["empno"])
                    .fk(&["deptno"], "dept", &["deptno"]);
            })
            .build()
    }

    fn compile(md: &Metadata, name: &str, obj: serde_json::Value) -> Option<String> {
        let shape = normalize(&object_from_json(obj));
        update_tresql(md, name, &shape, &[], None, SaveOptions::default()).unwrap()
    }

    #[test]
    fn test_top_level_update_addresses_row_by_pk() {
        let md = sample();
        let sql = compile(&md, "dept", json!({"deptno": 10, "dname": "Y"})).unwrap();
        assert_eq!(sql, "=dept[deptno = :deptno]{dname}[:dname]");
    }

    #[test]
    fn test_update_without_pk_or_parent_is_null() {
        let md = MetadataBuilder::new()
            .table("log", |t| {
                t.column("msg");
            })
            .build();
        assert_eq!(compile(&md, "log", json!({"msg": "x"})), None);
    }

    #[test]
    fn test_update_with_no_settable_columns_is_null() {
        let md = sample();
        assert_eq!(compile(&md, "dept", json!({"deptno": 10})), None);
    }

    #[test]
    fn test_user_filter_is_conjoined() {
        let md = sample();
        let shape = normalize(&object_from_json(json!({"deptno": 10, "dname": "Y"})));
        let sql = update_tresql(
            &md,
            "dept",
            &shape,
            &[],
            Some("dname != 'LOCKED'"),
            SaveOptions::default(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(
            sql,
            "=dept[deptno = :deptno & (dname != 'LOCKED')]{dname}[:dname]"
        );
    }

    #[test]
    fn test_alias_renders_after_table() {
        let md = sample();
        let sql = compile(&md, "dept d", json!({"deptno": 10, "dname": "Y"})).unwrap();
        assert_eq!(sql, "=dept d[deptno = :deptno]{dname}[:dname]");
    }

    #[test]
    fn test_default_options_delete_all_and_reinsert_children() {
        let md = sample();
        let sql = compile(
            &md,
            "dept",
            json!({"deptno": 10, "dname": "Y", "emp": [{"ename": "A"}]}),
        )
        .unwrap();
        assert_eq!(
            sql,
            "=dept[deptno = :deptno]{dname}[:dname], \
             -emp[deptno = :#dept], \
             +emp{ename, deptno, empno}[:ename, :#dept, #emp] 'emp'"
        );
    }

    #[test]
    fn test_update_option_prunes_missing_children() {
        let md = sample();
        let sql = compile(
            &md,
            "dept[+=]",
            json!({"deptno": 10, "dname": "Y", "emp": [{"empno": 1, "ename": "A"}]}),
        )
        .unwrap();
        assert_eq!(
            sql,
            "=dept[deptno = :deptno]{dname}[:dname], \
             _delete_children('emp', 'emp', -emp[deptno = :#dept & empno !in :ids]), \
             _insert_or_update('emp', \
             +emp{ename, deptno, empno}[:ename, :#dept, #emp], \
             =emp[deptno = :#dept & empno = :empno]{ename}[:ename]) 'emp'"
        );
    }

    #[test]
    fn test_child_bracket_overrides_inherited_options() {
        let md = sample();
        // The child key pins update-only: no delete, no insert.
        let sql = compile(
            &md,
            "dept",
            json!({"deptno": 10, "dname": "Y", "emp[=]": [{"empno": 1, "ename": "A"}]}),
        )
        .unwrap();
        assert_eq!(
            sql,
            "=dept[deptno = :deptno]{dname}[:dname], \
             _delete_children('emp[=]', 'emp', -emp[deptno = :#dept & empno !in :ids]), \
             =emp[deptno = :#dept & empno = :empno]{ename}[:ename] 'emp[=]'"
        );
    }

    #[test]
    fn test_child_without_pk_degrades_to_delete_and_insert() {
        let md = MetadataBuilder::new()
            .table("dept", |t| {
                t.column("deptno").column("dname").pk(&["deptno"]);
            })
            .table("note", |t| {
                t.column("body")
                    .column("deptno")
                    .fk(&["deptno"], "dept", &["deptno"]);
            })
            .build();
        let sql = compile(
            &md,
            "dept[+-=]",
            json!({"deptno": 10, "dname": "Y", "note": [{"body": "B"}]}),
        )
        .unwrap();
        // No single pk on note: no update form, no missing-children pruning.
        assert_eq!(
            sql,
            "=dept[deptno = :deptno]{dname}[:dname], \
             -note[deptno = :#dept], \
             +note{body, deptno}[:body, :#dept] 'note'"
        );
    }

    #[test]
    fn test_one_to_one_child_updates_only() {
        let md = MetadataBuilder::new()
            .table("person", |t| {
                t.column("id").column("name").pk(&["id"]);
            })
            .table("contract", |t| {
                t.column("id")
                    .column("terms")
                    .pk(&["id"])
                    .fk(&["id"], "person", &["id"]);
            })
            .build();
        let sql = compile(
            &md,
            "person",
            json!({"id": 7, "name": "N", "contract": {"terms": "T"}}),
        )
        .unwrap();
        assert_eq!(
            sql,
            "=person[id = :id]{name}[:name], \
             =contract[id = _id_ref_id(person, contract)]{terms}[:terms] 'contract'"
        );
    }

    #[test]
    fn test_empty_collection_clears_children() {
        let md = sample();
        let sql = compile(&md, "dept", json!({"deptno": 10, "dname": "Y", "emp": []})).unwrap();
        // Normalization keeps the empty collection as an empty object, so
        // the delete-all fragment still fires and the insert carries only
        // the linkage columns (it executes zero times at runtime).
        assert_eq!(
            sql,
            "=dept[deptno = :deptno]{dname}[:dname], \
             -emp[deptno = :#dept], \
             +emp{deptno, empno}[:#dept, #emp] 'emp'"
        );
    }
}
