//! Multi-table compositor.
//!
//! Derives the effective save descriptor when the caller supplies an
//! ordered list of related tables: each table after the first is linked
//! through its discovered single-column foreign keys to any table already
//! accumulated, plus its own single-column primary key, rendered as pinned
//! `:`-columns and joined with `#`.

use crate::error::OrtError;
use crate::metadata::{Metadata, Ref};
use indexmap::IndexSet;

/// Build the synthetic descriptor for the multi-table entry points,
/// e.g. `["dept", "car"]` → `dept#car:deptnr:nr`.
pub fn multi_save_prop(md: &Metadata, names: &[&str]) -> Result<String, OrtError> {
    let Some((head, tail)) = names.split_first() else {
        return Err(OrtError::BadDescriptor(String::new()));
    };
    let mut rendered: Vec<String> = vec![head.to_string()];
    let mut accumulated: Vec<String> = vec![table_of(head).to_string()];

    for name in tail {
        let mut idents = name.split(':');
        let tname = idents.next().unwrap_or_default();
        let Some(table) = md.table(tname) else {
            return Err(OrtError::TableNotFound(tname.to_string()));
        };

        // Pinned columns seed the set; discovered keys keep first-seen order.
        let mut keys: IndexSet<String> = idents.map(str::to_string).collect();
        for rel in &accumulated {
            let singles: Vec<&Ref> = table
                .refs_to(rel)
                .into_iter()
                .filter(|r| r.cols.len() == 1)
                .collect();
            match singles.as_slice() {
                [one] => {
                    keys.insert(one.cols[0].clone());
                }
                [] => {}
                many => {
                    // Multiple candidates are fine only when one was already
                    // pinned or discovered.
                    if !many.iter().any(|r| keys.contains(&r.cols[0])) {
                        return Err(OrtError::AmbiguousReference {
                            table: tname.to_string(),
                            parent: rel.clone(),
                            candidates: many.iter().map(|r| r.cols[0].clone()).collect(),
                        });
                    }
                }
            }
        }
        if let Some(pk) = table.single_key() {
            keys.insert(pk.to_string());
        }

        let mut segment = tname.to_string();
        for k in &keys {
            segment.push(':');
            segment.push_str(k);
        }
        rendered.push(segment);
        accumulated.push(tname.to_string());
    }
    Ok(rendered.join("#"))
}

fn table_of(name: &str) -> &str {
    name.split(':').next().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::builder::MetadataBuilder;

    fn sample() -> Metadata {
        MetadataBuilder::new()
            .table("dept", |t| {
                t.column("deptno").column("dname").pk(&["deptno"]);
            })
            .table("car", |t| {
                t.column("nr")
                    .column("deptnr")
                    .pk(&["nr"])
                    .fk(&["deptnr"], "dept", &["deptno"]);
            })
            .build()
    }

    #[test]
    fn test_two_table_composition() {
        let md = sample();
        assert_eq!(multi_save_prop(&md, &["dept", "car"]).unwrap(), "dept#car:deptnr:nr");
    }

    #[test]
    fn test_unknown_table_fails() {
        let md = sample();
        assert!(matches!(
            multi_save_prop(&md, &["dept", "bus"]),
            Err(OrtError::TableNotFound(t)) if t == "bus"
        ));
    }

    #[test]
    fn test_composite_pk_contributes_nothing() {
        let md = MetadataBuilder::new()
            .table("dept", |t| {
                t.column("deptno").pk(&["deptno"]);
            })
            .table("grant_row", |t| {
                t.column("deptno")
                    .column("kind")
                    .pk(&["deptno", "kind"])
                    .fk(&["deptno"], "dept", &["deptno"]);
            })
            .build();
        assert_eq!(
            multi_save_prop(&md, &["dept", "grant_row"]).unwrap(),
            "dept#grant_row:deptno"
        );
    }

    #[test]
    fn test_ambiguous_fk_fails_without_pin() {
        let md = MetadataBuilder::new()
            .table("account", |t| {
                t.column("id").pk(&["id"]);
            })
            .table("transfer", |t| {
                t.column("id")
                    .column("from_acc")
                    .column("to_acc")
                    .pk(&["id"])
                    .fk(&["from_acc"], "account", &["id"])
                    .fk(&["to_acc"], "account", &["id"]);
            })
            .build();
        assert!(matches!(
            multi_save_prop(&md, &["account", "transfer"]),
            Err(OrtError::AmbiguousReference { .. })
        ));
        // Pinning one candidate resolves the ambiguity.
        assert_eq!(
            multi_save_prop(&md, &["account", "transfer:from_acc"]).unwrap(),
            "account#transfer:from_acc:id"
        );
    }
}
