//! Public save API.
//!
//! [`Ort`] is the compiler handle over one metadata snapshot. Each entry
//! point normalizes the input object, compiles the TRESQL expression, and
//! returns it together with the original (un-normalized) object as the
//! bindings for the execution engine. Compilation performs no I/O and keeps
//! no state between calls.

use crate::compile::insert::insert_tresql;
use crate::compile::multi::multi_save_prop;
use crate::compile::update::update_tresql;
use crate::descriptor::{SaveOptions, parse_property};
use crate::error::OrtError;
use crate::metadata::Metadata;
use crate::normalize::normalize;
use crate::value::{Object, Value};

/// A compiled save: the TRESQL expression and the bindings to run it with.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveQuery {
    pub tresql: String,
    pub bindings: Value,
}

impl SaveQuery {
    /// Hand the expression and bindings to an execution engine.
    pub fn execute<E: QueryEngine>(&self, engine: &mut E) -> Result<ExecResult, E::Error> {
        engine.build(&self.tresql, &self.bindings)
    }
}

/// What an execution engine reports back for one compiled save.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecResult {
    /// An insert: affected count plus the generated id, when one was.
    Inserted { count: u64, id: Option<Value> },
    /// An update or delete: affected count.
    Count(u64),
    /// A batched form: one result per element.
    Batch(Vec<ExecResult>),
}

/// The consumed execution-engine contract: parse the DSL, bind the object,
/// run the statements, honoring the macro semantics of [`crate::macros`].
pub trait QueryEngine {
    type Error;

    fn build(&mut self, tresql: &str, bindings: &Value) -> Result<ExecResult, Self::Error>;
}

/// Compiler over one metadata snapshot.
pub struct Ort<'a> {
    md: &'a Metadata,
}

impl<'a> Ort<'a> {
    pub fn new(md: &'a Metadata) -> Self {
        Self { md }
    }

    /// Compile an insert of `obj` into the tables named by `name`.
    pub fn insert(
        &self,
        name: &str,
        obj: &Object,
        filter: Option<&str>,
    ) -> Result<SaveQuery, OrtError> {
        let prop = parse_property(name)?;
        let shape = normalize(obj);
        match insert_tresql(self.md, name, &shape, &[], filter)? {
            Some(tresql) => Ok(SaveQuery {
                tresql,
                bindings: Value::Object(obj.clone()),
            }),
            None => Err(self.root_failure(&prop.primary().table)),
        }
    }

    /// Compile an update of `obj` against the tables named by `name`.
    pub fn update(
        &self,
        name: &str,
        obj: &Object,
        filter: Option<&str>,
    ) -> Result<SaveQuery, OrtError> {
        let prop = parse_property(name)?;
        let table_name = &prop.primary().table;
        if !self.md.has_table(table_name) {
            return Err(OrtError::TableNotFound(table_name.clone()));
        }
        let shape = normalize(obj);
        match update_tresql(self.md, name, &shape, &[], filter, SaveOptions::default())? {
            Some(tresql) => Ok(SaveQuery {
                tresql,
                bindings: Value::Object(obj.clone()),
            }),
            None => Err(OrtError::NoUpdatableColumns(table_name.clone())),
        }
    }

    /// Compile a delete of the row identified by `id`, with an optional
    /// extra filter bound through positional parameters (the id is `?1`,
    /// filter parameters take the positions the caller assigned them).
    pub fn delete(
        &self,
        name: &str,
        id: Value,
        filter: Option<&str>,
        filter_params: Option<&Object>,
    ) -> Result<SaveQuery, OrtError> {
        let prop = parse_property(name)?;
        let table_name = &prop.primary().table;
        let Some(table) = self.md.table(table_name) else {
            return Err(OrtError::TableNotFound(table_name.clone()));
        };
        let Some(pk) = table.single_key() else {
            return Err(OrtError::NoPrimaryKey(table_name.clone()));
        };

        let mut predicate = format!("{pk} = ?");
        if let Some(f) = filter {
            predicate = format!("{predicate} & ({f})");
        }
        let tresql = match prop.alias.as_deref() {
            Some(a) => format!("-{table_name} {a}[{predicate}]"),
            None => format!("-{table_name}[{predicate}]"),
        };

        let mut bindings = Object::new();
        bindings.insert("1".to_string(), id);
        if let Some(params) = filter_params {
            for (k, v) in params {
                bindings.insert(k.clone(), v.clone());
            }
        }
        Ok(SaveQuery {
            tresql,
            bindings: Value::Object(bindings),
        })
    }

    /// Insert one object spanning several related tables; the descriptor is
    /// derived from the table list via the multi-table compositor.
    pub fn insert_multiple(
        &self,
        obj: &Object,
        names: &[&str],
        filter: Option<&str>,
    ) -> Result<SaveQuery, OrtError> {
        let name = multi_save_prop(self.md, names)?;
        self.insert(&name, obj, filter)
    }

    /// Update one object spanning several related tables.
    pub fn update_multiple(
        &self,
        obj: &Object,
        names: &[&str],
        filter: Option<&str>,
    ) -> Result<SaveQuery, OrtError> {
        let name = multi_save_prop(self.md, names)?;
        self.update(&name, obj, filter)
    }

    /// Insert a typed value through a caller-supplied converter yielding
    /// the descriptor and the object to save.
    pub fn insert_obj<T>(
        &self,
        value: &T,
        to_obj: impl Fn(&T) -> (String, Object),
        filter: Option<&str>,
    ) -> Result<SaveQuery, OrtError> {
        let (name, obj) = to_obj(value);
        self.insert(&name, &obj, filter)
    }

    /// Update a typed value through a caller-supplied converter.
    pub fn update_obj<T>(
        &self,
        value: &T,
        to_obj: impl Fn(&T) -> (String, Object),
        filter: Option<&str>,
    ) -> Result<SaveQuery, OrtError> {
        let (name, obj) = to_obj(value);
        self.update(&name, &obj, filter)
    }

    fn root_failure(&self, table: &str) -> OrtError {
        if self.md.has_table(table) {
            OrtError::NoUpdatableColumns(table.to_string())
        } else {
            OrtError::TableNotFound(table.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::builder::MetadataBuilder;
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

    #[test]
    fn test_insert_returns_original_bindings() {
        let md = sample();
        let ort = Ort::new(&md);
        let obj = object_from_json(json!({"deptno": 10, "dname": "S", "emp": [{"ename": "A"}]}));
        let q = ort.insert("dept", &obj, None).unwrap();
        // Bindings are the raw object, not the normalized shape: the
        // sequence under "emp" survives for per-row execution.
        assert_eq!(q.bindings, Value::Object(obj));
        assert!(q.tresql.starts_with("+dept"));
    }

    #[test]
    fn test_insert_unknown_table_errors() {
        let md = sample();
        let ort = Ort::new(&md);
        let obj = object_from_json(json!({"a": 1}));
        assert_eq!(
            ort.insert("nosuch", &obj, None),
            Err(OrtError::TableNotFound("nosuch".to_string()))
        );
    }

    #[test]
    fn test_update_without_settable_columns_errors() {
        let md = sample();
        let ort = Ort::new(&md);
        let obj = object_from_json(json!({"deptno": 10}));
        assert_eq!(
            ort.update("dept", &obj, None),
            Err(OrtError::NoUpdatableColumns("dept".to_string()))
        );
    }

    #[test]
    fn test_update_without_pk_errors() {
        // A pk-less root row cannot be addressed: the compile emits null
        // and surfaces like any other column-less update.
        let md = MetadataBuilder::new()
            .table("log", |t| {
                t.column("msg");
            })
            .build();
        let ort = Ort::new(&md);
        let obj = object_from_json(json!({"msg": "x"}));
        assert_eq!(
            ort.update("log", &obj, None),
            Err(OrtError::NoUpdatableColumns("log".to_string()))
        );
    }

    #[test]
    fn test_delete_with_filter_params() {
        let md = sample();
        let ort = Ort::new(&md);
        let params = object_from_json(json!({"2": "LOCKED"}));
        let q = ort
            .delete("dept", Value::Int(10), Some("dname != ?"), Some(&params))
            .unwrap();
        assert_eq!(q.tresql, "-dept[deptno = ? & (dname != ?)]");
        assert_eq!(
            q.bindings,
            Value::Object(object_from_json(json!({"1": 10, "2": "LOCKED"})))
        );
    }

    #[test]
    fn test_delete_requires_single_pk() {
        let md = MetadataBuilder::new()
            .table("link", |t| {
                t.column("a").column("b").pk(&["a", "b"]);
            })
            .build();
        let ort = Ort::new(&md);
        assert_eq!(
            ort.delete("link", Value::Int(1), None, None),
            Err(OrtError::NoPrimaryKey("link".to_string()))
        );
    }

    #[test]
    fn test_bad_descriptor_surfaces() {
        let md = sample();
        let ort = Ort::new(&md);
        let obj = Object::new();
        assert!(matches!(
            ort.insert("dept[?]", &obj, None),
            Err(OrtError::BadDescriptor(_))
        ));
    }

    #[test]
    fn test_insert_obj_converter() {
        struct Dept {
            deptno: i64,
            dname: String,
        }
        let md = sample();
        let ort = Ort::new(&md);
        let d = Dept {
            deptno: 10,
            dname: "S".into(),
        };
        let q = ort
            .insert_obj(
                &d,
                |d| {
                    let mut obj = Object::new();
                    obj.insert("deptno".into(), Value::Int(d.deptno));
                    obj.insert("dname".into(), Value::String(d.dname.clone()));
                    ("dept".to_string(), obj)
                },
                None,
            )
            .unwrap();
        assert_eq!(q.tresql, "+dept{deptno, dname}[:deptno, :dname]");
    }

    struct RecordingEngine {
        seen: Vec<String>,
    }

    impl QueryEngine for RecordingEngine {
        type Error = std::convert::Infallible;

        fn build(&mut self, tresql: &str, _bindings: &Value) -> Result<ExecResult, Self::Error> {
            self.seen.push(tresql.to_string());
            Ok(ExecResult::Inserted {
                count: 1,
                id: Some(Value::Int(1)),
            })
        }
    }

    #[test]
    fn test_execute_hands_off_to_engine() {
        let md = sample();
        let ort = Ort::new(&md);
        let obj = object_from_json(json!({"deptno": 10, "dname": "S"}));
        let q = ort.insert("dept", &obj, None).unwrap();
        let mut engine = RecordingEngine { seen: vec![] };
        let result = q.execute(&mut engine).unwrap();
        assert_eq!(engine.seen, vec![q.tresql.clone()]);
        assert!(matches!(result, ExecResult::Inserted { count: 1, .. }));
    }
}
