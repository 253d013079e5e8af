//! Fluent harness for building metadata snapshots.
//!
//! Tests (and embedders that assemble schemas by hand) construct snapshots
//! with a closure per table:
//!
//! ```rust
//! use tresql_ort::metadata::builder::MetadataBuilder;
//!
//! let md = MetadataBuilder::new()
//!     .table("dept", |t| {
//!         t.column("deptno").column("dname").pk(&["deptno"]);
//!     })
//!     .table("emp", |t| {
//!         t.column("empno")
//!             .column("ename")
//!             .column("deptno")
//!             .pk(&["empno"])
//!             .fk(&["deptno"], "dept", &["deptno"]);
//!     })
//!     .build();
//! assert!(md.has_table("emp"));
//! ```

use crate::metadata::{ColumnDef, Key, Metadata, Ref, TableDef};

pub struct MetadataBuilder {
    metadata: Metadata,
}

impl MetadataBuilder {
    pub fn new() -> Self {
        Self {
            metadata: Metadata::new(),
        }
    }

    /// Add a table. The closure receives a [`TableBuilder`] to configure
    /// columns, the primary key, and foreign keys.
    pub fn table(mut self, name: &str, f: impl FnOnce(&mut TableBuilder)) -> Self {
        let mut builder = TableBuilder::new(name);
        f(&mut builder);
        self.metadata.insert_table(builder.build());
        self
    }

    pub fn build(self) -> Metadata {
        self.metadata
    }
}

impl Default for MetadataBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub struct TableBuilder {
    def: TableDef,
}

impl TableBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            def: TableDef {
                name: name.to_string(),
                key: Key::default(),
                cols: vec![],
                refs: vec![],
            },
        }
    }

    /// Add a column with the default bind expression.
    pub fn column(&mut self, name: &str) -> &mut Self {
        self.def.cols.push(ColumnDef {
            name: name.to_string(),
            value_expr: None,
        });
        self
    }

    /// Add a column with a bind expression override.
    pub fn column_expr(&mut self, name: &str, expr: &str) -> &mut Self {
        self.def.cols.push(ColumnDef {
            name: name.to_string(),
            value_expr: Some(expr.to_string()),
        });
        self
    }

    /// Set the primary key.
    pub fn pk(&mut self, cols: &[&str]) -> &mut Self {
        self.def.key = Key {
            cols: cols.iter().map(|s| s.to_string()).collect(),
        };
        self
    }

    /// Add a foreign key.
    pub fn fk(&mut self, cols: &[&str], ref_table: &str, ref_cols: &[&str]) -> &mut Self {
        self.def.refs.push(Ref {
            cols: cols.iter().map(|s| s.to_string()).collect(),
            ref_table: ref_table.to_string(),
            ref_cols: ref_cols.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    pub fn build(self) -> TableDef {
        self.def
    }
}
