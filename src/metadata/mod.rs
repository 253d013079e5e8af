//! Relational metadata snapshot: the schema probe.
//!
//! The compilers consult a read-only catalog of tables, primary keys and
//! foreign keys. The snapshot must be effectively immutable for the duration
//! of a compile call; given the same snapshot, compilation is deterministic.

pub mod builder;

use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct Metadata {
    tables: HashMap<String, TableDef>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&self, name: &str) -> Option<&TableDef> {
        self.tables.get(name)
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn insert_table(&mut self, table: TableDef) {
        self.tables.insert(table.name.clone(), table);
    }

    /// The DSL fragment binding a column's value from the environment.
    /// Defaults to `:{field}`; a column may carry an override template
    /// registered by the host (e.g. a cast wrapper).
    pub fn value_expr(&self, table: &str, field: &str) -> String {
        self.table(table)
            .and_then(|t| t.col(field))
            .and_then(|c| c.value_expr.clone())
            .unwrap_or_else(|| format!(":{field}"))
    }
}

#[derive(Debug, Clone)]
pub struct TableDef {
    pub name: String,
    pub key: Key,
    /// Columns in definition order.
    pub cols: Vec<ColumnDef>,
    /// Outgoing foreign keys in definition order. Order matters: reference
    /// resolution and the multi-table compositor iterate it.
    pub refs: Vec<Ref>,
}

/// Primary key: empty, single, or composite.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Key {
    pub cols: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub name: String,
    /// Bind expression override; `None` means the default `:{field}` form.
    pub value_expr: Option<String>,
}

/// An outgoing foreign key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ref {
    pub cols: Vec<String>,
    pub ref_table: String,
    pub ref_cols: Vec<String>,
}

impl TableDef {
    /// Resolve a field name to its column, yielding the canonical name.
    pub fn col(&self, field: &str) -> Option<&ColumnDef> {
        self.cols.iter().find(|c| c.name == field)
    }

    /// The primary key column iff the key is exactly one column.
    pub fn single_key(&self) -> Option<&str> {
        match self.key.cols.as_slice() {
            [k] => Some(k),
            _ => None,
        }
    }

    /// All foreign keys pointing at `parent`, in definition order.
    pub fn refs_to(&self, parent: &str) -> Vec<&Ref> {
        self.refs.iter().filter(|r| r.ref_table == parent).collect()
    }

    /// Target table of the single-column foreign key over `col`, if any.
    /// This is the lookup-object test: a field whose name is such a column
    /// and whose value is an object denotes a row in the referenced table.
    pub fn ref_table_for(&self, col: &str) -> Option<&str> {
        self.refs
            .iter()
            .find(|r| r.cols.len() == 1 && r.cols[0] == col)
            .map(|r| r.ref_table.as_str())
    }
}
