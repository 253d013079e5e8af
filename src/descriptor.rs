//! Save descriptor parsing.
//!
//! A descriptor names the table (or `#`-linked one-to-one tables) an object
//! is saved into, optionally pins the foreign-key columns used to link each
//! table, carries a bracketed option group controlling child save policy,
//! and may end with an alias for the primary table:
//!
//! ```text
//! tables (options)? (" " alias)?
//! tables  := table ("#" table)*
//! table   := ident (":" ident)*
//! ident   := [^:\[\]\s#]+
//! options := "[" "+"? "-"? "="? "]"
//! ```
//!
//! `dept` saves one table; `dept#car:deptnr:nr` saves `dept` with a linked
//! `car` row joined over the pinned `deptnr`/`nr` columns; `dept[+=] d`
//! enables insert and update of children and aliases the primary table.

use crate::error::OrtError;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static DESCRIPTOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<tables>[^:\[\]\s#]+(?::[^:\[\]\s#]+)*(?:#[^:\[\]\s#]+(?::[^:\[\]\s#]+)*)*)(?:\[(?P<ins>\+?)(?P<del>-?)(?P<upd>=?)\])?(?:\s+(?P<alias>\w+))?$",
    )
    .expect("descriptor pattern is valid")
});

/// One table of a descriptor: the table name plus the pinned linking
/// columns. Empty `refs` means the link relies on inferred foreign keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableLink {
    pub table: String,
    pub refs: Vec<String>,
}

/// The parsed bracket group: which save actions apply to children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOptions {
    pub insert: bool,
    pub update: bool,
    pub delete: bool,
}

impl Default for SaveOptions {
    /// The policy used when a descriptor carries no bracket group:
    /// insert new children, delete existing ones, do not update.
    fn default() -> Self {
        Self {
            insert: true,
            update: false,
            delete: true,
        }
    }
}

/// A parsed save descriptor. `tables` is never empty: the head is the
/// primary table, the tail the one-to-one linked tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub tables: Vec<TableLink>,
    /// `None` when the descriptor had no bracket group. The distinction
    /// matters: an absent group inherits the enclosing policy during child
    /// compilation, an explicit group does not.
    pub options: Option<SaveOptions>,
    pub alias: Option<String>,
}

impl Property {
    pub fn primary(&self) -> &TableLink {
        &self.tables[0]
    }

    pub fn linked(&self) -> &[TableLink] {
        &self.tables[1..]
    }

    /// The options with the grammar defaults applied.
    pub fn save_options(&self) -> SaveOptions {
        self.options.unwrap_or_default()
    }

    /// The options with an inherited fallback instead of the defaults.
    pub fn options_or(&self, inherited: SaveOptions) -> SaveOptions {
        self.options.unwrap_or(inherited)
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, link) in self.tables.iter().enumerate() {
            if i > 0 {
                f.write_str("#")?;
            }
            f.write_str(&link.table)?;
            for r in &link.refs {
                write!(f, ":{r}")?;
            }
        }
        if let Some(o) = self.options {
            write!(
                f,
                "[{}{}{}]",
                if o.insert { "+" } else { "" },
                if o.delete { "-" } else { "" },
                if o.update { "=" } else { "" },
            )?;
        }
        if let Some(a) = &self.alias {
            write!(f, " {a}")?;
        }
        Ok(())
    }
}

/// Parse a descriptor string. Fails with [`OrtError::BadDescriptor`] when
/// the string does not match the grammar end-to-end.
pub fn parse_property(name: &str) -> Result<Property, OrtError> {
    let caps = DESCRIPTOR
        .captures(name)
        .ok_or_else(|| OrtError::BadDescriptor(name.to_string()))?;

    let tables = caps["tables"]
        .split('#')
        .map(|segment| {
            let mut idents = segment.split(':');
            let table = idents.next().unwrap_or_default().to_string();
            TableLink {
                table,
                refs: idents.map(str::to_string).collect(),
            }
        })
        .collect();

    // The flag groups participate in the match exactly when the bracket
    // group is present, even if all three are empty.
    let options = caps.name("ins").map(|ins| SaveOptions {
        insert: !ins.as_str().is_empty(),
        update: !caps["upd"].is_empty(),
        delete: !caps["del"].is_empty(),
    });

    Ok(Property {
        tables,
        options,
        alias: caps.name("alias").map(|m| m.as_str().to_string()),
    })
}
