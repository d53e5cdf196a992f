//! Metadata for the system columns managed on every frame.
//!
//! The registry is the single source of truth for which system columns exist,
//! their types, and how the assembler treats them.

use std::sync::LazyLock;

use polars::prelude::{DataType, Schema, TimeUnit};

/// Prefix shared by all system columns. Any column name starting with this
/// prefix is reserved.
pub const SYSTEM_COLUMN_PREFIX: &str = "$td.";

pub const ID_COLUMN: &str = "$td.id";
pub const SRC_COLUMN: &str = "$td.src";
pub const EXECUTION_COLUMN: &str = "$td.execution";
pub const TRANSACTION_COLUMN: &str = "$td.transaction";
pub const VERSION_COLUMN: &str = "$td.version";
pub const TIMESTAMP_COLUMN: &str = "$td.timestamp";

/// How the assembler (re)computes a system column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inception {
    /// Kept if present, generated fresh per row otherwise.
    Always,
    /// Recomputed on every assembly.
    Regenerate,
    /// Kept if present, defaulted when absent.
    Preserve,
}

/// How copies of a system column produced by a join are reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// Discard all copies, the column is generated again. Identifiers of
    /// every copy still feed lineage.
    Regenerate,
    /// First non-null value, left side first.
    Coalesce,
}

/// Frame level values broadcast to every row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VirtualColumn {
    Execution,
    Transaction,
    Version,
    Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generator {
    /// Fresh unique row identifier.
    RowId,
    /// Identifiers of the rows a row was assembled from.
    Lineage,
    Virtual(VirtualColumn),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SystemColumn {
    pub name: &'static str,
    pub dtype: DataType,
    pub inception: Inception,
    pub merge: MergePolicy,
    pub generator: Generator,
}

impl SystemColumn {
    /// Name this column gets on the right side of a join.
    pub fn suffixed(&self, suffix: &str) -> String {
        format!("{}{suffix}", self.name)
    }
}

pub fn timestamp_dtype() -> DataType {
    DataType::Datetime(TimeUnit::Milliseconds, Some("UTC".into()))
}

#[derive(Debug)]
pub struct SystemColumnRegistry {
    columns: Vec<SystemColumn>,
    names: Vec<&'static str>,
}

impl SystemColumnRegistry {
    fn new(columns: Vec<SystemColumn>) -> Self {
        for col in &columns {
            assert!(
                col.name.starts_with(SYSTEM_COLUMN_PREFIX),
                "system column '{}' outside reserved namespace",
                col.name
            );
        }
        let names = columns.iter().map(|c| c.name).collect();
        SystemColumnRegistry { columns, names }
    }

    /// Names of the columns every frame carries, in canonical order.
    pub fn required_columns(&self) -> &[&'static str] {
        &self.names
    }

    pub fn system_columns_metadata(&self) -> &[SystemColumn] {
        &self.columns
    }

    pub fn get(&self, name: &str) -> Option<&SystemColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn is_system_column(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn virtual_columns(&self) -> impl Iterator<Item = (&SystemColumn, VirtualColumn)> {
        self.columns.iter().filter_map(|c| match c.generator {
            Generator::Virtual(v) => Some((c, v)),
            _ => None,
        })
    }

    /// Schema containing only the system columns.
    pub fn system_schema(&self) -> Schema {
        let mut schema = Schema::with_capacity(self.columns.len());
        for col in &self.columns {
            schema.insert(col.name.into(), col.dtype.clone());
        }
        schema
    }

    /// If `name` is a join-suffixed copy of a system column, return the
    /// column it copies.
    pub fn suffixed_origin(&self, name: &str, suffix: &str) -> Option<&SystemColumn> {
        let base = name.strip_suffix(suffix)?;
        self.get(base)
    }
}

static REGISTRY: LazyLock<SystemColumnRegistry> = LazyLock::new(|| {
    SystemColumnRegistry::new(vec![
        SystemColumn {
            name: ID_COLUMN,
            dtype: DataType::String,
            inception: Inception::Always,
            merge: MergePolicy::Regenerate,
            generator: Generator::RowId,
        },
        SystemColumn {
            name: SRC_COLUMN,
            dtype: DataType::List(Box::new(DataType::String)),
            inception: Inception::Regenerate,
            merge: MergePolicy::Regenerate,
            generator: Generator::Lineage,
        },
        SystemColumn {
            name: EXECUTION_COLUMN,
            dtype: DataType::String,
            inception: Inception::Preserve,
            merge: MergePolicy::Coalesce,
            generator: Generator::Virtual(VirtualColumn::Execution),
        },
        SystemColumn {
            name: TRANSACTION_COLUMN,
            dtype: DataType::String,
            inception: Inception::Preserve,
            merge: MergePolicy::Coalesce,
            generator: Generator::Virtual(VirtualColumn::Transaction),
        },
        SystemColumn {
            name: VERSION_COLUMN,
            dtype: DataType::String,
            inception: Inception::Preserve,
            merge: MergePolicy::Coalesce,
            generator: Generator::Virtual(VirtualColumn::Version),
        },
        SystemColumn {
            name: TIMESTAMP_COLUMN,
            dtype: timestamp_dtype(),
            inception: Inception::Preserve,
            merge: MergePolicy::Coalesce,
            generator: Generator::Virtual(VirtualColumn::Timestamp),
        },
    ])
});

pub fn registry() -> &'static SystemColumnRegistry {
    &REGISTRY
}

/// Names of required system columns in canonical order.
pub fn required_columns() -> &'static [&'static str] {
    registry().required_columns()
}

pub fn system_columns_metadata() -> &'static [SystemColumn] {
    registry().system_columns_metadata()
}

/// Check if a name falls in the reserved system namespace.
pub fn is_reserved(name: &str) -> bool {
    name.starts_with(SYSTEM_COLUMN_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_columns_in_order() {
        assert_eq!(
            &[
                ID_COLUMN,
                SRC_COLUMN,
                EXECUTION_COLUMN,
                TRANSACTION_COLUMN,
                VERSION_COLUMN,
                TIMESTAMP_COLUMN
            ],
            required_columns()
        );
    }

    #[test]
    fn system_schema_matches_metadata() {
        let schema = registry().system_schema();
        assert_eq!(system_columns_metadata().len(), schema.len());
        for col in system_columns_metadata() {
            assert_eq!(Some(&col.dtype), schema.get(col.name));
        }
    }

    #[test]
    fn reserved_names() {
        assert!(is_reserved("$td.id"));
        assert!(is_reserved("$td.whatever"));
        assert!(!is_reserved("td.id"));
        assert!(!is_reserved("id"));
    }

    #[test]
    fn suffixed_origin() {
        let reg = registry();
        let id = reg.get(ID_COLUMN).unwrap();
        assert_eq!(Some(ID_COLUMN), reg.suffixed_origin(&id.suffixed("_x"), "_x").map(|c| c.name));
        assert!(reg.is_system_column(ID_COLUMN));
        assert!(!reg.is_system_column("$td.id_right"));

        assert_eq!(
            Some(ID_COLUMN),
            reg.suffixed_origin("$td.id_right", "_right").map(|c| c.name)
        );
        assert_eq!(None, reg.suffixed_origin("a_right", "_right").map(|c| c.name));
        assert_eq!(None, reg.suffixed_origin("$td.id", "_right").map(|c| c.name));
    }

    #[test]
    fn virtual_columns_are_preserved() {
        let virtuals: Vec<_> = registry().virtual_columns().collect();
        assert_eq!(4, virtuals.len());
        for (col, _) in virtuals {
            assert_eq!(Inception::Preserve, col.inception);
            assert_eq!(MergePolicy::Coalesce, col.merge);
        }
    }
}
