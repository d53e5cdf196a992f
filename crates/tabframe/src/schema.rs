//! Declared output schemas.

use polars::prelude::{DataType, Field, Schema};

use crate::errors::{Result, TableFrameError};
use crate::registry::is_reserved;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaColumn {
    pub name: String,
    pub dtype: DataType,
}

/// Ordered list of column names and types, used to declare what a user
/// function returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDecl {
    columns: Vec<SchemaColumn>,
}

/// One entry of a declaration or update. Unset parts keep the existing
/// value when updating.
pub type PartialColumn = (Option<String>, Option<DataType>);

impl SchemaDecl {
    pub fn try_new(columns: impl IntoIterator<Item = PartialColumn>) -> Result<Self> {
        let columns = columns
            .into_iter()
            .enumerate()
            .map(|(idx, (name, dtype))| {
                let name = name.ok_or(TableFrameError::MissingSchemaName(idx))?;
                let dtype = dtype.ok_or(TableFrameError::MissingSchemaDtype(idx))?;
                check_name(&name)?;
                Ok(SchemaColumn { name, dtype })
            })
            .collect::<Result<Vec<_>>>()?;

        if columns.is_empty() {
            return Err(TableFrameError::EmptySchema);
        }

        Ok(SchemaDecl { columns })
    }

    /// Declaration from complete `(name, dtype)` pairs.
    pub fn from_pairs<S: Into<String>>(
        columns: impl IntoIterator<Item = (S, DataType)>,
    ) -> Result<Self> {
        Self::try_new(
            columns
                .into_iter()
                .map(|(name, dtype)| (Some(name.into()), Some(dtype))),
        )
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SchemaColumn> {
        self.columns.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn dtypes(&self) -> Vec<&DataType> {
        self.columns.iter().map(|c| &c.dtype).collect()
    }

    pub fn get(&self, index: usize) -> Option<&SchemaColumn> {
        self.columns.get(index)
    }

    /// Update a single position.
    pub fn update_at(
        &mut self,
        index: usize,
        name: Option<String>,
        dtype: Option<DataType>,
    ) -> Result<()> {
        let len = self.columns.len();
        let column = self
            .columns
            .get_mut(index)
            .ok_or(TableFrameError::SchemaIndexOutOfRange { index, len })?;

        if let Some(name) = &name {
            check_name(name)?;
        }
        if let Some(name) = name {
            column.name = name;
        }
        if let Some(dtype) = dtype {
            column.dtype = dtype;
        }
        Ok(())
    }

    /// Update every position at once. Nothing is changed if any entry is
    /// invalid.
    pub fn update_all(&mut self, updates: Vec<PartialColumn>) -> Result<()> {
        if updates.len() != self.columns.len() {
            return Err(TableFrameError::SchemaArityMismatch {
                expected: self.columns.len(),
                got: updates.len(),
            });
        }
        for name in updates.iter().filter_map(|(name, _)| name.as_ref()) {
            check_name(name)?;
        }

        for (column, (name, dtype)) in self.columns.iter_mut().zip(updates) {
            if let Some(name) = name {
                column.name = name;
            }
            if let Some(dtype) = dtype {
                column.dtype = dtype;
            }
        }
        Ok(())
    }

    pub fn to_schema(&self) -> Schema {
        self.columns
            .iter()
            .map(|c| Field::new(c.name.as_str().into(), c.dtype.clone()))
            .collect()
    }
}

fn check_name(name: &str) -> Result<()> {
    if is_reserved(name) {
        return Err(TableFrameError::WriteReservedColumn(name.to_string()));
    }
    Ok(())
}
