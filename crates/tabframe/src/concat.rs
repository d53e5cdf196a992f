use indexmap::IndexMap;
use polars::prelude::*;
use tracing::debug;

use crate::assembler::AssemblyHint;
use crate::errors::{Result, TableFrameError};
use crate::frame::{Reassembly, TableFrame};
use crate::registry::{is_reserved, registry};
use crate::supertype::common_supertype;

/// How frames are stacked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConcatHow {
    /// Same columns, same types.
    #[default]
    Vertical,
    /// Same columns, types coerced to a common supertype.
    VerticalRelaxed,
    /// Union of columns, missing values are null. Shared columns must have
    /// the same type.
    Diagonal,
    /// Union of columns with types coerced to a common supertype.
    DiagonalRelaxed,
}

impl ConcatHow {
    fn is_diagonal(&self) -> bool {
        matches!(self, ConcatHow::Diagonal | ConcatHow::DiagonalRelaxed)
    }

    fn is_relaxed(&self) -> bool {
        matches!(self, ConcatHow::VerticalRelaxed | ConcatHow::DiagonalRelaxed)
    }
}

fn user_schema(frame: &TableFrame) -> Result<Vec<(PlSmallStr, DataType)>> {
    Ok(frame
        .schema_all()?
        .iter()
        .filter(|(name, _)| !is_reserved(name))
        .map(|(name, dtype)| (name.clone(), dtype.clone()))
        .collect())
}

fn format_names<'a>(names: impl Iterator<Item = &'a PlSmallStr>) -> String {
    names.map(|n| n.as_str()).collect::<Vec<_>>().join(", ")
}

/// Output columns with their types.
fn target_columns(
    schemas: &[Vec<(PlSmallStr, DataType)>],
    how: ConcatHow,
) -> Result<IndexMap<PlSmallStr, DataType>> {
    let mut target: IndexMap<PlSmallStr, DataType> = IndexMap::new();

    for (index, schema) in schemas.iter().enumerate() {
        if !how.is_diagonal() && index > 0 {
            let same_set = schema.len() == target.len()
                && schema.iter().all(|(name, _)| target.contains_key(name));
            if !same_set {
                return Err(TableFrameError::ColumnSetMismatch {
                    index,
                    expected: format_names(target.keys()),
                    found: format_names(schema.iter().map(|(name, _)| name)),
                });
            }
        }

        for (name, dtype) in schema {
            match target.get_mut(name) {
                None => {
                    target.insert(name.clone(), dtype.clone());
                }
                Some(current) if current == dtype => (),
                Some(current) => {
                    let resolved = if how.is_relaxed() {
                        common_supertype(current, dtype)
                    } else {
                        None
                    };
                    match resolved {
                        Some(resolved) => *current = resolved,
                        None => {
                            return Err(TableFrameError::IncompatibleDtypes {
                                column: name.to_string(),
                                left: current.clone(),
                                right: dtype.clone(),
                            });
                        }
                    }
                }
            }
        }
    }

    Ok(target)
}

/// Stack frames on top of each other.
///
/// Rows keep their virtual column values, so provenance survives mixing
/// frames of different executions. Rows get new identifiers with the old
/// ones in their lineage.
pub fn concat(frames: &[TableFrame], how: ConcatHow) -> Result<TableFrame> {
    let first = frames.first().ok_or(TableFrameError::EmptyConcat)?;

    let schemas = frames.iter().map(user_schema).collect::<Result<Vec<_>>>()?;
    let target = target_columns(&schemas, how)?;

    let system: Vec<Expr> = registry()
        .system_columns_metadata()
        .iter()
        .map(|c| col(c.name).cast(c.dtype.clone()))
        .collect();

    let inputs = frames
        .iter()
        .zip(&schemas)
        .map(|(frame, schema)| {
            let mut projection: Vec<Expr> = target
                .iter()
                .map(|(name, dtype)| match schema.iter().find(|(n, _)| n == name) {
                    Some((_, have)) if have == dtype => col(name.clone()),
                    Some(_) => col(name.clone()).strict_cast(dtype.clone()),
                    None => lit(NULL).cast(dtype.clone()).alias(name.clone()),
                })
                .collect();
            projection.extend(system.iter().cloned());
            frame.lf.clone().select(projection)
        })
        .collect::<Vec<_>>();

    debug!(
        frames = frames.len(),
        columns = target.len(),
        ?how,
        "concatenating frames"
    );

    let lf = polars::prelude::concat(inputs, UnionArgs::default())?;

    let properties = match first.properties() {
        Some(props) if frames.iter().all(|f| f.properties() == Some(props)) => {
            Some(props.clone())
        }
        _ => None,
    };

    first.derive_with(
        lf,
        Reassembly::Full(AssemblyHint { refresh_ids: true }),
        properties,
    )
}

impl TableFrame {
    /// Concatenate `others` after this frame.
    pub fn concat(&self, others: &[TableFrame], how: ConcatHow) -> Result<TableFrame> {
        let mut frames = Vec::with_capacity(others.len() + 1);
        frames.push(self.clone());
        frames.extend(others.iter().cloned());
        concat(&frames, how)
    }
}
