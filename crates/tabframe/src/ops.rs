//! Operations on table frames.
//!
//! Every operation builds on the underlying lazy plan and returns a new
//! frame whose system columns have been carried through or reassembled.

use indexmap::IndexMap;
use polars::prelude::*;
use tracing::trace;

use crate::assembler::AssemblyHint;
use crate::errors::{Result, TableFrameError};
use crate::frame::{Reassembly, TableFrame, plan_height};
use crate::properties::Properties;
use crate::registry::{ID_COLUMN, is_reserved, registry};
use crate::selectors::Selector;

/// Check if an expression reduces the frame to a single row.
fn is_aggregation(expr: &Expr) -> bool {
    match expr {
        Expr::Agg(_) | Expr::Len => true,
        Expr::Alias(inner, _) => is_aggregation(inner),
        _ => false,
    }
}

/// Number of column references in an expression built only from columns,
/// literals, casts, arithmetic and conditionals. None for anything else.
fn elementwise_columns(expr: &Expr) -> Option<usize> {
    match expr {
        Expr::Column(_) => Some(1),
        Expr::Literal(_) => Some(0),
        Expr::Alias(inner, _) | Expr::Cast { expr: inner, .. } => elementwise_columns(inner),
        Expr::BinaryExpr { left, right, .. } => {
            Some(elementwise_columns(left)? + elementwise_columns(right)?)
        }
        Expr::Ternary {
            predicate,
            truthy,
            falsy,
        } => Some(
            elementwise_columns(predicate)?
                + elementwise_columns(truthy)?
                + elementwise_columns(falsy)?,
        ),
        _ => None,
    }
}

/// Check if an expression produces one value per input row without
/// evaluating it.
fn keeps_rows(expr: &Expr) -> bool {
    elementwise_columns(expr).is_some_and(|n| n > 0)
}

pub(crate) fn check_output_names<'a>(
    names: impl IntoIterator<Item = &'a PlSmallStr>,
) -> Result<()> {
    for name in names {
        if is_reserved(name) {
            return Err(TableFrameError::WriteReservedColumn(name.to_string()));
        }
    }
    Ok(())
}

pub(crate) fn idx_size(n: usize) -> IdxSize {
    IdxSize::try_from(n).unwrap_or(IdxSize::MAX)
}

fn system_exprs() -> Vec<Expr> {
    registry().required_columns().iter().map(|n| col(*n)).collect()
}

impl TableFrame {
    /// Resolve a selector against the user columns of this frame.
    pub fn resolve(&self, selector: &Selector) -> Result<Vec<PlSmallStr>> {
        let schema = self.schema_all()?;
        selector.resolve(&schema)
    }

    fn user_columns(&self) -> Result<Vec<PlSmallStr>> {
        Ok(self
            .schema_all()?
            .iter_names()
            .filter(|n| !is_reserved(n))
            .cloned()
            .collect())
    }

    fn check_expr_outputs(&self, exprs: &[Expr]) -> Result<()> {
        let schema = self.lf.clone().select(exprs).collect_schema()?;
        check_output_names(schema.iter_names())
    }

    /// Project user expressions.
    ///
    /// When the projection keeps the row count, system columns are carried
    /// along. When it reduces the frame to a single row, the identifiers of
    /// every input row feed the lineage of that row. Any other row count
    /// gets fresh system columns. Unless every expression is known to keep or
    /// reduce rows, the projection is run once to find its row count.
    pub fn select<E: AsRef<[Expr]>>(&self, exprs: E) -> Result<TableFrame> {
        let exprs = exprs.as_ref();
        self.check_expr_outputs(exprs)?;

        if exprs.is_empty() || exprs.iter().all(keeps_rows) {
            return self.select_rows(exprs);
        }
        if exprs.iter().all(is_aggregation) {
            return self.select_reduced(exprs);
        }

        let projected = self.lf.clone().select(exprs);
        let height = plan_height(projected.clone())?;
        let input_height = self.height()?;
        trace!(height, input_height, "measured projection");

        if height == input_height {
            self.select_rows(exprs)
        } else if height == 1 {
            self.select_reduced(exprs)
        } else {
            self.derive(projected, Reassembly::Full(AssemblyHint::default()))
        }
    }

    fn select_rows(&self, exprs: &[Expr]) -> Result<TableFrame> {
        let mut projection = exprs.to_vec();
        projection.extend(system_exprs());
        self.derive(self.lf.clone().select(projection), Reassembly::Verify)
    }

    fn select_reduced(&self, exprs: &[Expr]) -> Result<TableFrame> {
        let mut projection = exprs.to_vec();
        projection.push(col(ID_COLUMN).implode().alias(ID_COLUMN));
        self.derive(
            self.lf.clone().select(projection),
            Reassembly::Full(AssemblyHint::default()),
        )
    }

    pub fn select_by(&self, selector: &Selector) -> Result<TableFrame> {
        let exprs: Vec<_> = self.resolve(selector)?.into_iter().map(col).collect();
        self.select(exprs)
    }

    pub fn filter(&self, predicate: Expr) -> Result<TableFrame> {
        self.derive(self.lf.clone().filter(predicate), Reassembly::Verify)
    }

    /// Add or replace user columns.
    pub fn with_columns<E: AsRef<[Expr]>>(&self, exprs: E) -> Result<TableFrame> {
        let exprs = exprs.as_ref();
        self.check_expr_outputs(exprs)?;
        self.derive(self.lf.clone().with_columns(exprs), Reassembly::Verify)
    }

    pub fn with_column(&self, expr: Expr) -> Result<TableFrame> {
        self.with_columns([expr])
    }

    pub fn rename<I, F, T>(&self, mapping: I) -> Result<TableFrame>
    where
        I: IntoIterator<Item = (F, T)>,
        F: Into<String>,
        T: Into<String>,
    {
        let schema = self.schema_all()?;
        let mut renames = IndexMap::new();
        for (from, to) in mapping {
            let (from, to) = (from.into(), to.into());
            if is_reserved(&from) {
                return Err(TableFrameError::RenameSystemColumn(from));
            }
            if is_reserved(&to) {
                return Err(TableFrameError::RenameToReserved { from, to });
            }
            if !schema.contains(&from) {
                return Err(TableFrameError::ColumnNotFound(from));
            }
            renames.insert(from, to);
        }

        let exprs: Vec<_> = schema
            .iter_names()
            .map(|name| match renames.get(name.as_str()) {
                Some(to) => col(name.clone()).alias(to.as_str()),
                None => col(name.clone()),
            })
            .collect();
        self.derive(self.lf.clone().select(exprs), Reassembly::Verify)
    }

    /// Drop user columns. System columns can't be dropped.
    pub fn drop(&self, columns: impl Into<Selector>) -> Result<TableFrame> {
        let dropped = self.resolve(&columns.into())?;
        let keep: Vec<_> = self
            .schema_all()?
            .iter_names()
            .filter(|n| !dropped.contains(n))
            .cloned()
            .map(col)
            .collect();
        self.derive(self.lf.clone().select(keep), Reassembly::Verify)
    }

    pub fn sort(&self, by: Vec<Expr>, options: SortMultipleOptions) -> Result<TableFrame> {
        self.derive(self.lf.clone().sort_by_exprs(by, options), Reassembly::Verify)
    }

    /// Deduplicate rows on a subset of user columns, all of them by default.
    pub fn unique(
        &self,
        subset: Option<&Selector>,
        keep: UniqueKeepStrategy,
    ) -> Result<TableFrame> {
        let subset = match subset {
            Some(selector) => self.resolve(selector)?,
            None => self.user_columns()?,
        };
        if subset.is_empty() {
            return Ok(self.clone());
        }

        let exprs: Vec<Expr> = subset.into_iter().map(col).collect();
        self.derive(
            self.lf.clone().unique_stable_generic(Some(exprs), keep),
            Reassembly::Verify,
        )
    }

    pub fn limit(&self, n: usize) -> Result<TableFrame> {
        self.derive(self.lf.clone().limit(idx_size(n)), Reassembly::Verify)
    }

    pub fn head(&self, n: usize) -> Result<TableFrame> {
        self.limit(n)
    }

    pub fn tail(&self, n: usize) -> Result<TableFrame> {
        self.derive(self.lf.clone().tail(idx_size(n)), Reassembly::Verify)
    }

    /// Rows starting at `offset`, negative offsets count from the end.
    pub fn slice(&self, offset: i64, len: usize) -> Result<TableFrame> {
        self.derive(self.lf.clone().slice(offset, idx_size(len)), Reassembly::Verify)
    }

    pub fn first(&self) -> Result<TableFrame> {
        self.derive(self.lf.clone().first(), Reassembly::Verify)
    }

    pub fn last(&self) -> Result<TableFrame> {
        self.derive(self.lf.clone().last(), Reassembly::Verify)
    }

    /// Same columns, no rows.
    pub fn clear(&self) -> Result<TableFrame> {
        self.limit(0)
    }

    pub fn group_by<E: AsRef<[Expr]>>(&self, keys: E) -> TableGroupBy {
        TableGroupBy {
            frame: self.clone(),
            keys: keys.as_ref().to_vec(),
        }
    }

    /// Replace nulls in every user column.
    pub fn fill_null(&self, value: Expr) -> Result<TableFrame> {
        let exprs: Vec<_> = self
            .user_columns()?
            .into_iter()
            .map(|name| col(name).fill_null(value.clone()))
            .collect();
        if exprs.is_empty() {
            return Ok(self.clone());
        }
        self.derive(self.lf.clone().with_columns(exprs), Reassembly::Verify)
    }

    /// Drop rows with a null in any of the subset columns, all user columns
    /// by default.
    pub fn drop_nulls(&self, subset: Option<&Selector>) -> Result<TableFrame> {
        let subset = match subset {
            Some(selector) => self.resolve(selector)?,
            None => self.user_columns()?,
        };
        let predicate = subset
            .into_iter()
            .map(|name| col(name).is_not_null())
            .reduce(|acc, e| acc.and(e));

        match predicate {
            Some(predicate) => self.filter(predicate),
            None => Ok(self.clone()),
        }
    }

    /// Cast user columns.
    pub fn cast<I, S>(&self, dtypes: I) -> Result<TableFrame>
    where
        I: IntoIterator<Item = (S, DataType)>,
        S: Into<String>,
    {
        let schema = self.schema_all()?;
        let mut exprs = Vec::new();
        for (name, dtype) in dtypes {
            let name = name.into();
            if is_reserved(&name) {
                return Err(TableFrameError::WriteReservedColumn(name));
            }
            if !schema.contains(&name) {
                return Err(TableFrameError::ColumnNotFound(name));
            }
            exprs.push(col(name.as_str()).cast(dtype));
        }
        if exprs.is_empty() {
            return Ok(self.clone());
        }
        self.derive(self.lf.clone().with_columns(exprs), Reassembly::Verify)
    }

    /// Replace the frame properties. Virtual columns of every row are
    /// rewritten from the new properties.
    pub fn with_properties(&self, properties: Properties) -> Result<TableFrame> {
        let keep: Vec<_> = self
            .schema_all()?
            .iter_names()
            .filter(|name| {
                registry()
                    .virtual_columns()
                    .all(|(virt, _)| virt.name != name.as_str())
            })
            .cloned()
            .map(col)
            .collect();

        self.derive_with(
            self.lf.clone().select(keep),
            Reassembly::Full(AssemblyHint::default()),
            Some(properties),
        )
    }
}

/// Pending group by on a table frame.
#[derive(Debug, Clone)]
pub struct TableGroupBy {
    frame: TableFrame,
    keys: Vec<Expr>,
}

impl TableGroupBy {
    /// Aggregate each group. Identifiers of the grouped rows feed the
    /// lineage of the aggregated row.
    pub fn agg<E: AsRef<[Expr]>>(&self, aggs: E) -> Result<TableFrame> {
        let aggs = aggs.as_ref().to_vec();
        let lf = &self.frame.lf;

        let schema = lf
            .clone()
            .group_by_stable(&self.keys)
            .agg(&aggs)
            .collect_schema()?;
        check_output_names(schema.iter_names())?;

        let mut all = aggs;
        all.push(col(ID_COLUMN));

        let grouped = lf.clone().group_by_stable(&self.keys).agg(all);
        self.frame
            .derive(grouped, Reassembly::Full(AssemblyHint::default()))
    }
}
