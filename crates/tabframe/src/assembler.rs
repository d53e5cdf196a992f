//! System column assembly.
//!
//! Given a lazy frame with any subset of the system columns (none, all,
//! mistyped, or duplicated by a join), produce a plan where every system
//! column is present with its declared type, placed after the user columns
//! in registry order.

use polars::prelude::*;
use tracing::{debug, trace, warn};

use crate::config::FrameConfig;
use crate::errors::{Result, TableFrameError, internal};
use crate::generator::{RowIdSeed, lineage_expr, row_id_expr};
use crate::properties::{Properties, null_virtual_value};
use crate::registry::{
    Generator,
    Inception,
    MergePolicy,
    SystemColumn,
    SystemColumnRegistry,
    is_reserved,
    registry,
};

/// Outcome of checking a schema against the column invariants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// All system columns present, typed and ordered.
    Valid,
    /// System columns are correct but column order is not canonical.
    NeedsReorder,
    /// System columns are missing, mistyped or duplicated.
    NeedsAssembly,
}

/// Where the columns of a schema belong.
#[derive(Debug)]
pub(crate) struct ColumnLayout<'a> {
    /// User columns in schema order.
    pub user: Vec<PlSmallStr>,
    /// System columns present under their own name, with their current type.
    pub present: Vec<(&'a SystemColumn, DataType)>,
    /// Join copies of system columns, in schema order.
    pub copies: Vec<(PlSmallStr, &'a SystemColumn)>,
    /// Reserved names that aren't system columns or copies of one.
    pub unknown: Vec<PlSmallStr>,
}

impl<'a> ColumnLayout<'a> {
    pub fn from_schema(schema: &Schema, registry: &'a SystemColumnRegistry, suffix: &str) -> Self {
        let mut layout = ColumnLayout {
            user: Vec::new(),
            present: Vec::new(),
            copies: Vec::new(),
            unknown: Vec::new(),
        };

        for (name, dtype) in schema.iter() {
            if !is_reserved(name) {
                layout.user.push(name.clone());
            } else if let Some(col) = registry.get(name) {
                layout.present.push((col, dtype.clone()));
            } else if let Some(col) = registry.suffixed_origin(name, suffix) {
                layout.copies.push((name.clone(), col));
            } else {
                layout.unknown.push(name.clone());
            }
        }

        layout
    }

    fn present_dtype(&self, name: &str) -> Option<&DataType> {
        self.present
            .iter()
            .find(|(col, _)| col.name == name)
            .map(|(_, dtype)| dtype)
    }

    fn copies_of(&self, name: &str) -> Vec<PlSmallStr> {
        self.copies
            .iter()
            .filter(|(_, col)| col.name == name)
            .map(|(copy, _)| copy.clone())
            .collect()
    }
}

/// Options for a reconciling assembly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblyHint {
    /// Treat existing row identifiers as stale: they feed lineage but new
    /// identifiers are generated. Used when an operation may duplicate rows.
    pub refresh_ids: bool,
}

#[derive(Debug)]
pub struct Assembler<'a> {
    config: &'a FrameConfig,
    registry: &'static SystemColumnRegistry,
}

impl<'a> Assembler<'a> {
    pub fn new(config: &'a FrameConfig) -> Self {
        Assembler {
            config,
            registry: registry(),
        }
    }

    pub(crate) fn layout(&self, schema: &Schema) -> ColumnLayout<'static> {
        ColumnLayout::from_schema(schema, self.registry, &self.config.join_suffix)
    }

    /// Check a schema against the invariants without building anything.
    pub fn verify(&self, schema: &Schema) -> Verification {
        let layout = self.layout(schema);
        if !layout.copies.is_empty() || !layout.unknown.is_empty() {
            return Verification::NeedsAssembly;
        }

        for col in self.registry.system_columns_metadata() {
            match layout.present_dtype(col.name) {
                Some(dtype) if *dtype == col.dtype => (),
                _ => return Verification::NeedsAssembly,
            }
        }

        let expected = self.canonical_order(&layout.user);
        let ordered = schema
            .iter_names()
            .zip(expected.iter())
            .all(|(have, want)| have == want);

        if ordered {
            Verification::Valid
        } else {
            Verification::NeedsReorder
        }
    }

    /// User columns followed by the system columns in registry order.
    fn canonical_order(&self, user: &[PlSmallStr]) -> Vec<PlSmallStr> {
        user.iter()
            .cloned()
            .chain(self.registry.required_columns().iter().map(|n| PlSmallStr::from(*n)))
            .collect()
    }

    fn canonical_projection(&self, user: &[PlSmallStr]) -> Vec<Expr> {
        self.canonical_order(user).into_iter().map(col).collect()
    }

    /// Project the columns into canonical order.
    pub fn reorder(&self, lf: LazyFrame, schema: &Schema) -> LazyFrame {
        let layout = self.layout(schema);
        lf.select(self.canonical_projection(&layout.user))
    }

    /// Verify a frame that claims to already carry its system columns.
    ///
    /// Nothing is generated: a missing or mistyped system column means the
    /// columns were modified outside of the frame API and is an error.
    pub fn check_assembled(&self, mut lf: LazyFrame) -> Result<LazyFrame> {
        let schema = lf.collect_schema()?;
        let layout = self.layout(&schema);

        if let Some(name) = layout.unknown.first() {
            return Err(TableFrameError::UnknownSystemColumn(name.to_string()));
        }
        if let Some((name, _)) = layout.copies.first() {
            return Err(TableFrameError::UnknownSystemColumn(name.to_string()));
        }

        for col in self.registry.system_columns_metadata() {
            match layout.present_dtype(col.name) {
                Some(dtype) if *dtype == col.dtype => (),
                Some(dtype) => {
                    return Err(TableFrameError::SystemColumnDtype {
                        name: col.name.to_string(),
                        expected: col.dtype.clone(),
                        found: dtype.clone(),
                    });
                }
                None => return Err(TableFrameError::MissingSystemColumn(col.name.to_string())),
            }
        }

        match self.verify(&schema) {
            Verification::Valid => Ok(lf),
            Verification::NeedsReorder => {
                trace!("reordering columns of assembled frame");
                Ok(lf.select(self.canonical_projection(&layout.user)))
            }
            Verification::NeedsAssembly => Err(internal!(
                "verified frame still requires assembly: {:?}",
                schema.iter_names().collect::<Vec<_>>()
            )),
        }
    }

    /// Reconcile system columns, generating, merging and defaulting as
    /// declared by the registry.
    pub fn assemble(
        &self,
        mut lf: LazyFrame,
        properties: Option<&Properties>,
        hint: AssemblyHint,
    ) -> Result<LazyFrame> {
        let schema = lf.collect_schema()?;

        if schema.is_empty() {
            trace!("assembling empty frame");
            let df = DataFrame::empty_with_schema(&self.registry.system_schema());
            return Ok(df.lazy());
        }

        let layout = self.layout(&schema);
        if let Some(name) = layout.unknown.first() {
            return Err(TableFrameError::UnknownSystemColumn(name.to_string()));
        }

        let seed = RowIdSeed::new(self.config.row_id_format);
        let id_col = self
            .registry
            .system_columns_metadata()
            .iter()
            .find(|c| c.generator == Generator::RowId)
            .ok_or_else(|| internal!("registry has no row id column"))?;

        // Expressions evaluated against the input columns.
        let mut first_stage = Vec::new();
        // Expressions that read columns generated by the first stage.
        let mut second_stage = Vec::new();
        let mut generated = Vec::new();
        let mut merged = Vec::new();

        for sys in self.registry.system_columns_metadata() {
            let copies = layout.copies_of(sys.name);
            let present = layout.present_dtype(sys.name);

            match (sys.inception, sys.generator) {
                (Inception::Always, Generator::RowId) => {
                    let keep = present == Some(&sys.dtype)
                        && copies.is_empty()
                        && !hint.refresh_ids;
                    if !keep {
                        first_stage.push(row_id_expr(sys.name, seed));
                        generated.push(sys.name);
                    }
                }
                (Inception::Regenerate, Generator::Lineage) => {
                    let mut sources = Vec::new();
                    if present_id(&layout, id_col) {
                        sources.push(PlSmallStr::from(id_col.name));
                    }
                    sources.extend(layout.copies_of(id_col.name));

                    if sources.is_empty() {
                        // No prior identifiers, the row is its own source.
                        second_stage.push(lineage_expr(sys.name, &[id_col.name.into()])?);
                    } else {
                        first_stage.push(lineage_expr(sys.name, &sources)?);
                    }
                    generated.push(sys.name);
                }
                (Inception::Preserve, Generator::Virtual(virt)) => {
                    let expr = match (present, copies.is_empty()) {
                        (Some(dtype), true) if *dtype == sys.dtype => None,
                        (Some(dtype), true) => {
                            warn!(
                                column = sys.name,
                                %dtype,
                                expected = %sys.dtype,
                                "casting system column"
                            );
                            Some(col(sys.name).cast(sys.dtype.clone()))
                        }
                        (_, false) => {
                            merged.push(sys.name);
                            Some(merge_copies(sys, &layout, id_col, &copies))
                        }
                        (None, true) => {
                            generated.push(sys.name);
                            Some(match properties {
                                Some(props) => props.virtual_value(virt),
                                None => null_virtual_value(virt),
                            })
                        }
                    };
                    if let Some(expr) = expr {
                        first_stage.push(expr.alias(sys.name));
                    }
                }
                (inception, generator) => {
                    return Err(internal!(
                        "unsupported declaration for '{}': {inception:?} with {generator:?}",
                        sys.name
                    ));
                }
            }
        }

        debug!(
            user_columns = layout.user.len(),
            ?generated,
            ?merged,
            copies = layout.copies.len(),
            "assembling system columns"
        );

        if !first_stage.is_empty() {
            lf = lf.with_columns(first_stage);
        }
        if !second_stage.is_empty() {
            lf = lf.with_columns(second_stage);
        }

        Ok(lf.select(self.canonical_projection(&layout.user)))
    }
}

fn present_id(layout: &ColumnLayout<'_>, id_col: &SystemColumn) -> bool {
    layout.present_dtype(id_col.name).is_some()
}

/// Merge a system column with its join copies.
///
/// Every row takes the value of the first side it has, left side first. A
/// side is present when its row identifier is not null, so a null value on
/// the left is kept for matched rows.
fn merge_copies(
    sys: &SystemColumn,
    layout: &ColumnLayout<'_>,
    id_col: &SystemColumn,
    copies: &[PlSmallStr],
) -> Expr {
    let mut sides: Vec<(PlSmallStr, Option<PlSmallStr>)> = Vec::with_capacity(copies.len() + 1);
    if layout.present_dtype(sys.name).is_some() {
        let side_id = layout
            .present_dtype(id_col.name)
            .map(|_| PlSmallStr::from(id_col.name));
        sides.push((sys.name.into(), side_id));
    }
    for copy in copies {
        let side_id = copy
            .strip_prefix(sys.name)
            .map(|suffix| format!("{}{suffix}", id_col.name))
            .filter(|id| layout.copies.iter().any(|(name, _)| name.as_str() == id))
            .map(PlSmallStr::from);
        sides.push((copy.clone(), side_id));
    }

    let null = lit(NULL).cast(sys.dtype.clone());
    match sys.merge {
        MergePolicy::Coalesce => sides.into_iter().rev().fold(null, |acc, (name, side_id)| {
            let value = col(name).cast(sys.dtype.clone());
            let present = match side_id {
                Some(id) => col(id).is_not_null(),
                None => value.clone().is_not_null(),
            };
            when(present).then(value).otherwise(acc)
        }),
        MergePolicy::Regenerate => sides
            .into_iter()
            .next()
            .map(|(name, _)| col(name).cast(sys.dtype.clone()))
            .unwrap_or(null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{
        EXECUTION_COLUMN,
        ID_COLUMN,
        SRC_COLUMN,
        TIMESTAMP_COLUMN,
        required_columns,
    };

    fn assemble_df(df: DataFrame, props: Option<&Properties>) -> DataFrame {
        let conf = FrameConfig::default();
        Assembler::new(&conf)
            .assemble(df.lazy(), props, AssemblyHint::default())
            .unwrap()
            .collect()
            .unwrap()
    }

    fn names(df: &DataFrame) -> Vec<String> {
        df.get_column_names()
            .into_iter()
            .map(|n| n.to_string())
            .collect()
    }

    fn expected_names(user: &[&str]) -> Vec<String> {
        user.iter()
            .chain(required_columns())
            .map(|n| n.to_string())
            .collect()
    }

    #[test]
    fn assemble_raw_frame() {
        let df = df!("b" => [1, 2, 3], "a" => ["x", "y", "z"]).unwrap();
        let out = assemble_df(df, None);

        assert_eq!(expected_names(&["b", "a"]), names(&out));
        let ids = out.column(ID_COLUMN).unwrap().str().unwrap();
        assert_eq!(0, ids.null_count());
        assert_eq!(
            3,
            ids.into_iter().collect::<std::collections::HashSet<_>>().len()
        );
        assert_eq!(
            &DataType::List(Box::new(DataType::String)),
            out.column(SRC_COLUMN).unwrap().dtype()
        );
        assert_eq!(3, out.column(EXECUTION_COLUMN).unwrap().null_count());
    }

    #[test]
    fn assemble_is_idempotent() {
        let props = Properties::builder()
            .execution("e1")
            .timestamp(1_000_i64)
            .unwrap()
            .build()
            .unwrap();
        let df = df!("a" => [1, 2]).unwrap();
        let once = assemble_df(df, Some(&props));
        let twice = assemble_df(once.clone(), None);

        assert_eq!(names(&once), names(&twice));
        for name in [ID_COLUMN, EXECUTION_COLUMN, TIMESTAMP_COLUMN] {
            assert!(
                once.column(name)
                    .unwrap()
                    .as_materialized_series()
                    .equals_missing(twice.column(name).unwrap().as_materialized_series()),
                "column {name} changed"
            );
        }
    }

    #[test]
    fn merge_join_copies() {
        let conf = FrameConfig::default();
        let left = df!(
            "a" => [1, 2, 3],
            ID_COLUMN => [Some("l1"), Some("l2"), None],
            EXECUTION_COLUMN => [Some("left"), None, None],
        )
        .unwrap();
        let reg = registry();
        let right_id = reg.get(ID_COLUMN).unwrap().suffixed(&conf.join_suffix);
        let right_exec = reg.get(EXECUTION_COLUMN).unwrap().suffixed(&conf.join_suffix);
        let right = df!(
            right_id.as_str() => ["r1", "r2", "r3"],
            right_exec.as_str() => ["right", "right", "right"],
        )
        .unwrap();
        let joined = left.hstack(right.get_columns()).unwrap();

        let out = Assembler::new(&conf)
            .assemble(joined.lazy(), None, AssemblyHint::default())
            .unwrap()
            .collect()
            .unwrap();

        assert_eq!(expected_names(&["a"]), names(&out));

        let exec: Vec<_> = out
            .column(EXECUTION_COLUMN)
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .map(|v| v.map(|s| s.to_string()))
            .collect();
        // Rows with a left side keep the left value, even when it's null.
        assert_eq!(
            vec![Some("left".to_string()), None, Some("right".to_string())],
            exec
        );

        let ids = out.column(ID_COLUMN).unwrap().str().unwrap();
        assert_ne!(Some("l1"), ids.get(0));

        let lineage = out
            .column(SRC_COLUMN)
            .unwrap()
            .list()
            .unwrap()
            .get_as_series(0)
            .unwrap();
        let lineage: Vec<_> = lineage
            .str()
            .unwrap()
            .into_iter()
            .map(|v| v.unwrap().to_string())
            .collect();
        assert_eq!(vec!["l1".to_string(), "r1".to_string()], lineage);
    }

    #[test]
    fn verify_detects_order_and_missing() {
        let conf = FrameConfig::default();
        let assembler = Assembler::new(&conf);

        let df = assemble_df(df!("a" => [1]).unwrap(), None);
        assert_eq!(Verification::Valid, assembler.verify(&df.schema()));

        let with_new = df
            .clone()
            .lazy()
            .with_column(lit(1).alias("b"))
            .collect()
            .unwrap();
        assert_eq!(Verification::NeedsReorder, assembler.verify(&with_new.schema()));

        let dropped = df.drop(SRC_COLUMN).unwrap();
        assert_eq!(Verification::NeedsAssembly, assembler.verify(&dropped.schema()));
    }

    #[test]
    fn check_assembled_rejects_tampering() {
        let conf = FrameConfig::default();
        let assembler = Assembler::new(&conf);

        let df = assemble_df(df!("a" => [1]).unwrap(), None);
        let tampered = df.drop(ID_COLUMN).unwrap();

        let Err(err) = assembler.check_assembled(tampered.lazy()) else {
            panic!("tampered frame passed verification");
        };
        assert!(matches!(err, TableFrameError::MissingSystemColumn(name) if name == ID_COLUMN));
    }

    #[test]
    fn check_assembled_reorders() {
        let conf = FrameConfig::default();
        let assembler = Assembler::new(&conf);

        let df = assemble_df(df!("a" => [1]).unwrap(), None);
        let mut reversed: Vec<_> = df.get_column_names_owned();
        reversed.reverse();
        let shuffled = df.select(reversed).unwrap();

        let out = assembler
            .check_assembled(shuffled.lazy())
            .unwrap()
            .collect()
            .unwrap();
        assert_eq!(expected_names(&["a"]), names(&out));
    }

    #[test]
    fn empty_frame_gets_system_schema() {
        let out = assemble_df(DataFrame::empty(), None);
        assert_eq!(expected_names(&[]), names(&out));
        assert_eq!(0, out.height());
    }
}
