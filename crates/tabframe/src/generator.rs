//! Generators for system column values.

use polars::prelude::*;
use uuid::Uuid;

use crate::config::RowIdFormat;

/// Number of low bits of an identifier holding the row index.
const ROW_INDEX_BITS: u32 = 40;
const ROW_INDEX_MASK: u128 = (1 << ROW_INDEX_BITS) - 1;

/// Base for a batch of row identifiers.
///
/// A seed is a UUIDv7 taken when the batch is planned. Identifiers for the
/// batch replace the low bits of the seed with the row index, so they sort by
/// creation time first and by row position second. The same seed always
/// yields the same identifier for a row index, which keeps identifiers stable
/// when a lazy plan is materialized more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowIdSeed {
    base: u128,
    format: RowIdFormat,
}

impl RowIdSeed {
    pub fn new(format: RowIdFormat) -> Self {
        let base = Uuid::now_v7().as_u128() & !ROW_INDEX_MASK;
        RowIdSeed { base, format }
    }

    pub fn row_id(&self, index: u64) -> String {
        let id = Uuid::from_u128(self.base | (u128::from(index) & ROW_INDEX_MASK));
        match self.format {
            RowIdFormat::Hyphenated => id.hyphenated().to_string(),
            RowIdFormat::Simple => id.simple().to_string(),
        }
    }

    /// Identifiers for the given row indices.
    pub fn row_ids(&self, indices: &Int64Chunked) -> StringChunked {
        indices
            .into_iter()
            .map(|idx| idx.map(|idx| self.row_id(idx as u64)))
            .collect()
    }
}

/// Generate a single row identifier.
pub fn next_row_id(format: RowIdFormat) -> String {
    RowIdSeed::new(format).row_id(0)
}

/// Generate `n` row identifiers in ascending order.
pub fn row_ids(n: usize, format: RowIdFormat) -> StringChunked {
    let seed = RowIdSeed::new(format);
    (0..n as u64).map(|idx| Some(seed.row_id(idx))).collect()
}

/// Expression producing an identifier for every row of the frame it's
/// evaluated on.
pub fn row_id_expr(name: &str, seed: RowIdSeed) -> Expr {
    int_range(lit(0), len(), 1, DataType::Int64)
        .map(
            move |c: Column| {
                let ids = seed.row_ids(c.i64()?);
                Ok(Some(Column::from(ids.into_series())))
            },
            GetOutput::from_type(DataType::String),
        )
        .alias(name)
}

/// Expression collecting the values of the given identifier columns into a
/// list per row, dropping nulls.
///
/// Columns may be scalar identifiers or lists of identifiers, lists are
/// flattened into the result.
pub fn lineage_expr(name: &str, sources: &[PlSmallStr]) -> PolarsResult<Expr> {
    let exprs: Vec<Expr> = sources.iter().map(|s| col(s.clone())).collect();
    let expr = concat_list(exprs)?
        .cast(DataType::List(Box::new(DataType::String)))
        .list()
        .drop_nulls()
        .alias(name);
    Ok(expr)
}
