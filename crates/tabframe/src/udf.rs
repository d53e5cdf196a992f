use polars::prelude::*;
use tracing::debug;

use crate::errors::{Result, TableFrameError};
use crate::frame::{Reassembly, TableFrame};
use crate::schema::SchemaDecl;
use crate::selectors::Selector;

impl TableFrame {
    /// Apply a function to the selected user columns and append its output
    /// as new columns named and typed by `output`.
    ///
    /// The frame is materialized. The function must return one row per input
    /// row and one column per declared output column.
    pub fn udf<F>(&self, on: &Selector, output: &SchemaDecl, f: F) -> Result<TableFrame>
    where
        F: FnOnce(DataFrame) -> PolarsResult<DataFrame>,
    {
        let inputs = self.resolve(on)?;
        let full = self.collect_all()?;
        let input = full.select(inputs)?;

        let result = f(input)?;
        if result.height() != full.height() {
            return Err(TableFrameError::UdfOutputMismatch(format!(
                "has {} rows, input has {}",
                result.height(),
                full.height()
            )));
        }
        if result.width() != output.len() {
            return Err(TableFrameError::UdfOutputMismatch(format!(
                "has {} columns, declared schema has {}",
                result.width(),
                output.len()
            )));
        }

        let columns = result
            .get_columns()
            .iter()
            .zip(output.iter())
            .map(|(column, decl)| {
                let mut column = column.cast(&decl.dtype)?;
                column.rename(decl.name.as_str().into());
                Ok(column)
            })
            .collect::<PolarsResult<Vec<_>>>()?;

        debug!(columns = ?output.names(), rows = full.height(), "applied user function");

        let combined = full.hstack(&columns)?;
        self.derive(combined.lazy(), Reassembly::Verify)
    }
}
