use polars::prelude::*;
use tracing::trace;

use crate::assembler::AssemblyHint;
use crate::errors::{Result, TableFrameError};
use crate::frame::{Reassembly, TableFrame};
use crate::registry::is_reserved;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinHow {
    Inner,
    Left,
    Right,
    /// Full outer join, key columns are coalesced.
    Full,
    /// Left rows with a match, left columns only.
    Semi,
    /// Left rows without a match, left columns only.
    Anti,
}

impl JoinHow {
    fn join_type(&self) -> JoinType {
        match self {
            JoinHow::Inner => JoinType::Inner,
            JoinHow::Left => JoinType::Left,
            JoinHow::Right => JoinType::Right,
            JoinHow::Full => JoinType::Full,
            JoinHow::Semi => JoinType::Semi,
            JoinHow::Anti => JoinType::Anti,
        }
    }

    /// Only left rows and columns come out, system columns untouched.
    fn is_filtering(&self) -> bool {
        matches!(self, JoinHow::Semi | JoinHow::Anti)
    }
}

fn key_exprs(frame: &TableFrame, keys: &[&str]) -> Result<Vec<Expr>> {
    let schema = frame.schema_all()?;
    keys.iter()
        .map(|key| {
            if is_reserved(key) {
                return Err(TableFrameError::ReservedColumnInInput(key.to_string()));
            }
            if !schema.contains(key) {
                return Err(TableFrameError::ColumnNotFound(key.to_string()));
            }
            Ok(col(*key))
        })
        .collect()
}

impl TableFrame {
    /// Join on columns with the same name on both sides.
    pub fn join(&self, other: &TableFrame, on: &[&str], how: JoinHow) -> Result<TableFrame> {
        self.join_on(other, on, on, how)
    }

    /// Join on differently named key columns.
    ///
    /// System columns of the right side are merged into the left side's: row
    /// identifiers are regenerated with both sides in the lineage, virtual
    /// columns keep the left value when there is one.
    pub fn join_on(
        &self,
        other: &TableFrame,
        left_on: &[&str],
        right_on: &[&str],
        how: JoinHow,
    ) -> Result<TableFrame> {
        let left_keys = key_exprs(self, left_on)?;
        let right_keys = key_exprs(other, right_on)?;

        let mut args = JoinArgs::new(how.join_type())
            .with_suffix(Some(self.config.join_suffix.as_str().into()));
        if how == JoinHow::Full {
            args = args.with_coalesce(JoinCoalesce::CoalesceColumns);
        }

        trace!(?how, left_on = ?left_on, right_on = ?right_on, "joining frames");

        let joined = self
            .lf
            .clone()
            .join(other.lf.clone(), left_keys, right_keys, args);

        let reassembly = if how.is_filtering() {
            Reassembly::Verify
        } else {
            Reassembly::Full(AssemblyHint::default())
        };
        self.derive(joined, reassembly)
    }

    /// Cartesian product of both frames.
    pub fn cross_join(&self, other: &TableFrame) -> Result<TableFrame> {
        let args = JoinArgs::new(JoinType::Cross)
            .with_suffix(Some(self.config.join_suffix.as_str().into()));

        let joined = self.lf.clone().join(
            other.lf.clone(),
            Vec::<Expr>::new(),
            Vec::<Expr>::new(),
            args,
        );
        self.derive(joined, Reassembly::Full(AssemblyHint::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;
    use crate::frame::ColumnScope;
    use crate::properties::Properties;
    use crate::registry::{EXECUTION_COLUMN, ID_COLUMN, SRC_COLUMN, required_columns};

    fn left() -> TableFrame {
        let props = Properties::builder().execution("left").build().unwrap();
        let df = df!("k" => [1, 2, 3], "l" => ["a", "b", "c"]).unwrap();
        TableFrame::from_polars_with_properties(df, props).unwrap()
    }

    fn right() -> TableFrame {
        let props = Properties::builder().execution("right").build().unwrap();
        let df = df!("k" => [2, 3, 4], "r" => [20.0, 30.0, 40.0]).unwrap();
        TableFrame::from_polars_with_properties(df, props).unwrap()
    }

    fn expected(user: &[&str]) -> Vec<String> {
        user.iter()
            .chain(required_columns())
            .map(|n| n.to_string())
            .collect()
    }

    #[test]
    fn join_layouts() {
        struct TestCase {
            how: JoinHow,
            columns: Vec<&'static str>,
            rows: usize,
        }

        let cases = [
            TestCase {
                how: JoinHow::Inner,
                columns: vec!["k", "l", "r"],
                rows: 2,
            },
            TestCase {
                how: JoinHow::Left,
                columns: vec!["k", "l", "r"],
                rows: 3,
            },
            TestCase {
                how: JoinHow::Full,
                columns: vec!["k", "l", "r"],
                rows: 4,
            },
            TestCase {
                how: JoinHow::Semi,
                columns: vec!["k", "l"],
                rows: 2,
            },
            TestCase {
                how: JoinHow::Anti,
                columns: vec!["k", "l"],
                rows: 1,
            },
        ];

        for case in cases {
            let joined = left().join(&right(), &["k"], case.how).unwrap();
            assert_eq!(
                expected(&case.columns),
                joined.columns(ColumnScope::All).unwrap(),
                "{:?}",
                case.how
            );
            assert_eq!(case.rows, joined.height().unwrap(), "{:?}", case.how);
        }
    }

    #[test]
    fn full_join_coalesces_provenance() {
        let joined = left()
            .join(&right(), &["k"], JoinHow::Full)
            .unwrap()
            .sort(vec![col("k")], SortMultipleOptions::default())
            .unwrap();
        let df = joined.collect_all().unwrap();

        let exec: Vec<_> = df
            .column(EXECUTION_COLUMN)
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .map(|v| v.unwrap().to_string())
            .collect();
        assert_eq!(vec!["left", "left", "left", "right"], exec);

        let lineage = df.column(SRC_COLUMN).unwrap().list().unwrap();
        let sizes: Vec<_> = (0..4)
            .map(|i| lineage.get_as_series(i).map(|s| s.len()))
            .collect();
        assert_eq!(vec![Some(1), Some(2), Some(2), Some(1)], sizes);
    }

    #[test]
    fn inner_join_regenerates_ids() {
        let l = left();
        let left_ids = l.collect_all().unwrap();
        let joined = l.join(&right(), &["k"], JoinHow::Inner).unwrap();
        let df = joined.collect_all().unwrap();

        let left_ids = left_ids.column(ID_COLUMN).unwrap().str().unwrap();
        let ids = df.column(ID_COLUMN).unwrap().str().unwrap();
        for id in ids.into_iter() {
            assert!(left_ids.into_iter().all(|l| l != id));
        }
    }

    #[test]
    fn semi_join_keeps_ids() {
        let l = left();
        let left_ids = l.collect_all().unwrap();
        let joined = l.join(&right(), &["k"], JoinHow::Semi).unwrap();
        let df = joined.collect_all().unwrap();

        let left_ids = left_ids.column(ID_COLUMN).unwrap().str().unwrap();
        let ids = df.column(ID_COLUMN).unwrap().str().unwrap();
        assert_eq!(left_ids.get(1), ids.get(0));
    }

    #[test]
    fn cross_join_sizes() {
        let joined = left().cross_join(&right()).unwrap();
        assert_eq!(9, joined.height().unwrap());
        assert_eq!(
            expected(&["k", "l", "k_right", "r"]),
            joined.columns(ColumnScope::All).unwrap()
        );
    }

    #[test]
    fn join_key_errors() {
        let err = left().join(&right(), &["missing"], JoinHow::Inner).unwrap_err();
        assert_eq!(ErrorCode::ColumnNotFound, err.code());

        let err = left().join(&right(), &[ID_COLUMN], JoinHow::Inner).unwrap_err();
        assert_eq!(ErrorCode::ReservedColumnInInput, err.code());
    }
}
