//! Row extraction into plain values.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeDelta, Utc};
use indexmap::IndexMap;
use polars::prelude::*;

use crate::errors::Result;
use crate::frame::TableFrame;
use crate::ops::idx_size;

/// A single cell, detached from the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    Binary(Vec<u8>),
    Date(NaiveDate),
    Datetime(DateTime<Utc>),
    Duration(TimeDelta),
    Time(NaiveTime),
    Decimal { value: i128, scale: usize },
    List(Vec<Value>),
    /// Values without a plain representation, rendered by the engine.
    Other(String),
}

const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

impl From<AnyValue<'_>> for Value {
    fn from(value: AnyValue<'_>) -> Self {
        match value {
            AnyValue::Null => Value::Null,
            AnyValue::Boolean(v) => Value::Boolean(v),
            AnyValue::Int8(v) => Value::Int(v.into()),
            AnyValue::Int16(v) => Value::Int(v.into()),
            AnyValue::Int32(v) => Value::Int(v.into()),
            AnyValue::Int64(v) => Value::Int(v),
            AnyValue::UInt8(v) => Value::UInt(v.into()),
            AnyValue::UInt16(v) => Value::UInt(v.into()),
            AnyValue::UInt32(v) => Value::UInt(v.into()),
            AnyValue::UInt64(v) => Value::UInt(v),
            AnyValue::Float32(v) => Value::Float(v.into()),
            AnyValue::Float64(v) => Value::Float(v),
            AnyValue::String(v) => Value::String(v.to_string()),
            AnyValue::StringOwned(v) => Value::String(v.to_string()),
            AnyValue::Binary(v) => Value::Binary(v.to_vec()),
            AnyValue::BinaryOwned(v) => Value::Binary(v),
            AnyValue::Date(days) => days
                .checked_add(UNIX_EPOCH_DAYS_FROM_CE)
                .and_then(NaiveDate::from_num_days_from_ce_opt)
                .map(Value::Date)
                .unwrap_or_else(|| Value::Other(days.to_string())),
            AnyValue::Datetime(v, unit, _) | AnyValue::DatetimeOwned(v, unit, _) => {
                datetime_value(v, unit)
            }
            AnyValue::Duration(v, unit) => match unit {
                TimeUnit::Milliseconds => TimeDelta::try_milliseconds(v),
                TimeUnit::Microseconds => Some(TimeDelta::microseconds(v)),
                TimeUnit::Nanoseconds => Some(TimeDelta::nanoseconds(v)),
            }
            .map(Value::Duration)
            .unwrap_or_else(|| Value::Other(v.to_string())),
            AnyValue::Time(nanos) => {
                let secs = (nanos / 1_000_000_000) as u32;
                let nano = (nanos % 1_000_000_000) as u32;
                NaiveTime::from_num_seconds_from_midnight_opt(secs, nano)
                    .map(Value::Time)
                    .unwrap_or_else(|| Value::Other(nanos.to_string()))
            }
            AnyValue::Decimal(value, scale) => Value::Decimal { value, scale },
            AnyValue::List(series) => Value::List(
                series
                    .rechunk()
                    .iter()
                    .map(Value::from)
                    .collect(),
            ),
            other => match other.get_str() {
                Some(s) => Value::String(s.to_string()),
                None => Value::Other(other.to_string()),
            },
        }
    }
}

fn datetime_value(v: i64, unit: TimeUnit) -> Value {
    let dt = match unit {
        TimeUnit::Milliseconds => DateTime::from_timestamp_millis(v),
        TimeUnit::Microseconds => DateTime::from_timestamp_micros(v),
        TimeUnit::Nanoseconds => Some(DateTime::from_timestamp_nanos(v)),
    };
    dt.map(Value::Datetime)
        .unwrap_or_else(|| Value::Other(v.to_string()))
}

/// A row of user values.
#[derive(Debug, Clone, PartialEq)]
pub enum Row {
    Tuple(Vec<Value>),
    Named(IndexMap<String, Value>),
}

impl Row {
    pub fn len(&self) -> usize {
        match self {
            Row::Tuple(values) => values.len(),
            Row::Named(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value by column name. Tuples have no names.
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            Row::Tuple(_) => None,
            Row::Named(values) => values.get(name),
        }
    }
}

fn named_row_at(df: &DataFrame, index: usize) -> Result<IndexMap<String, Value>> {
    df.get_columns()
        .iter()
        .map(|c| Ok((c.name().to_string(), Value::from(c.get(index)?))))
        .collect()
}

fn row_at(df: &DataFrame, index: usize, named: bool) -> Result<Row> {
    if named {
        return Ok(Row::Named(named_row_at(df, index)?));
    }
    let values = df
        .get_columns()
        .iter()
        .map(|c| Ok(Value::from(c.get(index)?)))
        .collect::<Result<Vec<_>>>()?;
    Ok(Row::Tuple(values))
}

impl TableFrame {
    /// First row of user values, none if the frame is empty.
    pub fn first_row(&self, named: bool) -> Result<Option<Row>> {
        let df = self.user_lf()?.first().collect()?;
        if df.height() == 0 {
            return Ok(None);
        }
        Ok(Some(row_at(&df, 0, named)?))
    }

    pub fn last_row(&self, named: bool) -> Result<Option<Row>> {
        let df = self.user_lf()?.last().collect()?;
        if df.height() == 0 {
            return Ok(None);
        }
        Ok(Some(row_at(&df, 0, named)?))
    }

    /// Up to `length` rows starting at `offset`, each keyed by column name.
    ///
    /// A frame without user columns yields no rows, whatever its height.
    pub fn extract_as_rows(
        &self,
        offset: usize,
        length: usize,
    ) -> Result<Vec<IndexMap<String, Value>>> {
        let df = self.slice_user(offset, length)?;
        (0..df.height()).map(|i| named_row_at(&df, i)).collect()
    }

    /// Up to `length` rows starting at `offset`, as one list per column.
    ///
    /// A frame without user columns yields an empty map.
    pub fn extract_as_columns(
        &self,
        offset: usize,
        length: usize,
    ) -> Result<IndexMap<String, Vec<Value>>> {
        let df = self.slice_user(offset, length)?;
        df.get_columns()
            .iter()
            .map(|c| {
                let values = (0..df.height())
                    .map(|i| Ok(Value::from(c.get(i)?)))
                    .collect::<Result<Vec<_>>>()?;
                Ok((c.name().to_string(), values))
            })
            .collect()
    }

    fn slice_user(&self, offset: usize, length: usize) -> Result<DataFrame> {
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);
        Ok(self.user_lf()?.slice(offset, idx_size(length)).collect()?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::properties::Properties;

    fn frame() -> TableFrame {
        let df = df!(
            "n" => [1_i64, 2, 3],
            "s" => [Some("a"), None, Some("c")],
            "f" => [0.5, 1.5, 2.5],
        )
        .unwrap();
        TableFrame::from_polars(df).unwrap()
    }

    #[test]
    fn first_and_last() {
        let tf = frame();
        assert_eq!(
            Some(Row::Tuple(vec![
                Value::Int(1),
                Value::String("a".into()),
                Value::Float(0.5)
            ])),
            tf.first_row(false).unwrap()
        );

        let last = tf.last_row(true).unwrap().unwrap();
        assert_eq!(3, last.len());
        assert_eq!(Some(&Value::Int(3)), last.get("n"));
        assert_eq!(None, last.get("$td.id"));
    }

    #[test]
    fn empty_frame_has_no_rows() {
        let tf = frame().clear().unwrap();
        assert_eq!(None, tf.first_row(true).unwrap());
        assert_eq!(None, tf.last_row(false).unwrap());
    }

    #[test]
    fn extract_rows_and_columns() {
        let tf = frame();
        let rows = tf.extract_as_rows(1, 5).unwrap();
        assert_eq!(2, rows.len());
        assert_eq!(Some(&Value::Null), rows[0].get("s"));

        let cols = tf.extract_as_columns(0, 2).unwrap();
        assert_eq!(
            vec!["n", "s", "f"],
            cols.keys().map(|k| k.as_str()).collect::<Vec<_>>()
        );
        assert_eq!(vec![Value::Float(0.5), Value::Float(1.5)], cols["f"]);
    }

    #[test]
    fn out_of_range_is_empty() {
        let tf = frame();
        assert!(tf.extract_as_rows(10, 2).unwrap().is_empty());
        let cols = tf.extract_as_columns(10, 2).unwrap();
        assert!(cols.values().all(|v| v.is_empty()));
    }

    #[test]
    fn no_user_columns_no_rows() {
        let tf = frame().select(Vec::<Expr>::new()).unwrap();
        assert_eq!(3, tf.height().unwrap());
        assert!(tf.extract_as_rows(0, 3).unwrap().is_empty());
        assert!(tf.extract_as_columns(0, 3).unwrap().is_empty());
    }

    #[test]
    fn temporal_values() {
        assert_eq!(
            Value::Date(NaiveDate::from_ymd_opt(1970, 1, 2).unwrap()),
            Value::from(AnyValue::Date(1))
        );
        assert_eq!(
            Value::Datetime(Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 1).unwrap()),
            Value::from(AnyValue::Datetime(1_000, TimeUnit::Milliseconds, None))
        );
        assert_eq!(
            Value::Duration(TimeDelta::microseconds(5)),
            Value::from(AnyValue::Duration(5, TimeUnit::Microseconds))
        );
    }

    #[test]
    fn system_values_stay_hidden() {
        let props = Properties::builder().execution("e1").build().unwrap();
        let tf = TableFrame::from_polars_with_properties(df!("a" => [1]).unwrap(), props).unwrap();
        let row = tf.first_row(true).unwrap().unwrap();
        assert_eq!(1, row.len());
    }
}
