use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use derive_builder::Builder;
use polars::prelude::{DataType, Expr, NULL, lit};

use crate::errors::{Result, TableFrameError};
use crate::registry::{VirtualColumn, timestamp_dtype};

/// Frame level provenance values.
///
/// When a frame is built with properties, every row gets the values as
/// virtual columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Builder)]
#[builder(default, derive(Debug))]
pub struct Properties {
    #[builder(setter(into, strip_option))]
    execution: Option<String>,
    #[builder(setter(into, strip_option))]
    transaction: Option<String>,
    #[builder(setter(into, strip_option))]
    version: Option<String>,
    #[builder(setter(custom))]
    timestamp: Option<DateTime<Utc>>,
}

impl PropertiesBuilder {
    /// Set the timestamp from a datetime or from epoch milliseconds. The value
    /// is normalized to UTC.
    pub fn timestamp(&mut self, value: impl IntoUtcTimestamp) -> Result<&mut Self> {
        self.timestamp = Some(Some(value.into_utc()?));
        Ok(self)
    }
}

impl From<PropertiesBuilderError> for TableFrameError {
    fn from(value: PropertiesBuilderError) -> Self {
        TableFrameError::IncompleteProperties(value.to_string())
    }
}

impl Properties {
    pub fn builder() -> PropertiesBuilder {
        PropertiesBuilder::default()
    }

    pub fn execution(&self) -> Option<&str> {
        self.execution.as_deref()
    }

    pub fn transaction(&self) -> Option<&str> {
        self.transaction.as_deref()
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    /// Literal expression to inject for a virtual column. Unset values are
    /// typed nulls.
    pub fn virtual_value(&self, column: VirtualColumn) -> Expr {
        match column {
            VirtualColumn::Execution => string_lit(self.execution()),
            VirtualColumn::Transaction => string_lit(self.transaction()),
            VirtualColumn::Version => string_lit(self.version()),
            VirtualColumn::Timestamp => match self.timestamp {
                Some(ts) => lit(ts.timestamp_millis()).cast(timestamp_dtype()),
                None => lit(NULL).cast(timestamp_dtype()),
            },
        }
    }
}

/// Literal used for a virtual column when a frame has no properties.
pub fn null_virtual_value(column: VirtualColumn) -> Expr {
    match column {
        VirtualColumn::Timestamp => lit(NULL).cast(timestamp_dtype()),
        _ => lit(NULL).cast(DataType::String),
    }
}

fn string_lit(value: Option<&str>) -> Expr {
    match value {
        Some(v) => lit(v.to_string()),
        None => lit(NULL).cast(DataType::String),
    }
}

/// Values accepted as a properties timestamp.
pub trait IntoUtcTimestamp {
    fn into_utc(self) -> Result<DateTime<Utc>>;
}

impl<Tz: TimeZone> IntoUtcTimestamp for DateTime<Tz> {
    fn into_utc(self) -> Result<DateTime<Utc>> {
        Ok(self.with_timezone(&Utc))
    }
}

/// Naive datetimes are taken to be UTC.
impl IntoUtcTimestamp for NaiveDateTime {
    fn into_utc(self) -> Result<DateTime<Utc>> {
        Ok(self.and_utc())
    }
}

/// Epoch milliseconds.
impl IntoUtcTimestamp for i64 {
    fn into_utc(self) -> Result<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self).ok_or(TableFrameError::InvalidTimestamp(self))
    }
}
