use std::fmt;

use polars::prelude::{DataType, PolarsError};

/// Stable code attached to every error.
///
/// Codes never change meaning once published. The hundreds digit groups the
/// codes by the component raising them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Internal,
    Engine,
    UnsupportedInput,
    ReservedColumnInInput,
    RenameSystemColumn,
    RenameToReserved,
    MissingSystemColumn,
    SystemColumnDtype,
    UnknownSystemColumn,
    WriteReservedColumn,
    EmptySchema,
    MissingSchemaName,
    MissingSchemaDtype,
    SchemaArityMismatch,
    SchemaIndexOutOfRange,
    ColumnSetMismatch,
    IncompatibleDtypes,
    EmptyConcat,
    ColumnNotFound,
    ColumnIndexOutOfRange,
    InvalidPattern,
    InvalidTimestamp,
    IncompleteProperties,
    UnknownSetting,
    InvalidSetting,
    UdfOutputMismatch,
}

impl ErrorCode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Internal => "TF-000",
            ErrorCode::Engine => "TF-001",
            ErrorCode::UnsupportedInput => "TF-101",
            ErrorCode::ReservedColumnInInput => "TF-102",
            ErrorCode::RenameSystemColumn => "TF-201",
            ErrorCode::RenameToReserved => "TF-202",
            ErrorCode::MissingSystemColumn => "TF-203",
            ErrorCode::SystemColumnDtype => "TF-204",
            ErrorCode::UnknownSystemColumn => "TF-205",
            ErrorCode::WriteReservedColumn => "TF-206",
            ErrorCode::EmptySchema => "TF-301",
            ErrorCode::MissingSchemaName => "TF-302",
            ErrorCode::MissingSchemaDtype => "TF-303",
            ErrorCode::SchemaArityMismatch => "TF-304",
            ErrorCode::SchemaIndexOutOfRange => "TF-305",
            ErrorCode::ColumnSetMismatch => "TF-401",
            ErrorCode::IncompatibleDtypes => "TF-402",
            ErrorCode::EmptyConcat => "TF-403",
            ErrorCode::ColumnNotFound => "TF-501",
            ErrorCode::ColumnIndexOutOfRange => "TF-502",
            ErrorCode::InvalidPattern => "TF-503",
            ErrorCode::InvalidTimestamp => "TF-601",
            ErrorCode::IncompleteProperties => "TF-602",
            ErrorCode::UnknownSetting => "TF-701",
            ErrorCode::InvalidSetting => "TF-702",
            ErrorCode::UdfOutputMismatch => "TF-801",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TableFrameError {
    #[error(transparent)]
    Polars(#[from] PolarsError),

    #[error("cannot build a table frame from a value of type '{type_name}'")]
    UnsupportedInput { type_name: &'static str },

    #[error("input column '{0}' uses the reserved system column namespace")]
    ReservedColumnInInput(String),

    #[error("system column '{0}' cannot be renamed")]
    RenameSystemColumn(String),

    #[error("column '{from}' cannot be renamed to reserved name '{to}'")]
    RenameToReserved { from: String, to: String },

    #[error("system column '{0}' is missing from an assembled frame")]
    MissingSystemColumn(String),

    #[error("system column '{name}' has type {found}, expected {expected}")]
    SystemColumnDtype {
        name: String,
        expected: DataType,
        found: DataType,
    },

    #[error("column '{0}' is in the reserved system namespace but is not a known system column")]
    UnknownSystemColumn(String),

    #[error("expression output '{0}' would write a reserved system column")]
    WriteReservedColumn(String),

    #[error("schema declaration requires at least one column")]
    EmptySchema,

    #[error("schema declaration is missing a name at position {0}")]
    MissingSchemaName(usize),

    #[error("schema declaration is missing a data type at position {0}")]
    MissingSchemaDtype(usize),

    #[error("schema update has {got} columns, schema has {expected}")]
    SchemaArityMismatch { expected: usize, got: usize },

    #[error("schema position {index} is out of range for {len} columns")]
    SchemaIndexOutOfRange { index: usize, len: usize },

    #[error("concat input {index} has columns [{found}], expected [{expected}]")]
    ColumnSetMismatch {
        index: usize,
        expected: String,
        found: String,
    },

    #[error("column '{column}' has incompatible types {left} and {right}")]
    IncompatibleDtypes {
        column: String,
        left: DataType,
        right: DataType,
    },

    #[error("concat requires at least one frame")]
    EmptyConcat,

    #[error("column '{0}' not found")]
    ColumnNotFound(String),

    #[error("column index {index} is out of range for {len} columns")]
    ColumnIndexOutOfRange { index: i64, len: usize },

    #[error("invalid column name pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("timestamp {0} is outside the supported range")]
    InvalidTimestamp(i64),

    #[error("properties could not be built: {0}")]
    IncompleteProperties(String),

    #[error("unknown setting '{0}'")]
    UnknownSetting(String),

    #[error("invalid value '{value}' for setting '{name}': {reason}")]
    InvalidSetting {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("function output {0}")]
    UdfOutputMismatch(String),

    #[error("internal: {0}")]
    Internal(String),
}

impl TableFrameError {
    pub fn code(&self) -> ErrorCode {
        match self {
            TableFrameError::Polars(_) => ErrorCode::Engine,
            TableFrameError::UnsupportedInput { .. } => ErrorCode::UnsupportedInput,
            TableFrameError::ReservedColumnInInput(_) => ErrorCode::ReservedColumnInInput,
            TableFrameError::RenameSystemColumn(_) => ErrorCode::RenameSystemColumn,
            TableFrameError::RenameToReserved { .. } => ErrorCode::RenameToReserved,
            TableFrameError::MissingSystemColumn(_) => ErrorCode::MissingSystemColumn,
            TableFrameError::SystemColumnDtype { .. } => ErrorCode::SystemColumnDtype,
            TableFrameError::UnknownSystemColumn(_) => ErrorCode::UnknownSystemColumn,
            TableFrameError::WriteReservedColumn(_) => ErrorCode::WriteReservedColumn,
            TableFrameError::EmptySchema => ErrorCode::EmptySchema,
            TableFrameError::MissingSchemaName(_) => ErrorCode::MissingSchemaName,
            TableFrameError::MissingSchemaDtype(_) => ErrorCode::MissingSchemaDtype,
            TableFrameError::SchemaArityMismatch { .. } => ErrorCode::SchemaArityMismatch,
            TableFrameError::SchemaIndexOutOfRange { .. } => ErrorCode::SchemaIndexOutOfRange,
            TableFrameError::ColumnSetMismatch { .. } => ErrorCode::ColumnSetMismatch,
            TableFrameError::IncompatibleDtypes { .. } => ErrorCode::IncompatibleDtypes,
            TableFrameError::EmptyConcat => ErrorCode::EmptyConcat,
            TableFrameError::ColumnNotFound(_) => ErrorCode::ColumnNotFound,
            TableFrameError::ColumnIndexOutOfRange { .. } => ErrorCode::ColumnIndexOutOfRange,
            TableFrameError::InvalidPattern { .. } => ErrorCode::InvalidPattern,
            TableFrameError::InvalidTimestamp(_) => ErrorCode::InvalidTimestamp,
            TableFrameError::IncompleteProperties(_) => ErrorCode::IncompleteProperties,
            TableFrameError::UnknownSetting(_) => ErrorCode::UnknownSetting,
            TableFrameError::InvalidSetting { .. } => ErrorCode::InvalidSetting,
            TableFrameError::UdfOutputMismatch(_) => ErrorCode::UdfOutputMismatch,
            TableFrameError::Internal(_) => ErrorCode::Internal,
        }
    }
}

pub type Result<T, E = TableFrameError> = std::result::Result<T, E>;

#[allow(unused_macros)]
macro_rules! internal {
    ($($arg:tt)*) => {
        crate::errors::TableFrameError::Internal(std::format!($($arg)*))
    };
}
#[allow(unused_imports)]
pub(crate) use internal;
