//! Lazy tabular frames with managed system columns.
//!
//! A [`TableFrame`] wraps a polars lazy plan and keeps a fixed set of hidden
//! system columns (row identifiers, lineage and provenance values) correct
//! through every operation, while selectors, schemas and row extraction only
//! show user columns.

pub mod assembler;
pub mod concat;
pub mod config;
pub mod errors;
pub mod frame;
pub mod generator;
pub mod join;
pub mod ops;
pub mod properties;
pub mod registry;
pub mod rows;
pub mod schema;
pub mod selectors;
pub mod supertype;
pub mod udf;

pub use concat::{ConcatHow, concat};
pub use config::{FrameConfig, RowIdFormat, default_config};
pub use errors::{ErrorCode, Result, TableFrameError};
pub use frame::{BuildMode, BuildOptions, ColumnScope, FrameData, Origin, TableFrame};
pub use join::JoinHow;
pub use ops::TableGroupBy;
pub use properties::{IntoUtcTimestamp, Properties, PropertiesBuilder};
pub use registry::{is_reserved, required_columns, system_columns_metadata};
pub use rows::{Row, Value};
pub use schema::{SchemaColumn, SchemaDecl};
pub use selectors::Selector;
