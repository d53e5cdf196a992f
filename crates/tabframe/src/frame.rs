use std::any::{Any, type_name};
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use polars::prelude::*;
use tracing::{debug, trace};

use crate::assembler::{Assembler, AssemblyHint, Verification};
use crate::config::{FrameConfig, default_config};
use crate::errors::{Result, TableFrameError, internal};
use crate::properties::Properties;
use crate::registry::{is_reserved, registry};

/// How a frame came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Origin {
    /// Created from external data or wrapped from an engine frame.
    #[default]
    Import,
    /// Result of an operation on another frame.
    Build,
    /// Rebuilt from a frame that is already assembled.
    Init,
}

/// Whether the input already carries its system columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildMode {
    /// Plain user data. Reserved column names are rejected and all system
    /// columns are generated.
    #[default]
    Raw,
    /// Data produced by this library. System columns are checked, never
    /// silently generated, unless the origin is [`Origin::Build`].
    Tab,
}

/// Which columns an introspection call returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColumnScope {
    All,
    #[default]
    User,
    System,
}

/// Data a frame can be built from.
#[derive(Clone)]
pub enum FrameData {
    Lazy(LazyFrame),
    Eager(DataFrame),
    Columns(Vec<Column>),
    Dict(IndexMap<String, Vec<AnyValue<'static>>>),
    Table(TableFrame),
    Empty,
}

impl fmt::Debug for FrameData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameData::Lazy(_) => write!(f, "Lazy"),
            FrameData::Eager(df) => write!(f, "Eager({:?})", df.shape()),
            FrameData::Columns(cols) => write!(f, "Columns({})", cols.len()),
            FrameData::Dict(dict) => write!(f, "Dict({:?})", dict.keys().collect::<Vec<_>>()),
            FrameData::Table(tf) => write!(f, "Table({tf:?})"),
            FrameData::Empty => write!(f, "Empty"),
        }
    }
}

impl FrameData {
    /// Build from an arbitrary value, failing for types that can't hold
    /// tabular data.
    pub fn from_value<T: Any>(value: T) -> Result<Self> {
        let boxed: Box<dyn Any> = Box::new(value);

        let boxed = match boxed.downcast::<FrameData>() {
            Ok(data) => return Ok(*data),
            Err(boxed) => boxed,
        };
        let boxed = match boxed.downcast::<LazyFrame>() {
            Ok(lf) => return Ok(FrameData::Lazy(*lf)),
            Err(boxed) => boxed,
        };
        let boxed = match boxed.downcast::<DataFrame>() {
            Ok(df) => return Ok(FrameData::Eager(*df)),
            Err(boxed) => boxed,
        };
        let boxed = match boxed.downcast::<Vec<Column>>() {
            Ok(cols) => return Ok(FrameData::Columns(*cols)),
            Err(boxed) => boxed,
        };
        let boxed = match boxed.downcast::<IndexMap<String, Vec<AnyValue<'static>>>>() {
            Ok(dict) => return Ok(FrameData::Dict(*dict)),
            Err(boxed) => boxed,
        };
        let boxed = match boxed.downcast::<TableFrame>() {
            Ok(tf) => return Ok(FrameData::Table(*tf)),
            Err(boxed) => boxed,
        };
        if boxed.is::<()>() {
            return Ok(FrameData::Empty);
        }

        Err(TableFrameError::UnsupportedInput {
            type_name: type_name::<T>(),
        })
    }

    /// Engine plan for the data, with the frame attributes to inherit when
    /// the data is itself a frame.
    fn into_parts(self) -> Result<(LazyFrame, Option<TableFrame>)> {
        let lf = match self {
            FrameData::Lazy(lf) => lf,
            FrameData::Eager(df) => df.lazy(),
            FrameData::Columns(cols) => DataFrame::new(cols)?.lazy(),
            FrameData::Dict(dict) => {
                let cols = dict
                    .into_iter()
                    .map(|(name, values)| {
                        Series::from_any_values(name.into(), &values, false).map(Column::from)
                    })
                    .collect::<PolarsResult<Vec<_>>>()?;
                DataFrame::new(cols)?.lazy()
            }
            FrameData::Table(tf) => {
                let lf = tf.lf.clone();
                return Ok((lf, Some(tf)));
            }
            FrameData::Empty => DataFrame::empty().lazy(),
        };
        Ok((lf, None))
    }
}

impl From<LazyFrame> for FrameData {
    fn from(value: LazyFrame) -> Self {
        FrameData::Lazy(value)
    }
}

impl From<DataFrame> for FrameData {
    fn from(value: DataFrame) -> Self {
        FrameData::Eager(value)
    }
}

impl From<Vec<Column>> for FrameData {
    fn from(value: Vec<Column>) -> Self {
        FrameData::Columns(value)
    }
}

impl From<IndexMap<String, Vec<AnyValue<'static>>>> for FrameData {
    fn from(value: IndexMap<String, Vec<AnyValue<'static>>>) -> Self {
        FrameData::Dict(value)
    }
}

impl From<TableFrame> for FrameData {
    fn from(value: TableFrame) -> Self {
        FrameData::Table(value)
    }
}

#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub mode: BuildMode,
    pub origin: Origin,
    /// Input slot of the frame in the function that produced it.
    pub idx: Option<usize>,
    pub properties: Option<Properties>,
    pub config: Option<Arc<FrameConfig>>,
}

impl BuildOptions {
    pub fn raw() -> Self {
        BuildOptions::default()
    }

    pub fn tab(origin: Origin) -> Self {
        BuildOptions {
            mode: BuildMode::Tab,
            origin,
            ..Default::default()
        }
    }

    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = Some(properties);
        self
    }

    pub fn with_idx(mut self, idx: usize) -> Self {
        self.idx = Some(idx);
        self
    }

    pub fn with_config(mut self, config: Arc<FrameConfig>) -> Self {
        self.config = Some(config);
        self
    }
}

/// How an operation result gets its system columns back in shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Reassembly {
    /// System columns were carried through untouched. Check the schema and
    /// only assemble when it doesn't verify.
    Verify,
    /// Always reconcile.
    Full(AssemblyHint),
}

/// A lazy frame with managed system columns.
///
/// User columns come first, followed by the system columns in registry
/// order. System columns are hidden from selectors, schemas and row
/// extraction.
#[derive(Clone)]
pub struct TableFrame {
    pub(crate) lf: LazyFrame,
    pub(crate) origin: Origin,
    pub(crate) properties: Option<Properties>,
    pub(crate) idx: Option<usize>,
    pub(crate) config: Arc<FrameConfig>,
}

impl fmt::Debug for TableFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableFrame")
            .field("origin", &self.origin)
            .field("properties", &self.properties)
            .field("idx", &self.idx)
            .finish_non_exhaustive()
    }
}

impl TableFrame {
    /// General constructor.
    ///
    /// Table frame input keeps its system columns in every mode, they are
    /// only verified.
    pub fn build(data: impl Into<FrameData>, options: BuildOptions) -> Result<Self> {
        let (lf, inherit) = data.into().into_parts()?;

        let config = options
            .config
            .or_else(|| inherit.as_ref().map(|tf| tf.config.clone()))
            .unwrap_or_else(default_config);
        let properties = options
            .properties
            .or_else(|| inherit.as_ref().and_then(|tf| tf.properties.clone()));
        let idx = options.idx.or_else(|| inherit.as_ref().and_then(|tf| tf.idx));

        let assembler = Assembler::new(&config);
        let lf = match (options.mode, options.origin) {
            // A table frame already manages its system columns.
            (BuildMode::Raw, _) if inherit.is_some() => assembler.check_assembled(lf)?,
            (BuildMode::Raw, _) => {
                let mut lf = lf;
                let schema = lf.collect_schema()?;
                if let Some(name) = schema.iter_names().find(|n| is_reserved(n)) {
                    return Err(TableFrameError::ReservedColumnInInput(name.to_string()));
                }
                assembler.assemble(lf, properties.as_ref(), AssemblyHint::default())?
            }
            (BuildMode::Tab, Origin::Build) => {
                assembler.assemble(lf, properties.as_ref(), AssemblyHint::default())?
            }
            (BuildMode::Tab, Origin::Import | Origin::Init) => assembler.check_assembled(lf)?,
        };

        trace!(mode = ?options.mode, origin = ?options.origin, "built frame");

        Ok(TableFrame {
            lf,
            origin: options.origin,
            properties,
            idx,
            config,
        })
    }

    /// Wrap an engine frame that already carries its system columns.
    pub fn wrap(data: impl Into<FrameData>) -> Result<Self> {
        Self::build(data, BuildOptions::tab(Origin::Import))
    }

    pub fn from_polars(df: DataFrame) -> Result<Self> {
        Self::build(df, BuildOptions::raw())
    }

    pub fn from_polars_with_properties(df: DataFrame, properties: Properties) -> Result<Self> {
        Self::build(df, BuildOptions::raw().with_properties(properties))
    }

    pub fn from_lazy(lf: LazyFrame) -> Result<Self> {
        Self::build(lf, BuildOptions::raw())
    }

    pub fn from_lazy_with_properties(lf: LazyFrame, properties: Properties) -> Result<Self> {
        Self::build(lf, BuildOptions::raw().with_properties(properties))
    }

    pub fn from_dict(dict: IndexMap<String, Vec<AnyValue<'static>>>) -> Result<Self> {
        Self::build(dict, BuildOptions::raw())
    }

    pub fn from_dict_with_properties(
        dict: IndexMap<String, Vec<AnyValue<'static>>>,
        properties: Properties,
    ) -> Result<Self> {
        Self::build(dict, BuildOptions::raw().with_properties(properties))
    }

    pub fn from_columns(columns: Vec<Column>) -> Result<Self> {
        Self::build(columns, BuildOptions::raw())
    }

    pub fn from_columns_with_properties(
        columns: Vec<Column>,
        properties: Properties,
    ) -> Result<Self> {
        Self::build(columns, BuildOptions::raw().with_properties(properties))
    }

    /// A frame with no user columns and no rows.
    pub fn empty() -> Result<Self> {
        Self::build(FrameData::Empty, BuildOptions::raw())
    }

    /// Engine plan with all columns, system columns included.
    pub fn unwrap(&self) -> LazyFrame {
        self.lf.clone()
    }

    pub fn into_lazy(self) -> LazyFrame {
        self.lf
    }

    /// Attach a configuration used by operations on this frame and frames
    /// derived from it.
    pub fn with_config(mut self, config: Arc<FrameConfig>) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn properties(&self) -> Option<&Properties> {
        self.properties.as_ref()
    }

    pub fn idx(&self) -> Option<usize> {
        self.idx
    }

    pub fn set_idx(&mut self, idx: Option<usize>) {
        self.idx = idx;
    }

    /// Full schema, system columns included.
    pub fn schema_all(&self) -> Result<SchemaRef> {
        Ok(self.lf.clone().collect_schema()?)
    }

    /// Schema of the user columns.
    pub fn schema(&self) -> Result<Schema> {
        let all = self.schema_all()?;
        Ok(all
            .iter()
            .filter(|(name, _)| !is_reserved(name))
            .map(|(name, dtype)| Field::new(name.clone(), dtype.clone()))
            .collect())
    }

    pub fn columns(&self, scope: ColumnScope) -> Result<Vec<String>> {
        let all = self.schema_all()?;
        let names = all
            .iter_names()
            .filter(|name| match scope {
                ColumnScope::All => true,
                ColumnScope::User => !is_reserved(name),
                ColumnScope::System => is_reserved(name),
            })
            .map(|name| name.to_string())
            .collect();
        Ok(names)
    }

    pub fn dtypes(&self) -> Result<Vec<DataType>> {
        Ok(self.schema()?.iter_values().cloned().collect())
    }

    /// Number of columns, system columns included.
    pub fn width(&self) -> Result<usize> {
        Ok(self.schema_all()?.len())
    }

    /// Number of rows. Runs the plan.
    pub fn height(&self) -> Result<usize> {
        plan_height(self.lf.clone())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.height()? == 0)
    }

    /// Check if both frames have the same user columns with the same types.
    pub fn has_same_schema(&self, other: &TableFrame) -> Result<bool> {
        Ok(self.schema()? == other.schema()?)
    }

    /// Plan projecting only the user columns.
    pub(crate) fn user_lf(&self) -> Result<LazyFrame> {
        let names: Vec<_> = self
            .schema_all()?
            .iter_names()
            .filter(|name| !is_reserved(name))
            .cloned()
            .map(col)
            .collect();
        Ok(self.lf.clone().select(names))
    }

    /// Materialize the user columns.
    pub fn collect(&self) -> Result<DataFrame> {
        Ok(self.user_lf()?.collect()?)
    }

    /// Materialize all columns.
    pub fn collect_all(&self) -> Result<DataFrame> {
        Ok(self.lf.clone().collect()?)
    }

    /// Frame for the result of an operation on this frame.
    pub(crate) fn derive(&self, lf: LazyFrame, reassembly: Reassembly) -> Result<TableFrame> {
        self.derive_with(lf, reassembly, self.properties.clone())
    }

    pub(crate) fn derive_with(
        &self,
        mut lf: LazyFrame,
        reassembly: Reassembly,
        properties: Option<Properties>,
    ) -> Result<TableFrame> {
        let assembler = Assembler::new(&self.config);

        let reassembly = match reassembly {
            Reassembly::Verify if self.config.always_reassemble => {
                Reassembly::Full(AssemblyHint::default())
            }
            other => other,
        };

        let lf = match reassembly {
            Reassembly::Verify => {
                let schema = lf.collect_schema()?;
                match assembler.verify(&schema) {
                    Verification::Valid => {
                        trace!("system columns verified, skipping assembly");
                        lf
                    }
                    Verification::NeedsReorder => {
                        trace!("system columns verified, reordering");
                        assembler.reorder(lf, &schema)
                    }
                    Verification::NeedsAssembly => {
                        debug!("system columns failed verification, assembling");
                        assembler.assemble(lf, properties.as_ref(), AssemblyHint::default())?
                    }
                }
            }
            Reassembly::Full(hint) => assembler.assemble(lf, properties.as_ref(), hint)?,
        };

        Ok(TableFrame {
            lf,
            origin: Origin::Build,
            properties,
            idx: self.idx,
            config: self.config.clone(),
        })
    }

    /// Names of the system columns, in registry order.
    pub fn system_columns() -> &'static [&'static str] {
        registry().required_columns()
    }
}

/// Number of rows a plan produces. Runs the plan.
pub(crate) fn plan_height(lf: LazyFrame) -> Result<usize> {
    let df = lf.select([len().alias("len")]).collect()?;
    let height = df
        .column("len")?
        .get(0)?
        .extract::<u64>()
        .ok_or_else(|| internal!("row count is not an integer"))?;
    Ok(height as usize)
}
