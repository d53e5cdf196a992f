//! Column selectors.
//!
//! Selectors pick columns by name, position, pattern or type and combine
//! with set operators. They only ever see user columns.

use std::ops::{BitAnd, BitOr, BitXor, Not, Sub};

use polars::prelude::{DataType, PlSmallStr, Schema, TimeUnit};
use regex::Regex;

use crate::errors::{Result, TableFrameError};
use crate::registry::is_reserved;

/// Type families a selector can match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DtypeClass {
    Integer,
    SignedInteger,
    UnsignedInteger,
    Float,
    Numeric,
    Temporal,
    Binary,
    Boolean,
    Categorical,
    Date,
    Decimal,
    Object,
    String,
    Time,
}

impl DtypeClass {
    fn matches(&self, dtype: &DataType) -> bool {
        match self {
            DtypeClass::Integer => dtype.is_integer(),
            DtypeClass::SignedInteger => dtype.is_signed_integer(),
            DtypeClass::UnsignedInteger => dtype.is_unsigned_integer(),
            DtypeClass::Float => dtype.is_float(),
            DtypeClass::Numeric => {
                dtype.is_integer() || dtype.is_float() || matches!(dtype, DataType::Decimal(..))
            }
            DtypeClass::Temporal => matches!(
                dtype,
                DataType::Date | DataType::Datetime(..) | DataType::Duration(_) | DataType::Time
            ),
            DtypeClass::Binary => matches!(dtype, DataType::Binary),
            DtypeClass::Boolean => matches!(dtype, DataType::Boolean),
            DtypeClass::Categorical => matches!(dtype, DataType::Categorical(..)),
            DtypeClass::Date => matches!(dtype, DataType::Date),
            DtypeClass::Decimal => matches!(dtype, DataType::Decimal(..)),
            DtypeClass::Object => matches!(dtype, DataType::Object(..)),
            DtypeClass::String => matches!(dtype, DataType::String),
            DtypeClass::Time => matches!(dtype, DataType::Time),
        }
    }
}

/// Which characters a name may consist of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharClass {
    Alpha,
    Alphanumeric,
    Digit,
}

#[derive(Debug, Clone)]
pub enum Selector {
    All,
    First,
    Last,
    ByIndex(Vec<i64>),
    ByName {
        names: Vec<String>,
        require_all: bool,
    },
    Contains(Vec<String>),
    StartsWith(Vec<String>),
    EndsWith(Vec<String>),
    Matches(Regex),
    Chars {
        class: CharClass,
        ascii_only: bool,
        ignore_spaces: bool,
    },
    ByDtype(Vec<DataType>),
    Class(DtypeClass),
    Datetime {
        time_units: Option<Vec<TimeUnit>>,
        /// Accepted zones, `None` in the list matches naive datetimes.
        time_zones: Option<Vec<Option<String>>>,
    },
    Duration {
        time_units: Option<Vec<TimeUnit>>,
    },
    And(Box<Selector>, Box<Selector>),
    Or(Box<Selector>, Box<Selector>),
    Sub(Box<Selector>, Box<Selector>),
    Xor(Box<Selector>, Box<Selector>),
    Not(Box<Selector>),
}

impl Selector {
    /// Resolve to column names of `schema`. Reserved columns are never
    /// returned.
    pub fn resolve(&self, schema: &Schema) -> Result<Vec<PlSmallStr>> {
        let user: Vec<_> = schema
            .iter()
            .filter(|(name, _)| !is_reserved(name))
            .collect();
        self.resolve_user(&user)
    }

    /// Everything except what `other` selects.
    pub fn exclude(self, other: impl Into<Selector>) -> Selector {
        self - lenient(other.into())
    }

    fn resolve_user(&self, user: &[(&PlSmallStr, &DataType)]) -> Result<Vec<PlSmallStr>> {
        let names = match self {
            Selector::All => user.iter().map(|(n, _)| (*n).clone()).collect(),
            Selector::First => user.first().map(|(n, _)| (*n).clone()).into_iter().collect(),
            Selector::Last => user.last().map(|(n, _)| (*n).clone()).into_iter().collect(),
            Selector::ByIndex(indices) => {
                let len = user.len();
                let mut out: Vec<PlSmallStr> = Vec::with_capacity(indices.len());
                for &index in indices {
                    let pos = if index < 0 { len as i64 + index } else { index };
                    if pos < 0 || pos >= len as i64 {
                        return Err(TableFrameError::ColumnIndexOutOfRange { index, len });
                    }
                    let name = user[pos as usize].0;
                    if !out.contains(name) {
                        out.push(name.clone());
                    }
                }
                out
            }
            Selector::ByName { names, require_all } => {
                let mut out: Vec<PlSmallStr> = Vec::with_capacity(names.len());
                for name in names {
                    match user.iter().find(|(n, _)| n.as_str() == name.as_str()) {
                        Some((n, _)) => {
                            if !out.contains(n) {
                                out.push((*n).clone());
                            }
                        }
                        None if *require_all => {
                            return Err(TableFrameError::ColumnNotFound(name.clone()));
                        }
                        None => (),
                    }
                }
                out
            }
            Selector::And(left, right) => {
                let (l, r) = (left.resolve_user(user)?, right.resolve_user(user)?);
                in_schema_order(user, |n| l.contains(n) && r.contains(n))
            }
            Selector::Or(left, right) => {
                let (l, r) = (left.resolve_user(user)?, right.resolve_user(user)?);
                in_schema_order(user, |n| l.contains(n) || r.contains(n))
            }
            Selector::Sub(left, right) => {
                let (l, r) = (left.resolve_user(user)?, right.resolve_user(user)?);
                in_schema_order(user, |n| l.contains(n) && !r.contains(n))
            }
            Selector::Xor(left, right) => {
                let (l, r) = (left.resolve_user(user)?, right.resolve_user(user)?);
                in_schema_order(user, |n| l.contains(n) != r.contains(n))
            }
            Selector::Not(inner) => {
                let inner = inner.resolve_user(user)?;
                in_schema_order(user, |n| !inner.contains(n))
            }
            other => user
                .iter()
                .filter(|(n, dtype)| other.matches_column(n, dtype))
                .map(|(n, _)| (*n).clone())
                .collect(),
        };
        Ok(names)
    }

    /// Column level predicate for the selectors that don't depend on
    /// position or other selectors.
    fn matches_column(&self, name: &str, dtype: &DataType) -> bool {
        match self {
            Selector::Contains(parts) => parts.iter().any(|p| name.contains(p.as_str())),
            Selector::StartsWith(parts) => parts.iter().any(|p| name.starts_with(p.as_str())),
            Selector::EndsWith(parts) => parts.iter().any(|p| name.ends_with(p.as_str())),
            Selector::Matches(re) => re.is_match(name),
            Selector::Chars {
                class,
                ascii_only,
                ignore_spaces,
            } => name_has_chars(name, *class, *ascii_only, *ignore_spaces),
            Selector::ByDtype(dtypes) => dtypes.contains(dtype),
            Selector::Class(class) => class.matches(dtype),
            Selector::Datetime {
                time_units,
                time_zones,
            } => match dtype {
                DataType::Datetime(unit, tz) => {
                    let unit_ok = time_units.as_ref().is_none_or(|units| units.contains(unit));
                    let tz_ok = time_zones.as_ref().is_none_or(|zones| {
                        zones
                            .iter()
                            .any(|zone| zone.as_deref() == tz.as_ref().map(|t| t.as_str()))
                    });
                    unit_ok && tz_ok
                }
                _ => false,
            },
            Selector::Duration { time_units } => match dtype {
                DataType::Duration(unit) => {
                    time_units.as_ref().is_none_or(|units| units.contains(unit))
                }
                _ => false,
            },
            _ => false,
        }
    }
}

fn in_schema_order(
    user: &[(&PlSmallStr, &DataType)],
    keep: impl Fn(&PlSmallStr) -> bool,
) -> Vec<PlSmallStr> {
    user.iter()
        .filter(|(n, _)| keep(n))
        .map(|(n, _)| (*n).clone())
        .collect()
}

fn name_has_chars(name: &str, class: CharClass, ascii_only: bool, ignore_spaces: bool) -> bool {
    if name.is_empty() {
        return false;
    }
    name.chars().all(|c| {
        if ignore_spaces && c == ' ' {
            return true;
        }
        match (class, ascii_only) {
            (CharClass::Alpha, true) => c.is_ascii_alphabetic(),
            (CharClass::Alpha, false) => c.is_alphabetic(),
            (CharClass::Alphanumeric, true) => c.is_ascii_alphanumeric(),
            (CharClass::Alphanumeric, false) => c.is_alphanumeric(),
            (CharClass::Digit, true) => c.is_ascii_digit(),
            (CharClass::Digit, false) => c.is_numeric(),
        }
    })
}

/// Names used for exclusion don't have to exist.
fn lenient(selector: Selector) -> Selector {
    match selector {
        Selector::ByName { names, .. } => Selector::ByName {
            names,
            require_all: false,
        },
        other => other,
    }
}

impl From<&str> for Selector {
    fn from(value: &str) -> Self {
        by_name([value])
    }
}

impl From<String> for Selector {
    fn from(value: String) -> Self {
        by_name([value])
    }
}

impl From<Vec<&str>> for Selector {
    fn from(value: Vec<&str>) -> Self {
        by_name(value)
    }
}

impl From<Vec<String>> for Selector {
    fn from(value: Vec<String>) -> Self {
        by_name(value)
    }
}

impl From<DataType> for Selector {
    fn from(value: DataType) -> Self {
        by_dtype([value])
    }
}

impl BitAnd for Selector {
    type Output = Selector;

    fn bitand(self, rhs: Selector) -> Selector {
        Selector::And(Box::new(self), Box::new(rhs))
    }
}

impl BitOr for Selector {
    type Output = Selector;

    fn bitor(self, rhs: Selector) -> Selector {
        Selector::Or(Box::new(self), Box::new(rhs))
    }
}

impl BitXor for Selector {
    type Output = Selector;

    fn bitxor(self, rhs: Selector) -> Selector {
        Selector::Xor(Box::new(self), Box::new(rhs))
    }
}

impl Sub for Selector {
    type Output = Selector;

    fn sub(self, rhs: Selector) -> Selector {
        Selector::Sub(Box::new(self), Box::new(rhs))
    }
}

impl Not for Selector {
    type Output = Selector;

    fn not(self) -> Selector {
        Selector::Not(Box::new(self))
    }
}

pub fn all() -> Selector {
    Selector::All
}

pub fn first() -> Selector {
    Selector::First
}

pub fn last() -> Selector {
    Selector::Last
}

/// Columns by position. Negative indices count back from the last user
/// column.
pub fn by_index(indices: impl IntoIterator<Item = i64>) -> Selector {
    Selector::ByIndex(indices.into_iter().collect())
}

/// Columns by exact name. Every name must exist.
pub fn by_name<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Selector {
    Selector::ByName {
        names: names.into_iter().map(Into::into).collect(),
        require_all: true,
    }
}

/// Columns by exact name, skipping names that don't exist.
pub fn by_name_lenient<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Selector {
    lenient(by_name(names))
}

pub fn contains<S: Into<String>>(substrings: impl IntoIterator<Item = S>) -> Selector {
    Selector::Contains(substrings.into_iter().map(Into::into).collect())
}

pub fn starts_with<S: Into<String>>(prefixes: impl IntoIterator<Item = S>) -> Selector {
    Selector::StartsWith(prefixes.into_iter().map(Into::into).collect())
}

pub fn ends_with<S: Into<String>>(suffixes: impl IntoIterator<Item = S>) -> Selector {
    Selector::EndsWith(suffixes.into_iter().map(Into::into).collect())
}

/// Columns whose name matches a regular expression anywhere.
pub fn matches(pattern: &str) -> Result<Selector> {
    let re = Regex::new(pattern).map_err(|source| TableFrameError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })?;
    Ok(Selector::Matches(re))
}

pub fn alpha(ascii_only: bool, ignore_spaces: bool) -> Selector {
    Selector::Chars {
        class: CharClass::Alpha,
        ascii_only,
        ignore_spaces,
    }
}

pub fn alphanumeric(ascii_only: bool, ignore_spaces: bool) -> Selector {
    Selector::Chars {
        class: CharClass::Alphanumeric,
        ascii_only,
        ignore_spaces,
    }
}

pub fn digit(ascii_only: bool) -> Selector {
    Selector::Chars {
        class: CharClass::Digit,
        ascii_only,
        ignore_spaces: false,
    }
}

pub fn by_dtype(dtypes: impl IntoIterator<Item = DataType>) -> Selector {
    Selector::ByDtype(dtypes.into_iter().collect())
}

pub fn integer() -> Selector {
    Selector::Class(DtypeClass::Integer)
}

pub fn signed_integer() -> Selector {
    Selector::Class(DtypeClass::SignedInteger)
}

pub fn unsigned_integer() -> Selector {
    Selector::Class(DtypeClass::UnsignedInteger)
}

pub fn float() -> Selector {
    Selector::Class(DtypeClass::Float)
}

pub fn numeric() -> Selector {
    Selector::Class(DtypeClass::Numeric)
}

pub fn temporal() -> Selector {
    Selector::Class(DtypeClass::Temporal)
}

pub fn binary() -> Selector {
    Selector::Class(DtypeClass::Binary)
}

pub fn boolean() -> Selector {
    Selector::Class(DtypeClass::Boolean)
}

pub fn categorical() -> Selector {
    Selector::Class(DtypeClass::Categorical)
}

pub fn date() -> Selector {
    Selector::Class(DtypeClass::Date)
}

/// Datetime columns of any unit and zone.
pub fn datetime() -> Selector {
    Selector::Datetime {
        time_units: None,
        time_zones: None,
    }
}

pub fn datetime_with(
    time_units: Option<Vec<TimeUnit>>,
    time_zones: Option<Vec<Option<String>>>,
) -> Selector {
    Selector::Datetime {
        time_units,
        time_zones,
    }
}

pub fn decimal() -> Selector {
    Selector::Class(DtypeClass::Decimal)
}

pub fn duration(time_units: Option<Vec<TimeUnit>>) -> Selector {
    Selector::Duration { time_units }
}

pub fn object() -> Selector {
    Selector::Class(DtypeClass::Object)
}

pub fn string() -> Selector {
    Selector::Class(DtypeClass::String)
}

pub fn time() -> Selector {
    Selector::Class(DtypeClass::Time)
}

/// All user columns except the given names, types or selectors.
pub fn exclude<S: Into<Selector>>(items: impl IntoIterator<Item = S>) -> Selector {
    let excluded = items
        .into_iter()
        .map(|s| lenient(s.into()))
        .reduce(|acc, s| acc | s);
    match excluded {
        Some(excluded) => all() - excluded,
        None => all(),
    }
}
