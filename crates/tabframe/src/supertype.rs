//! Common supertype resolution used by relaxed concatenation.

use polars::prelude::{DataType, TimeUnit};

/// Return the type both `left` and `right` can be cast to without losing
/// information in the common cases.
///
/// Returns None if no such type exists.
///
/// Rules follow the engine's own coercions: integers widen, integers and
/// floats meet at a float, booleans widen to the other numeric, strings
/// absorb everything, nulls take the other type, lists coerce element-wise
/// and temporal types widen to the finer unit.
pub fn common_supertype(left: &DataType, right: &DataType) -> Option<DataType> {
    if left == right {
        return Some(left.clone());
    }

    match (left, right) {
        (DataType::Null, other) | (other, DataType::Null) => Some(other.clone()),

        // Strings absorb everything, nested types excluded.
        (DataType::String, other) | (other, DataType::String) => {
            if is_nested(other) {
                None
            } else {
                Some(DataType::String)
            }
        }

        (DataType::Boolean, other) | (other, DataType::Boolean) if is_numeric(other) => {
            Some(other.clone())
        }

        (DataType::List(l), DataType::List(r)) => {
            common_supertype(l, r).map(|inner| DataType::List(Box::new(inner)))
        }

        (DataType::Date, DataType::Datetime(unit, tz))
        | (DataType::Datetime(unit, tz), DataType::Date) => {
            Some(DataType::Datetime(*unit, tz.clone()))
        }
        (DataType::Datetime(lu, ltz), DataType::Datetime(ru, rtz)) => {
            if ltz == rtz {
                Some(DataType::Datetime(finer_unit(*lu, *ru), ltz.clone()))
            } else {
                None
            }
        }
        (DataType::Duration(lu), DataType::Duration(ru)) => {
            Some(DataType::Duration(finer_unit(*lu, *ru)))
        }

        (DataType::Decimal(lp, ls), DataType::Decimal(rp, rs)) => match (lp, ls, rp, rs) {
            (Some(lp), Some(ls), Some(rp), Some(rs)) => {
                let scale = *ls.max(rs);
                let integer_digits = lp.saturating_sub(*ls).max(rp.saturating_sub(*rs));
                Some(decimal(integer_digits + scale, scale))
            }
            _ => Some(DataType::Decimal(None, (*ls).max(*rs))),
        },
        (DataType::Decimal(precision, scale), other)
        | (other, DataType::Decimal(precision, scale)) => {
            if is_float(other) {
                Some(DataType::Float64)
            } else if let Some(width) = int_width(other) {
                let scale = scale.unwrap_or(0);
                let integer_digits = precision
                    .map(|p| p.saturating_sub(scale))
                    .unwrap_or(0)
                    .max(width.decimal_digits());
                Some(decimal(integer_digits + scale, scale))
            } else {
                None
            }
        }

        _ => numeric_supertype(left, right),
    }
}

const MAX_DECIMAL_PRECISION: usize = 38;

/// Decimal holding `precision` digits, falling back to a float when no
/// decimal is wide enough.
fn decimal(precision: usize, scale: usize) -> DataType {
    if precision > MAX_DECIMAL_PRECISION {
        DataType::Float64
    } else {
        DataType::Decimal(Some(precision), Some(scale))
    }
}

fn numeric_supertype(left: &DataType, right: &DataType) -> Option<DataType> {
    if is_float(left) || is_float(right) {
        let (other, float) = if is_float(left) {
            (right, left)
        } else {
            (left, right)
        };

        if is_float(other) {
            // Float32 and Float64.
            return Some(DataType::Float64);
        }

        let width = int_width(other)?.bits;
        return match float {
            DataType::Float32 if width <= 16 => Some(DataType::Float32),
            _ => Some(DataType::Float64),
        };
    }

    let l = int_width(left)?;
    let r = int_width(right)?;

    match (l.signed, r.signed) {
        (true, true) | (false, false) => {
            let bits = l.bits.max(r.bits);
            int_type(bits, l.signed)
        }
        _ => {
            let (signed, unsigned) = if l.signed { (l, r) } else { (r, l) };
            if unsigned.bits >= 64 {
                // No signed integer holds every u64.
                return Some(DataType::Float64);
            }
            let bits = signed.bits.max(unsigned.bits * 2);
            int_type(bits, true)
        }
    }
}

fn finer_unit(left: TimeUnit, right: TimeUnit) -> TimeUnit {
    const fn rank(unit: TimeUnit) -> u8 {
        match unit {
            TimeUnit::Milliseconds => 0,
            TimeUnit::Microseconds => 1,
            TimeUnit::Nanoseconds => 2,
        }
    }

    if rank(left) >= rank(right) { left } else { right }
}

#[derive(Debug, Clone, Copy)]
struct IntWidth {
    bits: u16,
    signed: bool,
}

impl IntWidth {
    /// Decimal digits needed for every value of the type.
    const fn decimal_digits(&self) -> usize {
        match (self.bits, self.signed) {
            (8, _) => 3,
            (16, _) => 5,
            (32, _) => 10,
            (_, true) => 19,
            (_, false) => 20,
        }
    }
}

fn int_width(dtype: &DataType) -> Option<IntWidth> {
    let (bits, signed) = match dtype {
        DataType::Int8 => (8, true),
        DataType::Int16 => (16, true),
        DataType::Int32 => (32, true),
        DataType::Int64 => (64, true),
        DataType::UInt8 => (8, false),
        DataType::UInt16 => (16, false),
        DataType::UInt32 => (32, false),
        DataType::UInt64 => (64, false),
        _ => return None,
    };
    Some(IntWidth { bits, signed })
}

fn int_type(bits: u16, signed: bool) -> Option<DataType> {
    Some(match (bits, signed) {
        (8, true) => DataType::Int8,
        (16, true) => DataType::Int16,
        (32, true) => DataType::Int32,
        (64, true) => DataType::Int64,
        (8, false) => DataType::UInt8,
        (16, false) => DataType::UInt16,
        (32, false) => DataType::UInt32,
        (64, false) => DataType::UInt64,
        _ => return None,
    })
}

fn is_float(dtype: &DataType) -> bool {
    matches!(dtype, DataType::Float32 | DataType::Float64)
}

fn is_numeric(dtype: &DataType) -> bool {
    is_float(dtype) || int_width(dtype).is_some() || matches!(dtype, DataType::Decimal(..))
}

fn is_nested(dtype: &DataType) -> bool {
    matches!(dtype, DataType::List(_) | DataType::Object(..))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supertype_cases() {
        struct TestCase {
            left: DataType,
            right: DataType,
            expected: Option<DataType>,
        }

        let cases = [
            TestCase {
                left: DataType::Int32,
                right: DataType::Int64,
                expected: Some(DataType::Int64),
            },
            TestCase {
                left: DataType::Int64,
                right: DataType::Float64,
                expected: Some(DataType::Float64),
            },
            TestCase {
                left: DataType::Int16,
                right: DataType::Float32,
                expected: Some(DataType::Float32),
            },
            TestCase {
                left: DataType::Int32,
                right: DataType::Float32,
                expected: Some(DataType::Float64),
            },
            TestCase {
                left: DataType::Boolean,
                right: DataType::Int64,
                expected: Some(DataType::Int64),
            },
            TestCase {
                left: DataType::Int64,
                right: DataType::String,
                expected: Some(DataType::String),
            },
            TestCase {
                left: DataType::Null,
                right: DataType::Date,
                expected: Some(DataType::Date),
            },
            TestCase {
                left: DataType::UInt8,
                right: DataType::Int8,
                expected: Some(DataType::Int16),
            },
            TestCase {
                left: DataType::UInt32,
                right: DataType::Int64,
                expected: Some(DataType::Int64),
            },
            TestCase {
                left: DataType::UInt64,
                right: DataType::Int8,
                expected: Some(DataType::Float64),
            },
            TestCase {
                left: DataType::List(Box::new(DataType::Int8)),
                right: DataType::List(Box::new(DataType::Int32)),
                expected: Some(DataType::List(Box::new(DataType::Int32))),
            },
            TestCase {
                left: DataType::Date,
                right: DataType::Datetime(TimeUnit::Microseconds, None),
                expected: Some(DataType::Datetime(TimeUnit::Microseconds, None)),
            },
            TestCase {
                left: DataType::Duration(TimeUnit::Milliseconds),
                right: DataType::Duration(TimeUnit::Nanoseconds),
                expected: Some(DataType::Duration(TimeUnit::Nanoseconds)),
            },
            TestCase {
                left: DataType::Decimal(Some(5), Some(2)),
                right: DataType::Int64,
                expected: Some(DataType::Decimal(Some(21), Some(2))),
            },
            TestCase {
                left: DataType::Decimal(Some(30), Some(2)),
                right: DataType::Int16,
                expected: Some(DataType::Decimal(Some(30), Some(2))),
            },
            TestCase {
                left: DataType::Decimal(Some(10), Some(20)),
                right: DataType::UInt64,
                expected: Some(DataType::Float64),
            },
            TestCase {
                left: DataType::Decimal(Some(5), Some(2)),
                right: DataType::Decimal(Some(6), Some(4)),
                expected: Some(DataType::Decimal(Some(7), Some(4))),
            },
            TestCase {
                left: DataType::Boolean,
                right: DataType::Date,
                expected: None,
            },
            TestCase {
                left: DataType::List(Box::new(DataType::Int8)),
                right: DataType::String,
                expected: None,
            },
            TestCase {
                left: DataType::Datetime(TimeUnit::Milliseconds, Some("UTC".into())),
                right: DataType::Datetime(TimeUnit::Milliseconds, None),
                expected: None,
            },
        ];

        for case in cases {
            let got = common_supertype(&case.left, &case.right);
            assert_eq!(case.expected, got, "{} + {}", case.left, case.right);

            // Resolution is symmetric.
            let got = common_supertype(&case.right, &case.left);
            assert_eq!(case.expected, got, "{} + {}", case.right, case.left);
        }
    }
}
