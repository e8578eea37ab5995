//! Column type and value model shared by every filter kind.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// The closed set of primitive column types a filter can bind to.
///
/// `Time` is constructible as a literal (see [`crate::filter::literal`])
/// but is not a valid column binding: the original catalog of bindable
/// types never lists it, even though literal construction needs it for
/// comparisons against `cast(x as time)` expressions elsewhere in the
/// planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Int128,
    Float,
    Double,
    Decimal32,
    Decimal64,
    Decimal128,
    DecimalLegacy,
    Date,
    DateTime,
    DateV2,
    DateTimeV2,
    Char,
    VarChar,
    String,
    Hll,
    /// Literal-only: a valid [`crate::filter::literal::LiteralBuilder`]
    /// target but never a valid column binding for a filter (the
    /// bindable-column catalog never lists it).
    Time,
}

impl ColumnType {
    pub fn is_bindable(self) -> bool {
        !matches!(self, ColumnType::Time)
    }
    /// Types whose intervals/bloom membership can meaningfully be
    /// promoted/demoted (bitmap filters only bind to integers).
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            ColumnType::Int8
                | ColumnType::Int16
                | ColumnType::Int32
                | ColumnType::Int64
                | ColumnType::Int128
        )
    }

    pub fn is_decimal(self) -> bool {
        matches!(
            self,
            ColumnType::Decimal32
                | ColumnType::Decimal64
                | ColumnType::Decimal128
                | ColumnType::DecimalLegacy
        )
    }

    pub fn is_date_like(self) -> bool {
        matches!(
            self,
            ColumnType::Date | ColumnType::DateTime | ColumnType::DateV2 | ColumnType::DateTimeV2
        )
    }

    pub fn is_string_like(self) -> bool {
        matches!(
            self,
            ColumnType::Char | ColumnType::VarChar | ColumnType::String
        )
    }
}

/// A value bound to a [`ColumnType`].
///
/// Decimals carry an unscaled `i128` mantissa plus `(precision, scale)` so
/// that rescaling to a filter's bound scale never requires re-parsing a
/// string. Dates/datetimes are canonical integers (days since epoch /
/// micros since epoch) so that a `Date` can be promoted to `DateTime` for
/// mixed-type comparisons by a simple multiply, never a string operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnValue {
    Null,
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Int128(i128),
    Float(f32),
    Double(f64),
    Decimal {
        unscaled: i128,
        precision: u8,
        scale: u8,
    },
    Date(i32),
    DateTime(i64),
    Bytes(Vec<u8>),
    Hll(Vec<u8>),
}

impl ColumnValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ColumnValue::Null)
    }

    /// NaN is excluded from every min-max interval and bound: never
    /// inserted, never matched.
    pub fn is_nan(&self) -> bool {
        match self {
            ColumnValue::Float(f) => f.is_nan(),
            ColumnValue::Double(d) => d.is_nan(),
            _ => false,
        }
    }

    /// Rescale a decimal value to `(precision, scale)`, matching the
    /// bound column's scale before any comparison is made.
    pub fn rescaled_decimal(&self, scale: u8) -> Option<i128> {
        match self {
            ColumnValue::Decimal {
                unscaled,
                scale: cur_scale,
                ..
            } => {
                if *cur_scale == scale {
                    Some(*unscaled)
                } else if *cur_scale < scale {
                    10i128
                        .checked_pow((scale - cur_scale) as u32)
                        .and_then(|f| unscaled.checked_mul(f))
                } else {
                    let divisor = 10i128.checked_pow((cur_scale - scale) as u32)?;
                    Some(unscaled / divisor)
                }
            }
            _ => None,
        }
    }

    /// Promote a `Date` value to a `DateTime` canonical integer (midnight
    /// of that day), for mixed date/datetime comparisons.
    pub fn date_to_datetime_micros(days: i32) -> i64 {
        const MICROS_PER_DAY: i64 = 86_400_000_000;
        days as i64 * MICROS_PER_DAY
    }

    /// Rescale a decimal to `scale` and pin its precision to a fixed
    /// sentinel, so two decimals that represent the same number but were
    /// typed at different (precision, scale) compare equal and hash
    /// identically once both are canonicalized to the same target scale.
    /// Non-decimal values pass through unchanged.
    pub fn canonicalize_decimal(&self, scale: u8) -> ColumnValue {
        match self {
            ColumnValue::Decimal { scale: cur_scale, .. } => {
                let unscaled = if *cur_scale == scale {
                    match self {
                        ColumnValue::Decimal { unscaled, .. } => *unscaled,
                        _ => unreachable!(),
                    }
                } else {
                    self.rescaled_decimal(scale).unwrap_or(match self {
                        ColumnValue::Decimal { unscaled, .. } => *unscaled,
                        _ => unreachable!(),
                    })
                };
                ColumnValue::Decimal {
                    unscaled,
                    precision: 38,
                    scale,
                }
            }
            other => other.clone(),
        }
    }

    /// Byte-string ordering used for all `Char`/`VarChar`/`String`
    /// comparisons, per the lexicographic rule.
    pub fn bytes_cmp(&self, other: &ColumnValue) -> Option<Ordering> {
        match (self, other) {
            (ColumnValue::Bytes(a), ColumnValue::Bytes(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

/// Total order over non-null `ColumnValue`s of the same logical family,
/// following the numeric/datetime/decimal/byte-string rules in the spec.
/// NaN floats are treated as incomparable (`None`), never "in range".
impl PartialOrd for ColumnValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        use ColumnValue::*;
        match (self, other) {
            (Null, _) | (_, Null) => None,
            (Bool(a), Bool(b)) => a.partial_cmp(b),
            (Int8(a), Int8(b)) => a.partial_cmp(b),
            (Int16(a), Int16(b)) => a.partial_cmp(b),
            (Int32(a), Int32(b)) => a.partial_cmp(b),
            (Int64(a), Int64(b)) => a.partial_cmp(b),
            (Int128(a), Int128(b)) => a.partial_cmp(b),
            (Float(a), Float(b)) => a.partial_cmp(b),
            (Double(a), Double(b)) => a.partial_cmp(b),
            (Date(a), Date(b)) => a.partial_cmp(b),
            (DateTime(a), DateTime(b)) => a.partial_cmp(b),
            (Date(a), DateTime(b)) => {
                Self::date_to_datetime_micros(*a).partial_cmp(b)
            }
            (DateTime(a), Date(b)) => {
                a.partial_cmp(&Self::date_to_datetime_micros(*b))
            }
            (
                Decimal { scale: s1, .. },
                Decimal { scale: s2, .. },
            ) => {
                let scale = (*s1).max(*s2);
                let a = self.rescaled_decimal(scale)?;
                let b = other.rescaled_decimal(scale)?;
                a.partial_cmp(&b)
            }
            (Bytes(a), Bytes(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}
