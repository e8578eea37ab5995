//! [`LiteralBuilder`]: builds typed literal predicate nodes for the
//! expression evaluator to consume. Grounded on `core::port::Record`'s
//! typed `insert`/`get` surface, generalized from JSON values to the
//! filter subsystem's own closed `ColumnValue` enum.

use crate::filter::error::{FilterError, FilterResult};
use crate::filter::expr::Literal;
use crate::filter::types::{ColumnType, ColumnValue};

pub struct LiteralBuilder;

impl LiteralBuilder {
    pub fn bool(v: bool) -> Literal {
        Literal {
            value: ColumnValue::Bool(v),
            column_type: ColumnType::Bool,
        }
    }

    pub fn int(v: i128, column_type: ColumnType) -> FilterResult<Literal> {
        let value = match column_type {
            ColumnType::Int8 => ColumnValue::Int8(i8::try_from(v)?),
            ColumnType::Int16 => ColumnValue::Int16(i16::try_from(v)?),
            ColumnType::Int32 => ColumnValue::Int32(i32::try_from(v)?),
            ColumnType::Int64 => ColumnValue::Int64(i64::try_from(v)?),
            ColumnType::Int128 => ColumnValue::Int128(v),
            other => {
                return Err(FilterError::InvalidConfig(format!(
                    "{other:?} is not an integer literal type"
                )))
            }
        };
        Ok(Literal { value, column_type })
    }

    pub fn float(v: f32) -> Literal {
        Literal {
            value: ColumnValue::Float(v),
            column_type: ColumnType::Float,
        }
    }

    pub fn double(v: f64) -> Literal {
        Literal {
            value: ColumnValue::Double(v),
            column_type: ColumnType::Double,
        }
    }

    /// Decimals are parsed from their string encoding, never via a float
    /// intermediate, to avoid double-rounding.
    pub fn decimal(
        raw: &str,
        precision: u8,
        scale: u8,
        column_type: ColumnType,
    ) -> FilterResult<Literal> {
        if !column_type.is_decimal() {
            return Err(FilterError::InvalidConfig(format!(
                "{column_type:?} is not a decimal literal type"
            )));
        }
        let unscaled = parse_decimal_string(raw, scale)?;
        Ok(Literal {
            value: ColumnValue::Decimal {
                unscaled,
                precision,
                scale,
            },
            column_type,
        })
    }

    pub fn date(days_since_epoch: i32, column_type: ColumnType) -> FilterResult<Literal> {
        match column_type {
            ColumnType::Date | ColumnType::DateV2 => Ok(Literal {
                value: ColumnValue::Date(days_since_epoch),
                column_type,
            }),
            other => Err(FilterError::InvalidConfig(format!(
                "{other:?} is not a date literal type"
            ))),
        }
    }

    pub fn datetime(micros_since_epoch: i64, column_type: ColumnType) -> FilterResult<Literal> {
        match column_type {
            ColumnType::DateTime | ColumnType::DateTimeV2 | ColumnType::Time => Ok(Literal {
                value: ColumnValue::DateTime(micros_since_epoch),
                column_type,
            }),
            other => Err(FilterError::InvalidConfig(format!(
                "{other:?} is not a datetime/time literal type"
            ))),
        }
    }

    /// String literals carry raw bytes, never a lossy re-encoding.
    pub fn string(bytes: Vec<u8>, column_type: ColumnType) -> FilterResult<Literal> {
        if !column_type.is_string_like() {
            return Err(FilterError::InvalidConfig(format!(
                "{column_type:?} is not a string literal type"
            )));
        }
        Ok(Literal {
            value: ColumnValue::Bytes(bytes),
            column_type,
        })
    }

    pub fn null(column_type: ColumnType) -> Literal {
        Literal {
            value: ColumnValue::Null,
            column_type,
        }
    }
}

fn parse_decimal_string(raw: &str, scale: u8) -> FilterResult<i128> {
    let (sign, digits) = match raw.strip_prefix('-') {
        Some(rest) => (-1i128, rest),
        None => (1i128, raw),
    };
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, f),
        None => (digits, ""),
    };
    if frac_part.len() > scale as usize {
        return Err(FilterError::InvalidConfig(format!(
            "decimal literal {raw:?} has more fractional digits than scale {scale}"
        )));
    }
    let int_value: i128 = if int_part.is_empty() {
        0
    } else {
        int_part
            .parse()
            .map_err(|_| FilterError::InvalidConfig(format!("invalid decimal literal {raw:?}")))?
    };
    let frac_value: i128 = if frac_part.is_empty() {
        0
    } else {
        frac_part
            .parse()
            .map_err(|_| FilterError::InvalidConfig(format!("invalid decimal literal {raw:?}")))?
    };
    let pad = scale as u32 - frac_part.len() as u32;
    let scale_factor = 10i128.checked_pow(scale as u32).ok_or_else(|| {
        FilterError::InvalidConfig(format!("scale {scale} overflows i128 scaling"))
    })?;
    let frac_scaled = frac_value * 10i128.pow(pad);
    Ok(sign * (int_value * scale_factor + frac_scaled))
}
