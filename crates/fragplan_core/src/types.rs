use std::fmt;

use fragplan_error::{DbError, Result};
use serde::{Deserialize, Serialize};

/// Value types understood by the execution engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Null,
    Boolean,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Float,
    Decimal,
    Timestamp,
    Varchar,
    Varbinary,
}

impl ValueType {
    /// Byte size for fixed width types, None for variable length types.
    pub const fn fixed_size(&self) -> Option<usize> {
        match self {
            Self::Null => Some(0),
            Self::Boolean | Self::TinyInt => Some(1),
            Self::SmallInt => Some(2),
            Self::Integer => Some(4),
            Self::BigInt | Self::Float | Self::Timestamp => Some(8),
            Self::Decimal => Some(16),
            Self::Varchar | Self::Varbinary => None,
        }
    }

    /// Size to use when nothing more specific is known.
    pub const fn default_size(&self) -> usize {
        match self.fixed_size() {
            Some(size) => size,
            None => 0,
        }
    }

    pub const fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::TinyInt | Self::SmallInt | Self::Integer | Self::BigInt
        )
    }

    /// Inclusive range of values an integer type can hold.
    const fn integer_range(&self) -> Option<(i64, i64)> {
        match self {
            Self::TinyInt => Some((i8::MIN as i64, i8::MAX as i64)),
            Self::SmallInt => Some((i16::MIN as i64, i16::MAX as i64)),
            Self::Integer => Some((i32::MIN as i64, i32::MAX as i64)),
            Self::BigInt => Some((i64::MIN, i64::MAX)),
            _ => None,
        }
    }

    /// Result type of arithmetic between two types.
    pub fn promote(left: ValueType, right: ValueType) -> ValueType {
        match (left, right) {
            (Self::Float, _) | (_, Self::Float) => Self::Float,
            (Self::Decimal, _) | (_, Self::Decimal) => Self::Decimal,
            _ => Self::BigInt,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Null => "NULL",
            Self::Boolean => "BOOLEAN",
            Self::TinyInt => "TINYINT",
            Self::SmallInt => "SMALLINT",
            Self::Integer => "INTEGER",
            Self::BigInt => "BIGINT",
            Self::Float => "FLOAT",
            Self::Decimal => "DECIMAL",
            Self::Timestamp => "TIMESTAMP",
            Self::Varchar => "VARCHAR",
            Self::Varbinary => "VARBINARY",
        };
        write!(f, "{s}")
    }
}

/// A single literal value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarValue {
    Null,
    Boolean(bool),
    Int(i64),
    Float(f64),
    /// Decimals are carried in their textual form.
    Decimal(String),
    /// Microseconds since epoch.
    Timestamp(i64),
    Varchar(String),
    Varbinary(Vec<u8>),
}

impl ScalarValue {
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The natural type of this value absent any column context.
    pub const fn value_type(&self) -> ValueType {
        match self {
            Self::Null => ValueType::Null,
            Self::Boolean(_) => ValueType::Boolean,
            Self::Int(_) => ValueType::BigInt,
            Self::Float(_) => ValueType::Float,
            Self::Decimal(_) => ValueType::Decimal,
            Self::Timestamp(_) => ValueType::Timestamp,
            Self::Varchar(_) => ValueType::Varchar,
            Self::Varbinary(_) => ValueType::Varbinary,
        }
    }

    pub fn value_size(&self) -> usize {
        match self {
            Self::Varchar(s) => s.len(),
            Self::Varbinary(b) => b.len(),
            other => other.value_type().default_size(),
        }
    }

    /// Convert this value so that it can be stored in a column of type `to`
    /// with declared size `size`.
    ///
    /// `size` is only checked for variable length types.
    pub fn cast_to(&self, to: ValueType, size: usize) -> Result<ScalarValue> {
        let cast_err = || {
            DbError::new("Cannot convert value to column type")
                .with_field("value", self)
                .with_field("type", to)
        };

        let value = match (self, to) {
            (Self::Null, _) => Self::Null,
            (Self::Boolean(v), ValueType::Boolean) => Self::Boolean(*v),
            (Self::Int(v), t) if t.is_integer() => {
                Self::Int(check_integer_range(*v, t).ok_or_else(cast_err)?)
            }
            (Self::Int(v), ValueType::Float) => Self::Float(*v as f64),
            (Self::Int(v), ValueType::Decimal) => Self::Decimal(v.to_string()),
            (Self::Int(v), ValueType::Timestamp) => Self::Timestamp(*v),
            (Self::Float(v), ValueType::Float) => Self::Float(*v),
            (Self::Float(v), ValueType::Decimal) => Self::Decimal(v.to_string()),
            (Self::Float(v), t) if t.is_integer() => {
                // `as` saturates, so bounds are checked before the conversion.
                let in_range = *v >= i64::MIN as f64 && *v < i64::MAX as f64;
                if !v.is_finite() || v.fract() != 0.0 || !in_range {
                    return Err(cast_err());
                }
                Self::Int(check_integer_range(*v as i64, t).ok_or_else(cast_err)?)
            }
            (Self::Decimal(v), ValueType::Decimal) => Self::Decimal(v.clone()),
            (Self::Decimal(v), ValueType::Float) => {
                Self::Float(v.parse::<f64>().map_err(|_| cast_err())?)
            }
            (Self::Timestamp(v), ValueType::Timestamp) => Self::Timestamp(*v),
            (Self::Timestamp(v), ValueType::BigInt) => Self::Int(*v),
            (Self::Varchar(v), ValueType::Varchar) => {
                // Declared in characters.
                if size > 0 && v.chars().count() > size {
                    return Err(cast_err().with_field("size", size));
                }
                Self::Varchar(v.clone())
            }
            (Self::Varchar(v), t) if t.is_integer() => {
                let parsed = v.trim().parse::<i64>().map_err(|_| cast_err())?;
                Self::Int(check_integer_range(parsed, t).ok_or_else(cast_err)?)
            }
            (Self::Varchar(v), ValueType::Float) => {
                Self::Float(v.trim().parse::<f64>().map_err(|_| cast_err())?)
            }
            (Self::Varchar(v), ValueType::Decimal) => {
                v.trim().parse::<f64>().map_err(|_| cast_err())?;
                Self::Decimal(v.trim().to_string())
            }
            (Self::Varchar(v), ValueType::Timestamp) => {
                Self::Timestamp(v.trim().parse::<i64>().map_err(|_| cast_err())?)
            }
            (Self::Varbinary(v), ValueType::Varbinary) => {
                if size > 0 && v.len() > size {
                    return Err(cast_err().with_field("size", size));
                }
                Self::Varbinary(v.clone())
            }
            _ => return Err(cast_err()),
        };

        Ok(value)
    }
}

fn check_integer_range(v: i64, ty: ValueType) -> Option<i64> {
    let (min, max) = ty.integer_range()?;
    if v < min || v > max { None } else { Some(v) }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Decimal(v) => write!(f, "{v}"),
            Self::Timestamp(v) => write!(f, "TIMESTAMP {v}"),
            Self::Varchar(v) => write!(f, "'{v}'"),
            Self::Varbinary(v) => {
                write!(f, "x'")?;
                for b in v {
                    write!(f, "{b:02x}")?;
                }
                write!(f, "'")
            }
        }
    }
}

impl From<i64> for ScalarValue {
    fn from(value: i64) -> Self {
        ScalarValue::Int(value)
    }
}

impl From<i32> for ScalarValue {
    fn from(value: i32) -> Self {
        ScalarValue::Int(value as i64)
    }
}

impl From<f64> for ScalarValue {
    fn from(value: f64) -> Self {
        ScalarValue::Float(value)
    }
}

impl From<bool> for ScalarValue {
    fn from(value: bool) -> Self {
        ScalarValue::Boolean(value)
    }
}

impl From<&str> for ScalarValue {
    fn from(value: &str) -> Self {
        ScalarValue::Varchar(value.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(value: String) -> Self {
        ScalarValue::Varchar(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cast_int_into_smaller_types() {
        let v = ScalarValue::Int(120);
        assert_eq!(ScalarValue::Int(120), v.cast_to(ValueType::TinyInt, 1).unwrap());

        let v = ScalarValue::Int(300);
        v.cast_to(ValueType::TinyInt, 1).unwrap_err();
    }

    #[test]
    fn cast_string_to_integer() {
        let v = ScalarValue::from("42");
        assert_eq!(ScalarValue::Int(42), v.cast_to(ValueType::Integer, 4).unwrap());

        let v = ScalarValue::from("forty two");
        let err = v.cast_to(ValueType::Integer, 4).unwrap_err();
        assert!(!err.is_planning_error());
    }

    #[test]
    fn cast_varchar_respects_size() {
        let v = ScalarValue::from("abcdef");
        v.cast_to(ValueType::Varchar, 3).unwrap_err();
        assert_eq!(v, v.cast_to(ValueType::Varchar, 10).unwrap());
    }

    #[test]
    fn cast_fractional_float_to_integer_fails() {
        ScalarValue::Float(1.5)
            .cast_to(ValueType::BigInt, 8)
            .unwrap_err();
        assert_eq!(
            ScalarValue::Int(2),
            ScalarValue::Float(2.0).cast_to(ValueType::BigInt, 8).unwrap()
        );
    }

    #[test]
    fn cast_out_of_range_float_to_integer_fails() {
        let err = ScalarValue::Float(1e30)
            .cast_to(ValueType::BigInt, 8)
            .unwrap_err();
        assert!(!err.is_planning_error());
        ScalarValue::Float(-1e30)
            .cast_to(ValueType::BigInt, 8)
            .unwrap_err();
        ScalarValue::Float(9_223_372_036_854_775_808.0)
            .cast_to(ValueType::BigInt, 8)
            .unwrap_err();
        assert_eq!(
            ScalarValue::Int(i64::MIN),
            ScalarValue::Float(i64::MIN as f64)
                .cast_to(ValueType::BigInt, 8)
                .unwrap()
        );
    }

    #[test]
    fn cast_varchar_size_counts_characters() {
        let v = ScalarValue::from("héllo");
        assert_eq!(v, v.cast_to(ValueType::Varchar, 5).unwrap());
        v.cast_to(ValueType::Varchar, 4).unwrap_err();
    }

    #[test]
    fn null_casts_to_anything() {
        assert_eq!(
            ScalarValue::Null,
            ScalarValue::Null.cast_to(ValueType::Varbinary, 4).unwrap()
        );
    }

    #[test]
    fn promote_types() {
        assert_eq!(
            ValueType::BigInt,
            ValueType::promote(ValueType::Integer, ValueType::TinyInt)
        );
        assert_eq!(
            ValueType::Float,
            ValueType::promote(ValueType::Integer, ValueType::Float)
        );
    }
}
