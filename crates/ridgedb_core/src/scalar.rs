use std::fmt;

use ridgedb_error::{DbError, ErrorKind, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Null,
    Boolean,
    Int32,
    Int64,
    Utf8,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Boolean => write!(f, "BOOLEAN"),
            Self::Int32 => write!(f, "INT"),
            Self::Int64 => write!(f, "BIGINT"),
            Self::Utf8 => write!(f, "VARCHAR"),
        }
    }
}

/// A single scalar value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScalarValue {
    Null,
    Boolean(bool),
    Int32(i32),
    Int64(i64),
    Utf8(String),
}

impl ScalarValue {
    pub fn datatype(&self) -> DataType {
        match self {
            Self::Null => DataType::Null,
            Self::Boolean(_) => DataType::Boolean,
            Self::Int32(_) => DataType::Int32,
            Self::Int64(_) => DataType::Int64,
            Self::Utf8(_) => DataType::Utf8,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn try_as_bool(&self) -> Result<bool> {
        match self {
            Self::Boolean(v) => Ok(*v),
            other => Err(mismatch(other, DataType::Boolean)),
        }
    }

    pub fn try_as_i64(&self) -> Result<i64> {
        match self {
            Self::Int32(v) => Ok(*v as i64),
            Self::Int64(v) => Ok(*v),
            other => Err(mismatch(other, DataType::Int64)),
        }
    }

    pub fn try_as_i32(&self) -> Result<i32> {
        match self {
            Self::Int32(v) => Ok(*v),
            Self::Int64(v) => i32::try_from(*v).map_err(|_| out_of_range(*v, DataType::Int32)),
            other => Err(mismatch(other, DataType::Int32)),
        }
    }

    pub fn try_as_str(&self) -> Result<&str> {
        match self {
            Self::Utf8(v) => Ok(v.as_str()),
            other => Err(mismatch(other, DataType::Utf8)),
        }
    }

    /// Cast this value to the given type.
    ///
    /// NULL casts to NULL for every type.
    pub fn cast_to(&self, datatype: DataType) -> Result<ScalarValue> {
        if self.is_null() || self.datatype() == datatype {
            return Ok(self.clone());
        }

        Ok(match (self, datatype) {
            (Self::Int32(v), DataType::Int64) => Self::Int64(*v as i64),
            (Self::Int64(_), DataType::Int32) => Self::Int32(self.try_as_i32()?),
            (Self::Int32(v), DataType::Utf8) => Self::Utf8(v.to_string()),
            (Self::Int64(v), DataType::Utf8) => Self::Utf8(v.to_string()),
            (Self::Boolean(v), DataType::Utf8) => Self::Utf8(v.to_string().to_uppercase()),
            (Self::Utf8(s), DataType::Int32) => {
                Self::Int32(s.trim().parse().map_err(|_| mismatch(self, datatype))?)
            }
            (Self::Utf8(s), DataType::Int64) => {
                Self::Int64(s.trim().parse().map_err(|_| mismatch(self, datatype))?)
            }
            (Self::Utf8(s), DataType::Boolean) => match s.trim().to_ascii_uppercase().as_str() {
                "TRUE" => Self::Boolean(true),
                "FALSE" => Self::Boolean(false),
                _ => return Err(mismatch(self, datatype)),
            },
            (_, DataType::Null) => Self::Null,
            _ => return Err(mismatch(self, datatype)),
        })
    }

    /// SQL equality, integers of different widths compare by value.
    ///
    /// NULL is never equal to anything.
    pub fn sql_eq(&self, other: &ScalarValue) -> bool {
        match (self, other) {
            (Self::Null, _) | (_, Self::Null) => false,
            (Self::Int32(_) | Self::Int64(_), Self::Int32(_) | Self::Int64(_)) => {
                self.try_as_i64().ok() == other.try_as_i64().ok()
            }
            (a, b) => a == b,
        }
    }
}

fn mismatch(value: &ScalarValue, want: DataType) -> DbError {
    DbError::new_kind(ErrorKind::EvaluationError, "Data conversion error")
        .with_field("value", value)
        .with_field("have", value.datatype())
        .with_field("want", want)
}

fn out_of_range(value: i64, want: DataType) -> DbError {
    DbError::new_kind(ErrorKind::EvaluationError, "Numeric value out of range")
        .with_field("value", value)
        .with_field("want", want)
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Boolean(v) => write!(f, "{}", if *v { "TRUE" } else { "FALSE" }),
            Self::Int32(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Utf8(v) => write!(f, "'{v}'"),
        }
    }
}

impl From<bool> for ScalarValue {
    fn from(value: bool) -> Self {
        ScalarValue::Boolean(value)
    }
}

impl From<i32> for ScalarValue {
    fn from(value: i32) -> Self {
        ScalarValue::Int32(value)
    }
}

impl From<i64> for ScalarValue {
    fn from(value: i64) -> Self {
        ScalarValue::Int64(value)
    }
}

impl From<&str> for ScalarValue {
    fn from(value: &str) -> Self {
        ScalarValue::Utf8(value.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(value: String) -> Self {
        ScalarValue::Utf8(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cast_int_widths() {
        assert_eq!(
            ScalarValue::Int64(5),
            ScalarValue::Int32(5).cast_to(DataType::Int64).unwrap()
        );
        let err = ScalarValue::Int64(i64::MAX)
            .cast_to(DataType::Int32)
            .unwrap_err();
        assert_eq!(ErrorKind::EvaluationError, err.kind());
    }

    #[test]
    fn cast_strings() {
        assert_eq!(
            ScalarValue::Int32(12),
            ScalarValue::from(" 12").cast_to(DataType::Int32).unwrap()
        );
        assert_eq!(
            ScalarValue::from("7"),
            ScalarValue::Int64(7).cast_to(DataType::Utf8).unwrap()
        );
        assert!(ScalarValue::from("abc").cast_to(DataType::Int64).is_err());
    }

    #[test]
    fn null_casts_to_null() {
        assert_eq!(
            ScalarValue::Null,
            ScalarValue::Null.cast_to(DataType::Int32).unwrap()
        );
    }

    #[test]
    fn sql_equality() {
        assert!(ScalarValue::Int32(5).sql_eq(&ScalarValue::Int64(5)));
        assert!(!ScalarValue::Null.sql_eq(&ScalarValue::Null));
        assert!(ScalarValue::from("a").sql_eq(&ScalarValue::from("a")));
        assert!(!ScalarValue::from("a").sql_eq(&ScalarValue::Int32(1)));
    }

    #[test]
    fn try_as_i64_rejects_strings() {
        let err = ScalarValue::from("1").try_as_i64().unwrap_err();
        assert_eq!(ErrorKind::EvaluationError, err.kind());
    }
}
