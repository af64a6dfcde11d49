use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{ScalarValue, ValueType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiteralExpr {
    pub value: ScalarValue,
    pub value_type: ValueType,
    pub value_size: usize,
}

impl LiteralExpr {
    pub fn new(value: ScalarValue) -> Self {
        let value_type = value.value_type();
        let value_size = value.value_size();
        LiteralExpr {
            value,
            value_type,
            value_size,
        }
    }

    pub fn null() -> Self {
        Self::new(ScalarValue::Null)
    }
}

impl fmt::Display for LiteralExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// A statement parameter, bound at execution time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParameterExpr {
    /// Zero-based parameter index.
    pub index: usize,
    pub value_type: ValueType,
    #[serde(default)]
    pub value_size: usize,
}

impl fmt::Display for ParameterExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{}", self.index)
    }
}
