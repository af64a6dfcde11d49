use std::fmt;

use serde::{Deserialize, Serialize};

use super::Expression;
use crate::types::ValueType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateFunction {
    Count,
    CountStar,
    Sum,
    Min,
    Max,
    Avg,
}

impl AggregateFunction {
    /// Return type of the aggregate given the input type.
    pub fn return_type(&self, input: Option<ValueType>) -> ValueType {
        match self {
            Self::Count | Self::CountStar => ValueType::BigInt,
            Self::Sum => match input {
                Some(t) if t.is_integer() => ValueType::BigInt,
                Some(t) => t,
                None => ValueType::BigInt,
            },
            Self::Min | Self::Max | Self::Avg => input.unwrap_or(ValueType::Null),
        }
    }
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count | Self::CountStar => write!(f, "COUNT"),
            Self::Sum => write!(f, "SUM"),
            Self::Min => write!(f, "MIN"),
            Self::Max => write!(f, "MAX"),
            Self::Avg => write!(f, "AVG"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateExpr {
    pub function: AggregateFunction,
    #[serde(default)]
    pub distinct: bool,
    /// Input to the aggregate. `None` for COUNT(*) as written by the user.
    #[serde(default)]
    pub input: Option<Box<Expression>>,
    pub value_type: ValueType,
    #[serde(default)]
    pub value_size: usize,
}

impl AggregateExpr {
    pub fn new(function: AggregateFunction, distinct: bool, input: Option<Expression>) -> Self {
        let value_type = function.return_type(input.as_ref().map(|e| e.value_type()));
        AggregateExpr {
            function,
            distinct,
            input: input.map(Box::new),
            value_type,
            value_size: value_type.default_size(),
        }
    }

    /// If this is a COUNT(*), either as written or already rewritten.
    pub fn is_count_star(&self) -> bool {
        match self.function {
            AggregateFunction::CountStar => true,
            AggregateFunction::Count => self.input.is_none(),
            _ => false,
        }
    }
}

impl fmt::Display for AggregateExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.function)?;
        if self.distinct {
            write!(f, "DISTINCT ")?;
        }
        match (&self.input, self.is_count_star()) {
            (_, true) => write!(f, "*")?,
            (Some(input), false) => write!(f, "{input}")?,
            (None, false) => (),
        }
        write!(f, ")")
    }
}
