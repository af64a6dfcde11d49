use std::fmt;

use serde::{Deserialize, Serialize};

use super::Expression;
use crate::types::ValueType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArithOperator {
    Add,
    Sub,
    Div,
    Mul,
    Mod,
}

impl fmt::Display for ArithOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => write!(f, "+"),
            Self::Sub => write!(f, "-"),
            Self::Div => write!(f, "/"),
            Self::Mul => write!(f, "*"),
            Self::Mod => write!(f, "%"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArithExpr {
    pub op: ArithOperator,
    pub left: Box<Expression>,
    pub right: Box<Expression>,
    pub value_type: ValueType,
    #[serde(default)]
    pub value_size: usize,
}

impl ArithExpr {
    pub fn new(op: ArithOperator, left: Expression, right: Expression) -> Self {
        let value_type = ValueType::promote(left.value_type(), right.value_type());
        ArithExpr {
            op,
            left: Box::new(left),
            right: Box::new(right),
            value_type,
            value_size: value_type.default_size(),
        }
    }
}

impl fmt::Display for ArithExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} {} {})", self.left, self.op, self.right)
    }
}
