use std::collections::HashMap;

use fragplan_error::Result;

use super::Expression;
use crate::types::ValueType;

/// Coerce an expression being written into a column to the column's type.
///
/// Literals are converted eagerly and fail if the value can't be represented
/// in the target type. Parameters take on the column type, and the type is
/// recorded in `param_overrides` so the parameter is bound with the type the
/// column needs.
pub fn coerce_for_write(
    expr: &mut Expression,
    value_type: ValueType,
    value_size: usize,
    param_overrides: &mut HashMap<usize, ValueType>,
) -> Result<()> {
    match expr {
        Expression::Literal(literal) => {
            literal.value = literal.value.cast_to(value_type, value_size)?;
            literal.value_type = value_type;
            literal.value_size = value_size;
        }
        Expression::Parameter(param) => {
            param.value_type = value_type;
            param.value_size = value_size;
            param_overrides.insert(param.index, value_type);
        }
        other => other.set_output_type(value_type, value_size),
    }
    Ok(())
}
