use crate::engines::codegen::common::float_literal;
use crate::engines::generation::ast::ExpressionNode;
use crate::error::{Result, TapholdError};
use crate::types::{Mode, TrainCol};

/// C helpers the lowered expressions call.
pub const C_HELPERS: &str = "\
#define MAX(a, b) ((a) > (b) ? (a) : (b))
#define MIN(a, b) ((a) < (b) ? (a) : (b))
#define ABS(a) ((a) < 0 ? -(a) : (a))
#define LTS(a, b) ((a) < (b) ? (b) - (a) : 0.0f)
#define SD(a, b) ((b) == 0 ? (a) : (a) / (b))
";

/// Expression as a C statement, e.g. `return ABS(SD(pth_prev_overlap_dur - 4.0f, 2.0f));`.
pub fn expression_to_c(tree: &ExpressionNode) -> Result<String> {
    if let Some(index) = first_unknown_variable(tree) {
        return Err(TapholdError::FeatureOutOfRange {
            index,
            limit: TrainCol::COUNT,
        });
    }

    let body = tree.render(
        &|leaf| match leaf {
            ExpressionNode::Var(i) => TrainCol::from_index(*i)
                .map(|col| col.name().to_string())
                .unwrap_or_default(),
            ExpressionNode::Const(v) => float_literal(*v),
            ExpressionNode::Op { .. } => String::new(),
        },
        &|op, args| op.primitive().generate_c(args),
    );
    Ok(format!("return {};", body))
}

fn first_unknown_variable(tree: &ExpressionNode) -> Option<usize> {
    match tree {
        ExpressionNode::Var(i) if TrainCol::from_index(*i).is_none() => Some(*i),
        ExpressionNode::Op { children, .. } => children.iter().find_map(first_unknown_variable),
        _ => None,
    }
}

/// Complete C function for `mode` returning the expression's value.
pub fn expression_function(tree: &ExpressionNode, mode: Mode) -> Result<String> {
    let statement = expression_to_c(tree)?;
    Ok(format!(
        "float {}(void) {{\n    {}\n}}\n",
        mode.prediction_function_name(),
        statement
    ))
}
