use crate::error::{Result, TapholdError};
use crate::functions::Operator;
use crate::types::{Mode, TrainCol};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Expression tree node
///
/// `Var` holds a training row column index. Only `Const` leaves change after
/// construction, and only through [`ExpressionNode::set_constants`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExpressionNode {
    Op {
        op: Operator,
        children: Vec<ExpressionNode>,
    },
    Var(usize),
    Const(f64),
}

impl ExpressionNode {
    pub fn op(op: Operator, children: Vec<ExpressionNode>) -> Result<Self> {
        if children.len() != op.arity() {
            return Err(TapholdError::InvalidExpression(format!(
                "{} takes {} argument(s), got {}",
                op,
                op.arity(),
                children.len()
            )));
        }
        Ok(ExpressionNode::Op { op, children })
    }

    pub fn binary(op: Operator, a: ExpressionNode, b: ExpressionNode) -> Self {
        ExpressionNode::Op {
            op,
            children: vec![a, b],
        }
    }

    pub fn unary(op: Operator, a: ExpressionNode) -> Self {
        ExpressionNode::Op {
            op,
            children: vec![a],
        }
    }

    pub fn var(col: TrainCol) -> Self {
        ExpressionNode::Var(col.index())
    }

    pub fn node_count(&self) -> usize {
        match self {
            ExpressionNode::Op { children, .. } => {
                1 + children.iter().map(|c| c.node_count()).sum::<usize>()
            }
            _ => 1,
        }
    }

    pub fn depth(&self) -> usize {
        match self {
            ExpressionNode::Op { children, .. } => {
                1 + children.iter().map(|c| c.depth()).max().unwrap_or(0)
            }
            _ => 1,
        }
    }

    /// Number of operators that lower to a branch (`sd`, `lts`, `max`, `min`, `abs`)
    pub fn branch_count(&self) -> usize {
        match self {
            ExpressionNode::Op { op, children } => {
                let own = usize::from(op.primitive().is_branching());
                own + children.iter().map(|c| c.branch_count()).sum::<usize>()
            }
            _ => 0,
        }
    }

    pub fn constant_count(&self) -> usize {
        match self {
            ExpressionNode::Op { children, .. } => {
                children.iter().map(|c| c.constant_count()).sum()
            }
            ExpressionNode::Const(_) => 1,
            ExpressionNode::Var(_) => 0,
        }
    }

    /// Constant leaf values in pre-order (the weight vector layout).
    pub fn constants(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.constant_count());
        self.collect_constants(&mut out);
        out
    }

    fn collect_constants(&self, out: &mut Vec<f64>) {
        match self {
            ExpressionNode::Op { children, .. } => {
                for child in children {
                    child.collect_constants(out);
                }
            }
            ExpressionNode::Const(v) => out.push(*v),
            ExpressionNode::Var(_) => {}
        }
    }

    /// Writes `values` into the constant leaves, in pre-order.
    pub fn set_constants(&mut self, values: &[f64]) -> Result<()> {
        let expected = self.constant_count();
        if values.len() != expected {
            return Err(TapholdError::InvalidExpression(format!(
                "expected {} constants, got {}",
                expected,
                values.len()
            )));
        }
        let mut next = 0;
        self.write_constants(values, &mut next);
        Ok(())
    }

    fn write_constants(&mut self, values: &[f64], next: &mut usize) {
        match self {
            ExpressionNode::Op { children, .. } => {
                for child in children {
                    child.write_constants(values, next);
                }
            }
            ExpressionNode::Const(v) => {
                *v = values[*next];
                *next += 1;
            }
            ExpressionNode::Var(_) => {}
        }
    }

    /// Replaces the first `col` leaf in breadth-first order with a constant.
    ///
    /// Returns the index of the new constant in [`ExpressionNode::constants`],
    /// or `None` when the tree never reads `col`.
    pub fn bind_first_var(&mut self, col: TrainCol, value: f64) -> Option<usize> {
        let path = self.breadth_first_path(col.index())?;

        let mut slot = 0;
        let mut node = self;
        for &step in &path {
            match node {
                ExpressionNode::Op { children, .. } => {
                    slot += children[..step]
                        .iter()
                        .map(|c| c.constant_count())
                        .sum::<usize>();
                    node = &mut children[step];
                }
                _ => return None,
            }
        }
        *node = ExpressionNode::Const(value);
        Some(slot)
    }

    fn breadth_first_path(&self, index: usize) -> Option<Vec<usize>> {
        let mut queue = VecDeque::from([(self, Vec::new())]);
        while let Some((node, path)) = queue.pop_front() {
            match node {
                ExpressionNode::Var(i) if *i == index => return Some(path),
                ExpressionNode::Op { children, .. } => {
                    for (step, child) in children.iter().enumerate() {
                        let mut next = path.clone();
                        next.push(step);
                        queue.push_back((child, next));
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// Checks arities and that every variable is readable in `mode`.
    pub fn validate(&self, mode: Mode) -> Result<()> {
        match self {
            ExpressionNode::Op { op, children } => {
                if children.len() != op.arity() {
                    return Err(TapholdError::InvalidExpression(format!(
                        "{} takes {} argument(s), got {}",
                        op,
                        op.arity(),
                        children.len()
                    )));
                }
                children.iter().try_for_each(|c| c.validate(mode))
            }
            ExpressionNode::Var(index) => match TrainCol::from_index(*index) {
                Some(col) if col.may_use_in(mode) => Ok(()),
                Some(col) => Err(TapholdError::UnknownVariable(col.name().to_string())),
                None => Err(TapholdError::FeatureOutOfRange {
                    index: *index,
                    limit: TrainCol::COUNT,
                }),
            },
            ExpressionNode::Const(v) if !v.is_finite() => Err(
                TapholdError::InvalidExpression(format!("constant {} is not finite", v)),
            ),
            ExpressionNode::Const(_) => Ok(()),
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            ExpressionNode::Op { op, .. } => op.primitive().infix().map_or(u8::MAX, |(_, p)| p),
            _ => u8::MAX,
        }
    }

    /// Renders the tree with `render_leaf` for leaves and `render_call` for
    /// non-infix operators, inserting only the parentheses precedence requires.
    pub(crate) fn render<L, C>(&self, render_leaf: &L, render_call: &C) -> String
    where
        L: Fn(&ExpressionNode) -> String,
        C: Fn(Operator, &[String]) -> String,
    {
        match self {
            ExpressionNode::Op { op, children } => match op.primitive().infix() {
                Some((_, prec)) => {
                    let left = &children[0];
                    let right = &children[1];
                    let mut l = left.render(render_leaf, render_call);
                    let mut r = right.render(render_leaf, render_call);
                    if left.precedence() < prec {
                        l = format!("({})", l);
                    }
                    // a - (b - c) and a*(b*c) keep their grouping
                    if right.precedence() <= prec {
                        r = format!("({})", r);
                    }
                    render_call(*op, &[l, r])
                }
                None => {
                    let args: Vec<String> = children
                        .iter()
                        .map(|c| c.render(render_leaf, render_call))
                        .collect();
                    render_call(*op, &args)
                }
            },
            leaf => render_leaf(leaf),
        }
    }

    /// Formula text in the syntax accepted by the parser.
    pub fn to_formula(&self) -> String {
        self.render(
            &|leaf| match leaf {
                ExpressionNode::Var(i) => TrainCol::from_index(*i)
                    .map(|c| c.name().to_string())
                    .unwrap_or_else(|| format!("feature_{}", i)),
                ExpressionNode::Const(v) => format!("{:?}", v),
                ExpressionNode::Op { .. } => unreachable!("render passes leaves only"),
            },
            &|op, args| match op.primitive().infix() {
                Some(("*", _)) => format!("{}*{}", args[0], args[1]),
                Some((symbol, _)) => format!("{} {} {}", args[0], symbol, args[1]),
                None => format!("{}({})", op.alias(), args.join(", ")),
            },
        )
    }

    /// Shortened formula for log lines
    pub fn to_formula_short(&self, max_len: usize) -> String {
        let full = self.to_formula();
        if full.chars().count() <= max_len {
            full
        } else {
            let cut: String = full.chars().take(max_len.saturating_sub(3)).collect();
            format!("{}...", cut)
        }
    }
}

impl fmt::Display for ExpressionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_formula())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ExpressionNode {
        // abs(sd(x - 4.0, 2.0))
        ExpressionNode::unary(
            Operator::Abs,
            ExpressionNode::binary(
                Operator::Sd,
                ExpressionNode::binary(
                    Operator::Sub,
                    ExpressionNode::var(TrainCol::PthPrevOverlapDur),
                    ExpressionNode::Const(4.0),
                ),
                ExpressionNode::Const(2.0),
            ),
        )
    }

    #[test]
    fn test_counts() {
        let tree = sample();
        assert_eq!(tree.node_count(), 6);
        assert_eq!(tree.depth(), 4);
        assert_eq!(tree.branch_count(), 2);
        assert_eq!(tree.constants(), vec![4.0, 2.0]);
    }

    #[test]
    fn test_set_constants_pre_order() {
        let mut tree = sample();
        tree.set_constants(&[7.0, 9.0]).unwrap();
        assert_eq!(tree.constants(), vec![7.0, 9.0]);
        assert!(tree.set_constants(&[1.0]).is_err());
    }

    #[test]
    fn test_bind_first_var_breadth_first() {
        // sd(x - 4.0, 2.0) + x: the shallow x is bound, after both constants
        let x = TrainCol::PthPrevOverlapDur;
        let mut tree = ExpressionNode::binary(
            Operator::Add,
            ExpressionNode::binary(
                Operator::Sd,
                ExpressionNode::binary(Operator::Sub, ExpressionNode::var(x), ExpressionNode::Const(4.0)),
                ExpressionNode::Const(2.0),
            ),
            ExpressionNode::var(x),
        );
        assert_eq!(tree.bind_first_var(x, 30.0), Some(2));
        assert_eq!(tree.constants(), vec![4.0, 2.0, 30.0]);

        // the deeper x goes next, ahead of every constant
        assert_eq!(tree.bind_first_var(x, 10.0), Some(0));
        assert_eq!(tree.constants(), vec![10.0, 4.0, 2.0, 30.0]);
        assert_eq!(tree.bind_first_var(x, 1.0), None);
    }

    #[test]
    fn test_formula_parentheses() {
        let tree = ExpressionNode::binary(
            Operator::Mul,
            ExpressionNode::binary(
                Operator::Add,
                ExpressionNode::Const(1.0),
                ExpressionNode::var(TrainCol::DownCount),
            ),
            ExpressionNode::Const(2.0),
        );
        assert_eq!(tree.to_formula(), "(1.0 + down_count)*2.0");
    }

    #[test]
    fn test_validate_rejects_disabled_column() {
        let tree = ExpressionNode::var(TrainCol::PthSecondPressToThirdPressDur);
        assert!(tree.validate(Mode::ThirdDown).is_ok());
        assert!(matches!(
            tree.validate(Mode::FastStreakTap),
            Err(TapholdError::UnknownVariable(_))
        ));
        assert!(matches!(
            ExpressionNode::Var(99).validate(Mode::ThirdDown),
            Err(TapholdError::FeatureOutOfRange { index: 99, .. })
        ));
    }
}
