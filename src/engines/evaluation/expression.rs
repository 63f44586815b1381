use crate::engines::generation::ast::ExpressionNode;
use crate::functions::Operator;
use std::fmt;

/// Anything that maps a training row to a raw output.
///
/// Expression trees return a hold confidence (or a duration in overlap mode),
/// decision trees return their leaf output.
pub trait Predictor: Sync {
    fn predict(&self, features: &[f64]) -> f64;

    /// Size used by the complexity term of the fitness.
    fn node_count(&self) -> usize;
}

impl ExpressionNode {
    /// Evaluates the tree on one row. Variables index `features` directly,
    /// so the tree must have passed [`ExpressionNode::validate`].
    pub fn evaluate(&self, features: &[f64]) -> f64 {
        match self {
            ExpressionNode::Const(v) => *v,
            ExpressionNode::Var(i) => features[*i],
            ExpressionNode::Op { op, children } => match op {
                Operator::Abs => children[0].evaluate(features).abs(),
                _ => {
                    let a = children[0].evaluate(features);
                    let b = children[1].evaluate(features);
                    op.apply2(a, b)
                }
            },
        }
    }
}

impl Predictor for ExpressionNode {
    fn predict(&self, features: &[f64]) -> f64 {
        self.evaluate(features)
    }

    fn node_count(&self) -> usize {
        ExpressionNode::node_count(self)
    }
}

/// Adapts a closure to [`Predictor`].
pub struct FnPredictor<F> {
    func: F,
    node_count: usize,
}

impl<F> FnPredictor<F>
where
    F: Fn(&[f64]) -> f64 + Sync,
{
    pub fn new(node_count: usize, func: F) -> Self {
        Self { func, node_count }
    }
}

impl<F> Predictor for FnPredictor<F>
where
    F: Fn(&[f64]) -> f64 + Sync,
{
    fn predict(&self, features: &[f64]) -> f64 {
        (self.func)(features)
    }

    fn node_count(&self) -> usize {
        self.node_count
    }
}

/// Summary of a predictor's raw outputs over a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputStats {
    pub min: f64,
    pub max: f64,
    pub median: f64,
    pub unique: usize,
}

impl OutputStats {
    /// `None` for an empty row set.
    pub fn collect<'a, P, I>(predictor: &P, rows: I) -> Option<OutputStats>
    where
        P: Predictor + ?Sized,
        I: IntoIterator<Item = &'a [f64]>,
    {
        let mut outputs: Vec<f64> = rows.into_iter().map(|r| predictor.predict(r)).collect();
        if outputs.is_empty() {
            return None;
        }
        outputs.sort_by(|a, b| a.total_cmp(b));

        let n = outputs.len();
        let median = if n % 2 == 0 {
            (outputs[n / 2 - 1] + outputs[n / 2]) / 2.0
        } else {
            outputs[n / 2]
        };

        let mut unique = 1;
        for w in outputs.windows(2) {
            if w[0].to_bits() != w[1].to_bits() {
                unique += 1;
            }
        }

        Some(OutputStats {
            min: outputs[0],
            max: outputs[n - 1],
            median,
            unique,
        })
    }
}

impl fmt::Display for OutputStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "min:              {}", self.min)?;
        writeln!(f, "max:              {}", self.max)?;
        writeln!(f, "median:           {}", self.median)?;
        write!(f, "unique:           {}", self.unique)
    }
}
