use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

use crate::data::Dataset;
use crate::engines::codegen::expression_to_c;
use crate::engines::evaluation::FitnessEvaluator;
use crate::engines::generation::ast::ExpressionNode;
use crate::engines::generation::report_queue::{Improvement, ReportConsumer};
use crate::types::{ClassCounts, Mode};
use crate::utils::format::{group_thousands, rounded};

/// Validation counts are skipped for improvements from the first generations,
/// which arrive too fast to be worth a full pass.
pub const SKIP_VALIDATION_GENERATIONS: u64 = 10;

/// Everything worth knowing about one reported solution.
#[derive(Debug, Clone)]
pub struct SolutionReport {
    pub mode: Mode,
    pub generation: Option<u64>,
    pub tries: Option<usize>,
    pub found_at: DateTime<Utc>,
    pub training_size: usize,
    pub fitness: f64,
    pub counts: Option<ClassCounts>,
    pub node_count: usize,
    pub complexity: f64,
    pub branch_count: usize,
    pub formula: String,
    pub c_code: Option<String>,
}

impl fmt::Display for SolutionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(generation) = self.generation {
            writeln!(f, "Generations:      {}", generation)?;
        }
        if let Some(tries) = self.tries {
            writeln!(f, "Tries:            {}", tries)?;
        }
        writeln!(f, "Training Size:    {}", group_thousands(self.training_size))?;
        writeln!(f, "Time:             {}", self.found_at.to_rfc3339())?;
        writeln!(f, "Fitness:          {} (lower = better)", rounded(self.fitness, 4))?;
        writeln!(f)?;
        if let Some(counts) = &self.counts {
            writeln!(f, "{}", counts)?;
        }
        writeln!(
            f,
            "Node Count:       {} (complexity = {})",
            self.node_count,
            rounded(self.complexity, 8)
        )?;
        writeln!(f, "Branch Count:     {}", self.branch_count)?;
        writeln!(f, "Mode:             {}", self.mode)?;
        write!(f, "{}", self.formula)?;
        if let Some(code) = &self.c_code {
            write!(f, "\n{}", code)?;
        }
        Ok(())
    }
}

/// Report consumer that checks each improvement on the validation data and
/// logs a [`SolutionReport`].
pub struct LogReporter {
    evaluator: FitnessEvaluator,
    validation: Arc<Dataset>,
    training_size: usize,
    history: Vec<SolutionReport>,
}

impl LogReporter {
    pub fn new(evaluator: FitnessEvaluator, validation: Arc<Dataset>, training_size: usize) -> Self {
        Self {
            evaluator,
            validation,
            training_size,
            history: Vec::new(),
        }
    }

    pub fn reports(&self) -> &[SolutionReport] {
        &self.history
    }

    pub fn build_report(
        &self,
        expression: &ExpressionNode,
        fitness: f64,
        generation: Option<u64>,
        found_at: DateTime<Utc>,
    ) -> SolutionReport {
        let validate = generation.map_or(true, |g| g > SKIP_VALIDATION_GENERATIONS);
        let counts = if validate && !self.validation.is_empty() {
            Some(self.evaluator.evaluate_with_counts(&self.validation, expression).1)
        } else {
            None
        };

        let c_code = match expression_to_c(expression) {
            Ok(code) => Some(code),
            Err(e) => {
                log::warn!("Could not lower {} to C: {}", expression, e);
                None
            }
        };

        SolutionReport {
            mode: self.evaluator.mode(),
            generation,
            tries: None,
            found_at,
            training_size: self.training_size,
            fitness,
            counts,
            node_count: expression.node_count(),
            complexity: self.evaluator.complexity(expression.node_count()),
            branch_count: expression.branch_count(),
            formula: expression.to_formula(),
            c_code,
        }
    }

    /// Reports a ranked seed formula.
    pub fn report_initial(&mut self, expression: &ExpressionNode, fitness: f64) {
        let report = self.build_report(expression, fitness, None, Utc::now());
        log::info!("Initial solution\n{}", report);
        self.history.push(report);
    }

    /// Reports a solution coming out of constant refinement.
    pub fn report_refined(&mut self, expression: &ExpressionNode, fitness: f64, tries: usize) {
        let mut report = self.build_report(expression, fitness, None, Utc::now());
        report.tries = Some(tries);
        log::info!("Refined solution\n{}", report);
        self.history.push(report);
    }
}

impl ReportConsumer for LogReporter {
    fn process(&mut self, item: Improvement) {
        let report = self.build_report(
            &item.expression,
            item.fitness,
            Some(item.generation),
            item.found_at,
        );
        log::info!("New best solution\n{}", report);
        self.history.push(report);
    }

    fn on_stop(&mut self) {
        log::debug!("Log reporter wrote {} reports", self.history.len());
    }
}
