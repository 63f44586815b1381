use rand::Rng;

use crate::config::SeedingConfig;
use crate::data::Dataset;
use crate::engines::evaluation::{FitnessEvaluator, OutputStats};
use crate::engines::generation::ast::ExpressionNode;
use crate::engines::generation::hill_climb::{HillClimber, RefinementResult};
use crate::engines::generation::parser::FormulaParser;
use crate::engines::generation::progress::LogReporter;
use crate::error::{Result, TapholdError};
use crate::types::{Mode, TrainCol};

/// Step of the linear initial value scan.
pub const INITIAL_VALUE_STEP: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct RankedSeed {
    pub expression: ExpressionNode,
    pub fitness: f64,
}

/// Best constant found for a column of the best seed.
#[derive(Debug, Clone, PartialEq)]
pub struct InitialValue {
    pub column: TrainCol,
    pub value: i64,
    pub fitness: f64,
    /// The best seed with the column's first occurrence bound to `value`.
    pub expression: ExpressionNode,
}

#[derive(Debug, Clone)]
pub struct SeedingOutcome {
    /// Best first, at most `keep_best` entries, never empty.
    pub ranked: Vec<RankedSeed>,
    pub output_stats: Option<OutputStats>,
    pub initial_value: Option<InitialValue>,
    /// The best seed with refined constants.
    pub refined: Option<(ExpressionNode, RefinementResult)>,
}

impl SeedingOutcome {
    pub fn best(&self) -> Option<&RankedSeed> {
        self.ranked.first()
    }
}

/// Scores hand-written formulas and prepares the best one for refinement.
pub struct SeedRanker {
    config: SeedingConfig,
    parser: FormulaParser,
}

impl SeedRanker {
    pub fn new(mode: Mode, config: SeedingConfig) -> Self {
        Self {
            config,
            parser: FormulaParser::new(mode),
        }
    }

    pub fn config(&self) -> &SeedingConfig {
        &self.config
    }

    /// Parses and scores `formulas`, best first. Formulas that do not parse
    /// or score a non-finite fitness are logged and skipped.
    pub fn rank<S, R>(
        &self,
        formulas: &[S],
        dataset: &Dataset,
        evaluator: &FitnessEvaluator,
        rng: &mut R,
    ) -> Vec<RankedSeed>
    where
        S: AsRef<str>,
        R: Rng + ?Sized,
    {
        let mut ranked = Vec::with_capacity(formulas.len());
        for (i, text) in formulas.iter().enumerate() {
            let expression = match self.parser.parse(text.as_ref()) {
                Ok(expression) => expression,
                Err(e) => {
                    log::warn!("Seed {} is invalid: {}", i, e);
                    continue;
                }
            };
            match evaluator.evaluate_checked(dataset, &expression, rng) {
                Ok(fitness) => ranked.push(RankedSeed { expression, fitness }),
                Err(e) => log::warn!("Seed {} dropped, {}: {}", i, e, expression),
            }
        }

        ranked.sort_by(|a, b| a.fitness.total_cmp(&b.fitness));
        ranked.truncate(self.config.keep_best);
        ranked
    }

    /// Replaces the first occurrence of the configured column in `best` by
    /// the integer constant from the configured range that scores best.
    ///
    /// `None` when no column is configured or `best` never reads it.
    pub fn find_initial_value(
        &self,
        best: &ExpressionNode,
        dataset: &Dataset,
        evaluator: &FitnessEvaluator,
    ) -> Result<Option<InitialValue>> {
        let Some(column) = self.config.initial_value_column else {
            return Ok(None);
        };
        let (from, to) = (self.config.initial_value_from, self.config.initial_value_to);

        let mut tree = best.clone();
        let Some(slot) = tree.bind_first_var(column, from as f64) else {
            log::info!("{} does not occur in {}", column.name(), best);
            return Ok(None);
        };
        log::info!("Looking for the best initial value of {}", column.name());

        let mut weights = tree.constants();
        let value = {
            let mut score = |value: i64| {
                weights[slot] = value as f64;
                match tree.set_constants(&weights) {
                    Ok(()) => evaluator.evaluate_full(dataset, &tree),
                    Err(_) => f64::INFINITY,
                }
            };

            if self.config.initial_value_binary_search {
                bisect_for_minimum(from, to, true, &mut score)?
            } else {
                let mut best_value = from;
                let mut best_fitness = f64::INFINITY;
                for value in (from..=to).step_by(INITIAL_VALUE_STEP) {
                    let fitness = score(value);
                    if fitness < best_fitness {
                        best_fitness = fitness;
                        best_value = value;
                    }
                }
                best_value
            }
        };

        weights[slot] = value as f64;
        tree.set_constants(&weights)?;
        let fitness = evaluator.evaluate_full(dataset, &tree);
        log::info!("{} = {} had the best fitness ({})", column.name(), value, fitness);

        Ok(Some(InitialValue {
            column,
            value,
            fitness,
            expression: tree,
        }))
    }

    /// Ranks the seeds, reports them worst to best, logs the output range of
    /// the best one on `dataset` and runs the configured follow-ups.
    ///
    /// `None` when no seed survives ranking.
    pub fn process<S, R>(
        &self,
        formulas: &[S],
        dataset: &Dataset,
        evaluator: &FitnessEvaluator,
        climber: &HillClimber,
        rng: &mut R,
        reporter: &mut LogReporter,
    ) -> Result<Option<SeedingOutcome>>
    where
        S: AsRef<str>,
        R: Rng + ?Sized,
    {
        let ranked = self.rank(formulas, dataset, evaluator, rng);
        let Some(best) = ranked.first() else {
            if !formulas.is_empty() {
                log::warn!("None of the {} seeds is usable", formulas.len());
            }
            return Ok(None);
        };

        for seed in ranked.iter().rev() {
            reporter.report_initial(&seed.expression, seed.fitness);
        }

        let output_stats = OutputStats::collect(&best.expression, dataset.iter());
        if let Some(stats) = &output_stats {
            log::info!("Outputs of the best seed\n{}", stats);
        }

        let initial_value = self.find_initial_value(&best.expression, dataset, evaluator)?;

        let refined = if self.config.refine_best {
            let mut tree = best.expression.clone();
            let result = climber.refine_expression(
                &mut tree,
                dataset,
                evaluator,
                rng,
                |expression, fitness, tries| reporter.report_refined(expression, fitness, tries),
            )?;
            Some((tree, result))
        } else {
            None
        };

        Ok(Some(SeedingOutcome {
            ranked,
            output_stats,
            initial_value,
            refined,
        }))
    }
}

/// Bisection over `from..=to` that moves toward `from` unless the midpoint
/// beats the low end, in which case it returns that midpoint.
///
/// On an unsorted fitness landscape this finds a good value, not the minimum.
/// With `continue_on_equal` unset, a midpoint equal to the low end is returned.
pub fn bisect_for_minimum<F>(from: i64, to: i64, continue_on_equal: bool, mut get: F) -> Result<i64>
where
    F: FnMut(i64) -> f64,
{
    if from > to {
        return Err(TapholdError::Configuration(format!(
            "the range {}..={} is empty",
            from, to
        )));
    }

    let mut low = from;
    let mut high = to;
    let mut low_val = get(low);
    let mut mid;
    loop {
        mid = low + (high - low) / 2;
        let mid_val = get(mid);

        if low_val > mid_val {
            low = mid + 1;
            low_val = get(low);
            high = mid - 1;
        } else if continue_on_equal || low_val < mid_val {
            high = mid - 1;
        } else {
            break;
        }

        if low > high {
            break;
        }
    }
    Ok(mid)
}
