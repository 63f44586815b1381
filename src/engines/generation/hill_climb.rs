use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::RefinementConfig;
use crate::data::Dataset;
use crate::engines::evaluation::FitnessEvaluator;
use crate::engines::generation::ast::ExpressionNode;
use crate::error::Result;

pub const M_MIN: f64 = 0.01;
pub const M_MAX: f64 = 100.0;
pub const M_DIVISOR: f64 = 10_000.0;

#[derive(Debug, Clone, PartialEq)]
pub struct RefinementResult {
    pub weights: Vec<f64>,
    pub fitness: f64,
    pub iterations: usize,
}

/// Randomized local search over the constants of a fixed structure.
///
/// Each iteration perturbs a random subset of the weights. A perturbation that
/// improved the fitness is tried again on the next iteration; the step size
/// shrinks slowly while nothing improves and grows after an improvement that
/// took many tries.
pub struct HillClimber {
    config: RefinementConfig,
    stop: Option<Arc<AtomicBool>>,
}

impl HillClimber {
    pub fn new(config: RefinementConfig) -> Self {
        Self { config, stop: None }
    }

    /// Runs stop cooperatively once `flag` is set.
    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop = Some(flag);
        self
    }

    pub fn config(&self) -> &RefinementConfig {
        &self.config
    }

    /// RNG for a run: seeded from the config when a seed is set.
    pub fn rng(&self) -> StdRng {
        match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    fn stop_requested(&self) -> bool {
        self.stop
            .as_ref()
            .map(|flag| flag.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    /// Refines `initial` and returns the best weights seen.
    ///
    /// `fitness(mutation, weights)` scores the working weights; non-zero
    /// entries of `mutation` mark the coordinates that changed. `report(best,
    /// fitness, tries)` is called after `report_after_tries` failed tries and
    /// once more on exit if the last improvement was not reported yet.
    pub fn refine<R, Rep, F>(
        &self,
        initial: &[f64],
        rng: &mut R,
        mut report: Rep,
        mut fitness: F,
    ) -> RefinementResult
    where
        R: Rng + ?Sized,
        Rep: FnMut(&[f64], f64, usize),
        F: FnMut(&[f64], &[f64]) -> f64,
    {
        let n = initial.len();
        let lo = self.config.min_constant;
        let hi = self.config.max_constant;

        let mut weights: Vec<f64> = initial.iter().map(|w| w.clamp(lo, hi)).collect();
        let mut best = weights.clone();
        let mut mutation = vec![0.0; n];

        let mut best_fitness = fitness(&mutation, &best);
        if !best_fitness.is_finite() {
            log::warn!("Initial fitness {} is not finite, any finite result improves it", best_fitness);
            best_fitness = f64::INFINITY;
        }

        if n == 0 {
            report(&best, best_fitness, 0);
            return RefinementResult {
                weights: best,
                fitness: best_fitness,
                iterations: 0,
            };
        }

        let limit = self.config.iteration_limit();
        let mut divisor = self.config.initial_divisor.clamp(M_MIN, M_MAX);
        let mut i = 0usize;
        let mut i_when_better = 0usize;
        let mut tries = 0usize;
        let mut tries_since_improvement = 0usize;
        let mut was_last_improvement = false;
        let mut reported = false;

        while tries_since_improvement < limit && !self.stop_requested() {
            tries_since_improvement = i - i_when_better;

            divisor = (divisor - 1.0 / M_DIVISOR).clamp(M_MIN, M_MAX);

            if !was_last_improvement {
                draw_mutation(rng, &mut mutation, divisor);
            }
            was_last_improvement = false;

            i += 1;

            if !reported && tries_since_improvement > self.config.report_after_tries {
                report(&best, best_fitness, tries);
                reported = true;
                tries = 0;
            }

            for (w, m) in weights.iter_mut().zip(&mutation) {
                *w = (*w + m).clamp(lo, hi);
            }

            let candidate = fitness(&mutation, &weights);

            if candidate.is_finite() && candidate < best_fitness {
                log::debug!(
                    "Refinement improved {} -> {} after {} tries",
                    best_fitness,
                    candidate,
                    tries_since_improvement + 1
                );
                best_fitness = candidate;
                best.copy_from_slice(&weights);
                tries += i - i_when_better;
                i_when_better = i;
                divisor =
                    (divisor + tries_since_improvement as f64 / M_DIVISOR).clamp(M_MIN, M_MAX);
                was_last_improvement = true;
                reported = false;
            } else {
                // working weights only ever leave `best` by the pending mutation
                weights.copy_from_slice(&best);
            }
        }

        if !reported {
            report(&best, best_fitness, tries);
        }

        RefinementResult {
            weights: best,
            fitness: best_fitness,
            iterations: i,
        }
    }

    /// Refines the constants of `tree` in place against the full dataset.
    ///
    /// `report` receives a copy of the tree carrying the best constants so far.
    pub fn refine_expression<R, Rep>(
        &self,
        tree: &mut ExpressionNode,
        dataset: &Dataset,
        evaluator: &FitnessEvaluator,
        rng: &mut R,
        mut report: Rep,
    ) -> Result<RefinementResult>
    where
        R: Rng + ?Sized,
        Rep: FnMut(&ExpressionNode, f64, usize),
    {
        let initial = tree.constants();
        let mut working = tree.clone();
        let mut reported = tree.clone();

        log::info!(
            "Refining {} constants of {}",
            initial.len(),
            tree.to_formula_short(120)
        );

        let result = self.refine(
            &initial,
            rng,
            |best, fitness, tries| {
                if reported.set_constants(best).is_ok() {
                    report(&reported, fitness, tries);
                }
            },
            |_, weights| match working.set_constants(weights) {
                Ok(()) => evaluator.evaluate_full(dataset, &working),
                Err(_) => f64::INFINITY,
            },
        );

        tree.set_constants(&result.weights)?;
        Ok(result)
    }

    /// Refines independent trees in parallel, run `i` seeded with `seed + i`.
    ///
    /// Needs a finite `max_iterations_without_improvement` or a stop flag to
    /// ever return.
    pub fn refine_many(
        &self,
        trees: Vec<ExpressionNode>,
        dataset: &Dataset,
        evaluator: &FitnessEvaluator,
        seed: u64,
    ) -> Vec<Result<(ExpressionNode, RefinementResult)>> {
        trees
            .into_par_iter()
            .enumerate()
            .map(|(i, mut tree)| -> Result<(ExpressionNode, RefinementResult)> {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(i as u64));
                let result = self.refine_expression(
                    &mut tree,
                    dataset,
                    evaluator,
                    &mut rng,
                    |best, fitness, tries| {
                        log::info!("[run {}] fitness {} after {} tries: {}", i, fitness, tries, best);
                    },
                )?;
                Ok((tree, result))
            })
            .collect()
    }
}

/// Redraws `mutation`: a random number of distinct coordinates get a uniform
/// step in `[-0.5, 0.5) / divisor`, all others are zero.
fn draw_mutation<R: Rng + ?Sized>(rng: &mut R, mutation: &mut [f64], divisor: f64) {
    let n = mutation.len();
    mutation.fill(0.0);
    if n == 0 {
        return;
    }
    let k = rng.gen_range(1..=n);
    for mi in index::sample(rng, n, k).into_iter() {
        mutation[mi] = (rng.gen::<f64>() - 0.5) / divisor;
    }
}
