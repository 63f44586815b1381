use rand::Rng;
use rayon::prelude::*;

use crate::config::FitnessConfig;
use crate::data::Dataset;
use crate::engines::evaluation::expression::Predictor;
use crate::error::{Result, TapholdError};
use crate::types::{is_mod, ClassCounts, FeatureVector, Mode, TrainCol};

const PARALLEL_CHUNK: usize = 4_096;

/// Scores candidate predictors against labelled rows. Lower is better.
///
/// The loss is the sum of per-row errors plus an imbalance penalty on the
/// hold recall, scaled up by the candidate's complexity.
#[derive(Debug, Clone)]
pub struct FitnessEvaluator {
    mode: Mode,
    config: FitnessConfig,
    min_positive_recall: f64,
}

impl FitnessEvaluator {
    pub fn new(mode: Mode, config: FitnessConfig) -> Self {
        let min_positive_recall = config.min_positive_recall_for(mode);
        Self {
            mode,
            config,
            min_positive_recall,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn config(&self) -> &FitnessConfig {
        &self.config
    }

    /// Error of one row. Zero means the prediction was correct; a NaN
    /// output gives a NaN loss.
    pub fn sample_loss(&self, row: &[f64], output: f64) -> f64 {
        // the clamps below would turn NaN into a finite value
        if output.is_nan() {
            return f64::NAN;
        }
        if self.mode.is_overlap_estimation() {
            self.overlap_loss(row, output)
        } else {
            self.hold_loss(row, output)
        }
    }

    fn hold_loss(&self, row: &[f64], output: f64) -> f64 {
        let cap = self.config.max_error_considered;
        let is_mod = is_mod(row);
        let confidence = output.abs().clamp(0.0, 1.0);
        let predicts_mod = confidence > 0.5;

        if is_mod == predicts_mod {
            return 0.0;
        }

        let delta = if is_mod { 0.5 - confidence } else { confidence - 0.5 };
        0.1 + delta.min(cap) / cap
    }

    fn overlap_loss(&self, row: &[f64], output: f64) -> f64 {
        let cap = self.config.max_error_considered;

        let mut overlap = output.abs();
        if let Some(max) = self.config.max_overlap_ms {
            overlap = overlap.min(max);
        }
        if let Some(min) = self.config.min_overlap_ms {
            overlap = overlap.max(min);
        }

        let next_down = row[TrainCol::SecondPressTime.index()];
        let overlap_end = row[TrainCol::SecondReleaseTime.index()]
            .min(row[TrainCol::PthReleaseTime.index()]);

        let predicts_mod = next_down + overlap < overlap_end;
        if predicts_mod == is_mod(row) {
            return 0.0;
        }

        // the unclamped estimate keeps a gradient outside the clamp range
        let delta = (overlap_end - (next_down + output.abs())).abs();
        1.0 + delta.min(cap) / cap
    }

    /// Penalty for missing hold recall. Zero without any holds.
    pub fn penalty(&self, mods_correct: usize, mods: usize) -> f64 {
        if mods == 0 {
            return 0.0;
        }
        let ratio = mods_correct as f64 / mods as f64;
        let missing = self.min_positive_recall - ratio;
        if missing > 0.0 {
            missing * self.config.penalty_scale
        } else {
            0.0
        }
    }

    /// In `[0, 1]`, grows with the node count and saturates at `max_node_count`.
    pub fn complexity(&self, node_count: usize) -> f64 {
        let max = self.config.max_node_count as f64;
        let x = (node_count as f64).min(max) / max;
        1.0 - (1.0 - x * x).sqrt()
    }

    fn score_rows<'a, P, I>(&self, rows: I, candidate: &P) -> (f64, ClassCounts)
    where
        P: Predictor + ?Sized,
        I: IntoIterator<Item = &'a FeatureVector>,
    {
        let mut counts = ClassCounts::default();
        let mut sum = 0.0;
        for row in rows {
            let loss = self.sample_loss(row, candidate.predict(row));
            counts.record(is_mod(row), loss == 0.0);
            sum += loss;
        }
        (sum, counts)
    }

    fn finish(&self, sum: f64, counts: &ClassCounts, node_count: usize) -> f64 {
        let loss = sum + self.penalty(counts.mods_correct, counts.mods);
        loss + loss * self.complexity(node_count)
    }

    /// Scores on the full dataset, or on a random sample when
    /// `sample_per_program` is set.
    pub fn evaluate<P, R>(&self, dataset: &Dataset, candidate: &P, rng: &mut R) -> f64
    where
        P: Predictor + ?Sized,
        R: Rng + ?Sized,
    {
        if !self.config.sample_per_program {
            return self.evaluate_full(dataset, candidate);
        }

        let rows = dataset.rows();
        let half = rows.len() / 2;
        let window = self.config.sample_size / 2;
        if window == 0 || half <= window {
            return self.evaluate_full(dataset, candidate);
        }

        // one window from each half of the data
        let s1 = rng.gen_range(0..half - window);
        let s2 = half + rng.gen_range(0..half - window);
        let (sum, counts) = self.score_rows(
            rows[s1..s1 + window].iter().chain(&rows[s2..s2 + window]),
            candidate,
        );
        self.finish(sum, &counts, candidate.node_count())
    }

    pub fn evaluate_full<P>(&self, dataset: &Dataset, candidate: &P) -> f64
    where
        P: Predictor + ?Sized,
    {
        self.evaluate_with_counts(dataset, candidate).0
    }

    /// Like [`FitnessEvaluator::evaluate`], but a non-finite loss is an error.
    pub fn evaluate_checked<P, R>(&self, dataset: &Dataset, candidate: &P, rng: &mut R) -> Result<f64>
    where
        P: Predictor + ?Sized,
        R: Rng + ?Sized,
    {
        let fitness = self.evaluate(dataset, candidate, rng);
        if fitness.is_finite() {
            Ok(fitness)
        } else {
            log::debug!("Rejecting candidate with fitness {}", fitness);
            Err(TapholdError::NonFiniteFitness(fitness))
        }
    }

    pub fn evaluate_with_counts<P>(&self, dataset: &Dataset, candidate: &P) -> (f64, ClassCounts)
    where
        P: Predictor + ?Sized,
    {
        let (sum, counts) = self.score_rows(dataset.rows(), candidate);
        (self.finish(sum, &counts, candidate.node_count()), counts)
    }

    /// Same result as [`FitnessEvaluator::evaluate_with_counts`] up to
    /// floating point summation order.
    pub fn evaluate_parallel<P>(&self, dataset: &Dataset, candidate: &P) -> (f64, ClassCounts)
    where
        P: Predictor + ?Sized,
    {
        let (sum, counts) = dataset
            .rows()
            .par_chunks(PARALLEL_CHUNK)
            .map(|chunk| self.score_rows(chunk, candidate))
            .reduce(
                || (0.0, ClassCounts::default()),
                |(a, ca), (b, cb)| (a + b, ca.merge(cb)),
            );
        (self.finish(sum, &counts, candidate.node_count()), counts)
    }
}
