use crate::types::{is_mod, FeatureVector};
use rand::seq::SliceRandom;
use rand::Rng;

/// Immutable, ordered set of training rows.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    rows: Vec<FeatureVector>,
}

impl Dataset {
    pub fn new(rows: Vec<FeatureVector>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[FeatureVector] {
        &self.rows
    }

    pub fn iter(&self) -> impl Iterator<Item = &[f64]> {
        self.rows.iter().map(|r| &r[..])
    }

    pub fn mod_count(&self) -> usize {
        self.rows.iter().filter(|r| is_mod(&r[..])).count()
    }

    /// Moves `count` uniformly chosen rows into the first returned set and
    /// keeps the rest as the second.
    ///
    /// Used as (training sample, validation remainder). `count` is capped at
    /// the dataset size.
    pub fn split_sample<R: Rng + ?Sized>(mut self, count: usize, rng: &mut R) -> (Dataset, Dataset) {
        let count = count.min(self.rows.len());
        let size = self.rows.len();

        // partial Fisher-Yates over the tail
        for i in (size - count..size).rev() {
            let j = rng.gen_range(0..=i);
            self.rows.swap(i, j);
        }

        let sample = self.rows.split_off(size - count);
        (Dataset::new(sample), self)
    }

    /// Draws up to `non_mods` tap rows and `mods` hold rows in random order.
    pub fn balanced_sample<R: Rng + ?Sized>(&self, non_mods: usize, mods: usize, rng: &mut R) -> Dataset {
        let mut indices: Vec<usize> = (0..self.rows.len()).collect();
        indices.shuffle(rng);

        let mut remaining = [non_mods, mods];
        let mut sample = Vec::with_capacity(non_mods.saturating_add(mods).min(self.rows.len()));
        for i in indices {
            if remaining[0] == 0 && remaining[1] == 0 {
                break;
            }
            let class = usize::from(is_mod(&self.rows[i][..]));
            if remaining[class] > 0 {
                remaining[class] -= 1;
                sample.push(self.rows[i]);
            }
        }
        Dataset::new(sample)
    }
}

impl From<Vec<FeatureVector>> for Dataset {
    fn from(rows: Vec<FeatureVector>) -> Self {
        Dataset::new(rows)
    }
}
