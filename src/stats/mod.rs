//! Measurement statistics.

use crate::{util, Error, Result};

mod sample;

pub use sample::*;

/// Descriptive statistics of a sample sequence.
///
/// Values are in the unit of the samples (seconds or bytes).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Stats {
    /// Number of samples.
    pub count: usize,

    /// Sum of all samples.
    pub total: f64,

    /// Arithmetic mean.
    pub mean: f64,

    /// Population standard deviation. Zero for fewer than 2 samples.
    pub stdev: f64,

    /// Midpoint sample, or the mean of the two midpoint samples.
    pub median: f64,

    /// Interquartile range. Zero for fewer than 4 samples.
    pub iqr: f64,

    /// Smallest sample.
    pub min: f64,

    /// Largest sample.
    pub max: f64,
}

impl Stats {
    /// Computes statistics over `samples`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InsufficientData`] if `samples` is empty.
    pub fn compute(samples: &[f64]) -> Result<Self> {
        if samples.is_empty() {
            return Err(Error::InsufficientData);
        }

        let mut sorted = samples.to_vec();
        sorted.sort_unstable_by(f64::total_cmp);

        let count = sorted.len();
        let total: f64 = samples.iter().sum();
        let mean = total / count as f64;

        let stdev = if count < 2 {
            0.0
        } else {
            let variance =
                samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / count as f64;
            variance.sqrt()
        };

        let middle = util::slice_middle(&sorted);
        let median = middle.iter().sum::<f64>() / middle.len() as f64;

        let iqr = if count < 4 {
            0.0
        } else {
            percentile(&sorted, 75.0) - percentile(&sorted, 25.0)
        };

        Ok(Self {
            count,
            total,
            mean,
            stdev,
            median,
            iqr,
            min: sorted[0],
            max: sorted[count - 1],
        })
    }

    /// The reduced set shown per traced line.
    #[inline]
    pub fn line_summary(&self) -> LineSummary {
        LineSummary { total: self.total, avg: self.mean, count: self.count }
    }
}

/// Per-line statistics: total, average and execution count.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LineSummary {
    pub total: f64,
    pub avg: f64,
    pub count: usize,
}

/// Percentile of a **sorted** slice, interpolating linearly between the
/// nearest ranks.
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = (lower + 1).min(sorted.len() - 1);
    let fraction = rank - lower as f64;

    sorted[lower] + fraction * (sorted[upper] - sorted[lower])
}
