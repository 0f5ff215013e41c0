//! Least-squares regression family.

use crate::data::Dataset;
use crate::error::FitError;
use crate::family::Family;

const W: usize = 0;
const SUM: usize = 1;
const SUM_SQ: usize = 2;

/// Weighted least squares: estimate is the node mean, risk is the weighted
/// sum of squared deviations from it.
#[derive(Clone, Debug, Default)]
pub struct Anova;

impl Anova {
    /// Anova takes no hyperparameters.
    ///
    /// # Errors
    ///
    /// A non-empty parameter vector is rejected rather than silently
    /// ignored.
    pub fn new(parms: &[f64]) -> Result<Self, FitError> {
        if !parms.is_empty() {
            return Err(FitError::InvalidParams(format!(
                "anova takes no parameters, got {}",
                parms.len()
            )));
        }
        Ok(Self)
    }
}

impl Family for Anova {
    fn response_dim(&self) -> usize {
        1
    }

    fn stat_dim(&self) -> usize {
        3
    }

    fn init(&mut self, _data: &Dataset) -> Result<(), FitError> {
        Ok(())
    }

    fn accumulate(&self, stats: &mut [f64], y: &[f64], weight: f64) {
        let y = y[0];
        stats[W] += weight;
        stats[SUM] += weight * y;
        stats[SUM_SQ] += weight * y * y;
    }

    fn estimate(&self, stats: &[f64]) -> f64 {
        if stats[W] > 0.0 {
            stats[SUM] / stats[W]
        } else {
            0.0
        }
    }

    fn risk(&self, stats: &[f64]) -> f64 {
        if stats[W] > 0.0 {
            // Guard against tiny negative values from cancellation.
            (stats[SUM_SQ] - stats[SUM] * stats[SUM] / stats[W]).max(0.0)
        } else {
            0.0
        }
    }

    fn pred_error(&self, y: &[f64], weight: f64, estimate: f64) -> f64 {
        let d = y[0] - estimate;
        weight * d * d
    }
}
