//! Exponential survival family.
//!
//! Responses are (time, status) pairs with status 1 for an observed event
//! and 0 for censoring. Each node is summarized by an event rate; node risk
//! is the exponential log-likelihood deviance. Rates are stabilized with a
//! gamma prior centred on the full-data rate, controlled by the `shrink`
//! hyperparameter (prior shape `1/shrink`): small nodes are pulled toward
//! the overall rate, large nodes dominate the prior.

use crate::data::Dataset;
use crate::error::FitError;
use crate::family::Family;

const W: usize = 0;
const TIME: usize = 1;
const EVENTS: usize = 2;
const LOGLIK: usize = 3;

/// Exponential survival with gamma shrinkage of node rates.
#[derive(Clone, Debug)]
pub struct ExpSurvival {
    shrink: f64,
    prior_shape: f64,
    prior_rate: f64,
}

impl ExpSurvival {
    /// Hyperparameters: an optional `[shrink]` vector, default 1.0.
    ///
    /// # Errors
    ///
    /// Rejects a non-positive or non-finite `shrink`, or extra parameters.
    pub fn new(parms: &[f64]) -> Result<Self, FitError> {
        if parms.len() > 1 {
            return Err(FitError::InvalidParams(format!(
                "exp survival takes at most one parameter (shrink), got {}",
                parms.len()
            )));
        }
        let shrink = parms.first().copied().unwrap_or(1.0);
        if !shrink.is_finite() || shrink <= 0.0 {
            return Err(FitError::InvalidParams(format!(
                "shrink must be a positive number, got {shrink}"
            )));
        }
        Ok(Self { shrink, prior_shape: 1.0 / shrink, prior_rate: 0.0 })
    }
}

impl Family for ExpSurvival {
    fn response_dim(&self) -> usize {
        2
    }

    fn stat_dim(&self) -> usize {
        4
    }

    /// Validates responses and anchors the prior on the full-data rate.
    fn init(&mut self, data: &Dataset) -> Result<(), FitError> {
        let mut total_time = 0.0;
        let mut total_events = 0.0;
        for r in 0..data.n_rows() {
            let y = data.y_row(r);
            let (time, status) = (y[0], y[1]);
            if time <= 0.0 {
                return Err(FitError::InvalidParams(format!(
                    "row {r}: survival time must be positive, got {time}"
                )));
            }
            if status != 0.0 && status != 1.0 {
                return Err(FitError::InvalidParams(format!(
                    "row {r}: status must be 0 or 1, got {status}"
                )));
            }
            let w = data.weight(r);
            total_time += w * time;
            total_events += w * status;
        }
        if total_time <= 0.0 {
            return Err(FitError::InvalidParams(
                "total weighted exposure time is zero".to_string(),
            ));
        }
        self.prior_shape = 1.0 / self.shrink;
        self.prior_rate = self.prior_shape * total_time / total_events.max(f64::MIN_POSITIVE);
        Ok(())
    }

    fn accumulate(&self, stats: &mut [f64], y: &[f64], weight: f64) {
        let (time, status) = (y[0], y[1]);
        stats[W] += weight;
        stats[TIME] += weight * time;
        stats[EVENTS] += weight * status;
        if status > 0.0 {
            stats[LOGLIK] -= weight * status * time.ln();
        }
    }

    fn estimate(&self, stats: &[f64]) -> f64 {
        (stats[EVENTS] + self.prior_shape) / (stats[TIME] + self.prior_rate)
    }

    fn risk(&self, stats: &[f64]) -> f64 {
        if stats[W] <= 0.0 {
            return 0.0;
        }
        let rate = self.estimate(stats);
        if !(rate > 0.0) || !rate.is_finite() {
            return 0.0;
        }
        let events = stats[EVENTS];
        2.0 * (stats[LOGLIK] - events * rate.ln() - events + rate * stats[TIME])
    }

    fn pred_error(&self, y: &[f64], weight: f64, estimate: f64) -> f64 {
        let (time, status) = (y[0], y[1]);
        let expected = estimate * time;
        let mut dev = expected - status;
        if status > 0.0 {
            dev += status * (status / expected.max(f64::MIN_POSITIVE)).ln();
        }
        2.0 * weight * dev
    }
}
