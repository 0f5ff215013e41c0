//! Response families.
//!
//! A [`Family`] reduces observations to a small vector of additive
//! sufficient statistics; estimate, risk, and split improvement are pure
//! functions of those statistics. This is what lets one sweep over a sorted
//! column evaluate every cut point: the scan moves one row at a time from
//! the right aggregate into the left one.
//!
//! Families are selected once at fit start — by value ([`Method`]) or by the
//! legacy integer code ([`Method::from_code`]) — and never change during a
//! fit. [`FamilyKind`] is the dispatch enum the builder actually carries.

mod anova;
mod survival;

pub use anova::Anova;
pub use survival::ExpSurvival;

use crate::data::Dataset;
use crate::error::FitError;

/// A response family: the split-evaluation arithmetic for one model type.
///
/// `stats` slices are always `stat_dim()` long, zero-initialized by the
/// caller, and filled exclusively through [`accumulate`](Family::accumulate),
/// so aggregates over disjoint row sets add component-wise.
pub trait Family {
    /// Number of response columns each observation carries.
    fn response_dim(&self) -> usize;

    /// Length of the sufficient-statistic vector.
    fn stat_dim(&self) -> usize;

    /// Validate hyperparameters against the data and compute family-wide
    /// constants. Runs once per fit and once per fold.
    fn init(&mut self, data: &Dataset) -> Result<(), FitError>;

    /// Fold one observation into `stats`.
    fn accumulate(&self, stats: &mut [f64], y: &[f64], weight: f64);

    /// Point estimate for a node with the given statistics.
    fn estimate(&self, stats: &[f64]) -> f64;

    /// In-sample risk (deviance-like) of a node with the given statistics.
    fn risk(&self, stats: &[f64]) -> f64;

    /// Risk measure used for reporting, for families whose reported error
    /// differs from the optimization objective. Defaults to [`risk`](Family::risk).
    fn node_error(&self, stats: &[f64]) -> f64 {
        self.risk(stats)
    }

    /// Quality of a candidate split. Larger is better; never negative.
    fn split_improvement(&self, parent: &[f64], left: &[f64], right: &[f64]) -> f64 {
        (self.risk(parent) - self.risk(left) - self.risk(right)).max(0.0)
    }

    /// Ordering score for one categorical level's aggregate, used to reduce
    /// large-arity partition searches to contiguous-in-score splits.
    fn level_score(&self, stats: &[f64]) -> f64 {
        self.estimate(stats)
    }

    /// Held-out error of predicting `estimate` for one observation.
    fn pred_error(&self, y: &[f64], weight: f64, estimate: f64) -> f64;
}

/// Family selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Method {
    /// Least-squares regression on a single continuous response.
    Anova,
    /// Exponential survival on a (time, status) response pair.
    ExpSurvival,
}

impl Method {
    /// Resolve the legacy integer selector (1 = anova, 2 = exp survival).
    /// Code 4 is accepted as an alias for exp survival, matching the later
    /// four-method numbering.
    ///
    /// # Errors
    ///
    /// Any other code is an invalid-configuration error.
    pub fn from_code(code: i32) -> Result<Self, FitError> {
        match code {
            1 => Ok(Self::Anova),
            2 | 4 => Ok(Self::ExpSurvival),
            other => Err(FitError::InvalidMethod(other)),
        }
    }

    /// The integer selector this method answers to.
    pub fn code(self) -> i32 {
        match self {
            Self::Anova => 1,
            Self::ExpSurvival => 2,
        }
    }

    /// Instantiate the family with its hyperparameter vector.
    ///
    /// # Errors
    ///
    /// Returns [`FitError::InvalidParams`] when the vector is malformed for
    /// the selected family.
    pub fn family(self, parms: &[f64]) -> Result<FamilyKind, FitError> {
        match self {
            Self::Anova => Ok(FamilyKind::Anova(Anova::new(parms)?)),
            Self::ExpSurvival => Ok(FamilyKind::ExpSurvival(ExpSurvival::new(parms)?)),
        }
    }
}

/// Concrete family dispatch.
#[derive(Clone, Debug)]
pub enum FamilyKind {
    Anova(Anova),
    ExpSurvival(ExpSurvival),
}

impl Family for FamilyKind {
    fn response_dim(&self) -> usize {
        match self {
            Self::Anova(f) => f.response_dim(),
            Self::ExpSurvival(f) => f.response_dim(),
        }
    }

    fn stat_dim(&self) -> usize {
        match self {
            Self::Anova(f) => f.stat_dim(),
            Self::ExpSurvival(f) => f.stat_dim(),
        }
    }

    fn init(&mut self, data: &Dataset) -> Result<(), FitError> {
        match self {
            Self::Anova(f) => f.init(data),
            Self::ExpSurvival(f) => f.init(data),
        }
    }

    fn accumulate(&self, stats: &mut [f64], y: &[f64], weight: f64) {
        match self {
            Self::Anova(f) => f.accumulate(stats, y, weight),
            Self::ExpSurvival(f) => f.accumulate(stats, y, weight),
        }
    }

    fn estimate(&self, stats: &[f64]) -> f64 {
        match self {
            Self::Anova(f) => f.estimate(stats),
            Self::ExpSurvival(f) => f.estimate(stats),
        }
    }

    fn risk(&self, stats: &[f64]) -> f64 {
        match self {
            Self::Anova(f) => f.risk(stats),
            Self::ExpSurvival(f) => f.risk(stats),
        }
    }

    fn node_error(&self, stats: &[f64]) -> f64 {
        match self {
            Self::Anova(f) => f.node_error(stats),
            Self::ExpSurvival(f) => f.node_error(stats),
        }
    }

    fn split_improvement(&self, parent: &[f64], left: &[f64], right: &[f64]) -> f64 {
        match self {
            Self::Anova(f) => f.split_improvement(parent, left, right),
            Self::ExpSurvival(f) => f.split_improvement(parent, left, right),
        }
    }

    fn level_score(&self, stats: &[f64]) -> f64 {
        match self {
            Self::Anova(f) => f.level_score(stats),
            Self::ExpSurvival(f) => f.level_score(stats),
        }
    }

    fn pred_error(&self, y: &[f64], weight: f64, estimate: f64) -> f64 {
        match self {
            Self::Anova(f) => f.pred_error(y, weight, estimate),
            Self::ExpSurvival(f) => f.pred_error(y, weight, estimate),
        }
    }
}
