//! Fit control parameters.
//!
//! [`Control`] groups the stopping, pruning, and surrogate knobs that shape
//! tree growth. Defaults match the conventional recursive-partitioning
//! settings (split nodes of 20+, buckets of 7+, cp 0.01, up to 5 surrogates
//! with majority fallback, depth cap 30).

/// How observations with a missing value on a node's primary split variable
/// are routed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SurrogateUse {
    /// Never consult surrogates; rows missing the primary variable stop at
    /// the node.
    None,
    /// Route through surrogates in order; rows missing every surrogate stop
    /// at the node.
    Observed,
    /// Route through surrogates, then fall back to the majority direction.
    Majority,
}

/// Parameters controlling tree growth, pruning, and surrogate handling.
#[derive(Clone, Debug)]
pub struct Control {
    /// Minimum number of observations a node needs before a split is
    /// attempted. Default: 20.
    pub min_split: usize,
    /// Minimum number of observations in either child of a split.
    /// Default: 7 (a third of `min_split`).
    pub min_node: usize,
    /// Complexity parameter: a split must reduce overall risk by at least
    /// `cp × root_risk` per split to be retained. Default: 0.01.
    pub cp: f64,
    /// Maximum number of surrogate splits retained per node. Default: 5.
    pub max_surrogate: usize,
    /// How surrogate splits are used when routing observations.
    /// Default: majority fallback.
    pub use_surrogate: SurrogateUse,
    /// Minimum *adjusted* agreement a surrogate must exceed to be retained:
    /// its improvement over the blind majority rule, in `[0, 1)`.
    /// Default: 0.0 (any surrogate better than majority).
    pub surrogate_agreement: f64,
    /// Maximum tree depth; the node budget is `2^max_depth − 1`.
    /// Default: 30 (node ids must stay addressable).
    pub max_depth: u32,
    /// Maximum number of non-chosen competitor splits reported per node
    /// (diagnostic only, never affects tree shape). Minimum 1. Default: 4.
    pub max_primary: usize,
}

impl Default for Control {
    fn default() -> Self {
        Self {
            min_split: 20,
            min_node: 7,
            cp: 0.01,
            max_surrogate: 5,
            use_surrogate: SurrogateUse::Majority,
            surrogate_agreement: 0.0,
            max_depth: 30,
            max_primary: 4,
        }
    }
}

impl Control {
    /// Create a control with the given `min_split` and the conventional
    /// `min_node = min_split / 3` (at least 1).
    pub fn with_min_split(min_split: usize) -> Self {
        Self {
            min_split,
            min_node: (min_split / 3).max(1),
            ..Default::default()
        }
    }

    /// Node budget implied by the depth cap.
    #[inline]
    pub(crate) fn max_node(&self) -> u64 {
        (1u64 << self.max_depth) - 1
    }

    /// Validate parameters.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid parameter.
    pub fn validate(&self) -> Result<(), ControlError> {
        if self.min_split < 2 {
            return Err(ControlError::InvalidMinSplit(self.min_split));
        }
        if self.min_node < 1 || self.min_node * 2 > self.min_split {
            return Err(ControlError::InvalidMinNode(self.min_node));
        }
        if !(0.0..=1.0).contains(&self.cp) {
            return Err(ControlError::InvalidCp(self.cp));
        }
        if self.max_depth < 1 || self.max_depth > 30 {
            return Err(ControlError::InvalidMaxDepth(self.max_depth));
        }
        if !(0.0..1.0).contains(&self.surrogate_agreement) {
            return Err(ControlError::InvalidSurrogateAgreement(self.surrogate_agreement));
        }
        if self.max_primary < 1 {
            return Err(ControlError::InvalidMaxPrimary(self.max_primary));
        }
        Ok(())
    }
}

/// Control parameter validation error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ControlError {
    /// min_split must be >= 2.
    #[error("min_split must be >= 2, got {0}")]
    InvalidMinSplit(usize),

    /// min_node must be >= 1 and at most min_split / 2.
    #[error("min_node must be >= 1 and at most min_split / 2, got {0}")]
    InvalidMinNode(usize),

    /// cp must be in [0, 1].
    #[error("cp must be in [0, 1], got {0}")]
    InvalidCp(f64),

    /// max_depth must be in 1..=30.
    #[error("max_depth must be in 1..=30, got {0}")]
    InvalidMaxDepth(u32),

    /// surrogate_agreement must be in [0, 1).
    #[error("surrogate_agreement must be in [0, 1), got {0}")]
    InvalidSurrogateAgreement(f64),

    /// max_primary must be >= 1.
    #[error("max_primary must be >= 1, got {0}")]
    InvalidMaxPrimary(usize),
}
