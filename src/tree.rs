//! Fitted tree representation.
//!
//! Nodes carry the heap-style ids of their position (root 1, children of
//! node `k` are `2k` and `2k + 1`), so an id alone encodes the path from the
//! root and the depth cap translates to a simple id bound.

use fixedbitset::FixedBitSet;

use crate::control::SurrogateUse;
use crate::data::Dataset;
use crate::util::gt_tol;

/// How one split rule sends an observed value left or right.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SplitRule {
    /// Continuous: compare against a cut point. `left_if_less` is false for
    /// surrogates that agree best with the primary in the reversed
    /// direction.
    Threshold { cut: f64, left_if_less: bool },
    /// Categorical: levels with their bit set go left, all others right.
    /// Levels unseen in the node default to right.
    Categories(FixedBitSet),
}

impl SplitRule {
    /// Direction for an observed value; `true` is left.
    #[inline]
    pub fn goes_left(&self, value: f64) -> bool {
        match self {
            Self::Threshold { cut, left_if_less } => (value < *cut) == *left_if_less,
            Self::Categories(left_levels) => left_levels.contains(value as usize),
        }
    }
}

/// A primary or competitor split.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Split {
    /// Covariate index.
    pub var: usize,
    pub rule: SplitRule,
    /// Risk reduction achieved by this split over the node's observed rows.
    pub improvement: f64,
    /// Number of rows with an observed value on `var` at evaluation time.
    pub count: usize,
}

/// A surrogate split: mimics the primary split's left/right assignment for
/// rows missing the primary variable.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Surrogate {
    pub var: usize,
    pub rule: SplitRule,
    /// Weighted fraction of doubly-observed rows it classifies like the
    /// primary.
    pub agreement: f64,
    /// Agreement in excess of the blind majority rule, rescaled to `[0, 1]`.
    /// Surrogates are ranked by this.
    pub adjusted: f64,
    /// Doubly-observed rows backing the agreement figure.
    pub count: usize,
}

/// One node of a fitted tree.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Node {
    /// Heap id: root 1, children of `k` are `2k` and `2k + 1`.
    pub id: u64,
    /// Observation count.
    pub n: usize,
    /// Sum of case weights.
    pub weight: f64,
    /// Family point estimate.
    pub estimate: f64,
    /// In-sample risk.
    pub risk: f64,
    /// Risk-reduction-per-split threshold at which this node's subtree
    /// collapses into it. Leaves carry their parent's value.
    pub complexity: f64,
    /// The chosen split, absent on leaves.
    pub split: Option<Split>,
    /// Runner-up splits, best first. Diagnostic only.
    pub competitors: Vec<Split>,
    /// Surrogate splits, best adjusted agreement first.
    pub surrogates: Vec<Surrogate>,
    /// Fallback direction for rows no surrogate can route: the side with
    /// the larger observed weight.
    pub majority_left: bool,
    /// Left and right children, or none for a leaf.
    pub children: Option<Box<(Node, Node)>>,
}

impl Node {
    pub(crate) fn new_leaf(id: u64, n: usize, weight: f64, estimate: f64, risk: f64) -> Self {
        Self {
            id,
            n,
            weight,
            estimate,
            risk,
            complexity: 0.0,
            split: None,
            competitors: Vec::new(),
            surrogates: Vec::new(),
            majority_left: true,
            children: None,
        }
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    pub fn left(&self) -> Option<&Node> {
        self.children.as_ref().map(|c| &c.0)
    }

    pub fn right(&self) -> Option<&Node> {
        self.children.as_ref().map(|c| &c.1)
    }

    /// Number of leaves under (and including) this node.
    pub fn n_leaves(&self) -> usize {
        match &self.children {
            None => 1,
            Some(c) => c.0.n_leaves() + c.1.n_leaves(),
        }
    }

    /// Decide which side `row` goes to: primary rule if the variable is
    /// observed, else surrogates in order, else the majority direction.
    /// `None` means the row cannot be routed and stays here.
    pub fn decide(&self, data: &Dataset, row: usize, usage: SurrogateUse) -> Option<bool> {
        let split = self.split.as_ref()?;
        if let Some(value) = data.value(row, split.var) {
            return Some(split.rule.goes_left(value));
        }
        if usage != SurrogateUse::None {
            for surrogate in &self.surrogates {
                if let Some(value) = data.value(row, surrogate.var) {
                    return Some(surrogate.rule.goes_left(value));
                }
            }
            if usage == SurrogateUse::Majority {
                return Some(self.majority_left);
            }
        }
        None
    }

    /// Size and leaf risk of the subtree pruned at threshold `alpha`:
    /// a split survives only while its complexity exceeds `alpha`.
    pub(crate) fn pruned_profile(&self, alpha: f64) -> (u32, f64) {
        match &self.children {
            Some(c) if gt_tol(self.complexity, alpha) => {
                let (ls, lr) = c.0.pruned_profile(alpha);
                let (rs, rr) = c.1.pruned_profile(alpha);
                (1 + ls + rs, lr + rr)
            }
            _ => (0, self.risk),
        }
    }
}
