//! Cost-complexity pruning table.
//!
//! Growth already annotated every internal node with its complexity (the
//! threshold at which its subtree stops paying for itself), capped so the
//! values never increase from parent to child. The pruning sequence is then
//! just the distinct complexity values in decreasing order: at threshold
//! `cp` the tree keeps exactly the splits whose complexity exceeds `cp`.

use crate::tree::Node;
use crate::util::gt_tol;

/// One row of the pruning sequence.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CpEntry {
    /// Complexity threshold at which this tree size is optimal.
    pub cp: f64,
    /// Number of splits retained at this threshold.
    pub n_splits: u32,
    /// In-sample risk of the pruned tree (sum over its leaves).
    pub risk: f64,
    /// Cross-validated risk, filled in by the cross-validator.
    pub xrisk: Option<f64>,
    /// Standard error of `xrisk`.
    pub xstd: Option<f64>,
}

/// The pruning sequence, largest threshold (smallest tree) first.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CpTable {
    pub entries: Vec<CpEntry>,
}

impl CpTable {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Build the pruning sequence for a grown tree.
///
/// `alpha` is the pre-pruning threshold the tree was grown under
/// (`cp * root_risk`); it closes the sequence with the full tree.
pub(crate) fn build_cp_table(root: &Node, alpha: f64) -> CpTable {
    let mut thresholds = Vec::new();
    collect_complexities(root, &mut thresholds);
    thresholds.push(alpha);
    thresholds.sort_by(|a, b| b.total_cmp(a));

    let mut entries: Vec<CpEntry> = Vec::new();
    for &cp in &thresholds {
        if let Some(last) = entries.last() {
            if !gt_tol(last.cp, cp) {
                continue; // same threshold within tolerance
            }
        }
        let (n_splits, risk) = root.pruned_profile(cp);
        if let Some(last) = entries.last() {
            if n_splits == last.n_splits {
                continue; // threshold gap with no size change
            }
        }
        entries.push(CpEntry { cp, n_splits, risk, xrisk: None, xstd: None });
    }
    CpTable { entries }
}

fn collect_complexities(node: &Node, out: &mut Vec<f64>) {
    if let Some(c) = &node.children {
        out.push(node.complexity);
        collect_complexities(&c.0, out);
        collect_complexities(&c.1, out);
    } else if node.id == 1 {
        // Root-only tree: its complexity (the root risk) is the sole entry.
        out.push(node.complexity);
    }
}
