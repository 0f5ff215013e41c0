//! Cross-validated risk for the pruning sequence.
//!
//! Each fold refits a tree on the other folds' rows and scores its held-out
//! rows at every pruning level. Levels are addressed by a threshold grid
//! built from the full-data cp table: infinity for the root-only entry,
//! then the geometric mean of each adjacent cp pair, so every grid value
//! selects the same tree size on the full data while sitting strictly
//! between the thresholds where sizes change. Fold trees have smaller root
//! risk than the full tree, so thresholds are rescaled by the fold's root
//! risk before routing.
//!
//! Fold results are plain sums (count, Σe, Σe²) per level, merged
//! commutatively, so the parallel and sequential paths give identical
//! totals up to float association; folds run through rayon when allowed.

use rayon::prelude::*;

use crate::control::Control;
use crate::data::{sort_columns, Dataset};
use crate::error::FitError;
use crate::family::{Family, Method};
use crate::grow::grow;
use crate::parallel::Parallelism;
use crate::prune::CpTable;
use crate::tree::Node;
use crate::util::gt_tol;

/// Which fold each row is held out in.
#[derive(Clone, Debug)]
pub(crate) struct FoldAssignment {
    /// Fold index per row, each in `0..n_folds`.
    pub fold_of: Vec<u32>,
    pub n_folds: usize,
}

/// Per-level running sums of held-out prediction error.
#[derive(Clone, Copy, Debug, Default)]
struct LevelAccum {
    n: u64,
    sum: f64,
    sum_sq: f64,
}

impl LevelAccum {
    fn add(&mut self, e: f64) {
        self.n += 1;
        self.sum += e;
        self.sum_sq += e * e;
    }

    fn merge(&mut self, other: &Self) {
        self.n += other.n;
        self.sum += other.sum;
        self.sum_sq += other.sum_sq;
    }
}

/// Threshold grid addressing the table's pruning levels: infinity, then
/// geometric means of adjacent cp values.
fn threshold_grid(table: &CpTable) -> Vec<f64> {
    let mut grid = Vec::with_capacity(table.len());
    for (k, entry) in table.entries.iter().enumerate() {
        if k == 0 {
            grid.push(f64::INFINITY);
        } else {
            grid.push((entry.cp * table.entries[k - 1].cp).sqrt());
        }
    }
    grid
}

/// Complexity/estimate pairs along a row's routing path, root first. The
/// path ends at a leaf or at the first node the row cannot be routed past.
fn routing_path(root: &Node, data: &Dataset, row: usize, ctl: &Control, out: &mut Vec<(f64, f64)>) {
    out.clear();
    let mut node = root;
    loop {
        out.push((node.complexity, node.estimate));
        let Some(children) = node.children.as_ref() else { return };
        match node.decide(data, row, ctl.use_surrogate) {
            Some(true) => node = &children.0,
            Some(false) => node = &children.1,
            None => return,
        }
    }
}

/// Score one fold: refit on the training rows, score each held-out row at
/// every grid level.
fn score_fold(
    data: &Dataset,
    method: Method,
    parms: &[f64],
    ctl: &Control,
    folds: &FoldAssignment,
    fold: u32,
    grid: &[f64],
    full_root_risk: f64,
) -> Result<Vec<LevelAccum>, FitError> {
    let mut train = Vec::new();
    let mut held = Vec::new();
    for (r, &f) in folds.fold_of.iter().enumerate() {
        if f == fold {
            held.push(r);
        } else {
            train.push(r as u32);
        }
    }
    let mut accums = vec![LevelAccum::default(); grid.len()];
    if held.is_empty() || train.is_empty() {
        return Ok(accums);
    }

    let sub = data.subset(&train);
    let mut family = method.family(parms)?;
    family.init(&sub)?;
    let sorted = sort_columns(&sub, Parallelism::Sequential);
    // A fold that cannot split is fine: every level then predicts the
    // fold's root estimate.
    let grown = grow(&sub, &sorted, &family, ctl);

    let scale = if full_root_risk > 0.0 { grown.root_risk / full_root_risk } else { 1.0 };
    let mut path = Vec::new();
    for &r in &held {
        routing_path(&grown.root, data, r, ctl, &mut path);
        let y = data.y_row(r);
        let w = data.weight(r);
        for (k, &threshold) in grid.iter().enumerate() {
            let threshold = if threshold.is_finite() { threshold * scale } else { threshold };
            let estimate = path
                .iter()
                .find(|(complexity, _)| !gt_tol(*complexity, threshold))
                .map_or(path[path.len() - 1].1, |&(_, est)| est);
            accums[k].add(family.pred_error(y, w, estimate));
        }
    }
    Ok(accums)
}

/// Fill the `xrisk`/`xstd` columns of `table` by k-fold cross-validation.
pub(crate) fn cross_validate(
    data: &Dataset,
    method: Method,
    parms: &[f64],
    ctl: &Control,
    folds: &FoldAssignment,
    full_root_risk: f64,
    table: &mut CpTable,
    parallelism: Parallelism,
) -> Result<(), FitError> {
    let grid = threshold_grid(table);
    let fold_ids: Vec<u32> = (0..folds.n_folds as u32).collect();
    let parallelism = parallelism.scaled_to(fold_ids.len(), 1);

    let per_fold: Vec<Vec<LevelAccum>> = if parallelism.is_parallel() {
        fold_ids
            .par_iter()
            .map(|&f| score_fold(data, method, parms, ctl, folds, f, &grid, full_root_risk))
            .collect::<Result<_, _>>()?
    } else {
        fold_ids
            .iter()
            .map(|&f| score_fold(data, method, parms, ctl, folds, f, &grid, full_root_risk))
            .collect::<Result<_, _>>()?
    };

    let mut totals = vec![LevelAccum::default(); grid.len()];
    for fold_accums in &per_fold {
        for (total, a) in totals.iter_mut().zip(fold_accums) {
            total.merge(a);
        }
    }

    for (entry, total) in table.entries.iter_mut().zip(&totals) {
        let n = total.n as f64;
        entry.xrisk = Some(total.sum);
        entry.xstd = Some(if total.n > 1 {
            let var = ((total.sum_sq - total.sum * total.sum / n) / (n - 1.0)).max(0.0);
            (n * var).sqrt()
        } else {
            0.0
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prune::CpEntry;
    use approx::assert_relative_eq;

    fn entry(cp: f64) -> CpEntry {
        CpEntry { cp, n_splits: 0, risk: 0.0, xrisk: None, xstd: None }
    }

    #[test]
    fn grid_is_infinity_then_geometric_means() {
        let table = CpTable { entries: vec![entry(100.0), entry(4.0), entry(1.0)] };
        let grid = threshold_grid(&table);
        assert_eq!(grid.len(), 3);
        assert!(grid[0].is_infinite());
        assert_relative_eq!(grid[1], 20.0);
        assert_relative_eq!(grid[2], 2.0);
    }

    #[test]
    fn accum_merge_matches_single_pass() {
        let mut a = LevelAccum::default();
        let mut b = LevelAccum::default();
        let mut whole = LevelAccum::default();
        for (i, e) in [1.0, 2.0, 3.0, 4.0].iter().enumerate() {
            whole.add(*e);
            if i % 2 == 0 {
                a.add(*e);
            } else {
                b.add(*e);
            }
        }
        a.merge(&b);
        assert_eq!(a.n, whole.n);
        assert_relative_eq!(a.sum, whole.sum);
        assert_relative_eq!(a.sum_sq, whole.sum_sq);
    }
}
