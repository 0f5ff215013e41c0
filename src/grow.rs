//! Recursive tree growth.
//!
//! The builder owns a per-row membership array (`assign`) holding the heap
//! id of the node each row currently sits in. Split scans walk a variable's
//! presorted order and filter by membership, so candidate evaluation is one
//! pass per variable per node with no re-sorting. The row-index buffer is
//! threaded through the recursion as `&mut [u32]` subslices: partitioning a
//! node rearranges its slice into `[left | right | stopped]` and the
//! children recurse into the first two pieces.
//!
//! Degenerate candidates (zero variance, all-missing, children below
//! `min_node`) are excluded locally and never surface as errors.

use fixedbitset::FixedBitSet;

use crate::control::Control;
use crate::data::{Dataset, SortedColumns};
use crate::family::{Family, FamilyKind};
use crate::tree::{Node, Split, SplitRule, Surrogate};
use crate::util::{gt_tol, TOL};

/// Arity bound below which categorical splits are searched exhaustively;
/// larger arities fall back to contiguous splits in level-score order.
const EXHAUSTIVE_CATEGORY_LIMIT: usize = 8;

/// A grown (unpruned beyond `cp`) tree plus the row membership it induced.
pub(crate) struct GrownTree {
    pub root: Node,
    /// Heap id of the node each row ended in. Rows that could not be routed
    /// past an interior node keep that interior id.
    pub assignments: Vec<u64>,
    pub root_risk: f64,
    /// Pre-pruning threshold: `cp * root_risk`.
    pub alpha: f64,
}

/// Grow a tree over all rows of `data`.
pub(crate) fn grow(
    data: &Dataset,
    sorted: &SortedColumns,
    family: &FamilyKind,
    ctl: &Control,
) -> GrownTree {
    let n = data.n_rows();
    let sd = family.stat_dim();
    let mut root_stats = vec![0.0; sd];
    for r in 0..n {
        family.accumulate(&mut root_stats, data.y_row(r), data.weight(r));
    }
    let root_risk = family.risk(&root_stats);
    let alpha = ctl.cp * root_risk;

    let mut builder = TreeBuilder {
        data,
        sorted,
        family,
        ctl,
        alpha,
        root_risk,
        assign: vec![1; n],
        scratch: Scratch::new(sd, sorted.max_categories, n),
    };
    let mut rows: Vec<u32> = (0..n as u32).collect();
    let (mut root, _, _) = builder.grow_node(1, &mut rows);
    cap_complexity(&mut root, root_risk);

    GrownTree { root, assignments: builder.assign, root_risk, alpha }
}

/// Reusable buffers shared by every node's split search.
struct Scratch {
    /// Node rows in the current variable's sort order.
    scan_rows: Vec<u32>,
    obs_stats: Vec<f64>,
    left_stats: Vec<f64>,
    right_stats: Vec<f64>,
    /// Per-level aggregates for categorical scans, `max_categories * sd`.
    cat_stats: Vec<f64>,
    cat_w: Vec<f64>,
    cat_n: Vec<u32>,
    cat_score: Vec<f64>,
    /// Primary-split direction per row: 0 unset, 1 left, 2 right.
    dir: Vec<u8>,
    left_buf: Vec<u32>,
    right_buf: Vec<u32>,
    stop_buf: Vec<u32>,
}

impl Scratch {
    fn new(stat_dim: usize, max_categories: usize, n_rows: usize) -> Self {
        Self {
            scan_rows: Vec::with_capacity(n_rows),
            obs_stats: vec![0.0; stat_dim],
            left_stats: vec![0.0; stat_dim],
            right_stats: vec![0.0; stat_dim],
            cat_stats: vec![0.0; max_categories * stat_dim],
            cat_w: vec![0.0; max_categories],
            cat_n: vec![0; max_categories],
            cat_score: vec![0.0; max_categories],
            dir: vec![0; n_rows],
            left_buf: Vec::new(),
            right_buf: Vec::new(),
            stop_buf: Vec::new(),
        }
    }
}

struct TreeBuilder<'a> {
    data: &'a Dataset,
    sorted: &'a SortedColumns,
    family: &'a FamilyKind,
    ctl: &'a Control,
    alpha: f64,
    root_risk: f64,
    assign: Vec<u64>,
    scratch: Scratch,
}

impl<'a> TreeBuilder<'a> {
    /// Grow the node `id` over `rows` (all of which have `assign == id`).
    /// Returns the node plus its subtree's leaf risk and split count.
    fn grow_node(&mut self, id: u64, rows: &mut [u32]) -> (Node, f64, u32) {
        let mut stats = vec![0.0; self.family.stat_dim()];
        let mut weight = 0.0;
        for &r in rows.iter() {
            let r = r as usize;
            self.family.accumulate(&mut stats, self.data.y_row(r), self.data.weight(r));
            weight += self.data.weight(r);
        }
        let estimate = self.family.estimate(&stats);
        let risk = self.family.risk(&stats);
        let mut node = Node::new_leaf(id, rows.len(), weight, estimate, risk);

        // Stopping rules: node too small, depth budget exhausted, or risk
        // already below the pre-pruning threshold.
        if rows.len() < self.ctl.min_split
            || 2 * id + 1 > self.ctl.max_node()
            || risk <= self.alpha + TOL * self.root_risk
        {
            return (node, risk, 0);
        }

        let (best, competitors) = self.best_split(id);
        let Some(split) = best else {
            return (node, risk, 0);
        };
        node.competitors = competitors;

        let (surrogates, majority_left) = self.find_surrogates(id, rows, &split);
        node.split = Some(split);
        node.surrogates = surrogates;
        node.majority_left = majority_left;

        let (n_left, n_right) = self.partition(id, rows, &node);
        if n_left == 0 || n_right == 0 {
            // Every routed row went one way; no usable split after all.
            node.split = None;
            node.surrogates = Vec::new();
            node.competitors = Vec::new();
            return (node, risk, 0);
        }

        let (left, left_risk, left_splits) = self.grow_node(2 * id, &mut rows[..n_left]);
        let (right, right_risk, right_splits) =
            self.grow_node(2 * id + 1, &mut rows[n_left..n_left + n_right]);

        let subtree_risk = left_risk + right_risk;
        let n_splits = 1 + left_splits + right_splits;
        let complexity = (risk - subtree_risk) / f64::from(n_splits);

        if !gt_tol(complexity, self.alpha) {
            // The subtree does not pay for its splits; collapse it now so
            // the final tree never carries sub-threshold structure.
            for &r in rows.iter() {
                self.assign[r as usize] = id;
            }
            node.split = None;
            node.surrogates = Vec::new();
            node.competitors = Vec::new();
            return (node, risk, 0);
        }

        node.complexity = complexity;
        node.children = Some(Box::new((left, right)));
        (node, subtree_risk, n_splits)
    }

    // ========================================================================
    // Candidate search
    // ========================================================================

    /// Best split over all variables, plus the runner-up candidates.
    fn best_split(&mut self, id: u64) -> (Option<Split>, Vec<Split>) {
        let mut candidates: Vec<Split> = Vec::new();
        for v in 0..self.data.n_vars() {
            let candidate = if self.data.is_categorical(v) {
                self.best_categorical(id, v)
            } else {
                self.best_continuous(id, v)
            };
            if let Some(c) = candidate {
                candidates.push(c);
            }
        }

        // Ascending variable order plus a strict comparison makes the
        // lowest variable index win ties.
        let mut best_idx: Option<usize> = None;
        for (i, c) in candidates.iter().enumerate() {
            let better = match best_idx {
                None => c.improvement > 0.0,
                Some(b) => gt_tol(c.improvement, candidates[b].improvement),
            };
            if better {
                best_idx = Some(i);
            }
        }
        let Some(best_idx) = best_idx else {
            return (None, Vec::new());
        };

        let best = candidates.remove(best_idx);
        candidates.sort_by(|a, b| b.improvement.total_cmp(&a.improvement));
        candidates.truncate(self.ctl.max_primary);
        (Some(best), candidates)
    }

    /// Best cut point on a continuous variable, or `None` when no boundary
    /// satisfies the constraints.
    fn best_continuous(&mut self, id: u64, v: usize) -> Option<Split> {
        let data = self.data;
        let family = self.family;
        let min_node = self.ctl.min_node;
        let order = &self.sorted.orders[v];
        let assign = &self.assign;
        let scratch = &mut self.scratch;

        scratch.scan_rows.clear();
        scratch.obs_stats.fill(0.0);
        for &r in &order.ordered {
            if assign[r as usize] == id {
                scratch.scan_rows.push(r);
                family.accumulate(
                    &mut scratch.obs_stats,
                    data.y_row(r as usize),
                    data.weight(r as usize),
                );
            }
        }
        let scan = &scratch.scan_rows;
        if scan.len() < 2 * min_node {
            return None;
        }
        let total_weight: f64 = scan.iter().map(|&r| data.weight(r as usize)).sum();
        if total_weight <= 0.0 {
            return None;
        }

        scratch.left_stats.fill(0.0);
        let mut left_weight = 0.0;
        let mut best: Option<(f64, f64)> = None; // (improvement, cut)
        for i in 0..scan.len() - 1 {
            let r = scan[i] as usize;
            family.accumulate(&mut scratch.left_stats, data.y_row(r), data.weight(r));
            left_weight += data.weight(r);

            let here = data.raw_value(r, v);
            let next = data.raw_value(scan[i + 1] as usize, v);
            if next <= here {
                continue; // not a value boundary
            }
            if i + 1 < min_node || scan.len() - i - 1 < min_node {
                continue;
            }
            if left_weight <= 0.0 || total_weight - left_weight <= 0.0 {
                continue;
            }
            for (rs, (&o, &l)) in scratch
                .right_stats
                .iter_mut()
                .zip(scratch.obs_stats.iter().zip(&scratch.left_stats))
            {
                *rs = o - l;
            }
            let improvement = family.split_improvement(
                &scratch.obs_stats,
                &scratch.left_stats,
                &scratch.right_stats,
            );
            let better = match best {
                None => improvement > 0.0,
                Some((b, _)) => gt_tol(improvement, b),
            };
            if better {
                best = Some((improvement, (here + next) / 2.0));
            }
        }

        best.map(|(improvement, cut)| Split {
            var: v,
            rule: SplitRule::Threshold { cut, left_if_less: true },
            improvement,
            count: scan.len(),
        })
    }

    /// Best two-group partition of a categorical variable's levels.
    ///
    /// Exhaustive for small arity; for larger arity the levels are ordered
    /// by the family's level score and only contiguous-in-score splits are
    /// considered.
    fn best_categorical(&mut self, id: u64, v: usize) -> Option<Split> {
        let data = self.data;
        let family = self.family;
        let sd = family.stat_dim();
        let min_node = self.ctl.min_node;
        let arity = data.arity(v) as usize;
        let order = &self.sorted.orders[v];
        let assign = &self.assign;
        let scratch = &mut self.scratch;

        scratch.cat_stats[..arity * sd].fill(0.0);
        scratch.cat_w[..arity].fill(0.0);
        scratch.cat_n[..arity].fill(0);
        scratch.obs_stats.fill(0.0);
        let mut n_observed = 0usize;
        for &r in &order.ordered {
            let r = r as usize;
            if assign[r] != id {
                continue;
            }
            let level = data.raw_value(r, v) as usize;
            let (y, w) = (data.y_row(r), data.weight(r));
            family.accumulate(&mut scratch.cat_stats[level * sd..(level + 1) * sd], y, w);
            family.accumulate(&mut scratch.obs_stats, y, w);
            scratch.cat_w[level] += w;
            scratch.cat_n[level] += 1;
            n_observed += 1;
        }
        if n_observed < 2 * min_node {
            return None;
        }

        let mut levels: Vec<usize> =
            (0..arity).filter(|&l| scratch.cat_n[l] > 0).collect();
        if levels.len() < 2 {
            return None;
        }
        let total_w: f64 = levels.iter().map(|&l| scratch.cat_w[l]).sum();

        let mut best: Option<(f64, FixedBitSet)> = None;
        let mut consider = |left_levels: &[usize], scratch: &mut Scratch| {
            scratch.left_stats.fill(0.0);
            let mut left_n = 0u32;
            let mut left_w = 0.0;
            for &l in left_levels {
                for (ls, cs) in scratch
                    .left_stats
                    .iter_mut()
                    .zip(&scratch.cat_stats[l * sd..(l + 1) * sd])
                {
                    *ls += cs;
                }
                left_n += scratch.cat_n[l];
                left_w += scratch.cat_w[l];
            }
            let right_n = n_observed as u32 - left_n;
            if (left_n as usize) < min_node || (right_n as usize) < min_node {
                return;
            }
            if left_w <= 0.0 || total_w - left_w <= 0.0 {
                return;
            }
            for (rs, (&o, &l)) in scratch
                .right_stats
                .iter_mut()
                .zip(scratch.obs_stats.iter().zip(&scratch.left_stats))
            {
                *rs = o - l;
            }
            let improvement = family.split_improvement(
                &scratch.obs_stats,
                &scratch.left_stats,
                &scratch.right_stats,
            );
            let better = match &best {
                None => improvement > 0.0,
                Some((b, _)) => gt_tol(improvement, *b),
            };
            if better {
                let mut set = FixedBitSet::with_capacity(arity);
                for &l in left_levels {
                    set.insert(l);
                }
                best = Some((improvement, set));
            }
        };

        if levels.len() <= EXHAUSTIVE_CATEGORY_LIMIT {
            // Fix the lowest present level to the left side; enumerating
            // subsets of the rest covers every partition exactly once.
            let free = &levels[1..];
            let mut left_levels = Vec::with_capacity(levels.len());
            for mask in 0u32..(1 << free.len()) {
                left_levels.clear();
                left_levels.push(levels[0]);
                for (bit, &l) in free.iter().enumerate() {
                    if mask & (1 << bit) != 0 {
                        left_levels.push(l);
                    }
                }
                consider(&left_levels, scratch);
            }
        } else {
            for &l in &levels {
                scratch.cat_score[l] =
                    family.level_score(&scratch.cat_stats[l * sd..(l + 1) * sd]);
            }
            let score = &scratch.cat_score;
            levels.sort_by(|&a, &b| score[a].total_cmp(&score[b]).then(a.cmp(&b)));
            for j in 1..levels.len() {
                consider(&levels[..j], scratch);
            }
        }

        best.map(|(improvement, set)| Split {
            var: v,
            rule: SplitRule::Categories(set),
            improvement,
            count: n_observed,
        })
    }

    // ========================================================================
    // Surrogates and partitioning
    // ========================================================================

    /// Find surrogate splits for `primary` and the majority direction.
    ///
    /// Fills the per-row direction buffer from the primary rule; each other
    /// variable is then scanned over rows observed on both it and the
    /// primary, looking for the rule that best reproduces those directions.
    fn find_surrogates(&mut self, id: u64, rows: &[u32], primary: &Split) -> (Vec<Surrogate>, bool) {
        let data = self.data;

        for &r in rows {
            self.scratch.dir[r as usize] = 0;
        }
        let mut weight_left = 0.0;
        let mut weight_right = 0.0;
        for &r in rows {
            let r = r as usize;
            if let Some(value) = data.value(r, primary.var) {
                if primary.rule.goes_left(value) {
                    self.scratch.dir[r] = 1;
                    weight_left += data.weight(r);
                } else {
                    self.scratch.dir[r] = 2;
                    weight_right += data.weight(r);
                }
            }
        }
        let majority_left = weight_left >= weight_right;

        let mut surrogates = Vec::new();
        if self.ctl.max_surrogate > 0 {
            for v in 0..data.n_vars() {
                if v == primary.var {
                    continue;
                }
                let candidate = if data.is_categorical(v) {
                    self.surrogate_categorical(id, v)
                } else {
                    self.surrogate_continuous(id, v)
                };
                if let Some(s) = candidate {
                    if s.adjusted > self.ctl.surrogate_agreement {
                        surrogates.push(s);
                    }
                }
            }
            // Stable sort: equal adjusted agreement keeps variable order.
            surrogates.sort_by(|a, b| b.adjusted.total_cmp(&a.adjusted));
            surrogates.truncate(self.ctl.max_surrogate);
        }
        (surrogates, majority_left)
    }

    /// Best threshold on `v` mimicking the primary directions.
    fn surrogate_continuous(&mut self, id: u64, v: usize) -> Option<Surrogate> {
        let data = self.data;
        let order = &self.sorted.orders[v];
        let assign = &self.assign;
        let scratch = &mut self.scratch;

        scratch.scan_rows.clear();
        let mut total_left = 0.0;
        let mut total_right = 0.0;
        for &r in &order.ordered {
            let d = scratch.dir[r as usize];
            if assign[r as usize] != id || d == 0 {
                continue;
            }
            scratch.scan_rows.push(r);
            if d == 1 {
                total_left += data.weight(r as usize);
            } else {
                total_right += data.weight(r as usize);
            }
        }
        let scan = &scratch.scan_rows;
        let total = total_left + total_right;
        let majority = total_left.max(total_right);
        if scan.len() < 2 || total - majority <= 0.0 {
            return None;
        }

        // Prefix weights of left-going and right-going rows; at each value
        // boundary the candidate sends the prefix left (or, reversed,
        // right) and is scored by the weight it routes like the primary.
        let mut prefix_left = 0.0;
        let mut prefix_right = 0.0;
        let mut best: Option<(f64, f64, bool)> = None; // (correct, cut, left_if_less)
        for i in 0..scan.len() - 1 {
            let r = scan[i] as usize;
            if scratch.dir[r] == 1 {
                prefix_left += data.weight(r);
            } else {
                prefix_right += data.weight(r);
            }
            let here = data.raw_value(r, v);
            let next = data.raw_value(scan[i + 1] as usize, v);
            if next <= here {
                continue;
            }
            let cut = (here + next) / 2.0;
            let forward = prefix_left + (total_right - prefix_right);
            let reversed = prefix_right + (total_left - prefix_left);
            for (correct, left_if_less) in [(forward, true), (reversed, false)] {
                let better = match best {
                    None => true,
                    Some((b, _, _)) => gt_tol(correct, b),
                };
                if better {
                    best = Some((correct, cut, left_if_less));
                }
            }
        }

        best.map(|(correct, cut, left_if_less)| Surrogate {
            var: v,
            rule: SplitRule::Threshold { cut, left_if_less },
            agreement: correct / total,
            adjusted: (correct - majority) / (total - majority),
            count: scan.len(),
        })
    }

    /// Best level grouping on `v` mimicking the primary directions: each
    /// level follows the majority direction of its own rows.
    fn surrogate_categorical(&mut self, id: u64, v: usize) -> Option<Surrogate> {
        let data = self.data;
        let arity = data.arity(v) as usize;
        let order = &self.sorted.orders[v];
        let assign = &self.assign;
        let scratch = &mut self.scratch;

        // cat_w doubles as per-level left weight, cat_score as right weight.
        scratch.cat_w[..arity].fill(0.0);
        scratch.cat_score[..arity].fill(0.0);
        let mut count = 0usize;
        for &r in &order.ordered {
            let r = r as usize;
            let d = scratch.dir[r];
            if assign[r] != id || d == 0 {
                continue;
            }
            let level = data.raw_value(r, v) as usize;
            if d == 1 {
                scratch.cat_w[level] += data.weight(r);
            } else {
                scratch.cat_score[level] += data.weight(r);
            }
            count += 1;
        }
        if count < 2 {
            return None;
        }
        let total_left: f64 = scratch.cat_w[..arity].iter().sum();
        let total_right: f64 = scratch.cat_score[..arity].iter().sum();
        let total = total_left + total_right;
        let majority = total_left.max(total_right);
        if total - majority <= 0.0 {
            return None;
        }

        let mut set = FixedBitSet::with_capacity(arity);
        let mut correct = 0.0;
        for l in 0..arity {
            let (lw, rw) = (scratch.cat_w[l], scratch.cat_score[l]);
            if lw + rw == 0.0 {
                continue; // unseen level, defaults right
            }
            if lw >= rw {
                set.insert(l);
                correct += lw;
            } else {
                correct += rw;
            }
        }

        Some(Surrogate {
            var: v,
            rule: SplitRule::Categories(set),
            agreement: correct / total,
            adjusted: (correct - majority) / (total - majority),
            count,
        })
    }

    /// Rearrange `rows` into `[left | right | stopped]` and update the
    /// membership array. Returns the left and right counts.
    fn partition(&mut self, id: u64, rows: &mut [u32], node: &Node) -> (usize, usize) {
        let data = self.data;
        let usage = self.ctl.use_surrogate;
        let Scratch { left_buf, right_buf, stop_buf, .. } = &mut self.scratch;
        left_buf.clear();
        right_buf.clear();
        stop_buf.clear();
        for &r in rows.iter() {
            match node.decide(data, r as usize, usage) {
                Some(true) => left_buf.push(r),
                Some(false) => right_buf.push(r),
                None => stop_buf.push(r),
            }
        }
        let (n_left, n_right) = (left_buf.len(), right_buf.len());
        if n_left == 0 || n_right == 0 {
            return (n_left, n_right);
        }
        for (slot, &r) in rows.iter_mut().zip(left_buf.iter().chain(&*right_buf).chain(&*stop_buf))
        {
            *slot = r;
        }
        for &r in &rows[..n_left] {
            self.assign[r as usize] = 2 * id;
        }
        for &r in &rows[n_left..n_left + n_right] {
            self.assign[r as usize] = 2 * id + 1;
        }
        (n_left, n_right)
    }
}

/// Cap complexities so they never increase from parent to child; leaves
/// inherit their parent's capped value.
fn cap_complexity(node: &mut Node, limit: f64) {
    if node.children.is_some() {
        node.complexity = node.complexity.min(limit);
        let limit = node.complexity;
        if let Some(c) = &mut node.children {
            cap_complexity(&mut c.0, limit);
            cap_complexity(&mut c.1, limit);
        }
    } else {
        node.complexity = limit;
    }
}
