//! End-to-end fitting behavior.

use approx::{assert_abs_diff_eq, assert_relative_eq};
use cartree::{
    fit, Control, Dataset, FitError, Method, Node, Parallelism, SplitRule, SurrogateUse, XvalSpec,
};
use ndarray::{Array1, Array2};

fn anova_data(x: Array2<f64>, arity: Vec<u32>, y: Vec<f64>) -> Dataset {
    let y = Array2::from_shape_vec((y.len(), 1), y).unwrap();
    Dataset::new(x.view(), arity, y.view(), None).unwrap()
}

/// 100 rows, one continuous predictor, two perfectly separated response
/// levels at x = 0 and x = 1.
fn step_dataset() -> Dataset {
    let n = 100;
    let x = Array1::from_iter((0..n).map(|i| if i < n / 2 { 0.0 } else { 1.0 }))
        .into_shape_with_order((n, 1))
        .unwrap();
    let y = (0..n).map(|i| if i < n / 2 { 0.0 } else { 1.0 }).collect();
    anova_data(x, vec![0], y)
}

fn leaf_risk_sum(node: &Node) -> f64 {
    match (node.left(), node.right()) {
        (Some(l), Some(r)) => leaf_risk_sum(l) + leaf_risk_sum(r),
        _ => node.risk,
    }
}

fn leaf_ids(node: &Node, out: &mut Vec<u64>) {
    match (node.left(), node.right()) {
        (Some(l), Some(r)) => {
            leaf_ids(l, out);
            leaf_ids(r, out);
        }
        _ => out.push(node.id),
    }
}

#[test]
fn perfect_step_fit_matches_the_textbook_answer() {
    let data = step_dataset();
    let result = fit(
        &data,
        Method::Anova,
        &[],
        &Control::default(),
        &XvalSpec::Folds { folds: 1, seed: 0 },
        Parallelism::Sequential,
    )
    .unwrap();

    assert_eq!(result.tree.n_leaves(), 2);
    let split = result.tree.split.as_ref().unwrap();
    match split.rule {
        SplitRule::Threshold { cut, .. } => assert_relative_eq!(cut, 0.5),
        _ => panic!("expected a threshold rule"),
    }

    // Root risk 25, one split removing all of it, cp floor 0.01 * 25.
    let table = &result.cp_table;
    assert_eq!(table.len(), 2);
    assert_relative_eq!(table.entries[0].cp, 25.0);
    assert_eq!(table.entries[0].n_splits, 0);
    assert_relative_eq!(table.entries[0].risk, 25.0);
    assert_relative_eq!(table.entries[1].cp, 0.25);
    assert_eq!(table.entries[1].n_splits, 1);
    assert_abs_diff_eq!(table.entries[1].risk, 0.0, epsilon = 1e-12);

    // One fold means no cross-validation columns.
    assert!(table.entries.iter().all(|e| e.xrisk.is_none() && e.xstd.is_none()));
}

#[test]
fn leaf_assignment_is_consistent_with_the_tree() {
    let n = 120;
    let x = Array1::from_iter((0..n).map(f64::from))
        .into_shape_with_order((n as usize, 1))
        .unwrap();
    let y: Vec<f64> = (0..n).map(|i| f64::from(i / 30) * 5.0).collect();
    let data = anova_data(x, vec![0], y);
    let ctl = Control { cp: 0.001, ..Default::default() };
    let result =
        fit(&data, Method::Anova, &[], &ctl, &XvalSpec::None, Parallelism::Sequential).unwrap();

    let mut ids = Vec::new();
    leaf_ids(&result.tree, &mut ids);
    let mut counts = std::collections::HashMap::new();
    for &id in &result.leaf_assignment {
        assert!(ids.contains(&id), "row assigned to non-leaf node {id}");
        *counts.entry(id).or_insert(0usize) += 1;
    }
    // Per-leaf counts agree with the node's own count.
    fn check(node: &Node, counts: &std::collections::HashMap<u64, usize>) {
        match (node.left(), node.right()) {
            (Some(l), Some(r)) => {
                check(l, counts);
                check(r, counts);
            }
            _ => assert_eq!(counts.get(&node.id).copied().unwrap_or(0), node.n),
        }
    }
    check(&result.tree, &counts);
}

#[test]
fn in_sample_risk_decomposes_over_leaves() {
    let n = 90;
    let x = Array1::from_iter((0..n).map(|i| f64::from(i % 30)))
        .into_shape_with_order((n as usize, 1))
        .unwrap();
    let y: Vec<f64> = (0..n).map(|i| f64::from(i % 30) * 0.5 + f64::from(i % 7)).collect();
    let data = anova_data(x, vec![0], y);
    let ctl = Control { cp: 0.005, min_split: 10, min_node: 3, ..Default::default() };
    let result =
        fit(&data, Method::Anova, &[], &ctl, &XvalSpec::None, Parallelism::Sequential).unwrap();

    let last = result.cp_table.entries.last().unwrap();
    assert_relative_eq!(last.risk, leaf_risk_sum(&result.tree), max_relative = 1e-9);
    assert_eq!(last.n_splits as usize, result.tree.n_leaves() - 1);
}

#[test]
fn split_improvement_decomposes_parent_risk() {
    // With every covariate observed, each parent's risk equals the sum of
    // its children's risks plus the reported improvement.
    let n = 120;
    let x = Array1::from_iter((0..n).map(f64::from))
        .into_shape_with_order((n as usize, 1))
        .unwrap();
    let y: Vec<f64> = (0..n).map(|i| f64::from(i / 15) * 2.0 + f64::from(i % 3)).collect();
    let data = anova_data(x, vec![0], y);
    let ctl = Control { cp: 0.001, min_split: 10, min_node: 3, ..Default::default() };
    let result =
        fit(&data, Method::Anova, &[], &ctl, &XvalSpec::None, Parallelism::Sequential).unwrap();

    fn check(node: &Node) {
        if let (Some(l), Some(r)) = (node.left(), node.right()) {
            let improvement = node.split.as_ref().unwrap().improvement;
            assert_relative_eq!(node.risk, l.risk + r.risk + improvement, max_relative = 1e-9);
            check(l);
            check(r);
        }
    }
    check(&result.tree);
}

#[test]
fn cp_table_is_monotone() {
    let n = 150;
    let x = Array1::from_iter((0..n).map(f64::from))
        .into_shape_with_order((n as usize, 1))
        .unwrap();
    let y: Vec<f64> = (0..n).map(|i| f64::from(i / 25) * 2.0 + f64::from(i % 4)).collect();
    let data = anova_data(x, vec![0], y);
    let ctl = Control { cp: 0.002, min_split: 10, min_node: 3, ..Default::default() };
    let result =
        fit(&data, Method::Anova, &[], &ctl, &XvalSpec::None, Parallelism::Sequential).unwrap();

    let entries = &result.cp_table.entries;
    assert!(entries.len() >= 2);
    for pair in entries.windows(2) {
        assert!(pair[1].cp < pair[0].cp);
        assert!(pair[1].n_splits > pair[0].n_splits);
        assert!(pair[1].risk <= pair[0].risk + 1e-12);
    }
}

#[test]
fn fits_are_deterministic_across_parallelism() {
    let data = step_dataset();
    let ctl = Control::default();
    let xval = XvalSpec::Folds { folds: 5, seed: 42 };
    let sequential =
        fit(&data, Method::Anova, &[], &ctl, &xval, Parallelism::Sequential).unwrap();
    let parallel =
        fit(&data, Method::Anova, &[], &ctl, &xval, Parallelism::Parallel(4)).unwrap();
    assert_eq!(sequential, parallel);

    let again = fit(&data, Method::Anova, &[], &ctl, &xval, Parallelism::Sequential).unwrap();
    assert_eq!(sequential, again);
}

#[test]
fn cross_validation_fills_every_level() {
    let data = step_dataset();
    let result = fit(
        &data,
        Method::Anova,
        &[],
        &Control::default(),
        &XvalSpec::Folds { folds: 5, seed: 1 },
        Parallelism::Sequential,
    )
    .unwrap();

    for entry in &result.cp_table.entries {
        let xrisk = entry.xrisk.unwrap();
        let xstd = entry.xstd.unwrap();
        assert!(xrisk.is_finite() && xrisk >= 0.0);
        assert!(xstd.is_finite() && xstd >= 0.0);
    }
    // The separation is real, so the split must validate better than the
    // root-only tree.
    let root_level = result.cp_table.entries[0].xrisk.unwrap();
    let full_level = result.cp_table.entries[1].xrisk.unwrap();
    assert!(full_level < root_level);
    assert_abs_diff_eq!(full_level, 0.0, epsilon = 1e-9);
}

#[test]
fn leave_one_out_matches_the_closed_form() {
    // y is 0 on one side and 10 on the other; leaving row i out, the root
    // prediction is (S - y_i) / 99 and every row's squared error works out
    // to (500/99)^2.
    let n = 100;
    let x = Array1::from_iter((0..n).map(|i| if i < n / 2 { 0.0 } else { 1.0 }))
        .into_shape_with_order((n, 1))
        .unwrap();
    let y: Vec<f64> = (0..n).map(|i| if i < n / 2 { 0.0 } else { 10.0 }).collect();
    let data = anova_data(x, vec![0], y);
    let result = fit(
        &data,
        Method::Anova,
        &[],
        &Control::default(),
        &XvalSpec::Folds { folds: 100, seed: 3 },
        Parallelism::Sequential,
    )
    .unwrap();

    let e = 500.0 / 99.0;
    let root_level = &result.cp_table.entries[0];
    assert_relative_eq!(root_level.xrisk.unwrap(), 100.0 * e * e, max_relative = 1e-9);
    // Identical per-row errors: zero spread.
    assert_abs_diff_eq!(root_level.xstd.unwrap(), 0.0, epsilon = 1e-6);

    // Each fold's tree still separates the groups perfectly.
    let full_level = result.cp_table.entries.last().unwrap();
    assert_abs_diff_eq!(full_level.xrisk.unwrap(), 0.0, epsilon = 1e-9);
}

#[test]
fn constant_response_reports_no_splits_with_inspectable_root() {
    let n = 50;
    let x = Array1::from_iter((0..n).map(f64::from))
        .into_shape_with_order((n as usize, 1))
        .unwrap();
    let data = anova_data(x, vec![0], vec![7.0; 50]);
    let err = fit(
        &data,
        Method::Anova,
        &[],
        &Control::default(),
        &XvalSpec::Folds { folds: 5, seed: 0 },
        Parallelism::Sequential,
    )
    .unwrap_err();

    let FitError::NoSplits(result) = err else {
        panic!("expected NoSplits");
    };
    assert!(result.tree.is_leaf());
    assert_relative_eq!(result.tree.estimate, 7.0);
    assert_eq!(result.cp_table.len(), 1);
    assert_eq!(result.cp_table.entries[0].n_splits, 0);
    assert!(result.leaf_assignment.iter().all(|&id| id == 1));
}

#[test]
fn zero_total_weight_is_rejected() {
    let n = 30;
    let x = Array1::from_iter((0..n).map(f64::from))
        .into_shape_with_order((n as usize, 1))
        .unwrap();
    let y = Array2::zeros((30, 1));
    let w = Array1::zeros(30);
    let data = Dataset::new(x.view(), vec![0], y.view(), Some(w.view())).unwrap();
    let err = fit(
        &data,
        Method::Anova,
        &[],
        &Control::default(),
        &XvalSpec::None,
        Parallelism::Sequential,
    )
    .unwrap_err();
    assert!(matches!(err, FitError::InvalidParams(_)));
}

#[test]
fn response_shape_must_match_the_method() {
    let data = step_dataset(); // one response column
    let err = fit(
        &data,
        Method::ExpSurvival,
        &[],
        &Control::default(),
        &XvalSpec::None,
        Parallelism::Sequential,
    )
    .unwrap_err();
    assert!(matches!(err, FitError::InvalidParams(_)));
}

#[test]
fn surrogates_route_missing_rows_to_leaves() {
    // Var 0 carries the split but is missing on a few rows; var 1 mirrors
    // it and routes them.
    let n = 60;
    let mut xs = Vec::with_capacity(n * 2);
    let mut y = Vec::with_capacity(n);
    for i in 0..n {
        let group = if i < n / 2 { 0.0 } else { 1.0 };
        xs.push(if i % 15 == 0 { f64::NAN } else { group });
        xs.push(group);
        y.push(group * 4.0);
    }
    let x = Array2::from_shape_vec((n, 2), xs).unwrap();
    let data = anova_data(x, vec![0, 0], y);
    let result = fit(
        &data,
        Method::Anova,
        &[],
        &Control::default(),
        &XvalSpec::None,
        Parallelism::Sequential,
    )
    .unwrap();

    assert_eq!(result.tree.split.as_ref().unwrap().var, 0);
    assert_eq!(result.tree.surrogates[0].var, 1);
    let mut ids = Vec::new();
    leaf_ids(&result.tree, &mut ids);
    for (r, &id) in result.leaf_assignment.iter().enumerate() {
        assert!(ids.contains(&id), "row {r} stranded at node {id}");
    }
}

#[test]
fn disabling_surrogates_strands_missing_rows_at_the_split() {
    let n = 60;
    let mut xs = Vec::with_capacity(n);
    let mut y = Vec::with_capacity(n);
    for i in 0..n {
        let group = if i < n / 2 { 0.0 } else { 1.0 };
        xs.push(if i == 7 { f64::NAN } else { group });
        y.push(group * 4.0);
    }
    let x = Array2::from_shape_vec((n, 1), xs).unwrap();
    let data = anova_data(x, vec![0], y);
    let ctl = Control { use_surrogate: SurrogateUse::None, ..Default::default() };
    let result =
        fit(&data, Method::Anova, &[], &ctl, &XvalSpec::None, Parallelism::Sequential).unwrap();

    // Row 7 has no observed split variable and no surrogate: it stays at
    // the root while everything else reaches a leaf.
    assert_eq!(result.leaf_assignment[7], 1);
    assert!(result
        .leaf_assignment
        .iter()
        .enumerate()
        .all(|(r, &id)| r == 7 || id == 2 || id == 3));
    // The stranded row still counts toward the root.
    assert_eq!(result.tree.n, 60);
    assert_eq!(result.tree.left().unwrap().n + result.tree.right().unwrap().n, 59);
}

#[test]
fn exponential_survival_splits_on_event_rate() {
    // Two arms with tenfold different hazard; all events observed plus a
    // few censored rows per arm.
    let n = 80;
    let mut xs = Vec::with_capacity(n);
    let mut ys = Vec::with_capacity(n * 2);
    for i in 0..n {
        let fast = i < n / 2;
        xs.push(if fast { 0.0 } else { 1.0 });
        let time = if fast { 0.5 } else { 5.0 };
        let status = if i % 10 == 9 { 0.0 } else { 1.0 };
        ys.push(time);
        ys.push(status);
    }
    let x = Array2::from_shape_vec((n, 1), xs).unwrap();
    let y = Array2::from_shape_vec((n, 2), ys).unwrap();
    let data = Dataset::new(x.view(), vec![0], y.view(), None).unwrap();
    let result = fit(
        &data,
        Method::ExpSurvival,
        &[],
        &Control::default(),
        &XvalSpec::Folds { folds: 5, seed: 11 },
        Parallelism::Sequential,
    )
    .unwrap();

    assert_eq!(result.tree.n_leaves(), 2);
    let (left, right) = (result.tree.left().unwrap(), result.tree.right().unwrap());
    // Short times go left (x = 0): higher event rate.
    assert!(left.estimate > right.estimate);
    assert!(result.cp_table.entries.iter().all(|e| e.xrisk.is_some()));
}

#[test]
fn constant_rate_survival_produces_no_splits() {
    // Identical hazard everywhere: the covariate carries no signal, so the
    // root-only degenerate condition fires.
    let n = 50;
    let x = Array1::from_iter((0..n).map(f64::from))
        .into_shape_with_order((n as usize, 1))
        .unwrap();
    let mut ys = Vec::with_capacity(50 * 2);
    for _ in 0..50 {
        ys.push(2.0);
        ys.push(1.0);
    }
    let y = Array2::from_shape_vec((50, 2), ys).unwrap();
    let data = Dataset::new(x.view(), vec![0], y.view(), None).unwrap();
    let err = fit(
        &data,
        Method::ExpSurvival,
        &[],
        &Control::default(),
        &XvalSpec::None,
        Parallelism::Sequential,
    )
    .unwrap_err();
    assert!(matches!(err, FitError::NoSplits(_)));
}

#[test]
fn assigned_folds_are_honored_and_reproducible() {
    let data = step_dataset();
    let fold_of: Vec<u32> = (0..100).map(|i| i % 2).collect();
    let a = fit(
        &data,
        Method::Anova,
        &[],
        &Control::default(),
        &XvalSpec::Assigned(fold_of.clone()),
        Parallelism::Sequential,
    )
    .unwrap();
    let b = fit(
        &data,
        Method::Anova,
        &[],
        &Control::default(),
        &XvalSpec::Assigned(fold_of),
        Parallelism::Sequential,
    )
    .unwrap();
    assert_eq!(a, b);
    assert!(a.cp_table.entries[0].xrisk.is_some());
}
