//! Fit orchestration: validate, sort, grow, prune, cross-validate.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::control::Control;
use crate::data::{sort_columns, Dataset};
use crate::error::FitError;
use crate::family::{Family, Method};
use crate::grow::grow;
use crate::parallel::Parallelism;
use crate::prune::{build_cp_table, CpTable};
use crate::tree::Node;
use crate::xval::{cross_validate, FoldAssignment};

/// Cross-validation request.
#[derive(Clone, Debug, PartialEq)]
pub enum XvalSpec {
    /// No cross-validation; the cp table keeps empty `xrisk` columns.
    None,
    /// `folds`-fold cross-validation with seeded fold shuffling. Fold
    /// counts above the row count are clamped to leave-one-out; 0 or 1
    /// folds mean no cross-validation.
    Folds { folds: usize, seed: u64 },
    /// Caller-supplied fold index per row (all indices up to the maximum
    /// must be meant as folds; at least two).
    Assigned(Vec<u32>),
}

/// A fitted tree with its pruning sequence.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FitResult {
    /// Root of the grown tree.
    pub tree: Node,
    /// Cost-complexity pruning sequence, cross-validated when requested.
    pub cp_table: CpTable,
    /// Node id each training row ended in: a leaf id, or an interior id for
    /// rows that could not be routed past a missing primary variable.
    pub leaf_assignment: Vec<u64>,
}

/// Fit a recursive-partitioning tree.
///
/// Validates the configuration, grows the tree under `control`, builds the
/// pruning sequence, and cross-validates it per `xval`.
///
/// # Errors
///
/// Configuration and data problems surface before any tree is built. A root
/// that cannot be split is reported as [`FitError::NoSplits`] with the
/// root-only result attached.
pub fn fit(
    data: &Dataset,
    method: Method,
    parms: &[f64],
    control: &Control,
    xval: &XvalSpec,
    parallelism: Parallelism,
) -> Result<FitResult, FitError> {
    control.validate()?;
    if data.n_rows() == 0 {
        return Err(FitError::InvalidParams("no observations".to_string()));
    }
    if data.total_weight() <= 0.0 {
        return Err(FitError::InvalidParams(
            "total case weight must be positive".to_string(),
        ));
    }
    let mut family = method.family(parms)?;
    if data.n_responses() != family.response_dim() {
        return Err(FitError::InvalidParams(format!(
            "method expects {} response column(s), data has {}",
            family.response_dim(),
            data.n_responses()
        )));
    }
    family.init(data)?;
    let folds = resolve_folds(xval, data.n_rows())?;

    let sorted = sort_columns(data, parallelism);
    let grown = grow(data, &sorted, &family, control);
    let mut table = build_cp_table(&grown.root, grown.alpha);

    if grown.root.is_leaf() {
        return Err(FitError::NoSplits(Box::new(FitResult {
            tree: grown.root,
            cp_table: table,
            leaf_assignment: grown.assignments,
        })));
    }

    if let Some(folds) = folds {
        cross_validate(
            data,
            method,
            parms,
            control,
            &folds,
            grown.root_risk,
            &mut table,
            parallelism,
        )?;
    }

    Ok(FitResult {
        tree: grown.root,
        cp_table: table,
        leaf_assignment: grown.assignments,
    })
}

fn resolve_folds(xval: &XvalSpec, n_rows: usize) -> Result<Option<FoldAssignment>, FitError> {
    match xval {
        XvalSpec::None => Ok(None),
        XvalSpec::Folds { folds, seed } => {
            if *folds <= 1 {
                return Ok(None);
            }
            let n_folds = (*folds).min(n_rows);
            let mut rows: Vec<u32> = (0..n_rows as u32).collect();
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(*seed);
            rows.shuffle(&mut rng);
            let mut fold_of = vec![0u32; n_rows];
            for (i, &r) in rows.iter().enumerate() {
                fold_of[r as usize] = (i % n_folds) as u32;
            }
            Ok(Some(FoldAssignment { fold_of, n_folds }))
        }
        XvalSpec::Assigned(fold_of) => {
            if fold_of.len() != n_rows {
                return Err(FitError::BadFoldAssignment(format!(
                    "{} rows but {} fold indices",
                    n_rows,
                    fold_of.len()
                )));
            }
            let n_folds = match fold_of.iter().max() {
                Some(&m) => m as usize + 1,
                None => 0,
            };
            if n_folds < 2 {
                return Err(FitError::BadFoldAssignment(
                    "at least two folds are required".to_string(),
                ));
            }
            Ok(Some(FoldAssignment { fold_of: fold_of.clone(), n_folds }))
        }
    }
}
