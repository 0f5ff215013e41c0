//! Training data layout.
//!
//! Covariates are held column-major ([`ColMatrix`]) because tree growth walks
//! one variable at a time across many rows. Missing covariate values are
//! tracked in a parallel boolean matrix; `NaN` inputs are folded into it at
//! construction so the hot paths never test for `NaN` themselves. Responses
//! stay row-major since families consume one observation at a time.

mod order;

pub(crate) use order::{sort_columns, ColumnOrder, SortedColumns};

use ndarray::{ArrayView1, ArrayView2};

/// Dense column-major matrix.
#[derive(Clone, Debug)]
pub struct ColMatrix<T> {
    values: Vec<T>,
    n_rows: usize,
    n_cols: usize,
}

impl<T: Copy> ColMatrix<T> {
    /// Build from a flat column-major buffer of length `n_rows * n_cols`.
    pub fn new(values: Vec<T>, n_rows: usize, n_cols: usize) -> Self {
        assert_eq!(values.len(), n_rows * n_cols, "buffer/shape mismatch");
        Self { values, n_rows, n_cols }
    }

    #[inline]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    #[inline]
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> T {
        debug_assert!(row < self.n_rows && col < self.n_cols);
        self.values[col * self.n_rows + row]
    }

    /// One full column as a slice.
    #[inline]
    pub fn col(&self, col: usize) -> &[T] {
        &self.values[col * self.n_rows..(col + 1) * self.n_rows]
    }
}

/// Data validation error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DataError {
    /// Shape mismatch between covariates, responses, weights, or arities.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// An arity of 1 is neither continuous (0) nor a usable categorical.
    #[error("variable {0} has arity 1; use 0 for continuous or >= 2 levels")]
    InvalidArity(usize),

    /// A categorical value is not an integer level code in `0..arity`.
    #[error("variable {var} row {row}: value {value} is not a level in 0..{arity}")]
    InvalidLevel { var: usize, row: usize, value: f64, arity: u32 },

    /// A weight is negative or non-finite.
    #[error("row {0}: weight {1} is not finite and non-negative")]
    InvalidWeight(usize, f64),

    /// A response value is non-finite.
    #[error("row {0}: non-finite response value")]
    InvalidResponse(usize),
}

/// A fitting dataset: covariates with missingness, responses, and weights.
///
/// Rows are observations. Each covariate is either continuous (`arity == 0`)
/// or categorical with levels coded `0..arity`. Responses may span several
/// columns (e.g. survival time and status).
#[derive(Clone, Debug)]
pub struct Dataset {
    x: ColMatrix<f64>,
    missing: ColMatrix<bool>,
    arity: Vec<u32>,
    y: Vec<f64>,
    num_y: usize,
    weights: Vec<f64>,
}

impl Dataset {
    /// Build a dataset, validating shapes, level codes, and weights.
    ///
    /// `NaN` entries in `x` are treated as missing. `weights` defaults to
    /// all-ones when absent.
    ///
    /// # Errors
    ///
    /// Returns a [`DataError`] naming the first offending value.
    pub fn new(
        x: ArrayView2<'_, f64>,
        arity: Vec<u32>,
        y: ArrayView2<'_, f64>,
        weights: Option<ArrayView1<'_, f64>>,
    ) -> Result<Self, DataError> {
        let (n_rows, n_vars) = x.dim();
        if arity.len() != n_vars {
            return Err(DataError::ShapeMismatch(format!(
                "{} covariates but {} arities",
                n_vars,
                arity.len()
            )));
        }
        if y.nrows() != n_rows {
            return Err(DataError::ShapeMismatch(format!(
                "{} covariate rows but {} response rows",
                n_rows,
                y.nrows()
            )));
        }
        if let Some(w) = &weights {
            if w.len() != n_rows {
                return Err(DataError::ShapeMismatch(format!(
                    "{} rows but {} weights",
                    n_rows,
                    w.len()
                )));
            }
        }
        for (v, &k) in arity.iter().enumerate() {
            if k == 1 {
                return Err(DataError::InvalidArity(v));
            }
        }

        let mut values = vec![0.0; n_rows * n_vars];
        let mut miss = vec![false; n_rows * n_vars];
        for v in 0..n_vars {
            let k = arity[v];
            for r in 0..n_rows {
                let val = x[(r, v)];
                if val.is_nan() {
                    miss[v * n_rows + r] = true;
                } else {
                    if k > 0 && (val.fract() != 0.0 || val < 0.0 || val >= f64::from(k)) {
                        return Err(DataError::InvalidLevel { var: v, row: r, value: val, arity: k });
                    }
                    values[v * n_rows + r] = val;
                }
            }
        }

        let weights = match weights {
            Some(w) => {
                for (r, &wr) in w.iter().enumerate() {
                    if !wr.is_finite() || wr < 0.0 {
                        return Err(DataError::InvalidWeight(r, wr));
                    }
                }
                w.to_vec()
            }
            None => vec![1.0; n_rows],
        };

        let num_y = y.ncols();
        let mut resp = Vec::with_capacity(n_rows * num_y);
        for r in 0..n_rows {
            for c in 0..num_y {
                let val = y[(r, c)];
                if !val.is_finite() {
                    return Err(DataError::InvalidResponse(r));
                }
                resp.push(val);
            }
        }

        Ok(Self {
            x: ColMatrix::new(values, n_rows, n_vars),
            missing: ColMatrix::new(miss, n_rows, n_vars),
            arity,
            y: resp,
            num_y,
            weights,
        })
    }

    #[inline]
    pub fn n_rows(&self) -> usize {
        self.x.n_rows()
    }

    #[inline]
    pub fn n_vars(&self) -> usize {
        self.x.n_cols()
    }

    /// Number of response columns per observation.
    #[inline]
    pub fn n_responses(&self) -> usize {
        self.num_y
    }

    /// Arity of variable `v`: 0 for continuous, number of levels otherwise.
    #[inline]
    pub fn arity(&self, v: usize) -> u32 {
        self.arity[v]
    }

    #[inline]
    pub fn is_categorical(&self, v: usize) -> bool {
        self.arity[v] > 0
    }

    #[inline]
    pub fn weight(&self, row: usize) -> f64 {
        self.weights[row]
    }

    /// Sum of all observation weights.
    pub fn total_weight(&self) -> f64 {
        self.weights.iter().sum()
    }

    /// Response vector of one observation.
    #[inline]
    pub fn y_row(&self, row: usize) -> &[f64] {
        &self.y[row * self.num_y..(row + 1) * self.num_y]
    }

    /// Covariate value, or `None` when missing.
    #[inline]
    pub fn value(&self, row: usize, v: usize) -> Option<f64> {
        if self.missing.get(row, v) {
            None
        } else {
            Some(self.x.get(row, v))
        }
    }

    /// Covariate value without the missingness check. Only meaningful for
    /// rows known to be observed.
    #[inline]
    pub(crate) fn raw_value(&self, row: usize, v: usize) -> f64 {
        self.x.get(row, v)
    }

    #[inline]
    pub fn is_missing(&self, row: usize, v: usize) -> bool {
        self.missing.get(row, v)
    }

    /// New dataset containing only `rows`, in the given order.
    pub fn subset(&self, rows: &[u32]) -> Self {
        let n = rows.len();
        let n_vars = self.n_vars();
        let mut values = vec![0.0; n * n_vars];
        let mut miss = vec![false; n * n_vars];
        for v in 0..n_vars {
            let src_x = self.x.col(v);
            let src_m = self.missing.col(v);
            for (i, &r) in rows.iter().enumerate() {
                values[v * n + i] = src_x[r as usize];
                miss[v * n + i] = src_m[r as usize];
            }
        }
        let mut y = Vec::with_capacity(n * self.num_y);
        let mut weights = Vec::with_capacity(n);
        for &r in rows {
            y.extend_from_slice(self.y_row(r as usize));
            weights.push(self.weights[r as usize]);
        }
        Self {
            x: ColMatrix::new(values, n, n_vars),
            missing: ColMatrix::new(miss, n, n_vars),
            arity: self.arity.clone(),
            y,
            num_y: self.num_y,
            weights,
        }
    }
}
