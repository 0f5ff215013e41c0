//! Once-and-for-all column ordering.
//!
//! Continuous variables are sorted a single time before growth; every split
//! search then walks the presorted order and filters by node membership,
//! so no per-node re-sorting ever happens. Rows with a missing value are
//! left out of the order entirely, so scan loops only ever see observed
//! values; missing rows re-enter through surrogate routing.

use rayon::prelude::*;

use crate::data::Dataset;
use crate::parallel::Parallelism;

/// Precomputed ordering of one covariate column.
#[derive(Clone, Debug)]
pub(crate) struct ColumnOrder {
    /// Rows with an observed value. Ascending by value for continuous
    /// variables; original row order for categoricals (level counting does
    /// not need a sort). Missing rows do not appear.
    pub ordered: Vec<u32>,
}

/// Column orderings for a whole dataset.
#[derive(Clone, Debug)]
pub(crate) struct SortedColumns {
    pub orders: Vec<ColumnOrder>,
    /// Largest arity over all categorical variables (0 if none).
    pub max_categories: usize,
}

fn order_column(data: &Dataset, v: usize) -> ColumnOrder {
    let mut ordered = Vec::new();
    for r in 0..data.n_rows() {
        if !data.is_missing(r, v) {
            ordered.push(r as u32);
        }
    }
    if !data.is_categorical(v) {
        // Stable sort keeps equal values in row order, so downstream
        // tie-breaking is deterministic.
        ordered.sort_by(|&a, &b| {
            data.raw_value(a as usize, v).total_cmp(&data.raw_value(b as usize, v))
        });
    }
    ColumnOrder { ordered }
}

/// Sort every column of `data` once, up front.
pub(crate) fn sort_columns(data: &Dataset, parallelism: Parallelism) -> SortedColumns {
    let parallelism = parallelism.scaled_to(data.n_vars(), 4);
    let orders: Vec<ColumnOrder> = if parallelism.is_parallel() {
        (0..data.n_vars()).into_par_iter().map(|v| order_column(data, v)).collect()
    } else {
        (0..data.n_vars()).map(|v| order_column(data, v)).collect()
    };
    let max_categories = (0..data.n_vars()).map(|v| data.arity(v) as usize).max().unwrap_or(0);
    SortedColumns { orders, max_categories }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn continuous_sorted_missing_excluded() {
        let x = array![[3.0], [f64::NAN], [1.0], [2.0], [f64::NAN]];
        let y = array![[0.0], [0.0], [0.0], [0.0], [0.0]];
        let data = Dataset::new(x.view(), vec![0], y.view(), None).unwrap();
        let sorted = sort_columns(&data, Parallelism::Sequential);
        assert_eq!(sorted.orders[0].ordered, vec![2, 3, 0]);
    }

    #[test]
    fn ties_keep_row_order() {
        let x = array![[1.0], [0.0], [1.0], [0.0]];
        let y = array![[0.0], [0.0], [0.0], [0.0]];
        let data = Dataset::new(x.view(), vec![0], y.view(), None).unwrap();
        let sorted = sort_columns(&data, Parallelism::Sequential);
        assert_eq!(sorted.orders[0].ordered, vec![1, 3, 0, 2]);
    }

    #[test]
    fn categorical_stays_in_row_order() {
        let x = array![[2.0, 2.0], [0.0, 0.0], [1.0, 1.0]];
        let y = array![[0.0], [0.0], [0.0]];
        let data = Dataset::new(x.view(), vec![3, 0], y.view(), None).unwrap();
        let sorted = sort_columns(&data, Parallelism::Sequential);
        assert_eq!(sorted.orders[0].ordered, vec![0, 1, 2]);
        assert_eq!(sorted.orders[1].ordered, vec![1, 2, 0]);
        assert_eq!(sorted.max_categories, 3);
    }
}
