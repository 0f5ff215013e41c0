//! Recursive-partitioning (CART) trees.
//!
//! `cartree` fits binary decision trees to tabular data with mixed
//! continuous/categorical covariates, case weights, and missing values,
//! the way the classic recursive-partitioning literature describes:
//!
//! - candidate splits are found by scanning presorted columns, so growth
//!   costs one pass per variable per node;
//! - rows missing a node's split variable are routed by *surrogate*
//!   splits, ranked by how well they reproduce the primary split;
//! - the grown tree carries a cost-complexity pruning sequence
//!   ([`CpTable`]), optionally with k-fold cross-validated risk per level.
//!
//! Response behavior is pluggable through the [`Family`] trait; the built-in
//! families are least-squares regression ([`Anova`]) and exponential
//! survival ([`ExpSurvival`]).
//!
//! # Example
//!
//! ```
//! use cartree::{fit, Control, Dataset, Method, Parallelism, XvalSpec};
//! use ndarray::array;
//!
//! let x = array![[1.0], [2.0], [3.0], [10.0], [11.0], [12.0]];
//! let y = array![[0.0], [0.0], [0.0], [5.0], [5.0], [5.0]];
//! let data = Dataset::new(x.view(), vec![0], y.view(), None)?;
//!
//! let result = fit(
//!     &data,
//!     Method::Anova,
//!     &[],
//!     &Control::with_min_split(4),
//!     &XvalSpec::None,
//!     Parallelism::Sequential,
//! )?;
//! assert_eq!(result.tree.n_leaves(), 2);
//! # Ok::<(), cartree::FitError>(())
//! ```

mod control;
mod data;
mod error;
mod family;
mod fit;
mod grow;
mod parallel;
mod prune;
mod tree;
mod util;
mod xval;

pub use control::{Control, ControlError, SurrogateUse};
pub use data::{ColMatrix, DataError, Dataset};
pub use error::FitError;
pub use family::{Anova, ExpSurvival, Family, FamilyKind, Method};
pub use fit::{fit, FitResult, XvalSpec};
pub use parallel::Parallelism;
pub use prune::{CpEntry, CpTable};
pub use tree::{Node, Split, SplitRule, Surrogate};
