//! Parallel execution hints.
//!
//! Fold fitting and column sorting are independent units of work, but both
//! are often too small to be worth fanning out over rayon. Callers pass a
//! [`Parallelism`] hint; each site scales it to its own workload before
//! deciding whether to go wide.

/// Degree of parallelism requested for a fit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Parallelism {
    /// Everything runs on the calling thread.
    #[default]
    Sequential,
    /// Fan out over rayon, using at most this many workers. `Parallel(0)`
    /// and `Parallel(1)` behave like [`Sequential`](Self::Sequential).
    Parallel(usize),
}

impl Parallelism {
    /// Whether any fan-out happens at all.
    pub fn is_parallel(self) -> bool {
        match self {
            Self::Sequential => false,
            Self::Parallel(workers) => workers > 1,
        }
    }

    /// Scale the hint to a workload of `n_items` units, requiring at least
    /// `grain` units per worker. Work that cannot keep two workers busy
    /// degrades to `Sequential`.
    pub fn scaled_to(self, n_items: usize, grain: usize) -> Self {
        let Self::Parallel(workers) = self else {
            return Self::Sequential;
        };
        let useful = n_items / grain.max(1);
        match workers.min(useful) {
            0 | 1 => Self::Sequential,
            w => Self::Parallel(w),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_worker_is_sequential() {
        assert!(!Parallelism::Sequential.is_parallel());
        assert!(!Parallelism::Parallel(0).is_parallel());
        assert!(!Parallelism::Parallel(1).is_parallel());
        assert!(Parallelism::Parallel(2).is_parallel());
    }

    #[test]
    fn scaling_respects_the_grain() {
        let hint = Parallelism::Parallel(8);
        assert_eq!(hint.scaled_to(2, 4), Parallelism::Sequential);
        assert_eq!(hint.scaled_to(16, 4), Parallelism::Parallel(4));
        assert_eq!(hint.scaled_to(100, 4), Parallelism::Parallel(8));
        assert_eq!(
            Parallelism::Sequential.scaled_to(100, 1),
            Parallelism::Sequential
        );
    }
}
