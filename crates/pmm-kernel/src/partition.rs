use std::fmt;
use std::ops::Range;

use crate::error::{KernelError, Result};
use crate::view::matrix_bytes;

/// A half-open range of matrix rows, `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowRange {
    pub start: usize,
    pub end: usize,
}

impl RowRange {
    pub fn new(start: usize, end: usize) -> Self {
        RowRange { start, end }
    }

    /// Number of rows in the range.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, row: usize) -> bool {
        row >= self.start && row < self.end
    }

    /// Iterate over the row indices in the range.
    pub fn iter(&self) -> Range<usize> {
        self.start..self.end
    }
}

impl fmt::Display for RowRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

impl From<RowRange> for Range<usize> {
    fn from(r: RowRange) -> Self {
        r.start..r.end
    }
}

fn check(dim: usize, workers: usize) -> Result<()> {
    if dim == 0 {
        return Err(KernelError::ZeroDimension);
    }
    matrix_bytes(dim)?;
    if workers == 0 {
        return Err(KernelError::ZeroWorkers);
    }
    if dim % workers != 0 {
        return Err(KernelError::Partition { dim, workers });
    }
    Ok(())
}

/// Rows owned by worker `index` out of `workers` for a `dim`x`dim` output.
///
/// Computed from the three inputs alone, so a worker process can re-derive
/// its range without receiving the whole plan:
/// `[index * dim / workers, (index + 1) * dim / workers)`.
pub fn row_range(dim: usize, workers: usize, index: usize) -> Result<RowRange> {
    check(dim, workers)?;
    if index >= workers {
        return Err(KernelError::WorkerIndex { index, workers });
    }
    let rows = dim / workers;
    Ok(RowRange::new(index * rows, (index + 1) * rows))
}

/// Static assignment of contiguous output rows to workers.
///
/// Every worker gets `dim / workers` rows; the ranges are disjoint and their
/// union is exactly `[0, dim)`. Disjointness is what lets workers write the
/// output matrix concurrently without synchronization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionPlan {
    dim: usize,
    workers: usize,
    ranges: Vec<RowRange>,
}

impl PartitionPlan {
    /// Build the plan for a `dim`x`dim` output split across `workers`.
    ///
    /// # Errors
    /// `ZeroDimension` / `ZeroWorkers` for zero inputs, `Partition` when
    /// `dim` is not a multiple of `workers`.
    pub fn new(dim: usize, workers: usize) -> Result<Self> {
        check(dim, workers)?;
        let ranges = (0..workers)
            .map(|p| row_range(dim, workers, p))
            .collect::<Result<Vec<_>>>()?;
        Ok(PartitionPlan {
            dim,
            workers,
            ranges,
        })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn rows_per_worker(&self) -> usize {
        self.dim / self.workers
    }

    pub fn ranges(&self) -> &[RowRange] {
        &self.ranges
    }

    /// Rows assigned to worker `index`, or `None` if out of range.
    pub fn range(&self, index: usize) -> Option<RowRange> {
        self.ranges.get(index).copied()
    }

    /// Iterate over `(worker index, rows)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (usize, RowRange)> + '_ {
        self.ranges.iter().copied().enumerate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn divisors(n: usize) -> Vec<usize> {
        (1..=n).filter(|w| n % w == 0).collect()
    }

    #[test]
    fn test_four_by_two() {
        let plan = PartitionPlan::new(4, 2).unwrap();
        assert_eq!(plan.ranges(), &[RowRange::new(0, 2), RowRange::new(2, 4)]);
        assert_eq!(plan.rows_per_worker(), 2);
    }

    #[test]
    fn test_single_worker_is_sequential() {
        let plan = PartitionPlan::new(7, 1).unwrap();
        assert_eq!(plan.ranges(), &[RowRange::new(0, 7)]);
    }

    #[test]
    fn test_one_row_per_worker() {
        let plan = PartitionPlan::new(5, 5).unwrap();
        for (p, r) in plan.iter() {
            assert_eq!(r, RowRange::new(p, p + 1));
        }
    }

    #[test]
    fn test_cover_exactly_once() {
        for dim in [1, 2, 6, 12, 30, 64] {
            for workers in divisors(dim) {
                let plan = PartitionPlan::new(dim, workers).unwrap();
                let mut seen = vec![0u32; dim];
                for r in plan.ranges() {
                    assert_eq!(r.len(), dim / workers);
                    for row in r.iter() {
                        seen[row] += 1;
                    }
                }
                assert!(seen.iter().all(|&c| c == 1), "dim={dim} workers={workers}");
            }
        }
    }

    #[test]
    fn test_ranges_are_contiguous_and_ordered() {
        let plan = PartitionPlan::new(24, 6).unwrap();
        assert_eq!(plan.ranges().first().unwrap().start, 0);
        assert_eq!(plan.ranges().last().unwrap().end, 24);
        for pair in plan.ranges().windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn test_not_divisible() {
        assert!(matches!(
            PartitionPlan::new(10, 3),
            Err(KernelError::Partition { dim: 10, workers: 3 })
        ));
    }

    #[test]
    fn test_zero_inputs() {
        assert!(matches!(PartitionPlan::new(0, 1), Err(KernelError::ZeroDimension)));
        assert!(matches!(PartitionPlan::new(4, 0), Err(KernelError::ZeroWorkers)));
    }

    #[test]
    fn test_oversized_dimension() {
        let dim = (1usize << 60) + 1;
        assert!(matches!(
            PartitionPlan::new(dim, 1),
            Err(KernelError::TooLarge { .. })
        ));
        assert!(matches!(
            row_range(1 << 32, 1, 0),
            Err(KernelError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(PartitionPlan::new(12, 4).unwrap(), PartitionPlan::new(12, 4).unwrap());
    }

    #[test]
    fn test_row_range_matches_plan() {
        let plan = PartitionPlan::new(18, 3).unwrap();
        for (p, r) in plan.iter() {
            assert_eq!(row_range(18, 3, p).unwrap(), r);
        }
        assert_eq!(plan.range(3), None);
        assert!(matches!(
            row_range(18, 3, 3),
            Err(KernelError::WorkerIndex { index: 3, workers: 3 })
        ));
    }

    #[test]
    fn test_row_range_helpers() {
        let r = RowRange::new(2, 5);
        assert_eq!(r.len(), 3);
        assert!(r.contains(2));
        assert!(!r.contains(5));
        assert_eq!(r.to_string(), "[2, 5)");
        assert!(RowRange::new(3, 3).is_empty());
    }
}
