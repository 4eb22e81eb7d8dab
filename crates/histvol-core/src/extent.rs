//! N-dimensional shape descriptor and flat index arithmetic
//!
//! Every grid-addressed structure in the workspace (histogram bins, domain
//! grids, volume-level histogram grids) converts between flat linear indices
//! and per-dimension coordinate tuples through [`Extent`]. The convention is
//! fixed: the first dimension varies fastest, so
//! `flat = Σ id[i] · Π(size[j] for j < i)`.

use std::ops::Index;

/// Ordered per-dimension sizes of an N-dimensional grid
///
/// All sizes are at least 1 and the dimension count is fixed at
/// construction. Out-of-range ids are checked in debug builds only.
///
/// # Examples
///
/// ```
/// use histvol_core::Extent;
///
/// let extent = Extent::from([4, 3, 2]);
/// assert_eq!(extent.n_elements(), 24);
///
/// let flat = extent.ids_to_flat(&[1, 2, 0]);
/// assert_eq!(flat, 1 + 2 * 4);
/// assert_eq!(extent.flat_to_ids(flat), vec![1, 2, 0]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extent {
    dims: Vec<usize>,
}

impl Extent {
    /// Create an extent from per-dimension sizes
    ///
    /// # Panics
    /// If `dims` is empty or any size is zero.
    pub fn new(dims: Vec<usize>) -> Self {
        assert!(!dims.is_empty(), "Extent must have at least one dimension");
        for (i, &d) in dims.iter().enumerate() {
            assert!(d >= 1, "Extent dimension {i} must be at least 1, got {d}");
        }
        Self { dims }
    }

    /// Number of dimensions
    pub fn n_dims(&self) -> usize {
        self.dims.len()
    }

    /// Total number of elements (product of all sizes)
    pub fn n_elements(&self) -> usize {
        self.dims.iter().product()
    }

    /// Per-dimension sizes
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Convert a coordinate tuple to a flat index
    pub fn ids_to_flat(&self, ids: &[usize]) -> usize {
        debug_assert_eq!(ids.len(), self.dims.len(), "id arity mismatch");
        let mut flat = 0;
        let mut stride = 1;
        for (i, &id) in ids.iter().enumerate() {
            debug_assert!(
                id < self.dims[i],
                "id {id} out of range for dimension {i} (size {})",
                self.dims[i]
            );
            flat += id * stride;
            stride *= self.dims[i];
        }
        flat
    }

    /// Convert a flat index back to a coordinate tuple
    pub fn flat_to_ids(&self, flat: usize) -> Vec<usize> {
        debug_assert!(flat < self.n_elements(), "flat index {flat} out of range");
        let mut ids = Vec::with_capacity(self.dims.len());
        let mut rem = flat;
        for &d in &self.dims {
            ids.push(rem % d);
            rem /= d;
        }
        ids
    }

    /// Iterate over all coordinate tuples in flat order
    pub fn iter_ids(&self) -> CrossProduct {
        let ranges = self.dims.iter().map(|&d| (0, d - 1)).collect();
        CrossProduct::new(ranges)
    }
}

impl Index<usize> for Extent {
    type Output = usize;

    fn index(&self, dim: usize) -> &usize {
        &self.dims[dim]
    }
}

impl<const N: usize> From<[usize; N]> for Extent {
    fn from(dims: [usize; N]) -> Self {
        Self::new(dims.to_vec())
    }
}

impl From<&[usize]> for Extent {
    fn from(dims: &[usize]) -> Self {
        Self::new(dims.to_vec())
    }
}

/// Iterator over the cross product of inclusive per-dimension index ranges
///
/// Enumerates every coordinate tuple with `lo[i] <= id[i] <= hi[i]`, first
/// dimension varying fastest. This replaces hand-rolled odometer increment
/// logic wherever a hyper-rectangular bin sub-range has to be walked.
///
/// A range with `lo > hi` is empty, and so is the whole product.
#[derive(Debug, Clone)]
pub struct CrossProduct {
    ranges: Vec<(usize, usize)>,
    current: Vec<usize>,
    done: bool,
}

impl CrossProduct {
    /// Create an iterator over the given inclusive ranges
    pub fn new(ranges: Vec<(usize, usize)>) -> Self {
        let empty = ranges.is_empty() || ranges.iter().any(|&(lo, hi)| lo > hi);
        let current = ranges.iter().map(|&(lo, _)| lo).collect();
        Self {
            ranges,
            current,
            done: empty,
        }
    }

    /// Number of tuples this iterator will yield
    pub fn count_hint(&self) -> usize {
        if self.ranges.is_empty() || self.ranges.iter().any(|&(lo, hi)| lo > hi) {
            return 0;
        }
        self.ranges.iter().map(|&(lo, hi)| hi - lo + 1).product()
    }
}

impl Iterator for CrossProduct {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        if self.done {
            return None;
        }
        let out = self.current.clone();

        // Mixed-radix increment, first dimension fastest.
        let mut i = 0;
        loop {
            if i == self.ranges.len() {
                self.done = true;
                break;
            }
            if self.current[i] < self.ranges[i].1 {
                self.current[i] += 1;
                break;
            }
            self.current[i] = self.ranges[i].0;
            i += 1;
        }
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_round_trip() {
        let extent = Extent::from([4, 3, 2]);
        for flat in 0..extent.n_elements() {
            let ids = extent.flat_to_ids(flat);
            assert_eq!(extent.ids_to_flat(&ids), flat);
        }
    }

    #[test]
    fn test_first_dimension_fastest() {
        let extent = Extent::from([4, 3]);
        assert_eq!(extent.ids_to_flat(&[0, 0]), 0);
        assert_eq!(extent.ids_to_flat(&[1, 0]), 1);
        assert_eq!(extent.ids_to_flat(&[0, 1]), 4);
        assert_eq!(extent.ids_to_flat(&[3, 2]), 11);
    }

    #[test]
    fn test_one_dimensional() {
        let extent = Extent::from([7]);
        assert_eq!(extent.n_dims(), 1);
        assert_eq!(extent.n_elements(), 7);
        assert_eq!(extent.flat_to_ids(5), vec![5]);
        assert_eq!(extent[0], 7);
    }

    #[test]
    #[should_panic(expected = "at least 1")]
    fn test_zero_dimension_rejected() {
        Extent::new(vec![4, 0, 2]);
    }

    #[test]
    fn test_iter_ids_order() {
        let extent = Extent::from([2, 2]);
        let ids: Vec<_> = extent.iter_ids().collect();
        assert_eq!(
            ids,
            vec![vec![0, 0], vec![1, 0], vec![0, 1], vec![1, 1]]
        );
    }

    #[test]
    fn test_cross_product_matches_nested_loops() {
        let ranges = vec![(1, 2), (0, 1), (2, 2)];
        let mut expected = Vec::new();
        for k in 2..=2 {
            for j in 0..=1 {
                for i in 1..=2 {
                    expected.push(vec![i, j, k]);
                }
            }
        }
        let got: Vec<_> = CrossProduct::new(ranges.clone()).collect();
        assert_eq!(got, expected);
        assert_eq!(CrossProduct::new(ranges).count_hint(), 4);
    }

    #[test]
    fn test_cross_product_empty_range() {
        let mut it = CrossProduct::new(vec![(2, 1), (0, 3)]);
        assert_eq!(it.next(), None);
        assert_eq!(it.count_hint(), 0);
    }

    #[test]
    fn test_cross_product_single_point() {
        let got: Vec<_> = CrossProduct::new(vec![(1, 1), (1, 1), (1, 1)]).collect();
        assert_eq!(got, vec![vec![1, 1, 1]]);
    }
}
