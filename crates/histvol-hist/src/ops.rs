//! Range sums, threshold queries, and marginalization

use histvol_core::{CrossProduct, Error, Extent, Result};

use crate::types::{HistAxis, Histogram, Interval};

/// Result of summing a hyper-rectangular bin sub-range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinSum {
    /// Sum of raw bin values over the range
    pub value: f64,
    /// Total mass of the histogram the range was taken from
    pub total: f64,
}

impl BinSum {
    /// Fraction of total mass inside the range (0.0 when the total is zero)
    pub fn percent(&self) -> f64 {
        if self.total > 0.0 {
            self.value / self.total
        } else {
            0.0
        }
    }
}

impl Histogram {
    /// Sum over the full bin range: total mass, 100%
    pub fn bin_sum(&self) -> BinSum {
        let total = self.total_mass();
        BinSum {
            value: total,
            total,
        }
    }

    /// Sum of raw bin values over an inclusive per-dimension index range
    ///
    /// Enumerates the cross product of the ranges directly, which is
    /// equivalent to a naive nested loop over every dimension.
    pub fn bin_sum_ranges(&self, ranges: &[(usize, usize)]) -> BinSum {
        let extent = match self.extent() {
            Some(e) => e.clone(),
            None => {
                return BinSum {
                    value: -1.0,
                    total: -1.0,
                }
            }
        };
        debug_assert_eq!(ranges.len(), extent.n_dims(), "range arity mismatch");

        let clamped: Vec<(usize, usize)> = ranges
            .iter()
            .enumerate()
            .map(|(d, &(lo, hi))| (lo, hi.min(extent[d] - 1)))
            .collect();

        let value = sum_over(self, &extent, &clamped);
        BinSum {
            value,
            total: self.total_mass(),
        }
    }

    /// Whether the mass inside the bin range reaches a percentage threshold
    ///
    /// `threshold_percent` is on the 0-100 scale. The comparison is `>=`
    /// uniformly, so a range holding exactly the threshold fraction passes.
    pub fn check_range_bins(&self, ranges: &[(usize, usize)], threshold_percent: f64) -> bool {
        if self.is_null() {
            return false;
        }
        self.bin_sum_ranges(ranges).percent() * 100.0 >= threshold_percent
    }

    /// Whether the mass inside normalized per-dimension intervals reaches a
    /// fractional threshold
    ///
    /// `threshold_frac` is on the 0-1 scale; it is rescaled to a percentage
    /// before delegating to [`Histogram::check_range_bins`]. Each interval is
    /// converted to an inclusive bin range via `ceil(lower * n_bins)` /
    /// `floor(upper * n_bins)`.
    pub fn check_range(&self, intervals: &[Interval], threshold_frac: f64) -> bool {
        if self.is_null() || intervals.len() != self.n_dims() {
            return false;
        }
        let ranges: Vec<(usize, usize)> = intervals
            .iter()
            .zip(self.axes())
            .map(|(iv, ax)| ax.interval_to_bins(iv))
            .collect();
        self.check_range_bins(&ranges, threshold_frac * 100.0)
    }

    /// Collapse to the given axes, summing over all dropped ones
    ///
    /// `keep` lists the axis indices to retain, in output order. Keeping
    /// every axis in its original order returns a plain clone. The result is
    /// always dense; marginals are small.
    pub fn marginal(&self, keep: &[usize]) -> Result<Histogram> {
        if self.is_null() {
            return Ok(Histogram::Null);
        }
        let n_dims = self.n_dims();
        if keep.is_empty() || keep.len() > n_dims {
            return Err(Error::InvalidParameter(format!(
                "cannot collapse a {n_dims}D histogram to {} dimensions",
                keep.len()
            )));
        }
        for (i, &d) in keep.iter().enumerate() {
            if d >= n_dims {
                return Err(Error::InvalidParameter(format!(
                    "axis {d} out of range for a {n_dims}D histogram"
                )));
            }
            if keep[..i].contains(&d) {
                return Err(Error::InvalidParameter(format!("axis {d} listed twice")));
            }
        }
        if keep.len() == n_dims && keep.iter().enumerate().all(|(i, &d)| i == d) {
            return Ok(self.clone());
        }

        let in_extent = self.extent().expect("non-null histogram has an extent");
        let out_axes: Vec<HistAxis> = keep.iter().map(|&d| self.axes()[d].clone()).collect();
        let out_extent = Extent::new(out_axes.iter().map(|a| a.n_bins).collect());
        let mut values = vec![0.0; out_extent.n_elements()];

        let mut add = |flat: usize, v: f64| {
            let ids = in_extent.flat_to_ids(flat);
            let out_ids: Vec<usize> = keep.iter().map(|&d| ids[d]).collect();
            values[out_extent.ids_to_flat(&out_ids)] += v;
        };

        match self {
            Histogram::Dense(h) => {
                for (flat, &v) in h.values().iter().enumerate() {
                    if v != 0.0 {
                        add(flat, v);
                    }
                }
            }
            Histogram::Sparse(h) => {
                for &(flat, v) in h.bins() {
                    add(flat, v);
                }
            }
            Histogram::Null => unreachable!(),
        }

        Histogram::from_dense_values(out_axes, values)
    }
}

fn sum_over(hist: &Histogram, extent: &Extent, ranges: &[(usize, usize)]) -> f64 {
    CrossProduct::new(ranges.to_vec())
        .map(|ids| hist.bin_freq(extent.ids_to_flat(&ids)))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HistAxis;
    use approx::assert_relative_eq;

    fn axis(var: &str, n: usize) -> HistAxis {
        HistAxis::new(var, n, 0.0, 1.0)
    }

    /// 2x2x2 dense histogram with values [0,1,0,2,0,0,0,3]
    fn cube() -> Histogram {
        Histogram::from_dense_values(
            vec![axis("x", 2), axis("y", 2), axis("z", 2)],
            vec![0.0, 1.0, 0.0, 2.0, 0.0, 0.0, 0.0, 3.0],
        )
        .unwrap()
    }

    #[test]
    fn test_bin_sum_sub_ranges() {
        let h = cube();
        assert_relative_eq!(h.bin_sum_ranges(&[(1, 1), (1, 1), (1, 1)]).value, 3.0);
        assert_relative_eq!(h.bin_sum_ranges(&[(1, 1), (1, 1), (0, 1)]).value, 5.0);
        assert_relative_eq!(h.bin_sum_ranges(&[(0, 1), (0, 1), (0, 1)]).value, 6.0);
        assert_relative_eq!(h.bin_sum().value, 6.0);
        assert_relative_eq!(h.bin_sum().percent(), 1.0);
    }

    #[test]
    fn test_check_range_threshold_boundary() {
        let h = cube();
        // bin (1,1,1) holds 3 of 6 total: exactly 50%
        assert!(h.check_range_bins(&[(1, 1), (1, 1), (1, 1)], 49.0));
        assert!(h.check_range_bins(&[(1, 1), (1, 1), (1, 1)], 50.0));
        assert!(!h.check_range_bins(&[(1, 1), (1, 1), (1, 1)], 51.0));
    }

    #[test]
    fn test_check_range_intervals() {
        let h = cube();
        let upper_corner = vec![
            Interval::new(0.5, 1.0).unwrap(),
            Interval::new(0.5, 1.0).unwrap(),
            Interval::new(0.5, 1.0).unwrap(),
        ];
        // Same bins as the (1,1,1) range; threshold given as a fraction
        assert!(h.check_range(&upper_corner, 0.49));
        assert!(!h.check_range(&upper_corner, 0.51));

        let full = vec![Interval::full(); 3];
        assert!(h.check_range(&full, 1.0));
    }

    #[test]
    fn test_check_range_matches_sparse_form() {
        let h = cube();
        let sparse = h.to_sparse();
        for t in [0.0, 25.0, 50.0, 75.0, 100.0] {
            assert_eq!(
                h.check_range_bins(&[(1, 1), (0, 1), (0, 1)], t),
                sparse.check_range_bins(&[(1, 1), (0, 1), (0, 1)], t),
            );
        }
    }

    #[test]
    fn test_bin_sum_equals_nested_loops() {
        let h = cube();
        let extent = h.extent().unwrap().clone();
        let ranges = [(0, 1), (1, 1), (0, 1)];
        let mut expected = 0.0;
        for z in 0..=1 {
            for y in 1..=1 {
                for x in 0..=1 {
                    expected += h.bin_freq(extent.ids_to_flat(&[x, y, z]));
                }
            }
        }
        assert_relative_eq!(h.bin_sum_ranges(&ranges).value, expected);
    }

    #[test]
    fn test_marginal_1d() {
        let h = cube();
        let mx = h.marginal(&[0]).unwrap();
        assert_eq!(mx.n_dims(), 1);
        // x=0 plane: 0+0+0+0, x=1 plane: 1+2+0+3
        assert_relative_eq!(mx.bin_freq(0), 0.0);
        assert_relative_eq!(mx.bin_freq(1), 6.0);
        assert_relative_eq!(mx.total_mass(), h.total_mass());
    }

    #[test]
    fn test_marginal_2d_and_axis_order() {
        let h = cube();
        let myz = h.marginal(&[1, 2]).unwrap();
        assert_eq!(myz.n_dims(), 2);
        assert_eq!(myz.axes()[0].var, "y");
        assert_eq!(myz.axes()[1].var, "z");
        // (y,z) sums over x: [(0,0)=1, (1,0)=2, (0,1)=0, (1,1)=3]
        assert_relative_eq!(myz.bin_freq(0), 1.0);
        assert_relative_eq!(myz.bin_freq(1), 2.0);
        assert_relative_eq!(myz.bin_freq(2), 0.0);
        assert_relative_eq!(myz.bin_freq(3), 3.0);
    }

    #[test]
    fn test_marginal_identity() {
        let h = cube();
        assert_eq!(h.marginal(&[0, 1, 2]).unwrap(), h);
    }

    #[test]
    fn test_marginal_rejects_bad_axes() {
        let h = cube();
        assert!(h.marginal(&[]).is_err());
        assert!(h.marginal(&[3]).is_err());
        assert!(h.marginal(&[0, 0]).is_err());
    }

    #[test]
    fn test_marginal_of_sparse_matches_dense() {
        let h = cube();
        let sparse = h.to_sparse();
        assert_eq!(h.marginal(&[2]).unwrap(), sparse.marginal(&[2]).unwrap());
    }

    #[test]
    fn test_null_queries() {
        assert_eq!(Histogram::Null.bin_sum_ranges(&[]).value, -1.0);
        assert!(!Histogram::Null.check_range(&[Interval::full()], 0.0));
        assert!(Histogram::Null.marginal(&[0]).unwrap().is_null());
    }
}
