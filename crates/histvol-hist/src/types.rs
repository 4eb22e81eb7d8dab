//! Core types for multidimensional histogram representation

use std::fmt;

use histvol_core::{Error, Extent, Result};
use serde::{Deserialize, Serialize};

/// Values below this are dropped when converting dense storage to sparse
pub const SPARSE_EPSILON: f64 = 1e-4;

/// One binned axis of a histogram
///
/// The numeric range is `[min, max)` split into `n_bins` equal-width bins;
/// the last bin includes the upper boundary. `log_base` records that the
/// axis values were log-scaled before binning; it does not change bin
/// arithmetic here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistAxis {
    /// Physical variable binned along this axis
    pub var: String,
    /// Number of bins
    pub n_bins: usize,
    /// Lower edge of the axis range (inclusive)
    pub min: f64,
    /// Upper edge of the axis range (exclusive, except for the last bin)
    pub max: f64,
    /// Log-scale base applied to values before binning, if any
    pub log_base: Option<f64>,
}

impl HistAxis {
    /// Create a linear axis
    pub fn new(var: impl Into<String>, n_bins: usize, min: f64, max: f64) -> Self {
        Self {
            var: var.into(),
            n_bins,
            min,
            max,
            log_base: None,
        }
    }

    /// Create an axis with a log-scale base recorded
    pub fn with_log_base(mut self, base: f64) -> Self {
        self.log_base = Some(base);
        self
    }

    /// Width of one bin
    pub fn bin_width(&self) -> f64 {
        (self.max - self.min) / self.n_bins as f64
    }

    /// Real-valued bounds of bin `i`
    pub fn bin_bounds(&self, i: usize) -> (f64, f64) {
        let w = self.bin_width();
        (self.min + i as f64 * w, self.min + (i + 1) as f64 * w)
    }

    /// Center of bin `i`
    pub fn bin_center(&self, i: usize) -> f64 {
        let (lo, hi) = self.bin_bounds(i);
        (lo + hi) / 2.0
    }

    /// Convert a normalized `[0, 1]` interval to an inclusive bin index range
    ///
    /// The lower bound rounds up (`ceil(lo · n_bins)`), the upper bound
    /// rounds down (`floor(hi · n_bins)`); both are clamped to valid bins so
    /// an interval reaching 1.0 selects the last bin rather than
    /// one-past-the-end.
    pub fn interval_to_bins(&self, interval: &Interval) -> (usize, usize) {
        let n = self.n_bins as f64;
        let first = (interval.lower * n).ceil() as usize;
        let last = (interval.upper * n).floor() as usize;
        (first.min(self.n_bins - 1), last.min(self.n_bins - 1))
    }
}

impl fmt::Display for HistAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} bins over [{:.3}, {:.3})",
            self.var, self.n_bins, self.min, self.max
        )
    }
}

/// A normalized `[0, 1]` fractional range along one histogram axis
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Interval {
    pub lower: f64,
    pub upper: f64,
}

impl Interval {
    /// Create an interval, validating `0 <= lower <= upper <= 1`
    pub fn new(lower: f64, upper: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&lower) || !(0.0..=1.0).contains(&upper) || lower > upper {
            return Err(Error::invalid_interval(lower, upper));
        }
        Ok(Self { lower, upper })
    }

    /// The full `[0, 1]` interval
    pub fn full() -> Self {
        Self {
            lower: 0.0,
            upper: 1.0,
        }
    }

    /// Compare with tolerance on both bounds
    pub fn approx_eq(&self, other: &Self, tolerance: f64) -> bool {
        (self.lower - other.lower).abs() < tolerance
            && (self.upper - other.upper).abs() < tolerance
    }
}

/// Dense histogram storage: one value per bin, indexed by flat id
#[derive(Debug, Clone, PartialEq)]
pub struct DenseHist {
    axes: Vec<HistAxis>,
    extent: Extent,
    values: Vec<f64>,
    total: f64,
}

impl DenseHist {
    /// Create a dense histogram from per-bin values in flat order
    pub fn new(axes: Vec<HistAxis>, values: Vec<f64>) -> Result<Self> {
        let extent = axes_extent(&axes)?;
        if values.len() != extent.n_elements() {
            return Err(Error::size_mismatch(
                extent.n_elements(),
                values.len(),
                "dense histogram values",
            ));
        }
        let total = values.iter().sum();
        Ok(Self {
            axes,
            extent,
            values,
            total,
        })
    }

    pub fn axes(&self) -> &[HistAxis] {
        &self.axes
    }

    pub fn extent(&self) -> &Extent {
        &self.extent
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Value of bin `flat`
    pub fn get(&self, flat: usize) -> f64 {
        self.values[flat]
    }

    pub fn total(&self) -> f64 {
        self.total
    }
}

/// Sparse histogram storage: a sorted map from bin id to value
///
/// Unlisted bins are zero. Preferred for 3D volumetric histograms where the
/// bin count is large but few bins are occupied.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseHist {
    axes: Vec<HistAxis>,
    extent: Extent,
    // (bin id, value), sorted by id
    bins: Vec<(usize, f64)>,
    total: f64,
}

impl SparseHist {
    /// Create a sparse histogram from parallel id/value arrays
    pub fn new(axes: Vec<HistAxis>, ids: Vec<usize>, values: Vec<f64>) -> Result<Self> {
        let extent = axes_extent(&axes)?;
        if ids.len() != values.len() {
            return Err(Error::size_mismatch(
                ids.len(),
                values.len(),
                "sparse histogram values",
            ));
        }
        for &id in &ids {
            if id >= extent.n_elements() {
                return Err(Error::InvalidInput(format!(
                    "sparse bin id {id} out of range for {} bins",
                    extent.n_elements()
                )));
            }
        }
        let mut bins: Vec<(usize, f64)> = ids.into_iter().zip(values).collect();
        bins.sort_unstable_by_key(|&(id, _)| id);
        let total = bins.iter().map(|&(_, v)| v).sum();
        Ok(Self {
            axes,
            extent,
            bins,
            total,
        })
    }

    pub fn axes(&self) -> &[HistAxis] {
        &self.axes
    }

    pub fn extent(&self) -> &Extent {
        &self.extent
    }

    /// Occupied bins as (flat id, value) pairs, sorted by id
    pub fn bins(&self) -> &[(usize, f64)] {
        &self.bins
    }

    /// Value of bin `flat` (zero if not listed)
    pub fn get(&self, flat: usize) -> f64 {
        match self.bins.binary_search_by_key(&flat, |&(id, _)| id) {
            Ok(pos) => self.bins[pos].1,
            Err(_) => 0.0,
        }
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    /// Number of occupied bins
    pub fn nnz(&self) -> usize {
        self.bins.len()
    }
}

fn axes_extent(axes: &[HistAxis]) -> Result<Extent> {
    if axes.is_empty() || axes.len() > 3 {
        return Err(Error::InvalidParameter(format!(
            "histogram must have 1 to 3 dimensions, got {}",
            axes.len()
        )));
    }
    for ax in axes {
        if ax.n_bins == 0 {
            return Err(Error::InvalidParameter(format!(
                "axis '{}' has zero bins",
                ax.var
            )));
        }
        if !(ax.min < ax.max) {
            return Err(Error::InvalidParameter(format!(
                "axis '{}' has empty range [{}, {})",
                ax.var, ax.min, ax.max
            )));
        }
    }
    Ok(Extent::new(axes.iter().map(|a| a.n_bins).collect()))
}

/// A histogram over 1 to 3 numeric dimensions
///
/// `Null` stands in wherever a requested name or id is absent: it has
/// dimension 0 and its bin queries return the sentinel `-1.0`.
#[derive(Debug, Clone, PartialEq)]
pub enum Histogram {
    Null,
    Dense(DenseHist),
    Sparse(SparseHist),
}

/// Shared sentinel for "no histogram" lookups
pub static NULL_HIST: Histogram = Histogram::Null;

impl Histogram {
    /// Build a histogram from explicit per-bin dense values
    pub fn from_dense_values(axes: Vec<HistAxis>, values: Vec<f64>) -> Result<Self> {
        Ok(Self::Dense(DenseHist::new(axes, values)?))
    }

    /// Build a sparse histogram from parallel id/value arrays
    pub fn from_sparse_values(
        axes: Vec<HistAxis>,
        ids: Vec<usize>,
        values: Vec<f64>,
    ) -> Result<Self> {
        Ok(Self::Sparse(SparseHist::new(axes, ids, values)?))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Dimension count; 0 for `Null`
    pub fn n_dims(&self) -> usize {
        match self {
            Self::Null => 0,
            Self::Dense(h) => h.axes.len(),
            Self::Sparse(h) => h.axes.len(),
        }
    }

    /// Per-dimension axes; empty for `Null`
    pub fn axes(&self) -> &[HistAxis] {
        match self {
            Self::Null => &[],
            Self::Dense(h) => h.axes(),
            Self::Sparse(h) => h.axes(),
        }
    }

    /// Bin-grid extent, if this is not `Null`
    pub fn extent(&self) -> Option<&Extent> {
        match self {
            Self::Null => None,
            Self::Dense(h) => Some(h.extent()),
            Self::Sparse(h) => Some(h.extent()),
        }
    }

    /// Raw bin value; `-1.0` for `Null`
    pub fn bin_freq(&self, flat: usize) -> f64 {
        match self {
            Self::Null => -1.0,
            Self::Dense(h) => h.get(flat),
            Self::Sparse(h) => h.get(flat),
        }
    }

    /// Raw bin value addressed by coordinate tuple
    pub fn bin_freq_at(&self, ids: &[usize]) -> f64 {
        match self.extent() {
            None => -1.0,
            Some(e) => self.bin_freq(e.ids_to_flat(ids)),
        }
    }

    /// Bin value as a fraction of total mass
    ///
    /// Zero total mass yields 0.0; `Null` yields the sentinel `-1.0`.
    pub fn bin_percent(&self, flat: usize) -> f64 {
        match self {
            Self::Null => -1.0,
            _ => {
                let total = self.total_mass();
                if total > 0.0 {
                    self.bin_freq(flat) / total
                } else {
                    0.0
                }
            }
        }
    }

    /// Sum of all bin values; 0.0 for `Null`
    pub fn total_mass(&self) -> f64 {
        match self {
            Self::Null => 0.0,
            Self::Dense(h) => h.total(),
            Self::Sparse(h) => h.total(),
        }
    }

    /// Number of bins with a value greater than zero
    pub fn n_nonempty_bins(&self) -> usize {
        match self {
            Self::Null => 0,
            Self::Dense(h) => h.values().iter().filter(|&&v| v > 0.0).count(),
            Self::Sparse(h) => h.bins().iter().filter(|&&(_, v)| v > 0.0).count(),
        }
    }

    /// Return a sparse copy, dropping values below [`SPARSE_EPSILON`]
    ///
    /// Sparse histograms and `Null` return a clone of themselves.
    pub fn to_sparse(&self) -> Histogram {
        match self {
            Self::Null => Self::Null,
            Self::Sparse(_) => self.clone(),
            Self::Dense(h) => {
                let mut ids = Vec::new();
                let mut values = Vec::new();
                for (id, &v) in h.values().iter().enumerate() {
                    if v.abs() >= SPARSE_EPSILON {
                        ids.push(id);
                        values.push(v);
                    }
                }
                // Construction cannot fail: axes and ids come from a valid dense histogram
                Self::Sparse(
                    SparseHist::new(h.axes().to_vec(), ids, values)
                        .expect("dense histogram produced invalid sparse form"),
                )
            }
        }
    }

    /// Return a dense copy with identical bin values
    pub fn to_dense(&self) -> Histogram {
        match self {
            Self::Null => Self::Null,
            Self::Dense(_) => self.clone(),
            Self::Sparse(h) => {
                let mut values = vec![0.0; h.extent().n_elements()];
                for &(id, v) in h.bins() {
                    values[id] = v;
                }
                Self::Dense(
                    DenseHist::new(h.axes().to_vec(), values)
                        .expect("sparse histogram produced invalid dense form"),
                )
            }
        }
    }
}

impl fmt::Display for Histogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "Histogram(null)"),
            Self::Dense(h) => write!(
                f,
                "Histogram(dense, {}D, {} bins, mass={:.3})",
                h.axes().len(),
                h.extent().n_elements(),
                h.total()
            ),
            Self::Sparse(h) => write!(
                f,
                "Histogram(sparse, {}D, {}/{} bins, mass={:.3})",
                h.axes().len(),
                h.nnz(),
                h.extent().n_elements(),
                h.total()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn axis(n: usize) -> HistAxis {
        HistAxis::new("x", n, 0.0, 1.0)
    }

    #[test]
    fn test_dense_construction() {
        let h = DenseHist::new(vec![axis(2), axis(2)], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(h.get(0), 1.0);
        assert_eq!(h.get(3), 4.0);
        assert_relative_eq!(h.total(), 10.0);

        assert!(DenseHist::new(vec![axis(2), axis(2)], vec![1.0]).is_err());
    }

    #[test]
    fn test_sparse_get_and_sorting() {
        let h = SparseHist::new(vec![axis(4)], vec![3, 1], vec![0.5, 0.25]).unwrap();
        assert_eq!(h.bins(), &[(1, 0.25), (3, 0.5)]);
        assert_eq!(h.get(1), 0.25);
        assert_eq!(h.get(2), 0.0);
        assert_relative_eq!(h.total(), 0.75);
    }

    #[test]
    fn test_sparse_rejects_out_of_range_ids() {
        assert!(SparseHist::new(vec![axis(4)], vec![4], vec![1.0]).is_err());
    }

    #[test]
    fn test_null_sentinels() {
        assert_eq!(NULL_HIST.n_dims(), 0);
        assert_eq!(NULL_HIST.bin_freq(0), -1.0);
        assert_eq!(NULL_HIST.bin_percent(0), -1.0);
        assert!(NULL_HIST.to_sparse().is_null());
        assert!(NULL_HIST.to_dense().is_null());
    }

    #[test]
    fn test_mass_conserved_across_conversion() {
        let values = vec![0.0, 1.0, 0.0, 2.0, 0.0, 0.0, 0.0, 3.0];
        let h = Histogram::from_dense_values(vec![axis(2), axis(2), axis(2)], values).unwrap();
        let sparse = h.to_sparse();
        let dense = sparse.to_dense();
        assert_relative_eq!(sparse.total_mass(), h.total_mass(), epsilon = 1e-4);
        assert_relative_eq!(dense.total_mass(), h.total_mass(), epsilon = 1e-4);
        assert_eq!(sparse.n_nonempty_bins(), 3);
        for flat in 0..8 {
            assert_relative_eq!(dense.bin_freq(flat), h.bin_freq(flat));
        }
    }

    #[test]
    fn test_to_sparse_drops_tiny_values() {
        let h = Histogram::from_dense_values(vec![axis(4)], vec![1.0, 5e-5, 0.0, 2.0]).unwrap();
        let sparse = h.to_sparse();
        assert_eq!(sparse.bin_freq(1), 0.0);
        assert_eq!(sparse.bin_freq(3), 2.0);
    }

    #[test]
    fn test_interval_to_bins() {
        let ax = axis(10);
        let full = ax.interval_to_bins(&Interval::full());
        assert_eq!(full, (0, 9));

        let mid = ax.interval_to_bins(&Interval::new(0.25, 0.75).unwrap());
        assert_eq!(mid, (3, 7));
    }

    #[test]
    fn test_interval_validation() {
        assert!(Interval::new(0.5, 0.2).is_err());
        assert!(Interval::new(-0.1, 0.5).is_err());
        assert!(Interval::new(0.0, 1.0).is_ok());
    }

    #[test]
    fn test_bin_percent_zero_mass() {
        let h = Histogram::from_dense_values(vec![axis(2)], vec![0.0, 0.0]).unwrap();
        assert_eq!(h.bin_percent(0), 0.0);
    }
}
