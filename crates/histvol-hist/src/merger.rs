//! Re-binning and combining histograms with different bin layouts
//!
//! Input histograms may differ in range and resolution; the merger picks a
//! common output binning per dimension, then redistributes every occupied
//! input bin's mass across the output bins it overlaps, proportionally to
//! the hyper-rectangular intersection volume. Overlap ratios partition each
//! input bin exactly, so the merge conserves total mass up to floating-point
//! error.

use histvol_core::{CrossProduct, Error, Extent, Result};

use crate::types::{HistAxis, Histogram};

/// Bin width comparison slack for edge coincidence tests
const EDGE_EPSILON: f64 = 1e-9;

/// Fallback bin count when the Freedman-Diaconis IQR degenerates to zero
const FREEDMAN_FALLBACK_BINS: usize = 10;

/// How the merger chooses the output bin count for one dimension
#[derive(Debug, Clone, PartialEq)]
pub enum BinCountRule {
    /// `ceil(log2(total_mass)) + 1`
    Sturges,
    /// `2 * IQR / mass^(1/3)` on the dimension's 1D marginal
    FreedmanDiaconis,
    /// Explicit bin count; zero falls back to [`BinCountRule::Sturges`]
    Fixed(usize),
}

impl BinCountRule {
    fn resolve(&self, inputs: &[&Histogram], dim: usize, lo: f64, hi: f64) -> usize {
        match self {
            Self::Fixed(n) if *n > 0 => *n,
            Self::Fixed(_) | Self::Sturges => sturges_bins(total_mass(inputs)),
            Self::FreedmanDiaconis => freedman_bins(inputs, dim, lo, hi),
        }
    }
}

/// Merges histograms of equal dimensionality onto a common binning
#[derive(Debug, Clone)]
pub struct HistMerger {
    rules: Vec<BinCountRule>,
}

impl HistMerger {
    /// Create a merger with one bin-count rule per dimension
    pub fn new(rules: Vec<BinCountRule>) -> Self {
        Self { rules }
    }

    /// Sturges bin counts on every dimension
    pub fn sturges(n_dims: usize) -> Self {
        Self::new(vec![BinCountRule::Sturges; n_dims])
    }

    /// Freedman-Diaconis bin counts on every dimension
    pub fn freedman(n_dims: usize) -> Self {
        Self::new(vec![BinCountRule::FreedmanDiaconis; n_dims])
    }

    /// Fixed per-dimension bin counts
    pub fn fixed(bins: Vec<usize>) -> Self {
        Self::new(bins.into_iter().map(BinCountRule::Fixed).collect())
    }

    /// Merge the input set into one histogram on the common binning
    ///
    /// The inputs must be non-empty (ignoring `Null` sentinels) and share
    /// dimension count and variable names. The output range per dimension is
    /// the union of the input ranges.
    pub fn merge(&self, inputs: &[&Histogram]) -> Result<Histogram> {
        let inputs: Vec<&Histogram> = inputs.iter().copied().filter(|h| !h.is_null()).collect();
        let first = *inputs.first().ok_or_else(|| Error::empty_input("merge"))?;
        let n_dims = first.n_dims();
        if self.rules.len() != n_dims {
            return Err(Error::size_mismatch(
                n_dims,
                self.rules.len(),
                "merger bin-count rules",
            ));
        }
        for h in &inputs[1..] {
            if h.n_dims() != n_dims {
                return Err(Error::inconsistent(format!(
                    "cannot merge a {}D histogram with a {n_dims}D one",
                    h.n_dims()
                )));
            }
            for (a, b) in h.axes().iter().zip(first.axes()) {
                if a.var != b.var {
                    return Err(Error::inconsistent(format!(
                        "variable mismatch: '{}' vs '{}'",
                        a.var, b.var
                    )));
                }
            }
        }

        let out_axes = self.output_axes(&inputs, n_dims);
        let out_extent = Extent::new(out_axes.iter().map(|a| a.n_bins).collect());
        let mut values = vec![0.0; out_extent.n_elements()];

        for h in &inputs {
            scatter(h, &out_axes, &out_extent, &mut values);
        }

        Histogram::from_dense_values(out_axes, values)
    }

    fn output_axes(&self, inputs: &[&Histogram], n_dims: usize) -> Vec<HistAxis> {
        (0..n_dims)
            .map(|dim| {
                let lo = inputs
                    .iter()
                    .map(|h| h.axes()[dim].min)
                    .fold(f64::INFINITY, f64::min);
                let hi = inputs
                    .iter()
                    .map(|h| h.axes()[dim].max)
                    .fold(f64::NEG_INFINITY, f64::max);
                let n_bins = self.rules[dim].resolve(inputs, dim, lo, hi).max(1);
                let mut axis = HistAxis::new(inputs[0].axes()[dim].var.clone(), n_bins, lo, hi);
                axis.log_base = inputs[0].axes()[dim].log_base;
                axis
            })
            .collect()
    }
}

/// Distribute every occupied bin of `h` into the output grid
fn scatter(h: &Histogram, out_axes: &[HistAxis], out_extent: &Extent, values: &mut [f64]) {
    let in_extent = match h.extent() {
        Some(e) => e.clone(),
        None => return,
    };

    let mut scatter_bin = |flat: usize, mass: f64| {
        let ids = in_extent.flat_to_ids(flat);
        let bounds: Vec<(f64, f64)> = ids
            .iter()
            .zip(h.axes())
            .map(|(&id, ax)| ax.bin_bounds(id))
            .collect();
        let out_ranges: Vec<(usize, usize)> = bounds
            .iter()
            .zip(out_axes)
            .map(|(&(lo, hi), ax)| overlapping_bins(lo, hi, ax))
            .collect();
        for out_ids in CrossProduct::new(out_ranges) {
            let mut ratio = 1.0;
            for ((&(lo, hi), ax), &oid) in bounds.iter().zip(out_axes).zip(&out_ids) {
                let (olo, ohi) = ax.bin_bounds(oid);
                let overlap = (hi.min(ohi) - lo.max(olo)).max(0.0);
                ratio *= overlap / (hi - lo);
            }
            if ratio > 0.0 {
                values[out_extent.ids_to_flat(&out_ids)] += mass * ratio;
            }
        }
    };

    match h {
        Histogram::Dense(d) => {
            for (flat, &v) in d.values().iter().enumerate() {
                if v != 0.0 {
                    scatter_bin(flat, v);
                }
            }
        }
        Histogram::Sparse(s) => {
            for &(flat, v) in s.bins() {
                if v != 0.0 {
                    scatter_bin(flat, v);
                }
            }
        }
        Histogram::Null => {}
    }
}

/// Inclusive output bin index range overlapping the real-valued `[lo, hi)`
///
/// An upper edge that coincides with the output range's upper boundary maps
/// into the last bin rather than one-past-the-end.
fn overlapping_bins(lo: f64, hi: f64, out: &HistAxis) -> (usize, usize) {
    let w = out.bin_width();
    let first = ((lo - out.min) / w).floor().max(0.0) as usize;
    let last = if (hi - out.max).abs() < EDGE_EPSILON * (out.max - out.min) {
        out.n_bins - 1
    } else {
        (((hi - out.min) / w).ceil() as usize).saturating_sub(1)
    };
    (first.min(out.n_bins - 1), last.min(out.n_bins - 1))
}

fn total_mass(inputs: &[&Histogram]) -> f64 {
    inputs.iter().map(|h| h.total_mass()).sum()
}

fn sturges_bins(mass: f64) -> usize {
    if mass <= 1.0 {
        return 1;
    }
    mass.log2().ceil() as usize + 1
}

/// Freedman-Diaconis on the 1D marginal of `dim`, keyed by bin center
fn freedman_bins(inputs: &[&Histogram], dim: usize, lo: f64, hi: f64) -> usize {
    let mut centers: Vec<(f64, f64)> = Vec::new();
    let mut mass = 0.0;
    for h in inputs {
        let marginal = match h.marginal(&[dim]) {
            Ok(m) => m,
            Err(_) => continue,
        };
        let axis = &marginal.axes()[0];
        for i in 0..axis.n_bins {
            let v = marginal.bin_freq(i);
            if v > 0.0 {
                centers.push((axis.bin_center(i), v));
                mass += v;
            }
        }
    }
    if centers.is_empty() {
        return FREEDMAN_FALLBACK_BINS;
    }
    centers.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    // Quartile bin centers by cumulative mass: q1 is the center whose bin
    // contains the 25% point, q3 the first center at or beyond the 75% point.
    let q1_target = mass / 4.0;
    let q3_target = 3.0 * mass / 4.0;
    let mut q1 = centers[0].0;
    let mut q3 = centers[centers.len() - 1].0;
    let mut q1_set = false;
    let mut q3_set = false;
    let mut cum = 0.0;
    for &(center, m) in &centers {
        if !q3_set && cum >= q3_target {
            q3 = center;
            q3_set = true;
        }
        cum += m;
        if !q1_set && cum >= q1_target {
            q1 = center;
            q1_set = true;
        }
    }

    let iqr = q3 - q1;
    if iqr < EDGE_EPSILON {
        return FREEDMAN_FALLBACK_BINS;
    }
    let bin_width = 2.0 * iqr / mass.cbrt();
    ((hi - lo) / bin_width).ceil().max(1.0) as usize
}
