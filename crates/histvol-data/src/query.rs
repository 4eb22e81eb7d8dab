//! Query rules for voxel-region selection
//!
//! A rule names a histogram family and constrains it: a histogram matches
//! when at least `threshold_frac` of its mass falls inside the per-axis
//! intervals. Rules on the same family AND together, as do rules across
//! families; the conjunction is evaluated by
//! [`DataStep`](crate::step::DataStep).

use histvol_hist::Interval;
use serde::{Deserialize, Serialize};

/// Interval and threshold slack when comparing rules for equality
pub const RULE_TOLERANCE: f64 = 1e-4;

/// One selection constraint against a histogram family
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRule {
    /// Histogram family the rule applies to
    pub name: String,
    /// Normalized per-axis ranges, one per histogram dimension
    pub intervals: Vec<Interval>,
    /// Minimum fraction of mass inside the intervals, in `[0, 1]`
    pub threshold_frac: f64,
}

impl QueryRule {
    pub fn new(name: impl Into<String>, intervals: Vec<Interval>, threshold_frac: f64) -> Self {
        Self {
            name: name.into(),
            intervals,
            threshold_frac,
        }
    }
}

/// Tolerant comparison so UI slider jitter does not force recomputation
impl PartialEq for QueryRule {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.intervals.len() == other.intervals.len()
            && (self.threshold_frac - other.threshold_frac).abs() < RULE_TOLERANCE
            && self
                .intervals
                .iter()
                .zip(&other.intervals)
                .all(|(a, b)| a.approx_eq(b, RULE_TOLERANCE))
    }
}
