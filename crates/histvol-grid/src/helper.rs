//! Per-domain metadata and its axis-wise merge

use histvol_core::{Error, Result};

/// Summary metadata for one domain or an aggregate of domains
///
/// Counts are totals; `voxels` and `hist_grid` are per-axis shapes of the
/// covered spatial region and its local histogram grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistHelper {
    /// Number of histograms
    pub n_hists: usize,
    /// Number of non-empty bins across all histograms
    pub n_nonempty_bins: usize,
    /// Voxel count per spatial axis
    pub voxels: [usize; 3],
    /// Histogram-grid shape per spatial axis
    pub hist_grid: [usize; 3],
}

impl HistHelper {
    /// Combine two helpers for domains adjacent along `axis`
    ///
    /// Histogram and non-empty-bin counts always add. Along `axis` the voxel
    /// and histogram-grid counts add; along the other two axes they must be
    /// equal, a structural invariant of uniform grid decomposition.
    pub fn merge(axis: usize, a: &HistHelper, b: &HistHelper) -> Result<HistHelper> {
        debug_assert!(axis < 3, "axis {axis} out of range");
        let mut voxels = [0; 3];
        let mut hist_grid = [0; 3];
        for d in 0..3 {
            if d == axis {
                voxels[d] = a.voxels[d] + b.voxels[d];
                hist_grid[d] = a.hist_grid[d] + b.hist_grid[d];
            } else {
                if a.voxels[d] != b.voxels[d] {
                    return Err(Error::inconsistent(format!(
                        "voxel count mismatch on axis {d} while merging along axis {axis}: {} vs {}",
                        a.voxels[d], b.voxels[d]
                    )));
                }
                if a.hist_grid[d] != b.hist_grid[d] {
                    return Err(Error::inconsistent(format!(
                        "histogram grid mismatch on axis {d} while merging along axis {axis}: {} vs {}",
                        a.hist_grid[d], b.hist_grid[d]
                    )));
                }
                voxels[d] = a.voxels[d];
                hist_grid[d] = a.hist_grid[d];
            }
        }
        Ok(HistHelper {
            n_hists: a.n_hists + b.n_hists,
            n_nonempty_bins: a.n_nonempty_bins + b.n_nonempty_bins,
            voxels,
            hist_grid,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn helper() -> HistHelper {
        HistHelper {
            n_hists: 64,
            n_nonempty_bins: 100,
            voxels: [16, 16, 16],
            hist_grid: [4, 4, 4],
        }
    }

    #[test]
    fn test_merge_along_axis() {
        let merged = HistHelper::merge(1, &helper(), &helper()).unwrap();
        assert_eq!(merged.n_hists, 128);
        assert_eq!(merged.n_nonempty_bins, 200);
        assert_eq!(merged.voxels, [16, 32, 16]);
        assert_eq!(merged.hist_grid, [4, 8, 4]);
    }

    #[test]
    fn test_merge_rejects_cross_axis_mismatch() {
        let mut other = helper();
        other.hist_grid[2] = 8;
        let err = HistHelper::merge(0, &helper(), &other).unwrap_err();
        assert!(matches!(err, Error::InconsistentData(_)));
    }

    #[test]
    fn test_merge_is_associative_along_one_axis() {
        let h = helper();
        let left = HistHelper::merge(0, &HistHelper::merge(0, &h, &h).unwrap(), &h).unwrap();
        let right = HistHelper::merge(0, &h, &HistHelper::merge(0, &h, &h).unwrap()).unwrap();
        assert_eq!(left, right);
    }
}
