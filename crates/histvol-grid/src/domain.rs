//! One process's histogram domain

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use histvol_core::{Error, Extent, Result};
use histvol_hist::{Histogram, NULL_HIST};

use crate::helper::HistHelper;

/// One rank's contribution: a local 3D grid of histograms plus its summary
///
/// Immutable after construction. Dense renditions of sparse histograms are
/// cached per bin id so repeated slice queries don't reconvert.
#[derive(Debug)]
pub struct HistDomain {
    extent: Extent,
    hists: Vec<Histogram>,
    helper: HistHelper,
    dense_cache: Mutex<HashMap<usize, Arc<Histogram>>>,
}

impl HistDomain {
    /// Create a domain from its local histogram grid and helper
    pub fn new(extent: Extent, hists: Vec<Histogram>, helper: HistHelper) -> Result<Self> {
        if extent.n_dims() != 3 {
            return Err(Error::InvalidParameter(format!(
                "domain extent must be 3D, got {}D",
                extent.n_dims()
            )));
        }
        if hists.len() != extent.n_elements() {
            return Err(Error::size_mismatch(
                extent.n_elements(),
                hists.len(),
                "domain histograms",
            ));
        }
        if helper.n_hists != hists.len() {
            return Err(Error::inconsistent(format!(
                "helper reports {} histograms, domain holds {}",
                helper.n_hists,
                hists.len()
            )));
        }
        Ok(Self {
            extent,
            hists,
            helper,
            dense_cache: Mutex::new(HashMap::new()),
        })
    }

    /// Build a domain, deriving the helper from the histograms themselves
    pub fn from_hists(extent: Extent, hists: Vec<Histogram>, voxels: [usize; 3]) -> Result<Self> {
        let hist_grid = [extent[0], extent[1], extent[2]];
        let helper = HistHelper {
            n_hists: hists.len(),
            n_nonempty_bins: hists.iter().map(|h| h.n_nonempty_bins()).sum(),
            voxels,
            hist_grid,
        };
        Self::new(extent, hists, helper)
    }

    /// Local histogram grid shape
    pub fn extent(&self) -> &Extent {
        &self.extent
    }

    pub fn helper(&self) -> &HistHelper {
        &self.helper
    }

    pub fn n_hists(&self) -> usize {
        self.hists.len()
    }

    /// Histogram at a local flat id; the `Null` sentinel when out of range
    pub fn hist(&self, flat: usize) -> &Histogram {
        self.hists.get(flat).unwrap_or(&NULL_HIST)
    }

    /// Histogram at local per-axis ids
    pub fn hist_at(&self, ids: &[usize]) -> &Histogram {
        self.hist(self.extent.ids_to_flat(ids))
    }

    /// Dense form of the histogram at `flat`, cached per id
    pub fn dense_hist(&self, flat: usize) -> Arc<Histogram> {
        let mut cache = self.dense_cache.lock().expect("dense cache poisoned");
        cache
            .entry(flat)
            .or_insert_with(|| Arc::new(self.hists.get(flat).unwrap_or(&NULL_HIST).to_dense()))
            .clone()
    }
}
