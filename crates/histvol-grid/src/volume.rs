//! Full simulation-step histogram volume

use histvol_core::{Error, Extent, Result};
use histvol_hist::Histogram;

use crate::domain::HistDomain;
use crate::helper::HistHelper;

/// All domains of one simulation step assembled into one addressable grid
///
/// The aggregate helper is computed once at construction by a fold-left
/// reduction over axes; domains are immutable afterwards, so it never needs
/// invalidation.
#[derive(Debug)]
pub struct HistVolume {
    domain_extent: Extent,
    domains: Vec<HistDomain>,
    helper: HistHelper,
    // Global histogram grid, derived from the aggregate helper
    hist_extent: Extent,
}

impl HistVolume {
    /// Assemble a volume from domains laid out on `domain_extent`
    ///
    /// Fails with `InconsistentData` when the domains do not tile uniformly.
    pub fn new(domain_extent: Extent, domains: Vec<HistDomain>) -> Result<Self> {
        if domain_extent.n_dims() != 3 {
            return Err(Error::InvalidParameter(format!(
                "domain extent must be 3D, got {}D",
                domain_extent.n_dims()
            )));
        }
        if domains.len() != domain_extent.n_elements() {
            return Err(Error::size_mismatch(
                domain_extent.n_elements(),
                domains.len(),
                "volume domains",
            ));
        }
        let helper = reduce_helpers(&domain_extent, &domains)?;
        let hist_extent = Extent::new(helper.hist_grid.to_vec());
        Ok(Self {
            domain_extent,
            domains,
            helper,
            hist_extent,
        })
    }

    /// Shape of the domain decomposition
    pub fn domain_extent(&self) -> &Extent {
        &self.domain_extent
    }

    /// Aggregate helper over all domains
    pub fn helper(&self) -> &HistHelper {
        &self.helper
    }

    /// Global histogram grid shape
    pub fn hist_extent(&self) -> &Extent {
        &self.hist_extent
    }

    /// Total number of histograms across all domains
    pub fn n_hists(&self) -> usize {
        self.helper.n_hists
    }

    /// Domain at a flat domain id
    pub fn domain(&self, flat: usize) -> &HistDomain {
        &self.domains[flat]
    }

    /// Domain at per-axis domain ids
    pub fn domain_at(&self, ids: &[usize]) -> &HistDomain {
        &self.domains[self.domain_extent.ids_to_flat(ids)]
    }

    pub fn domains(&self) -> &[HistDomain] {
        &self.domains
    }

    /// Histogram at a flat id in the global histogram grid
    ///
    /// Decomposes the global id into per-axis histogram ids, splits each
    /// into (domain id, local id) using the per-domain histogram counts,
    /// and delegates to the owning domain.
    pub fn hist(&self, flat_global: usize) -> &Histogram {
        let global_ids = self.hist_extent.flat_to_ids(flat_global);
        let mut domain_ids = [0usize; 3];
        let mut local_ids = [0usize; 3];
        for d in 0..3 {
            let per_domain = self.helper.hist_grid[d] / self.domain_extent[d];
            domain_ids[d] = global_ids[d] / per_domain;
            local_ids[d] = global_ids[d] % per_domain;
        }
        self.domain_at(&domain_ids).hist_at(&local_ids)
    }
}

/// Fold the per-domain helpers down to one aggregate
///
/// Pass `k` collapses the first axis of the current shape: consecutive
/// groups of `dims[k]` helpers merge along axis `k`, shortening the shape by
/// one dimension. After three passes a single helper remains. The axis order
/// is exactly 0, 1, 2; the cross-axis equality checks inside
/// [`HistHelper::merge`] rely on it for non-cubic decompositions.
fn reduce_helpers(domain_extent: &Extent, domains: &[HistDomain]) -> Result<HistHelper> {
    let mut current: Vec<HistHelper> = domains.iter().map(|d| d.helper().clone()).collect();
    for axis in 0..domain_extent.n_dims() {
        let group = domain_extent[axis];
        let mut next = Vec::with_capacity(current.len() / group);
        for chunk in current.chunks(group) {
            let mut acc = chunk[0].clone();
            for h in &chunk[1..] {
                acc = HistHelper::merge(axis, &acc, h)?;
            }
            next.push(acc);
        }
        current = next;
    }
    debug_assert_eq!(current.len(), 1);
    Ok(current.remove(0))
}
