//! Hierarchical grid composition for histogram volumes
//!
//! Scientific simulations write one histogram domain per process rank; this
//! crate composes those domains into a single addressable volume per
//! simulation step. The aggregate [`HistHelper`] is reduced bottom-up across
//! each spatial axis, and global histogram ids decompose into
//! (domain, local) pairs transparently.
//!
//! ```rust
//! use histvol_core::Extent;
//! use histvol_grid::{HistDomain, HistVolume};
//! use histvol_hist::{HistAxis, Histogram};
//!
//! let domains: Vec<HistDomain> = (0..8)
//!     .map(|_| {
//!         let hists = (0..8)
//!             .map(|_| {
//!                 Histogram::from_dense_values(
//!                     vec![HistAxis::new("x", 2, 0.0, 1.0)],
//!                     vec![1.0, 1.0],
//!                 )
//!                 .unwrap()
//!             })
//!             .collect();
//!         HistDomain::from_hists(Extent::from([2, 2, 2]), hists, [16, 16, 16]).unwrap()
//!     })
//!     .collect();
//!
//! let volume = HistVolume::new(Extent::from([2, 2, 2]), domains).unwrap();
//! assert_eq!(volume.n_hists(), 64);
//! assert_eq!(volume.helper().hist_grid, [4, 4, 4]);
//! ```

pub mod domain;
pub mod helper;
pub mod volume;

pub use domain::HistDomain;
pub use helper::HistHelper;
pub use volume::HistVolume;

pub use histvol_core::{Error, Result};
