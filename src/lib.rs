//! Histogram volume data model and query engine
//!
//! Large spatially-decomposed simulations reduce their field data to grids
//! of local histograms, one grid per process domain per timestep. This
//! workspace models that output and makes it queryable:
//!
//! * [`core`]: flat/tuple index arithmetic over N-dimensional extents
//! * [`hist`]: 1-3D histograms with dense and sparse storage, range and
//!   threshold queries, marginalization, and mass-conserving re-binning
//! * [`grid`]: composition of per-domain histogram grids into a single
//!   addressable volume per timestep
//! * [`data`]: on-disk formats, background loading, and a sliding-window
//!   timestep cache driven by query rules
//!
//! The commonly used types are re-exported at the top level:
//!
//! ```no_run
//! use histvol::{DataPool, HistMerger, Interval, QueryRule};
//!
//! # fn main() -> histvol::Result<()> {
//! let mut pool = DataPool::open("/data/jet")?;
//! pool.set_rules(vec![QueryRule::new(
//!     "temperature",
//!     vec![Interval::new(0.6, 1.0)?],
//!     0.25,
//! )])?;
//!
//! // Merge the selected cells' histograms into one overview distribution
//! let volume = pool.volume(42, "temperature")?;
//! let step = pool.step(42)?;
//! let selected: Vec<_> = (0..volume.n_hists())
//!     .filter(|&i| step.is_selected(i))
//!     .map(|i| volume.hist(i))
//!     .collect();
//! let overview = HistMerger::freedman(1).merge(&selected)?;
//! println!("{overview}");
//! # Ok(())
//! # }
//! ```

pub use histvol_core as core;
pub use histvol_data as data;
pub use histvol_grid as grid;
pub use histvol_hist as hist;

pub use histvol_core::{CrossProduct, Error, Extent, Result};
pub use histvol_data::{DataLoader, DataPool, DataStep, PoolConfig, QueryRule};
pub use histvol_grid::{HistDomain, HistHelper, HistVolume};
pub use histvol_hist::{BinCountRule, HistAxis, HistMerger, Histogram, Interval};
