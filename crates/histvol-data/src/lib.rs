//! Data access for histogram-volume datasets
//!
//! A dataset is a directory of timestep subdirectories, each holding the
//! histogram families written by the simulation, described by a `pdf.config`
//! file. This crate covers the path from disk to queryable volumes:
//!
//! * [`format`]: the two on-disk layouts (Y-column packed and
//!   per-domain sparse files) with readers and fixture writers
//! * [`config`]: dataset configuration parsing
//! * [`loader`]: synchronous loading plus a background worker thread
//! * [`query`]: selection rules over histogram families
//! * [`step`] / [`pool`]: per-timestep cache entries and the
//!   sliding-window [`DataPool`] that keeps nearby steps resident
//!
//! ```no_run
//! use histvol_data::{DataPool, QueryRule};
//! use histvol_hist::Interval;
//!
//! # fn main() -> histvol_core::Result<()> {
//! let mut pool = DataPool::open("/data/jet")?;
//! pool.set_rules(vec![QueryRule::new(
//!     "temperature",
//!     vec![Interval::new(0.6, 1.0)?],
//!     0.25,
//! )])?;
//! let volume = pool.volume(42, "temperature")?;
//! let step = pool.step(42)?;
//! println!("{} of {} cells selected",
//!     step.selection_mask().iter().filter(|&&s| s).count(),
//!     volume.n_hists());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod format;
pub mod loader;
pub mod pool;
pub mod query;
pub mod step;

pub use config::{GridConfig, HistConfig, PoolConfig, TimeSpec};
pub use loader::{DataLoader, LoadEvent, LoaderWorker};
pub use pool::{DataPool, DEFAULT_CACHE_RADIUS};
pub use query::{QueryRule, RULE_TOLERANCE};
pub use step::DataStep;

pub use histvol_core::{Error, Result};
