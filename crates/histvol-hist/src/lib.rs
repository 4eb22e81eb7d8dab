//! Multidimensional histograms for simulation volume data
//!
//! This crate provides the histogram value types used throughout the
//! workspace: dense and sparse storage over 1 to 3 binned dimensions, range
//! sums and threshold queries, dimensionality-collapsing marginals, and a
//! merger that re-bins histograms with different ranges or resolutions onto
//! a common layout.
//!
//! # Examples
//!
//! ## Range queries
//!
//! ```rust
//! use histvol_hist::{HistAxis, Histogram, Interval};
//!
//! let hist = Histogram::from_dense_values(
//!     vec![HistAxis::new("temperature", 4, 300.0, 1900.0)],
//!     vec![1.0, 5.0, 3.0, 1.0],
//! ).unwrap();
//!
//! // Does the upper half of the range hold at least 30% of the mass?
//! let hot = vec![Interval::new(0.5, 1.0).unwrap()];
//! assert!(hist.check_range(&hot, 0.3));
//! ```
//!
//! ## Merging histograms with different binnings
//!
//! ```rust
//! use histvol_hist::{HistAxis, HistMerger, Histogram};
//!
//! let a = Histogram::from_dense_values(
//!     vec![HistAxis::new("x", 3, 0.0, 0.8)],
//!     vec![12.0, 24.0, 36.0],
//! ).unwrap();
//! let b = Histogram::from_dense_values(
//!     vec![HistAxis::new("x", 3, 0.2, 1.0)],
//!     vec![36.0, 24.0, 12.0],
//! ).unwrap();
//!
//! let merged = HistMerger::freedman(1).merge(&[&a, &b]).unwrap();
//! assert!((merged.total_mass() - 144.0).abs() < 1e-9);
//! ```

pub mod merger;
pub mod ops;
pub mod types;

pub use merger::{BinCountRule, HistMerger};
pub use ops::BinSum;
pub use types::{DenseHist, HistAxis, Histogram, Interval, SparseHist, NULL_HIST, SPARSE_EPSILON};

pub use histvol_core::{Error, Result};
