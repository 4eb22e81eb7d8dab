//! Core types for histogram volume processing
//!
//! This crate provides the two foundations shared by every other histvol
//! crate: a unified [`Error`] type and the [`Extent`] index arithmetic that
//! underlies all grid addressing.
//!
//! # Example
//!
//! ```rust
//! use histvol_core::Extent;
//!
//! // A 3D histogram grid, first dimension fastest
//! let extent = Extent::from([8, 8, 8]);
//! let ids = extent.flat_to_ids(100);
//! assert_eq!(extent.ids_to_flat(&ids), 100);
//! ```

pub mod error;
pub mod extent;

pub use error::{Error, Result};
pub use extent::{CrossProduct, Extent};
