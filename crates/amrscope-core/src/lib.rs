//! # amrscope Core
//!
//! Shared types and statistical building blocks for resistance structure
//! discovery over binary antimicrobial-resistance indicators.
//!
//! - [`types`]: the NA-aware observation matrix every component borrows
//! - [`contingency`]: 2×2 tables, Pearson chi-squared and Fisher's exact test
//! - [`independence`]: the conditional-independence test seam (CMH by default)
//! - [`multitest`]: p-value adjustment for many simultaneous tests
//! - [`special`]: gamma/beta special functions behind the distributions
//!
//! ## Quick Start
//!
//! ```rust
//! use amrscope_core::prelude::*;
//!
//! let m = ObservationMatrix::from_columns(
//!     vec!["S1".into(), "S2".into()],
//!     vec![("AMP".into(), vec![Some(true), None])],
//! ).unwrap();
//! assert_eq!(m.column("AMP").unwrap()[1], None);
//! ```

pub mod types;
pub mod error;
pub mod special;
pub mod contingency;
pub mod independence;
pub mod multitest;
pub mod prelude;
