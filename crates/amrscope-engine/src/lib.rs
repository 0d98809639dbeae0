//! # amrscope Engine
//!
//! Structure discovery over class-level resistance calls.
//!
//! The engine turns drug-level calls into class calls, then learns which
//! classes stay dependent after conditioning on others, which combinations
//! recur as co-resistance signatures, and how much an untested class would
//! change a multidrug-resistance decision. Every analysis borrows an
//! immutable [`ObservationMatrix`](amrscope_core::types::ObservationMatrix)
//! and returns freshly built rows.

pub mod subsets;
pub mod aggregate;
pub mod mdr;
pub mod skeleton;
pub mod hypergraph;
pub mod interaction;
pub mod decision;
pub mod network;
pub mod qc;
pub mod synthetic;
pub mod pipeline;
