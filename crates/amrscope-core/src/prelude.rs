//! amrscope Core Prelude: convenient imports for common usage.
//!
//! ```rust
//! use amrscope_core::prelude::*;
//! ```

// Re-export shared data types
pub use crate::types::{call_label, parse_call, Call, CallCounts, ClassMap, ObservationMatrix};

// Re-export contingency statistics
pub use crate::contingency::{chi2_contingency, Chi2Result, Contingency2x2, CrossTab};

// Re-export the IndependenceTest trait and the default tester
pub use crate::independence::{ci_test, CiDecision, CmhTest, IndependenceTest, TestOutcome};

// Re-export multiple-testing correction
pub use crate::multitest::{adjust_pvalues, PAdjustMethod};

// Re-export error types
pub use crate::error::{AmrError, Result};
