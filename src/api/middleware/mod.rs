//! API middleware.
//!
//! Only the analysis and compression surfaces go through `rate::limit`.
//! Detection is admitted by the orchestrator so the decision sits next to
//! the classifier call it guards.

pub mod rate;
