//! Four-phase report workflow: analyze, research, write, review.
//!
//! Each phase lives in its own module and hands a typed artifact to the
//! next. `workflow::run` is the only entry point; phases are not meant to be
//! invoked out of order outside of tests.

pub mod phase1_analyze;
pub mod phase2_research;
pub mod phase3_write;
pub mod phase4_review;
pub mod types;
pub mod workflow;

pub use types::ReportOutput;
