//! Run reporting for surge
//!
//! Thresholds are `(metric, expression)` pairs evaluated once over the final
//! metrics snapshot; [`RunReport`] renders the result for the terminal and
//! exports it as JSON.

pub mod error;
pub mod summary;
pub mod threshold;

pub use error::{ReportError, ReportResult};
pub use summary::RunReport;
pub use threshold::{
    evaluate_all, parse_thresholds, Aggregation, Comparison, Threshold, ThresholdResult,
};
