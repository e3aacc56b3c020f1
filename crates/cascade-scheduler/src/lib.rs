//! Downstream trigger evaluation for Cascade.
//!
//! When an upstream build completes, [`DownstreamTrigger`] works out which
//! pipelines depend on the artifacts it produced and enqueues the ones that
//! should run, each with the artifacts that caused it.

pub mod accumulator;
pub mod config;
pub mod cycles;
pub mod dedup;
pub mod dispatch;
pub mod eligibility;
pub mod reduction;
pub mod report;
pub mod suppression;
pub mod triggers;

pub use config::TriggerConfig;
pub use report::{DispatchStatus, EvaluationOutcome, SkipReason, TriggerReport};
pub use triggers::DownstreamTrigger;
