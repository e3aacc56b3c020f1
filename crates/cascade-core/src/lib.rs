//! Cascade Core
//!
//! Domain types, port traits, and error handling for the Cascade downstream
//! trigger engine. This crate has minimal dependencies and defines the shared
//! vocabulary between the trigger engine and the host CI system it plugs into.

pub mod artifact;
pub mod build;
pub mod cause;
pub mod error;
pub mod ids;
pub mod ports;

pub use artifact::ArtifactCoordinate;
pub use build::{BuildResult, PipelineInfo, TriggerDecision, UpstreamBuild};
pub use cause::{BuildCause, TriggerCause};
pub use error::{Error, Result};
pub use ids::*;
