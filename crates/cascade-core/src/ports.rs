//! Port traits (hexagonal architecture).
//!
//! These traits define the interfaces between the trigger engine and the host
//! CI system: the persisted dependency graph, the job directory, the cause
//! history recorded on builds, and the build queue.

use crate::artifact::ArtifactCoordinate;
use crate::build::PipelineInfo;
use crate::cause::{BuildCause, TriggerCause};
use crate::ids::{BuildRef, PipelineRef, Principal};
use crate::Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};

/// Read-only queries against the persisted artifact dependency graph.
#[async_trait]
pub trait DependencyGraph: Send + Sync {
    /// Pipelines depending on each artifact generated by a build.
    async fn downstream_by_artifact(
        &self,
        build: &BuildRef,
    ) -> Result<BTreeMap<ArtifactCoordinate, BTreeSet<PipelineRef>>>;

    /// Pipelines depending on any artifact generated by a build.
    async fn downstream_pipelines(&self, build: &BuildRef) -> Result<BTreeSet<PipelineRef>>;

    /// Artifacts generated by a build.
    async fn generated_artifacts(&self, build: &BuildRef) -> Result<Vec<ArtifactCoordinate>>;

    /// Pipelines a build transitively depends on, with their distance.
    async fn transitive_upstream(&self, build: &BuildRef) -> Result<BTreeMap<PipelineRef, u32>>;
}

/// The host's view of pipelines and their runtime state.
#[async_trait]
pub trait PipelineDirectory: Send + Sync {
    /// Resolve a pipeline by full name as seen by `principal`.
    /// `None` when it does not exist or is not visible.
    async fn resolve(&self, principal: &Principal, name: &PipelineRef) -> Result<Option<PipelineInfo>>;

    /// Not disabled and not held until its configuration is saved.
    async fn is_buildable(&self, pipeline: &PipelineRef) -> Result<bool>;

    async fn is_building(&self, pipeline: &PipelineRef) -> Result<bool>;

    async fn is_queued(&self, pipeline: &PipelineRef) -> Result<bool>;

    /// Whether the pipeline opted in to being triggered by its dependencies.
    async fn has_dependency_trigger(&self, pipeline: &PipelineRef) -> Result<bool>;

    /// Authorization context the pipeline's builds run as.
    async fn principal_of(&self, pipeline: &PipelineRef) -> Result<Principal>;

    async fn is_visible(&self, subject: &Principal, object: &PipelineRef) -> Result<bool>;

    /// Builds that caused `build`, following upstream causes recursively.
    /// Hosts may fail with `Error::LoopDetected` when the chain refers to
    /// itself.
    async fn upstream_cause_chain(&self, build: &BuildRef) -> Result<Vec<BuildRef>>;
}

/// Cause metadata recorded on builds.
#[async_trait]
pub trait CauseLedger: Send + Sync {
    async fn existing_causes(&self, build: &BuildRef) -> Result<Vec<BuildCause>>;

    /// Attach a cause to an existing build and persist it.
    async fn record_cause(&self, build: &BuildRef, cause: &TriggerCause) -> Result<()>;
}

/// Outcome of asking the host to enqueue a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The build will run; the number is the host's next build number at the
    /// time of the request and may be off under concurrent scheduling.
    Accepted { build_number_hint: u32 },
    Rejected { reason: String },
}

/// Build queue.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn enqueue(&self, pipeline: &PipelineRef, cause: &TriggerCause) -> Result<DispatchOutcome>;
}
