//! Infinite trigger loop detection.
//!
//! Two independent checks: the upstream build's own cause chain is inspected
//! once before any work starts, and every candidate's downstream graph is
//! checked for an edge back to the upstream pipeline.

use cascade_core::ports::{DependencyGraph, PipelineDirectory};
use cascade_core::{ArtifactCoordinate, BuildRef, Error, PipelineRef, Result};

pub struct CycleGuard<'a> {
    graph: &'a dyn DependencyGraph,
    directory: &'a dyn PipelineDirectory,
}

impl<'a> CycleGuard<'a> {
    pub fn new(graph: &'a dyn DependencyGraph, directory: &'a dyn PipelineDirectory) -> Self {
        Self { graph, directory }
    }

    /// Fails with `Error::LoopDetected` when the build was, directly or
    /// through other builds, caused by an earlier build of its own pipeline.
    /// Any other error means the chain could not be read.
    pub async fn check_upstream_chain(&self, upstream: &BuildRef) -> Result<()> {
        let chain = self.directory.upstream_cause_chain(upstream).await?;
        match chain.iter().find(|b| b.pipeline() == upstream.pipeline()) {
            Some(earlier) => Err(Error::LoopDetected(format!(
                "{} was caused by {} of the same pipeline",
                upstream, earlier
            ))),
            None => Ok(()),
        }
    }

    /// Artifact through which `candidate` would trigger `upstream` back, if
    /// any.
    pub async fn loops_back(
        &self,
        candidate: &BuildRef,
        upstream: &PipelineRef,
    ) -> Result<Option<ArtifactCoordinate>> {
        let downstream = self.graph.downstream_by_artifact(candidate).await?;
        Ok(downstream
            .into_iter()
            .find(|(_, pipelines)| pipelines.contains(upstream))
            .map(|(artifact, _)| artifact))
    }
}
