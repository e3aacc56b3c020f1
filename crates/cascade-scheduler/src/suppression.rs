//! Excessive trigger suppression.
//!
//! A candidate that also depends on another pipeline which is building,
//! queued, or about to be triggered by this same evaluation will be triggered
//! by that pipeline's own completion. Triggering it now would only build it
//! twice.

use crate::accumulator::TriggerAccumulator;
use crate::report::UpstreamActivity;
use cascade_core::ports::{DependencyGraph, PipelineDirectory};
use cascade_core::{BuildRef, PipelineRef, Principal, Result};
use std::collections::BTreeSet;

pub struct ExcessiveTriggerSuppressor<'a> {
    graph: &'a dyn DependencyGraph,
    directory: &'a dyn PipelineDirectory,
    principal: &'a Principal,
}

impl<'a> ExcessiveTriggerSuppressor<'a> {
    pub fn new(
        graph: &'a dyn DependencyGraph,
        directory: &'a dyn PipelineDirectory,
        principal: &'a Principal,
    ) -> Self {
        Self {
            graph,
            directory,
            principal,
        }
    }

    /// The first transitive upstream of `candidate` that will trigger it
    /// anyway, with what it is doing.
    ///
    /// `siblings` is the unreduced set of pipelines depending on the artifact
    /// being evaluated; `selected` holds the pipelines already chosen.
    pub async fn check(
        &self,
        candidate: &BuildRef,
        upstream: &PipelineRef,
        siblings: &BTreeSet<PipelineRef>,
        selected: &TriggerAccumulator,
    ) -> Result<Option<(PipelineRef, UpstreamActivity)>> {
        let transitive = self.graph.transitive_upstream(candidate).await?;

        for other in transitive.into_keys() {
            if &other == upstream {
                continue;
            }
            // Not visible: not ours to reason about.
            if self.directory.resolve(self.principal, &other).await?.is_none() {
                continue;
            }

            if self.directory.is_building(&other).await? {
                return Ok(Some((other, UpstreamActivity::Building)));
            }
            if self.directory.is_queued(&other).await? {
                return Ok(Some((other, UpstreamActivity::Queued)));
            }
            if siblings.contains(&other) || selected.contains(&other) {
                return Ok(Some((other, UpstreamActivity::TriggeredThisRun)));
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cascade_tests::{PipelineFixture, TestHost, artifact, build_ref, pipeline, pipelines};

    /// u1 and u2 both produce artifacts d depends on.
    fn graph_host(u1: PipelineFixture) -> TestHost {
        let a1 = artifact("g", "u1", "1.0");
        let a2 = artifact("g", "u2", "1.0");
        TestHost::builder()
            .pipeline(u1.build(1, [a1.clone()]))
            .pipeline(PipelineFixture::new("u2").build(1, [a2.clone()]))
            .pipeline(PipelineFixture::new("d").depends_on(a1).depends_on(a2).build(1, []))
            .build()
    }

    async fn check(
        host: &TestHost,
        siblings: &[&str],
        selected: &TriggerAccumulator,
    ) -> Option<(PipelineRef, UpstreamActivity)> {
        let principal = Principal::system();
        let suppressor = ExcessiveTriggerSuppressor::new(host, host, &principal);
        suppressor
            .check(&build_ref("d", 1), &pipeline("u2"), &pipelines(siblings), selected)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_building_upstream_suppresses() {
        let host = graph_host(PipelineFixture::new("u1").building());
        let found = check(&host, &["d"], &TriggerAccumulator::new()).await;
        assert_eq!(found, Some((pipeline("u1"), UpstreamActivity::Building)));
    }

    #[tokio::test]
    async fn test_queued_upstream_suppresses() {
        let host = graph_host(PipelineFixture::new("u1").queued());
        let found = check(&host, &["d"], &TriggerAccumulator::new()).await;
        assert_eq!(found, Some((pipeline("u1"), UpstreamActivity::Queued)));
    }

    #[tokio::test]
    async fn test_sibling_upstream_suppresses() {
        let host = graph_host(PipelineFixture::new("u1"));
        let found = check(&host, &["d", "u1"], &TriggerAccumulator::new()).await;
        assert_eq!(found, Some((pipeline("u1"), UpstreamActivity::TriggeredThisRun)));
    }

    #[tokio::test]
    async fn test_already_selected_upstream_suppresses() {
        let host = graph_host(PipelineFixture::new("u1"));
        let mut selected = TriggerAccumulator::new();
        selected.record(pipeline("u1"), artifact("g", "other", "1.0"));
        let found = check(&host, &["d"], &selected).await;
        assert_eq!(found, Some((pipeline("u1"), UpstreamActivity::TriggeredThisRun)));
    }

    #[tokio::test]
    async fn test_idle_or_hidden_upstream_ignored() {
        let host = graph_host(PipelineFixture::new("u1"));
        assert_eq!(check(&host, &["d"], &TriggerAccumulator::new()).await, None);

        let hidden = graph_host(PipelineFixture::new("u1").building().hidden_from("SYSTEM"));
        assert_eq!(check(&hidden, &["d"], &TriggerAccumulator::new()).await, None);
    }
}
