//! Transitive reduction of downstream candidates.
//!
//! If B and C both depend on an artifact and C is also reachable from B's own
//! downstream graph, triggering C directly is redundant: B's cascade will
//! trigger it. Each candidate's downstream pipelines are read from its last
//! completed build, one level at a time.

use crate::eligibility::SkipPattern;
use cascade_core::ports::{DependencyGraph, PipelineDirectory};
use cascade_core::{ArtifactCoordinate, PipelineRef, Principal};
use futures::FutureExt;
use futures::future::BoxFuture;
use std::collections::BTreeSet;
use tracing::debug;

/// Split of a direct downstream set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reduction {
    /// Closest dependents, to be evaluated for triggering.
    pub kept: BTreeSet<PipelineRef>,
    /// Members reachable through another member.
    pub removed: BTreeSet<PipelineRef>,
    /// Kept members whose last build regenerates the artifact's module.
    pub regenerating: BTreeSet<PipelineRef>,
}

pub struct TransitiveReducer<'a> {
    graph: &'a dyn DependencyGraph,
    directory: &'a dyn PipelineDirectory,
    principal: &'a Principal,
    skip_pattern: Option<&'a SkipPattern>,
}

impl<'a> TransitiveReducer<'a> {
    pub fn new(
        graph: &'a dyn DependencyGraph,
        directory: &'a dyn PipelineDirectory,
        principal: &'a Principal,
        skip_pattern: Option<&'a SkipPattern>,
    ) -> Self {
        Self {
            graph,
            directory,
            principal,
            skip_pattern,
        }
    }

    /// Remove from `direct`, the pipelines depending on `artifact`, every
    /// member reachable from another member.
    ///
    /// Members are walked in order; a member already found reachable is not
    /// walked again, and a walk never removes its own root, so of two members
    /// depending on each other the first one is kept. A member regenerating
    /// `artifact` itself is not walked: it won't be triggered by it.
    pub async fn reduce(
        &self,
        artifact: &ArtifactCoordinate,
        direct: &BTreeSet<PipelineRef>,
    ) -> Reduction {
        let mut reachable = BTreeSet::new();
        let mut regenerating = BTreeSet::new();
        for member in direct {
            if reachable.contains(member) {
                continue;
            }
            if self.regenerates(member, artifact).await {
                regenerating.insert(member.clone());
                continue;
            }
            let seen = reachable.iter().cloned().chain([member.clone()]).collect();
            let found = self.reachable_from(member.clone(), seen).await;
            reachable = reachable.union(&found).cloned().collect();
        }

        let (removed, kept): (BTreeSet<_>, BTreeSet<_>) =
            direct.iter().cloned().partition(|p| reachable.contains(p));
        regenerating.retain(|p| kept.contains(p));
        Reduction {
            kept,
            removed,
            regenerating,
        }
    }

    /// Pipelines reachable from `node`, excluding anything in `seen`.
    fn reachable_from(
        &self,
        node: PipelineRef,
        seen: BTreeSet<PipelineRef>,
    ) -> BoxFuture<'_, BTreeSet<PipelineRef>> {
        async move {
            // A skipped pipeline will not be triggered, so its cascade won't happen.
            if self.skip_pattern.is_some_and(|p| p.matches(&node)) {
                return BTreeSet::new();
            }

            let fresh: BTreeSet<_> = self
                .downstream_of(&node)
                .await
                .difference(&seen)
                .cloned()
                .collect();

            let mut found = fresh.clone();
            for next in fresh {
                let seen_now = seen.union(&found).cloned().collect();
                let deeper = self.reachable_from(next, seen_now).await;
                found.extend(deeper);
            }
            found
        }
        .boxed()
    }

    async fn regenerates(&self, member: &PipelineRef, artifact: &ArtifactCoordinate) -> bool {
        let Ok(Some(info)) = self.directory.resolve(self.principal, member).await else {
            return false;
        };
        let Some(build) = info.last_build_ref() else {
            return false;
        };
        self.graph
            .generated_artifacts(&build)
            .await
            .is_ok_and(|generated| generated.iter().any(|g| g.same_module(artifact)))
    }

    async fn downstream_of(&self, node: &PipelineRef) -> BTreeSet<PipelineRef> {
        let info = match self.directory.resolve(self.principal, node).await {
            Ok(Some(info)) => info,
            Ok(None) => return BTreeSet::new(),
            Err(e) => {
                debug!(pipeline = %node, error = %e, "Cannot resolve pipeline during transitive reduction");
                return BTreeSet::new();
            }
        };
        let Some(build) = info.last_completed_build_ref() else {
            return BTreeSet::new();
        };
        match self.graph.downstream_pipelines(&build).await {
            Ok(downstream) => downstream,
            Err(e) => {
                debug!(build = %build, error = %e, "Cannot list downstream pipelines during transitive reduction");
                BTreeSet::new()
            }
        }
    }
}
