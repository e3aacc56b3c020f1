//! Per-candidate eligibility checks.
//!
//! Checks run in a fixed order and the first failing one decides the skip
//! reason:
//!
//! 1. already selected for another artifact (merge, no re-check)
//! 2. self reference
//! 3. candidate and its last build resolvable under the upstream's auth
//! 4. candidate does not itself generate the triggering module
//! 5. candidate does not trigger the upstream back
//! 6. skip downstream triggers pattern
//! 7. excessive trigger suppression
//! 8. buildable
//! 9. dependency trigger configured
//! 10. upstream and downstream visible to each other

use crate::accumulator::TriggerAccumulator;
use crate::cycles::CycleGuard;
use crate::report::SkipReason;
use crate::suppression::ExcessiveTriggerSuppressor;
use cascade_core::ports::{DependencyGraph, PipelineDirectory};
use cascade_core::{ArtifactCoordinate, Error, PipelineRef, Result, UpstreamBuild};
use regex::Regex;
use std::collections::BTreeSet;

/// Pattern excluding downstream pipelines by full name. The whole name must
/// match, not a substring.
#[derive(Debug, Clone)]
pub struct SkipPattern(Regex);

impl SkipPattern {
    pub fn compile(pattern: &str) -> Result<Self> {
        Regex::new(&format!("^(?:{})$", pattern))
            .map(Self)
            .map_err(|e| Error::InvalidSkipPattern {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })
    }

    pub fn matches(&self, pipeline: &PipelineRef) -> bool {
        self.0.is_match(pipeline.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Already selected; the artifact only needs merging into its causes.
    AlreadyDecided,
    Eligible,
    Skip(SkipReason),
}

pub struct EligibilityFilter<'a> {
    graph: &'a dyn DependencyGraph,
    directory: &'a dyn PipelineDirectory,
    upstream: &'a UpstreamBuild,
    skip_pattern: Option<&'a SkipPattern>,
    cycles: CycleGuard<'a>,
    suppressor: ExcessiveTriggerSuppressor<'a>,
}

impl<'a> EligibilityFilter<'a> {
    pub fn new(
        graph: &'a dyn DependencyGraph,
        directory: &'a dyn PipelineDirectory,
        upstream: &'a UpstreamBuild,
        skip_pattern: Option<&'a SkipPattern>,
    ) -> Self {
        Self {
            graph,
            directory,
            upstream,
            skip_pattern,
            cycles: CycleGuard::new(graph, directory),
            suppressor: ExcessiveTriggerSuppressor::new(graph, directory, &upstream.principal),
        }
    }

    /// Decide whether `candidate` should be triggered because of `artifact`.
    ///
    /// `siblings` is the unreduced set of pipelines depending on `artifact`.
    /// Query failures skip the candidate rather than failing the evaluation.
    pub async fn evaluate(
        &self,
        candidate: &PipelineRef,
        artifact: &ArtifactCoordinate,
        siblings: &BTreeSet<PipelineRef>,
        selected: &TriggerAccumulator,
    ) -> Verdict {
        // Authorization was checked when it was first selected.
        if selected.contains(candidate) {
            return Verdict::AlreadyDecided;
        }

        match self.check(candidate, artifact, siblings, selected).await {
            Ok(None) => Verdict::Eligible,
            Ok(Some(reason)) => Verdict::Skip(reason),
            Err(e) => Verdict::Skip(SkipReason::QueryFailed {
                message: e.to_string(),
            }),
        }
    }

    async fn check(
        &self,
        candidate: &PipelineRef,
        artifact: &ArtifactCoordinate,
        siblings: &BTreeSet<PipelineRef>,
        selected: &TriggerAccumulator,
    ) -> Result<Option<SkipReason>> {
        let upstream = self.upstream.pipeline();
        let principal = &self.upstream.principal;

        if candidate == upstream {
            return Ok(Some(SkipReason::SelfReference));
        }

        let Some(info) = self.directory.resolve(principal, candidate).await? else {
            return Ok(Some(SkipReason::Unresolved));
        };
        let Some(last_build) = info.last_build_ref() else {
            return Ok(Some(SkipReason::Unresolved));
        };

        let generated = self.graph.generated_artifacts(&last_build).await?;
        if let Some(generated) = generated.into_iter().find(|g| g.same_module(artifact)) {
            return Ok(Some(SkipReason::ArtifactShadowed { generated }));
        }

        if let Some(via) = self.cycles.loops_back(&last_build, upstream).await? {
            return Ok(Some(SkipReason::InfiniteLoop { via }));
        }

        if self.skip_pattern.is_some_and(|p| p.matches(candidate)) {
            return Ok(Some(SkipReason::SkipPattern));
        }

        if let Some((other, activity)) = self
            .suppressor
            .check(&last_build, upstream, siblings, selected)
            .await?
        {
            return Ok(Some(SkipReason::ExcessiveTrigger {
                upstream: other,
                activity,
            }));
        }

        if !self.directory.is_buildable(candidate).await? {
            return Ok(Some(SkipReason::NotBuildable));
        }

        if !self.directory.has_dependency_trigger(candidate).await? {
            return Ok(Some(SkipReason::TriggerNotConfigured));
        }

        let downstream_visible_to_upstream = self.directory.is_visible(principal, candidate).await?;
        let downstream_principal = self.directory.principal_of(candidate).await?;
        let upstream_visible_to_downstream = self
            .directory
            .is_visible(&downstream_principal, upstream)
            .await?;
        if !(downstream_visible_to_upstream && upstream_visible_to_downstream) {
            return Ok(Some(SkipReason::NotVisible {
                downstream_visible_to_upstream,
                upstream_visible_to_downstream,
            }));
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::UpstreamActivity;
    use cascade_core::{BuildResult, Principal};
    use cascade_tests::{PipelineFixture, TestHost, artifact, build_ref, pipeline, pipelines};
    use pretty_assertions::assert_eq;

    fn lib_artifact() -> ArtifactCoordinate {
        artifact("com.example", "lib", "1.0")
    }

    fn upstream() -> UpstreamBuild {
        UpstreamBuild::new(build_ref("lib", 1), BuildResult::Success)
    }

    fn host_with(candidate: PipelineFixture) -> TestHost {
        TestHost::builder()
            .pipeline(PipelineFixture::new("lib").build(1, [lib_artifact()]))
            .pipeline(candidate)
            .build()
    }

    fn app() -> PipelineFixture {
        PipelineFixture::new("app").depends_on(lib_artifact())
    }

    async fn verdict_for(host: &TestHost, upstream: &UpstreamBuild, skip: Option<&SkipPattern>) -> Verdict {
        let filter = EligibilityFilter::new(host, host, upstream, skip);
        filter
            .evaluate(
                &pipeline("app"),
                &lib_artifact(),
                &pipelines(&["app"]),
                &TriggerAccumulator::new(),
            )
            .await
    }

    async fn verdict(candidate: PipelineFixture) -> Verdict {
        let host = host_with(candidate);
        verdict_for(&host, &upstream(), None).await
    }

    #[test]
    fn test_skip_pattern_matches_whole_name() {
        let pattern = SkipPattern::compile("team/.*-it").unwrap();
        assert!(pattern.matches(&pipeline("team/app-it")));
        assert!(!pattern.matches(&pipeline("team/app-it-legacy")));
        assert!(!pattern.matches(&pipeline("other/team/app-it")));
    }

    #[test]
    fn test_invalid_skip_pattern() {
        let err = SkipPattern::compile("team/(").unwrap_err();
        assert!(matches!(err, Error::InvalidSkipPattern { .. }));
    }

    #[tokio::test]
    async fn test_eligible() {
        assert_eq!(verdict(app().build(1, [])).await, Verdict::Eligible);
    }

    #[tokio::test]
    async fn test_already_decided_short_circuits() {
        let host = host_with(app().build(1, []).disabled());
        let upstream = upstream();
        let filter = EligibilityFilter::new(&host, &host, &upstream, None);
        let mut selected = TriggerAccumulator::new();
        selected.record(pipeline("app"), artifact("com.example", "other", "1.0"));

        let verdict = filter
            .evaluate(&pipeline("app"), &lib_artifact(), &pipelines(&["app"]), &selected)
            .await;
        assert_eq!(verdict, Verdict::AlreadyDecided);
    }

    #[tokio::test]
    async fn test_self_reference() {
        let host = host_with(app().build(1, []));
        let upstream = upstream();
        let filter = EligibilityFilter::new(&host, &host, &upstream, None);
        let verdict = filter
            .evaluate(&pipeline("lib"), &lib_artifact(), &pipelines(&["lib"]), &TriggerAccumulator::new())
            .await;
        assert_eq!(verdict, Verdict::Skip(SkipReason::SelfReference));
    }

    #[tokio::test]
    async fn test_unresolved_without_builds() {
        assert_eq!(verdict(app()).await, Verdict::Skip(SkipReason::Unresolved));
    }

    #[tokio::test]
    async fn test_unresolved_when_hidden_from_upstream() {
        let host = host_with(app().build(1, []).hidden_from("ci-bot"));
        let upstream = upstream().with_principal(Principal::new("ci-bot"));
        assert_eq!(
            verdict_for(&host, &upstream, None).await,
            Verdict::Skip(SkipReason::Unresolved)
        );
    }

    #[tokio::test]
    async fn test_artifact_shadowed() {
        let own = artifact("com.example", "lib", "2.0-SNAPSHOT");
        assert_eq!(
            verdict(app().build(1, [own.clone()])).await,
            Verdict::Skip(SkipReason::ArtifactShadowed { generated: own })
        );
    }

    #[tokio::test]
    async fn test_infinite_loop() {
        let app_out = artifact("com.example", "app", "1.0");
        let host = TestHost::builder()
            .pipeline(
                PipelineFixture::new("lib")
                    .depends_on(app_out.clone())
                    .build(1, [lib_artifact()]),
            )
            .pipeline(app().build(1, [app_out.clone()]))
            .build();
        assert_eq!(
            verdict_for(&host, &upstream(), None).await,
            Verdict::Skip(SkipReason::InfiniteLoop { via: app_out })
        );
    }

    #[tokio::test]
    async fn test_skip_pattern() {
        let host = host_with(app().build(1, []));
        let pattern = SkipPattern::compile("ap+").unwrap();
        assert_eq!(
            verdict_for(&host, &upstream(), Some(&pattern)).await,
            Verdict::Skip(SkipReason::SkipPattern)
        );
    }

    #[tokio::test]
    async fn test_excessive_trigger() {
        let other = artifact("com.example", "other", "1.0");
        let host = TestHost::builder()
            .pipeline(PipelineFixture::new("lib").build(1, [lib_artifact()]))
            .pipeline(PipelineFixture::new("other").building().build(3, [other.clone()]))
            .pipeline(app().depends_on(other).build(1, []))
            .build();
        assert_eq!(
            verdict_for(&host, &upstream(), None).await,
            Verdict::Skip(SkipReason::ExcessiveTrigger {
                upstream: pipeline("other"),
                activity: UpstreamActivity::Building,
            })
        );
    }

    #[tokio::test]
    async fn test_not_buildable() {
        assert_eq!(
            verdict(app().build(1, []).disabled()).await,
            Verdict::Skip(SkipReason::NotBuildable)
        );
        assert_eq!(
            verdict(app().build(1, []).held_until_save()).await,
            Verdict::Skip(SkipReason::NotBuildable)
        );
    }

    #[tokio::test]
    async fn test_trigger_not_configured() {
        assert_eq!(
            verdict(app().build(1, []).without_dependency_trigger()).await,
            Verdict::Skip(SkipReason::TriggerNotConfigured)
        );
    }

    #[tokio::test]
    async fn test_upstream_must_be_visible_to_downstream() {
        let host = TestHost::builder()
            .pipeline(
                PipelineFixture::new("lib")
                    .hidden_from("app-runner")
                    .build(1, [lib_artifact()]),
            )
            .pipeline(app().running_as("app-runner").build(1, []))
            .build();
        assert_eq!(
            verdict_for(&host, &upstream(), None).await,
            Verdict::Skip(SkipReason::NotVisible {
                downstream_visible_to_upstream: true,
                upstream_visible_to_downstream: false,
            })
        );
    }
}
