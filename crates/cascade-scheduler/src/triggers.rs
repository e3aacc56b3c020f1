//! Downstream trigger orchestration.

use crate::accumulator::TriggerAccumulator;
use crate::config::TriggerConfig;
use crate::cycles::CycleGuard;
use crate::dedup::{CauseDeduplicator, Coverage};
use crate::dispatch::TriggerDispatcher;
use crate::eligibility::{EligibilityFilter, SkipPattern, Verdict};
use crate::reduction::TransitiveReducer;
use crate::report::{
    DispatchRecord, DispatchStatus, EvaluationOutcome, SkipReason, SkippedCandidate, TriggerReport,
};

use cascade_core::ports::{CauseLedger, DependencyGraph, Dispatcher, PipelineDirectory};
use cascade_core::{ArtifactCoordinate, Error, EvaluationId, PipelineRef, UpstreamBuild};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, debug, info, info_span, trace, warn};

/// Decides which downstream pipelines a completed build triggers, and
/// triggers them.
pub struct DownstreamTrigger {
    graph: Arc<dyn DependencyGraph>,
    directory: Arc<dyn PipelineDirectory>,
    ledger: Arc<dyn CauseLedger>,
    dispatcher: Arc<dyn Dispatcher>,
    config: TriggerConfig,
}

impl DownstreamTrigger {
    pub fn new(
        graph: Arc<dyn DependencyGraph>,
        directory: Arc<dyn PipelineDirectory>,
        ledger: Arc<dyn CauseLedger>,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Self {
        Self {
            graph,
            directory,
            ledger,
            dispatcher,
            config: TriggerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: TriggerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &TriggerConfig {
        &self.config
    }

    /// Evaluate a completed upstream build and enqueue every downstream
    /// pipeline it should trigger.
    ///
    /// Never fails: host errors end up as skip reasons, dispatch statuses, or
    /// the report outcome.
    pub async fn on_completed(&self, upstream: &UpstreamBuild) -> TriggerReport {
        let evaluation = EvaluationId::new();
        let span = info_span!(
            "downstream_trigger",
            evaluation = %evaluation,
            upstream = %upstream.build
        );

        async {
            let started = Instant::now();
            let mut report = TriggerReport::new(evaluation, upstream.build.clone());
            self.evaluate(upstream, &mut report).await;
            report.elapsed = started.elapsed();
            self.log_summary(&report);
            report
        }
        .instrument(span)
        .await
    }

    async fn evaluate(&self, upstream: &UpstreamBuild, report: &mut TriggerReport) {
        if !self.config.triggers_on(upstream.result) {
            debug!(result = ?upstream.result, "Skip triggering downstream pipelines for ignored upstream result");
            report.outcome = EvaluationOutcome::ResultIgnored(upstream.result);
            return;
        }

        let graph = self.graph.as_ref();
        let directory = self.directory.as_ref();

        match CycleGuard::new(graph, directory)
            .check_upstream_chain(&upstream.build)
            .await
        {
            Ok(()) => {}
            Err(Error::LoopDetected(message)) => {
                warn!(%message, "Abort infinite build trigger loop");
                report.outcome = EvaluationOutcome::LoopDetected(message);
                return;
            }
            Err(e) => {
                warn!(error = %e, "Cannot read upstream cause chain, not triggering");
                report.outcome = EvaluationOutcome::Aborted(e.to_string());
                return;
            }
        }

        let skip_pattern = match upstream
            .skip_downstream_triggers_pattern
            .as_deref()
            .map(SkipPattern::compile)
            .transpose()
        {
            Ok(pattern) => pattern,
            Err(e) => {
                warn!(error = %e, "Ignoring skip downstream triggers pattern");
                None
            }
        };

        let by_artifact = match graph.downstream_by_artifact(&upstream.build).await {
            Ok(by_artifact) => by_artifact,
            Err(e) => {
                warn!(error = %e, "Cannot list downstream pipelines, not triggering");
                report.outcome = EvaluationOutcome::Aborted(e.to_string());
                return;
            }
        };

        let selected = self
            .select(upstream, skip_pattern.as_ref(), &by_artifact, report)
            .await;
        let decisions = selected.into_decisions();

        let dedup = CauseDeduplicator::new(self.ledger.as_ref());
        let dispatcher = TriggerDispatcher::new(self.dispatcher.as_ref());
        for decision in &decisions {
            let cause = decision.cause(&upstream.build);
            let status = match directory.resolve(&upstream.principal, &decision.downstream).await {
                Ok(Some(info)) => match dedup.check(&info, &cause).await {
                    Coverage::Covered { build, .. } => {
                        debug!(
                            downstream = %decision.downstream,
                            build = %build,
                            artifacts = %decision.artifacts_description(),
                            "Skip triggering, last build already has the same cause"
                        );
                        DispatchStatus::AlreadyCovered { build }
                    }
                    Coverage::NotCovered => dispatcher.dispatch(&info, &cause).await,
                },
                Ok(None) => {
                    warn!(downstream = %decision.downstream, "Illegal state: selected pipeline not resolved");
                    DispatchStatus::Unresolved
                }
                Err(e) => {
                    warn!(downstream = %decision.downstream, error = %e, "Illegal state: selected pipeline not resolved");
                    DispatchStatus::Unresolved
                }
            };
            report.dispatches.push(DispatchRecord {
                downstream: decision.downstream.clone(),
                status,
            });
        }
        report.decisions = decisions;
    }

    /// Build the decision map, artifact by artifact.
    async fn select(
        &self,
        upstream: &UpstreamBuild,
        skip_pattern: Option<&SkipPattern>,
        by_artifact: &BTreeMap<ArtifactCoordinate, BTreeSet<PipelineRef>>,
        report: &mut TriggerReport,
    ) -> TriggerAccumulator {
        let graph = self.graph.as_ref();
        let directory = self.directory.as_ref();
        let reducer = TransitiveReducer::new(graph, directory, &upstream.principal, skip_pattern);
        let filter = EligibilityFilter::new(graph, directory, upstream, skip_pattern);
        let mut selected = TriggerAccumulator::new();

        for (artifact, candidates) in by_artifact {
            // A pipeline depending on its own artifact must not shadow the others.
            let mut walkable = candidates.clone();
            let depends_on_itself = walkable.remove(upstream.pipeline());

            let mut reduction = reducer.reduce(artifact, &walkable).await;
            if depends_on_itself {
                reduction.kept.insert(upstream.pipeline().clone());
            }

            for removed in reduction.removed {
                if selected.contains(&removed) {
                    trace!(
                        downstream = %removed,
                        artifact = %artifact.short_description(),
                        "Already selected for another artifact, not skipping"
                    );
                    continue;
                }
                record_skip(report, removed, artifact, SkipReason::TransitiveDownstream);
            }

            // Pipelines regenerating the artifact won't be triggered by it.
            let siblings: BTreeSet<_> = candidates
                .difference(&reduction.regenerating)
                .cloned()
                .collect();

            for candidate in reduction.kept {
                match filter.evaluate(&candidate, artifact, &siblings, &selected).await {
                    Verdict::AlreadyDecided => {
                        trace!(
                            downstream = %candidate,
                            artifact = %artifact.short_description(),
                            "Eligibility already confirmed, merging artifact"
                        );
                        selected.record(candidate, artifact.clone());
                    }
                    Verdict::Eligible => {
                        if !selected.record(candidate.clone(), artifact.clone()) {
                            debug!(downstream = %candidate, artifact = %artifact.short_description(), "Artifact already recorded");
                        }
                    }
                    Verdict::Skip(reason) => record_skip(report, candidate, artifact, reason),
                }
            }
        }

        selected
    }

    fn log_summary(&self, report: &TriggerReport) {
        let triggered = report.triggered().len();
        let covered = report
            .dispatches
            .iter()
            .filter(|d| matches!(d.status, DispatchStatus::AlreadyCovered { .. }))
            .count();
        let elapsed_ms = report.elapsed.as_millis() as u64;

        if report.elapsed > self.config.slow_run_threshold() {
            info!(
                outcome = ?report.outcome,
                decisions = report.decisions.len(),
                triggered,
                covered,
                skipped = report.skipped.len(),
                elapsed_ms,
                "Downstream trigger evaluation completed slowly"
            );
        } else {
            debug!(
                outcome = ?report.outcome,
                decisions = report.decisions.len(),
                triggered,
                covered,
                skipped = report.skipped.len(),
                elapsed_ms,
                "Downstream trigger evaluation completed"
            );
        }
    }
}

fn record_skip(
    report: &mut TriggerReport,
    downstream: PipelineRef,
    artifact: &ArtifactCoordinate,
    reason: SkipReason,
) {
    let artifact_description = artifact.short_description();
    match &reason {
        SkipReason::SelfReference => {
            trace!(downstream = %downstream, artifact = %artifact_description, reason = %reason, "Skip triggering")
        }
        SkipReason::InfiniteLoop { .. }
        | SkipReason::SkipPattern
        | SkipReason::ExcessiveTrigger { .. } => {
            info!(downstream = %downstream, artifact = %artifact_description, reason = %reason, "Skip triggering")
        }
        SkipReason::QueryFailed { .. } => {
            warn!(downstream = %downstream, artifact = %artifact_description, reason = %reason, "Skip triggering")
        }
        _ => {
            debug!(downstream = %downstream, artifact = %artifact_description, reason = %reason, "Skip triggering")
        }
    }

    report.skipped.push(SkippedCandidate {
        downstream,
        artifact: artifact.clone(),
        reason,
    });
}
