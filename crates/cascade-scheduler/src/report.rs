//! Outcome of one trigger evaluation.

use cascade_core::{ArtifactCoordinate, BuildRef, BuildResult, EvaluationId, PipelineRef, TriggerDecision};
use std::fmt;
use std::time::Duration;

/// What an upstream of a candidate was doing when the candidate got
/// suppressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamActivity {
    Building,
    Queued,
    /// Selected for triggering by this same evaluation.
    TriggeredThisRun,
}

/// Why a downstream candidate was not triggered for an artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    SelfReference,
    /// The candidate or its last build could not be resolved under the
    /// upstream's authorization.
    Unresolved,
    /// Reachable from another downstream of the same artifact.
    TransitiveDownstream,
    ArtifactShadowed { generated: ArtifactCoordinate },
    InfiniteLoop { via: ArtifactCoordinate },
    SkipPattern,
    ExcessiveTrigger {
        upstream: PipelineRef,
        activity: UpstreamActivity,
    },
    NotBuildable,
    TriggerNotConfigured,
    NotVisible {
        downstream_visible_to_upstream: bool,
        upstream_visible_to_downstream: bool,
    },
    QueryFailed { message: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::SelfReference => write!(f, "self reference"),
            SkipReason::Unresolved => write!(
                f,
                "pipeline or its last build not found, security restriction or sync issue"
            ),
            SkipReason::TransitiveDownstream => {
                write!(f, "triggered transitively by another downstream pipeline")
            }
            SkipReason::ArtifactShadowed { generated } => write!(
                f,
                "generates artifact with same groupId:artifactId {}",
                generated.short_description()
            ),
            SkipReason::InfiniteLoop { via } => write!(
                f,
                "infinite loop detected, it triggers the upstream pipeline through {}",
                via.short_description()
            ),
            SkipReason::SkipPattern => write!(f, "matches skip downstream triggers pattern"),
            SkipReason::ExcessiveTrigger { upstream, activity } => match activity {
                UpstreamActivity::Building => {
                    write!(f, "has a dependency already building: {}", upstream)
                }
                UpstreamActivity::Queued => {
                    write!(f, "has a dependency already in queue: {}", upstream)
                }
                UpstreamActivity::TriggeredThisRun => write!(
                    f,
                    "has a dependency on a pipeline triggered by this build: {}",
                    upstream
                ),
            },
            SkipReason::NotBuildable => write!(f, "not buildable"),
            SkipReason::TriggerNotConfigured => write!(f, "dependency trigger not configured"),
            SkipReason::NotVisible {
                downstream_visible_to_upstream,
                upstream_visible_to_downstream,
            } => write!(
                f,
                "not mutually visible (downstream visible by upstream auth: {}, upstream visible by downstream auth: {})",
                downstream_visible_to_upstream, upstream_visible_to_downstream
            ),
            SkipReason::QueryFailed { message } => write!(f, "query failed: {}", message),
        }
    }
}

/// A candidate left out for one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedCandidate {
    pub downstream: PipelineRef,
    pub artifact: ArtifactCoordinate,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchStatus {
    Triggered { build_number_hint: u32 },
    /// The last build already carries an equivalent cause; the new cause
    /// was recorded on it instead.
    AlreadyCovered { build: BuildRef },
    Rejected { reason: String },
    /// The pipeline no longer resolves at dispatch time.
    Unresolved,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRecord {
    pub downstream: PipelineRef,
    pub status: DispatchStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvaluationOutcome {
    Completed,
    /// The upstream result is not among the configured criteria.
    ResultIgnored(BuildResult),
    /// The upstream build's own cause chain loops back on itself.
    LoopDetected(String),
    /// A query needed before evaluating any candidate failed.
    Aborted(String),
}

/// Everything one evaluation decided and did.
#[derive(Debug, Clone)]
pub struct TriggerReport {
    pub evaluation: EvaluationId,
    pub upstream: BuildRef,
    pub outcome: EvaluationOutcome,
    pub decisions: Vec<TriggerDecision>,
    pub skipped: Vec<SkippedCandidate>,
    pub dispatches: Vec<DispatchRecord>,
    pub elapsed: Duration,
}

impl TriggerReport {
    pub(crate) fn new(evaluation: EvaluationId, upstream: BuildRef) -> Self {
        Self {
            evaluation,
            upstream,
            outcome: EvaluationOutcome::Completed,
            decisions: Vec::new(),
            skipped: Vec::new(),
            dispatches: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    pub fn decision_for(&self, downstream: &str) -> Option<&TriggerDecision> {
        self.decisions
            .iter()
            .find(|d| d.downstream.as_str() == downstream)
    }

    /// Names of the pipelines selected for triggering, in order.
    pub fn decided_pipelines(&self) -> Vec<&str> {
        self.decisions.iter().map(|d| d.downstream.as_str()).collect()
    }

    /// Pipelines actually enqueued.
    pub fn triggered(&self) -> Vec<&PipelineRef> {
        self.dispatches
            .iter()
            .filter(|d| matches!(d.status, DispatchStatus::Triggered { .. }))
            .map(|d| &d.downstream)
            .collect()
    }

    pub fn dispatch_status(&self, downstream: &str) -> Option<&DispatchStatus> {
        self.dispatches
            .iter()
            .find(|d| d.downstream.as_str() == downstream)
            .map(|d| &d.status)
    }

    /// Reasons the candidate was skipped, one per artifact it was skipped for.
    pub fn skip_reasons(&self, downstream: &str) -> Vec<&SkipReason> {
        self.skipped
            .iter()
            .filter(|s| s.downstream.as_str() == downstream)
            .map(|s| &s.reason)
            .collect()
    }
}
