//! Build and pipeline state as seen by the trigger engine.

use crate::artifact::{ArtifactCoordinate, describe_artifacts};
use crate::cause::TriggerCause;
use crate::ids::{BuildRef, PipelineRef, Principal};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Final result of a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildResult {
    Success,
    Unstable,
    Failure,
    NotBuilt,
    Aborted,
}

/// The build whose completion is being evaluated.
#[derive(Debug, Clone)]
pub struct UpstreamBuild {
    pub build: BuildRef,
    pub result: BuildResult,
    /// Authorization context the build ran as.
    pub principal: Principal,
    /// Regular expression; downstream pipelines whose full name matches it
    /// entirely are never triggered by this build.
    pub skip_downstream_triggers_pattern: Option<String>,
}

impl UpstreamBuild {
    pub fn new(build: BuildRef, result: BuildResult) -> Self {
        Self {
            build,
            result,
            principal: Principal::system(),
            skip_downstream_triggers_pattern: None,
        }
    }

    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principal = principal;
        self
    }

    pub fn with_skip_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.skip_downstream_triggers_pattern = Some(pattern.into());
        self
    }

    pub fn pipeline(&self) -> &PipelineRef {
        self.build.pipeline()
    }
}

/// A pipeline resolved through the host directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineInfo {
    pub pipeline: PipelineRef,
    pub last_build: Option<u32>,
    pub last_completed_build: Option<u32>,
    pub next_build_number: u32,
}

impl PipelineInfo {
    pub fn last_build_ref(&self) -> Option<BuildRef> {
        self.last_build
            .and_then(|number| BuildRef::new(self.pipeline.clone(), number).ok())
    }

    pub fn last_completed_build_ref(&self) -> Option<BuildRef> {
        self.last_completed_build
            .and_then(|number| BuildRef::new(self.pipeline.clone(), number).ok())
    }
}

/// A downstream pipeline selected for triggering, with every artifact that
/// caused it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerDecision {
    pub downstream: PipelineRef,
    pub artifacts: BTreeSet<ArtifactCoordinate>,
}

impl TriggerDecision {
    pub fn cause(&self, upstream: &BuildRef) -> TriggerCause {
        TriggerCause::new(upstream.clone(), self.artifacts.iter().cloned())
    }

    pub fn artifacts_description(&self) -> String {
        describe_artifacts(&self.artifacts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_refs_from_info() {
        let info = PipelineInfo {
            pipeline: PipelineRef::new("app"),
            last_build: Some(7),
            last_completed_build: Some(6),
            next_build_number: 8,
        };
        assert_eq!(info.last_build_ref().unwrap().to_string(), "app#7");
        assert_eq!(info.last_completed_build_ref().unwrap().to_string(), "app#6");
    }

    #[test]
    fn test_pipeline_without_builds() {
        let info = PipelineInfo {
            pipeline: PipelineRef::new("fresh"),
            last_build: None,
            last_completed_build: None,
            next_build_number: 1,
        };
        assert!(info.last_build_ref().is_none());
        assert!(info.last_completed_build_ref().is_none());
    }

    #[test]
    fn test_zero_build_number_from_host_is_no_build() {
        let info = PipelineInfo {
            pipeline: PipelineRef::new("app"),
            last_build: Some(0),
            last_completed_build: Some(0),
            next_build_number: 1,
        };
        assert!(info.last_build_ref().is_none());
        assert!(info.last_completed_build_ref().is_none());
    }

    #[test]
    fn test_decision_cause_carries_artifacts() {
        let decision = TriggerDecision {
            downstream: PipelineRef::new("app"),
            artifacts: [
                ArtifactCoordinate::new("g", "b", "1.0"),
                ArtifactCoordinate::new("g", "a", "1.0"),
            ]
            .into_iter()
            .collect(),
        };
        let upstream = BuildRef::new("lib", 4).unwrap();
        let cause = decision.cause(&upstream);
        assert_eq!(cause.upstream, upstream);
        assert_eq!(cause.artifacts_description(), "g:a:1.0, g:b:1.0");
    }
}
