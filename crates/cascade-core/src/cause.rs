//! Build causes and trigger provenance.

use crate::artifact::{ArtifactCoordinate, describe_artifacts};
use crate::ids::BuildRef;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Why a downstream build was (or would be) triggered: a set of artifacts
/// produced by an upstream build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TriggerCause {
    pub upstream: BuildRef,
    pub artifacts: BTreeSet<ArtifactCoordinate>,
    pub recorded_at: DateTime<Utc>,
}

impl TriggerCause {
    pub fn new(upstream: BuildRef, artifacts: impl IntoIterator<Item = ArtifactCoordinate>) -> Self {
        Self {
            upstream,
            artifacts: artifacts.into_iter().collect(),
            recorded_at: Utc::now(),
        }
    }

    /// Two causes are equivalent when they come from the same upstream
    /// pipeline and name the same set of artifacts. Build numbers and
    /// timestamps are ignored, so a newer build of the same upstream
    /// producing the same artifacts is already covered.
    pub fn is_equivalent(&self, other: &TriggerCause) -> bool {
        self.upstream.pipeline() == other.upstream.pipeline() && self.artifacts == other.artifacts
    }

    /// First recorded cause that already covers this one.
    pub fn covered_by<'a>(&self, existing: &'a [BuildCause]) -> Option<&'a TriggerCause> {
        existing
            .iter()
            .filter_map(BuildCause::as_dependency)
            .find(|cause| self.is_equivalent(cause))
    }

    pub fn artifacts_description(&self) -> String {
        describe_artifacts(&self.artifacts)
    }
}

/// A cause recorded on a build by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BuildCause {
    /// Triggered because an upstream build produced artifacts it depends on.
    ArtifactDependency(TriggerCause),
    /// Started by hand.
    Manual { user: Option<String> },
    /// Any other host-specific cause (SCM change, timer, ...).
    Other { description: String },
}

impl BuildCause {
    pub fn as_dependency(&self) -> Option<&TriggerCause> {
        match self {
            BuildCause::ArtifactDependency(cause) => Some(cause),
            _ => None,
        }
    }
}

impl From<TriggerCause> for BuildCause {
    fn from(cause: TriggerCause) -> Self {
        BuildCause::ArtifactDependency(cause)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(id: &str) -> ArtifactCoordinate {
        ArtifactCoordinate::new("com.example", id, "1.0")
    }

    fn build(name: &str, number: u32) -> BuildRef {
        BuildRef::new(name, number).unwrap()
    }

    #[test]
    fn test_equivalence_ignores_build_number_and_order() {
        let recorded = TriggerCause::new(build("core", 3), [artifact("x"), artifact("y")]);
        let candidate = TriggerCause::new(build("core", 4), [artifact("y"), artifact("x")]);
        assert!(candidate.is_equivalent(&recorded));
    }

    #[test]
    fn test_equivalence_requires_same_upstream_pipeline() {
        let recorded = TriggerCause::new(build("core", 3), [artifact("x")]);
        let candidate = TriggerCause::new(build("api", 3), [artifact("x")]);
        assert!(!candidate.is_equivalent(&recorded));
    }

    #[test]
    fn test_equivalence_requires_equal_sets() {
        let recorded = TriggerCause::new(build("core", 3), [artifact("x")]);
        let candidate = TriggerCause::new(build("core", 4), [artifact("x"), artifact("y")]);
        assert!(!candidate.is_equivalent(&recorded));
    }

    #[test]
    fn test_covered_by_skips_other_causes() {
        let recorded = TriggerCause::new(build("core", 1), [artifact("x")]);
        let existing = vec![
            BuildCause::Manual {
                user: Some("alice".to_string()),
            },
            BuildCause::Other {
                description: "Started by an SCM change".to_string(),
            },
            BuildCause::from(recorded.clone()),
        ];

        let candidate = TriggerCause::new(build("core", 2), [artifact("x")]);
        assert_eq!(candidate.covered_by(&existing), Some(&recorded));

        let unrelated = TriggerCause::new(build("core", 2), [artifact("z")]);
        assert!(unrelated.covered_by(&existing).is_none());
    }
}
