//! Accumulates the pipelines selected for triggering during one evaluation.

use cascade_core::{ArtifactCoordinate, PipelineRef, TriggerDecision};
use std::collections::{BTreeMap, BTreeSet};

/// Downstream pipeline → artifacts that caused it. Each pipeline appears at
/// most once; artifacts from later matches are merged into its entry.
#[derive(Debug, Default)]
pub struct TriggerAccumulator {
    jobs: BTreeMap<PipelineRef, BTreeSet<ArtifactCoordinate>>,
}

impl TriggerAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, pipeline: &PipelineRef) -> bool {
        self.jobs.contains_key(pipeline)
    }

    /// Record `artifact` as a cause of `pipeline`. Returns `false` when it
    /// was already recorded.
    pub fn record(&mut self, pipeline: PipelineRef, artifact: ArtifactCoordinate) -> bool {
        self.jobs.entry(pipeline).or_default().insert(artifact)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Decisions ordered by pipeline name.
    pub fn into_decisions(self) -> Vec<TriggerDecision> {
        self.jobs
            .into_iter()
            .map(|(downstream, artifacts)| TriggerDecision {
                downstream,
                artifacts,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cascade_tests::{artifact, pipeline};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_merges_artifacts_per_pipeline() {
        let mut acc = TriggerAccumulator::new();
        assert!(acc.record(pipeline("app"), artifact("g", "b", "1.0")));
        assert!(acc.record(pipeline("app"), artifact("g", "a", "1.0")));
        assert!(acc.record(pipeline("svc"), artifact("g", "a", "1.0")));
        assert_eq!(acc.len(), 2);

        let decisions = acc.into_decisions();
        assert_eq!(decisions[0].downstream, pipeline("app"));
        assert_eq!(decisions[0].artifacts_description(), "g:a:1.0, g:b:1.0");
        assert_eq!(decisions[1].downstream, pipeline("svc"));
    }

    #[test]
    fn test_duplicate_artifact_reported() {
        let mut acc = TriggerAccumulator::new();
        assert!(acc.record(pipeline("app"), artifact("g", "a", "1.0")));
        assert!(!acc.record(pipeline("app"), artifact("g", "a", "1.0").with_type("pom")));
        assert!(acc.contains(&pipeline("app")));
        assert!(!acc.contains(&pipeline("svc")));
    }
}
