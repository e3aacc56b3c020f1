//! Test helper functions.

use cascade_core::{ArtifactCoordinate, BuildRef, PipelineRef};
use std::collections::BTreeSet;

pub fn artifact(group_id: &str, artifact_id: &str, version: &str) -> ArtifactCoordinate {
    ArtifactCoordinate::new(group_id, artifact_id, version)
}

pub fn pipeline(name: &str) -> PipelineRef {
    PipelineRef::new(name)
}

pub fn build_ref(name: &str, number: u32) -> BuildRef {
    BuildRef::new(name, number).expect("build numbers start at 1")
}

pub fn pipelines(names: &[&str]) -> BTreeSet<PipelineRef> {
    names.iter().map(|n| PipelineRef::new(*n)).collect()
}
