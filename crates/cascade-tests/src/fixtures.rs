//! Test fixtures for describing pipelines and their builds.

use cascade_core::{ArtifactCoordinate, BuildCause, PipelineRef, Principal};
use std::collections::BTreeSet;

/// A recorded build of a fixture pipeline.
#[derive(Debug, Clone)]
pub struct BuildFixture {
    pub number: u32,
    pub completed: bool,
    pub generated: Vec<ArtifactCoordinate>,
    pub causes: Vec<BuildCause>,
}

/// Factory for describing a pipeline in a [`crate::TestHost`].
///
/// Pipelines are buildable, have the dependency trigger configured, run as
/// the system principal and are visible to everyone unless told otherwise.
#[derive(Debug, Clone)]
pub struct PipelineFixture {
    pub name: PipelineRef,
    pub dependencies: BTreeSet<ArtifactCoordinate>,
    pub builds: Vec<BuildFixture>,
    pub disabled: bool,
    pub held_until_save: bool,
    pub dependency_trigger: bool,
    pub building: bool,
    pub queued: bool,
    pub principal: Principal,
    pub hidden_from: BTreeSet<Principal>,
}

impl PipelineFixture {
    pub fn new(name: &str) -> Self {
        Self {
            name: PipelineRef::new(name),
            dependencies: BTreeSet::new(),
            builds: Vec::new(),
            disabled: false,
            held_until_save: false,
            dependency_trigger: true,
            building: false,
            queued: false,
            principal: Principal::system(),
            hidden_from: BTreeSet::new(),
        }
    }

    /// Declare a dependency on a module. Only group and artifact id are
    /// matched against generated artifacts.
    pub fn depends_on(mut self, artifact: ArtifactCoordinate) -> Self {
        self.dependencies.insert(artifact);
        self
    }

    /// Add a completed build generating the given artifacts.
    pub fn build(
        mut self,
        number: u32,
        generated: impl IntoIterator<Item = ArtifactCoordinate>,
    ) -> Self {
        self.builds.push(BuildFixture {
            number,
            completed: true,
            generated: generated.into_iter().collect(),
            causes: Vec::new(),
        });
        self
    }

    /// Add a build that has not completed yet. It becomes the last build but
    /// not the last completed one.
    pub fn running_build(mut self, number: u32) -> Self {
        self.builds.push(BuildFixture {
            number,
            completed: false,
            generated: Vec::new(),
            causes: Vec::new(),
        });
        self
    }

    /// Attach a cause to the most recently added build.
    pub fn with_cause(mut self, cause: impl Into<BuildCause>) -> Self {
        if let Some(last) = self.builds.last_mut() {
            last.causes.push(cause.into());
        }
        self
    }

    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    pub fn held_until_save(mut self) -> Self {
        self.held_until_save = true;
        self
    }

    pub fn without_dependency_trigger(mut self) -> Self {
        self.dependency_trigger = false;
        self
    }

    pub fn building(mut self) -> Self {
        self.building = true;
        self
    }

    pub fn queued(mut self) -> Self {
        self.queued = true;
        self
    }

    pub fn running_as(mut self, principal: &str) -> Self {
        self.principal = Principal::new(principal);
        self
    }

    pub fn hidden_from(mut self, principal: &str) -> Self {
        self.hidden_from.insert(Principal::new(principal));
        self
    }

    pub(crate) fn last_build(&self) -> Option<&BuildFixture> {
        self.builds.iter().max_by_key(|b| b.number)
    }

    pub(crate) fn last_completed_build(&self) -> Option<&BuildFixture> {
        self.builds
            .iter()
            .filter(|b| b.completed)
            .max_by_key(|b| b.number)
    }

    pub(crate) fn next_build_number(&self) -> u32 {
        self.last_build().map(|b| b.number + 1).unwrap_or(1)
    }

    pub(crate) fn depends_on_module(&self, artifact: &ArtifactCoordinate) -> bool {
        self.dependencies.iter().any(|d| d.same_module(artifact))
    }
}
