//! In-memory host implementing every Cascade port.

use crate::fixtures::{BuildFixture, PipelineFixture};
use async_trait::async_trait;
use cascade_core::ports::{
    CauseLedger, DependencyGraph, DispatchOutcome, Dispatcher, PipelineDirectory,
};
use cascade_core::{
    ArtifactCoordinate, BuildCause, BuildRef, Error, PipelineInfo, PipelineRef, Principal, Result,
    TriggerCause,
};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tokio::sync::RwLock;
use tracing::debug;

/// A host whose pipelines, builds, dependency graph and queue all live in
/// memory. The dependency graph is derived from the fixtures: a pipeline is
/// downstream of a build when it depends on a module the build generated.
pub struct TestHost {
    state: RwLock<HostState>,
}

#[derive(Default)]
struct HostState {
    pipelines: BTreeMap<PipelineRef, PipelineFixture>,
    looping_chains: BTreeSet<BuildRef>,
    failing_persistence: bool,
    rejecting: BTreeSet<PipelineRef>,
    failing_graph: BTreeSet<PipelineRef>,
    failing_directory: BTreeSet<PipelineRef>,
    deleted_on_enqueue: BTreeMap<PipelineRef, PipelineRef>,
    dispatched: Vec<(PipelineRef, TriggerCause)>,
    recorded: Vec<(BuildRef, TriggerCause)>,
}

/// Builder for [`TestHost`].
#[derive(Default)]
pub struct TestHostBuilder {
    state: HostState,
}

impl TestHostBuilder {
    pub fn pipeline(mut self, pipeline: PipelineFixture) -> Self {
        self.state.pipelines.insert(pipeline.name.clone(), pipeline);
        self
    }

    /// Make `upstream_cause_chain` fail with `LoopDetected` for this build.
    pub fn looping_cause_chain(mut self, build: BuildRef) -> Self {
        self.state.looping_chains.insert(build);
        self
    }

    /// Make every `record_cause` call fail.
    pub fn failing_persistence(mut self) -> Self {
        self.state.failing_persistence = true;
        self
    }

    /// Refuse to enqueue builds of this pipeline.
    pub fn rejecting(mut self, name: &str) -> Self {
        self.state.rejecting.insert(PipelineRef::new(name));
        self
    }

    /// Make dependency graph queries about builds of this pipeline fail.
    pub fn failing_graph(mut self, name: &str) -> Self {
        self.state.failing_graph.insert(PipelineRef::new(name));
        self
    }

    /// Make every graph and directory query about this pipeline fail.
    pub fn failing_queries(mut self, name: &str) -> Self {
        self.state.failing_graph.insert(PipelineRef::new(name));
        self.state.failing_directory.insert(PipelineRef::new(name));
        self
    }

    /// Delete pipeline `deleted` as soon as a build of `enqueued` is queued.
    pub fn deleted_on_enqueue(mut self, enqueued: &str, deleted: &str) -> Self {
        self.state
            .deleted_on_enqueue
            .insert(PipelineRef::new(enqueued), PipelineRef::new(deleted));
        self
    }

    pub fn build(self) -> TestHost {
        TestHost {
            state: RwLock::new(self.state),
        }
    }
}

impl TestHost {
    pub fn builder() -> TestHostBuilder {
        TestHostBuilder::default()
    }

    /// Every accepted enqueue, in order.
    pub async fn dispatched(&self) -> Vec<(PipelineRef, TriggerCause)> {
        self.state.read().await.dispatched.clone()
    }

    /// Names of the pipelines accepted for enqueue, in order.
    pub async fn dispatched_pipelines(&self) -> Vec<String> {
        self.state
            .read()
            .await
            .dispatched
            .iter()
            .map(|(p, _)| p.to_string())
            .collect()
    }

    /// Every successful `record_cause`, in order.
    pub async fn recorded_causes(&self) -> Vec<(BuildRef, TriggerCause)> {
        self.state.read().await.recorded.clone()
    }

    pub async fn set_building(&self, name: &str, building: bool) {
        if let Some(p) = self.state.write().await.pipelines.get_mut(&PipelineRef::new(name)) {
            p.building = building;
        }
    }

    pub async fn set_queued(&self, name: &str, queued: bool) {
        if let Some(p) = self.state.write().await.pipelines.get_mut(&PipelineRef::new(name)) {
            p.queued = queued;
        }
    }
}

impl HostState {
    fn graph_query(&self, build: &BuildRef) -> Result<()> {
        if self.failing_graph.contains(build.pipeline()) {
            return Err(Error::Graph(format!("no dependency data for {}", build)));
        }
        Ok(())
    }

    fn directory_query(&self, pipeline: &PipelineRef) -> Result<()> {
        if self.failing_directory.contains(pipeline) {
            return Err(Error::Graph(format!("no directory entry for {}", pipeline)));
        }
        Ok(())
    }

    fn find_build(&self, build: &BuildRef) -> Option<&BuildFixture> {
        self.pipelines
            .get(build.pipeline())?
            .builds
            .iter()
            .find(|b| b.number == build.number())
    }

    fn generated(&self, build: &BuildRef) -> Vec<ArtifactCoordinate> {
        self.find_build(build)
            .map(|b| b.generated.clone())
            .unwrap_or_default()
    }

    fn downstream_by_artifact(
        &self,
        build: &BuildRef,
    ) -> BTreeMap<ArtifactCoordinate, BTreeSet<PipelineRef>> {
        let mut result = BTreeMap::new();
        for artifact in self.generated(build) {
            let dependents: BTreeSet<_> = self
                .pipelines
                .values()
                .filter(|p| p.depends_on_module(&artifact))
                .map(|p| p.name.clone())
                .collect();
            if !dependents.is_empty() {
                result.insert(artifact, dependents);
            }
        }
        result
    }

    fn direct_upstream(&self, pipeline: &PipelineRef) -> BTreeSet<PipelineRef> {
        let Some(fixture) = self.pipelines.get(pipeline) else {
            return BTreeSet::new();
        };
        self.pipelines
            .values()
            .filter(|candidate| &candidate.name != pipeline)
            .filter(|candidate| {
                candidate.last_completed_build().is_some_and(|b| {
                    b.generated.iter().any(|a| fixture.depends_on_module(a))
                })
            })
            .map(|candidate| candidate.name.clone())
            .collect()
    }

    fn transitive_upstream(&self, pipeline: &PipelineRef) -> BTreeMap<PipelineRef, u32> {
        let mut distances = BTreeMap::new();
        let mut pending = VecDeque::from([(pipeline.clone(), 0u32)]);
        while let Some((current, distance)) = pending.pop_front() {
            for upstream in self.direct_upstream(&current) {
                if &upstream == pipeline || distances.contains_key(&upstream) {
                    continue;
                }
                distances.insert(upstream.clone(), distance + 1);
                pending.push_back((upstream, distance + 1));
            }
        }
        distances
    }

    fn visible(&self, subject: &Principal, name: &PipelineRef) -> Option<&PipelineFixture> {
        self.pipelines
            .get(name)
            .filter(|p| !p.hidden_from.contains(subject))
    }
}

#[async_trait]
impl DependencyGraph for TestHost {
    async fn downstream_by_artifact(
        &self,
        build: &BuildRef,
    ) -> Result<BTreeMap<ArtifactCoordinate, BTreeSet<PipelineRef>>> {
        let state = self.state.read().await;
        state.graph_query(build)?;
        Ok(state.downstream_by_artifact(build))
    }

    async fn downstream_pipelines(&self, build: &BuildRef) -> Result<BTreeSet<PipelineRef>> {
        let state = self.state.read().await;
        state.graph_query(build)?;
        Ok(state
            .downstream_by_artifact(build)
            .into_values()
            .flatten()
            .collect())
    }

    async fn generated_artifacts(&self, build: &BuildRef) -> Result<Vec<ArtifactCoordinate>> {
        let state = self.state.read().await;
        state.graph_query(build)?;
        Ok(state.generated(build))
    }

    async fn transitive_upstream(&self, build: &BuildRef) -> Result<BTreeMap<PipelineRef, u32>> {
        let state = self.state.read().await;
        state.graph_query(build)?;
        Ok(state.transitive_upstream(build.pipeline()))
    }
}

#[async_trait]
impl PipelineDirectory for TestHost {
    async fn resolve(&self, principal: &Principal, name: &PipelineRef) -> Result<Option<PipelineInfo>> {
        let state = self.state.read().await;
        state.directory_query(name)?;
        Ok(state.visible(principal, name).map(|p| PipelineInfo {
            pipeline: p.name.clone(),
            last_build: p.last_build().map(|b| b.number),
            last_completed_build: p.last_completed_build().map(|b| b.number),
            next_build_number: p.next_build_number(),
        }))
    }

    async fn is_buildable(&self, pipeline: &PipelineRef) -> Result<bool> {
        let state = self.state.read().await;
        state.directory_query(pipeline)?;
        let p = state
            .pipelines
            .get(pipeline)
            .ok_or_else(|| Error::PipelineNotFound(pipeline.to_string()))?;
        Ok(!p.disabled && !p.held_until_save)
    }

    async fn is_building(&self, pipeline: &PipelineRef) -> Result<bool> {
        let state = self.state.read().await;
        state.directory_query(pipeline)?;
        Ok(state.pipelines.get(pipeline).is_some_and(|p| p.building))
    }

    async fn is_queued(&self, pipeline: &PipelineRef) -> Result<bool> {
        let state = self.state.read().await;
        state.directory_query(pipeline)?;
        Ok(state.pipelines.get(pipeline).is_some_and(|p| p.queued))
    }

    async fn has_dependency_trigger(&self, pipeline: &PipelineRef) -> Result<bool> {
        let state = self.state.read().await;
        state.directory_query(pipeline)?;
        Ok(state.pipelines.get(pipeline).is_some_and(|p| p.dependency_trigger))
    }

    async fn principal_of(&self, pipeline: &PipelineRef) -> Result<Principal> {
        let state = self.state.read().await;
        state.directory_query(pipeline)?;
        state
            .pipelines
            .get(pipeline)
            .map(|p| p.principal.clone())
            .ok_or_else(|| Error::PipelineNotFound(pipeline.to_string()))
    }

    async fn is_visible(&self, subject: &Principal, object: &PipelineRef) -> Result<bool> {
        let state = self.state.read().await;
        state.directory_query(object)?;
        Ok(state.visible(subject, object).is_some())
    }

    async fn upstream_cause_chain(&self, build: &BuildRef) -> Result<Vec<BuildRef>> {
        let state = self.state.read().await;
        state.directory_query(build.pipeline())?;
        if state.looping_chains.contains(build) {
            return Err(Error::LoopDetected(format!("{} is its own upstream", build)));
        }

        let mut chain = Vec::new();
        let mut visited = BTreeSet::from([build.clone()]);
        let mut pending = vec![build.clone()];
        while let Some(current) = pending.pop() {
            let Some(fixture) = state.find_build(&current) else {
                continue;
            };
            for cause in fixture.causes.iter().filter_map(BuildCause::as_dependency) {
                if !visited.insert(cause.upstream.clone()) {
                    continue;
                }
                chain.push(cause.upstream.clone());
                pending.push(cause.upstream.clone());
            }
        }
        Ok(chain)
    }
}

#[async_trait]
impl CauseLedger for TestHost {
    async fn existing_causes(&self, build: &BuildRef) -> Result<Vec<BuildCause>> {
        Ok(self
            .state
            .read()
            .await
            .find_build(build)
            .map(|b| b.causes.clone())
            .unwrap_or_default())
    }

    async fn record_cause(&self, build: &BuildRef, cause: &TriggerCause) -> Result<()> {
        let mut state = self.state.write().await;
        if state.failing_persistence {
            return Err(Error::Persistence {
                build: build.to_string(),
                message: "disk full".to_string(),
            });
        }
        let fixture = state
            .pipelines
            .get_mut(build.pipeline())
            .and_then(|p| p.builds.iter_mut().find(|b| b.number == build.number()))
            .ok_or_else(|| Error::Internal(format!("unknown build {}", build)))?;
        fixture.causes.push(BuildCause::from(cause.clone()));
        state.recorded.push((build.clone(), cause.clone()));
        Ok(())
    }
}

#[async_trait]
impl Dispatcher for TestHost {
    async fn enqueue(&self, pipeline: &PipelineRef, cause: &TriggerCause) -> Result<DispatchOutcome> {
        let mut state = self.state.write().await;
        if state.rejecting.contains(pipeline) {
            return Ok(DispatchOutcome::Rejected {
                reason: "queue refused the item".to_string(),
            });
        }
        let fixture = state
            .pipelines
            .get_mut(pipeline)
            .ok_or_else(|| Error::PipelineNotFound(pipeline.to_string()))?;
        let number = fixture.next_build_number();
        fixture.builds.push(BuildFixture {
            number,
            completed: false,
            generated: Vec::new(),
            causes: vec![BuildCause::from(cause.clone())],
        });
        fixture.queued = true;
        debug!(pipeline = %pipeline, number, "Queued test build");
        state.dispatched.push((pipeline.clone(), cause.clone()));
        if let Some(deleted) = state.deleted_on_enqueue.get(pipeline).cloned() {
            debug!(pipeline = %deleted, "Deleted test pipeline");
            state.pipelines.remove(&deleted);
        }
        Ok(DispatchOutcome::Accepted {
            build_number_hint: number,
        })
    }
}
