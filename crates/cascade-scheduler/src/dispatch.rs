//! Hands selected pipelines to the host build queue.

use crate::report::DispatchStatus;
use cascade_core::ports::{DispatchOutcome, Dispatcher};
use cascade_core::{PipelineInfo, TriggerCause};
use tracing::{info, warn};

pub struct TriggerDispatcher<'a> {
    dispatcher: &'a dyn Dispatcher,
}

impl<'a> TriggerDispatcher<'a> {
    pub fn new(dispatcher: &'a dyn Dispatcher) -> Self {
        Self { dispatcher }
    }

    /// Enqueue one build of `downstream` carrying `cause`. A failing queue is
    /// reported as a rejection; it never aborts the remaining dispatches.
    pub async fn dispatch(&self, downstream: &PipelineInfo, cause: &TriggerCause) -> DispatchStatus {
        match self.dispatcher.enqueue(&downstream.pipeline, cause).await {
            Ok(DispatchOutcome::Accepted { build_number_hint }) => {
                info!(
                    downstream = %downstream.pipeline,
                    build = build_number_hint,
                    upstream = %cause.upstream,
                    artifacts = %cause.artifacts_description(),
                    "Triggering downstream pipeline"
                );
                DispatchStatus::Triggered { build_number_hint }
            }
            Ok(DispatchOutcome::Rejected { reason }) => {
                warn!(
                    downstream = %downstream.pipeline,
                    upstream = %cause.upstream,
                    reason = %reason,
                    "Build queue rejected downstream pipeline"
                );
                DispatchStatus::Rejected { reason }
            }
            Err(e) => {
                warn!(
                    downstream = %downstream.pipeline,
                    upstream = %cause.upstream,
                    error = %e,
                    "Failed to enqueue downstream pipeline"
                );
                DispatchStatus::Rejected {
                    reason: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cascade_core::{PipelineRef, Principal};
    use cascade_core::ports::PipelineDirectory;
    use cascade_tests::{PipelineFixture, TestHost, artifact, build_ref, pipeline};
    use pretty_assertions::assert_eq;

    fn cause() -> TriggerCause {
        TriggerCause::new(build_ref("lib", 3), [artifact("g", "lib", "1.0")])
    }

    #[tokio::test]
    async fn test_accepted_returns_hint() {
        let host = TestHost::builder()
            .pipeline(PipelineFixture::new("app").build(4, []))
            .build();
        let info = host
            .resolve(&Principal::system(), &pipeline("app"))
            .await
            .unwrap()
            .unwrap();

        let status = TriggerDispatcher::new(&host).dispatch(&info, &cause()).await;
        assert_eq!(status, DispatchStatus::Triggered { build_number_hint: 5 });
        assert_eq!(host.dispatched_pipelines().await, vec!["app"]);
    }

    #[tokio::test]
    async fn test_rejection_reported() {
        let host = TestHost::builder()
            .pipeline(PipelineFixture::new("app").build(4, []))
            .rejecting("app")
            .build();
        let info = host
            .resolve(&Principal::system(), &pipeline("app"))
            .await
            .unwrap()
            .unwrap();

        let status = TriggerDispatcher::new(&host).dispatch(&info, &cause()).await;
        assert!(matches!(status, DispatchStatus::Rejected { .. }));
        assert!(host.dispatched().await.is_empty());
    }

    #[tokio::test]
    async fn test_queue_error_is_rejection() {
        let host = TestHost::builder().build();
        let info = PipelineInfo {
            pipeline: PipelineRef::new("gone"),
            last_build: None,
            last_completed_build: None,
            next_build_number: 1,
        };

        let status = TriggerDispatcher::new(&host).dispatch(&info, &cause()).await;
        assert_eq!(
            status,
            DispatchStatus::Rejected {
                reason: "Pipeline not found: gone".to_string()
            }
        );
    }
}
