//! Cause deduplication against a downstream pipeline's last build.
//!
//! If the last build of a selected pipeline was already caused by the same
//! upstream pipeline with the same artifact set, it is not triggered again.
//! The new cause is recorded on that build so its history shows the later
//! upstream build as well.

use cascade_core::ports::CauseLedger;
use cascade_core::{BuildRef, PipelineInfo, TriggerCause};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Coverage {
    /// `build` carries `existing`, equivalent to the new cause.
    Covered {
        build: BuildRef,
        existing: TriggerCause,
    },
    NotCovered,
}

pub struct CauseDeduplicator<'a> {
    ledger: &'a dyn CauseLedger,
}

impl<'a> CauseDeduplicator<'a> {
    pub fn new(ledger: &'a dyn CauseLedger) -> Self {
        Self { ledger }
    }

    /// Whether `downstream`'s last build already covers `cause`. When it
    /// does, `cause` is recorded on that build. A failed read counts as not
    /// covered; a failed write is logged and the build still counts as
    /// covered.
    pub async fn check(&self, downstream: &PipelineInfo, cause: &TriggerCause) -> Coverage {
        let Some(build) = downstream.last_build_ref() else {
            return Coverage::NotCovered;
        };

        let existing = match self.ledger.existing_causes(&build).await {
            Ok(causes) => causes,
            Err(e) => {
                warn!(build = %build, error = %e, "Cannot read causes of last build, triggering anyway");
                return Coverage::NotCovered;
            }
        };
        let Some(existing) = cause.covered_by(&existing).cloned() else {
            return Coverage::NotCovered;
        };

        debug!(
            build = %build,
            existing_upstream = %existing.upstream,
            "Last build already caused by the same artifacts"
        );
        if let Err(e) = self.ledger.record_cause(&build, cause).await {
            warn!(build = %build, error = %e, "Failed to record cause on existing build");
        }

        Coverage::Covered { build, existing }
    }
}
