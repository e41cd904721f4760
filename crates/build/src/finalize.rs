//! Build finalization and result polling.

use std::future::Future;
use std::time::Duration;

use futures_util::future::join_all;
use tracing::{debug, error, info};
use vizdiff_protocol::BuildState;

use crate::error::{BuildError, GatewayError};
use crate::session::{BuildPhase, BuildSession};
use crate::types::{BuildOutcome, BuildStatus};

/// Pause between two status polls.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Polls allowed while the service is still processing.
pub const MAX_POLL_RETRIES: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_retries: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: POLL_INTERVAL,
            max_retries: MAX_POLL_RETRIES,
        }
    }
}

/// States of the result poll.
///
/// `Waiting` loops on itself while the service is pending or processing;
/// the other three are terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
    Waiting { retries: u32 },
    Finished { diff_count: u64, report_url: String },
    Failed { reason: String },
    RetriesExceeded { retries: u32 },
}

impl PollState {
    /// Applies one status response to a `Waiting` state.
    pub fn advance(retries: u32, status: BuildStatus, max_retries: u32) -> PollState {
        if status.state.is_in_progress() {
            let retries = retries + 1;
            return if retries >= max_retries {
                PollState::RetriesExceeded { retries }
            } else {
                PollState::Waiting { retries }
            };
        }

        match status.state {
            BuildState::Failed => PollState::Failed {
                reason: status.failure_reason.unwrap_or_else(|| "unknown".into()),
            },
            _ => PollState::Finished {
                diff_count: status.diff_count.unwrap_or(0),
                report_url: status.report_url,
            },
        }
    }
}

/// Polls `check` until the build leaves the pending/processing states.
///
/// Sleeps `policy.interval` between polls on the tokio clock, so a paused
/// test runtime drives the loop without real delay.
pub async fn poll_build_status<F, Fut>(
    mut check: F,
    policy: PollPolicy,
) -> Result<BuildOutcome, BuildError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<BuildStatus, GatewayError>>,
{
    let mut state = PollState::Waiting { retries: 0 };

    loop {
        state = match state {
            PollState::Waiting { retries } => {
                if retries > 0 {
                    tokio::time::sleep(policy.interval).await;
                }
                let status = check()
                    .await
                    .map_err(|e| BuildError::gateway("get build status", e))?;
                debug!(state = ?status.state, retries, "polled build status");
                PollState::advance(retries, status, policy.max_retries)
            }
            PollState::Finished {
                diff_count: 0,
                report_url,
            } => {
                info!(url = %report_url, "build finished, no visual differences");
                return Ok(BuildOutcome::NoDiffs);
            }
            PollState::Finished {
                diff_count,
                report_url,
            } => {
                error!(
                    diffs = diff_count,
                    url = %report_url,
                    "visual differences found"
                );
                return Ok(BuildOutcome::DiffsFound {
                    count: diff_count,
                    report_url,
                });
            }
            PollState::Failed { reason } => {
                error!(reason = %reason, "build failed on the service");
                return Ok(BuildOutcome::Failed { reason });
            }
            PollState::RetriesExceeded { retries } => {
                error!(retries, "build status retries exceeded");
                return Err(BuildError::RetriesExceeded { retries });
            }
        };
    }
}

impl BuildSession {
    /// Finalizes the build once every queued snapshot and build upload has
    /// settled, then optionally waits for the diff results.
    ///
    /// Must not race with [`snapshot`](Self::snapshot): it consumes the
    /// session, so snapshots queued before this call are the only ones.
    pub async fn finalize_build(self, report_results: bool) -> Result<BuildOutcome, BuildError> {
        let Some(shared) = self.into_shared() else {
            debug!("vizdiff disabled, nothing to finalize");
            return Ok(BuildOutcome::Skipped);
        };

        let build = shared.wait_ready().await?;

        join_all(shared.take_pending_snapshots()).await;
        shared.snapshot_tasks.close();
        shared.snapshot_tasks.wait().await;
        join_all(shared.pending_resource_uploads()).await;

        if let Some(err) = shared.fatal_error() {
            return Err(err);
        }

        shared.set_phase(BuildPhase::Finalizing);
        if let Err(e) = shared.gateway.finalize_build(&build.id).await {
            let err = BuildError::gateway("finalize build", e);
            shared.fail(err.clone());
            return Err(err);
        }
        shared.set_phase(BuildPhase::Finalized);

        // Let queued log output go first.
        tokio::task::yield_now().await;
        info!(url = %build.report_url, "finalized build");

        if !report_results {
            return Ok(BuildOutcome::NotRequested);
        }

        let gateway = shared.gateway.clone();
        poll_build_status(
            || {
                let gateway = gateway.clone();
                let build_id = build.id.clone();
                async move { gateway.get_build_status(&build_id).await }
            },
            PollPolicy::default(),
        )
        .await
    }
}
