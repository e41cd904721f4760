//! Snapshot coordination.
//!
//! Each snapshot registers its readiness synchronously, then a spawned
//! task creates it remotely, uploads its root HTML when the service asks
//! for it, and finalizes it once the build resources it may reference
//! have been uploaded.

use std::sync::Arc;

use futures_util::future::join_all;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::error::BuildError;
use crate::session::{BuildSession, SessionShared};
use crate::types::{ResourceDescriptor, SnapshotAttributes, SnapshotRequest};

impl BuildSession {
    /// Queues a snapshot. Returns immediately; progress is tracked by the
    /// session and awaited by [`finalize_build`](Self::finalize_build).
    pub fn snapshot(&self, request: SnapshotRequest) {
        let Some(shared) = self.shared() else {
            debug!(name = %request.name, "vizdiff disabled, skipping snapshot");
            return;
        };

        if shared.is_halted() {
            warn!(name = %request.name, "build halted after a fatal error, skipping snapshot");
            return;
        }

        let widths = shared.breakpoints.resolve(request.breakpoints.as_deref());
        let (ticket, ready) = shared.register_snapshot();

        let job = SnapshotJob {
            ticket,
            attributes: SnapshotAttributes {
                name: request.name,
                widths,
                enable_javascript: request.enable_javascript,
            },
            html: request.html,
        };
        shared
            .snapshot_tasks
            .spawn(capture_snapshot(shared.clone(), job, ready));
    }
}

struct SnapshotJob {
    ticket: u64,
    attributes: SnapshotAttributes,
    html: String,
}

/// Runs one snapshot. Dropping `ready` on any early return also settles it.
async fn capture_snapshot(
    shared: Arc<SessionShared>,
    job: SnapshotJob,
    ready: oneshot::Sender<()>,
) {
    let name = job.attributes.name.as_str();

    let Ok(build) = shared.wait_ready().await else {
        return;
    };
    if shared.is_halted() {
        return;
    }

    let root = ResourceDescriptor::root_html(&job.html);
    let created = match shared
        .gateway
        .create_snapshot(&build.id, &root.to_ref(), &job.attributes)
        .await
    {
        Ok(created) => created,
        Err(e) if e.is_client_error() => {
            warn!(name = %name, error = %e, "snapshot rejected by the service, skipping");
            let _ = ready.send(());
            return;
        }
        Err(e) => {
            shared.fail(BuildError::gateway("create snapshot", e));
            return;
        }
    };

    // Build resources the service may need before it can render this snapshot.
    let resource_uploads = shared.pending_resource_uploads();

    if created.missing.contains(&root.content_hash) {
        let content = root.content.clone().unwrap_or_default();
        if let Err(e) = shared
            .gateway
            .upload_resource(&build.id, &root.content_hash, content)
            .await
        {
            shared.fail(BuildError::gateway("upload resource", e));
            return;
        }
        debug!(name = %name, ticket = job.ticket, "uploaded snapshot root resource");
    }

    let _ = ready.send(());

    join_all(resource_uploads).await;
    if shared.is_halted() {
        return;
    }

    match shared.gateway.finalize_snapshot(&created.snapshot_id).await {
        Ok(()) => {
            if shared.debug {
                info!(
                    name = %name,
                    snapshot_id = %created.snapshot_id,
                    widths = ?job.attributes.widths,
                    "finalized snapshot"
                );
            }
        }
        Err(e) => shared.fail(BuildError::gateway("finalize snapshot", e)),
    }
}
