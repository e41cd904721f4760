//! Build session: the one open build and the upload state shared by
//! setup, snapshots and finalize.
//!
//! A [`BuildSession`] owns exactly one remote build. `setup` hashes the
//! assets synchronously and then opens the build in a background task;
//! `snapshot` and `finalize_build` may be called right away and wait for
//! the build to be ready on their own.

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::{FutureExt, Shared};
use tokio::sync::{oneshot, watch};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::error::BuildError;
use crate::gateway::BuildGateway;
use crate::manifest::{ResourceManifest, build_manifest};
use crate::pool::WorkerPool;
use crate::types::{BreakpointRegistry, BuildInfo, ResourceDescriptor, SetupOptions};

/// Maximum number of build resources uploaded at once.
pub const BUILD_UPLOAD_CONCURRENCY: NonZeroUsize = NonZeroUsize::new(2).unwrap();

/// Completion of one build-resource upload; cloneable so every snapshot
/// can wait on it.
pub(crate) type PendingUpload = Shared<oneshot::Receiver<()>>;

/// Lifecycle of the remote build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPhase {
    Created,
    Finalizing,
    Finalized,
}

#[derive(Debug, Clone)]
enum Readiness {
    Pending,
    Ready(BuildInfo),
    Failed(BuildError),
}

/// Handle to the single build of a run.
///
/// Not `Clone`: [`finalize_build`](BuildSession::finalize_build) consumes
/// the session, so a build can be finalized once and never receives
/// snapshots afterwards.
pub struct BuildSession {
    shared: Option<Arc<SessionShared>>,
}

impl BuildSession {
    /// Hashes the assets and starts opening the build.
    ///
    /// Manifest errors are returned here. Remote failures surface through
    /// [`ready`](Self::ready) and [`finalize_build`](Self::finalize_build).
    /// Must be called within a tokio runtime.
    pub fn setup(
        gateway: Arc<dyn BuildGateway>,
        options: SetupOptions,
    ) -> Result<Self, BuildError> {
        let manifest = build_manifest(&options.asset_dirs, &options.strip_prefixes)?;

        if options.debug {
            for resource in manifest.iter() {
                info!(
                    url = %resource.url,
                    hash = %resource.content_hash,
                    "manifest entry"
                );
            }
        }
        debug!(resources = manifest.len(), "resource manifest built");

        let shared = Arc::new(SessionShared::new(
            gateway,
            options.breakpoints,
            options.debug,
        ));
        tokio::spawn(open_build(shared.clone(), manifest));

        Ok(Self {
            shared: Some(shared),
        })
    }

    /// A session that sends nothing: snapshots are ignored and finalize
    /// returns [`BuildOutcome::Skipped`](crate::BuildOutcome::Skipped).
    pub fn disabled() -> Self {
        Self { shared: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.is_some()
    }

    /// Waits until the build is open, or returns the error that stopped it.
    pub async fn ready(&self) -> Result<BuildInfo, BuildError> {
        match &self.shared {
            Some(shared) => shared.wait_ready().await,
            None => Err(BuildError::Disabled),
        }
    }

    /// Current phase, `None` until the build is created.
    pub fn phase(&self) -> Option<BuildPhase> {
        self.shared.as_ref().and_then(|s| s.phase())
    }

    pub(crate) fn shared(&self) -> Option<&Arc<SessionShared>> {
        self.shared.as_ref()
    }

    pub(crate) fn into_shared(self) -> Option<Arc<SessionShared>> {
        self.shared
    }
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

pub(crate) struct SessionShared {
    pub(crate) gateway: Arc<dyn BuildGateway>,
    pub(crate) breakpoints: BreakpointRegistry,
    pub(crate) debug: bool,
    /// Snapshot tasks; closed and drained by finalize.
    pub(crate) snapshot_tasks: TaskTracker,
    readiness: watch::Sender<Readiness>,
    build: Mutex<Option<(BuildInfo, BuildPhase)>>,
    resource_uploads: Mutex<Vec<PendingUpload>>,
    snapshot_uploads: Mutex<BTreeMap<u64, oneshot::Receiver<()>>>,
    next_ticket: AtomicU64,
    fatal: Mutex<Option<BuildError>>,
    /// Cancelled by the first fatal error.
    halted: CancellationToken,
}

impl SessionShared {
    fn new(gateway: Arc<dyn BuildGateway>, breakpoints: BreakpointRegistry, debug: bool) -> Self {
        let (readiness, _) = watch::channel(Readiness::Pending);
        Self {
            gateway,
            breakpoints,
            debug,
            snapshot_tasks: TaskTracker::new(),
            readiness,
            build: Mutex::new(None),
            resource_uploads: Mutex::new(Vec::new()),
            snapshot_uploads: Mutex::new(BTreeMap::new()),
            next_ticket: AtomicU64::new(0),
            fatal: Mutex::new(None),
            halted: CancellationToken::new(),
        }
    }

    pub(crate) async fn wait_ready(&self) -> Result<BuildInfo, BuildError> {
        let mut rx = self.readiness.subscribe();
        let state = rx
            .wait_for(|r| !matches!(r, Readiness::Pending))
            .await
            .map_err(|_| BuildError::SetupAborted)?
            .clone();

        match state {
            Readiness::Ready(info) => Ok(info),
            Readiness::Failed(err) => Err(err),
            Readiness::Pending => Err(BuildError::SetupAborted),
        }
    }

    fn publish_ready(&self, info: BuildInfo) {
        *lock(&self.build) = Some((info.clone(), BuildPhase::Created));
        self.readiness.send_replace(Readiness::Ready(info));
    }

    pub(crate) fn phase(&self) -> Option<BuildPhase> {
        lock(&self.build).as_ref().map(|(_, phase)| *phase)
    }

    pub(crate) fn set_phase(&self, phase: BuildPhase) {
        if let Some((_, current)) = lock(&self.build).as_mut() {
            *current = phase;
        }
    }

    /// The single fatal-failure path: records the first error and halts
    /// every task that has not yet issued its remote call.
    pub(crate) fn fail(&self, err: BuildError) {
        error!(error = %err, phase = ?self.phase(), "fatal build error, halting uploads");
        self.halted.cancel();

        {
            let mut slot = lock(&self.fatal);
            if slot.is_none() {
                *slot = Some(err.clone());
            }
        }

        self.readiness.send_if_modified(|state| match state {
            Readiness::Pending => {
                *state = Readiness::Failed(err);
                true
            }
            _ => false,
        });
    }

    pub(crate) fn is_halted(&self) -> bool {
        self.halted.is_cancelled()
    }

    pub(crate) fn fatal_error(&self) -> Option<BuildError> {
        lock(&self.fatal).clone()
    }

    /// Registers a build-resource upload; settle it through the sender.
    fn track_resource_upload(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        lock(&self.resource_uploads).push(rx.shared());
        tx
    }

    /// Build-resource uploads known right now.
    pub(crate) fn pending_resource_uploads(&self) -> Vec<PendingUpload> {
        lock(&self.resource_uploads).clone()
    }

    /// Registers a snapshot's readiness. Must run synchronously inside
    /// `snapshot()` so finalize cannot miss it.
    pub(crate) fn register_snapshot(&self) -> (u64, oneshot::Sender<()>) {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        lock(&self.snapshot_uploads).insert(ticket, rx);
        (ticket, tx)
    }

    /// Takes every snapshot readiness registered so far.
    pub(crate) fn take_pending_snapshots(&self) -> Vec<oneshot::Receiver<()>> {
        std::mem::take(&mut *lock(&self.snapshot_uploads))
            .into_values()
            .collect()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fails readiness if the setup task ends without publishing it.
struct SetupGuard(Arc<SessionShared>);

impl Drop for SetupGuard {
    fn drop(&mut self) {
        self.0.readiness.send_if_modified(|state| match state {
            Readiness::Pending => {
                *state = Readiness::Failed(BuildError::SetupAborted);
                true
            }
            _ => false,
        });
    }
}

// ---------------------------------------------------------------------------
// Setup task
// ---------------------------------------------------------------------------

/// Creates the build and uploads the resources the service is missing.
async fn open_build(shared: Arc<SessionShared>, manifest: ResourceManifest) {
    let _guard = SetupGuard(shared.clone());

    let refs = manifest.resource_refs();
    let created = match shared.gateway.create_build(&refs).await {
        Ok(created) => created,
        Err(e) => {
            shared.fail(BuildError::gateway("create build", e));
            return;
        }
    };

    info!(
        build_id = %created.build_id,
        resources = refs.len(),
        missing = created.missing.len(),
        "created build"
    );

    // Every missing resource is tracked before readiness is published, so
    // a snapshot always sees the full set it has to wait for.
    let mut jobs = Vec::with_capacity(created.missing.len());
    for hash in &created.missing {
        match manifest.get(hash) {
            Some(resource) => jobs.push((resource.clone(), shared.track_resource_upload())),
            None => warn!(hash = %hash, "service reported an unknown missing resource"),
        }
    }

    let build_id = created.build_id.clone();
    shared.publish_ready(BuildInfo {
        id: created.build_id,
        report_url: created.report_url,
    });

    if jobs.is_empty() {
        return;
    }

    let tasks = jobs.into_iter().map(|(resource, done)| {
        let shared = shared.clone();
        let build_id = build_id.clone();
        async move {
            upload_build_resource(&shared, &build_id, &resource).await;
            let _ = done.send(());
        }
    });

    let report = WorkerPool::new(BUILD_UPLOAD_CONCURRENCY).run(tasks).await;

    if shared.debug {
        info!(
            uploads = report.started,
            peak_in_flight = report.peak_in_flight,
            "build resource uploads settled"
        );
    }
}

async fn upload_build_resource(
    shared: &SessionShared,
    build_id: &str,
    resource: &ResourceDescriptor,
) {
    if shared.is_halted() {
        return;
    }

    let Some(path) = resource.local_path.as_deref() else {
        warn!(url = %resource.url, "build resource has no local file, skipping");
        return;
    };

    let content = match tokio::fs::read(path).await {
        Ok(content) => content,
        Err(e) => {
            shared.fail(BuildError::io(path, e));
            return;
        }
    };

    match shared
        .gateway
        .upload_resource(build_id, &resource.content_hash, content)
        .await
    {
        Ok(()) => info!(url = %resource.url, "uploaded build resource"),
        Err(e) => shared.fail(BuildError::gateway("upload resource", e)),
    }
}
