//! Test doubles shared by the module tests.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::Semaphore;
use vizdiff_protocol::{BuildState, ResourceRef};

use crate::error::GatewayError;
use crate::gateway::{BuildGateway, GatewayFuture};
use crate::types::{
    BuildCreated, BuildStatus, SetupOptions, SnapshotAttributes, SnapshotCreated,
};

pub(crate) const REPORT_URL: &str = "https://vizdiff.test/builds/1";

/// A gateway call, in the order it completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    CreateBuild,
    CreateSnapshot {
        name: String,
        widths: Vec<u32>,
        enable_javascript: bool,
        root: ResourceRef,
    },
    Upload(String),
    FinalizeSnapshot(String),
    FinalizeBuild(String),
    Status,
}

/// Scripted answer to one create-snapshot call.
pub(crate) enum SnapshotReply {
    MissingRoot,
    Error(GatewayError),
}

/// Mock gateway that records every call.
pub(crate) struct MockGateway {
    calls: Mutex<Vec<Call>>,
    created_resources: Mutex<Vec<ResourceRef>>,
    missing: Vec<String>,
    create_build_error: Option<GatewayError>,
    create_build_delay: Duration,
    snapshot_replies: Mutex<VecDeque<SnapshotReply>>,
    snapshots_created: AtomicUsize,
    upload_error: Option<GatewayError>,
    upload_delay: Duration,
    upload_gate: Mutex<Option<Arc<Semaphore>>>,
    uploads_in_flight: AtomicUsize,
    peak_uploads: AtomicUsize,
    finalize_snapshot_error: Option<GatewayError>,
    finalize_build_error: Option<GatewayError>,
    statuses: Mutex<VecDeque<BuildStatus>>,
}

impl MockGateway {
    pub(crate) fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            created_resources: Mutex::new(Vec::new()),
            missing: Vec::new(),
            create_build_error: None,
            create_build_delay: Duration::ZERO,
            snapshot_replies: Mutex::new(VecDeque::new()),
            snapshots_created: AtomicUsize::new(0),
            upload_error: None,
            upload_delay: Duration::ZERO,
            upload_gate: Mutex::new(None),
            uploads_in_flight: AtomicUsize::new(0),
            peak_uploads: AtomicUsize::new(0),
            finalize_snapshot_error: None,
            finalize_build_error: None,
            statuses: Mutex::new(VecDeque::from([status(BuildState::Finished, Some(0))])),
        }
    }

    pub(crate) fn with_missing(mut self, missing: Vec<String>) -> Self {
        self.missing = missing;
        self
    }

    pub(crate) fn with_create_build_error(mut self, err: GatewayError) -> Self {
        self.create_build_error = Some(err);
        self
    }

    pub(crate) fn with_create_build_delay(mut self, delay: Duration) -> Self {
        self.create_build_delay = delay;
        self
    }

    pub(crate) fn with_upload_error(mut self, err: GatewayError) -> Self {
        self.upload_error = Some(err);
        self
    }

    pub(crate) fn with_upload_delay(mut self, delay: Duration) -> Self {
        self.upload_delay = delay;
        self
    }

    pub(crate) fn with_finalize_snapshot_error(mut self, err: GatewayError) -> Self {
        self.finalize_snapshot_error = Some(err);
        self
    }

    pub(crate) fn with_finalize_build_error(mut self, err: GatewayError) -> Self {
        self.finalize_build_error = Some(err);
        self
    }

    /// Status responses in order; the last one repeats.
    pub(crate) fn with_statuses(self, statuses: Vec<BuildStatus>) -> Self {
        *self.statuses.lock().unwrap() = statuses.into();
        self
    }

    pub(crate) fn push_snapshot_reply(&self, reply: SnapshotReply) {
        self.snapshot_replies.lock().unwrap().push_back(reply);
    }

    /// Blocks build-resource uploads until permits are added to the
    /// returned semaphore, one per upload.
    pub(crate) fn hold_uploads(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.upload_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn created_build_resources(&self) -> Vec<ResourceRef> {
        self.created_resources.lock().unwrap().clone()
    }

    pub(crate) fn uploaded_hashes(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Upload(hash) => Some(hash),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn upload_count(&self) -> usize {
        self.uploaded_hashes().len()
    }

    pub(crate) fn peak_uploads_in_flight(&self) -> usize {
        self.peak_uploads.load(Ordering::SeqCst)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl BuildGateway for MockGateway {
    fn create_build<'a>(&'a self, resources: &'a [ResourceRef]) -> GatewayFuture<'a, BuildCreated> {
        Box::pin(async move {
            if !self.create_build_delay.is_zero() {
                tokio::time::sleep(self.create_build_delay).await;
            }
            self.record(Call::CreateBuild);
            *self.created_resources.lock().unwrap() = resources.to_vec();
            if let Some(err) = &self.create_build_error {
                return Err(err.clone());
            }
            Ok(BuildCreated {
                build_id: "build-1".into(),
                report_url: REPORT_URL.into(),
                missing: self.missing.clone(),
            })
        })
    }

    fn create_snapshot<'a>(
        &'a self,
        _build_id: &'a str,
        root: &'a ResourceRef,
        attributes: &'a SnapshotAttributes,
    ) -> GatewayFuture<'a, SnapshotCreated> {
        Box::pin(async move {
            self.record(Call::CreateSnapshot {
                name: attributes.name.clone(),
                widths: attributes.widths.clone(),
                enable_javascript: attributes.enable_javascript,
                root: root.clone(),
            });
            let reply = self.snapshot_replies.lock().unwrap().pop_front();
            let missing = match reply {
                Some(SnapshotReply::Error(err)) => return Err(err),
                Some(SnapshotReply::MissingRoot) => vec![root.id.clone()],
                None => Vec::new(),
            };
            let n = self.snapshots_created.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(SnapshotCreated {
                snapshot_id: format!("snapshot-{n}"),
                missing,
            })
        })
    }

    fn upload_resource<'a>(
        &'a self,
        _build_id: &'a str,
        content_hash: &'a str,
        _content: Vec<u8>,
    ) -> GatewayFuture<'a, ()> {
        Box::pin(async move {
            let now = self.uploads_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_uploads.fetch_max(now, Ordering::SeqCst);

            let gate = self.upload_gate.lock().unwrap().clone();
            if let Some(gate) = gate
                && let Ok(permit) = gate.acquire().await
            {
                permit.forget();
            }
            if !self.upload_delay.is_zero() {
                tokio::time::sleep(self.upload_delay).await;
            }

            self.uploads_in_flight.fetch_sub(1, Ordering::SeqCst);
            if let Some(err) = &self.upload_error {
                return Err(err.clone());
            }
            self.record(Call::Upload(content_hash.to_string()));
            Ok(())
        })
    }

    fn finalize_snapshot<'a>(&'a self, snapshot_id: &'a str) -> GatewayFuture<'a, ()> {
        Box::pin(async move {
            if let Some(err) = &self.finalize_snapshot_error {
                return Err(err.clone());
            }
            self.record(Call::FinalizeSnapshot(snapshot_id.to_string()));
            Ok(())
        })
    }

    fn finalize_build<'a>(&'a self, build_id: &'a str) -> GatewayFuture<'a, ()> {
        Box::pin(async move {
            if let Some(err) = &self.finalize_build_error {
                return Err(err.clone());
            }
            self.record(Call::FinalizeBuild(build_id.to_string()));
            Ok(())
        })
    }

    fn get_build_status<'a>(&'a self, _build_id: &'a str) -> GatewayFuture<'a, BuildStatus> {
        Box::pin(async move {
            self.record(Call::Status);
            let mut statuses = self.statuses.lock().unwrap();
            let next = if statuses.len() > 1 {
                statuses.pop_front()
            } else {
                statuses.front().cloned()
            };
            next.ok_or_else(|| GatewayError::Transport("no mock status available".into()))
        })
    }
}

pub(crate) fn status(state: BuildState, diff_count: Option<u64>) -> BuildStatus {
    BuildStatus {
        state,
        diff_count,
        failure_reason: None,
        report_url: REPORT_URL.into(),
    }
}

/// Creates a temp dir holding `files` (name, content).
pub(crate) fn asset_dir(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (name, content) in files {
        std::fs::write(dir.path().join(name), content).unwrap();
    }
    dir
}

/// Setup options scanning `dir` with URLs relative to it.
pub(crate) fn options_for(dir: &TempDir) -> SetupOptions {
    SetupOptions {
        asset_dirs: vec![dir.path().to_path_buf()],
        strip_prefixes: vec![dir.path().to_string_lossy().replace('\\', "/")],
        ..SetupOptions::default()
    }
}

/// Collects formatted log output for assertions.
#[derive(Clone, Default)]
pub(crate) struct LogCapture {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Installs a subscriber writing into this capture for the current thread.
    pub(crate) fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub(crate) fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buf.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.lock().unwrap().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
