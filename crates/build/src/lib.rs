//! Build orchestration for vizdiff visual-regression runs.
//!
//! This crate implements the **business logic** of a build: it has no
//! HTTP dependency. The caller provides a [`BuildGateway`] implementation
//! that talks to the remote diffing service.
//!
//! # Lifecycle
//!
//! 1. **Manifest**: hash every asset file under the configured directories
//! 2. **Create build**: announce the manifest, receive the missing set
//! 3. **Upload**: push missing build resources, two at a time
//! 4. **Snapshot**: register HTML snapshots, upload their root resource
//! 5. **Finalize**: drain pending uploads, finalize, optionally poll results

pub mod error;
pub mod gateway;
pub mod manifest;
pub mod pool;
pub mod session;
pub mod types;

mod finalize;
mod snapshot;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{BuildError, GatewayError};
pub use finalize::{PollPolicy, PollState, poll_build_status};
pub use gateway::BuildGateway;
pub use manifest::{MAX_FILE_SIZE_BYTES, ResourceManifest, build_manifest};
pub use pool::{PoolReport, WorkerPool};
pub use session::{BUILD_UPLOAD_CONCURRENCY, BuildPhase, BuildSession};
pub use types::{
    BreakpointRegistry, BuildCreated, BuildInfo, BuildOutcome, BuildStatus, ResourceDescriptor,
    SetupOptions, SnapshotAttributes, SnapshotCreated, SnapshotRequest,
};
