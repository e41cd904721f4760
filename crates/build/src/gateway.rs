//! Boundary to the remote diffing service.
//!
//! `BuildGateway` is implemented by the app on top of the HTTP client.
//! Using a trait keeps build logic decoupled from transport and testable
//! with mocks.

use std::future::Future;
use std::pin::Pin;

use vizdiff_protocol::ResourceRef;

use crate::error::GatewayError;
use crate::types::{BuildCreated, BuildStatus, SnapshotAttributes, SnapshotCreated};

/// Boxed future returned by every gateway call.
pub type GatewayFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, GatewayError>> + Send + 'a>>;

/// Abstract connection to the remote build service.
pub trait BuildGateway: Send + Sync {
    /// Opens a build announcing every resource of the manifest.
    fn create_build<'a>(&'a self, resources: &'a [ResourceRef]) -> GatewayFuture<'a, BuildCreated>;

    /// Registers a snapshot under `build_id` with its root resource.
    fn create_snapshot<'a>(
        &'a self,
        build_id: &'a str,
        root: &'a ResourceRef,
        attributes: &'a SnapshotAttributes,
    ) -> GatewayFuture<'a, SnapshotCreated>;

    /// Uploads the bytes of one resource. `content_hash` is the identity
    /// the service reported as missing.
    fn upload_resource<'a>(
        &'a self,
        build_id: &'a str,
        content_hash: &'a str,
        content: Vec<u8>,
    ) -> GatewayFuture<'a, ()>;

    fn finalize_snapshot<'a>(&'a self, snapshot_id: &'a str) -> GatewayFuture<'a, ()>;

    fn finalize_build<'a>(&'a self, build_id: &'a str) -> GatewayFuture<'a, ()>;

    fn get_build_status<'a>(&'a self, build_id: &'a str) -> GatewayFuture<'a, BuildStatus>;
}
