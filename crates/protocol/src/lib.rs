//! Wire types for the vizdiff build API.
//!
//! The remote service speaks JSON:API: every request and response body is a
//! `{"data": ...}` document whose attributes use kebab-case keys.

pub mod messages;
pub mod types;

pub use messages::{
    BuildDocument, CreateBuildRequest, CreateSnapshotRequest, SnapshotDocument,
    UploadResourceRequest,
};
pub use types::{BuildState, ResourceRef};
