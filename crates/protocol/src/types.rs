use serde::{Deserialize, Serialize};

/// A content-addressed resource as announced to the service.
///
/// `id` is the lowercase hex SHA-256 of the resource content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRef {
    pub id: String,
    pub url: String,
    pub is_root: bool,
    pub mimetype: Option<String>,
}

/// Processing state of a build on the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildState {
    Pending,
    Processing,
    Finished,
    Failed,
}

impl BuildState {
    /// Whether the service is still working on the build.
    pub fn is_in_progress(self) -> bool {
        matches!(self, BuildState::Pending | BuildState::Processing)
    }
}
