use serde::{Deserialize, Serialize};

use crate::types::{BuildState, ResourceRef};

const TYPE_BUILDS: &str = "builds";
const TYPE_SNAPSHOTS: &str = "snapshots";
const TYPE_RESOURCES: &str = "resources";

// ---------------------------------------------------------------------------
// Shared pieces
// ---------------------------------------------------------------------------

/// JSON:API resource identifier, optionally carrying resource attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceIdentifier {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<ResourceAttributes>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResourceAttributes {
    pub resource_url: String,
    pub is_root: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mimetype: Option<String>,
}

impl From<&ResourceRef> for ResourceIdentifier {
    fn from(r: &ResourceRef) -> Self {
        Self {
            kind: TYPE_RESOURCES.into(),
            id: r.id.clone(),
            attributes: Some(ResourceAttributes {
                resource_url: r.url.clone(),
                is_root: r.is_root,
                mimetype: r.mimetype.clone(),
            }),
        }
    }
}

/// A to-many relationship.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    #[serde(default)]
    pub data: Vec<ResourceIdentifier>,
}

impl Relationship {
    fn from_resources(resources: &[ResourceRef]) -> Self {
        Self {
            data: resources.iter().map(ResourceIdentifier::from).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourcesRelationship {
    pub resources: Relationship,
}

/// Relationships block of a build or snapshot response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseRelationships {
    #[serde(
        rename = "missing-resources",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub missing_resources: Option<Relationship>,
}

impl ResponseRelationships {
    /// Hashes of the resources the service reported as missing, in order.
    pub fn missing_ids(&self) -> Vec<String> {
        self.missing_resources
            .as_ref()
            .map(|rel| rel.data.iter().map(|r| r.id.clone()).collect())
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Builds
// ---------------------------------------------------------------------------

/// Body of `POST /projects/{project}/builds/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateBuildRequest {
    pub data: NewBuild,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBuild {
    #[serde(rename = "type")]
    pub kind: String,
    pub attributes: NewBuildAttributes,
    pub relationships: ResourcesRelationship,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NewBuildAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

impl CreateBuildRequest {
    pub fn new(branch: Option<String>, resources: &[ResourceRef]) -> Self {
        Self {
            data: NewBuild {
                kind: TYPE_BUILDS.into(),
                attributes: NewBuildAttributes { branch },
                relationships: ResourcesRelationship {
                    resources: Relationship::from_resources(resources),
                },
            },
        }
    }
}

/// Response of create-build and `GET /builds/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildDocument {
    pub data: BuildData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildData {
    pub id: String,
    #[serde(default)]
    pub attributes: BuildAttributes,
    #[serde(default)]
    pub relationships: ResponseRelationships,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BuildAttributes {
    #[serde(default)]
    pub web_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<BuildState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_comparisons_diff: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// Body of `POST /builds/{id}/snapshots/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateSnapshotRequest {
    pub data: NewSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSnapshot {
    #[serde(rename = "type")]
    pub kind: String,
    pub attributes: NewSnapshotAttributes,
    pub relationships: ResourcesRelationship,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NewSnapshotAttributes {
    pub name: String,
    pub widths: Vec<u32>,
    pub enable_javascript: bool,
}

impl CreateSnapshotRequest {
    pub fn new(
        name: &str,
        widths: &[u32],
        enable_javascript: bool,
        resources: &[ResourceRef],
    ) -> Self {
        Self {
            data: NewSnapshot {
                kind: TYPE_SNAPSHOTS.into(),
                attributes: NewSnapshotAttributes {
                    name: name.to_string(),
                    widths: widths.to_vec(),
                    enable_javascript,
                },
                relationships: ResourcesRelationship {
                    resources: Relationship::from_resources(resources),
                },
            },
        }
    }
}

/// Response of create-snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotDocument {
    pub data: SnapshotData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotData {
    pub id: String,
    #[serde(default)]
    pub relationships: ResponseRelationships,
}

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

/// Body of `POST /builds/{id}/resources/`.
///
/// Content travels base64-encoded under `base64-content`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResourceRequest {
    pub data: UploadResourceData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResourceData {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    pub attributes: UploadResourceAttributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResourceAttributes {
    #[serde(rename = "base64-content", with = "base64_bytes")]
    pub content: Vec<u8>,
}

impl UploadResourceRequest {
    pub fn new(id: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            data: UploadResourceData {
                kind: TYPE_RESOURCES.into(),
                id: id.into(),
                attributes: UploadResourceAttributes { content },
            },
        }
    }
}

mod base64_bytes {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        STANDARD.encode(data).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}
