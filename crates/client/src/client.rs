//! vizdiff API client.
//!
//! Every endpoint answers a JSON:API document; non-2xx responses are
//! returned as [`Error::Api`] with the raw body.

use std::time::Duration;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use vizdiff_protocol::{
    BuildDocument, CreateBuildRequest, CreateSnapshotRequest, ResourceRef, SnapshotDocument,
    UploadResourceRequest,
};

use crate::config::{ClientConfig, DEFAULT_API_URL};

const JSON_API: &str = "application/vnd.api+json";

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Characters left as-is in a project slug (`org/project`).
const PROJECT_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'/');

/// Errors from the vizdiff client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid API token")]
    InvalidToken,
}

/// vizdiff API client, bound to one project.
pub struct Client {
    http: reqwest::Client,
    base_url: String,
    project: String,
}

impl Client {
    /// Creates a client for `project` authenticated with `token`.
    pub fn new(token: &str, project: &str) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Token token={token}"))
                .map_err(|_| Error::InvalidToken)?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_API));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: DEFAULT_API_URL.to_string(),
            project: project.to_string(),
        })
    }

    /// Creates a client from a loaded configuration.
    ///
    /// Returns `Ok(None)` when the configuration does not enable uploads.
    pub fn from_config(config: &ClientConfig) -> Result<Option<Self>, Error> {
        let (Some(token), Some(project)) = (config.active_token(), config.project.as_deref())
        else {
            return Ok(None);
        };
        Ok(Some(
            Self::new(token, project)?.with_base_url(config.api_url.clone()),
        ))
    }

    /// Points the client at another API root.
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Performs a POST with an optional JSON body and returns the raw response.
    async fn post<B: Serialize>(&self, endpoint: &str, body: Option<&B>) -> Result<Vec<u8>, Error> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!(url = %url, "POST");

        let mut req = self.http.post(&url);
        if let Some(body) = body {
            req = req.body(serde_json::to_vec(body)?);
        }
        check(req.send().await?).await
    }

    /// Performs a GET and returns the raw response.
    async fn get(&self, endpoint: &str) -> Result<Vec<u8>, Error> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!(url = %url, "GET");
        check(self.http.get(&url).send().await?).await
    }

    /// Creates a build announcing every resource in the manifest.
    pub async fn create_build(
        &self,
        branch: Option<String>,
        resources: &[ResourceRef],
    ) -> Result<BuildDocument, Error> {
        let project = utf8_percent_encode(&self.project, PROJECT_ENCODE_SET).to_string();
        let req = CreateBuildRequest::new(branch, resources);
        let body = self
            .post(&format!("/projects/{project}/builds/"), Some(&req))
            .await?;
        decode(&body)
    }

    /// Creates a snapshot in `build_id` referencing `resources`.
    pub async fn create_snapshot(
        &self,
        build_id: &str,
        name: &str,
        widths: &[u32],
        enable_javascript: bool,
        resources: &[ResourceRef],
    ) -> Result<SnapshotDocument, Error> {
        let req = CreateSnapshotRequest::new(name, widths, enable_javascript, resources);
        let body = self
            .post(&format!("/builds/{build_id}/snapshots/"), Some(&req))
            .await?;
        decode(&body)
    }

    /// Uploads one resource's content, identified by its SHA-256.
    pub async fn upload_resource(
        &self,
        build_id: &str,
        content_hash: &str,
        content: Vec<u8>,
    ) -> Result<(), Error> {
        let req = UploadResourceRequest::new(content_hash, content);
        self.post(&format!("/builds/{build_id}/resources/"), Some(&req))
            .await?;
        Ok(())
    }

    pub async fn finalize_snapshot(&self, snapshot_id: &str) -> Result<(), Error> {
        self.post::<()>(&format!("/snapshots/{snapshot_id}/finalize"), None)
            .await?;
        Ok(())
    }

    pub async fn finalize_build(&self, build_id: &str) -> Result<(), Error> {
        self.post::<()>(&format!("/builds/{build_id}/finalize"), None)
            .await?;
        Ok(())
    }

    /// Fetches the build, including its processing state and diff count.
    pub async fn get_build(&self, build_id: &str) -> Result<BuildDocument, Error> {
        let body = self.get(&format!("/builds/{build_id}")).await?;
        decode(&body)
    }
}

async fn check(resp: reqwest::Response) -> Result<Vec<u8>, Error> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::Api {
            status: status.as_u16(),
            body,
        });
    }
    Ok(resp.bytes().await?.to_vec())
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, Error> {
    Ok(serde_json::from_slice(body)?)
}
