//! Adapter bridging the HTTP [`Client`] to the `BuildGateway` trait
//! required by `vizdiff-build`.

use std::slice;

use vizdiff_build::gateway::GatewayFuture;
use vizdiff_build::{
    BuildCreated, BuildGateway, BuildStatus, GatewayError, SnapshotAttributes, SnapshotCreated,
};
use vizdiff_client::{Client, Error};
use vizdiff_protocol::{BuildDocument, BuildState, ResourceRef};

/// Implements `BuildGateway` by delegating to the vizdiff API client.
pub struct ClientGateway {
    client: Client,
    branch: Option<String>,
}

impl ClientGateway {
    pub fn new(client: Client, branch: Option<String>) -> Self {
        Self { client, branch }
    }
}

impl BuildGateway for ClientGateway {
    fn create_build<'a>(&'a self, resources: &'a [ResourceRef]) -> GatewayFuture<'a, BuildCreated> {
        Box::pin(async move {
            let doc = self
                .client
                .create_build(self.branch.clone(), resources)
                .await
                .map_err(to_gateway_error)?;
            Ok(BuildCreated {
                missing: doc.data.relationships.missing_ids(),
                build_id: doc.data.id,
                report_url: doc.data.attributes.web_url,
            })
        })
    }

    fn create_snapshot<'a>(
        &'a self,
        build_id: &'a str,
        root: &'a ResourceRef,
        attributes: &'a SnapshotAttributes,
    ) -> GatewayFuture<'a, SnapshotCreated> {
        Box::pin(async move {
            let doc = self
                .client
                .create_snapshot(
                    build_id,
                    &attributes.name,
                    &attributes.widths,
                    attributes.enable_javascript,
                    slice::from_ref(root),
                )
                .await
                .map_err(to_gateway_error)?;
            Ok(SnapshotCreated {
                missing: doc.data.relationships.missing_ids(),
                snapshot_id: doc.data.id,
            })
        })
    }

    fn upload_resource<'a>(
        &'a self,
        build_id: &'a str,
        content_hash: &'a str,
        content: Vec<u8>,
    ) -> GatewayFuture<'a, ()> {
        Box::pin(async move {
            self.client
                .upload_resource(build_id, content_hash, content)
                .await
                .map_err(to_gateway_error)
        })
    }

    fn finalize_snapshot<'a>(&'a self, snapshot_id: &'a str) -> GatewayFuture<'a, ()> {
        Box::pin(async move {
            self.client
                .finalize_snapshot(snapshot_id)
                .await
                .map_err(to_gateway_error)
        })
    }

    fn finalize_build<'a>(&'a self, build_id: &'a str) -> GatewayFuture<'a, ()> {
        Box::pin(async move {
            self.client
                .finalize_build(build_id)
                .await
                .map_err(to_gateway_error)
        })
    }

    fn get_build_status<'a>(&'a self, build_id: &'a str) -> GatewayFuture<'a, BuildStatus> {
        Box::pin(async move {
            let doc = self
                .client
                .get_build(build_id)
                .await
                .map_err(to_gateway_error)?;
            Ok(build_status(doc))
        })
    }
}

/// 4xx responses are client errors, 5xx server errors, anything else a
/// transport failure.
fn to_gateway_error(err: Error) -> GatewayError {
    match err {
        Error::Api { status, body } if (400..500).contains(&status) => {
            GatewayError::Client { status, body }
        }
        Error::Api { status, body } if status >= 500 => GatewayError::Server { status, body },
        other => GatewayError::Transport(other.to_string()),
    }
}

/// A build without a state is treated as not started yet.
fn build_status(doc: BuildDocument) -> BuildStatus {
    let attributes = doc.data.attributes;
    BuildStatus {
        state: attributes.state.unwrap_or(BuildState::Pending),
        diff_count: attributes.total_comparisons_diff,
        failure_reason: attributes.failure_reason,
        report_url: attributes.web_url,
    }
}
