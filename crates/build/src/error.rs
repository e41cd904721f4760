//! Build error types.

use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Failure reported by a [`BuildGateway`](crate::BuildGateway) call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// The service rejected the request (HTTP 4xx).
    #[error("client error {status}: {body}")]
    Client { status: u16, body: String },

    #[error("server error {status}: {body}")]
    Server { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),
}

impl GatewayError {
    /// Whether the request itself was rejected, as opposed to the
    /// service or the network failing.
    pub fn is_client_error(&self) -> bool {
        matches!(self, GatewayError::Client { .. })
    }
}

/// Errors produced while running a build.
///
/// Cloneable so the first fatal error can be handed to every waiter.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BuildError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: Arc<std::io::Error>,
    },

    #[error("{operation} failed: {source}")]
    Gateway {
        operation: &'static str,
        source: GatewayError,
    },

    #[error("build status retries exceeded ({retries})")]
    RetriesExceeded { retries: u32 },

    #[error("build setup did not complete")]
    SetupAborted,

    #[error("vizdiff is disabled")]
    Disabled,
}

impl BuildError {
    pub(crate) fn io(path: &Path, err: std::io::Error) -> Self {
        BuildError::Io {
            path: path.to_path_buf(),
            source: Arc::new(err),
        }
    }

    pub(crate) fn gateway(operation: &'static str, source: GatewayError) -> Self {
        BuildError::Gateway { operation, source }
    }
}
