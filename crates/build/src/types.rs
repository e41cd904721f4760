//! Data types for the build flow.

use std::path::PathBuf;

use tracing::error;
use vizdiff_protocol::{BuildState, ResourceRef};

use crate::manifest::sha256_hex;

/// URL under which every snapshot's root HTML is announced.
const ROOT_RESOURCE_URL: &str = "/";

/// A content-addressed resource: a build asset or a snapshot's root HTML.
///
/// Identity is `content_hash`. Build assets keep only their `local_path`
/// and are read at upload time; root resources carry their `content`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    pub url: String,
    pub content_hash: String,
    pub local_path: Option<PathBuf>,
    pub content: Option<Vec<u8>>,
    pub is_root: bool,
    pub mimetype: Option<String>,
}

impl ResourceDescriptor {
    /// Builds the root resource for a snapshot's HTML.
    pub fn root_html(html: &str) -> Self {
        let content = html.as_bytes().to_vec();
        Self {
            url: ROOT_RESOURCE_URL.into(),
            content_hash: sha256_hex(&content),
            local_path: None,
            content: Some(content),
            is_root: true,
            mimetype: Some("text/html".into()),
        }
    }

    /// The reference sent to the service when announcing this resource.
    pub fn to_ref(&self) -> ResourceRef {
        ResourceRef {
            id: self.content_hash.clone(),
            url: self.url.clone(),
            is_root: self.is_root,
            mimetype: self.mimetype.clone(),
        }
    }
}

/// Breakpoint name → pixel width, in registration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BreakpointRegistry {
    entries: Vec<(String, u32)>,
}

impl BreakpointRegistry {
    /// Builds a registry. A repeated name keeps its first position and
    /// takes the last width given.
    pub fn new<I, S>(breakpoints: I) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        let mut entries: Vec<(String, u32)> = Vec::new();
        for (name, width) in breakpoints {
            let name = name.into();
            match entries.iter_mut().find(|(n, _)| *n == name) {
                Some(entry) => entry.1 = width,
                None => entries.push((name, width)),
            }
        }
        Self { entries }
    }

    pub fn width(&self, name: &str) -> Option<u32> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, w)| *w)
    }

    /// Resolves breakpoint names to widths.
    ///
    /// `None` selects every registered breakpoint. Unknown names are
    /// logged and dropped; repeated widths are kept once, first-seen order.
    pub fn resolve(&self, names: Option<&[String]>) -> Vec<u32> {
        let mut widths = Vec::new();
        let mut push = |w: u32| {
            if !widths.contains(&w) {
                widths.push(w);
            }
        };

        match names {
            None => self.entries.iter().for_each(|(_, w)| push(*w)),
            Some(names) => {
                for name in names {
                    match self.width(name) {
                        Some(w) => push(w),
                        None => error!(breakpoint = %name, "unknown breakpoint, ignoring"),
                    }
                }
            }
        }

        widths
    }
}

/// Options for [`BuildSession::setup`](crate::BuildSession::setup).
#[derive(Debug, Clone, Default)]
pub struct SetupOptions {
    /// Directories whose files make up the build resources.
    pub asset_dirs: Vec<PathBuf>,
    /// Leading path segments removed when computing resource URLs.
    pub strip_prefixes: Vec<String>,
    pub breakpoints: BreakpointRegistry,
    pub debug: bool,
}

/// A caller's request to capture one snapshot.
#[derive(Debug, Clone, Default)]
pub struct SnapshotRequest {
    pub name: String,
    pub html: String,
    /// Breakpoint names; `None` means all registered breakpoints.
    pub breakpoints: Option<Vec<String>>,
    pub enable_javascript: bool,
}

impl SnapshotRequest {
    pub fn new(name: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            html: html.into(),
            ..Self::default()
        }
    }

    pub fn with_breakpoints<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.breakpoints = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_javascript(mut self, enabled: bool) -> Self {
        self.enable_javascript = enabled;
        self
    }
}

/// Snapshot attributes sent with create-snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotAttributes {
    pub name: String,
    pub widths: Vec<u32>,
    pub enable_javascript: bool,
}

/// Response of create-build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildCreated {
    pub build_id: String,
    pub report_url: String,
    /// Hashes of resources the service does not have yet.
    pub missing: Vec<String>,
}

/// Response of create-snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotCreated {
    pub snapshot_id: String,
    pub missing: Vec<String>,
}

/// Response of get-build-status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildStatus {
    pub state: BuildState,
    pub diff_count: Option<u64>,
    pub failure_reason: Option<String>,
    pub report_url: String,
}

/// The open build, as published once setup has created it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInfo {
    pub id: String,
    pub report_url: String,
}

/// Final result of [`BuildSession::finalize_build`](crate::BuildSession::finalize_build).
///
/// Diffs and remote failures are outcomes, not errors: the caller decides
/// how to signal them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// Finalized without waiting for results.
    NotRequested,
    /// The session was disabled; nothing was sent.
    Skipped,
    NoDiffs,
    DiffsFound { count: u64, report_url: String },
    Failed { reason: String },
}

impl BuildOutcome {
    /// Whether the outcome should fail a CI job.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            BuildOutcome::DiffsFound { .. } | BuildOutcome::Failed { .. }
        )
    }
}
