//! HTML pages to snapshot.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub name: String,
    pub html: String,
}

/// Reads every `*.html` file directly inside `dir`, sorted by file name.
/// The snapshot name is the file stem.
pub fn collect(dir: &Path) -> Result<Vec<Page>> {
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("reading snapshot dir {}", dir.display()))?;

    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_html = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("html"));
        if path.is_file() && is_html {
            paths.push(path);
        }
    }
    paths.sort();

    paths
        .into_iter()
        .map(|path| {
            let html = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            Ok(Page { name, html })
        })
        .collect()
}
