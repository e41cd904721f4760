//! Resource manifest construction.
//!
//! Recursively walks the asset directories, hashes every file and maps
//! each content hash to the URL under which the service will serve it.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use sha2::{Digest, Sha256};
use tracing::warn;
use vizdiff_protocol::ResourceRef;

use crate::error::BuildError;
use crate::types::ResourceDescriptor;

/// Files at or above this size are left out of the manifest: 15 MiB.
pub const MAX_FILE_SIZE_BYTES: u64 = 15 * 1024 * 1024;

/// Characters kept verbatim in resource URLs (same set as `encodeURI`).
const URL_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b';')
    .remove(b',')
    .remove(b'/')
    .remove(b'?')
    .remove(b':')
    .remove(b'@')
    .remove(b'&')
    .remove(b'=')
    .remove(b'+')
    .remove(b'$')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'#');

/// Content hash → resource, built once per build and read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceManifest {
    entries: BTreeMap<String, ResourceDescriptor>,
}

impl ResourceManifest {
    pub fn get(&self, content_hash: &str) -> Option<&ResourceDescriptor> {
        self.entries.get(content_hash)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceDescriptor> {
        self.entries.values()
    }

    /// References announced to the service when the build is created.
    pub fn resource_refs(&self) -> Vec<ResourceRef> {
        self.iter().map(ResourceDescriptor::to_ref).collect()
    }

    fn insert(&mut self, resource: ResourceDescriptor) {
        self.entries.insert(resource.content_hash.clone(), resource);
    }
}

/// Builds the manifest for every file under `asset_dirs`.
///
/// Relative directories and relative strip prefixes are both resolved
/// against the current directory. Symlinks are not followed. Any
/// unreadable path aborts the whole scan.
pub fn build_manifest(
    asset_dirs: &[PathBuf],
    strip_prefixes: &[String],
) -> Result<ResourceManifest, BuildError> {
    let strip_prefixes = strip_prefixes
        .iter()
        .filter(|p| !p.is_empty())
        .map(|p| absolute_prefix(p))
        .collect::<Result<Vec<_>, _>>()?;

    let mut manifest = ResourceManifest::default();
    for dir in asset_dirs {
        let root = std::path::absolute(dir).map_err(|e| BuildError::io(dir, e))?;
        walk_dir(&root, &strip_prefixes, &mut manifest)?;
    }

    Ok(manifest)
}

/// Makes a relative prefix comparable with the absolute paths of the walk.
fn absolute_prefix(prefix: &str) -> Result<String, BuildError> {
    let path = Path::new(prefix);
    if path.is_absolute() {
        return Ok(prefix.to_string());
    }
    let absolute = std::path::absolute(path).map_err(|e| BuildError::io(path, e))?;
    Ok(absolute.to_string_lossy().replace('\\', "/"))
}

fn walk_dir(
    current: &Path,
    strip_prefixes: &[String],
    manifest: &mut ResourceManifest,
) -> Result<(), BuildError> {
    let entries = std::fs::read_dir(current).map_err(|e| BuildError::io(current, e))?;

    for entry in entries {
        let entry = entry.map_err(|e| BuildError::io(current, e))?;
        let path = entry.path();
        let metadata = entry.metadata().map_err(|e| BuildError::io(&path, e))?;

        if metadata.is_dir() {
            walk_dir(&path, strip_prefixes, manifest)?;
        } else if metadata.is_file() {
            if metadata.len() >= MAX_FILE_SIZE_BYTES {
                warn!(
                    path = %path.display(),
                    size = metadata.len(),
                    "skipping file over the resource size limit"
                );
                continue;
            }

            manifest.insert(ResourceDescriptor {
                url: resource_url(&path, strip_prefixes),
                content_hash: hash_file(&path)?,
                local_path: Some(path.clone()),
                content: None,
                is_root: false,
                mimetype: detect_mimetype(&path).map(Into::into),
            });
        }
    }

    Ok(())
}

/// Computes the public URL of an asset from its absolute path.
///
/// Each configured prefix is stripped once if it leads the path, the
/// result gets exactly one leading `/` and is percent-encoded.
pub fn resource_url(path: &Path, strip_prefixes: &[String]) -> String {
    // Normalize to forward slashes.
    let mut url = path.to_string_lossy().replace('\\', "/");

    for prefix in strip_prefixes {
        if let Some(rest) = url.strip_prefix(prefix.as_str()) {
            url = rest.to_string();
        }
    }

    let url = format!("/{}", url.trim_start_matches('/'));
    utf8_percent_encode(&url, URL_ENCODE_SET).to_string()
}

/// Computes SHA-256 of `data` and returns the hex-encoded digest.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hash_file(path: &Path) -> Result<String, BuildError> {
    let mut file = std::fs::File::open(path).map_err(|e| BuildError::io(path, e))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf).map_err(|e| BuildError::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Guesses a MIME type from the file extension.
pub fn detect_mimetype(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match ext.as_deref() {
        Some("html" | "htm") => Some("text/html"),
        Some("css") => Some("text/css"),
        Some("js" | "mjs") => Some("application/javascript"),
        Some("json" | "map") => Some("application/json"),
        Some("svg") => Some("image/svg+xml"),
        Some("png") => Some("image/png"),
        Some("jpg" | "jpeg") => Some("image/jpeg"),
        Some("webp") => Some("image/webp"),
        Some("gif") => Some("image/gif"),
        Some("ico") => Some("image/x-icon"),
        Some("woff") => Some("font/woff"),
        Some("woff2") => Some("font/woff2"),
        Some("ttf") => Some("font/ttf"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_asset_tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();

        fs::create_dir_all(root.join("assets").join("img")).unwrap();
        fs::write(root.join("assets").join("styles.css"), b"body { margin: 0 }").unwrap();
        fs::write(root.join("assets").join("app.js"), b"console.log(1)").unwrap();
        fs::write(root.join("assets").join("img").join("logo.png"), b"PNGDATA").unwrap();

        dir
    }

    fn prefix_of(dir: &TempDir) -> String {
        dir.path().to_string_lossy().replace('\\', "/")
    }

    #[test]
    fn manifest_keys_by_content_hash() {
        let dir = create_asset_tree();
        let manifest = build_manifest(&[dir.path().to_path_buf()], &[prefix_of(&dir)]).unwrap();

        assert_eq!(manifest.len(), 3);
        let hash = sha256_hex(b"body { margin: 0 }");
        let css = manifest.get(&hash).unwrap();
        assert_eq!(css.url, "/assets/styles.css");
        assert_eq!(css.mimetype.as_deref(), Some("text/css"));
        assert!(!css.is_root);
        assert!(css.content.is_none());
        assert_eq!(
            css.local_path.as_deref(),
            Some(dir.path().join("assets").join("styles.css").as_path())
        );

        for resource in manifest.iter() {
            assert!(resource.url.starts_with('/'));
            assert!(!resource.url.starts_with("//"));
        }
    }

    #[test]
    fn identical_content_collapses_to_one_entry() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), b"same").unwrap();
        fs::write(dir.path().join("b.txt"), b"same").unwrap();

        let manifest = build_manifest(&[dir.path().to_path_buf()], &[]).unwrap();
        assert_eq!(manifest.len(), 1);
        assert!(manifest.get(&sha256_hex(b"same")).is_some());
    }

    #[test]
    fn manifest_is_deterministic() {
        let dir = create_asset_tree();
        let dirs = [dir.path().to_path_buf()];
        let a = build_manifest(&dirs, &[prefix_of(&dir)]).unwrap();
        let b = build_manifest(&dirs, &[prefix_of(&dir)]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.resource_refs(), b.resource_refs());
    }

    #[test]
    fn files_at_size_limit_are_skipped() {
        let dir = TempDir::new().unwrap();
        let big = fs::File::create(dir.path().join("huge.bin")).unwrap();
        big.set_len(MAX_FILE_SIZE_BYTES).unwrap();
        fs::write(dir.path().join("small.txt"), b"ok").unwrap();

        let manifest = build_manifest(&[dir.path().to_path_buf()], &[]).unwrap();
        assert_eq!(manifest.len(), 1);
        assert!(manifest.iter().all(|r| !r.url.ends_with("huge.bin")));
    }

    #[test]
    fn missing_directory_fails() {
        let result = build_manifest(&[PathBuf::from("/nonexistent/vizdiff/assets")], &[]);
        assert!(matches!(result, Err(BuildError::Io { .. })));
    }

    #[test]
    fn relative_dir_and_prefix_give_site_urls() {
        // Created under the current directory so it can be named relatively.
        let dir = tempfile::Builder::new()
            .prefix("vizdiff-public-")
            .tempdir_in(".")
            .unwrap();
        fs::create_dir_all(dir.path().join("css")).unwrap();
        fs::write(dir.path().join("css").join("main.css"), b"a {}").unwrap();

        let relative = dir.path().file_name().unwrap().to_string_lossy().into_owned();
        let manifest = build_manifest(&[PathBuf::from(&relative)], &[relative]).unwrap();

        let urls: Vec<_> = manifest.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["/css/main.css"]);
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_not_followed() {
        let dir = create_asset_tree();
        std::os::unix::fs::symlink(dir.path(), dir.path().join("assets").join("loop")).unwrap();
        std::os::unix::fs::symlink(
            dir.path().join("assets").join("app.js"),
            dir.path().join("alias.js"),
        )
        .unwrap();

        let manifest = build_manifest(&[dir.path().to_path_buf()], &[prefix_of(&dir)]).unwrap();
        assert_eq!(manifest.len(), 3);
        assert!(manifest.iter().all(|r| !r.url.contains("loop")));
    }

    #[test]
    fn url_strips_every_leading_prefix() {
        let prefixes = vec!["/srv/site".to_string(), "/public".to_string()];
        let url = resource_url(Path::new("/srv/site/public/css/main.css"), &prefixes);
        assert_eq!(url, "/css/main.css");
    }

    #[test]
    fn url_ignores_prefix_not_at_start() {
        let prefixes = vec!["/public".to_string()];
        let url = resource_url(Path::new("/srv/public/a.css"), &prefixes);
        assert_eq!(url, "/srv/public/a.css");
    }

    #[test]
    fn url_has_single_leading_slash() {
        let prefixes = vec!["/srv/site".to_string()];
        assert_eq!(resource_url(Path::new("/srv/site//a.css"), &prefixes), "/a.css");
        let prefixes = vec!["/srv/site/".to_string()];
        assert_eq!(resource_url(Path::new("/srv/site/a.css"), &prefixes), "/a.css");
    }

    #[test]
    fn url_is_percent_encoded() {
        let url = resource_url(Path::new("/img/hello world%.png"), &[]);
        assert_eq!(url, "/img/hello%20world%25.png");
    }

    #[test]
    fn mimetype_from_extension() {
        assert_eq!(detect_mimetype(Path::new("a.CSS")), Some("text/css"));
        assert_eq!(detect_mimetype(Path::new("a.woff2")), Some("font/woff2"));
        assert_eq!(detect_mimetype(Path::new("a.unknown")), None);
        assert_eq!(detect_mimetype(Path::new("noext")), None);
    }
}
