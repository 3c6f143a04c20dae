use std::io::Write as _;
use std::path::{Path, PathBuf};

use log::{debug, info};
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackgroundError {
    #[error("no background image configured")]
    NotConfigured,
    #[error("failed to download background image: {0}")]
    Request(#[source] reqwest::Error),
    #[error("background image request failed with HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Cache file for `url`: a digest of the URL keeps stale images from being
/// reused after the policy points somewhere else.
#[must_use]
pub fn cached_background_path(cache_dir: &Path, url: &str) -> PathBuf {
    let digest = format!("{:x}", Sha256::digest(url.as_bytes()));
    let extension = url
        .split(['?', '#'])
        .next()
        .and_then(|path| path.rsplit('/').next())
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(char::is_alphanumeric))
        .unwrap_or("img");
    cache_dir.join(format!("bg-{}.{extension}", &digest[..16]))
}

/// Download the policy's background image into `cache_dir` unless it is
/// already cached. Returns the cached file path.
///
/// # Errors
/// Returns an error when no URL is configured, the download fails, or the
/// file cannot be written.
pub async fn cache_background(
    client: &reqwest::Client,
    url: &str,
    cache_dir: &Path,
) -> Result<PathBuf, BackgroundError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(BackgroundError::NotConfigured);
    }

    let path = cached_background_path(cache_dir, url);
    if path.is_file() {
        debug!("Background already cached at {}", path.display());
        return Ok(path);
    }

    let response = client
        .get(url)
        .send()
        .await
        .map_err(BackgroundError::Request)?;
    if !response.status().is_success() {
        return Err(BackgroundError::Status(response.status()));
    }
    let bytes = response.bytes().await.map_err(BackgroundError::Request)?;

    let (dir, target) = (cache_dir.to_path_buf(), path.clone());
    let written = bytes.len();
    tokio::task::spawn_blocking(move || persist_background(&dir, &target, &bytes))
        .await
        .map_err(|error| BackgroundError::Io {
            context: "background cache task failed",
            source: std::io::Error::other(error.to_string()),
        })??;

    info!("Cached background image ({written} bytes) at {}", path.display());
    Ok(path)
}

fn io_error(context: &'static str) -> impl FnOnce(std::io::Error) -> BackgroundError {
    move |source| BackgroundError::Io { context, source }
}

/// Write through a temporary sibling and rename, so an interrupted write
/// never leaves a truncated image under the cached name.
fn persist_background(cache_dir: &Path, path: &Path, bytes: &[u8]) -> Result<(), BackgroundError> {
    std::fs::create_dir_all(cache_dir)
        .map_err(io_error("failed to create background cache directory"))?;
    let mut temp = tempfile::Builder::new()
        .prefix(".bg-")
        .tempfile_in(cache_dir)
        .map_err(io_error("failed to create background temp file"))?;
    temp.write_all(bytes)
        .and_then(|()| temp.as_file().sync_all())
        .map_err(io_error("failed to write background image"))?;
    temp.persist(path)
        .map_err(|error| io_error("failed to persist background image")(error.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{cached_background_path, persist_background};

    #[test]
    fn persisted_background_replaces_partial_file() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let cache_dir = temp.path().join("backgrounds");
        let path = cached_background_path(&cache_dir, "https://example.com/bg.png");
        std::fs::create_dir_all(&cache_dir).expect("cache dir should be created");
        std::fs::write(&path, b"trunc").expect("partial file should be written");

        persist_background(&cache_dir, &path, b"full image").expect("background should persist");

        assert_eq!(std::fs::read(&path).expect("cached file should exist"), b"full image");
        let names: Vec<_> = std::fs::read_dir(&cache_dir)
            .expect("cache dir should be readable")
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name())
            .collect();
        assert_eq!(names.len(), 1, "no temporary files should remain: {names:?}");
    }

    #[test]
    fn unwritable_cache_dir_leaves_nothing_behind() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let blocker = temp.path().join("backgrounds");
        std::fs::write(&blocker, b"not a directory").expect("blocker should be written");
        let path = cached_background_path(&blocker, "https://example.com/bg.png");

        assert!(persist_background(&blocker, &path, b"image").is_err());
        assert!(!path.exists());
    }

    #[test]
    fn cache_path_keeps_image_extension() {
        let path = cached_background_path(Path::new("/cache"), "https://cdn.example.com/a/bg.JPG?v=2");
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .expect("cache path should have a file name");
        assert!(name.starts_with("bg-"));
        assert!(name.ends_with(".JPG"));
    }

    #[test]
    fn cache_path_falls_back_without_extension() {
        let path = cached_background_path(Path::new("/cache"), "https://cdn.example.com/background");
        assert_eq!(path.extension().and_then(|ext| ext.to_str()), Some("img"));
    }

    #[test]
    fn different_urls_get_different_cache_files() {
        let first = cached_background_path(Path::new("/cache"), "https://example.com/one.png");
        let second = cached_background_path(Path::new("/cache"), "https://example.com/two.png");
        assert_ne!(first, second);
    }
}
