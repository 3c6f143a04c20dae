//! Verified self-replacement of the launcher binary.
//!
//! The flow is strictly download -> verify -> stage -> hand off. Nothing
//! touches the filesystem until the SHA-256 of the downloaded payload matches
//! the digest published in the remote policy, and the running executable is
//! never overwritten in place: a detached helper swaps `<exe>.new` over it
//! once this process has exited.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::RemoteConfig;

pub const STAGED_SUFFIX: &str = ".new";
pub const DEFAULT_MAX_UPDATE_BYTES: u64 = 512 * 1024 * 1024;
/// Whole-transfer deadline for the update payload; replaces the client-wide
/// request timeout, which is sized for small JSON documents.
pub const DEFAULT_UPDATE_TIMEOUT: Duration = Duration::from_secs(15 * 60);
const HELPER_WAIT_SECS: u32 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateProgress {
    Downloading { downloaded: u64, total: u64 },
    Verifying,
    Staging,
    HandedOff,
}

/// Outcome of a dispatched update. The caller is expected to exit promptly so
/// the helper can move the staged file into place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relaunch {
    pub staged_path: PathBuf,
    pub target_path: PathBuf,
    pub helper_pid: u32,
}

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("{context}: {source}")]
    DownloadFailed {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("update download failed with HTTP {0}")]
    DownloadStatus(reqwest::StatusCode),
    #[error("update payload exceeds the {limit} byte limit")]
    TooLarge { limit: u64 },
    #[error("update digest mismatch: expected {expected}, got {actual}")]
    IntegrityCheckFailed { expected: String, actual: String },
    #[error("failed to resolve current executable: {0}")]
    ExecutablePath(#[source] std::io::Error),
    #[error("{context}: {source}")]
    Staging {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("{context}: {source}")]
    HandOff {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl UpdateError {
    fn download(context: &'static str, source: reqwest::Error) -> Self {
        Self::DownloadFailed { context, source }
    }

    fn staging(context: &'static str, source: std::io::Error) -> Self {
        Self::Staging { context, source }
    }

    fn staging_with_path(context: &'static str, path: &Path, source: &std::io::Error) -> Self {
        Self::staging(
            context,
            std::io::Error::new(source.kind(), format!("{}: {source}", path.display())),
        )
    }
}

/// Downloaded update payload paired with its SHA-256.
pub struct UpdateArtifact {
    bytes: Vec<u8>,
    sha256: String,
}

impl UpdateArtifact {
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let sha256 = format!("{:x}", Sha256::digest(&bytes));
        Self { bytes, sha256 }
    }

    #[must_use]
    pub fn sha256(&self) -> &str {
        &self.sha256
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Compare the computed digest with `expected`, ignoring hex case.
    ///
    /// # Errors
    /// Returns [`UpdateError::IntegrityCheckFailed`] on any mismatch.
    pub fn verify(&self, expected: &str) -> Result<(), UpdateError> {
        let expected = expected.trim();
        if self.sha256.eq_ignore_ascii_case(expected) {
            Ok(())
        } else {
            Err(UpdateError::IntegrityCheckFailed {
                expected: expected.to_ascii_lowercase(),
                actual: self.sha256.clone(),
            })
        }
    }
}

/// Final step of the update: start whatever replaces `target` with `staged`
/// after this process exits. Returns the helper's process id.
pub trait HandOff: Send + Sync {
    /// # Errors
    /// Returns an error if the helper cannot be prepared or spawned.
    fn dispatch(&self, staged: &Path, target: &Path) -> std::io::Result<u32>;
}

/// Short-lived shell helper that outlives the launcher, waits for it to exit,
/// moves the staged file over the executable, and relaunches it.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedHelper;

impl HandOff for DetachedHelper {
    #[cfg(unix)]
    fn dispatch(&self, staged: &Path, target: &Path) -> std::io::Result<u32> {
        use xgpo_platform::Detach;

        let child = std::process::Command::new("sh")
            .arg("-c")
            .arg(unix_swap_script())
            .arg("xgpo-update")
            .arg(std::process::id().to_string())
            .arg(staged)
            .arg(target)
            .detach()
            .spawn()?;
        Ok(child.id())
    }

    #[cfg(windows)]
    fn dispatch(&self, staged: &Path, target: &Path) -> std::io::Result<u32> {
        use xgpo_platform::Detach;

        let pid = std::process::id();
        let script_path = std::env::temp_dir().join(format!("xgpo_update_swap_{pid}.cmd"));
        std::fs::write(&script_path, windows_swap_script(pid, staged, target))?;

        let spawned = std::process::Command::new("cmd.exe")
            .arg("/C")
            .arg(&script_path)
            .detach()
            .spawn();
        discard_script_on_failure(&script_path, spawned).map(|child| child.id())
    }
}

/// POSIX `sh` helper. Arguments: `$1` launcher pid, `$2` staged file, `$3`
/// executable path.
#[cfg_attr(not(unix), allow(dead_code))]
fn unix_swap_script() -> String {
    format!(
        "pid=\"$1\"; staged=\"$2\"; target=\"$3\"\n\
         i=0\n\
         while kill -0 \"$pid\" 2>/dev/null && [ \"$i\" -lt {HELPER_WAIT_SECS} ]; do\n\
         \x20 sleep 1; i=$((i + 1))\n\
         done\n\
         mv -f \"$staged\" \"$target\" && exec \"$target\"\n"
    )
}

#[cfg_attr(not(windows), allow(dead_code))]
fn windows_swap_script(pid: u32, staged: &Path, target: &Path) -> String {
    let staged = escape_batch(staged);
    let target = escape_batch(target);
    format!(
        "@echo off\r\n\
         setlocal\r\n\
         set /a tries=0\r\n\
         :wait\r\n\
         tasklist /FI \"PID eq {pid}\" /NH 2>nul | find \"{pid}\" >nul\r\n\
         if errorlevel 1 goto swap\r\n\
         set /a tries+=1\r\n\
         if %tries% geq {HELPER_WAIT_SECS} goto swap\r\n\
         ping -n 2 127.0.0.1 >nul\r\n\
         goto wait\r\n\
         :swap\r\n\
         move /Y \"{staged}\" \"{target}\" >nul\r\n\
         if errorlevel 1 goto done\r\n\
         start \"\" \"{target}\"\r\n\
         :done\r\n\
         (goto) 2>nul & del \"%~f0\"\r\n"
    )
}

/// The helper deletes its own script; if it never started, nobody will.
#[cfg_attr(not(windows), allow(dead_code))]
fn discard_script_on_failure<T>(script: &Path, spawned: std::io::Result<T>) -> std::io::Result<T> {
    if spawned.is_err() {
        let _ = std::fs::remove_file(script);
    }
    spawned
}

#[cfg_attr(not(windows), allow(dead_code))]
fn escape_batch(path: &Path) -> String {
    path.display().to_string().replace('%', "%%")
}

/// Sibling path the verified payload is staged at: `<exe>.new`.
#[must_use]
pub fn staged_path_for(target: &Path) -> PathBuf {
    let mut staged = target.as_os_str().to_owned();
    staged.push(STAGED_SUFFIX);
    PathBuf::from(staged)
}

fn current_executable() -> Result<PathBuf, UpdateError> {
    let exe = std::env::current_exe().map_err(UpdateError::ExecutablePath)?;

    // After a swap on Linux, /proc/self/exe may still point at the unlinked
    // inode and carry a " (deleted)" suffix.
    #[cfg(target_os = "linux")]
    let exe = {
        let path_str = exe.to_string_lossy();
        if path_str.ends_with(" (deleted)") {
            PathBuf::from(path_str.trim_end_matches(" (deleted)"))
        } else {
            exe
        }
    };

    Ok(exe)
}

pub struct UpdateExecutor {
    client: reqwest::Client,
    target: Option<PathBuf>,
    hand_off: Arc<dyn HandOff>,
    max_bytes: u64,
    download_timeout: Duration,
}

impl UpdateExecutor {
    #[must_use]
    pub fn new(client: &reqwest::Client) -> Self {
        Self {
            client: client.clone(),
            target: None,
            hand_off: Arc::new(DetachedHelper),
            max_bytes: DEFAULT_MAX_UPDATE_BYTES,
            download_timeout: DEFAULT_UPDATE_TIMEOUT,
        }
    }

    /// Replace a different executable than the running one.
    #[must_use]
    pub fn with_target(mut self, target: impl Into<PathBuf>) -> Self {
        self.target = Some(target.into());
        self
    }

    #[must_use]
    pub fn with_hand_off(mut self, hand_off: Arc<dyn HandOff>) -> Self {
        self.hand_off = hand_off;
        self
    }

    #[must_use]
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    #[must_use]
    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    /// Download, verify, stage, and hand off the update described by `config`.
    ///
    /// Once the digest has been verified the staging and hand-off run on a
    /// blocking task that completes even if this future is dropped. The
    /// executor never exits the process itself.
    ///
    /// # Errors
    /// Returns the [`UpdateError`] of the first failing step; the running
    /// binary is untouched and no staged file is left behind.
    pub async fn execute(
        &self,
        config: &RemoteConfig,
        progress: Option<&mpsc::Sender<UpdateProgress>>,
    ) -> Result<Relaunch, UpdateError> {
        let target = match &self.target {
            Some(target) => target.clone(),
            None => current_executable()?,
        };

        info!("Downloading update from {}", config.update_url);
        let artifact = self.download(config.update_url.as_str(), progress).await?;

        report(progress, UpdateProgress::Verifying).await;
        if let Err(error) = artifact.verify(&config.update_sha256) {
            warn!("Discarding update: {error}");
            return Err(error);
        }
        info!("Update digest verified ({} bytes)", artifact.len());

        report(progress, UpdateProgress::Staging).await;
        let hand_off = Arc::clone(&self.hand_off);
        let relaunch = tokio::task::spawn_blocking(move || {
            stage_and_hand_off(&artifact, &target, hand_off.as_ref())
        })
        .await
        .map_err(|error| UpdateError::HandOff {
            context: "update hand-off task failed",
            source: std::io::Error::other(error.to_string()),
        })??;

        report(progress, UpdateProgress::HandedOff).await;
        Ok(relaunch)
    }

    async fn download(
        &self,
        url: &str,
        progress: Option<&mpsc::Sender<UpdateProgress>>,
    ) -> Result<UpdateArtifact, UpdateError> {
        use futures_util::StreamExt;

        let response = self
            .client
            .get(url)
            .timeout(self.download_timeout)
            .send()
            .await
            .map_err(|error| UpdateError::download("update download request failed", error))?;

        if !response.status().is_success() {
            return Err(UpdateError::DownloadStatus(response.status()));
        }

        let total = response.content_length().unwrap_or(0);
        if total > self.max_bytes {
            return Err(UpdateError::TooLarge {
                limit: self.max_bytes,
            });
        }

        let capacity = usize::try_from(total).unwrap_or(0);
        let mut bytes = Vec::with_capacity(capacity);
        let mut hasher = Sha256::new();
        let mut downloaded: u64 = 0;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk =
                chunk.map_err(|error| UpdateError::download("update download stream error", error))?;
            downloaded += chunk.len() as u64;
            if downloaded > self.max_bytes {
                return Err(UpdateError::TooLarge {
                    limit: self.max_bytes,
                });
            }
            hasher.update(&chunk);
            bytes.extend_from_slice(&chunk);
            report(progress, UpdateProgress::Downloading { downloaded, total }).await;
        }

        debug!("Update download complete: {downloaded} bytes");
        Ok(UpdateArtifact {
            bytes,
            sha256: format!("{:x}", hasher.finalize()),
        })
    }
}

fn stage_and_hand_off(
    artifact: &UpdateArtifact,
    target: &Path,
    hand_off: &dyn HandOff,
) -> Result<Relaunch, UpdateError> {
    let staged = staged_path_for(target);
    stage(artifact, target, &staged)?;
    info!("Staged update at {}", staged.display());

    match hand_off.dispatch(&staged, target) {
        Ok(helper_pid) => {
            info!("Update helper started (pid {helper_pid})");
            Ok(Relaunch {
                staged_path: staged,
                target_path: target.to_path_buf(),
                helper_pid,
            })
        }
        Err(error) => {
            warn!("Update helper failed to start, removing staged file: {error}");
            let _ = std::fs::remove_file(&staged);
            Err(UpdateError::HandOff {
                context: "failed to start update helper",
                source: error,
            })
        }
    }
}

/// Write the payload next to `target` and atomically rename it to `staged`, so
/// a crash mid-write never leaves a truncated `<exe>.new`.
fn stage(artifact: &UpdateArtifact, target: &Path, staged: &Path) -> Result<(), UpdateError> {
    let dir = target.parent().ok_or_else(|| {
        UpdateError::staging(
            "executable has no parent directory",
            std::io::Error::new(std::io::ErrorKind::InvalidInput, target.display().to_string()),
        )
    })?;

    let mut temp = tempfile::Builder::new()
        .prefix(".xgpo-update-")
        .tempfile_in(dir)
        .map_err(|error| {
            UpdateError::staging_with_path("failed to create staging file", dir, &error)
        })?;
    temp.write_all(&artifact.bytes)
        .and_then(|()| temp.as_file().sync_all())
        .map_err(|error| {
            UpdateError::staging_with_path("failed to write staging file", temp.path(), &error)
        })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(temp.path(), std::fs::Permissions::from_mode(0o755)).map_err(
            |error| {
                UpdateError::staging_with_path(
                    "failed to mark staged update executable",
                    temp.path(),
                    &error,
                )
            },
        )?;
    }

    temp.persist(staged).map_err(|error| {
        UpdateError::staging_with_path("failed to persist staged update", staged, &error.error)
    })?;
    Ok(())
}

fn remove_stale_staging(target: &Path) -> bool {
    let staged = staged_path_for(target);
    if !staged.exists() {
        return false;
    }
    match std::fs::remove_file(&staged) {
        Ok(()) => {
            info!("Removed stale staged update: {}", staged.display());
            true
        }
        Err(error) => {
            warn!("Failed to remove stale staged update {}: {error}", staged.display());
            false
        }
    }
}

/// Remove a `<exe>.new` left behind by an interrupted swap.
pub fn cleanup_stale_staging() {
    if let Ok(exe) = current_executable() {
        remove_stale_staging(&exe);
    }
}

async fn report(progress: Option<&mpsc::Sender<UpdateProgress>>, update: UpdateProgress) {
    if let Some(progress) = progress {
        let _ = progress.send(update).await;
    }
}
