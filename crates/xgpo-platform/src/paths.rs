use std::path::{Path, PathBuf};
use thiserror::Error;

const APP_DIR_NAME: &str = "xgpo";

/// Portable installs point this at a folder that then holds `config/`,
/// `cache/` and `data/` instead of the per-user OS locations.
pub const HOME_ENV: &str = "XGPO_HOME";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("could not determine the {0} directory for the launcher")]
pub struct AppPathsError(&'static str);

/// Where the launcher keeps its settings, cached artwork, and log.
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub data_dir: PathBuf,
}

#[cfg_attr(target_os = "macos", allow(dead_code))]
fn base(dir: Option<PathBuf>, kind: &'static str) -> Result<PathBuf, AppPathsError> {
    dir.map(|dir| dir.join(APP_DIR_NAME)).ok_or(AppPathsError(kind))
}

impl AppPaths {
    /// Resolve launcher paths, honouring [`HOME_ENV`] before the platform
    /// defaults.
    ///
    /// # Errors
    /// Returns an error when a platform base directory cannot be determined.
    pub fn new() -> Result<Self, AppPathsError> {
        match std::env::var_os(HOME_ENV) {
            Some(root) if !root.is_empty() => Ok(Self::portable(Path::new(&root))),
            _ => Self::platform(),
        }
    }

    #[must_use]
    pub fn portable(root: &Path) -> Self {
        Self {
            config_dir: root.join("config"),
            cache_dir: root.join("cache"),
            data_dir: root.join("data"),
        }
    }

    fn platform() -> Result<Self, AppPathsError> {
        #[cfg(target_os = "macos")]
        {
            let home = dirs::home_dir().ok_or(AppPathsError("home"))?;
            Ok(Self {
                config_dir: home.join("Library/Application Support").join(APP_DIR_NAME),
                cache_dir: home.join("Library/Caches").join(APP_DIR_NAME),
                data_dir: home.join("Library/Application Support").join(APP_DIR_NAME),
            })
        }

        #[cfg(not(target_os = "macos"))]
        {
            Ok(Self {
                config_dir: base(dirs::config_dir(), "config")?,
                cache_dir: base(dirs::cache_dir(), "cache")?,
                data_dir: base(dirs::data_local_dir(), "data")?,
            })
        }
    }

    #[must_use]
    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("settings.json")
    }

    #[must_use]
    pub fn background_cache_dir(&self) -> PathBuf {
        self.cache_dir.join("backgrounds")
    }

    #[must_use]
    pub fn log_file(&self) -> PathBuf {
        self.data_dir.join("debug.log")
    }

    /// Create the settings, background cache and log directories. The error
    /// names the directory that could not be created.
    ///
    /// # Errors
    /// Returns an error if any directory cannot be created.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [&self.config_dir, &self.background_cache_dir(), &self.data_dir] {
            std::fs::create_dir_all(dir).map_err(|error| {
                std::io::Error::new(error.kind(), format!("{}: {error}", dir.display()))
            })?;
        }
        Ok(())
    }
}
