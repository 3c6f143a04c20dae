use log::{debug, info, warn};
#[cfg(debug_assertions)]
use simplelog::{ColorChoice, TermLogger, TerminalMode};
use simplelog::{CombinedLogger, ConfigBuilder, LevelFilter, SharedLogger, WriteLogger};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use xgpo_platform::AppPaths;

/// Append-only log sink that reopens its file if it disappears while the
/// launcher is running (e.g. the user clears the data directory).
struct ReopeningLogFile {
    path: PathBuf,
    file: Mutex<File>,
}

fn open_append(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

impl ReopeningLogFile {
    fn new(path: PathBuf) -> io::Result<Self> {
        let file = open_append(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    fn with_file<T>(&self, op: impl FnOnce(&mut File) -> io::Result<T>) -> io::Result<T> {
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.path.exists() {
            *file = open_append(&self.path)?;
        }
        op(&mut file)
    }
}

impl Write for ReopeningLogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.with_file(|file| file.write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.with_file(|file| file.flush())
    }
}

/// Keep only the newer half of an oversized log, starting at a line boundary.
fn trim_log_file_if_oversized(log_path: &Path, max_log_size: u64) {
    let Ok(metadata) = std::fs::metadata(log_path) else {
        return;
    };
    if metadata.len() <= max_log_size {
        return;
    }
    let Ok(contents) = std::fs::read(log_path) else {
        return;
    };

    let midpoint = contents.len() / 2;
    let keep_from = contents[midpoint..]
        .iter()
        .position(|&byte| byte == b'\n')
        .map_or(midpoint, |offset| midpoint + offset + 1);
    let _ = std::fs::write(log_path, &contents[keep_from..]);
}

/// Level for a session: everything when verbose, otherwise only the
/// warnings and errors that explain a failed launch.
#[must_use]
pub fn session_level(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    }
}

pub fn set_verbose(verbose: bool) {
    log::set_max_level(session_level(verbose));
}

fn session_banner() -> String {
    format!(
        "xgpo {} ({}/{}), remote config {}",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH,
        xgpo_core::config_url()
    )
}

/// Install the global logger: the trimmed `debug.log` in the data directory,
/// plus stderr in debug builds. Logging problems never stop the launcher.
pub fn init_logging(paths: &AppPaths, verbose: bool, max_log_size: u64) {
    let log_path = paths.log_file();
    trim_log_file_if_oversized(&log_path, max_log_size);

    let config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .add_filter_allow_str("xgpo")
        .build();

    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();
    let file_error = match ReopeningLogFile::new(log_path.clone()) {
        Ok(writer) => {
            loggers.push(WriteLogger::new(LevelFilter::Debug, config.clone(), writer));
            None
        }
        Err(error) => Some(error),
    };

    #[cfg(debug_assertions)]
    loggers.push(TermLogger::new(
        LevelFilter::Debug,
        config,
        TerminalMode::Stderr,
        ColorChoice::Auto,
    ));

    if loggers.is_empty() || CombinedLogger::init(loggers).is_err() {
        return;
    }
    set_verbose(verbose);

    info!("{}", session_banner());
    match file_error {
        None => debug!("Logging to {}", log_path.display()),
        Some(error) => warn!("Log file {} unavailable: {error}", log_path.display()),
    }
}
