//! Admission and self-update core for the XGPO launcher.
//!
//! This crate holds everything that decides whether the launcher may run and
//! keeps it on a supported version, independent of any UI:
//! - Dotted numeric version parsing and comparison.
//! - Remote policy decoding and fetching.
//! - The connectivity probe and admission gate.
//! - Verified download, staging, and hand-off of launcher updates.
//! - Background image caching for the admitted session.

pub mod admission;
pub mod background;
pub mod config;
pub mod connectivity;
pub mod gate;
pub mod self_update;
mod version;

/// Closed set of admission failures, one user-facing message each.
pub use admission::AdmissionFailure;
/// Background image cache helper.
pub use background::{BackgroundError, cache_background};
/// Remote policy model and fetch helpers.
pub use config::{ConfigError, PolicyDocument, RemoteConfig, config_url, fetch_policy};
/// Reachability check run before the policy fetch.
pub use connectivity::ConnectivityProbe;
/// Admission state machine.
pub use gate::{BlockReason, GateError, GateResult, GateStage, UpdateGatekeeper, evaluate};
/// Verified self-update executor.
pub use self_update::{
    DetachedHelper, HandOff, Relaunch, UpdateArtifact, UpdateError, UpdateExecutor,
    UpdateProgress, cleanup_stale_staging,
};
/// Dotted numeric version and comparator.
pub use version::{Version, VersionParseError, compare};
