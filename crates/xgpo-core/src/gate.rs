//! Admission gate: connectivity, remote policy, and mandatory-version check.
//!
//! The gate runs `ProbingConnectivity -> FetchingConfig -> Evaluating` and
//! settles on one of [`GateResult`]. Nothing else in the launcher may touch
//! the network until it returns [`GateResult::Proceed`].

use log::{debug, info, warn};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::{self, ConfigError, PolicyDocument, RemoteConfig};
use crate::connectivity::ConnectivityProbe;
use crate::version::Version;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStage {
    ProbingConnectivity,
    FetchingConfig,
    Evaluating,
    Ready,
}

impl GateStage {
    #[must_use]
    pub fn progress_percent(self) -> u8 {
        match self {
            Self::ProbingConnectivity => 10,
            Self::FetchingConfig => 35,
            Self::Evaluating => 60,
            Self::Ready => 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    Offline,
    Maintenance,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateResult {
    Proceed(RemoteConfig),
    Blocked(BlockReason),
    UpdateRequired(RemoteConfig),
}

#[derive(Debug, Error)]
pub enum GateError {
    #[error("remote config unavailable: {0}")]
    ConfigUnavailable(#[source] ConfigError),
    #[error("remote config is invalid: {0}")]
    ConfigDecode(#[source] ConfigError),
}

impl From<ConfigError> for GateError {
    fn from(error: ConfigError) -> Self {
        if error.is_transport() {
            Self::ConfigUnavailable(error)
        } else {
            Self::ConfigDecode(error)
        }
    }
}

/// Decide admission for an already-decoded policy.
#[must_use]
pub fn evaluate(config: RemoteConfig, current_version: &Version) -> GateResult {
    if !config.app_online {
        return GateResult::Blocked(BlockReason::Maintenance);
    }
    if current_version < &config.min_version {
        return GateResult::UpdateRequired(config);
    }
    GateResult::Proceed(config)
}

pub struct UpdateGatekeeper {
    client: reqwest::Client,
    probe: ConnectivityProbe,
    config_url: String,
    current_version: Version,
}

impl UpdateGatekeeper {
    /// Gatekeeper for the running binary against the build-time policy URL.
    ///
    /// `client` is the process-wide HTTP client; cloning it shares its
    /// connection pool.
    #[must_use]
    pub fn new(client: &reqwest::Client) -> Self {
        Self {
            client: client.clone(),
            probe: ConnectivityProbe::default(),
            config_url: config::config_url().to_string(),
            current_version: Version::current(),
        }
    }

    #[must_use]
    pub fn with_probe(mut self, probe: ConnectivityProbe) -> Self {
        self.probe = probe;
        self
    }

    #[must_use]
    pub fn with_config_url(mut self, url: impl Into<String>) -> Self {
        self.config_url = url.into();
        self
    }

    #[must_use]
    pub fn with_current_version(mut self, version: Version) -> Self {
        self.current_version = version;
        self
    }

    #[must_use]
    pub fn current_version(&self) -> &Version {
        &self.current_version
    }

    /// Run the admission sequence.
    ///
    /// Offline and maintenance outcomes are regular results; only a policy
    /// that cannot be fetched after connectivity was confirmed, or that fails
    /// to decode, is an error.
    ///
    /// # Errors
    /// Returns [`GateError::ConfigUnavailable`] when the policy request fails
    /// and [`GateError::ConfigDecode`] when the policy document is malformed.
    pub async fn check_and_gate(
        &self,
        progress: Option<&mpsc::Sender<GateStage>>,
    ) -> Result<GateResult, GateError> {
        report(progress, GateStage::ProbingConnectivity).await;
        if !self.probe.is_reachable(&self.client).await {
            info!("Admission blocked: no connectivity");
            return Ok(GateResult::Blocked(BlockReason::Offline));
        }

        report(progress, GateStage::FetchingConfig).await;
        let policy = config::fetch_policy(&self.client, &self.config_url)
            .await
            .inspect_err(|error| warn!("Remote config from {} rejected: {error}", self.config_url))?;

        report(progress, GateStage::Evaluating).await;
        let result = match policy {
            PolicyDocument::Maintenance => GateResult::Blocked(BlockReason::Maintenance),
            PolicyDocument::Config(config) => {
                debug!(
                    "Evaluating policy: online={}, min={}, latest={}, current={}",
                    config.app_online,
                    config.min_version,
                    config.latest_version,
                    self.current_version
                );
                evaluate(config, &self.current_version)
            }
        };

        match &result {
            GateResult::Proceed(_) => {
                info!("Admission granted for {}", self.current_version);
                report(progress, GateStage::Ready).await;
            }
            GateResult::Blocked(reason) => info!("Admission blocked: {reason:?}"),
            GateResult::UpdateRequired(config) => info!(
                "Mandatory update required: {} < {}",
                self.current_version, config.min_version
            ),
        }

        Ok(result)
    }
}

async fn report(progress: Option<&mpsc::Sender<GateStage>>, stage: GateStage) {
    if let Some(progress) = progress {
        let _ = progress.send(stage).await;
    }
}
