use std::collections::BTreeMap;
use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use xgpo_core::{
    ConnectivityProbe, GateResult, GateStage, Relaunch, RemoteConfig, UpdateExecutor,
    UpdateGatekeeper, UpdateProgress, cache_background,
};
use xgpo_core::connectivity::DEFAULT_PROBE_URL;
use xgpo_platform::AppPaths;
use xgpo_wiki::{Category, ContentAggregator, SearchBackend, WikiClient};

use crate::error::LaunchError;
use crate::messages::{Language, Text};
use crate::settings::AppSettings;

/// One process-wide client; every request inherits its timeouts.
///
/// # Errors
/// Returns an error if the TLS backend cannot be initialised.
pub fn build_http_client(settings: &AppSettings) -> Result<reqwest::Client, LaunchError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(settings.http_timeout_secs))
        .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
        .user_agent(format!("xgpo/{}", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(LaunchError::HttpClient)
}

/// Everything the presentation layer may call: admission, update, and
/// content aggregation.
pub struct Launcher {
    client: reqwest::Client,
    language: Language,
    gatekeeper: UpdateGatekeeper,
    executor: UpdateExecutor,
    aggregator: ContentAggregator,
    background_dir: Option<PathBuf>,
}

impl Launcher {
    #[must_use]
    pub fn new(client: &reqwest::Client, settings: &AppSettings, language: Language) -> Self {
        let probe = ConnectivityProbe::new(
            DEFAULT_PROBE_URL,
            Duration::from_secs(settings.probe_timeout_secs),
        );
        let wiki: Arc<dyn SearchBackend> = Arc::new(
            WikiClient::new(client).with_extract_concurrency(settings.extract_concurrency),
        );

        Self {
            client: client.clone(),
            language,
            gatekeeper: UpdateGatekeeper::new(client).with_probe(probe),
            executor: UpdateExecutor::new(client)
                .with_download_timeout(Duration::from_secs(settings.update_timeout_secs)),
            aggregator: ContentAggregator::new(wiki)
                .with_concurrency(settings.category_concurrency)
                .with_render_options(language.render_options()),
            background_dir: AppPaths::new()
                .ok()
                .map(|paths| paths.background_cache_dir()),
        }
    }

    #[must_use]
    pub fn with_gatekeeper(mut self, gatekeeper: UpdateGatekeeper) -> Self {
        self.gatekeeper = gatekeeper;
        self
    }

    #[must_use]
    pub fn with_executor(mut self, executor: UpdateExecutor) -> Self {
        self.executor = executor;
        self
    }

    #[must_use]
    pub fn with_search_backend(mut self, backend: Arc<dyn SearchBackend>, concurrency: usize) -> Self {
        self.aggregator = ContentAggregator::new(backend)
            .with_concurrency(concurrency)
            .with_render_options(self.language.render_options());
        self
    }

    #[must_use]
    pub fn with_background_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.background_dir = dir;
        self
    }

    /// # Errors
    /// Returns an error when the remote policy cannot be fetched or decoded.
    pub async fn check_and_gate(
        &self,
        progress: Option<&mpsc::Sender<GateStage>>,
    ) -> Result<GateResult, LaunchError> {
        Ok(self.gatekeeper.check_and_gate(progress).await?)
    }

    /// Download, verify, stage, and hand the update to the swap helper.
    /// The caller must exit promptly afterwards.
    ///
    /// # Errors
    /// Returns an error if any update step fails; the running binary is left
    /// untouched.
    pub async fn dispatch_update(
        &self,
        config: &RemoteConfig,
        progress: Option<&mpsc::Sender<UpdateProgress>>,
    ) -> Result<Relaunch, LaunchError> {
        let relaunch = self.executor.execute(config, progress).await?;
        info!(
            "Update {} staged at {}, helper pid {}",
            config.latest_version,
            relaunch.staged_path.display(),
            relaunch.helper_pid
        );
        Ok(relaunch)
    }

    /// Never returns on success: the process exits so the helper can swap the
    /// binary and relaunch it.
    ///
    /// # Errors
    /// Returns an error if the update could not be dispatched.
    pub async fn perform_update(&self, config: &RemoteConfig) -> Result<Infallible, LaunchError> {
        let (tx, mut rx) = mpsc::channel::<UpdateProgress>(32);
        let reporter = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                debug!("Update progress: {event:?}");
            }
        });

        let result = self.dispatch_update(config, Some(&tx)).await;
        drop(tx);
        let _ = reporter.await;
        result?;

        eprintln!("{}", self.language.text(Text::Relaunching));
        log::logger().flush();
        std::process::exit(0)
    }

    /// Cache the policy's background image; failures are only logged.
    pub async fn cache_background(&self, config: &RemoteConfig) -> Option<PathBuf> {
        let dir = self.background_dir.as_deref()?;
        match cache_background(&self.client, &config.background_image_url, dir).await {
            Ok(path) => Some(path),
            Err(error) => {
                warn!("Background image not cached: {error}");
                None
            }
        }
    }

    /// # Errors
    /// Returns [`LaunchError::Aggregate`] when `cancel` fires first.
    pub async fn aggregate(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<BTreeMap<Category, String>, LaunchError> {
        Ok(self.aggregator.aggregate(query, cancel).await?)
    }

    /// One launcher session: admission, then either the mandatory update or
    /// the rendered wiki sections for `query`.
    ///
    /// # Errors
    /// Returns the first error that ends the session, including
    /// [`LaunchError::Blocked`] when admission is refused.
    pub async fn run(&self, query: &str, cancel: &CancellationToken) -> Result<String, LaunchError> {
        eprintln!("{}", self.language.text(Text::Checking));
        let (tx, mut rx) = mpsc::channel::<GateStage>(8);
        let reporter = tokio::spawn(async move {
            while let Some(stage) = rx.recv().await {
                debug!("Gate {stage:?} ({}%)", stage.progress_percent());
            }
        });
        let gate = self.check_and_gate(Some(&tx)).await;
        drop(tx);
        let _ = reporter.await;

        let config = match gate? {
            GateResult::Proceed(config) => config,
            GateResult::Blocked(reason) => return Err(LaunchError::Blocked(reason)),
            GateResult::UpdateRequired(config) => {
                eprintln!("{}", self.language.text(Text::UpdateRequired));
                return self.perform_update(&config).await.map(|never| match never {});
            }
        };

        if let Some(path) = self.cache_background(&config).await {
            debug!("Background image at {}", path.display());
        }

        let sections = self.aggregate(query, cancel).await?;
        Ok(self.format_sections(&sections))
    }

    /// Render aggregated content as labelled sections in category order.
    #[must_use]
    pub fn format_sections(&self, sections: &BTreeMap<Category, String>) -> String {
        sections
            .iter()
            .map(|(category, text)| {
                format!("=== {} ===\n\n{text}", self.language.category_label(*category))
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
