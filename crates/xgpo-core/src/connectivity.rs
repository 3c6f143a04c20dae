use std::time::Duration;

use log::{debug, warn};

pub const DEFAULT_PROBE_URL: &str = "https://www.google.com/generate_204";
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(8);

/// Lightweight internet reachability check run before any policy request.
#[derive(Debug, Clone)]
pub struct ConnectivityProbe {
    url: String,
    timeout: Duration,
}

impl Default for ConnectivityProbe {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_URL, DEFAULT_PROBE_TIMEOUT)
    }
}

impl ConnectivityProbe {
    #[must_use]
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Issue a `HEAD` request; any non-error status counts as reachable.
    /// Timeouts and transport failures count as offline.
    pub async fn is_reachable(&self, client: &reqwest::Client) -> bool {
        let result = client
            .head(&self.url)
            .timeout(self.timeout)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status);

        match result {
            Ok(response) => {
                debug!("Connectivity probe returned HTTP {}", response.status());
                true
            }
            Err(error) => {
                warn!("Connectivity probe to {} failed: {error}", self.url);
                false
            }
        }
    }
}
