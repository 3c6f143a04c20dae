use log::debug;
use reqwest::Url;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::version::Version;

const DEFAULT_CONFIG_URL: &str =
    "https://raw.githubusercontent.com/xurras/xgpo-launcher/main/remote_config.json";

const SHA256_HEX_LEN: usize = 64;

/// Remote policy URL baked in at build time (`XGPO_CONFIG_URL`), falling back
/// to the published launcher repository.
#[must_use]
pub fn config_url() -> &'static str {
    option_env!("XGPO_CONFIG_URL").unwrap_or(DEFAULT_CONFIG_URL)
}

/// Launcher policy published by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub app_online: bool,
    pub min_version: Version,
    pub latest_version: Version,
    pub update_url: Url,
    /// Lower-case hex SHA-256 of the artifact behind `update_url`.
    pub update_sha256: String,
    pub background_image_url: String,
}

/// Result of decoding a policy document.
///
/// A document that declares the app offline is honoured even when the rest of
/// it is incomplete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDocument {
    Maintenance,
    Config(RemoteConfig),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to fetch remote config: {0}")]
    Request(#[source] reqwest::Error),
    #[error("remote config request failed with HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("remote config is not valid JSON: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("remote config must be a JSON object")]
    NotAnObject,
    #[error("remote config is missing required field '{0}'")]
    MissingField(&'static str),
    #[error("remote config field '{field}' is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

impl ConfigError {
    /// Whether the failure happened on the wire rather than in the document.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Request(_) | Self::Status(_))
    }
}

#[derive(Deserialize)]
struct RawRemoteConfig {
    #[serde(rename = "apponline")]
    app_online: Option<bool>,
    #[serde(rename = "minversion")]
    min_version: Option<String>,
    #[serde(rename = "latestversion")]
    latest_version: Option<String>,
    #[serde(rename = "updateurl")]
    update_url: Option<String>,
    #[serde(rename = "updatesha256")]
    update_sha256: Option<String>,
    #[serde(rename = "backgroundimageurl", default)]
    background_image_url: Option<String>,
}

impl RawRemoteConfig {
    fn into_config(self, app_online: bool) -> Result<RemoteConfig, ConfigError> {
        let min_version = parse_version("minVersion", self.min_version)?;
        let latest_version = parse_version("latestVersion", self.latest_version)?;

        let update_url = self
            .update_url
            .ok_or(ConfigError::MissingField("updateUrl"))?;
        let update_url = Url::parse(update_url.trim()).map_err(|error| {
            ConfigError::InvalidField {
                field: "updateUrl",
                reason: error.to_string(),
            }
        })?;

        let update_sha256 = self
            .update_sha256
            .ok_or(ConfigError::MissingField("updateSha256"))?;
        let update_sha256 = update_sha256.trim();
        if update_sha256.len() != SHA256_HEX_LEN
            || !update_sha256.chars().all(|ch| ch.is_ascii_hexdigit())
        {
            return Err(ConfigError::InvalidField {
                field: "updateSha256",
                reason: format!("expected {SHA256_HEX_LEN} hex characters"),
            });
        }

        Ok(RemoteConfig {
            app_online,
            min_version,
            latest_version,
            update_url,
            update_sha256: update_sha256.to_ascii_lowercase(),
            background_image_url: self.background_image_url.unwrap_or_default(),
        })
    }
}

fn parse_version(field: &'static str, value: Option<String>) -> Result<Version, ConfigError> {
    let value = value.ok_or(ConfigError::MissingField(field))?;
    value
        .parse::<Version>()
        .map_err(|error| ConfigError::InvalidField {
            field,
            reason: error.to_string(),
        })
}

/// Lower-case keys and drop `_`/`-` so `appOnline`, `AppOnline` and
/// `app_online` all land on the same field.
fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|ch| *ch != '_' && *ch != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

fn parse_raw(body: &[u8]) -> Result<RawRemoteConfig, ConfigError> {
    let value: Value = serde_json::from_slice(body).map_err(ConfigError::Decode)?;
    let Value::Object(object) = value else {
        return Err(ConfigError::NotAnObject);
    };

    let normalized: Map<String, Value> = object
        .into_iter()
        .map(|(key, value)| (normalize_key(&key), value))
        .collect();

    serde_json::from_value(Value::Object(normalized)).map_err(ConfigError::Decode)
}

impl RemoteConfig {
    /// Strictly decode a policy document; every required field must be present.
    ///
    /// # Errors
    /// Returns an error if the body is not a JSON object, a required field is
    /// missing, or a field fails validation.
    pub fn decode(body: &[u8]) -> Result<Self, ConfigError> {
        let raw = parse_raw(body)?;
        let app_online = raw.app_online.ok_or(ConfigError::MissingField("appOnline"))?;
        raw.into_config(app_online)
    }
}

/// Decode a policy document, honouring maintenance mode before validating the
/// version and update fields.
///
/// # Errors
/// Returns an error if the body is malformed, `appOnline` is absent, or an
/// online document fails validation.
pub fn decode_policy(body: &[u8]) -> Result<PolicyDocument, ConfigError> {
    let raw = parse_raw(body)?;
    match raw.app_online {
        None => Err(ConfigError::MissingField("appOnline")),
        Some(false) => Ok(raw
            .into_config(false)
            .map_or(PolicyDocument::Maintenance, PolicyDocument::Config)),
        Some(true) => raw.into_config(true).map(PolicyDocument::Config),
    }
}

/// Fetch and decode the remote policy document.
///
/// # Errors
/// Returns [`ConfigError::Request`]/[`ConfigError::Status`] on transport
/// failures and a decode variant when the document is malformed.
pub async fn fetch_policy(
    client: &reqwest::Client,
    url: &str,
) -> Result<PolicyDocument, ConfigError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(ConfigError::Request)?;

    if !response.status().is_success() {
        return Err(ConfigError::Status(response.status()));
    }

    let body = response.bytes().await.map_err(ConfigError::Request)?;
    debug!("Fetched remote config ({} bytes) from {url}", body.len());
    decode_policy(&body)
}
