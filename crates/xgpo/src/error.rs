use thiserror::Error;
use xgpo_core::{AdmissionFailure, BlockReason, GateError, UpdateError};
use xgpo_wiki::AggregateError;

use crate::messages::{Language, Text};

/// Everything that ends a launcher session early. The `Display` text goes to
/// the log; users only ever see [`LaunchError::user_message`].
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("admission blocked: {0:?}")]
    Blocked(BlockReason),

    #[error(transparent)]
    Gate(#[from] GateError),

    #[error("update failed: {0}")]
    Update(#[from] UpdateError),

    #[error(transparent)]
    Aggregate(#[from] AggregateError),
}

impl LaunchError {
    #[must_use]
    pub fn admission_failure(&self) -> Option<AdmissionFailure> {
        match self {
            Self::Blocked(reason) => Some((*reason).into()),
            Self::Gate(error) => Some(error.into()),
            Self::Update(error) => Some(error.into()),
            Self::HttpClient(_) | Self::Aggregate(_) => None,
        }
    }

    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Aggregate(AggregateError::Cancelled) => 130,
            Self::HttpClient(_) => 1,
            _ => match self.admission_failure() {
                Some(AdmissionFailure::Offline) => 2,
                Some(AdmissionFailure::Maintenance) => 3,
                Some(AdmissionFailure::ConfigUnavailable | AdmissionFailure::ConfigDecode) => 4,
                Some(
                    AdmissionFailure::UpdateDownload
                    | AdmissionFailure::UpdateIntegrity
                    | AdmissionFailure::UpdateInstall,
                ) => 5,
                None => 1,
            },
        }
    }

    #[must_use]
    pub fn user_message(&self, language: Language) -> &'static str {
        match self {
            Self::Aggregate(AggregateError::Cancelled) => language.text(Text::Cancelled),
            Self::HttpClient(_) => language.text(Text::StartupFailed),
            _ => self.admission_failure().map_or_else(
                || language.text(Text::StartupFailed),
                |failure| language.failure_message(failure),
            ),
        }
    }
}
