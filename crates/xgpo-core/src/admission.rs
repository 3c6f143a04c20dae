use crate::gate::{BlockReason, GateError};
use crate::self_update::UpdateError;

/// Every reason the launcher refuses to run. Each variant maps to exactly one
/// user-facing message; the underlying error text is for the log only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdmissionFailure {
    /// No internet; retrying later may help.
    Offline,
    /// The server declared maintenance.
    Maintenance,
    /// Connectivity was fine but the policy could not be fetched.
    ConfigUnavailable,
    /// The policy document is malformed.
    ConfigDecode,
    UpdateDownload,
    UpdateIntegrity,
    /// Staging or helper hand-off failed after a verified download.
    UpdateInstall,
}

impl AdmissionFailure {
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Offline | Self::ConfigUnavailable | Self::UpdateDownload)
    }
}

impl From<BlockReason> for AdmissionFailure {
    fn from(reason: BlockReason) -> Self {
        match reason {
            BlockReason::Offline => Self::Offline,
            BlockReason::Maintenance => Self::Maintenance,
        }
    }
}

impl From<&GateError> for AdmissionFailure {
    fn from(error: &GateError) -> Self {
        match error {
            GateError::ConfigUnavailable(_) => Self::ConfigUnavailable,
            GateError::ConfigDecode(_) => Self::ConfigDecode,
        }
    }
}

impl From<&UpdateError> for AdmissionFailure {
    fn from(error: &UpdateError) -> Self {
        match error {
            UpdateError::DownloadFailed { .. }
            | UpdateError::DownloadStatus(_)
            | UpdateError::TooLarge { .. } => Self::UpdateDownload,
            UpdateError::IntegrityCheckFailed { .. } => Self::UpdateIntegrity,
            UpdateError::ExecutablePath(_)
            | UpdateError::Staging { .. }
            | UpdateError::HandOff { .. } => Self::UpdateInstall,
        }
    }
}
