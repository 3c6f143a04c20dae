//! XGPO launcher: admission gate, self-update, and wiki content for Grand
//! Piece Online players.

pub mod app;
pub mod error;
pub mod logging;
pub mod messages;
pub mod settings;

pub use app::{Launcher, build_http_client};
pub use error::LaunchError;
pub use messages::{Language, Text};
pub use settings::AppSettings;
