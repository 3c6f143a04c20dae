mod commands;
mod paths;

pub use commands::Detach;
pub use paths::{AppPaths, AppPathsError, HOME_ENV};
