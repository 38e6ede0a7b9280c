pub mod core;

pub use crate::core::error::{LauncherError, LauncherResult};
pub use crate::core::import::{
    ImportOutcome, ImportRequest, ImportSource, ImportTask, TaskEvent,
};
pub use crate::core::instance::{Instance, LoaderType};
pub use crate::core::state::{AppState, LauncherSettings};

use tracing_subscriber::EnvFilter;

/// Initialize structured logging for binaries embedding the backend.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,mantle=debug")),
        )
        .init();
}
