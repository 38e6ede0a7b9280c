use std::path::PathBuf;
use thiserror::Error;

/// Central error type for the entire launcher backend.
/// Every module returns `Result<T, LauncherError>`.
#[derive(Debug, Error)]
pub enum LauncherError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download failed for {url}: HTTP {status}")]
    DownloadFailed { url: String, status: u16 },

    // ── Archive ─────────────────────────────────────────
    #[error("Zip extraction error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Failed to extract modpack")]
    ExtractionFailed,

    // ── Modpack import ──────────────────────────────────
    #[error("Archive does not contain a recognized modpack type.")]
    UnrecognizedPack,

    #[error("Could not understand pack manifest: {0}")]
    ManifestValidation(String),

    #[error("Unable to resolve mod file IDs: {0}")]
    DependencyResolution(String),

    #[error("Unable to commit instance")]
    CommitFailed,

    #[error("Instance import has been aborted.")]
    Aborted,

    // ── JSON ────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Instance ────────────────────────────────────────
    #[error("Instance not found: {0}")]
    InstanceNotFound(String),

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type LauncherResult<T> = Result<T, LauncherError>;

impl From<std::io::Error> for LauncherError {
    fn from(source: std::io::Error) -> Self {
        LauncherError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}
