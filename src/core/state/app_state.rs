use std::path::PathBuf;
use std::sync::Arc;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::core::downloader::Downloader;
use crate::core::http::build_http_client;
use crate::core::icons::IconRegistry;
use crate::core::instance::FolderInstanceProvider;
use crate::core::net::MetaCache;

const APP_DIR_NAME: &str = "Mantle";
const SETTINGS_FILE: &str = "launcher_settings.json";
const DEFAULT_MOD_INDEX_URL: &str = "https://api.curseforge.com";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LauncherSettings {
    /// Base URL of the mod index used to resolve curated pack file ids.
    pub mod_index_url: String,
    pub mod_index_api_key: Option<String>,
}

impl Default for LauncherSettings {
    fn default() -> Self {
        Self {
            mod_index_url: DEFAULT_MOD_INDEX_URL.to_string(),
            mod_index_api_key: None,
        }
    }
}

/// Global launcher state shared by all import tasks: directories,
/// settings, HTTP client, and the services built on top of them.
pub struct AppState {
    pub data_dir: PathBuf,
    pub settings: LauncherSettings,
    pub http_client: Client,
    pub downloader: Downloader,
    pub metacache: MetaCache,
    pub icons: Arc<IconRegistry>,
    pub provider: Arc<FolderInstanceProvider>,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_data_dir(default_data_dir())
    }

    /// Build the state rooted at an explicit data directory. Tests and
    /// portable installs use this instead of the platform default.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        let _ = std::fs::create_dir_all(&data_dir);

        let http_client = build_http_client().expect("Failed to build HTTP client");
        let downloader = Downloader::new(http_client.clone());
        let metacache = MetaCache::new(data_dir.join("cache"));
        let icons = Arc::new(IconRegistry::new(data_dir.join("icons")));
        let provider = Arc::new(FolderInstanceProvider::new(data_dir.join("instances")));
        let settings = load_settings_from_disk(&data_dir).unwrap_or_default();

        Self {
            data_dir,
            settings,
            http_client,
            downloader,
            metacache,
            icons,
            provider,
        }
    }

    pub fn instances_dir(&self) -> PathBuf {
        self.data_dir.join("instances")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join("cache")
    }

    pub fn icons_dir(&self) -> PathBuf {
        self.data_dir.join("icons")
    }

    pub fn save_settings(&self) -> std::io::Result<()> {
        let settings_path = self.data_dir.join(SETTINGS_FILE);
        let json = serde_json::to_string_pretty(&self.settings)?;
        std::fs::write(settings_path, json)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

fn load_settings_from_disk(data_dir: &PathBuf) -> Option<LauncherSettings> {
    let path = data_dir.join(SETTINGS_FILE);
    let raw = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&raw).ok()
}

fn default_data_dir() -> PathBuf {
    let dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME);

    if !dir.exists() {
        let _ = std::fs::create_dir_all(&dir);
    }

    dir
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_persist_and_reload() {
        let dir = tempfile::tempdir().unwrap();

        let mut state = AppState::with_data_dir(dir.path().to_path_buf());
        assert_eq!(state.settings.mod_index_url, DEFAULT_MOD_INDEX_URL);

        state.settings.mod_index_url = "https://index.example".into();
        state.settings.mod_index_api_key = Some("secret".into());
        state.save_settings().unwrap();

        let reloaded = AppState::with_data_dir(dir.path().to_path_buf());
        assert_eq!(reloaded.settings.mod_index_url, "https://index.example");
        assert_eq!(reloaded.settings.mod_index_api_key.as_deref(), Some("secret"));
    }
}
