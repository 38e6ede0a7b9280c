use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::core::error::{LauncherError, LauncherResult};

/// File name of the persisted instance descriptor. Doubles as the marker
/// that identifies an archive as already being in Mantle's own layout.
pub const INSTANCE_CONFIG_FILE: &str = "instance.json";

/// Canonical instance type written by this launcher. Imported descriptors
/// may declare older or foreign types; import normalizes them to this.
pub const INSTANCE_TYPE: &str = "mantle";

/// Icon key sentinel meaning "no icon chosen by the caller".
pub const DEFAULT_ICON_KEY: &str = "default";

/// Supported mod loaders — strongly typed, no magic strings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LoaderType {
    Vanilla,
    Forge,
    Fabric,
    NeoForge,
    Quilt,
}

impl Default for LoaderType {
    fn default() -> Self {
        LoaderType::Vanilla
    }
}

impl std::fmt::Display for LoaderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoaderType::Vanilla => write!(f, "vanilla"),
            LoaderType::Forge => write!(f, "forge"),
            LoaderType::Fabric => write!(f, "fabric"),
            LoaderType::NeoForge => write!(f, "neoforge"),
            LoaderType::Quilt => write!(f, "quilt"),
        }
    }
}

/// Lifecycle state of an instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InstanceState {
    /// Instance metadata exists but files haven't been downloaded.
    Created,
    /// Currently downloading / installing.
    Installing,
    /// Ready to launch.
    Ready,
    /// Game is running.
    Running,
    /// Something went wrong during install.
    Error,
}

impl Default for InstanceState {
    fn default() -> Self {
        InstanceState::Created
    }
}

/// Full instance representation persisted to disk as `instance.json`.
///
/// The descriptor is parsed leniently: everything except the name and game
/// version has a default, so descriptors written by older versions (or
/// found inside imported archives) still load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub name: String,
    pub minecraft_version: String,
    #[serde(default)]
    pub loader: LoaderType,
    #[serde(default)]
    pub loader_version: Option<String>,
    /// Declared layout type; `"legacy"` when the descriptor predates it.
    #[serde(default = "default_instance_type")]
    pub instance_type: String,
    #[serde(default = "default_icon_key")]
    pub icon_key: String,
    #[serde(default)]
    pub group: Option<String>,

    // ── Internal state ──
    #[serde(default = "default_instance_id")]
    pub id: String,
    #[serde(default)]
    pub state: InstanceState,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_played: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_played_seconds: u64,

    /// Directory this instance lives in. Derived from where the descriptor
    /// was loaded from, never persisted (instances move on commit).
    #[serde(skip)]
    pub path: PathBuf,
}

fn default_instance_type() -> String {
    "legacy".to_string()
}

fn default_icon_key() -> String {
    DEFAULT_ICON_KEY.to_string()
}

fn default_instance_id() -> String {
    Uuid::new_v4().to_string()
}

impl Instance {
    /// Create a new instance descriptor rooted at `root`.
    pub fn new(
        name: String,
        minecraft_version: String,
        loader: LoaderType,
        loader_version: Option<String>,
        root: PathBuf,
    ) -> Self {
        Self {
            name,
            minecraft_version,
            loader,
            loader_version,
            instance_type: INSTANCE_TYPE.to_string(),
            icon_key: DEFAULT_ICON_KEY.to_string(),
            group: None,
            id: default_instance_id(),
            state: InstanceState::Created,
            created_at: Utc::now(),
            last_played: None,
            total_played_seconds: 0,
            path: root,
        }
    }

    /// Path to this instance's descriptor file.
    pub fn config_path(&self) -> PathBuf {
        self.path.join(INSTANCE_CONFIG_FILE)
    }

    /// Packs are imported fresh, not resumed.
    pub fn reset_time_played(&mut self) {
        self.total_played_seconds = 0;
        self.last_played = None;
    }

    /// Load the descriptor stored in `root`, remembering `root` as the
    /// instance path.
    pub async fn load_from(root: &Path) -> LauncherResult<Instance> {
        let config_path = root.join(INSTANCE_CONFIG_FILE);
        let json = tokio::fs::read_to_string(&config_path)
            .await
            .map_err(|e| LauncherError::Io {
                path: config_path.clone(),
                source: e,
            })?;

        let mut instance: Instance = serde_json::from_str(&json)?;
        instance.path = root.to_path_buf();
        Ok(instance)
    }

    /// Persist the descriptor to `<path>/instance.json`.
    pub async fn save(&self) -> LauncherResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        let config_path = self.config_path();

        tokio::fs::write(&config_path, json)
            .await
            .map_err(|e| LauncherError::Io {
                path: config_path,
                source: e,
            })?;

        Ok(())
    }
}
