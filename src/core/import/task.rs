// ─── Modpack Import Task ───
// One task imports one archive: download if remote, extract into a staging
// directory, detect the pack format, resolve mod files for curated packs,
// and commit the result as a new instance. Any failure after staging has
// been acquired tears the staging directory down before the task reports
// its terminal outcome.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::core::abort::AbortFlag;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::extract::extract_archive;
use crate::core::import::detect::{detect_pack_format, PackFormat};
use crate::core::import::manifest::load_manifest;
use crate::core::import::resolve::FileResolver;
use crate::core::instance::model::{DEFAULT_ICON_KEY, INSTANCE_TYPE};
use crate::core::instance::{Instance, InstanceProvider, LoaderType, StagingDir};
use crate::core::state::AppState;

/// Resolved-but-not-yet-downloaded mod files, written into the pack root
/// for the instance's own download mechanism to pick up after commit.
pub const PENDING_DOWNLOADS_FILE: &str = "pending_downloads.json";

const CACHE_NAMESPACE: &str = "general";

/// Where the archive comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportSource {
    Local(PathBuf),
    Remote(String),
}

impl ImportSource {
    /// Classify a raw user-supplied string as a local path or remote URL.
    pub fn parse(raw: &str) -> ImportSource {
        if raw.starts_with("http://") || raw.starts_with("https://") {
            return ImportSource::Remote(raw.to_string());
        }
        if let Some(path) = raw.strip_prefix("file://") {
            return ImportSource::Local(PathBuf::from(path));
        }
        ImportSource::Local(PathBuf::from(raw))
    }
}

/// Immutable description of one import, built once at task construction.
#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub source: ImportSource,
    pub name: String,
    pub icon_key: String,
    pub group: Option<String>,
}

impl ImportRequest {
    pub fn new(source: ImportSource, name: impl Into<String>) -> Self {
        Self {
            source,
            name: name.into(),
            icon_key: DEFAULT_ICON_KEY.to_string(),
            group: None,
        }
    }

    pub fn with_icon(mut self, icon_key: impl Into<String>) -> Self {
        self.icon_key = icon_key.into();
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }
}

/// Terminal result of an import task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    /// Committed instance root.
    Succeeded(PathBuf),
    /// Human-readable failure reason.
    Failed(String),
    Aborted,
}

/// Observable surface for a UI or automation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    Status(String),
    Progress { current: u64, total: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImportStage {
    Init,
    Downloading,
    Extracting,
    DetectingFormat,
    ProcessingNative,
    ResolvingDependencies,
    Committing,
}

/// State machine driving one modpack import.
///
/// The task itself never blocks: downloads stream on the HTTP client,
/// extraction runs on the blocking pool, and resolution is a spawned job.
/// Multiple tasks may run concurrently against the same `AppState`.
pub struct ImportTask {
    state: Arc<AppState>,
    request: ImportRequest,
    provider: Arc<dyn InstanceProvider>,
    abort: AbortFlag,
    events_tx: UnboundedSender<TaskEvent>,
    events_rx: Option<UnboundedReceiver<TaskEvent>>,
    stage: ImportStage,
}

impl ImportTask {
    pub fn new(state: Arc<AppState>, request: ImportRequest) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let provider: Arc<dyn InstanceProvider> = state.provider.clone();
        Self {
            state,
            request,
            provider,
            abort: AbortFlag::new(),
            events_tx,
            events_rx: Some(events_rx),
            stage: ImportStage::Init,
        }
    }

    /// Take the event stream. Yields `None` after the first call.
    pub fn take_events(&mut self) -> Option<UnboundedReceiver<TaskEvent>> {
        self.events_rx.take()
    }

    /// Clonable handle that cancels this task cooperatively.
    pub fn abort_handle(&self) -> AbortFlag {
        self.abort.clone()
    }

    /// Run the import to its single terminal outcome.
    pub async fn execute(mut self) -> ImportOutcome {
        info!(
            "Importing modpack '{}' from {:?}",
            self.request.name, self.request.source
        );

        match self.run().await {
            Ok(root) => {
                info!("Modpack import finished at {:?}", root);
                ImportOutcome::Succeeded(root)
            }
            Err(LauncherError::Aborted) => {
                info!("Modpack import aborted");
                ImportOutcome::Aborted
            }
            Err(e) => {
                warn!("Modpack import failed: {e}");
                ImportOutcome::Failed(e.to_string())
            }
        }
    }

    async fn run(&mut self) -> LauncherResult<PathBuf> {
        let archive_path = self.resolve_archive().await?;

        self.enter(ImportStage::Extracting);
        self.status("Extracting modpack");
        let staging = self.provider.get_staged_instance_path().await?;
        debug!("Attempting to create instance from {:?}", archive_path);

        // From here on, `staging` is the single owner of the staged tree;
        // every `?` below destroys it on the way out.
        let files = extract_archive(&archive_path, staging.path(), &self.abort).await?;
        debug!("Extracted {} files", files.len());
        self.progress(60, 100);

        self.enter(ImportStage::DetectingFormat);
        let format = detect_pack_format(staging.path()).ok_or(LauncherError::UnrecognizedPack)?;

        match format {
            PackFormat::Native(marker) => self.process_native(staging, &marker).await,
            PackFormat::Curated(marker) => self.process_curated(staging, &marker).await,
        }
    }

    async fn resolve_archive(&mut self) -> LauncherResult<PathBuf> {
        match self.request.source.clone() {
            ImportSource::Local(path) => {
                if !path.is_file() {
                    return Err(LauncherError::Other(format!(
                        "modpack archive not found: {}",
                        path.display()
                    )));
                }
                Ok(path)
            }
            ImportSource::Remote(url) => {
                self.enter(ImportStage::Downloading);
                self.status(format!("Downloading modpack: {url}"));

                let key = cache_key_for_url(&url)?;
                let mut entry = self.state.metacache.resolve_entry(CACHE_NAMESPACE, &key);
                entry.set_stale(true);

                let events = self.events_tx.clone();
                self.state
                    .downloader
                    .download_cached(
                        &url,
                        &mut entry,
                        move |current, total| {
                            // Downloading is the first half of overall progress;
                            // extraction, resolution and commit fill the rest.
                            let _ = events.send(TaskEvent::Progress {
                                current: current / 2,
                                total: total.unwrap_or(0),
                            });
                        },
                        &self.abort,
                    )
                    .await
            }
        }
    }

    async fn process_native(
        &mut self,
        staging: StagingDir,
        marker: &Path,
    ) -> LauncherResult<PathBuf> {
        self.enter(ImportStage::ProcessingNative);
        let root = marker
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| staging.path().to_path_buf());

        let mut instance = Instance::load_from(&root)
            .await
            .map_err(|e| LauncherError::ManifestValidation(e.to_string()))?;

        instance.instance_type = INSTANCE_TYPE.to_string();
        instance.name = self.request.name.clone();
        instance.group = self.request.group.clone();
        instance.reset_time_played();

        // If the caller picked an icon, use it. Otherwise pull the icon
        // shipped inside the pack into the shared registry.
        if self.request.icon_key != DEFAULT_ICON_KEY {
            instance.icon_key = self.request.icon_key.clone();
        } else {
            let key = instance.icon_key.clone();
            let icon_path = root.join(format!("{key}.png"));
            if icon_path.is_file() {
                if self.state.icons.icon_file_exists(&key) {
                    if let Err(e) = self.state.icons.delete_icon(&key) {
                        warn!("Could not replace icon '{key}': {e}");
                    }
                }
                if let Err(e) = self.state.icons.install_icons(&[icon_path]) {
                    warn!("Could not import pack icon '{key}': {e}");
                }
            }
        }

        instance.save().await?;
        self.progress(70, 100);

        self.commit(staging, &root).await
    }

    async fn process_curated(
        &mut self,
        staging: StagingDir,
        marker: &Path,
    ) -> LauncherResult<PathBuf> {
        let manifest = load_manifest(marker).await?;
        let root = marker
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| staging.path().to_path_buf());

        // The target instance is configured up front; resolution only has
        // to confirm the file list is actually obtainable.
        let (loader, loader_version) = match manifest.primary_loader() {
            Some((loader, version)) => (loader, Some(version)),
            None => (LoaderType::Vanilla, None),
        };
        let mut instance = Instance::new(
            self.request.name.clone(),
            manifest.minecraft.version.clone(),
            loader,
            loader_version,
            root.clone(),
        );
        if self.request.icon_key != DEFAULT_ICON_KEY {
            instance.icon_key = self.request.icon_key.clone();
        }
        instance.group = self.request.group.clone();
        instance.save().await?;
        self.progress(70, 100);

        self.enter(ImportStage::ResolvingDependencies);
        self.status(format!("Resolving {} mod files", manifest.files.len()));

        let resolver = FileResolver::new(
            self.state.http_client.clone(),
            self.state.settings.mod_index_url.clone(),
            self.state.settings.mod_index_api_key.clone(),
            manifest.files,
            self.abort.clone(),
        );
        let resolved = resolver.spawn().join().await?;

        for file in &resolved {
            debug!("{} = {}", file.file_name, file.download_url);
        }
        self.status(format!("Resolved {} mod files", resolved.len()));

        // The pipeline's job ends at a resolvable set; the instance's own
        // downloader takes it from here after commit.
        let pending_path = root.join(PENDING_DOWNLOADS_FILE);
        let json = serde_json::to_string_pretty(&resolved)?;
        tokio::fs::write(&pending_path, json)
            .await
            .map_err(|e| LauncherError::Io {
                path: pending_path,
                source: e,
            })?;
        self.progress(85, 100);

        self.commit(staging, &root).await
    }

    async fn commit(&mut self, staging: StagingDir, content_root: &Path) -> LauncherResult<PathBuf> {
        self.abort.check()?;
        self.enter(ImportStage::Committing);
        self.status("Committing instance");

        let final_root = self
            .provider
            .commit_staged_instance(
                staging,
                content_root,
                &self.request.name,
                self.request.group.as_deref(),
            )
            .await?;

        self.progress(100, 100);
        Ok(final_root)
    }

    fn enter(&mut self, stage: ImportStage) {
        debug!("Import stage: {:?} -> {:?}", self.stage, stage);
        self.stage = stage;
    }

    fn status(&self, text: impl Into<String>) {
        let text = text.into();
        info!("{text}");
        let _ = self.events_tx.send(TaskEvent::Status(text));
    }

    fn progress(&self, current: u64, total: u64) {
        let _ = self.events_tx.send(TaskEvent::Progress { current, total });
    }
}

/// Cache key for a remote archive: host plus path, like the rest of the
/// launcher's cached downloads.
fn cache_key_for_url(url: &str) -> LauncherResult<String> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| LauncherError::Other(format!("invalid modpack URL '{url}': {e}")))?;
    Ok(format!(
        "{}{}",
        parsed.host_str().unwrap_or_default(),
        parsed.path()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_classification() {
        assert_eq!(
            ImportSource::parse("https://example.com/pack.zip"),
            ImportSource::Remote("https://example.com/pack.zip".into())
        );
        assert_eq!(
            ImportSource::parse("file:///home/user/pack.zip"),
            ImportSource::Local(PathBuf::from("/home/user/pack.zip"))
        );
        assert_eq!(
            ImportSource::parse("/home/user/pack.zip"),
            ImportSource::Local(PathBuf::from("/home/user/pack.zip"))
        );
    }

    #[test]
    fn cache_key_is_host_and_path() {
        let key = cache_key_for_url("https://example.com/packs/demo.zip?token=abc").unwrap();
        assert_eq!(key, "example.com/packs/demo.zip");

        assert!(cache_key_for_url("not a url").is_err());
    }

    #[test]
    fn request_defaults_and_builders() {
        let request = ImportRequest::new(ImportSource::parse("/tmp/a.zip"), "My Pack")
            .with_icon("flame")
            .with_group("Imported");

        assert_eq!(request.name, "My Pack");
        assert_eq!(request.icon_key, "flame");
        assert_eq!(request.group.as_deref(), Some("Imported"));

        let plain = ImportRequest::new(ImportSource::parse("/tmp/a.zip"), "Plain");
        assert_eq!(plain.icon_key, DEFAULT_ICON_KEY);
        assert!(plain.group.is_none());
    }
}
