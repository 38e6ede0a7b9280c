// ─── Instance Provider ───
// Owns the on-disk instance store: staging allocation, atomic commit,
// and CRUD over committed instances.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use super::model::{Instance, INSTANCE_CONFIG_FILE};
use crate::core::error::{LauncherError, LauncherResult};

const STAGING_DIR_NAME: &str = ".staging";
const GROUPS_FILE: &str = "instance_groups.json";

/// Exclusively-owned staging directory handle.
///
/// The handle is the only thing that ever destroys a staging directory:
/// dropping it removes the directory and everything under it. Commit
/// consumes the handle after moving the content root out, so the one
/// cleanup path covers every failure, abort, and success-with-residue
/// case alike.
#[derive(Debug)]
pub struct StagingDir {
    path: PathBuf,
}

impl StagingDir {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => info!("Destroyed staging directory {:?}", self.path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Could not destroy staging directory {:?}: {e}", self.path),
        }
    }
}

/// Staging & commit authority for instance storage.
///
/// Implementations must serialize concurrent staging/commit internally;
/// import tasks running in parallel all talk to the same provider.
#[async_trait]
pub trait InstanceProvider: Send + Sync {
    /// Allocate a fresh staging directory for one import task.
    async fn get_staged_instance_path(&self) -> LauncherResult<StagingDir>;

    /// Atomically promote `content_root` (somewhere inside `staging`) into
    /// permanent instance storage under a directory derived from `name`.
    /// Returns the final instance root.
    async fn commit_staged_instance(
        &self,
        staging: StagingDir,
        content_root: &Path,
        name: &str,
        group: Option<&str>,
    ) -> LauncherResult<PathBuf>;
}

/// Stores each instance as a directory under `instances/`, with staging
/// areas hidden away under `instances/.staging/`.
pub struct FolderInstanceProvider {
    instances_dir: PathBuf,
    op_lock: Mutex<()>,
}

impl FolderInstanceProvider {
    pub fn new(instances_dir: PathBuf) -> Self {
        Self {
            instances_dir,
            op_lock: Mutex::new(()),
        }
    }

    pub fn instances_dir(&self) -> &Path {
        &self.instances_dir
    }

    fn staging_root(&self) -> PathBuf {
        self.instances_dir.join(STAGING_DIR_NAME)
    }

    fn groups_path(&self) -> PathBuf {
        self.instances_dir.join(GROUPS_FILE)
    }

    /// List all committed instances. Corrupt descriptors are skipped with
    /// a warning, matching what a launcher UI wants on startup.
    pub async fn list(&self) -> LauncherResult<Vec<Instance>> {
        let mut instances = Vec::new();

        if !self.instances_dir.exists() {
            return Ok(instances);
        }

        let mut entries =
            tokio::fs::read_dir(&self.instances_dir)
                .await
                .map_err(|e| LauncherError::Io {
                    path: self.instances_dir.clone(),
                    source: e,
                })?;

        while let Some(entry) = entries.next_entry().await.map_err(|e| LauncherError::Io {
            path: self.instances_dir.clone(),
            source: e,
        })? {
            let path = entry.path();
            let name = entry.file_name();
            if !path.is_dir() || name.to_string_lossy().starts_with('.') {
                continue;
            }
            if !path.join(INSTANCE_CONFIG_FILE).exists() {
                continue;
            }
            match Instance::load_from(&path).await {
                Ok(instance) => instances.push(instance),
                Err(e) => warn!("Corrupt instance at {:?}: {e}", path),
            }
        }

        Ok(instances)
    }

    /// Load a single committed instance by directory name.
    pub async fn load(&self, dir_name: &str) -> LauncherResult<Instance> {
        let root = self.instances_dir.join(dir_name);
        if !root.join(INSTANCE_CONFIG_FILE).exists() {
            return Err(LauncherError::InstanceNotFound(dir_name.to_string()));
        }
        Instance::load_from(&root).await
    }

    /// Delete a committed instance and its group entry.
    pub async fn delete(&self, dir_name: &str) -> LauncherResult<()> {
        let _guard = self.op_lock.lock().await;

        let root = self.instances_dir.join(dir_name);
        if !root.exists() {
            return Err(LauncherError::InstanceNotFound(dir_name.to_string()));
        }

        tokio::fs::remove_dir_all(&root)
            .await
            .map_err(|e| LauncherError::Io {
                path: root,
                source: e,
            })?;

        let mut groups = self.read_groups().await;
        if groups.remove(dir_name).is_some() {
            self.write_groups(&groups).await;
        }

        info!("Deleted instance {}", dir_name);
        Ok(())
    }

    async fn read_groups(&self) -> BTreeMap<String, String> {
        match tokio::fs::read_to_string(self.groups_path()).await {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("Corrupt {GROUPS_FILE}, starting over: {e}");
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        }
    }

    async fn write_groups(&self, groups: &BTreeMap<String, String>) {
        // Group bookkeeping must not fail a commit that already renamed
        // the instance into place.
        let json = match serde_json::to_string_pretty(groups) {
            Ok(json) => json,
            Err(e) => {
                warn!("Could not serialize {GROUPS_FILE}: {e}");
                return;
            }
        };
        if let Err(e) = tokio::fs::write(self.groups_path(), json).await {
            warn!("Could not write {GROUPS_FILE}: {e}");
        }
    }
}

#[async_trait]
impl InstanceProvider for FolderInstanceProvider {
    async fn get_staged_instance_path(&self) -> LauncherResult<StagingDir> {
        let _guard = self.op_lock.lock().await;

        let path = self.staging_root().join(Uuid::new_v4().to_string());
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|e| LauncherError::Io {
                path: path.clone(),
                source: e,
            })?;

        info!("Allocated staging directory {:?}", path);
        Ok(StagingDir { path })
    }

    async fn commit_staged_instance(
        &self,
        staging: StagingDir,
        content_root: &Path,
        name: &str,
        group: Option<&str>,
    ) -> LauncherResult<PathBuf> {
        let _guard = self.op_lock.lock().await;

        let dir_name = unique_dir_name(&self.instances_dir, &sanitize_dir_name(name));
        let final_root = self.instances_dir.join(&dir_name);

        if let Err(e) = tokio::fs::rename(content_root, &final_root).await {
            warn!(
                "Could not promote {:?} to {:?}: {e}",
                content_root, final_root
            );
            return Err(LauncherError::CommitFailed);
        }

        if let Some(group) = group {
            let mut groups = self.read_groups().await;
            groups.insert(dir_name.clone(), group.to_string());
            self.write_groups(&groups).await;
        }

        info!("Committed instance '{}' at {:?}", name, final_root);

        // Content is out; dropping the handle clears whatever staging
        // residue the pack left around its content root.
        drop(staging);

        Ok(final_root)
    }
}

/// Reduce a display name to something every filesystem accepts.
fn sanitize_dir_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.' | '(' | ')') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = cleaned.trim().trim_start_matches('.').trim();
    if trimmed.is_empty() {
        "instance".to_string()
    } else {
        trimmed.to_string()
    }
}

fn unique_dir_name(instances_dir: &Path, base: &str) -> String {
    if !instances_dir.join(base).exists() {
        return base.to_string();
    }
    let mut n = 1;
    loop {
        let candidate = format!("{base} ({n})");
        if !instances_dir.join(&candidate).exists() {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(dir: &Path) -> FolderInstanceProvider {
        FolderInstanceProvider::new(dir.join("instances"))
    }

    #[test]
    fn sanitize_keeps_reasonable_names_and_mangles_the_rest() {
        assert_eq!(sanitize_dir_name("My Pack (2)"), "My Pack (2)");
        assert_eq!(sanitize_dir_name("a/b\\c:d"), "a_b_c_d");
        assert_eq!(sanitize_dir_name("..hidden"), "hidden");
        assert_eq!(sanitize_dir_name("   "), "instance");
    }

    #[tokio::test]
    async fn dropping_staging_destroys_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let provider = provider(dir.path());

        let staging = provider.get_staged_instance_path().await.unwrap();
        let path = staging.path().to_path_buf();
        assert!(path.is_dir());

        drop(staging);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn commit_promotes_content_and_clears_staging() {
        let dir = tempfile::tempdir().unwrap();
        let provider = provider(dir.path());

        let staging = provider.get_staged_instance_path().await.unwrap();
        let staging_path = staging.path().to_path_buf();
        std::fs::write(staging_path.join("instance.json"), b"{}").unwrap();

        let root = provider
            .commit_staged_instance(staging, &staging_path, "My Pack", Some("Imported"))
            .await
            .unwrap();

        assert_eq!(root, dir.path().join("instances/My Pack"));
        assert!(root.join("instance.json").is_file());
        assert!(!staging_path.exists());

        let groups: BTreeMap<String, String> = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("instances/instance_groups.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(groups.get("My Pack").map(String::as_str), Some("Imported"));
    }

    #[tokio::test]
    async fn commit_with_nested_content_root_discards_the_shell() {
        let dir = tempfile::tempdir().unwrap();
        let provider = provider(dir.path());

        let staging = provider.get_staged_instance_path().await.unwrap();
        let staging_path = staging.path().to_path_buf();
        let nested = staging_path.join("wrapper/pack");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("manifest.json"), b"{}").unwrap();
        std::fs::write(staging_path.join("junk.txt"), b"left behind").unwrap();

        let root = provider
            .commit_staged_instance(staging, &nested, "Nested", None)
            .await
            .unwrap();

        assert!(root.join("manifest.json").is_file());
        assert!(!staging_path.exists());
    }

    #[tokio::test]
    async fn duplicate_names_get_numbered_directories() {
        let dir = tempfile::tempdir().unwrap();
        let provider = provider(dir.path());

        for expected in ["Twice", "Twice (1)", "Twice (2)"] {
            let staging = provider.get_staged_instance_path().await.unwrap();
            let staging_path = staging.path().to_path_buf();
            std::fs::write(staging_path.join("instance.json"), b"{}").unwrap();

            let root = provider
                .commit_staged_instance(staging, &staging_path, "Twice", None)
                .await
                .unwrap();
            assert_eq!(root, dir.path().join("instances").join(expected));
        }
    }

    #[tokio::test]
    async fn failed_commit_still_destroys_staging() {
        let dir = tempfile::tempdir().unwrap();
        let provider = provider(dir.path());

        let staging = provider.get_staged_instance_path().await.unwrap();
        let staging_path = staging.path().to_path_buf();
        let missing = staging_path.join("does-not-exist");

        let result = provider
            .commit_staged_instance(staging, &missing, "Broken", None)
            .await;

        assert!(matches!(result, Err(LauncherError::CommitFailed)));
        assert!(!staging_path.exists());
    }

    #[tokio::test]
    async fn list_skips_staging_and_corrupt_entries() {
        let dir = tempfile::tempdir().unwrap();
        let provider = provider(dir.path());

        // One good instance, one corrupt, plus staging noise.
        let good = dir.path().join("instances/Good");
        std::fs::create_dir_all(&good).unwrap();
        let instance = Instance::new(
            "Good".into(),
            "1.20.1".into(),
            crate::core::instance::LoaderType::Vanilla,
            None,
            good,
        );
        instance.save().await.unwrap();

        let corrupt = dir.path().join("instances/Corrupt");
        std::fs::create_dir_all(&corrupt).unwrap();
        std::fs::write(corrupt.join("instance.json"), b"{ nope").unwrap();

        let _staging = provider.get_staged_instance_path().await.unwrap();

        let listed = provider.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "Good");

        let loaded = provider.load("Good").await.unwrap();
        assert_eq!(loaded.name, "Good");
        assert!(matches!(
            provider.load("Nope").await,
            Err(LauncherError::InstanceNotFound(_))
        ));
    }
}
