use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::import::resolve::ModFileStub;
use crate::core::instance::LoaderType;

/// Marker file of curated third-party packs.
pub const CURATED_MANIFEST_FILE: &str = "manifest.json";

const SUPPORTED_MANIFEST_TYPE: &str = "minecraftModpack";
const SUPPORTED_MANIFEST_VERSION: u32 = 1;

/// Curated pack manifest, as shipped by third-party pack sites.
///
/// ```json
/// {
///   "manifestType": "minecraftModpack",
///   "manifestVersion": 1,
///   "name": "Example Pack",
///   "minecraft": { "version": "1.19.2", "modLoaders": [{ "id": "forge-43.2.0", "primary": true }] },
///   "files": [{ "projectID": 111, "fileID": 2221, "required": true }],
///   "overrides": "overrides"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct CuratedManifest {
    #[serde(rename = "manifestType", default)]
    pub manifest_type: String,
    #[serde(rename = "manifestVersion", default)]
    pub manifest_version: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub author: String,
    pub minecraft: MinecraftSpec,
    #[serde(default)]
    pub files: Vec<ModFileStub>,
    #[serde(default = "default_overrides")]
    pub overrides: String,
}

#[derive(Debug, Deserialize)]
pub struct MinecraftSpec {
    #[serde(default)]
    pub version: String,
    #[serde(rename = "modLoaders", default)]
    pub mod_loaders: Vec<ModLoaderSpec>,
}

#[derive(Debug, Deserialize)]
pub struct ModLoaderSpec {
    pub id: String,
    #[serde(default)]
    pub primary: bool,
}

fn default_overrides() -> String {
    "overrides".to_string()
}

impl CuratedManifest {
    /// The loader the pack targets: the entry marked primary, or the first
    /// one. `None` when the pack is vanilla or the id is unrecognized.
    pub fn primary_loader(&self) -> Option<(LoaderType, String)> {
        let spec = self
            .minecraft
            .mod_loaders
            .iter()
            .find(|l| l.primary)
            .or_else(|| self.minecraft.mod_loaders.first())?;

        match parse_loader_id(&spec.id) {
            Some(parsed) => Some(parsed),
            None => {
                warn!("Unrecognized mod loader id '{}', ignoring", spec.id);
                None
            }
        }
    }

    fn validate(self) -> LauncherResult<Self> {
        if self.manifest_type != SUPPORTED_MANIFEST_TYPE {
            return Err(LauncherError::ManifestValidation(format!(
                "unsupported manifest type '{}'",
                self.manifest_type
            )));
        }
        if self.manifest_version != SUPPORTED_MANIFEST_VERSION {
            warn!(
                "Manifest version {} (expected {}), attempting import anyway",
                self.manifest_version, SUPPORTED_MANIFEST_VERSION
            );
        }
        if self.minecraft.version.is_empty() {
            return Err(LauncherError::ManifestValidation(
                "manifest does not declare a game version".into(),
            ));
        }

        let mut seen = HashSet::new();
        for stub in &self.files {
            if !seen.insert((stub.project_id, stub.file_id)) {
                return Err(LauncherError::ManifestValidation(format!(
                    "duplicate mod file entry (project {}, file {})",
                    stub.project_id, stub.file_id
                )));
            }
        }

        Ok(self)
    }
}

/// Load and validate a curated manifest from disk.
pub async fn load_manifest(path: &Path) -> LauncherResult<CuratedManifest> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| LauncherError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

    let manifest: CuratedManifest = serde_json::from_str(&raw)
        .map_err(|e| LauncherError::ManifestValidation(e.to_string()))?;

    manifest.validate()
}

/// Split a manifest loader id like `forge-43.2.0` into a typed loader and
/// its version (which may itself contain dashes).
pub fn parse_loader_id(id: &str) -> Option<(LoaderType, String)> {
    let (name, version) = id.split_once('-')?;
    let loader = match name {
        "forge" => LoaderType::Forge,
        "fabric" => LoaderType::Fabric,
        "neoforge" => LoaderType::NeoForge,
        "quilt" => LoaderType::Quilt,
        _ => return None,
    };
    Some((loader, version.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_MANIFEST: &str = r#"{
        "manifestType": "minecraftModpack",
        "manifestVersion": 1,
        "name": "Example Pack",
        "version": "2.1",
        "author": "someone",
        "minecraft": {
            "version": "1.19.2",
            "modLoaders": [
                { "id": "fabric-0.16.10", "primary": false },
                { "id": "forge-43.2.0-beta", "primary": true }
            ]
        },
        "files": [
            { "projectID": 111, "fileID": 2221, "required": true },
            { "projectID": 222, "fileID": 2222, "required": true }
        ],
        "overrides": "overrides"
    }"#;

    async fn load_str(raw: &str) -> LauncherResult<CuratedManifest> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CURATED_MANIFEST_FILE);
        std::fs::write(&path, raw).unwrap();
        load_manifest(&path).await
    }

    #[tokio::test]
    async fn parses_a_full_manifest() {
        let manifest = load_str(FULL_MANIFEST).await.unwrap();

        assert_eq!(manifest.name, "Example Pack");
        assert_eq!(manifest.minecraft.version, "1.19.2");
        assert_eq!(manifest.files.len(), 2);
        assert_eq!(manifest.files[0].project_id, 111);
        assert_eq!(manifest.overrides, "overrides");

        // Primary flag wins over list order, and the version keeps its dash.
        let (loader, version) = manifest.primary_loader().unwrap();
        assert_eq!(loader, LoaderType::Forge);
        assert_eq!(version, "43.2.0-beta");
    }

    #[tokio::test]
    async fn rejects_wrong_manifest_type() {
        let result = load_str(r#"{ "manifestType": "texturePack", "minecraft": { "version": "1.19.2" } }"#).await;

        assert!(matches!(
            result,
            Err(LauncherError::ManifestValidation(msg)) if msg.contains("texturePack")
        ));
    }

    #[tokio::test]
    async fn rejects_missing_game_version() {
        let result =
            load_str(r#"{ "manifestType": "minecraftModpack", "minecraft": { "version": "" } }"#)
                .await;

        assert!(matches!(
            result,
            Err(LauncherError::ManifestValidation(msg)) if msg.contains("game version")
        ));
    }

    #[tokio::test]
    async fn rejects_duplicate_file_stubs() {
        let result = load_str(
            r#"{
                "manifestType": "minecraftModpack",
                "manifestVersion": 1,
                "minecraft": { "version": "1.19.2" },
                "files": [
                    { "projectID": 7, "fileID": 9 },
                    { "projectID": 7, "fileID": 9 }
                ]
            }"#,
        )
        .await;

        assert!(matches!(
            result,
            Err(LauncherError::ManifestValidation(msg)) if msg.contains("duplicate")
        ));
    }

    #[tokio::test]
    async fn malformed_json_reads_as_validation_failure() {
        let result = load_str("{ not json").await;
        assert!(matches!(result, Err(LauncherError::ManifestValidation(_))));
    }

    #[test]
    fn loader_id_parsing() {
        assert_eq!(
            parse_loader_id("neoforge-20.4.1"),
            Some((LoaderType::NeoForge, "20.4.1".to_string()))
        );
        assert_eq!(
            parse_loader_id("quilt-0.23.1"),
            Some((LoaderType::Quilt, "0.23.1".to_string()))
        );
        assert_eq!(parse_loader_id("risugami-1.0"), None);
        assert_eq!(parse_loader_id("forge"), None);
    }
}
