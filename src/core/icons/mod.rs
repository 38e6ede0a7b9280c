// ─── Icon Registry ───
// Shared store for instance icons, keyed by icon name. Imports may install
// or replace icons concurrently, so every operation takes the internal lock.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{info, warn};

use crate::core::error::{LauncherError, LauncherResult};

pub struct IconRegistry {
    icons_dir: PathBuf,
    lock: Mutex<()>,
}

impl IconRegistry {
    pub fn new(icons_dir: PathBuf) -> Self {
        Self {
            icons_dir,
            lock: Mutex::new(()),
        }
    }

    fn icon_path(&self, key: &str) -> PathBuf {
        self.icons_dir.join(format!("{key}.png"))
    }

    pub fn icon_file_exists(&self, key: &str) -> bool {
        let _guard = self.lock.lock().unwrap();
        self.icon_path(key).is_file()
    }

    pub fn delete_icon(&self, key: &str) -> LauncherResult<()> {
        let _guard = self.lock.lock().unwrap();
        let path = self.icon_path(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(LauncherError::Io { path, source }),
        }
    }

    /// Copy icon files into the registry. The icon key is the file stem, so
    /// installing `<dir>/mypack.png` makes it available under `mypack`.
    pub fn install_icons(&self, paths: &[PathBuf]) -> LauncherResult<()> {
        let _guard = self.lock.lock().unwrap();
        std::fs::create_dir_all(&self.icons_dir).map_err(|source| LauncherError::Io {
            path: self.icons_dir.clone(),
            source,
        })?;

        for source_path in paths {
            let Some(file_name) = source_path.file_name() else {
                warn!("Skipping icon with no file name: {:?}", source_path);
                continue;
            };
            let dest = self.icons_dir.join(file_name);
            std::fs::copy(source_path, &dest).map_err(|source| LauncherError::Io {
                path: source_path.clone(),
                source,
            })?;
            info!("Installed icon {:?}", file_name);
        }

        Ok(())
    }

    pub fn icons_dir(&self) -> &Path {
        &self.icons_dir
    }
}
