// ─── Download Metacache ───
// On-disk content cache for remote downloads, keyed by (namespace, key).

use std::path::{Path, PathBuf};

use sha1::{Digest, Sha1};

/// A single slot in the metacache.
///
/// The entry only names a location; the downloader is responsible for
/// filling it. An entry marked stale is re-downloaded even when a file is
/// already present at its path.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    path: PathBuf,
    stale: bool,
}

impl CacheEntry {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn set_stale(&mut self, stale: bool) {
        self.stale = stale;
    }

    /// A fresh entry can be served without touching the network.
    pub fn is_fresh(&self) -> bool {
        !self.stale && self.path.is_file()
    }
}

/// Maps (namespace, key) pairs to stable cache file paths.
///
/// Keys are free-form (the import pipeline uses `host/path` of the source
/// URL); they are hashed so arbitrary strings cannot escape the cache dir.
pub struct MetaCache {
    base_dir: PathBuf,
}

impl MetaCache {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn resolve_entry(&self, namespace: &str, key: &str) -> CacheEntry {
        let mut hasher = Sha1::new();
        hasher.update(key.as_bytes());
        let digest = hex::encode(hasher.finalize());

        CacheEntry {
            path: self.base_dir.join(namespace).join(digest),
            stale: false,
        }
    }
}
