use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::core::abort::AbortFlag;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::net::CacheEntry;

/// Streaming downloader with progress reporting and cooperative abort.
pub struct Downloader {
    client: Client,
}

impl Downloader {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Download `url` to `dest`, streaming chunks to disk.
    ///
    /// `progress` is called after every chunk with `(received, total)`;
    /// `total` is `None` when the server does not announce a length.
    /// Creates parent directories as needed. Drops the file handle
    /// immediately after writing to avoid Windows OS Error 5.
    pub async fn download_with_progress<F>(
        &self,
        url: &str,
        dest: &Path,
        progress: F,
        abort: &AbortFlag,
    ) -> LauncherResult<()>
    where
        F: Fn(u64, Option<u64>),
    {
        abort.check()?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LauncherError::Io {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }

        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LauncherError::DownloadFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let total = response.content_length();
        let mut received: u64 = 0;

        // Write inside a block to ensure the handle is dropped immediately.
        {
            let mut file =
                tokio::fs::File::create(dest)
                    .await
                    .map_err(|e| LauncherError::Io {
                        path: dest.to_path_buf(),
                        source: e,
                    })?;

            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                abort.check()?;
                let chunk = chunk?;
                file.write_all(&chunk)
                    .await
                    .map_err(|e| LauncherError::Io {
                        path: dest.to_path_buf(),
                        source: e,
                    })?;
                received += chunk.len() as u64;
                progress(received, total);
            }

            file.flush().await.map_err(|e| LauncherError::Io {
                path: dest.to_path_buf(),
                source: e,
            })?;
            // file is dropped here — critical on Windows
        }

        debug!("Downloaded: {} -> {:?} ({} bytes)", url, dest, received);
        Ok(())
    }

    /// Download `url` into a metacache entry, skipping the network when the
    /// entry is still fresh. Returns the path the archive ended up at.
    pub async fn download_cached<F>(
        &self,
        url: &str,
        entry: &mut CacheEntry,
        progress: F,
        abort: &AbortFlag,
    ) -> LauncherResult<PathBuf>
    where
        F: Fn(u64, Option<u64>),
    {
        if entry.is_fresh() {
            debug!("Cache hit for {}", url);
            return Ok(entry.path().to_path_buf());
        }

        self.download_with_progress(url, entry.path(), progress, abort)
            .await?;
        entry.set_stale(false);

        Ok(entry.path().to_path_buf())
    }
}
