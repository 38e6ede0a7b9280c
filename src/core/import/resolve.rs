use std::collections::HashSet;

use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::core::abort::AbortFlag;
use crate::core::error::{LauncherError, LauncherResult};

/// Parallel requests against the mod index.
const RESOLVE_CONCURRENCY: usize = 4;

/// Hash algorithm ids used by the mod index (1 = SHA-1).
const HASH_ALGO_SHA1: u32 = 1;

/// Opaque (project, file) identifier pair from a curated manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub struct ModFileStub {
    #[serde(rename = "projectID")]
    pub project_id: u32,
    #[serde(rename = "fileID")]
    pub file_id: u32,
    #[serde(default)]
    pub required: bool,
}

/// Concrete downloadable file a stub resolves to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedModFile {
    pub project_id: u32,
    pub file_id: u32,
    pub file_name: String,
    pub download_url: String,
    pub file_length: Option<u64>,
    pub sha1: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModFileResponse {
    data: ModFileData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModFileData {
    file_name: String,
    #[serde(default)]
    download_url: Option<String>,
    #[serde(default)]
    file_length: Option<u64>,
    #[serde(default)]
    hashes: Vec<ModFileHash>,
}

#[derive(Debug, Deserialize)]
struct ModFileHash {
    value: String,
    algo: u32,
}

/// Resolves manifest stubs into downloadable file records.
///
/// One resolver serves one import task: construct it with the stubs,
/// `spawn()` it, and `join()` the returned job. The job either yields one
/// `ResolvedModFile` per input stub or a single failure; partial results
/// are never reported as success.
pub struct FileResolver {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    stubs: Vec<ModFileStub>,
    abort: AbortFlag,
}

/// Handle to a running resolution job.
pub struct ResolveJob {
    handle: JoinHandle<LauncherResult<Vec<ResolvedModFile>>>,
    abort: AbortFlag,
}

impl FileResolver {
    pub fn new(
        client: reqwest::Client,
        base_url: String,
        api_key: Option<String>,
        stubs: Vec<ModFileStub>,
        abort: AbortFlag,
    ) -> Self {
        Self {
            client,
            base_url,
            api_key,
            stubs,
            abort,
        }
    }

    /// Start resolution on its own task.
    pub fn spawn(self) -> ResolveJob {
        let abort = self.abort.clone();
        ResolveJob {
            handle: tokio::spawn(self.run()),
            abort,
        }
    }

    async fn run(self) -> LauncherResult<Vec<ResolvedModFile>> {
        let FileResolver {
            client,
            base_url,
            api_key,
            stubs,
            abort,
        } = self;

        let expected: HashSet<(u32, u32)> = stubs
            .iter()
            .map(|s| (s.project_id, s.file_id))
            .collect();

        let results: Vec<LauncherResult<ResolvedModFile>> = stream::iter(stubs)
            .map(|stub| {
                let client = client.clone();
                let base_url = base_url.clone();
                let api_key = api_key.clone();
                let abort = abort.clone();
                async move { resolve_one(&client, &base_url, api_key.as_deref(), stub, &abort).await }
            })
            .buffer_unordered(RESOLVE_CONCURRENCY)
            .collect()
            .await;

        let mut resolved = Vec::with_capacity(expected.len());
        for result in results {
            resolved.push(result?);
        }

        // Success means exactly one result per input stub.
        let mut seen = HashSet::new();
        for file in &resolved {
            if !seen.insert((file.project_id, file.file_id)) {
                return Err(LauncherError::DependencyResolution(format!(
                    "duplicate result for project {} file {}",
                    file.project_id, file.file_id
                )));
            }
        }
        if seen != expected {
            return Err(LauncherError::DependencyResolution(format!(
                "resolved {} of {} mod files",
                seen.len(),
                expected.len()
            )));
        }

        info!("Resolved {} mod files", resolved.len());
        Ok(resolved)
    }
}

impl ResolveJob {
    /// Request cancellation; the job notices between requests.
    pub fn abort(&self) {
        self.abort.abort();
    }

    /// Wait for the job's terminal result.
    pub async fn join(self) -> LauncherResult<Vec<ResolvedModFile>> {
        self.handle
            .await
            .map_err(|e| LauncherError::Other(format!("resolver task died: {e}")))?
    }
}

async fn resolve_one(
    client: &reqwest::Client,
    base_url: &str,
    api_key: Option<&str>,
    stub: ModFileStub,
    abort: &AbortFlag,
) -> LauncherResult<ResolvedModFile> {
    abort.check()?;

    let url = format!(
        "{}/v1/mods/{}/files/{}",
        base_url.trim_end_matches('/'),
        stub.project_id,
        stub.file_id
    );

    let mut request = client.get(&url);
    if let Some(key) = api_key {
        request = request.header("x-api-key", key);
    }

    let response = request.send().await.map_err(|e| {
        LauncherError::DependencyResolution(format!(
            "project {} file {}: {e}",
            stub.project_id, stub.file_id
        ))
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(LauncherError::DependencyResolution(format!(
            "mod index returned {} for project {} file {}",
            status, stub.project_id, stub.file_id
        )));
    }

    let payload: ModFileResponse = response.json().await.map_err(|e| {
        LauncherError::DependencyResolution(format!(
            "project {} file {}: {e}",
            stub.project_id, stub.file_id
        ))
    })?;

    let data = payload.data;
    let download_url = data
        .download_url
        .filter(|u| !u.is_empty())
        .ok_or_else(|| {
            LauncherError::DependencyResolution(format!(
                "project {} file {} has no download URL",
                stub.project_id, stub.file_id
            ))
        })?;

    debug!(
        "Resolved project {} file {} -> {}",
        stub.project_id, stub.file_id, data.file_name
    );

    Ok(ResolvedModFile {
        project_id: stub.project_id,
        file_id: stub.file_id,
        file_name: data.file_name,
        download_url,
        file_length: data.file_length,
        sha1: data
            .hashes
            .iter()
            .find(|h| h.algo == HASH_ALGO_SHA1)
            .map(|h| h.value.clone()),
    })
}
