// ─── Archive Extraction ───
// Runs zip extraction on the blocking worker pool so the import
// coordinator never stalls on disk or decompression work.

use std::path::{Component, Path, PathBuf};

use tracing::warn;

use crate::core::abort::AbortFlag;
use crate::core::error::{LauncherError, LauncherResult};

/// Extract `archive` into `dest`, returning the relative paths of all
/// extracted files.
///
/// Any zip or IO problem, and an archive with zero file entries, is
/// reported as `ExtractionFailed`; a cancellation request surfaces as
/// `Aborted`. The underlying cause is logged before being collapsed.
pub async fn extract_archive(
    archive: &Path,
    dest: &Path,
    abort: &AbortFlag,
) -> LauncherResult<Vec<PathBuf>> {
    let archive = archive.to_path_buf();
    let dest = dest.to_path_buf();
    let abort = abort.clone();

    let extracted = tokio::task::spawn_blocking(move || extract_blocking(&archive, &dest, &abort))
        .await
        .map_err(|e| LauncherError::Other(format!("extraction worker panicked: {e}")))?;

    match extracted {
        Ok(files) if files.is_empty() => {
            warn!("Archive extracted to zero files, treating as failure");
            Err(LauncherError::ExtractionFailed)
        }
        Ok(files) => Ok(files),
        Err(LauncherError::Aborted) => Err(LauncherError::Aborted),
        Err(e) => {
            warn!("Extraction failed: {e}");
            Err(LauncherError::ExtractionFailed)
        }
    }
}

fn extract_blocking(archive: &Path, dest: &Path, abort: &AbortFlag) -> LauncherResult<Vec<PathBuf>> {
    let file = std::fs::File::open(archive).map_err(|source| LauncherError::Io {
        path: archive.to_path_buf(),
        source,
    })?;
    let mut zip = zip::ZipArchive::new(file)?;

    std::fs::create_dir_all(dest).map_err(|source| LauncherError::Io {
        path: dest.to_path_buf(),
        source,
    })?;

    let mut extracted = Vec::new();

    for index in 0..zip.len() {
        abort.check()?;

        let mut zipped = zip.by_index(index)?;
        let enclosed_name = zipped
            .enclosed_name()
            .ok_or_else(|| LauncherError::Other("Invalid zip entry path".into()))?;

        let mut rel_path = PathBuf::new();
        for component in enclosed_name.components() {
            if let Component::Normal(part) = component {
                rel_path.push(part);
            }
        }

        if rel_path.as_os_str().is_empty() {
            continue;
        }

        let out_path = dest.join(&rel_path);
        if zipped.name().ends_with('/') {
            std::fs::create_dir_all(&out_path).map_err(|source| LauncherError::Io {
                path: out_path,
                source,
            })?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| LauncherError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let mut out = std::fs::File::create(&out_path).map_err(|source| LauncherError::Io {
            path: out_path.clone(),
            source,
        })?;
        std::io::copy(&mut zipped, &mut out).map_err(|source| LauncherError::Io {
            path: out_path,
            source,
        })?;

        extracted.push(rel_path);
    }

    Ok(extracted)
}
