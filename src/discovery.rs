use crate::config::IngestConfig;
use crate::error::IngestError;
use crate::log;
use crate::pipeline::{IngestSummary, ingest_with_config};
use std::path::{Path, PathBuf};

const ARCHIVE_SUFFIXES: [&str; 3] = [".pgn.zst", ".zst", ".pgn"];

/// Expands a glob pattern into archive paths, sorted. A pattern without
/// wildcards is taken as a single path.
pub fn resolve_archive_paths(pattern: &str) -> Result<Vec<PathBuf>, IngestError> {
    let mut paths: Vec<PathBuf> = if pattern.contains(['*', '?', '[']) {
        glob::glob(pattern)?
            .filter_map(|entry| entry.ok())
            .filter(|path| path.is_file())
            .collect()
    } else {
        vec![PathBuf::from(pattern)]
    };
    paths.sort();
    Ok(paths)
}

/// `<root>/<archive file name without its archive suffix>`.
pub fn archive_output_dir(root: &Path, archive: &Path) -> PathBuf {
    let name = archive
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = ARCHIVE_SUFFIXES
        .iter()
        .find_map(|suffix| name.strip_suffix(suffix))
        .filter(|stem| !stem.is_empty())
        .unwrap_or(name.as_str());
    root.join(stem)
}

/// Ingests every archive matching `pattern`, each into its own directory under
/// `root`, in path order.
///
/// With several archives, one that cannot be opened is logged and skipped.
/// Any other failure stops the run.
pub fn ingest_all(
    pattern: &str,
    root: &Path,
    config: &IngestConfig,
) -> Result<Vec<(PathBuf, IngestSummary)>, IngestError> {
    let paths = resolve_archive_paths(pattern)?;
    if paths.is_empty() {
        log::warn(format!("No archives match '{}'", pattern));
    }

    let mut summaries = Vec::with_capacity(paths.len());
    for path in &paths {
        let destination = archive_output_dir(root, path);
        match ingest_with_config(path, &destination, config) {
            Ok(summary) => summaries.push((path.clone(), summary)),
            Err(err @ IngestError::OpenArchive { .. }) if paths.len() > 1 => {
                log::warn(err.to_string());
            }
            Err(err) => return Err(err),
        }
    }
    Ok(summaries)
}
