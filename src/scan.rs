use anyhow::{Context, Result};
use ignore::WalkBuilder;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::{Config, ScanConfig};
use crate::fingerprint::{
    FileFingerprint, FullFingerprinter, SPARSE_REVISION, SamplingParams, SparseChecksum,
    compute_sparse_fingerprint,
};
use crate::media::MediaSniffer;

#[derive(Debug, Clone, Copy, Default)]
pub struct ScanOptions {
    /// Compute a full fingerprint for every file, not just duplicate candidates
    pub full: bool,
    /// Group files with identical content
    pub duplicates: bool,
}

#[derive(Debug, Serialize)]
pub struct ScanEntry {
    pub path: String,
    pub size_bytes: u64,
    pub sparse: SparseChecksum,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full: Option<FileFingerprint>,
}

/// Files whose full checksums and sizes agree.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct DuplicateGroup {
    pub checksum: String,
    pub size_bytes: u64,
    pub paths: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ScanReport {
    pub root: PathBuf,
    pub sparse_revision: u32,
    pub files_scanned: usize,
    pub files_undetermined: usize,
    pub entries: Vec<ScanEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub duplicates: Vec<DuplicateGroup>,
}

/// Walk a directory respecting ignore files, returning regular file paths
/// in sorted order.
pub fn walk_files(root: &Path, config: &ScanConfig, threads: usize) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let walker = WalkBuilder::new(root)
        .threads(threads)
        .standard_filters(true)
        .hidden(!config.hidden)
        .git_ignore(config.respect_gitignore)
        .ignore(config.respect_gitignore)
        .sort_by_file_path(|a, b| a.cmp(b))
        .build();

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }
        if config.max_file_size > 0 {
            if let Ok(meta) = entry.metadata() {
                if meta.len() > config.max_file_size {
                    debug!(path = %entry.path().display(), size = meta.len(), "skipping large file");
                    continue;
                }
            }
        }
        files.push(entry.into_path());
    }

    Ok(files)
}

/// Sparse-fingerprint every file under `root`; optionally full-fingerprint
/// them and group duplicates.
pub fn scan_directory(root: &Path, config: &Config, options: ScanOptions) -> Result<ScanReport> {
    let root = root
        .canonicalize()
        .with_context(|| format!("resolving path {}", root.display()))?;
    let params = config.sampling_params()?;
    let fingerprinter = config.full_fingerprinter();

    let files = walk_files(&root, &config.scan, config.effective_threads())?;
    info!(root = %root.display(), files = files.len(), "scanning");

    let mut entries = Vec::with_capacity(files.len());
    for path in &files {
        entries.push(scan_file(&root, path, &params, &fingerprinter, options.full));
    }

    let duplicates = if options.duplicates {
        find_duplicates(&root, &mut entries, &fingerprinter)
    } else {
        Vec::new()
    };

    Ok(ScanReport {
        files_scanned: entries.len(),
        files_undetermined: entries.iter().filter(|e| e.sparse.is_undetermined()).count(),
        root,
        sparse_revision: SPARSE_REVISION,
        entries,
        duplicates,
    })
}

fn scan_file<S: MediaSniffer>(
    root: &Path,
    path: &Path,
    params: &SamplingParams,
    fingerprinter: &FullFingerprinter<S>,
    full: bool,
) -> ScanEntry {
    let rel_path = relative(root, path);
    let sparse = compute_sparse_fingerprint(path, params);
    let full = full.then(|| fingerprinter.fingerprint(path, None));
    let size_bytes = match &full {
        Some(fp) => fp.size_bytes(),
        None => std::fs::metadata(path).map(|m| m.len()).unwrap_or(0),
    };
    ScanEntry {
        path: rel_path,
        size_bytes,
        sparse,
        full,
    }
}

/// Group entries with identical content.
///
/// Candidates share a size and a determined sparse checksum; each candidate
/// is then confirmed with a full checksum (computed here if the entry has
/// none). Entries without a checksum never match anything.
pub fn find_duplicates<S: MediaSniffer>(
    root: &Path,
    entries: &mut [ScanEntry],
    fingerprinter: &FullFingerprinter<S>,
) -> Vec<DuplicateGroup> {
    let mut candidates: BTreeMap<(u64, u64), Vec<usize>> = BTreeMap::new();
    for (i, entry) in entries.iter().enumerate() {
        if let Some(sparse) = entry.sparse.get() {
            candidates.entry((entry.size_bytes, sparse)).or_default().push(i);
        }
    }

    let mut confirmed: BTreeMap<(u64, u64), Vec<String>> = BTreeMap::new();
    for indices in candidates.values().filter(|v| v.len() > 1) {
        for &i in indices {
            let entry = &mut entries[i];
            if entry.full.is_none() {
                entry.full = Some(fingerprinter.fingerprint(&root.join(&entry.path), None));
            }
            let Some(fp) = &entry.full else { continue };
            if let Some(checksum) = fp.checksum() {
                confirmed
                    .entry((fp.size_bytes(), checksum))
                    .or_default()
                    .push(entry.path.clone());
            }
        }
    }

    let mut groups: Vec<DuplicateGroup> = confirmed
        .into_iter()
        .filter(|(_, paths)| paths.len() > 1)
        .map(|((size_bytes, checksum), mut paths)| {
            paths.sort();
            DuplicateGroup {
                checksum: format!("{checksum:x}"),
                size_bytes,
                paths,
            }
        })
        .collect();
    groups.sort_by(|a, b| a.paths.cmp(&b.paths));
    groups
}

fn relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .to_string()
}
