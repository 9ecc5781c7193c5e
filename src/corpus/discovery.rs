//! Locating split audio files under a corpus root.

use crate::corpus::SplitKind;
use crate::error::{CorpusError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};

/// Audio files and `sph` directories found for each split.
#[derive(Debug, Default)]
pub(crate) struct Discovered {
    pub train: Vec<PathBuf>,
    pub valid: Vec<PathBuf>,
    pub test: Vec<PathBuf>,
}

impl Discovered {
    pub fn take(&mut self, kind: SplitKind) -> Vec<PathBuf> {
        std::mem::take(match kind {
            SplitKind::Train => &mut self.train,
            SplitKind::Valid => &mut self.valid,
            SplitKind::Test => &mut self.test,
        })
    }
}

/// Walk `root` and sort every `<split>/sph/*.sph` file into its split.
///
/// Fails with `CorpusDirNotFound` if `root` is missing or if no
/// `<split>/sph` directory exists anywhere below it.
pub(crate) fn discover(root: &Path) -> Result<Discovered> {
    if !root.is_dir() {
        return Err(CorpusError::CorpusDirNotFound {
            path: root.display().to_string(),
        });
    }

    let mut files = Vec::new();
    let mut dirs = Vec::new();
    walk(root, root, &mut files, &mut dirs)?;
    files.sort();

    let mut discovered = Discovered::default();
    for kind in SplitKind::ALL {
        let name = regex::escape(kind.dir_name());
        let dir_pattern = compile(&format!(r"(^|/){}/sph$", name))?;
        let file_pattern = compile(&format!(r"(^|/){}/sph/[^/]+\.sph$", name))?;

        if !dirs.iter().any(|d| dir_pattern.is_match(d)) {
            return Err(CorpusError::CorpusDirNotFound {
                path: root.join(kind.dir_name()).join("sph").display().to_string(),
            });
        }

        let matched: Vec<PathBuf> = files
            .iter()
            .filter(|(relative, _)| file_pattern.is_match(relative))
            .map(|(_, path)| path.clone())
            .collect();
        log::debug!("Found {} {} speeches", matched.len(), kind);

        match kind {
            SplitKind::Train => discovered.train = matched,
            SplitKind::Valid => discovered.valid = matched,
            SplitKind::Test => discovered.test = matched,
        }
    }

    Ok(discovered)
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| CorpusError::Other(format!("Invalid pattern {}: {}", pattern, e)))
}

/// Slash-separated path of `path` relative to `root`.
fn relative_key(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Every file under `dir` with the given extension, sorted.
pub fn find_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut dirs = Vec::new();
    walk(dir, dir, &mut files, &mut dirs)?;
    let mut matched: Vec<PathBuf> = files
        .into_iter()
        .map(|(_, path)| path)
        .filter(|path| path.extension().is_some_and(|ext| ext == extension))
        .collect();
    matched.sort();
    Ok(matched)
}

/// Recursive directory walk collecting files and directories.
///
/// Symlinked directories are not descended into.
fn walk(
    root: &Path,
    dir: &Path,
    files: &mut Vec<(String, PathBuf)>,
    dirs: &mut Vec<String>,
) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            dirs.push(relative_key(root, &path));
            walk(root, &path, files, dirs)?;
        } else {
            files.push((relative_key(root, &path), path));
        }
    }
    Ok(())
}
