//! Moving project files between disk and a run.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use ignore::overrides::{Override, OverrideBuilder};
use ignore::WalkBuilder;
use tracing::debug;

use appweaver_core::normalize_path;

use super::error::{AppError, AppResult};

/// Directories never read into a project.
const SKIPPED_DIRS: &[&str] = &["node_modules", "target", "dist", "build"];

/// Read every UTF-8 file under `root`, keyed by `/`-separated relative path.
/// Hidden entries, `.gitignore`d paths and dependency/output directories
/// are skipped.
pub fn read_project_dir(root: &Path) -> AppResult<BTreeMap<String, String>> {
    if !root.is_dir() {
        return Err(AppError::config(format!(
            "{} is not a directory",
            root.display()
        )));
    }

    let walker = WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .git_exclude(true)
        .git_global(false)
        .require_git(false)
        .overrides(skipped_dirs(root)?)
        .build();

    let mut files = BTreeMap::new();
    for entry in walker {
        let entry = entry.map_err(|e| AppError::internal(format!("walk failed: {}", e)))?;
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }
        let path = entry.path();
        let Ok(content) = fs::read_to_string(path) else {
            debug!(path = %path.display(), "skipping non-UTF-8 file");
            continue;
        };
        let relative = path
            .strip_prefix(root)
            .map_err(|e| AppError::internal(e.to_string()))?;
        let key = normalize_path(&relative.to_string_lossy())?;
        files.insert(key, content);
    }
    debug!(root = %root.display(), count = files.len(), "read project directory");
    Ok(files)
}

fn skipped_dirs(root: &Path) -> AppResult<Override> {
    let mut builder = OverrideBuilder::new(root);
    for dir in SKIPPED_DIRS {
        builder
            .add(&format!("!{}/", dir))
            .map_err(|e| AppError::internal(e.to_string()))?;
    }
    builder.build().map_err(|e| AppError::internal(e.to_string()))
}

/// Write `files` under `root`, creating directories as needed. Returns the
/// number of files written.
pub fn write_project_dir(root: &Path, files: &BTreeMap<String, String>) -> AppResult<usize> {
    for (path, content) in files {
        let relative = normalize_path(path)?;
        let target = root.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, content)?;
    }
    debug!(root = %root.display(), count = files.len(), "wrote project directory");
    Ok(files.len())
}
