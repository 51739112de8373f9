//! File collection and loading for the analyze command.

use super::setup::SUPPORTED_EXTENSIONS;
use crate::config::ProjectConfig;
use crate::scanner::SourceInput;

use anyhow::{Context, Result};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use tracing::debug;

fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Collect source files under `root`, respecting .gitignore and the
/// project's exclusion patterns. A file target is returned as-is.
pub(super) fn collect_source_files(
    root: &Path,
    target: &Path,
    project_config: &ProjectConfig,
) -> Result<Vec<PathBuf>> {
    if target.is_file() {
        return Ok(vec![target.to_path_buf()]);
    }

    let mut files = Vec::new();
    let walker = WalkBuilder::new(target)
        .hidden(true)
        .git_ignore(true)
        .git_global(false)
        .git_exclude(true)
        .build();

    for entry in walker {
        let entry = entry.context("Failed to walk source directory")?;
        let path = entry.path();
        if !path.is_file() || !has_supported_extension(path) {
            continue;
        }
        let relative = path.strip_prefix(root).unwrap_or(path);
        if project_config.should_exclude(relative) {
            debug!("Excluded by config: {}", relative.display());
            continue;
        }
        files.push(path.to_path_buf());
    }

    files.sort();
    Ok(files)
}

/// File id used in reports: the path relative to the root, `/`-separated
pub(super) fn file_id(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative.to_string_lossy().replace('\\', "/")
}

/// Read every file into a [`SourceInput`]
pub(super) fn load_inputs(root: &Path, files: &[PathBuf]) -> Result<Vec<SourceInput>> {
    files
        .iter()
        .map(|path| {
            let bytes = std::fs::read(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Ok(SourceInput::new(file_id(root, path), bytes))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_filters_extensions_and_excludes() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::create_dir_all(root.join("third_party/zlib")).unwrap();
        std::fs::write(root.join("src/main.cpp"), "int main() {}\n").unwrap();
        std::fs::write(root.join("src/util.HPP"), "#pragma once\n").unwrap();
        std::fs::write(root.join("src/notes.txt"), "new int;\n").unwrap();
        std::fs::write(root.join("third_party/zlib/inflate.c"), "int x;\n").unwrap();

        let config = ProjectConfig::default();
        let files = collect_source_files(root, root, &config).unwrap();
        let ids: Vec<_> = files.iter().map(|f| file_id(root, f)).collect();
        assert_eq!(ids, vec!["src/main.cpp", "src/util.HPP"]);
    }

    #[test]
    fn test_single_file_target() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("one.cc");
        std::fs::write(&file, "int x;\n").unwrap();
        let files = collect_source_files(dir.path(), &file, &ProjectConfig::default()).unwrap();
        assert_eq!(files, vec![file.clone()]);
        assert_eq!(file_id(dir.path(), &file), "one.cc");
    }

    #[test]
    fn test_load_inputs_reads_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.cpp");
        std::fs::write(&file, "int* p = new int;\n").unwrap();
        let inputs = load_inputs(dir.path(), &[file]).unwrap();
        assert_eq!(inputs[0].id, "a.cpp");
        assert_eq!(inputs[0].bytes, b"int* p = new int;\n".to_vec());
    }
}
