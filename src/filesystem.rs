//! On-disk tree helpers used by snapshots and change-set computation

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Recursively copies `src` into `dst`, creating `dst` if needed.
///
/// Symlinks are recreated as links on Unix and copied as their target's
/// contents elsewhere.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)?;

    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry?;
        let relative = entry.path().strip_prefix(src).map_err(|_| {
            Error::Io(io::Error::other(format!(
                "Failed to make path relative: {}",
                entry.path().display()
            )))
        })?;
        let target = dst.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }

    Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    let link = fs::read_link(src)?;
    std::os::unix::fs::symlink(link, dst)?;
    Ok(())
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    fs::copy(src, dst)?;
    Ok(())
}

/// Lists every regular file under `dir`, recursively and sorted.
///
/// A missing directory yields an empty list.
pub fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// True if `dir` holds at least one regular file not named `manifest_name`.
pub fn has_files_besides(dir: &Path, manifest_name: &str) -> Result<bool> {
    Ok(list_files(dir)?
        .iter()
        .any(|path| path.file_name().is_none_or(|name| name != manifest_name)))
}

/// SHA-256 digest of a file's content, hex encoded.
pub fn file_digest(path: &Path) -> Result<String> {
    let content = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&content);
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_copy_tree_is_a_full_copy() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        fs::create_dir_all(src.path().join("a/b")).unwrap();
        fs::write(src.path().join("a/b/file.tf"), "resource {}").unwrap();
        fs::write(src.path().join("root.txt"), "root").unwrap();

        copy_tree(src.path(), dst.path()).unwrap();
        assert_eq!(
            fs::read_to_string(dst.path().join("a/b/file.tf")).unwrap(),
            "resource {}"
        );

        // later mutation of the source does not leak into the copy
        fs::write(src.path().join("root.txt"), "changed").unwrap();
        assert_eq!(fs::read_to_string(dst.path().join("root.txt")).unwrap(), "root");
    }

    #[test]
    fn test_list_files_sorted_and_recursive() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("b.tf"), "").unwrap();
        fs::write(dir.path().join("a.tf"), "").unwrap();
        fs::write(dir.path().join("nested/c.tf"), "").unwrap();

        let files: Vec<_> = list_files(dir.path())
            .unwrap()
            .into_iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            files,
            vec![
                PathBuf::from("a.tf"),
                PathBuf::from("b.tf"),
                PathBuf::from("nested/c.tf")
            ]
        );
    }

    #[test]
    fn test_list_files_missing_dir() {
        let dir = TempDir::new().unwrap();
        assert!(list_files(&dir.path().join("missing")).unwrap().is_empty());
    }

    #[test]
    fn test_has_files_besides() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("component.yaml"), "spec: {}").unwrap();
        assert!(!has_files_besides(dir.path(), "component.yaml").unwrap());

        fs::create_dir_all(dir.path().join("modules")).unwrap();
        assert!(!has_files_besides(dir.path(), "component.yaml").unwrap());

        fs::write(dir.path().join("modules/main.tf"), "").unwrap();
        assert!(has_files_besides(dir.path(), "component.yaml").unwrap());
    }

    #[test]
    fn test_file_digest() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a"), "same").unwrap();
        fs::write(dir.path().join("b"), "same").unwrap();
        fs::write(dir.path().join("c"), "different").unwrap();

        let a = file_digest(&dir.path().join("a")).unwrap();
        assert_eq!(a, file_digest(&dir.path().join("b")).unwrap());
        assert_ne!(a, file_digest(&dir.path().join("c")).unwrap());
        assert_eq!(a.len(), 64);
    }
}
