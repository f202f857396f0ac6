//! File system utilities.

use crate::Result;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

/// Resolve `path` against `root` and remove `.` and `..` components.
///
/// Purely lexical: symlinks are not followed and the path need not exist.
pub fn normalize_path(root: &Path, path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Check whether a path exists without following a final symlink.
pub async fn path_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).await.is_ok()
}

/// Create the parent directory of `path` if needed.
pub async fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !path_exists(parent).await {
            fs::create_dir_all(parent).await?;
        }
    }
    Ok(())
}

/// Move a file from one location to another.
pub async fn move_file(from: &Path, to: &Path) -> Result<()> {
    ensure_parent(to).await?;

    // Try rename first (fast, same filesystem)
    if fs::rename(from, to).await.is_ok() {
        return Ok(());
    }

    // Fall back to copy + delete (cross filesystem)
    fs::copy(from, to).await?;
    fs::remove_file(from).await?;
    Ok(())
}

/// Follow a symlink at `path` to the file it points to.
///
/// Returns `path` unchanged when it is not a link or the link is dangling.
pub async fn resolve_link(path: &Path) -> PathBuf {
    match fs::symlink_metadata(path).await {
        Ok(meta) if meta.file_type().is_symlink() => fs::canonicalize(path)
            .await
            .unwrap_or_else(|_| path.to_path_buf()),
        _ => path.to_path_buf(),
    }
}

/// Write `contents` to `path` through a temporary file and a rename.
///
/// Readers see either the old file or the complete new one. A symlink at
/// `path` is written through and stays a link.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let target = resolve_link(path).await;
    ensure_parent(&target).await?;

    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let contents = contents.to_vec();

    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let mut temp = tempfile::NamedTempFile::new_in(&dir)?;
        temp.write_all(&contents)?;
        temp.persist(&target).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(|e| crate::Error::other(format!("write task failed: {}", e)))??;
    Ok(())
}

/// Remove a file, returning false when it was already gone.
pub async fn remove_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_relative() {
        let root = Path::new("/project");
        assert_eq!(
            normalize_path(root, Path::new("src/./lib.rs")),
            PathBuf::from("/project/src/lib.rs")
        );
        assert_eq!(
            normalize_path(root, Path::new("src/../README.md")),
            PathBuf::from("/project/README.md")
        );
    }

    #[test]
    fn test_normalize_absolute_ignores_root() {
        let root = Path::new("/project");
        assert_eq!(
            normalize_path(root, Path::new("/other/./x.txt")),
            PathBuf::from("/other/x.txt")
        );
    }

    #[tokio::test]
    async fn test_write_atomic_creates_parents() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("a").join("b").join("file.json");

        write_atomic(&path, b"{}").await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}");
        assert_eq!(std::fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_write_atomic_leaves_siblings_alone() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        let sibling = dir.path().join("a.txt.tmp");
        std::fs::write(&sibling, "unrelated").unwrap();

        write_atomic(&path, b"content").await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "content");
        assert_eq!(std::fs::read_to_string(&sibling).unwrap(), "unrelated");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_write_atomic_through_symlink() {
        let dir = tempfile::TempDir::new().unwrap();
        let real = dir.path().join("real.txt");
        let link = dir.path().join("link.txt");
        std::fs::write(&real, "old").unwrap();
        std::os::unix::fs::symlink(&real, &link).unwrap();

        write_atomic(&link, b"new").await.unwrap();

        assert!(std::fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(std::fs::read_to_string(&real).unwrap(), "new");
    }

    #[tokio::test]
    async fn test_move_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let from = dir.path().join("from.txt");
        let to = dir.path().join("nested").join("to.txt");
        std::fs::write(&from, "data").unwrap();

        move_file(&from, &to).await.unwrap();

        assert!(!from.exists());
        assert_eq!(std::fs::read_to_string(&to).unwrap(), "data");
    }

    #[tokio::test]
    async fn test_remove_if_exists() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("gone.txt");
        std::fs::write(&path, "x").unwrap();

        assert!(remove_if_exists(&path).await.unwrap());
        assert!(!remove_if_exists(&path).await.unwrap());
    }
}
