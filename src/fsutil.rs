//! Filesystem helpers shared by import, execution, and health checks

use sha2::{Digest, Sha256};
use std::path::Path;
use walkdir::WalkDir;

/// Copy a directory tree. VCS metadata (`.git`) is not part of the
/// installed artifact and is skipped.
pub fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dst)?;

    for entry in WalkDir::new(src).min_depth(1).into_iter().filter_entry(not_vcs) {
        let entry = entry.map_err(|e| {
            std::io::Error::other(format!("walk {}: {}", src.display(), e))
        })?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .expect("walkdir entry outside root");
        let target = dst.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &target)?;
        }
        // Symlinks are dropped: an installed skill must be self-contained
    }
    Ok(())
}

/// SHA-256 over every file under `dir` in sorted relative-path order.
/// Each file's relative path is mixed into the hash so renames change the
/// sum, not just content edits.
pub fn checksum_dir(dir: &Path) -> std::io::Result<String> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).into_iter().filter_entry(not_vcs) {
        let entry = entry.map_err(|e| {
            std::io::Error::other(format!("walk {}: {}", dir.display(), e))
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    files.sort();

    let mut hasher = Sha256::new();
    for path in files {
        let relative = path.strip_prefix(dir).expect("walkdir entry outside root");
        hasher.update(relative.to_string_lossy().as_bytes());
        hasher.update([0u8]);
        hasher.update(std::fs::read(&path)?);
    }
    Ok(hex::encode(hasher.finalize()))
}

fn not_vcs(entry: &walkdir::DirEntry) -> bool {
    entry.file_name() != ".git"
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_copy_preserves_nested_files() {
        let src = TempDir::new().unwrap();
        std::fs::create_dir_all(src.path().join("sub/deep")).unwrap();
        std::fs::write(src.path().join("a.txt"), "alpha").unwrap();
        std::fs::write(src.path().join("sub/deep/b.txt"), "beta").unwrap();

        let dst = TempDir::new().unwrap();
        copy_dir_recursive(src.path(), dst.path()).unwrap();

        assert_eq!(std::fs::read_to_string(dst.path().join("a.txt")).unwrap(), "alpha");
        assert_eq!(
            std::fs::read_to_string(dst.path().join("sub/deep/b.txt")).unwrap(),
            "beta"
        );
    }

    #[test]
    fn test_copy_skips_git_dir() {
        let src = TempDir::new().unwrap();
        std::fs::create_dir_all(src.path().join(".git")).unwrap();
        std::fs::write(src.path().join(".git/HEAD"), "ref: main").unwrap();
        std::fs::write(src.path().join("keep.txt"), "keep").unwrap();

        let dst = TempDir::new().unwrap();
        copy_dir_recursive(src.path(), dst.path()).unwrap();

        assert!(dst.path().join("keep.txt").exists());
        assert!(!dst.path().join(".git").exists());
    }

    #[test]
    fn test_checksum_is_stable_and_content_sensitive() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "one").unwrap();
        std::fs::write(dir.path().join("b.txt"), "two").unwrap();

        let first = checksum_dir(dir.path()).unwrap();
        let second = checksum_dir(dir.path()).unwrap();
        assert_eq!(first, second);

        std::fs::write(dir.path().join("b.txt"), "changed").unwrap();
        assert_ne!(checksum_dir(dir.path()).unwrap(), first);
    }

    #[test]
    fn test_checksum_sees_renames() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "same").unwrap();
        let before = checksum_dir(dir.path()).unwrap();

        std::fs::rename(dir.path().join("a.txt"), dir.path().join("z.txt")).unwrap();
        assert_ne!(checksum_dir(dir.path()).unwrap(), before);
    }
}
