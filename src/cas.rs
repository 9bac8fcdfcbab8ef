//! Content-addressable file pool used as a deduplicated, read-only cache
//! (spec.md §4.2). Objects are addressed by their lowercase hex SHA-256
//! digest and sharded two levels deep to keep any one directory small,
//! the layout other_examples' `antlir2_cas_dir` and `px-core` CAS stores use.

use crate::error::Result;
use crate::fileops::hash_file;
use std::path::{Path, PathBuf};

pub struct ContentStore {
    root: PathBuf,
}

impl ContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path an object with the given hash would live at, whether or not it
    /// currently exists.
    pub fn object_path(&self, hash: &str) -> PathBuf {
        let hash = hash.to_ascii_lowercase();
        let shard = if hash.len() >= 2 { &hash[..2] } else { "00" };
        self.root.join(shard).join(hash)
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.object_path(hash).is_file()
    }

    /// Full byte copy of a CAS object into the workspace. Returns `false`
    /// (never an error) if the object is absent — spec.md §4.1.
    pub async fn copy_from_cas(&self, hash: &str, dst: &Path) -> Result<bool> {
        let src = self.object_path(hash);
        if !src.is_file() {
            return Ok(false);
        }
        if let Some(parent) = dst.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(&src, dst).await?;
        Ok(true)
    }

    /// Materialize a CAS object as a hard link (when `use_hard_link` and
    /// same volume) or a symbolic link, falling back to a copy when linking
    /// is impossible. Returns `false` only when the object is absent.
    pub async fn link_from_cas(&self, hash: &str, dst: &Path, use_hard_link: bool) -> Result<bool> {
        let src = self.object_path(hash);
        if !src.is_file() {
            return Ok(false);
        }
        if let Some(parent) = dst.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        if use_hard_link && crate::volume::same_volume(&src, dst.parent().unwrap_or(dst)) {
            let src_owned = src.clone();
            let dst_owned = dst.to_path_buf();
            let linked = tokio::task::spawn_blocking(move || {
                std::fs::hard_link(&src_owned, &dst_owned).is_ok()
            })
            .await
            .unwrap_or(false);
            if linked {
                return Ok(true);
            }
        }

        if symlink_best_effort(&src, dst).await {
            return Ok(true);
        }

        tokio::fs::copy(&src, dst).await?;
        Ok(true)
    }

    /// Store `src`'s bytes under its own content hash, returning the hash.
    /// Population of the CAS is external per spec.md §4.2; this exists for
    /// test fixtures and tooling that seed a store.
    pub async fn put(&self, src: &Path) -> Result<String> {
        let hash = hash_file(src).await?;
        let dst = self.object_path(&hash);
        if !dst.is_file() {
            if let Some(parent) = dst.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::copy(src, &dst).await?;
        }
        Ok(hash)
    }
}

#[cfg(unix)]
async fn symlink_best_effort(src: &Path, dst: &Path) -> bool {
    let src = src.to_path_buf();
    let dst = dst.to_path_buf();
    tokio::task::spawn_blocking(move || std::os::unix::fs::symlink(&src, &dst).is_ok())
        .await
        .unwrap_or(false)
}

#[cfg(windows)]
async fn symlink_best_effort(src: &Path, dst: &Path) -> bool {
    let src = src.to_path_buf();
    let dst = dst.to_path_buf();
    tokio::task::spawn_blocking(move || std::os::windows::fs::symlink_file(&src, &dst).is_ok())
        .await
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn put_then_copy_from_cas_round_trips_content() {
        let root = tempdir().unwrap();
        let store = ContentStore::new(root.path());

        let src_dir = tempdir().unwrap();
        let src = src_dir.path().join("a.big");
        tokio::fs::write(&src, b"cas content").await.unwrap();

        let hash = store.put(&src).await.unwrap();
        assert!(store.contains(&hash));

        let dst = src_dir.path().join("out.big");
        let found = store.copy_from_cas(&hash, &dst).await.unwrap();
        assert!(found);
        assert_eq!(tokio::fs::read(&dst).await.unwrap(), b"cas content");
    }

    #[tokio::test]
    async fn copy_from_cas_missing_object_returns_false_not_error() {
        let root = tempdir().unwrap();
        let store = ContentStore::new(root.path());
        let dst = root.path().join("out.big");
        let found = store.copy_from_cas("0".repeat(64).as_str(), &dst).await.unwrap();
        assert!(!found);
    }

    #[tokio::test]
    async fn link_from_cas_materializes_a_usable_file() {
        let root = tempdir().unwrap();
        let store = ContentStore::new(root.path());

        let src_dir = tempdir().unwrap();
        let src = src_dir.path().join("a.big");
        tokio::fs::write(&src, b"linked content").await.unwrap();
        let hash = store.put(&src).await.unwrap();

        let dst = src_dir.path().join("linked.big");
        let found = store.link_from_cas(&hash, &dst, false).await.unwrap();
        assert!(found);
        assert_eq!(tokio::fs::read(&dst).await.unwrap(), b"linked content");
    }

    #[test]
    fn object_path_shards_by_first_two_hex_chars() {
        let store = ContentStore::new("/cas");
        let path = store.object_path("AB12CD");
        assert_eq!(path, PathBuf::from("/cas/ab/ab12cd"));
    }
}
