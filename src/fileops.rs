//! Single-file I/O primitives (spec.md §4.1), exposed as a capability trait
//! so strategy-level tests can mock it with `mockall` without touching a
//! real filesystem.

use crate::cas::ContentStore;
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncReadExt;

/// Chunk size used when streaming a file through the hasher, to bound
/// memory regardless of file size (spec.md §4.1).
const HASH_CHUNK_BYTES: usize = 64 * 1024;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FileOperations: Send + Sync {
    async fn copy_file(&self, src: &Path, dst: &Path) -> Result<()>;
    async fn create_hard_link(&self, dst: &Path, src: &Path) -> Result<()>;
    async fn create_symlink(&self, dst: &Path, src: &Path, allow_fallback: bool) -> Result<()>;
    async fn verify_file_hash(&self, path: &Path, expected_hex: &str) -> Result<bool>;
    async fn copy_from_cas(&self, hash: &str, dst: &Path) -> Result<bool>;
    async fn link_from_cas(&self, hash: &str, dst: &Path, use_hard_link: bool) -> Result<bool>;
    async fn ensure_directory_exists(&self, path: &Path) -> Result<()>;
    async fn delete_directory_if_exists(&self, path: &Path) -> Result<()>;
}

/// Default, filesystem-backed implementation.
pub struct LocalFileOperations {
    cas: Option<Arc<ContentStore>>,
}

impl LocalFileOperations {
    pub fn new(cas: Option<Arc<ContentStore>>) -> Self {
        Self { cas }
    }
}

#[async_trait]
impl FileOperations for LocalFileOperations {
    async fn copy_file(&self, src: &Path, dst: &Path) -> Result<()> {
        self.ensure_directory_exists(dst.parent().unwrap_or(Path::new(".")))
            .await?;
        tokio::fs::copy(src, dst).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EngineError::NotFound(src.to_path_buf())
            } else {
                EngineError::SourceUnreadable {
                    path: src.to_path_buf(),
                    source: e,
                }
            }
        })?;
        Ok(())
    }

    async fn create_hard_link(&self, dst: &Path, src: &Path) -> Result<()> {
        self.ensure_directory_exists(dst.parent().unwrap_or(Path::new(".")))
            .await?;
        let dst = dst.to_path_buf();
        let src = src.to_path_buf();
        tokio::task::spawn_blocking(move || std::fs::hard_link(&src, &dst))
            .await
            .map_err(|e| EngineError::Other(e.to_string()))?
            .map_err(EngineError::Io)?;
        Ok(())
    }

    async fn create_symlink(&self, dst: &Path, src: &Path, allow_fallback: bool) -> Result<()> {
        self.ensure_directory_exists(dst.parent().unwrap_or(Path::new(".")))
            .await?;
        let result = symlink(src, dst).await;
        match result {
            Ok(()) => Ok(()),
            Err(e) if allow_fallback => {
                tracing::warn!(
                    "symlink {} -> {} refused ({}), falling back to copy",
                    dst.display(),
                    src.display(),
                    e
                );
                self.copy_file(src, dst).await
            }
            Err(e) => Err(EngineError::CapabilityUnsupported(format!(
                "symlink creation refused: {e}"
            ))),
        }
    }

    async fn verify_file_hash(&self, path: &Path, expected_hex: &str) -> Result<bool> {
        let actual = hash_file(path).await?;
        Ok(actual.eq_ignore_ascii_case(expected_hex))
    }

    async fn copy_from_cas(&self, hash: &str, dst: &Path) -> Result<bool> {
        let Some(cas) = &self.cas else {
            return Ok(false);
        };
        cas.copy_from_cas(hash, dst).await
    }

    async fn link_from_cas(&self, hash: &str, dst: &Path, use_hard_link: bool) -> Result<bool> {
        let Some(cas) = &self.cas else {
            return Ok(false);
        };
        cas.link_from_cas(hash, dst, use_hard_link).await
    }

    async fn ensure_directory_exists(&self, path: &Path) -> Result<()> {
        tokio::fs::create_dir_all(path).await?;
        Ok(())
    }

    async fn delete_directory_if_exists(&self, path: &Path) -> Result<()> {
        match tokio::fs::remove_dir_all(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(EngineError::Io(e)),
        }
    }
}

#[cfg(unix)]
async fn symlink(src: &Path, dst: &Path) -> std::io::Result<()> {
    let src = src.to_path_buf();
    let dst = dst.to_path_buf();
    tokio::task::spawn_blocking(move || std::os::unix::fs::symlink(&src, &dst))
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?
}

#[cfg(windows)]
async fn symlink(src: &Path, dst: &Path) -> std::io::Result<()> {
    let src = src.to_path_buf();
    let dst = dst.to_path_buf();
    tokio::task::spawn_blocking(move || std::os::windows::fs::symlink_file(&src, &dst))
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?
}

/// Streams `path` through SHA-256 in fixed-size chunks so hashing a large
/// file never requires loading it whole into memory.
pub async fn hash_file(path: &Path) -> Result<String> {
    let mut file = tokio::fs::File::open(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            EngineError::NotFound(path.to_path_buf())
        } else {
            EngineError::SourceUnreadable {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })?;

    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_CHUNK_BYTES];
    loop {
        let read = file.read(&mut buf).await.map_err(|e| EngineError::SourceUnreadable {
            path: path.to_path_buf(),
            source: e,
        })?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}
