//! Manifest data model: declarative descriptions of what a workspace should contain.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The kind of content bundle a manifest represents. Determines priority in
/// conflict resolution: higher priority wins when two manifests contribute
/// the same relative path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    GameInstallation,
    GameClient,
    Mod,
}

impl ContentType {
    /// Numeric priority: higher wins on path conflicts.
    pub fn priority(&self) -> u8 {
        match self {
            ContentType::GameInstallation => 0,
            ContentType::GameClient => 1,
            ContentType::Mod => 2,
        }
    }
}

/// How a file's content should be retrieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    LocalFile,
    GameInstallation,
    ContentAddressable,
}

/// A single file record within a manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestFile {
    pub relative_path: PathBuf,
    pub source_type: SourceType,
    pub source_path: Option<PathBuf>,
    /// Lowercase hex content hash. Mandatory for `ContentAddressable`.
    pub hash: Option<String>,
    pub size: u64,
    #[serde(default)]
    pub is_executable: bool,
}

impl ManifestFile {
    /// Size to use for progress/estimation, backfilled from disk without
    /// mutating the original record (spec design note: never write back
    /// through the shared manifest).
    pub fn effective_size(&self, resolved_source: &std::path::Path) -> u64 {
        if self.size > 0 {
            return self.size;
        }
        std::fs::metadata(resolved_source)
            .map(|m| m.len())
            .unwrap_or(0)
    }
}

/// A set of file records plus metadata describing one logical piece of content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub id: String,
    pub content_type: ContentType,
    pub files: Vec<ManifestFile>,
}
