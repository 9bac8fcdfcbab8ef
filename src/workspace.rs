//! Workspace identity, configuration, and output data model.

use crate::manifest::Manifest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// The policy for how files in a workspace relate to their sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    FullCopy,
    SymlinkOnly,
    HardLink,
    HybridCopySymlink,
}

/// Reference to the launcher binary a workspace is built around.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameClientRef {
    pub id: String,
    /// Last-resort filename hint used when no manifest flags an executable.
    pub executable_path: Option<PathBuf>,
}

/// Inputs to a single preparation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfiguration {
    pub id: String,
    pub workspace_root_path: PathBuf,
    pub strategy: Strategy,
    pub manifests: Vec<Manifest>,
    pub base_installation_path: PathBuf,
    #[serde(default)]
    pub manifest_source_paths: HashMap<String, PathBuf>,
    pub game_client: GameClientRef,
    #[serde(default)]
    pub force_recreate: bool,
}

impl WorkspaceConfiguration {
    pub fn workspace_path(&self) -> PathBuf {
        self.workspace_root_path.join(&self.id)
    }
}

/// Severity of a single validation issue attached to a `WorkspaceInfo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub message: String,
    pub severity: Severity,
}

impl ValidationIssue {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: Severity::Info,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: Severity::Warning,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: Severity::Error,
        }
    }
}

/// Output of a preparation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceInfo {
    pub id: String,
    pub workspace_path: PathBuf,
    pub game_client_id: String,
    pub strategy: Strategy,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub file_count: u64,
    pub total_size_bytes: i64,
    pub executable_path: Option<PathBuf>,
    pub working_directory: Option<PathBuf>,
    pub is_prepared: bool,
    pub is_valid: bool,
    pub validation_issues: Vec<ValidationIssue>,
}

impl WorkspaceInfo {
    /// Build a failed, pre-check-rejected `WorkspaceInfo` with no filesystem
    /// side effects (spec.md §4.7).
    pub fn rejected(config: &WorkspaceConfiguration, reason: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: config.id.clone(),
            workspace_path: config.workspace_path(),
            game_client_id: config.game_client.id.clone(),
            strategy: config.strategy,
            created_at: now,
            last_accessed_at: now,
            file_count: 0,
            total_size_bytes: 0,
            executable_path: None,
            working_directory: None,
            is_prepared: false,
            is_valid: false,
            validation_issues: vec![ValidationIssue::error(reason)],
        }
    }
}
