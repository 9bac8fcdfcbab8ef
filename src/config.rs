//! Ambient engine tuning, independent of any one workspace (SPEC_FULL.md
//! §3.3). `WorkspaceConfiguration` (`workspace.rs`) is the per-preparation
//! domain input and is never persisted; `EngineConfig` is the much smaller
//! knob set this crate owns across preparations: read `config.toml` if it
//! exists, otherwise fall back to `Default::default()`.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Tuning knobs that apply across every workspace preparation on this host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Override the scheduler's computed parallelism (spec.md §4.5);
    /// `None` defers to `strategy::base::parallelism_for`.
    pub parallelism_override: Option<usize>,

    /// When the `HardLink` strategy's CAS dispatch has a choice, prefer a
    /// hard link over a symlink (spec.md §4.2's link-from-CAS mode).
    pub prefer_hard_link_from_cas: bool,

    /// Disk-cost proxy for a single link entry, in bytes (spec.md
    /// §GLOSSARY "Link overhead"). Exposed for hosts whose filesystem
    /// metadata overhead differs meaningfully from the 1 KiB default.
    pub link_overhead_bytes: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parallelism_override: None,
            prefer_hard_link_from_cas: true,
            link_overhead_bytes: crate::strategy::base::LINK_OVERHEAD_BYTES,
        }
    }
}

impl EngineConfig {
    /// Load from `<config_dir>/engine.toml`, falling back to defaults when
    /// the file is absent.
    pub async fn load() -> Result<Self> {
        let path = config_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = tokio::fs::read_to_string(&path)
            .await
            .context("failed to read engine config file")?;
        toml::from_str(&content).context("failed to parse engine config file")
    }

    pub async fn save(&self) -> Result<()> {
        let path = config_path()?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("failed to create engine config directory")?;
        }
        let content = toml::to_string_pretty(self).context("failed to serialize engine config")?;
        tokio::fs::write(&path, content)
            .await
            .context("failed to write engine config file")?;
        Ok(())
    }
}

fn config_path() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("", "", "workspace-composer")
        .context("failed to determine project config directory")?;
    Ok(dirs.config_dir().join("engine.toml"))
}
