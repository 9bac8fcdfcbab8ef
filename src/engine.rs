//! Selector / engine entrypoint (spec.md §4.7, §6): picks the strategy
//! named by a configuration, runs its capability pre-check with zero
//! filesystem side effects, and otherwise dispatches straight into
//! `strategy::base::prepare_workspace`. Grounded on `mods/mod.rs`'s
//! `ModManager` acting as an orchestrating facade over deployment methods.

use crate::error::Result;
use crate::fileops::FileOperations;
use crate::strategy::base::{
    prepare_workspace, CapabilityRequirement, HostCapabilities, ProgressSink, RealHostCapabilities,
};
use crate::strategy::strategy_for;
use crate::workspace::{WorkspaceConfiguration, WorkspaceInfo};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Outcome of the selector's capability pre-check (spec.md §6 `supports`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupportOutcome {
    Ok,
    RequiresAdmin,
    RequiresSameVolume,
}

impl SupportOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, SupportOutcome::Ok)
    }
}

/// The engine surface a caller drives: `prepare`, `estimate`, `supports`
/// (spec.md §6). Holds the host's `FileOperations` capability and a
/// `HostCapabilities` probe so tests can substitute both.
pub struct WorkspaceEngine {
    fileops: Arc<dyn FileOperations>,
    host: Arc<dyn HostCapabilities>,
}

impl WorkspaceEngine {
    pub fn new(fileops: Arc<dyn FileOperations>) -> Self {
        Self {
            fileops,
            host: Arc::new(RealHostCapabilities),
        }
    }

    pub fn with_host(fileops: Arc<dyn FileOperations>, host: Arc<dyn HostCapabilities>) -> Self {
        Self { fileops, host }
    }

    /// Capability pre-check with zero filesystem side effects (spec.md
    /// §4.7). `CapabilityRequirement::None` always succeeds; the other two
    /// variants are checked against the host probe.
    pub fn supports(&self, config: &WorkspaceConfiguration) -> SupportOutcome {
        let strategy = strategy_for(config.strategy);
        match strategy.requirements() {
            CapabilityRequirement::None => SupportOutcome::Ok,
            CapabilityRequirement::RequiresElevation => {
                if self.host.has_elevation() {
                    SupportOutcome::Ok
                } else {
                    SupportOutcome::RequiresAdmin
                }
            }
            CapabilityRequirement::RequiresSameVolume => {
                if self
                    .host
                    .same_volume(&config.base_installation_path, &config.workspace_root_path)
                {
                    SupportOutcome::Ok
                } else {
                    SupportOutcome::RequiresSameVolume
                }
            }
        }
    }

    /// Saturating byte estimate for the configuration's strategy (spec.md
    /// §6 `estimate`). Pure; no filesystem access.
    pub fn estimate(&self, config: &WorkspaceConfiguration) -> i64 {
        strategy_for(config.strategy).estimate_disk_usage(config)
    }

    /// Prepare a workspace. A failed pre-check returns a rejected
    /// `WorkspaceInfo` with no filesystem side effects (spec.md §4.7); past
    /// that point all cleanup-on-failure semantics live in
    /// `strategy::base::prepare_workspace`.
    pub async fn prepare(
        &self,
        config: &WorkspaceConfiguration,
        progress: ProgressSink,
        cancel: CancellationToken,
    ) -> Result<WorkspaceInfo> {
        match self.supports(config) {
            SupportOutcome::Ok => {}
            SupportOutcome::RequiresAdmin => {
                return Ok(WorkspaceInfo::rejected(
                    config,
                    format!(
                        "strategy {:?} requires elevated privileges not present on this host",
                        config.strategy
                    ),
                ));
            }
            SupportOutcome::RequiresSameVolume => {
                return Ok(WorkspaceInfo::rejected(
                    config,
                    format!(
                        "strategy {:?} requires the source and workspace root on the same volume",
                        config.strategy
                    ),
                ));
            }
        }

        let strategy = strategy_for(config.strategy);
        prepare_workspace(strategy, config, self.fileops.clone(), progress, cancel).await
    }
}
