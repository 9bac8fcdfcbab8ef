//! Shared scaffolding used by every materialization strategy: progress
//! reporting, file-group deduplication, bounded parallel scheduling, CAS
//! dispatch with fallback, cleanup, and executable resolution.
//!
//! Generalized from `mods/deploy.rs`'s `deploy_mods` dedup/priority loop and
//! `queue/processor.rs`'s semaphore fan-out, from the single "download N
//! mods" work item to "materialize N file groups."

use crate::error::{EngineError, Result};
use crate::fileops::FileOperations;
use crate::manifest::{ContentType, Manifest, ManifestFile};
use crate::resolver::{normalize, resolve_source_path};
use crate::volume::VolumeKind;
use crate::workspace::{ValidationIssue, WorkspaceConfiguration, WorkspaceInfo};
use async_trait::async_trait;
use chrono::Utc;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

/// Disk cost assigned to a hard or symbolic link in size estimates and
/// `TotalSizeBytes` accounting (spec.md §3 invariant 2, §GLOSSARY).
pub const LINK_OVERHEAD_BYTES: u64 = 1024;

/// Host capability a strategy needs before it can run, checked by the
/// selector's pre-check (spec.md §4.7) with zero filesystem side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityRequirement {
    None,
    RequiresElevation,
    RequiresSameVolume,
}

/// A single progress tick, emitted at least every 50 groups and once at
/// completion (spec.md §4.5).
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub files_processed: u64,
    pub total_files: u64,
    pub current_operation: &'static str,
    pub current_file: PathBuf,
}

pub type ProgressSink = Option<mpsc::UnboundedSender<ProgressUpdate>>;

const PROGRESS_TICK_INTERVAL: u64 = 50;

/// One manifest's contribution to a file group, with its source path already
/// resolved (spec.md §4.3) so strategies never need the owning manifest or
/// configuration again.
#[derive(Debug, Clone)]
pub struct GroupRecord {
    pub manifest_id: String,
    pub content_type: ContentType,
    pub file: ManifestFile,
    pub source_path: PathBuf,
}

/// All records across every manifest that target the same workspace-relative
/// destination, ordered ascending by `ContentType::priority()`.
#[derive(Debug, Clone)]
pub struct FileGroup {
    /// Canonical (first-seen) casing of the shared relative path.
    pub relative_path: PathBuf,
    /// Absolute path under the workspace root this group materializes to.
    pub destination: PathBuf,
    pub records: Vec<GroupRecord>,
}

impl FileGroup {
    /// The record that wins conflict resolution: highest priority, last in
    /// ascending order.
    pub fn winner(&self) -> &GroupRecord {
        self.records.last().expect("file groups are never empty")
    }
}

/// Group `manifests`' files by case-insensitive `RelativePath`, resolving
/// each record's source path eagerly. Direct generalization of
/// `deploy_mods`'s `file_map`/`dir_case_map` construction into a typed,
/// strategy-agnostic step reused by all four strategies.
pub fn dedup_file_groups(manifests: &[Manifest], config: &WorkspaceConfiguration) -> Vec<FileGroup> {
    let mut groups: std::collections::HashMap<String, FileGroup> = std::collections::HashMap::new();

    for manifest in manifests {
        for file in &manifest.files {
            let key = normalize(&file.relative_path)
                .to_string_lossy()
                .to_ascii_lowercase();
            let source_path = resolve_source_path(file, manifest, config);
            let record = GroupRecord {
                manifest_id: manifest.id.clone(),
                content_type: manifest.content_type,
                file: file.clone(),
                source_path,
            };
            groups
                .entry(key)
                .or_insert_with(|| FileGroup {
                    relative_path: file.relative_path.clone(),
                    destination: config.workspace_path().join(normalize(&file.relative_path)),
                    records: Vec::new(),
                })
                .records
                .push(record);
        }
    }

    for group in groups.values_mut() {
        group.records.sort_by_key(|r| r.content_type.priority());
    }

    let mut result: Vec<FileGroup> = groups.into_values().collect();
    result.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    result
}

/// Scheduler parallelism for a volume of the given physical type (spec.md
/// §4.5). `Unknown` covers both an undetected type and outright detection
/// failure, and takes the more generous non-rotational bound rather than
/// the conservative spinning-disk one.
pub fn parallelism_for(volume: VolumeKind) -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);
    match volume {
        VolumeKind::Rotational => cpus.min(4),
        VolumeKind::NonRotational | VolumeKind::Unknown => cpus.saturating_mul(2),
    }
}

/// Outcome of materializing one file group.
pub enum GroupOutcome {
    /// The group's winning record was materialized. `size` is the logical
    /// size to add to `TotalSizeBytes` (file size for copies, link overhead
    /// for links). `issue`, when set, is a non-fatal warning to attach (e.g.
    /// a hash mismatch that this strategy treats as recoverable).
    Materialized {
        size: u64,
        issue: Option<ValidationIssue>,
    },
    /// No record in the group could be materialized (every source was
    /// missing); the group contributes nothing but a warning.
    Skipped { issue: ValidationIssue },
}

/// Strategy-specific per-group materialization, dispatched by `run_parallel`.
#[async_trait]
pub trait GroupWorker: Send + Sync {
    async fn materialize_group(
        &self,
        group: &FileGroup,
        fileops: &dyn FileOperations,
    ) -> Result<GroupOutcome>;
}

/// Try each record in descending priority order, stopping at the first whose
/// source is present. `NotFound` moves on to the next record; any other
/// error is fatal and propagates immediately. Exhausting every record yields
/// a `Skipped` warning rather than an error, per spec.md §4.6's "the group is
/// skipped unless every record in the group is missing" rule.
pub async fn try_records_in_priority_order<F, Fut>(
    group: &FileGroup,
    mut attempt: F,
) -> Result<GroupOutcome>
where
    F: FnMut(&GroupRecord) -> Fut,
    Fut: Future<Output = Result<GroupOutcome>>,
{
    let mut candidates_missing = 0usize;
    for record in group.records.iter().rev() {
        match attempt(record).await {
            Ok(outcome) => return Ok(outcome),
            Err(EngineError::NotFound(_)) => {
                candidates_missing += 1;
                continue;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(GroupOutcome::Skipped {
        issue: ValidationIssue::warning(format!(
            "no source found for {} ({candidates_missing} candidate(s) missing)",
            group.relative_path.display()
        )),
    })
}

/// The two ways a `ContentAddressable` file can be requested from the CAS.
pub enum CasMode {
    Copy,
    Link { use_hard_link: bool },
}

/// CAS fallback dispatch (spec.md §4.2/§4.5): the strategy's specialized CAS
/// primitive already performs the hard-link → symlink → copy fallback
/// internally (`ContentStore::link_from_cas`); this only distinguishes
/// "object materialized" from "object genuinely absent," surfacing
/// `CasMissing` in the latter case.
pub async fn dispatch_cas_file(
    fileops: &dyn FileOperations,
    file: &ManifestFile,
    dst: &Path,
    mode: CasMode,
) -> Result<()> {
    let hash = file.hash.as_deref().ok_or_else(|| {
        EngineError::PreparationAborted(format!(
            "content-addressable file {} carries no hash",
            file.relative_path.display()
        ))
    })?;

    let materialized = match mode {
        CasMode::Copy => fileops.copy_from_cas(hash, dst).await?,
        CasMode::Link { use_hard_link } => fileops.link_from_cas(hash, dst, use_hard_link).await?,
    };

    if materialized {
        Ok(())
    } else {
        Err(EngineError::CasMissing {
            hash: hash.to_string(),
            dst: dst.to_path_buf(),
        })
    }
}

/// Bounded concurrent fan-out over file groups (spec.md §5). Generalized from
/// `queue/processor.rs::process_batch`'s semaphore + spawned-task pattern.
/// Returns `(total_files, total_size_bytes, issues)` on success. A fatal
/// error from any group cancels the token (so sibling tasks stop at their
/// next check) and is returned once every spawned task has wound down.
pub async fn run_parallel<W>(
    worker: Arc<W>,
    fileops: Arc<dyn FileOperations>,
    groups: Vec<FileGroup>,
    concurrency: usize,
    cancel: CancellationToken,
    progress: ProgressSink,
) -> Result<(u64, u64, Vec<ValidationIssue>)>
where
    W: GroupWorker + ?Sized + 'static,
{
    let total = groups.len() as u64;
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let processed = Arc::new(AtomicU64::new(0));
    let total_bytes = Arc::new(AtomicU64::new(0));
    let issues = Arc::new(Mutex::new(Vec::new()));
    let first_error: Arc<Mutex<Option<EngineError>>> = Arc::new(Mutex::new(None));

    let mut handles = Vec::with_capacity(groups.len());
    for group in groups {
        let semaphore = semaphore.clone();
        let worker = worker.clone();
        let fileops = fileops.clone();
        let cancel = cancel.clone();
        let processed = processed.clone();
        let total_bytes = total_bytes.clone();
        let issues = issues.clone();
        let first_error = first_error.clone();
        let progress = progress.clone();

        handles.push(tokio::spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };
            if cancel.is_cancelled() {
                return;
            }

            let current_file = group.relative_path.clone();
            let result = worker.materialize_group(&group, fileops.as_ref()).await;

            let n = processed.fetch_add(1, Ordering::Relaxed) + 1;
            if let Some(tx) = &progress {
                if n % PROGRESS_TICK_INTERVAL == 0 || n == total {
                    let _ = tx.send(ProgressUpdate {
                        files_processed: n,
                        total_files: total,
                        current_operation: "materialize",
                        current_file,
                    });
                }
            }

            match result {
                Ok(GroupOutcome::Materialized { size, issue }) => {
                    total_bytes.fetch_add(size, Ordering::Relaxed);
                    if let Some(issue) = issue {
                        issues.lock().unwrap().push(issue);
                    }
                }
                Ok(GroupOutcome::Skipped { issue }) => {
                    issues.lock().unwrap().push(issue);
                }
                Err(e) if e.is_fatal() => {
                    let mut slot = first_error.lock().unwrap();
                    if slot.is_none() {
                        *slot = Some(e);
                    }
                    cancel.cancel();
                }
                Err(e) => {
                    issues
                        .lock()
                        .unwrap()
                        .push(ValidationIssue::warning(e.to_string()));
                }
            }
        }));
    }

    for handle in handles {
        if let Err(join_err) = handle.await {
            if !join_err.is_cancelled() {
                tracing::error!("file group task panicked: {join_err}");
            }
        }
    }

    if let Some(e) = first_error.lock().unwrap().take() {
        return Err(e);
    }
    if cancel.is_cancelled() {
        return Err(EngineError::Cancelled);
    }

    let issues = Arc::try_unwrap(issues)
        .map(|m| m.into_inner().unwrap())
        .unwrap_or_default();
    Ok((
        processed.load(Ordering::Relaxed),
        total_bytes.load(Ordering::Relaxed),
        issues,
    ))
}

/// Idempotent teardown of a partially materialized workspace, invoked on any
/// fatal error or cancellation (spec.md §4.5). A workspace root belongs
/// exclusively to one preparation, so the whole directory is safe to remove.
pub async fn cleanup_on_failure(fileops: &dyn FileOperations, workspace_path: &Path) {
    if let Err(e) = fileops.delete_directory_if_exists(workspace_path).await {
        tracing::error!(
            "failed to clean up workspace {} after failed preparation: {e}",
            workspace_path.display()
        );
    }
}

/// Executable resolution (spec.md §4.5): prefer a file flagged
/// `IsExecutable` in the `GameClient` manifest, else that manifest's first
/// `.exe`, else a filename match against `configuration.GameClient.ExecutablePath`
/// in any manifest. The last step is documented in spec.md §9 as an
/// ambiguous fallback when two manifests share an executable's filename;
/// this resolves it by preferring the `GameClient` manifest's own records.
pub fn resolve_executable(
    config: &WorkspaceConfiguration,
    workspace_path: &Path,
) -> Option<PathBuf> {
    let game_client_manifest = config
        .manifests
        .iter()
        .find(|m| m.content_type == ContentType::GameClient);

    if let Some(manifest) = game_client_manifest {
        if let Some(f) = manifest.files.iter().find(|f| f.is_executable) {
            return Some(workspace_path.join(normalize(&f.relative_path)));
        }
        if let Some(f) = manifest.files.iter().find(|f| {
            f.relative_path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case("exe"))
                .unwrap_or(false)
        }) {
            return Some(workspace_path.join(normalize(&f.relative_path)));
        }
    }

    let hint_name = config.game_client.executable_path.as_ref()?.file_name()?;
    for manifest in &config.manifests {
        if let Some(f) = manifest
            .files
            .iter()
            .find(|f| f.relative_path.file_name() == Some(hint_name))
        {
            return Some(workspace_path.join(normalize(&f.relative_path)));
        }
    }
    None
}

/// Sum logical sizes for an estimate, saturating at `i64::MAX` instead of
/// overflowing (spec.md §8 "Saturation").
pub fn saturating_sum_i64(values: impl Iterator<Item = u64>) -> i64 {
    let mut total: i64 = 0;
    for v in values {
        let v = i64::try_from(v).unwrap_or(i64::MAX);
        total = total.saturating_add(v);
        if total == i64::MAX {
            return i64::MAX;
        }
    }
    total
}

/// A host capability probe, queried once by the selector's pre-check
/// (spec.md §4.7, §6 "environment/privilege probe"). Kept as a trait so
/// tests can force `RequiresElevation`/`RequiresSameVolume` outcomes without
/// depending on the actual host.
pub trait HostCapabilities: Send + Sync {
    fn has_elevation(&self) -> bool;
    fn same_volume(&self, a: &Path, b: &Path) -> bool;
}

/// Default host probe: elevation is assumed present on non-Windows hosts
/// (where `SymlinkOnly`/`Hybrid` never need it per spec.md §4.6.2/§4.6.4),
/// and same-volume delegates to `crate::volume::same_volume`.
pub struct RealHostCapabilities;

impl HostCapabilities for RealHostCapabilities {
    fn has_elevation(&self) -> bool {
        !cfg!(windows) || is_elevated_on_windows()
    }

    fn same_volume(&self, a: &Path, b: &Path) -> bool {
        crate::volume::same_volume(a, b)
    }
}

#[cfg(windows)]
fn is_elevated_on_windows() -> bool {
    // No privilege-query crate is part of this stack; a host that genuinely
    // needs to know can override `HostCapabilities`. Conservatively assume
    // unprivileged so `SymlinkOnly`/`Hybrid` pre-checks fail closed rather
    // than attempt an operation likely to be refused.
    false
}

#[cfg(not(windows))]
fn is_elevated_on_windows() -> bool {
    true
}

/// The per-strategy contract the selector dispatches against (spec.md §9
/// "Strategy polymorphism"): a tagged enum plus this trait, rather than an
/// inheritance chain. `requirements`/`estimate_disk_usage` are pure,
/// zero-I/O queries the engine's `supports`/`estimate` surface calls
/// directly; `materialize_group` (from the `GroupWorker` supertrait) is the
/// only method that touches a filesystem.
pub trait MaterializationStrategy: GroupWorker {
    fn tag(&self) -> Strategy;
    fn requirements(&self) -> CapabilityRequirement;
    fn estimate_disk_usage(&self, config: &WorkspaceConfiguration) -> i64;
}

/// Shared machinery every strategy's `prepare` goes through: wipe-on-recreate,
/// directory setup, dedup + priority ordering, bounded parallel
/// materialization, workspace-info assembly, and failure cleanup (spec.md
/// §4.5). Strategies differ only in `materialize_group`; everything else is
/// identical across all four, so it lives here once instead of once per
/// strategy struct — the direct analog of `deploy_mods` doing dedup +
/// scheduling + cleanup around a strategy-specific per-file step.
pub async fn prepare_workspace(
    strategy: Arc<dyn MaterializationStrategy>,
    config: &WorkspaceConfiguration,
    fileops: Arc<dyn FileOperations>,
    progress: ProgressSink,
    cancel: CancellationToken,
) -> Result<WorkspaceInfo> {
    let workspace_path = config.workspace_path();
    let existed_before = workspace_path.is_dir();

    if config.force_recreate {
        fileops.delete_directory_if_exists(&workspace_path).await?;
    } else if existed_before {
        return Ok(failed_info(
            config,
            "a workspace already exists at this path and force_recreate was not set",
        ));
    }

    match run_preparation(strategy, config, &workspace_path, fileops.clone(), progress, cancel).await
    {
        Ok(info) => Ok(info),
        Err(EngineError::Cancelled) => {
            // Cancellation propagates unchanged after cleanup (spec.md §5, §7);
            // force-recreate semantics mean a cancelled run restores
            // non-existence exactly like a fatal error would (spec.md §3
            // invariant 4, §8 "after a failed preparation with
            // ForceRecreate=true the workspace directory does not exist").
            cleanup_on_failure(fileops.as_ref(), &workspace_path).await;
            Err(EngineError::Cancelled)
        }
        Err(e) => {
            cleanup_on_failure(fileops.as_ref(), &workspace_path).await;
            Ok(failed_info(config, e.to_string()))
        }
    }
}

async fn run_preparation(
    strategy: Arc<dyn MaterializationStrategy>,
    config: &WorkspaceConfiguration,
    workspace_path: &Path,
    fileops: Arc<dyn FileOperations>,
    progress: ProgressSink,
    cancel: CancellationToken,
) -> Result<WorkspaceInfo> {
    fileops.ensure_directory_exists(workspace_path).await?;

    let groups = dedup_file_groups(&config.manifests, config);
    let file_count = groups.len() as u64;

    let volume = crate::volume::volume_kind(workspace_path);
    let concurrency = parallelism_for(volume);

    let (_, total_size_bytes, validation_issues) = run_parallel(
        strategy,
        fileops,
        groups,
        concurrency,
        cancel,
        progress,
    )
    .await?;

    let executable_path = resolve_executable(config, workspace_path);
    let now = Utc::now();

    Ok(WorkspaceInfo {
        id: config.id.clone(),
        workspace_path: workspace_path.to_path_buf(),
        game_client_id: config.game_client.id.clone(),
        strategy: config.strategy,
        created_at: now,
        last_accessed_at: now,
        file_count,
        total_size_bytes: total_size_bytes as i64,
        executable_path,
        working_directory: Some(workspace_path.to_path_buf()),
        is_prepared: true,
        is_valid: true,
        validation_issues,
    })
}

fn failed_info(config: &WorkspaceConfiguration, reason: impl Into<String>) -> WorkspaceInfo {
    let now = Utc::now();
    WorkspaceInfo {
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
        validation_issues: vec![ValidationIssue {
            message: reason.into(),
            severity: crate::workspace::Severity::Error,
        }],
    }
}
