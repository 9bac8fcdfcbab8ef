//! `HybridCopySymlink`: essential files (per `classifier::is_essential`) are
//! always a real copy; everything else is a strict symlink (spec.md
//! §4.6.4). The only strategy where a hash mismatch is fatal rather than a
//! warning — it only ever happens on the essential/copy path.

use super::base::{
    dispatch_cas_file, try_records_in_priority_order, CapabilityRequirement, CasMode, FileGroup,
    GroupOutcome, GroupRecord, GroupWorker, MaterializationStrategy, LINK_OVERHEAD_BYTES,
};
use crate::classifier::is_essential;
use crate::error::{EngineError, Result};
use crate::fileops::FileOperations;
use crate::manifest::SourceType;
use crate::resolver::resolve_source_path;
use crate::workspace::{Strategy, WorkspaceConfiguration};
use async_trait::async_trait;
use std::path::Path;

pub struct HybridCopySymlinkStrategy;

#[async_trait]
impl GroupWorker for HybridCopySymlinkStrategy {
    async fn materialize_group(
        &self,
        group: &FileGroup,
        fileops: &dyn FileOperations,
    ) -> Result<GroupOutcome> {
        try_records_in_priority_order(group, |record| async move {
            if !source_exists(record).await {
                return Err(EngineError::NotFound(record.source_path.clone()));
            }
            materialize_record(record, &group.destination, fileops).await
        })
        .await
    }
}

impl MaterializationStrategy for HybridCopySymlinkStrategy {
    fn tag(&self) -> Strategy {
        Strategy::HybridCopySymlink
    }

    fn requirements(&self) -> CapabilityRequirement {
        CapabilityRequirement::RequiresElevation
    }

    fn estimate_disk_usage(&self, config: &WorkspaceConfiguration) -> i64 {
        // Resolve each file's real source before backfilling a zero
        // declared size from disk, the same correction as `FullCopy`'s and
        // `HardLink`'s estimates — a bare `RelativePath` almost never
        // exists relative to the process CWD, so backfilling against it
        // would silently estimate zero-size records at zero.
        super::base::saturating_sum_i64(config.manifests.iter().flat_map(|m| {
            m.files.iter().map(move |f| {
                let size = f.effective_size(&resolve_source_path(f, m, config));
                if is_essential(&f.relative_path, size) {
                    size
                } else {
                    LINK_OVERHEAD_BYTES
                }
            })
        }))
    }
}

async fn source_exists(record: &GroupRecord) -> bool {
    if record.file.source_type == SourceType::ContentAddressable {
        return true;
    }
    tokio::fs::metadata(&record.source_path).await.is_ok()
}

async fn materialize_record(
    record: &GroupRecord,
    dst: &Path,
    fileops: &dyn FileOperations,
) -> Result<GroupOutcome> {
    let size = record.file.effective_size(&record.source_path);
    let essential = is_essential(&record.file.relative_path, size);

    if essential {
        if record.file.source_type == SourceType::ContentAddressable {
            dispatch_cas_file(fileops, &record.file, dst, CasMode::Copy).await?;
        } else {
            fileops.copy_file(&record.source_path, dst).await?;
        }

        if let Some(expected) = &record.file.hash {
            if !fileops.verify_file_hash(dst, expected).await? {
                // Fatal for the essential/copy path, unlike every other
                // strategy's hash check (spec.md §4.6.4, §7).
                return Err(EngineError::IntegrityMismatch {
                    path: record.file.relative_path.clone(),
                    expected: expected.clone(),
                    actual: "mismatch".to_string(),
                });
            }
        }

        Ok(GroupOutcome::Materialized { size, issue: None })
    } else {
        if record.file.source_type == SourceType::ContentAddressable {
            dispatch_cas_file(
                fileops,
                &record.file,
                dst,
                CasMode::Link {
                    use_hard_link: false,
                },
            )
            .await?;
        } else {
            fileops
                .create_symlink(dst, &record.source_path, false)
                .await?;
        }

        Ok(GroupOutcome::Materialized {
            size: LINK_OVERHEAD_BYTES,
            issue: None,
        })
    }
}
