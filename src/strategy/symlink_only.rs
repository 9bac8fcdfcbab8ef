//! `SymlinkOnly`: every file becomes a symbolic link to its resolved source;
//! creation is strict — no silent fallback to copy (spec.md §4.6.2).

use super::base::{
    dispatch_cas_file, try_records_in_priority_order, CapabilityRequirement, CasMode, FileGroup,
    GroupOutcome, GroupRecord, GroupWorker, MaterializationStrategy, LINK_OVERHEAD_BYTES,
};
use crate::error::{EngineError, Result};
use crate::fileops::FileOperations;
use crate::manifest::SourceType;
use crate::workspace::{Strategy, WorkspaceConfiguration};
use async_trait::async_trait;
use std::path::Path;

pub struct SymlinkOnlyStrategy;

#[async_trait]
impl GroupWorker for SymlinkOnlyStrategy {
    async fn materialize_group(
        &self,
        group: &FileGroup,
        fileops: &dyn FileOperations,
    ) -> Result<GroupOutcome> {
        // A missing source still falls back through priority order like the
        // other strategies; what makes this strategy "strict" is that once a
        // source is found, a refused symlink creation is a
        // `CapabilityUnsupported` (non-`NotFound`) error, which
        // `try_records_in_priority_order` propagates immediately instead of
        // trying the next record — spec.md §4.6's "strict strategies fail
        // the preparation" applies per-attempt, not per-group.
        try_records_in_priority_order(group, |record| async move {
            if !source_exists(record).await {
                return Err(EngineError::NotFound(record.source_path.clone()));
            }
            materialize_record(record, &group.destination, fileops).await
        })
        .await
    }
}

impl MaterializationStrategy for SymlinkOnlyStrategy {
    fn tag(&self) -> Strategy {
        Strategy::SymlinkOnly
    }

    fn requirements(&self) -> CapabilityRequirement {
        CapabilityRequirement::RequiresElevation
    }

    fn estimate_disk_usage(&self, config: &WorkspaceConfiguration) -> i64 {
        let file_count: u64 = config
            .manifests
            .iter()
            .map(|m| m.files.len() as u64)
            .sum();
        super::base::saturating_sum_i64(
            std::iter::repeat(LINK_OVERHEAD_BYTES).take(file_count as usize),
        )
    }
}

async fn source_exists(record: &GroupRecord) -> bool {
    if record.file.source_type == SourceType::ContentAddressable {
        // CAS presence is checked by `dispatch_cas_file` itself.
        return true;
    }
    tokio::fs::metadata(&record.source_path).await.is_ok()
}

async fn materialize_record(
    record: &GroupRecord,
    dst: &Path,
    fileops: &dyn FileOperations,
) -> Result<GroupOutcome> {
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
