//! `FullCopy`: every file is a real byte-for-byte copy (spec.md §4.6.1).

use super::base::{
    dispatch_cas_file, saturating_sum_i64, try_records_in_priority_order, CapabilityRequirement,
    CasMode, GroupOutcome, GroupRecord, GroupWorker, MaterializationStrategy,
};
use super::base::FileGroup;
use crate::error::Result;
use crate::fileops::FileOperations;
use crate::manifest::SourceType;
use crate::resolver::resolve_source_path;
use crate::workspace::{Strategy, ValidationIssue, WorkspaceConfiguration};
use async_trait::async_trait;
use std::path::Path;

pub struct FullCopyStrategy;

#[async_trait]
impl GroupWorker for FullCopyStrategy {
    async fn materialize_group(
        &self,
        group: &FileGroup,
        fileops: &dyn FileOperations,
    ) -> Result<GroupOutcome> {
        try_records_in_priority_order(group, |record| async move {
            copy_record(record, &group.destination, fileops).await
        })
        .await
    }
}

impl MaterializationStrategy for FullCopyStrategy {
    fn tag(&self) -> Strategy {
        Strategy::FullCopy
    }

    fn requirements(&self) -> CapabilityRequirement {
        CapabilityRequirement::None
    }

    fn estimate_disk_usage(&self, config: &WorkspaceConfiguration) -> i64 {
        // Resolve each file's real source before backfilling a zero
        // declared size from disk (spec.md §3 "size may be backfilled from
        // disk when zero") — backfilling against the bare `RelativePath`
        // would stat a path that doesn't exist relative to the process CWD
        // and silently estimate such files at zero.
        saturating_sum_i64(config.manifests.iter().flat_map(|m| {
            m.files
                .iter()
                .map(move |f| f.effective_size(&resolve_source_path(f, m, config)))
        }))
    }
}

async fn copy_record(
    record: &GroupRecord,
    dst: &Path,
    fileops: &dyn FileOperations,
) -> Result<GroupOutcome> {
    if record.file.source_type == SourceType::ContentAddressable {
        dispatch_cas_file(fileops, &record.file, dst, CasMode::Copy).await?;
    } else {
        fileops.copy_file(&record.source_path, dst).await?;
    }

    let size = record.file.effective_size(&record.source_path);

    let issue = if let Some(expected) = &record.file.hash {
        if !fileops.verify_file_hash(dst, expected).await? {
            Some(ValidationIssue::warning(format!(
                "hash mismatch for {} (treated as non-fatal per FullCopy semantics)",
                record.file.relative_path.display()
            )))
        } else {
            None
        }
    } else {
        None
    };

    Ok(GroupOutcome::Materialized { size, issue })
}
