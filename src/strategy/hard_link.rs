//! `HardLink`: attempt a hard link for every file, degrading to a real copy
//! when the link is refused or source and destination sit on different
//! volumes (spec.md §4.6.3).

use super::base::{
    dispatch_cas_file, saturating_sum_i64, try_records_in_priority_order, CapabilityRequirement,
    CasMode, FileGroup, GroupOutcome, GroupRecord, GroupWorker, MaterializationStrategy,
    LINK_OVERHEAD_BYTES,
};
use crate::error::Result;
use crate::fileops::FileOperations;
use crate::manifest::SourceType;
use crate::resolver::resolve_source_path;
use crate::workspace::{Strategy, ValidationIssue, WorkspaceConfiguration};
use async_trait::async_trait;
use std::path::Path;

pub struct HardLinkStrategy;

#[async_trait]
impl GroupWorker for HardLinkStrategy {
    async fn materialize_group(
        &self,
        group: &FileGroup,
        fileops: &dyn FileOperations,
    ) -> Result<GroupOutcome> {
        try_records_in_priority_order(group, |record| async move {
            materialize_record(record, &group.destination, fileops).await
        })
        .await
    }
}

impl MaterializationStrategy for HardLinkStrategy {
    fn tag(&self) -> Strategy {
        Strategy::HardLink
    }

    fn requirements(&self) -> CapabilityRequirement {
        // Same-volume is advisory, not a blocking precondition: cross-volume
        // (or any other hard-link refusal) degrades to a real copy inside
        // `materialize_record` rather than failing the preparation (spec.md
        // §4.6.3 "on failure or cross-volume fall back to copy"; §8 scenario
        // 3 expects `IsPrepared=true` on a cross-volume host). Returning
        // `RequiresSameVolume` here would make the selector's pre-check
        // reject the whole preparation before materialization ever runs,
        // which contradicts that fallback.
        CapabilityRequirement::None
    }

    fn estimate_disk_usage(&self, config: &WorkspaceConfiguration) -> i64 {
        // Per-file source roots can vary across manifest overrides; the
        // base installation path vs. workspace root is used as the
        // representative pair for this purely advisory same-volume guess
        // (spec.md §4.6.3's "if same-volume" estimate branch — see
        // DESIGN.md). Materialization itself re-checks per file.
        let same_volume = crate::volume::same_volume(
            &config.base_installation_path,
            &config.workspace_root_path,
        );

        if same_volume {
            let file_count: u64 = config
                .manifests
                .iter()
                .map(|m| m.files.len() as u64)
                .sum();
            saturating_sum_i64(std::iter::repeat(LINK_OVERHEAD_BYTES).take(file_count as usize))
        } else {
            saturating_sum_i64(config.manifests.iter().flat_map(|m| {
                m.files
                    .iter()
                    .map(move |f| f.effective_size(&resolve_source_path(f, m, config)))
            }))
        }
    }
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
                use_hard_link: true,
            },
        )
        .await?;
        return Ok(GroupOutcome::Materialized {
            size: LINK_OVERHEAD_BYTES,
            issue: None,
        });
    }

    if fileops.create_hard_link(dst, &record.source_path).await.is_ok() {
        return Ok(GroupOutcome::Materialized {
            size: LINK_OVERHEAD_BYTES,
            issue: None,
        });
    }

    // Hard link refused (cross-volume, unsupported, or source missing) —
    // fall back to a real copy. A genuinely missing source surfaces as
    // `NotFound` from `copy_file`, which `try_records_in_priority_order`
    // interprets as "try the next record," exactly as a direct `NotFound`
    // from the hard-link attempt would have.
    fileops.copy_file(&record.source_path, dst).await?;
    let size = record.file.effective_size(&record.source_path);

    let issue = if let Some(expected) = &record.file.hash {
        if !fileops.verify_file_hash(dst, expected).await? {
            Some(ValidationIssue::warning(format!(
                "hash mismatch for {} (copy fallback after hard-link failure)",
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
