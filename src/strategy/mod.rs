//! Materialization strategies: the policy for how files in a workspace
//! relate to their sources (spec.md §4.6). Shared scaffolding lives in
//! [`base`]; each strategy is a thin struct implementing
//! [`MaterializationStrategy`] — a tagged-enum-plus-dispatch-trait shape
//! (spec.md §9 "Strategy polymorphism") rather than an inheritance chain.

pub mod base;
mod full_copy;
mod hard_link;
mod hybrid;
mod symlink_only;

pub use base::{
    CapabilityRequirement, FileGroup, GroupOutcome, GroupRecord, MaterializationStrategy,
    ProgressUpdate,
};
pub use full_copy::FullCopyStrategy;
pub use hard_link::HardLinkStrategy;
pub use hybrid::HybridCopySymlinkStrategy;
pub use symlink_only::SymlinkOnlyStrategy;

use crate::workspace::Strategy;
use std::sync::Arc;

/// Build the strategy implementing `tag`.
pub fn strategy_for(tag: Strategy) -> Arc<dyn MaterializationStrategy> {
    match tag {
        Strategy::FullCopy => Arc::new(FullCopyStrategy),
        Strategy::SymlinkOnly => Arc::new(SymlinkOnlyStrategy),
        Strategy::HardLink => Arc::new(HardLinkStrategy),
        Strategy::HybridCopySymlink => Arc::new(HybridCopySymlinkStrategy),
    }
}
