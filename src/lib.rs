//! Workspace Composition Engine — materializes a runnable, self-contained
//! game-installation directory from a set of manifests, deduplicating
//! against a content-addressable store and minimizing redundant I/O via
//! pluggable materialization strategies (full copy, symlink, hard link,
//! hybrid).
//!
//! This crate is the composition engine only: manifest authoring, remote
//! content download, the graphical shell, and launcher UX are external
//! collaborators. The engine consumes fully-formed manifests and a
//! [`WorkspaceConfiguration`], and produces a [`WorkspaceInfo`].

pub mod cas;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod fileops;
pub mod logging;
pub mod manifest;
pub mod resolver;
pub mod strategy;
pub mod volume;
pub mod workspace;

pub use cas::ContentStore;
pub use config::EngineConfig;
pub use engine::{SupportOutcome, WorkspaceEngine};
pub use error::{EngineError, Result};
pub use fileops::{FileOperations, LocalFileOperations};
pub use manifest::{ContentType, Manifest, ManifestFile, SourceType};
pub use strategy::{CapabilityRequirement, ProgressUpdate};
pub use workspace::{
    GameClientRef, Severity, Strategy, ValidationIssue, WorkspaceConfiguration, WorkspaceInfo,
};
