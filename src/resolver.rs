//! Source path resolution: maps a (manifest, file) pair to an absolute source path.

use crate::manifest::{ContentType, Manifest, ManifestFile};
use crate::workspace::WorkspaceConfiguration;
use std::path::{Path, PathBuf};

/// Normalize a manifest-supplied relative path (forward- or
/// backslash-separated) into the host separator. Done only at join time, so
/// the manifest's own `RelativePath` is never mutated (spec.md §9).
pub(crate) fn normalize(relative: &Path) -> PathBuf {
    let as_str = relative.to_string_lossy().replace('\\', "/");
    PathBuf::from(as_str)
}

/// Resolve the absolute source path for `file` within `manifest`, following
/// the ordered policy of spec.md §4.3.
pub fn resolve_source_path(
    file: &ManifestFile,
    manifest: &Manifest,
    config: &WorkspaceConfiguration,
) -> PathBuf {
    // 1. Explicit absolute source path wins outright.
    if let Some(source_path) = &file.source_path {
        if source_path.is_absolute() {
            return source_path.clone();
        }
    }

    // 2. A per-manifest source root override.
    if let Some(manifest_root) = config.manifest_source_paths.get(&manifest.id) {
        let suffix = file
            .source_path
            .clone()
            .unwrap_or_else(|| file.relative_path.clone());
        return manifest_root.join(normalize(&suffix));
    }

    // 3. Game-installation content defaults to the base installation path.
    if manifest.content_type == ContentType::GameInstallation {
        let suffix = file
            .source_path
            .clone()
            .unwrap_or_else(|| file.relative_path.clone());
        return config.base_installation_path.join(normalize(&suffix));
    }

    // 4. A relative source path is joined against the base installation path.
    if let Some(source_path) = &file.source_path {
        return config.base_installation_path.join(normalize(source_path));
    }

    // 5. Fall back to the relative path under the base installation path.
    config
        .base_installation_path
        .join(normalize(&file.relative_path))
}
