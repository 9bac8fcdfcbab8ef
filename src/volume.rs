//! Best-effort physical volume characteristics, used only to size the
//! scheduler's parallelism and to detect cross-volume hard-link failures.
//! Never returns an error — detection failure degrades to `Unknown` rather
//! than aborting a preparation that doesn't strictly need the answer.

use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeKind {
    Rotational,
    NonRotational,
    Unknown,
}

/// Best-effort volume-type probe for `path`'s filesystem.
#[cfg(target_os = "linux")]
pub fn volume_kind(path: &Path) -> VolumeKind {
    linux::volume_kind(path).unwrap_or(VolumeKind::Unknown)
}

#[cfg(not(target_os = "linux"))]
pub fn volume_kind(_path: &Path) -> VolumeKind {
    VolumeKind::Unknown
}

#[cfg(target_os = "linux")]
mod linux {
    use super::VolumeKind;
    use std::os::unix::fs::MetadataExt;
    use std::path::{Path, PathBuf};

    pub fn volume_kind(path: &Path) -> Option<VolumeKind> {
        let existing = first_existing_ancestor(path)?;
        let metadata = std::fs::metadata(&existing).ok()?;
        let major = metadata.dev() >> 8;
        let minor = metadata.dev() & 0xff;

        for candidate in [
            format!("/sys/dev/block/{}:{}/queue/rotational", major, minor),
            format!("/sys/dev/block/{}:0/queue/rotational", major),
        ] {
            if let Ok(content) = std::fs::read_to_string(&candidate) {
                return match content.trim() {
                    "1" => Some(VolumeKind::Rotational),
                    "0" => Some(VolumeKind::NonRotational),
                    _ => None,
                };
            }
        }
        None
    }

    fn first_existing_ancestor(path: &Path) -> Option<PathBuf> {
        let mut current = path.to_path_buf();
        loop {
            if current.exists() {
                return Some(current);
            }
            if !current.pop() {
                return None;
            }
        }
    }
}

/// Best-effort same-filesystem check, used by the hard-link strategy's
/// capability requirement and disk-usage estimate.
#[cfg(unix)]
pub fn same_volume(a: &Path, b: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;
    let dev_of = |p: &Path| {
        let mut current = p.to_path_buf();
        loop {
            if let Ok(metadata) = std::fs::metadata(&current) {
                return Some(metadata.dev());
            }
            if !current.pop() {
                return None;
            }
        }
    };
    match (dev_of(a), dev_of(b)) {
        (Some(da), Some(db)) => da == db,
        _ => false,
    }
}

#[cfg(not(unix))]
pub fn same_volume(_a: &Path, _b: &Path) -> bool {
    false
}
