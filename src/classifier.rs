//! Essential-file classification for the hybrid materialization strategy.

use std::path::Path;

const ESSENTIAL_EXTENSIONS: &[&str] = &[
    "exe", "dll", "ini", "cfg", "dat", "xml", "json", "txt", "log",
];
const DOMAIN_ESSENTIAL_EXTENSIONS: &[&str] = &["big", "str", "csf", "w3d"];
const ESSENTIAL_DIRECTORIES: &[&str] = &["mods", "patch", "config", "data", "maps", "scripts"];
const ESSENTIAL_FILENAME_FRAGMENTS: &[&str] =
    &["mod", "patch", "config", "generals", "zerohour", "settings"];
const NON_ESSENTIAL_EXTENSIONS: &[&str] = &[
    "tga", "dds", "bmp", "jpg", "jpeg", "png", "gif", "wav", "mp3", "ogg", "flac", "avi", "mp4",
    "wmv", "bik",
];

const SMALL_FILE_THRESHOLD_BYTES: u64 = 1024 * 1024;

/// Decides whether a file must be a real byte-for-byte copy (essential) or
/// may instead be linked, for the hybrid strategy. Pure, case-insensitive,
/// and evaluated in the declared rule order (spec.md §4.4) — the first
/// matching rule wins.
pub fn is_essential(relative_path: &Path, size: u64) -> bool {
    if size < SMALL_FILE_THRESHOLD_BYTES {
        return true;
    }

    let extension = relative_path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    if let Some(ext) = extension.as_deref() {
        if ESSENTIAL_EXTENSIONS.contains(&ext) {
            return true;
        }
        if DOMAIN_ESSENTIAL_EXTENSIONS.contains(&ext) {
            return true;
        }
    }

    if relative_path.components().any(|c| {
        c.as_os_str()
            .to_str()
            .map(|s| {
                ESSENTIAL_DIRECTORIES
                    .iter()
                    .any(|dir| s.eq_ignore_ascii_case(dir))
            })
            .unwrap_or(false)
    }) {
        return true;
    }

    let filename = relative_path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_ascii_lowercase())
        .unwrap_or_default();
    if ESSENTIAL_FILENAME_FRAGMENTS
        .iter()
        .any(|fragment| filename.contains(fragment))
    {
        return true;
    }

    if let Some(ext) = extension.as_deref() {
        if NON_ESSENTIAL_EXTENSIONS.contains(&ext) {
            return false;
        }
    }

    true
}
