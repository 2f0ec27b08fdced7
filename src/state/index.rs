/// Directory indexer
///
/// Lists the watched directory, keeps the files named like
/// "Slice <position>-<page>.png" and orders them by (position, page).

use regex::Regex;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::LazyLock;
use walkdir::WalkDir;

use super::data::ImageEntry;
use crate::error::{Result, ViewerError};

static SLICE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Slice ([0-9]+)-([0-9]+)\.png$").expect("slice pattern is a valid regex")
});

/// Parse a filename into an image entry
///
/// Returns None for anything that isn't exactly "Slice <n>-<m>.png",
/// including numbers too large for u64.
pub fn parse_filename(name: &str) -> Option<ImageEntry> {
    let captures = SLICE_PATTERN.captures(name)?;
    let position = captures[1].parse().ok()?;
    let page = captures[2].parse().ok()?;

    Some(ImageEntry {
        position,
        page,
        filename: name.to_string(),
    })
}

/// Scan a directory (non-recursively) for slice images
///
/// The result is sorted ascending by (position, page). The sort is stable,
/// so entries with equal keys keep their listing order.
pub fn scan_directory(dir: &Path) -> Result<Vec<ImageEntry>> {
    let directory_error = |source| ViewerError::Directory {
        path: dir.to_path_buf(),
        source,
    };

    // WalkDir skips a depth-0 file silently, so check the root ourselves
    let metadata = fs::metadata(dir).map_err(directory_error)?;
    if !metadata.is_dir() {
        return Err(directory_error(io::Error::new(
            io::ErrorKind::InvalidInput,
            "not a directory",
        )));
    }

    let mut entries = Vec::new();

    for item in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let item = item.map_err(|err| directory_error(io::Error::from(err)))?;

        if item.file_type().is_dir() {
            continue;
        }

        // Names that aren't valid UTF-8 can't match the pattern either
        if let Some(entry) = item.file_name().to_str().and_then(parse_filename) {
            entries.push(entry);
        }
    }

    entries.sort_by_key(ImageEntry::sort_key);

    tracing::debug!(dir = %dir.display(), count = entries.len(), "indexed slice images");
    Ok(entries)
}
