/// Shared data structures for the viewer state
///
/// These structs represent the data model that flows between
/// the directory indexer, the viewer state and the UI layer.

use iced::widget::image::Handle;
use std::path::PathBuf;

/// A single page image found in the watched directory
///
/// Built from the filename alone and thrown away on the next reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageEntry {
    /// First number in the filename ("Slice 12-3.png" -> 12)
    pub position: u64,
    /// Second number in the filename ("Slice 12-3.png" -> 3)
    pub page: u64,
    /// Filename only (e.g., "Slice 12-3.png")
    pub filename: String,
}

impl ImageEntry {
    /// Key the ordered image list is sorted by
    pub fn sort_key(&self) -> (u64, u64) {
        (self.position, self.page)
    }
}

/// Where a cell sits in the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Placement {
    pub row: usize,
    pub col: usize,
}

/// One displayed image with its grid coordinates
#[derive(Debug, Clone)]
pub struct GridCell {
    pub entry: ImageEntry,
    /// Full path reported when the cell is clicked
    pub path: PathBuf,
    /// In-memory image handed to the renderer
    pub handle: Handle,
    /// Natural image size in pixels
    pub width: u32,
    pub height: u32,
    pub placement: Placement,
}

/// Outcome of a single reload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReloadSummary {
    /// Cells now on screen
    pub shown: usize,
    /// Matching files that could not be read or decoded
    pub skipped: usize,
}
