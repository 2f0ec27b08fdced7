/// The grid of cells currently on screen
///
/// Everything here is rebuilt from disk on each reload; nothing survives
/// from one reload to the next.

use iced::widget::image::Handle;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use super::data::{GridCell, ImageEntry, ReloadSummary};
use super::index;
use crate::error::{Result, ViewerError};
use crate::ui::grid::{self, GridLayout};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No reload has completed yet
    Empty,
    /// At least one reload has completed (the grid itself may be empty)
    Populated,
}

pub struct ViewerState {
    directory: PathBuf,
    max_columns: usize,
    cells: Vec<GridCell>,
    layout: GridLayout,
    phase: Phase,
    reloads: u64,
}

impl ViewerState {
    pub fn new(directory: PathBuf, max_columns: usize) -> Result<Self> {
        if max_columns == 0 {
            return Err(ViewerError::InvalidColumns(max_columns));
        }

        Ok(ViewerState {
            directory,
            max_columns,
            cells: Vec::new(),
            layout: GridLayout::compute(std::iter::empty(), max_columns),
            phase: Phase::Empty,
            reloads: 0,
        })
    }

    /// Rebuild every cell from the directory contents
    ///
    /// Old cells (and their image data) are dropped before the directory is
    /// read again. A directory that can't be listed is an error; a matching
    /// file that can't be loaded is skipped and counted.
    pub fn reload(&mut self) -> Result<ReloadSummary> {
        self.cells.clear();
        self.layout = GridLayout::compute(std::iter::empty(), self.max_columns);

        let entries = index::scan_directory(&self.directory)?;
        let mut summary = ReloadSummary::default();

        for entry in entries {
            match load_cell(&self.directory, entry, self.cells.len(), self.max_columns) {
                Ok(cell) => self.cells.push(cell),
                Err(err) => {
                    tracing::warn!("⚠️  Skipping {err}");
                    summary.skipped += 1;
                }
            }
        }

        self.layout = GridLayout::compute(
            self.cells.iter().map(|cell| (cell.width, cell.height)),
            self.max_columns,
        );
        self.phase = Phase::Populated;
        self.reloads += 1;

        summary.shown = self.cells.len();
        Ok(summary)
    }

    pub fn cells(&self) -> &[GridCell] {
        &self.cells
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn reload_count(&self) -> u64 {
        self.reloads
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn max_columns(&self) -> usize {
        self.max_columns
    }
}

/// Read one image and place it at `index`
fn load_cell(
    directory: &Path,
    entry: ImageEntry,
    index: usize,
    max_columns: usize,
) -> Result<GridCell> {
    let path = directory.join(&entry.filename);
    let image_error = |source| ViewerError::Image {
        path: path.clone(),
        source,
    };

    let bytes = fs::read(&path).map_err(|e| image_error(image::ImageError::IoError(e)))?;
    let (width, height) = image::ImageReader::new(Cursor::new(&bytes))
        .with_guessed_format()
        .map_err(|e| image_error(image::ImageError::IoError(e)))?
        .into_dimensions()
        .map_err(image_error)?;

    Ok(GridCell {
        placement: grid::placement(index, max_columns),
        handle: Handle::from_bytes(bytes),
        width,
        height,
        path,
        entry,
    })
}
