/// Error types shared by every part of the viewer
///
/// Anything that ends up here is fatal to the process, except `Image`,
/// which a reload downgrades to a skipped cell.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ViewerError {
    /// The watched directory is missing, unreadable or not a directory
    #[error("cannot read directory {}: {source}", path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A matching file could not be read or its header decoded
    #[error("cannot load image {}: {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// The file system watcher could not be started
    #[error("cannot watch {}: {source}", path.display())]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    /// The watcher bridge thread could not be spawned
    #[error("cannot start watcher thread: {0}")]
    Thread(#[source] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] config::ConfigError),

    #[error("column count must be at least 1 (got {0})")]
    InvalidColumns(usize),

    #[error("window system error: {0}")]
    Gui(#[from] iced::Error),
}

pub type Result<T> = std::result::Result<T, ViewerError>;
