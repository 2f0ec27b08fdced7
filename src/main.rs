use iced::alignment::{Horizontal, Vertical};
use iced::futures::stream::{self, Stream};
use iced::keyboard::{self, Modifiers};
use iced::mouse::ScrollDelta;
use iced::widget::scrollable::{Direction, Scrollbar};
use iced::widget::{
    column, container, image, mouse_area, scrollable, text, tooltip, Column, Row, Space,
};
use iced::{event, Element, Event, Length, Size, Subscription, Task, Theme};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::{debug, error, info};

mod config;
mod error;
mod state;
mod ui;
mod watcher;

use config::{Cli, Settings};
use error::{Result, ViewerError};
use state::data::{GridCell, Placement};
use state::viewer::{Phase, ViewerState};
use ui::scroll::ScrollState;
use watcher::{ChangeFeed, ChangeNotice, DirectoryWatcher};

use clap::Parser;

const TITLE: &str = "Slice Viewer (Scroll, and Select)";

/// Slot for an error that has to end the event loop
type FatalSlot = Arc<Mutex<Option<ViewerError>>>;

/// Main application state
struct SliceViewer {
    /// Cells currently on screen
    state: ViewerState,
    /// Wheel accumulator for the grid
    scroll: ScrollState,
    /// Keyboard modifiers as of the last change (Shift scrolls sideways)
    modifiers: Modifiers,
    /// Source of directory change notices
    changes: ChangeFeed,
    /// Where a reload failure is left for `main`
    fatal: FatalSlot,
}

/// Application messages (events)
#[derive(Debug, Clone)]
enum Message {
    /// Something in the watched directory changed
    DirectoryChanged(ChangeNotice),
    /// User clicked a cell
    ImageClicked(PathBuf),
    /// Mouse wheel over the grid
    Scrolled(ScrollDelta),
    ModifiersChanged(Modifiers),
}

impl SliceViewer {
    /// Wrap a viewer state that has already been loaded once
    ///
    /// The returned task reloads again right away, picking up anything that
    /// changed between the first load and the watcher starting.
    fn new(
        state: ViewerState,
        settings: &Settings,
        changes: ChangeFeed,
        fatal: FatalSlot,
    ) -> (Self, Task<Message>) {
        (
            SliceViewer {
                state,
                scroll: ScrollState::new(settings.scroll_step),
                modifiers: Modifiers::default(),
                changes,
                fatal,
            },
            Task::done(startup_reload()),
        )
    }

    /// Handle application messages and update state
    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::DirectoryChanged(notice) => {
                debug!(events = notice.events, "directory changed");
                self.reload()
            }
            Message::ImageClicked(path) => {
                on_image_click(&path);
                Task::none()
            }
            Message::Scrolled(delta) => match self.scroll.apply(delta, self.modifiers.shift()) {
                Some(offset) => scrollable::scroll_by(grid_scroll_id(), offset),
                None => Task::none(),
            },
            Message::ModifiersChanged(modifiers) => {
                self.modifiers = modifiers;
                Task::none()
            }
        }
    }

    /// Re-read the directory; a directory that can't be read ends the app
    fn reload(&mut self) -> Task<Message> {
        match self.state.reload() {
            Ok(summary) => {
                info!(
                    shown = summary.shown,
                    skipped = summary.skipped,
                    reload = self.state.reload_count(),
                    "🔄 Reloaded {}",
                    self.state.directory().display()
                );
                Task::none()
            }
            Err(err) => {
                error!("❌ Reload failed: {err}");
                if let Ok(mut slot) = self.fatal.lock() {
                    slot.get_or_insert(err);
                }
                iced::exit()
            }
        }
    }

    /// Build the user interface
    fn view(&self) -> Element<'_, Message> {
        let layout = self.state.layout();
        let cells = self.state.cells();

        let mut grid = Column::new();
        for row in 0..layout.rows() {
            let height = layout.row_height(row) as f32;
            let mut line = Row::new();

            for col in 0..layout.columns() {
                let width = layout.column_width(col) as f32;
                let slot: Element<'_, Message> = match layout.cell_at(row, col) {
                    Some(index) => {
                        let cell = &cells[index];
                        debug_assert_eq!(cell.placement, Placement { row, col });

                        let picture = mouse_area(
                            image(cell.handle.clone())
                                .width(Length::Fixed(cell.width as f32))
                                .height(Length::Fixed(cell.height as f32)),
                        )
                        .on_press(click_message(cell));

                        let label = format!(
                            "Position {}, page {}",
                            cell.entry.position, cell.entry.page
                        );
                        tooltip(
                            picture,
                            container(text(label).size(12)).padding(4),
                            tooltip::Position::FollowCursor,
                        )
                        .into()
                    }
                    None => Space::new(Length::Shrink, Length::Shrink).into(),
                };

                line = line.push(
                    container(slot)
                        .width(Length::Fixed(width))
                        .height(Length::Fixed(height))
                        .align_x(Horizontal::Center)
                        .align_y(Vertical::Center),
                );
            }
            grid = grid.push(line);
        }

        let (content_width, content_height) = layout.content_size();
        let viewport = scrollable(
            mouse_area(
                container(grid)
                    .width(Length::Fixed(content_width as f32))
                    .height(Length::Fixed(content_height as f32)),
            )
            .on_scroll(Message::Scrolled),
        )
        .id(grid_scroll_id())
        .direction(Direction::Both {
            vertical: Scrollbar::default(),
            horizontal: Scrollbar::default(),
        })
        .width(Length::Fill)
        .height(Length::Fill);

        let status = match self.state.phase() {
            Phase::Empty => text("Loading..."),
            Phase::Populated => text(format!(
                "{} images in {}",
                cells.len(),
                self.state.directory().display()
            )),
        }
        .size(14);

        column![viewport, container(status).padding([4, 8])].into()
    }

    /// Directory changes plus the modifier keys that steer the wheel
    fn subscription(&self) -> Subscription<Message> {
        let changes = Subscription::run_with_id(
            "directory-changes",
            change_stream(self.changes.receiver()),
        );

        let modifiers = event::listen_with(|event, _status, _window| match event {
            Event::Keyboard(keyboard::Event::ModifiersChanged(modifiers)) => {
                Some(Message::ModifiersChanged(modifiers))
            }
            _ => None,
        });

        Subscription::batch([changes, modifiers])
    }

    /// Set the application theme
    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

/// Report the selected file on stdout
fn on_image_click(path: &Path) {
    if let Err(err) = write_selection(&mut io::stdout().lock(), path) {
        error!("❌ Could not report selection: {err}");
    }
}

fn write_selection(out: &mut impl Write, path: &Path) -> io::Result<()> {
    writeln!(out, "Selected image: {}", path.display())?;
    out.flush()
}

/// Message sent when a cell is clicked; carries the cell's full path
fn click_message(cell: &GridCell) -> Message {
    Message::ImageClicked(cell.path.clone())
}

fn startup_reload() -> Message {
    Message::DirectoryChanged(ChangeNotice { events: 0 })
}

fn grid_scroll_id() -> scrollable::Id {
    scrollable::Id::new("slice-grid")
}

/// Turn change notices into messages; a lagging receiver still means "reload"
fn change_stream(rx: broadcast::Receiver<ChangeNotice>) -> impl Stream<Item = Message> {
    stream::unfold(rx, |mut rx| async move {
        let notice = match rx.recv().await {
            Ok(notice) => notice,
            Err(broadcast::error::RecvError::Lagged(missed)) => ChangeNotice {
                events: missed as usize,
            },
            Err(broadcast::error::RecvError::Closed) => return None,
        };
        Some((Message::DirectoryChanged(notice), rx))
    })
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,slice_viewer=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let settings = Settings::load(&cli)?;

    // Load once before any window exists so a bad directory never opens one
    let mut state = ViewerState::new(settings.directory.clone(), settings.max_columns)?;
    let summary = state.reload()?;
    info!(
        shown = summary.shown,
        skipped = summary.skipped,
        columns = state.max_columns(),
        "🎨 Slice viewer loaded {}",
        settings.directory.display()
    );

    let changes = ChangeFeed::new(64);
    let watcher = DirectoryWatcher::spawn(
        &settings.directory,
        settings.quiet_period(),
        changes.sender(),
    )?;

    let fatal = FatalSlot::default();
    let result = iced::application(TITLE, SliceViewer::update, SliceViewer::view)
        .theme(SliceViewer::theme)
        .subscription(SliceViewer::subscription)
        .window_size(Size::new(800.0, 600.0))
        .centered()
        .run_with({
            let fatal = fatal.clone();
            move || SliceViewer::new(state, &settings, changes, fatal)
        });

    // The window is gone; stop notifications before anything else is torn down
    watcher.stop();
    info!("👋 Window closed");

    result?;

    let failure = fatal.lock().ok().and_then(|mut slot| slot.take());
    match failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn main() -> ExitCode {
    init_logging();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iced::futures::executor::block_on;
    use iced::futures::StreamExt;
    use std::fs;

    fn write_png(dir: &Path, name: &str) {
        ::image::RgbImage::new(2, 2).save(dir.join(name)).unwrap();
    }

    fn loaded_viewer(dir: &Path) -> SliceViewer {
        let mut state = ViewerState::new(dir.to_path_buf(), 2).unwrap();
        state.reload().unwrap();
        let (viewer, _startup) = SliceViewer::new(
            state,
            &Settings::default(),
            ChangeFeed::new(8),
            FatalSlot::default(),
        );
        viewer
    }

    #[test]
    fn test_missing_directory_is_fatal_before_window() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("settings.toml");
        std::fs::write(&config, "").unwrap();

        let cli = Cli {
            directory: Some(dir.path().join("no such pages")),
            config: Some(config),
            ..Cli::default()
        };

        assert!(matches!(run(cli), Err(ViewerError::Directory { .. })));
    }

    #[test]
    fn test_change_stream_forwards_notices() {
        let (tx, rx) = broadcast::channel(4);
        tx.send(ChangeNotice { events: 3 }).unwrap();
        drop(tx);

        let messages: Vec<Message> = block_on(change_stream(rx).collect());
        assert_eq!(messages.len(), 1);
        assert!(matches!(
            messages[0],
            Message::DirectoryChanged(ChangeNotice { events: 3 })
        ));
    }

    #[test]
    fn test_lagged_stream_still_reloads() {
        let (tx, rx) = broadcast::channel(1);
        tx.send(ChangeNotice { events: 1 }).unwrap();
        tx.send(ChangeNotice { events: 1 }).unwrap();
        drop(tx);

        let messages: Vec<Message> = block_on(change_stream(rx).collect());
        // One notice for the overflow, then the one still buffered
        assert_eq!(messages.len(), 2);
        assert!(messages
            .iter()
            .all(|m| matches!(m, Message::DirectoryChanged(_))));
    }

    #[test]
    fn test_startup_reload_catches_files_written_after_first_load() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "Slice 1-1.png");

        let mut viewer = loaded_viewer(dir.path());
        assert_eq!(viewer.state.cells().len(), 1);

        // Written before the watcher could have seen it
        write_png(dir.path(), "Slice 1-2.png");
        let _ = viewer.update(startup_reload());

        assert_eq!(viewer.state.cells().len(), 2);
        assert_eq!(viewer.state.reload_count(), 2);
        assert!(viewer.fatal.lock().unwrap().is_none());
    }

    #[test]
    fn test_reload_failure_is_kept_for_main() {
        let dir = tempfile::tempdir().unwrap();
        let pages = dir.path().join("pages");
        fs::create_dir(&pages).unwrap();
        write_png(&pages, "Slice 1-1.png");

        let mut viewer = loaded_viewer(&pages);
        fs::remove_dir_all(&pages).unwrap();
        let _ = viewer.update(Message::DirectoryChanged(ChangeNotice { events: 1 }));

        let failure = viewer.fatal.lock().unwrap().take();
        assert!(matches!(failure, Some(ViewerError::Directory { .. })));
    }

    #[test]
    fn test_selection_line() {
        let mut out = Vec::new();
        write_selection(&mut out, Path::new("pages/Slice 1-2.png")).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Selected image: pages/Slice 1-2.png\n"
        );
    }

    #[test]
    fn test_click_carries_full_path() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "Slice 1-1.png");
        write_png(dir.path(), "Slice 2-3.png");

        let viewer = loaded_viewer(dir.path());
        let clicked: Vec<PathBuf> = viewer
            .state
            .cells()
            .iter()
            .map(|cell| match click_message(cell) {
                Message::ImageClicked(path) => path,
                other => panic!("unexpected message {other:?}"),
            })
            .collect();

        assert_eq!(
            clicked,
            vec![
                dir.path().join("Slice 1-1.png"),
                dir.path().join("Slice 2-3.png"),
            ]
        );
    }
}
