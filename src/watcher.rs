/// Directory watcher
///
/// A notify watcher feeds a bridge thread that folds bursts of events into
/// a single `ChangeNotice` and publishes it to the UI.

use std::path::Path;
use std::sync::mpsc as std_mpsc;
use std::sync::Mutex;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use notify::event::{AccessKind, AccessMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::broadcast;

use crate::error::{Result, ViewerError};

/// "Something in the directory changed"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeNotice {
    /// Number of file system events folded into this notice
    pub events: usize,
}

/// Broadcast channel for change notices whose first receiver exists from the start
///
/// Notices sent before the UI subscribes wait in that receiver instead of
/// being dropped for lack of listeners.
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeNotice>,
    first: Mutex<Option<broadcast::Receiver<ChangeNotice>>>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = broadcast::channel(capacity);
        ChangeFeed {
            tx,
            first: Mutex::new(Some(rx)),
        }
    }

    pub fn sender(&self) -> broadcast::Sender<ChangeNotice> {
        self.tx.clone()
    }

    /// The buffered first receiver on the first call, a fresh one after that
    pub fn receiver(&self) -> broadcast::Receiver<ChangeNotice> {
        self.first
            .lock()
            .ok()
            .and_then(|mut first| first.take())
            .unwrap_or_else(|| self.tx.subscribe())
    }
}

pub struct DirectoryWatcher {
    watcher: Option<RecommendedWatcher>,
    bridge: Option<JoinHandle<()>>,
}

impl DirectoryWatcher {
    /// Start watching `dir` (not recursively)
    ///
    /// Notices go out once no new event has arrived for `quiet`. A zero
    /// quiet period sends one notice per event.
    pub fn spawn(
        dir: &Path,
        quiet: Duration,
        tx_ui: broadcast::Sender<ChangeNotice>,
    ) -> Result<Self> {
        // Std mpsc channel for the notify callback; the bridge thread forwards to the UI
        let (tx_fs, rx_fs) = std_mpsc::channel::<notify::Result<Event>>();

        let watch_error = |source| ViewerError::Watch {
            path: dir.to_path_buf(),
            source,
        };

        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx_fs.send(res);
        })
        .map_err(watch_error)?;

        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(watch_error)?;

        let bridge = thread::Builder::new()
            .name("slice-watcher".into())
            .spawn(move || bridge_events(rx_fs, quiet, tx_ui))
            .map_err(ViewerError::Thread)?;

        tracing::info!(dir = %dir.display(), quiet_ms = quiet.as_millis() as u64, "👀 Watching directory");

        Ok(DirectoryWatcher {
            watcher: Some(watcher),
            bridge: Some(bridge),
        })
    }

    /// Stop watching and wait for the bridge thread to finish
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // Dropping the watcher drops its callback, which disconnects the bridge
        drop(self.watcher.take());

        if let Some(bridge) = self.bridge.take() {
            if bridge.join().is_err() {
                tracing::error!("watcher thread panicked");
            }
            tracing::debug!("watcher stopped");
        }
    }
}

impl Drop for DirectoryWatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Forward file system events as change notices until the watcher goes away
fn bridge_events(
    rx_fs: std_mpsc::Receiver<notify::Result<Event>>,
    quiet: Duration,
    tx_ui: broadcast::Sender<ChangeNotice>,
) {
    let mut pending = 0usize;

    loop {
        // Block when idle, wait out the quiet period while events are pending
        let recv_result = if pending > 0 {
            rx_fs.recv_timeout(quiet)
        } else {
            rx_fs
                .recv()
                .map_err(|_| std_mpsc::RecvTimeoutError::Disconnected)
        };

        match recv_result {
            Ok(Ok(event)) => {
                if is_change(&event) {
                    pending += 1;
                }
            }
            Ok(Err(err)) => {
                // Treat watcher errors as a change: the next reload will surface real problems
                tracing::warn!("⚠️  Watcher error: {err}");
                pending += 1;
            }
            Err(std_mpsc::RecvTimeoutError::Timeout) => flush(&tx_ui, &mut pending),
            Err(std_mpsc::RecvTimeoutError::Disconnected) => {
                flush(&tx_ui, &mut pending);
                break;
            }
        }

        // With a zero quiet period every event goes out on its own
        if quiet.is_zero() {
            flush(&tx_ui, &mut pending);
        }
    }
}

fn flush(tx_ui: &broadcast::Sender<ChangeNotice>, pending: &mut usize) {
    if *pending > 0 {
        // No receivers left means the UI has shut down
        let _ = tx_ui.send(ChangeNotice { events: *pending });
        *pending = 0;
    }
}

/// Opens, reads and read-only closes don't change the directory; reloading
/// opens every image, so counting them would retrigger reloads forever.
/// Closing a file that was open for writing means its contents are final.
fn is_change(event: &Event) -> bool {
    match event.kind {
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => true,
        EventKind::Access(_) => false,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
    use std::fs;
    use std::time::Instant;

    fn event(kind: EventKind) -> notify::Result<Event> {
        Ok(Event::new(kind))
    }

    #[test]
    fn test_every_change_kind_counts() {
        for kind in [
            EventKind::Any,
            EventKind::Create(CreateKind::File),
            EventKind::Modify(ModifyKind::Any),
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            EventKind::Remove(RemoveKind::File),
            EventKind::Other,
            EventKind::Access(AccessKind::Close(AccessMode::Write)),
        ] {
            let event = Event::new(kind);
            assert!(is_change(&event), "{:?}", event.kind);
        }
    }

    #[test]
    fn test_reads_are_not_changes() {
        for kind in [
            EventKind::Access(AccessKind::Any),
            EventKind::Access(AccessKind::Read),
            EventKind::Access(AccessKind::Open(AccessMode::Read)),
            EventKind::Access(AccessKind::Open(AccessMode::Write)),
            EventKind::Access(AccessKind::Close(AccessMode::Read)),
            EventKind::Access(AccessKind::Other),
        ] {
            let event = Event::new(kind);
            assert!(!is_change(&event), "{:?}", event.kind);
        }
    }

    #[test]
    fn test_finished_write_triggers_reload() {
        let (tx_fs, rx_fs) = std_mpsc::channel();
        let (tx_ui, mut rx_ui) = broadcast::channel(16);

        // An in-place rewrite: open, then close after writing
        tx_fs
            .send(event(EventKind::Access(AccessKind::Open(AccessMode::Write))))
            .unwrap();
        tx_fs
            .send(event(EventKind::Access(AccessKind::Close(AccessMode::Write))))
            .unwrap();
        drop(tx_fs);

        bridge_events(rx_fs, Duration::ZERO, tx_ui);
        assert_eq!(rx_ui.try_recv().unwrap(), ChangeNotice { events: 1 });
        assert!(rx_ui.try_recv().is_err());
    }

    #[test]
    fn test_feed_keeps_notices_sent_before_subscribing() {
        let feed = ChangeFeed::new(8);
        let (tx_fs, rx_fs) = std_mpsc::channel();
        tx_fs.send(event(EventKind::Create(CreateKind::File))).unwrap();
        drop(tx_fs);

        // The bridge flushes while nobody has asked for a receiver yet
        bridge_events(rx_fs, Duration::ZERO, feed.sender());

        let mut rx = feed.receiver();
        assert_eq!(rx.try_recv().unwrap(), ChangeNotice { events: 1 });

        // Later receivers start from the current tail
        let mut late = feed.receiver();
        assert!(late.try_recv().is_err());
    }

    #[test]
    fn test_burst_is_coalesced() {
        let (tx_fs, rx_fs) = std_mpsc::channel();
        let (tx_ui, mut rx_ui) = broadcast::channel(16);

        for _ in 0..5 {
            tx_fs.send(event(EventKind::Create(CreateKind::File))).unwrap();
        }
        tx_fs
            .send(event(EventKind::Access(AccessKind::Close(AccessMode::Read))))
            .unwrap();
        drop(tx_fs);

        bridge_events(rx_fs, Duration::from_millis(50), tx_ui);

        // The sender disconnected mid-quiet-period, so the batch is flushed once
        assert_eq!(rx_ui.try_recv().unwrap(), ChangeNotice { events: 5 });
        assert!(rx_ui.try_recv().is_err());
    }

    #[test]
    fn test_zero_quiet_forwards_each_event() {
        let (tx_fs, rx_fs) = std_mpsc::channel();
        let (tx_ui, mut rx_ui) = broadcast::channel(16);

        for _ in 0..3 {
            tx_fs.send(event(EventKind::Remove(RemoveKind::File))).unwrap();
        }
        drop(tx_fs);

        bridge_events(rx_fs, Duration::ZERO, tx_ui);

        for _ in 0..3 {
            assert_eq!(rx_ui.try_recv().unwrap(), ChangeNotice { events: 1 });
        }
        assert!(rx_ui.try_recv().is_err());
    }

    #[test]
    fn test_watcher_errors_trigger_reload() {
        let (tx_fs, rx_fs) = std_mpsc::channel();
        let (tx_ui, mut rx_ui) = broadcast::channel(16);

        tx_fs.send(Err(notify::Error::generic("permission revoked"))).unwrap();
        drop(tx_fs);

        bridge_events(rx_fs, Duration::ZERO, tx_ui);
        assert_eq!(rx_ui.try_recv().unwrap(), ChangeNotice { events: 1 });
    }

    #[test]
    fn test_reports_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let (tx_ui, mut rx_ui) = broadcast::channel(16);

        let watcher =
            DirectoryWatcher::spawn(dir.path(), Duration::from_millis(50), tx_ui).unwrap();
        fs::write(dir.path().join("Slice 1-1.png"), b"png").unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        let notice = loop {
            match rx_ui.try_recv() {
                Ok(notice) => break Some(notice),
                Err(_) if Instant::now() < deadline => thread::sleep(Duration::from_millis(20)),
                Err(_) => break None,
            }
        };
        watcher.stop();

        assert!(notice.is_some_and(|n| n.events >= 1));
    }

    #[test]
    fn test_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let (tx_ui, _rx_ui) = broadcast::channel(16);

        let result = DirectoryWatcher::spawn(&dir.path().join("gone"), Duration::ZERO, tx_ui);
        assert!(matches!(result, Err(ViewerError::Watch { .. })));
    }
}
