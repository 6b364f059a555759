//! Configuration file watcher with rename survival.
//!
//! This module provides the [`Watcher`] type that turns raw `notify` events on
//! one file into "the configuration changed, here are the new contents".
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                 notify backend thread (inotify, FSEvents, ...)   │
//! │  ┌────────────────────┐        ┌──────────────────────────────┐  │
//! │  │ RecommendedWatcher │  ───►  │ callback: unbounded send     │  │
//! │  └────────────────────┘        └──────────────┬───────────────┘  │
//! └───────────────────────────────────────────────│──────────────────┘
//!                                                 ▼
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                 Caller task (tokio)                              │
//! │  Watcher::next_change()                                          │
//! │    select! { stop token, next event }                            │
//! │      rename/remove/create ─► re-arm registration                 │
//! │      write ─► settle window ─► FileSource::read ─► ChangeSet     │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The channel is unbounded because re-arming calls back into the notify
//! backend thread; a bounded channel filled by that thread would deadlock
//! against the consumer waiting for its reply.
//!
//! # Usage
//!
//! ```no_run
//! use cw_watcher::{Watcher, WatchConfig, WatchError};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), WatchError> {
//!     let mut watcher = Watcher::new("/etc/app/cfg.yaml", &WatchConfig::default())?;
//!     let stop = watcher.stop_handle();
//!
//!     tokio::spawn(async move {
//!         tokio::signal::ctrl_c().await.ok();
//!         stop.stop();
//!     });
//!
//!     loop {
//!         match watcher.next_change().await {
//!             Ok(change) => println!("reload: {} bytes", change.len()),
//!             Err(WatchError::Stopped) => break,
//!             Err(e) => eprintln!("reload failed: {e}"),
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use cw_core::{ChangeSet, WatchConfig};
use futures_util::Stream;
use notify::{RecommendedWatcher, RecursiveMode, Watcher as _};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::error::WatchError;
use crate::events::FsEvent;
use crate::filter::{EventFilter, WriteFilter};
use crate::source::FileSource;

type RawEvent = notify::Result<notify::Event>;

/// What the notify handle is currently registered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Registration {
    /// The watched file itself.
    File,
    /// The watched file's parent directory, while the file is missing.
    Parent,
    /// Nothing; the file went away and parent fallback is disabled.
    Lost,
}

/// State shared between a [`Watcher`] and its [`StopHandle`]s.
struct Shared {
    stop: CancellationToken,
    handle: Mutex<Option<RecommendedWatcher>>,
    path: Utf8PathBuf,
}

impl Shared {
    fn stop(&self) {
        self.stop.cancel();
        if self.handle.lock().take().is_some() {
            info!(path = %self.path, "File watcher stopped");
        }
    }
}

/// A cloneable handle that stops a [`Watcher`] from another task or thread.
///
/// Stopping is idempotent: the first call releases the notification handle,
/// later calls do nothing. Any pending or future
/// [`next_change`](Watcher::next_change) returns [`WatchError::Stopped`].
#[derive(Clone)]
pub struct StopHandle {
    shared: Arc<Shared>,
}

impl StopHandle {
    /// Stops the watcher.
    pub fn stop(&self) {
        self.shared.stop();
    }

    /// Returns `true` once the watcher has been stopped.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.shared.stop.is_cancelled()
    }
}

impl std::fmt::Debug for StopHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StopHandle")
            .field("path", &self.shared.path)
            .field("is_stopped", &self.is_stopped())
            .finish()
    }
}

/// Watches one configuration file and yields its contents on every write.
///
/// # Lifecycle
///
/// 1. **Creation**: [`Watcher::new`] canonicalizes the path, opens a notify
///    handle, and registers the file.
///
/// 2. **Waiting**: [`next_change`](Self::next_change) suspends until the file
///    is written, then returns its contents. Non-qualifying events are
///    skipped internally. Renames and removals re-arm the registration so
///    editors that save through a temporary file keep working.
///
///    Only writes trigger a reload. An atomic save that writes a temporary
///    file and renames it onto the watched path re-arms the registration but
///    returns nothing until the file is next written. Use a
///    [`KindFilter`](crate::KindFilter) that also accepts
///    [`EventClass::Rename`](crate::EventClass::Rename) to reload on such saves.
///
/// 3. **Stopping**: [`stop`](Self::stop), any [`StopHandle`], or dropping the
///    watcher releases the notify handle. Stopping is irreversible.
///
/// # Examples
///
/// ```no_run
/// use cw_watcher::{Watcher, WatchConfig};
///
/// # async fn example() -> Result<(), cw_watcher::WatchError> {
/// let mut watcher = Watcher::new("/tmp/cfg.yaml", &WatchConfig::default())?;
///
/// let change = watcher.next_change().await?;
/// println!("new config: {}", String::from_utf8_lossy(change.as_bytes()));
///
/// watcher.stop();
/// assert!(watcher.next_change().await.unwrap_err().is_stopped());
/// # Ok(())
/// # }
/// ```
pub struct Watcher<F: EventFilter = WriteFilter> {
    /// Source reading the canonical path.
    source: FileSource,

    /// Parent directory of the watched file, registered while it is missing.
    parent: Utf8PathBuf,

    /// Decides which events trigger a reload.
    filter: F,

    /// Window absorbing follow-up events after a qualifying one.
    settle: Duration,

    /// Whether to fall back to the parent directory when the file vanishes.
    watch_parent_on_loss: bool,

    /// Current registration on the notify handle.
    registration: Registration,

    /// Raw events from the notify callback.
    event_rx: mpsc::UnboundedReceiver<RawEvent>,

    /// Stop token and notify handle.
    shared: Arc<Shared>,

    /// Second sender so tests can inject raw events.
    #[cfg(test)]
    event_tx: Option<mpsc::UnboundedSender<RawEvent>>,
}

impl<F: EventFilter> std::fmt::Debug for Watcher<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watcher")
            .field("watch_path", &self.source.path())
            .field("registration", &self.registration)
            .field("is_stopped", &self.is_stopped())
            .finish_non_exhaustive()
    }
}

impl Watcher {
    /// Creates a watcher for `path` that reloads on content writes.
    ///
    /// # Errors
    ///
    /// - [`WatchError::PathNotFound`] if the path does not exist.
    /// - [`WatchError::NonUtf8Path`] if the canonical path is not UTF-8.
    /// - [`WatchError::Init`] if the notify handle cannot be created or cannot
    ///   register the path (for example when the OS watch limit is reached).
    pub fn new(path: impl AsRef<Utf8Path>, config: &WatchConfig) -> Result<Self, WatchError> {
        Self::with_source(FileSource::new(path.as_ref()), config, WriteFilter)
    }
}

impl<F: EventFilter> Watcher<F> {
    /// Creates a watcher for `path` with a custom qualifying-event filter.
    ///
    /// # Errors
    ///
    /// See [`Watcher::new`].
    pub fn with_filter(
        path: impl AsRef<Utf8Path>,
        config: &WatchConfig,
        filter: F,
    ) -> Result<Self, WatchError> {
        Self::with_source(FileSource::new(path.as_ref()), config, filter)
    }

    pub(crate) fn with_source(
        source: FileSource,
        config: &WatchConfig,
        filter: F,
    ) -> Result<Self, WatchError> {
        let path = canonicalize(source.path())?;
        let parent = path.parent().unwrap_or(path.as_path()).to_path_buf();

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        #[cfg(test)]
        let injector = event_tx.clone();
        let mut handle = RecommendedWatcher::new(
            move |res: RawEvent| {
                if event_tx.send(res).is_err() {
                    trace!("Event channel closed, dropping event");
                }
            },
            notify::Config::default(),
        )
        .map_err(|source| WatchError::Init {
            path: path.clone(),
            source,
        })?;

        handle
            .watch(path.as_std_path(), RecursiveMode::NonRecursive)
            .map_err(|source| WatchError::Init {
                path: path.clone(),
                source,
            })?;

        info!(path = %path, settle_ms = config.settle_ms, "File watcher started");

        Ok(Self {
            source: source.relocated(path.clone()),
            parent,
            filter,
            settle: config.settle(),
            watch_parent_on_loss: config.watch_parent_on_loss,
            registration: Registration::File,
            event_rx,
            shared: Arc::new(Shared {
                stop: CancellationToken::new(),
                handle: Mutex::new(Some(handle)),
                path,
            }),
            #[cfg(test)]
            event_tx: Some(injector),
        })
    }

    /// Waits for the next write to the watched file and returns its contents.
    ///
    /// Events that do not qualify (metadata changes, reads, events on other
    /// files) are skipped without returning. Rename, create and remove events
    /// re-arm the registration before being skipped.
    ///
    /// # Errors
    ///
    /// - [`WatchError::Stopped`] if the watcher was stopped before or during
    ///   the wait. Returned again on every later call.
    /// - [`WatchError::Notify`] if the notification facility reported an
    ///   error.
    /// - [`WatchError::Read`] if the file could not be read after the change.
    ///
    /// # Cancel Safety
    ///
    /// Dropping the future only loses events it had already absorbed.
    pub async fn next_change(&mut self) -> Result<ChangeSet, WatchError> {
        if self.is_stopped() {
            return Err(WatchError::Stopped);
        }

        loop {
            let event = self.recv_event().await?;
            if !self.handle_event(&event) {
                continue;
            }

            trace!(class = %event.class, "Qualifying event received");
            self.settle().await?;

            let change = self.source.read()?;
            debug!(
                path = %self.source.path(),
                bytes = change.len(),
                checksum = %change.checksum,
                "Configuration file changed"
            );
            return Ok(change);
        }
    }

    /// Converts the watcher into a stream of changes.
    ///
    /// The stream yields every [`next_change`](Self::next_change) outcome,
    /// including recoverable errors, and ends right after yielding
    /// [`WatchError::Stopped`].
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use cw_watcher::{Watcher, WatchConfig};
    /// use futures_util::StreamExt;
    ///
    /// # async fn example() -> Result<(), cw_watcher::WatchError> {
    /// let watcher = Watcher::new("/tmp/cfg.yaml", &WatchConfig::default())?;
    /// let mut changes = std::pin::pin!(watcher.into_changes());
    ///
    /// while let Some(change) = changes.next().await {
    ///     match change {
    ///         Ok(set) => println!("{} bytes", set.len()),
    ///         Err(e) => eprintln!("{e}"),
    ///     }
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn into_changes(self) -> impl Stream<Item = Result<ChangeSet, WatchError>> {
        futures_util::stream::unfold(Some(self), |state| async move {
            let mut watcher = state?;
            let result = watcher.next_change().await;
            let next = if matches!(result, Err(WatchError::Stopped)) {
                None
            } else {
                Some(watcher)
            };
            Some((result, next))
        })
    }

    /// Stops the watcher and releases the notify handle.
    ///
    /// Idempotent; see [`StopHandle`].
    pub fn stop(&self) {
        self.shared.stop();
    }

    /// Returns a handle that can stop this watcher from elsewhere.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Returns `true` once the watcher has been stopped.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.shared.stop.is_cancelled()
    }

    /// Returns the canonical path being watched.
    #[must_use]
    pub fn watch_path(&self) -> &Utf8Path {
        self.source.path()
    }

    /// Returns the source used to read the watched file.
    #[must_use]
    pub fn source(&self) -> &FileSource {
        &self.source
    }

    /// Waits for the next raw event, the stop signal winning ties.
    async fn recv_event(&mut self) -> Result<FsEvent, WatchError> {
        tokio::select! {
            biased;
            () = self.shared.stop.cancelled() => Err(WatchError::Stopped),
            raw = self.event_rx.recv() => self.accept(raw),
        }
    }

    /// Absorbs events for the settle window after a qualifying event.
    async fn settle(&mut self) -> Result<(), WatchError> {
        if self.settle.is_zero() {
            return Ok(());
        }

        let deadline = tokio::time::sleep(self.settle);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;
                () = self.shared.stop.cancelled() => return Err(WatchError::Stopped),
                () = &mut deadline => return Ok(()),
                raw = self.event_rx.recv() => {
                    let event = self.accept(raw)?;
                    if self.handle_event(&event) {
                        trace!(class = %event.class, "Coalesced qualifying event");
                    }
                }
            }
        }
    }

    /// Turns a channel receive result into an event or an error.
    ///
    /// A closed channel means the notify backend is gone. If that happened
    /// without a stop, the watcher is stopped here so its state matches the
    /// returned error.
    fn accept(&self, raw: Option<RawEvent>) -> Result<FsEvent, WatchError> {
        match raw {
            Some(Ok(event)) => Ok(FsEvent::from_notify(event)),
            Some(Err(e)) => Err(WatchError::Notify(e)),
            None => {
                if !self.is_stopped() {
                    warn!(path = %self.source.path(), "Notify backend closed its channel");
                    self.shared.stop();
                }
                Err(WatchError::Stopped)
            }
        }
    }

    /// Applies registration side effects of `event` and returns whether it
    /// should trigger a reload.
    fn handle_event(&mut self, event: &FsEvent) -> bool {
        if !event.concerns(self.source.path()) {
            trace!(class = %event.class, paths = ?event.paths, "Ignoring event for other path");
            return false;
        }

        if event.class.affects_registration() {
            self.rearm();
        }

        let qualifies = self.filter.qualifies(event);
        if !qualifies {
            debug!(class = %event.class, "Skipping non-qualifying event");
        }
        qualifies
    }

    /// Re-registers the watched file after it may have been replaced.
    ///
    /// If the file exists, any stale registration is dropped and the file is
    /// registered again, so a new inode behind the same name is picked up.
    /// If it is missing, the parent directory is registered instead (when
    /// enabled) so the file's recreation is observed.
    fn rearm(&mut self) {
        let mut guard = self.shared.handle.lock();
        let Some(handle) = guard.as_mut() else {
            return;
        };
        let path = self.source.path();

        if path.exists() {
            match self.registration {
                Registration::File => {
                    release(handle, path);
                    self.registration = Registration::Lost;
                    if register(handle, path) {
                        self.registration = Registration::File;
                    }
                }
                Registration::Parent => {
                    if register(handle, path) {
                        release(handle, &self.parent);
                        self.registration = Registration::File;
                    }
                }
                Registration::Lost => {
                    if register(handle, path) {
                        self.registration = Registration::File;
                    }
                }
            }

            if self.registration == Registration::File {
                debug!(path = %path, "Re-registered watched file");
            }
            return;
        }

        if self.registration == Registration::File {
            release(handle, path);
            self.registration = Registration::Lost;
        }

        if self.watch_parent_on_loss && self.registration == Registration::Lost {
            if register(handle, &self.parent) {
                self.registration = Registration::Parent;
                debug!(
                    path = %path,
                    parent = %self.parent,
                    "Watched file is gone, waiting for it in parent directory"
                );
            }
        } else if self.registration == Registration::Lost {
            warn!(path = %path, "Watched file is gone and will not be re-registered");
        }
    }
}

impl<F: EventFilter> Drop for Watcher<F> {
    fn drop(&mut self) {
        self.shared.stop();
    }
}

/// Canonicalizes `path`, mapping failures to initialization errors.
fn canonicalize(path: &Utf8Path) -> Result<Utf8PathBuf, WatchError> {
    let canonical = std::fs::canonicalize(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            WatchError::path_not_found(path)
        } else {
            WatchError::Init {
                path: path.to_path_buf(),
                source: notify::Error::io(e),
            }
        }
    })?;

    Utf8PathBuf::try_from(canonical).map_err(|e| WatchError::non_utf8_path(e.into_path_buf()))
}

fn register(handle: &mut RecommendedWatcher, path: &Utf8Path) -> bool {
    match handle.watch(path.as_std_path(), RecursiveMode::NonRecursive) {
        Ok(()) => true,
        Err(e) => {
            warn!(path = %path, error = %e, "Failed to register path");
            false
        }
    }
}

fn release(handle: &mut RecommendedWatcher, path: &Utf8Path) {
    if let Err(e) = handle.unwatch(path.as_std_path()) {
        debug!(path = %path, error = %e, "Stale registration already gone");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventClass;
    use crate::filter::KindFilter;
    use futures_util::StreamExt;
    use std::fs;
    use tempfile::TempDir;

    /// Upper bound for events that must arrive.
    const WAIT: Duration = Duration::from_secs(5);

    /// How long to wait before concluding nothing will arrive.
    const QUIET: Duration = Duration::from_millis(400);

    fn create_config_file(contents: &str) -> (TempDir, Utf8PathBuf) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = Utf8PathBuf::from_path_buf(temp_dir.path().join("cfg.yaml"))
            .expect("Invalid path");
        fs::write(&path, contents).expect("Failed to write file");
        (temp_dir, path)
    }

    fn start(path: &Utf8Path) -> Watcher {
        Watcher::new(path, &WatchConfig::default()).expect("Failed to create watcher")
    }

    #[tokio::test]
    async fn test_watcher_creation() {
        let (_dir, path) = create_config_file("a: 1");
        let watcher = start(&path);

        assert!(!watcher.is_stopped());
        assert_eq!(watcher.registration, Registration::File);
        assert_eq!(watcher.watch_path().file_name(), Some("cfg.yaml"));
        assert_eq!(watcher.source().format(), "yaml");
    }

    #[tokio::test]
    async fn test_watcher_path_not_found() {
        let result = Watcher::new("/nonexistent/path/cfg.yaml", &WatchConfig::default());

        match result {
            Err(WatchError::PathNotFound(p)) => assert_eq!(p, "/nonexistent/path/cfg.yaml"),
            other => panic!("Expected PathNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stop_before_next_change() {
        let (_dir, path) = create_config_file("a: 1");
        let mut watcher = start(&path);

        watcher.stop();

        let result = tokio::time::timeout(WAIT, watcher.next_change())
            .await
            .expect("next_change blocked after stop");
        assert!(matches!(result, Err(WatchError::Stopped)));
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let (_dir, path) = create_config_file("a: 1");
        let mut watcher = start(&path);
        let handle = watcher.stop_handle();

        watcher.stop();
        watcher.stop();
        handle.stop();

        assert!(handle.is_stopped());
        assert!(watcher.is_stopped());
        for _ in 0..3 {
            let result = tokio::time::timeout(WAIT, watcher.next_change())
                .await
                .expect("next_change blocked after stop");
            assert!(matches!(result, Err(WatchError::Stopped)));
        }
    }

    #[tokio::test]
    async fn test_stop_unblocks_pending_next_change() {
        let (_dir, path) = create_config_file("a: 1");
        let mut watcher = start(&path);
        let handle = watcher.stop_handle();

        let pending = tokio::spawn(async move { watcher.next_change().await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.stop();

        let result = tokio::time::timeout(WAIT, pending)
            .await
            .expect("next_change did not observe stop")
            .expect("Task panicked");
        assert!(matches!(result, Err(WatchError::Stopped)));
    }

    #[tokio::test]
    async fn test_overwrite_yields_new_contents_once() {
        let (_dir, path) = create_config_file("a: 1");
        let mut watcher = start(&path);

        fs::write(&path, "a: 2").expect("Failed to write file");

        let change = tokio::time::timeout(WAIT, watcher.next_change())
            .await
            .expect("No change observed")
            .expect("next_change failed");
        assert_eq!(change.as_bytes(), b"a: 2");
        assert_eq!(change.format, "yaml");
        assert!(change.is_valid());

        // One write, one change
        let again = tokio::time::timeout(QUIET, watcher.next_change()).await;
        assert!(again.is_err(), "Unexpected second change: {again:?}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_metadata_change_is_ignored() {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, path) = create_config_file("a: 1");
        let mut watcher = start(&path);

        fs::set_permissions(&path, fs::Permissions::from_mode(0o600))
            .expect("Failed to chmod file");

        let skipped = tokio::time::timeout(QUIET, watcher.next_change()).await;
        assert!(skipped.is_err(), "chmod produced a change: {skipped:?}");

        fs::write(&path, "a: 3").expect("Failed to write file");
        let change = tokio::time::timeout(WAIT, watcher.next_change())
            .await
            .expect("No change observed")
            .expect("next_change failed");
        assert_eq!(change.as_bytes(), b"a: 3");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_custom_filter_accepts_metadata() {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, path) = create_config_file("a: 1");
        let filter = KindFilter::new(&[EventClass::Write, EventClass::Metadata]);
        let mut watcher = FileSource::new(path.clone())
            .watch_with_filter(&WatchConfig::default(), filter)
            .expect("Failed to create watcher");

        fs::set_permissions(&path, fs::Permissions::from_mode(0o600))
            .expect("Failed to chmod file");

        let change = tokio::time::timeout(WAIT, watcher.next_change())
            .await
            .expect("No change observed")
            .expect("next_change failed");
        assert_eq!(change.as_bytes(), b"a: 1");
    }

    #[tokio::test]
    async fn test_rename_then_recreate_still_notifies() {
        let (dir, path) = create_config_file("a: 1");
        let mut watcher = start(&path);

        let pending = tokio::spawn(async move {
            let result = tokio::time::timeout(WAIT, watcher.next_change()).await;
            (watcher, result)
        });

        fs::rename(&path, dir.path().join("cfg.yaml.bak")).expect("Failed to rename file");
        tokio::time::sleep(Duration::from_millis(200)).await;
        fs::write(&path, "a: 2").expect("Failed to recreate file");
        tokio::time::sleep(Duration::from_millis(200)).await;
        fs::write(&path, "a: 3").expect("Failed to write file");

        let (_watcher, result) = pending.await.expect("Task panicked");
        let change = result
            .expect("No change observed after rename")
            .expect("next_change failed");

        // Depending on when the rename is processed, either the recreation or
        // the follow-up write is the first change observed.
        assert!(
            change.as_bytes() == b"a: 2" || change.as_bytes() == b"a: 3",
            "Unexpected contents: {:?}",
            String::from_utf8_lossy(change.as_bytes())
        );
    }

    #[tokio::test]
    async fn test_deleted_file_is_read_error() {
        let (_dir, path) = create_config_file("a: 1");
        let mut watcher = start(&path);

        fs::write(&path, "a: 2").expect("Failed to write file");
        fs::remove_file(&path).expect("Failed to remove file");

        let result = tokio::time::timeout(WAIT, watcher.next_change())
            .await
            .expect("No event observed");
        match result {
            Err(WatchError::Read { source, .. }) => {
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("Expected Read error, got {other:?}"),
        }
        assert!(!watcher.is_stopped());
    }

    #[tokio::test]
    async fn test_passthrough_surfaces_writes() {
        let (_dir, path) = create_config_file("a: 1");
        let mut watcher =
            Watcher::new(&path, &WatchConfig::passthrough()).expect("Failed to create watcher");

        fs::write(&path, "a: 2").expect("Failed to write file");

        let change = tokio::time::timeout(WAIT, watcher.next_change())
            .await
            .expect("No change observed")
            .expect("next_change failed");

        // Without a settle window the truncation may be observed on its own.
        assert!(change.is_empty() || change.as_bytes() == b"a: 2");
    }

    #[tokio::test]
    async fn test_stream_ends_after_stop() {
        let (_dir, path) = create_config_file("a: 1");
        let watcher = start(&path);
        let handle = watcher.stop_handle();

        handle.stop();

        let mut changes = std::pin::pin!(watcher.into_changes());
        let first = tokio::time::timeout(WAIT, changes.next())
            .await
            .expect("Stream blocked after stop");
        assert!(matches!(first, Some(Err(WatchError::Stopped))));
        assert!(changes.next().await.is_none());
    }

    #[tokio::test]
    async fn test_dropping_watcher_stops_handles() {
        let (_dir, path) = create_config_file("a: 1");
        let watcher = start(&path);
        let handle = watcher.stop_handle();

        drop(watcher);
        assert!(handle.is_stopped());
    }

    #[tokio::test]
    async fn test_events_for_other_paths_are_ignored() {
        let (dir, path) = create_config_file("a: 1");
        let mut watcher = start(&path);
        let canonical = watcher.watch_path().to_path_buf();

        let sibling = Utf8PathBuf::from_path_buf(dir.path().join("other.yaml"))
            .expect("Invalid path");
        assert!(!watcher.handle_event(&FsEvent::new(EventClass::Write, [sibling])));
        assert!(!watcher.handle_event(&FsEvent::new(EventClass::Metadata, [canonical.clone()])));
        assert!(watcher.handle_event(&FsEvent::new(EventClass::Write, [canonical])));
    }

    #[tokio::test]
    async fn test_rearm_falls_back_to_parent_and_back() {
        let (dir, path) = create_config_file("a: 1");
        let mut watcher = start(&path);
        let canonical = watcher.watch_path().to_path_buf();

        fs::rename(&path, dir.path().join("cfg.yaml.bak")).expect("Failed to rename file");
        watcher.handle_event(&FsEvent::new(EventClass::Rename, [canonical.clone()]));
        assert_eq!(watcher.registration, Registration::Parent);

        fs::write(&path, "a: 2").expect("Failed to recreate file");
        watcher.handle_event(&FsEvent::new(EventClass::Create, [canonical.clone()]));
        assert_eq!(watcher.registration, Registration::File);

        // A rename onto the watched name re-registers the new file
        watcher.handle_event(&FsEvent::new(EventClass::Rename, [canonical]));
        assert_eq!(watcher.registration, Registration::File);
    }

    #[tokio::test]
    async fn test_rearm_without_parent_fallback() {
        let (_dir, path) = create_config_file("a: 1");
        let config = WatchConfig {
            watch_parent_on_loss: false,
            ..WatchConfig::default()
        };
        let mut watcher = Watcher::new(&path, &config).expect("Failed to create watcher");
        let canonical = watcher.watch_path().to_path_buf();

        fs::remove_file(&path).expect("Failed to remove file");
        watcher.handle_event(&FsEvent::new(EventClass::Remove, [canonical.clone()]));
        assert_eq!(watcher.registration, Registration::Lost);

        // Recreated before the next rename is processed: registered again
        fs::write(&path, "a: 2").expect("Failed to recreate file");
        watcher.handle_event(&FsEvent::new(EventClass::Rename, [canonical]));
        assert_eq!(watcher.registration, Registration::File);
    }

    #[tokio::test]
    async fn test_rearm_after_stop_is_noop() {
        let (_dir, path) = create_config_file("a: 1");
        let mut watcher = start(&path);
        let canonical = watcher.watch_path().to_path_buf();

        watcher.stop();
        fs::remove_file(&path).expect("Failed to remove file");
        watcher.handle_event(&FsEvent::new(EventClass::Remove, [canonical]));
        assert_eq!(watcher.registration, Registration::File);
    }

    fn inject(watcher: &Watcher, event: RawEvent) {
        watcher
            .event_tx
            .as_ref()
            .expect("Injector already dropped")
            .send(event)
            .expect("Event channel closed");
    }

    fn content_write(path: &Utf8Path) -> RawEvent {
        use notify::event::{DataChange, EventKind, ModifyKind};

        Ok(
            notify::Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
                .add_path(path.as_std_path().to_path_buf()),
        )
    }

    fn slow_settle() -> WatchConfig {
        WatchConfig {
            settle_ms: 10_000,
            ..WatchConfig::default()
        }
    }

    #[tokio::test]
    async fn test_notify_error_reaches_caller() {
        let (_dir, path) = create_config_file("a: 1");
        let mut watcher = start(&path);

        inject(&watcher, Err(notify::Error::generic("queue overflow")));

        let result = tokio::time::timeout(WAIT, watcher.next_change())
            .await
            .expect("Error was not surfaced");
        match result {
            Err(WatchError::Notify(e)) => assert!(e.to_string().contains("queue overflow")),
            other => panic!("Expected Notify error, got {other:?}"),
        }
        assert!(!watcher.is_stopped());
    }

    #[tokio::test]
    async fn test_notify_error_wins_during_settle_window() {
        let (_dir, path) = create_config_file("a: 1");
        let mut watcher = Watcher::new(&path, &slow_settle()).expect("Failed to create watcher");
        let canonical = watcher.watch_path().to_path_buf();

        inject(&watcher, content_write(&canonical));
        inject(&watcher, Err(notify::Error::generic("backend failure")));

        let result = tokio::time::timeout(WAIT, watcher.next_change())
            .await
            .expect("Settle window ignored the error");
        assert!(matches!(result, Err(WatchError::Notify(_))), "{result:?}");
        assert!(!watcher.is_stopped());
    }

    #[tokio::test]
    async fn test_stop_wins_during_settle_window() {
        let (_dir, path) = create_config_file("a: 1");
        let mut watcher = Watcher::new(&path, &slow_settle()).expect("Failed to create watcher");
        let canonical = watcher.watch_path().to_path_buf();
        let handle = watcher.stop_handle();

        inject(&watcher, content_write(&canonical));
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            handle.stop();
        });

        let result = tokio::time::timeout(WAIT, watcher.next_change())
            .await
            .expect("Settle window ignored the stop");
        assert!(matches!(result, Err(WatchError::Stopped)), "{result:?}");
    }

    #[tokio::test]
    async fn test_closed_channel_stops_watcher() {
        let (_dir, path) = create_config_file("a: 1");
        let mut watcher = start(&path);

        // Backend goes away without a stop: both senders are dropped
        watcher.event_tx = None;
        drop(watcher.shared.handle.lock().take());
        assert!(!watcher.is_stopped());

        let result = tokio::time::timeout(WAIT, watcher.next_change())
            .await
            .expect("Closed channel was not observed");
        assert!(matches!(result, Err(WatchError::Stopped)), "{result:?}");
        assert!(watcher.is_stopped());
    }

    #[tokio::test]
    async fn test_atomic_rename_onto_path_rearms_without_reload() {
        let (dir, path) = create_config_file("a: 1");
        let mut watcher = start(&path);
        let canonical = watcher.watch_path().to_path_buf();

        let staged = dir.path().join("cfg.yaml.tmp");
        fs::write(&staged, "a: 2").expect("Failed to write temp file");
        fs::rename(&staged, &path).expect("Failed to rename temp file");

        let rename = FsEvent::new(EventClass::Rename, [canonical]);
        assert!(!watcher.handle_event(&rename));
        assert_eq!(watcher.registration, Registration::File);

        let reloading = KindFilter::new(&[EventClass::Write, EventClass::Rename]);
        assert!(reloading.qualifies(&rename));
    }
}
