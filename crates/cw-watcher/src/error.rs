//! Error types for the cw-watcher crate.
//!
//! This module provides the [`WatchError`] type returned by every watcher and
//! file-source operation.

use camino::Utf8PathBuf;

/// Errors that can occur while watching or reading a configuration file.
///
/// # Error Categories
///
/// - **Initialization** ([`WatchError::Init`], [`WatchError::PathNotFound`],
///   [`WatchError::NonUtf8Path`]): the watcher could not be created.
/// - **Watch mechanism** ([`WatchError::Notify`]): the OS notification
///   facility reported an error while waiting. The next call may succeed.
/// - **Read** ([`WatchError::Read`]): the file could not be read after a
///   change, for example because it was deleted in between. The next call may
///   succeed.
/// - **Stopped** ([`WatchError::Stopped`]): the watcher was stopped. Every
///   later call returns this again.
///
/// Nothing is retried internally; the caller decides whether to call
/// [`next_change`](crate::Watcher::next_change) again.
///
/// # Examples
///
/// ```
/// use cw_watcher::WatchError;
///
/// fn handle_error(err: &WatchError) -> bool {
///     match err {
///         WatchError::Stopped => false,
///         WatchError::Read { path, .. } => {
///             eprintln!("could not reload {path}");
///             true
///         }
///         other => !other.is_fatal(),
///     }
/// }
///
/// assert!(!handle_error(&WatchError::Stopped));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// The notification handle could not be created or could not register
    /// the path.
    #[error("failed to watch {path}: {source}")]
    Init {
        /// The path that was being registered.
        path: Utf8PathBuf,
        /// The underlying notify error.
        #[source]
        source: notify::Error,
    },

    /// The path to watch does not exist.
    #[error("path does not exist: {0}")]
    PathNotFound(Utf8PathBuf),

    /// A path is not valid UTF-8.
    #[error("path is not valid UTF-8: {}", _0.display())]
    NonUtf8Path(std::path::PathBuf),

    /// The notification facility reported an error while waiting for events.
    #[error("watch mechanism error: {0}")]
    Notify(#[from] notify::Error),

    /// The file could not be read after a change.
    #[error("failed to read {path}: {source}")]
    Read {
        /// The file that could not be read.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The watcher has been stopped.
    #[error("watcher stopped")]
    Stopped,
}

impl WatchError {
    /// Creates a new [`WatchError::PathNotFound`] error.
    #[inline]
    pub fn path_not_found(path: impl Into<Utf8PathBuf>) -> Self {
        Self::PathNotFound(path.into())
    }

    /// Creates a new [`WatchError::NonUtf8Path`] error.
    #[inline]
    pub fn non_utf8_path(path: impl Into<std::path::PathBuf>) -> Self {
        Self::NonUtf8Path(path.into())
    }

    /// Creates a new [`WatchError::Read`] error.
    #[inline]
    pub fn read(path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` if the watcher was stopped.
    #[inline]
    #[must_use]
    pub const fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    /// Returns `true` if this error happened while creating the watcher.
    #[inline]
    #[must_use]
    pub const fn is_init(&self) -> bool {
        matches!(
            self,
            Self::Init { .. } | Self::PathNotFound(_) | Self::NonUtf8Path(_)
        )
    }

    /// Returns `true` if calling [`next_change`](crate::Watcher::next_change)
    /// again cannot succeed.
    #[inline]
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::Notify(_) | Self::Read { .. })
    }

    /// Returns the file path associated with this error, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Utf8PathBuf> {
        match self {
            Self::Init { path, .. } | Self::Read { path, .. } | Self::PathNotFound(path) => {
                Some(path)
            }
            Self::NonUtf8Path(_) | Self::Notify(_) | Self::Stopped => None,
        }
    }
}
