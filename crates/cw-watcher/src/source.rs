//! File-backed configuration source.
//!
//! A [`FileSource`] names one configuration file. It can read the file into a
//! [`ChangeSet`] on demand and hand out a [`Watcher`] that produces a fresh
//! [`ChangeSet`] whenever the file is written.

use std::io::Read;
use std::time::SystemTime;

use camino::{Utf8Path, Utf8PathBuf};
use cw_core::changeset::FILE_SOURCE;
use cw_core::{ChangeSet, SourceConfig, WatchConfig};

use crate::error::WatchError;
use crate::filter::EventFilter;
use crate::watcher::Watcher;

/// A configuration source backed by a single file.
///
/// # Examples
///
/// ```no_run
/// use cw_watcher::FileSource;
///
/// # fn example() -> Result<(), cw_watcher::WatchError> {
/// let source = FileSource::new("/etc/app/cfg.yaml");
/// let initial = source.read()?;
/// assert_eq!(initial.format, "yaml");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSource {
    path: Utf8PathBuf,
    default_format: String,
}

impl FileSource {
    /// Creates a source for `path` with `json` as the fallback format.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            path: path.into(),
            default_format: SourceConfig::default().default_format,
        }
    }

    /// Creates a source from its configuration.
    #[must_use]
    pub fn from_config(config: &SourceConfig) -> Self {
        Self {
            path: config.path.clone(),
            default_format: config.default_format.clone(),
        }
    }

    /// Sets the format reported for files without an extension.
    #[must_use]
    pub fn with_default_format(mut self, format: impl Into<String>) -> Self {
        self.default_format = format.into();
        self
    }

    /// Returns the source's name, stamped on every change set.
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        FILE_SOURCE
    }

    /// Returns the file path.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Returns the format reported for change sets from this source.
    ///
    /// This is the file extension, or the default format when there is none.
    #[must_use]
    pub fn format(&self) -> &str {
        self.path.extension().unwrap_or(self.default_format.as_str())
    }

    /// Reads the file into a [`ChangeSet`].
    ///
    /// The timestamp is the file's modification time, falling back to the
    /// current time on platforms that do not record one.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Read`] if the file cannot be opened or read.
    pub fn read(&self) -> Result<ChangeSet, WatchError> {
        read_change_set(&self.path, self.format())
    }

    /// Starts watching the file with the default [`WriteFilter`](crate::WriteFilter).
    ///
    /// # Errors
    ///
    /// See [`Watcher::new`].
    pub fn watch(&self, config: &WatchConfig) -> Result<Watcher, WatchError> {
        Watcher::with_source(self.clone(), config, crate::filter::WriteFilter)
    }

    /// Starts watching the file with a custom filter.
    ///
    /// # Errors
    ///
    /// See [`Watcher::new`].
    pub fn watch_with_filter<F: EventFilter>(
        &self,
        config: &WatchConfig,
        filter: F,
    ) -> Result<Watcher<F>, WatchError> {
        Watcher::with_source(self.clone(), config, filter)
    }

    /// Returns a copy of this source reading from `path` instead.
    pub(crate) fn relocated(&self, path: Utf8PathBuf) -> Self {
        Self {
            path,
            default_format: self.default_format.clone(),
        }
    }
}

impl Default for FileSource {
    fn default() -> Self {
        Self::from_config(&SourceConfig::default())
    }
}

fn read_change_set(path: &Utf8Path, format: &str) -> Result<ChangeSet, WatchError> {
    let mut file = std::fs::File::open(path).map_err(|e| WatchError::read(path, e))?;
    let timestamp = file
        .metadata()
        .and_then(|meta| meta.modified())
        .unwrap_or_else(|_| SystemTime::now());

    let mut data = Vec::new();
    file.read_to_end(&mut data).map_err(|e| WatchError::read(path, e))?;

    tracing::trace!(path = %path, bytes = data.len(), "Read configuration file");

    Ok(ChangeSet::new(data, format, FILE_SOURCE, timestamp))
}
