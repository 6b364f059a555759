//! Classification of raw filesystem events.
//!
//! The notify crate reports a detailed, platform-dependent [`EventKind`]
//! taxonomy. The watcher only cares about a handful of coarse categories, so
//! every raw event is first reduced to an [`FsEvent`] carrying an
//! [`EventClass`] and the UTF-8 paths it concerns.
//!
//! # Event Flow
//!
//! ```text
//! notify::Event (platform specific kind)
//!        │
//!        ▼
//!   FsEvent::from_notify
//!        │
//!        ├── Rename / Remove / Create ──► re-arm registrations
//!        │
//!        └── EventFilter::qualifies ────► reload
//! ```

use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use notify::event::ModifyKind;
use notify::EventKind;
use smallvec::SmallVec;

/// Coarse category of a filesystem event.
///
/// # Examples
///
/// ```
/// use cw_watcher::EventClass;
/// use notify::event::{DataChange, EventKind, MetadataKind, ModifyKind};
///
/// let write = EventKind::Modify(ModifyKind::Data(DataChange::Content));
/// assert_eq!(EventClass::from_kind(&write), EventClass::Write);
///
/// let chmod = EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions));
/// assert_eq!(EventClass::from_kind(&chmod), EventClass::Metadata);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum EventClass {
    /// File contents changed.
    Write,
    /// File was renamed, either away from or onto the reported path.
    Rename,
    /// File was created.
    Create,
    /// File was removed.
    Remove,
    /// Only metadata (permissions, timestamps, ownership) changed.
    Metadata,
    /// File was opened, read, or closed.
    Access,
    /// Anything the backend could not classify.
    Other,
}

impl EventClass {
    /// Reduces a notify [`EventKind`] to its class.
    ///
    /// Backends that cannot tell what kind of modification happened (such as
    /// `ReadDirectoryChangesW`, which reports `Modify(Any)`) are treated as
    /// writes.
    #[must_use]
    pub const fn from_kind(kind: &EventKind) -> Self {
        match kind {
            EventKind::Modify(ModifyKind::Name(_)) => Self::Rename,
            EventKind::Modify(ModifyKind::Metadata(_)) => Self::Metadata,
            EventKind::Modify(_) => Self::Write,
            EventKind::Create(_) => Self::Create,
            EventKind::Remove(_) => Self::Remove,
            EventKind::Access(_) => Self::Access,
            _ => Self::Other,
        }
    }

    /// Returns `true` for events that may have replaced or removed the file
    /// behind a registered path.
    #[inline]
    #[must_use]
    pub const fn affects_registration(self) -> bool {
        matches!(self, Self::Rename | Self::Remove | Self::Create)
    }

    /// Returns a short lowercase label for logging.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Write => "write",
            Self::Rename => "rename",
            Self::Create => "create",
            Self::Remove => "remove",
            Self::Metadata => "metadata",
            Self::Access => "access",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for EventClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A classified filesystem event.
///
/// Most events concern a single path; renames reported with both ends carry
/// two, so the paths are stored inline for up to two entries.
///
/// # Examples
///
/// ```
/// use cw_watcher::{EventClass, FsEvent};
/// use camino::{Utf8Path, Utf8PathBuf};
///
/// let event = FsEvent::new(EventClass::Write, [Utf8PathBuf::from("/etc/app/cfg.yaml")]);
/// assert!(event.concerns(Utf8Path::new("/etc/app/cfg.yaml")));
/// assert!(!event.concerns(Utf8Path::new("/etc/app/other.yaml")));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEvent {
    /// The event's class.
    pub class: EventClass,

    /// The paths the event was reported for.
    pub paths: SmallVec<[Utf8PathBuf; 2]>,
}

impl FsEvent {
    /// Creates an event from a class and its paths.
    #[must_use]
    pub fn new(class: EventClass, paths: impl IntoIterator<Item = Utf8PathBuf>) -> Self {
        Self {
            class,
            paths: paths.into_iter().collect(),
        }
    }

    /// Classifies a raw notify event.
    ///
    /// Paths that are not valid UTF-8 cannot name the watched file and are
    /// dropped with a warning.
    #[must_use]
    pub fn from_notify(event: notify::Event) -> Self {
        let class = EventClass::from_kind(&event.kind);
        let paths = event
            .paths
            .into_iter()
            .filter_map(|path| match Utf8PathBuf::try_from(path) {
                Ok(p) => Some(p),
                Err(e) => {
                    tracing::warn!(
                        path = %e.as_path().display(),
                        "Skipping non-UTF-8 path in file event"
                    );
                    None
                }
            })
            .collect();

        Self { class, paths }
    }

    /// Returns `true` if `path` is one of the event's paths.
    #[inline]
    #[must_use]
    pub fn concerns(&self, path: &Utf8Path) -> bool {
        self.paths.iter().any(|p| p == path)
    }
}
