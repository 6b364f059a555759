//! Qualifying-event filters.
//!
//! A filter decides which classified events are worth a reload. The default,
//! [`WriteFilter`], accepts content writes only. In particular it ignores the
//! metadata event some platforms emit alongside every write (macOS reports a
//! chmod next to each truncating write), so one save does not surface twice.
//!
//! # Examples
//!
//! ```
//! use cw_watcher::{EventClass, EventFilter, FsEvent, WriteFilter};
//! use camino::Utf8PathBuf;
//!
//! let filter = WriteFilter;
//! let path = Utf8PathBuf::from("/etc/app/cfg.yaml");
//!
//! assert!(filter.qualifies(&FsEvent::new(EventClass::Write, [path.clone()])));
//! assert!(!filter.qualifies(&FsEvent::new(EventClass::Metadata, [path])));
//! ```

use smallvec::SmallVec;

use crate::events::{EventClass, FsEvent};

/// Decides whether an event should trigger a reload.
///
/// The watcher only consults the filter for events that concern the watched
/// file; path scoping is not the filter's job.
///
/// # Thread Safety
///
/// Filters must be [`Send`] and [`Sync`] so a watcher can be moved into a
/// spawned task. They must also be `'static`.
///
/// # Examples
///
/// ```
/// use cw_watcher::{EventClass, EventFilter, FsEvent};
///
/// /// Reload on anything except plain reads.
/// struct NoAccess;
///
/// impl EventFilter for NoAccess {
///     fn qualifies(&self, event: &FsEvent) -> bool {
///         event.class != EventClass::Access
///     }
/// }
/// ```
pub trait EventFilter: Send + Sync + 'static {
    /// Returns `true` if the event should trigger a reload.
    fn qualifies(&self, event: &FsEvent) -> bool;
}

/// Accepts content writes only.
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteFilter;

impl EventFilter for WriteFilter {
    #[inline]
    fn qualifies(&self, event: &FsEvent) -> bool {
        event.class == EventClass::Write
    }
}

/// Accepts any event whose class is in a configured set.
///
/// # Examples
///
/// ```
/// use cw_watcher::{EventClass, EventFilter, FsEvent, KindFilter};
/// use camino::Utf8PathBuf;
///
/// // Also reload when the file is created from scratch.
/// let filter = KindFilter::new(&[EventClass::Write, EventClass::Create]);
/// let path = Utf8PathBuf::from("cfg.yaml");
///
/// assert!(filter.qualifies(&FsEvent::new(EventClass::Create, [path.clone()])));
/// assert!(!filter.qualifies(&FsEvent::new(EventClass::Rename, [path])));
/// ```
#[derive(Debug, Clone, Default)]
pub struct KindFilter {
    classes: SmallVec<[EventClass; 4]>,
}

impl KindFilter {
    /// Creates a filter accepting the given classes.
    #[must_use]
    pub fn new(classes: &[EventClass]) -> Self {
        Self::default().with_classes(classes)
    }

    /// Adds a class to accept.
    #[must_use]
    pub fn with_class(mut self, class: EventClass) -> Self {
        if !self.classes.contains(&class) {
            self.classes.push(class);
        }
        self
    }

    /// Adds several classes to accept.
    #[must_use]
    pub fn with_classes(self, classes: &[EventClass]) -> Self {
        classes.iter().fold(self, |filter, &class| filter.with_class(class))
    }

    /// Returns the accepted classes.
    #[must_use]
    pub fn classes(&self) -> &[EventClass] {
        &self.classes
    }
}

impl EventFilter for KindFilter {
    fn qualifies(&self, event: &FsEvent) -> bool {
        self.classes.contains(&event.class)
    }
}
