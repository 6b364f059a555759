//! Configuration file watcher with rename survival.
//!
//! This crate watches a single configuration file through the `notify` crate
//! and hands its contents to async callers each time the file is written.
//!
//! # Overview
//!
//! The cw-watcher crate is designed to:
//!
//! - Suspend a task until the watched file's contents change
//! - Keep watching across editor saves that rename or replace the file
//! - Skip metadata-only events such as the chmod some platforms emit per write
//! - Coalesce the burst of events one save produces into a single reload
//! - Stop promptly from any task, unblocking a pending wait
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐  unbounded mpsc  ┌───────────────────────────┐
//! │ notify backend      │ ───────────────► │ Watcher::next_change      │
//! │ (RecommendedWatcher)│                  │  classify ─► re-arm       │
//! └──────────▲──────────┘                  │  filter ─► settle ─► read │
//!            │ watch / unwatch             └─────────────┬─────────────┘
//!            └───────────────────────────────────────────┘
//! ```
//!
//! # Crate Dependencies
//!
//! ```text
//! cw-watcher ──► cw-core
//! ```
//!
//! # Usage
//!
//! ## Waiting for changes
//!
//! ```no_run
//! use cw_watcher::{FileSource, WatchConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = FileSource::new("/etc/app/cfg.yaml");
//!     let initial = source.read()?;
//!     println!("loaded {} bytes of {}", initial.len(), initial.format);
//!
//!     let mut watcher = source.watch(&WatchConfig::default())?;
//!     loop {
//!         match watcher.next_change().await {
//!             Ok(change) => println!("reloaded, checksum {}", change.checksum),
//!             Err(e) if e.is_fatal() => break,
//!             Err(e) => eprintln!("reload failed: {e}"),
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Stopping from another task
//!
//! ```no_run
//! use cw_watcher::{Watcher, WatchConfig, WatchError};
//!
//! # async fn example() -> Result<(), WatchError> {
//! let mut watcher = Watcher::new("/etc/app/cfg.yaml", &WatchConfig::default())?;
//! let stop = watcher.stop_handle();
//!
//! let waiter = tokio::spawn(async move { watcher.next_change().await });
//! stop.stop();
//!
//! let result = waiter.await.expect("task panicked");
//! assert!(matches!(result, Err(WatchError::Stopped)));
//! # Ok(())
//! # }
//! ```
//!
//! ## Custom filtering
//!
//! ```
//! use cw_watcher::{EventClass, KindFilter};
//!
//! // Reload on writes and on the file being created from scratch
//! let filter = KindFilter::new(&[EventClass::Write, EventClass::Create]);
//! assert_eq!(filter.classes().len(), 2);
//!
//! // Use with Watcher::with_filter(path, &config, filter)
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod error;
pub mod events;
pub mod filter;
pub mod source;
pub mod watcher;

// Re-export error types
pub use error::WatchError;

// Re-export event types
pub use events::{EventClass, FsEvent};

// Re-export filter types
pub use filter::{EventFilter, KindFilter, WriteFilter};

// Re-export source and watcher types
pub use source::FileSource;
pub use watcher::{StopHandle, Watcher};

// Re-export the core types callers need alongside the watcher
pub use cw_core::{ChangeSet, WatchConfig};
