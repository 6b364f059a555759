//! Core types, errors, and configuration for cfg-watch.
//!
//! This crate provides the foundational types shared by the watcher:
//!
//! - [`ChangeSet`] - the payload handed to a configuration consumer on reload
//! - [`Config`], [`SourceConfig`], [`WatchConfig`] - serde-backed settings
//! - [`ConfigError`] - errors raised while loading or validating settings
//! - [`checksum`] - content digests used to stamp every [`ChangeSet`]

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod changeset;
pub mod checksum;
pub mod config;
pub mod error;

pub use changeset::ChangeSet;
pub use checksum::{checksum, verify_checksum};
pub use config::{Config, SourceConfig, WatchConfig};
pub use error::ConfigError;
