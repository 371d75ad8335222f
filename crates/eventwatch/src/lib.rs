#![warn(missing_docs)]

//! eventwatch: log application lifecycle and Accessibility events.
//!
//! The library half holds everything that does not need a live session: CLI
//! definitions, the RON [`Config`], and the [`Watcher`], which is generic over
//! the OS seams in `mac_events` so it can be driven by the mock backends.

pub mod cli;
pub mod config;
pub mod error;
pub mod watch;

pub use config::Config;
pub use error::{Error, Result};
pub use watch::{AppInfo, Observation, Sink, Subject, Watcher, listing};
