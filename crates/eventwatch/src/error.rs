//! Error handling for the eventwatch crate.

use std::{io, result};

use thiserror::Error;

/// Convenient result type for eventwatch operations.
pub type Result<T> = result::Result<T, Error>;

/// Errors that can occur while running eventwatch.
#[derive(Debug, Error)]
pub enum Error {
    /// Wrapper for standard I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The RON configuration could not be parsed.
    #[error("Configuration error: {0}")]
    Config(#[from] ron::error::SpannedError),
    /// A handler could not be installed.
    #[error("Event handler error: {0}")]
    Events(#[from] mac_events::Error),
    /// Handlers must be created on the main thread.
    #[error("eventwatch must be started on the main thread")]
    NotMainThread,
    /// The host OS has no NSWorkspace or Accessibility APIs.
    #[error("eventwatch only runs on macOS")]
    Unsupported,
}
