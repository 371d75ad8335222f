//! Command-line interface definitions for eventwatch.

use std::{path::PathBuf, time::Duration};

use clap::Parser;
use logging::LogArgs;

/// Command-line interface for the `eventwatch` binary.
#[derive(Parser, Debug)]
#[command(
    name = "eventwatch",
    about = "Log application lifecycle and Accessibility events",
    version
)]
pub struct Cli {
    /// Logging controls shared across workspace binaries.
    #[command(flatten)]
    pub log: LogArgs,

    /// Optional path to a configuration file (RON).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Stop after this long instead of running until killed.
    #[arg(long, value_parser = humantime::parse_duration, value_name = "DURATION")]
    pub duration: Option<Duration>,

    /// Ask the system to prompt for the Accessibility permission if missing.
    #[arg(long)]
    pub prompt: bool,

    /// Print every known event kind with its OS notification name and exit.
    #[arg(long)]
    pub list: bool,
}
