//! Entry point for the `eventwatch` binary.

use std::process;

use clap::Parser;
use eventwatch::{Config, Result, cli::Cli, listing};
use tracing::error;

fn main() {
    if let Err(err) = run() {
        error!("{err}");
        eprintln!("error: {err}");
        process::exit(1);
    }
}

/// Parse CLI arguments, install logging, and run the watcher.
fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log.spec());

    if cli.list {
        print!("{}", listing());
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    session::watch(&config, &cli)
}

#[cfg(target_os = "macos")]
mod session {
    //! Live session: real backends on the main run loop.

    use std::{
        rc::Rc,
        thread,
        time::{Duration, Instant},
    };

    use core_foundation::runloop::{CFRunLoop, CFRunLoopRunResult, kCFRunLoopDefaultMode};
    use eventwatch::{Config, Error, Observation, Result, Sink, Watcher, cli::Cli};
    use mac_events::{MainContext, NsWorkspaceCenter, SystemAx, running_apps};
    use tracing::{info, warn};

    /// Longest single run loop slice.
    const SLICE: Duration = Duration::from_secs(1);

    /// Pause when the run loop has no sources yet.
    const IDLE: Duration = Duration::from_millis(50);

    /// Install handlers and spin the main run loop.
    pub(super) fn watch(config: &Config, cli: &Cli) -> Result<()> {
        let mtm = MainContext::new().ok_or(Error::NotMainThread)?;
        if config.follow && !config.app.is_empty() && !permissions::accessibility_ok() {
            warn!("Accessibility permission missing; AX notifications will not be delivered");
            if cli.prompt {
                permissions::request_accessibility();
            }
        }

        let sink: Sink = Rc::new(|obs: Observation| info!("{obs}"));
        let center = NsWorkspaceCenter::shared(mtm);
        let watcher = Watcher::new(mtm, &center, SystemAx, config, &sink);
        let installed = watcher.seed(running_apps(mtm));
        info!(
            desktop = watcher.desktop_kinds().len(),
            apps = watcher.followed().len(),
            handlers = installed,
            "watching"
        );

        let deadline = cli.duration.map(|d| Instant::now() + d);
        loop {
            let slice = match deadline {
                Some(end) => {
                    let left = end.saturating_duration_since(Instant::now());
                    if left.is_zero() {
                        break;
                    }
                    left.min(SLICE)
                }
                None => SLICE,
            };
            let mode = unsafe { kCFRunLoopDefaultMode };
            if let CFRunLoopRunResult::Finished = CFRunLoop::run_in_mode(mode, slice, false) {
                thread::sleep(IDLE);
            }
        }
        drop(watcher);
        Ok(())
    }
}

#[cfg(not(target_os = "macos"))]
mod session {
    //! Non-macOS hosts have no session to watch.

    use eventwatch::{Config, Error, Result, cli::Cli};

    /// Always fails.
    pub(super) fn watch(_config: &Config, _cli: &Cli) -> Result<()> {
        Err(Error::Unsupported)
    }
}
