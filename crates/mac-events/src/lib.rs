//! mac-events: typed callbacks for macOS desktop and Accessibility events.
//!
//! Two handler types subscribe to two independent OS notification sources:
//! - [`DesktopEventHandler`] listens to one session-wide application lifecycle
//!   notification (launched, terminated, hidden, unhidden, focused, unfocused)
//!   on the NSWorkspace notification center and hands the callback an [`App`].
//! - [`AppEventHandler`] listens to one Accessibility (AX) notification for a
//!   single target application through an `AXObserver` and hands the callback
//!   a [`Window`], an [`App`], or an optional [`Window`].
//!
//! Integration overview (no code):
//! - Obtain a [`MainContext`] on the main thread. Both constructors require
//!   it and the handlers keep it, so a handler can never leave the thread that
//!   owns the main run loop.
//! - Build a [`DesktopEvent`] or [`AppEvent`] carrying your callback and pass
//!   it to the handler constructor. Construction registers with the OS.
//! - Notifications arrive on the main run loop; the callback runs
//!   synchronously during delivery.
//! - Call `unregister()` or simply drop the handler. Teardown happens exactly
//!   once either way, and no callback runs after it returns.
//!
//! The OS seams are the [`WorkspaceCenter`] and [`AxApi`] traits. The macOS
//! implementations are [`NsWorkspaceCenter`] and [`SystemAx`]; the `mock`
//! module (feature `test-utils`) provides recording fakes.

mod accessibility;
mod backend;
mod context;
mod desktop;
mod element;
mod error;

#[cfg(target_os = "macos")]
mod ax;
#[cfg(target_os = "macos")]
mod ns;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

// Accessibility symbols (AXObserver*, AXUIElement*) live in ApplicationServices.
#[cfg(target_os = "macos")]
#[link(name = "ApplicationServices", kind = "framework")]
unsafe extern "C" {}

pub use accessibility::{AppEvent, AppEventHandler, AppEventKind, PayloadKind};
pub use backend::{AxApi, ElementCallback, NotificationPayload, PayloadCallback, WorkspaceCenter};
pub use context::MainContext;
pub use desktop::{APPLICATION_KEY, DesktopEvent, DesktopEventHandler, DesktopEventKind};
pub use element::{App, Element, RawElement, Window};
pub use error::{AxError, Error, Result};

#[cfg(target_os = "macos")]
pub use ax::{AxObserverHandle, SystemAx};
#[cfg(target_os = "macos")]
pub use ns::{NsObserverToken, NsWorkspaceCenter, running_apps};

/// Process identifier as used by the AX and AppKit APIs.
pub type Pid = libc::pid_t;

/// Callback receiving an [`App`].
pub type AppCallback = Box<dyn FnMut(App)>;

/// Callback receiving a [`Window`].
pub type WindowCallback = Box<dyn FnMut(Window)>;

/// Callback receiving a [`Window`] that may be absent.
pub type MaybeWindowCallback = Box<dyn FnMut(Option<Window>)>;
