//! Traits at the OS boundary.
//!
//! Handlers talk to the operating system only through these traits, so the
//! lifecycle logic can be exercised against recording fakes.

use crate::{App, AxError, Element, Pid};

/// Callback a [`WorkspaceCenter`] runs for each delivered notification.
pub type PayloadCallback = Box<dyn FnMut(&dyn NotificationPayload)>;

/// Callback an [`AxApi`] observer runs for each delivered notification. The
/// element is `None` when the OS delivered a null element.
pub type ElementCallback = Box<dyn FnMut(Option<Element>)>;

/// The user-info mapping attached to a workspace notification.
pub trait NotificationPayload {
    /// Look up `key` and return it as an application, if present and of the
    /// right type.
    fn application(&self, key: &str) -> Option<App>;
}

/// A session-wide notification center (NSWorkspace's, on macOS).
///
/// Registrations deliver on the main execution context.
pub trait WorkspaceCenter {
    /// Opaque registration token.
    type Token;

    /// Start delivering notifications called `name` to `callback`.
    fn add_observer(&self, name: &'static str, callback: PayloadCallback) -> Self::Token;

    /// Stop delivering to the registration identified by `token` and release
    /// its callback.
    fn remove_observer(&self, token: Self::Token);
}

/// Per-process Accessibility observer API.
pub trait AxApi {
    /// An observer bound to one process. Dropping it releases the OS resource
    /// together with every callback registered on it.
    type Observer;

    /// Create an observer for `pid`. `Ok(None)` means the OS reported success
    /// but handed back a null observer.
    fn create_observer(&self, pid: Pid) -> Result<Option<Self::Observer>, AxError>;

    /// Register `callback` for notification `name` on `element`.
    fn add_notification(
        &self,
        observer: &mut Self::Observer,
        element: &Element,
        name: &'static str,
        callback: ElementCallback,
    ) -> Result<(), AxError>;

    /// Remove the registration for `name` on `element`, releasing its callback.
    fn remove_notification(
        &self,
        observer: &mut Self::Observer,
        element: &Element,
        name: &'static str,
    ) -> Result<(), AxError>;

    /// Add the observer's run loop source to the main run loop, default mode.
    fn attach_run_loop_source(&self, observer: &Self::Observer);

    /// Remove the observer's run loop source from the main run loop.
    fn detach_run_loop_source(&self, observer: &Self::Observer);
}
