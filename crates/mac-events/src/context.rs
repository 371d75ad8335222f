//! The single execution context that owns the main run loop.

use std::marker::PhantomData;

/// Proof that the current code runs on the main thread.
///
/// Handlers are created with a `MainContext` and store it, which makes them
/// `!Send` and `!Sync`: registration, delivery and teardown all stay on the
/// thread driving the main run loop. No other synchronization exists.
#[derive(Debug, Clone, Copy)]
pub struct MainContext {
    /// Ties the marker to the creating thread.
    _not_send: PhantomData<*mut ()>,
}

impl MainContext {
    /// Returns a marker if called on the main thread.
    pub fn new() -> Option<Self> {
        if is_main_thread() {
            // SAFETY: just checked.
            Some(unsafe { Self::new_unchecked() })
        } else {
            None
        }
    }

    /// Construct a marker without checking the current thread.
    ///
    /// # Safety
    ///
    /// The caller must guarantee that every handler created with this marker
    /// is registered, driven and dropped on the thread that runs the event
    /// loop the OS delivers notifications on.
    pub const unsafe fn new_unchecked() -> Self {
        Self {
            _not_send: PhantomData,
        }
    }
}

#[cfg(target_os = "macos")]
impl From<objc2_foundation::MainThreadMarker> for MainContext {
    fn from(_: objc2_foundation::MainThreadMarker) -> Self {
        // SAFETY: a MainThreadMarker only exists on the main thread.
        unsafe { Self::new_unchecked() }
    }
}

#[cfg(target_os = "macos")]
fn is_main_thread() -> bool {
    objc2_foundation::MainThreadMarker::new().is_some()
}

#[cfg(not(target_os = "macos"))]
fn is_main_thread() -> bool {
    std::thread::current().name() == Some("main")
}
