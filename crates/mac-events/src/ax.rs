//! Accessibility API backend: `AXObserver` lifecycle and `AXUIElement` handles.

use std::{
    any::Any,
    cell::RefCell,
    ffi::c_void,
    fmt::{Debug, Formatter, Result as FmtResult},
    ptr::{self, NonNull},
    rc::Rc,
};

use core_foundation::{
    base::{CFRelease, CFTypeRef, TCFType},
    runloop::{CFRunLoop, CFRunLoopSource, CFRunLoopSourceRef, kCFRunLoopDefaultMode},
    string::{CFString, CFStringRef},
};
use tracing::trace;

use crate::{AxApi, AxError, Element, ElementCallback, Pid, RawElement};

/// `AXObserverCallback`
type ObserverCallback = extern "C" fn(*mut c_void, *mut c_void, CFStringRef, *mut c_void);

#[link(name = "ApplicationServices", kind = "framework")]
unsafe extern "C" {
    fn AXObserverCreate(pid: i32, callback: ObserverCallback, out: *mut *mut c_void) -> i32;
    fn AXObserverAddNotification(
        observer: *mut c_void,
        element: *mut c_void,
        notification: CFStringRef,
        refcon: *mut c_void,
    ) -> i32;
    fn AXObserverRemoveNotification(
        observer: *mut c_void,
        element: *mut c_void,
        notification: CFStringRef,
    ) -> i32;
    fn AXObserverGetRunLoopSource(observer: *mut c_void) -> *mut c_void;

    fn AXUIElementCreateApplication(pid: i32) -> *mut c_void;
    fn AXUIElementGetPid(element: *mut c_void, pid: *mut i32) -> i32;
    fn AXUIElementCopyAttributeValue(
        element: *mut c_void,
        attribute: CFStringRef,
        value: *mut CFTypeRef,
    ) -> i32;
}

#[link(name = "CoreFoundation", kind = "framework")]
unsafe extern "C" {
    fn CFEqual(a: CFTypeRef, b: CFTypeRef) -> bool;
    fn CFRetain(cf: CFTypeRef) -> CFTypeRef;
    fn CFGetTypeID(cf: CFTypeRef) -> usize;
}

/// CF-backed RAII for AXUIElementRef.
pub(crate) struct AxElement(NonNull<c_void>);

impl AxElement {
    /// Application element for `pid`.
    pub(crate) fn application(pid: Pid) -> Option<Self> {
        // SAFETY: Create rule; we own the returned reference.
        NonNull::new(unsafe { AXUIElementCreateApplication(pid) }).map(Self)
    }

    /// Take a +1 reference on an element borrowed from the OS.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a valid `AXUIElementRef`.
    unsafe fn retain(ptr: *mut c_void) -> Option<Self> {
        let ptr = NonNull::new(ptr)?;
        // SAFETY: non-null and valid per the caller.
        unsafe { CFRetain(ptr.as_ptr() as CFTypeRef) };
        Some(Self(ptr))
    }

    #[inline]
    fn as_ptr(&self) -> *mut c_void {
        self.0.as_ptr()
    }
}

impl Drop for AxElement {
    fn drop(&mut self) {
        // SAFETY: we hold exactly one +1 reference, taken at construction.
        unsafe { CFRelease(self.0.as_ptr() as CFTypeRef) }
    }
}

impl Debug for AxElement {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "AxElement({:p})", self.0)
    }
}

impl RawElement for AxElement {
    fn pid(&self) -> Option<Pid> {
        let mut pid: i32 = 0;
        // SAFETY: live element; `pid` is a valid out-pointer.
        let code = unsafe { AXUIElementGetPid(self.as_ptr(), &mut pid) };
        (code == 0).then_some(pid)
    }

    fn same_as(&self, other: &dyn RawElement) -> bool {
        other
            .as_any()
            .downcast_ref::<Self>()
            .is_some_and(|o| unsafe { CFEqual(self.as_ptr() as CFTypeRef, o.as_ptr() as CFTypeRef) })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn title(&self) -> Option<String> {
        let attr = CFString::from_static_string("AXTitle");
        let mut value: CFTypeRef = ptr::null();
        let code = unsafe {
            AXUIElementCopyAttributeValue(self.as_ptr(), attr.as_concrete_TypeRef(), &mut value)
        };
        if code != 0 || value.is_null() {
            return None;
        }
        if unsafe { CFGetTypeID(value) } != CFString::type_id() {
            unsafe { CFRelease(value) };
            return None;
        }
        // SAFETY: Copy rule; ownership moves into the wrapper.
        let s = unsafe { CFString::wrap_under_create_rule(value as CFStringRef) };
        Some(s.to_string())
    }
}

/// Heap context handed to the OS as `refcon`.
///
/// The closure sits behind an `Rc` so a delivery in progress keeps it alive
/// even if the callback removes its own registration.
struct Refcon {
    /// User-facing dispatch closure.
    callback: Rc<RefCell<ElementCallback>>,
}

/// An `AXObserverRef` plus the callbacks registered on it.
///
/// Dropping the handle releases the observer first and the callbacks after,
/// so the OS never holds a refcon that points at freed memory.
pub struct AxObserverHandle {
    /// Owned observer reference.
    raw: NonNull<c_void>,
    /// One context per registered notification.
    refcons: Vec<(&'static str, Box<Refcon>)>,
}

impl AxObserverHandle {
    /// The observer's run loop source, retained.
    fn run_loop_source(&self) -> Option<CFRunLoopSource> {
        let src = unsafe { AXObserverGetRunLoopSource(self.raw.as_ptr()) } as CFRunLoopSourceRef;
        if src.is_null() {
            None
        } else {
            // SAFETY: Get rule; wrapping retains.
            Some(unsafe { CFRunLoopSource::wrap_under_get_rule(src) })
        }
    }
}

impl Drop for AxObserverHandle {
    fn drop(&mut self) {
        // SAFETY: `raw` came from AXObserverCreate (create rule) and is released once.
        unsafe { CFRelease(self.raw.as_ptr() as CFTypeRef) }
    }
}

impl Debug for AxObserverHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("AxObserverHandle")
            .field("raw", &self.raw)
            .field("notifications", &self.refcons.iter().map(|(n, _)| *n).collect::<Vec<_>>())
            .finish()
    }
}

extern "C" fn observer_callback(
    _observer: *mut c_void,
    element: *mut c_void,
    _notification: CFStringRef,
    refcon: *mut c_void,
) {
    if refcon.is_null() {
        return;
    }
    // SAFETY: refcon is a Box<Refcon> owned by a live AxObserverHandle; it is
    // freed only after the notification has been removed from the observer.
    // The reference is not used past the clone below.
    let callback = Rc::clone(unsafe { &(*(refcon as *const Refcon)).callback });
    // SAFETY: the OS lends us the element for the duration of the call.
    let element = unsafe { AxElement::retain(element) }.map(Element::new);
    match callback.try_borrow_mut() {
        Ok(mut f) => (*f)(element),
        Err(_) => trace!("re-entrant AX notification; dropped"),
    }
}

/// Raw element pointer behind `element`, if it came from this backend.
fn element_ptr(element: &Element) -> Result<*mut c_void, AxError> {
    element
        .downcast_ref::<AxElement>()
        .map(AxElement::as_ptr)
        .ok_or(AxError::ILLEGAL_ARGUMENT)
}

/// The system Accessibility API, delivering on the main run loop.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemAx;

impl AxApi for SystemAx {
    type Observer = AxObserverHandle;

    fn create_observer(&self, pid: Pid) -> Result<Option<AxObserverHandle>, AxError> {
        let mut raw: *mut c_void = ptr::null_mut();
        let code = unsafe { AXObserverCreate(pid, observer_callback, &mut raw) };
        AxError::check(code)?;
        Ok(NonNull::new(raw).map(|raw| AxObserverHandle {
            raw,
            refcons: Vec::new(),
        }))
    }

    fn add_notification(
        &self,
        observer: &mut AxObserverHandle,
        element: &Element,
        name: &'static str,
        callback: ElementCallback,
    ) -> Result<(), AxError> {
        let element = element_ptr(element)?;
        let notification = CFString::from_static_string(name);
        let ctx = Box::new(Refcon {
            callback: Rc::new(RefCell::new(callback)),
        });
        let refcon = &*ctx as *const Refcon as *mut c_void;
        let code = unsafe {
            AXObserverAddNotification(
                observer.raw.as_ptr(),
                element,
                notification.as_concrete_TypeRef(),
                refcon,
            )
        };
        AxError::check(code)?;
        observer.refcons.push((name, ctx));
        Ok(())
    }

    fn remove_notification(
        &self,
        observer: &mut AxObserverHandle,
        element: &Element,
        name: &'static str,
    ) -> Result<(), AxError> {
        let element = element_ptr(element)?;
        let notification = CFString::from_static_string(name);
        let code = unsafe {
            AXObserverRemoveNotification(
                observer.raw.as_ptr(),
                element,
                notification.as_concrete_TypeRef(),
            )
        };
        observer.refcons.retain(|(n, _)| *n != name);
        AxError::check(code)
    }

    fn attach_run_loop_source(&self, observer: &AxObserverHandle) {
        if let Some(source) = observer.run_loop_source() {
            let mode = unsafe { kCFRunLoopDefaultMode };
            CFRunLoop::get_main().add_source(&source, mode);
        }
    }

    fn detach_run_loop_source(&self, observer: &AxObserverHandle) {
        if let Some(source) = observer.run_loop_source() {
            let mode = unsafe { kCFRunLoopDefaultMode };
            CFRunLoop::get_main().remove_source(&source, mode);
        }
    }
}
