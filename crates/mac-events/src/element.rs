//! Collaborator value types handed to callbacks.

use std::{
    any::Any,
    fmt::{Debug, Formatter, Result as FmtResult},
    rc::Rc,
};

use crate::Pid;

/// Backing implementation of an [`Element`].
///
/// The macOS backend wraps a retained `AXUIElementRef`; the test fakes wrap a
/// plain identifier.
pub trait RawElement: Debug + 'static {
    /// Process owning the element, if it can be determined.
    fn pid(&self) -> Option<Pid>;

    /// True if both handles refer to the same OS object.
    fn same_as(&self, other: &dyn RawElement) -> bool;

    /// Upcast for backend-specific downcasts.
    fn as_any(&self) -> &dyn Any;

    /// The element's `AXTitle`, if any.
    fn title(&self) -> Option<String> {
        None
    }
}

/// Opaque, reference-counted accessibility element handle.
///
/// Cloning shares the handle. Equality compares the underlying OS object, not
/// the wrapper.
#[derive(Clone)]
pub struct Element(Rc<dyn RawElement>);

impl Element {
    /// Wrap a backend element.
    pub fn new(raw: impl RawElement) -> Self {
        Self(Rc::new(raw))
    }

    /// Process owning the element.
    pub fn pid(&self) -> Option<Pid> {
        self.0.pid()
    }

    /// The element's title attribute.
    pub fn title(&self) -> Option<String> {
        self.0.title()
    }

    /// Borrow the backend element.
    pub fn raw(&self) -> &dyn RawElement {
        &*self.0
    }

    /// Downcast to a concrete backend element.
    pub fn downcast_ref<T: RawElement>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0) || self.0.same_as(&*other.0)
    }
}

impl Eq for Element {}

impl Debug for Element {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        Debug::fmt(&*self.0, f)
    }
}

/// A running application: its process id and root accessibility element.
///
/// `App` is a view, not an owner: holding one does not keep the process alive
/// and the element may go stale once the process exits.
#[derive(Clone, Debug)]
pub struct App {
    /// Process identifier.
    pid: Pid,
    /// Application-level accessibility element.
    element: Element,
    /// Bundle identifier, when known.
    bundle_id: Option<String>,
    /// Localized name, when known.
    name: Option<String>,
}

impl App {
    /// Wrap a process id and its application element.
    pub fn new(pid: Pid, element: Element) -> Self {
        Self {
            pid,
            element,
            bundle_id: None,
            name: None,
        }
    }

    /// Attach a bundle identifier.
    #[must_use]
    pub fn with_bundle_id(mut self, bundle_id: impl Into<String>) -> Self {
        self.bundle_id = Some(bundle_id.into());
        self
    }

    /// Attach a localized name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Same application, seen through a different element delivered by the OS.
    pub(crate) fn rewrap(&self, element: Element) -> Self {
        let pid = element.pid().unwrap_or(self.pid);
        if pid == self.pid {
            Self {
                element,
                ..self.clone()
            }
        } else {
            Self::new(pid, element)
        }
    }

    /// Process identifier.
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Root accessibility element of the application.
    pub fn element(&self) -> &Element {
        &self.element
    }

    /// Bundle identifier, if known.
    pub fn bundle_id(&self) -> Option<&str> {
        self.bundle_id.as_deref()
    }

    /// Localized name, if known.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

// Metadata is descriptive; identity is the process and its element.
impl PartialEq for App {
    fn eq(&self, other: &Self) -> bool {
        self.pid == other.pid && self.element == other.element
    }
}

impl Eq for App {}

/// A window, or more generally the UI element an AX notification refers to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Window {
    /// Element the notification was delivered for.
    element: Element,
}

impl Window {
    /// Wrap an accessibility element.
    pub fn new(element: Element) -> Self {
        Self { element }
    }

    /// Underlying element.
    pub fn element(&self) -> &Element {
        &self.element
    }

    /// Owning process, if it can be determined.
    pub fn pid(&self) -> Option<Pid> {
        self.element.pid()
    }

    /// Window title, if any.
    pub fn title(&self) -> Option<String> {
        self.element.title()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{FakeElement, fake_app, fake_element};

    #[test]
    fn element_equality_follows_the_os_object() {
        let a = fake_element(7, Some(1));
        let b = fake_element(7, Some(1));
        let c = fake_element(8, Some(1));
        assert_eq!(a, a.clone());
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.downcast_ref::<FakeElement>().map(FakeElement::id), Some(7));
    }

    #[test]
    fn app_equality_ignores_metadata() {
        let plain = fake_app(42);
        let named = fake_app(42).with_name("Safari").with_bundle_id("com.apple.Safari");
        assert_eq!(plain, named);
        assert_ne!(plain, fake_app(43));
        assert_eq!(named.name(), Some("Safari"));
        assert_eq!(named.bundle_id(), Some("com.apple.Safari"));
    }

    #[test]
    fn rewrap_keeps_metadata_for_the_same_process() {
        let app = fake_app(42).with_name("Mail");
        let other = fake_element(900, Some(42));
        let same = app.rewrap(other.clone());
        assert_eq!(same.pid(), 42);
        assert_eq!(same.element(), &other);
        assert_eq!(same.name(), Some("Mail"));

        let foreign = app.rewrap(fake_element(901, Some(77)));
        assert_eq!(foreign.pid(), 77);
        assert_eq!(foreign.name(), None);

        let unknown = app.rewrap(fake_element(902, None));
        assert_eq!(unknown.pid(), 42);
    }

    #[test]
    fn window_exposes_element_details() {
        let el = Element::new(FakeElement::new(5, Some(9)).with_title("Inbox"));
        let w = Window::new(el.clone());
        assert_eq!(w.pid(), Some(9));
        assert_eq!(w.title().as_deref(), Some("Inbox"));
        assert_eq!(w.element(), &el);
    }
}
