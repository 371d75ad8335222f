//! Recording fakes for the OS seams (enabled with the `test-utils` feature).
//!
//! Nothing here talks to the OS. Notifications are injected with
//! [`MockWorkspace::post`] and [`MockAx::deliver`]; every backend call is
//! appended to a log that tests can inspect.

use std::{any::Any, cell::RefCell, collections::HashMap, rc::Rc};

use crate::{
    APPLICATION_KEY, App, AxApi, AxError, Element, ElementCallback, MainContext,
    NotificationPayload, PayloadCallback, Pid, RawElement, WorkspaceCenter,
};

/// A `MainContext` for single-threaded tests.
pub fn main_context() -> MainContext {
    // SAFETY: fakes deliver synchronously on the calling thread.
    unsafe { MainContext::new_unchecked() }
}

/// Element identified by a number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeElement {
    /// Identity.
    id: u64,
    /// Owning process.
    pid: Option<Pid>,
    /// Title attribute.
    title: Option<String>,
}

impl FakeElement {
    /// New untitled element.
    pub fn new(id: u64, pid: Option<Pid>) -> Self {
        Self {
            id,
            pid,
            title: None,
        }
    }

    /// Set the title attribute.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Identity.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl RawElement for FakeElement {
    fn pid(&self) -> Option<Pid> {
        self.pid
    }

    fn same_as(&self, other: &dyn RawElement) -> bool {
        other
            .as_any()
            .downcast_ref::<Self>()
            .is_some_and(|o| o.id == self.id)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn title(&self) -> Option<String> {
        self.title.clone()
    }
}

/// Shorthand for `Element::new(FakeElement::new(id, pid))`.
pub fn fake_element(id: u64, pid: Option<Pid>) -> Element {
    Element::new(FakeElement::new(id, pid))
}

/// An application whose root element id equals its pid.
pub fn fake_app(pid: Pid) -> App {
    App::new(pid, fake_element(pid as u64, Some(pid)))
}

/// User-info mapping for [`MockWorkspace::post`].
#[derive(Debug, Default, Clone)]
pub struct FakePayload {
    /// Key to application.
    entries: HashMap<String, App>,
}

impl FakePayload {
    /// Payload carrying `app` under [`APPLICATION_KEY`].
    pub fn for_app(app: App) -> Self {
        Self::default().with(APPLICATION_KEY, app)
    }

    /// Add an entry.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, app: App) -> Self {
        self.entries.insert(key.into(), app);
        self
    }
}

impl NotificationPayload for FakePayload {
    fn application(&self, key: &str) -> Option<App> {
        self.entries.get(key).cloned()
    }
}

/// A call made against [`MockWorkspace`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceCall {
    /// `add_observer`, with the id assigned to the registration.
    Add {
        /// Registration id.
        id: u64,
        /// Notification name.
        name: &'static str,
    },
    /// `remove_observer`.
    Remove {
        /// Registration id.
        id: u64,
    },
}

/// Token handed out by [`MockWorkspace`].
#[derive(Debug, PartialEq, Eq)]
pub struct MockToken(u64);

/// One live registration.
struct Registration {
    /// Registration id.
    id: u64,
    /// Notification name.
    name: &'static str,
    /// Callback; shared so delivery can run without borrowing the state.
    callback: Rc<RefCell<PayloadCallback>>,
}

/// State behind a [`MockWorkspace`].
#[derive(Default)]
struct WorkspaceState {
    /// Next registration id.
    next_id: u64,
    /// Live registrations.
    observers: Vec<Registration>,
    /// Call log.
    calls: Vec<WorkspaceCall>,
}

/// In-memory notification center. Clones share state.
#[derive(Clone, Default)]
pub struct MockWorkspace {
    /// Shared state.
    inner: Rc<RefCell<WorkspaceState>>,
}

impl MockWorkspace {
    /// Deliver `payload` to every live registration for `name`. Returns the
    /// number of callbacks run.
    ///
    /// Callbacks may add or remove registrations; a registration removed
    /// during delivery is not called afterwards.
    pub fn post(&self, name: &str, payload: &FakePayload) -> usize {
        let targets: Vec<(u64, Rc<RefCell<PayloadCallback>>)> = self
            .inner
            .borrow()
            .observers
            .iter()
            .filter(|r| r.name == name)
            .map(|r| (r.id, r.callback.clone()))
            .collect();
        let mut delivered = 0;
        for (id, callback) in targets {
            let live = self.inner.borrow().observers.iter().any(|r| r.id == id);
            if !live {
                continue;
            }
            if let Ok(mut f) = callback.try_borrow_mut() {
                (*f)(payload);
                delivered += 1;
            }
        }
        delivered
    }

    /// Number of live registrations.
    pub fn live_observers(&self) -> usize {
        self.inner.borrow().observers.len()
    }

    /// Snapshot of the call log.
    pub fn calls(&self) -> Vec<WorkspaceCall> {
        self.inner.borrow().calls.clone()
    }

    /// Number of `add_observer` calls.
    pub fn add_count(&self) -> usize {
        self.count(|c| matches!(c, WorkspaceCall::Add { .. }))
    }

    /// Number of `remove_observer` calls.
    pub fn remove_count(&self) -> usize {
        self.count(|c| matches!(c, WorkspaceCall::Remove { .. }))
    }

    /// Number of logged calls matching `pred`.
    fn count(&self, pred: impl Fn(&WorkspaceCall) -> bool) -> usize {
        self.inner.borrow().calls.iter().filter(|c| pred(c)).count()
    }
}

impl WorkspaceCenter for MockWorkspace {
    type Token = MockToken;

    fn add_observer(&self, name: &'static str, callback: PayloadCallback) -> MockToken {
        let mut st = self.inner.borrow_mut();
        let id = st.next_id;
        st.next_id += 1;
        st.observers.push(Registration {
            id,
            name,
            callback: Rc::new(RefCell::new(callback)),
        });
        st.calls.push(WorkspaceCall::Add { id, name });
        MockToken(id)
    }

    fn remove_observer(&self, token: MockToken) {
        // Release the callback outside the borrow; its captures may own
        // handlers that unregister themselves on drop.
        let removed = {
            let mut st = self.inner.borrow_mut();
            st.calls.push(WorkspaceCall::Remove { id: token.0 });
            let idx = st.observers.iter().position(|r| r.id == token.0);
            idx.map(|i| st.observers.remove(i))
        };
        drop(removed);
    }
}

/// A call made against [`MockAx`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AxCall {
    /// `create_observer`.
    Create {
        /// Target process.
        pid: Pid,
    },
    /// `add_notification`.
    AddNotification {
        /// Observer id.
        observer: u64,
        /// Element the notification was added on.
        element: Element,
        /// Notification name.
        name: &'static str,
    },
    /// `remove_notification`.
    RemoveNotification {
        /// Observer id.
        observer: u64,
        /// Element the notification was removed from.
        element: Element,
        /// Notification name.
        name: &'static str,
    },
    /// `attach_run_loop_source`.
    Attach {
        /// Observer id.
        observer: u64,
    },
    /// `detach_run_loop_source`.
    Detach {
        /// Observer id.
        observer: u64,
    },
    /// The observer was dropped.
    Release {
        /// Observer id.
        observer: u64,
    },
}

/// One notification registered on a mock observer.
struct AxRegistration {
    /// Owning observer.
    observer: u64,
    /// Notification name.
    name: &'static str,
    /// Callback; shared so delivery can run without borrowing the state.
    callback: Rc<RefCell<ElementCallback>>,
}

/// State behind a [`MockAx`].
#[derive(Default)]
struct AxState {
    /// Next observer id.
    next_id: u64,
    /// Error to return from `create_observer`.
    fail_create: Option<AxError>,
    /// Return `Ok(None)` from `create_observer`.
    null_observer: bool,
    /// Error to return from `add_notification`.
    fail_add: Option<AxError>,
    /// Observers that have not been dropped.
    live: Vec<u64>,
    /// Observers whose run loop source is attached.
    attached: Vec<u64>,
    /// Registered notifications.
    registrations: Vec<AxRegistration>,
    /// Call log.
    calls: Vec<AxCall>,
}

/// In-memory Accessibility API. Clones share state.
#[derive(Clone, Default)]
pub struct MockAx {
    /// Shared state.
    inner: Rc<RefCell<AxState>>,
}

/// Observer handed out by [`MockAx`]. Dropping it logs [`AxCall::Release`]
/// and discards its registrations.
pub struct MockObserver {
    /// Observer id.
    id: u64,
    /// Backend state.
    state: Rc<RefCell<AxState>>,
}

impl MockObserver {
    /// Observer id.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for MockObserver {
    fn drop(&mut self) {
        let released: Vec<AxRegistration> = {
            let mut st = self.state.borrow_mut();
            st.calls.push(AxCall::Release { observer: self.id });
            st.live.retain(|&o| o != self.id);
            st.attached.retain(|&o| o != self.id);
            let (gone, kept): (Vec<AxRegistration>, Vec<AxRegistration>) = st
                .registrations
                .drain(..)
                .partition(|r| r.observer == self.id);
            st.registrations = kept;
            gone
        };
        drop(released);
    }
}

impl MockAx {
    /// Make `create_observer` fail with `err`.
    pub fn fail_create(&self, err: AxError) {
        self.inner.borrow_mut().fail_create = Some(err);
    }

    /// Make `create_observer` report success with a null observer.
    pub fn return_null_observer(&self) {
        self.inner.borrow_mut().null_observer = true;
    }

    /// Make `add_notification` fail with `err`.
    pub fn fail_add(&self, err: AxError) {
        self.inner.borrow_mut().fail_add = Some(err);
    }

    /// Deliver notification `name` with `element` to every registration whose
    /// observer source is attached. Returns the number of callbacks run.
    ///
    /// Each callback is kept alive for the length of its own call, as the
    /// system backend does, so a callback may drop its own handler.
    pub fn deliver(&self, name: &str, element: Option<Element>) -> usize {
        let targets: Vec<(u64, Rc<RefCell<ElementCallback>>)> = {
            let st = self.inner.borrow();
            st.registrations
                .iter()
                .filter(|r| r.name == name && st.attached.contains(&r.observer))
                .map(|r| (r.observer, r.callback.clone()))
                .collect()
        };
        let mut delivered = 0;
        for (observer, callback) in targets {
            if !self.inner.borrow().attached.contains(&observer) {
                continue;
            }
            if let Ok(mut f) = callback.try_borrow_mut() {
                (*f)(element.clone());
                delivered += 1;
            }
        }
        delivered
    }

    /// Snapshot of the call log.
    pub fn calls(&self) -> Vec<AxCall> {
        self.inner.borrow().calls.clone()
    }

    /// Forget logged calls.
    pub fn clear_calls(&self) {
        self.inner.borrow_mut().calls.clear();
    }

    /// Number of logged calls matching `pred`.
    pub fn count(&self, pred: impl Fn(&AxCall) -> bool) -> usize {
        self.inner.borrow().calls.iter().filter(|c| pred(c)).count()
    }

    /// Observers not yet dropped.
    pub fn live_observers(&self) -> usize {
        self.inner.borrow().live.len()
    }

    /// Observers whose run loop source is attached.
    pub fn attached_sources(&self) -> usize {
        self.inner.borrow().attached.len()
    }
}

impl AxApi for MockAx {
    type Observer = MockObserver;

    fn create_observer(&self, pid: Pid) -> Result<Option<MockObserver>, AxError> {
        let mut st = self.inner.borrow_mut();
        st.calls.push(AxCall::Create { pid });
        if let Some(err) = st.fail_create {
            return Err(err);
        }
        if st.null_observer {
            return Ok(None);
        }
        let id = st.next_id;
        st.next_id += 1;
        st.live.push(id);
        Ok(Some(MockObserver {
            id,
            state: self.inner.clone(),
        }))
    }

    fn add_notification(
        &self,
        observer: &mut MockObserver,
        element: &Element,
        name: &'static str,
        callback: ElementCallback,
    ) -> Result<(), AxError> {
        let mut st = self.inner.borrow_mut();
        st.calls.push(AxCall::AddNotification {
            observer: observer.id,
            element: element.clone(),
            name,
        });
        if let Some(err) = st.fail_add {
            return Err(err);
        }
        st.registrations.push(AxRegistration {
            observer: observer.id,
            name,
            callback: Rc::new(RefCell::new(callback)),
        });
        Ok(())
    }

    fn remove_notification(
        &self,
        observer: &mut MockObserver,
        element: &Element,
        name: &'static str,
    ) -> Result<(), AxError> {
        let removed = {
            let mut st = self.inner.borrow_mut();
            st.calls.push(AxCall::RemoveNotification {
                observer: observer.id,
                element: element.clone(),
                name,
            });
            let idx = st
                .registrations
                .iter()
                .position(|r| r.observer == observer.id && r.name == name);
            idx.map(|i| st.registrations.remove(i))
        };
        match removed {
            Some(_) => Ok(()),
            None => Err(AxError::NOTIFICATION_NOT_REGISTERED),
        }
    }

    fn attach_run_loop_source(&self, observer: &MockObserver) {
        let mut st = self.inner.borrow_mut();
        st.calls.push(AxCall::Attach {
            observer: observer.id,
        });
        if !st.attached.contains(&observer.id) {
            st.attached.push(observer.id);
        }
    }

    fn detach_run_loop_source(&self, observer: &MockObserver) {
        let mut st = self.inner.borrow_mut();
        st.calls.push(AxCall::Detach {
            observer: observer.id,
        });
        st.attached.retain(|&o| o != observer.id);
    }
}
