//! Per-application Accessibility (AX) observer events.

use std::fmt::{Debug, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::{
    App, AppCallback, AxApi, Element, Error, MainContext, MaybeWindowCallback, Result, Window,
    WindowCallback,
};

/// Which AX notification an [`AppEvent`] subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AppEventKind {
    /// A window was created.
    WindowCreated,
    /// A UI element (typically a window) was destroyed.
    ElementDestroyed,
    /// A window moved.
    WindowMoved,
    /// A window was resized.
    WindowResized,
    /// A window was minimized.
    WindowMiniaturized,
    /// A window was restored from the Dock.
    WindowDeminiaturized,
    /// The application was hidden.
    ApplicationHidden,
    /// The application was shown.
    ApplicationShown,
    /// The application's focused window changed.
    FocusedWindowChanged,
    /// The application became active.
    ApplicationActivated,
    /// The application's main window changed.
    MainWindowChanged,
}

/// How the element delivered with a notification is handed to the callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// Wrapped as a [`Window`].
    Window,
    /// Wrapped as an [`App`].
    App,
    /// Wrapped as `Option<Window>`; a null element becomes `None`.
    OptionalWindow,
}

impl AppEventKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 11] = [
        Self::WindowCreated,
        Self::ElementDestroyed,
        Self::WindowMoved,
        Self::WindowResized,
        Self::WindowMiniaturized,
        Self::WindowDeminiaturized,
        Self::ApplicationHidden,
        Self::ApplicationShown,
        Self::FocusedWindowChanged,
        Self::ApplicationActivated,
        Self::MainWindowChanged,
    ];

    /// AX notification name for this kind.
    pub const fn notification_name(self) -> &'static str {
        match self {
            Self::WindowCreated => "AXWindowCreated",
            Self::ElementDestroyed => "AXUIElementDestroyed",
            Self::WindowMoved => "AXWindowMoved",
            Self::WindowResized => "AXWindowResized",
            Self::WindowMiniaturized => "AXWindowMiniaturized",
            Self::WindowDeminiaturized => "AXWindowDeminiaturized",
            Self::ApplicationHidden => "AXApplicationHidden",
            Self::ApplicationShown => "AXApplicationShown",
            Self::FocusedWindowChanged => "AXFocusedWindowChanged",
            Self::ApplicationActivated => "AXApplicationActivated",
            Self::MainWindowChanged => "AXMainWindowChanged",
        }
    }

    /// Payload wrapping used by this kind.
    pub const fn payload(self) -> PayloadKind {
        match self {
            Self::ApplicationHidden | Self::ApplicationShown | Self::ApplicationActivated => {
                PayloadKind::App
            }
            Self::MainWindowChanged => PayloadKind::OptionalWindow,
            _ => PayloadKind::Window,
        }
    }
}

/// An AX notification together with the callback to run for it.
pub enum AppEvent {
    /// See [`AppEventKind::WindowCreated`].
    WindowCreated(WindowCallback),
    /// See [`AppEventKind::ElementDestroyed`].
    ElementDestroyed(WindowCallback),
    /// See [`AppEventKind::WindowMoved`].
    WindowMoved(WindowCallback),
    /// See [`AppEventKind::WindowResized`].
    WindowResized(WindowCallback),
    /// See [`AppEventKind::WindowMiniaturized`].
    WindowMiniaturized(WindowCallback),
    /// See [`AppEventKind::WindowDeminiaturized`].
    WindowDeminiaturized(WindowCallback),
    /// See [`AppEventKind::ApplicationHidden`].
    ApplicationHidden(AppCallback),
    /// See [`AppEventKind::ApplicationShown`].
    ApplicationShown(AppCallback),
    /// See [`AppEventKind::FocusedWindowChanged`].
    FocusedWindowChanged(WindowCallback),
    /// See [`AppEventKind::ApplicationActivated`].
    ApplicationActivated(AppCallback),
    /// See [`AppEventKind::MainWindowChanged`].
    MainWindowChanged(MaybeWindowCallback),
}

impl AppEvent {
    /// Build a window-payload variant. `None` if `kind` delivers something else.
    pub fn for_window(kind: AppEventKind, callback: impl FnMut(Window) + 'static) -> Option<Self> {
        let f: WindowCallback = Box::new(callback);
        Some(match kind {
            AppEventKind::WindowCreated => Self::WindowCreated(f),
            AppEventKind::ElementDestroyed => Self::ElementDestroyed(f),
            AppEventKind::WindowMoved => Self::WindowMoved(f),
            AppEventKind::WindowResized => Self::WindowResized(f),
            AppEventKind::WindowMiniaturized => Self::WindowMiniaturized(f),
            AppEventKind::WindowDeminiaturized => Self::WindowDeminiaturized(f),
            AppEventKind::FocusedWindowChanged => Self::FocusedWindowChanged(f),
            _ => return None,
        })
    }

    /// Build an app-payload variant. `None` if `kind` delivers something else.
    pub fn for_app(kind: AppEventKind, callback: impl FnMut(App) + 'static) -> Option<Self> {
        let f: AppCallback = Box::new(callback);
        Some(match kind {
            AppEventKind::ApplicationHidden => Self::ApplicationHidden(f),
            AppEventKind::ApplicationShown => Self::ApplicationShown(f),
            AppEventKind::ApplicationActivated => Self::ApplicationActivated(f),
            _ => return None,
        })
    }

    /// The variant's kind.
    pub fn kind(&self) -> AppEventKind {
        match self {
            Self::WindowCreated(_) => AppEventKind::WindowCreated,
            Self::ElementDestroyed(_) => AppEventKind::ElementDestroyed,
            Self::WindowMoved(_) => AppEventKind::WindowMoved,
            Self::WindowResized(_) => AppEventKind::WindowResized,
            Self::WindowMiniaturized(_) => AppEventKind::WindowMiniaturized,
            Self::WindowDeminiaturized(_) => AppEventKind::WindowDeminiaturized,
            Self::ApplicationHidden(_) => AppEventKind::ApplicationHidden,
            Self::ApplicationShown(_) => AppEventKind::ApplicationShown,
            Self::FocusedWindowChanged(_) => AppEventKind::FocusedWindowChanged,
            Self::ApplicationActivated(_) => AppEventKind::ApplicationActivated,
            Self::MainWindowChanged(_) => AppEventKind::MainWindowChanged,
        }
    }

    /// Wrap `element` as the variant requires and run the callback.
    ///
    /// A null element is dropped, except for `MainWindowChanged` where it
    /// means "no main window".
    fn call(&mut self, element: Option<Element>, target: &App) {
        match self {
            Self::WindowCreated(f)
            | Self::ElementDestroyed(f)
            | Self::WindowMoved(f)
            | Self::WindowResized(f)
            | Self::WindowMiniaturized(f)
            | Self::WindowDeminiaturized(f)
            | Self::FocusedWindowChanged(f) => match element {
                Some(el) => f(Window::new(el)),
                None => trace!(pid = target.pid(), "null window element; dropped"),
            },
            Self::ApplicationHidden(f) | Self::ApplicationShown(f) | Self::ApplicationActivated(f) => {
                match element {
                    Some(el) => f(target.rewrap(el)),
                    None => trace!(pid = target.pid(), "null application element; dropped"),
                }
            }
            Self::MainWindowChanged(f) => f(element.map(Window::new)),
        }
    }
}

impl Debug for AppEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_tuple("AppEvent").field(&self.kind()).finish()
    }
}

/// Subscription to one AX notification of one application.
///
/// Owns the observer resource; the target [`App`] is only referenced.
pub struct AppEventHandler<A: AxApi> {
    /// AX backend.
    api: A,
    /// Application the observer is bound to.
    app: App,
    /// Subscribed kind, used to rebuild the notification name on teardown.
    kind: AppEventKind,
    /// Observer; present iff registered.
    observer: Option<A::Observer>,
    /// Pins the handler to the main thread.
    _mtm: MainContext,
}

impl<A: AxApi> AppEventHandler<A> {
    /// Subscribe `event` for `app` through `api`.
    ///
    /// Fails, with nothing registered, if the observer cannot be created.
    pub fn with_api(mtm: MainContext, api: A, app: App, event: AppEvent) -> Result<Self> {
        let kind = event.kind();
        let pid = app.pid();
        let mut observer = match api.create_observer(pid) {
            Ok(Some(observer)) => observer,
            Ok(None) => return Err(Error::NullObserver { pid }),
            Err(source) => return Err(Error::ObserverCreate { pid, source }),
        };

        let name = kind.notification_name();
        let target = app.clone();
        let mut event = event;
        if let Err(e) = api.add_notification(
            &mut observer,
            app.element(),
            name,
            Box::new(move |element| event.call(element, &target)),
        ) {
            warn!("AXObserverAddNotification({}, pid={}) failed: {}", name, pid, e);
        }
        api.attach_run_loop_source(&observer);
        debug!(pid, ?kind, "AX observer registered");

        Ok(Self {
            api,
            app,
            kind,
            observer: Some(observer),
            _mtm: mtm,
        })
    }

    /// Target application.
    pub fn app(&self) -> &App {
        &self.app
    }

    /// Subscribed kind.
    pub fn kind(&self) -> AppEventKind {
        self.kind
    }

    /// True until the handler has been unregistered.
    pub fn is_registered(&self) -> bool {
        self.observer.is_some()
    }

    /// Tear the subscription down. Later calls do nothing.
    ///
    /// The run loop source is detached before the notification is removed, so
    /// nothing can fire into a half-released observer.
    pub fn unregister(&mut self) {
        let Some(mut observer) = self.observer.take() else {
            return;
        };
        let name = self.kind.notification_name();
        self.api.detach_run_loop_source(&observer);
        if let Err(e) = self
            .api
            .remove_notification(&mut observer, self.app.element(), name)
        {
            debug!(
                "AXObserverRemoveNotification({}, pid={}) failed: {}",
                name,
                self.app.pid(),
                e
            );
        }
        drop(observer);
        debug!(pid = self.app.pid(), kind = ?self.kind, "AX observer removed");
    }
}

#[cfg(target_os = "macos")]
impl AppEventHandler<crate::SystemAx> {
    /// Subscribe `event` for `app` through the system Accessibility API.
    pub fn new(mtm: MainContext, app: App, event: AppEvent) -> Result<Self> {
        Self::with_api(mtm, crate::SystemAx, app, event)
    }
}

impl<A: AxApi> Drop for AppEventHandler<A> {
    fn drop(&mut self) {
        self.unregister();
    }
}

impl<A: AxApi> Debug for AppEventHandler<A> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("AppEventHandler")
            .field("pid", &self.app.pid())
            .field("kind", &self.kind)
            .field("registered", &self.is_registered())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        cell::{Cell, RefCell},
        collections::HashSet,
        rc::Rc,
    };

    use proptest::prelude::*;

    use super::*;
    use crate::{
        AxError,
        mock::{AxCall, MockAx, fake_app, fake_element, main_context},
    };

    fn window_recorder(kind: AppEventKind) -> (AppEvent, Rc<RefCell<Vec<Window>>>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let event = AppEvent::for_window(kind, move |w| sink.borrow_mut().push(w))
            .expect("window kind");
        (event, seen)
    }

    #[test]
    fn names_are_distinct_and_ax_prefixed() {
        let names: HashSet<_> = AppEventKind::ALL
            .iter()
            .map(|k| k.notification_name())
            .collect();
        assert_eq!(names.len(), AppEventKind::ALL.len());
        for kind in AppEventKind::ALL {
            assert!(kind.notification_name().starts_with("AX"));
            assert_eq!(kind.notification_name(), kind.notification_name());
        }
        assert_eq!(
            AppEventKind::ElementDestroyed.notification_name(),
            "AXUIElementDestroyed"
        );
    }

    #[test]
    fn constructors_cover_every_kind_exactly_once() {
        for kind in AppEventKind::ALL {
            let w = AppEvent::for_window(kind, |_| {});
            let a = AppEvent::for_app(kind, |_| {});
            match kind.payload() {
                PayloadKind::Window => {
                    assert_eq!(w.map(|e| e.kind()), Some(kind));
                    assert!(a.is_none());
                }
                PayloadKind::App => {
                    assert_eq!(a.map(|e| e.kind()), Some(kind));
                    assert!(w.is_none());
                }
                PayloadKind::OptionalWindow => {
                    assert!(w.is_none() && a.is_none());
                    assert_eq!(kind, AppEventKind::MainWindowChanged);
                }
            }
        }
    }

    #[test]
    fn window_created_registers_on_the_root_element() {
        let ax = MockAx::default();
        let app = fake_app(100);
        let (event, _seen) = window_recorder(AppEventKind::WindowCreated);
        let h = AppEventHandler::with_api(main_context(), ax.clone(), app.clone(), event)
            .expect("handler");
        assert!(h.is_registered());
        assert_eq!(
            ax.calls(),
            vec![
                AxCall::Create { pid: 100 },
                AxCall::AddNotification {
                    observer: 0,
                    element: app.element().clone(),
                    name: "AXWindowCreated",
                },
                AxCall::Attach { observer: 0 },
            ]
        );
    }

    #[test]
    fn delivered_window_reaches_the_callback() {
        let ax = MockAx::default();
        let (event, seen) = window_recorder(AppEventKind::WindowMoved);
        let _h =
            AppEventHandler::with_api(main_context(), ax.clone(), fake_app(7), event).expect("ok");
        let win = fake_element(70, Some(7));
        assert_eq!(ax.deliver("AXWindowMoved", Some(win.clone())), 1);
        assert_eq!(*seen.borrow(), vec![Window::new(win)]);
    }

    #[test]
    fn null_window_element_is_dropped() {
        let ax = MockAx::default();
        let (event, seen) = window_recorder(AppEventKind::WindowResized);
        let _h =
            AppEventHandler::with_api(main_context(), ax.clone(), fake_app(7), event).expect("ok");
        ax.deliver("AXWindowResized", None);
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn app_payload_wraps_the_element_as_app() {
        let ax = MockAx::default();
        let target = fake_app(55).with_name("Notes");
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let event = AppEvent::for_app(AppEventKind::ApplicationHidden, move |a| {
            sink.borrow_mut().push(a)
        })
        .expect("app kind");
        let _h = AppEventHandler::with_api(main_context(), ax.clone(), target.clone(), event)
            .expect("ok");
        ax.deliver("AXApplicationHidden", Some(target.element().clone()));
        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], target);
        assert_eq!(seen[0].name(), Some("Notes"));
    }

    #[test]
    fn main_window_changed_passes_none_for_null() {
        let ax = MockAx::default();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let event = AppEvent::MainWindowChanged(Box::new(move |w| sink.borrow_mut().push(w)));
        let _h =
            AppEventHandler::with_api(main_context(), ax.clone(), fake_app(9), event).expect("ok");
        let win = fake_element(91, Some(9));
        ax.deliver("AXMainWindowChanged", None);
        ax.deliver("AXMainWindowChanged", Some(win.clone()));
        assert_eq!(*seen.borrow(), vec![None, Some(Window::new(win))]);
    }

    #[test]
    fn create_failure_registers_nothing() {
        let ax = MockAx::default();
        ax.fail_create(AxError::API_DISABLED);
        let (event, _seen) = window_recorder(AppEventKind::WindowCreated);
        let err = AppEventHandler::with_api(main_context(), ax.clone(), fake_app(3), event)
            .expect_err("must fail");
        assert!(matches!(
            err,
            Error::ObserverCreate {
                pid: 3,
                source: AxError::API_DISABLED
            }
        ));
        assert_eq!(ax.calls(), vec![AxCall::Create { pid: 3 }]);
    }

    #[test]
    fn null_observer_registers_nothing() {
        let ax = MockAx::default();
        ax.return_null_observer();
        let (event, _seen) = window_recorder(AppEventKind::WindowCreated);
        let err = AppEventHandler::with_api(main_context(), ax.clone(), fake_app(4), event)
            .expect_err("must fail");
        assert!(matches!(err, Error::NullObserver { pid: 4 }));
        assert_eq!(ax.calls(), vec![AxCall::Create { pid: 4 }]);
    }

    #[test]
    fn add_failure_still_tears_down_cleanly() {
        let ax = MockAx::default();
        ax.fail_add(AxError::NOTIFICATION_UNSUPPORTED);
        let (event, _seen) = window_recorder(AppEventKind::WindowMiniaturized);
        let mut h =
            AppEventHandler::with_api(main_context(), ax.clone(), fake_app(6), event).expect("ok");
        assert!(h.is_registered());
        h.unregister();
        assert_eq!(ax.live_observers(), 0);
        assert_eq!(ax.attached_sources(), 0);
    }

    #[test]
    fn unregister_detaches_source_before_removing_notification() {
        let ax = MockAx::default();
        let app = fake_app(12);
        let (event, _seen) = window_recorder(AppEventKind::FocusedWindowChanged);
        let mut h =
            AppEventHandler::with_api(main_context(), ax.clone(), app.clone(), event).expect("ok");
        ax.clear_calls();
        h.unregister();
        assert_eq!(
            ax.calls(),
            vec![
                AxCall::Detach { observer: 0 },
                AxCall::RemoveNotification {
                    observer: 0,
                    element: app.element().clone(),
                    name: "AXFocusedWindowChanged",
                },
                AxCall::Release { observer: 0 },
            ]
        );
        assert!(!h.is_registered());
    }

    #[test]
    fn drop_without_unregister_tears_down_once() {
        let ax = MockAx::default();
        let (event, seen) = window_recorder(AppEventKind::WindowDeminiaturized);
        {
            let _h = AppEventHandler::with_api(main_context(), ax.clone(), fake_app(2), event)
                .expect("ok");
            assert_eq!(ax.live_observers(), 1);
        }
        assert_eq!(ax.count(|c| matches!(c, AxCall::Detach { .. })), 1);
        assert_eq!(ax.count(|c| matches!(c, AxCall::RemoveNotification { .. })), 1);
        assert_eq!(ax.live_observers(), 0);
        assert_eq!(ax.deliver("AXWindowDeminiaturized", Some(fake_element(1, Some(2)))), 0);
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn callback_may_drop_its_own_handler() {
        let ax = MockAx::default();
        let slot: Rc<RefCell<Option<AppEventHandler<MockAx>>>> = Rc::new(RefCell::new(None));
        let runs = Rc::new(Cell::new(0));
        let (own, count) = (slot.clone(), runs.clone());
        let event = AppEvent::for_window(AppEventKind::WindowCreated, move |_| {
            count.set(count.get() + 1);
            let handler = own.borrow_mut().take();
            drop(handler);
        })
        .expect("window kind");
        *slot.borrow_mut() = Some(
            AppEventHandler::with_api(main_context(), ax.clone(), fake_app(30), event).expect("ok"),
        );

        assert_eq!(ax.deliver("AXWindowCreated", Some(fake_element(300, Some(30)))), 1);
        assert!(slot.borrow().is_none());
        assert_eq!(runs.get(), 1);
        assert_eq!(ax.count(|c| matches!(c, AxCall::Detach { .. })), 1);
        assert_eq!(ax.count(|c| matches!(c, AxCall::RemoveNotification { .. })), 1);
        assert_eq!(ax.count(|c| matches!(c, AxCall::Release { .. })), 1);
        assert_eq!(ax.live_observers(), 0);

        assert_eq!(ax.deliver("AXWindowCreated", Some(fake_element(301, Some(30)))), 0);
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn handlers_for_different_apps_are_independent() {
        let ax = MockAx::default();
        let (e1, s1) = window_recorder(AppEventKind::WindowCreated);
        let (e2, s2) = window_recorder(AppEventKind::WindowCreated);
        let mut h1 =
            AppEventHandler::with_api(main_context(), ax.clone(), fake_app(1), e1).expect("ok");
        let _h2 =
            AppEventHandler::with_api(main_context(), ax.clone(), fake_app(2), e2).expect("ok");
        h1.unregister();
        assert_eq!(ax.deliver("AXWindowCreated", Some(fake_element(5, Some(2)))), 1);
        assert!(s1.borrow().is_empty());
        assert_eq!(s2.borrow().len(), 1);
    }

    proptest! {
        #[test]
        fn repeated_unregister_tears_down_once(n in 1usize..16) {
            let ax = MockAx::default();
            let (event, _seen) = window_recorder(AppEventKind::WindowCreated);
            let mut h = AppEventHandler::with_api(main_context(), ax.clone(), fake_app(1), event)
                .expect("ok");
            for _ in 0..n {
                h.unregister();
            }
            drop(h);
            prop_assert_eq!(ax.count(|c| matches!(c, AxCall::Detach { .. })), 1);
            prop_assert_eq!(ax.count(|c| matches!(c, AxCall::RemoveNotification { .. })), 1);
            prop_assert_eq!(ax.count(|c| matches!(c, AxCall::Release { .. })), 1);
        }
    }
}
