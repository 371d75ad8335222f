//! Session-wide application lifecycle notifications.

use std::fmt::{Debug, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::{App, AppCallback, MainContext, NotificationPayload, WorkspaceCenter};

/// User-info key holding the `NSRunningApplication` a notification is about.
pub const APPLICATION_KEY: &str = "NSWorkspaceApplicationKey";

/// Which lifecycle notification a [`DesktopEvent`] subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DesktopEventKind {
    /// An application finished launching.
    AppLaunched,
    /// An application quit.
    AppTerminated,
    /// An application was hidden.
    AppHidden,
    /// An application was unhidden.
    AppUnhidden,
    /// An application became active.
    AppFocused,
    /// An application resigned active.
    AppUnfocused,
}

impl DesktopEventKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::AppLaunched,
        Self::AppTerminated,
        Self::AppHidden,
        Self::AppUnhidden,
        Self::AppFocused,
        Self::AppUnfocused,
    ];

    /// NSWorkspace notification name for this kind.
    pub const fn notification_name(self) -> &'static str {
        match self {
            Self::AppLaunched => "NSWorkspaceDidLaunchApplicationNotification",
            Self::AppTerminated => "NSWorkspaceDidTerminateApplicationNotification",
            Self::AppHidden => "NSWorkspaceDidHideApplicationNotification",
            Self::AppUnhidden => "NSWorkspaceDidUnhideApplicationNotification",
            Self::AppFocused => "NSWorkspaceDidActivateApplicationNotification",
            Self::AppUnfocused => "NSWorkspaceDidDeactivateApplicationNotification",
        }
    }
}

/// A lifecycle notification together with the callback to run for it.
pub enum DesktopEvent {
    /// See [`DesktopEventKind::AppLaunched`].
    AppLaunched(AppCallback),
    /// See [`DesktopEventKind::AppTerminated`].
    AppTerminated(AppCallback),
    /// See [`DesktopEventKind::AppHidden`].
    AppHidden(AppCallback),
    /// See [`DesktopEventKind::AppUnhidden`].
    AppUnhidden(AppCallback),
    /// See [`DesktopEventKind::AppFocused`].
    AppFocused(AppCallback),
    /// See [`DesktopEventKind::AppUnfocused`].
    AppUnfocused(AppCallback),
}

impl DesktopEvent {
    /// Build the variant for `kind` around `callback`.
    pub fn new(kind: DesktopEventKind, callback: impl FnMut(App) + 'static) -> Self {
        let f: AppCallback = Box::new(callback);
        match kind {
            DesktopEventKind::AppLaunched => Self::AppLaunched(f),
            DesktopEventKind::AppTerminated => Self::AppTerminated(f),
            DesktopEventKind::AppHidden => Self::AppHidden(f),
            DesktopEventKind::AppUnhidden => Self::AppUnhidden(f),
            DesktopEventKind::AppFocused => Self::AppFocused(f),
            DesktopEventKind::AppUnfocused => Self::AppUnfocused(f),
        }
    }

    /// The variant's kind.
    pub fn kind(&self) -> DesktopEventKind {
        match self {
            Self::AppLaunched(_) => DesktopEventKind::AppLaunched,
            Self::AppTerminated(_) => DesktopEventKind::AppTerminated,
            Self::AppHidden(_) => DesktopEventKind::AppHidden,
            Self::AppUnhidden(_) => DesktopEventKind::AppUnhidden,
            Self::AppFocused(_) => DesktopEventKind::AppFocused,
            Self::AppUnfocused(_) => DesktopEventKind::AppUnfocused,
        }
    }

    /// Run the callback with `app`.
    fn call(&mut self, app: App) {
        match self {
            Self::AppLaunched(f)
            | Self::AppTerminated(f)
            | Self::AppHidden(f)
            | Self::AppUnhidden(f)
            | Self::AppFocused(f)
            | Self::AppUnfocused(f) => f(app),
        }
    }

    /// Translate a delivered notification. Payloads without an application
    /// are dropped without calling back.
    fn deliver(&mut self, payload: &dyn NotificationPayload) {
        match payload.application(APPLICATION_KEY) {
            Some(app) => self.call(app),
            None => trace!(kind = ?self.kind(), "notification without application; dropped"),
        }
    }
}

impl Debug for DesktopEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_tuple("DesktopEvent").field(&self.kind()).finish()
    }
}

/// Subscription to one lifecycle notification on a [`WorkspaceCenter`].
///
/// Registered from construction until [`unregister`](Self::unregister) or
/// drop, whichever comes first.
pub struct DesktopEventHandler<C: WorkspaceCenter> {
    /// Center the subscription lives on.
    center: C,
    /// Subscribed kind.
    kind: DesktopEventKind,
    /// Registration token; `None` once unregistered.
    token: Option<C::Token>,
    /// Pins the handler to the main thread.
    _mtm: MainContext,
}

impl<C: WorkspaceCenter> DesktopEventHandler<C> {
    /// Subscribe `event` on `center`.
    pub fn with_center(mtm: MainContext, center: C, event: DesktopEvent) -> Self {
        let kind = event.kind();
        let mut event = event;
        let token = center.add_observer(
            kind.notification_name(),
            Box::new(move |payload: &dyn NotificationPayload| event.deliver(payload)),
        );
        debug!(?kind, "desktop observer registered");
        Self {
            center,
            kind,
            token: Some(token),
            _mtm: mtm,
        }
    }

    /// Subscribed kind.
    pub fn kind(&self) -> DesktopEventKind {
        self.kind
    }

    /// True until the handler has been unregistered.
    pub fn is_registered(&self) -> bool {
        self.token.is_some()
    }

    /// Remove the subscription. Later calls do nothing.
    pub fn unregister(&mut self) {
        if let Some(token) = self.token.take() {
            self.center.remove_observer(token);
            debug!(kind = ?self.kind, "desktop observer removed");
        }
    }
}

#[cfg(target_os = "macos")]
impl DesktopEventHandler<crate::NsWorkspaceCenter> {
    /// Subscribe `event` on the shared NSWorkspace notification center.
    pub fn new(mtm: MainContext, event: DesktopEvent) -> Self {
        Self::with_center(mtm, crate::NsWorkspaceCenter::shared(mtm), event)
    }
}

impl<C: WorkspaceCenter> Drop for DesktopEventHandler<C> {
    fn drop(&mut self) {
        self.unregister();
    }
}

impl<C: WorkspaceCenter> Debug for DesktopEventHandler<C> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("DesktopEventHandler")
            .field("kind", &self.kind)
            .field("registered", &self.is_registered())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, collections::HashSet, rc::Rc};

    use proptest::prelude::*;

    use super::*;
    use crate::mock::{FakePayload, MockWorkspace, WorkspaceCall, fake_app, main_context};

    fn recording(kind: DesktopEventKind) -> (DesktopEvent, Rc<RefCell<Vec<App>>>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        (
            DesktopEvent::new(kind, move |app| sink.borrow_mut().push(app)),
            seen,
        )
    }

    #[test]
    fn names_are_distinct_and_stable() {
        let names: HashSet<_> = DesktopEventKind::ALL
            .iter()
            .map(|k| k.notification_name())
            .collect();
        assert_eq!(names.len(), DesktopEventKind::ALL.len());
        for kind in DesktopEventKind::ALL {
            assert_eq!(kind.notification_name(), kind.notification_name());
            assert!(kind.notification_name().starts_with("NSWorkspaceDid"));
        }
        assert_eq!(
            DesktopEventKind::AppFocused.notification_name(),
            "NSWorkspaceDidActivateApplicationNotification"
        );
    }

    #[test]
    fn new_builds_the_matching_variant() {
        for kind in DesktopEventKind::ALL {
            assert_eq!(DesktopEvent::new(kind, |_| {}).kind(), kind);
        }
    }

    #[test]
    fn launched_notification_calls_back_once_with_the_app() {
        let center = MockWorkspace::default();
        let (event, seen) = recording(DesktopEventKind::AppLaunched);
        let _h = DesktopEventHandler::with_center(main_context(), center.clone(), event);

        let app42 = fake_app(42);
        let delivered = center.post(
            "NSWorkspaceDidLaunchApplicationNotification",
            &FakePayload::default().with(APPLICATION_KEY, app42.clone()),
        );
        assert_eq!(delivered, 1);
        assert_eq!(*seen.borrow(), vec![app42]);
    }

    #[test]
    fn payload_without_application_is_dropped() {
        let center = MockWorkspace::default();
        let (event, seen) = recording(DesktopEventKind::AppTerminated);
        let _h = DesktopEventHandler::with_center(main_context(), center.clone(), event);

        let name = DesktopEventKind::AppTerminated.notification_name();
        center.post(name, &FakePayload::default());
        center.post(name, &FakePayload::default().with("SomethingElse", fake_app(1)));
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn other_notifications_do_not_reach_the_callback() {
        let center = MockWorkspace::default();
        let (event, seen) = recording(DesktopEventKind::AppHidden);
        let _h = DesktopEventHandler::with_center(main_context(), center.clone(), event);
        let delivered = center.post(
            DesktopEventKind::AppUnhidden.notification_name(),
            &FakePayload::for_app(fake_app(3)),
        );
        assert_eq!(delivered, 0);
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn register_then_unregister_leaves_nothing_behind() {
        let center = MockWorkspace::default();
        let mut h = DesktopEventHandler::with_center(
            main_context(),
            center.clone(),
            DesktopEvent::new(DesktopEventKind::AppFocused, |_| {}),
        );
        assert!(h.is_registered());
        assert_eq!(center.live_observers(), 1);
        h.unregister();
        assert!(!h.is_registered());
        assert_eq!(center.live_observers(), 0);
        assert_eq!(
            center.calls(),
            vec![
                WorkspaceCall::Add {
                    id: 0,
                    name: "NSWorkspaceDidActivateApplicationNotification"
                },
                WorkspaceCall::Remove { id: 0 },
            ]
        );
    }

    #[test]
    fn drop_unregisters_exactly_once() {
        let center = MockWorkspace::default();
        let (event, seen) = recording(DesktopEventKind::AppUnfocused);
        {
            let _h = DesktopEventHandler::with_center(main_context(), center.clone(), event);
            assert_eq!(center.live_observers(), 1);
        }
        assert_eq!(center.live_observers(), 0);
        assert_eq!(center.remove_count(), 1);
        center.post(
            DesktopEventKind::AppUnfocused.notification_name(),
            &FakePayload::for_app(fake_app(5)),
        );
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn explicit_unregister_then_drop_removes_once() {
        let center = MockWorkspace::default();
        let mut h = DesktopEventHandler::with_center(
            main_context(),
            center.clone(),
            DesktopEvent::new(DesktopEventKind::AppLaunched, |_| {}),
        );
        h.unregister();
        drop(h);
        assert_eq!(center.add_count(), 1);
        assert_eq!(center.remove_count(), 1);
    }

    #[test]
    fn callback_may_drop_another_handler() {
        let center = MockWorkspace::default();
        let victim: Rc<RefCell<Option<DesktopEventHandler<MockWorkspace>>>> =
            Rc::new(RefCell::new(None));
        *victim.borrow_mut() = Some(DesktopEventHandler::with_center(
            main_context(),
            center.clone(),
            DesktopEvent::new(DesktopEventKind::AppHidden, |_| {}),
        ));
        let slot = victim.clone();
        let _killer = DesktopEventHandler::with_center(
            main_context(),
            center.clone(),
            DesktopEvent::new(DesktopEventKind::AppLaunched, move |_| {
                slot.borrow_mut().take();
            }),
        );
        center.post(
            DesktopEventKind::AppLaunched.notification_name(),
            &FakePayload::for_app(fake_app(8)),
        );
        assert!(victim.borrow().is_none());
        assert_eq!(center.live_observers(), 1);
    }

    proptest! {
        #[test]
        fn repeated_unregister_matches_a_single_call(n in 1usize..16) {
            let center = MockWorkspace::default();
            let mut h = DesktopEventHandler::with_center(
                main_context(),
                center.clone(),
                DesktopEvent::new(DesktopEventKind::AppTerminated, |_| {}),
            );
            for _ in 0..n {
                h.unregister();
            }
            drop(h);
            prop_assert_eq!(center.remove_count(), 1);
            prop_assert_eq!(center.live_observers(), 0);
        }
    }
}
