//! NSWorkspace notification center backend.

use std::{
    cell::RefCell,
    fmt::{Debug, Formatter, Result as FmtResult},
    ptr::NonNull,
};

use block2::RcBlock;
use objc2::{
    rc::Retained,
    runtime::{AnyObject, NSObjectProtocol, ProtocolObject},
};
use objc2_app_kit::{NSApplicationActivationPolicy, NSRunningApplication, NSWorkspace};
use objc2_foundation::{NSNotification, NSNotificationCenter, NSOperationQueue, NSString};
use tracing::trace;

use crate::{
    App, Element, MainContext, NotificationPayload, PayloadCallback, WorkspaceCenter,
    ax::AxElement,
};

/// The shared workspace's notification center.
///
/// Observers are added with the main operation queue, so callbacks run on the
/// main thread.
#[derive(Clone)]
pub struct NsWorkspaceCenter {
    center: Retained<NSNotificationCenter>,
}

impl NsWorkspaceCenter {
    /// Center of `NSWorkspace.sharedWorkspace`.
    pub fn shared(_mtm: MainContext) -> Self {
        let center = unsafe { NSWorkspace::sharedWorkspace().notificationCenter() };
        Self { center }
    }
}

impl Debug for NsWorkspaceCenter {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str("NsWorkspaceCenter")
    }
}

/// Opaque observer object returned by `addObserverForName:object:queue:usingBlock:`.
pub struct NsObserverToken(Retained<ProtocolObject<dyn NSObjectProtocol>>);

impl Debug for NsObserverToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "NsObserverToken({:p})", Retained::as_ptr(&self.0))
    }
}

impl WorkspaceCenter for NsWorkspaceCenter {
    type Token = NsObserverToken;

    fn add_observer(&self, name: &'static str, callback: PayloadCallback) -> NsObserverToken {
        let callback = RefCell::new(callback);
        let block = RcBlock::new(move |notif: NonNull<NSNotification>| {
            // SAFETY: AppKit passes a valid notification for the duration of the call.
            let payload: &dyn NotificationPayload = unsafe { notif.as_ref() };
            match callback.try_borrow_mut() {
                Ok(mut f) => (*f)(payload),
                Err(_) => trace!("re-entrant workspace notification; dropped"),
            }
        });
        let name = NSString::from_str(name);
        let queue = NSOperationQueue::mainQueue();
        let token = unsafe {
            self.center.addObserverForName_object_queue_usingBlock(
                Some(&name),
                None,
                Some(&queue),
                &block,
            )
        };
        NsObserverToken(token)
    }

    fn remove_observer(&self, token: NsObserverToken) {
        let observer: &AnyObject = (*token.0).as_ref();
        unsafe { self.center.removeObserver(observer) };
    }
}

impl NotificationPayload for NSNotification {
    fn application(&self, key: &str) -> Option<App> {
        let info = unsafe { self.userInfo() }?;
        let key = NSString::from_str(key);
        let value = unsafe { info.objectForKey(&key) }?;
        let app = value.downcast::<NSRunningApplication>().ok()?;
        app_from_running(&app)
    }
}

/// Build an [`App`] for a running application, with its AX root element.
fn app_from_running(app: &NSRunningApplication) -> Option<App> {
    let pid = unsafe { app.processIdentifier() };
    if pid <= 0 {
        return None;
    }
    let element = AxElement::application(pid)?;
    let mut out = App::new(pid, Element::new(element));
    if let Some(id) = unsafe { app.bundleIdentifier() } {
        out = out.with_bundle_id(id.to_string());
    }
    if let Some(name) = unsafe { app.localizedName() } {
        out = out.with_name(name.to_string());
    }
    Some(out)
}

/// Applications currently running with the regular activation policy, i.e.
/// those that show up in the Dock.
pub fn running_apps(_mtm: MainContext) -> Vec<App> {
    let apps = unsafe { NSWorkspace::sharedWorkspace().runningApplications() };
    apps.iter()
        .filter(|a| unsafe { a.activationPolicy() } == NSApplicationActivationPolicy::Regular)
        .filter_map(|a| app_from_running(&a))
        .collect()
}
