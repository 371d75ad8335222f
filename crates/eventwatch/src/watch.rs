//! The watcher: desktop handlers plus per-app AX handlers that follow
//! application launches and terminations.

use std::{
    cell::RefCell,
    collections::BTreeMap,
    fmt::{Display, Formatter, Result as FmtResult},
    rc::Rc,
};

use mac_events::{
    App, AppEvent, AppEventHandler, AppEventKind, AxApi, DesktopEvent, DesktopEventHandler,
    DesktopEventKind, MainContext, PayloadKind, Pid, Window, WorkspaceCenter,
};
use tracing::{debug, warn};

use crate::{Config, Error};

/// Receives every delivered event.
pub type Sink = Rc<dyn Fn(Observation)>;

/// Identity of an application as reported with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppInfo {
    /// Process id.
    pub pid: Pid,
    /// Bundle identifier, if known.
    pub bundle_id: Option<String>,
    /// Localized name, if known.
    pub name: Option<String>,
}

impl From<&App> for AppInfo {
    fn from(app: &App) -> Self {
        Self {
            pid: app.pid(),
            bundle_id: app.bundle_id().map(String::from),
            name: app.name().map(String::from),
        }
    }
}

impl Display for AppInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "pid={}", self.pid)?;
        if let Some(id) = &self.bundle_id {
            write!(f, " bundle={id}")?;
        }
        if let Some(name) = &self.name {
            write!(f, " name={name:?}")?;
        }
        Ok(())
    }
}

/// What an AX notification was about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    /// A window, with its title when it has one.
    Window {
        /// `AXTitle` at delivery time.
        title: Option<String>,
    },
    /// The application itself.
    App(AppInfo),
    /// A main-window change that left no main window.
    NoWindow,
}

/// One delivered event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// A workspace lifecycle notification.
    Desktop {
        /// Notification kind.
        kind: DesktopEventKind,
        /// The application it was about.
        app: AppInfo,
    },
    /// An AX notification from a followed application.
    App {
        /// Notification kind.
        kind: AppEventKind,
        /// The observed application.
        target: Pid,
        /// What the notification carried.
        subject: Subject,
    },
}

impl Display for Observation {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Desktop { kind, app } => write!(f, "{kind:?} {app}"),
            Self::App {
                kind,
                target,
                subject,
            } => {
                write!(f, "{kind:?} target={target}")?;
                match subject {
                    Subject::Window { title: Some(t) } => write!(f, " window={t:?}"),
                    Subject::Window { title: None } => write!(f, " window"),
                    Subject::App(app) => write!(f, " app {app}"),
                    Subject::NoWindow => write!(f, " no-window"),
                }
            }
        }
    }
}

/// Build the [`AppEvent`] for `kind` that reports into `sink`.
fn app_event(kind: AppEventKind, target: Pid, sink: Sink) -> Option<AppEvent> {
    let report = move |subject| {
        sink(Observation::App {
            kind,
            target,
            subject,
        })
    };
    match kind.payload() {
        PayloadKind::Window => AppEvent::for_window(kind, move |w: Window| {
            report(Subject::Window { title: w.title() })
        }),
        PayloadKind::App => {
            AppEvent::for_app(kind, move |a: App| report(Subject::App(AppInfo::from(&a))))
        }
        PayloadKind::OptionalWindow => Some(AppEvent::MainWindowChanged(Box::new(
            move |w: Option<Window>| {
                report(match w {
                    Some(w) => Subject::Window { title: w.title() },
                    None => Subject::NoWindow,
                })
            },
        ))),
    }
}

/// Per-app handler table shared with the lifecycle callbacks.
struct Follow<A: AxApi> {
    /// Main-thread proof for handler construction.
    mtm: MainContext,
    /// AX backend handed to every new handler.
    api: A,
    /// Kinds to install and apps to skip.
    config: Config,
    /// Event sink.
    sink: Sink,
    /// Live handlers by pid.
    apps: RefCell<BTreeMap<Pid, Vec<AppEventHandler<A>>>>,
}

impl<A: AxApi + Clone> Follow<A> {
    /// Install the configured handlers on `app`. Returns how many were installed.
    fn attach(&self, app: &App) -> usize {
        if self.config.excludes(app) {
            debug!(pid = app.pid(), name = ?app.name(), "excluded app; not following");
            return 0;
        }
        if self.apps.borrow().contains_key(&app.pid()) {
            return 0;
        }
        let mut handlers = Vec::with_capacity(self.config.app.len());
        for &kind in &self.config.app {
            let Some(event) = app_event(kind, app.pid(), self.sink.clone()) else {
                continue;
            };
            match AppEventHandler::with_api(self.mtm, self.api.clone(), app.clone(), event) {
                Ok(h) => handlers.push(h),
                Err(e) => warn!("{}", Error::from(e)),
            }
        }
        let installed = handlers.len();
        debug!(pid = app.pid(), installed, "following app");
        self.apps.borrow_mut().insert(app.pid(), handlers);
        installed
    }

    /// Drop every handler for `pid`.
    fn detach(&self, pid: Pid) {
        // Handlers are dropped outside the borrow; teardown may call back.
        let gone = self.apps.borrow_mut().remove(&pid);
        if let Some(handlers) = gone {
            debug!(pid, count = handlers.len(), "unfollowing app");
            drop(handlers);
        }
    }
}

/// Desktop handlers for the configured kinds plus, when following, per-app
/// AX handlers kept in step with launches and terminations.
pub struct Watcher<C: WorkspaceCenter, A: AxApi> {
    /// One handler per subscribed desktop kind.
    desktop: Vec<DesktopEventHandler<C>>,
    /// Present when following is on.
    follow: Option<Rc<Follow<A>>>,
}

impl<C, A> Watcher<C, A>
where
    C: WorkspaceCenter + Clone + 'static,
    A: AxApi + Clone + 'static,
{
    /// Register desktop handlers for `config` on `center`. Per-app handlers
    /// use `api`; call [`Self::seed`] to cover applications already running.
    pub fn new(mtm: MainContext, center: &C, api: A, config: &Config, sink: &Sink) -> Self {
        let follow = config.follow.then(|| {
            Rc::new(Follow {
                mtm,
                api,
                config: config.clone(),
                sink: sink.clone(),
                apps: RefCell::new(BTreeMap::new()),
            })
        });
        let desktop = config
            .desktop_kinds()
            .into_iter()
            .map(|kind| {
                let report = config.desktop.contains(&kind).then(|| sink.clone());
                let follow = follow.clone();
                let event = DesktopEvent::new(kind, move |app: App| {
                    if let Some(sink) = &report {
                        sink(Observation::Desktop {
                            kind,
                            app: AppInfo::from(&app),
                        });
                    }
                    if let Some(f) = &follow {
                        match kind {
                            DesktopEventKind::AppLaunched => {
                                f.attach(&app);
                            }
                            DesktopEventKind::AppTerminated => f.detach(app.pid()),
                            _ => {}
                        }
                    }
                });
                DesktopEventHandler::with_center(mtm, center.clone(), event)
            })
            .collect();
        Self { desktop, follow }
    }

    /// Follow applications that were already running. A no-op when following
    /// is off. Returns the number of AX handlers installed.
    pub fn seed(&self, apps: impl IntoIterator<Item = App>) -> usize {
        let Some(f) = &self.follow else {
            return 0;
        };
        apps.into_iter().map(|app| f.attach(&app)).sum()
    }

    /// Subscribed desktop kinds.
    pub fn desktop_kinds(&self) -> Vec<DesktopEventKind> {
        self.desktop.iter().map(DesktopEventHandler::kind).collect()
    }

    /// Pids of followed applications, ascending.
    pub fn followed(&self) -> Vec<Pid> {
        self.follow
            .as_ref()
            .map(|f| f.apps.borrow().keys().copied().collect())
            .unwrap_or_default()
    }

    /// Number of live AX handlers across all followed applications.
    pub fn app_handlers(&self) -> usize {
        self.follow
            .as_ref()
            .map(|f| f.apps.borrow().values().map(Vec::len).sum())
            .unwrap_or_default()
    }

    /// Stop following `pid` now rather than waiting for its termination.
    pub fn forget(&self, pid: Pid) {
        if let Some(f) = &self.follow {
            f.detach(pid);
        }
    }
}

impl<C: WorkspaceCenter, A: AxApi> Drop for Watcher<C, A> {
    fn drop(&mut self) {
        // Desktop handlers first so no launch can re-populate the table.
        self.desktop.clear();
        if let Some(f) = &self.follow {
            let apps = f.apps.take();
            drop(apps);
        }
    }
}

/// Every known event kind with its OS notification name, one per line.
pub fn listing() -> String {
    let desktop = DesktopEventKind::ALL
        .iter()
        .map(|k| format!("desktop  {:<22} {}\n", format!("{k:?}"), k.notification_name()));
    let app = AppEventKind::ALL
        .iter()
        .map(|k| format!("app      {:<22} {}\n", format!("{k:?}"), k.notification_name()));
    desktop.chain(app).collect()
}
