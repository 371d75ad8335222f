//! RON configuration for eventwatch.

use std::{fs, path::Path};

use mac_events::{App, AppEventKind, DesktopEventKind};
use serde::{Deserialize, Serialize};

use crate::Result;

/// What to watch.
///
/// Every field is optional in the file; missing fields take the default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Workspace lifecycle notifications to log.
    pub desktop: Vec<DesktopEventKind>,
    /// AX notifications to install on every followed application.
    pub app: Vec<AppEventKind>,
    /// Install AX handlers on running and newly launched applications, and
    /// drop them when the application terminates.
    pub follow: bool,
    /// Application names never followed.
    pub exclude: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            desktop: DesktopEventKind::ALL.to_vec(),
            app: AppEventKind::ALL.to_vec(),
            follow: true,
            exclude: ["Dock", "WindowManager", "Control Center", "Spotlight"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl Config {
    /// Read and parse a RON file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Parse RON text.
    pub fn parse(text: &str) -> Result<Self> {
        Ok(ron::from_str(text)?)
    }

    /// Whether `app` is on the exclusion list.
    pub fn excludes(&self, app: &App) -> bool {
        app.name()
            .is_some_and(|name| self.exclude.iter().any(|e| e == name))
    }

    /// Desktop kinds to subscribe to, including the lifecycle kinds that
    /// following needs, without duplicates.
    pub fn desktop_kinds(&self) -> Vec<DesktopEventKind> {
        let mut kinds = self.desktop.clone();
        if self.follow {
            kinds.extend([DesktopEventKind::AppLaunched, DesktopEventKind::AppTerminated]);
        }
        DesktopEventKind::ALL
            .into_iter()
            .filter(|k| kinds.contains(k))
            .collect()
    }
}
