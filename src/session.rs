//! The shell session: one explicitly owned record of process-wide state
//! handed to every component constructor.

use std::path::PathBuf;

use crate::APP_DIR;
use crate::config::{ConfigStore, get_config_path};
use crate::update::Version;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Windows,
    Linux,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Platform::MacOs
        } else if cfg!(target_os = "windows") {
            Platform::Windows
        } else {
            Platform::Linux
        }
    }

    pub fn has_dock(self) -> bool {
        matches!(self, Platform::MacOs)
    }

    /// macOS shows text next to the menu bar icon.
    pub fn has_tray_title(self) -> bool {
        matches!(self, Platform::MacOs)
    }
}

#[derive(Debug, Clone)]
pub struct SessionPaths {
    pub config_file: PathBuf,
    pub log_file: PathBuf,
    pub update_dir: PathBuf,
    /// Per-user single-instance lock.
    pub lock_file: PathBuf,
}

impl SessionPaths {
    pub fn from_user_dirs() -> Self {
        let data = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR);
        let cache = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR);
        Self {
            config_file: get_config_path(),
            log_file: data.join("logs").join("shell.log"),
            update_dir: cache.join("updates"),
            lock_file: data.join("instance.lock"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ShellSession {
    pub config: ConfigStore,
    pub platform: Platform,
    pub launch_minimized: bool,
    pub version: Version,
    pub paths: SessionPaths,
    /// Unity-style launcher counter available.
    pub unity_launcher: bool,
}

impl ShellSession {
    pub fn new(config: ConfigStore, paths: SessionPaths, force_minimized: bool) -> Self {
        let launch_minimized = force_minimized || config.get(|c| c.launch_minimized);
        let desktop = std::env::var("XDG_CURRENT_DESKTOP").ok();
        Self {
            config,
            platform: Platform::current(),
            launch_minimized,
            version: Version::current(),
            paths,
            unity_launcher: is_unity_desktop(desktop.as_deref()),
        }
    }
}

/// `XDG_CURRENT_DESKTOP` is a colon-separated list; Unity may appear anywhere in it.
pub fn is_unity_desktop(xdg_current_desktop: Option<&str>) -> bool {
    xdg_current_desktop
        .map(|value| value.split(':').any(|name| name.eq_ignore_ascii_case("unity")))
        .unwrap_or(false)
}
