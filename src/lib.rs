pub const APP_NAME: &str = "Inbox Shell";
/// Directory name under the per-user config, data and cache dirs.
pub const APP_DIR: &str = "inbox-shell";

pub mod bridge;
pub mod config;
pub mod dispatch;
pub mod ipc;
pub mod logging;
pub mod model;
pub mod navigation;
pub mod session;
pub mod shell;
pub mod single_instance;
pub mod update;
pub mod window;

// Native runtime: event loop, webviews, tray
#[cfg(any(target_os = "macos", target_os = "windows"))]
pub mod app;
#[cfg(any(target_os = "macos", target_os = "windows"))]
pub use app::run;

#[cfg(any(target_os = "macos", target_os = "windows"))]
pub mod utils;

// Platform abstraction layer
#[cfg(any(target_os = "macos", target_os = "windows"))]
pub mod platform;

// UI modules (cross-platform)
pub mod ui {
    pub mod icon;
    #[cfg(any(target_os = "macos", target_os = "windows"))]
    pub mod menu;
}

#[cfg(any(target_os = "macos", target_os = "windows"))]
pub mod notify {
    pub use crate::platform::current::notify::*;
}
