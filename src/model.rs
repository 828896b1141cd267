use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::update::CheckOutcome;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bounds {
    #[serde(default)]
    pub x: Option<i32>,
    #[serde(default)]
    pub y: Option<i32>,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
}

fn default_width() -> u32 {
    800
}

fn default_height() -> u32 {
    600
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            x: None,
            y: None,
            width: default_width(),
            height: default_height(),
        }
    }
}

/// Geometry of the main window, written on every close and read once at startup.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WindowState {
    #[serde(default)]
    pub bounds: Bounds,
    #[serde(default)]
    pub fullscreen: bool,
    #[serde(default)]
    pub maximized: bool,
}

/// Persisted theme preference: `"system"`, `true` (dark) or `false` (light).
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(try_from = "DarkModeRepr", into = "DarkModeRepr")]
pub enum DarkMode {
    System,
    Dark,
    Light,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum DarkModeRepr {
    Flag(bool),
    Named(String),
}

impl TryFrom<DarkModeRepr> for DarkMode {
    type Error = String;

    fn try_from(repr: DarkModeRepr) -> Result<Self, Self::Error> {
        match repr {
            DarkModeRepr::Flag(true) => Ok(DarkMode::Dark),
            DarkModeRepr::Flag(false) => Ok(DarkMode::Light),
            DarkModeRepr::Named(name) if name == "system" => Ok(DarkMode::System),
            DarkModeRepr::Named(name) => Err(format!("unknown dark mode '{}'", name)),
        }
    }
}

impl From<DarkMode> for DarkModeRepr {
    fn from(mode: DarkMode) -> Self {
        match mode {
            DarkMode::System => DarkModeRepr::Named("system".to_string()),
            DarkMode::Dark => DarkModeRepr::Flag(true),
            DarkMode::Light => DarkModeRepr::Flag(false),
        }
    }
}

impl DarkMode {
    /// Whether pages should render dark, given the OS appearance.
    pub fn is_dark(self, os_prefers_dark: bool) -> bool {
        match self {
            DarkMode::System => os_prefers_dark,
            DarkMode::Dark => true,
            DarkMode::Light => false,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseChannel {
    #[default]
    Stable,
    Dev,
}

impl ReleaseChannel {
    pub fn allows_prerelease(self) -> bool {
        matches!(self, ReleaseChannel::Dev)
    }

    pub fn from_prerelease_flag(allow_prerelease: bool) -> Self {
        if allow_prerelease {
            ReleaseChannel::Dev
        } else {
            ReleaseChannel::Stable
        }
    }
}

impl fmt::Display for ReleaseChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReleaseChannel::Stable => write!(f, "stable"),
            ReleaseChannel::Dev => write!(f, "dev"),
        }
    }
}

/// In-page navigation shortcuts reachable from the dock and tray.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PageCommand {
    Compose,
    Inbox,
    Snoozed,
    Sent,
    AllMail,
}

impl PageCommand {
    pub const ALL: [PageCommand; 5] = [
        PageCommand::Compose,
        PageCommand::Inbox,
        PageCommand::Snoozed,
        PageCommand::Sent,
        PageCommand::AllMail,
    ];

    pub fn channel(self) -> &'static str {
        match self {
            PageCommand::Compose => "compose",
            PageCommand::Inbox => "inbox",
            PageCommand::Snoozed => "snoozed",
            PageCommand::Sent => "sent",
            PageCommand::AllMail => "all-mail",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PageCommand::Compose => "Compose",
            PageCommand::Inbox => "Inbox",
            PageCommand::Snoozed => "Snoozed",
            PageCommand::Sent => "Sent",
            PageCommand::AllMail => "All Mail",
        }
    }

    /// Element clicked in the page to perform the command.
    pub fn selector(self) -> &'static str {
        match self {
            PageCommand::Compose => r#"div[gh="cm"]"#,
            PageCommand::Inbox => r"#\:3d",
            PageCommand::Snoozed => r"#\:3f",
            PageCommand::Sent => r"#\:3i",
            PageCommand::AllMail => r"#\:3l",
        }
    }

    pub fn from_channel(channel: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|cmd| cmd.channel() == channel)
    }
}

/// Show/Hide tray entries. Exactly one of the two is visible.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrayMenuVisibility {
    pub show_item: bool,
    pub hide_item: bool,
}

impl TrayMenuVisibility {
    pub fn for_window(window_visible: bool) -> Self {
        Self {
            show_item: !window_visible,
            hide_item: window_visible,
        }
    }
}

/// Everything the tray context menu is rebuilt from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrayMenuModel {
    pub visibility: TrayMenuVisibility,
    pub channel: ReleaseChannel,
    pub update_staged: bool,
    /// `Some` on platforms with a dock icon toggle.
    pub show_dock_icon: Option<bool>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MenuAction {
    ShowWindow,
    HideWindow,
    Page(PageCommand),
    CheckForUpdates,
    SwitchChannel(ReleaseChannel),
    RelaunchToUpdate,
    ViewLogs,
    ToggleDockIcon,
    Quit,
}

/// Identifies a webview window: the single main window or a compose satellite.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WindowRole {
    Main,
    Satellite(u64),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfirmAnswer {
    Open,
    OpenAndTrust,
    Cancel,
}

/// Events posted to the native event loop from callbacks and worker threads.
#[derive(Debug)]
pub enum UserEvent {
    MenuAction(MenuAction),
    TrayClicked,
    SecondInstance(Vec<String>),
    OpenUrl(String),
    NewWindowRequested { url: String },
    PageLoaded { role: WindowRole, url: String },
    PageIpc { role: WindowRole, body: String },
    QueryElement { role: WindowRole, selector: String },
    ElementAnswered { role: WindowRole, selector: String, present: bool },
    ExternalLinkAnswered { url: String, origin: String, answer: ConfirmAnswer },
    DarkModeChosen(Option<DarkMode>),
    UpdateTick,
    UpdateChecked { generation: u64, outcome: Result<CheckOutcome, String> },
    ConfigReloaded,
    ConfigReloadFailed(String),
}

/// Fire-and-forget OS notification with an optional follow-up action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub action: Option<NotificationAction>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotificationAction {
    RelaunchToUpdate,
    ViewLogs,
}

impl Notification {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            action: None,
        }
    }

    pub fn with_action(mut self, action: NotificationAction) -> Self {
        self.action = Some(action);
        self
    }
}

/// A downloaded build waiting for a relaunch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StagedUpdate {
    pub version: String,
    pub path: PathBuf,
}
