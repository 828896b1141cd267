//! Typed channel between the shell and the hosted page.
//!
//! Page → shell messages arrive as JSON `{"channel": ..., "payload": ...}`
//! through the webview IPC handler. Shell → page messages are delivered by
//! evaluating a call into the injected page script.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::bridge::UNREAD_POLL_INTERVAL;
use crate::model::PageCommand;

const PAGE_SCRIPT: &str = include_str!("../assets/page.js");

/// Script injected into every webview before page scripts run.
pub fn page_script() -> String {
    PAGE_SCRIPT.replace(
        "__UNREAD_POLL_MS__",
        &UNREAD_POLL_INTERVAL.as_millis().to_string(),
    )
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "channel", content = "payload", rename_all = "kebab-case")]
pub enum PageMessage {
    UnreadCount(u32),
    /// Query for the current theme, answered with [`ShellMessage::DarkMode`].
    DarkMode,
    /// Sent by satellite windows once the handled message was archived or deleted.
    CloseWindow,
    Diagnostic(String),
}

impl PageMessage {
    pub fn parse(body: &str) -> Result<Self> {
        serde_json::from_str(body).with_context(|| format!("unrecognised page message: {}", body))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellMessage {
    /// Theme changed; broadcast to every window.
    DarkModeUpdated(bool),
    /// Answer to a [`PageMessage::DarkMode`] query.
    DarkMode(bool),
    SetCustomStyle { key: String, enabled: bool },
    SetFullScreen(bool),
    Command(PageCommand),
}

impl ShellMessage {
    pub fn channel(&self) -> &'static str {
        match self {
            ShellMessage::DarkModeUpdated(_) => "dark-mode:updated",
            ShellMessage::DarkMode(_) => "dark-mode",
            ShellMessage::SetCustomStyle { .. } => "set-custom-style",
            ShellMessage::SetFullScreen(_) => "set-full-screen",
            ShellMessage::Command(command) => command.channel(),
        }
    }

    pub fn payload(&self) -> Value {
        match self {
            ShellMessage::DarkModeUpdated(dark) | ShellMessage::DarkMode(dark) => json!(dark),
            ShellMessage::SetCustomStyle { key, enabled } => json!({ "key": key, "enabled": enabled }),
            ShellMessage::SetFullScreen(enabled) => json!(enabled),
            ShellMessage::Command(command) => json!({ "selector": command.selector() }),
        }
    }

    /// JavaScript that hands this message to the page script.
    pub fn to_script(&self) -> String {
        // A JSON string literal is a valid JS string literal.
        let channel = Value::String(self.channel().to_string());
        format!(
            "window.__shell && window.__shell.receive({}, {});",
            channel,
            self.payload()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_page_messages() {
        assert_eq!(
            PageMessage::parse(r#"{"channel":"unread-count","payload":7}"#).unwrap(),
            PageMessage::UnreadCount(7)
        );
        assert_eq!(
            PageMessage::parse(r#"{"channel":"dark-mode"}"#).unwrap(),
            PageMessage::DarkMode
        );
        assert_eq!(
            PageMessage::parse(r#"{"channel":"close-window"}"#).unwrap(),
            PageMessage::CloseWindow
        );
        assert_eq!(
            PageMessage::parse(r#"{"channel":"diagnostic","payload":"boom"}"#).unwrap(),
            PageMessage::Diagnostic("boom".into())
        );
    }

    #[test]
    fn page_script_reports_unread_changes_itself() {
        let script = page_script();
        assert!(!script.contains("__UNREAD_POLL_MS__"));
        assert!(script.contains("setInterval(updateUnreadCount, 1000)"));
        assert!(script.contains("new MutationObserver(updateUnreadCount)"));
        assert!(script.contains("send('unread-count', count)"));
        assert!(script.contains("count !== lastUnread"));
    }

    #[test]
    fn rejects_unknown_or_mistyped_messages() {
        assert!(PageMessage::parse(r#"{"channel":"open-devtools"}"#).is_err());
        assert!(PageMessage::parse(r#"{"channel":"unread-count","payload":-1}"#).is_err());
        assert!(PageMessage::parse("unread-count:3").is_err());
    }

    #[test]
    fn shell_messages_render_as_receive_calls() {
        assert_eq!(
            ShellMessage::DarkModeUpdated(true).to_script(),
            r#"window.__shell && window.__shell.receive("dark-mode:updated", true);"#
        );
        assert_eq!(
            ShellMessage::SetCustomStyle {
                key: "hide-footer".into(),
                enabled: false
            }
            .to_script(),
            r#"window.__shell && window.__shell.receive("set-custom-style", {"enabled":false,"key":"hide-footer"});"#
        );
    }

    #[test]
    fn commands_carry_their_selector() {
        let message = ShellMessage::Command(PageCommand::Compose);
        assert_eq!(message.channel(), "compose");
        assert_eq!(message.payload(), json!({ "selector": r#"div[gh="cm"]"# }));
        assert!(message.to_script().contains(r#""selector":"div[gh=\"cm\"]""#));
    }

    #[test]
    fn page_script_is_embedded() {
        assert!(PAGE_SCRIPT.contains("__shell"));
        assert!(PAGE_SCRIPT.contains("postMessage"));
    }
}
