//! macOS notifications using terminal-notifier

use std::path::Path;
use std::process::Command;

use log::{debug, warn};

use crate::model::{Notification, NotificationAction};
use crate::update::relaunch::RELAUNCH_FLAG;
use crate::utils::find_command;

const BUNDLE_ID: &str = "io.github.inbox-shell";

pub fn show_notification(notification: &Notification, log_file: &Path) {
    let cmd = find_command("terminal-notifier");
    // find_command falls back to the bare name when nothing is installed
    if !Path::new(cmd).exists() && Command::new(cmd).arg("-help").output().is_err() {
        debug!("terminal-notifier not available, dropping {:?}", notification.title);
        return;
    }

    let exe = std::env::current_exe().ok();
    let args = notifier_args(notification, log_file, exe.as_deref());
    if let Err(err) = Command::new(cmd).args(&args).spawn() {
        warn!("Failed to show notification: {}", err);
    }
}

/// Clicking a relaunch notification starts a second launch with the relaunch
/// flag, which the running instance receives as forwarded arguments.
fn notifier_args(notification: &Notification, log_file: &Path, exe: Option<&Path>) -> Vec<String> {
    let mut args = vec![
        "-title".to_string(),
        notification.title.clone(),
        "-message".to_string(),
        notification.body.clone(),
        "-sender".to_string(),
        BUNDLE_ID.to_string(),
    ];
    match (notification.action, exe) {
        (Some(NotificationAction::ViewLogs), _) => {
            args.push("-open".to_string());
            args.push(format!("file://{}", log_file.display()));
        }
        (Some(NotificationAction::RelaunchToUpdate), Some(exe)) => {
            args.push("-execute".to_string());
            args.push(format!("{} {}", shell_quote(&exe.to_string_lossy()), RELAUNCH_FLAG));
        }
        (Some(NotificationAction::RelaunchToUpdate), None) => {
            warn!("Executable path unknown, relaunch notification has no action");
        }
        (None, _) => {}
    }
    args
}

/// Single-quotes `text` for `/bin/sh`.
fn shell_quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', r"'\''"))
}
