//! Windows toast notifications using PowerShell

use std::path::Path;

use log::{debug, warn};

use crate::APP_NAME;
use crate::model::{Notification, NotificationAction};
use crate::update::relaunch::RELAUNCH_URL;
use crate::utils::hidden_command;

const TOAST_APP_ID: &str = "InboxShell.App";
const PROTOCOL_KEY: &str = r"HKCU\Software\Classes\inbox-shell";

pub fn show_notification(notification: &Notification, log_file: &Path) {
    if notification.action == Some(NotificationAction::RelaunchToUpdate) {
        register_relaunch_protocol();
    }
    let script = toast_script(notification, log_file);
    // Fire and forget, hidden to prevent console flicker
    if let Err(err) = hidden_command("powershell")
        .args([
            "-NoProfile",
            "-NonInteractive",
            "-WindowStyle",
            "Hidden",
            "-Command",
            &script,
        ])
        .spawn()
    {
        warn!("Failed to show notification: {}", err);
    }
}

/// Points the per-user `inbox-shell:` URL scheme at this executable so the
/// toast's relaunch button starts a second launch that gets forwarded.
fn register_relaunch_protocol() {
    let exe = match std::env::current_exe() {
        Ok(exe) => exe,
        Err(err) => {
            warn!("Executable path unknown, relaunch button will not work: {}", err);
            return;
        }
    };
    for args in protocol_registration(&exe) {
        match hidden_command("reg").args(&args).status() {
            Ok(status) if status.success() => {}
            Ok(status) => warn!("Registering relaunch URL scheme failed: {}", status),
            Err(err) => warn!("Registering relaunch URL scheme failed: {}", err),
        }
    }
    debug!("Relaunch URL scheme points at {:?}", exe);
}

fn protocol_registration(exe: &Path) -> Vec<Vec<String>> {
    let label = format!("URL:{} relaunch", APP_NAME);
    let command_key = format!(r"{}\shell\open\command", PROTOCOL_KEY);
    let open_command = format!("\"{}\" \"%1\"", exe.display());
    [
        vec![PROTOCOL_KEY, "/ve", "/d", label.as_str()],
        vec![PROTOCOL_KEY, "/v", "URL Protocol", "/d", ""],
        vec![command_key.as_str(), "/ve", "/d", open_command.as_str()],
    ]
    .into_iter()
    .map(|rest| {
        std::iter::once("add")
            .chain(rest)
            .chain(["/f"])
            .map(str::to_string)
            .collect()
    })
    .collect()
}

/// Escapes text for the XML template inside a single-quoted here-string.
fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn toast_script(notification: &Notification, log_file: &Path) -> String {
    // Protocol activation works without a callback into this process.
    let actions = match notification.action {
        Some(NotificationAction::ViewLogs) => format!(
            r#"<actions><action activationType="protocol" content="View logs" arguments="{}" /></actions>"#,
            escape(&format!("file:///{}", log_file.display()))
        ),
        Some(NotificationAction::RelaunchToUpdate) => format!(
            r#"<actions><action activationType="protocol" content="Restart to Update" arguments="{}" /></actions>"#,
            escape(RELAUNCH_URL)
        ),
        None => String::new(),
    };

    format!(
        r#"
$ErrorActionPreference = 'SilentlyContinue'
[Windows.UI.Notifications.ToastNotificationManager, Windows.UI.Notifications, ContentType = WindowsRuntime] | Out-Null
[Windows.Data.Xml.Dom.XmlDocument, Windows.Data.Xml.Dom.XmlDocument, ContentType = WindowsRuntime] | Out-Null

$template = @'
<toast>
    <visual>
        <binding template="ToastGeneric">
            <text>{title}</text>
            <text>{body}</text>
            <text placement="attribution">{app}</text>
        </binding>
    </visual>
    {actions}
</toast>
'@

$xml = New-Object Windows.Data.Xml.Dom.XmlDocument
$xml.LoadXml($template)
$toast = [Windows.UI.Notifications.ToastNotification]::new($xml)
[Windows.UI.Notifications.ToastNotificationManager]::CreateToastNotifier('{app_id}').Show($toast)
"#,
        title = escape(&notification.title),
        body = escape(&notification.body),
        app = escape(APP_NAME),
        actions = actions,
        app_id = TOAST_APP_ID,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup_in_text() {
        assert_eq!(escape("<b>'a' & \"b\"</b>"), "&lt;b&gt;&apos;a&apos; &amp; &quot;b&quot;&lt;/b&gt;");
    }

    #[test]
    fn view_logs_adds_protocol_action() {
        let note = Notification::new("Check for updates failed", "View the logs for more information")
            .with_action(NotificationAction::ViewLogs);
        let script = toast_script(&note, Path::new(r"C:\logs\shell.log"));
        assert!(script.contains(r#"activationType="protocol""#));
        assert!(script.contains("shell.log"));

        let plain = toast_script(&Notification::new("a", "b"), Path::new("x"));
        assert!(!plain.contains("<actions>"));
    }

    #[test]
    fn relaunch_button_activates_the_relaunch_url() {
        let note = Notification::new("Update ready", "Restart to apply 1.1.0")
            .with_action(NotificationAction::RelaunchToUpdate);
        let script = toast_script(&note, Path::new("x"));
        assert!(script.contains(
            r#"<action activationType="protocol" content="Restart to Update" arguments="inbox-shell://relaunch-to-update" />"#
        ));
    }

    #[test]
    fn relaunch_scheme_opens_this_executable() {
        let commands = protocol_registration(Path::new(r"C:\Apps\inbox-shell.exe"));
        assert_eq!(commands.len(), 3);
        assert!(commands.iter().all(|c| c[0] == "add" && c.last().map(String::as_str) == Some("/f")));
        assert_eq!(commands[1][1..5], ["HKCU\\Software\\Classes\\inbox-shell", "/v", "URL Protocol", "/d"]);
        assert_eq!(
            commands[2][1..],
            [
                r"HKCU\Software\Classes\inbox-shell\shell\open\command",
                "/ve",
                "/d",
                r#""C:\Apps\inbox-shell.exe" "%1""#,
                "/f"
            ]
        );
    }
}
