use anyhow::Result;
use tray_icon::menu::{CheckMenuItem, Menu, MenuId, MenuItem, PredefinedMenuItem, Submenu};

use crate::APP_NAME;
use crate::model::{MenuAction, PageCommand, ReleaseChannel, TrayMenuModel};

const MENU_ID_SHOW: &str = "show-win";
const MENU_ID_HIDE: &str = "hide-win";
const MENU_ID_CHECK_UPDATES: &str = "check-updates";
const MENU_ID_CHANNEL_PREFIX: &str = "channel_";
const MENU_ID_RELAUNCH: &str = "relaunch-to-update";
const MENU_ID_VIEW_LOGS: &str = "view-logs";
const MENU_ID_DOCK_ICON: &str = "toggle-dock-icon";
const MENU_ID_PAGE_PREFIX: &str = "page_";
const MENU_ID_QUIT: &str = "quit";

/// Rebuilt whole on every change; muda items cannot be hidden individually.
pub fn build_tray_menu(model: &TrayMenuModel) -> Result<Menu> {
    let menu = Menu::new();

    if model.visibility.show_item {
        menu.append(&MenuItem::with_id(MENU_ID_SHOW, format!("Show {}", APP_NAME), true, None))?;
    }
    if model.visibility.hide_item {
        menu.append(&MenuItem::with_id(MENU_ID_HIDE, format!("Hide {}", APP_NAME), true, None))?;
    }
    menu.append(&PredefinedMenuItem::separator())?;

    let mail = Submenu::new("Mail", true);
    for (index, command) in PageCommand::ALL.into_iter().enumerate() {
        mail.append(&MenuItem::with_id(page_menu_id(command), command.label(), true, None))?;
        if index == 0 {
            mail.append(&PredefinedMenuItem::separator())?;
        }
    }
    menu.append(&mail)?;

    let updates = Submenu::new("Updates", true);
    updates.append(&MenuItem::with_id(
        MENU_ID_CHECK_UPDATES,
        "Check for Updates...",
        true,
        None,
    ))?;
    updates.append(&PredefinedMenuItem::separator())?;
    for (channel, label) in [
        (ReleaseChannel::Stable, "Stable Channel"),
        (ReleaseChannel::Dev, "Dev Channel"),
    ] {
        updates.append(&CheckMenuItem::with_id(
            channel_menu_id(channel),
            label,
            true,
            model.channel == channel,
            None,
        ))?;
    }
    if model.update_staged {
        updates.append(&PredefinedMenuItem::separator())?;
        updates.append(&MenuItem::with_id(MENU_ID_RELAUNCH, "Restart to Update", true, None))?;
    }
    menu.append(&updates)?;

    menu.append(&MenuItem::with_id(MENU_ID_VIEW_LOGS, "View Logs", true, None))?;

    if let Some(dock_visible) = model.show_dock_icon {
        menu.append(&CheckMenuItem::with_id(
            MENU_ID_DOCK_ICON,
            "Show Dock Icon",
            true,
            dock_visible,
            None,
        ))?;
    }

    menu.append(&PredefinedMenuItem::separator())?;
    menu.append(&MenuItem::with_id(MENU_ID_QUIT, "Quit", true, None))?;
    Ok(menu)
}

/// Dock menu: the mail commands, each showing the window before it runs.
pub fn build_dock_menu() -> Result<Menu> {
    let menu = Menu::new();
    for (id, label) in dock_menu_entries() {
        menu.append(&MenuItem::with_id(id, label, true, None))?;
    }
    Ok(menu)
}

fn dock_menu_entries() -> Vec<(String, &'static str)> {
    PageCommand::ALL
        .into_iter()
        .map(|command| (page_menu_id(command), command.label()))
        .collect()
}

pub fn page_menu_id(command: PageCommand) -> String {
    format!("{}{}", MENU_ID_PAGE_PREFIX, command.channel())
}

pub fn channel_menu_id(channel: ReleaseChannel) -> String {
    format!("{}{}", MENU_ID_CHANNEL_PREFIX, channel)
}

pub fn parse_menu_action(id: &MenuId) -> Option<MenuAction> {
    let raw = id.as_ref();
    match raw {
        MENU_ID_SHOW => Some(MenuAction::ShowWindow),
        MENU_ID_HIDE => Some(MenuAction::HideWindow),
        MENU_ID_CHECK_UPDATES => Some(MenuAction::CheckForUpdates),
        MENU_ID_RELAUNCH => Some(MenuAction::RelaunchToUpdate),
        MENU_ID_VIEW_LOGS => Some(MenuAction::ViewLogs),
        MENU_ID_DOCK_ICON => Some(MenuAction::ToggleDockIcon),
        MENU_ID_QUIT => Some(MenuAction::Quit),
        _ => {
            if let Some(rest) = raw.strip_prefix(MENU_ID_PAGE_PREFIX) {
                PageCommand::from_channel(rest).map(MenuAction::Page)
            } else if let Some(rest) = raw.strip_prefix(MENU_ID_CHANNEL_PREFIX) {
                match rest {
                    "stable" => Some(MenuAction::SwitchChannel(ReleaseChannel::Stable)),
                    "dev" => Some(MenuAction::SwitchChannel(ReleaseChannel::Dev)),
                    _ => None,
                }
            } else {
                None
            }
        }
    }
}
