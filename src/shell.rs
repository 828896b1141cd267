//! The shell core: owns the main window state machine, the update
//! orchestrator and the unread gate, reacts to [`ShellEvent`]s through the
//! dispatch table and queues [`Effect`]s for the native runtime to perform.

use std::path::PathBuf;

use anyhow::Result;
use log::{debug, error, info, warn};

use crate::bridge::{CLOSE_BUTTON_SELECTORS, UnreadGate, wants_close_buttons};
use crate::dispatch::{DispatchTable, ShellEventKind, unexpected};
use crate::ipc::{PageMessage, ShellMessage};
use crate::model::{
    ConfirmAnswer, DarkMode, MenuAction, Notification, PageCommand, ReleaseChannel, StagedUpdate,
    WindowRole,
};
use crate::navigation::{
    ExternalLinkPolicy, NavigationDecision, classify, compose_url, external_link_policy,
    is_mailto, resolve_confirmation,
};
use crate::session::ShellSession;
use crate::update::relaunch::is_relaunch_request;
use crate::update::{CheckOutcome, CheckRequest, UpdateOrchestrator, UpdateSignal};
use crate::window::{CloseOutcome, MainWindow, Surfaces};

#[derive(Debug)]
pub enum ShellEvent {
    ShowRequested,
    HideRequested,
    Minimized,
    Restored,
    CloseRequested,
    SecondInstance(Vec<String>),
    OpenUrl(String),
    NewWindowRequested { url: String, current_url: String },
    ExternalLinkAnswered { url: String, origin: String, answer: ConfirmAnswer },
    PageMessage { window: WindowRole, message: PageMessage },
    PageLoaded { window: WindowRole, url: String },
    /// OS appearance changed; `true` when it prefers dark.
    ThemeChanged(bool),
    FullScreenChanged(bool),
    UpdateTick,
    CheckForUpdates,
    SwitchChannel(ReleaseChannel),
    UpdateChecked { generation: u64, outcome: Result<CheckOutcome, String> },
    RelaunchToUpdate,
    ViewLogs,
    PageCommand(PageCommand),
    ToggleDockIcon,
    /// Answer to the first-run theme prompt; `None` means "ask again later".
    DarkModeChosen(Option<DarkMode>),
    SatelliteClosed(u64),
    ConfigReloaded,
    Quit,
}

impl ShellEvent {
    pub fn kind(&self) -> ShellEventKind {
        match self {
            ShellEvent::ShowRequested => ShellEventKind::ShowRequested,
            ShellEvent::HideRequested => ShellEventKind::HideRequested,
            ShellEvent::Minimized => ShellEventKind::Minimized,
            ShellEvent::Restored => ShellEventKind::Restored,
            ShellEvent::CloseRequested => ShellEventKind::CloseRequested,
            ShellEvent::SecondInstance(_) => ShellEventKind::SecondInstance,
            ShellEvent::OpenUrl(_) => ShellEventKind::OpenUrl,
            ShellEvent::NewWindowRequested { .. } => ShellEventKind::NewWindowRequested,
            ShellEvent::ExternalLinkAnswered { .. } => ShellEventKind::ExternalLinkAnswered,
            ShellEvent::PageMessage { .. } => ShellEventKind::PageMessage,
            ShellEvent::PageLoaded { .. } => ShellEventKind::PageLoaded,
            ShellEvent::ThemeChanged(_) => ShellEventKind::ThemeChanged,
            ShellEvent::FullScreenChanged(_) => ShellEventKind::FullScreenChanged,
            ShellEvent::UpdateTick => ShellEventKind::UpdateTick,
            ShellEvent::CheckForUpdates => ShellEventKind::CheckForUpdates,
            ShellEvent::SwitchChannel(_) => ShellEventKind::SwitchChannel,
            ShellEvent::UpdateChecked { .. } => ShellEventKind::UpdateChecked,
            ShellEvent::RelaunchToUpdate => ShellEventKind::RelaunchToUpdate,
            ShellEvent::ViewLogs => ShellEventKind::ViewLogs,
            ShellEvent::PageCommand(_) => ShellEventKind::PageCommand,
            ShellEvent::ToggleDockIcon => ShellEventKind::ToggleDockIcon,
            ShellEvent::DarkModeChosen(_) => ShellEventKind::DarkModeChosen,
            ShellEvent::SatelliteClosed(_) => ShellEventKind::SatelliteClosed,
            ShellEvent::ConfigReloaded => ShellEventKind::ConfigReloaded,
            ShellEvent::Quit => ShellEventKind::Quit,
        }
    }
}

impl From<MenuAction> for ShellEvent {
    fn from(action: MenuAction) -> Self {
        match action {
            MenuAction::ShowWindow => ShellEvent::ShowRequested,
            MenuAction::HideWindow => ShellEvent::HideRequested,
            MenuAction::Page(command) => ShellEvent::PageCommand(command),
            MenuAction::CheckForUpdates => ShellEvent::CheckForUpdates,
            MenuAction::SwitchChannel(channel) => ShellEvent::SwitchChannel(channel),
            MenuAction::RelaunchToUpdate => ShellEvent::RelaunchToUpdate,
            MenuAction::ViewLogs => ShellEvent::ViewLogs,
            MenuAction::ToggleDockIcon => ShellEvent::ToggleDockIcon,
            MenuAction::Quit => ShellEvent::Quit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageTarget {
    Main,
    All,
    Window(WindowRole),
}

/// Work the native runtime performs on behalf of the shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    LoadInMainWindow(String),
    OpenSatelliteWindow(String),
    OpenExternal(String),
    ConfirmExternalLink { url: String, origin: String },
    PostMessage { target: MessageTarget, message: ShellMessage },
    StartUpdateCheck(CheckRequest),
    Notify(Notification),
    Acknowledge(String),
    PromptDarkMode,
    ApplyTheme(DarkMode),
    Relaunch(StagedUpdate),
    OpenLogs(PathBuf),
    WatchCloseButtons { window: WindowRole, selectors: Vec<String> },
    CloseSatellite(u64),
    Exit,
}

pub struct Shell {
    session: ShellSession,
    window: MainWindow,
    updates: UpdateOrchestrator,
    unread: UnreadGate,
    os_prefers_dark: bool,
    effects: Vec<Effect>,
    table: DispatchTable,
}

impl Shell {
    pub fn new(session: ShellSession, surfaces: Surfaces, os_prefers_dark: bool) -> Self {
        let window = MainWindow::new(&session, surfaces, !session.launch_minimized);
        let updates = UpdateOrchestrator::new(&session);
        Self {
            session,
            window,
            updates,
            unread: UnreadGate::default(),
            os_prefers_dark,
            effects: Vec::new(),
            table: default_table(),
        }
    }

    pub fn session(&self) -> &ShellSession {
        &self.session
    }

    pub fn window(&self) -> &MainWindow {
        &self.window
    }

    pub fn updates(&self) -> &UpdateOrchestrator {
        &self.updates
    }

    /// One-time work after the native surfaces exist.
    pub fn start(&mut self) {
        match self.session.config.get(|c| c.dark_mode) {
            Some(mode) => self.effects.push(Effect::ApplyTheme(mode)),
            None => self.effects.push(Effect::PromptDarkMode),
        }
        let signals = self.updates.reconcile_on_startup();
        self.apply_update_signals(signals);
    }

    /// Runs the handler for `event`. Failures stay inside the handler boundary.
    pub fn handle(&mut self, event: ShellEvent) {
        let kind = event.kind();
        let result = self.table.handler(kind).and_then(|handler| handler(self, event));
        if let Err(err) = result {
            error!("Failed to handle {:?}: {:#}", kind, err);
        }
    }

    pub fn drain_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    fn is_dark(&self) -> bool {
        self.session
            .config
            .get(|c| c.dark_mode)
            .unwrap_or(DarkMode::System)
            .is_dark(self.os_prefers_dark)
    }

    fn post(&mut self, target: MessageTarget, message: ShellMessage) {
        self.effects.push(Effect::PostMessage { target, message });
    }

    fn apply_update_signals(&mut self, signals: Vec<UpdateSignal>) {
        for signal in signals {
            self.effects.push(match signal {
                UpdateSignal::Check(request) => Effect::StartUpdateCheck(request),
                UpdateSignal::Notify(note) => Effect::Notify(note),
                UpdateSignal::Acknowledge(text) => Effect::Acknowledge(text),
            });
        }
        self.window.set_update_staged(self.updates.staged().is_some());
        self.window
            .set_channel(self.session.config.get(|c| c.release_channel));
    }

    fn open_compose(&mut self, mailto: &str) {
        self.effects.push(Effect::OpenSatelliteWindow(compose_url(mailto)));
    }

    fn relaunch_to_update(&mut self) {
        match self.updates.staged().cloned() {
            Some(update) => {
                info!("Relaunching to apply {}", update.version);
                self.window.persist_geometry();
                self.effects.push(Effect::Relaunch(update));
            }
            None => warn!("Relaunch requested but no update is staged"),
        }
    }

    fn send_page_preferences(&mut self) {
        let styles = self.session.config.get(|c| c.custom_styles.clone());
        for (key, enabled) in styles {
            self.post(MessageTarget::Main, ShellMessage::SetCustomStyle { key, enabled });
        }
        let dark = self.is_dark();
        self.post(MessageTarget::Main, ShellMessage::DarkModeUpdated(dark));
    }
}

fn default_table() -> DispatchTable {
    let mut table = DispatchTable::new();
    table
        .register(ShellEventKind::ShowRequested, on_show)
        .register(ShellEventKind::HideRequested, on_hide)
        .register(ShellEventKind::Minimized, on_minimized)
        .register(ShellEventKind::Restored, on_restored)
        .register(ShellEventKind::CloseRequested, on_close)
        .register(ShellEventKind::SecondInstance, on_second_instance)
        .register(ShellEventKind::OpenUrl, on_open_url)
        .register(ShellEventKind::NewWindowRequested, on_new_window)
        .register(ShellEventKind::ExternalLinkAnswered, on_external_link_answered)
        .register(ShellEventKind::PageMessage, on_page_message)
        .register(ShellEventKind::PageLoaded, on_page_loaded)
        .register(ShellEventKind::ThemeChanged, on_theme_changed)
        .register(ShellEventKind::FullScreenChanged, on_full_screen_changed)
        .register(ShellEventKind::UpdateTick, on_update_tick)
        .register(ShellEventKind::CheckForUpdates, on_check_for_updates)
        .register(ShellEventKind::SwitchChannel, on_switch_channel)
        .register(ShellEventKind::UpdateChecked, on_update_checked)
        .register(ShellEventKind::RelaunchToUpdate, on_relaunch)
        .register(ShellEventKind::ViewLogs, on_view_logs)
        .register(ShellEventKind::PageCommand, on_page_command)
        .register(ShellEventKind::ToggleDockIcon, on_toggle_dock_icon)
        .register(ShellEventKind::DarkModeChosen, on_dark_mode_chosen)
        .register(ShellEventKind::SatelliteClosed, on_satellite_closed)
        .register(ShellEventKind::ConfigReloaded, on_config_reloaded)
        .register(ShellEventKind::Quit, on_quit);
    table
}

fn on_show(shell: &mut Shell, _: ShellEvent) -> Result<()> {
    shell.window.show();
    Ok(())
}

fn on_hide(shell: &mut Shell, _: ShellEvent) -> Result<()> {
    shell.window.hide();
    Ok(())
}

fn on_minimized(shell: &mut Shell, _: ShellEvent) -> Result<()> {
    shell.window.minimized();
    Ok(())
}

fn on_restored(shell: &mut Shell, _: ShellEvent) -> Result<()> {
    shell.window.restored();
    Ok(())
}

fn on_close(shell: &mut Shell, _: ShellEvent) -> Result<()> {
    if shell.window.request_close() == CloseOutcome::Terminate {
        shell.effects.push(Effect::Exit);
    }
    Ok(())
}

fn on_second_instance(shell: &mut Shell, event: ShellEvent) -> Result<()> {
    let ShellEvent::SecondInstance(args) = event else {
        return Err(unexpected(ShellEventKind::SecondInstance, &event));
    };
    shell.window.bring_to_front();
    for url in args.iter().filter(|arg| is_mailto(arg)) {
        shell.open_compose(url);
    }
    if args.iter().any(|arg| is_relaunch_request(arg)) {
        shell.relaunch_to_update();
    }
    Ok(())
}

fn on_open_url(shell: &mut Shell, event: ShellEvent) -> Result<()> {
    let ShellEvent::OpenUrl(url) = event else {
        return Err(unexpected(ShellEventKind::OpenUrl, &event));
    };
    info!("Opening compose window for {}", url);
    shell.open_compose(&url);
    Ok(())
}

fn on_new_window(shell: &mut Shell, event: ShellEvent) -> Result<()> {
    let ShellEvent::NewWindowRequested { url, current_url } = event else {
        return Err(unexpected(ShellEventKind::NewWindowRequested, &event));
    };
    match classify(&url, &current_url) {
        NavigationDecision::ContinueInWindow => {
            debug!("Loading {} in the main window", url);
            shell.effects.push(Effect::LoadInMainWindow(url));
        }
        NavigationDecision::StayInSession => {
            debug!("Same mailbox session, not opening {}", url);
        }
        NavigationDecision::DelegateToSystemBrowser => {
            let policy = shell.session.config.get(|c| external_link_policy(&url, c));
            match policy {
                ExternalLinkPolicy::Open(target) => shell.effects.push(Effect::OpenExternal(target)),
                ExternalLinkPolicy::Confirm { url, origin } => {
                    shell.effects.push(Effect::ConfirmExternalLink { url, origin })
                }
                ExternalLinkPolicy::Rejected => warn!("Refusing to open {:?}", url),
            }
        }
    }
    Ok(())
}

fn on_external_link_answered(shell: &mut Shell, event: ShellEvent) -> Result<()> {
    let ShellEvent::ExternalLinkAnswered { url, origin, answer } = event else {
        return Err(unexpected(ShellEventKind::ExternalLinkAnswered, &event));
    };
    if let Some(target) = resolve_confirmation(url, &origin, answer, &shell.session.config) {
        shell.effects.push(Effect::OpenExternal(target));
    }
    Ok(())
}

fn on_page_message(shell: &mut Shell, event: ShellEvent) -> Result<()> {
    let ShellEvent::PageMessage { window, message } = event else {
        return Err(unexpected(ShellEventKind::PageMessage, &event));
    };
    match message {
        // Satellites have no inbox label and would always report 0.
        PageMessage::UnreadCount(_) if window != WindowRole::Main => {}
        PageMessage::UnreadCount(count) => {
            if let Some(count) = shell.unread.observe(count) {
                debug!("Unread count is now {}", count);
                shell.window.set_unread(count);
            }
        }
        PageMessage::DarkMode => {
            let dark = shell.is_dark();
            shell.post(MessageTarget::Window(window), ShellMessage::DarkMode(dark));
        }
        PageMessage::CloseWindow => match window {
            WindowRole::Satellite(id) => shell.effects.push(Effect::CloseSatellite(id)),
            WindowRole::Main => debug!("Ignoring close request from the main window"),
        },
        PageMessage::Diagnostic(text) => info!("[page {:?}] {}", window, text),
    }
    Ok(())
}

fn on_page_loaded(shell: &mut Shell, event: ShellEvent) -> Result<()> {
    let ShellEvent::PageLoaded { window, url } = event else {
        return Err(unexpected(ShellEventKind::PageLoaded, &event));
    };
    match window {
        WindowRole::Main => shell.send_page_preferences(),
        WindowRole::Satellite(_) if wants_close_buttons(&url) => {
            shell.effects.push(Effect::WatchCloseButtons {
                window,
                selectors: CLOSE_BUTTON_SELECTORS.iter().map(|s| s.to_string()).collect(),
            });
        }
        WindowRole::Satellite(_) => {}
    }
    Ok(())
}

fn on_theme_changed(shell: &mut Shell, event: ShellEvent) -> Result<()> {
    let ShellEvent::ThemeChanged(os_dark) = event else {
        return Err(unexpected(ShellEventKind::ThemeChanged, &event));
    };
    let was_dark = shell.is_dark();
    shell.os_prefers_dark = os_dark;
    let dark = shell.is_dark();
    if dark != was_dark {
        shell.post(MessageTarget::All, ShellMessage::DarkModeUpdated(dark));
    }
    Ok(())
}

fn on_full_screen_changed(shell: &mut Shell, event: ShellEvent) -> Result<()> {
    let ShellEvent::FullScreenChanged(enabled) = event else {
        return Err(unexpected(ShellEventKind::FullScreenChanged, &event));
    };
    shell.post(MessageTarget::Main, ShellMessage::SetFullScreen(enabled));
    Ok(())
}

fn on_update_tick(shell: &mut Shell, _: ShellEvent) -> Result<()> {
    let signals = shell.updates.tick();
    shell.apply_update_signals(signals);
    Ok(())
}

fn on_check_for_updates(shell: &mut Shell, _: ShellEvent) -> Result<()> {
    let signals = shell.updates.check_now();
    shell.apply_update_signals(signals);
    Ok(())
}

fn on_switch_channel(shell: &mut Shell, event: ShellEvent) -> Result<()> {
    let ShellEvent::SwitchChannel(channel) = event else {
        return Err(unexpected(ShellEventKind::SwitchChannel, &event));
    };
    let signals = shell.updates.switch_channel(channel);
    shell.apply_update_signals(signals);
    Ok(())
}

fn on_update_checked(shell: &mut Shell, event: ShellEvent) -> Result<()> {
    let ShellEvent::UpdateChecked { generation, outcome } = event else {
        return Err(unexpected(ShellEventKind::UpdateChecked, &event));
    };
    let signals = shell.updates.on_check_result(generation, outcome);
    shell.apply_update_signals(signals);
    Ok(())
}

fn on_relaunch(shell: &mut Shell, _: ShellEvent) -> Result<()> {
    shell.relaunch_to_update();
    Ok(())
}

fn on_view_logs(shell: &mut Shell, _: ShellEvent) -> Result<()> {
    let path = shell.session.paths.log_file.clone();
    shell.effects.push(Effect::OpenLogs(path));
    Ok(())
}

fn on_page_command(shell: &mut Shell, event: ShellEvent) -> Result<()> {
    let ShellEvent::PageCommand(command) = event else {
        return Err(unexpected(ShellEventKind::PageCommand, &event));
    };
    shell.window.show();
    shell.post(MessageTarget::Main, ShellMessage::Command(command));
    Ok(())
}

fn on_toggle_dock_icon(shell: &mut Shell, _: ShellEvent) -> Result<()> {
    let visible = shell.session.config.get(|c| c.show_dock_icon);
    shell.window.set_dock_icon_visible(!visible);
    Ok(())
}

fn on_dark_mode_chosen(shell: &mut Shell, event: ShellEvent) -> Result<()> {
    let ShellEvent::DarkModeChosen(choice) = event else {
        return Err(unexpected(ShellEventKind::DarkModeChosen, &event));
    };
    let Some(mode) = choice else {
        debug!("Theme prompt dismissed, asking again next launch");
        return Ok(());
    };
    shell.session.config.set(|c| c.dark_mode = Some(mode));
    shell.effects.push(Effect::ApplyTheme(mode));
    let dark = shell.is_dark();
    shell.post(MessageTarget::All, ShellMessage::DarkModeUpdated(dark));
    Ok(())
}

fn on_satellite_closed(_: &mut Shell, event: ShellEvent) -> Result<()> {
    let ShellEvent::SatelliteClosed(id) = event else {
        return Err(unexpected(ShellEventKind::SatelliteClosed, &event));
    };
    debug!("Satellite window {} closed", id);
    Ok(())
}

fn on_config_reloaded(shell: &mut Shell, _: ShellEvent) -> Result<()> {
    info!("Configuration reloaded");
    let channel = shell.session.config.get(|c| c.release_channel);
    shell.window.set_channel(channel);
    if let Some(mode) = shell.session.config.get(|c| c.dark_mode) {
        shell.effects.push(Effect::ApplyTheme(mode));
    }
    shell.send_page_preferences();
    Ok(())
}

fn on_quit(shell: &mut Shell, _: ShellEvent) -> Result<()> {
    shell.window.persist_geometry();
    shell.effects.push(Effect::Exit);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::config::{Config, ConfigStore};
    use crate::model::NotificationAction;
    use crate::session::{Platform, SessionPaths};
    use crate::ui::icon::TrayIconKey;
    use crate::window::Visibility;
    use crate::window::fakes::{Shared, surfaces};

    fn shell_with(config: Config) -> (Shell, Shared) {
        let mut session = ShellSession::new(
            ConfigStore::in_memory(config),
            SessionPaths::from_user_dirs(),
            false,
        );
        session.platform = Platform::Windows;
        session.unity_launcher = false;
        session.version = "1.0.0".parse().unwrap();
        let (surfaces, recorder) = surfaces(true, false);
        (Shell::new(session, surfaces, false), recorder)
    }

    fn shell() -> (Shell, Shared) {
        shell_with(Config::default())
    }

    fn posted(effects: &[Effect]) -> Vec<(MessageTarget, ShellMessage)> {
        effects
            .iter()
            .filter_map(|effect| match effect {
                Effect::PostMessage { target, message } => Some((*target, message.clone())),
                _ => None,
            })
            .collect()
    }

    fn new_window(url: &str, current: &str) -> ShellEvent {
        ShellEvent::NewWindowRequested {
            url: url.to_string(),
            current_url: current.to_string(),
        }
    }

    #[test]
    fn every_event_kind_has_a_handler() {
        let table = default_table();
        let events = [
            ShellEvent::ShowRequested,
            ShellEvent::HideRequested,
            ShellEvent::Minimized,
            ShellEvent::Restored,
            ShellEvent::CloseRequested,
            ShellEvent::SecondInstance(vec![]),
            ShellEvent::OpenUrl(String::new()),
            new_window("", ""),
            ShellEvent::ExternalLinkAnswered {
                url: String::new(),
                origin: String::new(),
                answer: ConfirmAnswer::Cancel,
            },
            ShellEvent::PageMessage {
                window: WindowRole::Main,
                message: PageMessage::DarkMode,
            },
            ShellEvent::PageLoaded {
                window: WindowRole::Main,
                url: String::new(),
            },
            ShellEvent::ThemeChanged(true),
            ShellEvent::FullScreenChanged(true),
            ShellEvent::UpdateTick,
            ShellEvent::CheckForUpdates,
            ShellEvent::SwitchChannel(ReleaseChannel::Dev),
            ShellEvent::UpdateChecked {
                generation: 0,
                outcome: Ok(CheckOutcome::NoUpdate),
            },
            ShellEvent::RelaunchToUpdate,
            ShellEvent::ViewLogs,
            ShellEvent::PageCommand(PageCommand::Inbox),
            ShellEvent::ToggleDockIcon,
            ShellEvent::DarkModeChosen(None),
            ShellEvent::SatelliteClosed(1),
            ShellEvent::ConfigReloaded,
            ShellEvent::Quit,
        ];
        for event in events {
            assert!(table.handles(event.kind()), "{:?}", event.kind());
        }
    }

    #[test]
    fn mismatched_event_is_reported_not_panicked() {
        let (mut shell, _) = shell();
        let handler = shell.table.handler(ShellEventKind::OpenUrl).unwrap();
        assert!(handler(&mut shell, ShellEvent::Quit).is_err());
    }

    #[test]
    fn tray_menu_actions_toggle_window() {
        let (mut shell, rec) = shell();
        shell.handle(MenuAction::HideWindow.into());
        assert_eq!(shell.window().visibility(), Visibility::Hidden);
        shell.handle(MenuAction::ShowWindow.into());
        assert_eq!(shell.window().visibility(), Visibility::Visible);
        let rec = rec.borrow();
        let last = rec.menus.last().unwrap();
        assert!(!last.visibility.show_item && last.visibility.hide_item);
    }

    #[test]
    fn launch_minimized_starts_hidden_with_show_item() {
        let (shell, _) = shell_with(Config {
            launch_minimized: true,
            ..Config::default()
        });
        assert_eq!(shell.window().visibility(), Visibility::Hidden);
        assert!(shell.window().menu().visibility.show_item);
    }

    #[test]
    fn close_terminates_unless_minimize_on_exit() {
        let (mut shell, _) = shell();
        shell.handle(ShellEvent::CloseRequested);
        assert_eq!(shell.drain_effects(), vec![Effect::Exit]);

        let (mut shell, _) = shell_with(Config {
            minimize_on_exit: true,
            ..Config::default()
        });
        shell.handle(ShellEvent::CloseRequested);
        assert!(shell.drain_effects().is_empty());
        assert_eq!(shell.window().visibility(), Visibility::Hidden);
    }

    #[test]
    fn account_switch_loads_in_main_window() {
        let (mut shell, _) = shell();
        shell.handle(new_window(
            "https://mail.google.com/mail/u/1/#inbox",
            "https://mail.google.com/mail/u/0/#inbox",
        ));
        assert_eq!(
            shell.drain_effects(),
            vec![Effect::LoadInMainWindow("https://mail.google.com/mail/u/1/#inbox".into())]
        );
    }

    #[test]
    fn same_account_opens_nothing() {
        let (mut shell, _) = shell();
        shell.handle(new_window(
            "https://mail.google.com/mail/u/0/#sent",
            "https://mail.google.com/mail/u/0/#inbox",
        ));
        assert!(shell.drain_effects().is_empty());
    }

    #[test]
    fn trusted_origin_skips_confirmation_after_open_and_trust() {
        let (mut shell, _) = shell();
        let current = "https://mail.google.com/mail/u/0/";
        shell.handle(new_window("https://example.com", current));
        let effects = shell.drain_effects();
        let [Effect::ConfirmExternalLink { url, origin }] = effects.as_slice() else {
            panic!("expected a confirmation, got {effects:?}");
        };

        shell.handle(ShellEvent::ExternalLinkAnswered {
            url: url.clone(),
            origin: origin.clone(),
            answer: ConfirmAnswer::OpenAndTrust,
        });
        assert_eq!(
            shell.drain_effects(),
            vec![Effect::OpenExternal("https://example.com".into())]
        );

        shell.handle(new_window("https://example.com/docs/page", current));
        assert_eq!(
            shell.drain_effects(),
            vec![Effect::OpenExternal("https://example.com/docs/page".into())]
        );
    }

    #[test]
    fn cancelled_external_link_goes_nowhere() {
        let (mut shell, _) = shell();
        shell.handle(ShellEvent::ExternalLinkAnswered {
            url: "https://example.com".into(),
            origin: "https://example.com".into(),
            answer: ConfirmAnswer::Cancel,
        });
        assert!(shell.drain_effects().is_empty());
        assert!(shell.session().config.get(|c| c.trusted_hosts.is_empty()));
    }

    #[test]
    fn open_url_always_opens_compose_satellite() {
        let (mut shell, _) = shell();
        shell.handle(ShellEvent::OpenUrl("mailto:a@b.com".into()));
        assert_eq!(
            shell.drain_effects(),
            vec![Effect::OpenSatelliteWindow(
                "https://mail.google.com/mail/?extsrc=mailto&url=mailto%3Aa%40b.com".into()
            )]
        );
    }

    #[test]
    fn second_instance_restores_and_forwards_mailto() {
        let (mut shell, rec) = shell();
        shell.handle(ShellEvent::Minimized);
        rec.borrow_mut().window_calls.clear();

        shell.handle(ShellEvent::SecondInstance(vec![
            "--launch-minimized".into(),
            "mailto:x@y.z".into(),
        ]));
        assert_eq!(shell.window().visibility(), Visibility::Visible);
        assert_eq!(rec.borrow().window_calls, vec!["restore", "show", "focus"]);
        let effects = shell.drain_effects();
        assert_eq!(effects.len(), 1);
        assert!(matches!(&effects[0], Effect::OpenSatelliteWindow(url) if url.contains("x%40y.z")));
    }

    #[test]
    fn repeated_unread_count_repaints_once() {
        let (mut shell, rec) = shell();
        let painted_before = rec.borrow().icons.len();
        let unread = |count| ShellEvent::PageMessage {
            window: WindowRole::Main,
            message: PageMessage::UnreadCount(count),
        };
        shell.handle(unread(4));
        shell.handle(unread(4));
        assert_eq!(rec.borrow().icons.len(), painted_before + 1);
        assert_eq!(rec.borrow().icons.last(), Some(&TrayIconKey::Unread(4)));

        shell.handle(unread(0));
        assert_eq!(rec.borrow().icons.last(), Some(&TrayIconKey::Base));
        assert_eq!(shell.window().unread(), 0);
    }

    #[test]
    fn satellite_unread_reports_do_not_touch_the_badge() {
        let (mut shell, _) = shell();
        shell.handle(ShellEvent::PageMessage {
            window: WindowRole::Main,
            message: PageMessage::UnreadCount(5),
        });
        shell.handle(ShellEvent::PageMessage {
            window: WindowRole::Satellite(1),
            message: PageMessage::UnreadCount(0),
        });
        assert_eq!(shell.window().unread(), 5);
    }

    #[test]
    fn dock_command_shows_window_then_dispatches() {
        let (mut shell, _) = shell();
        shell.handle(ShellEvent::HideRequested);
        shell.handle(MenuAction::Page(PageCommand::Snoozed).into());
        assert_eq!(shell.window().visibility(), Visibility::Visible);
        assert_eq!(
            posted(&shell.drain_effects()),
            vec![(MessageTarget::Main, ShellMessage::Command(PageCommand::Snoozed))]
        );
    }

    #[test]
    fn first_run_prompts_for_theme_and_persists_choice() {
        let (mut shell, _) = shell();
        shell.start();
        let effects = shell.drain_effects();
        assert!(effects.contains(&Effect::PromptDarkMode));

        shell.handle(ShellEvent::DarkModeChosen(Some(DarkMode::Dark)));
        let effects = shell.drain_effects();
        assert!(effects.contains(&Effect::ApplyTheme(DarkMode::Dark)));
        assert_eq!(
            posted(&effects),
            vec![(MessageTarget::All, ShellMessage::DarkModeUpdated(true))]
        );
        assert_eq!(shell.session().config.get(|c| c.dark_mode), Some(DarkMode::Dark));
    }

    #[test]
    fn os_theme_change_broadcasts_only_when_following_system() {
        let (mut shell, _) = shell_with(Config {
            dark_mode: Some(DarkMode::System),
            ..Config::default()
        });
        shell.handle(ShellEvent::ThemeChanged(true));
        assert_eq!(
            posted(&shell.drain_effects()),
            vec![(MessageTarget::All, ShellMessage::DarkModeUpdated(true))]
        );

        let (mut shell, _) = shell_with(Config {
            dark_mode: Some(DarkMode::Light),
            ..Config::default()
        });
        shell.handle(ShellEvent::ThemeChanged(true));
        assert!(shell.drain_effects().is_empty());
    }

    #[test]
    fn dark_mode_query_is_acknowledged_to_the_asking_window() {
        let (mut shell, _) = shell_with(Config {
            dark_mode: Some(DarkMode::Dark),
            ..Config::default()
        });
        shell.handle(ShellEvent::PageMessage {
            window: WindowRole::Satellite(3),
            message: PageMessage::DarkMode,
        });
        assert_eq!(
            posted(&shell.drain_effects()),
            vec![(
                MessageTarget::Window(WindowRole::Satellite(3)),
                ShellMessage::DarkMode(true)
            )]
        );
    }

    #[test]
    fn main_page_load_sends_styles_and_theme() {
        let mut styles = std::collections::BTreeMap::new();
        styles.insert("compact-header".to_string(), true);
        let (mut shell, _) = shell_with(Config {
            custom_styles: styles,
            ..Config::default()
        });
        shell.handle(ShellEvent::PageLoaded {
            window: WindowRole::Main,
            url: "https://mail.google.com/mail/u/0/".into(),
        });
        assert_eq!(
            posted(&shell.drain_effects()),
            vec![
                (
                    MessageTarget::Main,
                    ShellMessage::SetCustomStyle {
                        key: "compact-header".into(),
                        enabled: true
                    }
                ),
                (MessageTarget::Main, ShellMessage::DarkModeUpdated(false)),
            ]
        );
    }

    #[test]
    fn reply_satellite_watches_and_closes_on_button() {
        let (mut shell, _) = shell();
        shell.handle(ShellEvent::PageLoaded {
            window: WindowRole::Satellite(7),
            url: "https://mail.google.com/mail/u/0/?view=btop&search=inbox&th=1".into(),
        });
        assert!(matches!(
            shell.drain_effects().as_slice(),
            [Effect::WatchCloseButtons { window: WindowRole::Satellite(7), selectors }] if selectors.len() == 2
        ));

        shell.handle(ShellEvent::PageMessage {
            window: WindowRole::Satellite(7),
            message: PageMessage::CloseWindow,
        });
        assert_eq!(shell.drain_effects(), vec![Effect::CloseSatellite(7)]);
    }

    #[test]
    fn full_screen_is_forwarded_to_main_page() {
        let (mut shell, _) = shell();
        shell.handle(ShellEvent::FullScreenChanged(true));
        assert_eq!(
            posted(&shell.drain_effects()),
            vec![(MessageTarget::Main, ShellMessage::SetFullScreen(true))]
        );
    }

    fn check_request(effects: &[Effect]) -> CheckRequest {
        effects
            .iter()
            .find_map(|effect| match effect {
                Effect::StartUpdateCheck(request) => Some(request.clone()),
                _ => None,
            })
            .expect("an update check was started")
    }

    #[test]
    fn staged_update_flows_to_tray_and_relaunch() {
        let (mut shell, _) = shell();
        shell.handle(ShellEvent::UpdateTick);
        let request = check_request(&shell.drain_effects());
        let update = StagedUpdate {
            version: "1.1.0".into(),
            path: PathBuf::from("/tmp/inbox-shell-1.1.0.dmg"),
        };
        shell.handle(ShellEvent::UpdateChecked {
            generation: request.generation,
            outcome: Ok(CheckOutcome::Staged(update.clone())),
        });
        let effects = shell.drain_effects();
        assert!(matches!(
            effects.as_slice(),
            [Effect::Notify(note)] if note.action == Some(NotificationAction::RelaunchToUpdate)
        ));
        assert!(shell.window().menu().update_staged);

        shell.handle(MenuAction::RelaunchToUpdate.into());
        assert_eq!(shell.drain_effects(), vec![Effect::Relaunch(update)]);
    }

    #[test]
    fn notification_relaunch_arrives_as_second_launch() {
        let (mut shell, _) = shell();
        shell.handle(ShellEvent::SecondInstance(vec!["--relaunch-to-update".into()]));
        assert!(shell.drain_effects().is_empty());

        shell.handle(ShellEvent::UpdateTick);
        let request = check_request(&shell.drain_effects());
        let update = StagedUpdate {
            version: "1.1.0".into(),
            path: PathBuf::from("/tmp/inbox-shell-1.1.0.dmg"),
        };
        shell.handle(ShellEvent::UpdateChecked {
            generation: request.generation,
            outcome: Ok(CheckOutcome::Staged(update.clone())),
        });
        shell.drain_effects();

        shell.handle(ShellEvent::SecondInstance(vec![
            "inbox-shell://relaunch-to-update/".into(),
        ]));
        assert_eq!(shell.drain_effects(), vec![Effect::Relaunch(update)]);
    }

    #[test]
    fn channel_switch_while_staged_does_not_renotify_same_build() {
        let (mut shell, _) = shell();
        shell.handle(ShellEvent::CheckForUpdates);
        let request = check_request(&shell.drain_effects());
        let update = StagedUpdate {
            version: "1.1.0".into(),
            path: PathBuf::from("/tmp/inbox-shell-1.1.0.dmg"),
        };
        shell.handle(ShellEvent::UpdateChecked {
            generation: request.generation,
            outcome: Ok(CheckOutcome::Staged(update.clone())),
        });
        assert_eq!(shell.drain_effects().len(), 1);

        shell.handle(MenuAction::SwitchChannel(ReleaseChannel::Dev).into());
        let request = check_request(&shell.drain_effects());
        assert!(!shell.window().menu().update_staged);
        assert_eq!(shell.window().menu().channel, ReleaseChannel::Dev);

        shell.handle(ShellEvent::UpdateChecked {
            generation: request.generation,
            outcome: Ok(CheckOutcome::Staged(update)),
        });
        assert!(shell.drain_effects().is_empty());
        assert!(shell.window().menu().update_staged);
    }

    #[test]
    fn failed_check_offers_logs() {
        let (mut shell, _) = shell();
        shell.handle(ShellEvent::CheckForUpdates);
        let request = check_request(&shell.drain_effects());
        shell.handle(ShellEvent::UpdateChecked {
            generation: request.generation,
            outcome: Err("dns failure".into()),
        });
        assert!(matches!(
            shell.drain_effects().as_slice(),
            [Effect::Notify(note)] if note.action == Some(NotificationAction::ViewLogs)
        ));

        shell.handle(MenuAction::ViewLogs.into());
        assert_eq!(
            shell.drain_effects(),
            vec![Effect::OpenLogs(shell.session().paths.log_file.clone())]
        );
    }

    #[test]
    fn relaunch_without_staged_update_is_ignored() {
        let (mut shell, _) = shell();
        shell.handle(ShellEvent::RelaunchToUpdate);
        assert!(shell.drain_effects().is_empty());
    }

    #[test]
    fn quit_persists_geometry_and_exits() {
        let (mut shell, rec) = shell();
        rec.borrow_mut().geometry.maximized = true;
        shell.handle(MenuAction::Quit.into());
        assert_eq!(shell.drain_effects(), vec![Effect::Exit]);
        assert!(shell.session().config.get(|c| c.last_window_state.maximized));
    }
}
