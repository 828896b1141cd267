use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender};
use log::{debug, error, info, warn};
use notify::{Event as NotifyEvent, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use rfd::{MessageButtons, MessageDialog, MessageDialogResult, MessageLevel};
use tray_icon::menu::MenuEvent;
use tray_icon::{MouseButton, MouseButtonState, TrayIcon, TrayIconBuilder, TrayIconEvent};
use winit::dpi::{LogicalPosition, LogicalSize};
use winit::event::{Event, StartCause, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop, EventLoopProxy};
use winit::window::{Fullscreen, Theme, Window, WindowId};
use wry::{PageLoadEvent, WebView, WebViewBuilder};

use crate::APP_NAME;
use crate::bridge::{
    ELEMENT_POLL_INTERVAL, ELEMENT_WAIT_TIMEOUT, ElementWaits, WaitOutcome, close_on_click_script,
    decode_script_result, element_presence_script, wait_for_element,
};
use crate::config::{ConfigStore, Reload, debounce_events};
use crate::ipc::{PageMessage, page_script};
use crate::logging::init_logging;
use crate::model::*;
use crate::navigation::{HOME_URL, is_mailto, prompt_detail};
use crate::platform::current::dock::create_dock_surface;
use crate::session::{SessionPaths, ShellSession};
use crate::shell::{Effect, MessageTarget, Shell, ShellEvent};
use crate::single_instance::{self, InstanceRole};
use crate::ui::icon::{TrayIconKey, create_tray_icon};
use crate::ui::menu::{build_tray_menu, parse_menu_action};
use crate::update::github::GitHubReleases;
use crate::update::relaunch::{self, SystemLauncher, is_relaunch_request};
use crate::update::{CheckRequest, ReleaseSource, UPDATE_CHECK_INTERVAL};
use crate::window::{DockSurface, Surfaces, TraySurface, WindowSurface};

const MENU_POLL_INTERVAL: Duration = Duration::from_millis(100);
const CONFIG_DEBOUNCE_DURATION: Duration = Duration::from_millis(500);

/// `args` are forwarded to an already running instance, if there is one.
pub fn run(launch_minimized: bool, args: Vec<String>) -> Result<()> {
    let paths = SessionPaths::from_user_dirs();
    let config = ConfigStore::open(paths.config_file.clone());
    if let Err(err) = init_logging(&paths.log_file, config.get(|c| c.debug_mode)) {
        eprintln!("Logging disabled: {:#}", err);
    }
    let session = ShellSession::new(config, paths, launch_minimized);
    info!("{} {} starting", APP_NAME, session.version);

    let primary = match single_instance::acquire(&session.paths.lock_file, &args)
        .context("failed to acquire single-instance lock")?
    {
        InstanceRole::Primary(primary) => primary,
        InstanceRole::Forwarded => {
            info!("Another instance is running, handed over and exiting");
            return Ok(());
        }
    };

    let event_loop = EventLoop::<UserEvent>::with_user_event()
        .build()
        .context("failed to create event loop")?;
    let proxy = event_loop.create_proxy();
    let (update_tx, update_rx) = crossbeam_channel::unbounded();

    let listener_proxy = proxy.clone();
    let _listener = primary.listen(move |args| {
        let _ = listener_proxy.send_event(UserEvent::SecondInstance(args));
    })?;
    let _config_watcher = spawn_config_watcher(proxy.clone(), session.config.clone());
    let _update_worker = spawn_update_worker(update_rx, proxy.clone(), session.paths.update_dir.clone());
    let _update_timer = spawn_update_timer(proxy.clone());
    let menu_receiver = MenuEvent::receiver().clone();
    let tray_receiver = TrayIconEvent::receiver().clone();

    for arg in args {
        if is_mailto(&arg) {
            let _ = proxy.send_event(UserEvent::OpenUrl(arg));
        } else if is_relaunch_request(&arg) {
            info!("Relaunch requested but no instance was running");
        } else {
            debug!("Ignoring launch argument {:?}", arg);
        }
    }

    let pending_relaunch: Rc<RefCell<Option<StagedUpdate>>> = Rc::default();
    let relaunch_slot = pending_relaunch.clone();
    let mut session = Some(session);
    let mut update_tx = Some(update_tx);
    let mut runtime: Option<Runtime> = None;

    #[allow(deprecated)]
    let run_result = event_loop.run(move |event, event_loop| match event {
        Event::NewEvents(StartCause::Init) => {
            if let (Some(session), Some(update_tx)) = (session.take(), update_tx.take()) {
                match Runtime::start(event_loop, session, proxy.clone(), update_tx, relaunch_slot.clone()) {
                    Ok(started) => runtime = Some(started),
                    Err(err) => {
                        error!("Failed to start: {:#}", err);
                        event_loop.exit();
                        return;
                    }
                }
            }
            if let Some(runtime) = runtime.as_mut() {
                runtime.apply_effects(event_loop);
            }
            event_loop.set_control_flow(ControlFlow::WaitUntil(Instant::now() + MENU_POLL_INTERVAL));
        }
        Event::NewEvents(StartCause::ResumeTimeReached { .. }) => {
            // Poll for menu and tray events (replaces dedicated listener threads)
            while let Ok(event) = menu_receiver.try_recv() {
                if let Some(action) = parse_menu_action(event.id()) {
                    let _ = proxy.send_event(UserEvent::MenuAction(action));
                }
            }
            while let Ok(event) = tray_receiver.try_recv() {
                if let TrayIconEvent::Click {
                    button: MouseButton::Left,
                    button_state: MouseButtonState::Up,
                    ..
                } = event
                {
                    let _ = proxy.send_event(UserEvent::TrayClicked);
                }
            }
            event_loop.set_control_flow(ControlFlow::WaitUntil(Instant::now() + MENU_POLL_INTERVAL));
        }
        Event::WindowEvent { window_id, event } => {
            if let Some(runtime) = runtime.as_mut() {
                runtime.on_window_event(window_id, event);
                runtime.apply_effects(event_loop);
            }
        }
        Event::UserEvent(user_event) => {
            if let Some(runtime) = runtime.as_mut() {
                runtime.on_user_event(user_event);
                runtime.apply_effects(event_loop);
            }
        }
        _ => {}
    });

    run_result.context("event loop error")?;

    // The restarted process must find the lock free.
    drop(primary);
    let staged = pending_relaunch.borrow_mut().take();
    if let Some(update) = staged {
        let exe = std::env::current_exe().context("failed to locate the running executable")?;
        relaunch::relaunch(&update, &exe, &mut SystemLauncher)?;
    }
    Ok(())
}

struct WebWindow {
    // Dropped before the window it renders into.
    webview: WebView,
    window: Rc<Window>,
}

struct Runtime {
    shell: Shell,
    main: WebWindow,
    satellites: HashMap<u64, WebWindow>,
    roles: HashMap<WindowId, WindowRole>,
    next_satellite: u64,
    element_waits: ElementWaits,
    proxy: EventLoopProxy<UserEvent>,
    update_tx: Sender<CheckRequest>,
    pending_relaunch: Rc<RefCell<Option<StagedUpdate>>>,
    log_file: PathBuf,
    user_agent: Option<String>,
    fullscreen: bool,
    minimized: bool,
    #[cfg(target_os = "macos")]
    _dock_menu: Option<tray_icon::menu::Menu>,
}

impl Runtime {
    fn start(
        event_loop: &ActiveEventLoop,
        session: ShellSession,
        proxy: EventLoopProxy<UserEvent>,
        update_tx: Sender<CheckRequest>,
        pending_relaunch: Rc<RefCell<Option<StagedUpdate>>>,
    ) -> Result<Self> {
        let state = session.config.get(|c| c.last_window_state);
        let mut attributes = Window::default_attributes()
            .with_title(APP_NAME)
            .with_inner_size(LogicalSize::new(state.bounds.width, state.bounds.height))
            .with_maximized(state.maximized)
            .with_visible(!session.launch_minimized);
        if let (Some(x), Some(y)) = (state.bounds.x, state.bounds.y) {
            attributes = attributes.with_position(LogicalPosition::new(x, y));
        }
        let window = Rc::new(
            event_loop
                .create_window(attributes)
                .context("failed to create main window")?,
        );
        if state.fullscreen {
            window.set_fullscreen(Some(Fullscreen::Borderless(None)));
        }
        let os_prefers_dark = window.theme() == Some(Theme::Dark);

        let user_agent = session.config.get(|c| c.custom_user_agent.clone());
        let webview = build_webview(&window, WindowRole::Main, HOME_URL, &proxy, user_agent.as_deref())
            .context("failed to create main webview")?;

        let tray: Option<Box<dyn TraySurface>> = if session.config.get(|c| c.enable_tray_icon) {
            Some(Box::new(NativeTray::new()?))
        } else {
            None
        };
        let dock: Option<Box<dyn DockSurface>> = if session.platform.has_dock() {
            create_dock_surface()
        } else {
            None
        };
        #[cfg(target_os = "macos")]
        let dock_menu = dock.as_ref().and_then(|_| match install_dock_menu() {
            Ok(menu) => Some(menu),
            Err(err) => {
                warn!("Dock menu unavailable: {:#}", err);
                None
            }
        });

        let log_file = session.paths.log_file.clone();
        let surfaces = Surfaces {
            window: Box::new(NativeWindow {
                window: window.clone(),
            }),
            tray,
            dock,
        };
        let mut shell = Shell::new(session, surfaces, os_prefers_dark);
        shell.start();

        let mut roles = HashMap::new();
        roles.insert(window.id(), WindowRole::Main);

        Ok(Self {
            fullscreen: state.fullscreen,
            minimized: false,
            shell,
            main: WebWindow { webview, window },
            satellites: HashMap::new(),
            roles,
            next_satellite: 1,
            element_waits: ElementWaits::default(),
            proxy,
            update_tx,
            pending_relaunch,
            log_file,
            user_agent,
            #[cfg(target_os = "macos")]
            _dock_menu: dock_menu,
        })
    }

    fn on_window_event(&mut self, window_id: WindowId, event: WindowEvent) {
        let Some(role) = self.roles.get(&window_id).copied() else {
            return;
        };
        match (role, event) {
            (WindowRole::Main, WindowEvent::CloseRequested) => self.shell.handle(ShellEvent::CloseRequested),
            (WindowRole::Main, WindowEvent::ThemeChanged(theme)) => {
                self.shell.handle(ShellEvent::ThemeChanged(theme == Theme::Dark))
            }
            (WindowRole::Main, WindowEvent::Resized(_)) => {
                let window = &self.main.window;
                let minimized = window.is_minimized().unwrap_or(false);
                if minimized != self.minimized {
                    self.minimized = minimized;
                    self.shell.handle(if minimized {
                        ShellEvent::Minimized
                    } else {
                        ShellEvent::Restored
                    });
                }
                let fullscreen = window.fullscreen().is_some();
                if fullscreen != self.fullscreen {
                    self.fullscreen = fullscreen;
                    self.shell.handle(ShellEvent::FullScreenChanged(fullscreen));
                }
            }
            (WindowRole::Satellite(id), WindowEvent::CloseRequested) => self.close_satellite(id),
            _ => {}
        }
    }

    fn on_user_event(&mut self, event: UserEvent) {
        match event {
            UserEvent::MenuAction(action) => self.shell.handle(action.into()),
            UserEvent::TrayClicked => self.shell.handle(ShellEvent::ShowRequested),
            UserEvent::SecondInstance(args) => self.shell.handle(ShellEvent::SecondInstance(args)),
            UserEvent::OpenUrl(url) => self.shell.handle(ShellEvent::OpenUrl(url)),
            UserEvent::NewWindowRequested { url } => {
                let current_url = self.main.webview.url().unwrap_or_default();
                self.shell.handle(ShellEvent::NewWindowRequested { url, current_url });
            }
            UserEvent::PageLoaded { role, url } => {
                self.shell.handle(ShellEvent::PageLoaded { window: role, url })
            }
            UserEvent::PageIpc { role, body } => match PageMessage::parse(&body) {
                Ok(message) => self.shell.handle(ShellEvent::PageMessage {
                    window: role,
                    message,
                }),
                Err(err) => warn!("{:#}", err),
            },
            UserEvent::QueryElement { role, selector } => self.query_element(role, selector),
            UserEvent::ElementAnswered {
                role,
                selector,
                present,
            } => {
                if present && let Some(target) = self.webview(role) {
                    if let Err(err) = target.evaluate_script(&close_on_click_script(&selector)) {
                        warn!("Failed to attach close handler to {}: {}", selector, err);
                    }
                }
                self.element_waits.report(role, &selector, present);
            }
            UserEvent::ExternalLinkAnswered { url, origin, answer } => {
                self.shell
                    .handle(ShellEvent::ExternalLinkAnswered { url, origin, answer })
            }
            UserEvent::DarkModeChosen(choice) => self.shell.handle(ShellEvent::DarkModeChosen(choice)),
            UserEvent::UpdateTick => self.shell.handle(ShellEvent::UpdateTick),
            UserEvent::UpdateChecked { generation, outcome } => {
                self.shell
                    .handle(ShellEvent::UpdateChecked { generation, outcome })
            }
            UserEvent::ConfigReloaded => self.shell.handle(ShellEvent::ConfigReloaded),
            UserEvent::ConfigReloadFailed(msg) => warn!("{}", msg),
        }
    }

    fn apply_effects(&mut self, event_loop: &ActiveEventLoop) {
        // Closing a satellite feeds the shell again, so drain until quiet.
        loop {
            let effects = self.shell.drain_effects();
            if effects.is_empty() {
                break;
            }
            for effect in effects {
                self.apply(effect, event_loop);
            }
        }
    }

    fn apply(&mut self, effect: Effect, event_loop: &ActiveEventLoop) {
        debug!("Applying {:?}", effect);
        match effect {
            Effect::LoadInMainWindow(url) => {
                if let Err(err) = self.main.webview.load_url(&url) {
                    error!("Failed to load {}: {}", url, err);
                }
            }
            Effect::OpenSatelliteWindow(url) => {
                if let Err(err) = self.open_satellite(event_loop, &url) {
                    error!("Failed to open window for {}: {:#}", url, err);
                }
            }
            Effect::OpenExternal(url) => {
                if let Err(err) = open::that_detached(&url) {
                    error!("Failed to open {} in the default browser: {}", url, err);
                }
            }
            Effect::ConfirmExternalLink { url, origin } => {
                spawn_link_confirmation(self.proxy.clone(), url, origin)
            }
            Effect::PostMessage { target, message } => {
                let script = message.to_script();
                for webview in self.targets(target) {
                    if let Err(err) = webview.evaluate_script(&script) {
                        warn!("Failed to deliver {}: {}", message.channel(), err);
                    }
                }
            }
            Effect::StartUpdateCheck(request) => {
                if self.update_tx.send(request).is_err() {
                    error!("Update worker is gone");
                }
            }
            Effect::Notify(notification) => {
                crate::notify::show_notification(&notification, &self.log_file)
            }
            Effect::Acknowledge(text) => spawn_acknowledgement(text),
            Effect::PromptDarkMode => spawn_dark_mode_prompt(self.proxy.clone()),
            Effect::ApplyTheme(mode) => {
                let theme = match mode {
                    DarkMode::System => None,
                    DarkMode::Dark => Some(Theme::Dark),
                    DarkMode::Light => Some(Theme::Light),
                };
                self.main.window.set_theme(theme);
                for satellite in self.satellites.values() {
                    satellite.window.set_theme(theme);
                }
            }
            Effect::Relaunch(update) => {
                // Performed once the loop has exited and the lock is released.
                *self.pending_relaunch.borrow_mut() = Some(update);
                event_loop.exit();
            }
            Effect::OpenLogs(path) => {
                if let Err(err) = open::that_detached(&path) {
                    error!("Failed to open log file {:?}: {}", path, err);
                }
            }
            Effect::WatchCloseButtons { window, selectors } => {
                for selector in selectors {
                    self.spawn_element_wait(window, selector);
                }
            }
            Effect::CloseSatellite(id) => self.close_satellite(id),
            Effect::Exit => event_loop.exit(),
        }
    }

    fn webview(&self, role: WindowRole) -> Option<&WebView> {
        match role {
            WindowRole::Main => Some(&self.main.webview),
            WindowRole::Satellite(id) => self.satellites.get(&id).map(|w| &w.webview),
        }
    }

    fn targets(&self, target: MessageTarget) -> Vec<&WebView> {
        match target {
            MessageTarget::Main => vec![&self.main.webview],
            MessageTarget::Window(role) => self.webview(role).into_iter().collect(),
            MessageTarget::All => std::iter::once(&self.main.webview)
                .chain(self.satellites.values().map(|w| &w.webview))
                .collect(),
        }
    }

    fn open_satellite(&mut self, event_loop: &ActiveEventLoop, url: &str) -> Result<()> {
        let id = self.next_satellite;
        self.next_satellite += 1;
        let role = WindowRole::Satellite(id);

        let attributes = Window::default_attributes()
            .with_title(APP_NAME)
            .with_inner_size(LogicalSize::new(800u32, 600u32));
        let window = Rc::new(
            event_loop
                .create_window(attributes)
                .context("failed to create window")?,
        );
        let webview = build_webview(&window, role, url, &self.proxy, self.user_agent.as_deref())?;
        self.roles.insert(window.id(), role);
        self.satellites.insert(id, WebWindow { webview, window });
        Ok(())
    }

    fn close_satellite(&mut self, id: u64) {
        if let Some(satellite) = self.satellites.remove(&id) {
            self.roles.remove(&satellite.window.id());
            self.element_waits.forget_window(WindowRole::Satellite(id));
            self.shell.handle(ShellEvent::SatelliteClosed(id));
        }
    }

    fn query_element(&self, role: WindowRole, selector: String) {
        let Some(webview) = self.webview(role) else {
            return;
        };
        let proxy = self.proxy.clone();
        let script = element_presence_script(&selector);
        let result = webview.evaluate_script_with_callback(&script, move |raw| {
            let present = decode_script_result(&raw) == serde_json::Value::Bool(true);
            let _ = proxy.send_event(UserEvent::ElementAnswered {
                role,
                selector: selector.clone(),
                present,
            });
        });
        if let Err(err) = result {
            debug!("Element query failed: {}", err);
        }
    }

    fn spawn_element_wait(&mut self, role: WindowRole, selector: String) {
        let found = self.element_waits.register(role, &selector);
        let proxy = self.proxy.clone();
        thread::spawn(move || {
            let outcome = wait_for_element(&selector, ELEMENT_WAIT_TIMEOUT, ELEMENT_POLL_INTERVAL, &found, || {
                let _ = proxy.send_event(UserEvent::QueryElement {
                    role,
                    selector: selector.clone(),
                });
            });
            if outcome == WaitOutcome::Found {
                debug!("Button {:?} attached in {:?}", selector, role);
            }
        });
    }
}

fn build_webview(
    window: &Window,
    role: WindowRole,
    url: &str,
    proxy: &EventLoopProxy<UserEvent>,
    user_agent: Option<&str>,
) -> Result<WebView> {
    let ipc_proxy = proxy.clone();
    let new_window_proxy = proxy.clone();
    let load_proxy = proxy.clone();

    let mut builder = WebViewBuilder::new()
        .with_url(url)
        .with_initialization_script(&page_script())
        .with_ipc_handler(move |request| {
            let _ = ipc_proxy.send_event(UserEvent::PageIpc {
                role,
                body: request.into_body(),
            });
        })
        .with_new_window_req_handler(move |url| {
            let _ = new_window_proxy.send_event(UserEvent::NewWindowRequested { url });
            false
        })
        .with_on_page_load_handler(move |event, url| {
            if let PageLoadEvent::Finished = event {
                let _ = load_proxy.send_event(UserEvent::PageLoaded { role, url });
            }
        });
    if let Some(user_agent) = user_agent {
        builder = builder.with_user_agent(user_agent);
    }
    builder.build(window).context("failed to build webview")
}

struct NativeWindow {
    window: Rc<Window>,
}

impl WindowSurface for NativeWindow {
    fn show(&mut self) {
        self.window.set_visible(true);
    }

    fn hide(&mut self) {
        self.window.set_visible(false);
    }

    fn restore(&mut self) {
        self.window.set_minimized(false);
    }

    fn focus(&mut self) {
        self.window.focus_window();
    }

    fn geometry(&self) -> WindowState {
        let scale = self.window.scale_factor();
        let size: LogicalSize<u32> = self.window.inner_size().to_logical(scale);
        let position: Option<LogicalPosition<i32>> =
            self.window.outer_position().ok().map(|p| p.to_logical(scale));
        WindowState {
            bounds: Bounds {
                x: position.map(|p| p.x),
                y: position.map(|p| p.y),
                width: size.width,
                height: size.height,
            },
            fullscreen: self.window.fullscreen().is_some(),
            maximized: self.window.is_maximized(),
        }
    }
}

struct NativeTray {
    icon: TrayIcon,
}

impl NativeTray {
    fn new() -> Result<Self> {
        let image = create_tray_icon(TrayIconKey::Base).context("failed to create tray icon image")?;
        let icon = TrayIconBuilder::new()
            .with_icon(image)
            .with_tooltip(APP_NAME)
            .build()
            .context("failed to create tray icon")?;
        icon.set_visible(true).context("failed to show tray icon")?;
        Ok(Self { icon })
    }
}

impl TraySurface for NativeTray {
    fn set_icon(&mut self, key: TrayIconKey) {
        match create_tray_icon(key) {
            Ok(image) => {
                if let Err(err) = self.icon.set_icon(Some(image)) {
                    error!("Failed to update tray icon: {}", err);
                }
            }
            Err(err) => error!("{:#}", err),
        }
    }

    fn set_title(&mut self, title: &str) {
        self.icon.set_title(Some(title));
    }

    fn set_menu(&mut self, menu: &TrayMenuModel) {
        match build_tray_menu(menu) {
            Ok(built) => self.icon.set_menu(Some(Box::new(built))),
            Err(err) => error!("Failed to rebuild menu: {}", err),
        }
    }
}

#[cfg(target_os = "macos")]
fn install_dock_menu() -> Result<tray_icon::menu::Menu> {
    let menu = crate::ui::menu::build_dock_menu().context("failed to build dock menu")?;
    crate::platform::macos::dock::install_dock_menu(&menu)?;
    Ok(menu)
}

fn spawn_link_confirmation(proxy: EventLoopProxy<UserEvent>, url: String, origin: String) {
    thread::spawn(move || {
        let trust_label = format!("Trust {}", origin);
        let result = MessageDialog::new()
            .set_level(MessageLevel::Info)
            .set_title(APP_NAME)
            .set_description(format!(
                "Do you want to open this external link in your default browser?\n\n{}",
                prompt_detail(&url)
            ))
            .set_buttons(MessageButtons::YesNoCancelCustom(
                "Open Link".to_string(),
                trust_label.clone(),
                "Cancel".to_string(),
            ))
            .show();
        let answer = match result {
            MessageDialogResult::Custom(label) if label == "Open Link" => ConfirmAnswer::Open,
            MessageDialogResult::Custom(label) if label == trust_label => ConfirmAnswer::OpenAndTrust,
            MessageDialogResult::Yes => ConfirmAnswer::Open,
            MessageDialogResult::No => ConfirmAnswer::OpenAndTrust,
            _ => ConfirmAnswer::Cancel,
        };
        let _ = proxy.send_event(UserEvent::ExternalLinkAnswered { url, origin, answer });
    });
}

fn spawn_dark_mode_prompt(proxy: EventLoopProxy<UserEvent>) {
    thread::spawn(move || {
        let result = MessageDialog::new()
            .set_level(MessageLevel::Info)
            .set_title(APP_NAME)
            .set_description(format!(
                "{} has dark mode! Do you want to enable it?\n\nClose this dialog to be asked again later.",
                APP_NAME
            ))
            .set_buttons(MessageButtons::YesNoCancelCustom(
                "Yes".to_string(),
                "No".to_string(),
                "Follow System Appearance".to_string(),
            ))
            .show();
        let choice = match result {
            MessageDialogResult::Yes => Some(DarkMode::Dark),
            MessageDialogResult::No => Some(DarkMode::Light),
            MessageDialogResult::Custom(label) => match label.as_str() {
                "Yes" => Some(DarkMode::Dark),
                "No" => Some(DarkMode::Light),
                "Follow System Appearance" => Some(DarkMode::System),
                _ => None,
            },
            _ => None,
        };
        let _ = proxy.send_event(UserEvent::DarkModeChosen(choice));
    });
}

fn spawn_acknowledgement(text: String) {
    thread::spawn(move || {
        let _ = MessageDialog::new()
            .set_level(MessageLevel::Info)
            .set_title(APP_NAME)
            .set_description(text)
            .set_buttons(MessageButtons::Ok)
            .show();
    });
}

fn spawn_update_worker(
    rx: Receiver<CheckRequest>,
    proxy: EventLoopProxy<UserEvent>,
    download_dir: PathBuf,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let source = match GitHubReleases::new(download_dir) {
            Ok(source) => Some(source),
            Err(err) => {
                error!("Update backend unavailable: {:#}", err);
                None
            }
        };
        for request in rx.iter() {
            let outcome = match &source {
                Some(source) => source.check(&request).map_err(|err| format!("{:#}", err)),
                None => Err("update backend unavailable".to_string()),
            };
            let event = UserEvent::UpdateChecked {
                generation: request.generation,
                outcome,
            };
            if proxy.send_event(event).is_err() {
                break;
            }
        }
    })
}

fn spawn_update_timer(proxy: EventLoopProxy<UserEvent>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let ticker = crossbeam_channel::tick(UPDATE_CHECK_INTERVAL);
        for _ in ticker.iter() {
            if proxy.send_event(UserEvent::UpdateTick).is_err() {
                break;
            }
        }
    })
}

fn spawn_config_watcher(proxy: EventLoopProxy<UserEvent>, config: ConfigStore) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let Some(config_path) = config.path().map(Path::to_path_buf) else {
            return;
        };
        let Some(config_dir) = config_path.parent().map(Path::to_path_buf) else {
            return;
        };
        if let Err(e) = std::fs::create_dir_all(&config_dir) {
            log::error!("Failed to create config directory: {}", e);
            return;
        }
        let (tx, rx) = crossbeam_channel::unbounded();
        let watched = config_path.clone();

        let mut watcher: RecommendedWatcher = match Watcher::new(
            move |res: Result<NotifyEvent, notify::Error>| match res {
                Ok(event) => {
                    let touches_config = event.paths.iter().any(|p| p == &watched);
                    if touches_config && matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                        let _ = tx.send(());
                    }
                }
                Err(e) => log::error!("Config watch error: {}", e),
            },
            notify::Config::default(),
        ) {
            Ok(w) => w,
            Err(e) => {
                log::error!("Failed to create config watcher: {}", e);
                return;
            }
        };

        // The file is replaced by rename on save, so watch its directory.
        if let Err(e) = watcher.watch(&config_dir, RecursiveMode::NonRecursive) {
            log::error!("Failed to watch config directory: {}", e);
            return;
        }

        log::debug!("Config watcher started for {:?}", config_path);

        // Editors may write in multiple ops; reload once they have settled.
        debounce_events(&rx, CONFIG_DEBOUNCE_DURATION, || {
            log::debug!("Config file changed, attempting reload");
            let event = match config.reload() {
                Ok(Reload::Applied) => UserEvent::ConfigReloaded,
                Ok(Reload::Unchanged) => {
                    log::debug!("Config file holds our own last save");
                    return true;
                }
                Err(e) => UserEvent::ConfigReloadFailed(format!("Config reload failed: {:#}", e)),
            };
            proxy.send_event(event).is_ok()
        });
    })
}
