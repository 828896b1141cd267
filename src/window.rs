//! Main window lifecycle and the tray/dock affordances kept in sync with it.
//!
//! The window is Hidden, Visible or Minimized. The tray, when present, offers
//! exactly one of Show/Hide depending on whether the window is hidden, and its
//! icon, title and the dock badge follow the unread count. A missing tray or
//! dock turns every operation on it into a no-op.

use log::debug;

use crate::config::ConfigStore;
use crate::model::{ReleaseChannel, TrayMenuModel, TrayMenuVisibility, WindowState};
use crate::session::{Platform, ShellSession};
use crate::ui::icon::{TrayIconKey, badge_text, tray_icon_key};

pub trait WindowSurface {
    fn show(&mut self);
    fn hide(&mut self);
    /// Leave the minimized state.
    fn restore(&mut self);
    fn focus(&mut self);
    fn geometry(&self) -> WindowState;
}

pub trait TraySurface {
    fn set_icon(&mut self, key: TrayIconKey);
    fn set_title(&mut self, title: &str);
    fn set_menu(&mut self, menu: &TrayMenuModel);
}

pub trait DockSurface {
    fn set_badge(&mut self, text: &str);
    fn set_launcher_count(&mut self, count: u32);
    fn set_icon_visible(&mut self, visible: bool);
}

pub struct Surfaces {
    pub window: Box<dyn WindowSurface>,
    pub tray: Option<Box<dyn TraySurface>>,
    pub dock: Option<Box<dyn DockSurface>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Hidden,
    Visible,
    Minimized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// Close was intercepted and turned into a hide.
    Hidden,
    /// Proceed with native teardown.
    Terminate,
}

pub struct MainWindow {
    visibility: Visibility,
    surfaces: Surfaces,
    config: ConfigStore,
    platform: Platform,
    unity_launcher: bool,
    unread: u32,
    menu: TrayMenuModel,
}

impl MainWindow {
    pub fn new(session: &ShellSession, surfaces: Surfaces, initially_visible: bool) -> Self {
        let visibility = if initially_visible {
            Visibility::Visible
        } else {
            Visibility::Hidden
        };
        let show_dock_icon = session
            .platform
            .has_dock()
            .then(|| session.config.get(|c| c.show_dock_icon));
        let menu = TrayMenuModel {
            visibility: TrayMenuVisibility::for_window(initially_visible),
            channel: session.config.get(|c| c.release_channel),
            update_staged: false,
            show_dock_icon,
        };

        let mut window = Self {
            visibility,
            surfaces,
            config: session.config.clone(),
            platform: session.platform,
            unity_launcher: session.unity_launcher,
            unread: 0,
            menu,
        };
        window.push_menu();
        if let Some(tray) = window.surfaces.tray.as_mut() {
            tray.set_icon(TrayIconKey::Base);
        }
        if let (Some(false), Some(dock)) = (show_dock_icon, window.surfaces.dock.as_mut()) {
            dock.set_icon_visible(false);
        }
        window
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn unread(&self) -> u32 {
        self.unread
    }

    pub fn has_tray(&self) -> bool {
        self.surfaces.tray.is_some()
    }

    pub fn menu(&self) -> &TrayMenuModel {
        &self.menu
    }

    /// Hidden|Minimized → Visible.
    pub fn show(&mut self) {
        if self.visibility == Visibility::Minimized {
            self.surfaces.window.restore();
        }
        self.surfaces.window.show();
        self.surfaces.window.focus();
        self.set_visibility(Visibility::Visible);
    }

    /// Visible|Minimized → Hidden.
    pub fn hide(&mut self) {
        self.surfaces.window.hide();
        self.set_visibility(Visibility::Hidden);
    }

    /// The OS minimized the window. The tray keeps offering "Hide".
    pub fn minimized(&mut self) {
        if self.visibility == Visibility::Visible {
            self.set_visibility(Visibility::Minimized);
        }
    }

    /// The OS restored a minimized window by itself.
    pub fn restored(&mut self) {
        if self.visibility == Visibility::Minimized {
            self.set_visibility(Visibility::Visible);
        }
    }

    /// Persists the geometry, then either intercepts the close as a hide
    /// (minimize-on-exit) or lets teardown proceed.
    pub fn request_close(&mut self) -> CloseOutcome {
        self.persist_geometry();

        if self.config.get(|c| c.minimize_on_exit) {
            self.hide();
            CloseOutcome::Hidden
        } else {
            CloseOutcome::Terminate
        }
    }

    pub fn persist_geometry(&mut self) {
        let geometry = self.surfaces.window.geometry();
        self.config.set(|c| c.last_window_state = geometry);
    }

    /// A second launch asked this instance to come forward.
    pub fn bring_to_front(&mut self) {
        self.show();
    }

    pub fn set_unread(&mut self, count: u32) {
        self.unread = count;
        let text = badge_text(count);

        if let Some(tray) = self.surfaces.tray.as_mut() {
            tray.set_icon(tray_icon_key(count));
            if self.platform.has_tray_title() {
                tray.set_title(&text);
            }
        }
        if let Some(dock) = self.surfaces.dock.as_mut() {
            if self.platform.has_dock() {
                dock.set_badge(&text);
            }
            if self.unity_launcher {
                dock.set_launcher_count(count);
            }
        }
    }

    pub fn set_update_staged(&mut self, staged: bool) {
        if self.menu.update_staged != staged {
            self.menu.update_staged = staged;
            self.push_menu();
        }
    }

    pub fn set_channel(&mut self, channel: ReleaseChannel) {
        if self.menu.channel != channel {
            self.menu.channel = channel;
            self.push_menu();
        }
    }

    /// macOS "Show Dock Icon" toggle; persisted.
    pub fn set_dock_icon_visible(&mut self, visible: bool) {
        if !self.platform.has_dock() {
            return;
        }
        self.config.set(|c| c.show_dock_icon = visible);
        if let Some(dock) = self.surfaces.dock.as_mut() {
            dock.set_icon_visible(visible);
        }
        self.menu.show_dock_icon = Some(visible);
        self.push_menu();
    }

    fn set_visibility(&mut self, next: Visibility) {
        if self.visibility != next {
            debug!("Main window {:?} -> {:?}", self.visibility, next);
        }
        self.visibility = next;
        let visibility = TrayMenuVisibility::for_window(next != Visibility::Hidden);
        if self.menu.visibility != visibility {
            self.menu.visibility = visibility;
            self.push_menu();
        }
    }

    fn push_menu(&mut self) {
        if let Some(tray) = self.surfaces.tray.as_mut() {
            tray.set_menu(&self.menu);
        }
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[derive(Debug, Default)]
    pub struct Recorder {
        pub window_calls: Vec<&'static str>,
        pub icons: Vec<TrayIconKey>,
        pub titles: Vec<String>,
        pub menus: Vec<TrayMenuModel>,
        pub badges: Vec<String>,
        pub launcher_counts: Vec<u32>,
        pub dock_visible: Vec<bool>,
        pub geometry: WindowState,
    }

    pub type Shared = Rc<RefCell<Recorder>>;

    pub struct FakeWindow(pub Shared);
    pub struct FakeTray(pub Shared);
    pub struct FakeDock(pub Shared);

    impl WindowSurface for FakeWindow {
        fn show(&mut self) {
            self.0.borrow_mut().window_calls.push("show");
        }
        fn hide(&mut self) {
            self.0.borrow_mut().window_calls.push("hide");
        }
        fn restore(&mut self) {
            self.0.borrow_mut().window_calls.push("restore");
        }
        fn focus(&mut self) {
            self.0.borrow_mut().window_calls.push("focus");
        }
        fn geometry(&self) -> WindowState {
            self.0.borrow().geometry
        }
    }

    impl TraySurface for FakeTray {
        fn set_icon(&mut self, key: TrayIconKey) {
            self.0.borrow_mut().icons.push(key);
        }
        fn set_title(&mut self, title: &str) {
            self.0.borrow_mut().titles.push(title.to_string());
        }
        fn set_menu(&mut self, menu: &TrayMenuModel) {
            self.0.borrow_mut().menus.push(menu.clone());
        }
    }

    impl DockSurface for FakeDock {
        fn set_badge(&mut self, text: &str) {
            self.0.borrow_mut().badges.push(text.to_string());
        }
        fn set_launcher_count(&mut self, count: u32) {
            self.0.borrow_mut().launcher_counts.push(count);
        }
        fn set_icon_visible(&mut self, visible: bool) {
            self.0.borrow_mut().dock_visible.push(visible);
        }
    }

    pub fn surfaces(with_tray: bool, with_dock: bool) -> (Surfaces, Shared) {
        let shared: Shared = Rc::new(RefCell::new(Recorder::default()));
        let surfaces = Surfaces {
            window: Box::new(FakeWindow(shared.clone())),
            tray: with_tray.then(|| Box::new(FakeTray(shared.clone())) as Box<dyn TraySurface>),
            dock: with_dock.then(|| Box::new(FakeDock(shared.clone())) as Box<dyn DockSurface>),
        };
        (surfaces, shared)
    }
}

#[cfg(test)]
mod tests {
    use super::fakes::surfaces;
    use super::*;
    use crate::config::Config;
    use crate::model::Bounds;
    use crate::session::SessionPaths;

    fn session(platform: Platform, config: Config) -> ShellSession {
        let mut session = ShellSession::new(
            ConfigStore::in_memory(config),
            SessionPaths::from_user_dirs(),
            false,
        );
        session.platform = platform;
        session.unity_launcher = false;
        session
    }

    fn exactly_one_visible(menu: &TrayMenuModel) -> bool {
        menu.visibility.show_item != menu.visibility.hide_item
    }

    #[test]
    fn show_hide_sequences_keep_exactly_one_tray_item() {
        let (surfaces, rec) = surfaces(true, false);
        let mut window = MainWindow::new(&session(Platform::Windows, Config::default()), surfaces, false);

        let steps: [fn(&mut MainWindow); 8] = [
            MainWindow::show,
            MainWindow::show,
            MainWindow::hide,
            MainWindow::minimized,
            MainWindow::show,
            MainWindow::minimized,
            MainWindow::hide,
            MainWindow::hide,
        ];
        for step in steps {
            step(&mut window);
            assert!(exactly_one_visible(window.menu()));
            let expected = TrayMenuVisibility::for_window(window.visibility() != Visibility::Hidden);
            assert_eq!(window.menu().visibility, expected);
        }
        assert!(rec.borrow().menus.iter().all(exactly_one_visible));
    }

    #[test]
    fn show_restores_a_minimized_window() {
        let (surfaces, rec) = surfaces(true, false);
        let mut window = MainWindow::new(&session(Platform::Windows, Config::default()), surfaces, true);
        window.minimized();
        assert_eq!(window.visibility(), Visibility::Minimized);
        // Minimized still counts as shown for the tray.
        assert!(window.menu().visibility.hide_item);

        rec.borrow_mut().window_calls.clear();
        window.bring_to_front();
        assert_eq!(window.visibility(), Visibility::Visible);
        assert_eq!(rec.borrow().window_calls, vec!["restore", "show", "focus"]);
    }

    #[test]
    fn close_persists_geometry_and_terminates() {
        let (surfaces, rec) = surfaces(true, false);
        let session = session(Platform::Windows, Config::default());
        let geometry = WindowState {
            bounds: Bounds {
                x: Some(10),
                y: Some(20),
                width: 1024,
                height: 700,
            },
            fullscreen: false,
            maximized: true,
        };
        rec.borrow_mut().geometry = geometry;

        let mut window = MainWindow::new(&session, surfaces, true);
        assert_eq!(window.request_close(), CloseOutcome::Terminate);
        assert_eq!(session.config.get(|c| c.last_window_state), geometry);
        assert_eq!(window.visibility(), Visibility::Visible);
    }

    #[test]
    fn minimize_on_exit_turns_close_into_hide() {
        let (surfaces, rec) = surfaces(true, false);
        let config = Config {
            minimize_on_exit: true,
            ..Config::default()
        };
        let mut window = MainWindow::new(&session(Platform::Windows, config), surfaces, true);
        assert_eq!(window.request_close(), CloseOutcome::Hidden);
        assert_eq!(window.visibility(), Visibility::Hidden);
        assert!(window.menu().visibility.show_item);
        assert_eq!(rec.borrow().window_calls.last(), Some(&"hide"));
    }

    #[test]
    fn unread_updates_icon_title_and_badge_on_macos() {
        let (surfaces, rec) = surfaces(true, true);
        let mut window = MainWindow::new(&session(Platform::MacOs, Config::default()), surfaces, true);
        window.set_unread(3);
        window.set_unread(12);
        window.set_unread(0);

        let rec = rec.borrow();
        assert_eq!(
            rec.icons,
            vec![
                TrayIconKey::Base,
                TrayIconKey::Unread(3),
                TrayIconKey::Overflow,
                TrayIconKey::Base
            ]
        );
        assert_eq!(rec.titles, vec!["3", "12", ""]);
        assert_eq!(rec.badges, vec!["3", "12", ""]);
        assert!(rec.launcher_counts.is_empty());
    }

    #[test]
    fn unity_launcher_receives_raw_count() {
        let (surfaces, rec) = surfaces(true, true);
        let mut session = session(Platform::Linux, Config::default());
        session.unity_launcher = true;
        let mut window = MainWindow::new(&session, surfaces, true);
        window.set_unread(27);
        let rec = rec.borrow();
        assert_eq!(rec.launcher_counts, vec![27]);
        assert!(rec.badges.is_empty());
        assert!(rec.titles.is_empty());
    }

    #[test]
    fn missing_tray_makes_tray_operations_no_ops() {
        let (surfaces, rec) = surfaces(false, false);
        let mut window = MainWindow::new(&session(Platform::Windows, Config::default()), surfaces, true);
        window.hide();
        window.show();
        window.set_unread(5);
        window.set_update_staged(true);
        assert!(!window.has_tray());
        let rec = rec.borrow();
        assert!(rec.menus.is_empty());
        assert!(rec.icons.is_empty());
        assert_eq!(window.unread(), 5);
    }

    #[test]
    fn dock_icon_toggle_is_persisted_and_reflected_in_menu() {
        let (surfaces, rec) = surfaces(true, true);
        let session = session(Platform::MacOs, Config::default());
        let mut window = MainWindow::new(&session, surfaces, true);
        assert_eq!(window.menu().show_dock_icon, Some(true));

        window.set_dock_icon_visible(false);
        assert!(!session.config.get(|c| c.show_dock_icon));
        assert_eq!(window.menu().show_dock_icon, Some(false));
        assert_eq!(rec.borrow().dock_visible, vec![false]);
    }
}
