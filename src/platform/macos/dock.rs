//! Dock tile badge, dock icon visibility and the dock menu through AppKit.

use std::cell::Cell;

use anyhow::{Context, Result, bail};
use log::debug;
use objc2::runtime::{AnyClass, AnyObject, ClassBuilder, Sel};
use objc2::{ffi, msg_send, sel};
use objc2_app_kit::{NSApplication, NSApplicationActivationPolicy};
use objc2_foundation::{MainThreadMarker, NSString};
use tray_icon::menu::{ContextMenu, Menu};

use crate::window::DockSurface;

const DOCK_MENU_DELEGATE: &str = "InboxShellDockMenuDelegate";

thread_local! {
    static DOCK_MENU: Cell<*mut AnyObject> = const { Cell::new(std::ptr::null_mut()) };
}

pub struct MacDock {
    mtm: MainThreadMarker,
}

impl DockSurface for MacDock {
    #[allow(unused_unsafe)]
    fn set_badge(&mut self, text: &str) {
        let app = NSApplication::sharedApplication(self.mtm);
        let label = NSString::from_str(text);
        // An empty string still draws an empty badge; clear it instead.
        let badge = (!text.is_empty()).then_some(&*label);
        unsafe {
            app.dockTile().setBadgeLabel(badge);
        }
    }

    fn set_launcher_count(&mut self, _count: u32) {}

    #[allow(unused_unsafe)]
    fn set_icon_visible(&mut self, visible: bool) {
        let app = NSApplication::sharedApplication(self.mtm);
        let policy = if visible {
            NSApplicationActivationPolicy::Regular
        } else {
            NSApplicationActivationPolicy::Accessory
        };
        let applied = unsafe { app.setActivationPolicy(policy) };
        debug!("Dock icon visible={} applied={}", visible, applied);
    }
}

/// Only available on the main thread, where the event loop runs.
pub fn create_dock_surface() -> Option<Box<dyn DockSurface>> {
    MainThreadMarker::new().map(|mtm| Box::new(MacDock { mtm }) as Box<dyn DockSurface>)
}

extern "C" fn application_dock_menu(_this: &AnyObject, _cmd: Sel, _sender: *mut AnyObject) -> *mut AnyObject {
    DOCK_MENU.with(Cell::get)
}

/// Serves `menu` as the dock menu. The event loop owns the application
/// delegate, so its class is swapped for a subclass that also answers
/// `applicationDockMenu:`. `menu` must stay alive while the loop runs.
pub fn install_dock_menu(menu: &Menu) -> Result<()> {
    let mtm = MainThreadMarker::new().context("dock menu must be installed on the main thread")?;
    let app = NSApplication::sharedApplication(mtm);
    let delegate: *mut AnyObject = unsafe { msg_send![&app, delegate] };
    if delegate.is_null() {
        bail!("application has no delegate yet");
    }
    let current = unsafe { (*delegate).class() };
    let subclass = match AnyClass::get(DOCK_MENU_DELEGATE) {
        Some(existing) => existing,
        None => {
            let mut builder = ClassBuilder::new(DOCK_MENU_DELEGATE, current)
                .context("failed to declare dock menu delegate")?;
            unsafe {
                builder.add_method(
                    sel!(applicationDockMenu:),
                    application_dock_menu as extern "C" fn(_, _, _) -> _,
                );
            }
            builder.register()
        }
    };

    DOCK_MENU.with(|cell| cell.set(menu.ns_menu().cast()));
    if !std::ptr::eq(current, subclass) {
        unsafe {
            ffi::object_setClass(delegate.cast(), (subclass as *const AnyClass).cast());
        }
    }
    debug!("Dock menu installed");
    Ok(())
}
