use crate::window::DockSurface;

/// Windows has no dock tile; the tray icon carries the unread count.
pub fn create_dock_surface() -> Option<Box<dyn DockSurface>> {
    None
}
