//! Platform abstraction layer
//!
//! This module provides platform-specific implementations for:
//! - Desktop notifications
//! - The dock tile (macOS)

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(target_os = "windows")]
pub mod windows;

// Re-export the current platform's modules
#[cfg(target_os = "macos")]
pub use macos as current;

#[cfg(target_os = "windows")]
pub use windows as current;
