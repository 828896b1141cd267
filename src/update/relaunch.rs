//! Applying a staged build: the installer is handed to the OS and a fresh
//! copy of the shell is started once this process has released its lock.

use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result};
use log::{info, warn};

use crate::model::StagedUpdate;

/// Command-line flag a notification action passes to a new launch.
pub const RELAUNCH_FLAG: &str = "--relaunch-to-update";
/// Activation URL for notifiers that can only open URLs.
pub const RELAUNCH_URL: &str = "inbox-shell://relaunch-to-update";

/// Whether a forwarded launch argument asks the running instance to relaunch.
pub fn is_relaunch_request(arg: &str) -> bool {
    arg == RELAUNCH_FLAG || arg.trim_end_matches('/').eq_ignore_ascii_case(RELAUNCH_URL)
}

pub trait Launcher {
    fn open(&mut self, path: &Path) -> Result<()>;
    fn spawn(&mut self, program: &Path, args: &[String]) -> Result<()>;
}

pub struct SystemLauncher;

impl Launcher for SystemLauncher {
    fn open(&mut self, path: &Path) -> Result<()> {
        open::that_detached(path).with_context(|| format!("failed to open {:?}", path))
    }

    fn spawn(&mut self, program: &Path, args: &[String]) -> Result<()> {
        Command::new(program)
            .args(args)
            .spawn()
            .with_context(|| format!("failed to start {:?}", program))?;
        Ok(())
    }
}

/// Opens the staged installer, then starts `current_exe` again. Call after
/// the single-instance lock is gone so the new process becomes primary.
pub fn relaunch(update: &StagedUpdate, current_exe: &Path, launcher: &mut impl Launcher) -> Result<()> {
    if let Err(err) = launcher.open(&update.path) {
        warn!("Installer for {} did not open: {:#}", update.version, err);
    }
    info!("Restarting {:?}", current_exe);
    launcher
        .spawn(current_exe, &[])
        .context("failed to restart the shell")
}
