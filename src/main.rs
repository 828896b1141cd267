#![cfg_attr(all(target_os = "windows", not(debug_assertions)), windows_subsystem = "windows")]

use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "inbox-shell", version, about = "Desktop shell for the hosted webmail client")]
struct Cli {
    /// Start hidden in the tray instead of showing the main window
    #[arg(long)]
    launch_minimized: bool,

    /// Ask the running instance to restart into its staged update
    #[arg(long, hide = true)]
    relaunch_to_update: bool,

    /// mailto: links and activation URLs handed over by the OS
    #[arg(hide = true)]
    urls: Vec<String>,
}

#[cfg(any(target_os = "macos", target_os = "windows"))]
fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut args = cli.urls;
    if cli.relaunch_to_update {
        args.push(inbox_shell::update::relaunch::RELAUNCH_FLAG.to_string());
    }
    inbox_shell::run(cli.launch_minimized, args)
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn main() -> Result<()> {
    let _ = Cli::parse();
    anyhow::bail!("{} only runs on macOS and Windows", inbox_shell::APP_NAME)
}
