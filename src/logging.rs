use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use env_logger::{Builder, Env, Target};

/// Routes the `log` facade into the shell log file. `RUST_LOG` still wins
/// over the configured default level.
pub fn init_logging(log_file: &Path, debug_mode: bool) -> Result<()> {
    if let Some(parent) = log_file.parent() {
        fs::create_dir_all(parent).context("failed to create log directory")?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("failed to open log file {:?}", log_file))?;

    let default_level = if debug_mode { "debug" } else { "info" };
    Builder::from_env(Env::default().default_filter_or(default_level))
        .target(Target::Pipe(Box::new(file)))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {:<5} {}] {}",
                buf.timestamp_seconds(),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .try_init()
        .context("logger already initialised")?;
    Ok(())
}
