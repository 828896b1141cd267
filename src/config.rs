use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, after, never, select};
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use crate::APP_DIR;
use crate::model::{DarkMode, ReleaseChannel, WindowState};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub last_window_state: WindowState,
    /// `None` until the user has answered the first-run theme prompt.
    #[serde(default)]
    pub dark_mode: Option<DarkMode>,
    #[serde(default)]
    pub release_channel: ReleaseChannel,
    #[serde(default = "default_auto_update")]
    pub auto_update: bool,
    #[serde(default)]
    pub trusted_hosts: Vec<String>,
    #[serde(default = "default_confirm_external_links")]
    pub confirm_external_links: bool,
    #[serde(default = "default_enable_tray_icon")]
    pub enable_tray_icon: bool,
    #[serde(default = "default_show_dock_icon")]
    pub show_dock_icon: bool,
    #[serde(default)]
    pub custom_user_agent: Option<String>,
    #[serde(default)]
    pub minimize_on_exit: bool,
    #[serde(default)]
    pub launch_minimized: bool,
    #[serde(default)]
    pub debug_mode: bool,
    #[serde(default)]
    pub custom_styles: BTreeMap<String, bool>,
}

fn default_auto_update() -> bool {
    true
}

fn default_confirm_external_links() -> bool {
    true
}

fn default_enable_tray_icon() -> bool {
    true
}

fn default_show_dock_icon() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            last_window_state: WindowState::default(),
            dark_mode: None,
            release_channel: ReleaseChannel::default(),
            auto_update: default_auto_update(),
            trusted_hosts: Vec::new(),
            confirm_external_links: default_confirm_external_links(),
            enable_tray_icon: default_enable_tray_icon(),
            show_dock_icon: default_show_dock_icon(),
            custom_user_agent: None,
            minimize_on_exit: false,
            launch_minimized: false,
            debug_mode: false,
            custom_styles: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Builds a config from arbitrary JSON, keeping every key that parses and
    /// falling back to the default for each key that does not.
    pub fn from_value(raw: Value) -> Config {
        let Value::Object(entries) = raw else {
            warn!("Config root is not an object, using defaults");
            return Config::default();
        };

        let mut merged = match serde_json::to_value(Config::default()) {
            Ok(Value::Object(map)) => map,
            _ => return Config::default(),
        };

        for (key, value) in entries {
            let mut candidate: Map<String, Value> = merged.clone();
            candidate.insert(key.clone(), value);
            if serde_json::from_value::<Config>(Value::Object(candidate.clone())).is_ok() {
                merged = candidate;
            } else {
                warn!("Ignoring malformed config key '{}'", key);
            }
        }

        let mut config: Config = serde_json::from_value(Value::Object(merged)).unwrap_or_default();
        config.sanitize();
        config
    }

    /// Drops trusted-host entries that are not plain origins.
    fn sanitize(&mut self) {
        let before = self.trusted_hosts.len();
        self.trusted_hosts.retain(|entry| origin_of(entry).as_deref() == Some(entry.as_str()));
        self.trusted_hosts.dedup();
        if self.trusted_hosts.len() != before {
            warn!(
                "Dropped {} malformed trusted host entries",
                before - self.trusted_hosts.len()
            );
        }
        if matches!(self.custom_user_agent.as_deref(), Some(ua) if ua.trim().is_empty()) {
            self.custom_user_agent = None;
        }
    }

    pub fn is_trusted(&self, origin: &str) -> bool {
        self.trusted_hosts.iter().any(|host| host == origin)
    }
}

/// `scheme://host[:port]` of a URL, or `None` for opaque or unparsable input.
pub fn origin_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let origin = parsed.origin();
    if origin.is_tuple() {
        Some(origin.ascii_serialization())
    } else {
        None
    }
}

pub fn get_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("config.json")
}

/// Reads the config file. A missing, truncated or malformed file yields defaults.
pub fn load_config(path: &Path) -> Config {
    if !path.exists() {
        debug!("No config at {:?}, using defaults", path);
        return Config::default();
    }
    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<Value>(&content) {
            Ok(raw) => Config::from_value(raw),
            Err(err) => {
                warn!("Config file {:?} is not valid JSON ({}), using defaults", path, err);
                Config::default()
            }
        },
        Err(err) => {
            warn!("Failed to read config file {:?}: {}", path, err);
            Config::default()
        }
    }
}

pub fn save_config(path: &Path, config: &Config) -> Result<()> {
    let content = render_config(config)?;
    write_config_file(path, &content)
}

fn render_config(config: &Config) -> Result<String> {
    serde_json::to_string_pretty(config).context("failed to serialize config")
}

fn write_config_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create config directory")?;
    }
    let staging = path.with_extension("json.tmp");
    fs::write(&staging, content).context("failed to write config file")?;
    fs::rename(&staging, path).context("failed to replace config file")?;
    Ok(())
}

/// Result of [`ConfigStore::reload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reload {
    Applied,
    /// The file holds exactly what this store last wrote.
    Unchanged,
}

/// Process-wide configuration handle. Each `get`/`set` is one atomic
/// single-key operation; `set` persists immediately.
#[derive(Clone, Debug)]
pub struct ConfigStore {
    inner: Arc<RwLock<Config>>,
    /// Held across mutate+save and read+replace, so reloads and writes
    /// never interleave. Remembers the last content written to disk.
    disk: Arc<Mutex<Option<String>>>,
    path: Option<PathBuf>,
}

impl ConfigStore {
    pub fn open(path: PathBuf) -> Self {
        let config = load_config(&path);
        Self {
            inner: Arc::new(RwLock::new(config)),
            disk: Arc::new(Mutex::new(None)),
            path: Some(path),
        }
    }

    /// A store that never touches the disk.
    pub fn in_memory(config: Config) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
            disk: Arc::new(Mutex::new(None)),
            path: None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get<T>(&self, read: impl FnOnce(&Config) -> T) -> T {
        let guard = self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        read(&guard)
    }

    pub fn snapshot(&self) -> Config {
        self.get(Config::clone)
    }

    /// Applies `write` and persists the result. Persistence failures are logged.
    pub fn set(&self, write: impl FnOnce(&mut Config)) {
        let mut written = self.disk.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let snapshot = {
            let mut guard = self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner());
            write(&mut guard);
            guard.clone()
        };
        let Some(path) = &self.path else {
            return;
        };
        let saved = render_config(&snapshot).and_then(|content| {
            write_config_file(path, &content)?;
            Ok(content)
        });
        match saved {
            Ok(content) => *written = Some(content),
            Err(err) => error!("Failed to save config: {:#}", err),
        }
    }

    /// Re-reads the backing file after an external edit. The store's own
    /// saves come back as [`Reload::Unchanged`] and leave memory alone.
    pub fn reload(&self) -> Result<Reload> {
        let path = self.path.as_ref().context("config store has no backing file")?;
        let written = self.disk.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let content = fs::read_to_string(path).context("failed to read config file")?;
        if written.as_deref() == Some(content.as_str()) {
            return Ok(Reload::Unchanged);
        }
        let raw: Value = serde_json::from_str(&content).context("failed to parse config file")?;
        let config = Config::from_value(raw);
        let mut guard = self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = config;
        Ok(Reload::Applied)
    }
}

/// Coalesces bursts of file events: `on_settled` runs once `quiet` has passed
/// since the last event. Returns when the event sender goes away or
/// `on_settled` returns `false`.
pub fn debounce_events<T>(events: &Receiver<T>, quiet: Duration, mut on_settled: impl FnMut() -> bool) {
    let mut deadline = never();
    loop {
        select! {
            recv(events) -> event => match event {
                Ok(_) => deadline = after(quiet),
                Err(_) => return,
            },
            recv(deadline) -> _ => {
                deadline = never();
                if !on_settled() {
                    return;
                }
            }
        }
    }
}
