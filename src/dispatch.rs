//! Event-kind → handler table driving the shell.
//!
//! Native callbacks never touch shell state directly: they translate into a
//! [`ShellEvent`](crate::shell::ShellEvent) and the table picks the handler.
//! Tests invoke the same table with synthetic events.

use std::collections::HashMap;

use anyhow::{Result, anyhow};

use crate::shell::{Shell, ShellEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShellEventKind {
    ShowRequested,
    HideRequested,
    Minimized,
    Restored,
    CloseRequested,
    SecondInstance,
    OpenUrl,
    NewWindowRequested,
    ExternalLinkAnswered,
    PageMessage,
    PageLoaded,
    ThemeChanged,
    FullScreenChanged,
    UpdateTick,
    CheckForUpdates,
    SwitchChannel,
    UpdateChecked,
    RelaunchToUpdate,
    ViewLogs,
    PageCommand,
    ToggleDockIcon,
    DarkModeChosen,
    SatelliteClosed,
    ConfigReloaded,
    Quit,
}

pub type Handler = fn(&mut Shell, ShellEvent) -> Result<()>;

#[derive(Default)]
pub struct DispatchTable {
    handlers: HashMap<ShellEventKind, Handler>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `kind`, replacing any previous one.
    pub fn register(&mut self, kind: ShellEventKind, handler: Handler) -> &mut Self {
        self.handlers.insert(kind, handler);
        self
    }

    pub fn handles(&self, kind: ShellEventKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    pub fn handler(&self, kind: ShellEventKind) -> Result<Handler> {
        self.handlers
            .get(&kind)
            .copied()
            .ok_or_else(|| anyhow!("no handler registered for {:?}", kind))
    }
}

/// Error for a handler that received an event of another kind.
pub fn unexpected(expected: ShellEventKind, event: &ShellEvent) -> anyhow::Error {
    anyhow!("{:?} handler received {:?}", expected, event.kind())
}
