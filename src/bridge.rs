//! Unread-count gate and bounded waits for on-page elements.
//!
//! The page script counts unread mail itself (on load, on title changes and
//! on a one-second poll) and only reports changes. Its memory is lost on every
//! reload, so the shell keeps one [`UnreadGate`] in front of the tray as well.
//! Element waits poll the page until the element shows up or a timeout
//! abandons the wait.

use std::collections::HashMap;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, after, select, tick};
use log::{debug, error};
use serde_json::Value;

use crate::model::WindowRole;

pub const UNREAD_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const ELEMENT_WAIT_TIMEOUT: Duration = Duration::from_secs(10);
pub const ELEMENT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Archive and Delete buttons of a reply opened from a notification.
pub const CLOSE_BUTTON_SELECTORS: [&str; 2] = ["body.xE .G-atb .lR", "body.xE .G-atb .nX"];

pub fn element_presence_script(selector: &str) -> String {
    format!(
        "window.__shell ? window.__shell.hasElement({}) : false",
        Value::String(selector.to_string())
    )
}

pub fn close_on_click_script(selector: &str) -> String {
    format!(
        "window.__shell && window.__shell.closeOnClick({});",
        Value::String(selector.to_string())
    )
}

/// Satellite windows opened on an inbox search get close-on-handle buttons.
pub fn wants_close_buttons(url: &str) -> bool {
    url.split_once('?')
        .map(|(_, query)| query.contains("search=inbox"))
        .unwrap_or(false)
}

/// Script results arrive JSON-encoded; anything else is taken verbatim.
pub fn decode_script_result(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Last-seen-value gate in front of the tray.
#[derive(Debug, Default)]
pub struct UnreadGate {
    last: Option<u32>,
}

impl UnreadGate {
    /// Returns the count when it differs from the previous observation.
    /// The first observation always passes.
    pub fn observe(&mut self, count: u32) -> Option<u32> {
        if self.last == Some(count) {
            return None;
        }
        self.last = Some(count);
        Some(count)
    }

    pub fn last(&self) -> Option<u32> {
        self.last
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Found,
    TimedOut,
    /// The reporting side went away (window closed).
    Abandoned,
}

/// Asks via `query` every `poll_every` until `found` reports `true`, giving
/// up after `timeout`. Blocks the calling worker thread.
pub fn wait_for_element(
    selector: &str,
    timeout: Duration,
    poll_every: Duration,
    found: &Receiver<bool>,
    mut query: impl FnMut(),
) -> WaitOutcome {
    let ticker = tick(poll_every);
    let deadline = after(timeout);
    query();
    loop {
        select! {
            recv(found) -> present => match present {
                Ok(true) => return WaitOutcome::Found,
                Ok(false) => {}
                Err(_) => return WaitOutcome::Abandoned,
            },
            recv(ticker) -> _ => query(),
            recv(deadline) -> _ => {
                error!("Detect button \"{}\" timed out", selector);
                return WaitOutcome::TimedOut;
            }
        }
    }
}

/// Routes presence answers from the event loop to the waiting workers.
#[derive(Default)]
pub struct ElementWaits {
    pending: HashMap<(WindowRole, String), Sender<bool>>,
}

impl ElementWaits {
    pub fn register(&mut self, role: WindowRole, selector: &str) -> Receiver<bool> {
        let (tx, rx) = crossbeam_channel::bounded(1);
        self.pending.insert((role, selector.to_string()), tx);
        rx
    }

    /// Forwards a presence answer. Finished or abandoned waits are forgotten.
    pub fn report(&mut self, role: WindowRole, selector: &str, present: bool) {
        let key = (role, selector.to_string());
        let Some(tx) = self.pending.get(&key) else {
            return;
        };
        let delivered = match tx.try_send(present) {
            Ok(()) => true,
            // Previous answer not consumed yet; this one is redundant.
            Err(crossbeam_channel::TrySendError::Full(_)) => true,
            Err(crossbeam_channel::TrySendError::Disconnected(_)) => false,
        };
        if present || !delivered {
            debug!("Element wait for {:?} on {:?} finished", selector, role);
            self.pending.remove(&key);
        }
    }

    /// Drops every wait of a closed window, abandoning its workers.
    pub fn forget_window(&mut self, role: WindowRole) {
        self.pending.retain(|(owner, _), _| *owner != role);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
