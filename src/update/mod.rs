//! Background update orchestration.
//!
//! The orchestrator is a pure state machine (Idle, Checking, Staged). It never
//! performs I/O itself: starting a check yields a [`CheckRequest`] that a
//! worker thread runs against a [`ReleaseSource`], and the worker's answer is
//! fed back through [`UpdateOrchestrator::on_check_result`]. Every request
//! carries a generation number so results of superseded checks are dropped.

pub mod github;
pub mod relaunch;
pub mod version;

use std::time::Duration;

use log::{debug, info, warn};

use crate::config::ConfigStore;
use crate::model::{Notification, NotificationAction, ReleaseChannel, StagedUpdate};
use crate::session::ShellSession;

pub use version::Version;

pub const UPDATE_CHECK_INTERVAL: Duration = Duration::from_secs(3 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckTrigger {
    Scheduled,
    Manual,
    ChannelSwitch,
    Reconcile,
}

impl CheckTrigger {
    /// Whether a "no update" result is acknowledged to the user.
    fn is_user_initiated(self) -> bool {
        matches!(self, CheckTrigger::Manual | CheckTrigger::ChannelSwitch)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateState {
    Idle,
    Checking {
        trigger: CheckTrigger,
        /// Build that stays staged if this check finds nothing or fails.
        previous: Option<StagedUpdate>,
    },
    Staged(StagedUpdate),
}

/// Work order for the update worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckRequest {
    pub generation: u64,
    pub current: Version,
    pub allow_prerelease: bool,
    pub allow_downgrade: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    NoUpdate,
    Staged(StagedUpdate),
}

/// Anything able to answer a check request, downloading the build when one is found.
pub trait ReleaseSource {
    fn check(&self, request: &CheckRequest) -> anyhow::Result<CheckOutcome>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateSignal {
    Check(CheckRequest),
    Notify(Notification),
    /// Informational answer to a user-initiated check.
    Acknowledge(String),
}

pub struct UpdateOrchestrator {
    state: UpdateState,
    generation: u64,
    allow_prerelease: bool,
    allow_downgrade: bool,
    last_notified: Option<String>,
    current: Version,
    config: ConfigStore,
}

impl UpdateOrchestrator {
    pub fn new(session: &ShellSession) -> Self {
        Self {
            state: UpdateState::Idle,
            generation: 0,
            // The updater's own default: prereleases only when running one.
            allow_prerelease: session.version.is_prerelease(),
            allow_downgrade: false,
            last_notified: None,
            current: session.version.clone(),
            config: session.config.clone(),
        }
    }

    pub fn state(&self) -> &UpdateState {
        &self.state
    }

    pub fn allow_prerelease(&self) -> bool {
        self.allow_prerelease
    }

    pub fn staged(&self) -> Option<&StagedUpdate> {
        match &self.state {
            UpdateState::Staged(update) => Some(update),
            _ => None,
        }
    }

    /// Aligns the prerelease flag with the persisted channel. A mismatch costs
    /// one corrective check; otherwise the usual startup check runs when
    /// automatic updates are on.
    pub fn reconcile_on_startup(&mut self) -> Vec<UpdateSignal> {
        let channel = self.config.get(|c| c.release_channel);
        if channel.allows_prerelease() != self.allow_prerelease {
            info!(
                "Release channel is {} but prerelease flag was {}, reconciling",
                channel, self.allow_prerelease
            );
            self.allow_prerelease = channel.allows_prerelease();
            return self.begin(CheckTrigger::Reconcile, None);
        }
        if self.config.get(|c| c.auto_update) {
            return self.begin(CheckTrigger::Scheduled, None);
        }
        Vec::new()
    }

    /// Periodic timer. Only an idle orchestrator starts a check.
    pub fn tick(&mut self) -> Vec<UpdateSignal> {
        if !self.config.get(|c| c.auto_update) {
            return Vec::new();
        }
        match self.state {
            UpdateState::Idle => self.begin(CheckTrigger::Scheduled, None),
            _ => {
                debug!("Skipping scheduled update check in state {:?}", self.state);
                Vec::new()
            }
        }
    }

    pub fn check_now(&mut self) -> Vec<UpdateSignal> {
        match &self.state {
            UpdateState::Idle => self.begin(CheckTrigger::Manual, None),
            UpdateState::Staged(update) => {
                let previous = Some(update.clone());
                self.begin(CheckTrigger::Manual, previous)
            }
            UpdateState::Checking { .. } => {
                debug!("Update check already in progress, its result will be acknowledged");
                if let UpdateState::Checking { trigger, .. } = &mut self.state
                    && !trigger.is_user_initiated()
                {
                    *trigger = CheckTrigger::Manual;
                }
                Vec::new()
            }
        }
    }

    /// Switching channel always forces a fresh check, from any state, and
    /// forgets any build staged for the old channel.
    pub fn switch_channel(&mut self, channel: ReleaseChannel) -> Vec<UpdateSignal> {
        if self.config.get(|c| c.release_channel) == channel {
            return Vec::new();
        }
        info!("Switching release channel to {}", channel);
        self.config.set(|c| c.release_channel = channel);
        self.allow_prerelease = channel.allows_prerelease();
        self.allow_downgrade = true;
        self.begin(CheckTrigger::ChannelSwitch, None)
    }

    pub fn on_check_result(
        &mut self,
        generation: u64,
        outcome: Result<CheckOutcome, String>,
    ) -> Vec<UpdateSignal> {
        if generation != self.generation {
            debug!(
                "Ignoring result of superseded update check {} (current {})",
                generation, self.generation
            );
            return Vec::new();
        }
        let UpdateState::Checking { trigger, previous } =
            std::mem::replace(&mut self.state, UpdateState::Idle)
        else {
            debug!("Ignoring update result outside of a check");
            return Vec::new();
        };

        match outcome {
            Ok(CheckOutcome::Staged(update)) => {
                let already_notified = self.last_notified.as_deref() == Some(update.version.as_str());
                self.state = UpdateState::Staged(update.clone());
                if already_notified {
                    debug!("Build {} is already staged and announced", update.version);
                    return Vec::new();
                }
                info!("Update {} staged at {:?}", update.version, update.path);
                self.last_notified = Some(update.version.clone());
                vec![UpdateSignal::Notify(
                    Notification::new(
                        "Update available",
                        format!("Version {} is ready. Restart to apply it.", update.version),
                    )
                    .with_action(NotificationAction::RelaunchToUpdate),
                )]
            }
            Ok(CheckOutcome::NoUpdate) => {
                self.restore(previous);
                if trigger.is_user_initiated() {
                    let channel = ReleaseChannel::from_prerelease_flag(self.allow_prerelease);
                    vec![UpdateSignal::Acknowledge(format!(
                        "You are running the latest {} version ({}).",
                        channel, self.current
                    ))]
                } else {
                    Vec::new()
                }
            }
            Err(err) => {
                warn!("Update check ({:?}) failed: {}", trigger, err);
                self.restore(previous);
                vec![UpdateSignal::Notify(
                    Notification::new(
                        "Check for updates failed",
                        "View the logs for more information",
                    )
                    .with_action(NotificationAction::ViewLogs),
                )]
            }
        }
    }

    fn restore(&mut self, previous: Option<StagedUpdate>) {
        self.state = match previous {
            Some(update) => UpdateState::Staged(update),
            None => UpdateState::Idle,
        };
    }

    fn begin(&mut self, trigger: CheckTrigger, previous: Option<StagedUpdate>) -> Vec<UpdateSignal> {
        self.generation += 1;
        self.state = UpdateState::Checking { trigger, previous };
        debug!("Starting update check {} ({:?})", self.generation, trigger);
        vec![UpdateSignal::Check(CheckRequest {
            generation: self.generation,
            current: self.current.clone(),
            allow_prerelease: self.allow_prerelease,
            allow_downgrade: self.allow_downgrade,
        })]
    }
}
