//! Per-root watch state machine
//!
//! Pure and clock-agnostic: every transition takes `now` from the caller, so
//! the debounce rules can be tested with synthetic instants.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchPhase {
    Idle,
    /// Drift observed; waiting for the root to stay quiet for one window.
    Debouncing {
        signature: String,
        last_change: Instant,
    },
    /// A refresh is in flight. Ticks are no-ops until it completes.
    Refreshing { started: Instant },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchAction {
    None,
    /// Observe again at this instant.
    Wait(Instant),
    Refresh,
}

#[derive(Debug, Clone)]
pub struct RootWatch {
    debounce: Duration,
    phase: WatchPhase,
    /// Signature the last completed refresh ran against.
    settled: Option<String>,
}

impl RootWatch {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            phase: WatchPhase::Idle,
            settled: None,
        }
    }

    pub fn phase(&self) -> &WatchPhase {
        &self.phase
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.phase, WatchPhase::Refreshing { .. })
    }

    /// When the debounce window closes, if one is open.
    pub fn deadline(&self) -> Option<Instant> {
        match &self.phase {
            WatchPhase::Debouncing { last_change, .. } => Some(*last_change + self.debounce),
            _ => None,
        }
    }

    /// Feeds one fingerprint observation.
    ///
    /// `dirty` is whether the root differs from the published snapshot;
    /// `signature` identifies the observed file states. A new signature while
    /// debouncing restarts the window.
    pub fn observe(&mut self, now: Instant, dirty: bool, signature: &str) -> WatchAction {
        if self.is_busy() {
            return WatchAction::None;
        }
        if !dirty {
            self.phase = WatchPhase::Idle;
            return WatchAction::None;
        }
        if self.settled.as_deref() == Some(signature) {
            // Already refreshed against exactly these files.
            self.phase = WatchPhase::Idle;
            return WatchAction::None;
        }

        let last_change = match &self.phase {
            WatchPhase::Debouncing {
                signature: pending,
                last_change,
            } if pending == signature => *last_change,
            _ => now,
        };

        if now.saturating_duration_since(last_change) >= self.debounce {
            self.phase = WatchPhase::Refreshing { started: now };
            return WatchAction::Refresh;
        }

        self.phase = WatchPhase::Debouncing {
            signature: signature.to_string(),
            last_change,
        };
        WatchAction::Wait(last_change + self.debounce)
    }

    /// Manual refresh request. Coalesces with one already in flight.
    pub fn request(&mut self, now: Instant) -> WatchAction {
        if self.is_busy() {
            return WatchAction::None;
        }
        self.phase = WatchPhase::Refreshing { started: now };
        WatchAction::Refresh
    }

    /// Marks the in-flight refresh done. `signature` is the root signature
    /// captured right before the rescan, if any.
    pub fn complete(&mut self, signature: Option<String>) {
        self.phase = WatchPhase::Idle;
        self.settled = signature;
    }
}
