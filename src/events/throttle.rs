//! Per-listener rate limiting.
//!
//! A window opens on the first call after the previous window has expired and
//! lasts `interval`. With `leading`, the opening call runs at once. Calls inside
//! an open window are suppressed; with `trailing`, the latest of them (or the
//! opening call, when `leading` is off) runs once when the window closes, and
//! that run opens the next window. A call that arrives once the window has
//! closed but before the trailing run happened replaces that run. With neither
//! edge the listener never runs.

use std::time::Duration;
use tokio::time::Instant;

use super::topic::PanelEvent;

pub const DEFAULT_THROTTLE_INTERVAL: Duration = Duration::from_millis(200);

/// How often a listener may run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottlePolicy {
    pub enabled: bool,
    pub interval: Duration,
    pub leading: bool,
    pub trailing: bool,
}

impl Default for ThrottlePolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: DEFAULT_THROTTLE_INTERVAL,
            leading: true,
            trailing: false,
        }
    }
}

impl ThrottlePolicy {
    /// Run on every event
    pub fn none() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_leading(mut self, leading: bool) -> Self {
        self.leading = leading;
        self
    }

    pub fn with_trailing(mut self, trailing: bool) -> Self {
        self.trailing = trailing;
        self
    }

    /// Throttled with both edges off: such a listener never fires
    pub fn is_silent(&self) -> bool {
        self.enabled && !self.leading && !self.trailing
    }
}

/// Outcome of one throttled call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Decision {
    Run,
    /// Arm a trailing timer for this deadline; the id is handed back to `on_timer`
    Schedule(Instant, u64),
    Suppress,
}

#[derive(Debug, Default)]
pub(crate) struct ThrottleState {
    window_end: Option<Instant>,
    pending: Option<PanelEvent>,
    /// Id of the live trailing timer
    armed: Option<u64>,
    next_timer: u64,
}

impl ThrottleState {
    pub(crate) fn on_call(
        &mut self,
        policy: &ThrottlePolicy,
        now: Instant,
        event: &PanelEvent,
    ) -> Decision {
        match self.window_end {
            Some(end) if now < end => {
                if policy.trailing {
                    self.pending = Some(event.clone());
                    self.arm(end)
                } else {
                    Decision::Suppress
                }
            }
            _ => {
                let end = now + policy.interval;
                self.window_end = Some(end);

                // The trailing timer is overdue: this call is the latest, so it
                // runs in place of the stale pending one
                if self.armed.take().is_some() && self.pending.take().is_some() {
                    return Decision::Run;
                }

                if policy.leading {
                    Decision::Run
                } else if policy.trailing {
                    self.pending = Some(event.clone());
                    self.arm(end)
                } else {
                    Decision::Suppress
                }
            }
        }
    }

    /// Trailing deadline reached: hand back the call to run, if any.
    ///
    /// A timer that has been superseded or cleared gets nothing.
    pub(crate) fn on_timer(
        &mut self,
        policy: &ThrottlePolicy,
        now: Instant,
        timer: u64,
    ) -> Option<PanelEvent> {
        if self.armed != Some(timer) {
            return None;
        }
        self.armed = None;
        let event = self.pending.take()?;
        self.window_end = Some(now + policy.interval);
        Some(event)
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Drop any pending trailing call
    pub(crate) fn clear_pending(&mut self) {
        self.pending = None;
        self.armed = None;
    }

    fn arm(&mut self, at: Instant) -> Decision {
        if self.armed.is_some() {
            return Decision::Suppress;
        }
        self.next_timer += 1;
        self.armed = Some(self.next_timer);
        Decision::Schedule(at, self.next_timer)
    }
}
