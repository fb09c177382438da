use serde::Serialize;
use tracing::{debug, warn};

use crate::device::{raw_to_logical, BUTTON_COUNT, BUTTON_STATE_REPORT_ID};

/// Hardware state of one key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonState {
    Pressed,
    #[default]
    Released,
}

impl ButtonState {
    pub fn is_pressed(self) -> bool {
        self == ButtonState::Pressed
    }
}

impl From<bool> for ButtonState {
    fn from(pressed: bool) -> Self {
        if pressed {
            ButtonState::Pressed
        } else {
            ButtonState::Released
        }
    }
}

/// Last known state of every key, indexed by logical number
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ButtonSnapshot {
    states: [ButtonState; BUTTON_COUNT as usize],
}

impl ButtonSnapshot {
    /// State of a logical key; `None` outside 1..=BUTTON_COUNT
    pub fn get(&self, button: u8) -> Option<ButtonState> {
        let index = usize::from(button).checked_sub(1)?;
        self.states.get(index).copied()
    }

    /// Logical numbers of the keys currently held down
    pub fn pressed(&self) -> Vec<u8> {
        self.iter()
            .filter(|(_, state)| state.is_pressed())
            .map(|(button, _)| button)
            .collect()
    }

    /// `(logical number, state)` pairs in logical order
    pub fn iter(&self) -> impl Iterator<Item = (u8, ButtonState)> + '_ {
        self.states
            .iter()
            .enumerate()
            .map(|(i, &state)| (i as u8 + 1, state))
    }
}

/// One edge detected in a state report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    /// Logical key number
    pub button: u8,
    pub pressed: bool,
}

/// Result of feeding one key state report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerUpdate {
    /// Edges in raw (wire) order
    pub changes: Vec<StateChange>,
    pub snapshot: ButtonSnapshot,
}

/// Turns polled key state reports into press/release edges
#[derive(Debug, Default)]
pub struct ButtonStateTracker {
    snapshot: ButtonSnapshot,
}

impl ButtonStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> &ButtonSnapshot {
        &self.snapshot
    }

    /// Process one input report.
    ///
    /// Returns `None` for reports that are not key state reports or are too
    /// short to carry every key.
    pub fn on_raw_report(&mut self, data: &[u8]) -> Option<TrackerUpdate> {
        match data.first() {
            Some(&BUTTON_STATE_REPORT_ID) => {}
            Some(&id) => {
                debug!("Ignoring input report 0x{:02x}", id);
                return None;
            }
            None => return None,
        }

        if data.len() < 1 + BUTTON_COUNT as usize {
            warn!("Truncated key state report ({} bytes)", data.len());
            return None;
        }

        let mut changes = Vec::new();
        for raw in 1..=BUTTON_COUNT {
            // Table lookup over 1..=BUTTON_COUNT cannot fail
            let Ok(button) = raw_to_logical(raw) else {
                continue;
            };
            let state = ButtonState::from(data[raw as usize] != 0);
            let slot = &mut self.snapshot.states[(button - 1) as usize];
            if *slot != state {
                *slot = state;
                debug!(
                    "Button {} {}",
                    button,
                    if state.is_pressed() { "pressed" } else { "released" }
                );
                changes.push(StateChange {
                    button,
                    pressed: state.is_pressed(),
                });
            }
        }

        Some(TrackerUpdate {
            changes,
            snapshot: self.snapshot.clone(),
        })
    }
}
