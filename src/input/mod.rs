mod tracker;

pub use tracker::{ButtonSnapshot, ButtonState, ButtonStateTracker, StateChange, TrackerUpdate};
