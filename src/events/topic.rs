use std::fmt;
use std::str::FromStr;

use crate::device::validate_button;
use crate::error::PanelError;
use crate::input::ButtonSnapshot;

/// Event category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Press,
    Release,
    State,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Press => "press",
            EventKind::Release => "release",
            EventKind::State => "state",
        }
    }
}

/// What a listener subscribes to: a whole category, or one key within it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Category(EventKind),
    Button(EventKind, u8),
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::Category(kind) => f.write_str(kind.as_str()),
            Topic::Button(kind, button) => write!(f, "{}:{}", kind.as_str(), button),
        }
    }
}

/// Parses `press`, `release`, `state` and per-key forms such as `press:3`.
/// `down` and `up` are accepted for `press` and `release`.
impl FromStr for Topic {
    type Err = PanelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, button) = match s.split_once(':') {
            Some((name, button)) => (name, Some(button)),
            None => (s, None),
        };

        let kind = match name.trim().to_lowercase().as_str() {
            "press" | "down" => EventKind::Press,
            "release" | "up" => EventKind::Release,
            "state" => EventKind::State,
            other => return Err(PanelError::Config(format!("unknown event '{}'", other))),
        };

        match button {
            None => Ok(Topic::Category(kind)),
            Some(_) if kind == EventKind::State => Err(PanelError::Config(
                "'state' cannot be scoped to a button".to_string(),
            )),
            Some(button) => {
                let button: u8 = button
                    .trim()
                    .parse()
                    .map_err(|_| PanelError::Config(format!("invalid button in '{}'", s)))?;
                Ok(Topic::Button(kind, validate_button(button)?))
            }
        }
    }
}

/// Event delivered to listeners
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelEvent {
    /// Logical key went down
    Press(u8),
    /// Logical key came up
    Release(u8),
    /// Full key state after a state report
    State(ButtonSnapshot),
}

impl PanelEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            PanelEvent::Press(_) => EventKind::Press,
            PanelEvent::Release(_) => EventKind::Release,
            PanelEvent::State(_) => EventKind::State,
        }
    }

    pub fn button(&self) -> Option<u8> {
        match self {
            PanelEvent::Press(button) | PanelEvent::Release(button) => Some(*button),
            PanelEvent::State(_) => None,
        }
    }

    /// Per-key topic, fired before the category topic
    pub fn button_topic(&self) -> Option<Topic> {
        self.button().map(|button| Topic::Button(self.kind(), button))
    }

    pub fn category_topic(&self) -> Topic {
        Topic::Category(self.kind())
    }
}
