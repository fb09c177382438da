mod dispatcher;
mod throttle;
mod topic;

pub use dispatcher::{EventDispatcher, Handler, SubscriptionId};
pub use throttle::{ThrottlePolicy, DEFAULT_THROTTLE_INTERVAL};
pub use topic::{EventKind, PanelEvent, Topic};
