use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::throttle::{Decision, ThrottlePolicy, ThrottleState};
use super::topic::{PanelEvent, Topic};

/// Listener callback
pub type Handler = Arc<dyn Fn(&PanelEvent) + Send + Sync>;

/// Handle returned by [`EventDispatcher::subscribe`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

struct Registration {
    id: SubscriptionId,
    topic: Topic,
    handler: Handler,
    policy: ThrottlePolicy,
    slot: Mutex<ThrottleSlot>,
}

#[derive(Default)]
struct ThrottleSlot {
    state: ThrottleState,
    timer: Option<JoinHandle<()>>,
    cancelled: bool,
}

impl Registration {
    fn slot(&self) -> MutexGuard<'_, ThrottleSlot> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn cancel(&self) {
        let mut slot = self.slot();
        slot.cancelled = true;
        slot.state.clear_pending();
        if let Some(timer) = slot.timer.take() {
            timer.abort();
        }
    }
}

/// Topic -> listeners, with per-listener throttling.
///
/// Listeners for a key-scoped topic run before listeners for its category;
/// within each group they run in subscription order.
#[derive(Default)]
pub struct EventDispatcher {
    registrations: Mutex<Vec<Arc<Registration>>>,
    next_id: AtomicU64,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn registrations(&self) -> MutexGuard<'_, Vec<Arc<Registration>>> {
        self.registrations.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn subscribe<F>(&self, topic: Topic, handler: F, policy: ThrottlePolicy) -> SubscriptionId
    where
        F: Fn(&PanelEvent) + Send + Sync + 'static,
    {
        if policy.is_silent() {
            warn!(
                "Listener for '{}' is throttled with neither leading nor trailing edge and will never fire",
                topic
            );
        }

        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.registrations().push(Arc::new(Registration {
            id,
            topic,
            handler: Arc::new(handler),
            policy,
            slot: Mutex::new(ThrottleSlot::default()),
        }));
        debug!("Subscribed {:?} to '{}'", id, topic);
        id
    }

    /// Remove one listener and cancel its pending trailing call
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = {
            let mut registrations = self.registrations();
            registrations
                .iter()
                .position(|r| r.id == id)
                .map(|index| registrations.remove(index))
        };
        match removed {
            Some(registration) => {
                registration.cancel();
                true
            }
            None => false,
        }
    }

    /// Remove every listener and cancel all pending trailing calls
    pub fn unsubscribe_all(&self) {
        let removed: Vec<_> = self.registrations().drain(..).collect();
        for registration in &removed {
            registration.cancel();
        }
        debug!("Removed {} listeners", removed.len());
    }

    pub fn len(&self) -> usize {
        self.registrations().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations().is_empty()
    }

    /// Deliver an event to every matching listener
    pub fn publish(&self, event: &PanelEvent) {
        let targets: Vec<Arc<Registration>> = {
            let registrations = self.registrations();
            let button_topic = event.button_topic();
            let category_topic = event.category_topic();
            registrations
                .iter()
                .filter(|r| Some(r.topic) == button_topic)
                .chain(registrations.iter().filter(|r| r.topic == category_topic))
                .cloned()
                .collect()
        };

        // Handlers run without the registration lock so they may (un)subscribe
        for registration in targets {
            Self::invoke(&registration, event);
        }
    }

    fn invoke(registration: &Arc<Registration>, event: &PanelEvent) {
        let decision = {
            let mut slot = registration.slot();
            // Removed earlier in this publish
            if slot.cancelled {
                return;
            }
            if !registration.policy.enabled {
                Decision::Run
            } else {
                let decision = slot
                    .state
                    .on_call(&registration.policy, Instant::now(), event);
                if !slot.state.is_armed() {
                    if let Some(timer) = slot.timer.take() {
                        timer.abort();
                    }
                }
                decision
            }
        };

        match decision {
            Decision::Run => (registration.handler)(event),
            Decision::Suppress => {}
            Decision::Schedule(deadline, timer) => {
                Self::schedule_trailing(registration, deadline, timer)
            }
        }
    }

    fn schedule_trailing(registration: &Arc<Registration>, deadline: Instant, timer_id: u64) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(
                "No async runtime, dropping trailing call for '{}'",
                registration.topic
            );
            registration.slot().state.clear_pending();
            return;
        };

        let task_registration = registration.clone();
        let timer = runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let event = {
                let mut slot = task_registration.slot();
                if slot.cancelled {
                    return;
                }
                let event =
                    slot.state
                        .on_timer(&task_registration.policy, Instant::now(), timer_id);
                if !slot.state.is_armed() {
                    slot.timer = None;
                }
                event
            };
            if let Some(event) = event {
                (task_registration.handler)(&event);
            }
        });

        let mut slot = registration.slot();
        if slot.cancelled || !slot.state.is_armed() {
            timer.abort();
        } else if !timer.is_finished() {
            slot.timer = Some(timer);
        }
    }
}
