pub mod activity;
pub mod events;
pub mod notifier;
pub mod scheduler;
pub mod trade_actions;

use std::sync::Arc;

use activity::{ActivitySink, TracingActivitySink};
use events::{EventSink, NoopEventSink};
use notifier::{NoopNotifier, NotificationSink};

/// Outbound collaborators shared by the dispatcher, shift machine and trade
/// actions. None of them can fail the operation that calls them.
#[derive(Clone)]
pub struct Sinks {
    pub notifier: Arc<dyn NotificationSink>,
    pub events: Arc<dyn EventSink>,
    pub activity: Arc<dyn ActivitySink>,
}

impl Sinks {
    pub fn new(
        notifier: Arc<dyn NotificationSink>,
        events: Arc<dyn EventSink>,
        activity: Arc<dyn ActivitySink>,
    ) -> Self {
        Self {
            notifier,
            events,
            activity,
        }
    }

    /// Sinks that drop everything except log output.
    pub fn noop() -> Self {
        Self {
            notifier: Arc::new(NoopNotifier),
            events: Arc::new(NoopEventSink),
            activity: Arc::new(TracingActivitySink),
        }
    }
}
