//! Synchronous extension points.
//!
//! External modules observe core lifecycle moments through [`CoreObserver`].
//! Notifications are fire-and-forget: no return value affects control flow,
//! and every observer runs on the calling thread before the notifying
//! operation returns.

use parking_lot::RwLock;
use std::sync::Arc;

/// Observer over core lifecycle events.
///
/// Every method has a no-op default so implementations subscribe only to
/// what they care about.
pub trait CoreObserver: Send + Sync {
    /// A new server was introduced into the tree.
    fn on_new_server(&self, _name: &str, _sid: &str) {}

    /// A server finished its burst.
    fn on_server_sync(&self, _name: &str, _sid: &str) {}

    /// A server directly uplinked to us finished its burst.
    fn on_uplink_sync(&self, _name: &str, _sid: &str) {}

    /// Fired just before end-of-burst is signalled for a direct uplink.
    fn on_pre_uplink_sync(&self, _name: &str, _sid: &str) {}

    /// A registered nickname alias was deleted.
    fn on_nick_deleted(&self, _nick: &str) {}

    /// A pending nickname registration request was deleted.
    fn on_nick_request_deleted(&self, _nick: &str) {}
}

/// Registry of subscribed observers.
#[derive(Default)]
pub struct HookBus {
    observers: RwLock<Vec<Arc<dyn CoreObserver>>>,
}

impl HookBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe an observer for the life of the process.
    pub fn subscribe(&self, observer: Arc<dyn CoreObserver>) {
        self.observers.write().push(observer);
    }

    fn each(&self, f: impl Fn(&dyn CoreObserver)) {
        for obs in self.observers.read().iter() {
            f(obs.as_ref());
        }
    }

    pub fn notify_new_server(&self, name: &str, sid: &str) {
        self.each(|o| o.on_new_server(name, sid));
    }

    pub fn notify_server_sync(&self, name: &str, sid: &str) {
        self.each(|o| o.on_server_sync(name, sid));
    }

    pub fn notify_uplink_sync(&self, name: &str, sid: &str) {
        self.each(|o| o.on_uplink_sync(name, sid));
    }

    pub fn notify_pre_uplink_sync(&self, name: &str, sid: &str) {
        self.each(|o| o.on_pre_uplink_sync(name, sid));
    }

    pub fn notify_nick_deleted(&self, nick: &str) {
        self.each(|o| o.on_nick_deleted(nick));
    }

    pub fn notify_nick_request_deleted(&self, nick: &str) {
        self.each(|o| o.on_nick_request_deleted(nick));
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::CoreObserver;
    use parking_lot::Mutex;

    /// Records every notification it receives, in order.
    #[derive(Default)]
    pub struct RecordingObserver {
        pub events: Mutex<Vec<String>>,
    }

    impl RecordingObserver {
        fn push(&self, event: String) {
            self.events.lock().push(event);
        }
    }

    impl CoreObserver for RecordingObserver {
        fn on_new_server(&self, name: &str, _sid: &str) {
            self.push(format!("new-server {name}"));
        }
        fn on_server_sync(&self, name: &str, _sid: &str) {
            self.push(format!("server-sync {name}"));
        }
        fn on_uplink_sync(&self, name: &str, _sid: &str) {
            self.push(format!("uplink-sync {name}"));
        }
        fn on_pre_uplink_sync(&self, name: &str, _sid: &str) {
            self.push(format!("pre-uplink-sync {name}"));
        }
        fn on_nick_deleted(&self, nick: &str) {
            self.push(format!("nick-deleted {nick}"));
        }
        fn on_nick_request_deleted(&self, nick: &str) {
            self.push(format!("nick-request-deleted {nick}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingObserver;
    use super::*;

    #[test]
    fn observers_fire_in_subscription_order() {
        let bus = HookBus::new();
        let first = Arc::new(RecordingObserver::default());
        let second = Arc::new(RecordingObserver::default());
        bus.subscribe(first.clone());
        bus.subscribe(second.clone());

        bus.notify_nick_deleted("ghost");

        assert_eq!(first.events.lock().as_slice(), ["nick-deleted ghost"]);
        assert_eq!(second.events.lock().as_slice(), ["nick-deleted ghost"]);
    }
}
