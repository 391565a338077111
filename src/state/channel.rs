//! Channel tracking.
//!
//! The core only needs channels for two things: resolving the fantasy
//! invocation context, and re-applying registered topics once a direct
//! uplink finishes its burst.

use dashmap::DashMap;
use wint_proto::irc_to_lower;

/// One channel visible on the network.
#[derive(Debug, Clone)]
pub struct Channel {
    /// Channel name, display case.
    pub name: String,
    /// Current topic, if any.
    pub topic: Option<String>,
    /// True when the channel is registered with services.
    pub registered: bool,
}

/// The shared channel registry, keyed by casefolded name.
#[derive(Default)]
pub struct ChannelRegistry {
    channels: DashMap<String, Channel>,
}

impl ChannelRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a channel.
    pub fn insert(&self, channel: Channel) {
        self.channels.insert(irc_to_lower(&channel.name), channel);
    }

    /// Snapshot of a channel by name.
    pub fn get(&self, name: &str) -> Option<Channel> {
        self.channels
            .get(&irc_to_lower(name))
            .map(|c| c.value().clone())
    }

    /// Update a channel's topic, creating the channel if needed.
    pub fn set_topic(&self, name: &str, topic: Option<String>) {
        self.channels
            .entry(irc_to_lower(name))
            .and_modify(|c| c.topic = topic.clone())
            .or_insert_with(|| Channel {
                name: name.to_string(),
                topic,
                registered: false,
            });
    }

    /// `(name, topic)` for every registered channel holding a topic,
    /// snapshotted for iteration outside the map.
    pub fn registered_topics(&self) -> Vec<(String, String)> {
        self.channels
            .iter()
            .filter(|e| e.value().registered)
            .filter_map(|e| {
                e.value()
                    .topic
                    .as_ref()
                    .map(|t| (e.value().name.clone(), t.clone()))
            })
            .collect()
    }
}
