//! The root execution context.
//!
//! `Construct` owns every process-wide repository (server tree, user and
//! nickname registries, bot and handler tables, allocators, hook bus) and
//! is passed to the components that need them. Lifecycle is explicit:
//! built once at startup, dropped at shutdown, trivially constructible in
//! tests.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::{debug, warn};
use wint_proto::format_line;

use crate::commands::{BotRegistry, CommandMap};
use crate::config::Config;
use crate::dispatch::MessageRegistry;
use crate::error::TopologyError;
use crate::hooks::HookBus;
use crate::state::channel::ChannelRegistry;
use crate::state::nick::{Account, NickRegistry};
use crate::state::user::{User, UserRegistry};
use crate::topology::ids::{SidAllocator, UidAllocator};
use crate::topology::{CapabSet, ServerTree, SyncEvent};
use crate::uplink::UplinkSink;

/// Guard held by an asynchronous request in flight.
///
/// Commands must not block the loop; an external round trip holds one of
/// these and resumes via a callback re-entering the same single-threaded
/// loop. The construct can tell whether requests are still outstanding.
pub struct InFlight {
    _token: Arc<()>,
}

/// The root context owning all shared daemon state.
pub struct Construct {
    /// Loaded configuration.
    pub config: Config,
    /// Protocol name message handlers are registered under.
    pub proto_name: String,
    /// The network server tree.
    pub servers: RwLock<ServerTree>,
    /// Capabilities negotiated with the uplink.
    pub capab: RwLock<CapabSet>,
    /// Online users.
    pub users: UserRegistry,
    /// Registered nicknames and requests.
    pub nicks: NickRegistry,
    /// Known channels.
    pub channels: ChannelRegistry,
    /// Service bots.
    pub bots: BotRegistry,
    /// Command instances by service name.
    pub commands: CommandMap,
    /// Protocol-message handlers.
    pub messages: MessageRegistry,
    /// Extension points.
    pub hooks: HookBus,
    /// UID generator for our own pseudo-clients.
    pub uid_allocator: UidAllocator,
    /// SID generator for juped servers.
    pub sid_allocator: SidAllocator,
    /// Outbound line sink toward the uplink.
    pub uplink: Arc<dyn UplinkSink>,
    in_flight: Arc<()>,
}

impl Construct {
    /// Build the context from configuration: the tree holds only our own
    /// root server, the registries are empty, and the allocators are seeded
    /// from the configured numeric.
    pub fn new(config: Config, uplink: Arc<dyn UplinkSink>) -> Self {
        let servers = ServerTree::new(
            &config.server.name,
            &config.server.description,
            &config.server.numeric,
        );
        let uid_allocator = UidAllocator::new(&config.server.numeric);
        let sid_allocator = SidAllocator::new(&config.server.numeric);
        let proto_name = config.uplink.protocol.clone();
        Self {
            config,
            proto_name,
            servers: RwLock::new(servers),
            capab: RwLock::new(CapabSet::new()),
            users: UserRegistry::new(),
            nicks: NickRegistry::new(),
            channels: ChannelRegistry::new(),
            bots: BotRegistry::new(),
            commands: CommandMap::new(),
            messages: MessageRegistry::new(),
            hooks: HookBus::new(),
            uid_allocator,
            sid_allocator,
            uplink,
            in_flight: Arc::new(()),
        }
    }

    /// Introduce a server into the tree, firing the new-server extension
    /// point and, for a non-juped direct leaf, bringing our pseudo-clients
    /// onto the network.
    pub fn introduce_server(
        &self,
        source: Option<&str>,
        name: &str,
        hops: u32,
        description: &str,
        sid: &str,
        juped: bool,
    ) -> Result<(), TopologyError> {
        let intro = self
            .servers
            .write()
            .introduce(source, name, hops, description, sid, juped)?;
        if intro.introduce_clients {
            self.introduce_clients();
        }
        self.hooks.notify_new_server(&intro.name, &intro.sid);
        Ok(())
    }

    /// Send our pseudo-clients to the network.
    fn introduce_clients(&self) {
        let numeric = self.config.server.numeric.clone();
        let now = Utc::now().timestamp();
        for bot in self.bots.snapshot() {
            self.uplink.send_line(&format_line(
                &numeric,
                &format!(
                    "UID {} 1 {} {} {} {} + :{}",
                    bot.nick, now, bot.user, bot.host, bot.uid, bot.realname
                ),
            ));
        }
    }

    /// Finish syncing a server (optionally with its subtree), applying the
    /// resulting effect sequence: hooks, end-of-burst, topic restoration.
    pub fn sync_server(&self, name: &str, recurse: bool) {
        let events = self.servers.write().sync(name, recurse);
        for event in events {
            match event {
                SyncEvent::PreUplinkSync { name, sid } => {
                    self.hooks.notify_pre_uplink_sync(&name, &sid);
                }
                SyncEvent::SendEob => self.send_eob(),
                SyncEvent::Synced { name, sid } => {
                    self.hooks.notify_server_sync(&name, &sid);
                }
                SyncEvent::UplinkSynced { name, sid } => {
                    self.hooks.notify_uplink_sync(&name, &sid);
                }
                SyncEvent::RestoreTopics => self.restore_topics(),
            }
        }
    }

    /// Delete a server (looked up by name or numeric) and its subtree.
    /// Returns false when no such server is linked.
    pub fn delete_server(&self, query: &str, reason: &str) -> bool {
        let target = {
            let servers = self.servers.read();
            let Some(node) = servers.find(query) else {
                debug!(server = %query, "squit for unknown server");
                return false;
            };
            if node.name == servers.root_name() {
                warn!(server = %query, "refusing to delete the local server");
                return false;
            }
            node.name.clone()
        };
        let capab = self.capab.read().clone();
        self.servers
            .write()
            .delete(&target, reason, &self.users, &self.nicks, &capab);
        true
    }

    /// Signal end-of-burst to the remote peer.
    fn send_eob(&self) {
        self.uplink
            .send_line(&format_line(&self.config.server.numeric, "EOB"));
    }

    /// Re-apply the stored topic of every registered channel.
    fn restore_topics(&self) {
        let source = self.config.server.name.clone();
        for (channel, topic) in self.channels.registered_topics() {
            self.uplink
                .send_line(&format_line(&source, &format!("TOPIC {channel} :{topic}")));
        }
    }

    /// Resolve the account behind an identified user: the alias names the
    /// account, the configured oper blocks contribute its privileges.
    pub fn resolve_account(&self, user: &User) -> Option<Account> {
        if !user.identified {
            return None;
        }
        let alias = self.nicks.find(&user.nick)?;
        let privs = self
            .config
            .opers
            .iter()
            .find(|o| o.name.eq_ignore_ascii_case(&alias.account))
            .map(|o| o.privs.clone())
            .unwrap_or_default();
        Some(Account {
            display: alias.account,
            privs,
        })
    }

    /// Take an in-flight token for an external round trip.
    pub fn begin_request(&self) -> InFlight {
        InFlight {
            _token: self.in_flight.clone(),
        }
    }

    /// Number of outstanding in-flight requests.
    pub fn pending_requests(&self) -> usize {
        Arc::strong_count(&self.in_flight) - 1
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use super::Construct;
    use crate::config::Config;
    use crate::uplink::testing::MemorySink;

    /// A construct wired to an in-memory sink, for exercising the pipeline
    /// without a network.
    pub fn test_construct() -> (Arc<Construct>, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::default());
        let core = Arc::new(Construct::new(Config::for_tests(), sink.clone()));
        (core, sink)
    }
}
