//! Network topology tracking.
//!
//! The services daemon sees the network as an acyclic tree of servers rooted
//! at its own pseudo-server. Every node except the root has exactly one
//! uplink; deleting a node tears down its entire subtree and every user
//! recorded anywhere within it.

pub mod ids;

use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use crate::error::TopologyError;
use crate::state::nick::NickRegistry;
use crate::state::user::UserRegistry;

/// Burst state of a server. The transition to `Synced` is terminal and
/// one-way; a second sync attempt is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Still exchanging burst state.
    Syncing,
    /// Burst complete.
    Synced,
}

/// A capability negotiated with the uplink at link time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// The uplink withholds per-user quits on a split; one server quit
    /// stands for its users.
    NoQuit,
    /// Quit-storm suppression; like `NoQuit`, quit accounting is implied by
    /// the server quit itself.
    QuitStorm,
    /// Mode changes carry timestamps.
    TsMode,
    /// The uplink supports remote squit of intermediate servers.
    Unconnect,
}

impl Capability {
    /// Resolve a negotiation token to a capability.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "NOQUIT" => Some(Self::NoQuit),
            "QS" => Some(Self::QuitStorm),
            "TSMODE" => Some(Self::TsMode),
            "UNCONNECT" => Some(Self::Unconnect),
            _ => None,
        }
    }
}

/// The set of capabilities negotiated for the active link.
#[derive(Debug, Clone, Default)]
pub struct CapabSet {
    caps: HashSet<Capability>,
}

impl CapabSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a negotiated capability.
    pub fn insert(&mut self, cap: Capability) {
        self.caps.insert(cap);
    }

    /// True if `cap` was negotiated.
    pub fn has(&self, cap: Capability) -> bool {
        self.caps.contains(&cap)
    }

    /// True when the protocol itself guarantees clean per-user quit
    /// accounting on a server quit, so the tree manager need not remove the
    /// server's users one by one.
    pub fn quit_accounting(&self) -> bool {
        self.has(Capability::NoQuit) || self.has(Capability::QuitStorm)
    }
}

/// One node in the server tree.
#[derive(Debug, Clone)]
pub struct ServerNode {
    /// Server name.
    pub name: String,
    /// Server numeric; may be empty for servers introduced without one.
    pub sid: String,
    /// Free-form description.
    pub description: String,
    /// Hops from the services server.
    pub hops: u32,
    /// Burst state.
    pub state: SyncState,
    /// Locally simulated placeholder for an administratively blocked server.
    pub juped: bool,
    /// Name of the uplink node; `None` only for the root.
    pub uplink: Option<String>,
    /// Names of directly linked child servers, in introduction order.
    pub links: Vec<String>,
}

impl ServerNode {
    /// True once the server has finished its burst.
    pub fn is_synced(&self) -> bool {
        self.state == SyncState::Synced
    }

    fn matches(&self, query: &str) -> bool {
        self.name == query || (!self.sid.is_empty() && self.sid == query)
    }
}

/// Outcome of a server introduction, consumed by the owning context after
/// the tree lock is released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Introduction {
    /// Name of the new node.
    pub name: String,
    /// Numeric of the new node.
    pub sid: String,
    /// True when our own pseudo-clients should be introduced to the network:
    /// the node linked directly under the root and is not juped.
    pub introduce_clients: bool,
}

/// One step in the ordered effect sequence produced by [`ServerTree::sync`].
///
/// The tree records what must happen; the owning context applies the
/// sequence (hooks, end-of-burst, topic restoration) once the lock is
/// dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Fired before end-of-burst is signalled for a direct uplink.
    PreUplinkSync { name: String, sid: String },
    /// Signal end-of-burst to the remote peer.
    SendEob,
    /// The named server finished syncing.
    Synced { name: String, sid: String },
    /// A server directly uplinked to the root finished syncing.
    UplinkSynced { name: String, sid: String },
    /// Re-apply registered topics across the network.
    RestoreTopics,
}

/// The acyclic tree of network servers, keyed by server name.
///
/// The root node is created at startup and never deleted.
pub struct ServerTree {
    nodes: HashMap<String, ServerNode>,
    root: String,
}

impl ServerTree {
    /// Create a tree holding only the root node, which starts syncing like
    /// any other server and is synced for the first time when its first
    /// direct leaf finishes bursting.
    pub fn new(name: &str, description: &str, sid: &str) -> Self {
        let root = ServerNode {
            name: name.to_string(),
            sid: sid.to_string(),
            description: description.to_string(),
            hops: 0,
            state: SyncState::Syncing,
            juped: false,
            uplink: None,
            links: Vec::new(),
        };
        let mut nodes = HashMap::new();
        nodes.insert(root.name.clone(), root);
        Self {
            nodes,
            root: name.to_string(),
        }
    }

    /// Name of the root node.
    pub fn root_name(&self) -> &str {
        &self.root
    }

    /// Direct lookup by node name.
    pub fn get(&self, name: &str) -> Option<&ServerNode> {
        self.nodes.get(name)
    }

    /// Number of linked servers, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when only the root exists.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Introduce a server under `source` (the root when `source` is
    /// `None`), in syncing state.
    pub fn introduce(
        &mut self,
        source: Option<&str>,
        name: &str,
        hops: u32,
        description: &str,
        sid: &str,
        juped: bool,
    ) -> Result<Introduction, TopologyError> {
        let uplink_name = match source {
            None => self.root.clone(),
            Some(s) => self
                .find(s)
                .map(|n| n.name.clone())
                .ok_or_else(|| TopologyError::UnknownUplink {
                    source: s.to_string(),
                })?,
        };

        if self.nodes.contains_key(name) {
            return Err(TopologyError::DuplicateServer {
                name: name.to_string(),
            });
        }

        let node = ServerNode {
            name: name.to_string(),
            sid: sid.to_string(),
            description: description.to_string(),
            hops,
            state: SyncState::Syncing,
            juped,
            uplink: Some(uplink_name.clone()),
            links: Vec::new(),
        };
        info!(server = %name, uplink = %uplink_name, "uplinked to the network");
        self.nodes.insert(name.to_string(), node);
        self.add_link(&uplink_name, name);

        Ok(Introduction {
            name: name.to_string(),
            sid: sid.to_string(),
            introduce_clients: uplink_name == self.root && !juped,
        })
    }

    fn add_link(&mut self, parent: &str, child: &str) {
        let parent_node = self
            .nodes
            .get_mut(parent)
            .unwrap_or_else(|| panic!("add_link: uplink {parent} is not in the tree"));
        parent_node.links.push(child.to_string());
        info!(server = %parent, "introduced {child}");
    }

    fn del_link(&mut self, parent: &str, child: &str) {
        let parent_node = self
            .nodes
            .get_mut(parent)
            .unwrap_or_else(|| panic!("del_link: uplink {parent} is not in the tree"));
        if parent_node.links.is_empty() {
            // Continuing with a corrupted tree would poison every later
            // find/sync/delete, so fail loudly here.
            panic!("del_link called on {parent} for {child} but it has no links");
        }
        parent_node.links.retain(|l| l != child);
        info!(server = %parent, "quit {child}");
    }

    /// Delete a node, its entire subtree, and every user recorded against
    /// any server within it.
    ///
    /// When the negotiated capabilities do not guarantee per-user quit
    /// accounting, the affected users are snapshotted first and then
    /// removed one by one, stamping last-seen time and quit reason on the
    /// registered alias of each identified user.
    pub fn delete(
        &mut self,
        name: &str,
        reason: &str,
        users: &UserRegistry,
        nicks: &NickRegistry,
        capab: &CapabSet,
    ) {
        if name == self.root {
            panic!("attempted to delete the root server {name}");
        }
        if !self.nodes.contains_key(name) {
            debug!(server = %name, "delete of unknown server ignored");
            return;
        }
        self.delete_inner(name, reason, users, nicks, capab);
    }

    fn delete_inner(
        &mut self,
        name: &str,
        reason: &str,
        users: &UserRegistry,
        nicks: &NickRegistry,
        capab: &CapabSet,
    ) {
        let (links, uplink) = match self.nodes.get(name) {
            Some(node) => (node.links.clone(), node.uplink.clone()),
            None => return,
        };
        info!(server = %name, reason = %reason, "quit from the network");

        if !capab.quit_accounting() {
            // Snapshot before mutating: the registry is shared and we are
            // about to remove entries from it.
            let doomed = users.snapshot_on_server(name);
            for uid in doomed {
                if let Some(user) = users.remove(&uid) {
                    nicks.record_quit(&user, reason);
                }
            }
            debug!(server = %name, "finished removing users");
        }

        for child in &links {
            self.delete_inner(child, reason, users, nicks, capab);
        }

        if let Some(up) = uplink {
            self.del_link(&up, name);
        }
        self.nodes.remove(name);
    }

    /// Finish syncing a server, and optionally its whole subtree first.
    ///
    /// Returns the ordered effect sequence for the owning context to apply.
    /// Syncing an already-synced server returns an empty sequence.
    pub fn sync(&mut self, name: &str, recurse: bool) -> Vec<SyncEvent> {
        let mut events = Vec::new();
        self.sync_inner(name, recurse, &mut events);
        events
    }

    fn sync_inner(&mut self, name: &str, recurse: bool, events: &mut Vec<SyncEvent>) {
        let Some(node) = self.nodes.get_mut(name) else {
            return;
        };
        if node.state == SyncState::Synced {
            return;
        }
        node.state = SyncState::Synced;
        let sid = node.sid.clone();
        let links = node.links.clone();
        let uplink = node.uplink.clone();

        if recurse {
            for child in &links {
                self.sync_inner(child, true, events);
            }
        }

        let uplinked_to_root = uplink.as_deref() == Some(self.root.as_str());
        if uplinked_to_root {
            events.push(SyncEvent::PreUplinkSync {
                name: name.to_string(),
                sid: sid.clone(),
            });
            events.push(SyncEvent::SendEob);
            let root = self.root.clone();
            // Deliberate re-entry: the root itself is synced again,
            // non-recursively, once end-of-burst has been signalled.
            self.sync_inner(&root, false, events);
        }

        info!(server = %name, "is done syncing");
        events.push(SyncEvent::Synced {
            name: name.to_string(),
            sid: sid.clone(),
        });

        if uplinked_to_root {
            events.push(SyncEvent::UplinkSynced {
                name: name.to_string(),
                sid,
            });
            events.push(SyncEvent::RestoreTopics);
        }
    }

    /// Find a server by exact name or numeric, searching depth-first from
    /// the root. First match wins; the result is deterministic for a given
    /// tree shape and introduction order.
    pub fn find(&self, query: &str) -> Option<&ServerNode> {
        self.find_from(query, self.root.as_str())
    }

    /// [`ServerTree::find`], rooted at an arbitrary node.
    pub fn find_from(&self, query: &str, from: &str) -> Option<&ServerNode> {
        let node = self.nodes.get(from)?;
        if node.matches(query) {
            return Some(node);
        }
        for child in &node.links {
            if let Some(found) = self.find_from(query, child) {
                return Some(found);
            }
        }
        None
    }

    /// True when the named server is the root or appears in the configured
    /// trusted-server list (case-insensitive).
    pub fn is_ulined(&self, query: &str, ulines: &[String]) -> bool {
        let Some(node) = self.find(query) else {
            return false;
        };
        if node.name == self.root {
            return true;
        }
        ulines.iter().any(|u| u.eq_ignore_ascii_case(&node.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::nick::NickRegistry;
    use crate::state::user::{User, UserRegistry};

    fn tree() -> ServerTree {
        ServerTree::new("services.straylight.net", "Straylight IRC Services", "0SL")
    }

    fn link(t: &mut ServerTree, source: Option<&str>, name: &str, sid: &str) {
        t.introduce(source, name, 1, "test server", sid, false)
            .expect("introduce");
    }

    #[test]
    fn introduction_links_child_to_uplink() {
        let mut t = tree();
        let intro = t
            .introduce(None, "hub.net", 1, "hub", "1HU", false)
            .unwrap();
        assert!(intro.introduce_clients);

        let root = t.get("services.straylight.net").unwrap();
        assert_eq!(root.links, vec!["hub.net"]);
        let hub = t.get("hub.net").unwrap();
        assert_eq!(hub.uplink.as_deref(), Some("services.straylight.net"));
        assert!(!hub.is_synced());
    }

    #[test]
    fn juped_introduction_keeps_clients_out() {
        let mut t = tree();
        let intro = t
            .introduce(None, "juped.net", 1, "juped", "9JP", true)
            .unwrap();
        assert!(!intro.introduce_clients);
    }

    #[test]
    fn introduction_from_unknown_uplink_is_rejected() {
        let mut t = tree();
        let err = t
            .introduce(Some("ghost.net"), "leaf.net", 2, "leaf", "2LF", false)
            .unwrap_err();
        assert_eq!(
            err,
            TopologyError::UnknownUplink {
                source: "ghost.net".into()
            }
        );
    }

    #[test]
    fn duplicate_introduction_is_rejected() {
        let mut t = tree();
        link(&mut t, None, "hub.net", "1HU");
        let err = t
            .introduce(None, "hub.net", 1, "again", "1HX", false)
            .unwrap_err();
        assert_eq!(
            err,
            TopologyError::DuplicateServer {
                name: "hub.net".into()
            }
        );
    }

    #[test]
    fn find_matches_name_and_sid_depth_first() {
        let mut t = tree();
        link(&mut t, None, "hub.net", "1HU");
        link(&mut t, Some("hub.net"), "leaf-a.net", "1AA");
        link(&mut t, Some("1AA"), "deep.net", "1AD");
        link(&mut t, Some("hub.net"), "leaf-b.net", "1AB");

        assert_eq!(t.find("1AD").unwrap().name, "deep.net");
        assert_eq!(t.find("leaf-b.net").unwrap().sid, "1AB");
        // Depth-first: the subtree under leaf-a is exhausted before leaf-b.
        assert_eq!(t.find_from("deep.net", "hub.net").unwrap().sid, "1AD");
        assert!(t.find("nosuch.net").is_none());
    }

    #[test]
    fn deleting_a_node_removes_it_from_uplink_links() {
        let mut t = tree();
        link(&mut t, None, "hub.net", "1HU");
        link(&mut t, Some("hub.net"), "leaf.net", "1LF");

        let users = UserRegistry::new();
        let nicks = NickRegistry::new();
        t.delete("leaf.net", "squit", &users, &nicks, &CapabSet::new());

        assert!(t.find("leaf.net").is_none());
        assert_eq!(t.get("hub.net").unwrap().links.len(), 0);
    }

    #[test]
    fn deleting_a_node_deletes_its_subtree_and_users() {
        let mut t = tree();
        link(&mut t, None, "hub.net", "1HU");
        link(&mut t, Some("hub.net"), "leaf.net", "1LF");
        link(&mut t, Some("leaf.net"), "deep.net", "1DP");

        let users = UserRegistry::new();
        let nicks = NickRegistry::new();
        users.insert(User::new("1LFAAAAAB", "ghost", "leaf.net", 0));
        users.insert(User::new("1DPAAAAAB", "wraith", "deep.net", 0));
        users.insert(User::new("1HUAAAAAB", "alive", "hub.net", 0));
        users.set_identified("1LFAAAAAB", true);
        nicks.register_alias("ghost", "ghost");

        t.delete("leaf.net", "netsplit", &users, &nicks, &CapabSet::new());

        assert!(t.find("leaf.net").is_none());
        assert!(t.find("deep.net").is_none());
        assert!(users.get("1LFAAAAAB").is_none());
        assert!(users.get("1DPAAAAAB").is_none());
        // The identified user's alias carries the quit accounting.
        assert_eq!(nicks.find("ghost").unwrap().last_quit, "netsplit");
        // The hub and its user survive.
        assert_eq!(t.find("hub.net").unwrap().sid, "1HU");
        assert!(users.get("1HUAAAAAB").is_some());
    }

    #[test]
    fn quit_accounting_capability_skips_manual_teardown() {
        let mut t = tree();
        link(&mut t, None, "hub.net", "1HU");

        let users = UserRegistry::new();
        let nicks = NickRegistry::new();
        users.insert(User::new("1HUAAAAAB", "ghost", "hub.net", 0));

        let mut capab = CapabSet::new();
        capab.insert(Capability::NoQuit);
        t.delete("hub.net", "split", &users, &nicks, &capab);

        // The protocol promised per-user accounting; the registry entry is
        // the collaborator's to reap.
        assert!(users.get("1HUAAAAAB").is_some());
    }

    #[test]
    #[should_panic(expected = "no links")]
    fn del_link_on_leafless_node_is_a_hard_failure() {
        let mut t = tree();
        link(&mut t, None, "hub.net", "1HU");
        t.del_link("hub.net", "phantom.net");
    }

    #[test]
    fn sync_fires_uplink_sequence_once() {
        let mut t = tree();
        link(&mut t, None, "hub.net", "1HU");
        link(&mut t, Some("hub.net"), "leaf.net", "1LF");

        let events = t.sync("hub.net", true);
        let kinds: Vec<&SyncEvent> = events.iter().collect();
        assert!(matches!(
            kinds[0],
            SyncEvent::Synced { name, .. } if name == "leaf.net"
        ));
        assert!(matches!(
            kinds[1],
            SyncEvent::PreUplinkSync { name, .. } if name == "hub.net"
        ));
        assert_eq!(kinds[2], &SyncEvent::SendEob);
        // The root re-entry syncs the root itself before the hub's own
        // completion is recorded.
        assert!(matches!(
            kinds[3],
            SyncEvent::Synced { name, .. } if name == "services.straylight.net"
        ));
        assert!(matches!(
            kinds[4],
            SyncEvent::Synced { name, .. } if name == "hub.net"
        ));
        assert!(matches!(
            kinds[5],
            SyncEvent::UplinkSynced { name, .. } if name == "hub.net"
        ));
        assert_eq!(kinds[6], &SyncEvent::RestoreTopics);
        assert_eq!(kinds.len(), 7);

        assert!(t.get("hub.net").unwrap().is_synced());
        assert!(t.get("leaf.net").unwrap().is_synced());
    }

    #[test]
    fn sync_is_idempotent() {
        let mut t = tree();
        link(&mut t, None, "hub.net", "1HU");

        let first = t.sync("hub.net", true);
        assert!(!first.is_empty());
        let second = t.sync("hub.net", true);
        assert!(second.is_empty());
    }

    #[test]
    fn ulined_servers() {
        let mut t = tree();
        link(&mut t, None, "stats.net", "1ST");
        let ulines = vec!["STATS.net".to_string()];

        assert!(t.is_ulined("services.straylight.net", &ulines));
        assert!(t.is_ulined("stats.net", &ulines));
        assert!(!t.is_ulined("stats.net", &[]));
        assert!(!t.is_ulined("missing.net", &ulines));
    }
}
