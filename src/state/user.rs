//! Online user tracking.

use dashmap::DashMap;
use wint_proto::irc_to_lower;

/// One user currently visible on the network.
///
/// Only what the core needs: source resolution, quit accounting, and the
/// server the connection is recorded against. Everything else about a user
/// belongs to the surrounding service modules.
#[derive(Debug, Clone)]
pub struct User {
    /// TS6-style unique identifier.
    pub uid: String,
    /// Current nickname.
    pub nick: String,
    /// Name of the server this connection is recorded against.
    pub server: String,
    /// Sign-on time (unix seconds).
    pub signon: i64,
    /// True once the user has identified to a registered account.
    pub identified: bool,
}

impl User {
    /// Create a user record in the unidentified state.
    pub fn new(uid: &str, nick: &str, server: &str, signon: i64) -> Self {
        Self {
            uid: uid.to_string(),
            nick: nick.to_string(),
            server: server.to_string(),
            signon,
            identified: false,
        }
    }
}

/// The shared registry of online users, keyed by UID with a casefolded
/// nickname index.
#[derive(Default)]
pub struct UserRegistry {
    users: DashMap<String, User>,
    nicks: DashMap<String, String>,
}

impl UserRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a user, indexing its nickname.
    pub fn insert(&self, user: User) {
        self.nicks.insert(irc_to_lower(&user.nick), user.uid.clone());
        self.users.insert(user.uid.clone(), user);
    }

    /// Snapshot of a user by UID.
    pub fn get(&self, uid: &str) -> Option<User> {
        self.users.get(uid).map(|u| u.value().clone())
    }

    /// Snapshot of a user by nickname (RFC 1459 casefolded).
    pub fn find_nick(&self, nick: &str) -> Option<User> {
        let uid = self.nicks.get(&irc_to_lower(nick))?.value().clone();
        self.get(&uid)
    }

    /// Remove a user, returning the final record.
    pub fn remove(&self, uid: &str) -> Option<User> {
        let (_, user) = self.users.remove(uid)?;
        self.nicks.remove(&irc_to_lower(&user.nick));
        Some(user)
    }

    /// Change a user's nickname, keeping the index consistent.
    pub fn set_nick(&self, uid: &str, new_nick: &str) -> bool {
        let Some(mut entry) = self.users.get_mut(uid) else {
            return false;
        };
        let old = irc_to_lower(&entry.nick);
        entry.nick = new_nick.to_string();
        drop(entry);
        self.nicks.remove(&old);
        self.nicks.insert(irc_to_lower(new_nick), uid.to_string());
        true
    }

    /// Mark a user identified (or not) to a registered account.
    pub fn set_identified(&self, uid: &str, identified: bool) -> bool {
        match self.users.get_mut(uid) {
            Some(mut entry) => {
                entry.identified = identified;
                true
            }
            None => false,
        }
    }

    /// UIDs of every user recorded against `server`.
    ///
    /// Returns an owned snapshot so callers can delete while iterating the
    /// shared map.
    pub fn snapshot_on_server(&self, server: &str) -> Vec<String> {
        self.users
            .iter()
            .filter(|e| e.value().server == server)
            .map(|e| e.key().clone())
            .collect()
    }

    /// Number of online users.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// True when no users are online.
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
