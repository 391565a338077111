//! Registered nickname state: aliases, pending requests, and accounts.

use chrono::Utc;
use dashmap::DashMap;
use tracing::info;
use wint_proto::irc_to_lower;

use crate::hooks::HookBus;
use crate::state::user::{User, UserRegistry};

/// A registered account behind one or more nickname aliases.
///
/// Carries only what permission checks need; authentication and storage are
/// collaborator territory.
#[derive(Debug, Clone, Default)]
pub struct Account {
    /// Display name of the account.
    pub display: String,
    /// Privilege strings granted to this account. `"*"` grants everything.
    pub privs: Vec<String>,
}

impl Account {
    /// Create an account with no privileges.
    pub fn new(display: &str) -> Self {
        Self {
            display: display.to_string(),
            privs: Vec::new(),
        }
    }

    /// True if the account holds `wanted` or the wildcard privilege.
    pub fn has_priv(&self, wanted: &str) -> bool {
        self.privs
            .iter()
            .any(|p| p == "*" || p.eq_ignore_ascii_case(wanted))
    }
}

/// One registered nickname.
#[derive(Debug, Clone)]
pub struct NickAlias {
    /// The nickname, display case.
    pub nick: String,
    /// Display name of the owning account.
    pub account: String,
    /// Registration time (unix seconds).
    pub registered: i64,
    /// Last time the owner was seen online.
    pub last_seen: i64,
    /// Quit reason recorded when the owner was last seen leaving.
    pub last_quit: String,
    /// Administratively forbidden; never quit-stamped.
    pub forbidden: bool,
}

/// A pending registration request for a nickname.
#[derive(Debug, Clone)]
pub struct NickRequest {
    /// The requested nickname.
    pub nick: String,
    /// Time the request was filed (unix seconds).
    pub requested: i64,
}

/// Registered-nickname repository: aliases plus pending requests, keyed by
/// the casefolded nickname.
#[derive(Default)]
pub struct NickRegistry {
    aliases: DashMap<String, NickAlias>,
    requests: DashMap<String, NickRequest>,
}

impl NickRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an alias under an account. Replaces any previous
    /// registration of the same nickname.
    pub fn register_alias(&self, nick: &str, account: &str) {
        let now = Utc::now().timestamp();
        self.aliases.insert(
            irc_to_lower(nick),
            NickAlias {
                nick: nick.to_string(),
                account: account.to_string(),
                registered: now,
                last_seen: now,
                last_quit: String::new(),
                forbidden: false,
            },
        );
    }

    /// File a registration request for a nickname.
    pub fn register_request(&self, nick: &str) {
        self.requests.insert(
            irc_to_lower(nick),
            NickRequest {
                nick: nick.to_string(),
                requested: Utc::now().timestamp(),
            },
        );
    }

    /// Snapshot of an alias by nickname.
    pub fn find(&self, nick: &str) -> Option<NickAlias> {
        self.aliases.get(&irc_to_lower(nick)).map(|a| a.value().clone())
    }

    /// Snapshot of a pending request by nickname.
    pub fn find_request(&self, nick: &str) -> Option<NickRequest> {
        self.requests.get(&irc_to_lower(nick)).map(|r| r.value().clone())
    }

    /// Mark an alias forbidden.
    pub fn set_forbidden(&self, nick: &str, forbidden: bool) -> bool {
        match self.aliases.get_mut(&irc_to_lower(nick)) {
            Some(mut alias) => {
                alias.forbidden = forbidden;
                true
            }
            None => false,
        }
    }

    /// Record quit accounting for a departing user: a non-forbidden alias
    /// of an identified user is stamped with the current time and the quit
    /// reason.
    pub fn record_quit(&self, user: &User, reason: &str) {
        if !user.identified {
            return;
        }
        if let Some(mut alias) = self.aliases.get_mut(&irc_to_lower(&user.nick)) {
            if alias.forbidden {
                return;
            }
            alias.last_seen = Utc::now().timestamp();
            alias.last_quit = reason.to_string();
        }
    }

    /// Delete an alias: any online user of the nick is logged out, the
    /// nickname-deleted extension point fires, and the entry is dropped.
    pub fn delete_alias(&self, nick: &str, users: &UserRegistry, hooks: &HookBus) -> bool {
        let Some((_, alias)) = self.aliases.remove(&irc_to_lower(nick)) else {
            return false;
        };
        if let Some(user) = users.find_nick(&alias.nick) {
            users.set_identified(&user.uid, false);
        }
        info!(nick = %alias.nick, account = %alias.account, "nickname dropped");
        hooks.notify_nick_deleted(&alias.nick);
        true
    }

    /// Delete a pending request, firing the matching extension point.
    pub fn delete_request(&self, nick: &str, hooks: &HookBus) -> bool {
        let Some((_, request)) = self.requests.remove(&irc_to_lower(nick)) else {
            return false;
        };
        hooks.notify_nick_request_deleted(&request.nick);
        true
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::hooks::testing::RecordingObserver;

    #[test]
    fn record_quit_stamps_identified_aliases() {
        let reg = NickRegistry::new();
        reg.register_alias("Case", "case");

        let mut user = User::new("0SLAAAAAB", "Case", "services.net", 0);
        user.identified = true;
        reg.record_quit(&user, "netsplit");

        let alias = reg.find("case").unwrap();
        assert_eq!(alias.last_quit, "netsplit");
        assert!(alias.last_seen > 0);
    }

    #[test]
    fn record_quit_skips_unidentified_and_forbidden() {
        let reg = NickRegistry::new();
        reg.register_alias("Case", "case");

        let user = User::new("0SLAAAAAB", "Case", "services.net", 0);
        reg.record_quit(&user, "netsplit");
        assert_eq!(reg.find("case").unwrap().last_quit, "");

        reg.set_forbidden("case", true);
        let mut identified = user.clone();
        identified.identified = true;
        reg.record_quit(&identified, "netsplit");
        assert_eq!(reg.find("case").unwrap().last_quit, "");
    }

    #[test]
    fn delete_alias_fires_hook_and_logs_out() {
        let reg = NickRegistry::new();
        let users = UserRegistry::new();
        let hooks = HookBus::new();
        let observer = Arc::new(RecordingObserver::default());
        hooks.subscribe(observer.clone());

        reg.register_alias("Case", "case");
        users.insert(User::new("0SLAAAAAB", "Case", "services.net", 0));
        users.set_identified("0SLAAAAAB", true);

        assert!(reg.delete_alias("case", &users, &hooks));
        assert!(reg.find("case").is_none());
        assert!(!users.get("0SLAAAAAB").unwrap().identified);
        assert_eq!(observer.events.lock().as_slice(), ["nick-deleted Case"]);

        // Already gone; no second notification.
        assert!(!reg.delete_alias("case", &users, &hooks));
        assert_eq!(observer.events.lock().len(), 1);
    }

    #[test]
    fn delete_request_fires_hook() {
        let reg = NickRegistry::new();
        let hooks = HookBus::new();
        let observer = Arc::new(RecordingObserver::default());
        hooks.subscribe(observer.clone());

        reg.register_request("wanted");
        assert!(reg.find_request("WANTED").is_some());
        assert!(reg.delete_request("wanted", &hooks));
        assert!(reg.find_request("wanted").is_none());
        assert_eq!(
            observer.events.lock().as_slice(),
            ["nick-request-deleted wanted"]
        );
    }

    #[test]
    fn account_wildcard_priv() {
        let mut account = Account::new("root");
        account.privs.push("*".into());
        assert!(account.has_priv("services/operserv"));

        let mut scoped = Account::new("helper");
        scoped.privs.push("nickserv/drop".into());
        assert!(scoped.has_priv("NICKSERV/DROP"));
        assert!(!scoped.has_priv("chanserv/set"));
    }
}
