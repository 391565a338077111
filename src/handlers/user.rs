//! Handlers for user lifecycle messages.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::dispatch::{MessageHandler, MessageSource};
use crate::state::user::User;
use crate::state::Construct;

/// User introduction:
/// `:server UID nick hops ts user host uid modes :realname`.
pub struct UidHandler;

#[async_trait]
impl MessageHandler for UidHandler {
    async fn run(&self, core: &Arc<Construct>, source: &MessageSource, params: &[String]) {
        let Some(server) = source.server_name() else {
            debug!(source = %source.raw(), "uid without a resolvable server");
            return;
        };
        let nick = &params[0];
        let signon = params[2].parse().unwrap_or(0);
        let uid = &params[5];

        core.users.insert(User::new(uid, nick, server, signon));
        debug!(uid = %uid, nick = %nick, server = %server, "user introduced");
    }
}

/// User quit: `:uid QUIT [:reason]`.
pub struct QuitHandler;

#[async_trait]
impl MessageHandler for QuitHandler {
    async fn run(&self, core: &Arc<Construct>, source: &MessageSource, params: &[String]) {
        let Some(user) = source.user() else {
            return;
        };
        let reason = params.first().map(String::as_str).unwrap_or("");
        if let Some(departed) = core.users.remove(&user.uid) {
            core.nicks.record_quit(&departed, reason);
            debug!(uid = %departed.uid, nick = %departed.nick, "user quit");
        }
    }
}

/// Nick change: `:uid NICK newnick [ts]`.
pub struct NickHandler;

#[async_trait]
impl MessageHandler for NickHandler {
    async fn run(&self, core: &Arc<Construct>, source: &MessageSource, params: &[String]) {
        let Some(user) = source.user() else {
            return;
        };
        core.users.set_nick(&user.uid, &params[0]);
    }
}
