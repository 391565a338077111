//! Routing of PRIVMSG to service bots.
//!
//! A message addressed to a bot's nickname or UID runs as a command; a
//! channel message beginning with the fantasy trigger runs as a command
//! with the channel attached to the invocation context.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use wint_proto::format_line;

use crate::commands::{self, CommandReply, CommandSource};
use crate::dispatch::{MessageHandler, MessageSource};
use crate::state::Construct;
use crate::uplink::UplinkSink;

const FANTASY_TRIGGER: char = '!';

/// Replies routed back to the invoker as NOTICEs over the uplink.
pub struct UplinkReply {
    uplink: Arc<dyn UplinkSink>,
    target: String,
}

impl UplinkReply {
    /// Create a reply sink addressing `target` (a UID).
    pub fn new(uplink: Arc<dyn UplinkSink>, target: &str) -> Self {
        Self {
            uplink,
            target: target.to_string(),
        }
    }
}

impl CommandReply for UplinkReply {
    fn send_message(&self, source: &str, message: &str) {
        self.uplink.send_line(&format_line(
            source,
            &format!("NOTICE {} :{}", self.target, message),
        ));
    }
}

/// `:source TOPIC channel :text`. An empty text clears the topic.
pub struct TopicHandler;

#[async_trait]
impl MessageHandler for TopicHandler {
    async fn run(&self, core: &Arc<Construct>, _source: &MessageSource, params: &[String]) {
        let topic = (!params[1].is_empty()).then(|| params[1].clone());
        core.channels.set_topic(&params[0], topic);
    }
}

/// `:uid PRIVMSG target :text`.
pub struct PrivmsgHandler;

#[async_trait]
impl MessageHandler for PrivmsgHandler {
    async fn run(&self, core: &Arc<Construct>, source: &MessageSource, params: &[String]) {
        let Some(user) = source.user() else {
            return;
        };
        let target = &params[0];
        let text = &params[1];

        if target.starts_with('#') {
            // Fantasy form: a triggered message in a tracked channel runs
            // on the default bot with the channel attached.
            let Some(channel) = core.channels.get(target) else {
                return;
            };
            let Some(text) = text.strip_prefix(FANTASY_TRIGGER) else {
                return;
            };
            let Some(bot) = core.bots.first() else {
                return;
            };
            let reply = Arc::new(UplinkReply::new(core.uplink.clone(), &user.uid));
            let mut invocation = CommandSource::new(
                &user.nick,
                Some(user.uid.clone()),
                core.resolve_account(user),
                reply,
                bot,
            );
            invocation.channel = Some(channel.name.clone());
            commands::run(core, invocation, text).await;
            return;
        }

        let Some(bot) = core.bots.find(target) else {
            debug!(target = %target, "privmsg for unknown target");
            return;
        };
        let reply = Arc::new(UplinkReply::new(core.uplink.clone(), &user.uid));
        let invocation = CommandSource::new(
            &user.nick,
            Some(user.uid.clone()),
            core.resolve_account(user),
            reply,
            bot,
        );
        commands::run(core, invocation, text).await;
    }
}
