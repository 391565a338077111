//! Handlers for server lifecycle messages.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};
use wint_proto::format_line;

use crate::dispatch::{MessageHandler, MessageSource};
use crate::state::Construct;
use crate::topology::Capability;

/// Capability negotiation from the uplink.
pub struct CapabHandler;

#[async_trait]
impl MessageHandler for CapabHandler {
    async fn run(&self, core: &Arc<Construct>, _source: &MessageSource, params: &[String]) {
        let mut capab = core.capab.write();
        for param in params {
            for token in param.split_whitespace() {
                if let Some(cap) = Capability::from_token(token) {
                    capab.insert(cap);
                } else {
                    debug!(token = %token, "ignoring unknown capability");
                }
            }
        }
    }
}

/// Legacy server introduction: `SERVER name hops :description`.
pub struct ServerHandler;

#[async_trait]
impl MessageHandler for ServerHandler {
    async fn run(&self, core: &Arc<Construct>, source: &MessageSource, params: &[String]) {
        let name = &params[0];
        let hops = params[1].parse().unwrap_or(1);
        let description = &params[2];
        let via = (!source.is_empty()).then_some(source.raw());

        if let Err(e) = core.introduce_server(via, name, hops, description, "", false) {
            warn!(server = %name, error = %e, "dropping server introduction");
        }
    }
}

/// Numeric server introduction: `:uplink SID name hops sid :description`.
pub struct SidHandler;

#[async_trait]
impl MessageHandler for SidHandler {
    async fn run(&self, core: &Arc<Construct>, source: &MessageSource, params: &[String]) {
        let Some(via) = source.server_name() else {
            debug!(source = %source.raw(), "sid without a resolvable uplink");
            return;
        };
        let name = &params[0];
        let hops = params[1].parse().unwrap_or(1);
        let sid = &params[2];
        let description = &params[3];

        if let Err(e) = core.introduce_server(Some(via), name, hops, description, sid, false) {
            warn!(server = %name, error = %e, "dropping server introduction");
        }
    }
}

/// Server delink: `SQUIT target [:reason]`.
pub struct SquitHandler;

#[async_trait]
impl MessageHandler for SquitHandler {
    async fn run(&self, core: &Arc<Construct>, _source: &MessageSource, params: &[String]) {
        let target = &params[0];
        let reason = params.get(1).map(String::as_str).unwrap_or("");
        core.delete_server(target, reason);
    }
}

/// End-of-burst from a linked server.
pub struct EobHandler;

#[async_trait]
impl MessageHandler for EobHandler {
    async fn run(&self, core: &Arc<Construct>, source: &MessageSource, _params: &[String]) {
        let Some(name) = source.server_name() else {
            debug!("end-of-burst without a source server");
            return;
        };
        core.sync_server(name, true);
    }
}

/// Keepalive: answer `PING` with our own `PONG`.
pub struct PingHandler;

#[async_trait]
impl MessageHandler for PingHandler {
    async fn run(&self, core: &Arc<Construct>, _source: &MessageSource, params: &[String]) {
        core.uplink.send_line(&format_line(
            &core.config.server.name,
            &format!("PONG :{}", params[0]),
        ));
    }
}
