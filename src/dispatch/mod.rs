//! Inbound message dispatch.
//!
//! Every raw line flows through [`process`]: decompose, resolve the sender,
//! look up the registered handler under its `protocol/command` key, enforce
//! the handler's arity and source-kind contract, then invoke it. Anything
//! that fails on the way is dropped with a diagnostic; nothing here ever
//! aborts the daemon.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, trace, warn};
use wint_proto::LineError;

use crate::state::user::User;
use crate::state::Construct;


/// How a handler's declared parameter count is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// The parameter count must match exactly.
    Exact,
    /// The declared count is a soft minimum.
    AtLeast,
}

/// What kind of sender a handler requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceRequirement {
    /// Any source, including none.
    Any,
    /// The source must resolve to a known user.
    User,
    /// A non-empty source must resolve to a known server.
    Server,
}

/// Declared contract of a registered protocol-message handler.
#[derive(Debug, Clone, Copy)]
pub struct HandlerSpec {
    /// Declared parameter count.
    pub param_count: usize,
    /// How `param_count` is enforced.
    pub arity: Arity,
    /// Source-kind requirement.
    pub source: SourceRequirement,
}

/// A protocol-message implementation.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handle one validated message.
    async fn run(&self, core: &Arc<Construct>, source: &MessageSource, params: &[String]);
}

struct Registration {
    spec: HandlerSpec,
    handler: Arc<dyn MessageHandler>,
}

/// Process-wide table of protocol-message handlers, keyed
/// `"protocol/command"` (command lowercased). At most one registration
/// exists per key.
#[derive(Default)]
pub struct MessageRegistry {
    table: RwLock<HashMap<String, Registration>>,
}

impl MessageRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn key(protocol: &str, command: &str) -> String {
        format!("{}/{}", protocol, command.to_lowercase())
    }

    /// Register a handler under `(protocol, command)`. Re-registration
    /// replaces the previous handler.
    pub fn register(
        &self,
        protocol: &str,
        command: &str,
        spec: HandlerSpec,
        handler: Arc<dyn MessageHandler>,
    ) {
        let key = Self::key(protocol, command);
        if self
            .table
            .write()
            .insert(key.clone(), Registration { spec, handler })
            .is_some()
        {
            warn!(key = %key, "replaced existing message handler");
        }
    }

    /// Remove a registration, e.g. on module unload.
    pub fn unregister(&self, protocol: &str, command: &str) -> bool {
        self.table
            .write()
            .remove(&Self::key(protocol, command))
            .is_some()
    }

    fn get(&self, key: &str) -> Option<(HandlerSpec, Arc<dyn MessageHandler>)> {
        self.table
            .read()
            .get(key)
            .map(|r| (r.spec, r.handler.clone()))
    }
}

/// The resolved sender of one line: a user, a server, or nothing.
///
/// Resolution happens once, at dispatch time, against the shared
/// registries; the result is a snapshot view, not a held handle.
pub struct MessageSource {
    raw: String,
    user: Option<User>,
    server: Option<(String, String)>,
}

impl MessageSource {
    /// Resolve `raw` against the user registry (by UID, then nickname) and
    /// the server tree (by name or numeric).
    pub fn resolve(core: &Construct, raw: &str) -> Self {
        let user = if raw.is_empty() {
            None
        } else {
            core.users.get(raw).or_else(|| core.users.find_nick(raw))
        };
        let server = if raw.is_empty() {
            None
        } else {
            core.servers
                .read()
                .find(raw)
                .map(|n| (n.name.clone(), n.sid.clone()))
        };
        Self {
            raw: raw.to_string(),
            user,
            server,
        }
    }

    /// The sender text exactly as received; empty for unsourced lines.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// True for lines that carried no source prefix.
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// The sending user, when the source resolved to one.
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// Name of the sending server, when the source resolved to one.
    pub fn server_name(&self) -> Option<&str> {
        self.server.as_ref().map(|(name, _)| name.as_str())
    }

    /// Numeric of the sending server, when the source resolved to one.
    pub fn server_sid(&self) -> Option<&str> {
        self.server.as_ref().map(|(_, sid)| sid.as_str())
    }
}

/// Run one raw line through the full pipeline.
pub async fn process(core: &Arc<Construct>, buffer: &str) {
    trace!(raw = %buffer, "received");

    if buffer.is_empty() {
        return;
    }

    let msg = match wint_proto::parse(buffer) {
        Ok(msg) => msg,
        Err(LineError::Empty) => return,
        Err(LineError::MissingCommand) => {
            debug!(raw = %buffer, "no command token");
            return;
        }
    };

    let source = MessageSource::resolve(core, &msg.source);

    let key = MessageRegistry::key(&core.proto_name, &msg.command);
    let Some((spec, handler)) = core.messages.get(&key) else {
        debug!(raw = %buffer, "unknown message from server");
        return;
    };

    let arity_ok = match spec.arity {
        Arity::AtLeast => msg.params.len() >= spec.param_count,
        Arity::Exact => msg.params.len() == spec.param_count,
    };
    if !arity_ok {
        debug!(
            command = %msg.command,
            got = msg.params.len(),
            want = spec.param_count,
            "invalid parameters"
        );
        return;
    }

    match spec.source {
        SourceRequirement::User if source.user().is_none() => {
            debug!(source = %msg.source, command = %msg.command, "unexpected non-user source");
            return;
        }
        SourceRequirement::Server if !source.is_empty() && source.server_name().is_none() => {
            debug!(source = %msg.source, command = %msg.command, "unexpected non-server source");
            return;
        }
        _ => {}
    }

    handler.run(core, &source, &msg.params).await;
}
