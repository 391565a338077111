//! Protocol-message handlers.
//!
//! One unit struct per wire verb, registered into the message registry
//! under the configured protocol name. Handlers receive the resolved
//! source and validated parameters; arity and source-kind enforcement has
//! already happened in dispatch.

mod messaging;
mod server;
mod user;

pub use messaging::{PrivmsgHandler, TopicHandler};
pub use server::{CapabHandler, EobHandler, PingHandler, ServerHandler, SidHandler, SquitHandler};
pub use user::{NickHandler, QuitHandler, UidHandler};

use std::sync::Arc;

use crate::dispatch::{Arity, HandlerSpec, MessageHandler, SourceRequirement};
use crate::state::Construct;

/// Register every core handler under the construct's protocol name.
pub fn register_core(core: &Arc<Construct>) {
    let proto = core.proto_name.clone();
    let reg = |command: &str, spec: HandlerSpec, handler: Arc<dyn MessageHandler>| {
        core.messages.register(&proto, command, spec, handler);
    };

    reg(
        "capab",
        HandlerSpec {
            param_count: 1,
            arity: Arity::AtLeast,
            source: SourceRequirement::Any,
        },
        Arc::new(CapabHandler),
    );
    reg(
        "server",
        HandlerSpec {
            param_count: 3,
            arity: Arity::AtLeast,
            source: SourceRequirement::Any,
        },
        Arc::new(ServerHandler),
    );
    reg(
        "sid",
        HandlerSpec {
            param_count: 4,
            arity: Arity::Exact,
            source: SourceRequirement::Server,
        },
        Arc::new(SidHandler),
    );
    reg(
        "squit",
        HandlerSpec {
            param_count: 1,
            arity: Arity::AtLeast,
            source: SourceRequirement::Any,
        },
        Arc::new(SquitHandler),
    );
    reg(
        "eob",
        HandlerSpec {
            param_count: 0,
            arity: Arity::AtLeast,
            source: SourceRequirement::Server,
        },
        Arc::new(EobHandler),
    );
    reg(
        "ping",
        HandlerSpec {
            param_count: 1,
            arity: Arity::AtLeast,
            source: SourceRequirement::Any,
        },
        Arc::new(PingHandler),
    );
    reg(
        "uid",
        HandlerSpec {
            param_count: 8,
            arity: Arity::AtLeast,
            source: SourceRequirement::Server,
        },
        Arc::new(UidHandler),
    );
    reg(
        "quit",
        HandlerSpec {
            param_count: 0,
            arity: Arity::AtLeast,
            source: SourceRequirement::User,
        },
        Arc::new(QuitHandler),
    );
    reg(
        "nick",
        HandlerSpec {
            param_count: 1,
            arity: Arity::AtLeast,
            source: SourceRequirement::User,
        },
        Arc::new(NickHandler),
    );
    reg(
        "topic",
        HandlerSpec {
            param_count: 2,
            arity: Arity::Exact,
            source: SourceRequirement::Any,
        },
        Arc::new(TopicHandler),
    );
    reg(
        "privmsg",
        HandlerSpec {
            param_count: 2,
            arity: Arity::Exact,
            source: SourceRequirement::User,
        },
        Arc::new(PrivmsgHandler),
    );
}
