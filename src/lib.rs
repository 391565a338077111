//! wintermute - Straylight IRC Services
//!
//! The runtime core of a network services daemon. It links to one uplink
//! as a privileged peer, terminates the server-to-server protocol, tracks
//! the network's server tree, and routes administrative commands addressed
//! to service pseudo-clients.
//!
//! The crate is a library so protocol and service modules can consume the
//! registration contracts ([`dispatch::MessageRegistry`],
//! [`commands::CommandMap`], [`hooks::HookBus`]); the `wintermute` binary
//! is a thin shell over [`state::Construct`] and [`uplink::run`].

pub mod commands;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod hooks;
pub mod state;
pub mod telemetry;
pub mod topology;
pub mod uplink;
