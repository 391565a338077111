//! Shared daemon state.
//!
//! Everything the core mutates lives in explicitly owned repositories held
//! by the [`Construct`] root context; components receive what they need
//! instead of reaching for ambient globals.

pub mod channel;
pub mod construct;
pub mod nick;
pub mod user;

pub use construct::{Construct, InFlight};
