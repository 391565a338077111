//! # wint-proto
//!
//! Raw protocol plumbing for the wintermute services daemon: the
//! server-to-server line tokenizer, the line formatter, and the RFC 1459
//! casemapping fold.
//!
//! This crate deliberately knows nothing about any particular ircd's wire
//! dialect. It decomposes one raw line into `(source, command, params)` and
//! leaves the meaning of the command to the daemon's message registry.
//!
//! ## Quick Start
//!
//! ```rust
//! use wint_proto::parse;
//!
//! let msg = parse(":services.straylight.net PRIVMSG #ops :burst complete").unwrap();
//! assert_eq!(msg.source, "services.straylight.net");
//! assert_eq!(msg.command, "PRIVMSG");
//! assert_eq!(msg.params, vec!["#ops", "burst complete"]);
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

mod casemap;
mod error;
mod line;

pub use casemap::irc_to_lower;
pub use error::LineError;
pub use line::{format_line, parse, RawMessage, TokenStream};
