//! Unified error handling for wintermute.
//!
//! Protocol-level drops are diagnostics, not errors, and never appear here;
//! this module covers configuration loading and topology registration, the
//! two places where a caller has to make a decision.

use thiserror::Error;

/// Errors raised while loading or validating configuration.
///
/// A bot or module block that fails validation fails that load only; the
/// process keeps running with whatever did load.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
}

/// Errors raised while registering a server into the tree.
///
/// These are remote-protocol problems (a confused or hostile uplink), so the
/// handler logs and drops; they are distinct from tree-invariant violations,
/// which panic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    #[error("server introduced from unknown uplink {source}")]
    UnknownUplink { r#source: String },

    #[error("server {name} is already linked")]
    DuplicateServer { name: String },
}
