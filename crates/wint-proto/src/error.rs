//! Error types for line decomposition.

use thiserror::Error;

/// Errors produced while decomposing a raw protocol line.
///
/// Both variants are drop-and-log conditions for the caller; neither should
/// ever abort the read loop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineError {
    /// The input line was empty.
    #[error("empty line")]
    Empty,

    /// The line carried a source prefix (or nothing at all) but no command
    /// token.
    #[error("no command token")]
    MissingCommand,
}
