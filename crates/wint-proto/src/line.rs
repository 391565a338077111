//! Raw line decomposition.
//!
//! A server-to-server line has the shape
//! `[":" source SP] command *(SP middle) [SP ":" trailing]` where `middle`
//! tokens carry no leading `:` and `trailing` consumes the rest of the line,
//! spaces included.

use crate::error::LineError;

/// One decomposed protocol line.
///
/// Created per line, dispatched, then discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    /// Sender prefix with the leading `:` stripped; empty when the line
    /// carried no prefix.
    pub source: String,
    /// The command token, verbatim.
    pub command: String,
    /// Ordered parameters. The trailing parameter, if any, is the last entry
    /// with its internal spacing preserved.
    pub params: Vec<String>,
}

/// A cursor over single-space-separated tokens that can also hand back the
/// verbatim remainder of the input.
///
/// The command executor reuses this for parameter splitting, so the trailing
/// "everything else" parameter keeps its spacing exactly as received.
pub struct TokenStream<'a> {
    input: &'a str,
    pos: usize,
    finished: bool,
}

impl<'a> TokenStream<'a> {
    /// Create a stream over `input`.
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            finished: false,
        }
    }

    /// Yield the next token, or `None` once the input is exhausted.
    ///
    /// Consecutive separators yield empty tokens; callers that care skip
    /// them.
    pub fn token(&mut self) -> Option<&'a str> {
        if self.finished {
            return None;
        }
        let rest = &self.input[self.pos..];
        match rest.find(' ') {
            Some(i) => {
                self.pos += i + 1;
                Some(&rest[..i])
            }
            None => {
                self.finished = true;
                self.pos = self.input.len();
                Some(rest)
            }
        }
    }

    /// True once every token has been consumed.
    pub fn at_end(&self) -> bool {
        self.finished || self.pos >= self.input.len()
    }

    /// The unconsumed remainder of the input, spaces preserved.
    pub fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }
}

/// Decompose one raw line into `(source, command, params)`.
///
/// A token beginning with `:` ends normal tokenizing: that token (minus the
/// colon) concatenated with the verbatim rest of the line becomes the final
/// parameter.
pub fn parse(line: &str) -> Result<RawMessage, LineError> {
    if line.is_empty() {
        return Err(LineError::Empty);
    }

    let mut stream = TokenStream::new(line);

    let mut source = String::new();
    if line.starts_with(':') {
        if let Some(tok) = stream.token() {
            source = tok[1..].to_string();
        }
    }

    let command = match stream.token() {
        Some(cmd) if !cmd.is_empty() => cmd.to_string(),
        _ => return Err(LineError::MissingCommand),
    };

    let mut params = Vec::new();
    while let Some(tok) = stream.token() {
        if let Some(trailing) = tok.strip_prefix(':') {
            if stream.at_end() {
                params.push(trailing.to_string());
            } else {
                params.push(format!("{} {}", trailing, stream.remaining()));
            }
            break;
        }
        params.push(tok.to_string());
    }

    Ok(RawMessage {
        source,
        command,
        params,
    })
}

/// Prepend a source prefix to an outbound message when one is set.
pub fn format_line(source: &str, message: &str) -> String {
    if source.is_empty() {
        message.to_string()
    } else {
        format!(":{} {}", source, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn privmsg_with_trailing() {
        let msg = parse("PRIVMSG #chan :hello there").unwrap();
        assert_eq!(msg.source, "");
        assert_eq!(msg.command, "PRIVMSG");
        assert_eq!(msg.params, vec!["#chan", "hello there"]);
    }

    #[test]
    fn sourced_line() {
        let msg = parse(":1AAAAAAAB QUIT :gone fishing").unwrap();
        assert_eq!(msg.source, "1AAAAAAAB");
        assert_eq!(msg.command, "QUIT");
        assert_eq!(msg.params, vec!["gone fishing"]);
    }

    #[test]
    fn middle_params_only() {
        let msg = parse("SID hub.straylight.net 2 0SL description-less").unwrap();
        assert_eq!(
            msg.params,
            vec!["hub.straylight.net", "2", "0SL", "description-less"]
        );
    }

    #[test]
    fn trailing_preserves_interior_spacing() {
        let msg = parse("TOPIC #ops :two  spaces   kept").unwrap();
        assert_eq!(msg.params, vec!["#ops", "two  spaces   kept"]);
    }

    #[test]
    fn lone_colon_token_is_empty_trailing() {
        let msg = parse("AWAY :").unwrap();
        assert_eq!(msg.params, vec![""]);
    }

    #[test]
    fn empty_line_is_rejected() {
        assert_eq!(parse(""), Err(LineError::Empty));
    }

    #[test]
    fn source_without_command_is_rejected() {
        assert_eq!(parse(":lonely.prefix"), Err(LineError::MissingCommand));
    }

    #[test]
    fn format_line_round_trips() {
        let formatted = format_line("0SL", "PING :hub");
        assert_eq!(formatted, ":0SL PING :hub");
        let msg = parse(&formatted).unwrap();
        assert_eq!(msg.source, "0SL");
        assert_eq!(msg.command, "PING");

        assert_eq!(format_line("", "EOB"), "EOB");
    }

    #[test]
    fn token_stream_remaining_is_verbatim() {
        let mut stream = TokenStream::new("SET KEEPTOPIC on  and  on");
        assert_eq!(stream.token(), Some("SET"));
        assert_eq!(stream.token(), Some("KEEPTOPIC"));
        assert_eq!(stream.remaining(), "on  and  on");
        assert!(!stream.at_end());
    }
}
