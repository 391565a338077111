//! RFC 1459 casemapping.
//!
//! IRC treats `[]\~` as the uppercase forms of `{}|^`, so nickname and
//! command lookups must fold with these extra pairs in addition to ASCII.

/// Fold a string to its RFC 1459 lowercase form.
pub fn irc_to_lower(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'A'..='Z' => c.to_ascii_lowercase(),
            '[' => '{',
            ']' => '}',
            '\\' => '|',
            '~' => '^',
            _ => c,
        })
        .collect()
}
