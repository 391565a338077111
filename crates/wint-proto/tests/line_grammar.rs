//! Grammar-level checks for the raw line tokenizer.

use wint_proto::{format_line, parse, LineError};

#[test]
fn unsourced_single_word_command() {
    let msg = parse("EOB").unwrap();
    assert_eq!(msg.source, "");
    assert_eq!(msg.command, "EOB");
    assert!(msg.params.is_empty());
}

#[test]
fn middle_then_trailing() {
    let msg = parse(":0SL PRIVMSG NickServ :IDENTIFY hunter2").unwrap();
    assert_eq!(msg.source, "0SL");
    assert_eq!(msg.params, vec!["NickServ", "IDENTIFY hunter2"]);
}

#[test]
fn colon_inside_middle_is_not_trailing() {
    // Only a token *beginning* with ':' terminates tokenizing.
    let msg = parse("MODE #chan +k sekrit:word").unwrap();
    assert_eq!(msg.params, vec!["#chan", "+k", "sekrit:word"]);
}

#[test]
fn many_middles_no_trailing() {
    let msg = parse("UID ghost 1 1700000000 svc services.host 0SLAAAAAB + realname").unwrap();
    assert_eq!(msg.params.len(), 8);
    assert_eq!(msg.params[5], "0SLAAAAAB");
}

#[test]
fn errors_are_droppable_not_fatal() {
    assert_eq!(parse(""), Err(LineError::Empty));
    assert_eq!(parse(":just.a.source"), Err(LineError::MissingCommand));
}

#[test]
fn formatted_lines_reparse() {
    for (source, message) in [
        ("", "EOB"),
        ("services.straylight.net", "SQUIT leaf.net :split"),
        ("0SL", "TOPIC #ops :restored topic"),
    ] {
        let line = format_line(source, message);
        let msg = parse(&line).unwrap();
        assert_eq!(msg.source, source);
    }
}
