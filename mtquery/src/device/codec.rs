//! RouterOS API word and sentence encoding.
//!
//! A sentence is a sequence of words terminated by an empty word. Each word is prefixed with
//! its length in a variable-width encoding:
//!
//! | length            | prefix bytes | marker      |
//! |-------------------|--------------|-------------|
//! | `< 0x80`          | 1            | `0xxxxxxx`  |
//! | `< 0x4000`        | 2            | `10xxxxxx`  |
//! | `< 0x20_0000`     | 3            | `110xxxxx`  |
//! | `< 0x1000_0000`   | 4            | `1110xxxx`  |
//! | otherwise         | 5            | `0xF0`      |
//!
//! Replies start with `!re` (one row), `!done`, `!trap` or `!fatal`; the remaining words are
//! `=key=value` attributes.

use bytes::{BufMut, Bytes, BytesMut};
use serde_json::Value;

use crate::types::Record;

pub fn encode_length(len: usize, buf: &mut BytesMut) {
    let len = len as u32;
    if len < 0x80 {
        buf.put_u8(len as u8);
    } else if len < 0x4000 {
        buf.put_u16((len | 0x8000) as u16);
    } else if len < 0x20_0000 {
        let v = len | 0xC0_0000;
        buf.put_u8((v >> 16) as u8);
        buf.put_u16(v as u16);
    } else if len < 0x1000_0000 {
        buf.put_u32(len | 0xE000_0000);
    } else {
        buf.put_u8(0xF0);
        buf.put_u32(len);
    }
}

/// Number of prefix bytes announced by the first byte, or `None` for a control byte.
pub fn length_prefix_size(first: u8) -> Option<usize> {
    match first {
        b if b & 0x80 == 0x00 => Some(1),
        b if b & 0xC0 == 0x80 => Some(2),
        b if b & 0xE0 == 0xC0 => Some(3),
        b if b & 0xF0 == 0xE0 => Some(4),
        0xF0 => Some(5),
        _ => None,
    }
}

/// Decode a complete length prefix (as sized by [`length_prefix_size`]).
pub fn decode_length(prefix: &[u8]) -> usize {
    let n = match prefix {
        [a] => u32::from(*a),
        [a, b] => (u32::from(a & 0x3F) << 8) | u32::from(*b),
        [a, b, c] => (u32::from(a & 0x1F) << 16) | (u32::from(*b) << 8) | u32::from(*c),
        [a, b, c, d] => (u32::from(a & 0x0F) << 24) | (u32::from(*b) << 16) | (u32::from(*c) << 8) | u32::from(*d),
        [_, b, c, d, e] => u32::from_be_bytes([*b, *c, *d, *e]),
        _ => 0,
    };
    n as usize
}

pub fn encode_sentence(words: &[&str]) -> Bytes {
    let mut buf = BytesMut::new();
    for word in words {
        encode_length(word.len(), &mut buf);
        buf.put_slice(word.as_bytes());
    }
    buf.put_u8(0);
    buf.freeze()
}

/// A decoded reply sentence.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Row(Record),
    /// Sent by RouterOS 7.18+ when a print has no rows; a `!done` follows.
    Empty,
    Done(Record),
    Trap(String),
    Fatal(String),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CodecError {
    #[error("empty sentence")]
    EmptySentence,
    #[error("unexpected reply word {0}")]
    UnknownReply(String),
}

/// Interpret a router value the way clients of the API expect: `yes`/`true` and `no`/`false`
/// become booleans, whole numbers become numbers, everything else stays text.
pub fn parse_value(raw: &str) -> Value {
    match raw {
        "yes" | "true" => Value::Bool(true),
        "no" | "false" => Value::Bool(false),
        _ => raw
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(raw.to_string())),
    }
}

fn attributes(words: &[String]) -> Record {
    words
        .iter()
        .filter_map(|word| word.strip_prefix('='))
        .filter_map(|attr| attr.split_once('='))
        .map(|(key, value)| (key.to_string(), parse_value(value)))
        .collect()
}

fn message(attrs: &Record) -> String {
    match attrs.get("message") {
        Some(Value::String(m)) => m.clone(),
        Some(other) => other.to_string(),
        None => "no message".to_string(),
    }
}

pub fn parse_reply(words: &[String]) -> Result<Reply, CodecError> {
    let (kind, rest) = words.split_first().ok_or(CodecError::EmptySentence)?;
    let attrs = attributes(rest);
    match kind.as_str() {
        "!re" => Ok(Reply::Row(attrs)),
        "!empty" => Ok(Reply::Empty),
        "!done" => Ok(Reply::Done(attrs)),
        "!trap" => Ok(Reply::Trap(message(&attrs))),
        // !fatal carries its reason as a bare word
        "!fatal" => Ok(Reply::Fatal(rest.first().cloned().unwrap_or_else(|| message(&attrs)))),
        other => Err(CodecError::UnknownReply(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn roundtrip_length(len: usize) -> (usize, usize) {
        let mut buf = BytesMut::new();
        encode_length(len, &mut buf);
        let size = length_prefix_size(buf[0]).unwrap();
        assert_eq!(size, buf.len(), "prefix size for {len}");
        (size, decode_length(&buf))
    }

    #[test]
    fn test_length_prefix_boundaries() {
        assert_eq!(roundtrip_length(0), (1, 0));
        assert_eq!(roundtrip_length(0x7F), (1, 0x7F));
        assert_eq!(roundtrip_length(0x80), (2, 0x80));
        assert_eq!(roundtrip_length(0x3FFF), (2, 0x3FFF));
        assert_eq!(roundtrip_length(0x4000), (3, 0x4000));
        assert_eq!(roundtrip_length(0x1F_FFFF), (3, 0x1F_FFFF));
        assert_eq!(roundtrip_length(0x20_0000), (4, 0x20_0000));
        assert_eq!(roundtrip_length(0x1000_0000), (5, 0x1000_0000));
    }

    #[test]
    fn test_control_bytes_rejected() {
        assert_eq!(length_prefix_size(0xF8), None);
        assert_eq!(length_prefix_size(0xFF), None);
    }

    #[test]
    fn test_encode_sentence() {
        let bytes = encode_sentence(&["/login", "=name=admin"]);
        let mut expected = vec![6u8];
        expected.extend_from_slice(b"/login");
        expected.push(11);
        expected.extend_from_slice(b"=name=admin");
        expected.push(0);
        assert_eq!(&bytes[..], &expected[..]);
    }

    #[test]
    fn test_parse_row() {
        let words: Vec<String> = [
            "!re",
            "=.id=*1A",
            "=address=192.168.100.61",
            "=mac-address=93:FB:E5:3D:0E:BF",
            "=disabled=false",
            "=comment=a=b",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let Reply::Row(row) = parse_reply(&words).unwrap() else { panic!("expected a row") };
        assert_eq!(row[".id"], json!("*1A"));
        assert_eq!(row["address"], json!("192.168.100.61"));
        assert_eq!(row["disabled"], json!(false));
        assert_eq!(row["comment"], json!("a=b"));
    }

    #[test]
    fn test_parse_empty() {
        let words = vec!["!empty".to_string()];
        assert!(matches!(parse_reply(&words), Ok(Reply::Empty)));
    }

    #[test]
    fn test_parse_trap_and_fatal() {
        let trap: Vec<String> = vec!["!trap".into(), "=message=invalid user name or password".into()];
        assert_eq!(
            parse_reply(&trap).unwrap(),
            Reply::Trap("invalid user name or password".to_string())
        );

        let fatal: Vec<String> = vec!["!fatal".into(), "session terminated".into()];
        assert_eq!(parse_reply(&fatal).unwrap(), Reply::Fatal("session terminated".to_string()));

        assert_eq!(parse_reply(&[]), Err(CodecError::EmptySentence));
        assert!(matches!(parse_reply(&["!bogus".to_string()]), Err(CodecError::UnknownReply(_))));
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("yes"), json!(true));
        assert_eq!(parse_value("no"), json!(false));
        assert_eq!(parse_value("42"), json!(42));
        assert_eq!(parse_value("6.44.5"), json!("6.44.5"));
        assert_eq!(parse_value(""), json!(""));
    }
}
