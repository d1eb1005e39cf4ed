//! NICOS cache line protocol.
//!
//! Every message is one line:
//!
//! ```text
//! [<time>[+<ttl>]]@<key><op><value>
//! ```
//!
//! where `<op>` is one of `=` (tell), `!` (tell an expired value), `?`
//! (ask), `*` (wildcard ask), `:` (subscribe) and `|` (unsubscribe). A
//! leading `@` without a time asks the server to include timestamps in its
//! replies. Request batches end with the marker `###?`, which the server
//! echoes back as `###!` once every reply has been written.

use std::fmt;

/// Key of the end-of-batch marker.
pub const END_MARKER: &str = "###";

/// Protocol operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheOp {
    Tell,
    TellOld,
    Ask,
    Wildcard,
    Subscribe,
    Unsubscribe,
}

impl CacheOp {
    pub fn as_char(self) -> char {
        match self {
            CacheOp::Tell => '=',
            CacheOp::TellOld => '!',
            CacheOp::Ask => '?',
            CacheOp::Wildcard => '*',
            CacheOp::Subscribe => ':',
            CacheOp::Unsubscribe => '|',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '=' => Some(CacheOp::Tell),
            '!' => Some(CacheOp::TellOld),
            '?' => Some(CacheOp::Ask),
            '*' => Some(CacheOp::Wildcard),
            ':' => Some(CacheOp::Subscribe),
            '|' => Some(CacheOp::Unsubscribe),
            _ => None,
        }
    }
}

/// A parsed protocol line.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheMessage {
    /// Timestamp in seconds since the epoch, if the line carried one.
    pub time: Option<f64>,
    /// Time-to-live in seconds.
    pub ttl: Option<f64>,
    pub key: String,
    pub op: CacheOp,
    /// Raw value text, still in Python literal form.
    pub value: String,
}

impl CacheMessage {
    /// Parse one line (without the trailing newline).
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let op_index = line.find(|c: char| CacheOp::from_char(c).is_some())?;
        let op = CacheOp::from_char(line[op_index..].chars().next()?)?;
        let head = &line[..op_index];
        let value = line[op_index + 1..].trim().to_string();

        let (time, ttl, key) = match head.split_once('@') {
            Some((stamp, key)) => {
                let (time, ttl) = parse_stamp(stamp.trim())?;
                (time, ttl, key)
            }
            None => (None, None, head),
        };

        let key = key.trim();
        if key.is_empty() {
            return None;
        }

        Some(Self {
            time,
            ttl,
            key: key.to_string(),
            op,
            value,
        })
    }

    /// Whether this is the server's end-of-batch reply.
    pub fn is_end_marker(&self) -> bool {
        self.key == END_MARKER
    }
}

impl fmt::Display for CacheMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(time) = self.time {
            write!(f, "{}", time)?;
            if let Some(ttl) = self.ttl {
                write!(f, "+{}", ttl)?;
            }
            write!(f, "@")?;
        }
        write!(f, "{}{}{}", self.key, self.op.as_char(), self.value)
    }
}

/// Parse the `<time>[+<ttl>]` part in front of `@`.
///
/// An empty stamp is valid and means "no timestamp".
fn parse_stamp(stamp: &str) -> Option<(Option<f64>, Option<f64>)> {
    if stamp.is_empty() {
        return Some((None, None));
    }
    match stamp.split_once('+') {
        Some((time, ttl)) => Some((
            Some(time.trim().parse().ok()?),
            Some(ttl.trim().parse().ok()?),
        )),
        None => Some((Some(stamp.parse().ok()?), None)),
    }
}

/// Build a request line asking for `key` with its timestamp.
pub fn ask(key: &str) -> String {
    format!("@{}{}\n", key, CacheOp::Ask.as_char())
}

/// Build a request line asking for every key starting with `prefix`.
pub fn wildcard(prefix: &str) -> String {
    format!("@{}{}\n", prefix, CacheOp::Wildcard.as_char())
}

/// Build a request line subscribing to every key starting with `prefix`.
pub fn subscribe(prefix: &str) -> String {
    format!("@{}{}\n", prefix, CacheOp::Subscribe.as_char())
}

/// Build the end-of-batch request.
pub fn end_request() -> String {
    format!("{}{}\n", END_MARKER, CacheOp::Ask.as_char())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamped_tell() {
        let msg = CacheMessage::parse("1700000000.25@nicos/t1/value=10.5").unwrap();
        assert_eq!(msg.time, Some(1_700_000_000.25));
        assert_eq!(msg.ttl, None);
        assert_eq!(msg.key, "nicos/t1/value");
        assert_eq!(msg.op, CacheOp::Tell);
        assert_eq!(msg.value, "10.5");
    }

    #[test]
    fn test_parse_ttl_and_expired() {
        let msg = CacheMessage::parse("1700000000+30@nicos/t1/status!(200, 'idle')").unwrap();
        assert_eq!(msg.time, Some(1_700_000_000.0));
        assert_eq!(msg.ttl, Some(30.0));
        assert_eq!(msg.op, CacheOp::TellOld);
        assert_eq!(msg.value, "(200, 'idle')");
    }

    #[test]
    fn test_value_may_contain_operators() {
        let msg = CacheMessage::parse("1@nicos/exp/title='a=b? c!'").unwrap();
        assert_eq!(msg.key, "nicos/exp/title");
        assert_eq!(msg.value, "'a=b? c!'");
    }

    #[test]
    fn test_parse_requests_and_markers() {
        let msg = CacheMessage::parse("@nicos/t1/value?").unwrap();
        assert_eq!(msg.time, None);
        assert_eq!(msg.op, CacheOp::Ask);

        let end = CacheMessage::parse("###!").unwrap();
        assert!(end.is_end_marker());
        assert_eq!(end.op, CacheOp::TellOld);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(CacheMessage::parse("").is_none());
        assert!(CacheMessage::parse("no operator here").is_none());
        assert!(CacheMessage::parse("=value without key").is_none());
        assert!(CacheMessage::parse("abc@nicos/t1/value=1").is_none());
    }

    #[test]
    fn test_request_lines() {
        assert_eq!(ask("nicos/t1/value"), "@nicos/t1/value?\n");
        assert_eq!(wildcard("nicos/"), "@nicos/*\n");
        assert_eq!(subscribe("nicos/"), "@nicos/:\n");
        assert_eq!(end_request(), "###?\n");
    }

    #[test]
    fn test_display_round_trip() {
        let line = "1700000000.5@nicos/t1/value=11.2";
        let msg = CacheMessage::parse(line).unwrap();
        assert_eq!(msg.to_string(), line);
    }
}
