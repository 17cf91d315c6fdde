//! Minimal STOMP 1.2 frame codec for the live topic subscription
//!
//! Frames travel as WebSocket text messages:
//! `COMMAND\nheader:value\n...\n\nbody\0`. A message made only of
//! end-of-line characters is a heart-beat.

use std::fmt;

use thiserror::Error;

const NULL: char = '\0';

/// Errors produced while decoding STOMP frames
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StompError {
    #[error("unknown STOMP command: {0}")]
    UnknownCommand(String),

    #[error("frame is missing its NULL terminator")]
    MissingTerminator,

    #[error("malformed header line: {0}")]
    MalformedHeader(String),

    #[error("invalid escape sequence in header: {0}")]
    InvalidEscape(String),

    #[error("invalid content-length: {0}")]
    InvalidContentLength(String),
}

/// STOMP commands used by the dashboard (client and server side)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Connect,
    Subscribe,
    Disconnect,
    Connected,
    Message,
    Receipt,
    Error,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Connect => "CONNECT",
            Command::Subscribe => "SUBSCRIBE",
            Command::Disconnect => "DISCONNECT",
            Command::Connected => "CONNECTED",
            Command::Message => "MESSAGE",
            Command::Receipt => "RECEIPT",
            Command::Error => "ERROR",
        }
    }

    fn parse(s: &str) -> Result<Self, StompError> {
        match s {
            "CONNECT" | "STOMP" => Ok(Command::Connect),
            "SUBSCRIBE" => Ok(Command::Subscribe),
            "DISCONNECT" => Ok(Command::Disconnect),
            "CONNECTED" => Ok(Command::Connected),
            "MESSAGE" => Ok(Command::Message),
            "RECEIPT" => Ok(Command::Receipt),
            "ERROR" => Ok(Command::Error),
            other => Err(StompError::UnknownCommand(other.to_string())),
        }
    }

    /// CONNECT and CONNECTED headers are never escaped
    fn escapes_headers(&self) -> bool {
        !matches!(self, Command::Connect | Command::Connected)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single STOMP frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// One decoded unit of a WebSocket text message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Frame(Frame),
    Heartbeat,
}

impl Frame {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// First value for `key`; repeated headers keep the first occurrence
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// CONNECT frame announcing supported versions and heart-beat intervals in ms
    pub fn connect(host: &str, heartbeat_out_ms: u64, heartbeat_in_ms: u64) -> Self {
        Frame::new(Command::Connect)
            .with_header("accept-version", "1.2,1.1,1.0")
            .with_header("host", host)
            .with_header("heart-beat", format!("{heartbeat_out_ms},{heartbeat_in_ms}"))
    }

    pub fn subscribe(id: &str, destination: &str) -> Self {
        Frame::new(Command::Subscribe)
            .with_header("id", id)
            .with_header("destination", destination)
            .with_header("ack", "auto")
    }

    pub fn disconnect() -> Self {
        Frame::new(Command::Disconnect)
    }

    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(64 + self.body.len());
        out.push_str(self.command.as_str());
        out.push('\n');
        for (key, value) in &self.headers {
            if self.command.escapes_headers() {
                out.push_str(&escape(key));
                out.push(':');
                out.push_str(&escape(value));
            } else {
                out.push_str(key);
                out.push(':');
                out.push_str(value);
            }
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push(NULL);
        out
    }
}

/// Decode every frame and heart-beat contained in one text message
pub fn decode(text: &str) -> Result<Vec<Inbound>, StompError> {
    let mut out = Vec::new();
    let mut rest = text;

    loop {
        let trimmed = rest.trim_start_matches(['\r', '\n']);
        if trimmed.len() != rest.len() {
            out.push(Inbound::Heartbeat);
        }
        if trimmed.is_empty() {
            break;
        }
        let (frame, remaining) = decode_frame(trimmed)?;
        out.push(Inbound::Frame(frame));
        rest = remaining;
    }

    Ok(out)
}

fn decode_frame(text: &str) -> Result<(Frame, &str), StompError> {
    let (head, after_head) = match text.find("\n\n") {
        Some(idx) => (&text[..idx], &text[idx + 2..]),
        None => match text.find("\r\n\r\n") {
            Some(idx) => (&text[..idx], &text[idx + 4..]),
            None => return Err(StompError::MissingTerminator),
        },
    };

    let mut lines = head.lines();
    let command = Command::parse(lines.next().unwrap_or_default().trim_end_matches('\r'))?;

    let mut headers = Vec::new();
    for line in lines {
        let line = line.trim_end_matches('\r');
        let (key, value) = line
            .split_once(':')
            .ok_or_else(|| StompError::MalformedHeader(line.to_string()))?;
        if command.escapes_headers() {
            headers.push((unescape(key)?, unescape(value)?));
        } else {
            headers.push((key.to_string(), value.to_string()));
        }
    }

    let content_length = headers
        .iter()
        .find(|(k, _)| k == "content-length")
        .map(|(_, v)| {
            v.trim()
                .parse::<usize>()
                .map_err(|_| StompError::InvalidContentLength(v.clone()))
        })
        .transpose()?;

    let (body, remaining) = match content_length {
        Some(len) => {
            let body = after_head
                .get(..len)
                .ok_or_else(|| StompError::InvalidContentLength(len.to_string()))?;
            let remaining = after_head[len..]
                .strip_prefix(NULL)
                .ok_or(StompError::MissingTerminator)?;
            (body, remaining)
        }
        None => {
            let idx = after_head.find(NULL).ok_or(StompError::MissingTerminator)?;
            (&after_head[..idx], &after_head[idx + 1..])
        }
    };

    Ok((
        Frame {
            command,
            headers,
            body: body.to_string(),
        },
        remaining,
    ))
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            c => out.push(c),
        }
    }
    out
}

fn unescape(s: &str) -> Result<String, StompError> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            _ => return Err(StompError::InvalidEscape(s.to_string())),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_connect() {
        let frame = Frame::connect("localhost", 4000, 4000);
        assert_eq!(
            frame.encode(),
            "CONNECT\naccept-version:1.2,1.1,1.0\nhost:localhost\nheart-beat:4000,4000\n\n\0"
        );
    }

    #[test]
    fn test_encode_subscribe() {
        let frame = Frame::subscribe("sub-0", "/topic/environment");
        assert_eq!(
            frame.encode(),
            "SUBSCRIBE\nid:sub-0\ndestination:/topic/environment\nack:auto\n\n\0"
        );
    }

    #[test]
    fn test_decode_message_frame() {
        let text = "MESSAGE\ndestination:/topic/environment\ncontent-type:application/json\nsubscription:sub-0\nmessage-id:abc-1\ncontent-length:12\n\n{\"id\":\"x\":1}\0";
        let decoded = decode(text).unwrap();

        assert_eq!(decoded.len(), 1);
        let Inbound::Frame(frame) = &decoded[0] else {
            panic!("expected frame, got {:?}", decoded[0]);
        };
        assert_eq!(frame.command, Command::Message);
        assert_eq!(frame.header("destination"), Some("/topic/environment"));
        assert_eq!(frame.header("message-id"), Some("abc-1"));
        assert_eq!(frame.body, "{\"id\":\"x\":1}");
    }

    #[test]
    fn test_decode_body_without_content_length() {
        let decoded = decode("MESSAGE\nsubscription:sub-0\n\nhello\0").unwrap();
        assert_eq!(
            decoded,
            vec![Inbound::Frame(
                Frame::new(Command::Message)
                    .with_header("subscription", "sub-0")
                    .with_body("hello")
            )]
        );
    }

    #[test]
    fn test_decode_content_length_allows_embedded_null() {
        let decoded = decode("MESSAGE\ncontent-length:3\n\na\0b\0").unwrap();
        let Inbound::Frame(frame) = &decoded[0] else {
            panic!("expected frame");
        };
        assert_eq!(frame.body, "a\0b");
    }

    #[test]
    fn test_decode_heartbeats_and_multiple_frames() {
        let text = "\n\nRECEIPT\nreceipt-id:1\n\n\0\nMESSAGE\n\nbody\0";
        let decoded = decode(text).unwrap();

        assert_eq!(decoded.len(), 4);
        assert_eq!(decoded[0], Inbound::Heartbeat);
        assert!(matches!(&decoded[1], Inbound::Frame(f) if f.command == Command::Receipt));
        assert_eq!(decoded[2], Inbound::Heartbeat);
        assert!(matches!(&decoded[3], Inbound::Frame(f) if f.body == "body"));
    }

    #[test]
    fn test_decode_pure_heartbeat() {
        assert_eq!(decode("\n").unwrap(), vec![Inbound::Heartbeat]);
        assert_eq!(decode("\r\n").unwrap(), vec![Inbound::Heartbeat]);
        assert!(decode("").unwrap().is_empty());
    }

    #[test]
    fn test_decode_crlf_frame() {
        let decoded = decode("CONNECTED\r\nversion:1.2\r\n\r\n\0").unwrap();
        let Inbound::Frame(frame) = &decoded[0] else {
            panic!("expected frame");
        };
        assert_eq!(frame.command, Command::Connected);
        assert_eq!(frame.header("version"), Some("1.2"));
    }

    #[test]
    fn test_header_escaping() {
        let frame = Frame::new(Command::Message).with_header("note", "a:b\nc\\d");
        let encoded = frame.encode();
        assert!(encoded.contains("note:a\\cb\\nc\\\\d\n"));

        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded, vec![Inbound::Frame(frame)]);
    }

    #[test]
    fn test_connected_headers_are_not_unescaped() {
        let decoded = decode("CONNECTED\nserver:a\\cb\n\n\0").unwrap();
        let Inbound::Frame(frame) = &decoded[0] else {
            panic!("expected frame");
        };
        assert_eq!(frame.header("server"), Some("a\\cb"));
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(
            decode("BOGUS\n\n\0").unwrap_err(),
            StompError::UnknownCommand("BOGUS".to_string())
        );
        assert_eq!(decode("MESSAGE\n\nbody").unwrap_err(), StompError::MissingTerminator);
        assert_eq!(decode("MESSAGE\nid").unwrap_err(), StompError::MissingTerminator);
        assert!(matches!(
            decode("MESSAGE\nbroken\n\n\0").unwrap_err(),
            StompError::MalformedHeader(_)
        ));
        assert!(matches!(
            decode("MESSAGE\nk:\\t\n\n\0").unwrap_err(),
            StompError::InvalidEscape(_)
        ));
        assert!(matches!(
            decode("MESSAGE\ncontent-length:abc\n\n\0").unwrap_err(),
            StompError::InvalidContentLength(_)
        ));
        assert!(matches!(
            decode("MESSAGE\ncontent-length:99\n\nshort\0").unwrap_err(),
            StompError::InvalidContentLength(_)
        ));
    }
}
