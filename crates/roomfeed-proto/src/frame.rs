//! STOMP 1.2 frames.
//!
//! A frame is a command line, zero or more `name:value` header lines, an
//! empty line, the body and a NUL octet:
//!
//! ```text
//! SEND\n
//! destination:/app/hello\n
//! content-length:17\n
//! \n
//! {"content":"hi"}␀
//! ```
//!
//! Header values are escaped (`\\`, `\n`, `\r`, `\c`) on every frame except
//! `CONNECT`, `STOMP` and `CONNECTED`. When a header appears more than once,
//! the first occurrence wins. Bare EOLs between frames are heart-beats and
//! are skipped by both decoders.
//!
//! [`Frame::decode`] parses exactly one frame (one WebSocket text message).
//! [`FrameDecoder`] accumulates a byte stream and yields frames as they
//! complete, for transports without message boundaries.

use std::{borrow::Cow, fmt, str};

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{ProtocolError, Result, headers};

/// Largest frame the streaming decoder buffers by default (1 MiB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Protocol version the client offers and the broker confirms.
pub const STOMP_VERSION: &str = "1.2";

/// STOMP command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Client handshake.
    Connect,
    /// Client handshake (1.2 alias of `CONNECT`).
    Stomp,
    /// Broker accepted the handshake.
    Connected,
    /// Client publishes to a destination.
    Send,
    /// Client subscribes to a destination.
    Subscribe,
    /// Client drops a subscription.
    Unsubscribe,
    /// Client ends the session.
    Disconnect,
    /// Broker delivers a message for a subscription.
    Message,
    /// Broker acknowledges a client receipt request.
    Receipt,
    /// Broker reports an error; the connection is closed afterwards.
    Error,
}

impl Command {
    /// Wire spelling of the command.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::Stomp => "STOMP",
            Self::Connected => "CONNECTED",
            Self::Send => "SEND",
            Self::Subscribe => "SUBSCRIBE",
            Self::Unsubscribe => "UNSUBSCRIBE",
            Self::Disconnect => "DISCONNECT",
            Self::Message => "MESSAGE",
            Self::Receipt => "RECEIPT",
            Self::Error => "ERROR",
        }
    }

    /// Parse a command line.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "CONNECT" => Ok(Self::Connect),
            "STOMP" => Ok(Self::Stomp),
            "CONNECTED" => Ok(Self::Connected),
            "SEND" => Ok(Self::Send),
            "SUBSCRIBE" => Ok(Self::Subscribe),
            "UNSUBSCRIBE" => Ok(Self::Unsubscribe),
            "DISCONNECT" => Ok(Self::Disconnect),
            "MESSAGE" => Ok(Self::Message),
            "RECEIPT" => Ok(Self::Receipt),
            "ERROR" => Ok(Self::Error),
            other => Err(ProtocolError::UnknownCommand(other.to_string())),
        }
    }

    const fn escapes_headers(self) -> bool {
        !matches!(self, Self::Connect | Self::Stomp | Self::Connected)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single STOMP frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    command: Command,
    headers: Vec<(String, String)>,
    body: Bytes,
}

impl Frame {
    /// Create a frame with no headers and an empty body.
    pub fn new(command: Command) -> Self {
        Self { command, headers: Vec::new(), body: Bytes::new() }
    }

    /// Append a header.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Set the body and a matching `content-length` header.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        self.headers.retain(|(name, _)| name != headers::CONTENT_LENGTH);
        self.headers.push((headers::CONTENT_LENGTH.to_string(), body.len().to_string()));
        self.body = body;
        self
    }

    /// Frame command.
    pub fn command(&self) -> Command {
        self.command
    }

    /// First value of header `name`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }

    /// First value of header `name`, or [`ProtocolError::MissingHeader`].
    pub fn require_header(&self, name: &'static str) -> Result<&str> {
        self.header(name)
            .ok_or(ProtocolError::MissingHeader { command: self.command.as_str(), header: name })
    }

    /// All headers in wire order, duplicates included.
    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Raw body.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Body as UTF-8 text.
    pub fn body_str(&self) -> Result<&str> {
        str::from_utf8(&self.body).map_err(|_| ProtocolError::InvalidUtf8)
    }

    /// Append the wire encoding of this frame to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) {
        let escape = self.command.escapes_headers();
        dst.put_slice(self.command.as_str().as_bytes());
        dst.put_u8(b'\n');
        for (name, value) in &self.headers {
            put_header_text(dst, name, escape);
            dst.put_u8(b':');
            put_header_text(dst, value, escape);
            dst.put_u8(b'\n');
        }
        dst.put_u8(b'\n');
        dst.put_slice(&self.body);
        dst.put_u8(0);
    }

    /// Wire encoding as an owned buffer.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(64 + self.body.len());
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Wire encoding as text, for transports that carry text messages.
    pub fn to_text(&self) -> Result<String> {
        String::from_utf8(self.to_bytes().to_vec()).map_err(|_| ProtocolError::InvalidUtf8)
    }

    /// Decode exactly one frame.
    ///
    /// Leading and trailing heart-beat EOLs are tolerated; anything else
    /// after the terminator is [`ProtocolError::TrailingData`].
    pub fn decode(data: &[u8]) -> Result<Self> {
        let Some((frame, used)) = parse_frame(data, usize::MAX)? else {
            return Err(ProtocolError::Incomplete);
        };
        if data[used..].iter().any(|b| !is_eol(*b)) {
            return Err(ProtocolError::TrailingData);
        }
        Ok(frame)
    }

    /// Client handshake. `bearer` is forwarded as an `Authorization` header.
    pub fn connect(host: &str, bearer: Option<&str>) -> Self {
        let frame = Self::new(Command::Connect)
            .with_header(headers::ACCEPT_VERSION, STOMP_VERSION)
            .with_header(headers::HOST, host)
            .with_header(headers::HEART_BEAT, "0,0");
        match bearer {
            Some(token) => frame.with_header(headers::AUTHORIZATION, &format!("Bearer {token}")),
            None => frame,
        }
    }

    /// Subscribe to `destination` under the client-chosen `id`.
    pub fn subscribe(id: &str, destination: &str) -> Self {
        Self::new(Command::Subscribe)
            .with_header(headers::ID, id)
            .with_header(headers::DESTINATION, destination)
            .with_header(headers::ACK, "auto")
    }

    /// Drop subscription `id`.
    pub fn unsubscribe(id: &str) -> Self {
        Self::new(Command::Unsubscribe).with_header(headers::ID, id)
    }

    /// Publish a JSON body to `destination`.
    pub fn send(destination: &str, json: String) -> Self {
        Self::new(Command::Send)
            .with_header(headers::DESTINATION, destination)
            .with_header(headers::CONTENT_TYPE, "application/json")
            .with_body(json)
    }

    /// End the session, asking for `receipt` to confirm it.
    pub fn disconnect(receipt: &str) -> Self {
        Self::new(Command::Disconnect).with_header(headers::RECEIPT, receipt)
    }

    /// Broker handshake reply.
    pub fn connected(session: &str) -> Self {
        Self::new(Command::Connected)
            .with_header(headers::VERSION, STOMP_VERSION)
            .with_header(headers::SESSION, session)
            .with_header(headers::HEART_BEAT, "0,0")
    }

    /// Broker delivery of `body` on `destination` through `subscription`.
    pub fn message(destination: &str, subscription: &str, message_id: &str, body: Bytes) -> Self {
        Self::new(Command::Message)
            .with_header(headers::DESTINATION, destination)
            .with_header(headers::SUBSCRIPTION, subscription)
            .with_header(headers::MESSAGE_ID, message_id)
            .with_header(headers::CONTENT_TYPE, "application/json")
            .with_body(body)
    }

    /// Broker acknowledgement of a receipt request.
    pub fn receipt(receipt_id: &str) -> Self {
        Self::new(Command::Receipt).with_header(headers::RECEIPT_ID, receipt_id)
    }

    /// Broker error report.
    pub fn error(message: &str, details: &str) -> Self {
        Self::new(Command::Error)
            .with_header(headers::MESSAGE, message)
            .with_body(details.to_string())
    }
}

/// Incremental decoder for byte streams.
///
/// After an error the buffered bytes are discarded; the caller is expected
/// to drop the connection since framing can no longer be trusted.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: BytesMut,
    max_frame_size: usize,
}

impl FrameDecoder {
    /// Decoder with [`DEFAULT_MAX_FRAME_SIZE`].
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Decoder with a custom frame size limit.
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self { buf: BytesMut::new(), max_frame_size }
    }

    /// Append received bytes.
    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Number of bytes waiting for a frame to complete.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Next complete frame, or `None` until more bytes arrive.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        let eols = leading_eols(&self.buf);
        self.buf.advance(eols);

        match parse_frame(&self.buf, self.max_frame_size) {
            Ok(Some((frame, used))) => {
                self.buf.advance(used);
                Ok(Some(frame))
            },
            Ok(None) => Ok(None),
            Err(err) => {
                self.buf.clear();
                Err(err)
            },
        }
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

const fn is_eol(byte: u8) -> bool {
    matches!(byte, b'\n' | b'\r')
}

fn leading_eols(buf: &[u8]) -> usize {
    buf.iter().take_while(|b| is_eol(**b)).count()
}

fn incomplete(buffered: usize, limit: usize) -> Result<Option<(Frame, usize)>> {
    if buffered > limit { Err(ProtocolError::FrameTooLarge { limit }) } else { Ok(None) }
}

/// Parse one frame from the front of `buf`.
///
/// Returns the frame and the number of bytes consumed (leading EOLs
/// included), or `None` if `buf` holds only part of a frame.
fn parse_frame(buf: &[u8], limit: usize) -> Result<Option<(Frame, usize)>> {
    let mut pos = leading_eols(buf);
    let mut lines: Vec<&[u8]> = Vec::new();

    let header_end = loop {
        let Some(offset) = buf[pos..].iter().position(|b| *b == b'\n') else {
            return incomplete(buf.len(), limit);
        };
        let line = &buf[pos..pos + offset];
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        pos += offset + 1;
        if line.is_empty() {
            break pos;
        }
        lines.push(line);
    };

    let Some((command_line, header_lines)) = lines.split_first() else {
        return Err(ProtocolError::UnknownCommand(String::new()));
    };
    let command = Command::parse(utf8(command_line)?)?;
    let escape = command.escapes_headers();

    let mut headers = Vec::with_capacity(header_lines.len());
    for line in header_lines {
        let line = utf8(line)?;
        let Some((name, value)) = line.split_once(':') else {
            return Err(ProtocolError::MalformedHeader(line.to_string()));
        };
        if escape {
            headers.push((unescape(name)?.into_owned(), unescape(value)?.into_owned()));
        } else {
            headers.push((name.to_string(), value.to_string()));
        }
    }

    let content_length = headers
        .iter()
        .find(|(name, _)| name == headers::CONTENT_LENGTH)
        .map(|(_, value)| {
            value
                .trim()
                .parse::<usize>()
                .map_err(|_| ProtocolError::InvalidContentLength(value.clone()))
        })
        .transpose()?;

    let terminator = match content_length {
        Some(len) => {
            let Some(terminator) = header_end.checked_add(len) else {
                return Err(ProtocolError::InvalidContentLength(len.to_string()));
            };
            if buf.len() <= terminator {
                return incomplete(buf.len(), limit);
            }
            if buf[terminator] != 0 {
                return Err(ProtocolError::MissingTerminator);
            }
            terminator
        },
        None => match buf[header_end..].iter().position(|b| *b == 0) {
            Some(offset) => header_end + offset,
            None => return incomplete(buf.len(), limit),
        },
    };

    let used = terminator + 1;
    if used > limit {
        return Err(ProtocolError::FrameTooLarge { limit });
    }

    let body = Bytes::copy_from_slice(&buf[header_end..terminator]);
    Ok(Some((Frame { command, headers, body }, used)))
}

fn utf8(bytes: &[u8]) -> Result<&str> {
    str::from_utf8(bytes).map_err(|_| ProtocolError::InvalidUtf8)
}

fn put_header_text(dst: &mut BytesMut, text: &str, escape: bool) {
    if !escape {
        dst.put_slice(text.as_bytes());
        return;
    }
    for byte in text.bytes() {
        match byte {
            b'\\' => dst.put_slice(b"\\\\"),
            b'\n' => dst.put_slice(b"\\n"),
            b'\r' => dst.put_slice(b"\\r"),
            b':' => dst.put_slice(b"\\c"),
            other => dst.put_u8(other),
        }
    }
}

fn unescape(raw: &str) -> Result<Cow<'_, str>> {
    if !raw.contains('\\') {
        return Ok(Cow::Borrowed(raw));
    }
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
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
            _ => return Err(ProtocolError::InvalidEscape(raw.to_string())),
        }
    }
    Ok(Cow::Owned(out))
}
