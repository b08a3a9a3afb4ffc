//! Incoming packet decoding.
//!
//! Responses are a sequence of CRLF-terminated lines:
//!
//! ```text
//! +---------------------------+
//! | verb code (echo)    CR LF |
//! | client id           CR LF |
//! | sequence number     CR LF |
//! | declared answer size CR LF|
//! | server version      CR LF |
//! | 5 reserved lines          |
//! | status line         CR LF |   verb-specific; not always present
//! | payload lines ...         |
//! +---------------------------+
//! ```
//!
//! A lone CR not followed by LF is not a terminator; it is payload and must
//! survive decoding verbatim. In relaxed mode (raw and administrative
//! exchanges) the header is not parsed at all and the status code is
//! assigned by the caller.

use crate::encoding::Codec;
use crate::error::ProtocolError;
use bytes::Bytes;

const CR: u8 = 0x0D;
const LF: u8 = 0x0A;

/// A decoded server response with a read cursor.
///
/// Created immediately after a transport round trip and consumed
/// sequentially by the command's interpretation logic.
pub struct ServerResponse {
    codec: Codec,
    buf: Bytes,
    pos: usize,
    relaxed: bool,
    return_code: Option<i32>,

    /// Echoed verb code.
    pub command: String,
    /// Client id echoed by the server.
    pub client_id: u32,
    /// Sequence number echoed by the server.
    pub query_id: u32,
    /// Answer size declared by the server.
    pub answer_size: u32,
    /// Server version string from the response header.
    pub server_version: String,
}

impl ServerResponse {
    /// Parses the structured header: five identity lines followed by five
    /// reserved lines, all in the legacy codepage.
    pub fn parse(data: impl Into<Bytes>, codec: Codec) -> Result<Self, ProtocolError> {
        let mut response = Self {
            codec,
            buf: data.into(),
            pos: 0,
            relaxed: false,
            return_code: None,
            command: String::new(),
            client_id: 0,
            query_id: 0,
            answer_size: 0,
            server_version: String::new(),
        };
        response.command = response.require_header("command echo")?;
        response.client_id = response.header_u32("client id")?;
        response.query_id = response.header_u32("sequence number")?;
        response.answer_size = response.header_u32("answer size")?;
        response.server_version = response.require_header("server version")?;
        for _ in 0..5 {
            response.require_line("reserved header line")?;
        }
        Ok(response)
    }

    /// Builds a relaxed response: no header parsing, and `assigned_code` is
    /// returned as the status without consuming any buffer bytes.
    pub fn relaxed(data: impl Into<Bytes>, codec: Codec, assigned_code: i32) -> Self {
        Self {
            codec,
            buf: data.into(),
            pos: 0,
            relaxed: true,
            return_code: Some(assigned_code),
            command: String::new(),
            client_id: 0,
            query_id: 0,
            answer_size: 0,
            server_version: String::new(),
        }
    }

    /// Whether this response skips structured header parsing.
    pub fn is_relaxed(&self) -> bool {
        self.relaxed
    }

    /// Reads the next raw line, advancing the cursor.
    ///
    /// The terminator is CR LF; a CR not followed by LF stays in the line.
    /// Trailing bytes without a terminator form a final line. Returns `None`
    /// once the cursor reaches the end of the buffer.
    pub fn read_line(&mut self) -> Option<Bytes> {
        if self.pos >= self.buf.len() {
            return None;
        }
        let mut i = self.pos;
        while i < self.buf.len() {
            if self.buf[i] == CR && self.buf.get(i + 1) == Some(&LF) {
                let line = self.buf.slice(self.pos..i);
                self.pos = i + 2;
                return Some(line);
            }
            i += 1;
        }
        let line = self.buf.slice(self.pos..);
        self.pos = self.buf.len();
        Some(line)
    }

    /// Reads one legacy-codepage line, or `None` at end of data.
    pub fn read_ansi(&mut self) -> Option<String> {
        self.read_line().map(|line| self.codec.decode_ansi(&line))
    }

    /// Reads one UTF-8 line, or `None` at end of data.
    pub fn read_utf8(&mut self) -> Result<Option<String>, ProtocolError> {
        match self.read_line() {
            Some(line) => Ok(Some(self.codec.decode_utf8(&line)?)),
            None => Ok(None),
        }
    }

    /// Reads one legacy-codepage line, failing on premature end of data.
    pub fn require_ansi(&mut self) -> Result<String, ProtocolError> {
        self.read_ansi().ok_or(ProtocolError::UnexpectedEof {
            expected: "text line",
        })
    }

    /// Reads one UTF-8 line, failing on premature end of data.
    pub fn require_utf8(&mut self) -> Result<String, ProtocolError> {
        self.read_utf8()?.ok_or(ProtocolError::UnexpectedEof {
            expected: "text line",
        })
    }

    /// Drains the remaining lines as legacy-codepage text.
    pub fn read_remaining_ansi(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(line) = self.read_ansi() {
            lines.push(line);
        }
        lines
    }

    /// Drains the remaining lines as UTF-8 text.
    pub fn read_remaining_utf8(&mut self) -> Result<Vec<String>, ProtocolError> {
        let mut lines = Vec::new();
        while let Some(line) = self.read_utf8()? {
            lines.push(line);
        }
        Ok(lines)
    }

    /// Returns the status code from the first payload line.
    ///
    /// The first call consumes one line and caches the value; later calls
    /// return the cached value without advancing the cursor. Relaxed
    /// responses return the caller-assigned code and never touch the buffer.
    pub fn return_code(&mut self) -> Result<i32, ProtocolError> {
        if let Some(code) = self.return_code {
            return Ok(code);
        }
        let line = self.read_ansi().ok_or(ProtocolError::UnexpectedEof {
            expected: "status line",
        })?;
        let code = line
            .trim()
            .parse()
            .map_err(|_| ProtocolError::BadStatusLine { line })?;
        self.return_code = Some(code);
        Ok(code)
    }

    /// Validates the status code against the verb's accepted set.
    ///
    /// Zero and positive codes always pass; a negative code passes only when
    /// whitelisted by the caller. The accepted set is supplied per verb,
    /// never hardcoded here.
    pub fn check_return_code(&mut self, accepted: &[i32]) -> Result<i32, ProtocolError> {
        let code = self.return_code()?;
        if code >= 0 || accepted.contains(&code) {
            Ok(code)
        } else {
            Err(ProtocolError::UnexpectedStatus { code })
        }
    }

    /// Unread remainder of the buffer.
    pub fn remaining(&self) -> &[u8] {
        &self.buf[self.pos..]
    }

    /// Whether any unread bytes remain.
    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.buf.len()
    }

    /// Renders the unread remainder as hexadecimal text, for attachment to
    /// error reports.
    pub fn remainder_hex(&self) -> String {
        hex::encode(self.remaining())
    }

    fn require_line(&mut self, expected: &'static str) -> Result<Bytes, ProtocolError> {
        self.read_line()
            .ok_or(ProtocolError::UnexpectedEof { expected })
    }

    fn require_header(&mut self, field: &'static str) -> Result<String, ProtocolError> {
        let line = self.require_line(field)?;
        Ok(self.codec.decode_ansi(&line))
    }

    fn header_u32(&mut self, field: &'static str) -> Result<u32, ProtocolError> {
        let line = self.require_header(field)?;
        line.trim()
            .parse()
            .map_err(|_| ProtocolError::MalformedHeader { field, line })
    }
}
