//! Outgoing packet assembly.
//!
//! Packet layout (all header lines LF-terminated):
//!
//! ```text
//! +--------------------------+
//! | body length (decimal) LF |
//! | verb code            LF  |
//! | workstation char     LF  |
//! | verb code (repeated) LF  |   the server expects the duplicate
//! | client id (decimal)  LF  |
//! | sequence (decimal)   LF  |
//! | password             LF  |
//! | login                LF  |
//! | LF LF LF                 |   three reserved empty lines
//! | arg 1 LF ... arg N       |   no delimiter after the last argument
//! +--------------------------+
//! ```
//!
//! The missing delimiter on the final argument is a wire compatibility
//! requirement, not an accident. The length prefix counts every byte after
//! the first delimiter.

use crate::encoding::Codec;
use crate::error::ProtocolError;
use crate::QUERY_DELIMITER;
use bytes::{BufMut, BytesMut};

/// One typed query argument.
///
/// Each argument declares its own wire encoding; the order of arguments is
/// fixed by the verb being sent. Composite values (record references and the
/// like) are serialized by their own encoders and appended as [`Argument::Raw`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argument {
    /// Text in the legacy codepage.
    Ansi(String),
    /// Text in UTF-8.
    Utf8(String),
    /// A pre-encoded byte blob, copied verbatim.
    Raw(Vec<u8>),
    /// A flag rendered as a single '1' or '0' byte.
    Bool(bool),
    /// An integer rendered as decimal text.
    Int(i64),
}

/// An outgoing query packet under construction.
///
/// Created fresh per command invocation and discarded after transmission.
pub struct ClientQuery {
    codec: Codec,
    header: BytesMut,
    arguments: Vec<Vec<u8>>,
}

impl ClientQuery {
    /// Starts a query stamped with the connection identity.
    ///
    /// The caller is expected to have verified the identity fields already;
    /// the encoder itself only fails when header text cannot be represented
    /// in the legacy codepage.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        codec: Codec,
        verb: &str,
        workstation: char,
        client_id: u32,
        sequence: u32,
        login: &str,
        password: &str,
    ) -> Result<Self, ProtocolError> {
        let mut query = Self {
            codec,
            header: BytesMut::with_capacity(64),
            arguments: Vec::new(),
        };
        query.header_line(verb)?;
        query.header_line(&workstation.to_string())?;
        query.header_line(verb)?;
        query.header_line(&client_id.to_string())?;
        query.header_line(&sequence.to_string())?;
        query.header_line(password)?;
        query.header_line(login)?;
        query.header_line("")?;
        query.header_line("")?;
        query.header_line("")?;
        Ok(query)
    }

    fn header_line(&mut self, line: &str) -> Result<(), ProtocolError> {
        let bytes = self.codec.encode_ansi(line)?;
        self.header.put_slice(&bytes);
        self.header.put_u8(QUERY_DELIMITER);
        Ok(())
    }

    /// Appends a typed argument.
    pub fn push(&mut self, argument: &Argument) -> Result<&mut Self, ProtocolError> {
        match argument {
            Argument::Ansi(text) => self.arg_ansi(text),
            Argument::Utf8(text) => Ok(self.arg_utf8(text)),
            Argument::Raw(bytes) => Ok(self.arg_raw(bytes.clone())),
            Argument::Bool(value) => Ok(self.arg_bool(*value)),
            Argument::Int(value) => Ok(self.arg_int(*value)),
        }
    }

    /// Appends legacy-codepage text.
    pub fn arg_ansi(&mut self, text: &str) -> Result<&mut Self, ProtocolError> {
        let bytes = self.codec.encode_ansi(text)?;
        self.arguments.push(bytes);
        Ok(self)
    }

    /// Appends UTF-8 text.
    pub fn arg_utf8(&mut self, text: &str) -> &mut Self {
        self.arguments.push(text.as_bytes().to_vec());
        self
    }

    /// Appends legacy-codepage text, or an empty line for `None`.
    pub fn arg_opt_ansi(&mut self, text: Option<&str>) -> Result<&mut Self, ProtocolError> {
        self.arg_ansi(text.unwrap_or(""))
    }

    /// Appends a raw byte blob verbatim.
    pub fn arg_raw(&mut self, bytes: impl Into<Vec<u8>>) -> &mut Self {
        self.arguments.push(bytes.into());
        self
    }

    /// Appends a flag as a single '1' or '0' byte.
    pub fn arg_bool(&mut self, value: bool) -> &mut Self {
        self.arguments.push(vec![if value { b'1' } else { b'0' }]);
        self
    }

    /// Appends an integer as decimal text.
    pub fn arg_int(&mut self, value: i64) -> &mut Self {
        self.arguments.push(value.to_string().into_bytes());
        self
    }

    /// Number of arguments appended so far.
    pub fn argument_count(&self) -> usize {
        self.arguments.len()
    }

    /// Produces the final packet: decimal body length, one delimiter, then
    /// the body. Argument lines are delimited, except the last.
    pub fn encode(&self) -> BytesMut {
        let mut body_len = self.header.len();
        for (index, argument) in self.arguments.iter().enumerate() {
            if index > 0 {
                body_len += 1;
            }
            body_len += argument.len();
        }

        let prefix = body_len.to_string();
        let mut buf = BytesMut::with_capacity(prefix.len() + 1 + body_len);
        buf.put_slice(prefix.as_bytes());
        buf.put_u8(QUERY_DELIMITER);
        buf.put_slice(&self.header);
        for (index, argument) in self.arguments.iter().enumerate() {
            if index > 0 {
                buf.put_u8(QUERY_DELIMITER);
            }
            buf.put_slice(argument);
        }
        buf
    }
}
