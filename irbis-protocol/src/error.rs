//! Protocol error types.

use thiserror::Error;

/// Protocol-level errors that can occur while building queries or reading
/// responses.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A required read hit the end of the response buffer.
    #[error("unexpected end of response while reading {expected}")]
    UnexpectedEof { expected: &'static str },

    /// A header field could not be parsed.
    #[error("malformed {field} line in response header: {line:?}")]
    MalformedHeader {
        field: &'static str,
        line: String,
    },

    /// The status line did not contain a decimal integer.
    #[error("malformed status line: {line:?}")]
    BadStatusLine { line: String },

    /// The server returned a status outside the command's accepted set.
    #[error("server returned status {code}")]
    UnexpectedStatus { code: i32 },

    /// Response bytes declared as UTF-8 were not valid UTF-8. The raw
    /// undecoded bytes are preserved for offline analysis.
    #[error("invalid UTF-8 in response line ({} bytes)", bytes.len())]
    InvalidUtf8 { bytes: Vec<u8> },

    /// Text cannot be represented in the configured legacy codepage.
    #[error("text not representable in the legacy codepage: {text:?}")]
    Unencodable { text: String },
}

impl ProtocolError {
    /// Returns the server status code if this is a status rejection.
    pub fn status(&self) -> Option<i32> {
        match self {
            ProtocolError::UnexpectedStatus { code } => Some(*code),
            _ => None,
        }
    }
}
