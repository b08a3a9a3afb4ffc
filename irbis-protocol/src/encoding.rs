//! Text codec configuration.
//!
//! The wire format predates Unicode and mixes a legacy single-byte codepage
//! (identifiers, metadata) with UTF-8 (user content). Which codepage is in
//! use, and how strictly UTF-8 is decoded, is carried as an explicit value
//! threaded into query and response construction rather than process-global
//! state.

use crate::error::ProtocolError;
use encoding_rs::{Encoding, WINDOWS_1251};

/// Codec configuration for one connection.
#[derive(Debug, Clone, Copy)]
pub struct Codec {
    ansi: &'static Encoding,
    lossy_utf8: bool,
}

impl Codec {
    /// Creates the default codec: windows-1251 legacy text, strict UTF-8.
    pub fn new() -> Self {
        Self {
            ansi: WINDOWS_1251,
            lossy_utf8: false,
        }
    }

    /// Overrides the legacy codepage.
    pub fn with_ansi(mut self, encoding: &'static Encoding) -> Self {
        self.ansi = encoding;
        self
    }

    /// Replaces invalid UTF-8 sequences instead of failing the read.
    pub fn with_lossy_utf8(mut self) -> Self {
        self.lossy_utf8 = true;
        self
    }

    /// Encodes text in the legacy codepage.
    pub fn encode_ansi(&self, text: &str) -> Result<Vec<u8>, ProtocolError> {
        let (bytes, _, had_errors) = self.ansi.encode(text);
        if had_errors {
            return Err(ProtocolError::Unencodable {
                text: text.to_string(),
            });
        }
        Ok(bytes.into_owned())
    }

    /// Decodes legacy-codepage bytes. Single-byte codepages map every byte
    /// value, so this cannot fail.
    pub fn decode_ansi(&self, bytes: &[u8]) -> String {
        let (text, _, _) = self.ansi.decode(bytes);
        text.into_owned()
    }

    /// Decodes UTF-8 bytes. In strict mode an invalid sequence fails the
    /// read and the raw bytes travel with the error.
    pub fn decode_utf8(&self, bytes: &[u8]) -> Result<String, ProtocolError> {
        if self.lossy_utf8 {
            return Ok(String::from_utf8_lossy(bytes).into_owned());
        }
        String::from_utf8(bytes.to_vec())
            .map_err(|err| ProtocolError::InvalidUtf8 {
                bytes: err.into_bytes(),
            })
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self::new()
    }
}
