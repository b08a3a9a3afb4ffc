//! # irbis-protocol
//!
//! Wire protocol implementation for IRBIS64-style library automation servers.
//!
//! This crate provides:
//! - Outgoing packet assembly with per-argument text encodings
//! - Incremental response decoding with cursor tracking and status validation
//! - Legacy codepage / UTF-8 codec configuration
//! - Protocol error taxonomy

pub mod encoding;
pub mod error;
pub mod query;
pub mod response;

pub use encoding::Codec;
pub use error::ProtocolError;
pub use query::{Argument, ClientQuery};
pub use response::ServerResponse;

/// Line terminator for outgoing query packets (a single LF byte).
pub const QUERY_DELIMITER: u8 = 0x0A;

/// Line terminator for incoming response packets (CR followed by LF).
pub const RESPONSE_DELIMITER: [u8; 2] = [0x0D, 0x0A];

/// Default port for IRBIS64 servers.
pub const DEFAULT_PORT: u16 = 6666;
