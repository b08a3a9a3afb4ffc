//! # irbis-client
//!
//! Client library for IRBIS64-style library automation servers.
//!
//! This crate provides:
//! - Session state and connection lifecycle management
//! - A per-verb command contract over the wire protocol
//! - A serializing execution engine with hooks and decorator chaining
//! - A blocking TCP transport (one exchange per request)

pub mod command;
pub mod commands;
pub mod connection;
pub mod engine;
pub mod error;
pub mod transport;

pub use command::{Command, ExecutionContext};
pub use commands::{Connect, Disconnect, Nop, Universal};
pub use connection::{Connection, ConnectionConfig, Session, Workstation};
pub use engine::{ExecutionEngine, LoggingEngine, StandardEngine};
pub use error::{ClientError, Evidence};
pub use transport::{TcpTransport, Transport};
