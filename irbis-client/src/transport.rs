//! Blocking transport to the server.
//!
//! The protocol is strictly request/response: the client sends one packet,
//! the server replies and closes the socket. A transport therefore exposes a
//! single blocking exchange. Time-bounding an exchange is the transport's
//! own concern; the execution layer applies none.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};

/// A blocking "send request bytes, receive response bytes" primitive.
pub trait Transport: Send {
    /// Performs one full round trip.
    fn exchange(&mut self, request: &[u8]) -> io::Result<Vec<u8>>;
}

/// TCP transport opening a fresh connection per exchange, matching the
/// server's one-request-per-socket model.
pub struct TcpTransport {
    host: String,
    port: u16,
}

impl TcpTransport {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl Transport for TcpTransport {
    fn exchange(&mut self, request: &[u8]) -> io::Result<Vec<u8>> {
        let mut stream = TcpStream::connect((self.host.as_str(), self.port))?;
        stream.set_nodelay(true).ok();

        tracing::debug!(bytes = request.len(), "sending request");
        stream.write_all(request)?;
        stream.shutdown(Shutdown::Write)?;

        let mut response = Vec::new();
        stream.read_to_end(&mut response)?;
        tracing::debug!(bytes = response.len(), "received response");
        Ok(response)
    }
}
