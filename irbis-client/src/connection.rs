//! Connection state and lifecycle.

use crate::command::{Command, ExecutionContext};
use crate::commands::{Connect, Disconnect, Nop};
use crate::engine::{ExecutionEngine, StandardEngine};
use crate::error::ClientError;
use crate::transport::{TcpTransport, Transport};
use irbis_protocol::{Codec, DEFAULT_PORT};
use parking_lot::Mutex;

/// Client role, sent as a single character in every query header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workstation {
    Administrator,
    Cataloger,
    Acquisitions,
    Circulation,
    Provision,
    Reader,
}

impl Workstation {
    /// The protocol character for this role.
    pub fn code(&self) -> char {
        match self {
            Workstation::Administrator => 'A',
            Workstation::Cataloger => 'C',
            Workstation::Acquisitions => 'M',
            Workstation::Circulation => 'B',
            Workstation::Provision => 'K',
            Workstation::Reader => 'R',
        }
    }
}

impl std::fmt::Display for Workstation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Server host.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Login sent in every query header.
    pub username: String,
    /// Password sent in every query header.
    pub password: String,
    /// Target database.
    pub database: String,
    /// Client role.
    pub workstation: Workstation,
    /// Text codec for this connection.
    pub codec: Codec,
}

impl ConnectionConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            username: String::new(),
            password: String::new(),
            database: "IBIS".to_string(),
            workstation: Workstation::Cataloger,
            codec: Codec::new(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn with_workstation(mut self, workstation: Workstation) -> Self {
        self.workstation = workstation;
        self
    }

    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }
}

/// Per-session identity and counters.
///
/// The client id is generated once when a session is established and stays
/// fixed for its lifetime. The sequence counter advances once per dispatched
/// command; the server uses it to detect desynchronized clients. Both are
/// only ever touched while the connection's execution guard is held.
#[derive(Debug, Clone)]
pub struct Session {
    pub username: String,
    pub password: String,
    pub database: String,
    pub workstation: Workstation,
    /// Session-scoped identity; 0 until a session is established.
    pub client_id: u32,
    /// Sequence counter, advanced once per dispatched command.
    pub query_id: u32,
    pub connected: bool,
    /// Server version reported at connect.
    pub server_version: Option<String>,
    /// Keep-alive interval suggested by the server at connect, in minutes.
    pub interval: Option<u32>,
}

impl Session {
    pub fn from_config(config: &ConnectionConfig) -> Self {
        Self {
            username: config.username.clone(),
            password: config.password.clone(),
            database: config.database.clone(),
            workstation: config.workstation,
            client_id: 0,
            query_id: 0,
            connected: false,
            server_version: None,
            interval: None,
        }
    }

    /// Advances the sequence counter and returns the value to stamp on the
    /// next query.
    pub fn advance(&mut self) -> u32 {
        self.query_id += 1;
        self.query_id
    }

    /// Clears session identity after teardown.
    pub fn clear(&mut self) {
        self.client_id = 0;
        self.query_id = 0;
        self.connected = false;
        self.server_version = None;
        self.interval = None;
    }
}

struct Inner {
    session: Session,
    transport: Box<dyn Transport>,
}

/// A connection to an IRBIS64 server.
///
/// All command dispatch is funneled through one execution guard: exactly one
/// command is in flight per connection at a time. Independent connections
/// may be driven concurrently.
pub struct Connection {
    engine: Box<dyn ExecutionEngine>,
    inner: Mutex<Inner>,
}

impl Connection {
    /// Creates a connection using the blocking TCP transport.
    pub fn new(config: ConnectionConfig) -> Self {
        let transport = Box::new(TcpTransport::new(config.host.clone(), config.port));
        Self::with_transport(config, transport)
    }

    /// Creates a connection over a caller-supplied transport.
    pub fn with_transport(config: ConnectionConfig, transport: Box<dyn Transport>) -> Self {
        let engine = Box::new(StandardEngine::new(config.codec));
        Self::with_engine(config, transport, engine)
    }

    /// Creates a connection with a caller-supplied engine chain. The chain
    /// must terminate in an engine that talks to the transport.
    pub fn with_engine(
        config: ConnectionConfig,
        transport: Box<dyn Transport>,
        engine: Box<dyn ExecutionEngine>,
    ) -> Self {
        Self {
            engine,
            inner: Mutex::new(Inner {
                session: Session::from_config(&config),
                transport,
            }),
        }
    }

    /// Runs one command through the engine chain.
    ///
    /// The execution guard is acquired before the outgoing packet is built
    /// and released only after the response has been fully interpreted.
    pub fn execute(&self, command: &mut dyn Command) -> Result<(), ClientError> {
        let mut inner = self.inner.lock();
        let inner = &mut *inner;
        let mut ctx = ExecutionContext::new(&mut inner.session, inner.transport.as_mut());
        self.engine.execute(&mut ctx, command)
    }

    /// Establishes a session. Fails immediately when already connected.
    pub fn connect(&self) -> Result<Connect, ClientError> {
        let mut command = Connect::new();
        self.execute(&mut command)?;
        Ok(command)
    }

    /// Tears down the session, best-effort: a failure to notify the server
    /// is logged and the identity is cleared regardless, since the
    /// transport is going away either way.
    pub fn disconnect(&self) -> Result<(), ClientError> {
        let mut command = Disconnect::new();
        if let Err(err) = self.execute(&mut command) {
            tracing::warn!("disconnect notification failed: {err}");
            self.inner.lock().session.clear();
        }
        Ok(())
    }

    /// Keeps the session alive.
    pub fn nop(&self) -> Result<(), ClientError> {
        self.execute(&mut Nop::new())
    }

    /// Whether a session is currently established.
    pub fn is_connected(&self) -> bool {
        self.inner.lock().session.connected
    }

    /// Server version reported at connect, if connected.
    pub fn server_version(&self) -> Option<String> {
        self.inner.lock().session.server_version.clone()
    }
}
