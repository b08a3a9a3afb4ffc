//! Session-lifecycle commands and the raw command escape hatch.
//!
//! Business verbs (search, record I/O, file transfer, administration) live
//! with their own data models; they plug into the same [`Command`] contract,
//! typically through [`Universal`].

use crate::command::Command;
use crate::connection::Session;
use crate::error::ClientError;
use irbis_protocol::{Argument, ClientQuery, ServerResponse};
use rand::Rng;

/// Verb code for session registration.
pub const CONNECT: &str = "A";
/// Verb code for session teardown.
pub const DISCONNECT: &str = "B";
/// Verb code for the keep-alive no-op.
pub const NOP: &str = "N";

/// Status returned when this client id is already registered; the session
/// is usable, so connect treats it as success.
const ALREADY_REGISTERED: i32 = -3337;

fn generate_client_id() -> u32 {
    rand::thread_rng().gen_range(100_000..900_000)
}

/// Establishes a session.
///
/// Generates the session client id, resets the sequence counter, and on
/// success records the server version, the suggested keep-alive interval
/// and the server-sent profile lines.
#[derive(Debug)]
pub struct Connect {
    server_version: Option<String>,
    interval: Option<u32>,
    profile: Vec<String>,
}

impl Connect {
    pub fn new() -> Self {
        Self {
            server_version: None,
            interval: None,
            profile: Vec::new(),
        }
    }

    /// Server version from the reply header.
    pub fn server_version(&self) -> Option<&str> {
        self.server_version.as_deref()
    }

    /// Keep-alive interval suggested by the server, in minutes.
    pub fn suggested_interval(&self) -> Option<u32> {
        self.interval
    }

    /// Profile lines sent back by the server for this user.
    pub fn profile(&self) -> &[String] {
        &self.profile
    }
}

impl Default for Connect {
    fn default() -> Self {
        Self::new()
    }
}

impl Command for Connect {
    fn verb(&self) -> &str {
        CONNECT
    }

    fn accepted_codes(&self) -> &[i32] {
        &[ALREADY_REGISTERED]
    }

    fn prepare(&mut self, session: &mut Session) -> Result<(), ClientError> {
        if session.connected {
            return Err(ClientError::AlreadyConnected);
        }
        session.client_id = generate_client_id();
        session.query_id = 0;
        Ok(())
    }

    fn encode_arguments(
        &mut self,
        query: &mut ClientQuery,
        session: &Session,
    ) -> Result<(), ClientError> {
        query.arg_ansi(&session.username)?;
        query.arg_ansi(&session.password)?;
        Ok(())
    }

    fn interpret(
        &mut self,
        response: &mut ServerResponse,
        session: &mut Session,
    ) -> Result<(), ClientError> {
        self.interval = response.read_ansi().and_then(|line| line.trim().parse().ok());
        self.profile = response.read_remaining_ansi();
        self.server_version = Some(response.server_version.clone());

        session.server_version = self.server_version.clone();
        session.interval = self.interval;
        session.connected = true;
        Ok(())
    }
}

/// Tears down a session. The reply carries no status line; the session
/// identity is cleared on completion.
pub struct Disconnect;

impl Disconnect {
    pub fn new() -> Self {
        Self
    }
}

impl Default for Disconnect {
    fn default() -> Self {
        Self::new()
    }
}

impl Command for Disconnect {
    fn verb(&self) -> &str {
        DISCONNECT
    }

    fn expects_return_code(&self) -> bool {
        false
    }

    fn encode_arguments(
        &mut self,
        query: &mut ClientQuery,
        session: &Session,
    ) -> Result<(), ClientError> {
        query.arg_ansi(&session.username)?;
        Ok(())
    }

    fn interpret(
        &mut self,
        _response: &mut ServerResponse,
        session: &mut Session,
    ) -> Result<(), ClientError> {
        session.clear();
        Ok(())
    }
}

/// Keep-alive no-op.
pub struct Nop;

impl Nop {
    pub fn new() -> Self {
        Self
    }
}

impl Default for Nop {
    fn default() -> Self {
        Self::new()
    }
}

impl Command for Nop {
    fn verb(&self) -> &str {
        NOP
    }
}

/// A caller-configured command: arbitrary verb, tagged arguments, accepted
/// status codes and decoding mode. Collects every remaining reply line.
pub struct Universal {
    verb: String,
    arguments: Vec<Argument>,
    accepted: Vec<i32>,
    relaxed: bool,
    assigned_code: i32,
    expects_return_code: bool,
    utf8_payload: bool,
    return_code: Option<i32>,
    lines: Vec<String>,
}

impl Universal {
    pub fn new(verb: impl Into<String>) -> Self {
        Self {
            verb: verb.into(),
            arguments: Vec::new(),
            accepted: Vec::new(),
            relaxed: false,
            assigned_code: 0,
            expects_return_code: true,
            utf8_payload: false,
            return_code: None,
            lines: Vec::new(),
        }
    }

    pub fn ansi(mut self, text: impl Into<String>) -> Self {
        self.arguments.push(Argument::Ansi(text.into()));
        self
    }

    pub fn utf8(mut self, text: impl Into<String>) -> Self {
        self.arguments.push(Argument::Utf8(text.into()));
        self
    }

    pub fn int(mut self, value: i64) -> Self {
        self.arguments.push(Argument::Int(value));
        self
    }

    pub fn flag(mut self, value: bool) -> Self {
        self.arguments.push(Argument::Bool(value));
        self
    }

    pub fn raw(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.arguments.push(Argument::Raw(bytes.into()));
        self
    }

    /// Whitelists negative status codes for this call.
    pub fn accept(mut self, codes: impl IntoIterator<Item = i32>) -> Self {
        self.accepted.extend(codes);
        self
    }

    /// Decodes the reply in relaxed mode with the given assigned status.
    pub fn relaxed(mut self, assigned_code: i32) -> Self {
        self.relaxed = true;
        self.assigned_code = assigned_code;
        self
    }

    /// Declares that the reply has no status line.
    pub fn no_return_code(mut self) -> Self {
        self.expects_return_code = false;
        self
    }

    /// Decodes payload lines as UTF-8 instead of the legacy codepage.
    pub fn utf8_payload(mut self) -> Self {
        self.utf8_payload = true;
        self
    }

    /// The validated status code, once executed.
    pub fn return_code(&self) -> Option<i32> {
        self.return_code
    }

    /// The collected payload lines, once executed.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

impl Command for Universal {
    fn verb(&self) -> &str {
        &self.verb
    }

    fn accepted_codes(&self) -> &[i32] {
        &self.accepted
    }

    fn expects_return_code(&self) -> bool {
        self.expects_return_code
    }

    fn relaxed(&self) -> bool {
        self.relaxed
    }

    fn assigned_code(&self) -> i32 {
        self.assigned_code
    }

    fn encode_arguments(
        &mut self,
        query: &mut ClientQuery,
        _session: &Session,
    ) -> Result<(), ClientError> {
        for argument in &self.arguments {
            query.push(argument)?;
        }
        Ok(())
    }

    fn interpret(
        &mut self,
        response: &mut ServerResponse,
        _session: &mut Session,
    ) -> Result<(), ClientError> {
        if self.expects_return_code {
            self.return_code = Some(response.return_code()?);
        }
        self.lines = if self.utf8_payload {
            response.read_remaining_utf8()?
        } else {
            response.read_remaining_ansi()
        };
        Ok(())
    }
}
