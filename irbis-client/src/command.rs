//! The per-verb command contract.

use crate::connection::Session;
use crate::error::ClientError;
use crate::transport::Transport;
use bytes::Bytes;
use irbis_protocol::{ClientQuery, ServerResponse};

/// Per-call state threaded through the engine chain.
///
/// Aggregates the session being mutated, the transport, the in-flight wire
/// buffers, and the captured error when a hook suppresses propagation.
pub struct ExecutionContext<'a> {
    pub session: &'a mut Session,
    pub transport: &'a mut dyn Transport,
    /// The encoded outgoing packet, once built.
    pub request: Option<Bytes>,
    /// The raw incoming packet, once received.
    pub response: Option<Bytes>,
    /// The captured error when an error hook marked it handled.
    pub error: Option<ClientError>,
    handled: bool,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(session: &'a mut Session, transport: &'a mut dyn Transport) -> Self {
        Self {
            session,
            transport,
            request: None,
            response: None,
            error: None,
            handled: false,
        }
    }

    /// Marks the current error handled, suppressing propagation. Only
    /// meaningful inside an error hook.
    pub fn mark_handled(&mut self) {
        self.handled = true;
    }

    pub fn is_handled(&self) -> bool {
        self.handled
    }
}

/// One server verb: argument construction plus response interpretation,
/// bound together without re-implementing framing.
///
/// Implementations are capability sets, not a hierarchy: each supplies its
/// verb code, its accepted negative status codes, and its interpretation of
/// the decoded reply. Typed results live on the command value and are read
/// through verb-specific accessors after execution.
pub trait Command {
    /// The verb code stamped on the outgoing packet.
    fn verb(&self) -> &str;

    /// Negative status codes this verb treats as legitimate outcomes.
    fn accepted_codes(&self) -> &[i32] {
        &[]
    }

    /// Whether the reply carries a status line at all. Verbs whose replies
    /// have none must say so here rather than let the engine parse one.
    fn expects_return_code(&self) -> bool {
        true
    }

    /// Whether the reply is decoded in relaxed mode (no header parsing).
    fn relaxed(&self) -> bool {
        false
    }

    /// Status code assigned to a relaxed reply.
    fn assigned_code(&self) -> i32 {
        0
    }

    /// Runs before packet construction. The default requires an established
    /// session; session-establishing verbs override this.
    fn prepare(&mut self, session: &mut Session) -> Result<(), ClientError> {
        if !session.connected {
            return Err(ClientError::NotConnected);
        }
        Ok(())
    }

    /// Appends this verb's arguments in their fixed order.
    fn encode_arguments(
        &mut self,
        query: &mut ClientQuery,
        session: &Session,
    ) -> Result<(), ClientError> {
        let _ = (query, session);
        Ok(())
    }

    /// Interprets the decoded reply. The status code has already been
    /// validated when this runs. May mutate session state on success.
    fn interpret(
        &mut self,
        response: &mut ServerResponse,
        session: &mut Session,
    ) -> Result<(), ClientError> {
        let _ = (response, session);
        Ok(())
    }
}
