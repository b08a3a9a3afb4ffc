//! Command execution.
//!
//! Every command passes through one engine chain. Engines compose as
//! decorators: wrapping layers may observe, short-circuit or delegate, and
//! the chain terminates in [`StandardEngine`], the layer that talks to the
//! transport. Hooks fire on the thread already holding the connection's
//! execution guard, so they need no synchronization of their own.

use crate::command::{Command, ExecutionContext};
use crate::error::{ClientError, Evidence};
use bytes::Bytes;
use irbis_protocol::{ClientQuery, Codec, ServerResponse};
use std::time::Instant;

/// One link of the engine chain.
pub trait ExecutionEngine: Send + Sync {
    /// Runs the full cycle of one command.
    fn execute(
        &self,
        ctx: &mut ExecutionContext<'_>,
        command: &mut dyn Command,
    ) -> Result<(), ClientError>;
}

type Hook = Box<dyn Fn(&ExecutionContext<'_>) + Send + Sync>;
type ErrorHook = Box<dyn Fn(&mut ExecutionContext<'_>, &ClientError) + Send + Sync>;

/// The terminal engine: verifies identity, builds and sends the packet,
/// decodes and validates the reply, and lets the command interpret it.
pub struct StandardEngine {
    codec: Codec,
    before: Vec<Hook>,
    after: Vec<Hook>,
    on_error: Vec<ErrorHook>,
}

impl StandardEngine {
    pub fn new(codec: Codec) -> Self {
        Self {
            codec,
            before: Vec::new(),
            after: Vec::new(),
            on_error: Vec::new(),
        }
    }

    /// Registers a hook fired before the transport exchange.
    pub fn on_before(
        mut self,
        hook: impl Fn(&ExecutionContext<'_>) + Send + Sync + 'static,
    ) -> Self {
        self.before.push(Box::new(hook));
        self
    }

    /// Registers a hook fired after every execution, on success or failure.
    pub fn on_after(
        mut self,
        hook: impl Fn(&ExecutionContext<'_>) + Send + Sync + 'static,
    ) -> Self {
        self.after.push(Box::new(hook));
        self
    }

    /// Registers a hook fired on failure. The hook may call
    /// [`ExecutionContext::mark_handled`] to suppress propagation; by
    /// default the error still propagates after every hook has run.
    pub fn on_error(
        mut self,
        hook: impl Fn(&mut ExecutionContext<'_>, &ClientError) + Send + Sync + 'static,
    ) -> Self {
        self.on_error.push(Box::new(hook));
        self
    }

    fn run(
        &self,
        ctx: &mut ExecutionContext<'_>,
        command: &mut dyn Command,
    ) -> Result<(), ClientError> {
        command.prepare(ctx.session)?;

        if command.verb().is_empty() {
            return Err(ClientError::Misconfigured("command code"));
        }
        if ctx.session.client_id == 0 {
            return Err(ClientError::Misconfigured("client id"));
        }
        if ctx.session.username.is_empty() {
            return Err(ClientError::Misconfigured("credentials"));
        }

        let sequence = ctx.session.advance();
        let mut query = ClientQuery::new(
            self.codec,
            command.verb(),
            ctx.session.workstation.code(),
            ctx.session.client_id,
            sequence,
            &ctx.session.username,
            &ctx.session.password,
        )?;
        command.encode_arguments(&mut query, ctx.session)?;

        let packet = query.encode().freeze();
        ctx.request = Some(packet.clone());
        tracing::debug!(
            verb = command.verb(),
            sequence,
            bytes = packet.len(),
            "dispatching command"
        );

        let raw = ctx.transport.exchange(&packet)?;
        let data = Bytes::from(raw);
        ctx.response = Some(data.clone());

        let mut response = if command.relaxed() {
            ServerResponse::relaxed(data, self.codec, command.assigned_code())
        } else {
            ServerResponse::parse(data, self.codec)?
        };

        if command.expects_return_code() {
            if let Err(err) = response.check_return_code(command.accepted_codes()) {
                tracing::debug!(remainder = %response.remainder_hex(), "response rejected");
                return Err(err.into());
            }
        }

        command.interpret(&mut response, ctx.session)?;
        Ok(())
    }
}

impl ExecutionEngine for StandardEngine {
    fn execute(
        &self,
        ctx: &mut ExecutionContext<'_>,
        command: &mut dyn Command,
    ) -> Result<(), ClientError> {
        for hook in &self.before {
            hook(ctx);
        }

        let outcome = match self.run(ctx, command) {
            Ok(()) => Ok(()),
            Err(source) => {
                let error = ClientError::Command {
                    verb: command.verb().to_string(),
                    evidence: Evidence {
                        request: ctx.request.clone(),
                        response: ctx.response.clone(),
                    },
                    source: Box::new(source),
                };
                for hook in &self.on_error {
                    hook(ctx, &error);
                }
                if ctx.is_handled() {
                    tracing::debug!("error marked handled by hook: {error}");
                    ctx.error = Some(error);
                    Ok(())
                } else {
                    Err(error)
                }
            }
        };

        for hook in &self.after {
            hook(ctx);
        }
        outcome
    }
}

/// A decorating engine that traces each command through its inner engine.
pub struct LoggingEngine<E> {
    inner: E,
}

impl<E: ExecutionEngine> LoggingEngine<E> {
    pub fn new(inner: E) -> Self {
        Self { inner }
    }
}

impl<E: ExecutionEngine> ExecutionEngine for LoggingEngine<E> {
    fn execute(
        &self,
        ctx: &mut ExecutionContext<'_>,
        command: &mut dyn Command,
    ) -> Result<(), ClientError> {
        let span = tracing::debug_span!("command", verb = command.verb());
        let _guard = span.enter();
        let started = Instant::now();

        let result = self.inner.execute(ctx, command);
        match &result {
            Ok(()) => tracing::debug!(elapsed = ?started.elapsed(), "command completed"),
            Err(err) => tracing::debug!(elapsed = ?started.elapsed(), "command failed: {err}"),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{Connect, Nop, Universal};
    use crate::connection::{ConnectionConfig, Session};
    use crate::transport::Transport;
    use irbis_protocol::ProtocolError;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct ScriptedTransport {
        replies: VecDeque<Vec<u8>>,
        sent: Vec<Vec<u8>>,
    }

    impl ScriptedTransport {
        fn new(replies: impl IntoIterator<Item = Vec<u8>>) -> Self {
            Self {
                replies: replies.into_iter().collect(),
                sent: Vec::new(),
            }
        }
    }

    impl Transport for ScriptedTransport {
        fn exchange(&mut self, request: &[u8]) -> std::io::Result<Vec<u8>> {
            self.sent.push(request.to_vec());
            self.replies.pop_front().ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "no scripted reply")
            })
        }
    }

    fn reply(verb: &str, payload: &[&str]) -> Vec<u8> {
        let mut lines = vec![verb.to_string(), "1".into(), "1".into(), "0".into(), "64.2012.1".into()];
        lines.extend(std::iter::repeat(String::new()).take(5));
        lines.extend(payload.iter().map(|s| s.to_string()));
        let mut buf = Vec::new();
        for line in lines {
            buf.extend_from_slice(line.as_bytes());
            buf.extend_from_slice(b"\r\n");
        }
        buf
    }

    fn ready_session() -> Session {
        let config = ConnectionConfig::new("localhost").with_credentials("librarian", "secret");
        let mut session = Session::from_config(&config);
        session.client_id = 123456;
        session.connected = true;
        session
    }

    #[test]
    fn test_nop_cycle() {
        let mut session = ready_session();
        let mut transport = ScriptedTransport::new([reply("N", &["0"])]);
        let engine = StandardEngine::new(Codec::new());

        let mut ctx = ExecutionContext::new(&mut session, &mut transport);
        engine.execute(&mut ctx, &mut Nop::new()).unwrap();

        assert!(ctx.request.is_some());
        assert!(ctx.response.is_some());
        assert_eq!(session.query_id, 1);
    }

    #[test]
    fn test_sequence_advances_per_dispatch() {
        let mut session = ready_session();
        let mut transport =
            ScriptedTransport::new([reply("N", &["0"]), reply("N", &["0"]), reply("N", &["0"])]);
        let engine = StandardEngine::new(Codec::new());

        for _ in 0..3 {
            let mut ctx = ExecutionContext::new(&mut session, &mut transport);
            engine.execute(&mut ctx, &mut Nop::new()).unwrap();
        }
        assert_eq!(session.query_id, 3);

        // each dispatched packet carries its own sequence number
        let sequences: Vec<&[u8]> = transport
            .sent
            .iter()
            .map(|packet| packet.split(|&b| b == 0x0A).nth(5).unwrap())
            .collect();
        assert_eq!(sequences, vec![b"1", b"2", b"3"]);
    }

    #[test]
    fn test_not_connected_rejected() {
        let config = ConnectionConfig::new("localhost").with_credentials("u", "p");
        let mut session = Session::from_config(&config);
        let mut transport = ScriptedTransport::new([]);
        let engine = StandardEngine::new(Codec::new());

        let mut ctx = ExecutionContext::new(&mut session, &mut transport);
        let result = engine.execute(&mut ctx, &mut Nop::new());
        match result {
            Err(ClientError::Command { source, .. }) => {
                assert!(matches!(*source, ClientError::NotConnected));
            }
            other => panic!("expected wrapped NotConnected, got {other:?}"),
        }
        // nothing was sent
        assert!(transport.sent.is_empty());
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let config = ConnectionConfig::new("localhost");
        let mut session = Session::from_config(&config);
        session.connected = true;
        session.client_id = 42;
        let mut transport = ScriptedTransport::new([]);
        let engine = StandardEngine::new(Codec::new());

        let mut ctx = ExecutionContext::new(&mut session, &mut transport);
        let result = engine.execute(&mut ctx, &mut Nop::new());
        match result {
            Err(ClientError::Command { source, .. }) => {
                assert!(matches!(*source, ClientError::Misconfigured("credentials")));
            }
            other => panic!("expected Misconfigured, got {other:?}"),
        }
    }

    #[test]
    fn test_connect_cycle() {
        let config = ConnectionConfig::new("localhost").with_credentials("librarian", "secret");
        let mut session = Session::from_config(&config);
        let mut transport =
            ScriptedTransport::new([reply("A", &["0", "30", "MAIN.INI", "PARAM=1"])]);
        let engine = StandardEngine::new(Codec::new());

        let mut command = Connect::new();
        let mut ctx = ExecutionContext::new(&mut session, &mut transport);
        engine.execute(&mut ctx, &mut command).unwrap();

        assert!(session.connected);
        assert!(session.client_id >= 100_000);
        assert_eq!(session.query_id, 1);
        assert_eq!(session.server_version.as_deref(), Some("64.2012.1"));
        assert_eq!(command.suggested_interval(), Some(30));
        assert_eq!(command.profile(), ["MAIN.INI", "PARAM=1"]);
    }

    #[test]
    fn test_connect_while_connected_fails_fast() {
        let mut session = ready_session();
        let mut transport = ScriptedTransport::new([]);
        let engine = StandardEngine::new(Codec::new());

        let mut ctx = ExecutionContext::new(&mut session, &mut transport);
        let result = engine.execute(&mut ctx, &mut Connect::new());
        match result {
            Err(ClientError::Command { source, .. }) => {
                assert!(matches!(*source, ClientError::AlreadyConnected));
            }
            other => panic!("expected AlreadyConnected, got {other:?}"),
        }
        assert!(transport.sent.is_empty());
    }

    #[test]
    fn test_accepted_status_does_not_fail() {
        let mut session = ready_session();
        let mut transport = ScriptedTransport::new([reply("K", &["-602"])]);
        let engine = StandardEngine::new(Codec::new());

        let mut command = Universal::new("K").accept([-201, -600, -602, -603]);
        let mut ctx = ExecutionContext::new(&mut session, &mut transport);
        engine.execute(&mut ctx, &mut command).unwrap();
        assert_eq!(command.return_code(), Some(-602));
    }

    #[test]
    fn test_unlisted_status_fails_with_evidence() {
        let mut session = ready_session();
        let mut transport = ScriptedTransport::new([reply("K", &["-500"])]);
        let engine = StandardEngine::new(Codec::new());

        let mut command = Universal::new("K").accept([-201, -600, -602, -603]);
        let mut ctx = ExecutionContext::new(&mut session, &mut transport);
        let error = engine.execute(&mut ctx, &mut command).unwrap_err();

        assert_eq!(error.status(), Some(-500));
        let evidence = error.evidence().unwrap();
        assert!(evidence.request.is_some());
        assert!(evidence.response.is_some());
    }

    #[test]
    fn test_relaxed_command_skips_header() {
        let mut session = ready_session();
        // not a parseable header; relaxed mode must not care
        let mut transport = ScriptedTransport::new([b"raw\r\nadmin\r\noutput\r\n".to_vec()]);
        let engine = StandardEngine::new(Codec::new());

        let mut command = Universal::new("X").relaxed(0);
        let mut ctx = ExecutionContext::new(&mut session, &mut transport);
        engine.execute(&mut ctx, &mut command).unwrap();
        assert_eq!(command.lines(), ["raw", "admin", "output"]);
    }

    #[test]
    fn test_hooks_fire_in_order() {
        let mut session = ready_session();
        let mut transport = ScriptedTransport::new([reply("N", &["0"])]);
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let before_log = log.clone();
        let after_log = log.clone();
        let engine = StandardEngine::new(Codec::new())
            .on_before(move |_| before_log.lock().push("before"))
            .on_after(move |_| after_log.lock().push("after"));

        let mut ctx = ExecutionContext::new(&mut session, &mut transport);
        engine.execute(&mut ctx, &mut Nop::new()).unwrap();
        assert_eq!(*log.lock(), vec!["before", "after"]);
    }

    #[test]
    fn test_after_hook_fires_on_failure() {
        let mut session = ready_session();
        let mut transport = ScriptedTransport::new([]);
        let fired = Arc::new(AtomicBool::new(false));

        let after_fired = fired.clone();
        let engine = StandardEngine::new(Codec::new())
            .on_after(move |_| after_fired.store(true, Ordering::SeqCst));

        let mut ctx = ExecutionContext::new(&mut session, &mut transport);
        assert!(engine.execute(&mut ctx, &mut Nop::new()).is_err());
        assert!(fired.load(Ordering::SeqCst));
    }

    #[test]
    fn test_error_hook_can_suppress() {
        let mut session = ready_session();
        let mut transport = ScriptedTransport::new([reply("K", &["-500"])]);
        let engine = StandardEngine::new(Codec::new()).on_error(|ctx, _| ctx.mark_handled());

        let mut command = Universal::new("K");
        let mut ctx = ExecutionContext::new(&mut session, &mut transport);
        engine.execute(&mut ctx, &mut command).unwrap();

        // the captured error is still observable on the context
        assert_eq!(ctx.error.as_ref().and_then(|e| e.status()), Some(-500));
    }

    #[test]
    fn test_error_propagates_by_default() {
        let mut session = ready_session();
        let mut transport = ScriptedTransport::new([reply("K", &["-500"])]);
        let observed = Arc::new(AtomicBool::new(false));

        let hook_observed = observed.clone();
        let engine = StandardEngine::new(Codec::new())
            .on_error(move |_, _| hook_observed.store(true, Ordering::SeqCst));

        let mut ctx = ExecutionContext::new(&mut session, &mut transport);
        let result = engine.execute(&mut ctx, &mut Universal::new("K"));
        assert!(result.is_err());
        assert!(observed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_framing_error_on_truncated_reply() {
        let mut session = ready_session();
        let mut transport = ScriptedTransport::new([b"N\r\n1\r\n".to_vec()]);
        let engine = StandardEngine::new(Codec::new());

        let mut ctx = ExecutionContext::new(&mut session, &mut transport);
        let error = engine.execute(&mut ctx, &mut Nop::new()).unwrap_err();
        match error {
            ClientError::Command { source, .. } => match *source {
                ClientError::Protocol(ProtocolError::UnexpectedEof { .. }) => {}
                other => panic!("expected UnexpectedEof, got {other:?}"),
            },
            other => panic!("expected wrapped error, got {other:?}"),
        }
    }

    #[test]
    fn test_logging_engine_delegates() {
        let mut session = ready_session();
        let mut transport = ScriptedTransport::new([reply("N", &["0"])]);
        let engine = LoggingEngine::new(StandardEngine::new(Codec::new()));

        let mut ctx = ExecutionContext::new(&mut session, &mut transport);
        engine.execute(&mut ctx, &mut Nop::new()).unwrap();
        assert_eq!(session.query_id, 1);
    }
}
