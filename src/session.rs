//! SCPI command/query protocol over a [`Transport`].
//!
//! SCPI devices answer exactly one line per query and nothing for plain
//! commands. Sending a query through [`ScpiSession::send`] (or a command
//! through [`ScpiSession::query`]) leaves the read side out of step with the
//! caller, so every call site has to pick the method matching the command.
//!
//! The session is not synchronized: a second caller writing between the
//! write and read of a query would receive the wrong reply. Share it through
//! [`SharedSession`], which holds its lock across the whole exchange.

use std::{sync::Arc, time::Duration};

use log::{debug, warn};
use tokio::sync::{Mutex, MutexGuard};

use crate::{
    config::{Resource, TransportConfig},
    error::Result,
    model::Identity,
    transport::{Transport, open_transport},
};

pub struct ScpiSession {
    transport: Box<dyn Transport>,
}
impl ScpiSession {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Open the endpoint described by `resource`, falling back to `defaults`
    /// for settings the URI does not carry.
    pub async fn connect(resource: &Resource, defaults: TransportConfig) -> Result<Self> {
        let transport = open_transport(&resource.endpoint, resource.config_or(defaults)).await?;
        Ok(Self::new(transport))
    }

    /// Write `command` followed by the line terminator. Never reads.
    pub async fn send(&mut self, command: impl AsRef<str>) -> Result<()> {
        let command = command.as_ref();
        let eol = self.transport.config().line_ending.as_bytes();

        let mut to_send = Vec::with_capacity(command.len() + eol.len());
        to_send.extend_from_slice(command.as_bytes());
        to_send.extend_from_slice(eol);
        self.transport.write(&to_send).await
    }

    /// Write `command`, then read exactly one response line and return it
    /// with the terminator stripped.
    ///
    /// A timed out reply is not drained. If the instrument answers late, that
    /// line is returned by the next query, so close and reconnect after
    /// [`Error::Timeout`](crate::error::Error::Timeout).
    pub async fn query(&mut self, command: impl AsRef<str>) -> Result<String> {
        let command = command.as_ref();
        self.send(command).await?;

        let timeout = self.timeout();
        let resp = match self.transport.read_line(timeout).await {
            Ok(resp) => resp,
            Err(e) if e.is_timeout() => {
                warn!(command = command; "No response from {}: {e}", self.transport.endpoint());
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        let resp = String::from_utf8_lossy(&resp);
        let resp = resp.trim_end_matches(['\r', '\n']).to_string();
        debug!("query({command}) -> {resp}");
        Ok(resp)
    }

    /// `*IDN?`
    pub async fn identify(&mut self) -> Result<Identity> {
        let idn = self.query("*IDN?").await?;
        Identity::from_idn(&idn)
    }

    pub fn timeout(&self) -> Duration {
        self.transport.config().timeout
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_open()
    }

    pub fn endpoint(&self) -> String {
        self.transport.endpoint()
    }

    pub async fn close(&mut self) -> Result<()> {
        self.transport.close().await
    }

    pub fn into_shared(self) -> SharedSession {
        SharedSession(Arc::new(Mutex::new(self)))
    }
}

/// Mutual-exclusion wrapper for callers that need a session from several
/// tasks. Each `send`/`query` holds the lock for its full exchange.
#[derive(Clone)]
pub struct SharedSession(Arc<Mutex<ScpiSession>>);
impl SharedSession {
    pub async fn send(&self, command: impl AsRef<str>) -> Result<()> {
        self.0.lock().await.send(command).await
    }

    pub async fn query(&self, command: impl AsRef<str>) -> Result<String> {
        self.0.lock().await.query(command).await
    }

    /// Hold the session for a multi-command sequence
    pub async fn lock(&self) -> MutexGuard<'_, ScpiSession> {
        self.0.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::LineEnding,
        error::Error,
        transport::mock::{Event, MockTransport},
    };

    #[tokio::test]
    async fn send_writes_terminated_line_without_reading() {
        let (mock, log) = MockTransport::quick();
        let mut session = ScpiSession::new(Box::new(mock));

        session.send("smua.measure.autozero = smua.AUTOZERO_OFF").await.unwrap();

        assert_eq!(
            log.events(),
            vec![Event::Write("smua.measure.autozero = smua.AUTOZERO_OFF\n".into())]
        );
    }

    #[tokio::test]
    async fn send_uses_transport_line_ending() {
        let (mock, log) = MockTransport::new(
            TransportConfig::default().with_line_ending(LineEnding::CrLf),
        );
        let mut session = ScpiSession::new(Box::new(mock.reply("0")));

        session.send("*CLS").await.unwrap();
        assert_eq!(session.query("*OPC?").await.unwrap(), "0");
        assert_eq!(log.writes(), vec!["*CLS\r\n", "*OPC?\r\n"]);
    }

    #[tokio::test]
    async fn query_writes_once_then_reads_once() {
        let (mock, log) = MockTransport::quick();
        let mut session = ScpiSession::new(Box::new(mock.reply("1.234500E+00")));

        let resp = session.query("print(reading)").await.unwrap();

        assert_eq!(resp, "1.234500E+00");
        assert_eq!(
            log.events(),
            vec![Event::Write("print(reading)\n".into()), Event::Read]
        );
    }

    #[tokio::test]
    async fn query_times_out_on_silent_transport() {
        let (mock, log) = MockTransport::quick();
        let mut session = ScpiSession::new(Box::new(mock.silent()));

        let start = std::time::Instant::now();
        let res = session.query("print(reading)").await;

        assert!(matches!(res, Err(Error::Timeout(_))), "{res:?}");
        assert!(start.elapsed() < Duration::from_secs(2));
        assert_eq!(log.events().len(), 2);
    }

    #[tokio::test]
    async fn closed_transport_is_connection_error() {
        let (mock, log) = MockTransport::quick();
        let mut session = ScpiSession::new(Box::new(mock.reply("unused")));
        session.close().await.unwrap();
        assert!(!session.is_open());

        assert!(matches!(session.send("*RST").await, Err(Error::Connection(_))));
        assert!(matches!(session.query("*IDN?").await, Err(Error::Connection(_))));
        assert!(log.events().is_empty());
    }

    #[tokio::test]
    async fn identify_parses_idn() {
        let (mock, _log) = MockTransport::quick();
        let mut session = ScpiSession::new(Box::new(
            mock.reply("Keithley Instruments Inc., Model 2636B, 1234567, 4.0.0"),
        ));

        let id = session.identify().await.unwrap();
        assert_eq!(id.model, "Model 2636B");
    }

    #[tokio::test]
    async fn shared_session_keeps_exchanges_paired() {
        let (mock, log) = MockTransport::quick();
        let mock = (0..8).fold(mock, |m, i| m.reply(&i.to_string()));
        let shared = ScpiSession::new(Box::new(mock)).into_shared();

        let mut tasks = vec![];
        for _ in 0..8 {
            let shared = shared.clone();
            tasks.push(tokio::spawn(async move { shared.query("next?").await }));
        }
        let mut replies = vec![];
        for task in tasks {
            replies.push(task.await.unwrap().unwrap());
        }
        replies.sort();
        assert_eq!(replies, (0..8).map(|i| i.to_string()).collect::<Vec<_>>());

        /* Strict write/read alternation */
        let events = log.events();
        for pair in events.chunks(2) {
            assert!(matches!(pair, [Event::Write(_), Event::Read]));
        }
    }
}
