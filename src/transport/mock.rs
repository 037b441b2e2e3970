//! Scripted in-memory transport for tests.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    config::TransportConfig,
    error::{Error, Result},
    transport::Transport,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Event {
    /// Bytes written, line ending included
    Write(String),
    Read,
}

#[derive(Clone, Debug)]
pub(crate) enum Reply {
    Line(String),
    /// Never complete the line; read_line runs into its deadline
    Silent,
}

/// Handle to the event log, kept by the test after the transport is moved
#[derive(Clone, Default)]
pub(crate) struct MockLog(Arc<Mutex<Vec<Event>>>);
impl MockLog {
    pub(crate) fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }

    pub(crate) fn writes(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|ev| match ev {
                Event::Write(w) => Some(w),
                Event::Read => None,
            })
            .collect()
    }

    fn push(&self, event: Event) {
        self.0.lock().unwrap().push(event);
    }
}

pub(crate) struct MockTransport {
    config: TransportConfig,
    replies: VecDeque<Reply>,
    /// Zero-based index of the write that should fail
    fail_write: Option<usize>,
    writes: usize,
    open: bool,
    log: MockLog,
}
impl MockTransport {
    pub(crate) fn new(config: TransportConfig) -> (Self, MockLog) {
        let log = MockLog::default();
        (
            Self {
                config,
                replies: VecDeque::new(),
                fail_write: None,
                writes: 0,
                open: true,
                log: log.clone(),
            },
            log,
        )
    }

    /// Mock with a short deadline so timeout tests finish quickly
    pub(crate) fn quick() -> (Self, MockLog) {
        Self::new(TransportConfig::default().with_timeout(Duration::from_millis(30)))
    }

    pub(crate) fn reply(mut self, line: &str) -> Self {
        self.replies.push_back(Reply::Line(line.to_string()));
        self
    }

    pub(crate) fn silent(mut self) -> Self {
        self.replies.push_back(Reply::Silent);
        self
    }

    pub(crate) fn fail_write(mut self, idx: usize) -> Self {
        self.fail_write = Some(idx);
        self
    }
}
#[async_trait]
impl Transport for MockTransport {
    async fn open(&mut self) -> Result<()> {
        if self.open {
            return Err(Error::Connection("mock already open".into()));
        }
        self.open = true;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.open = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        if !self.open {
            return Err(Error::Connection("mock not open".into()));
        }
        let idx = self.writes;
        self.writes += 1;
        if self.fail_write == Some(idx) {
            return Err(Error::Connection(format!("mock write {idx} failed")));
        }
        self.log
            .push(Event::Write(String::from_utf8_lossy(data).into_owned()));
        Ok(())
    }

    async fn read_line(&mut self, timeout: Duration) -> Result<Vec<u8>> {
        if !self.open {
            return Err(Error::Connection("mock not open".into()));
        }
        self.log.push(Event::Read);
        match self.replies.pop_front() {
            Some(Reply::Line(line)) => {
                let mut data = line.into_bytes();
                data.extend_from_slice(self.config.line_ending.as_bytes());
                Ok(data)
            }
            Some(Reply::Silent) | None => {
                tokio::time::sleep(timeout).await;
                Err(Error::Timeout(format!(
                    "mock silent for {} ms",
                    timeout.as_millis()
                )))
            }
        }
    }

    fn config(&self) -> &TransportConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        "mock://".into()
    }
}
