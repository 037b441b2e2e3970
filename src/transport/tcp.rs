use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use tokio::{io::AsyncWriteExt, net::TcpStream};

use crate::{
    config::TransportConfig,
    error::{Error, Result},
    transport::{Transport, printable, read_until},
};

pub struct NetworkTransport {
    host: String,
    port: u16,
    config: TransportConfig,
    stream: Option<TcpStream>,
}
impl NetworkTransport {
    pub fn new(host: &str, port: u16, config: TransportConfig) -> Self {
        Self {
            host: host.to_string(),
            port,
            config,
            stream: None,
        }
    }
}
#[async_trait]
impl Transport for NetworkTransport {
    async fn open(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Err(Error::Connection(format!("{} already open", self.endpoint())));
        }

        /* The read timeout also bounds connection setup */
        let connect = TcpStream::connect((self.host.as_str(), self.port));
        let stream = match tokio::time::timeout(self.config.timeout, connect).await {
            Err(_) => {
                return Err(Error::Connection(format!(
                    "Timed out connecting to {}",
                    self.endpoint()
                )));
            }
            Ok(res) => res.map_err(|e| {
                Error::Connection(format!("Could not connect to {}: {e}", self.endpoint()))
            })?,
        };
        stream.set_nodelay(true)?;
        debug!("open(): {}", self.endpoint());
        self.stream = Some(stream);

        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            debug!("close(): {}", self.endpoint());
            /* Peer may already be gone, nothing to do about it */
            let _ = stream.shutdown().await;
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let Some(stream) = &mut self.stream else {
            return Err(Error::Connection(format!("{}:{} not open", self.host, self.port)));
        };

        debug!("write(): {}", printable(data));

        if let Err(e) = stream.write_all(data).await {
            self.stream = None;
            return Err(Error::Connection(format!(
                "Write to {}:{} failed: {e}",
                self.host, self.port
            )));
        }

        Ok(())
    }

    async fn read_line(&mut self, timeout: Duration) -> Result<Vec<u8>> {
        let Some(stream) = &mut self.stream else {
            return Err(Error::Connection(format!("{}:{} not open", self.host, self.port)));
        };

        let line = match read_until(stream, self.config.line_ending.terminator(), timeout).await {
            Ok(line) => line,
            Err(Error::Connection(msg)) => {
                /* Stream is unusable once the peer is gone */
                self.stream = None;
                return Err(Error::Connection(format!("{}:{}: {msg}", self.host, self.port)));
            }
            Err(e) => return Err(e),
        };

        debug!("read_line(): {}", printable(&line));

        Ok(line)
    }

    fn config(&self) -> &TransportConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!("tcp://{}:{}", self.host, self.port)
    }
}
