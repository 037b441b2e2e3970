use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use tokio::io::AsyncWriteExt;
use tokio_serial::{SerialPortBuilderExt, SerialStream};

use crate::{
    config::TransportConfig,
    error::{Error, Result},
    transport::{Transport, printable, read_until},
};

pub struct SerialTransport {
    port: String,
    baud: u32,
    config: TransportConfig,
    serial: Option<SerialStream>,
}
impl SerialTransport {
    pub fn new(port: &str, baud: u32, config: TransportConfig) -> Self {
        Self {
            port: port.to_string(),
            baud,
            config,
            serial: None,
        }
    }
}
#[async_trait]
impl Transport for SerialTransport {
    async fn open(&mut self) -> Result<()> {
        if self.serial.is_some() {
            return Err(Error::Connection(format!("{} already open", self.port)));
        }

        let serial = tokio_serial::new(&self.port, self.baud)
            .timeout(self.config.timeout)
            .open_native_async()
            .map_err(|e| Error::Connection(format!("Could not open {}: {e}", self.port)))?;
        debug!("open(): {} @ {} baud", self.port, self.baud);
        self.serial = Some(serial);

        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.serial.take().is_some() {
            debug!("close(): {}", self.port);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.serial.is_some()
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let Some(serial) = &mut self.serial else {
            return Err(Error::Connection(format!("{} not open", self.port)));
        };

        debug!("write(): {}", printable(data));

        let res = match serial.write_all(data).await {
            Ok(()) => serial.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = res {
            self.serial = None;
            return Err(Error::Connection(format!("Write to {} failed: {e}", self.port)));
        }

        Ok(())
    }

    async fn read_line(&mut self, timeout: Duration) -> Result<Vec<u8>> {
        let Some(serial) = &mut self.serial else {
            return Err(Error::Connection(format!("{} not open", self.port)));
        };

        let line = match read_until(serial, self.config.line_ending.terminator(), timeout).await {
            Ok(line) => line,
            Err(Error::Connection(msg)) => {
                self.serial = None;
                return Err(Error::Connection(format!("{}: {msg}", self.port)));
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
        format!("serial:{}?baud={}", self.port, self.baud)
    }
}
