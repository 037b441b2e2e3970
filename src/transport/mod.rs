use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::Instant;

mod serial;
mod tcp;

#[cfg(test)]
pub(crate) mod mock;

pub use serial::SerialTransport;
pub use tcp::NetworkTransport;

use crate::{
    config::{Endpoint, TransportConfig},
    error::{Error, Result},
};

/// Byte-stream endpoint carrying SCPI text.
///
/// Every operation runs to completion (or to its deadline) before returning;
/// nothing is read ahead of the line terminator. A transport is owned by a
/// single [`ScpiSession`](crate::session::ScpiSession).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Acquire the underlying OS resource. Fails with [`Error::Connection`]
    /// if the endpoint is busy, unreachable or already open.
    async fn open(&mut self) -> Result<()>;

    /// Release the OS resource. Closing an already closed transport is a no-op.
    async fn close(&mut self) -> Result<()>;

    fn is_open(&self) -> bool;

    /// A failed write is [`Error::Connection`] and leaves the transport closed.
    async fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Read bytes up to and including the configured terminator. Fails with
    /// [`Error::Timeout`] if the terminator does not arrive within `timeout`,
    /// or with [`Error::Connection`] if the link drops, which also closes the
    /// transport.
    async fn read_line(&mut self, timeout: Duration) -> Result<Vec<u8>>;

    fn config(&self) -> &TransportConfig;

    /// Human readable endpoint, used in diagnostics
    fn endpoint(&self) -> String;
}

/// Construct the backend matching `endpoint` and open it.
pub async fn open_transport(
    endpoint: &Endpoint,
    config: TransportConfig,
) -> Result<Box<dyn Transport>> {
    let mut transport: Box<dyn Transport> = match endpoint {
        Endpoint::Serial { path, baud } => Box::new(SerialTransport::new(path, *baud, config)),
        Endpoint::Tcp { host, port } => Box::new(NetworkTransport::new(host, *port, config)),
    };
    transport.open().await?;
    Ok(transport)
}

/// Render a line for logging with the line control characters made visible
pub(crate) fn printable(data: &[u8]) -> String {
    String::from_utf8_lossy(data)
        .replace('\n', "␊")
        .replace('\r', "␍")
}

/// Read one byte at a time until `terminator` is seen or `timeout` elapses.
///
/// Bytes received before a timeout are dropped; the caller is expected to
/// close and reopen the transport rather than resynchronize. Link failures,
/// including the peer closing the stream, are [`Error::Connection`].
pub(crate) async fn read_until<R>(reader: &mut R, terminator: u8, timeout: Duration) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut data = vec![];
    let end = Instant::now() + timeout;

    loop {
        let now = Instant::now();
        if now >= end {
            return Err(timed_out(terminator, timeout, &data));
        }
        let remaining = end - now;

        match tokio::time::timeout(remaining, reader.read_u8()).await {
            Err(_) => return Err(timed_out(terminator, timeout, &data)),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(Error::Connection("Connection closed by instrument".into()));
            }
            Ok(Err(e)) => return Err(Error::Connection(format!("Read failed: {e}"))),
            Ok(Ok(byte)) => {
                data.push(byte);
                if byte == terminator {
                    return Ok(data);
                }
            }
        }
    }
}

fn timed_out(terminator: u8, timeout: Duration, partial: &[u8]) -> Error {
    Error::Timeout(format!(
        "No {} received within {} ms ({} bytes discarded)",
        printable(&[terminator]),
        timeout.as_millis(),
        partial.len()
    ))
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncWriteExt;

    use super::*;

    #[tokio::test]
    async fn read_until_stops_at_terminator() {
        let (mut instr, mut host) = tokio::io::duplex(64);
        instr.write_all(b"+1.0E-03\nleftover").await.unwrap();

        let line = read_until(&mut host, b'\n', Duration::from_millis(200))
            .await
            .unwrap();
        assert_eq!(line, b"+1.0E-03\n");

        /* Nothing past the terminator was consumed */
        let mut rest = [0u8; 8];
        host.read_exact(&mut rest).await.unwrap();
        assert_eq!(&rest, b"leftover");
    }

    #[tokio::test]
    async fn read_until_times_out_on_partial_line() {
        let (mut instr, mut host) = tokio::io::duplex(64);
        instr.write_all(b"1.23").await.unwrap();

        let start = std::time::Instant::now();
        let res = read_until(&mut host, b'\n', Duration::from_millis(50)).await;
        assert!(matches!(res, Err(Error::Timeout(_))), "{res:?}");
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn read_until_reports_closed_peer() {
        let (instr, mut host) = tokio::io::duplex(64);
        drop(instr);

        let res = read_until(&mut host, b'\n', Duration::from_millis(50)).await;
        assert!(matches!(res, Err(Error::Connection(_))), "{res:?}");
    }

    #[tokio::test]
    async fn open_transport_reports_unreachable_host() {
        /* Grab a free port, then release it so nothing is listening */
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let endpoint = Endpoint::Tcp {
            host: "127.0.0.1".into(),
            port,
        };
        let res = open_transport(
            &endpoint,
            TransportConfig::default().with_timeout(Duration::from_millis(500)),
        )
        .await;
        assert!(matches!(res, Err(Error::Connection(_))));
    }
}
