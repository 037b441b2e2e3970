//! Transport configuration and endpoint URIs.
//!
//! Endpoints are written as URIs:
//!
//! - `serial:<port>[?baud=<baud>]`: serial line, e.g. `serial:/dev/ttyUSB0?baud=19200`
//! - `tcp://<host>[:<port>]`: raw socket, port defaults to 5025
//!
//! Both forms accept `timeout_ms=<ms>` and `eol=lf|crlf|cr` query parameters,
//! which override the defaults chosen by the driver.

use std::{fmt::Display, str::FromStr, time::Duration};

use strum_macros::{AsRefStr, EnumIter, EnumString};

use crate::error::{Error, Result};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_BAUD: u32 = 19200;
/// Conventional raw-socket SCPI port
pub const DEFAULT_TCP_PORT: u16 = 5025;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, AsRefStr, EnumIter, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum LineEnding {
    #[default]
    #[strum(serialize = "lf")]
    Lf,
    #[strum(serialize = "crlf")]
    CrLf,
    #[strum(serialize = "cr")]
    Cr,
}
impl LineEnding {
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            Self::Lf => b"\n",
            Self::CrLf => b"\r\n",
            Self::Cr => b"\r",
        }
    }

    /// Byte marking the end of a response line
    pub fn terminator(&self) -> u8 {
        match self {
            Self::Lf | Self::CrLf => b'\n',
            Self::Cr => b'\r',
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransportConfig {
    /// Deadline for receiving one complete response line
    pub timeout: Duration,
    pub line_ending: LineEnding,
}
impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            line_ending: LineEnding::default(),
        }
    }
}
impl TransportConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_line_ending(mut self, line_ending: LineEnding) -> Self {
        self.line_ending = line_ending;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Endpoint {
    Serial { path: String, baud: u32 },
    Tcp { host: String, port: u16 },
}
impl Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Serial { path, baud } => write!(f, "serial:{path}?baud={baud}"),
            Self::Tcp { host, port } => write!(f, "tcp://{host}:{port}"),
        }
    }
}

/// Parsed endpoint URI along with any transport settings it overrides
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resource {
    pub endpoint: Endpoint,
    pub timeout: Option<Duration>,
    pub line_ending: Option<LineEnding>,
}
impl Resource {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            timeout: None,
            line_ending: None,
        }
    }

    /// Apply the overrides carried by the URI on top of `defaults`
    pub fn config_or(&self, defaults: TransportConfig) -> TransportConfig {
        TransportConfig {
            timeout: self.timeout.unwrap_or(defaults.timeout),
            line_ending: self.line_ending.unwrap_or(defaults.line_ending),
        }
    }
}
impl FromStr for Resource {
    type Err = Error;

    fn from_str(uri: &str) -> Result<Self> {
        let (base, query) = match uri.split_once('?') {
            Some((base, query)) => (base, Some(query)),
            None => (uri, None),
        };

        let mut baud = None;
        let mut timeout = None;
        let mut line_ending = None;
        for param in query.into_iter().flat_map(|q| q.split('&')) {
            let Some((key, value)) = param.split_once('=') else {
                return Err(Error::InvalidConfig(format!(
                    "Malformed parameter `{param}` in `{uri}`"
                )));
            };
            match key {
                "baud" => baud = Some(parse_number::<u32>(key, value)?),
                "timeout_ms" => {
                    timeout = Some(Duration::from_millis(parse_number::<u64>(key, value)?))
                }
                "eol" => {
                    line_ending = Some(value.parse().map_err(|_| {
                        Error::InvalidConfig(format!("Unknown line ending `{value}`"))
                    })?)
                }
                _ => {
                    return Err(Error::InvalidConfig(format!(
                        "Unknown parameter `{key}` in `{uri}`"
                    )));
                }
            }
        }

        let endpoint = if let Some(path) = base.strip_prefix("serial:") {
            if path.is_empty() {
                return Err(Error::InvalidConfig(format!("Missing serial port in `{uri}`")));
            }
            Endpoint::Serial {
                path: path.to_string(),
                baud: baud.unwrap_or(DEFAULT_BAUD),
            }
        } else if let Some(addr) = base.strip_prefix("tcp://") {
            if baud.is_some() {
                return Err(Error::InvalidConfig(format!(
                    "`baud` does not apply to network endpoint `{uri}`"
                )));
            }
            let (host, port) = match addr.rsplit_once(':') {
                /* Bracketed IPv6 literal without a port, e.g. [::1] */
                Some((_, port)) if port.ends_with(']') => (addr, DEFAULT_TCP_PORT),
                Some((host, port)) => (host, parse_number::<u16>("port", port)?),
                None => (addr, DEFAULT_TCP_PORT),
            };
            let host = host.trim_start_matches('[').trim_end_matches(']');
            if host.is_empty() {
                return Err(Error::InvalidConfig(format!("Missing host in `{uri}`")));
            }
            Endpoint::Tcp {
                host: host.to_string(),
                port,
            }
        } else {
            return Err(Error::InvalidConfig(format!(
                "Unsupported endpoint `{uri}`, expected serial:<port> or tcp://<host>"
            )));
        };

        Ok(Self {
            endpoint,
            timeout,
            line_ending,
        })
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: Display,
{
    value
        .parse()
        .map_err(|e| Error::InvalidConfig(format!("Invalid {key} `{value}`: {e}")))
}
