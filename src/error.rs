use std::{fmt::Display, result};

pub type Result<T, E = Error> = result::Result<T, E>;

#[derive(Debug)]
pub enum Error {
    /// Transport is not open, or the endpoint could not be acquired
    Connection(String),
    /// No complete response line arrived before the read deadline
    Timeout(String),
    /// Device returned text that could not be interpreted as expected
    Parse(String),
    /// Channel number or configuration argument outside the supported range
    OutOfRange(String),
    /// Measurement requested before a successful `initialize()`
    NotConfigured(String),
    /// Endpoint URI or transport settings could not be understood
    InvalidConfig(String),
    IoError(std::io::Error),
}
impl Error {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout(_))
    }
}
impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(e) => Some(e),
            _ => None,
        }
    }
}
impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Connection(desc) => write!(f, "Connection error: {desc}"),
            Error::Timeout(desc) => write!(f, "Timed out: {desc}"),
            Error::Parse(desc) => write!(f, "Bad response: {desc}"),
            Error::OutOfRange(desc) => write!(f, "Out of range: {desc}"),
            Error::NotConfigured(desc) => write!(f, "Not configured: {desc}"),
            Error::InvalidConfig(desc) => write!(f, "Invalid configuration: {desc}"),
            Error::IoError(e) => write!(f, "IO error: {e}"),
        }
    }
}
impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::IoError(value)
    }
}
