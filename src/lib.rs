pub mod channel;
pub mod config;
pub mod error;
pub mod instrument;
pub mod model;
pub mod session;
pub mod transport;

