//! Mapping of 1-based channel numbers onto instrument command tokens.

use crate::error::{Error, Result};

pub trait ChannelMap: Send + Sync {
    /// Number of addressable channels, numbered `1..=channel_count()`
    fn channel_count(&self) -> u8;

    /// Token substituted verbatim into command templates
    fn channel_name(&self, channel: u8) -> Result<String>;
}

fn check_range(channel: u8, count: u8) -> Result<usize> {
    if channel == 0 || channel > count {
        return Err(Error::OutOfRange(format!(
            "Channel {channel} not in 1..={count}"
        )));
    }
    Ok(channel as usize - 1)
}

/// Fixed table of tokens, e.g. the `smua`/`smub` units of a dual channel SMU
#[derive(Clone, Copy, Debug)]
pub struct ChannelTable(pub &'static [&'static str]);
impl ChannelMap for ChannelTable {
    fn channel_count(&self) -> u8 {
        self.0.len() as u8
    }

    fn channel_name(&self, channel: u8) -> Result<String> {
        let idx = check_range(channel, self.channel_count())?;
        Ok(self.0[idx].to_string())
    }
}

/// Scanner card routing list: channel `n` of slot `s` is `(@snnn)`
#[derive(Clone, Copy, Debug)]
pub struct ScanList {
    pub slot: u8,
    pub channels: u8,
}
impl ChannelMap for ScanList {
    fn channel_count(&self) -> u8 {
        self.channels
    }

    fn channel_name(&self, channel: u8) -> Result<String> {
        check_range(channel, self.channels)?;
        Ok(format!("(@{}{:02})", self.slot, channel))
    }
}
