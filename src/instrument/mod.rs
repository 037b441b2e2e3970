pub mod drivers;

use async_trait::async_trait;
use log::{error, warn};

use crate::{
    channel::ChannelMap,
    error::{Error, Result},
    session::ScpiSession,
};

/// Values at or above this are the SCPI overflow marker (9.9E37)
const OVERLOAD: f64 = 9.9e37;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Quantity {
    /// Amps
    Current,
    /// Volts
    Voltage,
}

/// Multimeter or source-measure unit reading current and voltage on
/// numbered channels.
///
/// `initialize()` must complete before any measurement; until it has, and
/// after any failed attempt, measurements fail with [`Error::NotConfigured`].
#[async_trait]
pub trait SourceMeter: Send {
    /// Put the instrument into a known state for repeatable measurements
    async fn initialize(&mut self) -> Result<()>;

    fn is_configured(&self) -> bool;

    fn channels(&self) -> &dyn ChannelMap;

    /// Take one reading of `quantity` on `channel`.
    ///
    /// On [`Error::Timeout`] the instrument may still answer later, and that
    /// late line would be read as the reply to the next query. Close and
    /// reopen the driver after a timeout before measuring again.
    async fn measure(&mut self, channel: u8, quantity: Quantity) -> Result<f64>;

    async fn read_current(&mut self, channel: u8) -> Result<f64> {
        self.measure(channel, Quantity::Current).await
    }

    async fn read_voltage(&mut self, channel: u8) -> Result<f64> {
        self.measure(channel, Quantity::Voltage).await
    }

    /// Firmware revision, as reported by the instrument
    async fn software_version(&mut self) -> Result<String>;

    async fn close(&mut self) -> Result<()>;
}

/// Send `commands` in order, stopping at the first failure.
///
/// A failure part-way leaves the instrument in an unknown configuration.
pub(crate) async fn run_setup(session: &mut ScpiSession, commands: &[String]) -> Result<()> {
    for (step, cmd) in commands.iter().enumerate() {
        if let Err(e) = session.send(cmd).await {
            error!(
                "Setup of {} aborted at step {}/{} `{cmd}`: {e}",
                session.endpoint(),
                step + 1,
                commands.len()
            );
            return Err(e);
        }
    }
    Ok(())
}

/// Send the `arm` commands in order, trigger, then fetch one reading.
pub(crate) async fn arm_trigger_fetch(
    session: &mut ScpiSession,
    arm: &[String],
    trigger: &str,
    fetch: &str,
) -> Result<f64> {
    for cmd in arm {
        session.send(cmd).await?;
    }
    session.send(trigger).await?;
    let resp = session.query(fetch).await?;
    parse_reading(&resp).inspect_err(|e| warn!(command = fetch; "{e}"))
}

pub(crate) fn require_configured(configured: bool) -> Result<()> {
    if configured {
        Ok(())
    } else {
        Err(Error::NotConfigured(
            "initialize() has not completed successfully".into(),
        ))
    }
}

/// Parse a numeric response. Only the first comma-separated field is used;
/// overload readings become NaN.
///
/// Instruments report numbers in decimal notation, so textual forms such as
/// `nan` or `inf` are rejected.
pub fn parse_reading(resp: &str) -> Result<f64> {
    let resp = resp.trim().trim_start_matches('"').trim_end_matches('"');
    let field = resp.split(',').next().unwrap_or_default().trim();

    if !field.bytes().any(|b| b.is_ascii_digit()) {
        return Err(Error::Parse(format!("`{resp}` is not a numeric reading")));
    }

    let value: f64 = field
        .parse()
        .map_err(|e| Error::Parse(format!("Could not parse `{resp}` as f64: {e}")))?;

    if value.abs() >= OVERLOAD {
        Ok(f64::NAN)
    } else {
        Ok(value)
    }
}
