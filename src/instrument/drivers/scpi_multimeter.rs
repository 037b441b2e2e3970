use async_trait::async_trait;
use log::info;

use crate::{
    channel::{ChannelMap, ScanList},
    config::{LineEnding, Resource, TransportConfig},
    error::Result,
    instrument::{Quantity, SourceMeter, arm_trigger_fetch, require_configured, run_setup},
    model::Identity,
    session::ScpiSession,
};

/// SCPI bench multimeter with a scanner card (Keysight 34970A/DAQ970A,
/// Siglent SDM-SC, Keithley DAQ6510 and similar).
///
/// Channels are routed through the card in `slot`, one reading per
/// `CONF`/`INIT`/`FETC?` cycle. `CONF` restores the function defaults on the
/// routed channel, auto-zero included, so auto-zero is switched off again
/// after each `CONF`.
pub struct ScpiMultimeter {
    session: ScpiSession,
    scan: ScanList,
    configured: bool,
}
impl ScpiMultimeter {
    pub fn new(session: ScpiSession, slot: u8, channels: u8) -> Self {
        Self {
            session,
            scan: ScanList { slot, channels },
            configured: false,
        }
    }

    /// Connect using CR/LF line endings unless the URI overrides it
    pub async fn connect(resource: &Resource, slot: u8, channels: u8) -> Result<Self> {
        let defaults = TransportConfig::default().with_line_ending(LineEnding::CrLf);
        let session = ScpiSession::connect(resource, defaults).await?;
        Ok(Self::new(session, slot, channels))
    }

    pub async fn identify(&mut self) -> Result<Identity> {
        self.session.identify().await
    }

    pub fn setup_commands(&self) -> Vec<String> {
        [
            "*RST",
            "*CLS",
            "SENS:FUNC \"VOLT:DC\"",
            "SENS:ZERO:AUTO OFF",
            "TRIG:SOUR IMM",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }
}
#[async_trait]
impl SourceMeter for ScpiMultimeter {
    async fn initialize(&mut self) -> Result<()> {
        self.configured = false;
        let cmds = self.setup_commands();
        run_setup(&mut self.session, &cmds).await?;
        self.configured = true;
        info!("{} configured", self.session.endpoint());
        Ok(())
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    fn channels(&self) -> &dyn ChannelMap {
        &self.scan
    }

    async fn measure(&mut self, channel: u8, quantity: Quantity) -> Result<f64> {
        require_configured(self.configured)?;
        let route = self.scan.channel_name(channel)?;
        let func = match quantity {
            Quantity::Current => "CURR:DC",
            Quantity::Voltage => "VOLT:DC",
        };

        arm_trigger_fetch(
            &mut self.session,
            &[
                format!("CONF:{func} {route}"),
                format!("SENS:ZERO:AUTO OFF,{route}"),
            ],
            "INIT",
            "FETC?",
        )
        .await
    }

    async fn software_version(&mut self) -> Result<String> {
        let id = self.session.identify().await?;
        Ok(id.version.unwrap_or_default())
    }

    async fn close(&mut self) -> Result<()> {
        self.configured = false;
        self.session.close().await
    }
}
