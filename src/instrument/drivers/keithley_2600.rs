//! Keithley 2600-series source-measure units, driven through their TSP
//! command interface.

use async_trait::async_trait;
use log::info;

use crate::{
    channel::{ChannelMap, ChannelTable},
    config::{Resource, TransportConfig},
    error::{Error, Result},
    instrument::{Quantity, SourceMeter, arm_trigger_fetch, require_configured, run_setup},
    session::ScpiSession,
};

const DUAL_CHANNEL: ChannelTable = ChannelTable(&["smua", "smub"]);
const SINGLE_CHANNEL: ChannelTable = ChannelTable(&["smua"]);

/// Largest source voltage magnitude across the family (2635B/2636B)
const MAX_VOLTAGE: f64 = 200.0;
/// Largest pulsed current limit across the family
const MAX_CURRENT_LIMIT: f64 = 10.0;
const NPLC_RANGE: std::ops::RangeInclusive<f64> = 0.001..=25.0;

pub struct Keithley2600 {
    session: ScpiSession,
    channels: ChannelTable,
    configured: bool,
}
impl Keithley2600 {
    /// Dual channel unit (2602B, 2612B, 2636B, ...)
    pub fn new(session: ScpiSession) -> Self {
        Self {
            session,
            channels: DUAL_CHANNEL,
            configured: false,
        }
    }

    /// Single channel unit (2601B, 2611B, 2635B, ...)
    pub fn single_channel(session: ScpiSession) -> Self {
        Self {
            channels: SINGLE_CHANNEL,
            ..Self::new(session)
        }
    }

    pub async fn connect(resource: &Resource) -> Result<Self> {
        let session = ScpiSession::connect(resource, TransportConfig::default()).await?;
        Ok(Self::new(session))
    }

    pub fn session(&mut self) -> &mut ScpiSession {
        &mut self.session
    }

    /// Reset, select current readout and disable auto-zero on every channel.
    pub fn setup_commands(&self) -> Vec<String> {
        let tokens = self.tokens();

        let mut cmds = vec!["reset()".to_string()];
        cmds.extend(
            tokens
                .iter()
                .map(|t| format!("display.{t}.measure.func = display.MEASURE_DCAMPS")),
        );
        cmds.extend(
            tokens
                .iter()
                .map(|t| format!("{t}.measure.autozero = {t}.AUTOZERO_OFF")),
        );
        cmds
    }

    /// Same as [`SourceMeter::initialize`]
    pub async fn current_setup(&mut self) -> Result<()> {
        self.initialize().await
    }

    pub async fn set_output(&mut self, channel: u8, enabled: bool) -> Result<()> {
        let t = self.channels.channel_name(channel)?;
        let state = if enabled { "OUTPUT_ON" } else { "OUTPUT_OFF" };
        self.session
            .send(format!("{t}.source.output = {t}.{state}"))
            .await
    }

    /// Source a DC voltage on `channel`
    pub async fn set_voltage(&mut self, channel: u8, voltage: f64) -> Result<()> {
        if !voltage.is_finite() || voltage.abs() > MAX_VOLTAGE {
            return Err(Error::OutOfRange(format!(
                "Voltage {voltage} V outside ±{MAX_VOLTAGE} V"
            )));
        }
        let t = self.channels.channel_name(channel)?;
        self.session
            .send(format!("{t}.source.func = {t}.OUTPUT_DCVOLTS"))
            .await?;
        self.session
            .send(format!("{t}.source.levelv = {voltage}"))
            .await
    }

    pub async fn set_current_limit(&mut self, channel: u8, limit: f64) -> Result<()> {
        if !(limit > 0.0 && limit <= MAX_CURRENT_LIMIT) {
            return Err(Error::OutOfRange(format!(
                "Current limit {limit} A outside (0, {MAX_CURRENT_LIMIT}] A"
            )));
        }
        let t = self.channels.channel_name(channel)?;
        self.session
            .send(format!("{t}.source.limiti = {limit}"))
            .await
    }

    /// Integration time in power line cycles
    pub async fn set_integration_time(&mut self, channel: u8, nplc: f64) -> Result<()> {
        if !NPLC_RANGE.contains(&nplc) {
            return Err(Error::OutOfRange(format!(
                "Integration time {nplc} NPLC outside {}..={}",
                NPLC_RANGE.start(),
                NPLC_RANGE.end()
            )));
        }
        let t = self.channels.channel_name(channel)?;
        self.session.send(format!("{t}.measure.nplc = {nplc}")).await
    }

    fn tokens(&self) -> Vec<String> {
        (1..=self.channels.channel_count())
            .filter_map(|ch| self.channels.channel_name(ch).ok())
            .collect()
    }
}
#[async_trait]
impl SourceMeter for Keithley2600 {
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
        &self.channels
    }

    async fn measure(&mut self, channel: u8, quantity: Quantity) -> Result<f64> {
        require_configured(self.configured)?;
        let t = self.channels.channel_name(channel)?;
        let func = match quantity {
            Quantity::Current => "i",
            Quantity::Voltage => "v",
        };

        arm_trigger_fetch(
            &mut self.session,
            &[format!("{t}.measure.count = 1")],
            &format!("reading = {t}.measure.{func}()"),
            "print(reading)",
        )
        .await
    }

    async fn software_version(&mut self) -> Result<String> {
        self.session.query("print(localnode.revision)").await
    }

    async fn close(&mut self) -> Result<()> {
        self.configured = false;
        self.session.close().await
    }
}
