use crate::error::{Error, Result};

/// Instrument identity as reported by `*IDN?`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub manufacturer: Manufacturer,
    /// Manufacturer string
    pub vendor: String,
    /// Model string
    pub model: String,
    /// Serial number
    pub serial: Option<String>,
    /// Firmware version
    pub version: Option<String>,
}
impl Identity {
    pub fn from_idn(idn: &str) -> Result<Self> {
        let idn_sep: Vec<_> = idn.split(',').map(str::trim).collect();
        if idn_sep.len() < 2 || idn_sep[0].is_empty() {
            return Err(Error::Parse(format!("Invalid *IDN? response: {idn}")));
        }

        Ok(Self {
            manufacturer: Manufacturer::from_vendor(idn_sep[0]),
            vendor: idn_sep[0].to_string(),
            model: idn_sep[1].to_string(),
            serial: idn_sep.get(2).map(|s| s.to_string()),
            version: idn_sep.get(3).map(|s| s.to_string()),
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Manufacturer {
    Unknown,
    /// Keithley, also includes Tektronix-branded units
    Keithley,
    /// Keysight, also includes Agilent and HP
    Keysight,
    Rigol,
    Siglent,
}
impl Manufacturer {
    fn from_vendor(vendor: &str) -> Self {
        let man = vendor.to_lowercase();

        if man.contains("keithley") || man.contains("tektronix") {
            Self::Keithley
        } else if man.contains("keysight") || man.contains("agilent") || man.contains("hewlett") {
            Self::Keysight
        } else if man.contains("rigol") {
            Self::Rigol
        } else if man.contains("siglent") {
            Self::Siglent
        } else {
            Self::Unknown
        }
    }
}
