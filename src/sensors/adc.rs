//! 24-bit ADC acquisition (ADS1256-class converter).
//!
//! The kiln probes are linear analog sensors: `T = V / 0.01 - 4` with the
//! converter referenced to 5.0 V and full scale at 8 388 607 counts.  The
//! converter has fewer inputs than the kiln has logical channels, so a
//! [`ChannelMap`] says which input feeds which channel.  Unmapped or
//! disabled channels read as [`UNSET`].
//!
//! The converter itself sits behind [`AdcReader`] so the conversion and
//! mapping logic runs on the host against a fake.

use log::warn;

use crate::app::ports::AcquisitionPort;
use crate::error::AcquisitionError;

use super::{AMBIENT_PRIMARY, AMBIENT_SECONDARY, CHANNEL_COUNT, ChannelMask, Reading, UNSET};

/// Reference voltage of the converter.
pub const V_REF: f32 = 5.0;
/// Positive full-scale count of a 24-bit signed conversion.
pub const FULL_SCALE: f32 = 8_388_607.0;
/// Sensor sensitivity, volts per °C.
const VOLTS_PER_DEGREE: f32 = 0.01;
/// Sensor offset, °C.
const OFFSET_C: f32 = 4.0;
/// Inputs on the converter.
pub const ADC_INPUTS: usize = 8;

/// Raw access to the converter.
pub trait AdcReader {
    fn read_raw(&mut self, input: u8) -> Result<i32, AcquisitionError>;
}

/// Converter counts to °C.
pub fn raw_to_celsius(raw: i32) -> f32 {
    let volts = raw as f32 * (V_REF / FULL_SCALE);
    volts / VOLTS_PER_DEGREE - OFFSET_C
}

/// Which converter input feeds each logical channel.
pub type ChannelMap = [Option<u8>; CHANNEL_COUNT];

/// Probes 1..=6 on inputs 0..=5, ambient 1 and 2 on inputs 6 and 7.
pub fn default_channel_map() -> ChannelMap {
    let mut map = [None; CHANNEL_COUNT];
    for (probe, slot) in map.iter_mut().take(6).enumerate() {
        *slot = Some(probe as u8);
    }
    map[AMBIENT_PRIMARY] = Some(6);
    map[AMBIENT_SECONDARY] = Some(7);
    map
}

pub struct AdcAcquisition<R> {
    reader: R,
    map: ChannelMap,
}

impl<R: AdcReader> AdcAcquisition<R> {
    pub fn new(reader: R) -> Self {
        Self::with_map(reader, default_channel_map())
    }

    pub fn with_map(reader: R, map: ChannelMap) -> Self {
        Self { reader, map }
    }
}

impl<R: AdcReader> AcquisitionPort for AdcAcquisition<R> {
    /// A failing input leaves its channel unset; the cycle fails only when
    /// every mapped, enabled input failed.
    fn read_cycle(&mut self, mask: &ChannelMask) -> Result<Reading, AcquisitionError> {
        let mut reading = [UNSET; CHANNEL_COUNT];
        let mut attempted = 0;
        let mut last_error = None;
        for (ch, input) in self.map.iter().enumerate() {
            let Some(input) = *input else { continue };
            if !mask[ch] {
                continue;
            }
            attempted += 1;
            match self.reader.read_raw(input) {
                Ok(raw) => reading[ch] = raw_to_celsius(raw),
                Err(e) => {
                    warn!("ADC input {} (channel {}): {}", input, ch, e);
                    last_error = Some(e);
                }
            }
        }
        match last_error {
            Some(e) if reading.iter().all(|v| *v == UNSET) && attempted > 0 => Err(e),
            _ => Ok(reading),
        }
    }
}
