//! Core data types for water-quality telemetry
//!
//! - `Reading`: one turbidity / pH / conductivity sample
//! - `Mode`: which source is authoritative over the current reading
//! - Sensor conversions used by devices that report raw ADC counts

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

/// Synthetic turbidity range (NTU)
pub const TURBIDITY_RANGE: RangeInclusive<f64> = 5.0..=800.0;
/// Synthetic pH range
pub const PH_RANGE: RangeInclusive<f64> = 3.0..=10.0;
/// Synthetic conductivity range (µS/cm)
pub const CONDUCTIVITY_RANGE: RangeInclusive<f64> = 100.0..=1200.0;

/// Full-scale count of a 12-bit ADC
pub const ADC_MAX: f64 = 4095.0;

/// A single water-quality sample
///
/// Serializes to the wire shape `{"T": .., "PH": .., "C": ..}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Turbidity (NTU), practically 0-1000
    #[serde(rename = "T")]
    pub turbidity: f64,
    /// pH, practically 0-14
    #[serde(rename = "PH")]
    pub ph: f64,
    /// Conductivity (µS/cm), practically 0-2000+
    #[serde(rename = "C")]
    pub conductivity: f64,
}

impl Reading {
    pub fn new(turbidity: f64, ph: f64, conductivity: f64) -> Self {
        Self {
            turbidity,
            ph,
            conductivity,
        }
    }

    /// Draw a plausible random reading, each field rounded to 2 decimals
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            turbidity: round2(rng.gen_range(TURBIDITY_RANGE)),
            ph: round2(rng.gen_range(PH_RANGE)),
            conductivity: round2(rng.gen_range(CONDUCTIVITY_RANGE)),
        }
    }

    /// Build a reading from raw 12-bit ADC counts
    ///
    /// Turbidity sensors are inverted: a clear sample reads full scale.
    pub fn from_adc(turbidity_raw: u16, ph_raw: u16, conductivity_raw: u16) -> Self {
        let scale = |raw: u16| f64::from(raw.min(ADC_MAX as u16)) / ADC_MAX;
        Self {
            turbidity: round2(1000.0 * (1.0 - scale(turbidity_raw))),
            ph: round2(14.0 * scale(ph_raw)),
            conductivity: round2(1500.0 * scale(conductivity_raw)),
        }
    }
}

impl Default for Reading {
    fn default() -> Self {
        Self {
            turbidity: 25.0,
            ph: 7.0,
            conductivity: 300.0,
        }
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "T={:.2} PH={:.2} C={:.2}",
            self.turbidity, self.ph, self.conductivity
        )
    }
}

/// Round to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Which source currently owns the shared reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// The mock generator writes readings
    #[default]
    Synthetic,
    /// External publishers write readings
    Real,
}

impl Mode {
    /// Map the wire-level `use_mock_data` flag to a mode
    pub fn from_use_mock(use_mock: bool) -> Self {
        if use_mock {
            Mode::Synthetic
        } else {
            Mode::Real
        }
    }

    /// The wire-level `use_mock_data` flag for this mode
    pub fn uses_mock(self) -> bool {
        self == Mode::Synthetic
    }

    /// Short label used in status messages
    pub fn label(self) -> &'static str {
        match self {
            Mode::Synthetic => "mock",
            Mode::Real => "real",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Synthetic => write!(f, "synthetic"),
            Mode::Real => write!(f, "real"),
        }
    }
}
