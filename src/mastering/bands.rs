use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use super::error::{MasteringError, Result};

/// Ratio between a band's upper and lower edge.
pub const BAND_SPAN: f64 = 10.0;

/// A frequency band identified by its lower edge.
///
/// Every band spans one decade: `[low_hz, low_hz * 10)`. The same edges are
/// used when measuring energy and when band-pass filtering during
/// equalization.
#[derive(Clone, Copy, Debug)]
pub struct FrequencyBand {
    low_hz: f64,
}

impl FrequencyBand {
    pub fn new(low_hz: f64) -> Result<Self> {
        if !low_hz.is_finite() || low_hz <= 0.0 {
            return Err(MasteringError::Configuration(format!(
                "band lower bound must be a positive frequency, got {}",
                low_hz
            )));
        }
        Ok(Self { low_hz })
    }

    /// For compile-time band tables whose edges are known to be positive.
    pub(crate) const fn from_const(low_hz: f64) -> Self {
        Self { low_hz }
    }

    pub fn low_hz(&self) -> f64 {
        self.low_hz
    }

    pub fn upper_hz(&self) -> f64 {
        self.low_hz * BAND_SPAN
    }
}

impl PartialEq for FrequencyBand {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FrequencyBand {}

impl PartialOrd for FrequencyBand {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FrequencyBand {
    fn cmp(&self, other: &Self) -> Ordering {
        self.low_hz.total_cmp(&other.low_hz)
    }
}

impl fmt::Display for FrequencyBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{} Hz", self.low_hz, self.upper_hz())
    }
}

/// Serialized form of one entry of a [`GainAdjustmentMap`].
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct BandGain {
    pub low_hz: f64,
    pub gain: f64,
}

/// Per-band relative gain corrections, each clamped to `[-1, 1]`.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(try_from = "Vec<BandGain>", into = "Vec<BandGain>")]
pub struct GainAdjustmentMap(BTreeMap<FrequencyBand, f64>);

impl GainAdjustmentMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a gain, clamping it into `[-1, 1]`.
    pub fn insert(&mut self, band: FrequencyBand, gain: f64) {
        self.0.insert(band, gain.clamp(-1.0, 1.0));
    }

    pub fn get(&self, band: &FrequencyBand) -> Option<f64> {
        self.0.get(band).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FrequencyBand, &f64)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<Vec<BandGain>> for GainAdjustmentMap {
    type Error = String;

    fn try_from(entries: Vec<BandGain>) -> std::result::Result<Self, Self::Error> {
        let mut map = Self::new();
        for entry in entries {
            let band = FrequencyBand::new(entry.low_hz).map_err(|e| e.to_string())?;
            if !entry.gain.is_finite() {
                return Err(format!("gain for band {} is not a finite number", band));
            }
            map.insert(band, entry.gain);
        }
        Ok(map)
    }
}

impl From<GainAdjustmentMap> for Vec<BandGain> {
    fn from(map: GainAdjustmentMap) -> Self {
        map.0
            .into_iter()
            .map(|(band, gain)| BandGain {
                low_hz: band.low_hz(),
                gain,
            })
            .collect()
    }
}

impl FromIterator<(FrequencyBand, f64)> for GainAdjustmentMap {
    fn from_iter<I: IntoIterator<Item = (FrequencyBand, f64)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (band, gain) in iter {
            map.insert(band, gain);
        }
        map
    }
}
