use std::collections::BTreeMap;

use super::bands::{FrequencyBand, GainAdjustmentMap};
use super::error::Result;
use super::profile::Profile;
use crate::audio::analysis::{SpectralAnalyzer, Spectrum};
use crate::audio::waveform::Waveform;

/// Guards the gain ratio against division by zero on silent bands.
pub const ZERO_DIVISION_EPSILON: f64 = 1e-10;

/// Derives per-band gain corrections from how far each band's measured
/// energy is from the profile's target.
#[derive(Clone, Debug, Default)]
pub struct EqualizationPlanner {
    analyzer: SpectralAnalyzer,
}

impl EqualizationPlanner {
    pub fn new(analyzer: SpectralAnalyzer) -> Self {
        Self { analyzer }
    }

    pub fn analyzer(&self) -> &SpectralAnalyzer {
        &self.analyzer
    }

    pub fn plan(&self, waveform: &Waveform, profile: &Profile) -> Result<GainAdjustmentMap> {
        let spectrum = self.analyzer.analyze(waveform)?;
        Ok(plan_from_spectrum(&spectrum, profile.targets()))
    }
}

/// Measured energy for every band of the target set.
pub fn measure(spectrum: &Spectrum, targets: &BTreeMap<FrequencyBand, f64>) -> BTreeMap<FrequencyBand, f64> {
    targets
        .keys()
        .map(|band| (*band, spectrum.energy_in_band(band.low_hz(), band.upper_hz())))
        .collect()
}

/// `(target - measured) / (measured + eps)`, clamped to `[-1, 1]`.
pub fn gain_for(target: f64, measured: f64) -> f64 {
    ((target - measured) / (measured + ZERO_DIVISION_EPSILON)).clamp(-1.0, 1.0)
}

pub fn plan_from_spectrum(spectrum: &Spectrum, targets: &BTreeMap<FrequencyBand, f64>) -> GainAdjustmentMap {
    let measured = measure(spectrum, targets);
    targets
        .iter()
        .map(|(band, &target)| {
            let energy = measured[band];
            let gain = gain_for(target, energy);
            log::debug!(
                "Band {}: measured={:.6e}, target={}, gain={:+.4}",
                band,
                energy,
                target,
                gain
            );
            (*band, gain)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::waveform::sine;
    use crate::mastering::profile::ProfileStore;
    use proptest::prelude::*;

    #[test]
    fn matching_energy_yields_zero_gain() {
        assert!(gain_for(2.5, 2.5).abs() < 1e-9);
    }

    #[test]
    fn silent_band_clamps_to_full_boost() {
        assert_eq!(gain_for(5.0, 0.0), 1.0);
        assert!((gain_for(1e-12, 0.0) - 0.01).abs() < 1e-9);
    }

    #[test]
    fn loud_band_is_cut() {
        // Measured far above target: ratio approaches -1
        let gain = gain_for(1.0, 100.0);
        assert!((gain - (-0.99)).abs() < 1e-9);
        let silent_target = gain_for(0.0, 5.0);
        assert!(silent_target >= -1.0 && silent_target < -0.999);
    }

    #[test]
    fn plan_covers_exactly_the_profile_bands() {
        let w = sine(440.0, 0.5, 1.0, 44100);
        let store = ProfileStore::builtin();
        let profile = store.get("full-range").unwrap();

        let gains = EqualizationPlanner::default().plan(&w, profile).unwrap();

        assert_eq!(gains.len(), profile.targets().len());
        for band in profile.targets().keys() {
            assert!(gains.get(band).is_some());
        }
    }

    #[test]
    fn sine_dominates_the_band_containing_it() {
        let w = sine(440.0, 0.8, 2.0, 44100);
        let store = ProfileStore::builtin();
        let profile = store.default_profile();
        let spectrum = SpectralAnalyzer::default().analyze(&w).unwrap();

        let measured = measure(&spectrum, profile.targets());
        let (loudest, _) = measured
            .iter()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .unwrap();

        assert_eq!(loudest.low_hz(), 100.0);
    }

    #[test]
    fn analysis_errors_propagate() {
        let w = Waveform::mono(Vec::new(), 44100);
        let store = ProfileStore::builtin();
        assert!(EqualizationPlanner::default().plan(&w, store.default_profile()).is_err());
    }

    proptest! {
        #[test]
        fn gains_are_always_bounded(
            samples in prop::collection::vec(-1.0f32..1.0, 64..2048),
            target in 0.0f64..1e6,
        ) {
            let w = Waveform::mono(samples, 8000);
            let profile = Profile::new("p", [(10.0, target), (100.0, target), (1000.0, target)]).unwrap();
            let gains = EqualizationPlanner::new(SpectralAnalyzer::new(256)).plan(&w, &profile).unwrap();
            for (_, gain) in gains.iter() {
                prop_assert!((-1.0..=1.0).contains(gain));
            }
        }
    }
}
