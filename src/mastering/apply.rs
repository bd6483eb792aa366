use rayon::prelude::*;

use super::error::{MasteringError, Result};
use super::stage::{
    CompressionSettings, ComputeContext, Computed, EqualizationSettings, NormalizationSettings,
    Stage, StageSettings,
};
use crate::audio::effects::AudioToolkit;
use crate::audio::waveform::Waveform;

pub fn compute_equalization(ctx: &ComputeContext<'_>) -> Result<Computed> {
    let gain_adjustments = ctx.planner.plan(ctx.input, ctx.profile)?;
    Ok(Computed::Settings(StageSettings::Equalization(EqualizationSettings {
        gain_adjustments,
    })))
}

// TODO: derive threshold and ratio from the input's crest factor instead of
// returning the defaults.
pub fn compute_compression(_ctx: &ComputeContext<'_>) -> Result<Computed> {
    Ok(Computed::NotImplemented(StageSettings::defaults(Stage::Compression)))
}

fn mismatch(stage: Stage, settings: &StageSettings) -> MasteringError {
    MasteringError::stage(
        stage,
        format!("received settings for stage '{}'", settings.stage()),
    )
}

pub fn normalization(
    toolkit: &dyn AudioToolkit,
    input: &Waveform,
    settings: &StageSettings,
) -> Result<Waveform> {
    let StageSettings::Normalization(NormalizationSettings { headroom }) = settings else {
        return Err(mismatch(Stage::Normalization, settings));
    };
    toolkit
        .normalize(input, *headroom)
        .map_err(|e| MasteringError::stage(Stage::Normalization, e.to_string()))
}

/// Splits the input into one band-passed copy per band, scales each by its
/// gain adjustment and sums them back together.
pub fn equalization(
    toolkit: &dyn AudioToolkit,
    input: &Waveform,
    settings: &StageSettings,
) -> Result<Waveform> {
    let StageSettings::Equalization(EqualizationSettings { gain_adjustments }) = settings else {
        return Err(mismatch(Stage::Equalization, settings));
    };

    if gain_adjustments.is_empty() {
        log::warn!("Equalization has no bands; passing input through");
        return Ok(input.clone());
    }

    let nyquist = input.nyquist();
    let bands: Vec<_> = gain_adjustments.iter().map(|(b, g)| (*b, *g)).collect();

    let filtered: Vec<Option<Waveform>> = bands
        .par_iter()
        .map(|&(band, gain)| -> Result<Option<Waveform>> {
            if band.low_hz() >= nyquist {
                log::debug!("Band {} lies above Nyquist ({} Hz), skipped", band, nyquist);
                return Ok(None);
            }
            let fail = |e: crate::audio::effects::EffectError| {
                MasteringError::stage(Stage::Equalization, format!("band {}: {}", band, e))
            };

            let mut band_audio = toolkit.high_pass_filter(input, band.low_hz()).map_err(fail)?;
            if band.upper_hz() < nyquist {
                band_audio = toolkit.low_pass_filter(&band_audio, band.upper_hz()).map_err(fail)?;
            }
            log::debug!("Band {}: gain {:+.3}", band, gain);
            Ok(Some(toolkit.pan_or_gain(&band_audio, gain)))
        })
        .collect::<Result<_>>()?;

    let mut equalized: Option<Waveform> = None;
    for band_audio in filtered.into_iter().flatten() {
        equalized = Some(match equalized {
            None => band_audio,
            Some(mix) => toolkit
                .overlay(&mix, &band_audio)
                .map_err(|e| MasteringError::stage(Stage::Equalization, e.to_string()))?,
        });
    }

    Ok(equalized.unwrap_or_else(|| {
        log::warn!("No equalization band lies below Nyquist; output is silent");
        input.map_samples(|_| 0.0)
    }))
}

/// Peak-normalizes to 1.0, then reduces the part of each sample above
/// `threshold` by `ratio`, keeping the sign.
pub fn compression(
    toolkit: &dyn AudioToolkit,
    input: &Waveform,
    settings: &StageSettings,
) -> Result<Waveform> {
    let StageSettings::Compression(CompressionSettings { threshold, ratio }) = settings else {
        return Err(mismatch(Stage::Compression, settings));
    };
    let (threshold, ratio) = (*threshold, *ratio);

    if !(threshold > 0.0 && threshold <= 1.0) {
        return Err(MasteringError::stage(
            Stage::Compression,
            format!("threshold must be in (0, 1], got {}", threshold),
        ));
    }
    if !(ratio.is_finite() && ratio >= 1.0) {
        return Err(MasteringError::stage(
            Stage::Compression,
            format!("ratio must be at least 1, got {}", ratio),
        ));
    }

    let normalized = toolkit
        .normalize(input, 0.0)
        .map_err(|e| MasteringError::stage(Stage::Compression, e.to_string()))?;

    let (threshold, ratio) = (threshold as f32, ratio as f32);
    Ok(normalized.map_samples(|x| compress_sample(x, threshold, ratio)))
}

fn compress_sample(x: f32, threshold: f32, ratio: f32) -> f32 {
    let magnitude = x.abs();
    if magnitude > threshold {
        (threshold + (magnitude - threshold) / ratio).copysign(x)
    } else {
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::effects::BiquadToolkit;
    use crate::audio::waveform::sine;
    use crate::mastering::bands::{FrequencyBand, GainAdjustmentMap};

    fn eq_settings(gains: &[(f64, f64)]) -> StageSettings {
        StageSettings::Equalization(EqualizationSettings {
            gain_adjustments: gains
                .iter()
                .map(|&(low, gain)| (FrequencyBand::new(low).unwrap(), gain))
                .collect(),
        })
    }

    fn rms(w: &Waveform) -> f32 {
        let s = &w.channels[0][w.num_frames() / 4..];
        (s.iter().map(|x| x * x).sum::<f32>() / s.len() as f32).sqrt()
    }

    #[test]
    fn compresses_only_above_threshold() {
        assert_eq!(compress_sample(0.4, 0.5, 2.0), 0.4);
        assert_eq!(compress_sample(-0.5, 0.5, 2.0), -0.5);
        assert!((compress_sample(0.9, 0.5, 2.0) - 0.7).abs() < 1e-6);
        assert!((compress_sample(-0.9, 0.5, 2.0) + 0.7).abs() < 1e-6);
    }

    #[test]
    fn compression_normalizes_then_compresses() {
        let input = Waveform::mono(vec![0.25, -0.5, 0.1], 8000);
        let settings = StageSettings::Compression(CompressionSettings { threshold: 0.5, ratio: 4.0 });

        let out = compression(&BiquadToolkit, &input, &settings).unwrap();

        // Normalized: [0.5, -1.0, 0.2]; only -1.0 exceeds 0.5
        let expected = [0.5, -0.625, 0.2];
        for (got, want) in out.channels[0].iter().zip(expected) {
            assert!((got - want).abs() < 1e-6, "got {} want {}", got, want);
        }
    }

    #[test]
    fn compression_rejects_bad_parameters() {
        let input = Waveform::mono(vec![0.5], 8000);
        for (threshold, ratio) in [(0.0, 2.0), (-0.5, 2.0), (1.5, 2.0), (0.5, 0.5)] {
            let settings = StageSettings::Compression(CompressionSettings { threshold, ratio });
            let err = compression(&BiquadToolkit, &input, &settings).unwrap_err();
            assert!(matches!(
                err,
                MasteringError::StageExecution { stage: Stage::Compression, .. }
            ));
        }
    }

    #[test]
    fn compression_stub_returns_defaults() {
        let store = crate::mastering::profile::ProfileStore::builtin();
        let planner = crate::mastering::planner::EqualizationPlanner::default();
        let input = sine(440.0, 0.5, 0.1, 8000);
        let ctx = ComputeContext {
            input: &input,
            profile: store.default_profile(),
            planner: &planner,
        };
        match compute_compression(&ctx).unwrap() {
            Computed::NotImplemented(settings) => {
                assert_eq!(settings, StageSettings::defaults(Stage::Compression))
            }
            Computed::Settings(_) => panic!("compression compute should report not implemented"),
        }
    }

    #[test]
    fn normalization_uses_headroom() {
        let input = sine(440.0, 0.2, 0.1, 44100);
        let settings = StageSettings::Normalization(NormalizationSettings { headroom: 0.0 });
        let out = normalization(&BiquadToolkit, &input, &settings).unwrap();
        assert!((out.peak() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn mismatched_settings_are_stage_errors() {
        let input = Waveform::mono(vec![0.5], 8000);
        let err = normalization(&BiquadToolkit, &input, &StageSettings::defaults(Stage::Compression))
            .unwrap_err();
        assert!(matches!(
            err,
            MasteringError::StageExecution { stage: Stage::Normalization, .. }
        ));
    }

    #[test]
    fn equalization_zero_gain_roughly_preserves_in_band_signal() {
        let input = sine(440.0, 0.5, 0.5, 44100);
        let out = equalization(&BiquadToolkit, &input, &eq_settings(&[(100.0, 0.0)])).unwrap();
        let ratio = rms(&out) / rms(&input);
        assert!(ratio > 0.7 && ratio < 1.1, "ratio {}", ratio);
    }

    #[test]
    fn equalization_cut_removes_band() {
        let input = sine(440.0, 0.5, 0.5, 44100);
        let out = equalization(&BiquadToolkit, &input, &eq_settings(&[(100.0, -1.0)])).unwrap();
        assert!(rms(&out) < 1e-6);
    }

    #[test]
    fn equalization_boost_raises_band() {
        let input = sine(440.0, 0.25, 0.5, 44100);
        let flat = equalization(&BiquadToolkit, &input, &eq_settings(&[(100.0, 0.0)])).unwrap();
        let boosted = equalization(&BiquadToolkit, &input, &eq_settings(&[(100.0, 1.0)])).unwrap();
        assert!((rms(&boosted) / rms(&flat) - 2.0).abs() < 1e-3);
    }

    #[test]
    fn equalization_keeps_layout() {
        let input = Waveform::new(vec![vec![0.1; 4096], vec![-0.1; 4096]], 44100);
        let out = equalization(
            &BiquadToolkit,
            &input,
            &StageSettings::defaults(Stage::Equalization),
        )
        .unwrap();
        assert_eq!(out.num_channels(), 2);
        assert_eq!(out.num_frames(), 4096);
        assert_eq!(out.sample_rate, 44100);
    }

    #[test]
    fn equalization_skips_bands_above_nyquist() {
        let input = sine(440.0, 0.5, 0.2, 8000);
        let out = equalization(&BiquadToolkit, &input, &eq_settings(&[(10000.0, 0.5)])).unwrap();
        assert_eq!(out.peak(), 0.0);
    }

    #[test]
    fn empty_equalization_passes_through() {
        let input = sine(440.0, 0.5, 0.1, 8000);
        let settings = StageSettings::Equalization(EqualizationSettings {
            gain_adjustments: GainAdjustmentMap::new(),
        });
        assert_eq!(equalization(&BiquadToolkit, &input, &settings).unwrap(), input);
    }
}
