use thiserror::Error;

use super::waveform::Waveform;

#[derive(Error, Debug, PartialEq)]
pub enum EffectError {
    #[error("cutoff {cutoff} Hz must lie in (0, {nyquist}) Hz")]
    InvalidCutoff { cutoff: f64, nyquist: f64 },
    #[error("headroom must be a non-negative number of dB, got {0}")]
    InvalidHeadroom(f64),
    #[error("cannot overlay: {0}")]
    Mismatch(String),
}

/// Signal-processing primitives the mastering stages are built from.
pub trait AudioToolkit: Sync {
    /// Scale so the peak sits `headroom` dB below full scale.
    fn normalize(&self, waveform: &Waveform, headroom: f64) -> Result<Waveform, EffectError>;

    fn low_pass_filter(&self, waveform: &Waveform, cutoff_hz: f64) -> Result<Waveform, EffectError>;

    fn high_pass_filter(&self, waveform: &Waveform, cutoff_hz: f64) -> Result<Waveform, EffectError>;

    /// Relative level change: the signal is scaled by `1 + amount`.
    fn pan_or_gain(&self, waveform: &Waveform, amount: f64) -> Waveform;

    /// Sample-wise sum; the result keeps `base`'s length.
    fn overlay(&self, base: &Waveform, layer: &Waveform) -> Result<Waveform, EffectError>;
}

/// Toolkit built on second-order Butterworth biquads.
#[derive(Clone, Copy, Debug, Default)]
pub struct BiquadToolkit;

impl AudioToolkit for BiquadToolkit {
    fn normalize(&self, waveform: &Waveform, headroom: f64) -> Result<Waveform, EffectError> {
        if !headroom.is_finite() || headroom < 0.0 {
            return Err(EffectError::InvalidHeadroom(headroom));
        }
        let peak = waveform.peak();
        if peak <= 0.0 {
            return Ok(waveform.clone());
        }
        let target = 10f64.powf(-headroom / 20.0);
        let gain = (target / peak as f64) as f32;
        Ok(waveform.map_samples(|s| s * gain))
    }

    fn low_pass_filter(&self, waveform: &Waveform, cutoff_hz: f64) -> Result<Waveform, EffectError> {
        let coeffs = Biquad::low_pass(cutoff_hz, waveform.sample_rate)?;
        Ok(coeffs.run(waveform))
    }

    fn high_pass_filter(&self, waveform: &Waveform, cutoff_hz: f64) -> Result<Waveform, EffectError> {
        let coeffs = Biquad::high_pass(cutoff_hz, waveform.sample_rate)?;
        Ok(coeffs.run(waveform))
    }

    fn pan_or_gain(&self, waveform: &Waveform, amount: f64) -> Waveform {
        let gain = (1.0 + amount) as f32;
        waveform.map_samples(|s| s * gain)
    }

    fn overlay(&self, base: &Waveform, layer: &Waveform) -> Result<Waveform, EffectError> {
        if base.sample_rate != layer.sample_rate {
            return Err(EffectError::Mismatch(format!(
                "sample rates differ ({} vs {})",
                base.sample_rate, layer.sample_rate
            )));
        }
        if base.num_channels() != layer.num_channels() {
            return Err(EffectError::Mismatch(format!(
                "channel counts differ ({} vs {})",
                base.num_channels(),
                layer.num_channels()
            )));
        }

        let channels = base
            .channels
            .iter()
            .zip(&layer.channels)
            .map(|(b, l)| {
                b.iter()
                    .enumerate()
                    .map(|(i, &s)| s + l.get(i).copied().unwrap_or(0.0))
                    .collect()
            })
            .collect();
        Ok(Waveform::new(channels, base.sample_rate))
    }
}

/// RBJ cookbook biquad, normalized so `a0 == 1`.
#[derive(Clone, Copy, Debug)]
struct Biquad {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl Biquad {
    const BUTTERWORTH_Q: f64 = std::f64::consts::FRAC_1_SQRT_2;

    fn low_pass(cutoff_hz: f64, sample_rate: u32) -> Result<Self, EffectError> {
        let (cos, alpha) = Self::prewarp(cutoff_hz, sample_rate)?;
        let a0 = 1.0 + alpha;
        Ok(Self {
            b0: (1.0 - cos) / 2.0 / a0,
            b1: (1.0 - cos) / a0,
            b2: (1.0 - cos) / 2.0 / a0,
            a1: -2.0 * cos / a0,
            a2: (1.0 - alpha) / a0,
        })
    }

    fn high_pass(cutoff_hz: f64, sample_rate: u32) -> Result<Self, EffectError> {
        let (cos, alpha) = Self::prewarp(cutoff_hz, sample_rate)?;
        let a0 = 1.0 + alpha;
        Ok(Self {
            b0: (1.0 + cos) / 2.0 / a0,
            b1: -(1.0 + cos) / a0,
            b2: (1.0 + cos) / 2.0 / a0,
            a1: -2.0 * cos / a0,
            a2: (1.0 - alpha) / a0,
        })
    }

    fn prewarp(cutoff_hz: f64, sample_rate: u32) -> Result<(f64, f64), EffectError> {
        let nyquist = sample_rate as f64 / 2.0;
        if !(cutoff_hz > 0.0 && cutoff_hz < nyquist) {
            return Err(EffectError::InvalidCutoff {
                cutoff: cutoff_hz,
                nyquist,
            });
        }
        let w0 = 2.0 * std::f64::consts::PI * cutoff_hz / sample_rate as f64;
        Ok((w0.cos(), w0.sin() / (2.0 * Self::BUTTERWORTH_Q)))
    }

    /// Direct Form II Transposed, independent state per channel.
    fn run(&self, waveform: &Waveform) -> Waveform {
        let channels = waveform
            .channels
            .iter()
            .map(|channel| {
                let (mut z1, mut z2) = (0.0f64, 0.0f64);
                channel
                    .iter()
                    .map(|&s| {
                        let x = s as f64;
                        let y = self.b0 * x + z1;
                        z1 = self.b1 * x - self.a1 * y + z2;
                        z2 = self.b2 * x - self.a2 * y;
                        y as f32
                    })
                    .collect()
            })
            .collect();
        Waveform::new(channels, waveform.sample_rate)
    }
}
