use rayon::prelude::*;
use rustfft::{num_complex::Complex, FftPlanner};

use super::waveform::Waveform;
use crate::mastering::error::{MasteringError, Result};

pub const DEFAULT_SEGMENT_SIZE: usize = 4096;

/// Time-by-frequency power estimate of a waveform.
#[derive(Clone, Debug)]
pub struct Spectrum {
    /// Frequency of each bin in Hz, ascending from 0 to Nyquist
    pub frequency_bins: Vec<f64>,
    /// One-sided power spectral density, indexed `[segment][bin]`
    pub segment_spectrum: Vec<Vec<f64>>,
}

impl Spectrum {
    pub fn energy_in_band(&self, low_hz: f64, high_hz: f64) -> f64 {
        energy_in_band(&self.frequency_bins, &self.segment_spectrum, low_hz, high_hz)
    }
}

/// Hamming-windowed periodogram computed over fixed-size time segments.
///
/// Multichannel input is analyzed per channel and the power spectra are
/// averaged across channels for every segment. A trailing partial segment is
/// dropped unless the whole waveform is shorter than one segment, in which
/// case it is analyzed as a single segment of its own length.
#[derive(Clone, Debug)]
pub struct SpectralAnalyzer {
    segment_size: usize,
}

impl Default for SpectralAnalyzer {
    fn default() -> Self {
        Self::new(DEFAULT_SEGMENT_SIZE)
    }
}

impl SpectralAnalyzer {
    pub fn new(segment_size: usize) -> Self {
        Self { segment_size }
    }

    /// Checks that `waveform` can be analyzed without computing anything.
    pub fn validate(&self, waveform: &Waveform) -> Result<()> {
        if self.segment_size == 0 {
            return Err(MasteringError::Analysis("segment size must be non-zero".into()));
        }
        if waveform.sample_rate == 0 {
            return Err(MasteringError::Analysis("sample rate must be positive".into()));
        }
        if waveform.num_channels() == 0 || waveform.is_empty() {
            return Err(MasteringError::Analysis("cannot analyze an empty waveform".into()));
        }
        if waveform.channels.iter().any(|c| c.len() != waveform.num_frames()) {
            return Err(MasteringError::Analysis("channels differ in length".into()));
        }
        Ok(())
    }

    pub fn analyze(&self, waveform: &Waveform) -> Result<Spectrum> {
        self.validate(waveform)?;

        let total = waveform.num_frames();
        let seg_len = self.segment_size.min(total);
        let num_segments = total / seg_len;
        let num_bins = seg_len / 2 + 1;
        let fs = waveform.sample_rate as f64;
        let num_channels = waveform.num_channels() as f64;

        let window = hamming_window(seg_len);
        let window_power: f64 = window.iter().map(|w| w * w).sum();
        let scale = 1.0 / (fs * window_power);

        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(seg_len);

        log::debug!(
            "Periodogram: {} segments of {} samples, {} channel(s), {} bins",
            num_segments,
            seg_len,
            waveform.num_channels(),
            num_bins
        );

        let segment_spectrum: Vec<Vec<f64>> = (0..num_segments)
            .into_par_iter()
            .map(|seg| {
                let start = seg * seg_len;
                let mut power = vec![0.0f64; num_bins];
                let mut buffer = vec![Complex::new(0.0f64, 0.0); seg_len];

                for channel in &waveform.channels {
                    for (i, slot) in buffer.iter_mut().enumerate() {
                        *slot = Complex::new(channel[start + i] as f64 * window[i], 0.0);
                    }
                    fft.process(&mut buffer);

                    for (k, p) in power.iter_mut().enumerate() {
                        let density = buffer[k].norm_sqr() * scale;
                        // One-sided: fold negative frequencies except DC and Nyquist
                        let is_nyquist = seg_len % 2 == 0 && k == seg_len / 2;
                        *p += if k == 0 || is_nyquist { density } else { 2.0 * density };
                    }
                }

                power.iter_mut().for_each(|p| *p /= num_channels);
                power
            })
            .collect();

        let frequency_bins = (0..num_bins)
            .map(|k| k as f64 * fs / seg_len as f64)
            .collect();

        Ok(Spectrum {
            frequency_bins,
            segment_spectrum,
        })
    }
}

/// Sums power over bins with `low_hz <= f < high_hz` in each segment and
/// returns the mean over segments. Returns 0 when no bin is selected.
pub fn energy_in_band(
    frequency_bins: &[f64],
    segment_spectrum: &[Vec<f64>],
    low_hz: f64,
    high_hz: f64,
) -> f64 {
    if segment_spectrum.is_empty() {
        return 0.0;
    }

    let selected: Vec<usize> = frequency_bins
        .iter()
        .enumerate()
        .filter(|(_, f)| **f >= low_hz && **f < high_hz)
        .map(|(k, _)| k)
        .collect();
    if selected.is_empty() {
        return 0.0;
    }

    let total: f64 = segment_spectrum
        .iter()
        .map(|segment| selected.iter().map(|&k| segment[k]).sum::<f64>())
        .sum();
    total / segment_spectrum.len() as f64
}

/// Periodic Hamming window.
fn hamming_window(size: usize) -> Vec<f64> {
    (0..size)
        .map(|i| 0.54 - 0.46 * (2.0 * std::f64::consts::PI * i as f64 / size as f64).cos())
        .collect()
}
