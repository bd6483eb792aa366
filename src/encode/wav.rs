use hound::{SampleFormat, WavSpec, WavWriter};
use std::path::Path;

use crate::audio::waveform::Waveform;
use crate::mastering::error::{MasteringError, Result};

/// Remove an existing output file so the next write starts from nothing.
pub fn clear_output(path: &Path) -> Result<()> {
    if path.exists() {
        std::fs::remove_file(path)?;
        log::debug!("Removed previous output {}", path.display());
    }
    Ok(())
}

/// Write a waveform as 16-bit signed PCM and return how many samples clipped.
///
/// Samples are scaled by 32768 and clamped to the i16 range, the inverse of
/// the decoder's conversion, so a decoded 16-bit file re-encodes unchanged.
/// Samples beyond full scale (`|x| > 1`) are hard-clipped and counted.
pub fn save(waveform: &Waveform, path: &Path) -> Result<usize> {
    let fail = |e: hound::Error| MasteringError::Encode(format!("{}: {}", path.display(), e));

    if waveform.num_channels() == 0 || waveform.num_channels() > u16::MAX as usize {
        return Err(MasteringError::Encode(format!(
            "{}: unsupported channel count {}",
            path.display(),
            waveform.num_channels()
        )));
    }
    if waveform.channels.iter().any(|c| c.len() != waveform.num_frames()) {
        return Err(MasteringError::Encode(format!(
            "{}: channels differ in length",
            path.display()
        )));
    }

    let spec = WavSpec {
        channels: waveform.num_channels() as u16,
        sample_rate: waveform.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec).map_err(fail)?;
    let mut clipped = 0;
    for i in 0..waveform.num_frames() {
        for channel in &waveform.channels {
            let sample = channel[i];
            if sample.abs() > 1.0 {
                clipped += 1;
            }
            writer.write_sample(to_i16(sample)).map_err(fail)?;
        }
    }
    writer.finalize().map_err(fail)?;

    if clipped > 0 {
        log::warn!(
            "{}: {} of {} samples exceeded full scale and were clipped",
            path.display(),
            clipped,
            waveform.num_frames() * waveform.num_channels()
        );
    }

    log::info!(
        "Wrote {} ({} channel(s), {:.1}s)",
        path.display(),
        waveform.num_channels(),
        waveform.duration()
    );
    Ok(clipped)
}

fn to_i16(sample: f32) -> i16 {
    (sample * 32768.0)
        .round()
        .clamp(i16::MIN as f32, i16::MAX as f32) as i16
}
