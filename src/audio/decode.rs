use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::waveform::Waveform;
use crate::mastering::error::{MasteringError, Result};

/// Decode an audio file into planar channels. No downmixing is done.
pub fn load(path: &Path) -> Result<Waveform> {
    let fail = |what: &str, e: &dyn std::fmt::Display| {
        MasteringError::Decode(format!("{}: {}: {}", path.display(), what, e))
    };

    let file = std::fs::File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| fail("failed to probe audio format", &e))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .ok_or_else(|| MasteringError::Decode(format!("{}: no audio tracks found", path.display())))?;

    let track_id = track.id;
    // Containers may omit the layout; decoded buffers always carry it
    let declared_channels = track.codec_params.channels.map(|c| c.count());
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| MasteringError::Decode(format!("{}: unknown sample rate", path.display())))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| fail("failed to create audio decoder", &e))?;

    let mut channels: Vec<Vec<f32>> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(fail("failed to read packet", &e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(symphonia::core::errors::Error::DecodeError(_)) => continue,
            Err(e) => return Err(fail("failed to decode packet", &e)),
        };

        let spec = *decoded.spec();
        let num_frames = decoded.frames();
        let num_channels = spec.channels.count();
        if channels.is_empty() {
            channels = vec![Vec::new(); num_channels];
        } else if channels.len() != num_channels {
            return Err(MasteringError::Decode(format!(
                "{}: channel count changed from {} to {} mid-stream",
                path.display(),
                channels.len(),
                num_channels
            )));
        }
        if num_channels == 0 {
            continue;
        }

        let mut sample_buf = SampleBuffer::<f32>::new(num_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);

        // Deinterleave
        for frame in sample_buf.samples().chunks(num_channels) {
            for (channel, &sample) in channels.iter_mut().zip(frame) {
                channel.push(sample);
            }
        }
    }

    if channels.is_empty() {
        channels = vec![Vec::new(); declared_channels.unwrap_or(1)];
    }
    let waveform = Waveform::new(channels, sample_rate);

    log::info!(
        "Decoded {}: {} channel(s), {} samples, {}Hz, {:.1}s",
        path.display(),
        waveform.num_channels(),
        waveform.num_frames(),
        sample_rate,
        waveform.duration()
    );

    Ok(waveform)
}
