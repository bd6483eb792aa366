/// Planar multichannel audio, samples as f32 in [-1.0, 1.0].
#[derive(Clone, Debug, PartialEq)]
pub struct Waveform {
    /// One sample vector per channel, all the same length
    pub channels: Vec<Vec<f32>>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl Waveform {
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        Self {
            channels,
            sample_rate,
        }
    }

    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self::new(vec![samples], sample_rate)
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Samples per channel.
    pub fn num_frames(&self) -> usize {
        self.channels.first().map_or(0, |c| c.len())
    }

    pub fn is_empty(&self) -> bool {
        self.num_frames() == 0
    }

    pub fn duration(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.num_frames() as f32 / self.sample_rate as f32
    }

    pub fn nyquist(&self) -> f64 {
        self.sample_rate as f64 / 2.0
    }

    pub fn peak(&self) -> f32 {
        self.channels
            .iter()
            .flat_map(|c| c.iter())
            .map(|s| s.abs())
            .fold(0.0f32, f32::max)
    }

    /// Returns a waveform with the same layout and every sample mapped through `f`.
    pub fn map_samples(&self, f: impl Fn(f32) -> f32) -> Self {
        Self {
            channels: self
                .channels
                .iter()
                .map(|c| c.iter().map(|&s| f(s)).collect())
                .collect(),
            sample_rate: self.sample_rate,
        }
    }
}

#[cfg(test)]
pub(crate) fn sine(freq: f32, amplitude: f32, seconds: f32, sample_rate: u32) -> Waveform {
    let n = (seconds * sample_rate as f32) as usize;
    let samples = (0..n)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            amplitude * (2.0 * std::f32::consts::PI * freq * t).sin()
        })
        .collect();
    Waveform::mono(samples, sample_rate)
}
