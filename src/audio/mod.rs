pub mod analysis;
pub mod decode;
pub mod effects;
pub mod waveform;
