use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::apply;
use super::bands::{FrequencyBand, GainAdjustmentMap};
use super::error::{MasteringError, Result};
use super::planner::EqualizationPlanner;
use super::profile::Profile;
use crate::audio::effects::AudioToolkit;
use crate::audio::waveform::Waveform;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Normalization,
    Equalization,
    Compression,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Normalization, Stage::Equalization, Stage::Compression];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Normalization => "normalization",
            Stage::Equalization => "equalization",
            Stage::Compression => "compression",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Stage {
    type Err = MasteringError;

    fn from_str(s: &str) -> Result<Self> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.name() == s)
            .ok_or_else(|| {
                MasteringError::Configuration(format!(
                    "Unknown stage '{}'. Available stages: {:?}",
                    s,
                    Stage::ALL.map(|stage| stage.name())
                ))
            })
    }
}

pub const DEFAULT_HEADROOM_DB: f64 = 0.1;

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct NormalizationSettings {
    /// dB of margin left below full scale
    pub headroom: f64,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EqualizationSettings {
    pub gain_adjustments: GainAdjustmentMap,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CompressionSettings {
    /// Level in (0, 1] above which normalized samples are compressed
    pub threshold: f64,
    /// Compression ratio, at least 1
    pub ratio: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StageSettings {
    Normalization(NormalizationSettings),
    Equalization(EqualizationSettings),
    Compression(CompressionSettings),
}

impl StageSettings {
    /// Built-in settings used when nothing else is available.
    pub fn defaults(stage: Stage) -> Self {
        match stage {
            Stage::Normalization => StageSettings::Normalization(NormalizationSettings {
                headroom: DEFAULT_HEADROOM_DB,
            }),
            Stage::Equalization => StageSettings::Equalization(EqualizationSettings {
                gain_adjustments: [(100.0, 0.5), (1000.0, 0.2), (10000.0, -0.1)]
                    .into_iter()
                    .map(|(low_hz, gain)| (FrequencyBand::from_const(low_hz), gain))
                    .collect(),
            }),
            Stage::Compression => StageSettings::Compression(CompressionSettings {
                threshold: 1.0,
                ratio: 1.5,
            }),
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            StageSettings::Normalization(_) => Stage::Normalization,
            StageSettings::Equalization(_) => Stage::Equalization,
            StageSettings::Compression(_) => Stage::Compression,
        }
    }

    pub fn as_equalization(&self) -> Option<&GainAdjustmentMap> {
        match self {
            StageSettings::Equalization(eq) => Some(&eq.gain_adjustments),
            _ => None,
        }
    }
}

/// Caller-supplied settings, at most one record per stage.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExplicitSettings {
    pub normalization: Option<NormalizationSettings>,
    pub equalization: Option<EqualizationSettings>,
    pub compression: Option<CompressionSettings>,
}

impl ExplicitSettings {
    pub fn for_stage(&self, stage: Stage) -> Option<StageSettings> {
        match stage {
            Stage::Normalization => self.normalization.clone().map(StageSettings::Normalization),
            Stage::Equalization => self.equalization.clone().map(StageSettings::Equalization),
            Stage::Compression => self.compression.clone().map(StageSettings::Compression),
        }
    }
}

/// Where a stage's resolved settings came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingsSource {
    Computed,
    Explicit,
    Default,
    /// The stage declares computation but has none yet; its defaults were used.
    NotImplemented,
}

impl fmt::Display for SettingsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SettingsSource::Computed => "computed",
            SettingsSource::Explicit => "explicit",
            SettingsSource::Default => "default",
            SettingsSource::NotImplemented => "default (compute not implemented)",
        })
    }
}

/// Inputs available to a stage's compute function.
pub struct ComputeContext<'a> {
    pub input: &'a Waveform,
    pub profile: &'a Profile,
    pub planner: &'a EqualizationPlanner,
}

pub enum Computed {
    Settings(StageSettings),
    NotImplemented(StageSettings),
}

pub type ComputeFn = fn(&ComputeContext<'_>) -> Result<Computed>;
pub type ApplyFn = fn(&dyn AudioToolkit, &Waveform, &StageSettings) -> Result<Waveform>;

pub struct StageEntry {
    pub stage: Stage,
    /// Derives settings from the input signal, if the stage supports it
    pub compute: Option<ComputeFn>,
    pub apply: ApplyFn,
}

static REGISTRY: [StageEntry; 3] = [
    StageEntry {
        stage: Stage::Normalization,
        compute: None,
        apply: apply::normalization,
    },
    StageEntry {
        stage: Stage::Equalization,
        compute: Some(apply::compute_equalization),
        apply: apply::equalization,
    },
    StageEntry {
        stage: Stage::Compression,
        compute: Some(apply::compute_compression),
        apply: apply::compression,
    },
];

pub fn entry(stage: Stage) -> &'static StageEntry {
    match stage {
        Stage::Normalization => &REGISTRY[0],
        Stage::Equalization => &REGISTRY[1],
        Stage::Compression => &REGISTRY[2],
    }
}

/// Explicit settings for the stage if given, else its defaults. Never
/// touches the default tables.
pub fn resolve(stage: Stage, explicit: &ExplicitSettings) -> (StageSettings, SettingsSource) {
    match explicit.for_stage(stage) {
        Some(settings) => (settings, SettingsSource::Explicit),
        None => (StageSettings::defaults(stage), SettingsSource::Default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_stage_names() {
        assert_eq!("normalization".parse::<Stage>().unwrap(), Stage::Normalization);
        assert_eq!("equalization".parse::<Stage>().unwrap(), Stage::Equalization);
        assert_eq!("compression".parse::<Stage>().unwrap(), Stage::Compression);
    }

    #[test]
    fn unknown_stage_is_configuration_error() {
        let err = "reverb".parse::<Stage>().unwrap_err();
        assert!(matches!(err, MasteringError::Configuration(_)));
        assert!(err.to_string().contains("reverb"));
    }

    #[test]
    fn registry_entries_match_their_stage() {
        for stage in Stage::ALL {
            assert_eq!(entry(stage).stage, stage);
        }
        assert!(entry(Stage::Normalization).compute.is_none());
        assert!(entry(Stage::Equalization).compute.is_some());
        assert!(entry(Stage::Compression).compute.is_some());
    }

    #[test]
    fn resolve_prefers_explicit_then_default() {
        let explicit = ExplicitSettings {
            normalization: Some(NormalizationSettings { headroom: 3.0 }),
            ..Default::default()
        };

        let (settings, source) = resolve(Stage::Normalization, &explicit);
        assert_eq!(source, SettingsSource::Explicit);
        assert_eq!(
            settings,
            StageSettings::Normalization(NormalizationSettings { headroom: 3.0 })
        );

        let (settings, source) = resolve(Stage::Compression, &explicit);
        assert_eq!(source, SettingsSource::Default);
        assert_eq!(settings, StageSettings::defaults(Stage::Compression));
    }

    #[test]
    fn resolve_does_not_alter_defaults() {
        let explicit = ExplicitSettings {
            compression: Some(CompressionSettings { threshold: 0.5, ratio: 4.0 }),
            ..Default::default()
        };
        let _ = resolve(Stage::Compression, &explicit);
        assert_eq!(
            StageSettings::defaults(Stage::Compression),
            StageSettings::Compression(CompressionSettings { threshold: 1.0, ratio: 1.5 })
        );
    }

    #[test]
    fn missing_required_key_is_rejected() {
        let result: std::result::Result<ExplicitSettings, _> =
            toml::from_str("[compression]\nthreshold = 0.5\n");
        assert!(result.is_err());
    }

    #[test]
    fn unknown_key_is_rejected() {
        let result: std::result::Result<ExplicitSettings, _> =
            toml::from_str("[normalization]\nheadroom = 0.5\nloudness = 3\n");
        assert!(result.is_err());
    }

    #[test]
    fn explicit_settings_parse_from_toml() {
        let parsed: ExplicitSettings = toml::from_str(
            r#"
            [normalization]
            headroom = 1.0

            [equalization]
            gain_adjustments = [{ low_hz = 100.0, gain = 0.3 }]
            "#,
        )
        .unwrap();
        assert!(parsed.for_stage(Stage::Normalization).is_some());
        assert!(parsed.for_stage(Stage::Equalization).is_some());
        assert!(parsed.for_stage(Stage::Compression).is_none());
    }
}
