use serde::Deserialize;
use std::collections::BTreeMap;

use super::bands::FrequencyBand;
use super::error::{MasteringError, Result};

pub const DEFAULT_PROFILE: &str = "default";

/// Built-in target energies as (band lower edge Hz, target energy).
///
/// Energies are in the unit `energy_in_band` measures: the sum of one-sided
/// PSD bins of f32 samples in [-1, 1], averaged over segments. A sine of
/// amplitude `a` lands at about `a^2 / 2 * segment_size / sample_rate`, so a
/// full-scale sine at 44.1 kHz with 4096-sample segments measures about 0.046.
/// These targets sit well above that and drive every band to the +1 clamp.
const BUILTIN_PROFILES: &[(&str, &[(f64, f64)])] = &[
    (DEFAULT_PROFILE, &[(100.0, 5.0), (1000.0, 4.0), (10000.0, 3.0)]),
    ("bass-heavy", &[(100.0, 8.0), (1000.0, 4.0), (10000.0, 2.0)]),
    (
        "full-range",
        &[(1.0, 5.0), (10.0, 5.0), (100.0, 5.0), (1000.0, 4.0), (10000.0, 3.0)],
    ),
];

/// A named set of per-band target energies steering equalization, in the
/// unit `energy_in_band` measures.
#[derive(Clone, Debug, PartialEq)]
pub struct Profile {
    name: String,
    targets: BTreeMap<FrequencyBand, f64>,
}

impl Profile {
    pub fn new(name: &str, targets: impl IntoIterator<Item = (f64, f64)>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for (low_hz, target) in targets {
            let band = FrequencyBand::new(low_hz)?;
            if !target.is_finite() || target < 0.0 {
                return Err(MasteringError::Configuration(format!(
                    "profile '{}': target energy for band {} must be non-negative, got {}",
                    name, band, target
                )));
            }
            map.insert(band, target);
        }
        Ok(Self {
            name: name.to_string(),
            targets: map,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn targets(&self) -> &BTreeMap<FrequencyBand, f64> {
        &self.targets
    }
}

/// Profile definition as written in the config file.
#[derive(Clone, Debug, Deserialize)]
pub struct ProfileConfig {
    pub bands: Vec<BandTarget>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct BandTarget {
    pub low_hz: f64,
    pub target: f64,
}

/// Named profiles. A "default" profile is always present.
#[derive(Clone, Debug)]
pub struct ProfileStore {
    default: Profile,
    others: BTreeMap<String, Profile>,
}

impl ProfileStore {
    pub fn builtin() -> Self {
        let mut default = None;
        let mut others = BTreeMap::new();
        for (name, targets) in BUILTIN_PROFILES {
            let profile = Profile {
                name: name.to_string(),
                targets: targets
                    .iter()
                    .map(|&(low_hz, target)| (FrequencyBand::from_const(low_hz), target))
                    .collect(),
            };
            if *name == DEFAULT_PROFILE {
                default = Some(profile);
            } else {
                others.insert(name.to_string(), profile);
            }
        }
        Self {
            default: default.unwrap_or_else(|| Profile {
                name: DEFAULT_PROFILE.to_string(),
                targets: BTreeMap::new(),
            }),
            others,
        }
    }

    /// Built-in profiles with config-file profiles added on top. A custom
    /// profile replaces a built-in of the same name.
    pub fn with_custom(custom: &BTreeMap<String, ProfileConfig>) -> Result<Self> {
        let mut store = Self::builtin();
        for (name, config) in custom {
            let profile = Profile::new(name, config.bands.iter().map(|b| (b.low_hz, b.target)))?;
            store.insert(profile);
        }
        Ok(store)
    }

    pub fn insert(&mut self, profile: Profile) {
        if profile.name == DEFAULT_PROFILE {
            self.default = profile;
        } else {
            self.others.insert(profile.name.clone(), profile);
        }
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.others.keys().map(String::as_str).collect();
        names.push(DEFAULT_PROFILE);
        names.sort_unstable();
        names
    }

    pub fn default_profile(&self) -> &Profile {
        &self.default
    }

    /// Strict lookup.
    pub fn get(&self, name: &str) -> Result<&Profile> {
        if name == DEFAULT_PROFILE {
            return Ok(&self.default);
        }
        self.others.get(name).ok_or_else(|| {
            MasteringError::Configuration(format!(
                "Profile '{}' not found. Available profiles: {:?}",
                name,
                self.names()
            ))
        })
    }

    /// Lookup that falls back to the default profile for unknown names.
    pub fn resolve(&self, name: &str) -> &Profile {
        match self.get(name) {
            Ok(profile) => profile,
            Err(_) => {
                log::warn!(
                    "Unknown profile '{}', falling back to '{}'",
                    name,
                    DEFAULT_PROFILE
                );
                &self.default
            }
        }
    }
}

impl Default for ProfileStore {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_default_has_three_decade_bands() {
        let store = ProfileStore::builtin();
        let targets: Vec<(f64, f64)> = store
            .default_profile()
            .targets()
            .iter()
            .map(|(b, &t)| (b.low_hz(), t))
            .collect();
        assert_eq!(targets, vec![(100.0, 5.0), (1000.0, 4.0), (10000.0, 3.0)]);
    }

    #[test]
    fn names_are_sorted_and_include_default() {
        let store = ProfileStore::builtin();
        assert_eq!(store.names(), vec!["bass-heavy", "default", "full-range"]);
    }

    #[test]
    fn strict_lookup_fails_for_unknown_names() {
        let store = ProfileStore::builtin();
        assert!(store.get("bass-heavy").is_ok());
        let err = store.get("nonexistent").unwrap_err();
        assert!(matches!(err, MasteringError::Configuration(_)));
    }

    #[test]
    fn resolve_falls_back_to_default() {
        let store = ProfileStore::builtin();
        assert_eq!(store.resolve("nonexistent").name(), DEFAULT_PROFILE);
        assert_eq!(store.resolve("bass-heavy").name(), "bass-heavy");
    }

    #[test]
    fn custom_profiles_extend_and_override() {
        let config: BTreeMap<String, ProfileConfig> = toml::from_str(
            r#"
            [vocal]
            bands = [{ low_hz = 1000.0, target = 6.0 }]

            [default]
            bands = [{ low_hz = 100.0, target = 1.0 }]
            "#,
        )
        .unwrap();

        let store = ProfileStore::with_custom(&config).unwrap();
        assert!(store.names().contains(&"vocal"));
        assert_eq!(store.default_profile().targets().len(), 1);
        assert_eq!(store.get("bass-heavy").unwrap().targets().len(), 3);
    }

    #[test]
    fn rejects_negative_targets() {
        let err = Profile::new("bad", [(100.0, -1.0)]).unwrap_err();
        assert!(matches!(err, MasteringError::Configuration(_)));
    }
}
