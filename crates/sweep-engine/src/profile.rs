//! Sweep profiles and the scenario matrix they expand to.
//!
//! ```json
//! { "profiles": { "full": { "presets": ["default"],
//!     "perturbations": [{ "name": "shallow", "overrides": { "cavity_depth_mm": 30.0 } }] } } }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use fit_types::{ParamValue, ScenarioSpec};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::error::SweepError;

pub const FULL: &str = "full";
pub const QUICK: &str = "quick";

/// Profile to use: an explicit name wins, otherwise `quick` or `full`.
pub fn profile_name(explicit: Option<&str>, quick: bool) -> &str {
    match explicit {
        Some(name) => name,
        None if quick => QUICK,
        None => FULL,
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    profiles: BTreeMap<String, RawProfile>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawProfile {
    presets: Vec<String>,
    #[serde(default)]
    perturbations: Vec<RawPerturbation>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPerturbation {
    name: String,
    overrides: BTreeMap<String, Value>,
}

/// A named, bounded parameter change applied to every preset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Perturbation {
    pub name: String,
    pub overrides: BTreeMap<String, ParamValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepProfile {
    pub name: String,
    pub presets: Vec<String>,
    pub perturbations: Vec<Perturbation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
}

impl SweepProfile {
    /// A profile with no perturbations.
    pub fn neutral_only(name: impl Into<String>, presets: Vec<String>) -> Result<Self, SweepError> {
        let name = name.into();
        let presets = clean_presets(&name, presets)?;
        Ok(Self {
            name,
            presets,
            perturbations: Vec::new(),
            source: None,
        })
    }

    /// Same perturbations over a different preset list.
    pub fn with_presets(mut self, presets: Vec<String>) -> Result<Self, SweepError> {
        self.presets = clean_presets(&self.name, presets)?;
        Ok(self)
    }

    /// Presets × (neutral, then each perturbation in file order).
    pub fn scenarios(&self) -> Vec<ScenarioSpec> {
        self.presets
            .iter()
            .flat_map(|preset| {
                std::iter::once(ScenarioSpec::neutral(preset.clone())).chain(
                    self.perturbations.iter().map(move |p| {
                        ScenarioSpec::perturbed(preset.clone(), p.name.clone(), p.overrides.clone())
                    }),
                )
            })
            .collect()
    }
}

fn profile_error(profile: &str, reason: impl Into<String>) -> SweepError {
    SweepError::Profile {
        profile: profile.to_string(),
        reason: reason.into(),
    }
}

fn clean_presets(profile: &str, presets: Vec<String>) -> Result<Vec<String>, SweepError> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::with_capacity(presets.len());
    for preset in presets {
        let preset = preset.trim().to_string();
        if preset.is_empty() {
            return Err(profile_error(profile, "preset names must not be empty"));
        }
        if !seen.insert(preset.clone()) {
            return Err(profile_error(profile, format!("preset `{preset}` listed twice")));
        }
        out.push(preset);
    }
    if out.is_empty() {
        return Err(profile_error(profile, "at least one preset is required"));
    }
    Ok(out)
}

fn scalar(profile: &str, perturbation: &str, key: &str, value: &Value) -> Result<ParamValue, SweepError> {
    let converted = match value {
        Value::Bool(b) => Some(ParamValue::Bool(*b)),
        Value::Number(n) => n
            .as_i64()
            .map(ParamValue::Int)
            .or_else(|| n.as_f64().map(ParamValue::Float)),
        _ => None,
    };
    converted.ok_or_else(|| {
        profile_error(
            profile,
            format!("perturbation `{perturbation}` override `{key}` must be bool/int/float, got {value}"),
        )
    })
}

fn normalize(name: &str, raw: RawProfile) -> Result<SweepProfile, SweepError> {
    let presets = clean_presets(name, raw.presets)?;
    let mut names = BTreeSet::new();
    let mut perturbations = Vec::with_capacity(raw.perturbations.len());
    for entry in raw.perturbations {
        let tag = entry.name.trim().to_string();
        if tag.is_empty() {
            return Err(profile_error(name, "perturbation without a name"));
        }
        if !names.insert(tag.clone()) {
            return Err(profile_error(name, format!("perturbation `{tag}` defined twice")));
        }
        if entry.overrides.is_empty() {
            return Err(profile_error(name, format!("perturbation `{tag}` has no overrides")));
        }
        let mut overrides = BTreeMap::new();
        for (key, value) in &entry.overrides {
            if key.trim().is_empty() {
                return Err(profile_error(name, format!("perturbation `{tag}` has an empty override key")));
            }
            overrides.insert(key.trim().to_string(), scalar(name, &tag, key, value)?);
        }
        perturbations.push(Perturbation { name: tag, overrides });
    }
    Ok(SweepProfile {
        name: name.to_string(),
        presets,
        perturbations,
        source: None,
    })
}

/// Every profile in a sweep config file, validated on load.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepConfig {
    profiles: BTreeMap<String, SweepProfile>,
}

impl SweepConfig {
    /// Parse and validate. Any invalid profile fails the whole file.
    pub fn parse(text: &str, path: &Path) -> Result<Self, SweepError> {
        let raw: RawConfig = serde_json::from_str(text).map_err(|source| SweepError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        let mut profiles = BTreeMap::new();
        for (name, profile) in raw.profiles {
            let mut profile = normalize(&name, profile)?;
            profile.source = Some(path.to_path_buf());
            profiles.insert(name, profile);
        }
        Ok(Self { profiles })
    }

    pub fn load(path: &Path) -> Result<Self, SweepError> {
        let text = std::fs::read_to_string(path).map_err(|source| SweepError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&text, path)?;
        info!(path = %path.display(), profiles = config.profiles.len(), "loaded sweep config");
        Ok(config)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    pub fn profile(&self, name: &str) -> Result<SweepProfile, SweepError> {
        self.profiles
            .get(name)
            .cloned()
            .ok_or_else(|| SweepError::UnknownProfile(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"{
        "profiles": {
            "full": {
                "presets": ["default", " wide_trench "],
                "perturbations": [
                    { "name": "shallow", "overrides": { "cavity_depth_mm": 30.5 } },
                    { "name": "shifted", "overrides": { "bore_offset_x_mm": 0, "omit_bottom": false } }
                ]
            },
            "quick": { "presets": ["default"] }
        }
    }"#;

    fn parse(text: &str) -> Result<SweepConfig, SweepError> {
        SweepConfig::parse(text, Path::new("sweep_config.json"))
    }

    #[test]
    fn matrix_is_presets_times_variants_in_order() {
        let profile = parse(CONFIG).unwrap().profile(FULL).unwrap();
        let ids: Vec<String> = profile.scenarios().iter().map(ScenarioSpec::id).collect();
        assert_eq!(
            ids,
            vec![
                "default:neutral",
                "default:perturb:shallow",
                "default:perturb:shifted",
                "wide_trench:neutral",
                "wide_trench:perturb:shallow",
                "wide_trench:perturb:shifted",
            ]
        );
        let shifted = &profile.perturbations[1].overrides;
        assert_eq!(shifted["bore_offset_x_mm"], ParamValue::Int(0));
        assert_eq!(shifted["omit_bottom"], ParamValue::Bool(false));
    }

    #[test]
    fn profile_selection() {
        assert_eq!(profile_name(None, false), FULL);
        assert_eq!(profile_name(None, true), QUICK);
        assert_eq!(profile_name(Some("nightly"), true), "nightly");

        let config = parse(CONFIG).unwrap();
        assert_eq!(config.names().collect::<Vec<_>>(), vec!["full", "quick"]);
        assert!(matches!(config.profile("nightly"), Err(SweepError::UnknownProfile(_))));

        let narrowed = config
            .profile(FULL)
            .unwrap()
            .with_presets(vec!["deep_floor".into()])
            .unwrap();
        assert_eq!(narrowed.scenarios().len(), 3);
        assert!(config.profile(QUICK).unwrap().with_presets(vec![" ".into()]).is_err());
    }

    #[test]
    fn rejects_non_scalar_overrides() {
        let text = CONFIG.replace("30.5", "\"deep\"");
        let err = parse(&text).unwrap_err();
        assert!(err.to_string().contains("must be bool/int/float"), "{err}");
    }

    #[test]
    fn rejects_empty_lists_and_maps() {
        let empty_presets = r#"{ "profiles": { "full": { "presets": [] } } }"#;
        assert!(matches!(parse(empty_presets), Err(SweepError::Profile { .. })));

        let empty_overrides =
            r#"{ "profiles": { "full": { "presets": ["a"], "perturbations": [{ "name": "x", "overrides": {} }] } } }"#;
        assert!(matches!(parse(empty_overrides), Err(SweepError::Profile { .. })));

        let duplicate = r#"{ "profiles": { "full": { "presets": ["a", "a"] } } }"#;
        assert!(matches!(parse(duplicate), Err(SweepError::Profile { .. })));
    }

    #[test]
    fn unknown_fields_are_json_errors() {
        let text = r#"{ "profiles": { "full": { "presets": ["a"], "preset": "b" } } }"#;
        assert!(matches!(parse(text), Err(SweepError::Json { .. })));
    }
}
