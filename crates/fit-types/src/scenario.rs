use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::canonical::canonical_hash;

/// A single parameter override value.
///
/// Only scalar values are accepted; the generator formats them into its own
/// parameter syntax.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl ParamValue {
    /// Numeric view of the value. Booleans map to 0.0 / 1.0.
    pub fn as_f64(&self) -> f64 {
        match *self {
            ParamValue::Bool(b) => {
                if b {
                    1.0
                } else {
                    0.0
                }
            }
            ParamValue::Int(i) => i as f64,
            ParamValue::Float(f) => f,
        }
    }

    pub fn as_bool(&self) -> bool {
        match *self {
            ParamValue::Bool(b) => b,
            ParamValue::Int(i) => i != 0,
            ParamValue::Float(f) => f != 0.0,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{b}"),
            ParamValue::Int(i) => write!(f, "{i}"),
            ParamValue::Float(v) => {
                // Eight decimals, trailing zeros trimmed: 1.50000000 -> 1.5
                let text = format!("{v:.8}");
                let text = text.trim_end_matches('0').trim_end_matches('.');
                write!(f, "{text}")
            }
        }
    }
}

/// Which physical part a mesh represents within a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartKind {
    /// The parametric part under validation. Regenerated per scenario.
    Body,
    /// The movable mating frame that swings about the pivot axis. Shared.
    Frame,
    /// The reference plug carrying the mating sphere. Shared.
    Plug,
}

impl PartKind {
    /// Shared parts do not depend on scenario overrides and are exported once.
    pub fn is_shared(&self) -> bool {
        !matches!(self, PartKind::Body)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PartKind::Body => "body",
            PartKind::Frame => "frame",
            PartKind::Plug => "plug",
        }
    }
}

impl fmt::Display for PartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One concrete combination of a preset and optional overrides.
///
/// Immutable once built; its content hash is the cache key for the
/// scenario's exported geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSpec {
    preset: String,
    overrides: BTreeMap<String, ParamValue>,
    perturbation: Option<String>,
}

impl ScenarioSpec {
    /// The unperturbed scenario for a preset.
    pub fn neutral(preset: impl Into<String>) -> Self {
        Self {
            preset: preset.into(),
            overrides: BTreeMap::new(),
            perturbation: None,
        }
    }

    /// A named perturbation of a preset.
    pub fn perturbed(
        preset: impl Into<String>,
        tag: impl Into<String>,
        overrides: BTreeMap<String, ParamValue>,
    ) -> Self {
        Self {
            preset: preset.into(),
            overrides,
            perturbation: Some(tag.into()),
        }
    }

    /// Copy with one extra override. The perturbation tag is kept.
    pub fn with_override(mut self, name: impl Into<String>, value: ParamValue) -> Self {
        self.overrides.insert(name.into(), value);
        self
    }

    pub fn preset(&self) -> &str {
        &self.preset
    }

    pub fn overrides(&self) -> &BTreeMap<String, ParamValue> {
        &self.overrides
    }

    pub fn perturbation(&self) -> Option<&str> {
        self.perturbation.as_deref()
    }

    pub fn is_neutral(&self) -> bool {
        self.perturbation.is_none() && self.overrides.is_empty()
    }

    /// Stable, human-readable identifier: `preset:neutral` or `preset:perturb:tag`.
    pub fn id(&self) -> String {
        match (&self.perturbation, self.overrides.is_empty()) {
            (Some(tag), _) => format!("{}:perturb:{}", self.preset, tag),
            (None, true) => format!("{}:neutral", self.preset),
            (None, false) => format!("{}:custom", self.preset),
        }
    }

    /// BLAKE3 hex digest over the canonical JSON encoding.
    pub fn content_hash(&self) -> String {
        // BTreeMap + plain scalars always serialize.
        canonical_hash(self).unwrap_or_default()
    }
}

impl fmt::Display for ScenarioSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}
