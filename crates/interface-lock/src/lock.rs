use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::constants::{LockKey, LOCK_TOLERANCE, TARGET_RADIAL_CLEARANCE, TARGET_SLOT_DEPTH};
use crate::expr::{self, ExprError};
use crate::geometry::FitGeometry;

/// Prefix shared by every locked constant name in a constants source.
const NAME_PREFIX: &str = "REFERENCE_";

/// One mismatch between expected and observed values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockDelta {
    pub name: String,
    pub expected: f64,
    pub observed: f64,
    pub delta: f64,
}

impl fmt::Display for LockDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: expected {} observed {} (delta {:+})",
            self.name, self.expected, self.observed, self.delta
        )
    }
}

/// The published interface contract has drifted. Fatal for the run.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("interface lock violated: {}", list_deltas(.violations))]
pub struct LockViolationError {
    pub violations: Vec<LockDelta>,
}

fn list_deltas(deltas: &[LockDelta]) -> String {
    deltas
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, thiserror::Error)]
pub enum LockLoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Expression(#[from] ExprError),

    #[error("could not resolve constants: {}", .0.join(", "))]
    Unresolved(Vec<String>),

    #[error("missing required constants: {}", .0.join(", "))]
    Missing(Vec<String>),
}

/// Frozen mating-interface constants.
///
/// There are no setters: the only way to obtain different values is to
/// load a different source, and [`assert_invariants`](Self::assert_invariants)
/// rejects any source that disagrees with the canonical contract.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterfaceLock {
    values: BTreeMap<LockKey, f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<PathBuf>,
}

impl InterfaceLock {
    /// The canonical contract itself.
    pub fn canonical() -> Self {
        Self {
            values: LockKey::ALL.into_iter().map(|k| (k, k.canonical())).collect(),
            source: None,
        }
    }

    /// Build from named values. Every locked name must be present; unrelated
    /// names are ignored.
    pub fn from_named(named: &BTreeMap<String, f64>) -> Result<Self, LockLoadError> {
        let mut values = BTreeMap::new();
        let mut missing = Vec::new();
        for key in LockKey::ALL {
            match named.get(key.name()) {
                Some(&v) => {
                    values.insert(key, v);
                }
                None => missing.push(key.name().to_string()),
            }
        }
        if !missing.is_empty() {
            return Err(LockLoadError::Missing(missing));
        }
        Ok(Self {
            values,
            source: None,
        })
    }

    /// Parse a `NAME = expression;` constants source.
    pub fn parse_source(text: &str) -> Result<Self, LockLoadError> {
        let pending = expr::assignments(text)
            .into_iter()
            .filter(|(name, _)| name.starts_with(NAME_PREFIX))
            .collect();
        let (known, unresolved) = expr::resolve(pending)?;
        if !unresolved.is_empty() {
            return Err(LockLoadError::Unresolved(unresolved));
        }
        Self::from_named(&known)
    }

    /// Load from a constants source or, for `.json` files, a flat object of
    /// name → number.
    pub fn load(path: &Path) -> Result<Self, LockLoadError> {
        let text = std::fs::read_to_string(path).map_err(|source| LockLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut lock = if path.extension().is_some_and(|e| e == "json") {
            let named: BTreeMap<String, f64> =
                serde_json::from_str(&text).map_err(|source| LockLoadError::Json {
                    path: path.to_path_buf(),
                    source,
                })?;
            Self::from_named(&named)?
        } else {
            Self::parse_source(&text)?
        };
        lock.source = Some(path.to_path_buf());
        info!(path = %path.display(), "loaded interface lock");
        Ok(lock)
    }

    pub fn get(&self, key: LockKey) -> f64 {
        self.values.get(&key).copied().unwrap_or(f64::NAN)
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Values keyed by their source names.
    pub fn named_values(&self) -> BTreeMap<String, f64> {
        self.values
            .iter()
            .map(|(k, v)| (k.name().to_string(), *v))
            .collect()
    }

    /// Re-derive every expected value and compare against the live ones.
    ///
    /// Checks each constant against its canonical value, then the derived
    /// targets: depth-to-seat, radial clearance (strictly positive) and
    /// positive diameters. All mismatches are reported together.
    #[instrument(skip(self))]
    pub fn assert_invariants(&self) -> Result<(), LockViolationError> {
        let mut violations = Vec::new();
        let mut check = |name: &str, expected: f64, observed: f64| {
            let delta = observed - expected;
            if !(delta.abs() <= LOCK_TOLERANCE) {
                violations.push(LockDelta {
                    name: name.to_string(),
                    expected,
                    observed,
                    delta,
                });
            }
        };

        for key in LockKey::ALL {
            check(key.name(), key.canonical(), self.get(key));
        }

        let depth = self.get(LockKey::SlotEntryZ) - self.get(LockKey::PivotZ);
        check("derived:slot_depth", TARGET_SLOT_DEPTH, depth);

        let clearance = (self.get(LockKey::SlotDiameter) - self.get(LockKey::BallDiameter)) / 2.0;
        check("derived:radial_clearance", TARGET_RADIAL_CLEARANCE, clearance);

        let mut positive = |name: &str, observed: f64| {
            if !(observed > 0.0) {
                violations.push(LockDelta {
                    name: name.to_string(),
                    expected: f64::MIN_POSITIVE,
                    observed,
                    delta: observed,
                });
            }
        };
        positive("derived:radial_clearance_positive", clearance);
        positive(LockKey::SlotDiameter.name(), self.get(LockKey::SlotDiameter));
        positive(LockKey::BallDiameter.name(), self.get(LockKey::BallDiameter));

        if violations.is_empty() {
            info!("interface lock invariants hold");
            Ok(())
        } else {
            warn!(count = violations.len(), "interface lock violated");
            Err(LockViolationError { violations })
        }
    }

    /// Model-space fit geometry derived from the locked values.
    pub fn fit_geometry(&self) -> FitGeometry {
        FitGeometry::from_lock(self)
    }

    /// Stable identity of the locked values, for report provenance.
    pub fn fingerprint(&self) -> String {
        fit_types::canonical_hash(&self.named_values()).unwrap_or_default()
    }
}
