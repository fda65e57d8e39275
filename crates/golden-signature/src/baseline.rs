//! The committed baseline file and the exclusive commit operation.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::error::SignatureError;
use crate::metrics::{self, Signature};

pub const SCHEMA_VERSION: &str = "1.0";

/// One metric's committed value and the band around it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricBaseline {
    pub baseline: f64,
    pub tolerance: f64,
}

impl MetricBaseline {
    pub fn delta(&self, observed: f64) -> f64 {
        observed - self.baseline
    }

    /// NaN never falls inside the band.
    pub fn admits(&self, observed: f64) -> bool {
        self.delta(observed).abs() <= self.tolerance
    }
}

/// Who committed the baseline and against which sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub committed_by: String,
    pub source_fingerprint: String,
}

/// Tolerance bands assigned when a baseline is committed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToleranceBands {
    /// Fraction of the value, for volume and area.
    pub relative: f64,
    /// Millimetres, for every length metric.
    pub absolute_mm: f64,
}

impl Default for ToleranceBands {
    fn default() -> Self {
        Self {
            relative: 0.03,
            absolute_mm: 0.5,
        }
    }
}

impl ToleranceBands {
    pub fn tolerance(&self, metric: &str, value: f64) -> f64 {
        if metrics::is_relative(metric) {
            (value.abs() * self.relative.max(0.0)).max(0.1)
        } else {
            self.absolute_mm.abs().max(0.05)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineFile {
    pub schema_version: String,
    pub updated_at: DateTime<Utc>,
    pub provenance: Provenance,
    /// Preset → metric → baseline.
    pub presets: BTreeMap<String, BTreeMap<String, MetricBaseline>>,
}

impl BaselineFile {
    /// Baselines for the given live signatures, banded by `bands`.
    pub fn from_live(
        live: &BTreeMap<String, Signature>,
        bands: ToleranceBands,
        provenance: Provenance,
    ) -> Self {
        let presets = live
            .iter()
            .map(|(preset, signature)| {
                let metrics = signature
                    .iter()
                    .map(|(name, &value)| {
                        let entry = MetricBaseline {
                            baseline: value,
                            tolerance: bands.tolerance(name, value),
                        };
                        (name.clone(), entry)
                    })
                    .collect();
                (preset.clone(), metrics)
            })
            .collect();
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            updated_at: Utc::now(),
            provenance,
            presets,
        }
    }

    /// Read a baseline file. A missing file is `Ok(None)`; unreadable or
    /// malformed content is an error.
    pub fn load(path: &Path) -> Result<Option<Self>, SignatureError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SignatureError::io(path, e)),
        };
        let file: Self = serde_json::from_str(&text).map_err(|source| SignatureError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        if file.schema_version != SCHEMA_VERSION {
            return Err(SignatureError::Schema {
                path: path.to_path_buf(),
                found: file.schema_version,
                expected: SCHEMA_VERSION,
            });
        }
        Ok(Some(file))
    }
}

/// Removes the lock file when the commit finishes, successfully or not.
struct CommitLock {
    path: PathBuf,
}

impl CommitLock {
    fn acquire(target: &Path) -> Result<Self, SignatureError> {
        let path = sibling(target, "lock");
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                // The holder's pid, for whoever finds a stale lock.
                let _ = writeln!(file, "{}", std::process::id());
                Ok(Self { path })
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(SignatureError::Locked { lock: path }),
            Err(e) => Err(SignatureError::io(&path, e)),
        }
    }
}

impl Drop for CommitLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "could not remove baseline lock");
        }
    }
}

fn sibling(target: &Path, suffix: &str) -> PathBuf {
    let mut name = target.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(suffix);
    target.with_file_name(name)
}

/// Replace the baseline file with bands around `live`.
///
/// Holds an exclusive lock file beside the target for the duration and
/// publishes through a rename, so a reader sees either the old file or the
/// new one.
#[instrument(skip(live, provenance), fields(path = %path.display(), presets = live.len()))]
pub fn commit_baseline(
    path: &Path,
    live: &BTreeMap<String, Signature>,
    bands: ToleranceBands,
    provenance: Provenance,
) -> Result<BaselineFile, SignatureError> {
    if live.is_empty() {
        return Err(SignatureError::NothingToCommit);
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| SignatureError::io(parent, e))?;
    }
    let _lock = CommitLock::acquire(path)?;

    let file = BaselineFile::from_live(live, bands, provenance);
    let json = serde_json::to_string_pretty(&file).map_err(|source| SignatureError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let staging = sibling(path, "tmp");
    fs::write(&staging, json).map_err(|e| SignatureError::io(&staging, e))?;
    fs::rename(&staging, path).map_err(|e| SignatureError::io(path, e))?;

    info!(presets = ?file.presets.keys().collect::<Vec<_>>(), "committed golden baseline");
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{FRAME_GAP, VOLUME};

    fn provenance() -> Provenance {
        Provenance {
            committed_by: "test".into(),
            source_fingerprint: "abc".into(),
        }
    }

    fn live() -> BTreeMap<String, Signature> {
        BTreeMap::from([(
            "default".to_string(),
            Signature::from([(VOLUME.to_string(), 1000.0), (FRAME_GAP.to_string(), 0.5)]),
        )])
    }

    #[test]
    fn tolerance_bands() {
        let bands = ToleranceBands::default();
        assert_eq!(bands.tolerance(VOLUME, 1000.0), 30.0);
        assert_eq!(bands.tolerance(VOLUME, 1.0), 0.1);
        assert_eq!(bands.tolerance(FRAME_GAP, 0.5), 0.5);
        let tight = ToleranceBands {
            relative: 0.0,
            absolute_mm: 0.01,
        };
        assert_eq!(tight.tolerance(FRAME_GAP, 0.5), 0.05);
    }

    #[test]
    fn missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(BaselineFile::load(&dir.path().join("none.json")).unwrap().is_none());
    }

    #[test]
    fn commit_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fitgate").join("golden_signatures.json");
        let written = commit_baseline(&path, &live(), ToleranceBands::default(), provenance()).unwrap();
        let read = BaselineFile::load(&path).unwrap().unwrap();
        assert_eq!(read, written);
        assert_eq!(read.presets["default"][VOLUME].tolerance, 30.0);
        assert!(!sibling(&path, "lock").exists());
        assert!(!sibling(&path, "tmp").exists());
    }

    #[test]
    fn held_lock_blocks_commit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("golden.json");
        fs::write(sibling(&path, "lock"), "1").unwrap();
        let err = commit_baseline(&path, &live(), ToleranceBands::default(), provenance()).unwrap_err();
        assert!(matches!(err, SignatureError::Locked { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn empty_commit_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let err = commit_baseline(
            &dir.path().join("g.json"),
            &BTreeMap::new(),
            ToleranceBands::default(),
            provenance(),
        )
        .unwrap_err();
        assert!(matches!(err, SignatureError::NothingToCommit));
    }

    #[test]
    fn foreign_schema_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("g.json");
        let mut file = BaselineFile::from_live(&live(), ToleranceBands::default(), provenance());
        file.schema_version = "0.1".into();
        fs::write(&path, serde_json::to_string(&file).unwrap()).unwrap();
        assert!(matches!(
            BaselineFile::load(&path),
            Err(SignatureError::Schema { .. })
        ));
    }
}
