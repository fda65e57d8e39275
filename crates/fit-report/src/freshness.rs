//! Freshness contract for consumers that read a report instead of
//! regenerating it.
//!
//! A report is trusted only if it was produced for the same source root
//! and its inputs still hash to the recorded value. Anything else makes
//! the advisory verdict UNKNOWN, never PASS or FAIL.

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::ReportError;

fn collect_files(path: &Path, out: &mut Vec<PathBuf>) -> Result<(), ReportError> {
    if path.is_file() {
        out.push(path.to_path_buf());
        return Ok(());
    }
    let mut children: Vec<PathBuf> = fs::read_dir(path)
        .map_err(|e| ReportError::io(path, e))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<_, _>>()
        .map_err(|e| ReportError::io(path, e))?;
    children.sort();
    for child in children {
        collect_files(&child, out)?;
    }
    Ok(())
}

/// BLAKE3 over every input file, keyed by its path relative to `root`.
///
/// Directories are walked recursively in sorted order. A missing entry
/// hashes as a marker, so creating or deleting an input changes the hash.
pub fn inputs_hash(root: &Path, inputs: &[PathBuf]) -> Result<String, ReportError> {
    let mut entries = inputs.to_vec();
    entries.sort();
    entries.dedup();

    let mut hasher = blake3::Hasher::new();
    for entry in &entries {
        let path = root.join(entry);
        if !path.exists() {
            hasher.update(b"missing\0");
            hasher.update(entry.to_string_lossy().as_bytes());
            hasher.update(b"\0");
            continue;
        }
        let mut files = Vec::new();
        collect_files(&path, &mut files)?;
        for file in files {
            let relative = file.strip_prefix(root).unwrap_or(&file);
            let bytes = fs::read(&file).map_err(|e| ReportError::io(&file, e))?;
            hasher.update(b"file\0");
            hasher.update(relative.to_string_lossy().as_bytes());
            hasher.update(b"\0");
            hasher.update(blake3::hash(&bytes).as_bytes());
        }
    }
    Ok(hasher.finalize().to_hex().to_string())
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeaderProvenance {
    pub source_root: PathBuf,
    pub inputs: Vec<PathBuf>,
    pub inputs_hash: String,
}

/// The fields a consumer needs; everything else in the report is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportHeader {
    pub schema_version: String,
    pub run_id: String,
    pub overall_pass: bool,
    pub provenance: HeaderProvenance,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale { recorded: String, current: String },
    ForeignRoot { recorded: PathBuf, current: PathBuf },
    Unreadable(String),
}

impl fmt::Display for Freshness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Freshness::Fresh => f.write_str("fresh"),
            Freshness::Stale { recorded, current } => {
                write!(f, "stale (inputs {recorded:.12} now {current:.12})")
            }
            Freshness::ForeignRoot { recorded, current } => write!(
                f,
                "foreign root (report for {}, checking {})",
                recorded.display(),
                current.display()
            ),
            Freshness::Unreadable(reason) => write!(f, "unreadable ({reason})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvisoryVerdict {
    Pass,
    Fail,
    Unknown,
}

impl fmt::Display for AdvisoryVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AdvisoryVerdict::Pass => "PASS",
            AdvisoryVerdict::Fail => "FAIL",
            AdvisoryVerdict::Unknown => "UNKNOWN",
        })
    }
}

fn same_root(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn read_header(report: &Path) -> Result<ReportHeader, String> {
    let text = match fs::read_to_string(report) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Err("report not found".to_string()),
        Err(e) => return Err(e.to_string()),
    };
    let header: ReportHeader = serde_json::from_str(&text).map_err(|e| e.to_string())?;
    if header.schema_version != crate::report::SCHEMA_VERSION {
        return Err(format!("unsupported schema {}", header.schema_version));
    }
    Ok(header)
}

/// Judge a stored report against the tree at `root`.
pub fn check_report(report: &Path, root: &Path) -> (Freshness, AdvisoryVerdict) {
    let header = match read_header(report) {
        Ok(header) => header,
        Err(reason) => {
            warn!(path = %report.display(), %reason, "report unreadable");
            return (Freshness::Unreadable(reason), AdvisoryVerdict::Unknown);
        }
    };
    let recorded_root = &header.provenance.source_root;
    if !same_root(recorded_root, root) {
        return (
            Freshness::ForeignRoot {
                recorded: recorded_root.clone(),
                current: root.to_path_buf(),
            },
            AdvisoryVerdict::Unknown,
        );
    }
    let current = match inputs_hash(root, &header.provenance.inputs) {
        Ok(hash) => hash,
        Err(e) => return (Freshness::Unreadable(e.to_string()), AdvisoryVerdict::Unknown),
    };
    if current != header.provenance.inputs_hash {
        return (
            Freshness::Stale {
                recorded: header.provenance.inputs_hash,
                current,
            },
            AdvisoryVerdict::Unknown,
        );
    }
    debug!(run_id = %header.run_id, "report is fresh");
    let verdict = if header.overall_pass {
        AdvisoryVerdict::Pass
    } else {
        AdvisoryVerdict::Fail
    };
    (Freshness::Fresh, verdict)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("fitgate/src")).unwrap();
        fs::write(dir.path().join("fitgate/interface_lock.json"), "{}").unwrap();
        fs::write(dir.path().join("fitgate/src/body.scad"), "cube(1);").unwrap();
        dir
    }

    fn inputs() -> Vec<PathBuf> {
        vec![
            PathBuf::from("fitgate/src"),
            PathBuf::from("fitgate/interface_lock.json"),
            PathBuf::from("fitgate/golden_signatures.json"),
        ]
    }

    #[test]
    fn hash_tracks_content_and_membership() {
        let dir = project();
        let root = dir.path();
        let base = inputs_hash(root, &inputs()).unwrap();

        let mut reversed = inputs();
        reversed.reverse();
        assert_eq!(inputs_hash(root, &reversed).unwrap(), base);

        fs::write(root.join("fitgate/src/body.scad"), "cube(2);").unwrap();
        let edited = inputs_hash(root, &inputs()).unwrap();
        assert_ne!(edited, base);

        fs::write(root.join("fitgate/src/extra.scad"), "").unwrap();
        let added = inputs_hash(root, &inputs()).unwrap();
        assert_ne!(added, edited);

        fs::write(root.join("fitgate/golden_signatures.json"), "{}").unwrap();
        assert_ne!(inputs_hash(root, &inputs()).unwrap(), added);
    }

    fn write_report(dir: &Path, root: &Path, hash: &str, pass: bool) -> PathBuf {
        let path = dir.join("report.json");
        let report = serde_json::json!({
            "schema_version": "1.0",
            "run_id": "r1",
            "overall_pass": pass,
            "scenarios": [],
            "provenance": {
                "source_root": root,
                "inputs": inputs(),
                "inputs_hash": hash,
            }
        });
        fs::write(&path, report.to_string()).unwrap();
        path
    }

    #[test]
    fn fresh_report_yields_its_verdict() {
        let dir = project();
        let hash = inputs_hash(dir.path(), &inputs()).unwrap();
        let report = write_report(dir.path(), dir.path(), &hash, false);
        assert_eq!(
            check_report(&report, dir.path()),
            (Freshness::Fresh, AdvisoryVerdict::Fail)
        );
    }

    #[test]
    fn edited_inputs_make_it_unknown() {
        let dir = project();
        let hash = inputs_hash(dir.path(), &inputs()).unwrap();
        let report = write_report(dir.path(), dir.path(), &hash, true);
        fs::write(dir.path().join("fitgate/interface_lock.json"), "{ }").unwrap();
        let (freshness, verdict) = check_report(&report, dir.path());
        assert!(matches!(freshness, Freshness::Stale { .. }));
        assert_eq!(verdict, AdvisoryVerdict::Unknown);
    }

    #[test]
    fn foreign_root_and_garbage_are_unknown() {
        let dir = project();
        let other = project();
        let hash = inputs_hash(dir.path(), &inputs()).unwrap();
        let report = write_report(dir.path(), other.path(), &hash, true);
        let (freshness, verdict) = check_report(&report, dir.path());
        assert!(matches!(freshness, Freshness::ForeignRoot { .. }));
        assert_eq!(verdict, AdvisoryVerdict::Unknown);

        fs::write(&report, "not json").unwrap();
        assert!(matches!(check_report(&report, dir.path()).0, Freshness::Unreadable(_)));
        assert!(matches!(
            check_report(&dir.path().join("missing.json"), dir.path()).0,
            Freshness::Unreadable(_)
        ));
    }
}
