//! Content-addressed export cache.
//!
//! An artifact's key is the BLAKE3 hash of the part, the scenario content
//! hash (or `shared`) and the generator fingerprint, so a changed source
//! tree or override set can never be served a stale mesh.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use fit_types::{PartKind, ScenarioSpec};
use mesh_query::MeshHandle;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::ExportError;
use crate::generator::{ExportRequest, GeometryGenerator};

/// One export as seen by the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRecord {
    pub part: PartKind,
    pub scenario_id: String,
    pub key: String,
    pub path: PathBuf,
    pub cache_hit: bool,
    pub duration_ms: u64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct ExportCache {
    root: PathBuf,
    generator: Arc<dyn GeometryGenerator>,
    fingerprint: String,
    retain_scenario_meshes: bool,
    loaded: Mutex<HashMap<String, MeshHandle>>,
    // Serializes shared-part exports so each is generated once per run.
    shared_gate: Mutex<()>,
    records: Mutex<Vec<ExportRecord>>,
}

impl std::fmt::Debug for ExportCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportCache")
            .field("root", &self.root)
            .field("fingerprint", &self.fingerprint)
            .field("retain_scenario_meshes", &self.retain_scenario_meshes)
            .finish_non_exhaustive()
    }
}

impl ExportCache {
    /// Creates `root` if needed.
    pub fn new(root: impl Into<PathBuf>, generator: Arc<dyn GeometryGenerator>) -> Result<Self, ExportError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| ExportError::io(&root, e))?;
        let fingerprint = generator.fingerprint();
        Ok(Self {
            root,
            generator,
            fingerprint,
            retain_scenario_meshes: false,
            loaded: Mutex::new(HashMap::new()),
            shared_gate: Mutex::new(()),
            records: Mutex::new(Vec::new()),
        })
    }

    /// Keep per-scenario meshes in memory after they are loaded.
    pub fn retain_scenario_meshes(mut self, retain: bool) -> Self {
        self.retain_scenario_meshes = retain;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn key(&self, request: &ExportRequest) -> String {
        let scenario = request.scenario_key();
        fit_types::hash_parts([request.part.as_str(), scenario.as_str(), self.fingerprint.as_str()])
    }

    pub fn artifact_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.stl"))
    }

    pub fn has_preset(&self, preset: &str) -> bool {
        self.generator.has_preset(preset)
    }

    /// Mesh for `part` under `scenario`, exporting it if no artifact exists.
    pub fn export(&self, part: PartKind, scenario: &ScenarioSpec) -> Result<MeshHandle, ExportError> {
        self.fetch(&ExportRequest::new(part, scenario))
    }

    pub fn export_shared(&self, part: PartKind) -> Result<MeshHandle, ExportError> {
        self.fetch(&ExportRequest::shared(part))
    }

    #[instrument(skip(self), fields(part = %request.part, scenario = %request.scenario_id()))]
    fn fetch(&self, request: &ExportRequest) -> Result<MeshHandle, ExportError> {
        let key = self.key(request);
        let shared = request.scenario.is_none();
        let _gate = shared.then(|| lock(&self.shared_gate));

        if let Some(handle) = lock(&self.loaded).get(&key) {
            return Ok(handle.clone());
        }

        let started = Instant::now();
        let path = self.artifact_path(&key);
        let cache_hit = fs::metadata(&path).map(|m| m.len() > 0).unwrap_or(false);
        if cache_hit {
            debug!(%key, "reusing cached artifact");
        } else {
            let partial = self.root.join(format!("{key}.partial.stl"));
            self.generator.generate(request, &partial)?;
            fs::rename(&partial, &path).map_err(|e| ExportError::io(&path, e))?;
        }

        let label = format!("{}@{}", request.part, request.scenario_id());
        let handle = MeshHandle::load_stl(&path, label)?;
        let duration_ms = started.elapsed().as_millis() as u64;
        info!(%key, cache_hit, duration_ms, triangles = handle.triangle_count(), "export ready");

        if shared || self.retain_scenario_meshes {
            lock(&self.loaded).insert(key.clone(), handle.clone());
        }
        lock(&self.records).push(ExportRecord {
            part: request.part,
            scenario_id: request.scenario_id(),
            key,
            path,
            cache_hit,
            duration_ms,
        });
        Ok(handle)
    }

    /// Export records so far, ordered by part then scenario.
    pub fn records(&self) -> Vec<ExportRecord> {
        let mut records = lock(&self.records).clone();
        records.sort_by(|a, b| (a.part, &a.scenario_id).cmp(&(b.part, &b.scenario_id)));
        records
    }

    /// Number of meshes currently held in memory.
    pub fn loaded_count(&self) -> usize {
        lock(&self.loaded).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procedural::ProceduralGenerator;
    use fit_types::ParamValue;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts generate calls.
    struct Counting {
        inner: ProceduralGenerator,
        calls: AtomicUsize,
    }

    impl GeometryGenerator for Counting {
        fn fingerprint(&self) -> String {
            self.inner.fingerprint()
        }

        fn generate(&self, request: &ExportRequest, output: &Path) -> Result<(), ExportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.generate(request, output)
        }
    }

    fn counting() -> Arc<Counting> {
        Arc::new(Counting {
            inner: ProceduralGenerator::new(),
            calls: AtomicUsize::new(0),
        })
    }

    #[test]
    fn artifact_reused_across_cache_instances() {
        let dir = tempfile::tempdir().unwrap();
        let generator = counting();
        let scenario = ScenarioSpec::neutral("default");

        let first = ExportCache::new(dir.path(), generator.clone()).unwrap();
        first.export(PartKind::Body, &scenario).unwrap();
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
        assert!(!first.records()[0].cache_hit);

        let second = ExportCache::new(dir.path(), generator.clone()).unwrap();
        second.export(PartKind::Body, &scenario).unwrap();
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
        assert!(second.records()[0].cache_hit);
    }

    #[test]
    fn shared_parts_stay_loaded_scenario_parts_do_not() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ExportCache::new(dir.path(), counting()).unwrap();
        let a = cache.export_shared(PartKind::Frame).unwrap();
        let b = cache.export(PartKind::Frame, &ScenarioSpec::neutral("deep_floor")).unwrap();
        assert!(a.ptr_eq(&b));
        cache.export(PartKind::Body, &ScenarioSpec::neutral("default")).unwrap();
        assert_eq!(cache.loaded_count(), 1);
        assert_eq!(cache.records().len(), 1 + 1);
    }

    #[test]
    fn retained_scenario_meshes_are_shared() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ExportCache::new(dir.path(), counting())
            .unwrap()
            .retain_scenario_meshes(true);
        let scenario = ScenarioSpec::neutral("default");
        let a = cache.export(PartKind::Body, &scenario).unwrap();
        let b = cache.export(PartKind::Body, &scenario).unwrap();
        assert!(a.ptr_eq(&b));
    }

    #[test]
    fn keys_separate_scenarios_and_parts() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ExportCache::new(dir.path(), counting()).unwrap();
        let neutral = ScenarioSpec::neutral("default");
        let perturbed = neutral.clone().with_override("cavity_depth_mm", ParamValue::Float(31.0));
        let k1 = cache.key(&ExportRequest::new(PartKind::Body, &neutral));
        let k2 = cache.key(&ExportRequest::new(PartKind::Body, &perturbed));
        let k3 = cache.key(&ExportRequest::new(PartKind::Frame, &neutral));
        let k4 = cache.key(&ExportRequest::new(PartKind::Frame, &perturbed));
        assert_ne!(k1, k2);
        assert_ne!(k1, k3);
        assert_eq!(k3, k4);
    }

    #[test]
    fn failed_export_leaves_no_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ExportCache::new(dir.path(), counting()).unwrap();
        let err = cache
            .export(PartKind::Body, &ScenarioSpec::neutral("no_such_preset"))
            .unwrap_err();
        assert!(matches!(err, ExportError::UnknownPreset(_)));
        let leftovers = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.path().extension().is_some_and(|x| x == "stl"))
            .count();
        assert_eq!(leftovers, 0);
        assert!(cache.records().is_empty());
    }
}
