//! Where a project keeps its fit-gate files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use interface_lock::InterfaceLock;
use mesh_export::{CommandConfig, CommandGenerator, GeometryGenerator, ProceduralGenerator};
use sweep_engine::{profile, SweepConfig, SweepProfile};
use tracing::{info, warn};

use crate::error::CliError;

const LOCK_SOURCE: &str = "fitgate/interface_lock.scad";
const LOCK_JSON: &str = "fitgate/interface_lock.json";
const SWEEP_CONFIG: &str = "fitgate/sweep_config.json";
const BASELINE: &str = "fitgate/golden_signatures.json";
const GENERATOR: &str = "fitgate/generator.json";
const CACHE: &str = ".fitgate/cache";

/// Preset swept when the project has no sweep config.
const FALLBACK_PRESET: &str = "default";

#[derive(Debug, Clone)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    /// The root is canonicalized so reports name it unambiguously.
    pub fn open(root: &Path) -> Result<Self, CliError> {
        let root = root.canonicalize().map_err(|source| CliError::ProjectRoot {
            path: root.to_path_buf(),
            source,
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn baseline_path(&self) -> PathBuf {
        self.root.join(BASELINE)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.root.join(CACHE)
    }

    /// The constants source if present, else the JSON form, else the
    /// built-in contract.
    pub fn load_lock(&self) -> Result<InterfaceLock, CliError> {
        for candidate in [LOCK_SOURCE, LOCK_JSON] {
            let path = self.root.join(candidate);
            if path.is_file() {
                return Ok(InterfaceLock::load(&path)?);
            }
        }
        warn!(root = %self.root.display(), "no interface lock file, using the built-in contract");
        Ok(InterfaceLock::canonical())
    }

    /// Named profile from the sweep config, or a neutral-only profile when
    /// the project has none. `presets`, when non-empty, replaces the list.
    pub fn sweep_profile(
        &self,
        explicit: Option<&str>,
        quick: bool,
        presets: &[String],
    ) -> Result<SweepProfile, CliError> {
        let name = profile::profile_name(explicit, quick);
        let path = self.root.join(SWEEP_CONFIG);
        let selected = if path.is_file() {
            SweepConfig::load(&path)?.profile(name)?
        } else {
            info!(profile = name, "no sweep config, sweeping neutral scenarios only");
            SweepProfile::neutral_only(name, vec![FALLBACK_PRESET.to_string()])?
        };
        if presets.is_empty() {
            Ok(selected)
        } else {
            Ok(selected.with_presets(presets.to_vec())?)
        }
    }

    /// Generator plus a short description for provenance.
    pub fn generator(
        &self,
        procedural: bool,
    ) -> Result<(Arc<dyn GeometryGenerator>, String, Vec<PathBuf>), CliError> {
        if procedural {
            return Ok((Arc::new(ProceduralGenerator::new()), "procedural".to_string(), Vec::new()));
        }
        let config = CommandConfig::load(&self.root.join(GENERATOR))?;
        let description = format!("command:{}", config.program);
        let sources = config.sources.clone();
        let generator = CommandGenerator::new(config, self.root.clone())?;
        Ok((Arc::new(generator), description, sources))
    }

    /// Every file the report's freshness hash covers, relative to the root.
    pub fn inputs(&self, generator_sources: &[PathBuf]) -> Vec<PathBuf> {
        let mut inputs: Vec<PathBuf> = [LOCK_SOURCE, LOCK_JSON, SWEEP_CONFIG, BASELINE, GENERATOR]
            .into_iter()
            .map(PathBuf::from)
            .collect();
        inputs.extend(generator_sources.iter().cloned());
        inputs.sort();
        inputs.dedup();
        inputs
    }
}
