//! External-command export: a parameter wrapper file plus a CAD program.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use fit_types::PartKind;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::ExportError;
use crate::generator::{ExportRequest, GeometryGenerator};

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const TAIL_LINES: usize = 80;

fn default_args() -> Vec<String> {
    ["--render", "-o", "{output}", "{input}"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_timeout_secs() -> u64 {
    900
}

fn default_preset_extension() -> String {
    "scad".to_string()
}

/// How to produce one part: files to include and the entry call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartEntry {
    /// Included after the preset and overrides, in order.
    #[serde(default)]
    pub includes: Vec<PathBuf>,
    pub call: String,
}

/// Contents of `generator.json`. Relative paths resolve against the
/// project root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandConfig {
    pub program: String,
    /// Arguments; `{input}` and `{output}` are substituted.
    #[serde(default = "default_args")]
    pub args: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Directory holding `<preset>.<preset_extension>` files.
    pub preset_dir: PathBuf,
    #[serde(default = "default_preset_extension")]
    pub preset_extension: String,
    pub parts: BTreeMap<PartKind, PartEntry>,
    /// Files and directories whose contents make up the fingerprint.
    #[serde(default)]
    pub sources: Vec<PathBuf>,
}

impl CommandConfig {
    pub fn load(path: &Path) -> Result<Self, ExportError> {
        let text = fs::read_to_string(path).map_err(|e| ExportError::io(path, e))?;
        serde_json::from_str(&text).map_err(|e| {
            ExportError::InvalidRequest(format!("{}: {e}", path.display()))
        })
    }
}

/// Runs a configured program against a generated wrapper file.
#[derive(Debug, Clone)]
pub struct CommandGenerator {
    config: CommandConfig,
    root: PathBuf,
    timeout: Duration,
    fingerprint: String,
}

impl CommandGenerator {
    /// Fingerprints the configured sources immediately; a missing source is
    /// an error.
    pub fn new(config: CommandConfig, root: impl Into<PathBuf>) -> Result<Self, ExportError> {
        let root = root.into();
        let fingerprint = fingerprint_sources(&config, &root)?;
        info!(program = %config.program, %fingerprint, "command generator ready");
        Ok(Self {
            timeout: Duration::from_secs(config.timeout_secs),
            config,
            root,
            fingerprint,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn config(&self) -> &CommandConfig {
        &self.config
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    fn preset_path(&self, preset: &str) -> PathBuf {
        self.resolve(&self.config.preset_dir)
            .join(format!("{preset}.{}", self.config.preset_extension))
    }

    /// Wrapper source for a request.
    pub fn wrapper_source(&self, request: &ExportRequest) -> Result<String, ExportError> {
        let entry = self.config.parts.get(&request.part).ok_or_else(|| {
            ExportError::InvalidRequest(format!("no generator entry for part `{}`", request.part))
        })?;

        let mut lines = Vec::new();
        if let Some(scenario) = &request.scenario {
            let preset = self.preset_path(scenario.preset());
            if !preset.is_file() {
                return Err(ExportError::UnknownPreset(scenario.preset().to_string()));
            }
            lines.push(include_line(&preset));
            for (name, value) in scenario.overrides() {
                lines.push(format!("{name} = {value};"));
            }
        }
        for include in &entry.includes {
            lines.push(include_line(&self.resolve(include)));
        }
        lines.push(String::new());
        lines.push(entry.call.trim().to_string());
        lines.push(String::new());
        Ok(lines.join("\n"))
    }

    fn run(&self, part: PartKind, input: &Path, output: &Path) -> Result<(), ExportError> {
        let args: Vec<String> = self
            .config
            .args
            .iter()
            .map(|a| {
                a.replace("{input}", &input.to_string_lossy())
                    .replace("{output}", &output.to_string_lossy())
            })
            .collect();
        let stdout_path = output.with_extension("stdout.log");
        let stderr_path = output.with_extension("stderr.log");
        let stdout = File::create(&stdout_path).map_err(|e| ExportError::io(&stdout_path, e))?;
        let stderr = File::create(&stderr_path).map_err(|e| ExportError::io(&stderr_path, e))?;

        debug!(program = %self.config.program, ?args, "spawning export");
        let mut child = Command::new(&self.config.program)
            .args(&args)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .spawn()
            .map_err(|e| ExportError::io(&self.config.program, e))?;

        let status = wait_with_deadline(&mut child, self.timeout)
            .map_err(|e| ExportError::io(&self.config.program, e))?;
        let Some(status) = status else {
            warn!(%part, seconds = self.timeout.as_secs_f64(), "export timed out; process killed");
            return Err(ExportError::Timeout {
                part,
                seconds: self.timeout.as_secs_f64(),
            });
        };

        if !status.success() {
            let stderr_text = fs::read_to_string(&stderr_path).unwrap_or_default();
            return Err(ExportError::Failed {
                part,
                code: status.code(),
                stderr_tail: tail_lines(&stderr_text, TAIL_LINES),
            });
        }
        Ok(())
    }
}

impl GeometryGenerator for CommandGenerator {
    fn fingerprint(&self) -> String {
        self.fingerprint.clone()
    }

    fn generate(&self, request: &ExportRequest, output: &Path) -> Result<(), ExportError> {
        let wrapper = output.with_extension("wrapper.scad");
        fs::write(&wrapper, self.wrapper_source(request)?)
            .map_err(|e| ExportError::io(&wrapper, e))?;
        self.run(request.part, &wrapper, output)?;

        let len = fs::metadata(output).map(|m| m.len()).unwrap_or(0);
        if len == 0 {
            return Err(ExportError::EmptyOutput {
                path: output.to_path_buf(),
            });
        }
        Ok(())
    }

    fn has_preset(&self, preset: &str) -> bool {
        self.preset_path(preset).is_file()
    }
}

/// `Ok(None)` when the deadline passed; the child has been killed and reaped.
fn wait_with_deadline(
    child: &mut std::process::Child,
    timeout: Duration,
) -> std::io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            // Already exited between the poll and the kill is fine.
            let _ = child.kill();
            child.wait()?;
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn include_line(path: &Path) -> String {
    format!("include <{}>", path.to_string_lossy().replace('\\', "/"))
}

fn tail_lines(text: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n").trim().to_string()
}

/// BLAKE3 over the config and every source file, visited in sorted path
/// order.
fn fingerprint_sources(config: &CommandConfig, root: &Path) -> Result<String, ExportError> {
    let mut files = Vec::new();
    for source in &config.sources {
        let path = if source.is_absolute() {
            source.clone()
        } else {
            root.join(source)
        };
        collect_files(&path, &mut files)?;
    }
    files.sort();
    files.dedup();

    let mut hasher = blake3::Hasher::new();
    hasher.update(&fit_types::canonical_bytes(config).unwrap_or_default());
    for file in &files {
        let bytes = fs::read(file).map_err(|e| ExportError::io(file, e))?;
        let rel = file.strip_prefix(root).unwrap_or(file);
        hasher.update(rel.to_string_lossy().as_bytes());
        hasher.update(&(bytes.len() as u64).to_le_bytes());
        hasher.update(&bytes);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

fn collect_files(path: &Path, out: &mut Vec<PathBuf>) -> Result<(), ExportError> {
    let meta = fs::metadata(path).map_err(|e| ExportError::io(path, e))?;
    if meta.is_file() {
        out.push(path.to_path_buf());
        return Ok(());
    }
    for entry in fs::read_dir(path).map_err(|e| ExportError::io(path, e))? {
        let entry = entry.map_err(|e| ExportError::io(path, e))?;
        collect_files(&entry.path(), out)?;
    }
    Ok(())
}
