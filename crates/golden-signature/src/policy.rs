//! The audited drift override.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Environment equivalent of `--allow-drift`.
pub const ALLOW_DRIFT_ENV: &str = "FITGATE_ALLOW_DRIFT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideSource {
    Cli,
    Env,
    None,
}

impl fmt::Display for OverrideSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OverrideSource::Cli => "cli",
            OverrideSource::Env => "env",
            OverrideSource::None => "none",
        })
    }
}

/// Whether drift is downgraded to an advisory, and who asked for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftOverride {
    pub source: OverrideSource,
}

impl DriftOverride {
    pub const NONE: Self = Self {
        source: OverrideSource::None,
    };

    /// The flag wins over the environment when both are set.
    pub fn resolve(cli_flag: bool, env_value: Option<&str>) -> Self {
        let source = if cli_flag {
            OverrideSource::Cli
        } else if env_value.is_some_and(env_flag_enabled) {
            OverrideSource::Env
        } else {
            OverrideSource::None
        };
        Self { source }
    }

    /// Resolve against the process environment.
    pub fn from_env(cli_flag: bool) -> Self {
        let env = std::env::var(ALLOW_DRIFT_ENV).ok();
        Self::resolve(cli_flag, env.as_deref())
    }

    pub fn enabled(&self) -> bool {
        self.source != OverrideSource::None
    }
}

/// `1`, `true`, `yes`, `on`, case-insensitive.
pub fn env_flag_enabled(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
