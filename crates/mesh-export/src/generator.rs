use std::path::Path;

use fit_types::{PartKind, ScenarioSpec};

use crate::error::ExportError;

/// What to export: a part, and for non-shared parts the scenario that
/// parameterizes it.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRequest {
    pub part: PartKind,
    pub scenario: Option<ScenarioSpec>,
}

impl ExportRequest {
    /// Request for `part` under `scenario`. Shared parts drop the scenario.
    pub fn new(part: PartKind, scenario: &ScenarioSpec) -> Self {
        Self {
            part,
            scenario: (!part.is_shared()).then(|| scenario.clone()),
        }
    }

    pub fn shared(part: PartKind) -> Self {
        Self {
            part,
            scenario: None,
        }
    }

    /// Scenario identity used in cache keys and records.
    pub fn scenario_key(&self) -> String {
        self.scenario
            .as_ref()
            .map(ScenarioSpec::content_hash)
            .unwrap_or_else(|| "shared".to_string())
    }

    pub fn scenario_id(&self) -> String {
        self.scenario
            .as_ref()
            .map(ScenarioSpec::id)
            .unwrap_or_else(|| "shared".to_string())
    }
}

/// Produces STL geometry for a part.
///
/// Implementations must be deterministic: the same request and the same
/// [`fingerprint`](Self::fingerprint) must produce the same geometry, since
/// the cache reuses artifacts on that assumption.
pub trait GeometryGenerator: Send + Sync {
    /// Identity of the generator's inputs (source files, built-in tables).
    fn fingerprint(&self) -> String;

    /// Write the requested part to `output` as STL.
    fn generate(&self, request: &ExportRequest, output: &Path) -> Result<(), ExportError>;

    /// Whether `preset` can be generated at all. Checked before a sweep so
    /// a typo is a configuration error, not a column of export failures.
    fn has_preset(&self, _preset: &str) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fit_types::ParamValue;

    #[test]
    fn shared_parts_ignore_scenario() {
        let scenario = ScenarioSpec::neutral("default").with_override("x", ParamValue::Int(1));
        let frame = ExportRequest::new(PartKind::Frame, &scenario);
        assert_eq!(frame, ExportRequest::shared(PartKind::Frame));
        assert_eq!(frame.scenario_key(), "shared");

        let body = ExportRequest::new(PartKind::Body, &scenario);
        assert_eq!(body.scenario_key(), scenario.content_hash());
        assert_eq!(body.scenario_id(), "default:custom");
    }
}
