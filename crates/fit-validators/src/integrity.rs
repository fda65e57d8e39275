use fit_types::ValidationResult;
use mesh_query::MeshHandle;

use crate::checks;

/// Every part must be one closed shell before anything is measured on it.
pub fn validate(parts: &[(&str, &MeshHandle)]) -> ValidationResult {
    let mut problems = Vec::new();
    let mut measured = Vec::new();
    for (name, mesh) in parts {
        measured.push((format!("{name}_triangles"), mesh.triangle_count() as f64));
        measured.push((format!("{name}_components"), mesh.component_count() as f64));
        measured.push((format!("{name}_degenerate_dropped"), mesh.degenerate_dropped() as f64));
        if let Err(e) = mesh.check_integrity() {
            problems.push(format!("{name}: {e}"));
        }
    }

    let mut result = if problems.is_empty() {
        ValidationResult::pass(
            checks::MESH_INTEGRITY,
            format!("{} meshes are closed single shells", parts.len()),
        )
    } else {
        ValidationResult::integrity_failure(checks::MESH_INTEGRITY, problems.join("; "))
    };
    for (name, value) in measured {
        result = result.with_measured(&name, value);
    }
    result
}
