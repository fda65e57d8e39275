//! Sampling resolution and pass/fail limits.
//!
//! Both are plain data with documented defaults. [`FitThresholds`] is only
//! obtainable through its builder, which rejects non-finite or negative
//! limits and inverted bands once, up front.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("`{name}` must be finite and non-negative, got {value}")]
    Invalid { name: &'static str, value: f64 },

    #[error("`{name}` must be positive, got {value}")]
    NotPositive { name: &'static str, value: f64 },

    #[error("`{name}` must be at least {min}, got {value}")]
    TooFew {
        name: &'static str,
        value: usize,
        min: usize,
    },

    #[error("inverted range for `{name}`: {lower} > {upper}")]
    InvertedRange {
        name: &'static str,
        lower: f64,
        upper: f64,
    },
}

fn non_negative(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid { name, value })
    }
}

fn positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { name, value })
    }
}

fn at_least(name: &'static str, value: usize, min: usize) -> Result<(), ConfigError> {
    if value >= min {
        Ok(())
    } else {
        Err(ConfigError::TooFew { name, value, min })
    }
}

fn ordered(name: &'static str, lower: f64, upper: f64) -> Result<(), ConfigError> {
    if lower <= upper {
        Ok(())
    } else {
        Err(ConfigError::InvertedRange { name, lower, upper })
    }
}

/// How densely each validator samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    pub corridor_samples: usize,
    pub axis_scan_radius_mm: f64,
    pub axis_scan_step_mm: f64,
    pub ring_probes: usize,
    /// Ring height above the seat.
    pub ring_lift_mm: f64,
    pub angle_min_deg: f64,
    pub angle_max_deg: f64,
    pub angle_step_deg: f64,
    pub surface_sample_spacing_mm: f64,
    pub thickness_probes: usize,
    pub thickness_min_valid: usize,
    pub thickness_percentile: f64,
    pub thickness_noise_floor_mm: f64,
    pub frame_bottom_tolerance_mm: f64,
    pub contact_tolerance_mm: f64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            corridor_samples: 29,
            axis_scan_radius_mm: 0.8,
            axis_scan_step_mm: 0.1,
            ring_probes: 16,
            ring_lift_mm: 0.5,
            angle_min_deg: -24.0,
            angle_max_deg: 24.0,
            angle_step_deg: 3.0,
            surface_sample_spacing_mm: 4.0,
            thickness_probes: 1200,
            thickness_min_valid: 60,
            thickness_percentile: 5.0,
            thickness_noise_floor_mm: 0.25,
            frame_bottom_tolerance_mm: 0.05,
            contact_tolerance_mm: 0.2,
        }
    }
}

impl SamplingConfig {
    /// Coarser sampling for quick sweeps.
    pub fn quick() -> Self {
        Self {
            corridor_samples: 15,
            angle_step_deg: 6.0,
            thickness_probes: 400,
            thickness_min_valid: 30,
            ..Self::default()
        }
    }

    pub fn with_angle_step(mut self, step_deg: f64) -> Self {
        self.angle_step_deg = step_deg;
        self
    }

    pub fn with_angle_range(mut self, min_deg: f64, max_deg: f64) -> Self {
        self.angle_min_deg = min_deg;
        self.angle_max_deg = max_deg;
        self
    }

    pub fn with_corridor_samples(mut self, samples: usize) -> Self {
        self.corridor_samples = samples;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        at_least("corridor_samples", self.corridor_samples, 2)?;
        positive("axis_scan_step_mm", self.axis_scan_step_mm)?;
        non_negative("axis_scan_radius_mm", self.axis_scan_radius_mm)?;
        at_least("ring_probes", self.ring_probes, 3)?;
        non_negative("ring_lift_mm", self.ring_lift_mm)?;
        ordered("angle_range_deg", self.angle_min_deg, self.angle_max_deg)?;
        positive("angle_step_deg", self.angle_step_deg)?;
        positive("surface_sample_spacing_mm", self.surface_sample_spacing_mm)?;
        at_least("thickness_probes", self.thickness_probes, 1)?;
        at_least("thickness_min_valid", self.thickness_min_valid, 1)?;
        non_negative("thickness_percentile", self.thickness_percentile)?;
        ordered("thickness_percentile", self.thickness_percentile, 100.0)?;
        non_negative("thickness_noise_floor_mm", self.thickness_noise_floor_mm)?;
        non_negative("frame_bottom_tolerance_mm", self.frame_bottom_tolerance_mm)?;
        non_negative("contact_tolerance_mm", self.contact_tolerance_mm)?;
        Ok(())
    }
}

/// Pass/fail limits for every check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitThresholds {
    axis_tolerance_mm: f64,
    slot_depth_target_mm: f64,
    slot_depth_tolerance_mm: f64,
    corridor_min_clearance_mm: f64,
    frame_min_gap_mm: f64,
    neutral_gap_min_mm: f64,
    neutral_gap_max_mm: f64,
    floor_clearance_min_mm: f64,
    min_wall_thickness_mm: f64,
    max_overhang_ratio: f64,
    overhang_angle_deg: f64,
    min_contact_area_mm2: f64,
    min_contact_span_x_mm: f64,
    min_contact_span_y_mm: f64,
}

impl Default for FitThresholds {
    fn default() -> Self {
        Self {
            axis_tolerance_mm: 0.25,
            slot_depth_target_mm: 7.0,
            slot_depth_tolerance_mm: 0.05,
            corridor_min_clearance_mm: 0.08,
            frame_min_gap_mm: 0.08,
            neutral_gap_min_mm: 0.08,
            neutral_gap_max_mm: 50.0,
            floor_clearance_min_mm: 2.0,
            min_wall_thickness_mm: 1.0,
            max_overhang_ratio: 0.35,
            overhang_angle_deg: 45.0,
            min_contact_area_mm2: 700.0,
            min_contact_span_x_mm: 60.0,
            min_contact_span_y_mm: 18.0,
        }
    }
}

impl FitThresholds {
    pub fn builder() -> FitThresholdsBuilder {
        FitThresholdsBuilder {
            inner: Self::default(),
        }
    }

    /// Tighter limits for release candidates.
    pub fn strict() -> Self {
        Self {
            axis_tolerance_mm: 0.1,
            slot_depth_tolerance_mm: 0.01,
            corridor_min_clearance_mm: 0.1,
            frame_min_gap_mm: 0.25,
            neutral_gap_min_mm: 0.5,
            floor_clearance_min_mm: 3.0,
            min_wall_thickness_mm: 1.2,
            ..Self::default()
        }
    }

    /// Start a builder from these values.
    pub fn to_builder(&self) -> FitThresholdsBuilder {
        FitThresholdsBuilder {
            inner: self.clone(),
        }
    }

    pub fn axis_tolerance_mm(&self) -> f64 {
        self.axis_tolerance_mm
    }
    pub fn slot_depth_target_mm(&self) -> f64 {
        self.slot_depth_target_mm
    }
    pub fn slot_depth_tolerance_mm(&self) -> f64 {
        self.slot_depth_tolerance_mm
    }
    pub fn corridor_min_clearance_mm(&self) -> f64 {
        self.corridor_min_clearance_mm
    }
    pub fn frame_min_gap_mm(&self) -> f64 {
        self.frame_min_gap_mm
    }
    pub fn neutral_gap_band_mm(&self) -> (f64, f64) {
        (self.neutral_gap_min_mm, self.neutral_gap_max_mm)
    }
    pub fn floor_clearance_min_mm(&self) -> f64 {
        self.floor_clearance_min_mm
    }
    pub fn min_wall_thickness_mm(&self) -> f64 {
        self.min_wall_thickness_mm
    }
    pub fn max_overhang_ratio(&self) -> f64 {
        self.max_overhang_ratio
    }
    pub fn overhang_angle_deg(&self) -> f64 {
        self.overhang_angle_deg
    }
    pub fn min_contact_area_mm2(&self) -> f64 {
        self.min_contact_area_mm2
    }
    pub fn min_contact_span_mm(&self) -> (f64, f64) {
        (self.min_contact_span_x_mm, self.min_contact_span_y_mm)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        non_negative("axis_tolerance_mm", self.axis_tolerance_mm)?;
        non_negative("slot_depth_target_mm", self.slot_depth_target_mm)?;
        non_negative("slot_depth_tolerance_mm", self.slot_depth_tolerance_mm)?;
        non_negative("corridor_min_clearance_mm", self.corridor_min_clearance_mm)?;
        non_negative("frame_min_gap_mm", self.frame_min_gap_mm)?;
        non_negative("neutral_gap_min_mm", self.neutral_gap_min_mm)?;
        non_negative("neutral_gap_max_mm", self.neutral_gap_max_mm)?;
        ordered("neutral_gap_band_mm", self.neutral_gap_min_mm, self.neutral_gap_max_mm)?;
        non_negative("floor_clearance_min_mm", self.floor_clearance_min_mm)?;
        non_negative("min_wall_thickness_mm", self.min_wall_thickness_mm)?;
        non_negative("max_overhang_ratio", self.max_overhang_ratio)?;
        non_negative("overhang_angle_deg", self.overhang_angle_deg)?;
        ordered("overhang_angle_deg", self.overhang_angle_deg, 90.0)?;
        non_negative("min_contact_area_mm2", self.min_contact_area_mm2)?;
        non_negative("min_contact_span_x_mm", self.min_contact_span_x_mm)?;
        non_negative("min_contact_span_y_mm", self.min_contact_span_y_mm)?;
        Ok(())
    }
}

/// Consuming builder; every setter takes and returns `self`.
#[derive(Debug, Clone)]
pub struct FitThresholdsBuilder {
    inner: FitThresholds,
}

impl FitThresholdsBuilder {
    pub fn axis_tolerance_mm(mut self, v: f64) -> Self {
        self.inner.axis_tolerance_mm = v;
        self
    }

    pub fn slot_depth(mut self, target_mm: f64, tolerance_mm: f64) -> Self {
        self.inner.slot_depth_target_mm = target_mm;
        self.inner.slot_depth_tolerance_mm = tolerance_mm;
        self
    }

    pub fn corridor_min_clearance_mm(mut self, v: f64) -> Self {
        self.inner.corridor_min_clearance_mm = v;
        self
    }

    pub fn frame_min_gap_mm(mut self, v: f64) -> Self {
        self.inner.frame_min_gap_mm = v;
        self
    }

    pub fn neutral_gap_band_mm(mut self, min: f64, max: f64) -> Self {
        self.inner.neutral_gap_min_mm = min;
        self.inner.neutral_gap_max_mm = max;
        self
    }

    pub fn floor_clearance_min_mm(mut self, v: f64) -> Self {
        self.inner.floor_clearance_min_mm = v;
        self
    }

    pub fn min_wall_thickness_mm(mut self, v: f64) -> Self {
        self.inner.min_wall_thickness_mm = v;
        self
    }

    pub fn max_overhang(mut self, ratio: f64, angle_deg: f64) -> Self {
        self.inner.max_overhang_ratio = ratio;
        self.inner.overhang_angle_deg = angle_deg;
        self
    }

    pub fn min_contact(mut self, area_mm2: f64, span_x_mm: f64, span_y_mm: f64) -> Self {
        self.inner.min_contact_area_mm2 = area_mm2;
        self.inner.min_contact_span_x_mm = span_x_mm;
        self.inner.min_contact_span_y_mm = span_y_mm;
        self
    }

    pub fn build(self) -> Result<FitThresholds, ConfigError> {
        self.inner.validate()?;
        Ok(self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_presets_validate() {
        FitThresholds::builder().build().unwrap();
        FitThresholds::strict().to_builder().build().unwrap();
        SamplingConfig::default().validate().unwrap();
        SamplingConfig::quick().validate().unwrap();
    }

    #[test]
    fn builder_overrides_one_field() {
        let t = FitThresholds::builder().floor_clearance_min_mm(5.0).build().unwrap();
        assert_eq!(t.floor_clearance_min_mm(), 5.0);
        assert_eq!(t.frame_min_gap_mm(), 0.08);
    }

    #[test]
    fn rejects_bad_values() {
        assert_eq!(
            FitThresholds::builder().frame_min_gap_mm(-0.1).build(),
            Err(ConfigError::Invalid {
                name: "frame_min_gap_mm",
                value: -0.1
            })
        );
        assert!(matches!(
            FitThresholds::builder().floor_clearance_min_mm(f64::NAN).build(),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            FitThresholds::builder().neutral_gap_band_mm(3.0, 1.0).build(),
            Err(ConfigError::InvertedRange { .. })
        ));
    }

    #[test]
    fn sampling_rejects_zero_step_and_inverted_swing() {
        assert!(SamplingConfig::default().with_angle_step(0.0).validate().is_err());
        assert!(SamplingConfig::default().with_angle_range(10.0, -10.0).validate().is_err());
        assert!(SamplingConfig::default().with_corridor_samples(1).validate().is_err());
    }
}
