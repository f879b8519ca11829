use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Latitude window a projection family can represent.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct PoleLimits {
    pub min_lat: f64,
    pub max_lat: f64,
}

impl PoleLimits {
    pub fn new(min_lat: f64, max_lat: f64) -> Self {
        Self { min_lat, max_lat }
    }
}

/// Screen-space sizing of point symbols and their text labels
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnnotationSettings {
    pub symbol_size_px: f64,
    pub char_width_px: f64,
    pub char_height_px: f64,
    /// Gap between the symbol edge and the start of the label text
    pub label_offset_px: f64,
}

impl Default for AnnotationSettings {
    fn default() -> Self {
        Self {
            symbol_size_px: 8.0,
            char_width_px: 7.0,
            char_height_px: 12.0,
            label_offset_px: 4.0,
        }
    }
}

/// Engine-wide tuning knobs
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Anisotropy correction applied in geographic display mode
    pub xy_scale_factor: f64,
    pub xy_scale_factor_bounds: (f64, f64),
    pub min_viewport_px: f64,
    pub zoom_step: f64,
    /// Offset (source units) used to sample local rotation for angle reprojection
    pub angle_sample_step: f64,
    /// Gap left on either side of a reference-cut split, in degrees
    pub cut_epsilon: f64,
    /// Keyed by `Crs::family_name()`
    pub pole_limits: BTreeMap<String, PoleLimits>,
    pub annotation: AnnotationSettings,
    pub grid_cells_per_axis: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let mut pole_limits = BTreeMap::new();
        pole_limits.insert("merc".to_string(), PoleLimits::new(-85.0, 85.0));
        pole_limits.insert("npstere".to_string(), PoleLimits::new(0.0, 90.0));
        pole_limits.insert("spstere".to_string(), PoleLimits::new(-90.0, 0.0));

        Self {
            xy_scale_factor: 1.0,
            xy_scale_factor_bounds: (0.5, 2.0),
            min_viewport_px: 5.0,
            zoom_step: 1.5,
            angle_sample_step: 10.0,
            cut_epsilon: 1e-6,
            pole_limits,
            annotation: AnnotationSettings::default(),
            grid_cells_per_axis: 64,
        }
    }
}

impl EngineConfig {
    /// Parse a JSON document; missing fields fall back to defaults.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: EngineConfig =
            serde_json::from_str(text).context("Failed to parse engine config")?;
        Ok(config)
    }

    /// Clamp an anisotropy factor into the configured bounds.
    /// Out-of-range values reset to 1.0 rather than saturating.
    pub fn checked_xy_scale_factor(&self, factor: f64) -> f64 {
        let (lo, hi) = self.xy_scale_factor_bounds;
        if factor.is_finite() && factor >= lo && factor <= hi {
            factor
        } else {
            log::warn!("xy scale factor {factor} outside [{lo}, {hi}], using 1.0");
            1.0
        }
    }

    pub fn pole_limits_for(&self, family: &str) -> Option<PoleLimits> {
        self.pole_limits.get(family).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let config = EngineConfig::from_json_str(
            r#"{ "zoom_step": 2.0, "annotation": { "char_width_px": 5.0 },
                 "pole_limits": { "merc": { "min_lat": -80.0, "max_lat": 80.0 } } }"#,
        )
        .unwrap();
        assert_eq!(config.zoom_step, 2.0);
        assert_eq!(config.annotation.char_width_px, 5.0);
        assert_eq!(config.annotation.symbol_size_px, 8.0);
        assert_eq!(config.pole_limits_for("merc"), Some(PoleLimits::new(-80.0, 80.0)));
        assert_eq!(config.pole_limits_for("npstere"), None);
    }

    #[test]
    fn test_bad_json_is_error() {
        assert!(EngineConfig::from_json_str("{ zoom_step: ").is_err());
    }

    #[test]
    fn test_xy_scale_factor_reset() {
        let config = EngineConfig::default();
        assert_eq!(config.checked_xy_scale_factor(1.5), 1.5);
        assert_eq!(config.checked_xy_scale_factor(0.5), 0.5);
        assert_eq!(config.checked_xy_scale_factor(3.0), 1.0);
        assert_eq!(config.checked_xy_scale_factor(0.1), 1.0);
        assert_eq!(config.checked_xy_scale_factor(f64::NAN), 1.0);
    }
}
