//! # Print Profile
//!
//! Machine and material profile loading for the layer planner.
//!
//! `ConfigSettings` is the subset of machine/material tuning the planner's
//! `finalize_layer` consumes: minimum layer time, fan thresholds, retraction
//! and overlap policy, travel speed. `PathConfigBundle`
//! is a named table of `PathConfig`s an upstream driver loads once and binds
//! to roles ("WALL-OUTER", "SKIN", ...) before queuing a layer.
//!
//! Both load from and save to TOML, following the same
//! `std::fs::read_to_string` + `toml::from_str` round trip the rest of this
//! printer's configuration types use.

use std::collections::HashMap;
use std::path::Path;

use path_types::PathConfig;
use serde::{Deserialize, Serialize};

/// Machine/material tuning consumed by `finalize_layer`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSettings {
    pub min_layer_time_s: f64,
    pub min_print_speed: f64,
    pub min_fan_speed_layer_time: f64,
    pub max_fan_speed_layer_time: f64,
    pub fan_min_percent: i32,
    pub fan_max_percent: i32,
    pub first_layer_allow_fan: u32,
    pub retract_min_um: i64,
    pub perimeter_overlap_ratio: f64,
    pub travel_speed_mm_s: f64,
}

impl ConfigSettings {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ProfileError> {
        let contents =
            std::fs::read_to_string(path.as_ref()).map_err(|e| ProfileError::IoError(e.to_string()))?;
        toml::from_str(&contents).map_err(|e| ProfileError::ParseError(e.to_string()))
    }

    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ProfileError> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| ProfileError::SerializationError(e.to_string()))?;
        std::fs::write(path.as_ref(), contents).map_err(|e| ProfileError::IoError(e.to_string()))
    }

    /// Checks range invariants; returns the first violation found.
    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.min_layer_time_s < 0.0 {
            return Err(ProfileError::InvalidConfiguration(
                "min_layer_time_s must be non-negative".into(),
            ));
        }
        if self.min_print_speed <= 0.0 {
            return Err(ProfileError::InvalidConfiguration(
                "min_print_speed must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.perimeter_overlap_ratio) {
            return Err(ProfileError::InvalidConfiguration(format!(
                "perimeter_overlap_ratio {} out of range [0, 1]",
                self.perimeter_overlap_ratio
            )));
        }
        if !(0..=100).contains(&self.fan_min_percent) || !(0..=100).contains(&self.fan_max_percent) {
            return Err(ProfileError::InvalidConfiguration(
                "fan percentages must be within 0..=100".into(),
            ));
        }
        if self.fan_min_percent > self.fan_max_percent {
            return Err(ProfileError::InvalidConfiguration(
                "fan_min_percent must not exceed fan_max_percent".into(),
            ));
        }
        if self.retract_min_um < 0 {
            return Err(ProfileError::InvalidConfiguration(
                "retract_min_um must be non-negative".into(),
            ));
        }
        if self.travel_speed_mm_s <= 0.0 {
            return Err(ProfileError::InvalidConfiguration(
                "travel_speed_mm_s must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// A serializable, named `PathConfig` entry. `PathConfig` itself carries no
/// serde derive because in the planner it is compared by identity
/// (`path_types::ConfigRef`); this is the on-disk row shape that gets turned
/// into a fresh `PathConfig` (and therefore a fresh identity) on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathConfigEntry {
    pub speed_mm_s: f64,
    pub line_width_um: i64,
    pub comment_tag: String,
    pub closed_loop: bool,
    pub spiralize: bool,
}

impl From<PathConfigEntry> for PathConfig {
    fn from(e: PathConfigEntry) -> Self {
        PathConfig::new(e.speed_mm_s, e.line_width_um, e.comment_tag, e.closed_loop, e.spiralize)
    }
}

/// A named table of path configs, e.g. `{"WALL-OUTER": {...}, "SKIN": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PathConfigBundle {
    pub roles: HashMap<String, PathConfigEntry>,
}

impl PathConfigBundle {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ProfileError> {
        let contents =
            std::fs::read_to_string(path.as_ref()).map_err(|e| ProfileError::IoError(e.to_string()))?;
        toml::from_str(&contents).map_err(|e| ProfileError::ParseError(e.to_string()))
    }

    /// Builds a fresh `PathConfig` for `role`. Each call constructs a new
    /// object, so binding the same role twice yields two distinct
    /// identities; callers that need one shared config per role across a
    /// layer must cache the result themselves.
    pub fn build(&self, role: &str) -> Result<PathConfig, ProfileError> {
        self.roles
            .get(role)
            .cloned()
            .map(PathConfig::from)
            .ok_or_else(|| ProfileError::MissingField(role.to_string()))
    }
}

/// Profile loading/validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("parse error: {0}")]
    ParseError(String),

    #[error("serialization error: {0}")]
    SerializationError(String),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("missing path config role: {0}")]
    MissingField(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_settings() -> ConfigSettings {
        ConfigSettings {
            min_layer_time_s: 10.0,
            min_print_speed: 5.0,
            min_fan_speed_layer_time: 30.0,
            max_fan_speed_layer_time: 10.0,
            fan_min_percent: 20,
            fan_max_percent: 100,
            first_layer_allow_fan: 1,
            retract_min_um: 2000,
            perimeter_overlap_ratio: 0.85,
            travel_speed_mm_s: 150.0,
        }
    }

    #[test]
    fn valid_settings_pass() {
        assert!(sample_settings().validate().is_ok());
    }

    #[test]
    fn overlap_ratio_out_of_range_rejected() {
        let mut s = sample_settings();
        s.perimeter_overlap_ratio = 1.2;
        assert!(matches!(s.validate(), Err(ProfileError::InvalidConfiguration(_))));
    }

    #[test]
    fn bundle_build_yields_distinct_identities() {
        let mut roles = HashMap::new();
        roles.insert(
            "WALL-INNER".to_string(),
            PathConfigEntry {
                speed_mm_s: 30.0,
                line_width_um: 400,
                comment_tag: "WALL-INNER".to_string(),
                closed_loop: true,
                spiralize: false,
            },
        );
        let bundle = PathConfigBundle { roles };
        let a = bundle.build("WALL-INNER").unwrap();
        let b = bundle.build("WALL-INNER").unwrap();
        assert_eq!(a, b, "field-equal by construction");
        let a_ref: path_types::ConfigRef = a.into();
        let b_ref: path_types::ConfigRef = b.into();
        assert_ne!(a_ref, b_ref, "distinct allocations must not share identity");
    }

    #[test]
    fn missing_role_errors() {
        let bundle = PathConfigBundle::default();
        assert!(matches!(bundle.build("nope"), Err(ProfileError::MissingField(_))));
    }
}
