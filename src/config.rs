//! Simulation configuration.
//!
//! The configuration is what the engine's step function is built from. The
//! actor only ever rewrites two sections of it: the imported geometry slices
//! (from equilibrium records) and the imported profile-condition slices (from
//! core-profiles records). The sections are disjoint, so ingesting one kind
//! never disturbs the other.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::record::RecordSlice;
use crate::store::closest_index;

/// Time-indexed table of slices, ordered by time.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<RecordSlice>", into = "Vec<RecordSlice>")]
pub struct TimeTable {
    slices: Vec<RecordSlice>,
}

impl From<Vec<RecordSlice>> for TimeTable {
    fn from(slices: Vec<RecordSlice>) -> Self {
        Self::new(slices)
    }
}

impl From<TimeTable> for Vec<RecordSlice> {
    fn from(table: TimeTable) -> Self {
        table.slices
    }
}

impl TimeTable {
    /// Builds a table, sorting slices by time.
    #[must_use]
    pub fn new(mut slices: Vec<RecordSlice>) -> Self {
        slices.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { slices }
    }

    /// Slice nearest to `t`; ties resolve to the earlier slice.
    #[must_use]
    pub fn closest(&self, t: f64) -> Option<&RecordSlice> {
        let times: Vec<f64> = self.slices.iter().map(|s| s.time).collect();
        closest_index(&times, t).map(|idx| &self.slices[idx])
    }

    /// All slices.
    #[must_use]
    pub fn slices(&self) -> &[RecordSlice] {
        &self.slices
    }

    /// Returns true if the table has no slices.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    /// Number of slices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slices.len()
    }
}

/// Time stepping parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericsConfig {
    /// Start time.
    #[serde(default)]
    pub t_initial: f64,
    /// Final time.
    pub t_final: f64,
    /// Nominal timestep.
    pub fixed_dt: f64,
    /// Smallest admissible timestep.
    #[serde(default = "default_min_dt")]
    pub min_dt: f64,
}

const fn default_min_dt() -> f64 {
    1e-8
}

impl NumericsConfig {
    /// Validates the time stepping parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: String| Err(ConfigError::InvalidNumerics { reason });
        if !self.t_initial.is_finite() || !self.t_final.is_finite() {
            return invalid("t_initial and t_final must be finite".to_string());
        }
        if self.t_final <= self.t_initial {
            return invalid(format!(
                "t_final ({}) must be after t_initial ({})",
                self.t_final, self.t_initial
            ));
        }
        if !(self.fixed_dt > 0.0) {
            return invalid(format!("fixed_dt must be > 0, got {}", self.fixed_dt));
        }
        if !(self.min_dt > 0.0) || self.min_dt > self.fixed_dt {
            return invalid(format!(
                "min_dt must be in (0, fixed_dt], got {}",
                self.min_dt
            ));
        }
        Ok(())
    }
}

/// Geometry section: parametric values plus slices imported from equilibrium records.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GeometryConfig {
    /// Parametric geometry (used where no imported slice exists).
    #[serde(default)]
    pub params: BTreeMap<String, f64>,
    /// Slices imported from equilibrium records.
    #[serde(default)]
    pub time_slices: TimeTable,
}

impl GeometryConfig {
    /// Whether the geometry comes from imported equilibrium data.
    #[must_use]
    pub fn is_imported(&self) -> bool {
        !self.time_slices.is_empty()
    }
}

/// Profile-conditions section: prescribed targets plus slices imported from core-profiles records.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProfileConditions {
    /// Prescribed scalar conditions (e.g. plasma current).
    #[serde(default)]
    pub prescribed: BTreeMap<String, f64>,
    /// Prescribed profile targets.
    #[serde(default)]
    pub profiles: BTreeMap<String, Vec<f64>>,
    /// Slices imported from core-profiles records.
    #[serde(default)]
    pub time_slices: TimeTable,
}

/// Content fingerprint of a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigFingerprint(String);

impl ConfigFingerprint {
    /// Hex digest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters, for logs.
    #[must_use]
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for ConfigFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Full simulation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Time stepping.
    pub numerics: NumericsConfig,
    /// Geometry.
    #[serde(default)]
    pub geometry: GeometryConfig,
    /// Profile conditions.
    #[serde(default)]
    pub profile_conditions: ProfileConditions,
}

impl SimulationConfig {
    /// Parses and validates a JSON configuration.
    pub fn from_json(json: &str, origin: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|e| ConfigError::Malformed {
            path: origin.to_string(),
            message: e.to_string(),
        })?;
        config.numerics.validate()?;
        Ok(config)
    }

    /// Loads and validates a JSON configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let origin = path.display().to_string();
        let json = std::fs::read_to_string(path).map_err(|e| ConfigError::Unreadable {
            path: origin.clone(),
            message: e.to_string(),
        })?;
        Self::from_json(&json, &origin)
    }

    /// BLAKE3 fingerprint of the canonical JSON form.
    #[must_use]
    pub fn fingerprint(&self) -> ConfigFingerprint {
        let mut hasher = blake3::Hasher::new();
        // Maps are ordered, so the encoding is canonical.
        let bytes = serde_json::to_vec(self).unwrap_or_else(|_| format!("{self:?}").into_bytes());
        hasher.update(&bytes);
        ConfigFingerprint(hasher.finalize().to_hex().to_string())
    }

    /// Replaces the imported geometry slices, leaving everything else untouched.
    pub fn import_geometry(&mut self, slices: Vec<RecordSlice>) {
        self.geometry.time_slices = TimeTable::new(slices);
    }

    /// Replaces the imported profile-condition slices, leaving everything else untouched.
    pub fn import_profile_conditions(&mut self, slices: Vec<RecordSlice>) {
        self.profile_conditions.time_slices = TimeTable::new(slices);
    }
}
