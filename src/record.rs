//! Physics records exchanged with peer components.
//!
//! A record is a named, timestamped collection of slices. Each slice holds the
//! scalar and profile quantities of one time point. On the wire a record is
//! carried as JSON bytes.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CouplingError;

/// Category of physics data exchanged with peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Equilibrium geometry (flux surfaces, boundary).
    Equilibrium,
    /// Core plasma profiles (temperatures, densities, current).
    CoreProfiles,
}

impl RecordKind {
    /// All record kinds the actor couples, in exchange order.
    pub const ALL: [Self; 2] = [Self::Equilibrium, Self::CoreProfiles];

    /// Canonical name used in port names and on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Equilibrium => "equilibrium",
            Self::CoreProfiles => "core_profiles",
        }
    }

    /// Parses a canonical record name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "equilibrium" => Some(Self::Equilibrium),
            "core_profiles" => Some(Self::CoreProfiles),
            _ => None,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quantities of a record at a single time point.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RecordSlice {
    /// Time of this slice.
    pub time: f64,
    /// Named scalar quantities.
    #[serde(default)]
    pub scalars: BTreeMap<String, f64>,
    /// Named profile (array) quantities.
    #[serde(default)]
    pub profiles: BTreeMap<String, Vec<f64>>,
}

impl RecordSlice {
    /// Creates an empty slice at `time`.
    #[must_use]
    pub fn at(time: f64) -> Self {
        Self {
            time,
            ..Self::default()
        }
    }

    /// Adds a scalar quantity.
    #[must_use]
    pub fn with_scalar(mut self, name: impl Into<String>, value: f64) -> Self {
        self.scalars.insert(name.into(), value);
        self
    }

    /// Adds a profile quantity.
    #[must_use]
    pub fn with_profile(mut self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.profiles.insert(name.into(), values);
        self
    }

    /// Returns a copy re-stamped at `time`.
    #[must_use]
    pub fn retimed(&self, time: f64) -> Self {
        Self {
            time,
            ..self.clone()
        }
    }
}

/// Provenance block of a record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CodeInfo {
    /// Name of the producing code.
    #[serde(default)]
    pub name: Option<String>,
    /// Validity flags; a negative first entry means "no valid data".
    #[serde(default)]
    pub output_flag: Vec<i32>,
}

/// A named, timestamped physics data record.
///
/// `time` always mirrors the times of `slices`, in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicsRecord {
    /// Record kind.
    pub kind: RecordKind,
    /// Time coordinate of every slice.
    pub time: Vec<f64>,
    /// Provenance and validity.
    #[serde(default)]
    pub code: CodeInfo,
    /// Per-time data.
    #[serde(default)]
    pub slices: Vec<RecordSlice>,
}

impl PhysicsRecord {
    /// Creates an empty record of the given kind.
    #[must_use]
    pub fn new(kind: RecordKind) -> Self {
        Self {
            kind,
            time: Vec::new(),
            code: CodeInfo::default(),
            slices: Vec::new(),
        }
    }

    /// Creates a record from slices, deriving the time coordinate.
    #[must_use]
    pub fn from_slices(kind: RecordKind, slices: Vec<RecordSlice>) -> Self {
        let time = slices.iter().map(|s| s.time).collect();
        Self {
            kind,
            time,
            code: CodeInfo::default(),
            slices,
        }
    }

    /// Creates a record that tells the receiver there is nothing new this round.
    #[must_use]
    pub fn no_data(kind: RecordKind) -> Self {
        let mut record = Self::new(kind);
        record.code.output_flag = vec![-1];
        record
    }

    /// Appends a slice, keeping `time` in sync.
    pub fn push_slice(&mut self, slice: RecordSlice) {
        self.time.push(slice.time);
        self.slices.push(slice);
    }

    /// Returns false when the producer flagged this record as carrying no valid data.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.code.output_flag.first().map_or(true, |flag| *flag >= 0)
    }

    /// Encodes the record for transport.
    pub fn encode(&self) -> Result<Vec<u8>, CouplingError> {
        serde_json::to_vec(self).map_err(|e| CouplingError::Encode {
            record: self.kind.to_string(),
            message: e.to_string(),
        })
    }

    /// Decodes a record received on a port that carries `expected` records.
    pub fn decode(expected: RecordKind, bytes: &[u8]) -> Result<Self, CouplingError> {
        let record: Self = serde_json::from_slice(bytes).map_err(|e| CouplingError::Decode {
            record: expected.to_string(),
            message: e.to_string(),
        })?;
        if record.time.len() != record.slices.len() {
            return Err(CouplingError::Decode {
                record: expected.to_string(),
                message: format!(
                    "time coordinate has {} entries but record has {} slices",
                    record.time.len(),
                    record.slices.len()
                ),
            });
        }
        Ok(record)
    }
}
