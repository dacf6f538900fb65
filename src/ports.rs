//! Port naming and the port gateway.
//!
//! Every record kind is exchanged over one port per operator, named
//! `{kind}_{operator}` (e.g. `equilibrium_o_i`). Whether a port takes part in
//! a run is decided by the coupling topology; a port that is not connected is
//! how optional coupling is expressed, never an error.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::clock::SyncScope;
use crate::coupling::CouplingInstance;
use crate::error::CouplingError;
use crate::record::RecordKind;

/// Synchronization point of a coupling round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Operator {
    /// Initial receive, once per outer iteration.
    #[serde(rename = "f_init")]
    FInit,
    /// Intermediate send, inside the timestep loop.
    #[serde(rename = "o_i")]
    OI,
    /// Intermediate receive, inside the timestep loop.
    #[serde(rename = "s")]
    S,
    /// Final send, once per outer iteration.
    #[serde(rename = "o_f")]
    OF,
}

impl Operator {
    /// All operators in round order.
    pub const ALL: [Self; 4] = [Self::FInit, Self::OI, Self::S, Self::OF];

    /// Suffix used in port names.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FInit => "f_init",
            Self::OI => "o_i",
            Self::S => "s",
            Self::OF => "o_f",
        }
    }

    /// Parses a port-name suffix.
    #[must_use]
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "f_init" => Some(Self::FInit),
            "o_i" => Some(Self::OI),
            "s" => Some(Self::S),
            "o_f" => Some(Self::OF),
            _ => None,
        }
    }

    /// Whether the actor receives on ports of this operator.
    #[must_use]
    pub const fn is_receiving(self) -> bool {
        matches!(self, Self::FInit | Self::S)
    }

    /// Scope whose next-timestamp hint travels with messages of this operator.
    #[must_use]
    pub const fn scope(self) -> SyncScope {
        match self {
            Self::FInit | Self::OF => SyncScope::Outer,
            Self::OI | Self::S => SyncScope::Inner,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical port: a record kind bound to an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortName {
    /// Record kind carried by the port.
    pub kind: RecordKind,
    /// Operator the port belongs to.
    pub operator: Operator,
}

fn port_pattern() -> Result<&'static Regex, CouplingError> {
    static PATTERN: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^(?P<kind>[a-z][a-z_]*?)_(?P<op>f_init|o_i|s|o_f)$"))
        .as_ref()
        .map_err(|e| CouplingError::PortPattern {
            message: e.to_string(),
        })
}

impl PortName {
    /// Binds `kind` to `operator`.
    #[must_use]
    pub const fn new(kind: RecordKind, operator: Operator) -> Self {
        Self { kind, operator }
    }

    /// Parses a physical port name such as `core_profiles_f_init`.
    ///
    /// Names that do not follow `{kind}_{operator}` for a known record kind
    /// yield `None`.
    ///
    /// # Errors
    ///
    /// `PortPattern` if the port-name pattern cannot be compiled.
    pub fn parse(name: &str) -> Result<Option<Self>, CouplingError> {
        let Some(caps) = port_pattern()?.captures(name) else {
            return Ok(None);
        };
        let kind = caps.name("kind").and_then(|m| RecordKind::from_name(m.as_str()));
        let operator = caps.name("op").and_then(|m| Operator::from_suffix(m.as_str()));
        Ok(kind.zip(operator).map(|(kind, operator)| Self { kind, operator }))
    }
}

impl fmt::Display for PortName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.kind, self.operator)
    }
}

/// Ports the actor declares to the coupling runtime, grouped by operator.
#[must_use]
pub fn declared_ports() -> BTreeMap<Operator, Vec<String>> {
    Operator::ALL
        .iter()
        .map(|&op| {
            let names = RecordKind::ALL
                .iter()
                .map(|&kind| PortName::new(kind, op).to_string())
                .collect();
            (op, names)
        })
        .collect()
}

/// Read-only view telling the orchestrator which ports are active.
pub struct PortGateway<'a, I: CouplingInstance + ?Sized> {
    instance: &'a I,
}

impl<'a, I: CouplingInstance + ?Sized> PortGateway<'a, I> {
    /// Wraps a coupling instance.
    pub const fn new(instance: &'a I) -> Self {
        Self { instance }
    }

    /// Whether the port of `kind` for `operator` is connected to a peer.
    pub fn is_active(&self, kind: RecordKind, operator: Operator) -> bool {
        self.instance.is_connected(&PortName::new(kind, operator).to_string())
    }

    /// Record kinds connected for `operator`, in exchange order.
    pub fn active_kinds(&self, operator: Operator) -> Vec<RecordKind> {
        RecordKind::ALL
            .iter()
            .copied()
            .filter(|&kind| self.is_active(kind, operator))
            .collect()
    }
}
