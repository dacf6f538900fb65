//! Interface to the multiscale coupling runtime.
//!
//! The actor talks to the runtime only through `CouplingInstance`. Sends and
//! receives block until the peer has produced the message; that is the only
//! suspension point of the actor.

/// In-process runtime over crossbeam channels.
pub mod loopback;

pub use loopback::{LoopbackInstance, Topology};

use serde::{Deserialize, Serialize};

use crate::error::CouplingError;

/// A timestamped message on a conduit.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Simulation time the data belongs to.
    pub timestamp: f64,
    /// Time of the sender's next message in the same scope; `None` if this is the last one.
    pub next_timestamp: Option<f64>,
    /// Encoded payload.
    pub data: Vec<u8>,
}

impl Message {
    /// Creates a message.
    #[must_use]
    pub fn new(timestamp: f64, next_timestamp: Option<f64>, data: Vec<u8>) -> Self {
        Self {
            timestamp,
            next_timestamp,
            data,
        }
    }
}

/// A setting value as stored by the coupling runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    /// Boolean setting.
    Bool(bool),
    /// Integer setting.
    Int(i64),
    /// Floating point setting.
    Float(f64),
    /// String setting.
    Str(String),
    /// List of floats.
    FloatList(Vec<f64>),
}

impl SettingValue {
    /// Numeric value; integers are widened.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Boolean value.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// String value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) => Some(v),
            _ => None,
        }
    }
}

impl From<f64> for SettingValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<i64> for SettingValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for SettingValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for SettingValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

/// One instance of a component in a coupled simulation.
pub trait CouplingInstance {
    /// Whether another outer iteration should run.
    ///
    /// Controlled entirely by the peers: returns false once they signal that
    /// no further reuse will happen.
    fn reuse_instance(&mut self) -> bool;

    /// Whether `port` is connected to a peer in the current topology.
    fn is_connected(&self, port: &str) -> bool;

    /// Looks up a setting for this instance.
    fn get_setting(&self, name: &str) -> Option<SettingValue>;

    /// Receives the next message on `port`, blocking until it is available.
    ///
    /// # Errors
    ///
    /// `PortNotConnected` if the topology did not connect `port`.
    fn receive(&mut self, port: &str) -> Result<Message, CouplingError>;

    /// Sends a message on `port`.
    fn send(&mut self, port: &str, message: Message) -> Result<(), CouplingError>;
}
