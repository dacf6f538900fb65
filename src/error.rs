//! Error types for the coupling actor.
//!
//! All errors are strongly typed using thiserror. Nothing in this crate
//! retries: a failure is either an expected "no data this round" signal
//! (which never becomes an error) or it ends the session.

use thiserror::Error;

use crate::engine::SimError;

/// Errors raised while reading actor settings from the coupling runtime.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Required setting '{name}' is missing")]
    Missing {
        name: String,
    },

    #[error("Setting '{name}' has the wrong type: expected {expected}")]
    WrongType {
        name: String,
        expected: &'static str,
    },

    #[error("Setting '{name}' has an invalid value: {reason}")]
    InvalidValue {
        name: String,
        reason: String,
    },
}

/// Errors raised while loading or validating the simulation configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration '{path}': {message}")]
    Unreadable {
        path: String,
        message: String,
    },

    #[error("Failed to parse configuration '{path}': {message}")]
    Malformed {
        path: String,
        message: String,
    },

    #[error("Invalid numerics: {reason}")]
    InvalidNumerics {
        reason: String,
    },
}

/// Errors raised by the coupling runtime or by misuse of its ports.
#[derive(Debug, Error)]
pub enum CouplingError {
    #[error("Port '{port}' is not connected")]
    PortNotConnected {
        port: String,
    },

    #[error("Port '{port}' is not declared by this instance")]
    UndeclaredPort {
        port: String,
    },

    #[error("Peer on port '{port}' disconnected")]
    PeerDisconnected {
        port: String,
    },

    #[error("Failed to encode '{record}' record: {message}")]
    Encode {
        record: String,
        message: String,
    },

    #[error("Failed to decode '{record}' record: {message}")]
    Decode {
        record: String,
        message: String,
    },

    #[error("Port '{port}' is named for operator '{named}' but declared under '{declared}'")]
    MisdeclaredPort {
        port: String,
        named: String,
        declared: String,
    },

    #[error("Port name pattern is invalid: {message}")]
    PortPattern {
        message: String,
    },

    #[error("Port '{port}' carries '{expected}' records but received '{actual}'")]
    KindMismatch {
        port: String,
        expected: String,
        actual: String,
    },
}

/// Errors caused by calling the actor out of sequence.
#[derive(Debug, Error)]
pub enum UsageError {
    #[error("Actor already finished; it cannot be run again")]
    AlreadyFinished,

    #[error("Actor has not been prepared")]
    NotPrepared,
}

/// Top-level error type for the coupling actor.
#[derive(Debug, Error)]
pub enum ActorError {
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Coupling error: {0}")]
    Coupling(#[from] CouplingError),

    #[error("Simulation failed at t={time}: {code}")]
    SimulationFailed {
        code: SimError,
        time: f64,
    },

    #[error("Usage error: {0}")]
    Usage(#[from] UsageError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl ActorError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a settings error.
    #[must_use]
    pub const fn is_settings(&self) -> bool {
        matches!(self, Self::Settings(_))
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Returns true if this is a coupling error.
    #[must_use]
    pub const fn is_coupling(&self) -> bool {
        matches!(self, Self::Coupling(_))
    }

    /// Returns true if the simulation engine reported an error.
    #[must_use]
    pub const fn is_simulation(&self) -> bool {
        matches!(self, Self::SimulationFailed { .. })
    }

    /// Returns true if this is a usage error.
    #[must_use]
    pub const fn is_usage(&self) -> bool {
        matches!(self, Self::Usage(_))
    }

    /// Returns true if this error is retryable.
    ///
    /// Always false: simulation state is not resumable after a failure and
    /// the transport owns any retry policy.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        false
    }
}

/// Result type alias for actor operations.
pub type ActorResult<T> = Result<T, ActorError>;
