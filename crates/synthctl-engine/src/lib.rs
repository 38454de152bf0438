//! Audio engine client abstraction.
//!
//! This crate defines the `EngineClient` trait that every way of reaching a
//! synthesis engine implements, so the session controller can drive an
//! out-of-process engine host and the in-process loopback engine the same way.

pub mod config;
pub mod host;
pub mod loopback;
pub mod process;
pub mod protocol;

pub use config::EngineConfig;
pub use host::EngineHost;
pub use loopback::LoopbackEngine;
pub use process::ProcessEngine;
pub use protocol::{EngineRequest, EngineResponse};

use serde::{Deserialize, Serialize};
use synthctl_core::{ErrorKind, InstanceHandle, ParamValue, ParameterSet, SynthDefinition};

/// A running synth as reported by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceInfo {
    pub instance: InstanceHandle,
    pub definition: String,
    pub parameters: ParameterSet,
}

/// Connection to an external synthesis engine
///
/// Calls may block on I/O. Callers serialize them; implementations are not
/// required to support concurrent use.
pub trait EngineClient: Send {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Establish the connection (boots the engine if needed)
    fn connect(&mut self) -> Result<(), EngineError>;

    /// Make a definition available for instantiation
    fn register_definition(&mut self, definition: &SynthDefinition) -> Result<(), EngineError>;

    /// Start a new instance of a registered definition
    fn instantiate(
        &mut self,
        definition_id: &str,
        parameters: &ParameterSet,
    ) -> Result<InstanceHandle, EngineError>;

    /// Change one parameter of a running instance
    fn update_parameter(
        &mut self,
        instance: InstanceHandle,
        name: &str,
        value: ParamValue,
    ) -> Result<(), EngineError>;

    /// Free a running instance
    fn release(&mut self, instance: InstanceHandle) -> Result<(), EngineError>;

    /// List the instances currently running on the engine
    fn instances(&mut self) -> Result<Vec<InstanceInfo>, EngineError>;

    /// Close the connection. Never fails; safe to call when not connected.
    fn disconnect(&mut self);
}

impl<E: EngineClient + ?Sized> EngineClient for Box<E> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn connect(&mut self) -> Result<(), EngineError> {
        (**self).connect()
    }

    fn register_definition(&mut self, definition: &SynthDefinition) -> Result<(), EngineError> {
        (**self).register_definition(definition)
    }

    fn instantiate(
        &mut self,
        definition_id: &str,
        parameters: &ParameterSet,
    ) -> Result<InstanceHandle, EngineError> {
        (**self).instantiate(definition_id, parameters)
    }

    fn update_parameter(
        &mut self,
        instance: InstanceHandle,
        name: &str,
        value: ParamValue,
    ) -> Result<(), EngineError> {
        (**self).update_parameter(instance, name, value)
    }

    fn release(&mut self, instance: InstanceHandle) -> Result<(), EngineError> {
        (**self).release(instance)
    }

    fn instances(&mut self) -> Result<Vec<InstanceInfo>, EngineError> {
        (**self).instances()
    }

    fn disconnect(&mut self) {
        (**self).disconnect();
    }
}

/// Engine-side failures, one variant per client call family
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("Engine unavailable: {0}")]
    Unavailable(String),

    #[error("Definition rejected: {0}")]
    DefinitionRejected(String),

    #[error("Start failed: {0}")]
    StartFailed(String),

    #[error("Update failed: {0}")]
    UpdateFailed(String),

    #[error("Stop failed: {0}")]
    StopFailed(String),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unavailable(_) => ErrorKind::EngineUnavailable,
            Self::DefinitionRejected(_) => ErrorKind::DefinitionRejected,
            Self::StartFailed(_) => ErrorKind::StartFailed,
            Self::UpdateFailed(_) => ErrorKind::UpdateFailed,
            Self::StopFailed(_) => ErrorKind::StopFailed,
        }
    }

    /// The detail message without the kind prefix
    pub fn message(&self) -> &str {
        match self {
            Self::Unavailable(m)
            | Self::DefinitionRejected(m)
            | Self::StartFailed(m)
            | Self::UpdateFailed(m)
            | Self::StopFailed(m) => m,
        }
    }
}

/// Result type alias for engine calls
pub type Result<T, E = EngineError> = std::result::Result<T, E>;
