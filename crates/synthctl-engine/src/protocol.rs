//! Control protocol between `ProcessEngine` and an engine host process.
//!
//! # Framing
//!
//! One JSON document per line on the host's stdin (requests) and stdout
//! (responses). The host writes `Ready` once at startup, then answers every
//! request except `Quit` with exactly one response, in order. Diagnostics go
//! to stderr so they never interleave with responses.

use serde::{Deserialize, Serialize};
use synthctl_core::{InstanceHandle, ParamValue, ParameterSet, SynthDefinition};

use crate::InstanceInfo;

/// Messages sent from the controller to the engine host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EngineRequest {
    /// Register a definition
    RegisterDefinition { definition: SynthDefinition },

    /// Create an instance with a full parameter set
    Instantiate {
        definition: String,
        parameters: ParameterSet,
    },

    /// Set one parameter on a running instance
    UpdateParameter {
        instance: InstanceHandle,
        name: String,
        value: ParamValue,
    },

    /// Free an instance
    Release { instance: InstanceHandle },

    /// List running instances
    QueryInstances,

    /// Shut the host down. No response is sent.
    Quit,
}

/// Messages sent from the engine host back to the controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EngineResponse {
    /// Host is up and connected to its engine
    Ready { engine: String, version: String },

    Registered { definition: String },

    Instantiated { instance: InstanceHandle },

    Updated,

    Released,

    Instances { instances: Vec<InstanceInfo> },

    /// The request failed
    Error { message: String },
}

impl EngineRequest {
    /// Short label for logs
    pub fn label(&self) -> &'static str {
        match self {
            Self::RegisterDefinition { .. } => "register_definition",
            Self::Instantiate { .. } => "instantiate",
            Self::UpdateParameter { .. } => "update_parameter",
            Self::Release { .. } => "release",
            Self::QueryInstances => "query_instances",
            Self::Quit => "quit",
        }
    }
}
