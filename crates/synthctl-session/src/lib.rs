//! Synthesis session management.
//!
//! `SessionController` owns the state of one synth session and drives the
//! engine. `SessionWorker` runs a controller on its own thread so engine I/O
//! never blocks the presentation layer, applying events strictly in order.

pub mod config;
pub mod console;
pub mod controller;
pub mod preset;
pub mod worker;

pub use config::{ConfigError, SessionConfig};
pub use console::CodeConsole;
pub use controller::SessionController;
pub use preset::{Preset, PresetError};
pub use worker::SessionWorker;

use synthctl_core::{ErrorKind, ErrorReport, SessionState};
use synthctl_engine::EngineError;

/// Errors reported by session operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    /// The engine refused or failed a call
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Unknown parameter, NaN, or a value the range policy rejected
    #[error("Invalid parameter: {0}")]
    Parameter(#[from] synthctl_core::Error),

    /// Operation not valid in the current state
    #[error("Cannot {operation} while the session is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Engine(e) => e.kind(),
            Self::Parameter(_) => ErrorKind::InvalidParameter,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
        }
    }

    /// Structured form for the presentation layer
    pub fn report(&self) -> ErrorReport {
        let message = match self {
            Self::Engine(e) => e.message().to_string(),
            Self::Parameter(e) => e.to_string(),
            Self::InvalidState { .. } => self.to_string(),
        };
        ErrorReport::new(self.kind(), message)
    }
}

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

/// Recording engine for controller and worker tests
#[cfg(test)]
pub(crate) mod testing {
    use std::collections::{BTreeMap, HashSet};
    use std::sync::{Arc, Mutex, MutexGuard};
    use synthctl_core::{InstanceHandle, ParamValue, ParameterSet, SynthDefinition};
    use synthctl_engine::{EngineClient, EngineError, InstanceInfo};

    #[derive(Debug, Clone, PartialEq)]
    pub enum Call {
        Connect,
        Register(String),
        Instantiate(String, ParameterSet),
        Update(InstanceHandle, String, ParamValue),
        Release(InstanceHandle),
        Instances,
        Disconnect,
    }

    #[derive(Default)]
    struct Shared {
        calls: Vec<Call>,
        failing: HashSet<&'static str>,
        running: BTreeMap<InstanceHandle, InstanceInfo>,
    }

    /// Engine that records every call; individual calls can be made to fail
    pub struct RecordingEngine {
        shared: Arc<Mutex<Shared>>,
        next_node: i32,
    }

    /// Test-side view of a `RecordingEngine`
    #[derive(Clone)]
    pub struct Recorder(Arc<Mutex<Shared>>);

    impl RecordingEngine {
        pub fn new() -> (Self, Recorder) {
            let shared = Arc::new(Mutex::new(Shared::default()));
            let engine = Self {
                shared: Arc::clone(&shared),
                next_node: 1000,
            };
            (engine, Recorder(shared))
        }

        fn record(&self, call: Call, op: &str) -> Result<MutexGuard<'_, Shared>, String> {
            let mut shared = self.shared.lock().unwrap();
            shared.calls.push(call);
            if shared.failing.contains(op) {
                Err(format!("injected {op} failure"))
            } else {
                Ok(shared)
            }
        }
    }

    impl Recorder {
        pub fn calls(&self) -> Vec<Call> {
            self.0.lock().unwrap().calls.clone()
        }

        /// Forget recorded calls; injected failures stay
        pub fn clear(&self) {
            self.0.lock().unwrap().calls.clear();
        }

        pub fn fail(&self, op: &'static str) {
            self.0.lock().unwrap().failing.insert(op);
        }

        pub fn succeed(&self, op: &'static str) {
            self.0.lock().unwrap().failing.remove(op);
        }
    }

    impl EngineClient for RecordingEngine {
        fn name(&self) -> &str {
            "recording"
        }

        fn connect(&mut self) -> Result<(), EngineError> {
            self.record(Call::Connect, "connect")
                .map(drop)
                .map_err(EngineError::Unavailable)
        }

        fn register_definition(&mut self, definition: &SynthDefinition) -> Result<(), EngineError> {
            self.record(Call::Register(definition.id.clone()), "register")
                .map(drop)
                .map_err(EngineError::DefinitionRejected)
        }

        fn instantiate(
            &mut self,
            definition_id: &str,
            parameters: &ParameterSet,
        ) -> Result<InstanceHandle, EngineError> {
            let call = Call::Instantiate(definition_id.to_string(), parameters.clone());
            let instance = InstanceHandle(self.next_node);
            let mut shared = self
                .record(call, "instantiate")
                .map_err(EngineError::StartFailed)?;
            shared.running.insert(
                instance,
                InstanceInfo {
                    instance,
                    definition: definition_id.to_string(),
                    parameters: parameters.clone(),
                },
            );
            drop(shared);
            self.next_node += 1;
            Ok(instance)
        }

        fn update_parameter(
            &mut self,
            instance: InstanceHandle,
            name: &str,
            value: ParamValue,
        ) -> Result<(), EngineError> {
            self.record(Call::Update(instance, name.to_string(), value), "update")
                .map(drop)
                .map_err(EngineError::UpdateFailed)
        }

        fn release(&mut self, instance: InstanceHandle) -> Result<(), EngineError> {
            let mut shared = self
                .record(Call::Release(instance), "release")
                .map_err(EngineError::StopFailed)?;
            shared.running.remove(&instance);
            Ok(())
        }

        fn instances(&mut self) -> Result<Vec<InstanceInfo>, EngineError> {
            let shared = self
                .record(Call::Instances, "instances")
                .map_err(EngineError::Unavailable)?;
            Ok(shared.running.values().cloned().collect())
        }

        fn disconnect(&mut self) {
            let mut shared = self.shared.lock().unwrap();
            shared.calls.push(Call::Disconnect);
            shared.running.clear();
        }
    }
}
