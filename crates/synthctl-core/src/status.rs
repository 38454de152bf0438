//! Session state and the snapshots handed to the presentation layer.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ParameterSet;

/// Engine-side node id of a running synth instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceHandle(pub i32);

impl fmt::Display for InstanceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node {}", self.0)
    }
}

/// Lifecycle of a session
///
/// `Uninitialized -> Ready <-> Running`, and any state `-> Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionState {
    #[default]
    Uninitialized,
    /// Connected and definition registered, no instance running
    Ready,
    /// An instance is running on the engine
    Running,
    /// Terminal
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Classification of every failure a session can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Engine cannot be reached or failed to start (fatal to the session)
    EngineUnavailable,
    /// Engine refused the synth definition (fatal to the session)
    DefinitionRejected,
    /// Engine refused to instantiate; the session stays usable
    StartFailed,
    /// One parameter update was lost; local state stays authoritative
    UpdateFailed,
    /// Free request failed; the handle is cleared locally anyway
    StopFailed,
    /// Unknown parameter name, NaN, or out-of-range under the reject policy
    InvalidParameter,
    /// Operation not valid in the current session state
    InvalidState,
}

impl ErrorKind {
    /// Whether the session can no longer be used after this error
    pub fn is_fatal(self) -> bool {
        matches!(self, Self::EngineUnavailable | Self::DefinitionRejected)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A structured error as shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorReport {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Everything the presentation layer needs to draw the session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub definition_id: String,
    pub state: SessionState,
    pub instance: Option<InstanceHandle>,
    pub parameters: ParameterSet,
    pub last_error: Option<ErrorReport>,
}

impl SessionStatus {
    pub fn is_running(&self) -> bool {
        self.instance.is_some()
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.state, self.definition_id)?;
        if let Some(instance) = self.instance {
            write!(f, " ({instance})")?;
        }
        for (name, value) in self.parameters.iter() {
            write!(f, " {name}={value}")?;
        }
        Ok(())
    }
}

/// One entry of the code console: the client call issued for an operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleEntry {
    /// Monotonic sequence number within a session
    pub seq: u64,
    pub title: String,
    /// Client source for the operation
    pub code: String,
    pub description: Option<String>,
}
