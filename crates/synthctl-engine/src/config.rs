//! Engine selection.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::{EngineClient, LoopbackEngine, ProcessEngine};

fn default_response_timeout_ms() -> u64 {
    crate::process::DEFAULT_RESPONSE_TIMEOUT.as_millis() as u64
}

/// Which engine a session talks to
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EngineConfig {
    /// In-process engine without audio output
    #[default]
    Loopback,

    /// Engine host program speaking the line protocol
    Process {
        /// Host executable
        program: PathBuf,

        /// Extra arguments passed to the host
        #[serde(default)]
        args: Vec<String>,

        /// Bound on every response wait
        #[serde(default = "default_response_timeout_ms")]
        response_timeout_ms: u64,
    },
}

impl EngineConfig {
    pub fn process(program: impl Into<PathBuf>) -> Self {
        Self::Process {
            program: program.into(),
            args: Vec::new(),
            response_timeout_ms: default_response_timeout_ms(),
        }
    }

    /// Construct the client described by this configuration
    pub fn build(&self) -> Box<dyn EngineClient> {
        match self {
            Self::Loopback => Box::new(LoopbackEngine::new()),
            Self::Process {
                program,
                args,
                response_timeout_ms,
            } => Box::new(
                ProcessEngine::new(program)
                    .with_args(args.iter().cloned())
                    .with_timeout(Duration::from_millis(*response_timeout_ms)),
            ),
        }
    }
}
