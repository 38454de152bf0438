//! Engine client that drives an engine host in a child process.
//!
//! # Architecture
//!
//! - `connect` spawns the host program with piped stdin/stdout
//! - Requests are written as JSON lines to the host's stdin
//! - A reader thread forwards stdout lines into a channel, so every wait for a
//!   response is bounded by `recv_timeout`
//! - A missing or unparsable response marks the host as dead: it is killed and
//!   the next call reports the failure instead of reading a stale reply
//!
//! The host program can be the bundled `synthctl-engine-host`, or any bridge
//! to a real synthesis server that speaks the same line protocol.

use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use synthctl_core::{InstanceHandle, ParamValue, ParameterSet, SynthDefinition};

use crate::{EngineClient, EngineError, EngineRequest, EngineResponse, InstanceInfo, Result};

/// Default time to wait for any single response
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Time the host gets to exit after `Quit` before it is killed
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// A running host process
struct HostProcess {
    child: Child,
    stdin: ChildStdin,
    responses: Receiver<String>,
    reader: Option<JoinHandle<()>>,
}

impl HostProcess {
    fn is_alive(&mut self) -> bool {
        self.child.try_wait().ok().flatten().is_none()
    }

    /// Ask the host to quit, then make sure it is gone
    fn shutdown(mut self, graceful: bool) {
        if graceful {
            if let Ok(json) = serde_json::to_string(&EngineRequest::Quit) {
                let _ = writeln!(self.stdin, "{json}");
                let _ = self.stdin.flush();
            }
        }
        // Closing stdin ends the host's request loop even if Quit was lost
        drop(self.stdin);

        let start = Instant::now();
        while graceful && self.child.try_wait().ok().flatten().is_none() {
            if start.elapsed() >= SHUTDOWN_GRACE {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }

        if self.child.try_wait().ok().flatten().is_none() {
            tracing::warn!("Engine host did not exit, killing it");
            let _ = self.child.kill();
        }
        let _ = self.child.wait();

        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
    }
}

/// Out-of-process engine client
pub struct ProcessEngine {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
    host: Option<HostProcess>,
    engine_name: String,
}

impl ProcessEngine {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        let program = program.into();
        let engine_name = program
            .file_name()
            .map_or_else(|| "process".to_string(), |n| n.to_string_lossy().to_string());
        Self {
            program,
            args: Vec::new(),
            timeout: DEFAULT_RESPONSE_TIMEOUT,
            host: None,
            engine_name,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_connected(&self) -> bool {
        self.host.is_some()
    }

    fn spawn_host(&self) -> std::result::Result<HostProcess, String> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| format!("Failed to spawn {}: {e}", self.program.display()))?;

        let stdin = child.stdin.take().ok_or("Failed to get host stdin")?;
        let stdout = child.stdout.take().ok_or("Failed to get host stdout")?;

        let (tx, responses) = crossbeam_channel::unbounded();
        let reader = std::thread::Builder::new()
            .name("engine-host-reader".to_string())
            .spawn(move || {
                for line in BufReader::new(stdout).lines() {
                    let Ok(line) = line else { break };
                    if line.trim().is_empty() {
                        continue;
                    }
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            })
            .map_err(|e| format!("Failed to start reader thread: {e}"))?;

        Ok(HostProcess {
            child,
            stdin,
            responses,
            reader: Some(reader),
        })
    }

    /// Wait for the next response line, bounded by the timeout
    fn receive(&mut self, fail: fn(String) -> EngineError) -> Result<EngineResponse> {
        let timeout = self.timeout;
        let host = self
            .host
            .as_mut()
            .ok_or_else(|| fail("not connected".to_string()))?;

        let outcome: std::result::Result<EngineResponse, String> =
            match host.responses.recv_timeout(timeout) {
                Ok(line) => serde_json::from_str(&line)
                    .map_err(|e| format!("Failed to parse response: {e}")),
                Err(RecvTimeoutError::Timeout) => {
                    Err(format!("no response within {} ms", timeout.as_millis()))
                }
                Err(RecvTimeoutError::Disconnected) => {
                    Err("engine host closed its output".to_string())
                }
            };

        outcome.map_err(|message| {
            // Replies can no longer be paired with requests
            self.drop_host(false);
            fail(message)
        })
    }

    /// Send a request and wait for its response
    fn request(
        &mut self,
        request: &EngineRequest,
        fail: fn(String) -> EngineError,
    ) -> Result<EngineResponse> {
        let host = self
            .host
            .as_mut()
            .ok_or_else(|| fail("not connected".to_string()))?;

        if !host.is_alive() {
            self.drop_host(false);
            return Err(fail("engine host has exited".to_string()));
        }

        let json = serde_json::to_string(request)
            .map_err(|e| fail(format!("Failed to serialize request: {e}")))?;
        tracing::trace!("-> {}", json);

        if let Err(e) = writeln!(host.stdin, "{json}").and_then(|()| host.stdin.flush()) {
            self.drop_host(false);
            return Err(fail(format!("Failed to write to engine host: {e}")));
        }

        match self.receive(fail)? {
            EngineResponse::Error { message } => Err(fail(message)),
            response => Ok(response),
        }
    }

    fn drop_host(&mut self, graceful: bool) {
        if let Some(host) = self.host.take() {
            host.shutdown(graceful);
        }
    }
}

fn unexpected(response: &EngineResponse) -> String {
    format!("unexpected response: {response:?}")
}

impl EngineClient for ProcessEngine {
    fn name(&self) -> &str {
        &self.engine_name
    }

    fn connect(&mut self) -> Result<()> {
        if self.host.is_some() {
            return Ok(());
        }

        tracing::info!("Starting engine host: {}", self.program.display());
        let host = self.spawn_host().map_err(EngineError::Unavailable)?;
        self.host = Some(host);

        match self.receive(EngineError::Unavailable)? {
            EngineResponse::Ready { engine, version } => {
                tracing::info!("Engine host ready: {} {}", engine, version);
                self.engine_name = engine;
                Ok(())
            }
            EngineResponse::Error { message } => {
                self.drop_host(false);
                Err(EngineError::Unavailable(message))
            }
            other => {
                self.drop_host(false);
                Err(EngineError::Unavailable(unexpected(&other)))
            }
        }
    }

    fn register_definition(&mut self, definition: &SynthDefinition) -> Result<()> {
        let request = EngineRequest::RegisterDefinition {
            definition: definition.clone(),
        };
        match self.request(&request, EngineError::DefinitionRejected)? {
            EngineResponse::Registered { .. } => Ok(()),
            other => Err(EngineError::DefinitionRejected(unexpected(&other))),
        }
    }

    fn instantiate(
        &mut self,
        definition_id: &str,
        parameters: &ParameterSet,
    ) -> Result<InstanceHandle> {
        let request = EngineRequest::Instantiate {
            definition: definition_id.to_string(),
            parameters: parameters.clone(),
        };
        match self.request(&request, EngineError::StartFailed)? {
            EngineResponse::Instantiated { instance } => Ok(instance),
            other => Err(EngineError::StartFailed(unexpected(&other))),
        }
    }

    fn update_parameter(
        &mut self,
        instance: InstanceHandle,
        name: &str,
        value: ParamValue,
    ) -> Result<()> {
        let request = EngineRequest::UpdateParameter {
            instance,
            name: name.to_string(),
            value,
        };
        match self.request(&request, EngineError::UpdateFailed)? {
            EngineResponse::Updated => Ok(()),
            other => Err(EngineError::UpdateFailed(unexpected(&other))),
        }
    }

    fn release(&mut self, instance: InstanceHandle) -> Result<()> {
        match self.request(&EngineRequest::Release { instance }, EngineError::StopFailed)? {
            EngineResponse::Released => Ok(()),
            other => Err(EngineError::StopFailed(unexpected(&other))),
        }
    }

    fn instances(&mut self) -> Result<Vec<InstanceInfo>> {
        match self.request(&EngineRequest::QueryInstances, EngineError::Unavailable)? {
            EngineResponse::Instances { instances } => Ok(instances),
            other => Err(EngineError::Unavailable(unexpected(&other))),
        }
    }

    fn disconnect(&mut self) {
        if self.host.is_some() {
            tracing::info!("Stopping engine host");
            self.drop_host(true);
        }
    }
}

impl Drop for ProcessEngine {
    fn drop(&mut self) {
        self.disconnect();
    }
}
