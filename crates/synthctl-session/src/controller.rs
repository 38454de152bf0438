//! Synthesis session controller.
//!
//! Holds the single source of truth for a session: which definition is
//! active, the full parameter map, and the handle of the running instance.
//! Every engine call goes through here and is mirrored into the code console.

use synthctl_core::{
    ErrorReport, InstanceHandle, ParamValue, ParameterSet, RangePolicy, SessionState,
    SessionStatus, SynthDefinition,
};
use synthctl_engine::{EngineClient, InstanceInfo};

use crate::console::{CodeConsole, code};
use crate::{Result, SessionError};

/// Drives one synth definition on an engine
pub struct SessionController<E> {
    engine: E,
    definition: SynthDefinition,
    policy: RangePolicy,
    state: SessionState,
    instance: Option<InstanceHandle>,
    parameters: ParameterSet,
    console: CodeConsole,
    last_error: Option<ErrorReport>,
}

impl<E: EngineClient> SessionController<E> {
    /// Create an uninitialized session holding the definition's defaults
    pub fn new(engine: E, definition: SynthDefinition) -> Self {
        let parameters = definition.defaults();
        Self {
            engine,
            definition,
            policy: RangePolicy::default(),
            state: SessionState::Uninitialized,
            instance: None,
            parameters,
            console: CodeConsole::default(),
            last_error: None,
        }
    }

    pub fn with_policy(mut self, policy: RangePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_console_capacity(mut self, capacity: usize) -> Self {
        self.console = CodeConsole::new(capacity);
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn definition(&self) -> &SynthDefinition {
        &self.definition
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn instance(&self) -> Option<InstanceHandle> {
        self.instance
    }

    pub fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    pub fn console(&self) -> &CodeConsole {
        &self.console
    }

    pub fn last_error(&self) -> Option<&ErrorReport> {
        self.last_error.as_ref()
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            definition_id: self.definition.id.clone(),
            state: self.state,
            instance: self.instance,
            parameters: self.parameters.clone(),
            last_error: self.last_error.clone(),
        }
    }

    /// Whether `set_parameter(name, value)` would store a value under the
    /// current range policy
    pub fn accepts(&self, name: &str, value: ParamValue) -> bool {
        self.definition.conform(name, value, self.policy).is_ok()
    }

    /// Connect to the engine and register the definition.
    ///
    /// `defaults` override the definition's own defaults per name. On failure
    /// the connection is released and the session stays `Uninitialized`.
    pub fn initialize(&mut self, defaults: &ParameterSet) -> Result<()> {
        if self.state != SessionState::Uninitialized {
            return self.fail(self.invalid_state("initialize"));
        }

        let parameters = match self.definition.resolve(defaults, self.policy) {
            Ok(parameters) => parameters,
            Err(e) => return self.fail(e),
        };

        tracing::info!("Connecting to engine '{}'", self.engine.name());
        self.console.push(
            "Boot the engine",
            code::connect(),
            Some("Connects to the synthesis engine, starting it if needed"),
        );
        if let Err(e) = self.engine.connect() {
            self.engine.disconnect();
            return self.fail(e);
        }

        let description = self.definition.description.as_str();
        self.console.push(
            "Define the synth",
            code::register_definition(&self.definition),
            (!description.is_empty()).then_some(description),
        );
        if let Err(e) = self.engine.register_definition(&self.definition) {
            self.console.push("Disconnect", code::disconnect(), None);
            self.engine.disconnect();
            return self.fail(e);
        }

        self.parameters = parameters;
        self.state = SessionState::Ready;
        tracing::info!("Session ready: {}", self.definition.id);
        Ok(())
    }

    /// Store a new value for one parameter and forward it to the running
    /// instance, if any.
    ///
    /// Returns the value actually stored, after range policy and step snapping.
    /// A failed engine update is reported but the local value is kept.
    pub fn set_parameter(&mut self, name: &str, value: ParamValue) -> Result<ParamValue> {
        if !matches!(self.state, SessionState::Ready | SessionState::Running) {
            return self.fail(self.invalid_state("set a parameter"));
        }

        let value = match self.definition.conform(name, value, self.policy) {
            Ok(value) => value,
            Err(e) => return self.fail(e),
        };
        self.parameters.set(name, value);

        if let Some(instance) = self.instance {
            self.console.push(
                format!("Set {name}"),
                code::update_parameter(name, value),
                None,
            );
            if let Err(e) = self.engine.update_parameter(instance, name, value) {
                return self.fail(e);
            }
        }

        Ok(value)
    }

    /// Start a new instance with the current parameters, freeing any running one
    pub fn start(&mut self) -> Result<InstanceHandle> {
        if !matches!(self.state, SessionState::Ready | SessionState::Running) {
            return self.fail(self.invalid_state("start"));
        }

        if self.instance.is_some() {
            // The old handle is gone either way; a failed free must not block the restart
            if let Err(e) = self.stop() {
                tracing::warn!("Restarting after failed free: {}", e);
            }
        }

        self.console.push(
            "Play the synth",
            code::instantiate(&self.definition.id, &self.parameters),
            None,
        );
        match self
            .engine
            .instantiate(&self.definition.id, &self.parameters)
        {
            Ok(instance) => {
                tracing::info!("Started {} as {}", self.definition.id, instance);
                self.instance = Some(instance);
                self.state = SessionState::Running;
                Ok(instance)
            }
            Err(e) => {
                self.state = SessionState::Ready;
                self.fail(e)
            }
        }
    }

    /// Free the running instance. A no-op when nothing is running.
    ///
    /// The handle is cleared even when the engine reports a failure.
    pub fn stop(&mut self) -> Result<()> {
        let Some(instance) = self.instance.take() else {
            return Ok(());
        };

        self.state = SessionState::Ready;
        self.console.push("Free the synth", code::release(instance), None);
        match self.engine.release(instance) {
            Ok(()) => {
                tracing::info!("Freed {}", instance);
                Ok(())
            }
            Err(e) => self.fail(e),
        }
    }

    /// Free any running instance and close the engine connection.
    ///
    /// Safe in any state and idempotent. Free failures are logged, not returned.
    pub fn shutdown(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }

        if let Err(e) = self.stop() {
            tracing::warn!("Ignoring failure during shutdown: {}", e);
        }

        if self.state != SessionState::Uninitialized {
            self.console.push("Quit the engine", code::disconnect(), None);
            self.engine.disconnect();
        }

        self.state = SessionState::Closed;
        tracing::info!("Session closed");
    }

    /// Ask the engine which instances are running
    pub fn query_instances(&mut self) -> Result<Vec<InstanceInfo>> {
        if !matches!(self.state, SessionState::Ready | SessionState::Running) {
            return self.fail(self.invalid_state("query instances"));
        }

        self.console.push(
            "Show the server tree",
            code::instances(),
            Some("Lists the nodes currently running on the engine"),
        );
        match self.engine.instances() {
            Ok(instances) => Ok(instances),
            Err(e) => self.fail(e),
        }
    }

    fn invalid_state(&self, operation: &'static str) -> SessionError {
        SessionError::InvalidState {
            operation,
            state: self.state,
        }
    }

    /// Record an error as the session's last error and return it
    fn fail<T>(&mut self, err: impl Into<SessionError>) -> Result<T> {
        let err = err.into();
        tracing::warn!("{}", err);
        self.last_error = Some(err.report());
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, RecordingEngine, Recorder};
    use synthctl_core::{ErrorKind, catalog};

    fn session() -> (SessionController<RecordingEngine>, Recorder) {
        let (engine, recorder) = RecordingEngine::new();
        (SessionController::new(engine, catalog::sine()), recorder)
    }

    fn ready() -> (SessionController<RecordingEngine>, Recorder) {
        let (mut session, recorder) = session();
        session.initialize(&ParameterSet::new()).unwrap();
        recorder.clear();
        (session, recorder)
    }

    #[test]
    fn test_initialize() {
        let (mut session, recorder) = session();
        session
            .initialize(&ParameterSet::from([("frequency", 440.0), ("amplitude", 0.1)]))
            .unwrap();

        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.instance(), None);
        assert_eq!(
            recorder.calls(),
            vec![Call::Connect, Call::Register("sine".to_string())]
        );
        assert_eq!(session.console().len(), 2);
    }

    #[test]
    fn test_initialize_engine_unavailable() {
        let (mut session, recorder) = session();
        recorder.fail("connect");

        let err = session.initialize(&ParameterSet::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EngineUnavailable);
        assert!(err.kind().is_fatal());
        assert_eq!(session.state(), SessionState::Uninitialized);
        assert_eq!(recorder.calls(), vec![Call::Connect, Call::Disconnect]);
        assert_eq!(
            session.last_error().map(|e| e.kind),
            Some(ErrorKind::EngineUnavailable)
        );

        // The caller must not proceed
        assert_eq!(session.start().unwrap_err().kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn test_initialize_definition_rejected() {
        let (mut session, recorder) = session();
        recorder.fail("register");

        let err = session.initialize(&ParameterSet::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DefinitionRejected);
        assert_eq!(session.state(), SessionState::Uninitialized);
        assert_eq!(recorder.calls().last(), Some(&Call::Disconnect));
    }

    #[test]
    fn test_initialize_rejects_unknown_default() {
        let (mut session, recorder) = session();
        let err = session
            .initialize(&ParameterSet::from([("cutoff", 1000.0)]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
        assert!(recorder.calls().is_empty());
    }

    #[test]
    fn test_set_parameter_without_start_never_instantiates() {
        let (mut session, recorder) = ready();
        for value in [200.0, 300.0, 650.0] {
            session.set_parameter("frequency", value).unwrap();
        }
        session.set_parameter("amplitude", 0.25).unwrap();
        session.set_parameter("amplitude", 0.3).unwrap();

        assert_eq!(session.parameters().get("frequency"), Some(650.0));
        assert_eq!(session.parameters().get("amplitude"), Some(0.3));
        assert_eq!(session.parameters().len(), 2);
        assert!(recorder.calls().is_empty());
    }

    #[test]
    fn test_start_twice_frees_then_instantiates() {
        let (mut session, recorder) = ready();
        let first = session.start().unwrap();
        session.set_parameter("frequency", 660.0).unwrap();
        recorder.clear();

        let second = session.start().unwrap();
        assert_ne!(first, second);
        assert_eq!(
            recorder.calls(),
            vec![
                Call::Release(first),
                Call::Instantiate(
                    "sine".to_string(),
                    ParameterSet::from([("frequency", 660.0), ("amplitude", 0.1)])
                ),
            ]
        );
        assert_eq!(session.instance(), Some(second));
    }

    #[test]
    fn test_stop_when_idle_is_noop() {
        let (mut session, recorder) = ready();
        session.stop().unwrap();
        assert!(recorder.calls().is_empty());
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[test]
    fn test_stop_failure_clears_handle() {
        let (mut session, recorder) = ready();
        session.start().unwrap();
        recorder.fail("release");

        let err = session.stop().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StopFailed);
        assert_eq!(session.instance(), None);
        assert_eq!(session.state(), SessionState::Ready);

        // Not blocked by a stale handle
        recorder.clear();
        session.start().unwrap();
        assert!(matches!(recorder.calls().as_slice(), [Call::Instantiate(..)]));
    }

    #[test]
    fn test_start_failure_leaves_session_usable() {
        let (mut session, recorder) = ready();
        recorder.fail("instantiate");
        let err = session.start().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StartFailed);
        assert!(!err.kind().is_fatal());
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.instance(), None);

        recorder.succeed("instantiate");
        session.start().unwrap();
        assert_eq!(session.state(), SessionState::Running);
    }

    #[test]
    fn test_sine_scenario() {
        let (engine, recorder) = RecordingEngine::new();
        let mut session = SessionController::new(engine, catalog::sine());
        session
            .initialize(&ParameterSet::from([("frequency", 440.0), ("amplitude", 0.1)]))
            .unwrap();
        recorder.clear();

        let node = session.start().unwrap();
        session.set_parameter("frequency", 880.0).unwrap();

        assert_eq!(
            recorder.calls(),
            vec![
                Call::Instantiate(
                    "sine".to_string(),
                    ParameterSet::from([("frequency", 440.0), ("amplitude", 0.1)])
                ),
                Call::Update(node, "frequency".to_string(), 880.0),
            ]
        );
        assert_eq!(
            session.parameters(),
            &ParameterSet::from([("frequency", 880.0), ("amplitude", 0.1)])
        );
        assert_eq!(
            session.console().latest().unwrap().code,
            r#"engine.update_parameter(synth, "frequency", 880.0)?;"#
        );
    }

    #[test]
    fn test_out_of_range_is_clamped() {
        let (mut session, recorder) = ready();
        let node = session.start().unwrap();
        recorder.clear();

        assert_eq!(session.set_parameter("frequency", 5000.0).unwrap(), 1760.0);
        assert_eq!(session.parameters().get("frequency"), Some(1760.0));
        assert_eq!(
            recorder.calls(),
            vec![Call::Update(node, "frequency".to_string(), 1760.0)]
        );
    }

    #[test]
    fn test_out_of_range_is_rejected_under_reject_policy() {
        let (engine, recorder) = RecordingEngine::new();
        let mut session =
            SessionController::new(engine, catalog::sine()).with_policy(RangePolicy::Reject);
        session.initialize(&ParameterSet::new()).unwrap();
        session.start().unwrap();
        recorder.clear();

        let err = session.set_parameter("frequency", 5000.0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
        assert_eq!(session.parameters().get("frequency"), Some(440.0));
        assert!(recorder.calls().is_empty());
    }

    #[test]
    fn test_accepts_follows_range_policy() {
        let clamping = SessionController::new(RecordingEngine::new().0, catalog::sine());
        assert!(clamping.accepts("frequency", 5000.0));
        assert!(!clamping.accepts("frequency", f32::NAN));
        assert!(!clamping.accepts("cutoff", 1.0));

        let rejecting = SessionController::new(RecordingEngine::new().0, catalog::sine())
            .with_policy(RangePolicy::Reject);
        assert!(rejecting.accepts("frequency", 500.0));
        assert!(!rejecting.accepts("frequency", 5000.0));
    }

    #[test]
    fn test_unknown_and_nan_values_rejected() {
        let (mut session, recorder) = ready();
        assert_eq!(
            session.set_parameter("cutoff", 1.0).unwrap_err().kind(),
            ErrorKind::InvalidParameter
        );
        assert_eq!(
            session.set_parameter("amplitude", f32::NAN).unwrap_err().kind(),
            ErrorKind::InvalidParameter
        );
        assert_eq!(session.parameters(), &catalog::sine().defaults());
        assert!(recorder.calls().is_empty());
    }

    #[test]
    fn test_update_failure_keeps_local_value() {
        let (mut session, recorder) = ready();
        session.start().unwrap();
        recorder.fail("update");

        let err = session.set_parameter("amplitude", 0.4).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpdateFailed);
        assert_eq!(session.parameters().get("amplitude"), Some(0.4));
        assert_eq!(session.state(), SessionState::Running);
        assert_eq!(
            session.status().last_error.map(|e| e.kind),
            Some(ErrorKind::UpdateFailed)
        );
    }

    #[test]
    fn test_set_parameter_requires_initialize() {
        let (mut session, recorder) = session();
        let err = session.set_parameter("frequency", 880.0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert!(recorder.calls().is_empty());
    }

    #[test]
    fn test_shutdown_while_running() {
        let (mut session, recorder) = ready();
        let node = session.start().unwrap();
        recorder.fail("update");
        let _ = session.set_parameter("frequency", 500.0);
        recorder.clear();

        session.shutdown();
        assert_eq!(recorder.calls(), vec![Call::Release(node), Call::Disconnect]);
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(session.instance(), None);

        // Idempotent
        session.shutdown();
        assert_eq!(recorder.calls().len(), 2);
        assert_eq!(session.start().unwrap_err().kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn test_shutdown_swallows_stop_failure() {
        let (mut session, recorder) = ready();
        let node = session.start().unwrap();
        recorder.fail("release");
        recorder.clear();

        session.shutdown();
        assert_eq!(recorder.calls(), vec![Call::Release(node), Call::Disconnect]);
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn test_shutdown_before_initialize() {
        let (mut session, recorder) = session();
        session.shutdown();
        assert!(recorder.calls().is_empty());
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn test_query_instances() {
        let (mut session, recorder) = ready();
        session.start().unwrap();
        recorder.clear();

        let instances = session.query_instances().unwrap();
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].definition, "sine");
        assert_eq!(recorder.calls(), vec![Call::Instances]);
        assert_eq!(
            session.console().latest().unwrap().title,
            "Show the server tree"
        );
    }

    #[test]
    fn test_status_snapshot() {
        let (mut session, _recorder) = ready();
        let node = session.start().unwrap();
        let status = session.status();
        assert_eq!(status.definition_id, "sine");
        assert_eq!(status.state, SessionState::Running);
        assert_eq!(status.instance, Some(node));
        assert_eq!(status.parameters, catalog::sine().defaults());
        assert!(status.last_error.is_none());
    }
}
