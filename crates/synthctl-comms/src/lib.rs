//! Channels between the presentation layer and the session worker.
//!
//! The presentation layer only ever sends `UiEvent`s and reads
//! `SessionEvent`s; it never touches the engine or holds its own copy of the
//! parameter values.

use crossbeam_channel::{Receiver, Sender};
use synthctl_core::{ConsoleEntry, ErrorReport, ParamValue, SessionStatus};
use synthctl_engine::InstanceInfo;

/// Events sent from the presentation layer to the session worker
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    /// A slider moved
    ParameterChanged { name: String, value: ParamValue },
    /// Start (or restart) the synth
    StartRequested,
    /// Free the running synth
    StopRequested,
    /// Shut the session down. The worker exits after handling it.
    CloseRequested,
    /// Ask for a `Snapshot` reflecting every event sent before this one
    RefreshRequested,
    /// Ask the engine which instances are running
    QueryRequested,
}

impl UiEvent {
    pub fn parameter(name: impl Into<String>, value: ParamValue) -> Self {
        Self::ParameterChanged {
            name: name.into(),
            value,
        }
    }

    /// Whether later events may be merged across this one
    pub fn is_barrier(&self) -> bool {
        !matches!(self, Self::ParameterChanged { .. })
    }
}

/// Events sent from the session worker back to the presentation layer
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Status after a batch of events was applied
    Status(SessionStatus),
    /// Reply to `RefreshRequested`
    Snapshot(SessionStatus),
    /// A client call was issued
    Console(ConsoleEntry),
    /// An operation failed
    Error(ErrorReport),
    /// The session could not be initialized; `Closed` follows
    InitFailed(ErrorReport),
    /// Reply to `QueryRequested`
    Instances(Vec<InstanceInfo>),
    /// The session was shut down; no further events follow
    Closed,
}

/// Create the pair of channels connecting the presentation layer and the
/// session worker
pub fn create_channels() -> (UiChannels, SessionChannels) {
    let (event_tx, event_rx) = crossbeam_channel::unbounded();
    let (session_tx, session_rx) = crossbeam_channel::unbounded();

    let ui_channels = UiChannels {
        event_tx,
        session_rx,
    };

    let session_channels = SessionChannels {
        event_rx,
        session_tx,
    };

    (ui_channels, session_channels)
}

/// Channels for the presentation layer (sends events, receives session events)
pub struct UiChannels {
    /// Event sender (UI -> Session)
    pub event_tx: Sender<UiEvent>,
    /// Session event receiver (Session -> UI)
    pub session_rx: Receiver<SessionEvent>,
}

/// Channels for the session worker (receives events, sends session events)
pub struct SessionChannels {
    /// Event receiver (UI -> Session), FIFO
    pub event_rx: Receiver<UiEvent>,
    /// Session event sender (Session -> UI)
    pub session_tx: Sender<SessionEvent>,
}
