//! Session worker - runs a controller on a dedicated thread.
//!
//! Events from the presentation layer are applied strictly in the order they
//! were sent, one engine call at a time. Events are taken from the queue in
//! batches; with coalescing enabled, a parameter change is dropped when a newer
//! accepted change for the same name follows it in the batch before any
//! barrier event. Coalescing never changes the resulting parameter values.

use crossbeam_channel::{Receiver, Sender, TryRecvError, select};
use std::collections::HashSet;
use std::thread::JoinHandle;
use synthctl_comms::{SessionChannels, SessionEvent, UiEvent};
use synthctl_core::{ParamValue, ParameterSet};
use synthctl_engine::EngineClient;

use crate::SessionController;

/// Handle to a running session thread
///
/// Dropping the handle shuts the session down.
pub struct SessionWorker {
    shutdown_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl SessionWorker {
    /// Initialize `controller` on a new thread and start serving events.
    ///
    /// If initialization fails `SessionEvent::InitFailed` is published,
    /// followed by the final status and `SessionEvent::Closed`, and the thread
    /// exits.
    pub fn spawn<E>(
        controller: SessionController<E>,
        defaults: ParameterSet,
        channels: SessionChannels,
        coalesce: bool,
    ) -> std::io::Result<Self>
    where
        E: EngineClient + 'static,
    {
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);

        let state = WorkerState {
            controller,
            events: channels.event_rx,
            session_tx: channels.session_tx,
            shutdown_rx,
            coalesce,
            published_seq: 0,
        };

        let thread = std::thread::Builder::new()
            .name("synth-session".to_string())
            .spawn(move || state.run(&defaults))?;

        Ok(Self {
            shutdown_tx: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    /// Whether the session thread has exited
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Stop after the in-flight engine call, shut the session down and wait
    /// for the thread. Events still queued are discarded.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.try_send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("Session thread panicked");
            }
        }
    }
}

impl Drop for SessionWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Everything owned by the session thread
struct WorkerState<E> {
    controller: SessionController<E>,
    events: Receiver<UiEvent>,
    session_tx: Sender<SessionEvent>,
    shutdown_rx: Receiver<()>,
    coalesce: bool,
    /// Last console sequence number already sent
    published_seq: u64,
}

impl<E: EngineClient> WorkerState<E> {
    fn run(mut self, defaults: &ParameterSet) {
        tracing::debug!("Session thread started");

        let initialized = self.controller.initialize(defaults);
        self.publish_console();
        match initialized {
            Ok(()) => {
                self.send(SessionEvent::Status(self.controller.status()));
                self.serve();
            }
            Err(e) => {
                tracing::error!("Session failed to initialize: {}", e);
                self.send(SessionEvent::InitFailed(e.report()));
            }
        }

        self.controller.shutdown();
        self.publish_console();
        self.send(SessionEvent::Status(self.controller.status()));
        self.send(SessionEvent::Closed);
        tracing::debug!("Session thread stopped");
    }

    fn serve(&mut self) {
        loop {
            let first = select! {
                recv(self.events) -> event => match event {
                    Ok(event) => event,
                    // Presentation layer is gone
                    Err(_) => return,
                },
                recv(self.shutdown_rx) -> _ => return,
            };

            let mut batch = vec![first];
            batch.extend(self.events.try_iter());
            if self.coalesce {
                let queued = batch.len();
                batch = coalesce(batch, |name, value| self.controller.accepts(name, value));
                if batch.len() < queued {
                    tracing::trace!("Coalesced {} parameter changes", queued - batch.len());
                }
            }

            for event in batch {
                if self.shutdown_requested() || matches!(event, UiEvent::CloseRequested) {
                    return;
                }
                self.apply(event);
            }

            self.send(SessionEvent::Status(self.controller.status()));
        }
    }

    fn apply(&mut self, event: UiEvent) {
        let result = match event {
            UiEvent::ParameterChanged { name, value } => self
                .controller
                .set_parameter(&name, value)
                .map(drop),
            UiEvent::StartRequested => self.controller.start().map(drop),
            UiEvent::StopRequested => self.controller.stop(),
            UiEvent::RefreshRequested => {
                self.publish_console();
                self.send(SessionEvent::Snapshot(self.controller.status()));
                Ok(())
            }
            UiEvent::QueryRequested => self
                .controller
                .query_instances()
                .map(|instances| {
                    self.publish_console();
                    self.send(SessionEvent::Instances(instances));
                }),
            UiEvent::CloseRequested => Ok(()),
        };

        self.publish_console();
        if let Err(e) = result {
            self.send(SessionEvent::Error(e.report()));
        }
    }

    fn shutdown_requested(&self) -> bool {
        !matches!(self.shutdown_rx.try_recv(), Err(TryRecvError::Empty))
    }

    /// Send console entries added since the last call
    fn publish_console(&mut self) {
        if self.controller.console().last_seq() == self.published_seq {
            return;
        }
        let fresh: Vec<_> = self
            .controller
            .console()
            .after(self.published_seq)
            .cloned()
            .collect();
        for entry in fresh {
            self.published_seq = entry.seq;
            self.send(SessionEvent::Console(entry));
        }
    }

    fn send(&self, event: SessionEvent) {
        // A closed receiver only means nobody is watching
        let _ = self.session_tx.send(event);
    }
}

/// Drop parameter changes superseded by a later change to the same name
/// within the same barrier-delimited run of events.
///
/// Only a change `accepts` allows can supersede an earlier one. Rejected
/// changes are always kept so their errors are still reported.
fn coalesce(batch: Vec<UiEvent>, accepts: impl Fn(&str, ParamValue) -> bool) -> Vec<UiEvent> {
    let mut newer: HashSet<String> = HashSet::new();
    let mut kept = Vec::with_capacity(batch.len());

    for event in batch.into_iter().rev() {
        if event.is_barrier() {
            newer.clear();
        } else if let UiEvent::ParameterChanged { name, value } = &event {
            if accepts(name, *value) && !newer.insert(name.clone()) {
                continue;
            }
        }
        kept.push(event);
    }

    kept.reverse();
    kept
}
