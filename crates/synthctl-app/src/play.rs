//! Interactive and scripted slider console.
//!
//! Command lines are turned into session events and sent to the session
//! worker; everything the worker publishes is printed as it arrives.

use anyhow::{Context, Result, bail};
use crossbeam_channel::{Receiver, select};
use std::collections::VecDeque;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use synthctl_comms::{SessionEvent, UiChannels, UiEvent, create_channels};
use synthctl_core::{ConsoleEntry, ErrorReport, SessionStatus};
use synthctl_engine::InstanceInfo;
use synthctl_session::{Preset, SessionConfig, SessionWorker};

use crate::commands::{Command, HELP};

/// What to do with the next `Snapshot`
enum PendingSnapshot {
    Print,
    Save(PathBuf),
}

/// Run a session until `quit`, end of input, or a fatal error
pub fn run(config: &SessionConfig, preset: Option<&Path>, script: Option<&Path>) -> Result<()> {
    let controller = config.controller().context("Failed to set up session")?;

    let mut defaults = config.parameters.clone();
    if let Some(path) = preset {
        let preset = Preset::load(path)
            .with_context(|| format!("Failed to load preset {}", path.display()))?;
        preset.check_definition(&config.definition)?;
        for (name, value) in preset.parameters.iter() {
            defaults.set(name, value);
        }
    }

    let lines = match script {
        Some(path) => script_lines(path)?,
        None => {
            println!("synthctl: playing '{}' (type 'help' for commands)", config.definition);
            stdin_lines()?
        }
    };

    let (ui, session) = create_channels();
    let mut worker = SessionWorker::spawn(controller, defaults, session, config.coalesce_updates)
        .context("Failed to start session thread")?;

    let mut console = Console::new(ui, &config.definition);
    let result = console.run(lines);

    worker.shutdown();
    result
}

/// Feed a script file line by line
fn script_lines(path: &Path) -> Result<Receiver<String>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read script {}", path.display()))?;

    let (tx, rx) = crossbeam_channel::unbounded();
    for line in contents.lines() {
        let _ = tx.send(line.to_string());
    }
    Ok(rx)
}

/// Read stdin on a background thread so session events keep printing while
/// waiting for input
fn stdin_lines() -> Result<Receiver<String>> {
    let (tx, rx) = crossbeam_channel::unbounded();
    std::thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })
        .context("Failed to start input thread")?;
    Ok(rx)
}

struct Console {
    channels: UiChannels,
    definition: String,
    pending: VecDeque<PendingSnapshot>,
    last_status: Option<SessionStatus>,
    fatal: Option<ErrorReport>,
}

impl Console {
    fn new(channels: UiChannels, definition: &str) -> Self {
        Self {
            channels,
            definition: definition.to_string(),
            pending: VecDeque::new(),
            last_status: None,
            fatal: None,
        }
    }

    fn run(&mut self, lines: Receiver<String>) -> Result<()> {
        let never = crossbeam_channel::never();
        let mut input = Some(lines);

        loop {
            select! {
                recv(input.as_ref().unwrap_or(&never)) -> line => {
                    let quit = match line {
                        Ok(line) => self.handle_line(&line),
                        // End of input
                        Err(_) => true,
                    };
                    if quit {
                        input = None;
                        self.close();
                    }
                }
                recv(self.channels.session_rx) -> event => match event {
                    Ok(SessionEvent::Closed) | Err(_) => break,
                    Ok(event) => self.handle_event(event),
                },
            }
        }

        if let Some(report) = self.fatal.take() {
            bail!("Session failed: {report}");
        }
        Ok(())
    }

    /// Handle one input line. Returns true when the console should quit.
    fn handle_line(&mut self, line: &str) -> bool {
        let command = match Command::parse(line) {
            Ok(Some(command)) => command,
            Ok(None) => return false,
            Err(e) => {
                eprintln!("{e}");
                return false;
            }
        };

        match &command {
            Command::Help => println!("{HELP}"),
            Command::Quit => return true,
            Command::Status => self.pending.push_back(PendingSnapshot::Print),
            Command::Save(path) => {
                self.pending.push_back(PendingSnapshot::Save(path.clone()));
                self.send(UiEvent::RefreshRequested);
            }
            Command::Load(path) => self.load_preset(path),
            Command::Set { .. } | Command::Start | Command::Stop | Command::Tree => {}
        }

        if let Some(event) = command.event() {
            self.send(event);
        }
        false
    }

    fn load_preset(&self, path: &Path) {
        let preset = match Preset::load(path).and_then(|p| {
            p.check_definition(&self.definition)?;
            Ok(p)
        }) {
            Ok(preset) => preset,
            Err(e) => {
                eprintln!("Cannot load {}: {e}", path.display());
                return;
            }
        };

        for event in preset.events() {
            self.send(event);
        }
        println!("Loaded preset {}", path.display());
    }

    fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Console(entry) => print_entry(&entry),
            SessionEvent::Error(report) => {
                eprintln!("error: {report}");
                if report.kind.is_fatal() {
                    self.fatal = Some(report);
                }
            }
            SessionEvent::InitFailed(report) => {
                eprintln!("error: {report}");
                self.fatal = Some(report);
            }
            SessionEvent::Status(status) => {
                if self.last_status.as_ref() != Some(&status) {
                    println!("{status}");
                    self.last_status = Some(status);
                }
            }
            SessionEvent::Snapshot(status) => self.handle_snapshot(&status),
            SessionEvent::Instances(instances) => print_instances(&instances),
            SessionEvent::Closed => {}
        }
    }

    fn handle_snapshot(&mut self, status: &SessionStatus) {
        match self.pending.pop_front() {
            Some(PendingSnapshot::Save(path)) => match Preset::from_status(status).save(&path) {
                Ok(()) => println!("Saved preset {}", path.display()),
                Err(e) => eprintln!("Cannot save {}: {e}", path.display()),
            },
            Some(PendingSnapshot::Print) | None => {
                println!("{status}");
                if !status.is_running() {
                    println!("  not playing (type 'start')");
                }
                if let Some(error) = &status.last_error {
                    println!("  last error: {error}");
                }
            }
        }
    }

    fn close(&self) {
        self.send(UiEvent::CloseRequested);
    }

    fn send(&self, event: UiEvent) {
        if self.channels.event_tx.send(event).is_err() {
            tracing::debug!("Session already closed, event dropped");
        }
    }
}

fn print_entry(entry: &ConsoleEntry) {
    println!("--- [{}] {}", entry.seq, entry.title);
    if let Some(description) = &entry.description {
        println!("    // {description}");
    }
    for line in entry.code.lines() {
        println!("    {line}");
    }
}

fn print_instances(instances: &[InstanceInfo]) {
    if instances.is_empty() {
        println!("No instances running");
        return;
    }
    for info in instances {
        let parameters: Vec<String> = info
            .parameters
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        println!(
            "  {} {} {}",
            info.instance,
            info.definition,
            parameters.join(" ")
        );
    }
}
