//! Line commands understood by `synthctl play`.

use anyhow::{Context, Result, bail};
use std::path::PathBuf;
use synthctl_comms::UiEvent;
use synthctl_core::ParamValue;

pub const HELP: &str = "\
Commands:
  set NAME VALUE   move a slider (also NAME=VALUE)
  start            play the synth (restarts if already playing)
  stop             free the synth
  status           show the session state
  tree             list the instances running on the engine
  save FILE        save the current values as a preset
  load FILE        apply a preset
  help             show this help
  quit             shut down and exit";

/// One parsed command line
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Set { name: String, value: ParamValue },
    Start,
    Stop,
    Status,
    Tree,
    Save(PathBuf),
    Load(PathBuf),
    Help,
    Quit,
}

impl Command {
    /// Parse a line. Blank lines and `#` comments yield `None`.
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = words.collect();

        let command = match (verb, args.as_slice()) {
            ("set", [assignment]) => {
                let (name, value) = parse_assignment(assignment).map_err(anyhow::Error::msg)?;
                Self::Set { name, value }
            }
            ("set", [name, value]) => Self::Set {
                name: (*name).to_string(),
                value: parse_value(value)?,
            },
            ("start" | "play", []) => Self::Start,
            ("stop" | "free", []) => Self::Stop,
            ("status", []) => Self::Status,
            ("tree", []) => Self::Tree,
            ("save", [path]) => Self::Save(PathBuf::from(*path)),
            ("load", [path]) => Self::Load(PathBuf::from(*path)),
            ("help" | "?", []) => Self::Help,
            ("quit" | "exit", []) => Self::Quit,
            (assignment, []) if assignment.contains('=') => {
                let (name, value) = parse_assignment(assignment).map_err(anyhow::Error::msg)?;
                Self::Set { name, value }
            }
            (
                "set" | "start" | "play" | "stop" | "free" | "status" | "tree" | "save" | "load"
                | "help" | "?" | "quit" | "exit",
                _,
            ) => bail!("Wrong arguments for '{verb}' (try 'help')"),
            _ => bail!("Unknown command '{verb}' (try 'help')"),
        };

        Ok(Some(command))
    }

    /// The session event this command sends, if any
    pub fn event(&self) -> Option<UiEvent> {
        match self {
            Self::Set { name, value } => Some(UiEvent::parameter(name.clone(), *value)),
            Self::Start => Some(UiEvent::StartRequested),
            Self::Stop => Some(UiEvent::StopRequested),
            Self::Status => Some(UiEvent::RefreshRequested),
            Self::Tree => Some(UiEvent::QueryRequested),
            Self::Quit => Some(UiEvent::CloseRequested),
            Self::Save(_) | Self::Load(_) | Self::Help => None,
        }
    }
}

fn parse_value(text: &str) -> Result<ParamValue> {
    text.parse::<ParamValue>()
        .with_context(|| format!("'{text}' is not a number"))
}

/// Parse `NAME=VALUE`, as given to `--set`
pub fn parse_assignment(text: &str) -> std::result::Result<(String, ParamValue), String> {
    let (name, value) = text
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{text}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing parameter name in '{text}'"));
    }
    let value = value
        .trim()
        .parse::<ParamValue>()
        .map_err(|_| format!("'{}' is not a number", value.trim()))?;
    Ok((name.to_string(), value))
}
