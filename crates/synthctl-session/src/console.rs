//! Code console: the client calls a session has issued, rendered as Rust.

use std::collections::VecDeque;
use std::fmt::Write;
use synthctl_core::{ConsoleEntry, InstanceHandle, ParamValue, ParameterSet, SynthDefinition};

/// Entries kept when no capacity is configured
pub const DEFAULT_CAPACITY: usize = 64;

/// Bounded log of console entries, oldest dropped first
#[derive(Debug, Clone)]
pub struct CodeConsole {
    entries: VecDeque<ConsoleEntry>,
    capacity: usize,
    next_seq: u64,
}

impl CodeConsole {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            next_seq: 1,
        }
    }

    /// Append an entry and return its sequence number
    pub fn push(
        &mut self,
        title: impl Into<String>,
        code: impl Into<String>,
        description: Option<&str>,
    ) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;

        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(ConsoleEntry {
            seq,
            title: title.into(),
            code: code.into(),
            description: description.map(str::to_string),
        });
        seq
    }

    /// Entries with a sequence number greater than `seq`, oldest first
    pub fn after(&self, seq: u64) -> impl Iterator<Item = &ConsoleEntry> {
        self.entries.iter().filter(move |e| e.seq > seq)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConsoleEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&ConsoleEntry> {
        self.entries.back()
    }

    /// Sequence number of the most recent entry, 0 if none was ever pushed
    pub fn last_seq(&self) -> u64 {
        self.next_seq - 1
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for CodeConsole {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Rust source for each `EngineClient` call
pub(crate) mod code {
    use super::{InstanceHandle, ParamValue, ParameterSet, SynthDefinition, Write};

    pub fn connect() -> String {
        "engine.connect()?;".to_string()
    }

    pub fn register_definition(definition: &SynthDefinition) -> String {
        let mut code = format!(
            "engine.register_definition(\n    &SynthDefinition::new({:?}, {:?})",
            definition.id, definition.description
        );
        for spec in &definition.params {
            let _ = write!(
                code,
                "\n        .with_param(ParamSpec::new({:?}, {:?}, {:?}, {:?})",
                spec.name, spec.min, spec.max, spec.default
            );
            if let Some(step) = spec.step {
                let _ = write!(code, ".with_step({step:?})");
            }
            if let Some(unit) = &spec.unit {
                let _ = write!(code, ".with_unit({unit:?})");
            }
            code.push(')');
        }
        code.push_str(",\n)?;");
        code
    }

    pub fn instantiate(definition_id: &str, parameters: &ParameterSet) -> String {
        let pairs: Vec<String> = parameters
            .iter()
            .map(|(name, value)| format!("({name:?}, {value:?})"))
            .collect();
        format!(
            "let synth = engine.instantiate(\n    {definition_id:?},\n    &ParameterSet::from([{}]),\n)?;",
            pairs.join(", ")
        )
    }

    pub fn update_parameter(name: &str, value: ParamValue) -> String {
        format!("engine.update_parameter(synth, {name:?}, {value:?})?;")
    }

    pub fn release(instance: InstanceHandle) -> String {
        format!("engine.release(synth)?; // {instance}")
    }

    pub fn instances() -> String {
        "for info in engine.instances()? {\n    println!(\"{info:?}\");\n}".to_string()
    }

    pub fn disconnect() -> String {
        "engine.disconnect();".to_string()
    }
}
