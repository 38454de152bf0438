//! In-process engine that tracks nodes without rendering audio.
//!
//! Behaves like a strict synthesis server: definitions must be registered
//! before use, parameters must be declared and in range, and unknown node ids
//! are errors. Node ids start at 1000 like a default server's first user node.

use std::collections::{BTreeMap, HashMap};
use synthctl_core::{InstanceHandle, ParamValue, ParameterSet, SynthDefinition};

use crate::{EngineClient, EngineError, InstanceInfo, Result};

/// First node id handed out
pub const FIRST_NODE_ID: i32 = 1000;

/// Loopback engine
#[derive(Debug)]
pub struct LoopbackEngine {
    connected: bool,
    definitions: HashMap<String, SynthDefinition>,
    instances: BTreeMap<InstanceHandle, InstanceInfo>,
    next_node: i32,
}

impl LoopbackEngine {
    pub fn new() -> Self {
        Self {
            connected: false,
            definitions: HashMap::new(),
            instances: BTreeMap::new(),
            next_node: FIRST_NODE_ID,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    fn require_connection<F>(&self, fail: F) -> Result<()>
    where
        F: FnOnce(String) -> EngineError,
    {
        if self.connected {
            Ok(())
        } else {
            Err(fail("not connected".to_string()))
        }
    }
}

impl Default for LoopbackEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineClient for LoopbackEngine {
    fn name(&self) -> &str {
        "loopback"
    }

    fn connect(&mut self) -> Result<()> {
        if !self.connected {
            tracing::debug!("Loopback engine connected");
            self.connected = true;
        }
        Ok(())
    }

    fn register_definition(&mut self, definition: &SynthDefinition) -> Result<()> {
        self.require_connection(EngineError::DefinitionRejected)?;
        definition
            .validate()
            .map_err(|e| EngineError::DefinitionRejected(e.to_string()))?;

        tracing::debug!("Loopback engine registered '{}'", definition.id);
        self.definitions
            .insert(definition.id.clone(), definition.clone());
        Ok(())
    }

    fn instantiate(
        &mut self,
        definition_id: &str,
        parameters: &ParameterSet,
    ) -> Result<InstanceHandle> {
        self.require_connection(EngineError::StartFailed)?;
        let definition = self.definitions.get(definition_id).ok_or_else(|| {
            EngineError::StartFailed(format!("definition '{definition_id}' is not registered"))
        })?;

        for (name, value) in parameters.iter() {
            let spec = definition.param(name).ok_or_else(|| {
                EngineError::StartFailed(format!(
                    "'{definition_id}' has no parameter '{name}'"
                ))
            })?;
            if !spec.contains(value) {
                return Err(EngineError::StartFailed(format!(
                    "'{name}' value {value} is outside [{}, {}]",
                    spec.min, spec.max
                )));
            }
        }

        // Unspecified parameters take their defaults, as on a real server
        let mut resolved = definition.defaults();
        for (name, value) in parameters.iter() {
            resolved.set(name, value);
        }

        let instance = InstanceHandle(self.next_node);
        self.next_node += 1;
        self.instances.insert(
            instance,
            InstanceInfo {
                instance,
                definition: definition_id.to_string(),
                parameters: resolved,
            },
        );

        tracing::debug!("Loopback engine started {instance} ({definition_id})");
        Ok(instance)
    }

    fn update_parameter(
        &mut self,
        instance: InstanceHandle,
        name: &str,
        value: ParamValue,
    ) -> Result<()> {
        self.require_connection(EngineError::UpdateFailed)?;
        let info = self
            .instances
            .get_mut(&instance)
            .ok_or_else(|| EngineError::UpdateFailed(format!("{instance} not found")))?;

        let spec = self
            .definitions
            .get(&info.definition)
            .and_then(|d| d.param(name))
            .ok_or_else(|| {
                EngineError::UpdateFailed(format!("{instance} has no parameter '{name}'"))
            })?;

        if !spec.contains(value) {
            return Err(EngineError::UpdateFailed(format!(
                "'{name}' value {value} is outside [{}, {}]",
                spec.min, spec.max
            )));
        }

        info.parameters.set(name, value);
        Ok(())
    }

    fn release(&mut self, instance: InstanceHandle) -> Result<()> {
        self.require_connection(EngineError::StopFailed)?;
        if self.instances.remove(&instance).is_none() {
            return Err(EngineError::StopFailed(format!("{instance} not found")));
        }

        tracing::debug!("Loopback engine freed {instance}");
        Ok(())
    }

    fn instances(&mut self) -> Result<Vec<InstanceInfo>> {
        self.require_connection(EngineError::Unavailable)?;
        Ok(self.instances.values().cloned().collect())
    }

    fn disconnect(&mut self) {
        if self.connected {
            tracing::debug!(
                "Loopback engine disconnected ({} instances dropped)",
                self.instances.len()
            );
        }
        self.connected = false;
        self.instances.clear();
        self.definitions.clear();
    }
}
