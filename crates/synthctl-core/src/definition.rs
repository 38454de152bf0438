//! Synth definitions as seen by the controller: an opaque id plus a declared
//! parameter schema. The signal graph behind the id belongs to the engine.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::{Error, ParamSpec, ParamValue, ParameterSet, RangePolicy, Result};

/// A named synth program and the parameters it accepts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthDefinition {
    /// Engine-side name of the definition
    pub id: String,

    /// Human-readable summary shown in listings
    #[serde(default)]
    pub description: String,

    /// Declared parameters
    pub params: Vec<ParamSpec>,
}

impl SynthDefinition {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            params: Vec::new(),
        }
    }

    pub fn with_param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    /// Look up a parameter by name
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Default value of every declared parameter
    pub fn defaults(&self) -> ParameterSet {
        self.params
            .iter()
            .map(|p| (p.name.clone(), p.default))
            .collect()
    }

    /// Check the schema is usable
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| Error::InvalidDefinition {
            id: self.id.clone(),
            reason,
        };

        if self.id.trim().is_empty() {
            return Err(invalid("definition id is empty".to_string()));
        }
        if self.params.is_empty() {
            return Err(invalid("no parameters declared".to_string()));
        }

        let mut seen = HashSet::new();
        for spec in &self.params {
            if spec.name.trim().is_empty() {
                return Err(invalid("parameter with empty name".to_string()));
            }
            if !seen.insert(spec.name.as_str()) {
                return Err(invalid(format!("duplicate parameter '{}'", spec.name)));
            }
            if !spec.min.is_finite() || !spec.max.is_finite() || spec.min > spec.max {
                return Err(invalid(format!(
                    "parameter '{}' has invalid range [{}, {}]",
                    spec.name, spec.min, spec.max
                )));
            }
            if !spec.contains(spec.default) {
                return Err(invalid(format!(
                    "parameter '{}' default {} is outside [{}, {}]",
                    spec.name, spec.default, spec.min, spec.max
                )));
            }
            if spec.step.is_some_and(|step| !(step > 0.0 && step.is_finite())) {
                return Err(invalid(format!(
                    "parameter '{}' step must be positive",
                    spec.name
                )));
            }
        }

        Ok(())
    }

    /// Validate a single value against the named parameter
    pub fn conform(
        &self,
        name: &str,
        value: ParamValue,
        policy: RangePolicy,
    ) -> Result<ParamValue> {
        self.param(name)
            .ok_or_else(|| Error::UnknownParameter {
                definition: self.id.clone(),
                name: name.to_string(),
            })?
            .conform(value, policy)
    }

    /// Build the full parameter set: defaults, overridden by `overrides`.
    ///
    /// Every override must name a declared parameter.
    pub fn resolve(
        &self,
        overrides: &ParameterSet,
        policy: RangePolicy,
    ) -> Result<ParameterSet> {
        let mut params = self.defaults();
        for (name, value) in overrides.iter() {
            let value = self.conform(name, value, policy)?;
            params.set(name, value);
        }
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine() -> SynthDefinition {
        SynthDefinition::new("sine", "test sine")
            .with_param(ParamSpec::new("frequency", 110.0, 1760.0, 440.0))
            .with_param(ParamSpec::new("amplitude", 0.01, 0.5, 0.1))
    }

    #[test]
    fn test_defaults_cover_every_param() {
        let defaults = sine().defaults();
        assert_eq!(defaults.len(), 2);
        assert_eq!(defaults.get("frequency"), Some(440.0));
        assert_eq!(defaults.get("amplitude"), Some(0.1));
    }

    #[test]
    fn test_validate_accepts_well_formed() {
        assert!(sine().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_malformed() {
        let empty_id = SynthDefinition {
            id: " ".to_string(),
            ..sine()
        };
        assert!(empty_id.validate().is_err());

        let no_params = SynthDefinition::new("bare", "");
        assert!(no_params.validate().is_err());

        let duplicate = sine().with_param(ParamSpec::new("frequency", 0.0, 1.0, 0.5));
        assert!(duplicate.validate().is_err());

        let inverted = SynthDefinition::new("inv", "")
            .with_param(ParamSpec::new("x", 1.0, 0.0, 0.5));
        assert!(inverted.validate().is_err());

        let bad_default = SynthDefinition::new("bad", "")
            .with_param(ParamSpec::new("x", 0.0, 1.0, 2.0));
        assert!(bad_default.validate().is_err());

        let bad_step = SynthDefinition::new("step", "")
            .with_param(ParamSpec::new("x", 0.0, 1.0, 0.5).with_step(0.0));
        assert!(bad_step.validate().is_err());
    }

    #[test]
    fn test_conform_unknown_parameter() {
        let err = sine()
            .conform("cutoff", 1000.0, RangePolicy::Clamp)
            .unwrap_err();
        assert!(matches!(err, Error::UnknownParameter { ref name, .. } if name == "cutoff"));
    }

    #[test]
    fn test_resolve_overrides_and_clamps() {
        let overrides = ParameterSet::from([("frequency", 5000.0)]);
        let params = sine().resolve(&overrides, RangePolicy::Clamp).unwrap();
        assert_eq!(params.get("frequency"), Some(1760.0));
        assert_eq!(params.get("amplitude"), Some(0.1));

        assert!(sine().resolve(&overrides, RangePolicy::Reject).is_err());
    }
}
