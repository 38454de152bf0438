//! Built-in synth definitions and lookup.

use crate::{Error, ParamSpec, Result, SynthDefinition};

/// Id of the plain sine definition
pub const SINE: &str = "sine";

/// Id of the noise-modulated sine definition
pub const NOISE_MODULATED: &str = "noise-modulated";

/// Sine oscillator with frequency and amplitude controls
pub fn sine() -> SynthDefinition {
    SynthDefinition::new(SINE, "Sine oscillator scaled by amplitude")
        .with_param(
            ParamSpec::new("frequency", 110.0, 1760.0, 440.0)
                .with_step(1.0)
                .with_unit("Hz"),
        )
        .with_param(ParamSpec::new("amplitude", 0.01, 0.5, 0.1).with_step(0.01))
}

/// Sine pair whose pitch steps randomly over a 16-semitone window above
/// `note_offset` and whose level drifts with a slow noise source
pub fn noise_modulated() -> SynthDefinition {
    SynthDefinition::new(
        NOISE_MODULATED,
        "Noise-driven pitch steps and amplitude drift on a sine pair",
    )
    .with_param(
        ParamSpec::new("noise_hz", 0.1, 50.0, 8.0)
            .with_step(0.1)
            .with_unit("Hz"),
    )
    .with_param(
        ParamSpec::new("amp_noise_hz", 0.1, 50.0, 12.0)
            .with_step(0.1)
            .with_unit("Hz"),
    )
    .with_param(ParamSpec::new("note_offset", 20.0, 90.0, 50.0).with_step(0.1))
}

/// The set of definitions a session can pick from
#[derive(Debug, Clone)]
pub struct Catalog {
    definitions: Vec<SynthDefinition>,
}

impl Catalog {
    /// Catalog holding only the built-in definitions
    pub fn builtin() -> Self {
        Self {
            definitions: vec![sine(), noise_modulated()],
        }
    }

    /// Add definitions, replacing any with the same id
    pub fn with_definitions(mut self, extra: impl IntoIterator<Item = SynthDefinition>) -> Self {
        for definition in extra {
            if let Some(existing) = self
                .definitions
                .iter_mut()
                .find(|d| d.id == definition.id)
            {
                *existing = definition;
            } else {
                self.definitions.push(definition);
            }
        }
        self
    }

    pub fn get(&self, id: &str) -> Result<&SynthDefinition> {
        self.definitions
            .iter()
            .find(|d| d.id == id)
            .ok_or_else(|| Error::UnknownDefinition(id.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &SynthDefinition> {
        self.definitions.iter()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}
