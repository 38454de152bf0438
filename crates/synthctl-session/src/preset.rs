//! Preset file format for saving/loading parameter values.
//!
//! Uses RON (Rust Object Notation) for human-readable presets. Loading a
//! preset replays its values as ordinary parameter changes, so the session's
//! range policy applies to them like any slider movement.

use serde::{Deserialize, Serialize};
use std::path::Path;
use synthctl_comms::UiEvent;
use synthctl_core::{ParameterSet, SessionStatus};

/// Current preset format version
pub const PRESET_VERSION: u32 = 1;

/// Saved parameter values for one definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    /// Format version for future compatibility
    pub version: u32,

    /// Definition the values belong to
    pub definition: String,

    /// Parameter name -> value
    pub parameters: ParameterSet,
}

impl Preset {
    pub fn new(definition: impl Into<String>, parameters: ParameterSet) -> Self {
        Self {
            version: PRESET_VERSION,
            definition: definition.into(),
            parameters,
        }
    }

    /// Capture the current values of a session
    pub fn from_status(status: &SessionStatus) -> Self {
        Self::new(status.definition_id.clone(), status.parameters.clone())
    }

    /// Save preset to a RON file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), PresetError> {
        let ron_string = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| PresetError::SerializationFailed(e.to_string()))?;

        std::fs::write(path.as_ref(), ron_string)
            .map_err(|e| PresetError::IoError(e.to_string()))?;

        tracing::info!("Saved preset to {}", path.as_ref().display());
        Ok(())
    }

    /// Load preset from a RON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PresetError> {
        let ron_string = std::fs::read_to_string(path.as_ref())
            .map_err(|e| PresetError::IoError(e.to_string()))?;

        let preset: Self = ron::from_str(&ron_string)
            .map_err(|e| PresetError::DeserializationFailed(e.to_string()))?;

        if preset.version > PRESET_VERSION {
            return Err(PresetError::UnsupportedVersion(preset.version));
        }

        Ok(preset)
    }

    /// Check that this preset can be applied to `definition_id`
    pub fn check_definition(&self, definition_id: &str) -> Result<(), PresetError> {
        if self.definition == definition_id {
            Ok(())
        } else {
            Err(PresetError::DefinitionMismatch {
                expected: definition_id.to_string(),
                found: self.definition.clone(),
            })
        }
    }

    /// The parameter changes that apply this preset
    pub fn events(&self) -> Vec<UiEvent> {
        self.parameters
            .iter()
            .map(|(name, value)| UiEvent::parameter(name, value))
            .collect()
    }
}

/// Errors that can occur during preset operations
#[derive(Debug, thiserror::Error)]
pub enum PresetError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    #[error("Unsupported preset version: {0}")]
    UnsupportedVersion(u32),

    #[error("Preset is for '{found}', session plays '{expected}'")]
    DefinitionMismatch { expected: String, found: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use synthctl_core::SessionState;

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bright.ron");

        let preset = Preset::new(
            "sine",
            ParameterSet::from([("frequency", 880.0), ("amplitude", 0.2)]),
        );
        preset.save(&path).unwrap();

        let loaded = Preset::load(&path).unwrap();
        assert_eq!(loaded, preset);
        assert!(loaded.check_definition("sine").is_ok());
    }

    #[test]
    fn test_rejects_newer_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("future.ron");
        std::fs::write(
            &path,
            r#"(version: 7, definition: "sine", parameters: {"frequency": 440.0})"#,
        )
        .unwrap();

        assert!(matches!(
            Preset::load(&path),
            Err(PresetError::UnsupportedVersion(7))
        ));
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Preset::load(dir.path().join("missing.ron")),
            Err(PresetError::IoError(_))
        ));

        let path = dir.path().join("broken.ron");
        std::fs::write(&path, "(version: 1,").unwrap();
        assert!(matches!(
            Preset::load(&path),
            Err(PresetError::DeserializationFailed(_))
        ));
    }

    #[test]
    fn test_from_status_and_events() {
        let status = SessionStatus {
            definition_id: "noise-modulated".to_string(),
            state: SessionState::Running,
            instance: None,
            parameters: ParameterSet::from([("noise_hz", 4.0), ("note_offset", 62.0)]),
            last_error: None,
        };
        let preset = Preset::from_status(&status);
        assert!(matches!(
            preset.check_definition("sine"),
            Err(PresetError::DefinitionMismatch { .. })
        ));

        assert_eq!(
            preset.events(),
            vec![
                UiEvent::parameter("noise_hz", 4.0),
                UiEvent::parameter("note_offset", 62.0),
            ]
        );
    }
}
