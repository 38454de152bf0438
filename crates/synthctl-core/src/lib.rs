//! Core types shared across the synthctl crates.
//!
//! This crate holds the vocabulary every other crate speaks: parameter
//! schemas, synth definitions, the built-in catalog, and the status types
//! the presentation layer displays.

pub mod catalog;
pub mod definition;
pub mod params;
pub mod status;

pub use catalog::Catalog;
pub use definition::SynthDefinition;
pub use params::{ParamSpec, ParamValue, ParameterSet, RangePolicy};
pub use status::{
    ConsoleEntry, ErrorKind, ErrorReport, InstanceHandle, SessionState, SessionStatus,
};

/// Errors raised while validating definitions and parameter values
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// The definition has no parameter with this name
    #[error("Unknown parameter '{name}' for definition '{definition}'")]
    UnknownParameter { definition: String, name: String },

    /// Value outside the declared range (reject policy only)
    #[error("Parameter '{name}' value {value} is outside [{min}, {max}]")]
    OutOfRange {
        name: String,
        value: ParamValue,
        min: ParamValue,
        max: ParamValue,
    },

    /// NaN is never a valid parameter value
    #[error("Parameter '{name}' value is not a number")]
    NotANumber { name: String },

    /// The definition's schema is malformed
    #[error("Invalid synth definition '{id}': {reason}")]
    InvalidDefinition { id: String, reason: String },

    /// No definition registered under this id
    #[error("Unknown synth definition: {0}")]
    UnknownDefinition(String),
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = Error::OutOfRange {
            name: "frequency".to_string(),
            value: 5000.0,
            min: 110.0,
            max: 1760.0,
        };
        assert_eq!(
            err.to_string(),
            "Parameter 'frequency' value 5000 is outside [110, 1760]"
        );
    }
}
