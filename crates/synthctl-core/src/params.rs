//! Parameter schema and value storage.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{Error, Result};

/// Numeric parameter value as sent to the engine
pub type ParamValue = f32;

/// What to do with a value outside a parameter's declared range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RangePolicy {
    /// Pull the value back to the nearest bound
    #[default]
    Clamp,
    /// Refuse the value and keep the stored one
    Reject,
}

/// Declared schema of one named synth parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub min: ParamValue,
    pub max: ParamValue,
    pub default: ParamValue,

    /// Slider resolution. Values snap to `min + k * step`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<ParamValue>,

    /// Display unit (e.g. "Hz")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl ParamSpec {
    pub fn new(
        name: impl Into<String>,
        min: ParamValue,
        max: ParamValue,
        default: ParamValue,
    ) -> Self {
        Self {
            name: name.into(),
            min,
            max,
            default,
            step: None,
            unit: None,
        }
    }

    pub fn with_step(mut self, step: ParamValue) -> Self {
        self.step = Some(step);
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Whether `value` lies inside the declared range (bounds inclusive)
    pub fn contains(&self, value: ParamValue) -> bool {
        value >= self.min && value <= self.max
    }

    /// Validate `value` under `policy` and snap it onto the step grid.
    ///
    /// The returned value is always inside `[min, max]`.
    pub fn conform(&self, value: ParamValue, policy: RangePolicy) -> Result<ParamValue> {
        if value.is_nan() {
            return Err(Error::NotANumber {
                name: self.name.clone(),
            });
        }

        let bounded = if self.contains(value) {
            value
        } else {
            match policy {
                RangePolicy::Clamp => value.clamp(self.min, self.max),
                RangePolicy::Reject => {
                    return Err(Error::OutOfRange {
                        name: self.name.clone(),
                        value,
                        min: self.min,
                        max: self.max,
                    });
                }
            }
        };

        Ok(self.snap(bounded))
    }

    fn snap(&self, value: ParamValue) -> ParamValue {
        let Some(step) = self.step.filter(|s| *s > 0.0) else {
            return value;
        };

        let steps = ((value - self.min) / step).round();
        let snapped = steps.mul_add(step, self.min).clamp(self.min, self.max);

        // Values already on the grid keep their exact representation
        if (snapped - value).abs() <= step * 1e-4 {
            value
        } else {
            snapped
        }
    }

    /// Format a value with this parameter's unit, for display
    pub fn display_value(&self, value: ParamValue) -> String {
        match &self.unit {
            Some(unit) => format!("{value} {unit}"),
            None => value.to_string(),
        }
    }
}

/// Current values of a synth's named parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet(BTreeMap<String, ParamValue>);

impl ParameterSet {
    #[must_use]
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn get(&self, name: &str) -> Option<ParamValue> {
        self.0.get(name).copied()
    }

    /// Store a value, returning the one it replaced
    pub fn set(&mut self, name: impl Into<String>, value: ParamValue) -> Option<ParamValue> {
        self.0.insert(name.into(), value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, ParamValue)> {
        self.0.iter().map(|(name, value)| (name.as_str(), *value))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<(S, ParamValue)> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = (S, ParamValue)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(name, value)| (name.into(), value))
                .collect(),
        )
    }
}

impl<S: Into<String>, const N: usize> From<[(S, ParamValue); N]> for ParameterSet {
    fn from(pairs: [(S, ParamValue); N]) -> Self {
        pairs.into_iter().collect()
    }
}
