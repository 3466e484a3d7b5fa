//! Soil layer primitives
//!
//! A [`Layer`] is a contiguous depth interval carrying named soil parameters.
//! Numeric parameters are either constant in the layer or vary linearly
//! between a value at the layer top and a value at the layer bottom.
//! Categorical (text) parameters cannot vary linearly; this is enforced
//! structurally by the [`ParameterValue`] enum.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Value of a soil parameter within a single layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum ParameterValue {
    /// Constant numeric value across the layer
    Constant(f64),
    /// Linear variation from the layer top to the layer bottom
    Linear { from: f64, to: f64 },
    /// Categorical value (soil type, descriptive flags, ...)
    Text(String),
}

impl ParameterValue {
    /// Whether this value is numeric (constant or linear)
    pub fn is_numeric(&self) -> bool {
        !matches!(self, ParameterValue::Text(_))
    }

    /// Whether this value varies linearly across the layer
    pub fn is_linear(&self) -> bool {
        matches!(self, ParameterValue::Linear { .. })
    }

    /// Numeric value interpolated at a relative position in the layer
    /// (0 = top, 1 = bottom). Returns `None` for text values.
    pub fn numeric_at_fraction(&self, fraction: f64) -> Option<f64> {
        match self {
            ParameterValue::Constant(value) => Some(*value),
            ParameterValue::Linear { from, to } => Some(from + (to - from) * fraction),
            ParameterValue::Text(_) => None,
        }
    }

    /// Text value, if categorical
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParameterValue::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// A contiguous depth interval `[depth_from, depth_to)` with named parameters.
///
/// The interval is half-open: a depth equal to `depth_to` belongs to the next
/// layer down, except for the deepest layer of a profile which is closed.
/// Depths follow the positive-downward convention by default; the profile
/// owning the layers can invert the sign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    /// Top of the layer
    pub depth_from: f64,
    /// Bottom of the layer
    pub depth_to: f64,
    /// Named parameter values; keys follow the `"name [unit]"` convention for
    /// numeric parameters and carry no unit suffix for text parameters
    pub parameters: BTreeMap<String, ParameterValue>,
}

impl Layer {
    /// Create a layer without parameters
    pub fn new(depth_from: f64, depth_to: f64) -> Self {
        Layer {
            depth_from,
            depth_to,
            parameters: BTreeMap::new(),
        }
    }

    /// Builder-style parameter insertion
    pub fn with_parameter(mut self, name: impl Into<String>, value: ParameterValue) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }

    /// Builder-style constant numeric parameter
    pub fn with_constant(self, name: impl Into<String>, value: f64) -> Self {
        self.with_parameter(name, ParameterValue::Constant(value))
    }

    /// Builder-style linearly varying numeric parameter
    pub fn with_linear(self, name: impl Into<String>, from: f64, to: f64) -> Self {
        self.with_parameter(name, ParameterValue::Linear { from, to })
    }

    /// Builder-style text parameter
    pub fn with_text(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.with_parameter(name, ParameterValue::Text(value.into()))
    }

    /// Layer thickness
    pub fn thickness(&self) -> f64 {
        self.depth_to - self.depth_from
    }

    /// Depth of the layer center
    pub fn center(&self) -> f64 {
        0.5 * (self.depth_from + self.depth_to)
    }

    /// Membership test. `closed_bottom` makes the bottom inclusive and is set
    /// by the profile for its deepest layer.
    pub fn contains(&self, depth: f64, closed_bottom: bool) -> bool {
        if closed_bottom {
            depth >= self.depth_from && depth <= self.depth_to
        } else {
            depth >= self.depth_from && depth < self.depth_to
        }
    }

    /// Relative position of a depth within the layer (0 = top, 1 = bottom).
    /// A zero-thickness layer returns 0.
    pub fn fraction_at(&self, depth: f64) -> f64 {
        let thickness = self.thickness();
        if thickness == 0.0 {
            0.0
        } else {
            (depth - self.depth_from) / thickness
        }
    }

    /// Numeric parameter value at a depth within the layer, interpolating
    /// linear variations. Returns `None` when the parameter is absent or text.
    pub fn numeric_at(&self, depth: f64, parameter: &str) -> Option<f64> {
        self.parameters
            .get(parameter)?
            .numeric_at_fraction(self.fraction_at(depth))
    }

    /// Text parameter value. Returns `None` when absent or numeric.
    pub fn text(&self, parameter: &str) -> Option<&str> {
        self.parameters.get(parameter)?.as_text()
    }
}
