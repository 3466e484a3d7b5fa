//! # Error Types
//!
//! Structured error types for geo_core. These errors are designed to carry
//! enough context (layer index, parameter name, offending depth) for a caller
//! to locate and fix the problem programmatically.
//!
//! All preconditions are checked at the point of violation and reported
//! immediately; the core never falls back to silent NaN results.
//!
//! ## Example
//!
//! ```rust
//! use geo_core::errors::{GeoError, GeoResult};
//!
//! fn validate_diameter(diameter_m: f64) -> GeoResult<()> {
//!     if diameter_m <= 0.0 {
//!         return Err(GeoError::invalid_geometry(
//!             "diameter_m",
//!             diameter_m.to_string(),
//!             "Pile diameter must be positive",
//!         ));
//!     }
//!     Ok(())
//! }
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for geo_core operations
pub type GeoResult<T> = Result<T, GeoError>;

/// Structured error type for soil profile and pile capacity operations.
///
/// Each variant provides specific context about what went wrong,
/// enabling programmatic error handling by consumers.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "details")]
pub enum GeoError {
    /// A depth falls outside the bounds of the profile or trace
    #[error("Depth {depth} outside bounds [{min_depth}, {max_depth}]")]
    OutOfRange {
        depth: f64,
        min_depth: f64,
        max_depth: f64,
    },

    /// A required soil parameter is absent in a traversed layer
    #[error("Parameter '{parameter}' missing in layer {layer_index}")]
    MissingParameter {
        parameter: String,
        layer_index: usize,
    },

    /// A soil type category is not part of the fixed calibration table
    #[error("Soil type '{soil_type}' not recognised")]
    UnknownSoilType { soil_type: String },

    /// An operation was invoked before a required prior step
    #[error("Cannot {operation}: {requires} must be performed first")]
    NotReady {
        operation: String,
        requires: String,
    },

    /// Invalid geometry (non-positive diameter, mismatched array lengths, ...)
    #[error("Invalid geometry for '{field}': {value} - {reason}")]
    InvalidGeometry {
        field: String,
        value: String,
        reason: String,
    },

    /// Layer boundaries are not contiguous
    #[error("Layer {layer_index} starts at {actual_top} but previous layer ends at {expected_top}")]
    OverlapOrGap {
        layer_index: usize,
        expected_top: f64,
        actual_top: f64,
    },

    /// Too few samples to perform an interpolation or resampling
    #[error("Insufficient data: {count} samples provided, at least {minimum} required")]
    InsufficientData { count: usize, minimum: usize },

    /// An input value is invalid (malformed column name, wrong variation kind, ...)
    #[error("Invalid input for '{field}': {value} - {reason}")]
    InvalidInput {
        field: String,
        value: String,
        reason: String,
    },
}

impl GeoError {
    /// Create an OutOfRange error
    pub fn out_of_range(depth: f64, min_depth: f64, max_depth: f64) -> Self {
        GeoError::OutOfRange {
            depth,
            min_depth,
            max_depth,
        }
    }

    /// Create a MissingParameter error
    pub fn missing_parameter(parameter: impl Into<String>, layer_index: usize) -> Self {
        GeoError::MissingParameter {
            parameter: parameter.into(),
            layer_index,
        }
    }

    /// Create an UnknownSoilType error
    pub fn unknown_soil_type(soil_type: impl Into<String>) -> Self {
        GeoError::UnknownSoilType {
            soil_type: soil_type.into(),
        }
    }

    /// Create a NotReady error
    pub fn not_ready(operation: impl Into<String>, requires: impl Into<String>) -> Self {
        GeoError::NotReady {
            operation: operation.into(),
            requires: requires.into(),
        }
    }

    /// Create an InvalidGeometry error
    pub fn invalid_geometry(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        GeoError::InvalidGeometry {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create an InvalidInput error
    pub fn invalid_input(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        GeoError::InvalidInput {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Get a short error code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            GeoError::OutOfRange { .. } => "OUT_OF_RANGE",
            GeoError::MissingParameter { .. } => "MISSING_PARAMETER",
            GeoError::UnknownSoilType { .. } => "UNKNOWN_SOIL_TYPE",
            GeoError::NotReady { .. } => "NOT_READY",
            GeoError::InvalidGeometry { .. } => "INVALID_GEOMETRY",
            GeoError::OverlapOrGap { .. } => "OVERLAP_OR_GAP",
            GeoError::InsufficientData { .. } => "INSUFFICIENT_DATA",
            GeoError::InvalidInput { .. } => "INVALID_INPUT",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_serialization() {
        let error = GeoError::missing_parameter("Total unit weight [kN/m3]", 2);
        let json = serde_json::to_string(&error).unwrap();
        let roundtrip: GeoError = serde_json::from_str(&json).unwrap();
        assert_eq!(error, roundtrip);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            GeoError::out_of_range(12.0, 0.0, 10.0).error_code(),
            "OUT_OF_RANGE"
        );
        assert_eq!(
            GeoError::unknown_soil_type("Peat").error_code(),
            "UNKNOWN_SOIL_TYPE"
        );
        assert_eq!(
            GeoError::not_ready("calculate_base_resistance", "resample_data").error_code(),
            "NOT_READY"
        );
    }

    #[test]
    fn test_error_display() {
        let error = GeoError::OverlapOrGap {
            layer_index: 1,
            expected_top: 5.0,
            actual_top: 6.0,
        };
        assert_eq!(
            error.to_string(),
            "Layer 1 starts at 6 but previous layer ends at 5"
        );
    }
}
