//! # Soil Profiles
//!
//! Layered soil profile data model with depth-dependent parameter
//! interpolation and gridding.
//!
//! - [`layer`] - Layer and parameter-value primitives
//! - [`soil_profile`] - The [`SoilProfile`] interval arithmetic (lookup,
//!   insertion, merging, cutting, integration, overburden)
//! - [`grid`] - [`CalculationGrid`] node/element meshes derived from a profile

pub mod grid;
pub mod layer;
pub mod soil_profile;

// Re-export commonly used types
pub use grid::{CalculationGrid, GridElement, GridNode};
pub use layer::{Layer, ParameterValue};
pub use soil_profile::{ColumnData, DepthReference, SelectionRule, SoilProfile};
