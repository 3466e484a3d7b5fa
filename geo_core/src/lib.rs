//! # geo_core - Geotechnical Calculation Engine
//!
//! `geo_core` provides the structural building blocks for geotechnical
//! calculations: layered soil profiles with interval arithmetic, calculation
//! grids, signal resampling and the De Beer pile base resistance method as
//! applied in Belgian practice. All inputs and outputs are JSON-serializable,
//! making results easy to store, transmit and plot elsewhere.
//!
//! ## Design Philosophy
//!
//! - **Explicit intervals**: layers, grids and traces carry their depth
//!   bookkeeping openly instead of hiding it behind a dataframe
//! - **JSON-First**: public types implement Serialize/Deserialize
//! - **Rich Errors**: structured error types, not just strings
//! - **Fail Fast**: precondition violations surface immediately, no silent
//!   NaN fallbacks
//!
//! ## Quick Start
//!
//! ```rust
//! use geo_core::profile::{Layer, SoilProfile};
//!
//! let mut profile = SoilProfile::new(vec![
//!     Layer::new(0.0, 5.0)
//!         .with_text("Soil type", "Sand")
//!         .with_constant("Total unit weight [kN/m3]", 19.0),
//!     Layer::new(5.0, 10.0)
//!         .with_text("Soil type", "Clay")
//!         .with_constant("Total unit weight [kN/m3]", 17.0),
//! ]).unwrap();
//!
//! // Hydrostatic, total and effective vertical stress
//! profile.calculate_overburden(2.5, 10.0).unwrap();
//! let effective = profile
//!     .numeric_at_depth(10.0, "Vertical effective stress [kPa]")
//!     .unwrap();
//! assert_eq!(effective, 105.0);
//! ```
//!
//! ## Modules
//!
//! - [`profile`] - Layered soil profiles and calculation grids
//! - [`resample`] - Regularization of irregularly sampled signals
//! - [`debeer`] - De Beer base resistance method and pile capacity
//! - [`errors`] - Structured error types

pub mod debeer;
pub mod errors;
pub mod profile;
pub mod resample;

// Re-export commonly used types at crate root for convenience
pub use debeer::{ConeType, DeBeerCalculation, SoilType};
pub use errors::{GeoError, GeoResult};
pub use profile::{CalculationGrid, Layer, SoilProfile};
pub use resample::{resample_signal, ResampledTrace};
