//! Soil type calibration tables for the De Beer base resistance method
//!
//! The method is calibrated against five named Belgian soil categories.
//! Every correction constant is keyed by [`SoilType`]: the angle of internal
//! friction used by the surface correction, the critical depth used by the
//! stress-level correction, and the piecewise unit shaft friction
//! conversion. Mechanical cone types carry the shaft correction divisors
//! applicable in tertiary clay.
//!
//! | Soil type                    | phi [deg] | h_crit [m] |
//! |------------------------------|-----------|------------|
//! | Clay                         | 25.0      | 0.2        |
//! | Loam (silt)                  | 27.5      | 0.2        |
//! | Sandy clay / loam (silt)     | 30.0      | 0.2        |
//! | Clayey sand / loam (silt)    | 32.5      | 0.2        |
//! | Sand                         | 35.0      | 0.2        |

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};
use std::fmt;

use crate::errors::{GeoError, GeoResult};

// ============================================================================
// Geometric and default constants
// ============================================================================

/// Apex half-angle of the penetrometer cone [rad]
pub const BETA_CONE: f64 = FRAC_PI_2;
/// Apex half-angle assumed for the pile base [rad]
pub const BETA_PILE: f64 = FRAC_PI_4;
/// Diameter of the standard 10 cm2 mechanical cone [m]
pub const STANDARD_CONE_DIAMETER: f64 = 0.0357;
/// Push increment of the historical mechanical cone [m]
pub const STANDARD_SPACING: f64 = 0.2;
/// Smallest pile diameter the correction is calibrated for [m]
pub const MIN_PILE_DIAMETER: f64 = 0.2;
/// Default dry unit weight above the water table [kN/m3]
pub const DEFAULT_DRY_UNIT_WEIGHT: f64 = 15.696;
/// Default saturated unit weight below the water table [kN/m3]
pub const DEFAULT_WET_UNIT_WEIGHT: f64 = 19.62;
/// Default unit weight of the pore water [kN/m3]
pub const DEFAULT_WATER_UNIT_WEIGHT: f64 = 10.0;

// ============================================================================
// Soil types
// ============================================================================

/// Soil category of the De Beer calibration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SoilType {
    Clay,
    LoamSilt,
    SandyClayLoam,
    ClayeySandLoam,
    Sand,
}

impl SoilType {
    /// All soil types of the calibration
    pub const ALL: [SoilType; 5] = [
        SoilType::Clay,
        SoilType::LoamSilt,
        SoilType::SandyClayLoam,
        SoilType::ClayeySandLoam,
        SoilType::Sand,
    ];

    /// Category label as it appears in soil profile data
    pub fn label(&self) -> &'static str {
        match self {
            SoilType::Clay => "Clay",
            SoilType::LoamSilt => "Loam (silt)",
            SoilType::SandyClayLoam => "Sandy clay / loam (silt)",
            SoilType::ClayeySandLoam => "Clayey sand / loam (silt)",
            SoilType::Sand => "Sand",
        }
    }

    /// Parse a category label, failing on anything outside the calibration
    pub fn from_label(label: &str) -> GeoResult<SoilType> {
        SoilType::ALL
            .iter()
            .find(|soil_type| soil_type.label() == label)
            .copied()
            .ok_or_else(|| GeoError::unknown_soil_type(label))
    }

    /// Angle of internal friction used by the surface correction [deg]
    pub fn friction_angle_deg(&self) -> f64 {
        match self {
            SoilType::Clay => 25.0,
            SoilType::LoamSilt => 27.5,
            SoilType::SandyClayLoam => 30.0,
            SoilType::ClayeySandLoam => 32.5,
            SoilType::Sand => 35.0,
        }
    }

    /// Critical depth for the stress-level correction at cone scale [m]
    pub fn critical_depth_m(&self) -> f64 {
        match self {
            SoilType::Clay => 0.2,
            SoilType::LoamSilt => 0.2,
            SoilType::SandyClayLoam => 0.2,
            SoilType::ClayeySandLoam => 0.2,
            SoilType::Sand => 0.2,
        }
    }

    /// Unit shaft friction from the layer-average cone resistance.
    ///
    /// `qc_avg` in MPa, result in kPa. Piecewise conversion per category,
    /// with a plateau beyond the calibrated cone resistance range.
    pub fn unit_shaft_friction_kpa(&self, qc_avg: f64) -> f64 {
        match self {
            SoilType::Clay => {
                if qc_avg <= 4.5 {
                    1000.0 * qc_avg / 30.0
                } else {
                    150.0
                }
            }
            SoilType::LoamSilt => {
                if qc_avg <= 6.0 {
                    1000.0 * qc_avg / 60.0
                } else {
                    100.0
                }
            }
            SoilType::SandyClayLoam | SoilType::ClayeySandLoam => {
                if qc_avg <= 10.0 {
                    1000.0 * qc_avg / 80.0
                } else {
                    125.0
                }
            }
            SoilType::Sand => {
                if qc_avg <= 10.0 {
                    1000.0 * qc_avg / 90.0
                } else if qc_avg <= 20.0 {
                    110.0 + 4.0 * (qc_avg - 10.0)
                } else {
                    150.0
                }
            }
        }
    }
}

impl fmt::Display for SoilType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Robertson soil behaviour type zone to De Beer category, for callers that
/// classify CPT data before running the correction
pub static ROBERTSON_SOILTYPE_MAPPING: Lazy<BTreeMap<u8, SoilType>> = Lazy::new(|| {
    BTreeMap::from([
        (3, SoilType::Clay),
        (4, SoilType::SandyClayLoam),
        (5, SoilType::ClayeySandLoam),
        (6, SoilType::Sand),
        (7, SoilType::Sand),
    ])
});

// ============================================================================
// Cone types
// ============================================================================

/// Penetrometer cone type, determining the shaft correction divisor in
/// tertiary clay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConeType {
    /// Mechanical cone M1
    M1,
    /// Mechanical cone M2
    M2,
    /// Mechanical cone M4
    M4,
    /// Electrical cone
    E,
    /// Piezocone
    U,
}

impl ConeType {
    pub const ALL: [ConeType; 5] = [
        ConeType::M1,
        ConeType::M2,
        ConeType::M4,
        ConeType::E,
        ConeType::U,
    ];

    /// Divisor applied to the cone resistance in tertiary clay layers when
    /// deriving shaft friction. Electrical cones and piezocones need no
    /// correction.
    pub fn tertiary_clay_divisor(&self) -> f64 {
        match self {
            ConeType::M1 | ConeType::M2 => 1.3,
            ConeType::M4 => 1.15,
            ConeType::E | ConeType::U => 1.0,
        }
    }
}

impl fmt::Display for ConeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConeType::M1 => "M1",
            ConeType::M2 => "M2",
            ConeType::M4 => "M4",
            ConeType::E => "E",
            ConeType::U => "U",
        };
        write!(f, "{}", label)
    }
}
