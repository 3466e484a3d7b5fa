//! De Beer base resistance method
//!
//! Computes the unit base resistance of a displacement pile from a cone
//! penetration trace, following the Belgian practice for axial pile
//! capacity. The raw trace is resampled onto the 0.2 m push increment of
//! the historical mechanical cone, then corrected in four sequential steps:
//!
//! | Step | Correction    | Formula                                                   |
//! |------|---------------|-----------------------------------------------------------|
//! | 1    | Surface       | `q_p1 = qc / exp(2 (beta_c - beta_p) tan phi)`            |
//! | 2    | Stress level  | `q_p2 = min(A q_p1, qc)`                                  |
//! | 3    | Downward      | `q_j = min(q_j-1 + (q_p2_j - q_j-1) d/D, q_p2_j)`         |
//! | 4    | Upward        | same recurrence from the tip up, clamped to the step 3 value |
//!
//! Every clamp is a one-directional minimum, so the final unit base
//! resistance never exceeds the measured cone resistance. The shaft side
//! derives a per-layer average cone resistance and converts it to unit
//! shaft friction through the calibrated tables in [`soil`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use geo_core::debeer::{ConeType, DeBeerCalculation, CorrectionOptions, PileCapacityInput};
//! use geo_core::profile::SoilProfile;
//!
//! # fn run(depth: Vec<f64>, qc: Vec<f64>, profile: SoilProfile) -> geo_core::GeoResult<()> {
//! let mut calculation = DeBeerCalculation::new(depth, qc, 0.4)?;
//! calculation.resample_data_standard()?;
//! calculation.set_soil_layers(profile, 2.0)?;
//! calculation.calculate_base_resistance(&CorrectionOptions::default())?;
//! calculation.correct_shaft_qc(ConeType::E)?;
//! calculation.calculate_average_qc()?;
//! calculation.calculate_unit_shaft_friction()?;
//! let capacity = calculation.calculate_pile_resistance(
//!     &PileCapacityInput::new(12.0, 0.126, 1.257))?;
//! println!("Rc = {:.0} kN", capacity.total_resistance_kn);
//! # Ok(())
//! # }
//! ```

pub mod soil;

use serde::{Deserialize, Serialize};

use crate::errors::{GeoError, GeoResult};
use crate::profile::soil_profile::{
    SoilProfile, EFFECTIVE_UNIT_WEIGHT, TOTAL_UNIT_WEIGHT, VERTICAL_EFFECTIVE_STRESS,
};
use crate::resample::{interpolate, resample_signal, ResampledTrace};

pub use soil::{ConeType, SoilType};
use soil::{
    BETA_CONE, BETA_PILE, DEFAULT_DRY_UNIT_WEIGHT, DEFAULT_WATER_UNIT_WEIGHT,
    DEFAULT_WET_UNIT_WEIGHT, MIN_PILE_DIAMETER, STANDARD_CONE_DIAMETER, STANDARD_SPACING,
};

/// Soil profile column carrying the soil type category
pub const SOIL_TYPE_COLUMN: &str = "Soil type";
/// Soil profile column flagging stiff tertiary clay layers
pub const TERTIARY_CLAY_COLUMN: &str = "Tertiary clay";

/// Options for the base resistance correction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CorrectionOptions {
    /// Apply the Van Impe multiplier of 2 in the upward correction instead
    /// of De Beer's original recurrence
    pub van_impe: bool,
    /// Critical depth at cone scale [m]. When unset, each sample uses the
    /// calibrated value for its soil type
    pub h_crit: Option<f64>,
}

/// The named intermediate traces of the four correction steps, retained for
/// inspection. All arrays align with the resampled depth axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionStages {
    /// Resampled cone resistance, negative readings clipped to zero [MPa]
    pub qc: Vec<f64>,
    /// After the surface correction [MPa]
    pub q_p1: Vec<f64>,
    /// After the stress level correction [MPa]
    pub q_p2: Vec<f64>,
    /// After the downward correction [MPa]
    pub q_down: Vec<f64>,
    /// After the upward correction, the final unit base resistance [MPa]
    pub q_up: Vec<f64>,
}

/// Per-layer state for the shaft resistance calculation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShaftLayer {
    pub depth_from: f64,
    pub depth_to: f64,
    pub soil_type: SoilType,
    pub tertiary_clay: bool,
    /// Layer-average corrected cone resistance [MPa]
    pub qc_avg: Option<f64>,
    /// Unit shaft friction [kPa]
    pub unit_shaft_friction: Option<f64>,
}

/// Geometry and resistance factors for the capacity aggregation. The factor
/// defaults of 1.0 correspond to a circular, uniform cross-section pile
/// based outside stiff tertiary clay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PileCapacityInput {
    /// Pile penetration below the surface [m]
    pub pile_penetration: f64,
    /// Pile base area [m2]
    pub base_area: f64,
    /// Shaft circumference [m]
    pub circumference: f64,
    /// Installation factor on the base resistance
    pub alpha_b: f64,
    /// Installation factor on the shaft resistance
    pub alpha_s: f64,
    /// Base shape factor
    pub beta_base: f64,
    /// Enlarged base factor
    pub lambda_base: f64,
    /// Reduction factor for bases in stiff tertiary clay
    pub epsilon_b: f64,
}

impl PileCapacityInput {
    pub fn new(pile_penetration: f64, base_area: f64, circumference: f64) -> Self {
        PileCapacityInput {
            pile_penetration,
            base_area,
            circumference,
            alpha_b: 1.0,
            alpha_s: 1.0,
            beta_base: 1.0,
            lambda_base: 1.0,
            epsilon_b: 1.0,
        }
    }

    pub fn with_alpha_factors(mut self, alpha_b: f64, alpha_s: f64) -> Self {
        self.alpha_b = alpha_b;
        self.alpha_s = alpha_s;
        self
    }

    pub fn with_base_factors(mut self, beta_base: f64, lambda_base: f64, epsilon_b: f64) -> Self {
        self.beta_base = beta_base;
        self.lambda_base = lambda_base;
        self.epsilon_b = epsilon_b;
        self
    }
}

/// Contribution of one layer to the shaft resistance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShaftComponent {
    pub depth_from: f64,
    /// Bottom of the contributing interval, truncated at the pile penetration
    pub depth_to: f64,
    pub soil_type: SoilType,
    /// Unit shaft friction of the layer [kPa]
    pub unit_shaft_friction_kpa: f64,
    /// Shaft resistance of the interval [kN]
    pub resistance_kn: f64,
}

/// Aggregated pile capacity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PileCapacityResult {
    /// Unit base resistance interpolated at the pile penetration [MPa]
    pub qb_mpa: f64,
    /// Base resistance [kN]
    pub base_resistance_kn: f64,
    /// Shaft resistance [kN]
    pub shaft_resistance_kn: f64,
    /// Total calculated pile resistance [kN]
    pub total_resistance_kn: f64,
    /// Per-layer shaft contributions, shallow to deep
    pub shaft_components: Vec<ShaftComponent>,
}

/// Per-sample soil data mapped onto the resampled depth axis
#[derive(Debug, Clone, PartialEq)]
struct SoilNode {
    soil_type: SoilType,
    effective_stress: f64,
    effective_unit_weight: f64,
}

/// Pile base resistance calculation according to De Beer.
///
/// A linear pipeline with enforced ordering: [`resample_data`] before
/// [`set_soil_layers`], which in turn is required by
/// [`calculate_base_resistance`] and the shaft-side methods. Calling a step
/// before its prerequisite fails with a `NotReady` error naming the missing
/// step.
///
/// [`resample_data`]: DeBeerCalculation::resample_data
/// [`set_soil_layers`]: DeBeerCalculation::set_soil_layers
/// [`calculate_base_resistance`]: DeBeerCalculation::calculate_base_resistance
#[derive(Debug, Clone)]
pub struct DeBeerCalculation {
    depth_raw: Vec<f64>,
    qc_raw: Vec<f64>,
    pile_diameter: f64,
    cone_diameter: f64,
    trace: Option<ResampledTrace>,
    layering: Option<SoilProfile>,
    nodes: Option<Vec<SoilNode>>,
    shaft_layers: Option<Vec<ShaftLayer>>,
    stages: Option<CorrectionStages>,
    qc_corrected: Option<Vec<f64>>,
}

impl DeBeerCalculation {
    /// Start a calculation from a raw depth/cone-resistance trace and a pile
    /// diameter, with the standard 10 cm2 cone geometry.
    pub fn new(depth: Vec<f64>, qc: Vec<f64>, pile_diameter: f64) -> GeoResult<Self> {
        Self::with_cone_diameter(depth, qc, pile_diameter, STANDARD_CONE_DIAMETER)
    }

    /// Start a calculation with a non-standard cone diameter.
    pub fn with_cone_diameter(
        depth: Vec<f64>,
        qc: Vec<f64>,
        pile_diameter: f64,
        cone_diameter: f64,
    ) -> GeoResult<Self> {
        if depth.len() != qc.len() {
            return Err(GeoError::invalid_geometry(
                "qc",
                qc.len().to_string(),
                format!("Cone resistance array length must match the {} depths", depth.len()),
            ));
        }
        if depth.len() < 2 {
            return Err(GeoError::InsufficientData {
                count: depth.len(),
                minimum: 2,
            });
        }
        if pile_diameter < MIN_PILE_DIAMETER {
            return Err(GeoError::invalid_geometry(
                "pile_diameter",
                pile_diameter.to_string(),
                format!("The method is calibrated for pile diameters of {} m and above", MIN_PILE_DIAMETER),
            ));
        }
        if cone_diameter <= 0.0 {
            return Err(GeoError::invalid_geometry(
                "cone_diameter",
                cone_diameter.to_string(),
                "Cone diameter must be strictly positive",
            ));
        }
        Ok(DeBeerCalculation {
            depth_raw: depth,
            qc_raw: qc,
            pile_diameter,
            cone_diameter,
            trace: None,
            layering: None,
            nodes: None,
            shaft_layers: None,
            stages: None,
            qc_corrected: None,
        })
    }

    /// Resample the raw trace onto a regular spacing.
    pub fn resample_data(&mut self, spacing: f64) -> GeoResult<()> {
        self.trace = Some(resample_signal(&self.depth_raw, &self.qc_raw, spacing)?);
        Ok(())
    }

    /// Resample onto the 0.2 m push increment of the mechanical cone.
    pub fn resample_data_standard(&mut self) -> GeoResult<()> {
        self.resample_data(STANDARD_SPACING)
    }

    /// The resampled trace
    pub fn trace(&self) -> GeoResult<&ResampledTrace> {
        self.trace
            .as_ref()
            .ok_or_else(|| GeoError::not_ready("trace", "resample_data"))
    }

    /// Attach the soil layering and compute overburden stresses.
    ///
    /// The profile must carry a `"Soil type"` column with categories from
    /// the De Beer calibration, start at zero depth and extend to the bottom
    /// of the trace. When no `"Total unit weight [kN/m3]"` column is
    /// present, the Belgian practice defaults are applied per layer: dry
    /// unit weight above the water table, wet below. An optional
    /// `"Tertiary clay"` text column ("true"/"yes", case-insensitive) marks
    /// stiff tertiary clay layers for the shaft correction.
    pub fn set_soil_layers(&mut self, profile: SoilProfile, water_level: f64) -> GeoResult<()> {
        let trace = self
            .trace
            .as_ref()
            .ok_or_else(|| GeoError::not_ready("set_soil_layers", "resample_data"))?;
        let trace_bottom = match trace.depth.last() {
            Some(bottom) => *bottom,
            None => {
                return Err(GeoError::InsufficientData {
                    count: 0,
                    minimum: 2,
                });
            }
        };

        if profile.min_depth() != 0.0 {
            return Err(GeoError::invalid_geometry(
                "profile",
                profile.min_depth().to_string(),
                "Layering must start from zero depth",
            ));
        }
        if profile.max_depth() < trace_bottom {
            return Err(GeoError::invalid_geometry(
                "profile",
                profile.max_depth().to_string(),
                format!("Layering must extend to the trace bottom at {} m", trace_bottom),
            ));
        }
        if water_level < 0.0 {
            return Err(GeoError::invalid_input(
                "water_level",
                water_level.to_string(),
                "Water level must be at or below the surface",
            ));
        }

        let mut profile = profile;
        // Ensure a boundary at the water table before filling unit weight
        // defaults, so each side gets the matching default
        profile.insert_transition(water_level.clamp(profile.min_depth(), profile.max_depth()))?;

        let mut shaft_layers = Vec::with_capacity(profile.len());
        for (index, layer) in profile.layers().iter().enumerate() {
            let label = layer
                .text(SOIL_TYPE_COLUMN)
                .ok_or_else(|| GeoError::missing_parameter(SOIL_TYPE_COLUMN, index))?;
            let soil_type = SoilType::from_label(label)?;
            let tertiary_clay = layer
                .text(TERTIARY_CLAY_COLUMN)
                .map(is_truthy)
                .unwrap_or(false);
            shaft_layers.push(ShaftLayer {
                depth_from: layer.depth_from,
                depth_to: layer.depth_to,
                soil_type,
                tertiary_clay,
                qc_avg: None,
                unit_shaft_friction: None,
            });
        }

        if !profile
            .numerical_parameters()
            .iter()
            .any(|p| p == TOTAL_UNIT_WEIGHT)
        {
            let defaults: Vec<f64> = profile
                .layers()
                .iter()
                .map(|layer| {
                    if layer.center() < water_level {
                        DEFAULT_DRY_UNIT_WEIGHT
                    } else {
                        DEFAULT_WET_UNIT_WEIGHT
                    }
                })
                .collect();
            let mut updated = profile.layers().to_vec();
            for (layer, weight) in updated.iter_mut().zip(defaults) {
                layer
                    .parameters
                    .insert(TOTAL_UNIT_WEIGHT.to_string(), crate::profile::ParameterValue::Constant(weight));
            }
            profile = SoilProfile::with_depth_reference(updated, profile.depth_reference.clone())?;
        }

        profile.calculate_overburden(water_level, DEFAULT_WATER_UNIT_WEIGHT)?;

        let mut nodes = Vec::with_capacity(trace.depth.len());
        for &depth in &trace.depth {
            let label = profile.text_at_depth_below(depth, SOIL_TYPE_COLUMN)?;
            let soil_type = SoilType::from_label(label)?;
            nodes.push(SoilNode {
                soil_type,
                effective_stress: profile.numeric_at_depth(depth, VERTICAL_EFFECTIVE_STRESS)?,
                effective_unit_weight: profile.numeric_at_depth(depth, EFFECTIVE_UNIT_WEIGHT)?,
            });
        }

        self.layering = Some(profile);
        self.nodes = Some(nodes);
        self.shaft_layers = Some(shaft_layers);
        Ok(())
    }

    /// The attached soil profile, with the overburden columns added
    pub fn layering(&self) -> GeoResult<&SoilProfile> {
        self.layering
            .as_ref()
            .ok_or_else(|| GeoError::not_ready("layering", "set_soil_layers"))
    }

    // ========================================================================
    // Base resistance
    // ========================================================================

    /// Run the four correction steps, producing the unit base resistance.
    pub fn calculate_base_resistance(&mut self, options: &CorrectionOptions) -> GeoResult<()> {
        let trace = self
            .trace
            .as_ref()
            .ok_or_else(|| GeoError::not_ready("calculate_base_resistance", "resample_data"))?;
        let nodes = self
            .nodes
            .as_ref()
            .ok_or_else(|| GeoError::not_ready("calculate_base_resistance", "set_soil_layers"))?;

        let count = trace.depth.len();
        let diameter_ratio = self.cone_diameter / self.pile_diameter;

        // Negative readings are measurement noise, clip to zero
        let qc: Vec<f64> = trace.value.iter().map(|&v| v.max(0.0)).collect();

        // Step 1: failure surface correction for shallow depths
        let q_p1: Vec<f64> = qc
            .iter()
            .zip(nodes.iter())
            .map(|(&qc_value, node)| {
                let phi = node.soil_type.friction_angle_deg().to_radians();
                qc_value / (2.0 * (BETA_CONE - BETA_PILE) * phi.tan()).exp()
            })
            .collect();

        // Step 2: stress level correction, clamped to the measured resistance
        let q_p2: Vec<f64> = q_p1
            .iter()
            .zip(nodes.iter())
            .zip(qc.iter())
            .map(|((&q, node), &qc_value)| {
                let h_crit = options
                    .h_crit
                    .unwrap_or_else(|| node.soil_type.critical_depth_m());
                let h_prime_crit = h_crit * self.pile_diameter / self.cone_diameter;
                let p0 = node.effective_stress;
                let a = if p0 > 0.0 {
                    let gamma = node.effective_unit_weight;
                    (1.0 + gamma * h_prime_crit / (2.0 * p0))
                        / (1.0 + gamma * h_crit / (2.0 * p0))
                } else {
                    1.0
                };
                (a * q).min(qc_value)
            })
            .collect();

        // Step 3: downward pass, the pile feels a stronger layer later than
        // the cone does
        let mut q_down = vec![0.0; count];
        for j in 1..count {
            q_down[j] =
                (q_down[j - 1] + (q_p2[j] - q_down[j - 1]) * diameter_ratio).min(q_p2[j]);
        }

        // Step 4: upward pass from the tip, optionally with the Van Impe
        // multiplier
        let coefficient = if options.van_impe { 2.0 } else { 1.0 };
        let mut q_up = vec![0.0; count];
        if let (Some(last_down), Some(last_up)) = (q_down.last(), q_up.last_mut()) {
            *last_up = *last_down;
        }
        for i in 1..count {
            let j = count - 1 - i;
            q_up[j] =
                (q_up[j + 1] + coefficient * (q_down[j] - q_up[j + 1]) * diameter_ratio)
                    .min(q_down[j]);
        }

        self.stages = Some(CorrectionStages {
            qc,
            q_p1,
            q_p2,
            q_down,
            q_up,
        });
        Ok(())
    }

    /// The retained intermediate traces of the correction
    pub fn stages(&self) -> GeoResult<&CorrectionStages> {
        self.stages
            .as_ref()
            .ok_or_else(|| GeoError::not_ready("stages", "calculate_base_resistance"))
    }

    /// Final unit base resistance profile [MPa], aligned with [`Self::depth_qb`]
    pub fn qb(&self) -> GeoResult<&[f64]> {
        Ok(&self.stages()?.q_up)
    }

    /// Depth axis of the unit base resistance profile
    pub fn depth_qb(&self) -> GeoResult<&[f64]> {
        Ok(&self.trace()?.depth)
    }

    /// Unit base resistance interpolated at a depth [MPa]
    pub fn qb_at(&self, depth: f64) -> GeoResult<f64> {
        interpolate(self.depth_qb()?, self.qb()?, depth)
    }

    /// Unit base resistance averaged over one pile diameter below each
    /// level, clamped to the level's own value. Useful for reporting a
    /// representative value at a candidate base level.
    pub fn averaged_base_resistance(&self) -> GeoResult<Vec<f64>> {
        let stages = self.stages()?;
        let depths = self.depth_qb()?;
        let mut averaged = Vec::with_capacity(depths.len());
        for (i, &level) in depths.iter().enumerate() {
            // The window always holds at least the level's own sample
            let window_bottom = level + self.pile_diameter;
            let mut sum = 0.0;
            let mut samples = 0usize;
            for (&depth, &value) in depths.iter().zip(stages.q_up.iter()) {
                if depth >= level && depth <= window_bottom {
                    sum += value;
                    samples += 1;
                }
            }
            averaged.push((sum / samples as f64).min(stages.q_up[i]));
        }
        Ok(averaged)
    }

    // ========================================================================
    // Shaft resistance
    // ========================================================================

    /// Correct the raw cone resistance for the cone type. Mechanical cones
    /// overestimate the resistance in stiff tertiary clay; the correction
    /// divisor applies only within layers flagged as tertiary clay.
    pub fn correct_shaft_qc(&mut self, cone_type: ConeType) -> GeoResult<()> {
        let shaft_layers = self
            .shaft_layers
            .as_ref()
            .ok_or_else(|| GeoError::not_ready("correct_shaft_qc", "set_soil_layers"))?;
        let divisor = cone_type.tertiary_clay_divisor();
        let corrected = self
            .depth_raw
            .iter()
            .zip(self.qc_raw.iter())
            .map(|(&depth, &qc)| {
                let in_tertiary_clay = shaft_layers
                    .iter()
                    .any(|layer| layer.tertiary_clay && depth >= layer.depth_from && depth <= layer.depth_to);
                if in_tertiary_clay {
                    qc / divisor
                } else {
                    qc
                }
            })
            .collect();
        self.qc_corrected = Some(corrected);
        Ok(())
    }

    /// Average the corrected cone resistance within each layer.
    pub fn calculate_average_qc(&mut self) -> GeoResult<()> {
        let corrected = self
            .qc_corrected
            .as_ref()
            .ok_or_else(|| GeoError::not_ready("calculate_average_qc", "correct_shaft_qc"))?;
        let shaft_layers = self
            .shaft_layers
            .as_mut()
            .ok_or_else(|| GeoError::not_ready("calculate_average_qc", "set_soil_layers"))?;
        for layer in shaft_layers.iter_mut() {
            let mut sum = 0.0;
            let mut samples = 0usize;
            for (&depth, &qc) in self.depth_raw.iter().zip(corrected.iter()) {
                if depth >= layer.depth_from && depth <= layer.depth_to {
                    sum += qc;
                    samples += 1;
                }
            }
            layer.qc_avg = Some(if samples > 0 { sum / samples as f64 } else { 0.0 });
        }
        Ok(())
    }

    /// Override the layer-average cone resistance with externally derived
    /// values (one per layer, shallow to deep).
    pub fn set_average_qc(&mut self, qc_avg: &[f64]) -> GeoResult<()> {
        let shaft_layers = self
            .shaft_layers
            .as_mut()
            .ok_or_else(|| GeoError::not_ready("set_average_qc", "set_soil_layers"))?;
        if qc_avg.len() != shaft_layers.len() {
            return Err(GeoError::invalid_geometry(
                "qc_avg",
                qc_avg.len().to_string(),
                format!("One average per layer is required ({} layers)", shaft_layers.len()),
            ));
        }
        for (layer, &value) in shaft_layers.iter_mut().zip(qc_avg.iter()) {
            layer.qc_avg = Some(value);
        }
        Ok(())
    }

    /// Convert the layer-average cone resistance to unit shaft friction
    /// through the calibrated piecewise tables.
    pub fn calculate_unit_shaft_friction(&mut self) -> GeoResult<()> {
        let shaft_layers = self
            .shaft_layers
            .as_mut()
            .ok_or_else(|| GeoError::not_ready("calculate_unit_shaft_friction", "set_soil_layers"))?;
        for (index, layer) in shaft_layers.iter_mut().enumerate() {
            let qc_avg = layer
                .qc_avg
                .ok_or_else(|| GeoError::missing_parameter("qc avg [MPa]", index))?;
            layer.unit_shaft_friction = Some(layer.soil_type.unit_shaft_friction_kpa(qc_avg));
        }
        Ok(())
    }

    /// Per-layer shaft state
    pub fn shaft_layers(&self) -> GeoResult<&[ShaftLayer]> {
        self.shaft_layers
            .as_deref()
            .ok_or_else(|| GeoError::not_ready("shaft_layers", "set_soil_layers"))
    }

    // ========================================================================
    // Capacity aggregation
    // ========================================================================

    /// Aggregate base and shaft resistance into the calculated pile
    /// resistance for a given penetration.
    pub fn calculate_pile_resistance(
        &self,
        input: &PileCapacityInput,
    ) -> GeoResult<PileCapacityResult> {
        let shaft_layers = self.shaft_layers()?;
        if input.circumference < 0.0 || input.base_area < 0.0 {
            return Err(GeoError::invalid_geometry(
                "pile geometry",
                format!("area {}, circumference {}", input.base_area, input.circumference),
                "Base area and circumference must be non-negative",
            ));
        }

        let qb_mpa = self.qb_at(input.pile_penetration)?;
        let base_resistance_kn = input.alpha_b
            * input.epsilon_b
            * input.beta_base
            * input.lambda_base
            * input.base_area
            * 1000.0
            * qb_mpa;

        let mut shaft_components = Vec::new();
        let mut shaft_resistance_kn = 0.0;
        for (index, layer) in shaft_layers.iter().enumerate() {
            if layer.depth_from >= input.pile_penetration {
                break;
            }
            let bottom = layer.depth_to.min(input.pile_penetration);
            let thickness = bottom - layer.depth_from;
            let unit_shaft_friction = layer
                .unit_shaft_friction
                .ok_or_else(|| GeoError::missing_parameter("qs [kPa]", index))?;
            let resistance_kn =
                input.circumference * input.alpha_s * thickness * unit_shaft_friction;
            shaft_resistance_kn += resistance_kn;
            shaft_components.push(ShaftComponent {
                depth_from: layer.depth_from,
                depth_to: bottom,
                soil_type: layer.soil_type,
                unit_shaft_friction_kpa: unit_shaft_friction,
                resistance_kn,
            });
        }

        Ok(PileCapacityResult {
            qb_mpa,
            base_resistance_kn,
            shaft_resistance_kn,
            total_resistance_kn: base_resistance_kn + shaft_resistance_kn,
            shaft_components,
        })
    }
}

fn is_truthy(text: &str) -> bool {
    matches!(text.to_ascii_lowercase().as_str(), "true" | "yes" | "1")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{Layer, SoilProfile};

    fn approx_eq(a: f64, b: f64, tolerance: f64) -> bool {
        (a - b).abs() < tolerance
    }

    /// Deterministic irregular trace: baseline plus oscillation plus a step
    fn irregular_trace() -> (Vec<f64>, Vec<f64>) {
        let depth: Vec<f64> = (0..101).map(|i| i as f64 * 0.1).collect();
        let qc: Vec<f64> = depth
            .iter()
            .map(|&z| {
                let step = if z > 5.0 { 25.0 } else { 0.0 };
                5.0 + 3.0 * (1.3 * z).sin() + step
            })
            .collect();
        (depth, qc)
    }

    fn uniform_sand() -> SoilProfile {
        SoilProfile::new(vec![Layer::new(0.0, 10.0)
            .with_text(SOIL_TYPE_COLUMN, "Sand")
            .with_constant(TOTAL_UNIT_WEIGHT, 19.0)])
        .unwrap()
    }

    fn sand_over_clay() -> SoilProfile {
        SoilProfile::new(vec![
            Layer::new(0.0, 5.0)
                .with_text(SOIL_TYPE_COLUMN, "Sand")
                .with_constant(TOTAL_UNIT_WEIGHT, 19.0),
            Layer::new(5.0, 10.0)
                .with_text(SOIL_TYPE_COLUMN, "Clay")
                .with_constant(TOTAL_UNIT_WEIGHT, 17.0),
        ])
        .unwrap()
    }

    fn prepared_calculation(pile_diameter: f64) -> DeBeerCalculation {
        let (depth, qc) = irregular_trace();
        let mut calculation = DeBeerCalculation::new(depth, qc, pile_diameter).unwrap();
        calculation.resample_data_standard().unwrap();
        calculation.set_soil_layers(uniform_sand(), 2.0).unwrap();
        calculation
    }

    fn variance(values: &[f64]) -> f64 {
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64
    }

    #[test]
    fn test_construction_validation() {
        assert_eq!(
            DeBeerCalculation::new(vec![0.0, 1.0], vec![1.0], 0.4)
                .err()
                .map(|e| e.error_code()),
            Some("INVALID_GEOMETRY")
        );
        assert_eq!(
            DeBeerCalculation::new(vec![0.0, 1.0], vec![1.0, 2.0], 0.1)
                .err()
                .map(|e| e.error_code()),
            Some("INVALID_GEOMETRY")
        );
        assert_eq!(
            DeBeerCalculation::new(vec![0.0], vec![1.0], 0.4)
                .err()
                .map(|e| e.error_code()),
            Some("INSUFFICIENT_DATA")
        );
    }

    #[test]
    fn test_pipeline_ordering_enforced() {
        let (depth, qc) = irregular_trace();
        let mut calculation = DeBeerCalculation::new(depth, qc, 0.4).unwrap();
        // Soil layers before resampling
        assert_eq!(
            calculation
                .set_soil_layers(uniform_sand(), 2.0)
                .err()
                .map(|e| e.error_code()),
            Some("NOT_READY")
        );
        calculation.resample_data_standard().unwrap();
        // Correction before soil layers
        assert_eq!(
            calculation
                .calculate_base_resistance(&CorrectionOptions::default())
                .err()
                .map(|e| e.error_code()),
            Some("NOT_READY")
        );
        calculation.set_soil_layers(uniform_sand(), 2.0).unwrap();
        calculation
            .calculate_base_resistance(&CorrectionOptions::default())
            .unwrap();
        // Average qc before the cone type correction
        assert_eq!(
            calculation.calculate_average_qc().err().map(|e| e.error_code()),
            Some("NOT_READY")
        );
    }

    #[test]
    fn test_unknown_soil_type_rejected() {
        let (depth, qc) = irregular_trace();
        let mut calculation = DeBeerCalculation::new(depth, qc, 0.4).unwrap();
        calculation.resample_data_standard().unwrap();
        let profile = SoilProfile::new(vec![Layer::new(0.0, 10.0)
            .with_text(SOIL_TYPE_COLUMN, "Gravel")
            .with_constant(TOTAL_UNIT_WEIGHT, 20.0)])
        .unwrap();
        assert_eq!(
            calculation
                .set_soil_layers(profile, 2.0)
                .err()
                .map(|e| e.error_code()),
            Some("UNKNOWN_SOIL_TYPE")
        );
    }

    #[test]
    fn test_profile_extent_validation() {
        let (depth, qc) = irregular_trace();
        let mut calculation = DeBeerCalculation::new(depth, qc, 0.4).unwrap();
        calculation.resample_data_standard().unwrap();
        // Profile shorter than the trace
        let short = SoilProfile::new(vec![Layer::new(0.0, 5.0)
            .with_text(SOIL_TYPE_COLUMN, "Sand")
            .with_constant(TOTAL_UNIT_WEIGHT, 19.0)])
        .unwrap();
        assert_eq!(
            calculation
                .set_soil_layers(short, 2.0)
                .err()
                .map(|e| e.error_code()),
            Some("INVALID_GEOMETRY")
        );
    }

    #[test]
    fn test_default_unit_weights_applied() {
        let (depth, qc) = irregular_trace();
        let mut calculation = DeBeerCalculation::new(depth, qc, 0.4).unwrap();
        calculation.resample_data_standard().unwrap();
        let profile =
            SoilProfile::new(vec![Layer::new(0.0, 10.0).with_text(SOIL_TYPE_COLUMN, "Sand")])
                .unwrap();
        calculation.set_soil_layers(profile, 4.0).unwrap();
        let layering = calculation.layering().unwrap();
        assert!(approx_eq(
            layering.numeric_at_depth(1.0, TOTAL_UNIT_WEIGHT).unwrap(),
            DEFAULT_DRY_UNIT_WEIGHT,
            1e-12
        ));
        assert!(approx_eq(
            layering.numeric_at_depth(8.0, TOTAL_UNIT_WEIGHT).unwrap(),
            DEFAULT_WET_UNIT_WEIGHT,
            1e-12
        ));
    }

    #[test]
    fn test_qb_never_exceeds_qc() {
        let mut calculation = prepared_calculation(0.4);
        calculation
            .calculate_base_resistance(&CorrectionOptions::default())
            .unwrap();
        let stages = calculation.stages().unwrap();
        for (qb, qc) in stages.q_up.iter().zip(stages.qc.iter()) {
            assert!(qb <= qc, "qb {} exceeds qc {}", qb, qc);
        }
        // Each stage is bounded by the previous clamping stage
        for i in 0..stages.qc.len() {
            assert!(stages.q_p2[i] <= stages.qc[i] + 1e-12);
            assert!(stages.q_down[i] <= stages.q_p2[i] + 1e-12);
            assert!(stages.q_up[i] <= stages.q_down[i] + 1e-12);
        }
    }

    #[test]
    fn test_negative_qc_clipped() {
        let depth: Vec<f64> = (0..21).map(|i| i as f64 * 0.2).collect();
        let mut qc = vec![5.0; 21];
        qc[3] = -1.0;
        let mut calculation = DeBeerCalculation::new(depth, qc, 0.4).unwrap();
        calculation.resample_data_standard().unwrap();
        let profile = SoilProfile::new(vec![Layer::new(0.0, 4.0)
            .with_text(SOIL_TYPE_COLUMN, "Sand")
            .with_constant(TOTAL_UNIT_WEIGHT, 19.0)])
        .unwrap();
        calculation.set_soil_layers(profile, 1.0).unwrap();
        calculation
            .calculate_base_resistance(&CorrectionOptions::default())
            .unwrap();
        let stages = calculation.stages().unwrap();
        assert!(stages.qc.iter().all(|&v| v >= 0.0));
    }

    #[test]
    fn test_larger_diameter_smooths_more() {
        // A larger pile has a longer memory of the layers above, so the
        // corrected profile of a step-function trace varies less
        let mut small = prepared_calculation(0.4);
        small
            .calculate_base_resistance(&CorrectionOptions::default())
            .unwrap();
        let mut large = prepared_calculation(1.2);
        large
            .calculate_base_resistance(&CorrectionOptions::default())
            .unwrap();
        let variance_small = variance(small.qb().unwrap());
        let variance_large = variance(large.qb().unwrap());
        assert!(
            variance_large < variance_small,
            "variance {} for D=1.2 not below {} for D=0.4",
            variance_large,
            variance_small
        );
    }

    #[test]
    fn test_step_transition_is_smooth() {
        // qc steps from 5 to 40 MPa at 5m; the corrected resistance ramps
        // over a window proportional to the diameter instead of stepping
        let depth: Vec<f64> = (0..51).map(|i| i as f64 * 0.2).collect();
        let qc: Vec<f64> = depth
            .iter()
            .map(|&z| if z > 5.0 { 40.0 } else { 5.0 })
            .collect();
        let mut calculation = DeBeerCalculation::new(depth, qc, 0.4).unwrap();
        calculation.resample_data_standard().unwrap();
        calculation.set_soil_layers(sand_over_clay(), 2.0).unwrap();
        calculation
            .calculate_base_resistance(&CorrectionOptions::default())
            .unwrap();
        let qb = calculation.qb().unwrap();
        let depths = calculation.depth_qb().unwrap().to_vec();
        // Just below the interface the ramp has barely started
        let index_52 = depths.iter().position(|&d| approx_eq(d, 5.2, 1e-9)).unwrap();
        assert!(qb[index_52] < 20.0);
        // and the rise below the interface is monotonic
        for j in index_52..qb.len() - 1 {
            assert!(qb[j + 1] >= qb[j] - 1e-12);
        }
    }

    #[test]
    fn test_van_impe_recovers_faster_above_weak_zone() {
        // The Van Impe multiplier of 2 makes the upward pass approach the
        // downward-corrected value twice as fast, so moving up from a weak
        // zone into strong material the corrected value recovers sooner and
        // is never below De Beer's original recurrence
        let depth: Vec<f64> = (0..51).map(|i| i as f64 * 0.2).collect();
        let qc: Vec<f64> = depth
            .iter()
            .map(|&z| if z > 5.0 { 2.0 } else { 30.0 })
            .collect();
        let build = |van_impe: bool| {
            let mut calculation =
                DeBeerCalculation::new(depth.clone(), qc.clone(), 0.4).unwrap();
            calculation.resample_data_standard().unwrap();
            calculation.set_soil_layers(sand_over_clay(), 2.0).unwrap();
            calculation
                .calculate_base_resistance(&CorrectionOptions {
                    van_impe,
                    ..CorrectionOptions::default()
                })
                .unwrap();
            calculation.qb().unwrap().to_vec()
        };
        let standard = build(false);
        let van_impe = build(true);
        for (v, s) in van_impe.iter().zip(standard.iter()) {
            assert!(*v >= s - 1e-12);
        }
        assert!(van_impe.iter().sum::<f64>() > standard.iter().sum::<f64>());
    }

    #[test]
    fn test_h_crit_from_soil_type_table() {
        // Without an override, step 2 pulls the critical depth of each
        // sample's soil type; spelling out that value gives the same result
        let mut from_table = prepared_calculation(0.4);
        from_table
            .calculate_base_resistance(&CorrectionOptions::default())
            .unwrap();
        let mut explicit = prepared_calculation(0.4);
        explicit
            .calculate_base_resistance(&CorrectionOptions {
                van_impe: false,
                h_crit: Some(SoilType::Sand.critical_depth_m()),
            })
            .unwrap();
        assert_eq!(from_table.stages().unwrap(), explicit.stages().unwrap());
    }

    #[test]
    fn test_h_crit_override_changes_stress_correction() {
        // A larger critical depth raises the stress-level multiplier A, so
        // the corrected resistance can only grow
        let mut standard = prepared_calculation(0.4);
        standard
            .calculate_base_resistance(&CorrectionOptions::default())
            .unwrap();
        let mut stretched = prepared_calculation(0.4);
        stretched
            .calculate_base_resistance(&CorrectionOptions {
                van_impe: false,
                h_crit: Some(0.5),
            })
            .unwrap();
        let base = standard.stages().unwrap();
        let overridden = stretched.stages().unwrap();
        for (o, b) in overridden.q_p2.iter().zip(base.q_p2.iter()) {
            assert!(*o >= b - 1e-12);
        }
        assert!(
            overridden.q_up.iter().sum::<f64>() > base.q_up.iter().sum::<f64>(),
            "override had no effect on the corrected profile"
        );
    }

    #[test]
    fn test_averaged_base_resistance_bounded() {
        let mut calculation = prepared_calculation(0.4);
        calculation
            .calculate_base_resistance(&CorrectionOptions::default())
            .unwrap();
        let averaged = calculation.averaged_base_resistance().unwrap();
        let qb = calculation.qb().unwrap();
        assert_eq!(averaged.len(), qb.len());
        for (avg, value) in averaged.iter().zip(qb.iter()) {
            assert!(avg <= value);
        }
    }

    #[test]
    fn test_shaft_correction_in_tertiary_clay() {
        let depth: Vec<f64> = (0..51).map(|i| i as f64 * 0.2).collect();
        let qc = vec![3.9; 51];
        let mut calculation = DeBeerCalculation::new(depth, qc, 0.4).unwrap();
        calculation.resample_data_standard().unwrap();
        let profile = SoilProfile::new(vec![
            Layer::new(0.0, 5.0)
                .with_text(SOIL_TYPE_COLUMN, "Sand")
                .with_constant(TOTAL_UNIT_WEIGHT, 19.0),
            Layer::new(5.0, 10.0)
                .with_text(SOIL_TYPE_COLUMN, "Clay")
                .with_text(TERTIARY_CLAY_COLUMN, "True")
                .with_constant(TOTAL_UNIT_WEIGHT, 17.0),
        ])
        .unwrap();
        calculation.set_soil_layers(profile, 2.0).unwrap();
        calculation.correct_shaft_qc(ConeType::M1).unwrap();
        calculation.calculate_average_qc().unwrap();
        // The water level at 2m split the sand, leaving three layers
        let layers = calculation.shaft_layers().unwrap();
        assert_eq!(layers.len(), 3);
        // Sand untouched, tertiary clay divided by 1.3
        assert!(approx_eq(layers[0].qc_avg.unwrap(), 3.9, 1e-12));
        assert!(approx_eq(layers[2].qc_avg.unwrap(), 3.0, 1e-12));
        // The boundary sample at 5.0m sits in the clay too, so it is
        // corrected and enters the 2-5m average: (15 * 3.9 + 3.0) / 16
        assert!(approx_eq(layers[1].qc_avg.unwrap(), 61.5 / 16.0, 1e-12));
    }

    #[test]
    fn test_unit_shaft_friction_from_average() {
        let mut calculation = prepared_calculation(0.4);
        calculation.set_average_qc(&[9.0, 9.0, 9.0]).unwrap_err();
        // uniform_sand has a transition inserted at the 2m water level
        calculation.set_average_qc(&[9.0, 9.0]).unwrap();
        calculation.calculate_unit_shaft_friction().unwrap();
        let layers = calculation.shaft_layers().unwrap();
        // Sand at 9 MPa: 1000 * 9 / 90 = 100 kPa
        assert!(approx_eq(layers[0].unit_shaft_friction.unwrap(), 100.0, 1e-12));
    }

    #[test]
    fn test_pile_resistance_hand_calculation() {
        let mut calculation = prepared_calculation(0.4);
        calculation
            .calculate_base_resistance(&CorrectionOptions::default())
            .unwrap();
        calculation.set_average_qc(&[9.0, 9.0]).unwrap();
        calculation.calculate_unit_shaft_friction().unwrap();

        // Shaft only: qs = 100 kPa over 7.5m, circumference 1m:
        //   Rs = 100 * (2.0 + 5.5) * 1.0 = 750 kN
        let input = PileCapacityInput::new(7.5, 0.0, 1.0);
        let result = calculation.calculate_pile_resistance(&input).unwrap();
        assert!(approx_eq(result.shaft_resistance_kn, 750.0, 1e-9));
        assert!(approx_eq(result.base_resistance_kn, 0.0, 1e-12));
        assert!(approx_eq(result.total_resistance_kn, 750.0, 1e-9));
        // Two components, the deeper truncated at the penetration
        assert_eq!(result.shaft_components.len(), 2);
        assert_eq!(result.shaft_components[1].depth_to, 7.5);

        // Base resistance follows the interpolated qb
        let with_base = PileCapacityInput::new(7.5, 0.1, 1.0).with_alpha_factors(0.8, 1.0);
        let result = calculation.calculate_pile_resistance(&with_base).unwrap();
        let qb = calculation.qb_at(7.5).unwrap();
        assert!(approx_eq(result.base_resistance_kn, 0.8 * 0.1 * 1000.0 * qb, 1e-9));
    }

    #[test]
    fn test_pile_resistance_beyond_trace_rejected() {
        let mut calculation = prepared_calculation(0.4);
        calculation
            .calculate_base_resistance(&CorrectionOptions::default())
            .unwrap();
        calculation.set_average_qc(&[9.0, 9.0]).unwrap();
        calculation.calculate_unit_shaft_friction().unwrap();
        let input = PileCapacityInput::new(15.0, 0.1, 1.0);
        assert_eq!(
            calculation
                .calculate_pile_resistance(&input)
                .err()
                .map(|e| e.error_code()),
            Some("OUT_OF_RANGE")
        );
    }
}
