//! Calculation grid
//!
//! A [`CalculationGrid`] derives a one-dimensional node/element mesh from a
//! [`SoilProfile`](crate::profile::SoilProfile): nodes at a regular spacing
//! unioned with every layer interface, and elements spanning consecutive
//! nodes. Because every interface is a node, an element never straddles a
//! layer boundary, so parameter values are never smeared across interfaces.
//!
//! ## Example
//!
//! ```rust
//! use geo_core::profile::{CalculationGrid, SoilProfile};
//!
//! let profile = SoilProfile::uniform(0.0, 10.0, "Sand", 19.0).unwrap();
//! let grid = CalculationGrid::new(&profile, 1.0).unwrap();
//! assert_eq!(grid.nodes.len(), 11);
//! assert_eq!(grid.elements.len(), 10);
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::{GeoError, GeoResult};
use crate::profile::layer::ParameterValue;
use crate::profile::soil_profile::SoilProfile;

/// Tolerance for merging a regular grid coordinate with a layer interface
const NODE_MERGE_TOLERANCE: f64 = 1e-9;

/// Point sample of the profile: every numeric parameter interpolated at the
/// node depth, every text parameter resolved to the layer below the node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridNode {
    /// Depth of the node
    pub depth: f64,
    /// Interpolated numeric parameter values
    pub numeric: BTreeMap<String, f64>,
    /// Categorical parameter values
    pub text: BTreeMap<String, String>,
}

impl GridNode {
    pub fn new(depth: f64) -> Self {
        GridNode {
            depth,
            numeric: BTreeMap::new(),
            text: BTreeMap::new(),
        }
    }
}

/// Interval between two consecutive nodes. Lies entirely inside one layer of
/// the source profile; linear parameters carry their own sub-segment values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridElement {
    /// Top of the element
    pub depth_from: f64,
    /// Bottom of the element
    pub depth_to: f64,
    /// Parameter values over the element
    pub parameters: BTreeMap<String, ParameterValue>,
}

impl GridElement {
    /// Element midpoint
    pub fn center(&self) -> f64 {
        0.5 * (self.depth_from + self.depth_to)
    }

    /// Element thickness
    pub fn thickness(&self) -> f64 {
        self.depth_to - self.depth_from
    }
}

/// Node/element mesh over a soil profile. Holds an independent copy of the
/// interpolated data; the source profile is not mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationGrid {
    /// Point samples, strictly increasing in depth
    pub nodes: Vec<GridNode>,
    /// Intervals between consecutive nodes (`nodes.len() - 1` entries)
    pub elements: Vec<GridElement>,
}

impl CalculationGrid {
    /// Build a grid with nodes at `top, top + spacing, top + 2 spacing, ...,
    /// bottom` unioned with every layer interface of the profile.
    pub fn new(profile: &SoilProfile, spacing: f64) -> GeoResult<Self> {
        if spacing <= 0.0 {
            return Err(GeoError::invalid_geometry(
                "spacing",
                spacing.to_string(),
                "Grid spacing must be strictly positive",
            ));
        }
        let top = profile.min_depth();
        let bottom = profile.max_depth();

        let mut depths = Vec::new();
        let mut step = 0usize;
        loop {
            let depth = top + step as f64 * spacing;
            if depth >= bottom {
                break;
            }
            depths.push(depth);
            step += 1;
        }
        depths.push(bottom);
        depths.extend(profile.layer_transitions(false, false));
        depths.sort_by(|a, b| a.total_cmp(b));
        depths.dedup_by(|a, b| (*a - *b).abs() < NODE_MERGE_TOLERANCE);

        Self::build(profile, &depths)
    }

    /// Build a grid on caller-supplied node depths (strictly ascending and
    /// within the profile bounds). Layer interfaces are NOT added implicitly,
    /// so an element may straddle an interface; its parameters then come from
    /// the layer containing the element midpoint.
    pub fn with_nodes(profile: &SoilProfile, depths: &[f64]) -> GeoResult<Self> {
        if depths.len() < 2 {
            return Err(GeoError::InsufficientData {
                count: depths.len(),
                minimum: 2,
            });
        }
        for pair in depths.windows(2) {
            if pair[1] <= pair[0] {
                return Err(GeoError::invalid_input(
                    "depths",
                    format!("{} after {}", pair[1], pair[0]),
                    "Node depths must be strictly ascending",
                ));
            }
        }
        Self::build(profile, depths)
    }

    fn build(profile: &SoilProfile, depths: &[f64]) -> GeoResult<Self> {
        let nodes = profile.map_to_grid(depths)?;

        let numerical = profile.numerical_parameters();
        let strings = profile.string_parameters();
        let mut elements = Vec::with_capacity(depths.len().saturating_sub(1));
        for pair in depths.windows(2) {
            let (element_top, element_bottom) = (pair[0], pair[1]);
            let center = 0.5 * (element_top + element_bottom);
            let layer_index = profile.layer_index_at(center)?;
            let layer = &profile.layers()[layer_index];
            let mut parameters = BTreeMap::new();
            for parameter in &numerical {
                match layer.parameters.get(parameter) {
                    Some(ParameterValue::Constant(value)) => {
                        parameters.insert(parameter.clone(), ParameterValue::Constant(*value));
                    }
                    Some(ParameterValue::Linear { .. }) => {
                        // Sub-segment of the layer's linear variation
                        if let (Some(from), Some(to)) = (
                            layer.numeric_at(element_top.max(layer.depth_from), parameter),
                            layer.numeric_at(element_bottom.min(layer.depth_to), parameter),
                        ) {
                            parameters
                                .insert(parameter.clone(), ParameterValue::Linear { from, to });
                        }
                    }
                    _ => {}
                }
            }
            for parameter in &strings {
                if let Some(value) = layer.text(parameter) {
                    parameters
                        .insert(parameter.clone(), ParameterValue::Text(value.to_string()));
                }
            }
            elements.push(GridElement {
                depth_from: element_top,
                depth_to: element_bottom,
                parameters,
            });
        }

        Ok(CalculationGrid { nodes, elements })
    }

    /// Node depths, strictly increasing
    pub fn node_depths(&self) -> Vec<f64> {
        self.nodes.iter().map(|node| node.depth).collect()
    }

    /// Paired (depth, value) arrays for a numeric parameter over the
    /// elements, doubling points at element boundaries so ramps and steps
    /// plot exactly.
    pub fn soilparameter_series(&self, parameter: &str) -> GeoResult<(Vec<f64>, Vec<f64>)> {
        let mut depths = Vec::with_capacity(2 * self.elements.len());
        let mut values = Vec::with_capacity(2 * self.elements.len());
        for (index, element) in self.elements.iter().enumerate() {
            let (from, to) = match element.parameters.get(parameter) {
                Some(ParameterValue::Constant(value)) => (*value, *value),
                Some(ParameterValue::Linear { from, to }) => (*from, *to),
                Some(ParameterValue::Text(_)) => {
                    return Err(GeoError::invalid_input(
                        "parameter",
                        parameter,
                        "Parameter is categorical, series are numeric only",
                    ));
                }
                None => return Err(GeoError::missing_parameter(parameter, index)),
            };
            depths.push(element.depth_from);
            values.push(from);
            depths.push(element.depth_to);
            values.push(to);
        }
        Ok((depths, values))
    }
}
