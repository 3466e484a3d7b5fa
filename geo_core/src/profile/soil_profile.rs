//! Layered soil profile
//!
//! A [`SoilProfile`] is an ordered sequence of contiguous layers with named
//! soil parameters. It provides the interval arithmetic needed by
//! geotechnical calculations: interpolating lookup, transition insertion,
//! merging, cutting, shifting, sign conversion, depth integration and
//! overburden stress calculation.
//!
//! ## Column naming convention
//!
//! Profiles interoperate with tabular data sources through a strict column
//! naming convention: numeric columns carry a bracketed unit suffix
//! (`"Total unit weight [kN/m3]"`), linearly varying parameters are split
//! into `"<name> from [<unit>]"` / `"<name> to [<unit>]"` pairs, and text
//! columns carry no unit suffix (`"Soil type"`). [`SoilProfile::from_table`]
//! and [`SoilProfile::to_table`] preserve this convention bit-for-bit.
//!
//! ## Example
//!
//! ```rust
//! use geo_core::profile::{Layer, SoilProfile};
//!
//! let profile = SoilProfile::new(vec![
//!     Layer::new(0.0, 5.0)
//!         .with_text("Soil type", "Sand")
//!         .with_constant("Total unit weight [kN/m3]", 19.0),
//!     Layer::new(5.0, 10.0)
//!         .with_text("Soil type", "Clay")
//!         .with_constant("Total unit weight [kN/m3]", 17.0),
//! ]).unwrap();
//!
//! assert_eq!(profile.max_depth(), 10.0);
//! assert_eq!(profile.text_at_depth(2.0, "Soil type").unwrap(), "Sand");
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::errors::{GeoError, GeoResult};
use crate::profile::grid::GridNode;
use crate::profile::layer::{Layer, ParameterValue};

/// Default column name for the total unit weight
pub const TOTAL_UNIT_WEIGHT: &str = "Total unit weight [kN/m3]";
/// Column written by the overburden calculation: unit weight of the pore water
pub const WATER_UNIT_WEIGHT: &str = "Water unit weight [kN/m3]";
/// Column written by the overburden calculation: effective unit weight
pub const EFFECTIVE_UNIT_WEIGHT: &str = "Effective unit weight [kN/m3]";
/// Column written by the overburden calculation: hydrostatic pressure
pub const HYDROSTATIC_PRESSURE: &str = "Hydrostatic pressure [kPa]";
/// Column written by the overburden calculation: total vertical stress
pub const VERTICAL_TOTAL_STRESS: &str = "Vertical total stress [kPa]";
/// Column written by the overburden calculation: effective vertical stress
pub const VERTICAL_EFFECTIVE_STRESS: &str = "Vertical effective stress [kPa]";

/// Depth column metadata. The depth columns of the tabular representation are
/// named `"{name} from [{unit}]"` and `"{name} to [{unit}]"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthReference {
    /// Name of the depth reference (default "Depth")
    pub name: String,
    /// Depth unit (default "m")
    pub unit: String,
}

impl Default for DepthReference {
    fn default() -> Self {
        DepthReference {
            name: "Depth".to_string(),
            unit: "m".to_string(),
        }
    }
}

impl DepthReference {
    /// Column name for layer tops, e.g. `"Depth from [m]"`
    pub fn from_column(&self) -> String {
        format!("{} from [{}]", self.name, self.unit)
    }

    /// Column name for layer bottoms, e.g. `"Depth to [m]"`
    pub fn to_column(&self) -> String {
        format!("{} to [{}]", self.name, self.unit)
    }
}

/// Rule for collapsing a linear variation to a constant value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionRule {
    Min,
    Mean,
    Max,
}

impl SelectionRule {
    fn apply(&self, from: f64, to: f64) -> f64 {
        match self {
            SelectionRule::Min => from.min(to),
            SelectionRule::Mean => 0.5 * (from + to),
            SelectionRule::Max => from.max(to),
        }
    }
}

/// Column payload for the tabular wire format. `NaN` entries in a numeric
/// column mark the parameter as missing in that layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "values")]
pub enum ColumnData {
    Numeric(Vec<f64>),
    Text(Vec<String>),
}

/// Kind of a parsed (non-depth) column name
enum ColumnKind {
    /// `"name [unit]"` - constant numeric parameter
    Constant(String),
    /// `"name from [unit]"` - top value of a linear pair; holds condensed name
    LinearFrom(String),
    /// `"name to [unit]"` - bottom value of a linear pair; holds condensed name
    LinearTo(String),
    /// No bracketed unit - text parameter
    Text,
}

/// Splits a column name into its stem and bracketed unit, when present.
/// `"Su from [kPa]"` yields `("Su from", "kPa")`.
fn split_unit(name: &str) -> Option<(&str, &str)> {
    if !name.ends_with(']') {
        return None;
    }
    let open = name.rfind(" [")?;
    Some((&name[..open], &name[open + 2..name.len() - 1]))
}

fn classify_column(name: &str) -> ColumnKind {
    match split_unit(name) {
        Some((stem, unit)) => {
            if let Some(base) = stem.strip_suffix(" from") {
                ColumnKind::LinearFrom(format!("{} [{}]", base, unit))
            } else if let Some(base) = stem.strip_suffix(" to") {
                ColumnKind::LinearTo(format!("{} [{}]", base, unit))
            } else {
                ColumnKind::Constant(name.to_string())
            }
        }
        None => ColumnKind::Text,
    }
}

/// Ordered sequence of contiguous soil layers plus depth-column metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoilProfile {
    layers: Vec<Layer>,
    /// Depth column naming metadata
    pub depth_reference: DepthReference,
}

impl SoilProfile {
    // ========================================================================
    // Construction
    // ========================================================================

    /// Create a profile from layers, validating contiguity.
    pub fn new(layers: Vec<Layer>) -> GeoResult<Self> {
        Self::with_depth_reference(layers, DepthReference::default())
    }

    /// Create a profile with an explicit depth reference (name and unit).
    pub fn with_depth_reference(
        layers: Vec<Layer>,
        depth_reference: DepthReference,
    ) -> GeoResult<Self> {
        let profile = SoilProfile {
            layers,
            depth_reference,
        };
        profile.validate()?;
        Ok(profile)
    }

    /// Single-layer profile with a soil type and total unit weight, useful as
    /// a starting point for programmatic construction.
    pub fn uniform(
        min_depth: f64,
        max_depth: f64,
        soil_type: impl Into<String>,
        total_unit_weight: f64,
    ) -> GeoResult<Self> {
        if max_depth <= min_depth {
            return Err(GeoError::invalid_geometry(
                "max_depth",
                max_depth.to_string(),
                "Maximum depth must be strictly greater than minimum depth",
            ));
        }
        SoilProfile::new(vec![Layer::new(min_depth, max_depth)
            .with_text("Soil type", soil_type)
            .with_constant(TOTAL_UNIT_WEIGHT, total_unit_weight)])
    }

    /// Build a profile from named columns following the naming convention
    /// described in the module documentation. The depth columns must be named
    /// `"Depth from [m]"` / `"Depth to [m]"` (use
    /// [`SoilProfile::from_table_with_reference`] for other depth references).
    pub fn from_table(columns: Vec<(String, ColumnData)>) -> GeoResult<Self> {
        Self::from_table_with_reference(columns, DepthReference::default())
    }

    /// Build a profile from named columns with an explicit depth reference.
    pub fn from_table_with_reference(
        columns: Vec<(String, ColumnData)>,
        depth_reference: DepthReference,
    ) -> GeoResult<Self> {
        let from_col = depth_reference.from_column();
        let to_col = depth_reference.to_column();

        let depth_from = Self::require_numeric_column(&columns, &from_col)?;
        let depth_to = Self::require_numeric_column(&columns, &to_col)?;
        if depth_from.len() != depth_to.len() {
            return Err(GeoError::invalid_geometry(
                "depth columns",
                format!("{} vs {}", depth_from.len(), depth_to.len()),
                "Depth from and depth to columns must have the same length",
            ));
        }
        let row_count = depth_from.len();

        let mut layers: Vec<Layer> = depth_from
            .iter()
            .zip(depth_to.iter())
            .map(|(&from, &to)| Layer::new(from, to))
            .collect();

        // First pass: verify every linear half has its counterpart
        for (name, _) in &columns {
            if name == &from_col || name == &to_col {
                continue;
            }
            match classify_column(name) {
                ColumnKind::LinearFrom(condensed) => {
                    let partner = condensed.replace(" [", " to [");
                    if !columns.iter().any(|(n, _)| n == &partner) {
                        return Err(GeoError::invalid_input(
                            "column",
                            name.clone(),
                            format!("Linear parameter requires a matching '{}' column", partner),
                        ));
                    }
                }
                ColumnKind::LinearTo(condensed) => {
                    let partner = condensed.replace(" [", " from [");
                    if !columns.iter().any(|(n, _)| n == &partner) {
                        return Err(GeoError::invalid_input(
                            "column",
                            name.clone(),
                            format!("Linear parameter requires a matching '{}' column", partner),
                        ));
                    }
                }
                _ => {}
            }
        }

        // Second pass: populate the layers
        for (name, data) in &columns {
            if name == &from_col || name == &to_col {
                continue;
            }
            match classify_column(name) {
                ColumnKind::Constant(condensed) => {
                    let values = Self::expect_numeric(name, data, row_count)?;
                    for (layer, &value) in layers.iter_mut().zip(values.iter()) {
                        if !value.is_nan() {
                            layer
                                .parameters
                                .insert(condensed.clone(), ParameterValue::Constant(value));
                        }
                    }
                }
                ColumnKind::LinearFrom(condensed) => {
                    let to_name = condensed.replace(" [", " to [");
                    let from_values = Self::expect_numeric(name, data, row_count)?;
                    let to_data = columns
                        .iter()
                        .find(|(n, _)| n == &to_name)
                        .map(|(_, d)| d)
                        .ok_or_else(|| {
                            GeoError::invalid_input(
                                "column",
                                name.clone(),
                                format!("Linear parameter requires a matching '{}' column", to_name),
                            )
                        })?;
                    let to_values = Self::expect_numeric(&to_name, to_data, row_count)?;
                    for (index, layer) in layers.iter_mut().enumerate() {
                        let from = from_values[index];
                        let to = to_values[index];
                        match (from.is_nan(), to.is_nan()) {
                            (true, true) => {} // missing in this layer
                            (false, false) => {
                                layer
                                    .parameters
                                    .insert(condensed.clone(), ParameterValue::Linear { from, to });
                            }
                            _ => {
                                return Err(GeoError::invalid_input(
                                    "column",
                                    condensed.clone(),
                                    format!(
                                        "Layer {} defines only one end of the linear variation",
                                        index
                                    ),
                                ));
                            }
                        }
                    }
                }
                // Handled together with its 'from' partner
                ColumnKind::LinearTo(_) => {}
                ColumnKind::Text => {
                    let values = match data {
                        ColumnData::Text(values) => values,
                        ColumnData::Numeric(_) => {
                            return Err(GeoError::invalid_input(
                                "column",
                                name.clone(),
                                "Column without a bracketed unit must hold text values",
                            ));
                        }
                    };
                    if values.len() != row_count {
                        return Err(GeoError::invalid_geometry(
                            "column",
                            name.clone(),
                            "Column length does not match the number of layers",
                        ));
                    }
                    for (layer, value) in layers.iter_mut().zip(values.iter()) {
                        if !value.is_empty() {
                            layer
                                .parameters
                                .insert(name.clone(), ParameterValue::Text(value.clone()));
                        }
                    }
                }
            }
        }

        SoilProfile::with_depth_reference(layers, depth_reference)
    }

    fn require_numeric_column<'a>(
        columns: &'a [(String, ColumnData)],
        name: &str,
    ) -> GeoResult<&'a Vec<f64>> {
        match columns.iter().find(|(n, _)| n == name) {
            Some((_, ColumnData::Numeric(values))) => Ok(values),
            Some((_, ColumnData::Text(_))) => Err(GeoError::invalid_input(
                "column",
                name,
                "Depth column must be numeric",
            )),
            None => Err(GeoError::invalid_input(
                "column",
                name,
                "Required depth column not found",
            )),
        }
    }

    fn expect_numeric<'a>(
        name: &str,
        data: &'a ColumnData,
        row_count: usize,
    ) -> GeoResult<&'a Vec<f64>> {
        match data {
            ColumnData::Numeric(values) => {
                if values.len() != row_count {
                    Err(GeoError::invalid_geometry(
                        "column",
                        name,
                        "Column length does not match the number of layers",
                    ))
                } else {
                    Ok(values)
                }
            }
            ColumnData::Text(_) => Err(GeoError::invalid_input(
                "column",
                name,
                "Column with a bracketed unit must hold numeric values",
            )),
        }
    }

    /// Emit the tabular representation using the same column naming
    /// convention accepted by [`SoilProfile::from_table`]. Missing numeric
    /// parameters appear as `NaN`, missing text parameters as empty strings.
    pub fn to_table(&self) -> Vec<(String, ColumnData)> {
        let mut columns: Vec<(String, ColumnData)> = Vec::new();
        columns.push((
            self.depth_reference.from_column(),
            ColumnData::Numeric(self.layers.iter().map(|l| l.depth_from).collect()),
        ));
        columns.push((
            self.depth_reference.to_column(),
            ColumnData::Numeric(self.layers.iter().map(|l| l.depth_to).collect()),
        ));
        for parameter in self.numerical_parameters() {
            if self.has_linear_variation(&parameter) {
                let from_name = parameter.replace(" [", " from [");
                let to_name = parameter.replace(" [", " to [");
                let mut from_values = Vec::with_capacity(self.layers.len());
                let mut to_values = Vec::with_capacity(self.layers.len());
                for layer in &self.layers {
                    match layer.parameters.get(&parameter) {
                        Some(ParameterValue::Linear { from, to }) => {
                            from_values.push(*from);
                            to_values.push(*to);
                        }
                        Some(ParameterValue::Constant(value)) => {
                            from_values.push(*value);
                            to_values.push(*value);
                        }
                        _ => {
                            from_values.push(f64::NAN);
                            to_values.push(f64::NAN);
                        }
                    }
                }
                columns.push((from_name, ColumnData::Numeric(from_values)));
                columns.push((to_name, ColumnData::Numeric(to_values)));
            } else {
                let values = self
                    .layers
                    .iter()
                    .map(|layer| match layer.parameters.get(&parameter) {
                        Some(ParameterValue::Constant(value)) => *value,
                        _ => f64::NAN,
                    })
                    .collect();
                columns.push((parameter.clone(), ColumnData::Numeric(values)));
            }
        }
        for parameter in self.string_parameters() {
            let values = self
                .layers
                .iter()
                .map(|layer| layer.text(&parameter).unwrap_or("").to_string())
                .collect();
            columns.push((parameter.clone(), ColumnData::Text(values)));
        }
        columns
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// The layers of the profile, ordered by increasing depth
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Number of layers
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Whether the profile holds no layers (never true for a validated profile)
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Top of the first layer
    pub fn min_depth(&self) -> f64 {
        self.layers.first().map(|l| l.depth_from).unwrap_or(0.0)
    }

    /// Bottom of the last layer
    pub fn max_depth(&self) -> f64 {
        self.layers.last().map(|l| l.depth_to).unwrap_or(0.0)
    }

    /// Interior layer transition depths. The profile top and bottom can be
    /// included with the corresponding flags.
    pub fn layer_transitions(&self, include_top: bool, include_bottom: bool) -> Vec<f64> {
        let mut transitions = Vec::new();
        if include_top {
            transitions.push(self.min_depth());
        }
        for layer in self.layers.iter().skip(1) {
            transitions.push(layer.depth_from);
        }
        if include_bottom {
            transitions.push(self.max_depth());
        }
        transitions
    }

    /// Names of the numeric soil parameters (condensed: linear variations
    /// appear once, without the from/to suffix)
    pub fn numerical_parameters(&self) -> Vec<String> {
        let mut names = BTreeSet::new();
        for layer in &self.layers {
            for (name, value) in &layer.parameters {
                if value.is_numeric() {
                    names.insert(name.clone());
                }
            }
        }
        names.into_iter().collect()
    }

    /// Names of the categorical (text) soil parameters
    pub fn string_parameters(&self) -> Vec<String> {
        let mut names = BTreeSet::new();
        for layer in &self.layers {
            for (name, value) in &layer.parameters {
                if !value.is_numeric() {
                    names.insert(name.clone());
                }
            }
        }
        names.into_iter().collect()
    }

    /// Whether a parameter varies linearly in at least one layer
    pub fn has_linear_variation(&self, parameter: &str) -> bool {
        self.layers
            .iter()
            .any(|layer| matches!(layer.parameters.get(parameter), Some(v) if v.is_linear()))
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    fn check_bounds(&self, depth: f64) -> GeoResult<()> {
        if depth < self.min_depth() || depth > self.max_depth() {
            Err(GeoError::out_of_range(
                depth,
                self.min_depth(),
                self.max_depth(),
            ))
        } else {
            Ok(())
        }
    }

    /// Index of the shallowest layer containing `depth`. At an interior
    /// boundary the layer above wins (the boundary is its bottom).
    pub(crate) fn layer_index_at(&self, depth: f64) -> GeoResult<usize> {
        self.check_bounds(depth)?;
        self.layers
            .iter()
            .position(|layer| depth >= layer.depth_from && depth <= layer.depth_to)
            .ok_or_else(|| GeoError::out_of_range(depth, self.min_depth(), self.max_depth()))
    }

    /// Index of the deepest layer containing `depth`. At an interior boundary
    /// the layer below wins (the boundary is its top).
    pub(crate) fn layer_index_below(&self, depth: f64) -> GeoResult<usize> {
        self.check_bounds(depth)?;
        self.layers
            .iter()
            .rposition(|layer| depth >= layer.depth_from && depth <= layer.depth_to)
            .ok_or_else(|| GeoError::out_of_range(depth, self.min_depth(), self.max_depth()))
    }

    /// Value of a numeric parameter at the given depth, interpolating linear
    /// variations. At an interior layer boundary the shallower layer wins.
    pub fn numeric_at_depth(&self, depth: f64, parameter: &str) -> GeoResult<f64> {
        let index = self.layer_index_at(depth)?;
        let layer = &self.layers[index];
        match layer.parameters.get(parameter) {
            Some(ParameterValue::Constant(value)) => Ok(*value),
            Some(ParameterValue::Linear { from, to }) => {
                Ok(from + (to - from) * layer.fraction_at(depth))
            }
            Some(_) => Err(GeoError::invalid_input(
                "parameter",
                parameter,
                "Parameter is categorical, use text_at_depth",
            )),
            None => Err(GeoError::missing_parameter(parameter, index)),
        }
    }

    /// Value of a text parameter at the given depth. At an interior layer
    /// boundary the shallower layer wins.
    pub fn text_at_depth(&self, depth: f64, parameter: &str) -> GeoResult<&str> {
        let index = self.layer_index_at(depth)?;
        self.text_in_layer(index, parameter)
    }

    /// Value of a text parameter at the given depth, resolving an exact
    /// boundary to the layer below (grid-mapping convention).
    pub fn text_at_depth_below(&self, depth: f64, parameter: &str) -> GeoResult<&str> {
        let index = self.layer_index_below(depth)?;
        self.text_in_layer(index, parameter)
    }

    fn text_in_layer(&self, index: usize, parameter: &str) -> GeoResult<&str> {
        match self.layers[index].parameters.get(parameter) {
            Some(ParameterValue::Text(text)) => Ok(text),
            Some(_) => Err(GeoError::invalid_input(
                "parameter",
                parameter,
                "Parameter is numeric, use numeric_at_depth",
            )),
            None => Err(GeoError::missing_parameter(parameter, index)),
        }
    }

    /// Batch lookup: interpolates every numeric parameter and resolves every
    /// text parameter (layer-below at boundaries) at each coordinate.
    /// Coordinates must be ascending and inside the profile bounds.
    pub fn map_to_grid(&self, coordinates: &[f64]) -> GeoResult<Vec<GridNode>> {
        for pair in coordinates.windows(2) {
            if pair[1] < pair[0] {
                return Err(GeoError::invalid_input(
                    "coordinates",
                    format!("{} after {}", pair[1], pair[0]),
                    "Grid coordinates must be ascending",
                ));
            }
        }
        let numerical = self.numerical_parameters();
        let strings = self.string_parameters();
        let mut nodes = Vec::with_capacity(coordinates.len());
        for &depth in coordinates {
            let mut node = GridNode::new(depth);
            for parameter in &numerical {
                if let Ok(value) = self.numeric_at_depth(depth, parameter) {
                    node.numeric.insert(parameter.clone(), value);
                } else {
                    self.check_bounds(depth)?;
                }
            }
            for parameter in &strings {
                if let Ok(value) = self.text_at_depth_below(depth, parameter) {
                    node.text.insert(parameter.clone(), value.to_string());
                } else {
                    self.check_bounds(depth)?;
                }
            }
            nodes.push(node);
        }
        Ok(nodes)
    }

    /// Paired (depth, value) arrays for a numeric parameter, with doubled
    /// points at layer boundaries so ramps and interface steps plot exactly.
    pub fn soilparameter_series(&self, parameter: &str) -> GeoResult<(Vec<f64>, Vec<f64>)> {
        let mut depths = Vec::with_capacity(2 * self.layers.len());
        let mut values = Vec::with_capacity(2 * self.layers.len());
        for (index, layer) in self.layers.iter().enumerate() {
            let (from, to) = match layer.parameters.get(parameter) {
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
            depths.push(layer.depth_from);
            values.push(from);
            depths.push(layer.depth_to);
            values.push(to);
        }
        Ok((depths, values))
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Split the layer containing `depth` in two. Constant and text
    /// parameters are duplicated, linear parameters are interpolated at the
    /// split plane. A depth coinciding with an existing boundary (including
    /// the profile top and bottom) is a no-op.
    pub fn insert_transition(&mut self, depth: f64) -> GeoResult<()> {
        self.check_bounds(depth)?;
        if self
            .layer_transitions(true, true)
            .iter()
            .any(|&t| t == depth)
        {
            return Ok(());
        }
        let index = self.layer_index_at(depth)?;
        let layer = &mut self.layers[index];
        let mut lower = Layer::new(depth, layer.depth_to);
        let fraction = layer.fraction_at(depth);
        for (name, value) in &mut layer.parameters {
            match value {
                ParameterValue::Linear { from, to } => {
                    let split_value = *from + (*to - *from) * fraction;
                    lower.parameters.insert(
                        name.clone(),
                        ParameterValue::Linear {
                            from: split_value,
                            to: *to,
                        },
                    );
                    *to = split_value;
                }
                other => {
                    lower.parameters.insert(name.clone(), other.clone());
                }
            }
        }
        layer.depth_to = depth;
        self.layers.insert(index + 1, lower);
        Ok(())
    }

    /// Collapse the contiguous layer range `first..=last` into one layer.
    /// Constant and text parameters keep the first layer's values. Linear
    /// parameters take the first layer's `from` and the last layer's `to`
    /// without re-deriving the interior slope (documented simplification).
    pub fn merge_layers(&mut self, first: usize, last: usize) -> GeoResult<()> {
        if first >= last || last >= self.layers.len() {
            return Err(GeoError::invalid_input(
                "layer range",
                format!("{}..={}", first, last),
                format!("Valid layer indices are 0..{}", self.layers.len()),
            ));
        }
        let mut merged = self.layers[first].clone();
        merged.depth_to = self.layers[last].depth_to;
        for (name, value) in merged.parameters.iter_mut() {
            if let ParameterValue::Linear { to, .. } = value {
                if let Some(last_bottom) = self.layers[last]
                    .parameters
                    .get(name)
                    .and_then(|v| v.numeric_at_fraction(1.0))
                {
                    *to = last_bottom;
                }
            }
        }
        self.layers.splice(first..=last, std::iter::once(merged));
        Ok(())
    }

    /// Return an independent profile restricted to `[top_depth, bottom_depth]`.
    /// Bounds outside the profile are clamped. Linear parameters are
    /// re-interpolated at the cut planes.
    pub fn cut(&self, top_depth: f64, bottom_depth: f64) -> GeoResult<SoilProfile> {
        if bottom_depth <= top_depth {
            return Err(GeoError::invalid_geometry(
                "bottom_depth",
                bottom_depth.to_string(),
                "Bottom depth must be greater than top depth",
            ));
        }
        let top = top_depth.max(self.min_depth());
        let bottom = bottom_depth.min(self.max_depth());

        let mut layers: Vec<Layer> = self
            .layers
            .iter()
            .filter(|layer| layer.depth_from < bottom && layer.depth_to > top)
            .cloned()
            .collect();
        if layers.is_empty() {
            return Err(GeoError::out_of_range(
                top,
                self.min_depth(),
                self.max_depth(),
            ));
        }

        // Interpolate the linear endpoints against the uncut layer bounds
        // before clipping the depths.
        if let Some(first) = layers.first_mut() {
            let updates: Vec<(String, f64)> = first
                .parameters
                .iter()
                .filter(|(_, v)| v.is_linear())
                .filter_map(|(name, _)| first.numeric_at(top, name).map(|v| (name.clone(), v)))
                .collect();
            for (name, value) in updates {
                if let Some(ParameterValue::Linear { from, .. }) = first.parameters.get_mut(&name) {
                    *from = value;
                }
            }
            first.depth_from = top;
        }
        if let Some(last) = layers.last_mut() {
            let updates: Vec<(String, f64)> = last
                .parameters
                .iter()
                .filter(|(_, v)| v.is_linear())
                .filter_map(|(name, _)| last.numeric_at(bottom, name).map(|v| (name.clone(), v)))
                .collect();
            for (name, value) in updates {
                if let Some(ParameterValue::Linear { to, .. }) = last.parameters.get_mut(&name) {
                    *to = value;
                }
            }
            last.depth_to = bottom;
        }

        SoilProfile::with_depth_reference(layers, self.depth_reference.clone())
    }

    /// Shift every depth by `offset`. Repeated calls compound.
    pub fn shift(&mut self, offset: f64) {
        for layer in &mut self.layers {
            layer.depth_from += offset;
            layer.depth_to += offset;
        }
    }

    /// Negate every depth and reverse the layer order so depths remain
    /// increasing. Linear parameters swap their from/to values. Applying the
    /// operation twice restores the original profile.
    pub fn flip_sign(&mut self) {
        for layer in &mut self.layers {
            let new_from = -layer.depth_to;
            let new_to = -layer.depth_from;
            layer.depth_from = new_from;
            layer.depth_to = new_to;
            for value in layer.parameters.values_mut() {
                if let ParameterValue::Linear { from, to } = value {
                    std::mem::swap(from, to);
                }
            }
        }
        self.layers.reverse();
    }

    /// Remove a parameter from every layer.
    pub fn remove_parameter(&mut self, parameter: &str) -> GeoResult<()> {
        let mut found = false;
        for layer in &mut self.layers {
            found |= layer.parameters.remove(parameter).is_some();
        }
        if found {
            Ok(())
        } else {
            Err(GeoError::invalid_input(
                "parameter",
                parameter,
                "Parameter not present in any layer",
            ))
        }
    }

    /// Convert the depth reference between units, e.g. feet to metres with
    /// `multiplier = 0.3048`. Depth values are scaled, the depth columns of
    /// the tabular representation are renamed.
    pub fn convert_depth_reference(
        &mut self,
        new_name: impl Into<String>,
        new_unit: impl Into<String>,
        multiplier: f64,
    ) {
        for layer in &mut self.layers {
            layer.depth_from *= multiplier;
            layer.depth_to *= multiplier;
        }
        self.depth_reference = DepthReference {
            name: new_name.into(),
            unit: new_unit.into(),
        };
    }

    /// Collapse a linearly varying parameter to a constant value per layer
    /// according to the selection rule.
    pub fn convert_to_constant(&mut self, parameter: &str, rule: SelectionRule) -> GeoResult<()> {
        if !self.numerical_parameters().iter().any(|p| p == parameter) {
            return Err(GeoError::invalid_input(
                "parameter",
                parameter,
                "Parameter is not a numeric soil parameter",
            ));
        }
        for layer in &mut self.layers {
            if let Some(value) = layer.parameters.get_mut(parameter) {
                if let ParameterValue::Linear { from, to } = value {
                    *value = ParameterValue::Constant(rule.apply(*from, *to));
                }
            }
        }
        Ok(())
    }

    /// Add a constant parameter holding each layer's thickness.
    pub fn calculate_layer_thickness(&mut self, column: &str) {
        for layer in &mut self.layers {
            let thickness = layer.thickness();
            layer
                .parameters
                .insert(column.to_string(), ParameterValue::Constant(thickness));
        }
    }

    /// Add a constant parameter holding each layer's center depth.
    pub fn calculate_center(&mut self, column: &str) {
        for layer in &mut self.layers {
            let center = layer.center();
            layer
                .parameters
                .insert(column.to_string(), ParameterValue::Constant(center));
        }
    }

    // ========================================================================
    // Integration and overburden
    // ========================================================================

    /// Running depth integral of a constant-per-layer parameter. The output
    /// is a linear parameter: its `from` is the cumulative value entering the
    /// layer (plus `start_value` at the top), its `to` adds the layer's
    /// `value x thickness` contribution.
    pub fn depth_integration(
        &mut self,
        parameter: &str,
        output: &str,
        start_value: f64,
    ) -> GeoResult<()> {
        if split_unit(output).is_none() {
            return Err(GeoError::invalid_input(
                "output",
                output,
                "Output parameter must follow the 'name [unit]' convention",
            ));
        }
        // Validate before mutating anything
        let mut values = Vec::with_capacity(self.layers.len());
        for (index, layer) in self.layers.iter().enumerate() {
            match layer.parameters.get(parameter) {
                Some(ParameterValue::Constant(value)) => values.push(*value),
                Some(_) => {
                    return Err(GeoError::invalid_input(
                        "parameter",
                        parameter,
                        "Integration requires a constant value in each layer",
                    ));
                }
                None => return Err(GeoError::missing_parameter(parameter, index)),
            }
        }
        let mut running = start_value;
        for (layer, value) in self.layers.iter_mut().zip(values) {
            let from = running;
            let to = from + value * layer.thickness();
            layer
                .parameters
                .insert(output.to_string(), ParameterValue::Linear { from, to });
            running = to;
        }
        Ok(())
    }

    /// Compute hydrostatic pressure, total and effective vertical stress.
    ///
    /// Requires a constant `"Total unit weight [kN/m3]"` in every layer. A
    /// layer transition is inserted at the water level when one does not
    /// exist (water levels outside the profile are clamped to its bounds).
    /// The effective stress is the total stress minus the hydrostatic
    /// pressure, clipped to be non-negative.
    pub fn calculate_overburden(
        &mut self,
        water_level: f64,
        water_unit_weight: f64,
    ) -> GeoResult<()> {
        for (index, layer) in self.layers.iter().enumerate() {
            match layer.parameters.get(TOTAL_UNIT_WEIGHT) {
                Some(ParameterValue::Constant(_)) => {}
                Some(_) => {
                    return Err(GeoError::invalid_input(
                        "parameter",
                        TOTAL_UNIT_WEIGHT,
                        "Constant unit weight per layer is required, use convert_to_constant",
                    ));
                }
                None => return Err(GeoError::missing_parameter(TOTAL_UNIT_WEIGHT, index)),
            }
        }

        let water_level = water_level.clamp(self.min_depth(), self.max_depth());
        self.insert_transition(water_level)?;

        for (index, layer) in self.layers.iter_mut().enumerate() {
            let total = match layer.parameters.get(TOTAL_UNIT_WEIGHT) {
                Some(ParameterValue::Constant(value)) => *value,
                _ => return Err(GeoError::missing_parameter(TOTAL_UNIT_WEIGHT, index)),
            };
            let submerged = layer.center() >= water_level;
            let water = if submerged { water_unit_weight } else { 0.0 };
            layer
                .parameters
                .insert(WATER_UNIT_WEIGHT.to_string(), ParameterValue::Constant(water));
            layer.parameters.insert(
                EFFECTIVE_UNIT_WEIGHT.to_string(),
                ParameterValue::Constant(total - water),
            );
        }

        self.depth_integration(WATER_UNIT_WEIGHT, HYDROSTATIC_PRESSURE, 0.0)?;
        self.depth_integration(TOTAL_UNIT_WEIGHT, VERTICAL_TOTAL_STRESS, 0.0)?;

        for (index, layer) in self.layers.iter_mut().enumerate() {
            let (total_from, total_to) = match layer.parameters.get(VERTICAL_TOTAL_STRESS) {
                Some(ParameterValue::Linear { from, to }) => (*from, *to),
                _ => return Err(GeoError::missing_parameter(VERTICAL_TOTAL_STRESS, index)),
            };
            let (hydro_from, hydro_to) = match layer.parameters.get(HYDROSTATIC_PRESSURE) {
                Some(ParameterValue::Linear { from, to }) => (*from, *to),
                _ => return Err(GeoError::missing_parameter(HYDROSTATIC_PRESSURE, index)),
            };
            layer.parameters.insert(
                VERTICAL_EFFECTIVE_STRESS.to_string(),
                ParameterValue::Linear {
                    from: (total_from - hydro_from).max(0.0),
                    to: (total_to - hydro_to).max(0.0),
                },
            );
        }
        Ok(())
    }

    // ========================================================================
    // Validation
    // ========================================================================

    fn validate(&self) -> GeoResult<()> {
        if self.layers.is_empty() {
            return Err(GeoError::InsufficientData {
                count: 0,
                minimum: 1,
            });
        }
        for (index, layer) in self.layers.iter().enumerate() {
            if layer.depth_to <= layer.depth_from {
                return Err(GeoError::invalid_geometry(
                    "layer",
                    format!("[{}, {}]", layer.depth_from, layer.depth_to),
                    "Layer bottom must be deeper than layer top",
                ));
            }
            if index > 0 {
                let expected = self.layers[index - 1].depth_to;
                if layer.depth_from != expected {
                    return Err(GeoError::OverlapOrGap {
                        layer_index: index,
                        expected_top: expected,
                        actual_top: layer.depth_from,
                    });
                }
            }
        }
        // A parameter must keep the same kind (numeric/text) in every layer
        for parameter in self.numerical_parameters() {
            for layer in &self.layers {
                if matches!(layer.parameters.get(&parameter), Some(v) if !v.is_numeric()) {
                    return Err(GeoError::invalid_input(
                        "parameter",
                        parameter,
                        "Parameter mixes numeric and text values across layers",
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sand_over_clay() -> SoilProfile {
        SoilProfile::new(vec![
            Layer::new(0.0, 5.0)
                .with_text("Soil type", "Sand")
                .with_constant(TOTAL_UNIT_WEIGHT, 19.0)
                .with_linear("qc [MPa]", 10.0, 20.0),
            Layer::new(5.0, 10.0)
                .with_text("Soil type", "Clay")
                .with_constant(TOTAL_UNIT_WEIGHT, 17.0)
                .with_constant("qc [MPa]", 2.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_gap_is_rejected() {
        let result = SoilProfile::new(vec![Layer::new(0.0, 5.0), Layer::new(6.0, 10.0)]);
        assert_eq!(
            result.err().map(|e| e.error_code()),
            Some("OVERLAP_OR_GAP")
        );
    }

    #[test]
    fn test_parameter_partition() {
        let profile = sand_over_clay();
        assert_eq!(
            profile.numerical_parameters(),
            vec![
                TOTAL_UNIT_WEIGHT.to_string(),
                "qc [MPa]".to_string()
            ]
        );
        assert_eq!(profile.string_parameters(), vec!["Soil type".to_string()]);
        assert!(profile.has_linear_variation("qc [MPa]"));
        assert!(!profile.has_linear_variation(TOTAL_UNIT_WEIGHT));
    }

    #[test]
    fn test_lookup() {
        let profile = sand_over_clay();
        // Linear interpolation: at 2.5m, qc = 10 + 0.5*(20-10) = 15
        assert_eq!(profile.numeric_at_depth(2.5, "qc [MPa]").unwrap(), 15.0);
        // Constant in the clay
        assert_eq!(profile.numeric_at_depth(7.0, "qc [MPa]").unwrap(), 2.0);
        // At the 5m interface the shallower layer wins
        assert_eq!(profile.numeric_at_depth(5.0, "qc [MPa]").unwrap(), 20.0);
        assert_eq!(profile.text_at_depth(5.0, "Soil type").unwrap(), "Sand");
        // but the below-biased lookup resolves downward
        assert_eq!(
            profile.text_at_depth_below(5.0, "Soil type").unwrap(),
            "Clay"
        );
        // Out of range
        assert_eq!(
            profile.numeric_at_depth(12.0, "qc [MPa]").err().map(|e| e.error_code()),
            Some("OUT_OF_RANGE")
        );
    }

    #[test]
    fn test_insert_transition_splits_linear_parameters() {
        let mut profile = sand_over_clay();
        profile.insert_transition(2.5).unwrap();
        assert_eq!(profile.len(), 3);
        // qc ramps 10->15 then 15->20
        assert_eq!(
            profile.layers()[0].parameters.get("qc [MPa]"),
            Some(&ParameterValue::Linear { from: 10.0, to: 15.0 })
        );
        assert_eq!(
            profile.layers()[1].parameters.get("qc [MPa]"),
            Some(&ParameterValue::Linear { from: 15.0, to: 20.0 })
        );
        // Constants and text are duplicated
        assert_eq!(profile.layers()[1].text("Soil type"), Some("Sand"));
        // Contiguity preserved
        assert_eq!(profile.layers()[0].depth_to, profile.layers()[1].depth_from);

        // Inserting at an existing boundary is a no-op
        profile.insert_transition(5.0).unwrap();
        assert_eq!(profile.len(), 3);
    }

    #[test]
    fn test_merge_layers() {
        let mut profile = sand_over_clay();
        profile.insert_transition(2.5).unwrap();
        profile.merge_layers(0, 1).unwrap();
        assert_eq!(profile.len(), 2);
        let merged = &profile.layers()[0];
        assert_eq!(merged.depth_from, 0.0);
        assert_eq!(merged.depth_to, 5.0);
        // Linear parameter: first layer's from, last layer's to
        assert_eq!(
            merged.parameters.get("qc [MPa]"),
            Some(&ParameterValue::Linear { from: 10.0, to: 20.0 })
        );
        // Contiguity invariant holds after the mutation
        assert_eq!(profile.layers()[0].depth_to, profile.layers()[1].depth_from);
    }

    #[test]
    fn test_cut_reinterpolates_linear_endpoints() {
        let profile = sand_over_clay();
        let cut = profile.cut(2.5, 7.5).unwrap();
        assert_eq!(cut.min_depth(), 2.5);
        assert_eq!(cut.max_depth(), 7.5);
        assert_eq!(cut.len(), 2);
        // qc in the sand portion now ramps from the interpolated 15 to 20
        assert_eq!(
            cut.layers()[0].parameters.get("qc [MPa]"),
            Some(&ParameterValue::Linear { from: 15.0, to: 20.0 })
        );
        // The source profile is untouched
        assert_eq!(profile.min_depth(), 0.0);
        // Out-of-bounds cut planes are clamped
        let clamped = profile.cut(-5.0, 50.0).unwrap();
        assert_eq!(clamped.min_depth(), 0.0);
        assert_eq!(clamped.max_depth(), 10.0);
    }

    #[test]
    fn test_shift_roundtrip() {
        let mut profile = sand_over_clay();
        profile.shift(3.0);
        assert_eq!(profile.min_depth(), 3.0);
        assert_eq!(profile.max_depth(), 13.0);
        profile.shift(-3.0);
        assert_eq!(profile, sand_over_clay());
    }

    #[test]
    fn test_flip_sign_self_inverse() {
        let mut profile = sand_over_clay();
        profile.flip_sign();
        assert_eq!(profile.min_depth(), -10.0);
        assert_eq!(profile.max_depth(), 0.0);
        // Layer order reversed: clay is now first and qc ramps are mirrored
        assert_eq!(profile.layers()[0].text("Soil type"), Some("Clay"));
        assert_eq!(
            profile.layers()[1].parameters.get("qc [MPa]"),
            Some(&ParameterValue::Linear { from: 20.0, to: 10.0 })
        );
        profile.flip_sign();
        assert_eq!(profile, sand_over_clay());
    }

    #[test]
    fn test_depth_integration_closed_form() {
        // Single uniform layer: integral of unit weight = gamma * h
        let mut profile = SoilProfile::uniform(0.0, 4.0, "Sand", 18.0).unwrap();
        profile
            .depth_integration(TOTAL_UNIT_WEIGHT, "Stress [kPa]", 0.0)
            .unwrap();
        assert_eq!(
            profile.layers()[0].parameters.get("Stress [kPa]"),
            Some(&ParameterValue::Linear { from: 0.0, to: 72.0 })
        );
        // start_value offsets the whole integral
        profile
            .depth_integration(TOTAL_UNIT_WEIGHT, "Offset stress [kPa]", 10.0)
            .unwrap();
        assert_eq!(
            profile.numeric_at_depth(4.0, "Offset stress [kPa]").unwrap(),
            82.0
        );
    }

    #[test]
    fn test_depth_integration_requires_constant_parameter() {
        let mut profile = sand_over_clay();
        assert_eq!(
            profile
                .depth_integration("qc [MPa]", "Integral [x]", 0.0)
                .err()
                .map(|e| e.error_code()),
            Some("INVALID_INPUT")
        );
        assert_eq!(
            profile
                .depth_integration("Su [kPa]", "Integral [x]", 0.0)
                .err()
                .map(|e| e.error_code()),
            Some("MISSING_PARAMETER")
        );
    }

    #[test]
    fn test_overburden_example() {
        // 0-5m sand gamma=19, 5-10m clay gamma=17, water at 2.5m, gamma_w=10:
        //   hydrostatic at 10m = 10 * 7.5 = 75 kPa
        //   total at 10m       = 19*5 + 17*5 = 180 kPa
        //   effective at 10m   = 105 kPa
        let mut profile = sand_over_clay();
        profile.calculate_overburden(2.5, 10.0).unwrap();
        // A transition was inserted at the water level
        assert!(profile.layer_transitions(false, false).contains(&2.5));
        assert_eq!(
            profile
                .numeric_at_depth(10.0, HYDROSTATIC_PRESSURE)
                .unwrap(),
            75.0
        );
        assert_eq!(
            profile
                .numeric_at_depth(10.0, VERTICAL_TOTAL_STRESS)
                .unwrap(),
            180.0
        );
        assert_eq!(
            profile
                .numeric_at_depth(10.0, VERTICAL_EFFECTIVE_STRESS)
                .unwrap(),
            105.0
        );
        // Above the water table the hydrostatic pressure is zero
        assert_eq!(
            profile.numeric_at_depth(2.5, HYDROSTATIC_PRESSURE).unwrap(),
            0.0
        );
    }

    #[test]
    fn test_overburden_requires_unit_weight() {
        let mut profile = SoilProfile::new(vec![Layer::new(0.0, 5.0)]).unwrap();
        assert_eq!(
            profile
                .calculate_overburden(0.0, 10.0)
                .err()
                .map(|e| e.error_code()),
            Some("MISSING_PARAMETER")
        );
    }

    #[test]
    fn test_from_table_wire_format() {
        let profile = SoilProfile::from_table(vec![
            (
                "Depth from [m]".to_string(),
                ColumnData::Numeric(vec![0.0, 5.0]),
            ),
            (
                "Depth to [m]".to_string(),
                ColumnData::Numeric(vec![5.0, 10.0]),
            ),
            (
                "Soil type".to_string(),
                ColumnData::Text(vec!["Sand".to_string(), "Clay".to_string()]),
            ),
            (
                "Total unit weight [kN/m3]".to_string(),
                ColumnData::Numeric(vec![19.0, 17.0]),
            ),
            (
                "Su from [kPa]".to_string(),
                ColumnData::Numeric(vec![f64::NAN, 50.0]),
            ),
            (
                "Su to [kPa]".to_string(),
                ColumnData::Numeric(vec![f64::NAN, 90.0]),
            ),
        ])
        .unwrap();
        assert_eq!(profile.len(), 2);
        // NaN pair means the parameter is missing in the sand
        assert_eq!(
            profile
                .numeric_at_depth(2.0, "Su [kPa]")
                .err()
                .map(|e| e.error_code()),
            Some("MISSING_PARAMETER")
        );
        assert_eq!(profile.numeric_at_depth(7.5, "Su [kPa]").unwrap(), 70.0);

        // The emitted table uses the exact same column names
        let table = profile.to_table();
        let names: Vec<&str> = table.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Depth from [m]",
                "Depth to [m]",
                "Su from [kPa]",
                "Su to [kPa]",
                "Total unit weight [kN/m3]",
                "Soil type"
            ]
        );
    }

    #[test]
    fn test_from_table_rejects_incomplete_linear_pair() {
        let result = SoilProfile::from_table(vec![
            (
                "Depth from [m]".to_string(),
                ColumnData::Numeric(vec![0.0]),
            ),
            ("Depth to [m]".to_string(), ColumnData::Numeric(vec![5.0])),
            ("Su from [kPa]".to_string(), ColumnData::Numeric(vec![50.0])),
        ]);
        assert_eq!(result.err().map(|e| e.error_code()), Some("INVALID_INPUT"));
    }

    #[test]
    fn test_convert_depth_reference() {
        let mut profile = SoilProfile::with_depth_reference(
            vec![Layer::new(0.0, 10.0).with_constant(TOTAL_UNIT_WEIGHT, 19.0)],
            DepthReference {
                name: "Depth".to_string(),
                unit: "ft".to_string(),
            },
        )
        .unwrap();
        profile.convert_depth_reference("Depth", "m", 0.3048);
        assert_eq!(profile.max_depth(), 3.048);
        assert_eq!(profile.depth_reference.from_column(), "Depth from [m]");
    }

    #[test]
    fn test_convert_to_constant() {
        let mut profile = sand_over_clay();
        profile
            .convert_to_constant("qc [MPa]", SelectionRule::Mean)
            .unwrap();
        assert_eq!(
            profile.layers()[0].parameters.get("qc [MPa]"),
            Some(&ParameterValue::Constant(15.0))
        );
        // Already-constant layers are left alone
        assert_eq!(
            profile.layers()[1].parameters.get("qc [MPa]"),
            Some(&ParameterValue::Constant(2.0))
        );
    }

    #[test]
    fn test_soilparameter_series_doubles_points() {
        let profile = sand_over_clay();
        let (depths, values) = profile.soilparameter_series("qc [MPa]").unwrap();
        assert_eq!(depths, vec![0.0, 5.0, 5.0, 10.0]);
        assert_eq!(values, vec![10.0, 20.0, 2.0, 2.0]);
    }

    #[test]
    fn test_map_to_grid() {
        let profile = sand_over_clay();
        let nodes = profile.map_to_grid(&[0.0, 2.5, 5.0, 10.0]).unwrap();
        assert_eq!(nodes.len(), 4);
        assert_eq!(nodes[1].numeric["qc [MPa]"], 15.0);
        // Boundary node takes the soil type of the layer below
        assert_eq!(nodes[2].text["Soil type"], "Clay");
        // Descending coordinates are rejected
        assert!(profile.map_to_grid(&[5.0, 2.0]).is_err());
    }

    #[test]
    fn test_remove_parameter() {
        let mut profile = sand_over_clay();
        profile.remove_parameter("qc [MPa]").unwrap();
        assert!(profile.numerical_parameters().len() == 1);
        assert!(profile.remove_parameter("qc [MPa]").is_err());
    }

    #[test]
    fn test_layer_transitions() {
        let profile = sand_over_clay();
        assert_eq!(profile.layer_transitions(false, false), vec![5.0]);
        assert_eq!(profile.layer_transitions(true, true), vec![0.0, 5.0, 10.0]);
    }

    #[test]
    fn test_serde_roundtrip() {
        let profile = sand_over_clay();
        let json = serde_json::to_string(&profile).unwrap();
        let roundtrip: SoilProfile = serde_json::from_str(&json).unwrap();
        assert_eq!(profile, roundtrip);
    }
}
