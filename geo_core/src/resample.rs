//! Signal resampling
//!
//! Field measurements such as cone penetration traces come at irregular
//! depth increments. [`resample_signal`] regularizes a depth/value signal
//! onto a fixed spacing by linear interpolation, keeping the first and last
//! sample depths exactly even when the trace length is not a whole multiple
//! of the spacing. The base resistance correction requires its input on the
//! 0.2 m push increment of the historical mechanical cone.

use serde::{Deserialize, Serialize};

use crate::errors::{GeoError, GeoResult};

/// Regularly spaced depth/value trace produced by [`resample_signal`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResampledTrace {
    /// Depths, ascending, first and last equal to the source trace extremes
    pub depth: Vec<f64>,
    /// Interpolated values, one per depth
    pub value: Vec<f64>,
    /// Nominal spacing between interior samples
    pub spacing: f64,
}

impl ResampledTrace {
    /// Number of samples
    pub fn len(&self) -> usize {
        self.depth.len()
    }

    pub fn is_empty(&self) -> bool {
        self.depth.is_empty()
    }

    /// Linearly interpolated value at `depth`
    pub fn value_at(&self, depth: f64) -> GeoResult<f64> {
        interpolate(&self.depth, &self.value, depth)
    }
}

/// Linear interpolation on an ascending abscissa. Errors when `x` lies
/// outside the sampled range.
pub(crate) fn interpolate(xs: &[f64], ys: &[f64], x: f64) -> GeoResult<f64> {
    let (first, last) = match (xs.first(), xs.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => {
            return Err(GeoError::InsufficientData {
                count: 0,
                minimum: 2,
            });
        }
    };
    if x < first || x > last {
        return Err(GeoError::out_of_range(x, first, last));
    }
    let upper = xs.partition_point(|&sample| sample < x);
    if upper == 0 {
        return Ok(ys[0]);
    }
    let (x0, x1) = (xs[upper - 1], xs[upper.min(xs.len() - 1)]);
    let (y0, y1) = (ys[upper - 1], ys[upper.min(ys.len() - 1)]);
    if x1 == x0 {
        return Ok(y0);
    }
    Ok(y0 + (y1 - y0) * (x - x0) / (x1 - x0))
}

/// Resample a depth/value signal onto a regular spacing.
///
/// The output runs from `min(depth)` to `max(depth)` in steps of `spacing`;
/// the first and last output depths equal the source extremes exactly, so
/// the final interior step may be shorter than `spacing`. Input depths must
/// be strictly ascending.
pub fn resample_signal(depth: &[f64], value: &[f64], spacing: f64) -> GeoResult<ResampledTrace> {
    if depth.len() < 2 {
        return Err(GeoError::InsufficientData {
            count: depth.len(),
            minimum: 2,
        });
    }
    if depth.len() != value.len() {
        return Err(GeoError::invalid_geometry(
            "value",
            value.len().to_string(),
            format!("Value array length must match the {} depths", depth.len()),
        ));
    }
    if spacing <= 0.0 {
        return Err(GeoError::invalid_geometry(
            "spacing",
            spacing.to_string(),
            "Resampling spacing must be strictly positive",
        ));
    }
    for pair in depth.windows(2) {
        if pair[1] <= pair[0] {
            return Err(GeoError::invalid_input(
                "depth",
                format!("{} after {}", pair[1], pair[0]),
                "Depths must be strictly ascending",
            ));
        }
    }

    let top = depth[0];
    let bottom = depth[depth.len() - 1];
    let mut new_depth = Vec::new();
    let mut step = 0usize;
    loop {
        let candidate = top + step as f64 * spacing;
        if candidate >= bottom {
            break;
        }
        new_depth.push(candidate);
        step += 1;
    }
    new_depth.push(bottom);

    let mut new_value = Vec::with_capacity(new_depth.len());
    for &d in &new_depth {
        new_value.push(interpolate(depth, value, d)?);
    }

    Ok(ResampledTrace {
        depth: new_depth,
        value: new_value,
        spacing,
    })
}
