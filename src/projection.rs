//! Shadow projection from cloud centroids.
//!
//! Two strategies are available:
//!
//! - **Linear offset**: walk from each centroid along the sun's horizontal
//!   bearing for a fixed pixel distance, sampled at evenly spaced steps.
//!   This is the default and what the pipeline returns unless configured
//!   otherwise.
//! - **Ray intersection**: place the sun and the cloud in a common 3D frame
//!   (pixel x/y, unit-radius z) and intersect the sun -> cloud ray with the
//!   ground plane `z = 0`, once for a low and once for a high cloud
//!   altitude.
//!
//! Both take the centroid list as-is and return rows in the same order.
//! Every centroid is independent, so the work is split across rayon threads.

use ndarray::{Array1, Array2, ArrayView1, Zip};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::angles::{sensor_to_spherical_azimuth, SunPosition};
use crate::error::{Result, ShadowError};
use crate::pixel_space::to_pixel_space;
use crate::regions::Centroid;

/// Bearing column components smaller than this make the slope undefined.
const BEARING_EPSILON: f64 = 1e-9;
/// Rays whose vertical extent is smaller than this never reach the ground.
const RAY_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionMethod {
    #[default]
    LinearOffset,
    RayIntersection,
}

/// Tunables for the linear-offset projection.
///
/// Neither default is physically derived; `offset` is a proxy displacement
/// in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinearOffsetParams {
    pub offset: f64,
    pub steps: usize,
}

impl Default for LinearOffsetParams {
    fn default() -> Self {
        Self {
            offset: 100.0,
            steps: 100,
        }
    }
}

impl LinearOffsetParams {
    pub fn validate(&self) -> Result<()> {
        if self.steps < 2 {
            return Err(ShadowError::InvalidConfig(format!(
                "linear.steps must be at least 2, got {}",
                self.steps
            )));
        }
        if !self.offset.is_finite() {
            return Err(ShadowError::InvalidConfig(format!(
                "linear.offset must be finite, got {}",
                self.offset
            )));
        }
        Ok(())
    }
}

/// Cloud altitudes for the ray-intersection projection, as fractions of the
/// sun's unit-sphere height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RayIntersectionParams {
    pub low_altitude_fraction: f64,
    pub high_altitude_fraction: f64,
}

impl Default for RayIntersectionParams {
    fn default() -> Self {
        Self {
            low_altitude_fraction: 0.0,
            high_altitude_fraction: 0.5,
        }
    }
}

impl RayIntersectionParams {
    pub fn validate(&self) -> Result<()> {
        for (name, v) in [
            ("ray.low_altitude_fraction", self.low_altitude_fraction),
            ("ray.high_altitude_fraction", self.high_altitude_fraction),
        ] {
            if !v.is_finite() {
                return Err(ShadowError::InvalidConfig(format!(
                    "{name} must be finite, got {v}"
                )));
            }
        }
        Ok(())
    }
}

/// Per-region shadow trajectories, one row per centroid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShadowTrajectories {
    /// Column samples, shape `[n_regions, steps]`.
    pub cols: Array2<f64>,
    /// Row samples, shape `[n_regions, steps]`.
    pub rows: Array2<f64>,
}

impl ShadowTrajectories {
    pub fn empty(steps: usize) -> Self {
        Self {
            cols: Array2::zeros((0, steps)),
            rows: Array2::zeros((0, steps)),
        }
    }

    pub fn len(&self) -> usize {
        self.cols.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Ground intersections for the low and high cloud altitude hypotheses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RayIntersections {
    /// Sun point `[xp, yp, z]` in pixel space.
    pub sun: [f64; 3],
    /// `[x, y, z]` per centroid for the low altitude, shape `[n_regions, 3]`.
    pub min_cloud_ele: Array2<f64>,
    /// `[x, y, z]` per centroid for the high altitude, shape `[n_regions, 3]`.
    pub max_cloud_ele: Array2<f64>,
}

impl RayIntersections {
    pub fn empty(sun: [f64; 3]) -> Self {
        Self {
            sun,
            min_cloud_ele: Array2::zeros((0, 3)),
            max_cloud_ele: Array2::zeros((0, 3)),
        }
    }

    pub fn len(&self) -> usize {
        self.min_cloud_ele.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum ShadowOutput {
    LinearOffset(ShadowTrajectories),
    RayIntersection(RayIntersections),
}

impl ShadowOutput {
    pub fn len(&self) -> usize {
        match self {
            ShadowOutput::LinearOffset(t) => t.len(),
            ShadowOutput::RayIntersection(r) => r.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── Linear offset ──────────────────────────────────────────────────────────

/// Unit `(row, col)` bearing of the shadow for a sensor-convention sun azimuth.
///
/// The spherical azimuth is rotated a further quarter turn so the bearing
/// lines up with the image axes.
pub fn shadow_bearing(sun_azimuth: f64) -> Result<(f64, f64)> {
    let azimuth = (sensor_to_spherical_azimuth(sun_azimuth) + 90.0).to_radians();
    let (bearing_row, bearing_col) = (azimuth.sin(), azimuth.cos());
    if bearing_col.abs() < BEARING_EPSILON {
        return Err(ShadowError::DegenerateBearing {
            azimuth: sun_azimuth,
        });
    }
    Ok((bearing_row, bearing_col))
}

/// Sample a straight shadow trajectory from every centroid.
///
/// Columns are interpolated evenly from the centroid to the offset point
/// `centroid + offset * bearing`; rows follow from the bearing's slope. The
/// first sample of each row is the centroid and the last is the offset point.
pub fn linear_offset_trajectories(
    centroids: &[Centroid],
    sun_azimuth: f64,
    params: &LinearOffsetParams,
) -> Result<ShadowTrajectories> {
    params.validate()?;
    let (bearing_row, bearing_col) = shadow_bearing(sun_azimuth)?;
    let slope = bearing_row / bearing_col;
    log::debug!(
        "shadow bearing (row, col) = ({bearing_row:.4}, {bearing_col:.4}), slope {slope:.4}"
    );

    let steps = Array1::linspace(0.0, 1.0, params.steps);
    let mut trajectories = ShadowTrajectories {
        cols: Array2::zeros((centroids.len(), params.steps)),
        rows: Array2::zeros((centroids.len(), params.steps)),
    };

    Zip::from(trajectories.cols.rows_mut())
        .and(trajectories.rows.rows_mut())
        .and(ArrayView1::from(centroids))
        .par_for_each(|mut cols, mut rows, c| {
            let col_end = c.col + params.offset * bearing_col;
            Zip::from(&mut cols)
                .and(&mut rows)
                .and(&steps)
                .for_each(|col, row, &t| {
                    *col = c.col + t * (col_end - c.col);
                    *row = slope * (*col - c.col) + c.row;
                });
        });

    Ok(trajectories)
}

// ── Ray / plane intersection ───────────────────────────────────────────────

/// Sun position as a 3D point: unit direction with x/y mapped to pixels.
pub fn sun_point(sun: &SunPosition, width: f64, height: f64) -> [f64; 3] {
    let [x, y, z] = sun.direction();
    let (xp, yp) = to_pixel_space(x, y, width, height);
    [xp, yp, z]
}

/// Where the ray from `p0` through `p1` meets the plane `z = 0`.
pub fn xy_plane_intersection(p0: [f64; 3], p1: [f64; 3]) -> Result<[f64; 3]> {
    let l = [p1[0] - p0[0], p1[1] - p0[1], p1[2] - p0[2]];
    if l.iter().chain(p0.iter()).any(|v| !v.is_finite()) || l[2].abs() < RAY_EPSILON {
        return Err(ShadowError::DegenerateRay { p0, p1 });
    }
    let t = -p0[2] / l[2];
    Ok([p0[0] + t * l[0], p0[1] + t * l[1], p0[2] + t * l[2]])
}

/// Ground intersections for every centroid under both altitude hypotheses.
///
/// Cloud points are `[col, row, altitude]` so they share the pixel-space
/// axes of the sun point.
pub fn ray_intersections(
    centroids: &[Centroid],
    sun: &SunPosition,
    width: f64,
    height: f64,
    params: &RayIntersectionParams,
) -> Result<RayIntersections> {
    params.validate()?;
    let p_sun = sun_point(sun, width, height);
    let low_z = params.low_altitude_fraction * p_sun[2];
    let high_z = params.high_altitude_fraction * p_sun[2];
    log::debug!("sun point {p_sun:?}, cloud altitudes {low_z:.4} / {high_z:.4}");

    let hits: Vec<([f64; 3], [f64; 3])> = centroids
        .par_iter()
        .map(|c| {
            let low = xy_plane_intersection(p_sun, [c.col, c.row, low_z])?;
            let high = xy_plane_intersection(p_sun, [c.col, c.row, high_z])?;
            Ok((low, high))
        })
        .collect::<Result<_>>()?;

    let mut result = RayIntersections::empty(p_sun);
    result.min_cloud_ele = Array2::zeros((hits.len(), 3));
    result.max_cloud_ele = Array2::zeros((hits.len(), 3));
    for (i, (low, high)) in hits.iter().enumerate() {
        for k in 0..3 {
            result.min_cloud_ele[[i, k]] = low[k];
            result.max_cloud_ele[[i, k]] = high[k];
        }
    }
    Ok(result)
}

#[cfg(feature = "python")]
pub(crate) mod py {
    use numpy::{IntoPyArray, PyArray2};
    use pyo3::prelude::*;
    use pyo3::types::PyDict;

    use super::{LinearOffsetParams, RayIntersectionParams};
    use crate::angles::SunPosition;
    use crate::regions::Centroid;

    fn to_centroids(points: Vec<(f64, f64)>) -> Vec<Centroid> {
        points
            .into_iter()
            .enumerate()
            .map(|(i, (row, col))| Centroid {
                label: i as u32 + 1,
                row,
                col,
            })
            .collect()
    }

    /// Linear-offset trajectories for `(row, col)` centroids.
    /// Returns `(cols, rows)`, each shaped `(n, steps)`.
    #[pyfunction]
    #[pyo3(signature = (centroids, sun_azimuth, offset=100.0, steps=100))]
    pub fn linear_offset(
        py: Python<'_>,
        centroids: Vec<(f64, f64)>,
        sun_azimuth: f64,
        offset: f64,
        steps: usize,
    ) -> PyResult<(Py<PyArray2<f64>>, Py<PyArray2<f64>>)> {
        let params = LinearOffsetParams { offset, steps };
        let t = super::linear_offset_trajectories(&to_centroids(centroids), sun_azimuth, &params)?;
        Ok((
            t.cols.into_pyarray(py).unbind(),
            t.rows.into_pyarray(py).unbind(),
        ))
    }

    #[pyfunction]
    pub fn get_xy_intersection(p0: [f64; 3], p1: [f64; 3]) -> PyResult<[f64; 3]> {
        Ok(super::xy_plane_intersection(p0, p1)?)
    }

    /// Ray-intersection projection. Returns a dict with keys `sun`,
    /// `min_cloud_ele` and `max_cloud_ele`.
    #[pyfunction]
    #[pyo3(signature = (centroids, sun_azimuth, sun_elevation, width, height, low_altitude_fraction=0.0, high_altitude_fraction=0.5))]
    #[allow(clippy::too_many_arguments)]
    pub fn ray_intersections(
        py: Python<'_>,
        centroids: Vec<(f64, f64)>,
        sun_azimuth: f64,
        sun_elevation: f64,
        width: f64,
        height: f64,
        low_altitude_fraction: f64,
        high_altitude_fraction: f64,
    ) -> PyResult<Py<PyDict>> {
        let sun = SunPosition::new(sun_azimuth, sun_elevation)?;
        let params = RayIntersectionParams {
            low_altitude_fraction,
            high_altitude_fraction,
        };
        let r = super::ray_intersections(&to_centroids(centroids), &sun, width, height, &params)?;
        let dict = PyDict::new(py);
        dict.set_item("sun", r.sun)?;
        dict.set_item("min_cloud_ele", r.min_cloud_ele.into_pyarray(py))?;
        dict.set_item("max_cloud_ele", r.max_cloud_ele.into_pyarray(py))?;
        Ok(dict.unbind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn centroid(label: u32, row: f64, col: f64) -> Centroid {
        Centroid { label, row, col }
    }

    #[test]
    fn test_bearing_is_unit() {
        for az in [-170.0, -45.0, 0.0, 30.0, 135.0, 180.0] {
            let (r, c) = shadow_bearing(az).unwrap();
            assert_abs_diff_eq!(r * r + c * c, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_bearing_due_north_sun() {
        // sensor 0 -> spherical 90 -> +90 = 180 degrees
        let (r, c) = shadow_bearing(0.0).unwrap();
        assert_abs_diff_eq!(r, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(c, -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate_bearing() {
        for az in [90.0, -90.0] {
            let err = linear_offset_trajectories(
                &[centroid(1, 5.0, 5.0)],
                az,
                &LinearOffsetParams::default(),
            )
            .unwrap_err();
            assert!(
                matches!(err, ShadowError::DegenerateBearing { azimuth } if azimuth == az),
                "az {az}: {err:?}"
            );
        }
    }

    #[test]
    fn test_trajectory_endpoints_and_order() {
        let centroids = [centroid(1, 10.0, 20.0), centroid(2, 50.0, 5.0)];
        let params = LinearOffsetParams::default();
        let sun_azimuth = 30.0;
        let t = linear_offset_trajectories(&centroids, sun_azimuth, &params).unwrap();
        assert_eq!(t.cols.dim(), (2, 100));
        assert_eq!(t.rows.dim(), (2, 100));

        let (br, bc) = shadow_bearing(sun_azimuth).unwrap();
        for (i, c) in centroids.iter().enumerate() {
            assert_abs_diff_eq!(t.cols[[i, 0]], c.col, epsilon = 1e-9);
            assert_abs_diff_eq!(t.rows[[i, 0]], c.row, epsilon = 1e-9);
            assert_abs_diff_eq!(t.cols[[i, 99]], c.col + 100.0 * bc, epsilon = 1e-9);
            assert_abs_diff_eq!(t.rows[[i, 99]], c.row + 100.0 * br, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_trajectory_samples_are_evenly_spaced() {
        let params = LinearOffsetParams {
            offset: 10.0,
            steps: 11,
        };
        let t = linear_offset_trajectories(&[centroid(1, 0.0, 0.0)], 45.0, &params).unwrap();
        let cols = t.cols.row(0);
        let step = cols[1] - cols[0];
        for k in 1..11 {
            assert_abs_diff_eq!(cols[k] - cols[k - 1], step, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_no_centroids() {
        let t = linear_offset_trajectories(&[], 30.0, &LinearOffsetParams::default()).unwrap();
        assert!(t.is_empty());
        assert_eq!(t.cols.dim(), (0, 100));
    }

    #[test]
    fn test_invalid_linear_params() {
        let params = LinearOffsetParams {
            offset: 100.0,
            steps: 1,
        };
        assert!(matches!(
            linear_offset_trajectories(&[], 30.0, &params),
            Err(ShadowError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_xy_plane_intersection() {
        let p = xy_plane_intersection([0.0, 0.0, 1.0], [1.0, 2.0, 0.5]).unwrap();
        assert_abs_diff_eq!(p[0], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(p[1], 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(p[2], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_xy_plane_intersection_parallel() {
        assert!(matches!(
            xy_plane_intersection([0.0, 0.0, 1.0], [3.0, 4.0, 1.0]),
            Err(ShadowError::DegenerateRay { .. })
        ));
    }

    #[test]
    fn test_ray_intersections_ground_cloud_is_fixed_point() {
        let sun = SunPosition::new(120.0, 40.0).unwrap();
        let centroids = [centroid(1, 12.0, 30.0), centroid(2, 70.0, 64.0)];
        let r = ray_intersections(
            &centroids,
            &sun,
            100.0,
            80.0,
            &RayIntersectionParams::default(),
        )
        .unwrap();
        assert_eq!(r.min_cloud_ele.dim(), (2, 3));
        assert_eq!(r.max_cloud_ele.dim(), (2, 3));
        for (i, c) in centroids.iter().enumerate() {
            // a cloud on the ground casts its shadow onto itself
            assert_abs_diff_eq!(r.min_cloud_ele[[i, 0]], c.col, epsilon = 1e-9);
            assert_abs_diff_eq!(r.min_cloud_ele[[i, 1]], c.row, epsilon = 1e-9);
            assert_abs_diff_eq!(r.max_cloud_ele[[i, 2]], 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_ray_intersections_high_cloud_shadow_moves_away_from_sun() {
        let sun = SunPosition::new(120.0, 40.0).unwrap();
        let c = centroid(1, 40.0, 50.0);
        let r = ray_intersections(&[c], &sun, 100.0, 80.0, &RayIntersectionParams::default())
            .unwrap();
        // half-way altitude doubles the sun -> cloud offset on the ground
        let sx = r.sun[0];
        let sy = r.sun[1];
        assert_abs_diff_eq!(r.max_cloud_ele[[0, 0]], sx + 2.0 * (c.col - sx), epsilon = 1e-9);
        assert_abs_diff_eq!(r.max_cloud_ele[[0, 1]], sy + 2.0 * (c.row - sy), epsilon = 1e-9);
    }

    #[test]
    fn test_ray_intersections_sun_on_horizon() {
        let sun = SunPosition::new(0.0, 0.0).unwrap();
        let err = ray_intersections(
            &[centroid(1, 1.0, 1.0)],
            &sun,
            10.0,
            10.0,
            &RayIntersectionParams::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ShadowError::DegenerateRay { .. }));
    }

    #[test]
    fn test_output_serializes_with_method_tag() {
        let out = ShadowOutput::LinearOffset(ShadowTrajectories::empty(3));
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["method"], "linear_offset");
        assert!(out.is_empty());
    }
}
