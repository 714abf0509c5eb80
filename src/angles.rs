//! Sun angle conventions.
//!
//! Landsat metadata reports the sun as azimuth clockwise from North in
//! [-180, 180] and elevation above the horizon in [-90, 90]. The geometry in
//! this crate works in the physics convention instead: azimuth
//! counter-clockwise from East in [0, 360) and zenith from the vertical in
//! [0, 180].

use ndarray::{Array2, ArrayView1, Zip};

use crate::error::{Result, ShadowError};

const DEG_TO_RAD: f64 = std::f64::consts::PI / 180.0;

/// Sensor azimuth -> spherical azimuth in [0, 360).
///
/// Reflects across the north-south axis and rotates a quarter turn. Any real
/// input is accepted; range checking is the caller's job (see
/// [`validate_sensor_azimuth`]).
pub fn sensor_to_spherical_azimuth(az: f64) -> f64 {
    let azimuth = (-az + 90.0).rem_euclid(360.0);
    // rem_euclid can round up to the modulus for tiny negative inputs
    if azimuth >= 360.0 {
        0.0
    } else {
        azimuth
    }
}

/// Sensor elevation -> spherical zenith in [0, 180).
///
/// `-90` wraps to `0` exactly as the modular form dictates.
pub fn sensor_to_spherical_zenith(ze: f64) -> f64 {
    let zenith = (-ze + 90.0).rem_euclid(180.0);
    if zenith >= 180.0 {
        0.0
    } else {
        zenith
    }
}

/// Spherical azimuth -> sensor azimuth in (-180, 180].
pub fn spherical_to_sensor_azimuth(az: f64) -> f64 {
    let a = (90.0 - az).rem_euclid(360.0);
    if a > 180.0 {
        a - 360.0
    } else {
        a
    }
}

/// Spherical zenith -> sensor elevation in [-90, 90].
pub fn spherical_to_sensor_elevation(ze: f64) -> f64 {
    90.0 - ze
}

/// Unit direction vector `[x, y, z]` for a spherical azimuth/zenith in degrees.
#[inline]
pub fn spherical_to_cartesian(azimuth_deg: f64, zenith_deg: f64) -> [f64; 3] {
    let azimuth = azimuth_deg * DEG_TO_RAD;
    let zenith = zenith_deg * DEG_TO_RAD;
    [
        zenith.sin() * azimuth.cos(),
        zenith.sin() * azimuth.sin(),
        zenith.cos(),
    ]
}

/// Element-wise [`spherical_to_cartesian`]; one `[x, y, z]` row per angle pair.
pub fn spherical_to_cartesian_array(
    azimuth_deg: ArrayView1<f64>,
    zenith_deg: ArrayView1<f64>,
) -> Result<Array2<f64>> {
    if azimuth_deg.len() != zenith_deg.len() {
        return Err(ShadowError::ShapeMismatch(format!(
            "{} azimuths but {} zeniths",
            azimuth_deg.len(),
            zenith_deg.len()
        )));
    }
    let mut out = Array2::<f64>::zeros((azimuth_deg.len(), 3));
    Zip::from(out.rows_mut())
        .and(&azimuth_deg)
        .and(&zenith_deg)
        .for_each(|mut row, &az, &ze| {
            let [x, y, z] = spherical_to_cartesian(az, ze);
            row[0] = x;
            row[1] = y;
            row[2] = z;
        });
    Ok(out)
}

fn check_range(name: &'static str, value: f64, min: f64, max: f64) -> Result<f64> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(ShadowError::InputRange {
            name,
            value,
            min,
            max,
        })
    }
}

pub fn validate_sensor_azimuth(az: f64) -> Result<f64> {
    check_range("sun_azimuth", az, -180.0, 180.0)
}

pub fn validate_sensor_elevation(el: f64) -> Result<f64> {
    check_range("sun_elevation", el, -90.0, 90.0)
}

/// Sun position at scene center, in the sensor convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SunPosition {
    pub azimuth: f64,
    pub elevation: f64,
}

impl SunPosition {
    pub fn new(azimuth: f64, elevation: f64) -> Result<Self> {
        Ok(Self {
            azimuth: validate_sensor_azimuth(azimuth)?,
            elevation: validate_sensor_elevation(elevation)?,
        })
    }

    pub fn spherical_azimuth(&self) -> f64 {
        sensor_to_spherical_azimuth(self.azimuth)
    }

    pub fn spherical_zenith(&self) -> f64 {
        sensor_to_spherical_zenith(self.elevation)
    }

    /// Unit vector pointing at the sun (radius 1).
    pub fn direction(&self) -> [f64; 3] {
        spherical_to_cartesian(self.spherical_azimuth(), self.spherical_zenith())
    }
}

// ── PyO3 wrappers ──────────────────────────────────────────────────────────

#[cfg(feature = "python")]
pub(crate) mod py {
    use numpy::{IntoPyArray, PyArray2, PyReadonlyArray1};
    use pyo3::prelude::*;

    #[pyfunction]
    pub fn get_spherical_azimuth(az: f64) -> f64 {
        super::sensor_to_spherical_azimuth(az)
    }

    #[pyfunction]
    pub fn get_spherical_zenith(ze: f64) -> f64 {
        super::sensor_to_spherical_zenith(ze)
    }

    /// Vectorized spherical -> cartesian. Returns an (n, 3) array.
    #[pyfunction]
    pub fn get_xyz(
        py: Python<'_>,
        az: PyReadonlyArray1<f64>,
        ze: PyReadonlyArray1<f64>,
    ) -> PyResult<Py<PyArray2<f64>>> {
        let xyz = super::spherical_to_cartesian_array(az.as_array(), ze.as_array())?;
        Ok(xyz.into_pyarray(py).unbind())
    }
}
