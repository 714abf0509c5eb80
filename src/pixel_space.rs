//! Unit-square to raster pixel coordinates.
//!
//! Input is y-up with both axes in [-1, 1]; output has its origin at the
//! top-left corner of the image with y growing downward.

use ndarray::{Array1, ArrayView1, Zip};

use crate::error::{Result, ShadowError};

#[inline]
pub fn to_pixel_space(x: f64, y: f64, width: f64, height: f64) -> (f64, f64) {
    let xp = (x + 1.0) * 0.5 * width;
    let yp = (-y + 1.0) * 0.5 * height;
    (xp, yp)
}

/// Element-wise [`to_pixel_space`].
pub fn to_pixel_space_array(
    x: ArrayView1<f64>,
    y: ArrayView1<f64>,
    width: f64,
    height: f64,
) -> Result<(Array1<f64>, Array1<f64>)> {
    if x.len() != y.len() {
        return Err(ShadowError::ShapeMismatch(format!(
            "{} x coordinates but {} y coordinates",
            x.len(),
            y.len()
        )));
    }
    let mut xp = Array1::<f64>::zeros(x.len());
    let mut yp = Array1::<f64>::zeros(y.len());
    Zip::from(&mut xp)
        .and(&mut yp)
        .and(&x)
        .and(&y)
        .for_each(|xp, yp, &x, &y| {
            (*xp, *yp) = to_pixel_space(x, y, width, height);
        });
    Ok((xp, yp))
}

#[cfg(feature = "python")]
pub(crate) mod py {
    use numpy::{IntoPyArray, PyArray1, PyReadonlyArray1};
    use pyo3::prelude::*;

    #[pyfunction]
    pub fn to_pixel_space(
        py: Python<'_>,
        x: PyReadonlyArray1<f64>,
        y: PyReadonlyArray1<f64>,
        width: f64,
        height: f64,
    ) -> PyResult<(Py<PyArray1<f64>>, Py<PyArray1<f64>>)> {
        let (xp, yp) = super::to_pixel_space_array(x.as_array(), y.as_array(), width, height)?;
        Ok((xp.into_pyarray(py).unbind(), yp.into_pyarray(py).unbind()))
    }
}
