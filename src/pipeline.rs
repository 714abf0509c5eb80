//! Cloud shadow pipeline: mask -> regions -> centroids -> shadow projection.
//!
//! [`estimate_shadows`] works on an in-memory mask; [`get_cloud_shadows`]
//! wraps it with raster loading and optional JSON output. A mask with no
//! cloud regions is not an error and yields an empty output for the
//! configured method.

use std::path::Path;

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

use crate::angles::SunPosition;
use crate::config::ShadowConfig;
use crate::error::{Result, Stage};
use crate::projection::{
    linear_offset_trajectories, ray_intersections, sun_point, ProjectionMethod, RayIntersections,
    ShadowOutput, ShadowTrajectories,
};
use crate::raster::{read_band, write_report};
use crate::regions::{extract_centroids, region_pixel_counts, Centroid};

/// Everything produced for one cloud mask.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShadowReport {
    /// Regions found by labeling, before any exclusion.
    pub region_count: u32,
    /// Centroids that were projected, in label order.
    pub centroids: Vec<Centroid>,
    pub output: ShadowOutput,
}

impl ShadowReport {
    pub fn is_empty(&self) -> bool {
        self.centroids.is_empty()
    }
}

/// Run extraction and projection on an in-memory cloud mask.
pub fn estimate_shadows(
    mask: ArrayView2<f32>,
    sun: &SunPosition,
    config: &ShadowConfig,
) -> Result<ShadowReport> {
    config.validate()?;
    let (height, width) = mask.dim();

    let (regions, mut centroids) =
        extract_centroids(mask, config.connectivity, config.exclude_last_region)
            .map_err(|e| e.at(Stage::Extract))?;
    log::debug!("labeled {} cloud regions in {width}x{height} mask", regions.count);

    if config.exclude_last_region && regions.count > 0 {
        log::warn!("excluding last cloud region (label {})", regions.count);
    }

    if config.min_region_pixels > 1 {
        let counts = region_pixel_counts(&regions);
        let before = centroids.len();
        centroids.retain(|c| counts[c.label as usize - 1] >= config.min_region_pixels);
        let dropped = before - centroids.len();
        if dropped > 0 {
            log::warn!(
                "dropped {dropped} cloud regions smaller than {} pixels",
                config.min_region_pixels
            );
        }
    }

    let output = if centroids.is_empty() {
        log::info!("no cloud regions to project");
        match config.method {
            ProjectionMethod::LinearOffset => {
                ShadowOutput::LinearOffset(ShadowTrajectories::empty(config.linear.steps))
            }
            ProjectionMethod::RayIntersection => ShadowOutput::RayIntersection(
                RayIntersections::empty(sun_point(sun, width as f64, height as f64)),
            ),
        }
    } else {
        let projected = match config.method {
            ProjectionMethod::LinearOffset => {
                linear_offset_trajectories(&centroids, sun.azimuth, &config.linear)
                    .map(ShadowOutput::LinearOffset)
            }
            ProjectionMethod::RayIntersection => ray_intersections(
                &centroids,
                sun,
                width as f64,
                height as f64,
                &config.ray,
            )
            .map(ShadowOutput::RayIntersection),
        };
        let output = projected.map_err(|e| e.at(Stage::Project))?;
        log::info!(
            "projected shadows for {} cloud regions ({:?})",
            output.len(),
            config.method
        );
        output
    };

    Ok(ShadowReport {
        region_count: regions.count,
        centroids,
        output,
    })
}

/// Load band 1 of `src`, project cloud shadows, and optionally write the
/// report to `dst` as JSON.
///
/// Angles use the sensor convention: azimuth in [-180, 180] clockwise from
/// North, elevation in [-90, 90] above the horizon.
pub fn get_cloud_shadows(
    src: impl AsRef<Path>,
    sun_azimuth: f64,
    sun_elevation: f64,
    dst: Option<&Path>,
    config: &ShadowConfig,
) -> Result<ShadowReport> {
    let sun = SunPosition::new(sun_azimuth, sun_elevation)?;
    let src = src.as_ref();
    log::info!(
        "estimating cloud shadows for {} (sun azimuth {sun_azimuth}, elevation {sun_elevation})",
        src.display()
    );

    let mask = read_band(src, 1).map_err(|e| e.at(Stage::Load))?;
    let report = estimate_shadows(mask.view(), &sun, config)?;

    if let Some(dst) = dst {
        write_report(dst, &report).map_err(|e| e.at(Stage::Write))?;
    }
    Ok(report)
}

#[cfg(feature = "python")]
pub(crate) mod py {
    use std::path::PathBuf;

    use numpy::{IntoPyArray, PyReadonlyArray2};
    use pyo3::prelude::*;
    use pyo3::types::PyDict;

    use crate::angles::SunPosition;
    use crate::config::py::PyShadowConfig;
    use crate::config::ShadowConfig;
    use crate::projection::ShadowOutput;

    fn resolve(config: Option<PyRef<'_, PyShadowConfig>>) -> ShadowConfig {
        config
            .map(|c| ShadowConfig::from(&*c))
            .unwrap_or_default()
    }

    /// `(cols, rows)` for linear offset, a dict for ray intersection.
    fn output_to_py(py: Python<'_>, output: ShadowOutput) -> PyResult<PyObject> {
        match output {
            ShadowOutput::LinearOffset(t) => Ok((
                t.cols.into_pyarray(py),
                t.rows.into_pyarray(py),
            )
                .into_pyobject(py)?
                .into_any()
                .unbind()),
            ShadowOutput::RayIntersection(r) => {
                let dict = PyDict::new(py);
                dict.set_item("sun", r.sun)?;
                dict.set_item("min_cloud_ele", r.min_cloud_ele.into_pyarray(py))?;
                dict.set_item("max_cloud_ele", r.max_cloud_ele.into_pyarray(py))?;
                Ok(dict.into_any().unbind())
            }
        }
    }

    #[pyfunction]
    #[pyo3(signature = (mask, sun_azimuth, sun_elevation, config=None))]
    pub fn estimate_shadows(
        py: Python<'_>,
        mask: PyReadonlyArray2<f32>,
        sun_azimuth: f64,
        sun_elevation: f64,
        config: Option<PyRef<'_, PyShadowConfig>>,
    ) -> PyResult<PyObject> {
        let sun = SunPosition::new(sun_azimuth, sun_elevation)?;
        let report = super::estimate_shadows(mask.as_array(), &sun, &resolve(config))?;
        output_to_py(py, report.output)
    }

    #[pyfunction]
    #[pyo3(signature = (srcpath, sun_azimuth, sun_elevation, dstpath=None, config=None))]
    pub fn get_cloud_shadows(
        py: Python<'_>,
        srcpath: PathBuf,
        sun_azimuth: f64,
        sun_elevation: f64,
        dstpath: Option<PathBuf>,
        config: Option<PyRef<'_, PyShadowConfig>>,
    ) -> PyResult<PyObject> {
        let report = super::get_cloud_shadows(
            &srcpath,
            sun_azimuth,
            sun_elevation,
            dstpath.as_deref(),
            &resolve(config),
        )?;
        output_to_py(py, report.output)
    }
}
