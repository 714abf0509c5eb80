//! Predict cloud shadow locations from a cloud mask and the sun angle.
//!
//! The pipeline labels connected cloud regions in a single raster band,
//! takes the center of mass of each region, and projects it along the
//! sun's ray onto the ground plane. See [`pipeline::get_cloud_shadows`].

pub mod angles;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod pixel_space;
pub mod projection;
pub mod raster;
pub mod regions;

pub use angles::{
    sensor_to_spherical_azimuth, sensor_to_spherical_zenith, spherical_to_cartesian,
    spherical_to_cartesian_array, SunPosition,
};
pub use config::ShadowConfig;
pub use error::{Result, ShadowError, Stage};
pub use pipeline::{estimate_shadows, get_cloud_shadows, ShadowReport};
pub use pixel_space::{to_pixel_space, to_pixel_space_array};
pub use projection::{
    linear_offset_trajectories, ray_intersections, xy_plane_intersection, LinearOffsetParams,
    ProjectionMethod, RayIntersectionParams, RayIntersections, ShadowOutput, ShadowTrajectories,
};
pub use regions::{compute_centroids, label_regions, Centroid, Connectivity, RegionLabels};

#[cfg(feature = "python")]
use pyo3::prelude::*;

#[cfg(feature = "python")]
#[pymodule]
fn cloudshadow(py_module: &Bound<'_, PyModule>) -> PyResult<()> {
    register_angles_module(py_module)?;
    register_regions_module(py_module)?;
    register_projection_module(py_module)?;
    register_pipeline_module(py_module)?;

    py_module.add("__doc__", "Cloud shadow estimation implemented in Rust.")?;

    Ok(())
}

#[cfg(feature = "python")]
fn register_angles_module(py_module: &Bound<'_, PyModule>) -> PyResult<()> {
    let submodule = PyModule::new(py_module.py(), "angles")?;
    submodule.add("__doc__", "Sun angle conventions and pixel-space mapping.")?;
    submodule.add_function(wrap_pyfunction!(angles::py::get_spherical_azimuth, &submodule)?)?;
    submodule.add_function(wrap_pyfunction!(angles::py::get_spherical_zenith, &submodule)?)?;
    submodule.add_function(wrap_pyfunction!(angles::py::get_xyz, &submodule)?)?;
    submodule.add_function(wrap_pyfunction!(pixel_space::py::to_pixel_space, &submodule)?)?;
    py_module.add_submodule(&submodule)?;
    Ok(())
}

#[cfg(feature = "python")]
fn register_regions_module(py_module: &Bound<'_, PyModule>) -> PyResult<()> {
    let submodule = PyModule::new(py_module.py(), "regions")?;
    submodule.add("__doc__", "Connected-component labeling and centroids.")?;
    submodule.add_function(wrap_pyfunction!(regions::py::label, &submodule)?)?;
    submodule.add_function(wrap_pyfunction!(regions::py::center_of_mass, &submodule)?)?;
    py_module.add_submodule(&submodule)?;
    Ok(())
}

#[cfg(feature = "python")]
fn register_projection_module(py_module: &Bound<'_, PyModule>) -> PyResult<()> {
    let submodule = PyModule::new(py_module.py(), "projection")?;
    submodule.add("__doc__", "Shadow projection from cloud centroids.")?;
    submodule.add_function(wrap_pyfunction!(projection::py::linear_offset, &submodule)?)?;
    submodule.add_function(wrap_pyfunction!(projection::py::get_xy_intersection, &submodule)?)?;
    submodule.add_function(wrap_pyfunction!(projection::py::ray_intersections, &submodule)?)?;
    py_module.add_submodule(&submodule)?;
    Ok(())
}

#[cfg(feature = "python")]
fn register_pipeline_module(py_module: &Bound<'_, PyModule>) -> PyResult<()> {
    let submodule = PyModule::new(py_module.py(), "pipeline")?;
    submodule.add("__doc__", "Mask-to-shadow pipeline.")?;
    submodule.add_class::<config::py::PyShadowConfig>()?;
    submodule.add_function(wrap_pyfunction!(pipeline::py::estimate_shadows, &submodule)?)?;
    submodule.add_function(wrap_pyfunction!(pipeline::py::get_cloud_shadows, &submodule)?)?;
    py_module.add_submodule(&submodule)?;
    Ok(())
}
