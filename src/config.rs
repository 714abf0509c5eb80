//! Pipeline configuration.
//!
//! Every field has a default, so a JSON file only needs the keys it changes:
//!
//! ```json
//! { "method": "ray_intersection", "connectivity": "eight", "ray": { "high_altitude_fraction": 0.3 } }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ShadowError};
use crate::projection::{LinearOffsetParams, ProjectionMethod, RayIntersectionParams};
use crate::regions::Connectivity;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowConfig {
    pub method: ProjectionMethod,
    pub connectivity: Connectivity,
    pub linear: LinearOffsetParams,
    pub ray: RayIntersectionParams,
    /// Skip the highest region label, as the original tool did.
    pub exclude_last_region: bool,
    /// Regions with fewer pixels than this are dropped before projection.
    pub min_region_pixels: usize,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            method: ProjectionMethod::default(),
            connectivity: Connectivity::default(),
            linear: LinearOffsetParams::default(),
            ray: RayIntersectionParams::default(),
            exclude_last_region: false,
            min_region_pixels: 1,
        }
    }
}

impl ShadowConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: ShadowConfig = serde_json::from_str(json)
            .map_err(|e| ShadowError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ShadowError::SourceIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        self.linear.validate()?;
        self.ray.validate()?;
        if self.min_region_pixels == 0 {
            return Err(ShadowError::InvalidConfig(
                "min_region_pixels must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(feature = "python")]
pub(crate) mod py {
    use pyo3::prelude::*;

    use super::ShadowConfig;
    use crate::projection::{LinearOffsetParams, ProjectionMethod, RayIntersectionParams};
    use crate::regions::Connectivity;

    /// Python-side view of [`ShadowConfig`].
    #[pyclass(name = "ShadowConfig")]
    #[derive(Clone)]
    pub struct PyShadowConfig {
        #[pyo3(get, set)]
        pub ray_intersection: bool,
        #[pyo3(get, set)]
        pub eight_connectivity: bool,
        #[pyo3(get, set)]
        pub offset: f64,
        #[pyo3(get, set)]
        pub steps: usize,
        #[pyo3(get, set)]
        pub low_altitude_fraction: f64,
        #[pyo3(get, set)]
        pub high_altitude_fraction: f64,
        #[pyo3(get, set)]
        pub exclude_last_region: bool,
        #[pyo3(get, set)]
        pub min_region_pixels: usize,
    }

    #[pymethods]
    impl PyShadowConfig {
        #[new]
        #[pyo3(signature = (
            ray_intersection=false,
            eight_connectivity=false,
            offset=100.0,
            steps=100,
            low_altitude_fraction=0.0,
            high_altitude_fraction=0.5,
            exclude_last_region=false,
            min_region_pixels=1
        ))]
        #[allow(clippy::too_many_arguments)]
        pub fn new(
            ray_intersection: bool,
            eight_connectivity: bool,
            offset: f64,
            steps: usize,
            low_altitude_fraction: f64,
            high_altitude_fraction: f64,
            exclude_last_region: bool,
            min_region_pixels: usize,
        ) -> Self {
            Self {
                ray_intersection,
                eight_connectivity,
                offset,
                steps,
                low_altitude_fraction,
                high_altitude_fraction,
                exclude_last_region,
                min_region_pixels,
            }
        }
    }

    impl From<&PyShadowConfig> for ShadowConfig {
        fn from(p: &PyShadowConfig) -> Self {
            ShadowConfig {
                method: if p.ray_intersection {
                    ProjectionMethod::RayIntersection
                } else {
                    ProjectionMethod::LinearOffset
                },
                connectivity: if p.eight_connectivity {
                    Connectivity::Eight
                } else {
                    Connectivity::Four
                },
                linear: LinearOffsetParams {
                    offset: p.offset,
                    steps: p.steps,
                },
                ray: RayIntersectionParams {
                    low_altitude_fraction: p.low_altitude_fraction,
                    high_altitude_fraction: p.high_altitude_fraction,
                },
                exclude_last_region: p.exclude_last_region,
                min_region_pixels: p.min_region_pixels,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ShadowConfig::default();
        assert_eq!(config.method, ProjectionMethod::LinearOffset);
        assert_eq!(config.connectivity, Connectivity::Four);
        assert_eq!(config.linear.offset, 100.0);
        assert_eq!(config.linear.steps, 100);
        assert_eq!(config.ray.high_altitude_fraction, 0.5);
        assert!(!config.exclude_last_region);
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_json() {
        let config = ShadowConfig::from_json_str(
            r#"{ "method": "ray_intersection", "connectivity": "eight", "linear": { "steps": 20 } }"#,
        )
        .unwrap();
        assert_eq!(config.method, ProjectionMethod::RayIntersection);
        assert_eq!(config.connectivity, Connectivity::Eight);
        assert_eq!(config.linear.steps, 20);
        assert_eq!(config.linear.offset, 100.0);
        assert_eq!(config.min_region_pixels, 1);
    }

    #[test]
    fn test_invalid_json_values() {
        assert!(matches!(
            ShadowConfig::from_json_str(r#"{ "linear": { "steps": 1 } }"#),
            Err(ShadowError::InvalidConfig(_))
        ));
        assert!(matches!(
            ShadowConfig::from_json_str(r#"{ "method": "sideways" }"#),
            Err(ShadowError::InvalidConfig(_))
        ));
        assert!(matches!(
            ShadowConfig::from_json_str(r#"{ "min_region_pixels": 0 }"#),
            Err(ShadowError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "exclude_last_region": true }}"#).unwrap();
        let config = ShadowConfig::from_json_file(file.path()).unwrap();
        assert!(config.exclude_last_region);

        let missing = file.path().with_extension("missing");
        assert!(matches!(
            ShadowConfig::from_json_file(&missing),
            Err(ShadowError::SourceIo { .. })
        ));
    }
}
