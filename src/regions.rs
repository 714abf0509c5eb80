//! Cloud region extraction: connected-component labeling and centroids.
//!
//! Any non-zero mask pixel is foreground. Labels are renumbered `1..=count`
//! in raster order of each region's first pixel, so label order is stable
//! for a given mask but carries no spatial meaning beyond that.

use std::collections::HashMap;

use ndarray::{Array2, ArrayView2, Zip};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ShadowError};

/// Pixel adjacency used when growing regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    /// Edge neighbours only.
    #[default]
    Four,
    /// Edge and corner neighbours.
    Eight,
}

/// Output of a labeling pass.
#[derive(Debug, Clone)]
pub struct RegionLabels {
    /// 0 for background, `1..=count` for foreground regions.
    pub labels: Array2<u32>,
    pub count: u32,
}

impl RegionLabels {
    /// Wrap an existing label image; `count` is its largest label.
    pub fn from_labels(labels: Array2<u32>) -> Self {
        let count = labels.iter().copied().max().unwrap_or(0);
        Self { labels, count }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Center of mass of one region, in array (row, col) order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Centroid {
    pub label: u32,
    pub row: f64,
    pub col: f64,
}

fn find(parent: &mut [u32], mut x: u32) -> u32 {
    while parent[x as usize] != x {
        parent[x as usize] = parent[parent[x as usize] as usize];
        x = parent[x as usize];
    }
    x
}

fn union(parent: &mut [u32], a: u32, b: u32) {
    let ra = find(parent, a);
    let rb = find(parent, b);
    if ra < rb {
        parent[rb as usize] = ra;
    } else if rb < ra {
        parent[ra as usize] = rb;
    }
}

/// Label connected foreground regions of `mask`.
///
/// Two-pass union-find. The first pass assigns provisional labels from the
/// already-visited neighbours (left and up, plus the two upper diagonals for
/// eight-connectivity); the second resolves equivalences and renumbers.
pub fn label_regions(mask: ArrayView2<f32>, connectivity: Connectivity) -> RegionLabels {
    let (rows, cols) = mask.dim();
    let mut labels = Array2::<u32>::zeros((rows, cols));
    // index 0 is background
    let mut parent: Vec<u32> = vec![0];
    let mut neighbours: Vec<u32> = Vec::with_capacity(4);

    for r in 0..rows {
        for c in 0..cols {
            if mask[[r, c]] == 0.0 {
                continue;
            }

            neighbours.clear();
            if c > 0 && labels[[r, c - 1]] > 0 {
                neighbours.push(labels[[r, c - 1]]);
            }
            if r > 0 && labels[[r - 1, c]] > 0 {
                neighbours.push(labels[[r - 1, c]]);
            }
            if connectivity == Connectivity::Eight && r > 0 {
                if c > 0 && labels[[r - 1, c - 1]] > 0 {
                    neighbours.push(labels[[r - 1, c - 1]]);
                }
                if c + 1 < cols && labels[[r - 1, c + 1]] > 0 {
                    neighbours.push(labels[[r - 1, c + 1]]);
                }
            }

            match neighbours.iter().copied().min() {
                None => {
                    let next = parent.len() as u32;
                    parent.push(next);
                    labels[[r, c]] = next;
                }
                Some(min_label) => {
                    labels[[r, c]] = min_label;
                    for &n in &neighbours {
                        union(&mut parent, min_label, n);
                    }
                }
            }
        }
    }

    let mut renumber: HashMap<u32, u32> = HashMap::new();
    for label in labels.iter_mut() {
        if *label == 0 {
            continue;
        }
        let root = find(&mut parent, *label);
        let next = renumber.len() as u32 + 1;
        *label = *renumber.entry(root).or_insert(next);
    }

    RegionLabels {
        labels,
        count: renumber.len() as u32,
    }
}

/// Pixel count of each region; index `i` holds label `i + 1`.
pub fn region_pixel_counts(regions: &RegionLabels) -> Vec<usize> {
    let mut counts = vec![0usize; regions.count as usize];
    for &label in regions.labels.iter() {
        if label > 0 {
            counts[label as usize - 1] += 1;
        }
    }
    counts
}

#[derive(Clone, Copy, Default)]
struct Moments {
    mass: f64,
    row_mass: f64,
    col_mass: f64,
    pixels: usize,
    row_sum: f64,
    col_sum: f64,
}

/// Intensity-weighted centroid of each requested region, in request order.
///
/// A region whose weights sum to zero falls back to its unweighted mean
/// position. Label 0, labels above `regions.count`, and labels with no
/// pixels are rejected with [`ShadowError::InvalidRegion`].
pub fn compute_centroids(
    mask: ArrayView2<f32>,
    regions: &RegionLabels,
    region_ids: &[u32],
) -> Result<Vec<Centroid>> {
    if mask.dim() != regions.labels.dim() {
        return Err(ShadowError::ShapeMismatch(format!(
            "mask is {:?} but labels are {:?}",
            mask.dim(),
            regions.labels.dim()
        )));
    }
    if region_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut moments = vec![Moments::default(); regions.count as usize + 1];
    Zip::indexed(&mask)
        .and(&regions.labels)
        .for_each(|(r, c), &value, &label| {
            if label == 0 || label > regions.count {
                return;
            }
            let m = &mut moments[label as usize];
            let w = value as f64;
            m.mass += w;
            m.row_mass += w * r as f64;
            m.col_mass += w * c as f64;
            m.pixels += 1;
            m.row_sum += r as f64;
            m.col_sum += c as f64;
        });

    region_ids
        .iter()
        .map(|&id| {
            if id == 0 || id > regions.count {
                return Err(ShadowError::InvalidRegion(id));
            }
            let m = &moments[id as usize];
            if m.pixels == 0 {
                return Err(ShadowError::InvalidRegion(id));
            }
            let (row, col) = if m.mass != 0.0 {
                (m.row_mass / m.mass, m.col_mass / m.mass)
            } else {
                let n = m.pixels as f64;
                (m.row_sum / n, m.col_sum / n)
            };
            Ok(Centroid {
                label: id,
                row,
                col,
            })
        })
        .collect()
}

/// Label `mask` and return the centroid of every region in label order.
///
/// With `exclude_last` the highest label is skipped, which is how the
/// original tool enumerated regions.
pub fn extract_centroids(
    mask: ArrayView2<f32>,
    connectivity: Connectivity,
    exclude_last: bool,
) -> Result<(RegionLabels, Vec<Centroid>)> {
    let regions = label_regions(mask, connectivity);
    let last = if exclude_last {
        regions.count.saturating_sub(1)
    } else {
        regions.count
    };
    let ids: Vec<u32> = (1..=last).collect();
    let centroids = compute_centroids(mask, &regions, &ids)?;
    Ok((regions, centroids))
}

#[cfg(feature = "python")]
pub(crate) mod py {
    use numpy::{IntoPyArray, PyArray2, PyReadonlyArray2};
    use pyo3::prelude::*;

    use super::{Connectivity, RegionLabels};

    /// Label a cloud mask. Returns `(labels, count)`.
    #[pyfunction]
    #[pyo3(signature = (mask, eight_connectivity=false))]
    pub fn label(
        py: Python<'_>,
        mask: PyReadonlyArray2<f32>,
        eight_connectivity: bool,
    ) -> (Py<PyArray2<u32>>, u32) {
        let connectivity = if eight_connectivity {
            Connectivity::Eight
        } else {
            Connectivity::Four
        };
        let regions = super::label_regions(mask.as_array(), connectivity);
        (regions.labels.into_pyarray(py).unbind(), regions.count)
    }

    /// Center of mass of each requested label as `(row, col)`.
    #[pyfunction]
    pub fn center_of_mass(
        mask: PyReadonlyArray2<f32>,
        labels: PyReadonlyArray2<u32>,
        index: Vec<u32>,
    ) -> PyResult<Vec<(f64, f64)>> {
        let regions = RegionLabels::from_labels(labels.as_array().to_owned());
        let centroids = super::compute_centroids(mask.as_array(), &regions, &index)?;
        Ok(centroids.into_iter().map(|c| (c.row, c.col)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, s};

    #[test]
    fn test_all_zero_mask() {
        let mask = Array2::<f32>::zeros((8, 8));
        let (regions, centroids) =
            extract_centroids(mask.view(), Connectivity::Four, false).unwrap();
        assert_eq!(regions.count, 0);
        assert!(regions.is_empty());
        assert!(centroids.is_empty());
    }

    #[test]
    fn test_empty_array() {
        let mask = Array2::<f32>::zeros((0, 5));
        let regions = label_regions(mask.view(), Connectivity::Eight);
        assert_eq!(regions.count, 0);
    }

    #[test]
    fn test_single_block_centroid() {
        let mut mask = Array2::<f32>::zeros((10, 12));
        mask.slice_mut(s![2..5, 4..7]).fill(1.0);
        let (regions, centroids) =
            extract_centroids(mask.view(), Connectivity::Four, false).unwrap();
        assert_eq!(regions.count, 1);
        assert_eq!(centroids.len(), 1);
        assert_eq!(centroids[0].label, 1);
        assert_abs_diff_eq!(centroids[0].row, 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(centroids[0].col, 5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_diagonal_pixels_depend_on_connectivity() {
        let mask = array![
            [1.0f32, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
        ];
        assert_eq!(label_regions(mask.view(), Connectivity::Four).count, 3);
        assert_eq!(label_regions(mask.view(), Connectivity::Eight).count, 1);
    }

    #[test]
    fn test_u_shape_merges_into_one_label() {
        // The two arms get different provisional labels and meet on the last row
        let mask = array![
            [1.0f32, 0.0, 1.0],
            [1.0, 0.0, 1.0],
            [1.0, 1.0, 1.0],
        ];
        let regions = label_regions(mask.view(), Connectivity::Four);
        assert_eq!(regions.count, 1);
        assert!(regions
            .labels
            .iter()
            .zip(mask.iter())
            .all(|(&l, &m)| (m != 0.0) == (l == 1)));
    }

    #[test]
    fn test_labels_follow_raster_order() {
        let mask = array![
            [0.0f32, 0.0, 1.0],
            [1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0],
        ];
        let regions = label_regions(mask.view(), Connectivity::Four);
        assert_eq!(regions.count, 3);
        assert_eq!(regions.labels[[0, 2]], 1);
        assert_eq!(regions.labels[[1, 0]], 2);
        assert_eq!(regions.labels[[2, 2]], 3);
        assert_eq!(region_pixel_counts(&regions), vec![1, 1, 1]);
    }

    #[test]
    fn test_intensity_weighted_centroid() {
        let mask = array![[1.0f32, 3.0], [0.0, 0.0]];
        let regions = label_regions(mask.view(), Connectivity::Four);
        let c = compute_centroids(mask.view(), &regions, &[1]).unwrap();
        assert_abs_diff_eq!(c[0].row, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(c[0].col, 0.75, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_mass_falls_back_to_mean() {
        let mask = array![[1.0f32, -1.0]];
        let regions = label_regions(mask.view(), Connectivity::Four);
        let c = compute_centroids(mask.view(), &regions, &[1]).unwrap();
        assert_abs_diff_eq!(c[0].col, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_invalid_region_ids() {
        let mut mask = Array2::<f32>::zeros((4, 4));
        mask[[1, 1]] = 1.0;
        let regions = label_regions(mask.view(), Connectivity::Four);
        assert!(matches!(
            compute_centroids(mask.view(), &regions, &[0]),
            Err(ShadowError::InvalidRegion(0))
        ));
        assert!(matches!(
            compute_centroids(mask.view(), &regions, &[1, 2]),
            Err(ShadowError::InvalidRegion(2))
        ));
    }

    #[test]
    fn test_centroids_keep_request_order() {
        let mut mask = Array2::<f32>::zeros((6, 6));
        mask[[0, 0]] = 1.0;
        mask[[5, 5]] = 1.0;
        let regions = label_regions(mask.view(), Connectivity::Four);
        let c = compute_centroids(mask.view(), &regions, &[2, 1]).unwrap();
        assert_eq!((c[0].label, c[0].row, c[0].col), (2, 5.0, 5.0));
        assert_eq!((c[1].label, c[1].row, c[1].col), (1, 0.0, 0.0));
    }

    #[test]
    fn test_exclude_last_region() {
        let mut mask = Array2::<f32>::zeros((6, 6));
        mask[[0, 0]] = 1.0;
        mask[[3, 3]] = 1.0;
        mask[[5, 0]] = 1.0;
        let (regions, centroids) =
            extract_centroids(mask.view(), Connectivity::Four, true).unwrap();
        assert_eq!(regions.count, 3);
        assert_eq!(centroids.len(), 2);
        assert_eq!(centroids.last().map(|c| c.label), Some(2));
    }

    #[test]
    fn test_shape_mismatch() {
        let mask = Array2::<f32>::zeros((3, 3));
        let regions = RegionLabels::from_labels(Array2::<u32>::zeros((2, 2)));
        assert!(matches!(
            compute_centroids(mask.view(), &regions, &[]),
            Err(ShadowError::ShapeMismatch(_))
        ));
    }
}
