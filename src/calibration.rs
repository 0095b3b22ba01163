//! # calibration
//!
//! Sensor-rig calibration records and the projections between the lidar,
//! rectified-camera and image frames.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use ndarray::{s, Array1, Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::constants::SensorType;
use crate::geometry::se3::SE3;
use crate::geometry::utils::cart_to_hom;

/// Camera/lidar calibration for one sensor rig.
///
/// All three matrices are stored homogeneously: `p2` is the (3,4) camera
/// projection extended with a `[0, 0, 0, 1]` row, `r0` embeds the (3,3)
/// rectification with `[3,3] = 1`, and `v2c` is the (3,4) lidar-to-camera
/// rigid transform extended with `[0, 0, 0, 1]`. One record is shared
/// read-only across every sample of a dataset instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    /// (4,4) homogeneous camera projection matrix.
    pub p2: Array2<f32>,
    /// (4,4) homogeneous rectification matrix.
    pub r0: Array2<f32>,
    /// (4,4) homogeneous lidar-to-camera transform.
    pub v2c: Array2<f32>,
}

impl Calibration {
    /// Assemble a calibration from raw (3,4) projection, (3,3) rectification
    /// and (3,4) lidar-to-camera matrices.
    pub fn new(p2: &ArrayView2<f32>, r0: &ArrayView2<f32>, v2c: &ArrayView2<f32>) -> Calibration {
        let mut p2_hom = Array2::<f32>::zeros((4, 4));
        p2_hom.slice_mut(s![..3, ..]).assign(p2);
        p2_hom[[3, 3]] = 1.;

        let mut r0_hom = Array2::<f32>::zeros((4, 4));
        r0_hom.slice_mut(s![..3, ..3]).assign(r0);
        r0_hom[[3, 3]] = 1.;

        let mut v2c_hom = Array2::<f32>::zeros((4, 4));
        v2c_hom.slice_mut(s![..3, ..]).assign(v2c);
        v2c_hom[[3, 3]] = 1.;

        Calibration {
            p2: p2_hom,
            r0: r0_hom,
            v2c: v2c_hom,
        }
    }

    /// Load a KITTI-style calibration text file carrying `P2`, `R0_rect`
    /// and `Tr_velo_to_cam` lines.
    pub fn from_file(path: &Path) -> Result<Calibration> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("cannot read calibration file {}", path.display()))?;
        let p2 = parse_matrix(&content, "P2", 3, 4)?;
        let r0 = parse_matrix(&content, "R0_rect", 3, 3)?;
        let v2c = parse_matrix(&content, "Tr_velo_to_cam", 3, 4)?;
        Ok(Calibration::new(&p2.view(), &r0.view(), &v2c.view()))
    }

    /// Rigid lidar-to-rectified-camera transform.
    pub fn lidar_se3_rect(&self) -> SE3 {
        let r0 = self.r0.slice(s![..3, ..3]);
        let rotation = r0
            .dot(&self.v2c.slice(s![..3, ..3]))
            .as_standard_layout()
            .to_owned();
        let translation = r0.dot(&self.v2c.slice(s![..3, 3]));
        SE3 {
            rotation,
            translation,
        }
    }

    /// Transform (N,3) lidar-frame points into the rectified camera frame.
    pub fn lidar_to_rect(&self, pts_lidar: &ArrayView2<f32>) -> Array2<f32> {
        self.lidar_se3_rect().transform_from(pts_lidar)
    }

    /// Transform (N,3) rectified-camera-frame points into the lidar frame.
    pub fn rect_to_lidar(&self, pts_rect: &ArrayView2<f32>) -> Array2<f32> {
        self.lidar_se3_rect().inverse().transform_from(pts_rect)
    }

    /// Project (N,3) rectified-camera-frame points to (N,2) pixel
    /// coordinates plus their rectified-frame depths.
    pub fn rect_to_img(&self, pts_rect: &ArrayView2<f32>) -> (Array2<f32>, Array1<f32>) {
        let pts_rect_hom = cart_to_hom(pts_rect.to_owned());
        let pts_2d_hom = pts_rect_hom.dot(&self.p2.t());
        let z = pts_2d_hom.slice(s![.., 2..3]).to_owned();
        let mut pts_img = pts_2d_hom.slice(s![.., ..2]).to_owned();
        pts_img /= &z;
        let pts_rect_depth = pts_2d_hom.slice(s![.., 2]).to_owned() - self.p2[[2, 3]];
        (pts_img, pts_rect_depth)
    }
}

/// Path of the calibration file for one sensor, relative to the dataset root.
pub fn calib_path(root: &Path, sensor: SensorType) -> PathBuf {
    root.join(format!("calib_{sensor}.txt"))
}

fn parse_matrix(content: &str, key: &str, rows: usize, cols: usize) -> Result<Array2<f32>> {
    let line = content
        .lines()
        .find_map(|line| line.strip_prefix(key).and_then(|rest| rest.strip_prefix(':')))
        .with_context(|| format!("calibration key `{key}` not found"))?;
    let values = line
        .split_whitespace()
        .map(|value| value.parse::<f32>())
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("calibration key `{key}` holds a non-float value"))?;
    if values.len() != rows * cols {
        bail!(
            "calibration key `{key}` expects {} values, found {}",
            rows * cols,
            values.len()
        );
    }
    Ok(Array2::from_shape_vec((rows, cols), values)?)
}
