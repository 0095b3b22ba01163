//! # io
//!
//! Reading and writing operations.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::{bail, Context, Result};
use ndarray::{s, Array1, Array2, ArrayView2};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::constants::LIDAR_NUM_FEATURES;

/// Image extent metadata in probe order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageShape {
    /// Number of pixel rows.
    pub height: i32,
    /// Number of pixel columns.
    pub width: i32,
}

/// Read a flat little-endian f32 point file into an `(N, 5)` array.
pub fn read_points_bin(path: &Path) -> Result<Array2<f32>> {
    let bytes =
        fs::read(path).with_context(|| format!("cannot read point file {}", path.display()))?;
    if bytes.len() % 4 != 0 {
        bail!(
            "point file {} is not a whole number of f32 values",
            path.display()
        );
    }
    let values: Vec<f32> = bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();
    if values.len() % LIDAR_NUM_FEATURES != 0 {
        bail!(
            "point file {} does not decompose into {LIDAR_NUM_FEATURES}-feature rows",
            path.display()
        );
    }
    let num_points = values.len() / LIDAR_NUM_FEATURES;
    Ok(Array2::from_shape_vec((num_points, LIDAR_NUM_FEATURES), values)?)
}

/// Write an `(N, 5)` point array as flat little-endian f32, row-major.
pub fn write_points_bin(path: &Path, points: &ArrayView2<f32>) -> Result<()> {
    let mut bytes = Vec::with_capacity(points.len() * 4);
    for value in points.iter() {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    fs::write(path, bytes).with_context(|| format!("cannot write point file {}", path.display()))
}

/// Probe the dimensions of an image file without decoding its pixels.
pub fn probe_image_shape(path: &Path) -> Result<ImageShape> {
    let (width, height) = image::image_dimensions(path)
        .with_context(|| format!("cannot probe image {}", path.display()))?;
    Ok(ImageShape {
        height: height as i32,
        width: width as i32,
    })
}

/// Serialize a value into a bincode file.
pub fn save_bincode<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
    bincode::serialize_into(BufWriter::new(file), value)
        .with_context(|| format!("cannot serialize {}", path.display()))
}

/// Deserialize a value from a bincode file.
pub fn load_bincode<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    bincode::deserialize_from(BufReader::new(file))
        .with_context(|| format!("cannot deserialize {}", path.display()))
}

/// Load the optional road plane estimate for one sample.
///
/// The plane normal is flipped to face up in the rectified camera frame
/// and the coefficients are normalized by the normal length. A missing
/// file is not an error; planes only exist for a subset of samples.
pub fn read_road_plane(path: &Path) -> Result<Option<Array1<f32>>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("cannot read road plane file {}", path.display()))?;
    let line = content.lines().nth(3).with_context(|| {
        format!("road plane file {} has fewer than four lines", path.display())
    })?;
    let coefficients = line
        .split_whitespace()
        .map(|value| value.parse::<f32>())
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("road plane file {} holds a non-float value", path.display()))?;
    if coefficients.len() != 4 {
        bail!(
            "road plane file {} expects 4 coefficients, found {}",
            path.display(),
            coefficients.len()
        );
    }
    let mut plane = Array1::from_vec(coefficients);
    if plane[1] > 0. {
        plane.mapv_inplace(|value| -value);
    }
    let normal = plane.slice(s![..3]);
    let norm = normal.dot(&normal).sqrt();
    Ok(Some(plane / norm))
}

#[cfg(test)]
mod tests {
    use ndarray::Array2;

    use super::{
        load_bincode, read_points_bin, read_road_plane, save_bincode, write_points_bin,
    };

    #[test]
    fn test_points_bin_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("points.bin");
        let points = Array2::from_shape_vec(
            (2, 5),
            vec![1., 2., 3., 0.5, 0., -4., -5., -6., 0.25, 1.],
        )
        .unwrap();
        write_points_bin(&path, &points.view()).unwrap();
        let loaded = read_points_bin(&path).unwrap();
        assert_eq!(loaded, points);
    }

    #[test]
    fn test_points_bin_rejects_ragged_payload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ragged.bin");
        std::fs::write(&path, vec![0_u8; 4 * 7]).unwrap();
        assert!(read_points_bin(&path).is_err());
    }

    #[test]
    fn test_bincode_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("values.bin");
        let values: Vec<(String, f32)> = vec![("a".into(), 1.5), ("b".into(), -0.25)];
        save_bincode(&path, &values).unwrap();
        let loaded: Vec<(String, f32)> = load_bincode(&path).unwrap();
        assert_eq!(loaded, values);
    }

    #[test]
    fn test_road_plane_is_normalized_and_faces_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plane.txt");
        std::fs::write(&path, "# plane\nWidth 4\nHeight 1\n0.0 2.0 0.0 -3.4\n").unwrap();
        let plane = read_road_plane(&path).unwrap().unwrap();
        assert!((plane[1] + 1.).abs() < 1e-6);
        assert!((plane[3] - 1.7).abs() < 1e-6);
    }

    #[test]
    fn test_road_plane_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_road_plane(&dir.path().join("missing.txt"))
            .unwrap()
            .is_none());
    }
}
