//! # boxes
//!
//! Conversions between camera-frame annotations and lidar-frame boxes.

use std::f32::consts::FRAC_PI_2;

use ndarray::{concatenate, s, Array, ArrayView, Axis, Ix1, Ix2};

use crate::calibration::Calibration;

/// Convert camera-frame boxes into lidar-frame `(x, y, z, l, w, h, yaw)` rows.
///
/// `locations` are (N,3) bottom-face centers in the rectified camera frame
/// and `dimensions` are (N,3) as `(l, h, w)`. The returned center sits at
/// the geometric centroid (the z coordinate is lifted by `h / 2`), and the
/// yaw is remapped as `-(PI / 2 + rotation_y)` to account for the axis
/// convention change between the two frames.
pub fn boxes_camera_to_lidar(
    locations: &ArrayView<f32, Ix2>,
    dimensions: &ArrayView<f32, Ix2>,
    rotations_y: &ArrayView<f32, Ix1>,
    calib: &Calibration,
) -> Array<f32, Ix2> {
    let num_boxes = locations.shape()[0];
    assert_eq!(
        num_boxes,
        dimensions.shape()[0],
        "locations and dimensions hold a different number of boxes"
    );
    assert_eq!(
        num_boxes,
        rotations_y.len(),
        "locations and rotations hold a different number of boxes"
    );

    let mut loc_lidar = calib.rect_to_lidar(locations);
    let l = dimensions.slice(s![.., 0..1]);
    let h = dimensions.slice(s![.., 1..2]);
    let w = dimensions.slice(s![.., 2..3]);
    {
        // Lift the bottom-face anchor up to the box centroid.
        let mut z = loc_lidar.slice_mut(s![.., 2..3]);
        z += &(&h / 2.);
    }
    let yaws_lidar = rotations_y
        .mapv(|rotation_y| -(FRAC_PI_2 + rotation_y))
        .insert_axis(Axis(1));

    concatenate![Axis(1), loc_lidar, l, w, h, yaws_lidar]
}
