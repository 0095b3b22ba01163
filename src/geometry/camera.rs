//! # camera
//!
//! Camera view frustum membership.

use ndarray::{par_azip, Array, ArrayView, Ix1, Ix2};

use crate::calibration::Calibration;
use crate::io::ImageShape;

/// Cull 3D points to the camera view frustum.
///
/// Ref: https://en.wikipedia.org/wiki/Hidden-surface_determination#Viewing-frustum_culling
///
/// A rectified-camera-frame point is in view iff its projected column lies
/// in `[0, width)`, its row lies in `[0, height)` and its rectified-frame
/// depth is non-negative. All four conditions are combined without any
/// tolerance.
pub fn compute_fov_mask(
    pts_rect: &ArrayView<f32, Ix2>,
    image_shape: ImageShape,
    calib: &Calibration,
) -> Array<bool, Ix1> {
    let (pts_img, pts_rect_depth) = calib.rect_to_img(pts_rect);
    cull_to_view_frustum(&pts_img.view(), &pts_rect_depth.view(), image_shape)
}

/// Flag the projected points with a valid image-plane position and depth.
pub fn cull_to_view_frustum(
    pts_img: &ArrayView<f32, Ix2>,
    depths: &ArrayView<f32, Ix1>,
    image_shape: ImageShape,
) -> Array<bool, Ix1> {
    let num_points = pts_img.shape()[0];
    let width = image_shape.width as f32;
    let height = image_shape.height as f32;
    let mut is_within_frustum = Array::<bool, Ix1>::from_vec(vec![false; num_points]);
    par_azip!((flag in &mut is_within_frustum, uv in pts_img.outer_iter(), depth in depths) {
        let is_within_frustum_x = (uv[0] >= 0.) && (uv[0] < width);
        let is_within_frustum_y = (uv[1] >= 0.) && (uv[1] < height);
        *flag = is_within_frustum_x & is_within_frustum_y & (*depth >= 0.);
    });
    is_within_frustum
}

#[cfg(test)]
mod tests {
    use ndarray::{Array1, Array2};

    use super::{compute_fov_mask, cull_to_view_frustum};
    use crate::io::ImageShape;
    use crate::testing::test_calibration;

    const SHAPE: ImageShape = ImageShape {
        height: 3,
        width: 4,
    };

    #[test]
    fn test_boundaries_are_half_open() {
        let pts_img = Array2::from_shape_vec(
            (4, 2),
            vec![
                0., 0., // inclusive lower corner
                3.99, 2.99, // just inside the exclusive corner
                4., 1., // column == width
                1., 3., // row == height
            ],
        )
        .unwrap();
        let depths = Array1::from_vec(vec![1., 1., 1., 1.]);
        let mask = cull_to_view_frustum(&pts_img.view(), &depths.view(), SHAPE);
        assert_eq!(mask.to_vec(), vec![true, true, false, false]);
    }

    #[test]
    fn test_zero_depth_is_in_view() {
        let pts_img = Array2::from_shape_vec((2, 2), vec![1., 1., 1., 1.]).unwrap();
        let depths = Array1::from_vec(vec![0., -0.01]);
        let mask = cull_to_view_frustum(&pts_img.view(), &depths.view(), SHAPE);
        assert_eq!(mask.to_vec(), vec![true, false]);
    }

    #[test]
    fn test_empty_points_yield_empty_mask() {
        let calib = test_calibration();
        let pts_rect = Array2::<f32>::zeros((0, 3));
        let mask = compute_fov_mask(&pts_rect.view(), SHAPE, &calib);
        assert_eq!(mask.len(), 0);
    }

    #[test]
    fn test_point_behind_camera_is_out_of_view() {
        let calib = test_calibration();
        let pts_rect = Array2::from_shape_vec((2, 3), vec![0., 0., 5., 0., 0., -5.]).unwrap();
        let mask = compute_fov_mask(&pts_rect.view(), SHAPE, &calib);
        assert!(mask[0]);
        assert!(!mask[1]);
    }
}
