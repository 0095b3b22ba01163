//! # SO(3)
//!
//! Rotations about the vertical axis, the only rotation family used by the
//! oriented-box yaw convention.

use ndarray::{par_azip, Array, Array2, ArrayView, Ix1, Ix3};

/// Convert a batch of yaw angles to 3x3 rotation matrices.
/// Parallelized for batch processing.
pub fn yaw_to_mat3(yaws_rad: &ArrayView<f32, Ix1>) -> Array<f32, Ix3> {
    let num_yaws = yaws_rad.len();
    let mut mat3 = Array::<f32, Ix3>::zeros((num_yaws, 3, 3));
    par_azip!((mut m in mat3.outer_iter_mut(), y in yaws_rad) {
        m.assign(&_yaw_to_mat3(*y));
    });
    mat3
}

/// Convert a counter-clockwise rotation about the +z axis to a 3x3 rotation matrix.
pub fn _yaw_to_mat3(yaw_rad: f32) -> Array2<f32> {
    let (sin, cos) = yaw_rad.sin_cos();

    // Safety: We will always have nine elements.
    unsafe {
        Array2::from_shape_vec_unchecked(
            [3, 3],
            vec![cos, -sin, 0., sin, cos, 0., 0., 0., 1.],
        )
    }
}

/// Recover the yaw angle from a rotation matrix about the +z axis.
pub fn _mat3_to_yaw(mat3: &ArrayView<f32, ndarray::Ix2>) -> f32 {
    mat3[[1, 0]].atan2(mat3[[0, 0]])
}

#[cfg(test)]
mod tests {
    use std::f32::consts::PI;

    use ndarray::Array1;

    use super::{_mat3_to_yaw, _yaw_to_mat3, yaw_to_mat3};

    #[test]
    fn test_yaw_to_mat3_round_trip() {
        let num_steps = 64;
        let epsilon = 1e-6;
        for k in 0..num_steps {
            let yaw_rad = -PI + 2. * PI * (k as f32 + 0.5) / num_steps as f32;
            let mat3 = _yaw_to_mat3(yaw_rad);
            let _yaw_rad = _mat3_to_yaw(&mat3.view());
            assert!((yaw_rad - _yaw_rad).abs() < epsilon);
        }
    }

    #[test]
    fn test_yaw_to_mat3_batch_matches_scalar() {
        let yaws = Array1::from_vec(vec![0.0, 0.5, -2.4]);
        let mats = yaw_to_mat3(&yaws.view());
        for (mat, &yaw) in mats.outer_iter().zip(yaws.iter()) {
            assert_eq!(mat, _yaw_to_mat3(yaw));
        }
    }

    #[test]
    fn test_quarter_turn_maps_x_to_y() {
        let mat = _yaw_to_mat3(PI / 2.);
        let x = Array1::from_vec(vec![1.0_f32, 0.0, 0.0]);
        let rotated = mat.dot(&x);
        assert!((rotated[0]).abs() < 1e-6);
        assert!((rotated[1] - 1.).abs() < 1e-6);
    }
}
