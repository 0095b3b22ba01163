//! # SE(3)
//!
//! Special Euclidean Group 3.

use ndarray::{s, Array1, Array2, ArrayView2};

/// Rigid transformation parameterized by a rotation and translation in $R^3$.
#[derive(Clone, Debug)]
pub struct SE3 {
    /// (3,3) Orthonormal rotation matrix.
    pub rotation: Array2<f32>,
    /// (3,) Translation vector.
    pub translation: Array1<f32>,
}

impl SE3 {
    /// Get the (4,4) homogeneous transformation matrix associated with the rigid transformation.
    pub fn transform_matrix(&self) -> Array2<f32> {
        let mut transform_matrix = Array2::eye(4);
        transform_matrix
            .slice_mut(s![..3, ..3])
            .assign(&self.rotation);
        transform_matrix
            .slice_mut(s![..3, 3])
            .assign(&self.translation);
        transform_matrix
    }

    /// Transform the (N,3) point cloud from its reference frame to the SE(3) destination.
    pub fn transform_from(&self, point_cloud: &ArrayView2<f32>) -> Array2<f32> {
        point_cloud.dot(&self.rotation.t()) + &self.translation
    }

    /// Invert the SE(3) transformation.
    pub fn inverse(&self) -> SE3 {
        let rotation = self.rotation.t().as_standard_layout().to_owned();
        let translation = rotation.dot(&(-&self.translation));
        Self {
            rotation,
            translation,
        }
    }

    /// Compose (right multiply) an SE(3) with another SE(3).
    pub fn compose(&self, right_se3: &SE3) -> SE3 {
        let chained_transform_matrix = self.transform_matrix().dot(&right_se3.transform_matrix());
        SE3 {
            rotation: chained_transform_matrix
                .slice(s![..3, ..3])
                .as_standard_layout()
                .to_owned(),
            translation: chained_transform_matrix
                .slice(s![..3, 3])
                .as_standard_layout()
                .to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::AbsDiffEq;
    use ndarray::{Array1, Array2};

    use super::SE3;
    use crate::geometry::so3::_yaw_to_mat3;

    #[test]
    fn test_inverse_round_trip() {
        let transform = SE3 {
            rotation: _yaw_to_mat3(0.7),
            translation: Array1::from_vec(vec![1.0, -2.0, 0.5]),
        };
        let points =
            Array2::from_shape_vec((2, 3), vec![4.0, 1.0, -1.0, -3.0, 2.5, 0.0]).unwrap();
        let transformed = transform.transform_from(&points.view());
        let recovered = transform.inverse().transform_from(&transformed.view());
        assert!(recovered.abs_diff_eq(&points, 1e-5));
    }

    #[test]
    fn test_compose_with_inverse_is_identity() {
        let transform = SE3 {
            rotation: _yaw_to_mat3(-1.2),
            translation: Array1::from_vec(vec![0.3, 8.0, -4.0]),
        };
        let identity = transform.compose(&transform.inverse());
        assert!(identity.transform_matrix().abs_diff_eq(&Array2::eye(4), 1e-5));
    }
}
