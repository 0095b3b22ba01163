//! # polytope
//!
//! Point-in-box tests for oriented box geometries.

use ndarray::{concatenate, par_azip, s, Array, ArrayView, Axis, Ix1, Ix2, Ix3, Slice};
use once_cell::sync::Lazy;

use super::so3::_yaw_to_mat3;

// Safety: 24 elements (8 * 3 = 24) are defined.
static VERTS: Lazy<Array<f32, Ix2>> = Lazy::new(|| unsafe {
    Array::<f32, Ix2>::from_shape_vec_unchecked(
        (8, 3),
        vec![
            1., 1., 1., 1., -1., 1., 1., -1., -1., 1., 1., -1., -1., 1., 1., -1., -1., 1., -1.,
            -1., -1., -1., 1., -1.,
        ],
    )
});

/// Compute a boolean mask indicating which points fall inside each oriented box.
///
/// `points` is (N,3) and `boxes` is (M,7) as (x, y, z, l, w, h, yaw); the
/// result is (M,N). Empty inputs yield empty masks.
pub fn points_in_boxes(
    points: &ArrayView<f32, Ix2>,
    boxes: &ArrayView<f32, Ix2>,
) -> Array<bool, Ix2> {
    assert_eq!(
        points.shape()[1],
        3,
        "points must be (N,3), found {:?}",
        points.shape()
    );
    assert_eq!(
        boxes.shape()[1],
        7,
        "boxes must be (M,7), found {:?}",
        boxes.shape()
    );
    let corners = boxes_to_corners_3d(boxes);
    compute_interior_points_mask(points, &corners.view())
}

/// Compute a boolean mask indicating which points are interior to the box geometry.
pub fn compute_interior_points_mask(
    points: &ArrayView<f32, Ix2>,
    box_vertices: &ArrayView<f32, Ix3>,
) -> Array<bool, Ix2> {
    let num_points = points.shape()[0];
    let num_boxes = box_vertices.shape()[0];

    let a = box_vertices.slice_axis(Axis(1), Slice::from(6..7));
    let b = box_vertices.slice_axis(Axis(1), Slice::from(3..4));
    let c = box_vertices.slice_axis(Axis(1), Slice::from(1..2));
    let vertices = concatenate![Axis(1), a, b, c];

    let reference_index = box_vertices
        .slice_axis(Axis(1), Slice::from(2..3))
        .to_owned();

    let uvw = reference_index.clone() - vertices.clone();
    let reference_index = reference_index.into_shape((num_boxes, 3)).unwrap();

    let mut dot_uvw_reference = Array::<f32, Ix2>::zeros((num_boxes, 3));
    par_azip!((mut a in dot_uvw_reference.outer_iter_mut(), b in uvw.outer_iter(), c in reference_index.outer_iter()) a.assign(&b.dot(&c.t())) );

    let mut dot_uvw_vertices = Array::<f32, Ix2>::zeros((num_boxes, 3));
    par_azip!((mut a in dot_uvw_vertices.outer_iter_mut(), b in uvw.outer_iter(), c in vertices.outer_iter()) a.assign(&b.dot(&c.t()).diag()) );

    let dot_uvw_points = uvw
        .into_shape((num_boxes * 3, 3))
        .unwrap()
        .as_standard_layout()
        .dot(&points.t().as_standard_layout())
        .into_shape((num_boxes, 3, num_points))
        .unwrap();

    let shape = (num_boxes, num_points);
    let mut is_interior =
        Array::<_, Ix2>::from_shape_vec(shape, vec![false; num_boxes * num_points]).unwrap();
    par_azip!((mut a in is_interior.outer_iter_mut(), b in dot_uvw_reference.outer_iter(), c in dot_uvw_points.outer_iter(), d in dot_uvw_vertices.outer_iter()) {

        let c0 = c.slice(s![0, ..]).mapv(|x| ((b[0] <= x) & (x <= d[0])) | ((b[0] >= x) & (x >= d[0])));
        let c1 = c.slice(s![1, ..]).mapv(|x| ((b[1] <= x) & (x <= d[1])) | ((b[1] >= x) & (x >= d[1])));
        let c2 = c.slice(s![2, ..]).mapv(|x| ((b[2] <= x) & (x <= d[2])) | ((b[2] >= x) & (x >= d[2])));

        let is_interior_i = &c0 & &c1 & &c2;
        a.assign(&is_interior_i);
    });

    is_interior
}

/// Convert (N,7) oriented boxes to their (N,8,3) corner points.
///
/// Corners follow the `VERTS` winding: the four `+x` face corners
/// `(+,+,+), (+,-,+), (+,-,-), (+,+,-)` first, then the `-x` face in the
/// same order. The interior test above indexes this order.
pub fn boxes_to_corners_3d(boxes: &ArrayView<f32, Ix2>) -> Array<f32, Ix3> {
    let num_boxes = boxes.shape()[0];
    let mut corners = Array::<f32, Ix3>::zeros([num_boxes, 8, 3]);
    par_azip!((mut c in corners.outer_iter_mut(), b in boxes.outer_iter()) {
        c.assign(&_box_to_corners_3d(&b))
    });
    corners
}

/// Convert a single oriented box to its corner points.
fn _box_to_corners_3d(box_lidar: &ArrayView<f32, Ix1>) -> Array<f32, Ix2> {
    let center_xyz = box_lidar.slice(s![0..3]);
    let dims_lwh = box_lidar.slice(s![3..6]);
    let mat = _yaw_to_mat3(box_lidar[6]);
    let verts = &VERTS.clone() * &dims_lwh / 2.;
    let verts = verts.dot(&mat.t()) + center_xyz;
    verts.as_standard_layout().to_owned()
}
