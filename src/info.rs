//! # info
//!
//! Per-sample info records and the batched info compiler.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use indicatif::ProgressBar;
use log::{debug, error, warn};
use ndarray::{s, Array1, Array2, ArrayView, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::calibration::Calibration;
use crate::constants::LIDAR_NUM_FEATURES;
use crate::dataset::Dataset;
use crate::geometry::boxes::boxes_camera_to_lidar;
use crate::geometry::camera::compute_fov_mask;
use crate::geometry::polytope::points_in_boxes;
use crate::io::{self, ImageShape};
use crate::label::{self, Difficulty, Object3d, ObjectClass};
use crate::path::decompose_sample_id;

/// Point-cloud metadata for one sample.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PointCloudInfo {
    /// Features per point.
    pub num_features: usize,
    /// Sample identifier the point file is keyed by.
    pub lidar_idx: String,
}

/// Image metadata for one sample.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageInfo {
    /// Sample identifier the image is keyed by.
    pub image_idx: String,
    /// Probed image extent.
    pub image_shape: ImageShape,
    /// Image path relative to the dataset root.
    pub image_path: String,
}

/// Fixed-schema annotation record. Every column holds one entry per
/// annotated object; valid objects come first and DontCare placeholder
/// rows are appended after them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Annotations {
    /// Remapped class per object.
    pub name: Vec<ObjectClass>,
    /// Truncation ratio per object.
    pub truncated: Vec<f32>,
    /// Occlusion level per object.
    pub occluded: Vec<f32>,
    /// Observation angle per object.
    pub alpha: Vec<f32>,
    /// (N,4) 2D image boxes.
    pub bbox: Array2<f32>,
    /// (N,3) 3D dimensions as `(l, h, w)`.
    pub dimensions: Array2<f32>,
    /// (N,3) camera-frame bottom-face centers.
    pub location: Array2<f32>,
    /// Rotation about the camera y axis per object.
    pub rotation_y: Vec<f32>,
    /// Annotation confidence per object.
    pub score: Vec<f32>,
    /// Difficulty bucket per object.
    pub difficulty: Vec<Difficulty>,
    /// Ordinal among valid objects, `-1` for DontCare placeholder rows.
    pub index: Vec<i32>,
    /// (num_valid,7) lidar-frame boxes for the valid objects.
    pub gt_boxes_lidar: Array2<f32>,
    /// Enclosed point count per object, `-1` where never counted.
    pub num_points_in_gt: Vec<i32>,
}

impl Annotations {
    /// Build the record from parsed objects.
    ///
    /// The slice must keep valid objects first with DontCare rows appended,
    /// which is the order the label parser emits.
    pub fn from_objects(objects: &[Object3d], calib: &Calibration) -> Annotations {
        let num_gt = objects.len();
        let num_objects = objects
            .iter()
            .filter(|object| object.class != ObjectClass::DontCare)
            .count();

        let mut bbox = Array2::<f32>::zeros((num_gt, 4));
        let mut dimensions = Array2::<f32>::zeros((num_gt, 3));
        let mut location = Array2::<f32>::zeros((num_gt, 3));
        for (row, object) in objects.iter().enumerate() {
            bbox.row_mut(row).assign(&ArrayView::from(&object.box2d[..]));
            dimensions.row_mut(row).assign(&ArrayView::from(
                &[object.length, object.height, object.width][..],
            ));
            location
                .row_mut(row)
                .assign(&ArrayView::from(&object.location[..]));
        }

        let index: Vec<i32> = (0..num_objects as i32)
            .chain(std::iter::repeat(-1).take(num_gt - num_objects))
            .collect();

        let loc = location.slice(s![..num_objects, ..]);
        let dims = dimensions.slice(s![..num_objects, ..]);
        let rots =
            Array1::from_iter(objects[..num_objects].iter().map(|object| object.rotation_y));
        let gt_boxes_lidar = boxes_camera_to_lidar(&loc, &dims, &rots.view(), calib);

        Annotations {
            name: objects.iter().map(|object| object.class).collect(),
            truncated: objects.iter().map(|object| object.truncation).collect(),
            occluded: objects.iter().map(|object| object.occlusion).collect(),
            alpha: objects.iter().map(|object| object.alpha).collect(),
            bbox,
            dimensions,
            location,
            rotation_y: objects.iter().map(|object| object.rotation_y).collect(),
            score: objects.iter().map(|object| object.score).collect(),
            difficulty: objects.iter().map(|object| object.difficulty).collect(),
            index,
            gt_boxes_lidar,
            num_points_in_gt: vec![-1; num_gt],
        }
    }

    /// Object count including placeholder rows.
    pub fn len(&self) -> usize {
        self.name.len()
    }

    /// Whether the record holds no objects at all.
    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }

    /// Count of valid (non-DontCare) objects.
    pub fn num_valid(&self) -> usize {
        self.index.iter().filter(|&&index| index >= 0).count()
    }
}

/// Aggregate record for one sample.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SampleInfo {
    /// Point-cloud metadata.
    pub point_cloud: PointCloudInfo,
    /// Image metadata.
    pub image: ImageInfo,
    /// Calibration snapshot.
    pub calib: Calibration,
    /// Annotation record, absent for unlabeled compilations.
    pub annos: Option<Annotations>,
}

/// Tolerated per-sample rejection reasons.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
    /// The label source contained no usable 3D annotation.
    NoUsableAnnotations,
    /// A sensor-dependent file was absent for this capture configuration.
    MissingSensorFile,
}

/// Outcome of building one sample. The two tolerated failure modes are
/// values; anything else propagates as an error and aborts the batch.
#[derive(Debug)]
pub enum SampleOutcome {
    /// The sample produced a complete info record.
    Accepted(Box<SampleInfo>),
    /// The sample was dropped; the builder already logged the reason.
    Rejected(RejectReason),
}

/// Options controlling the info compiler.
#[derive(Clone, Copy, Debug)]
pub struct InfoOptions {
    /// Parse and attach annotations.
    pub has_label: bool,
    /// Compute FOV membership and per-object enclosed point counts.
    pub count_inside_pts: bool,
    /// Worker pool size; `0` uses one worker per available core.
    pub num_workers: usize,
}

impl Default for InfoOptions {
    fn default() -> Self {
        Self {
            has_label: true,
            count_inside_pts: true,
            num_workers: 0,
        }
    }
}

/// Build the info record for one sample, or reject it.
pub fn build_sample_info(
    dataset: &Dataset,
    sample_id: &str,
    options: &InfoOptions,
) -> Result<SampleOutcome> {
    let calib = dataset.calib();
    let image_shape = io::probe_image_shape(&dataset.image_path(sample_id))?;
    let point_cloud = PointCloudInfo {
        num_features: LIDAR_NUM_FEATURES,
        lidar_idx: sample_id.to_string(),
    };
    let image = ImageInfo {
        image_idx: sample_id.to_string(),
        image_shape,
        image_path: dataset.image_rel_path(sample_id),
    };

    let mut annos = None;
    if options.has_label {
        let label_path = dataset.label_path(sample_id);
        if !label_path.exists() {
            error!(
                "{} is missing its label file {}",
                decompose_sample_id(sample_id),
                label_path.display()
            );
            return Ok(SampleOutcome::Rejected(RejectReason::MissingSensorFile));
        }
        let objects = match label::objects_from_label(&label_path) {
            Ok((objects, _counts)) => objects,
            Err(parse_error) => {
                warn!(
                    "{} does not contain any relevant LiDAR labels: {parse_error:#}",
                    decompose_sample_id(sample_id)
                );
                return Ok(SampleOutcome::Rejected(RejectReason::NoUsableAnnotations));
            }
        };
        let num_valid = objects
            .iter()
            .filter(|object| object.class != ObjectClass::DontCare)
            .count();
        if num_valid == 0 {
            warn!(
                "{} does not contain any relevant LiDAR labels",
                decompose_sample_id(sample_id)
            );
            return Ok(SampleOutcome::Rejected(RejectReason::NoUsableAnnotations));
        }

        let mut annotations = Annotations::from_objects(&objects, calib);

        if options.count_inside_pts {
            let lidar_path = dataset.lidar_path(sample_id);
            if !lidar_path.exists() {
                // Sparse auxiliary-sensor coverage: some captures never
                // recorded this frame.
                error!(
                    "{} is missing its lidar frame {}",
                    decompose_sample_id(sample_id),
                    lidar_path.display()
                );
                return Ok(SampleOutcome::Rejected(RejectReason::MissingSensorFile));
            }
            let points = io::read_points_bin(&lidar_path)?;
            let pts_rect = calib.lidar_to_rect(&points.slice(s![.., ..3]));
            let fov_mask = compute_fov_mask(&pts_rect.view(), image_shape, calib);

            // A frame without a single point in the camera FOV points at a
            // sensor or calibration anomaly; it stays in the output.
            if !fov_mask.iter().any(|&in_view| in_view) {
                error!(
                    "split: {}, sample: {} does not have any points inside the camera FOV",
                    dataset.split(),
                    decompose_sample_id(sample_id)
                );
            }

            let fov_indices: Vec<usize> = fov_mask
                .iter()
                .enumerate()
                .filter_map(|(index, &in_view)| in_view.then_some(index))
                .collect();
            let pts_fov = points.select(Axis(0), &fov_indices);
            let interior_mask = points_in_boxes(
                &pts_fov.slice(s![.., ..3]),
                &annotations.gt_boxes_lidar.view(),
            );
            for object_index in 0..num_valid {
                let count = interior_mask
                    .row(object_index)
                    .iter()
                    .filter(|&&inside| inside)
                    .count();
                annotations.num_points_in_gt[object_index] = count as i32;
                if count == 0 {
                    debug!(
                        "{} contains a label without a single point inside",
                        decompose_sample_id(sample_id)
                    );
                }
            }
        }
        annos = Some(annotations);
    }

    Ok(SampleOutcome::Accepted(Box::new(SampleInfo {
        point_cloud,
        image,
        calib: calib.clone(),
        annos,
    })))
}

/// Compile info records for every sample id of the dataset's split.
///
/// Samples are processed task-parallel with no ordering dependency between
/// tasks; rejected samples are dropped here after the builder already
/// logged them, and any other failure aborts the whole batch.
pub fn compile_infos(dataset: &Dataset, options: &InfoOptions) -> Result<Vec<SampleInfo>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.num_workers)
        .build()
        .context("cannot build the info worker pool")?;

    let sample_ids = dataset.sample_ids();
    let bar = ProgressBar::new(sample_ids.len() as u64);
    let outcomes: Vec<SampleOutcome> = pool.install(|| {
        sample_ids
            .par_iter()
            .map(|sample_id| {
                let outcome = build_sample_info(dataset, sample_id, options);
                bar.inc(1);
                outcome
            })
            .collect::<Result<Vec<_>>>()
    })?;
    bar.finish_and_clear();

    let infos: Vec<SampleInfo> = outcomes
        .into_iter()
        .filter_map(|outcome| match outcome {
            SampleOutcome::Accepted(info) => Some(*info),
            SampleOutcome::Rejected(_) => None,
        })
        .collect();

    if options.has_label {
        log_statistics(&annotation_statistics(&infos));
    }
    Ok(infos)
}

/// Per-class aggregates over the accepted samples of one compilation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClassStatistics {
    /// Objects per class.
    pub object_counts: BTreeMap<ObjectClass, usize>,
    /// Cumulative enclosed points per class.
    pub point_counts: BTreeMap<ObjectClass, i64>,
    /// Objects with at most 10 enclosed points per class.
    pub max_10_counts: BTreeMap<ObjectClass, usize>,
    /// Objects with at most 5 enclosed points per class.
    pub max_5_counts: BTreeMap<ObjectClass, usize>,
    /// Objects without a single enclosed point per class.
    pub zero_counts: BTreeMap<ObjectClass, usize>,
}

/// Derive the per-class statistics from an accepted info set.
/// Placeholder rows never enter the aggregates.
pub fn annotation_statistics(infos: &[SampleInfo]) -> ClassStatistics {
    let mut statistics = ClassStatistics::default();
    for info in infos {
        let Some(annos) = &info.annos else { continue };
        for row in 0..annos.len() {
            if annos.index[row] < 0 {
                continue;
            }
            let name = annos.name[row];
            let points = annos.num_points_in_gt[row];
            *statistics.object_counts.entry(name).or_default() += 1;
            *statistics.point_counts.entry(name).or_default() += points as i64;
            if points <= 10 {
                *statistics.max_10_counts.entry(name).or_default() += 1;
                if points <= 5 {
                    *statistics.max_5_counts.entry(name).or_default() += 1;
                    if points == 0 {
                        *statistics.zero_counts.entry(name).or_default() += 1;
                    }
                }
            }
        }
    }
    statistics
}

fn log_statistics(statistics: &ClassStatistics) {
    debug!("");
    debug!("Class distribution");
    debug!("==================");
    for (class, count) in &statistics.object_counts {
        debug!("{:<12} {count}", class.to_string());
    }

    debug!("");
    debug!("Points distribution");
    debug!("===================");
    for (class, count) in &statistics.point_counts {
        debug!("{:<12} {count}", class.to_string());
    }

    debug!("====== Max 10 points");
    for (class, count) in &statistics.max_10_counts {
        debug!("{:<12} {count}", class.to_string());
    }
    debug!("====== Max 5 points");
    for (class, count) in &statistics.max_5_counts {
        debug!("{:<12} {count}", class.to_string());
    }
    debug!("====== 0 points");
    for (class, count) in &statistics.zero_counts {
        debug!("{:<12} {count}", class.to_string());
    }

    debug!("");
    debug!("Average # of points");
    debug!("===================");
    for (class, points) in &statistics.point_counts {
        let objects = statistics.object_counts[class] as f32;
        debug!("{:<12} {:.0}", class.to_string(), *points as f32 / objects);
    }
    debug!("");
}
