//! # gt_database
//!
//! Ground-truth object database construction. Every labeled object is cut
//! out of its sweep as a box-local point cluster so training-time
//! augmentation can re-insert it into other scenes.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use indicatif::ProgressBar;
use log::info;
use ndarray::{s, Array1, Axis};
use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::info::SampleInfo;
use crate::io;
use crate::label::{Difficulty, ObjectClass};
use crate::geometry::polytope::points_in_boxes;

/// One row of the ground-truth database index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GtObjectRecord {
    /// Object class.
    pub name: ObjectClass,
    /// Cluster file path relative to the dataset root.
    pub path: String,
    /// Source sample identifier.
    pub image_idx: String,
    /// Ordinal of the object within its sample.
    pub gt_idx: usize,
    /// (7,) lidar-frame box.
    pub box3d_lidar: Array1<f32>,
    /// Cluster size after the in-box filter.
    pub num_points_in_gt: usize,
    /// Difficulty bucket.
    pub difficulty: Difficulty,
    /// 2D image box.
    pub bbox: [f32; 4],
    /// Annotation confidence.
    pub score: f32,
}

/// Class-keyed ground-truth database index.
pub type GtDatabaseIndex = BTreeMap<ObjectClass, Vec<GtObjectRecord>>;

/// Build the per-object database for one split's info records.
///
/// Point clusters are recentred on their box before writing, and one
/// cluster file is written for every valid object; the class allow-list
/// only gates entry into the returned index. The index is persisted to
/// `save_path` and returned.
pub fn create_groundtruth_database(
    dataset: &Dataset,
    infos: &[SampleInfo],
    used_classes: Option<&[ObjectClass]>,
    split: &str,
    save_path: &Path,
) -> Result<GtDatabaseIndex> {
    let suffix = dataset.suffix();
    let database_dir_name = if split == "train" {
        format!("gt_database{suffix}")
    } else {
        format!("gt_database_{split}{suffix}")
    };
    let database_dir = dataset.root().join(&database_dir_name);
    fs::create_dir_all(&database_dir)
        .with_context(|| format!("cannot create {}", database_dir.display()))?;

    let mut all_db_infos = GtDatabaseIndex::new();
    let bar = ProgressBar::new(infos.len() as u64);
    for sample_info in infos {
        let sample_idx = &sample_info.point_cloud.lidar_idx;
        let points = io::read_points_bin(&dataset.lidar_path(sample_idx))?;
        let annos = sample_info
            .annos
            .as_ref()
            .with_context(|| format!("info record {sample_idx} has no annotations"))?;
        let gt_boxes = &annos.gt_boxes_lidar;
        let num_obj = gt_boxes.shape()[0];

        let point_indices =
            points_in_boxes(&points.slice(s![.., ..3]), &gt_boxes.view());

        for object_index in 0..num_obj {
            let filename = format!("{}_{}_{}.bin", sample_idx, annos.name[object_index], object_index);
            let filepath = database_dir.join(&filename);

            let interior: Vec<usize> = point_indices
                .row(object_index)
                .iter()
                .enumerate()
                .filter_map(|(point, &inside)| inside.then_some(point))
                .collect();
            let mut gt_points = points.select(Axis(0), &interior);
            {
                // Express the cluster in box-local coordinates.
                let mut xyz = gt_points.slice_mut(s![.., ..3]);
                xyz -= &gt_boxes.slice(s![object_index, ..3]);
            }
            io::write_points_bin(&filepath, &gt_points.view())?;

            if used_classes.map_or(true, |classes| classes.contains(&annos.name[object_index])) {
                let bbox_row = annos.bbox.row(object_index);
                all_db_infos
                    .entry(annos.name[object_index])
                    .or_default()
                    .push(GtObjectRecord {
                        name: annos.name[object_index],
                        path: format!("{database_dir_name}/{filename}"),
                        image_idx: sample_idx.clone(),
                        gt_idx: object_index,
                        box3d_lidar: gt_boxes.row(object_index).to_owned(),
                        num_points_in_gt: gt_points.shape()[0],
                        difficulty: annos.difficulty[object_index],
                        bbox: [bbox_row[0], bbox_row[1], bbox_row[2], bbox_row[3]],
                        score: annos.score[object_index],
                    });
            }
        }
        bar.inc(1);
    }
    bar.finish_and_clear();

    info!("");
    for (class, records) in &all_db_infos {
        info!("{:<12} {}", class.to_string(), records.len());
    }
    info!("");

    let index_path = save_path.join(format!("dense_dbinfos_{split}{suffix}.bin"));
    io::save_bincode(&index_path, &all_db_infos)?;
    Ok(all_db_infos)
}
