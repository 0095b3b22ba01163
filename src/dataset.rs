//! # dataset
//!
//! Split-addressable access to the DENSE recordings.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glob::glob;
use itertools::Itertools;
use log::info;
use ndarray::{Array1, Array2, Axis};

use crate::calibration::{calib_path, Calibration};
use crate::constants::{
    lidar_folder, SensorType, SignalType, CAMERA_FOLDER, LABEL_FOLDER, PLANE_FOLDER, SPLIT_FOLDER,
};
use crate::gt_database::GtDatabaseIndex;
use crate::info::{Annotations, SampleInfo};
use crate::io::{self, ImageShape};
use crate::label::ObjectClass;
use crate::path::{extract_file_stem, normalize_split_line};

/// Configuration for one dataset instance.
#[derive(Clone, Debug)]
pub struct DatasetConfig {
    /// Root directory of the extracted recordings.
    pub root: PathBuf,
    /// Range sensor the point files were captured with.
    pub sensor_type: SensorType,
    /// Echo signal variant of the point files.
    pub signal_type: SignalType,
    /// Active split name.
    pub split: String,
    /// Opt-in policy removing objects without a single enclosed point
    /// from yielded samples. Requires infos with counted occupancy.
    pub drop_empty_annotations: bool,
}

/// Ground-truth annotation view of one yielded sample, placeholder rows
/// already removed.
#[derive(Clone, Debug)]
pub struct SampleAnnotations {
    /// Class per valid object.
    pub names: Vec<ObjectClass>,
    /// (N,7) lidar-frame boxes.
    pub boxes: Array2<f32>,
    /// Enclosed point count per valid object.
    pub num_points_in_gt: Vec<i32>,
}

/// One training-ready sample.
#[derive(Clone, Debug)]
pub struct Sample {
    /// Sample identifier.
    pub frame_id: String,
    /// (N,5) raw lidar returns.
    pub points: Array2<f32>,
    /// Calibration snapshot shared by every sample of the instance.
    pub calib: Calibration,
    /// Probed image extent.
    pub image_shape: ImageShape,
    /// Ground-truth boxes, absent for unlabeled splits.
    pub annotations: Option<SampleAnnotations>,
    /// Optional road plane estimate.
    pub road_plane: Option<Array1<f32>>,
}

/// External evaluator contract; metric computation is delegated.
pub trait DetectionEvaluator {
    /// Evaluate predicted annotation sets against the ground truth,
    /// returning a textual report plus a name-to-metric mapping.
    fn evaluate(
        &self,
        gt_annos: &[Annotations],
        det_annos: &[Annotations],
    ) -> (String, HashMap<String, f32>);
}

/// Split-bound view over the dataset tree.
pub struct Dataset {
    config: DatasetConfig,
    calib: Calibration,
    sample_ids: Vec<String>,
    infos: Vec<SampleInfo>,
    current_index: usize,
}

impl Dataset {
    /// Open the dataset tree and resolve the configured split.
    pub fn new(config: DatasetConfig) -> Result<Dataset> {
        let calib = Calibration::from_file(&calib_path(&config.root, config.sensor_type))?;
        let sample_ids = resolve_sample_ids(&config)?;
        Ok(Dataset {
            config,
            calib,
            sample_ids,
            infos: Vec::new(),
            current_index: 0,
        })
    }

    /// Dataset root directory.
    pub fn root(&self) -> &Path {
        &self.config.root
    }

    /// Active split name.
    pub fn split(&self) -> &str {
        &self.config.split
    }

    /// Sensor-dependent artifact name suffix.
    pub fn suffix(&self) -> &'static str {
        self.config.sensor_type.suffix()
    }

    /// Shared read-only calibration record.
    pub fn calib(&self) -> &Calibration {
        &self.calib
    }

    /// Sample identifiers of the active split.
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Loaded info records.
    pub fn infos(&self) -> &[SampleInfo] {
        &self.infos
    }

    /// Return the number of loaded info records.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    /// Returns `true` if no info records are loaded.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    /// Raw point file path for one sample.
    pub fn lidar_path(&self, sample_id: &str) -> PathBuf {
        self.config
            .root
            .join(lidar_folder(self.config.sensor_type, self.config.signal_type))
            .join(format!("{sample_id}.bin"))
    }

    /// Camera image path for one sample.
    pub fn image_path(&self, sample_id: &str) -> PathBuf {
        self.config.root.join(self.image_rel_path(sample_id))
    }

    /// Camera image path relative to the dataset root.
    pub fn image_rel_path(&self, sample_id: &str) -> String {
        format!("{CAMERA_FOLDER}/{sample_id}.png")
    }

    /// Label file path for one sample.
    pub fn label_path(&self, sample_id: &str) -> PathBuf {
        self.config
            .root
            .join(LABEL_FOLDER)
            .join(format!("{sample_id}.txt"))
    }

    /// Road plane file path for one sample.
    pub fn plane_path(&self, sample_id: &str) -> PathBuf {
        self.config
            .root
            .join(PLANE_FOLDER)
            .join(format!("{sample_id}.txt"))
    }

    /// Re-bind the instance to another split, clearing loaded infos.
    pub fn set_split(&mut self, split: &str) -> Result<()> {
        self.config.split = split.to_string();
        self.sample_ids = resolve_sample_ids(&self.config)?;
        self.infos.clear();
        self.current_index = 0;
        Ok(())
    }

    /// Load and append every existing info index file of the given paths.
    pub fn include_infos(&mut self, info_paths: &[PathBuf]) -> Result<()> {
        info!("Loading DENSE dataset");
        let mut loaded = 0;
        for info_path in info_paths {
            if !info_path.exists() {
                continue;
            }
            let infos: Vec<SampleInfo> = io::load_bincode(info_path)?;
            loaded += infos.len();
            self.infos.extend(infos);
        }
        info!("Total samples for DENSE dataset: {loaded}");
        Ok(())
    }

    /// Yield the sample at `index`.
    pub fn get(&self, index: usize) -> Result<Sample> {
        let sample_info = self
            .infos
            .get(index)
            .with_context(|| format!("sample index {index} out of range"))?;
        let sample_id = &sample_info.point_cloud.lidar_idx;
        let points = io::read_points_bin(&self.lidar_path(sample_id))?;
        let road_plane = io::read_road_plane(&self.plane_path(sample_id))?;

        let annotations = sample_info.annos.as_ref().map(|annos| {
            let num_valid = annos.num_valid();
            let names: Vec<ObjectClass> = annos.name[..num_valid].to_vec();
            let counts: Vec<i32> = annos.num_points_in_gt[..num_valid].to_vec();
            let boxes = annos.gt_boxes_lidar.clone();
            if self.config.drop_empty_annotations {
                let kept: Vec<usize> = counts
                    .iter()
                    .enumerate()
                    .filter_map(|(row, &count)| (count > 0).then_some(row))
                    .collect();
                SampleAnnotations {
                    names: kept.iter().map(|&row| names[row]).collect(),
                    boxes: boxes.select(Axis(0), &kept),
                    num_points_in_gt: kept.iter().map(|&row| counts[row]).collect(),
                }
            } else {
                SampleAnnotations {
                    names,
                    boxes,
                    num_points_in_gt: counts,
                }
            }
        });

        Ok(Sample {
            frame_id: sample_id.clone(),
            points,
            calib: self.calib.clone(),
            image_shape: sample_info.image.image_shape,
            annotations,
            road_plane,
        })
    }

    /// Run an external evaluator over the loaded ground truth.
    /// Returns `None` when the instance carries no annotations.
    pub fn evaluation(
        &self,
        evaluator: &dyn DetectionEvaluator,
        det_annos: &[Annotations],
    ) -> Option<(String, HashMap<String, f32>)> {
        let gt_annos: Vec<Annotations> = self
            .infos
            .iter()
            .filter_map(|info| info.annos.clone())
            .collect();
        if gt_annos.is_empty() {
            return None;
        }
        Some(evaluator.evaluate(&gt_annos, det_annos))
    }
}

impl Iterator for Dataset {
    type Item = Result<Sample>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_index >= self.infos.len() {
            return None;
        }
        let sample = self.get(self.current_index);
        self.current_index += 1;
        Some(sample)
    }
}

/// Resolve the split's sample identifiers.
///
/// Prefers the split membership file; without one, every frame of the
/// lidar folder belongs to the split.
fn resolve_sample_ids(config: &DatasetConfig) -> Result<Vec<String>> {
    let suffix = config.sensor_type.suffix();
    let split_file = config
        .root
        .join(SPLIT_FOLDER)
        .join(format!("{}{suffix}.txt", config.split));
    if split_file.exists() {
        let content = fs::read_to_string(&split_file)
            .with_context(|| format!("cannot read split file {}", split_file.display()))?;
        return Ok(content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(normalize_split_line)
            .collect());
    }

    let pattern = config
        .root
        .join(lidar_folder(config.sensor_type, config.signal_type))
        .join("*.bin");
    let paths = glob(pattern.to_str().context("non-UTF-8 dataset root")?)
        .context("Failed to read glob pattern.")?
        .filter_map(|path| path.ok())
        .collect_vec();
    paths
        .iter()
        .map(|path| extract_file_stem(path))
        .collect::<Result<Vec<_>>>()
        .map(|stems| stems.into_iter().sorted().collect())
}

/// Concatenate two per-split info index files into a merged index file.
pub fn merge_info_files(day: &Path, night: &Path, merged: &Path) -> Result<()> {
    let mut infos: Vec<SampleInfo> = io::load_bincode(day)?;
    let night_infos: Vec<SampleInfo> = io::load_bincode(night)?;
    infos.extend(night_infos);
    io::save_bincode(merged, &infos)
}

/// Merge two ground-truth database index files class by class.
pub fn merge_db_index_files(day: &Path, night: &Path, merged: &Path) -> Result<()> {
    let mut index: GtDatabaseIndex = io::load_bincode(day)?;
    let night_index: GtDatabaseIndex = io::load_bincode(night)?;
    for (class, records) in night_index {
        index.entry(class).or_default().extend(records);
    }
    io::save_bincode(merged, &index)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{merge_info_files, Dataset, DetectionEvaluator};
    use crate::info::{compile_infos, Annotations, InfoOptions, SampleInfo};
    use crate::io;
    use crate::label::ObjectClass;
    use crate::testing::{self, FixtureTree};

    fn dataset_with_infos(tree: &FixtureTree) -> Dataset {
        let mut dataset = Dataset::new(tree.config()).unwrap();
        let infos = compile_infos(&dataset, &InfoOptions::default()).unwrap();
        let index_path = tree.root().join("dense_infos_test.bin");
        io::save_bincode(&index_path, &infos).unwrap();
        dataset.include_infos(&[index_path]).unwrap();
        dataset
    }

    #[test]
    fn test_split_membership_is_normalized() {
        let tree = testing::fixture_tree_with_sample("train_clear_day");
        let dataset = Dataset::new(tree.config()).unwrap();
        assert_eq!(dataset.sample_ids().to_vec(), vec![testing::SAMPLE_ID.to_string()]);
    }

    #[test]
    fn test_missing_split_file_falls_back_to_lidar_folder() {
        let tree = testing::fixture_tree_with_sample("train_clear_day");
        let mut config = tree.config();
        config.split = "val_clear_day".to_string();
        let dataset = Dataset::new(config).unwrap();
        assert_eq!(dataset.sample_ids().to_vec(), vec![testing::SAMPLE_ID.to_string()]);
    }

    #[test]
    fn test_get_yields_points_and_valid_annotations() {
        let tree = testing::fixture_tree_with_sample("train_clear_day");
        let dataset = dataset_with_infos(&tree);
        assert_eq!(dataset.len(), 1);

        let sample = dataset.get(0).unwrap();
        assert_eq!(sample.frame_id, testing::SAMPLE_ID);
        assert_eq!(sample.points.shape(), &[5, 5]);
        assert_eq!(sample.image_shape.width, 4);
        assert!(sample.road_plane.is_none());

        let annotations = sample.annotations.unwrap();
        // The DontCare placeholder never reaches the training consumer.
        assert_eq!(
            annotations.names,
            vec![ObjectClass::Car, ObjectClass::Pedestrian]
        );
        assert_eq!(annotations.boxes.shape(), &[2, 7]);
    }

    #[test]
    fn test_drop_empty_annotations_policy() {
        let tree = testing::fixture_tree_with_sample("train_clear_day");
        tree.add_fov_dropout_sample("2018-02-06_14-25-51_00213");
        let mut config = tree.config();
        config.drop_empty_annotations = true;

        let mut dataset = Dataset::new(config).unwrap();
        let infos = compile_infos(&dataset, &InfoOptions::default()).unwrap();
        let index_path = tree.root().join("dense_infos_test.bin");
        io::save_bincode(&index_path, &infos).unwrap();
        dataset.include_infos(&[index_path]).unwrap();

        let dropout_index = dataset
            .infos()
            .iter()
            .position(|info| info.point_cloud.lidar_idx == "2018-02-06_14-25-51_00213")
            .unwrap();
        let sample = dataset.get(dropout_index).unwrap();
        let annotations = sample.annotations.unwrap();
        assert!(annotations.names.is_empty());
        assert_eq!(annotations.boxes.shape(), &[0, 7]);
    }

    #[test]
    fn test_iterator_visits_every_info() {
        let tree = testing::fixture_tree_with_sample("train_clear_day");
        let dataset = dataset_with_infos(&tree);
        let samples: Vec<_> = dataset.map(|sample| sample.unwrap()).collect();
        assert_eq!(samples.len(), 1);
    }

    #[test]
    fn test_merge_info_files_concatenates() {
        let tree = testing::fixture_tree_with_sample("train_clear_day");
        let dataset = Dataset::new(tree.config()).unwrap();
        let infos = compile_infos(&dataset, &InfoOptions::default()).unwrap();

        let day = tree.root().join("day.bin");
        let night = tree.root().join("night.bin");
        let merged = tree.root().join("merged.bin");
        io::save_bincode(&day, &infos).unwrap();
        io::save_bincode(&night, &infos).unwrap();
        merge_info_files(&day, &night, &merged).unwrap();
        let loaded: Vec<SampleInfo> = io::load_bincode(&merged).unwrap();
        assert_eq!(loaded.len(), 2 * infos.len());
    }

    struct CountingEvaluator;

    impl DetectionEvaluator for CountingEvaluator {
        fn evaluate(
            &self,
            gt_annos: &[Annotations],
            det_annos: &[Annotations],
        ) -> (String, HashMap<String, f32>) {
            let report = format!("{} gt / {} det", gt_annos.len(), det_annos.len());
            let mut metrics = HashMap::new();
            metrics.insert("num_gt".to_string(), gt_annos.len() as f32);
            (report, metrics)
        }
    }

    #[test]
    fn test_evaluation_delegates_to_external_evaluator() {
        let tree = testing::fixture_tree_with_sample("train_clear_day");
        let dataset = dataset_with_infos(&tree);
        let (report, metrics) = dataset.evaluation(&CountingEvaluator, &[]).unwrap();
        assert_eq!(report, "1 gt / 0 det");
        assert_eq!(metrics["num_gt"], 1.);

        let unlabeled = Dataset::new(tree.config()).unwrap();
        assert!(unlabeled.evaluation(&CountingEvaluator, &[]).is_none());
    }
}
