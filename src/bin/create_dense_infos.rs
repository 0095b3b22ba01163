//! # create_dense_infos
//!
//! Builds the per-split info indexes and the ground-truth database for
//! the DENSE adverse-weather recordings, then merges the day and night
//! halves of every artifact.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;

#[macro_use]
extern crate log;
use once_cell::sync::Lazy;
use strum::IntoEnumIterator;

use dense::constants::{SensorType, SignalType, SplitCondition, TimeOfDay, SPLIT_FOLDER};
use dense::dataset::{merge_db_index_files, merge_info_files, Dataset, DatasetConfig};
use dense::gt_database::create_groundtruth_database;
use dense::info::{compile_infos, InfoOptions, SampleInfo};
use dense::io;

/// Constants can be changed to fit your directory structure.
/// However, it's recommended to place the datasets in the default folders.

/// Root directory of the extracted recordings.
static ROOT_DIR: Lazy<PathBuf> =
    Lazy::new(|| dirs::home_dir().unwrap().join("SeeingThroughFogData"));

/// Output directory for the info indexes and the database index.
static SAVE_DIR: Lazy<PathBuf> = Lazy::new(|| dirs::home_dir().unwrap().join("data/dense"));

/// Range sensor to process. The auxiliary `vlp32` sensor suffixes every
/// artifact name.
const SENSOR: SensorType = SensorType::Hdl64;

/// Echo signal variant to process.
const SIGNAL: SignalType = SignalType::Strongest;

/// Test conditions evaluated per time of day.
const TEST_CONDITIONS: [SplitCondition; 4] = [
    SplitCondition::TestClear,
    SplitCondition::LightFog,
    SplitCondition::DenseFog,
    SplitCondition::Snow,
];

/// Script entrypoint.
pub fn main() -> Result<()> {
    env_logger::init();

    let suffix = SENSOR.suffix();
    fs::create_dir_all(SAVE_DIR.as_path())?;

    let config = DatasetConfig {
        root: ROOT_DIR.clone(),
        sensor_type: SENSOR,
        signal_type: SIGNAL,
        split: "all".to_string(),
        drop_empty_annotations: false,
    };
    let mut dataset = Dataset::new(config)?;
    let options = InfoOptions::default();

    // all split
    let all_infos = compile_infos(&dataset, &options)?;
    let all_filename = SAVE_DIR.join(format!("dense_infos_all{suffix}.bin"));
    io::save_bincode(&all_filename, &all_infos)?;
    info!("{} saved", all_filename.display());

    for time in TimeOfDay::iter() {
        info!("starting to process {time}time scenes");

        // train split
        let train_split = format!("train_clear_{time}");
        let train_infos = compile_split(&mut dataset, &train_split, &options, suffix)?;

        // val split
        let val_split = format!("val_clear_{time}");
        let val_infos = compile_split(&mut dataset, &val_split, &options, suffix)?;

        // trainval concatenation
        let trainval_filename =
            SAVE_DIR.join(format!("dense_infos_trainval_clear_{time}{suffix}.bin"));
        let trainval_infos: Vec<SampleInfo> = train_infos
            .iter()
            .chain(val_infos.iter())
            .cloned()
            .collect();
        io::save_bincode(&trainval_filename, &trainval_infos)?;
        info!("{} saved", trainval_filename.display());

        // test splits
        for condition in TEST_CONDITIONS {
            let test_split = format!("{condition}_{time}");
            compile_split(&mut dataset, &test_split, &options, suffix)?;
        }

        info!("starting to create groundtruth database for data augmentation");
        dataset.set_split(&train_split)?;
        create_groundtruth_database(&dataset, &train_infos, None, &train_split, SAVE_DIR.as_path())?;

        info!("data preparation for {time}time scenes finished");
    }

    // merge the day and night halves of every artifact
    for stage in ["train", "val", "trainval"] {
        merge_day_and_night(&format!("dense_infos_{stage}_clear"), suffix)?;
    }
    for condition in TEST_CONDITIONS {
        merge_day_and_night(&format!("dense_infos_{condition}"), suffix)?;
    }

    let day_db = SAVE_DIR.join(format!("dense_dbinfos_train_clear_day{suffix}.bin"));
    let night_db = SAVE_DIR.join(format!("dense_dbinfos_train_clear_night{suffix}.bin"));
    let merged_db = SAVE_DIR.join(format!("dense_dbinfos_train_clear{suffix}.bin"));
    if day_db.exists() && night_db.exists() {
        merge_db_index_files(&day_db, &night_db, &merged_db)?;
        info!("{} saved", merged_db.display());
    } else {
        warn!("skipping database merge, a day or night index is missing");
    }

    Ok(())
}

/// Compile and persist one split's info records.
/// A split without a membership file is skipped with an empty result.
fn compile_split(
    dataset: &mut Dataset,
    split: &str,
    options: &InfoOptions,
    suffix: &str,
) -> Result<Vec<SampleInfo>> {
    if !split_file(dataset.root(), split, suffix).exists() {
        error!("Cannot find `{split}` split. Skipping ...");
        return Ok(Vec::new());
    }
    dataset.set_split(split)?;
    let infos = compile_infos(dataset, options)?;
    let filename = SAVE_DIR.join(format!("dense_infos_{split}{suffix}.bin"));
    io::save_bincode(&filename, &infos)?;
    info!("{} saved", filename.display());
    Ok(infos)
}

fn split_file(root: &Path, split: &str, suffix: &str) -> PathBuf {
    root.join(SPLIT_FOLDER).join(format!("{split}{suffix}.txt"))
}

/// Merge the day and night files of one artifact stem.
fn merge_day_and_night(stem: &str, suffix: &str) -> Result<()> {
    let day = SAVE_DIR.join(format!("{stem}_day{suffix}.bin"));
    let night = SAVE_DIR.join(format!("{stem}_night{suffix}.bin"));
    let merged = SAVE_DIR.join(format!("{stem}{suffix}.bin"));
    if !day.exists() || !night.exists() {
        warn!("skipping merge of {stem}, a day or night index is missing");
        return Ok(());
    }
    merge_info_files(&day, &night, &merged)?;
    info!("{} saved", merged.display());
    Ok(())
}
