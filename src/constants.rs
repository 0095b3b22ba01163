//! # constants
//!
//! Common constants used throughout the library.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// Number of features per lidar return (x, y, z, intensity, channel).
pub const LIDAR_NUM_FEATURES: usize = 5;

/// Folder holding the rectified left stereo camera images.
pub const CAMERA_FOLDER: &str = "cam_stereo_left_lut";

/// Folder holding the camera-frame ground-truth label files.
pub const LABEL_FOLDER: &str = "gt_labels/cam_left_labels_TMP";

/// Folder holding the per-sample road plane estimates.
pub const PLANE_FOLDER: &str = "velodyne_planes";

/// Folder holding the split membership files.
pub const SPLIT_FOLDER: &str = "splits";

/// Range sensors the recordings were captured with.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Display, EnumIter, EnumString, Serialize, Deserialize,
)]
pub enum SensorType {
    /// 64-beam main lidar.
    #[strum(serialize = "hdl64")]
    Hdl64,
    /// 32-beam auxiliary lidar with sparse frame coverage.
    #[strum(serialize = "vlp32")]
    Vlp32,
}

impl SensorType {
    /// Artifact name suffix distinguishing the auxiliary sensor.
    pub fn suffix(&self) -> &'static str {
        match self {
            SensorType::Hdl64 => "",
            SensorType::Vlp32 => "_vlp32",
        }
    }
}

/// Lidar return signal variants.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Display, EnumIter, EnumString, Serialize, Deserialize,
)]
pub enum SignalType {
    /// Strongest echo per beam.
    #[strum(serialize = "strongest")]
    Strongest,
    /// Last echo per beam.
    #[strum(serialize = "last")]
    Last,
}

/// Folder holding the raw point files for one sensor/signal combination.
pub fn lidar_folder(sensor: SensorType, signal: SignalType) -> String {
    format!("lidar_{sensor}_{signal}")
}

/// Weather-and-stage conditions a split can select.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumIter, EnumString)]
pub enum SplitCondition {
    /// Clear-weather training scenes.
    #[strum(serialize = "train_clear")]
    TrainClear,
    /// Clear-weather validation scenes.
    #[strum(serialize = "val_clear")]
    ValClear,
    /// Clear-weather test scenes.
    #[strum(serialize = "test_clear")]
    TestClear,
    /// Light fog test scenes.
    #[strum(serialize = "light_fog")]
    LightFog,
    /// Dense fog test scenes.
    #[strum(serialize = "dense_fog")]
    DenseFog,
    /// Snowfall test scenes.
    #[strum(serialize = "snow")]
    Snow,
}

/// Time-of-day halves of every condition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumIter, EnumString)]
pub enum TimeOfDay {
    /// Daytime captures.
    #[strum(serialize = "day")]
    Day,
    /// Nighttime captures.
    #[strum(serialize = "night")]
    Night,
}

/// Full split name for one condition and time of day.
pub fn split_name(condition: SplitCondition, time: TimeOfDay) -> String {
    format!("{condition}_{time}")
}
