//! # label
//!
//! Camera-frame text label parsing for the DENSE annotation scheme.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// Sentinel x-location marking annotations without a usable 3D box.
pub const INVALID_LOCATION_X: f32 = -1000.0;

/// Closed set of annotation classes after remapping.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    Serialize,
    Deserialize,
)]
pub enum ObjectClass {
    /// Passenger cars.
    Car,
    /// Pedestrians.
    Pedestrian,
    /// Riders and their vehicles.
    Cyclist,
    /// Large vehicles (trucks, buses, unspecified vehicles).
    Van,
    /// Image region excluded from detection scoring.
    DontCare,
    /// Raw labels outside the detection vocabulary.
    Ignore,
}

impl ObjectClass {
    /// Total remap from raw DENSE class labels; unknown labels map to `Ignore`.
    pub fn from_raw(raw: &str) -> ObjectClass {
        match raw {
            "PassengerCar" => ObjectClass::Car,
            "Pedestrian" => ObjectClass::Pedestrian,
            "RidableVehicle" => ObjectClass::Cyclist,
            "LargeVehicle" | "Vehicle" => ObjectClass::Van,
            "DontCare" => ObjectClass::DontCare,
            _ => ObjectClass::Ignore,
        }
    }

    /// Numeric training id; `-1` for classes outside the detection set.
    pub fn class_id(&self) -> i32 {
        match self {
            ObjectClass::Car => 1,
            ObjectClass::Pedestrian => 2,
            ObjectClass::Cyclist => 3,
            ObjectClass::Van => 4,
            ObjectClass::DontCare | ObjectClass::Ignore => -1,
        }
    }
}

/// Difficulty buckets derived from 2D box height, truncation and occlusion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum Difficulty {
    /// Tall, unoccluded, barely truncated objects.
    Easy,
    /// Medium-height objects with at most partial occlusion.
    Moderate,
    /// Medium-height objects with at most large occlusion.
    Hard,
    /// Everything below the Hard thresholds.
    Unknown,
}

impl Difficulty {
    /// Numeric level used by downstream consumers (`-1` for `Unknown`).
    pub fn level(&self) -> i32 {
        match self {
            Difficulty::Easy => 0,
            Difficulty::Moderate => 1,
            Difficulty::Hard => 2,
            Difficulty::Unknown => -1,
        }
    }

    fn classify(box2d: &[f32; 4], truncation: f32, occlusion: f32) -> Difficulty {
        let height = box2d[3] - box2d[1] + 1.;
        if height >= 40. && truncation <= 0.15 && occlusion <= 0. {
            Difficulty::Easy
        } else if height >= 25. && truncation <= 0.3 && occlusion <= 1. {
            Difficulty::Moderate
        } else if height >= 25. && truncation <= 0.5 && occlusion <= 2. {
            Difficulty::Hard
        } else {
            Difficulty::Unknown
        }
    }
}

/// One annotated object in the rectified camera frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Object3d {
    /// Remapped class.
    pub class: ObjectClass,
    /// Truncation ratio in `[0, 1]`.
    pub truncation: f32,
    /// Occlusion level: 0 fully visible, 1 partly occluded, 2 largely occluded, 3 unknown.
    pub occlusion: f32,
    /// Observation angle.
    pub alpha: f32,
    /// 2D image box as `(x1, y1, x2, y2)`.
    pub box2d: [f32; 4],
    /// Box height in meters.
    pub height: f32,
    /// Box width in meters.
    pub width: f32,
    /// Box length in meters.
    pub length: f32,
    /// Bottom-face center in the rectified camera frame.
    pub location: [f32; 3],
    /// Rotation about the camera y axis.
    pub rotation_y: f32,
    /// Annotation confidence score.
    pub score: f32,
    /// Derived difficulty bucket.
    pub difficulty: Difficulty,
}

impl Object3d {
    /// Parse one whitespace-separated label line.
    pub fn from_line(line: &str) -> Result<Object3d> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 15 {
            bail!("label line has {} fields, expected at least 15", fields.len());
        }
        let float = |index: usize| -> Result<f32> {
            fields[index]
                .parse::<f32>()
                .with_context(|| format!("label field {index} `{}` is not a float", fields[index]))
        };

        let class = ObjectClass::from_raw(fields[0]);
        let truncation = float(1)?;
        let occlusion = float(2)?;
        let alpha = float(3)?;
        let box2d = [float(4)?, float(5)?, float(6)?, float(7)?];
        let height = float(8)?;
        let width = float(9)?;
        let length = float(10)?;
        let location = [float(11)?, float(12)?, float(13)?];
        let rotation_y = float(14)?;
        // DENSE label rows carry the score in the 19th column; plain
        // KITTI rows carry it in the 16th when present at all.
        let score = match fields.len() {
            n if n > 18 => float(18)?,
            16 => float(15)?,
            _ => -1.0,
        };
        let difficulty = Difficulty::classify(&box2d, truncation, occlusion);

        Ok(Object3d {
            class,
            truncation,
            occlusion,
            alpha,
            box2d,
            height,
            width,
            length,
            location,
            rotation_y,
            score,
            difficulty,
        })
    }

    /// Whether the row carries a usable 3D box.
    pub fn has_valid_3d(&self) -> bool {
        self.location[0] != INVALID_LOCATION_X && self.class != ObjectClass::Ignore
    }
}

/// Per-file parse bookkeeping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ParseCounts {
    /// Rows with a usable 3D box.
    pub valid_3d: usize,
    /// Rows with the invalid-location sentinel.
    pub invalid_3d: usize,
    /// Rows whose raw class lies outside the detection vocabulary.
    pub ignored: usize,
    /// Retained placeholder rows.
    pub dont_care: usize,
}

/// Parse one label file into objects visible in the lidar.
///
/// Valid rows keep their file order and come first; DontCare placeholder
/// rows are appended after them. Rows with the location sentinel or an
/// `Ignore` class are dropped and counted. An empty `valid_3d` count is
/// the caller's signal that the sample carries no usable 3D annotation.
pub fn objects_from_label(path: &Path) -> Result<(Vec<Object3d>, ParseCounts)> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("cannot read label file {}", path.display()))?;

    let mut valid = Vec::new();
    let mut dont_care = Vec::new();
    let mut counts = ParseCounts::default();
    for line in content.lines().filter(|line| !line.trim().is_empty()) {
        let object = Object3d::from_line(line)
            .with_context(|| format!("malformed label line in {}", path.display()))?;
        match object.class {
            ObjectClass::DontCare => {
                counts.dont_care += 1;
                dont_care.push(object);
            }
            ObjectClass::Ignore => counts.ignored += 1,
            _ if !object.has_valid_3d() => counts.invalid_3d += 1,
            _ => {
                counts.valid_3d += 1;
                valid.push(object);
            }
        }
    }
    valid.extend(dont_care);
    Ok((valid, counts))
}
