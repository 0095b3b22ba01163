//! Shared fixtures for the unit tests: a synthetic calibration and a
//! miniature dataset tree on disk.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use ndarray::Array2;
use tempfile::TempDir;

use crate::calibration::Calibration;
use crate::constants::{lidar_folder, SensorType, SignalType, LABEL_FOLDER};
use crate::dataset::DatasetConfig;
use crate::io::write_points_bin;
use crate::path::decompose_sample_id;

/// Identifier of the fully populated fixture sample.
pub const SAMPLE_ID: &str = "2018-02-03_20-48-35_00100";

const CALIB_TEXT: &str = "P2: 10 0 2 0 0 10 1.5 0 0 0 1 0\n\
R0_rect: 1 0 0 0 1 0 0 0 1\n\
Tr_velo_to_cam: 0 -1 0 0 0 0 -1 0 1 0 0 0\n";

/// A small synthetic rig: 10 px focal length, principal point at
/// (2, 1.5) for a 4x3 image, identity rectification and the usual
/// camera/lidar axis swap.
pub fn test_calibration() -> Calibration {
    let p2 = Array2::from_shape_vec(
        (3, 4),
        vec![10., 0., 2., 0., 0., 10., 1.5, 0., 0., 0., 1., 0.],
    )
    .unwrap();
    let r0 = Array2::<f32>::eye(3);
    let v2c = Array2::from_shape_vec(
        (3, 4),
        vec![0., -1., 0., 0., 0., 0., -1., 0., 1., 0., 0., 0.],
    )
    .unwrap();
    Calibration::new(&p2.view(), &r0.view(), &v2c.view())
}

/// Format one label line in the DENSE layout (19 columns, score last).
/// Box dimensions are keyed by the raw class name.
pub fn label_line(class: &str, box2d: [f32; 4], location: [f32; 3], rotation_y: f32) -> String {
    let (height, width, length) = match class {
        "PassengerCar" => (1.5, 1.6, 3.9),
        "Pedestrian" => (1.8, 0.6, 0.8),
        "DontCare" => (-1., -1., -1.),
        _ => (1., 1., 1.),
    };
    format!(
        "{class} 0.00 0 0.00 {:.2} {:.2} {:.2} {:.2} {height:.2} {width:.2} {length:.2} {:.2} {:.2} {:.2} {rotation_y:.2} 0 0 0 1.00",
        box2d[0], box2d[1], box2d[2], box2d[3], location[0], location[1], location[2],
    )
}

/// Write one label file from pre-formatted lines.
pub fn write_label_file(path: &Path, lines: &[String]) {
    fs::write(path, lines.join("\n")).unwrap();
}

/// A miniature dataset tree rooted in a temporary directory.
pub struct FixtureTree {
    dir: TempDir,
    split: String,
}

impl FixtureTree {
    /// Dataset root.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Dataset configuration bound to the fixture split.
    pub fn config(&self) -> DatasetConfig {
        DatasetConfig {
            root: self.root().to_path_buf(),
            sensor_type: SensorType::Hdl64,
            signal_type: SignalType::Strongest,
            split: self.split.clone(),
            drop_empty_annotations: false,
        }
    }

    fn lidar_dir(&self) -> PathBuf {
        self.root()
            .join(lidar_folder(SensorType::Hdl64, SignalType::Strongest))
    }

    fn append_split_line(&self, sample_id: &str) {
        let split_file = self
            .root()
            .join("splits")
            .join(format!("{}.txt", self.split));
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(split_file)
            .unwrap();
        writeln!(file, "{}", decompose_sample_id(sample_id)).unwrap();
    }

    fn write_image(&self, sample_id: &str) {
        let path = self
            .root()
            .join("cam_stereo_left_lut")
            .join(format!("{sample_id}.png"));
        image::RgbImage::new(4, 3).save(path).unwrap();
    }

    fn write_points(&self, sample_id: &str, rows: &[[f32; 5]]) {
        let flat: Vec<f32> = rows.iter().flatten().copied().collect();
        let points = Array2::from_shape_vec((rows.len(), 5), flat).unwrap();
        let path = self.lidar_dir().join(format!("{sample_id}.bin"));
        write_points_bin(&path, &points.view()).unwrap();
    }

    fn write_labels(&self, sample_id: &str, lines: &[String]) {
        let path = self
            .root()
            .join(LABEL_FOLDER)
            .join(format!("{sample_id}.txt"));
        write_label_file(&path, lines);
    }

    /// Add a sample whose label file exists but holds no rows.
    pub fn add_empty_label_sample(&self, sample_id: &str) {
        self.append_split_line(sample_id);
        self.write_image(sample_id);
        self.write_labels(sample_id, &[]);
        self.write_points(sample_id, &[[10., 0., 0., 0.5, 0.]]);
    }

    /// Add a labeled sample without a lidar frame (sparse sensor coverage).
    pub fn add_sample_without_lidar(&self, sample_id: &str) {
        self.append_split_line(sample_id);
        self.write_image(sample_id);
        self.write_labels(
            sample_id,
            &[label_line(
                "PassengerCar",
                [100., 100., 150., 140.],
                [0., 1., 10.],
                0.,
            )],
        );
    }

    /// Add a labeled sample whose points all lie behind the camera.
    pub fn add_fov_dropout_sample(&self, sample_id: &str) {
        self.append_split_line(sample_id);
        self.write_image(sample_id);
        self.write_labels(
            sample_id,
            &[label_line(
                "PassengerCar",
                [100., 100., 150., 140.],
                [0., 1., 10.],
                0.,
            )],
        );
        self.write_points(
            sample_id,
            &[
                [-20., 0., 0., 0.5, 0.],
                [-15., 1., -0.5, 0.4, 0.],
                [-25., -2., 0., 0.3, 0.],
            ],
        );
    }
}

/// Build a dataset tree with one fully populated sample.
///
/// The sample labels a `PassengerCar` enclosing two points, a
/// `Pedestrian` enclosing one, and a `DontCare` region; one far point is
/// in view but outside every box, and one point lies behind the camera.
pub fn fixture_tree_with_sample(split: &str) -> FixtureTree {
    let dir = TempDir::new().unwrap();
    let tree = FixtureTree {
        dir,
        split: split.to_string(),
    };

    fs::create_dir_all(tree.lidar_dir()).unwrap();
    fs::create_dir_all(tree.root().join("cam_stereo_left_lut")).unwrap();
    fs::create_dir_all(tree.root().join(LABEL_FOLDER)).unwrap();
    fs::create_dir_all(tree.root().join("splits")).unwrap();
    fs::write(tree.root().join("calib_hdl64.txt"), CALIB_TEXT).unwrap();

    tree.append_split_line(SAMPLE_ID);
    tree.write_image(SAMPLE_ID);
    tree.write_labels(
        SAMPLE_ID,
        &[
            label_line("PassengerCar", [100., 100., 150., 140.], [0., 1., 10.], 0.),
            label_line(
                "DontCare",
                [500., 150., 520., 160.],
                [-1000., -1000., -1000.],
                -10.,
            ),
            label_line("Pedestrian", [200., 100., 220., 130.], [0.5, 1., 8.], 0.),
        ],
    );
    tree.write_points(
        SAMPLE_ID,
        &[
            [10., 0., -0.25, 0.9, 0.],
            [10.3, 0.4, -0.5, 0.8, 0.],
            [8., -0.5, -0.1, 0.7, 1.],
            [20., 0., 0., 0.6, 0.],
            [-20., 0., 0., 0.5, 0.],
        ],
    );
    tree
}
