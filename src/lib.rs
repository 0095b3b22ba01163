//! # dense
//!
//! DENSE adverse-weather dataset preparation library.
//!
//! Normalizes raw LiDAR/camera recordings and their camera-frame labels
//! into per-sample info records, and materializes the per-object
//! ground-truth database used for augmentation-by-insertion during
//! training.

#![warn(missing_docs)]

pub mod calibration;
pub mod constants;
pub mod dataset;
pub mod geometry;
pub mod gt_database;
pub mod info;
pub mod io;
pub mod label;
pub mod ops;
pub mod path;

#[cfg(test)]
pub(crate) mod testing;
