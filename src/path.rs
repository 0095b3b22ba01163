//! # path
//!
//! Sample-identifier and file path helpers.

use anyhow::{Context, Result};
use std::path::Path;

/// Extract the file stem from a path.
pub fn extract_file_stem(path: &Path) -> Result<String> {
    let file_stem = path
        .file_stem()
        .context("Cannot parse file stem.")?
        .to_str()
        .context("Cannot convert file stem to string.")?
        .to_string();
    Ok(file_stem)
}

/// Normalize one split membership line into a sample identifier.
/// Source lines join their fields with commas; identifiers join them with
/// underscores.
pub fn normalize_split_line(line: &str) -> String {
    line.trim().split(',').collect::<Vec<_>>().join("_")
}

/// Decompose a `{date}_{time}_{frame}` identifier back into the
/// `{date}_{time},{frame}` source naming used in log messages.
pub fn decompose_sample_id(sample_id: &str) -> String {
    let mut seen = 0;
    for (index, character) in sample_id.char_indices() {
        if character == '_' {
            seen += 1;
            if seen == 2 {
                return format!("{},{}", &sample_id[..index], &sample_id[index + 1..]);
            }
        }
    }
    sample_id.to_string()
}
