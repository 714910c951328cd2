//! CIFAR-10 binary batches
//!
//! Each record is one label byte followed by 3072 pixel bytes (32x32 red,
//! then green, then blue planes).

use std::path::Path;

use ndarray::Array2;
use tracing::info;

use super::{read_file, Dataset};
use crate::error::{Error, Result};

pub const IMAGE_BYTES: usize = 32 * 32 * 3;
pub const RECORD_BYTES: usize = IMAGE_BYTES + 1;

/// Load and concatenate one or more batch files.
pub fn load<P: AsRef<Path>>(paths: &[P]) -> Result<Dataset> {
    let mut pixels = Vec::new();
    let mut labels = Vec::new();

    for path in paths {
        let path = path.as_ref();
        let bytes = read_file(path)?;
        if bytes.len() % RECORD_BYTES != 0 {
            return Err(Error::Data(format!(
                "{}: size {} is not a multiple of the {}-byte record",
                path.display(),
                bytes.len(),
                RECORD_BYTES
            )));
        }

        for record in bytes.chunks_exact(RECORD_BYTES) {
            labels.push(record[0]);
            pixels.extend(record[1..].iter().map(|&b| b as f32));
        }
        info!("Loaded {} CIFAR-10 records from {}", bytes.len() / RECORD_BYTES, path.display());
    }

    let n = labels.len();
    let samples =
        Array2::from_shape_vec((n, IMAGE_BYTES), pixels).map_err(|e| Error::Data(e.to_string()))?;
    Dataset::with_labels(samples, labels)
}
