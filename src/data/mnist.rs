//! MNIST IDX files
//!
//! Images: `[u32 2051][u32 n][u32 rows][u32 cols][n * rows * cols u8]`.
//! Labels: `[u32 2049][u32 n][n u8]`. All header fields are big-endian.

use std::io::Cursor;
use std::path::Path;

use byteorder::{BigEndian, ReadBytesExt};
use ndarray::Array2;
use tracing::info;

use super::{read_file, Dataset};
use crate::error::{Error, Result};

pub const IMAGES_MAGIC: u32 = 2051;
pub const LABELS_MAGIC: u32 = 2049;

fn header(cursor: &mut Cursor<&[u8]>, path: &Path, fields: usize) -> Result<Vec<u32>> {
    (0..fields)
        .map(|_| {
            cursor.read_u32::<BigEndian>().map_err(|_| {
                Error::Data(format!("{}: truncated IDX header", path.display()))
            })
        })
        .collect()
}

/// Load an image file as an (n_images x rows*cols) matrix of raw intensities.
pub fn load_images<P: AsRef<Path>>(path: P) -> Result<Array2<f32>> {
    let path = path.as_ref();
    let bytes = read_file(path)?;
    let mut cursor = Cursor::new(bytes.as_slice());

    let fields = header(&mut cursor, path, 4)?;
    let (magic, n, rows, cols) = (fields[0], fields[1] as usize, fields[2] as usize, fields[3] as usize);
    if magic != IMAGES_MAGIC {
        return Err(Error::Data(format!(
            "{}: bad magic number {} (expected {})",
            path.display(),
            magic,
            IMAGES_MAGIC
        )));
    }

    let n_features = rows * cols;
    let body = &bytes[cursor.position() as usize..];
    if body.len() < n * n_features {
        return Err(Error::Data(format!(
            "{}: expected {} pixel bytes, found {}",
            path.display(),
            n * n_features,
            body.len()
        )));
    }

    let pixels: Vec<f32> = body[..n * n_features].iter().map(|&b| b as f32).collect();
    let images = Array2::from_shape_vec((n, n_features), pixels).map_err(|e| Error::Data(e.to_string()))?;
    info!("Loaded {} MNIST images of {}x{} from {}", n, rows, cols, path.display());
    Ok(images)
}

pub fn load_labels<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
    let path = path.as_ref();
    let bytes = read_file(path)?;
    let mut cursor = Cursor::new(bytes.as_slice());

    let fields = header(&mut cursor, path, 2)?;
    let (magic, n) = (fields[0], fields[1] as usize);
    if magic != LABELS_MAGIC {
        return Err(Error::Data(format!(
            "{}: bad magic number {} (expected {})",
            path.display(),
            magic,
            LABELS_MAGIC
        )));
    }

    let body = &bytes[cursor.position() as usize..];
    if body.len() < n {
        return Err(Error::Data(format!(
            "{}: expected {} labels, found {}",
            path.display(),
            n,
            body.len()
        )));
    }
    Ok(body[..n].to_vec())
}

/// Images plus the optional matching label file
pub fn load<P: AsRef<Path>>(images: P, labels: Option<P>) -> Result<Dataset> {
    let samples = load_images(images)?;
    match labels {
        Some(path) => Dataset::with_labels(samples, load_labels(path)?),
        None => Ok(Dataset::new(samples)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn idx_images(n: u32, rows: u32, cols: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        for field in [IMAGES_MAGIC, n, rows, cols] {
            bytes.extend_from_slice(&field.to_be_bytes());
        }
        bytes.extend((0..n * rows * cols).map(|i| (i % 256) as u8));
        bytes
    }

    #[test]
    fn test_load_images_and_labels() {
        let dir = tempdir().unwrap();
        let images = dir.path().join("images.idx3-ubyte");
        let labels = dir.path().join("labels.idx1-ubyte");
        fs::write(&images, idx_images(3, 2, 2)).unwrap();

        let mut label_bytes = Vec::new();
        label_bytes.extend_from_slice(&LABELS_MAGIC.to_be_bytes());
        label_bytes.extend_from_slice(&3u32.to_be_bytes());
        label_bytes.extend_from_slice(&[7, 1, 4]);
        fs::write(&labels, label_bytes).unwrap();

        let ds = load(&images, Some(&labels)).unwrap();
        assert_eq!(ds.n_samples(), 3);
        assert_eq!(ds.n_features(), 4);
        assert_eq!(ds.samples()[[2, 3]], 11.0);
        assert_eq!(ds.labels(), Some(&[7u8, 1, 4][..]));
    }

    #[test]
    fn test_bad_magic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("images");
        let mut bytes = idx_images(1, 2, 2);
        bytes[3] = 0;
        fs::write(&path, bytes).unwrap();
        assert!(matches!(load_images(&path), Err(Error::Data(_))));
    }

    #[test]
    fn test_truncated_body() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("images");
        let mut bytes = idx_images(2, 2, 2);
        bytes.pop();
        fs::write(&path, bytes).unwrap();
        assert!(matches!(load_images(&path), Err(Error::Data(_))));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        let err = load_images(dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));
    }
}
