//! Data Module
//!
//! Training data for the plasticity models:
//! - `Dataset`: dense (n_samples x n_features) `f32` samples with optional labels
//! - MNIST IDX and CIFAR-10 binary batch loaders
//! - Preprocessing (scale to [0, 1], binarize)

pub mod cifar10;
pub mod mnist;

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Supported on-disk dataset formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    Mnist,
    Cifar10,
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetKind::Mnist => f.write_str("mnist"),
            DatasetKind::Cifar10 => f.write_str("cifar10"),
        }
    }
}

impl FromStr for DatasetKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace(['-', '_'], "").as_str() {
            "mnist" => Ok(DatasetKind::Mnist),
            "cifar10" | "cifar" => Ok(DatasetKind::Cifar10),
            _ => Err(Error::unknown_tag("dataset", s)),
        }
    }
}

/// Row-major sample matrix with optional class labels
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    samples: Array2<f32>,
    labels: Option<Vec<u8>>,
}

impl Dataset {
    pub fn new(samples: Array2<f32>) -> Self {
        Self {
            samples,
            labels: None,
        }
    }

    pub fn with_labels(samples: Array2<f32>, labels: Vec<u8>) -> Result<Self> {
        if labels.len() != samples.nrows() {
            return Err(Error::Data(format!(
                "{} labels for {} samples",
                labels.len(),
                samples.nrows()
            )));
        }
        Ok(Self {
            samples,
            labels: Some(labels),
        })
    }

    /// Wrap a flat row-major buffer
    pub fn from_flat(data: Vec<f32>, n_samples: usize, n_features: usize) -> Result<Self> {
        let samples = Array2::from_shape_vec((n_samples, n_features), data)
            .map_err(|e| Error::Data(format!("cannot shape buffer as {}x{}: {}", n_samples, n_features, e)))?;
        Ok(Self::new(samples))
    }

    pub fn view(&self) -> ArrayView2<'_, f32> {
        self.samples.view()
    }

    pub fn samples(&self) -> &Array2<f32> {
        &self.samples
    }

    pub fn labels(&self) -> Option<&[u8]> {
        self.labels.as_deref()
    }

    pub fn n_samples(&self) -> usize {
        self.samples.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.samples.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Keep only the first `n` samples
    pub fn truncate(&mut self, n: usize) {
        if n >= self.n_samples() {
            return;
        }
        self.samples = self.samples.slice(ndarray::s![..n, ..]).to_owned();
        if let Some(labels) = self.labels.as_mut() {
            labels.truncate(n);
        }
    }

    /// Scale raw pixel intensities into [0, 1]
    pub fn normalize(&mut self) {
        self.samples.mapv_inplace(|x| x / 255.0);
    }

    /// Map every value above 0.5 to 1 and the rest to 0
    pub fn binarize(&mut self) {
        self.samples
            .mapv_inplace(|x| if x > 0.5 { 1.0 } else { 0.0 });
    }
}

/// Read a whole dataset file, reporting a missing path as `FileNotFound`.
pub(crate) fn read_file(path: &Path) -> Result<Vec<u8>> {
    if !path.is_file() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }
    Ok(fs::read(path)?)
}
