//! Error types for the plasticity library

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// Bad constructor parameters or an unknown enum tag
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// `predict` or `save_weights` called before a successful `fit`
    #[error("Fitted error. The model is not fitted yet.\nPlease call the fit function before using the predict member.")]
    NotFitted,

    /// Input or weight shapes inconsistent with the fitted model
    #[error("{0}")]
    DimensionMismatch(String),

    /// Missing weights, dataset or configuration file
    #[error("File not found. Given : {}", .0.display())]
    FileNotFound(PathBuf),

    /// Malformed dataset or weights file
    #[error("Data error: {0}")]
    Data(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file parsing error
    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),

    /// Configuration file serialization error
    #[error("Config serialization error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),
}

impl Error {
    /// Feature count of a `predict` input does not match the fitted weights
    pub fn inconsistent_features(n_weights: usize) -> Self {
        Error::DimensionMismatch(format!(
            "Invalid dimensions found. The input (n_samples, n_features) shape is inconsistent with the number of weights ({})",
            n_weights
        ))
    }

    /// Weights or gradient passed to the optimizer differ from its state
    pub fn weights_shape(given: (usize, usize), expected: (usize, usize)) -> Self {
        Error::DimensionMismatch(format!(
            "Invalid number of weights found. Given {}x{}. Expected {}x{}",
            given.0, given.1, expected.0, expected.1
        ))
    }

    /// Unknown tag for one of the enumerated families
    pub fn unknown_tag(family: &str, tag: &str) -> Self {
        Error::InvalidConfiguration(format!("unknown {} '{}'", family, tag))
    }

    /// Returns true for errors raised by parameter validation
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::InvalidConfiguration(_) | Error::Config(_))
    }
}
