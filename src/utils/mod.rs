//! Utility module
//!
//! This module provides:
//! - Configuration management
//! - Logging setup

mod config;
mod logging;

pub use config::{
    Config, DataSection, LoggingSection, ModelSection, OptimizerSection, RuleKind,
    TrainingSection, WeightsSection,
};
pub use logging::setup_logging;
