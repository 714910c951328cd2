//! Configuration management
//!
//! TOML configuration for the command line front end. Every key has a
//! default, and enum tags stay plain strings until one of the builders
//! below parses them.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::activation::ActivationType;
use crate::data::{cifar10, mnist, Dataset, DatasetKind};
use crate::error::{Error, Result};
use crate::model::{BcmParams, HopfieldParams, ModelConfig};
use crate::optimizer::{Optimizer, OptimizerKind, OptimizerParams};
use crate::weights::{WeightInit, WeightInitializer};

/// Which learning rule `[model]` describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    Bcm,
    Hopfield,
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleKind::Bcm => f.write_str("bcm"),
            RuleKind::Hopfield => f.write_str("hopfield"),
        }
    }
}

impl FromStr for RuleKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "bcm" => Ok(RuleKind::Bcm),
            "hopfield" | "krotov" => Ok(RuleKind::Hopfield),
            _ => Err(Error::unknown_tag("model rule", s)),
        }
    }
}

/// Model section: shared training knobs plus both rules' parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSection {
    pub rule: String,
    pub outputs: usize,
    pub batch_size: usize,
    pub epochs_for_convergency: usize,
    pub convergency_atol: f32,
    pub weight_decay: f32,
    pub verbose: bool,
    // BCM
    pub activation: String,
    pub interaction_strength: f32,
    pub memory_factor: f32,
    // Hopfield
    pub delta: f32,
    pub p: f32,
    pub k: usize,
}

impl Default for ModelSection {
    fn default() -> Self {
        let model = ModelConfig::default();
        let bcm = BcmParams::default();
        let hopfield = HopfieldParams::default();
        Self {
            rule: "bcm".to_string(),
            outputs: model.outputs,
            batch_size: model.batch_size,
            epochs_for_convergency: model.epochs_for_convergency,
            convergency_atol: model.convergency_atol,
            weight_decay: model.weight_decay,
            verbose: model.verbose,
            activation: bcm.activation.to_string(),
            interaction_strength: bcm.interaction_strength,
            memory_factor: bcm.memory_factor,
            delta: hopfield.delta,
            p: hopfield.p,
            k: hopfield.k,
        }
    }
}

/// Optimizer section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerSection {
    #[serde(rename = "type")]
    pub kind: String,
    pub learning_rate: f32,
    pub momentum: f32,
    pub decay: f32,
    #[serde(alias = "B1")]
    pub beta1: f32,
    #[serde(alias = "B2")]
    pub beta2: f32,
    pub rho: f32,
    pub l2norm: bool,
    pub clip: bool,
}

impl Default for OptimizerSection {
    fn default() -> Self {
        let params = OptimizerParams::default();
        Self {
            kind: OptimizerKind::Sgd.to_string(),
            learning_rate: params.learning_rate,
            momentum: params.momentum,
            decay: params.decay,
            beta1: params.beta1,
            beta2: params.beta2,
            rho: params.rho,
            l2norm: params.l2norm,
            clip: params.clip,
        }
    }
}

/// Weight initialization section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightsSection {
    pub init: String,
    pub mu: f32,
    #[serde(alias = "sigma")]
    pub std: f32,
    pub scale: f32,
    pub seed: u64,
}

impl Default for WeightsSection {
    fn default() -> Self {
        Self {
            init: "normal".to_string(),
            mu: 0.0,
            std: 1.0,
            scale: 1.0,
            seed: 42,
        }
    }
}

/// Training loop section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingSection {
    pub epochs: usize,
    /// Shuffling seed
    pub seed: u64,
    /// Where `train` writes the fitted weights
    pub output: PathBuf,
}

impl Default for TrainingSection {
    fn default() -> Self {
        Self {
            epochs: 100,
            seed: 42,
            output: PathBuf::from("weights.bin"),
        }
    }
}

/// Dataset section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSection {
    pub dataset: String,
    /// MNIST image file, or CIFAR-10 batch files
    pub files: Vec<PathBuf>,
    /// MNIST label file
    pub labels: Option<PathBuf>,
    pub normalize: bool,
    pub binarize: bool,
    /// Use only the first `max_samples` samples
    pub max_samples: Option<usize>,
}

impl Default for DataSection {
    fn default() -> Self {
        Self {
            dataset: "mnist".to_string(),
            files: vec![PathBuf::from("data/train-images-idx3-ubyte")],
            labels: None,
            normalize: true,
            binarize: false,
            max_samples: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub model: ModelSection,
    pub optimizer: OptimizerSection,
    pub weights: WeightsSection,
    pub training: TrainingSection,
    pub data: DataSection,
    pub logging: LoggingSection,
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from file or use default
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn rule(&self) -> Result<RuleKind> {
        self.model.rule.parse()
    }

    pub fn model_config(&self) -> ModelConfig {
        ModelConfig {
            outputs: self.model.outputs,
            batch_size: self.model.batch_size,
            epochs_for_convergency: self.model.epochs_for_convergency,
            convergency_atol: self.model.convergency_atol,
            weight_decay: self.model.weight_decay,
            verbose: self.model.verbose,
        }
    }

    pub fn bcm_params(&self) -> Result<BcmParams> {
        Ok(BcmParams {
            activation: self.model.activation.parse::<ActivationType>()?,
            interaction_strength: self.model.interaction_strength,
            memory_factor: self.model.memory_factor,
        })
    }

    pub fn hopfield_params(&self) -> HopfieldParams {
        HopfieldParams {
            delta: self.model.delta,
            p: self.model.p,
            k: self.model.k,
        }
    }

    pub fn optimizer(&self) -> Result<Optimizer> {
        let section = &self.optimizer;
        let params = OptimizerParams {
            learning_rate: section.learning_rate,
            momentum: section.momentum,
            decay: section.decay,
            beta1: section.beta1,
            beta2: section.beta2,
            rho: section.rho,
            l2norm: section.l2norm,
            clip: section.clip,
        };
        Optimizer::new(section.kind.parse()?, params)
    }

    pub fn weight_initializer(&self) -> Result<WeightInitializer> {
        let section = &self.weights;
        let init = WeightInit::from_tag(&section.init, section.mu, section.std, section.scale)?;
        WeightInitializer::new(init, section.seed)
    }

    /// Load and preprocess the dataset named in `[data]`.
    pub fn load_dataset(&self) -> Result<Dataset> {
        let section = &self.data;
        let mut dataset = match section.dataset.parse::<DatasetKind>()? {
            DatasetKind::Mnist => {
                let images = section.files.first().ok_or_else(|| {
                    Error::InvalidConfiguration("[data] files must name the MNIST image file".to_string())
                })?;
                mnist::load(images, section.labels.as_ref())?
            }
            DatasetKind::Cifar10 => {
                if section.files.is_empty() {
                    return Err(Error::InvalidConfiguration(
                        "[data] files must name at least one CIFAR-10 batch".to_string(),
                    ));
                }
                cifar10::load(section.files.as_slice())?
            }
        };

        if let Some(n) = section.max_samples {
            dataset.truncate(n);
        }
        if section.normalize {
            dataset.normalize();
        }
        if section.binarize {
            dataset.binarize();
        }
        Ok(dataset)
    }
}
