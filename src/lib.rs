//! # Plasticity
//!
//! Unsupervised single-layer models trained with local, biologically
//! inspired update rules instead of backpropagation.
//!
//! ## Modules
//!
//! - `model`: training loop, convergence detection, weight persistence and
//!   the BCM and Hopfield/Krotov rules
//! - `optimizer`: SGD, Momentum, Nesterov, AdaGrad, RMSProp, AdaDelta, AdaMax, Adam
//! - `weights`: seeded weight initializers
//! - `activation`: transfer functions and their derivatives
//! - `data`: in-memory datasets, MNIST and CIFAR-10 loaders
//! - `utils`: configuration and logging
//!
//! ## Example
//!
//! ```no_run
//! use plasticity::{Bcm, BcmParams, ModelConfig, Optimizer, WeightInit, WeightInitializer};
//! use ndarray::Array2;
//!
//! fn main() -> plasticity::Result<()> {
//!     let data = Array2::<f32>::zeros((1000, 784));
//!
//!     let config = ModelConfig { outputs: 100, batch_size: 100, ..ModelConfig::default() };
//!     let mut model = Bcm::new(
//!         config,
//!         BcmParams::default(),
//!         Optimizer::sgd(2e-2)?,
//!         WeightInitializer::new(WeightInit::Normal { mu: 0.0, sigma: 1.0 }, 42)?,
//!     )?;
//!
//!     model.fit(data.view(), 10, 42)?;
//!     let features = model.predict(data.view())?;
//!     model.save_weights("bcm.bin")?;
//!     println!("{:?}", features.dim());
//!     Ok(())
//! }
//! ```

pub mod activation;
pub mod data;
pub mod error;
pub mod linalg;
pub mod model;
pub mod optimizer;
pub mod utils;
pub mod weights;

// Re-export main types for convenience
pub use activation::ActivationType;
pub use data::{Dataset, DatasetKind};
pub use error::{Error, Result};
pub use model::{
    Bcm, BcmParams, BcmRule, ConvergenceTracker, FitSummary, Hopfield, HopfieldParams,
    HopfieldRule, ModelConfig, PlasticityModel, PlasticityRule,
};
pub use optimizer::{Optimizer, OptimizerKind, OptimizerParams};
pub use utils::{setup_logging, Config, RuleKind};
pub use weights::{WeightInit, WeightInitializer};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
