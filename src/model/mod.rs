//! Plasticity models
//!
//! A [`PlasticityModel`] owns a single (outputs x features) weight matrix and
//! trains it batch by batch with a local update rule instead of
//! backpropagation. The rule is pluggable through [`PlasticityRule`]:
//! - [`BcmRule`]: Bienenstock-Cooper-Munro with an optional lateral
//!   interaction between the outputs
//! - [`HopfieldRule`]: Krotov-Hopfield competitive rule with Lebesgue-norm
//!   weights

pub mod bcm;
pub mod convergence;
pub mod hopfield;
mod io;

use std::fmt;
use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use ndarray::{s, Array1, Array2, ArrayView2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::optimizer::Optimizer;
use crate::weights::WeightInitializer;

pub use bcm::{Bcm, BcmParams, BcmRule};
pub use convergence::ConvergenceTracker;
pub use hopfield::{Hopfield, HopfieldParams, HopfieldRule};

/// Local weight-update rule plugged into [`PlasticityModel`]
pub trait PlasticityRule: Clone + fmt::Debug + Send + Sync {
    /// Rule specific hyper-parameters
    type Params: Clone + fmt::Debug + Default;

    /// Validate the parameters and precompute whatever the rule needs for
    /// `outputs` units.
    fn new(outputs: usize, params: Self::Params) -> Result<Self>;

    fn name(&self) -> &'static str;

    /// Called on the weights before every batch
    fn normalize_weights(&self, _weights: &mut Array2<f32>) {}

    /// Training forward pass: (outputs x batch) response to `data` (batch x features)
    fn forward(&self, weights: &Array2<f32>, data: ArrayView2<f32>) -> Array2<f32>;

    /// Gradient-like update for the optimizer, shaped like `weights`.
    /// `theta` is updated in place.
    fn weights_update(
        &self,
        data: ArrayView2<f32>,
        output: &Array2<f32>,
        weights: &Array2<f32>,
        theta: &mut Array1<f32>,
    ) -> Array2<f32>;

    /// Inference pass; never mutates the weights
    fn predict(&self, weights: &Array2<f32>, data: ArrayView2<f32>) -> Array2<f32> {
        self.forward(weights, data)
    }
}

/// Training hyper-parameters shared by every rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Number of output units (rows of the weight matrix)
    pub outputs: usize,
    pub batch_size: usize,
    /// Epochs of theta history compared before declaring convergence
    pub epochs_for_convergency: usize,
    pub convergency_atol: f32,
    pub weight_decay: f32,
    /// Show a progress bar during `fit`
    pub verbose: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            outputs: 100,
            batch_size: 100,
            epochs_for_convergency: 1,
            convergency_atol: 1e-2,
            weight_decay: 0.0,
            verbose: false,
        }
    }
}

impl ModelConfig {
    pub fn validate(&self) -> Result<()> {
        if self.outputs == 0 {
            return Err(Error::InvalidConfiguration(
                "outputs must be greater than zero".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(Error::InvalidConfiguration(
                "batch_size must be greater than zero".to_string(),
            ));
        }
        if self.epochs_for_convergency == 0 {
            return Err(Error::InvalidConfiguration(
                "epochs_for_convergency must be at least 1".to_string(),
            ));
        }
        if !(self.convergency_atol.is_finite() && self.convergency_atol >= 0.0) {
            return Err(Error::InvalidConfiguration(format!(
                "convergency_atol must be >= 0, got {}",
                self.convergency_atol
            )));
        }
        if !self.weight_decay.is_finite() {
            return Err(Error::InvalidConfiguration(format!(
                "weight_decay must be finite, got {}",
                self.weight_decay
            )));
        }
        Ok(())
    }
}

/// Outcome of a call to [`PlasticityModel::fit`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitSummary {
    pub epochs_run: usize,
    pub converged: bool,
    /// Number of optimizer steps taken
    pub iterations: usize,
    /// Learning rate left after the last decay
    pub learning_rate: f32,
}

/// Single-layer unsupervised model trained with a plasticity rule
#[derive(Debug, Clone)]
pub struct PlasticityModel<R: PlasticityRule> {
    config: ModelConfig,
    rule: R,
    optimizer: Optimizer,
    initializer: WeightInitializer,
    weights: Array2<f32>,
    theta: Array1<f32>,
    convergence: ConvergenceTracker,
}

impl<R: PlasticityRule> PlasticityModel<R> {
    /// Create an unfitted model. Rule parameters are validated here.
    pub fn new(
        config: ModelConfig,
        params: R::Params,
        optimizer: Optimizer,
        initializer: WeightInitializer,
    ) -> Result<Self> {
        config.validate()?;
        let rule = R::new(config.outputs, params)?;
        let convergence =
            ConvergenceTracker::new(config.epochs_for_convergency, config.convergency_atol);

        Ok(Self {
            rule,
            optimizer,
            initializer,
            weights: Array2::zeros((0, 0)),
            theta: Array1::zeros(config.outputs),
            convergence,
            config,
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn rule(&self) -> &R {
        &self.rule
    }

    pub fn optimizer(&self) -> &Optimizer {
        &self.optimizer
    }

    /// Current weight matrix, empty until fitted or loaded
    pub fn weights(&self) -> &Array2<f32> {
        &self.weights
    }

    /// Per-output theta of the last batch
    pub fn theta(&self) -> &Array1<f32> {
        &self.theta
    }

    pub fn is_fitted(&self) -> bool {
        self.weights.nrows() > 0 && self.weights.ncols() > 0
    }

    /// Train on `data` (n_samples x n_features) for at most `num_epochs`.
    ///
    /// Weights and optimizer state are reallocated on every call. The data is
    /// cut into contiguous batches of `batch_size` rows, never copied, and the
    /// batch order is shuffled once per epoch with a generator seeded by
    /// `seed`. The trailing `n_samples % batch_size` samples are skipped.
    pub fn fit(&mut self, data: ArrayView2<f32>, num_epochs: usize, seed: u64) -> Result<FitSummary> {
        let (n_samples, n_features) = data.dim();
        let batch_size = self.config.batch_size;
        let outputs = self.config.outputs;

        if batch_size > n_samples {
            return Err(Error::InvalidConfiguration(format!(
                "batch_size ({}) exceeds the number of samples ({})",
                batch_size, n_samples
            )));
        }
        if n_features == 0 {
            return Err(Error::InvalidConfiguration(
                "input data has no features".to_string(),
            ));
        }

        self.weights = self.initializer.init(outputs, n_features);
        self.optimizer.init(outputs, n_features);
        self.theta = Array1::zeros(outputs);
        self.convergence.reset();

        let n_batches = n_samples / batch_size;
        let dropped = n_samples % batch_size;
        if dropped > 0 {
            warn!(
                "{} samples do not fill a batch of {} and are skipped every epoch",
                dropped, batch_size
            );
        }

        info!(
            rule = self.rule.name(),
            n_samples,
            n_features,
            outputs,
            num_epochs,
            "Starting training"
        );

        let mut rng = StdRng::seed_from_u64(seed);
        let mut order: Vec<usize> = (0..n_batches).collect();
        let pb = self.progress_bar((n_batches * num_epochs) as u64);

        let mut iteration = 0;
        let mut epochs_run = 0;
        let mut converged = false;

        for epoch in 0..num_epochs {
            pb.set_message(format!("epoch {}/{}", epoch + 1, num_epochs));

            order.shuffle(&mut rng);

            for &b in &order {
                let batch = data.slice(s![b * batch_size..(b + 1) * batch_size, ..]);
                iteration += 1;
                self.step(iteration, batch)?;
                pb.inc(1);
            }

            epochs_run = epoch + 1;
            debug!(
                epoch = epochs_run,
                learning_rate = self.optimizer.learning_rate(),
                "Epoch complete"
            );

            if self.convergence.check(&self.theta) {
                converged = true;
                info!("Converged after {} epochs", epochs_run);
                break;
            }
        }

        pb.finish_and_clear();

        Ok(FitSummary {
            epochs_run,
            converged,
            iterations: iteration,
            learning_rate: self.optimizer.learning_rate(),
        })
    }

    /// Encode `data` (n_samples x n_features) into an (outputs x n_samples) matrix.
    pub fn predict(&self, data: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.check_is_fitted()?;
        self.check_dims(data)?;
        Ok(self.rule.predict(&self.weights, data))
    }

    /// `fit` followed by `predict` on the same data
    pub fn fit_transform(
        &mut self,
        data: ArrayView2<f32>,
        num_epochs: usize,
        seed: u64,
    ) -> Result<Array2<f32>> {
        self.fit(data, num_epochs, seed)?;
        self.predict(data)
    }

    /// Write the weights as `[i64 rows][i64 cols][f32 ...]`, little-endian.
    pub fn save_weights<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.check_is_fitted()?;
        io::write_weights(path.as_ref(), &self.weights)?;
        info!("Saved weights to {}", path.as_ref().display());
        Ok(())
    }

    /// Replace the weights with the content of a file written by
    /// [`PlasticityModel::save_weights`].
    ///
    /// The column count is taken from the file, but the row count must match
    /// `outputs`: theta, the convergence history and the BCM interaction
    /// matrix are all sized at construction, so a model is never resized to
    /// a different number of outputs on load.
    pub fn load_weights<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let weights = io::read_weights(path.as_ref())?;
        if weights.nrows() != self.config.outputs {
            return Err(Error::DimensionMismatch(format!(
                "Invalid number of weights found. The file holds {} rows but the model has {} outputs",
                weights.nrows(),
                self.config.outputs
            )));
        }
        self.weights = weights;
        info!(
            "Loaded {}x{} weights from {}",
            self.weights.nrows(),
            self.weights.ncols(),
            path.as_ref().display()
        );
        Ok(())
    }

    fn step(&mut self, iteration: usize, batch: ArrayView2<f32>) -> Result<()> {
        self.rule.normalize_weights(&mut self.weights);
        let output = self.rule.forward(&self.weights, batch);
        let mut grad = self
            .rule
            .weights_update(batch, &output, &self.weights, &mut self.theta);

        if self.config.weight_decay != 0.0 {
            grad.scaled_add(-self.config.weight_decay, &self.weights);
        }

        self.optimizer.update(iteration, &mut self.weights, &grad)
    }

    fn check_is_fitted(&self) -> Result<()> {
        if self.is_fitted() {
            Ok(())
        } else {
            Err(Error::NotFitted)
        }
    }

    fn check_dims(&self, data: ArrayView2<f32>) -> Result<()> {
        if data.ncols() == self.weights.ncols() {
            Ok(())
        } else {
            Err(Error::inconsistent_features(self.weights.ncols()))
        }
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.config.verbose {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }
}
