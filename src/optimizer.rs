//! Optimization Algorithms
//!
//! Applies a gradient-like update matrix to the weights with one of:
//! - SGD (Stochastic Gradient Descent)
//! - SGD with Momentum and Nesterov momentum
//! - AdaGrad, RMSProp, AdaDelta
//! - AdaMax and Adam (Adaptive Moment Estimation)
//!
//! Every rule shares the same two accumulators `m` and `v`, shaped like the
//! weight matrix. The learning rate decays after each update.

use std::fmt;
use std::str::FromStr;

use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const EPSILON: f32 = 1e-6;

/// Update rule families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerKind {
    Sgd,
    Momentum,
    Nesterov,
    AdaGrad,
    RmsProp,
    AdaDelta,
    AdaMax,
    Adam,
}

impl OptimizerKind {
    pub const ALL: [OptimizerKind; 8] = [
        OptimizerKind::Sgd,
        OptimizerKind::Momentum,
        OptimizerKind::Nesterov,
        OptimizerKind::AdaGrad,
        OptimizerKind::RmsProp,
        OptimizerKind::AdaDelta,
        OptimizerKind::AdaMax,
        OptimizerKind::Adam,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            OptimizerKind::Sgd => "sgd",
            OptimizerKind::Momentum => "momentum",
            OptimizerKind::Nesterov => "nesterov",
            OptimizerKind::AdaGrad => "adagrad",
            OptimizerKind::RmsProp => "rmsprop",
            OptimizerKind::AdaDelta => "adadelta",
            OptimizerKind::AdaMax => "adamax",
            OptimizerKind::Adam => "adam",
        }
    }
}

impl fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OptimizerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let tag = s.trim().to_lowercase().replace('_', "");
        OptimizerKind::ALL
            .iter()
            .copied()
            .find(|k| k.name() == tag)
            .ok_or_else(|| Error::unknown_tag("optimizer", s))
    }
}

/// Hyper-parameters shared by all update rules
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerParams {
    pub learning_rate: f32,
    pub momentum: f32,
    pub decay: f32,
    pub beta1: f32,
    pub beta2: f32,
    pub rho: f32,
    /// Rescale the update to unit L2 norm before applying the rule
    pub l2norm: bool,
    /// Clamp every update element into [-1, 1] before applying the rule
    pub clip: bool,
}

impl Default for OptimizerParams {
    fn default() -> Self {
        Self {
            learning_rate: 2e-2,
            momentum: 0.9,
            decay: 1e-4,
            beta1: 0.9,
            beta2: 0.999,
            rho: 0.0,
            l2norm: false,
            clip: false,
        }
    }
}

impl OptimizerParams {
    fn validate(&self) -> Result<()> {
        if !(self.learning_rate.is_finite() && self.learning_rate >= 0.0) {
            return Err(Error::InvalidConfiguration(format!(
                "learning_rate must be >= 0, got {}",
                self.learning_rate
            )));
        }
        if !(self.decay.is_finite() && self.decay >= 0.0) {
            return Err(Error::InvalidConfiguration(format!(
                "decay must be >= 0, got {}",
                self.decay
            )));
        }
        for (name, value) in [("beta1", self.beta1), ("beta2", self.beta2)] {
            if !(0.0..1.0).contains(&value) {
                return Err(Error::InvalidConfiguration(format!(
                    "{} must lie in [0, 1), got {}",
                    name, value
                )));
            }
        }
        for (name, value) in [("momentum", self.momentum), ("rho", self.rho)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::InvalidConfiguration(format!(
                    "{} must lie in [0, 1], got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Stateful optimizer
#[derive(Debug, Clone)]
pub struct Optimizer {
    kind: OptimizerKind,
    params: OptimizerParams,
    learning_rate: f32,
    m: Array2<f32>,
    v: Array2<f32>,
}

impl Optimizer {
    pub fn new(kind: OptimizerKind, params: OptimizerParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            kind,
            params,
            learning_rate: params.learning_rate,
            m: Array2::zeros((0, 0)),
            v: Array2::zeros((0, 0)),
        })
    }

    /// Plain SGD with the given learning rate and no decay
    pub fn sgd(learning_rate: f32) -> Result<Self> {
        Self::new(
            OptimizerKind::Sgd,
            OptimizerParams {
                learning_rate,
                decay: 0.0,
                ..OptimizerParams::default()
            },
        )
    }

    pub fn kind(&self) -> OptimizerKind {
        self.kind
    }

    pub fn params(&self) -> &OptimizerParams {
        &self.params
    }

    /// Current (decayed) learning rate
    pub fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    /// Zero the accumulators for a (rows x cols) weight matrix and restore
    /// the initial learning rate.
    pub fn init(&mut self, rows: usize, cols: usize) {
        self.m = Array2::zeros((rows, cols));
        self.v = Array2::zeros((rows, cols));
        self.learning_rate = self.params.learning_rate;
    }

    /// Apply one update step. `iteration` counts from 1.
    pub fn update(
        &mut self,
        iteration: usize,
        weights: &mut Array2<f32>,
        gradient: &Array2<f32>,
    ) -> Result<()> {
        let expected = self.m.dim();
        if weights.dim() != expected {
            return Err(Error::weights_shape(weights.dim(), expected));
        }
        if gradient.dim() != expected {
            return Err(Error::weights_shape(gradient.dim(), expected));
        }

        let preprocessed;
        let gradient = if self.params.l2norm || self.params.clip {
            preprocessed = self.preprocess(gradient);
            &preprocessed
        } else {
            gradient
        };

        let lr = self.learning_rate;
        let OptimizerParams {
            momentum,
            beta1,
            beta2,
            rho,
            ..
        } = self.params;
        let t = iteration.max(1) as f32;
        let (m, v) = (&mut self.m, &mut self.v);

        match self.kind {
            OptimizerKind::Sgd => for_each_weight(weights, gradient, m, v, |w, g, _, _| {
                *w -= lr * g;
            }),
            OptimizerKind::Momentum => for_each_weight(weights, gradient, m, v, |w, g, _, v| {
                *v = momentum * *v - lr * g;
                *w += *v;
            }),
            OptimizerKind::Nesterov => for_each_weight(weights, gradient, m, v, |w, g, _, v| {
                *v = momentum * *v - lr * g;
                *w += momentum * *v - lr * g;
            }),
            OptimizerKind::AdaGrad => for_each_weight(weights, gradient, m, v, |w, g, _, v| {
                *v += g * g;
                *w -= lr * g / (v.sqrt() + EPSILON);
            }),
            OptimizerKind::RmsProp => for_each_weight(weights, gradient, m, v, |w, g, _, v| {
                *v = rho * *v + (1.0 - rho) * g * g;
                *w -= lr * g / (v.sqrt() + EPSILON);
            }),
            OptimizerKind::AdaDelta => for_each_weight(weights, gradient, m, v, |w, g, m, v| {
                *v = rho * *v + (1.0 - rho) * g * g;
                let delta = g * (m.sqrt() + EPSILON) / (v.sqrt() + EPSILON);
                *w -= lr * delta;
                *m = rho * *m + (1.0 - rho) * delta * delta;
            }),
            OptimizerKind::AdaMax => {
                let a_t = lr / (1.0 - beta1.powf(t));
                for_each_weight(weights, gradient, m, v, |w, g, m, v| {
                    *m = beta1 * *m + (1.0 - beta1) * g;
                    *v = (beta2 * *v).max(g.abs());
                    *w -= a_t * *m / (*v + EPSILON);
                })
            }
            OptimizerKind::Adam => {
                let a_t = lr * (1.0 - beta2.powf(t)).sqrt() / (1.0 - beta1.powf(t));
                for_each_weight(weights, gradient, m, v, |w, g, m, v| {
                    *m = beta1 * *m + (1.0 - beta1) * g;
                    *v = beta2 * *v + (1.0 - beta2) * g * g;
                    *w -= a_t * *m / (v.sqrt() + EPSILON);
                })
            }
        }

        self.learning_rate = (lr / (self.params.decay * t + 1.0)).max(0.0);
        Ok(())
    }

    fn preprocess(&self, gradient: &Array2<f32>) -> Array2<f32> {
        let mut g = gradient.to_owned();
        if self.params.l2norm {
            let norm = g.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 0.0 {
                g.mapv_inplace(|x| x / norm);
            }
        }
        if self.params.clip {
            g.mapv_inplace(|x| x.clamp(-1.0, 1.0));
        }
        g
    }
}

/// Elementwise visit of (weight, gradient, m, v), fanned out over rayon
/// when the `parallel` feature is enabled.
fn for_each_weight<F>(
    weights: &mut Array2<f32>,
    gradient: &Array2<f32>,
    m: &mut Array2<f32>,
    v: &mut Array2<f32>,
    f: F,
) where
    F: Fn(&mut f32, f32, &mut f32, &mut f32) + Send + Sync,
{
    let zip = Zip::from(weights).and(gradient).and(m).and(v);

    #[cfg(feature = "parallel")]
    zip.par_for_each(|w, &g, m, v| f(w, g, m, v));

    #[cfg(not(feature = "parallel"))]
    zip.for_each(|w, &g, m, v| f(w, g, m, v));
}
