//! Weight Initialization
//!
//! Initial weight matrices for the plasticity models. The matrix is laid out
//! as (outputs x features) and the fan-in used by the scaled schemes is the
//! number of *rows*, the fan-out the number of columns.

use std::fmt;
use std::str::FromStr;

use ndarray::Array2;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal, Uniform};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Weight initialization schemes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum WeightInit {
    Zeros,
    Ones,
    /// U(-scale, scale)
    Uniform { scale: f32 },
    /// N(mu, sigma)
    Normal { mu: f32, sigma: f32 },
    LecunUniform,
    GlorotUniform,
    LecunNormal,
    GlorotNormal,
    HeUniform,
    HeNormal,
    /// N(mu, sigma) resampled until the draw falls within two sigmas
    TruncatedNormal { mu: f32, sigma: f32 },
}

impl WeightInit {
    /// Configuration tags accepted by [`WeightInit::from_tag`]
    pub const TAGS: [&'static str; 11] = [
        "zeros",
        "ones",
        "uniform",
        "normal",
        "lecun_uniform",
        "glorot_uniform",
        "lecun_normal",
        "glorot_normal",
        "he_uniform",
        "he_normal",
        "truncated_normal",
    ];

    /// Build a scheme from its tag and the shared `mu`/`sigma`/`scale` knobs.
    pub fn from_tag(tag: &str, mu: f32, sigma: f32, scale: f32) -> Result<Self> {
        let init = match tag.parse::<WeightInit>()? {
            WeightInit::Uniform { .. } => WeightInit::Uniform { scale },
            WeightInit::Normal { .. } => WeightInit::Normal { mu, sigma },
            WeightInit::TruncatedNormal { .. } => WeightInit::TruncatedNormal { mu, sigma },
            other => other,
        };
        Ok(init)
    }

    pub fn name(&self) -> &'static str {
        match self {
            WeightInit::Zeros => "zeros",
            WeightInit::Ones => "ones",
            WeightInit::Uniform { .. } => "uniform",
            WeightInit::Normal { .. } => "normal",
            WeightInit::LecunUniform => "lecun_uniform",
            WeightInit::GlorotUniform => "glorot_uniform",
            WeightInit::LecunNormal => "lecun_normal",
            WeightInit::GlorotNormal => "glorot_normal",
            WeightInit::HeUniform => "he_uniform",
            WeightInit::HeNormal => "he_normal",
            WeightInit::TruncatedNormal { .. } => "truncated_normal",
        }
    }

    fn validate(&self) -> Result<()> {
        match *self {
            WeightInit::Uniform { scale } if !(scale >= 0.0 && scale.is_finite()) => {
                Err(Error::InvalidConfiguration(format!(
                    "uniform scale must be a finite non-negative number, got {}",
                    scale
                )))
            }
            WeightInit::Normal { mu, sigma } | WeightInit::TruncatedNormal { mu, sigma }
                if !(sigma >= 0.0 && sigma.is_finite() && mu.is_finite()) =>
            {
                Err(Error::InvalidConfiguration(format!(
                    "normal initializer requires finite mu and sigma >= 0, got mu={} sigma={}",
                    mu, sigma
                )))
            }
            _ => Ok(()),
        }
    }
}

impl Default for WeightInit {
    fn default() -> Self {
        WeightInit::Normal { mu: 0.0, sigma: 1.0 }
    }
}

impl fmt::Display for WeightInit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WeightInit {
    type Err = Error;

    /// Parametrized schemes come back with unit defaults (scale 1, N(0, 1)).
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "zeros" => Ok(WeightInit::Zeros),
            "ones" => Ok(WeightInit::Ones),
            "uniform" => Ok(WeightInit::Uniform { scale: 1.0 }),
            "normal" => Ok(WeightInit::Normal { mu: 0.0, sigma: 1.0 }),
            "lecun_uniform" => Ok(WeightInit::LecunUniform),
            "glorot_uniform" | "xavier_uniform" => Ok(WeightInit::GlorotUniform),
            "lecun_normal" => Ok(WeightInit::LecunNormal),
            "glorot_normal" | "xavier_normal" => Ok(WeightInit::GlorotNormal),
            "he_uniform" => Ok(WeightInit::HeUniform),
            "he_normal" => Ok(WeightInit::HeNormal),
            "truncated_normal" => Ok(WeightInit::TruncatedNormal { mu: 0.0, sigma: 1.0 }),
            _ => Err(Error::unknown_tag("weight initializer", s)),
        }
    }
}

/// Seeded weight initializer
///
/// Every call to [`WeightInitializer::init`] restarts the generator from the
/// stored seed, so two fits with the same configuration start from the same
/// weights.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightInitializer {
    init: WeightInit,
    seed: u64,
}

impl WeightInitializer {
    pub fn new(init: WeightInit, seed: u64) -> Result<Self> {
        init.validate()?;
        Ok(Self { init, seed })
    }

    pub fn kind(&self) -> WeightInit {
        self.init
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Allocate a (rows x cols) matrix filled according to the scheme.
    pub fn init(&self, rows: usize, cols: usize) -> Array2<f32> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let fan_in = rows.max(1) as f32;
        let fan_sum = (rows + cols).max(1) as f32;

        match self.init {
            WeightInit::Zeros => Array2::zeros((rows, cols)),
            WeightInit::Ones => Array2::ones((rows, cols)),
            WeightInit::Uniform { scale } => uniform(rows, cols, scale, &mut rng),
            WeightInit::Normal { mu, sigma } => normal(rows, cols, mu, sigma, &mut rng),
            WeightInit::LecunUniform => uniform(rows, cols, (3.0 / fan_in).sqrt(), &mut rng),
            WeightInit::GlorotUniform => uniform(rows, cols, (6.0 / fan_sum).sqrt(), &mut rng),
            WeightInit::LecunNormal => normal(rows, cols, 0.0, (1.0 / fan_in).sqrt(), &mut rng),
            WeightInit::GlorotNormal => normal(rows, cols, 0.0, (2.0 / fan_sum).sqrt(), &mut rng),
            WeightInit::HeUniform => uniform(rows, cols, (6.0 / fan_in).sqrt(), &mut rng),
            WeightInit::HeNormal => normal(rows, cols, 0.0, (2.0 / fan_in).sqrt(), &mut rng),
            WeightInit::TruncatedNormal { mu, sigma } => {
                truncated_normal(rows, cols, mu, sigma, &mut rng)
            }
        }
    }
}

fn uniform(rows: usize, cols: usize, scale: f32, rng: &mut StdRng) -> Array2<f32> {
    if scale <= 0.0 {
        return Array2::zeros((rows, cols));
    }
    Array2::random_using((rows, cols), Uniform::new(-scale, scale), rng)
}

fn normal(rows: usize, cols: usize, mu: f32, sigma: f32, rng: &mut StdRng) -> Array2<f32> {
    match Normal::new(mu, sigma) {
        Ok(dist) => Array2::random_using((rows, cols), dist, rng),
        // sigma was validated at construction
        Err(_) => Array2::from_elem((rows, cols), mu),
    }
}

fn truncated_normal(rows: usize, cols: usize, mu: f32, sigma: f32, rng: &mut StdRng) -> Array2<f32> {
    let dist = match Normal::new(mu, sigma) {
        Ok(dist) if sigma > 0.0 => dist,
        _ => return Array2::from_elem((rows, cols), mu),
    };
    let bound = 2.0 * sigma;
    Array2::from_shape_simple_fn((rows, cols), || loop {
        let w = dist.sample(rng);
        if (w - mu).abs() < bound {
            break w;
        }
    })
}
