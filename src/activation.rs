//! Activation Functions
//!
//! Pointwise transfer functions and their derivatives. Every derivative is
//! evaluated on the *output* of the activation (`gradient(activate(x))`),
//! which is the form the learning rules consume.

use std::fmt;
use std::str::FromStr;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Pointwise scalar function
pub type Transfer = fn(f32) -> f32;

const LEAKY_COEFF: f32 = 0.1;
const ELLIOT_STEEPNESS: f32 = 1.0;
const SELU_LAMBDA: f32 = 1.0507;
const SELU_ALPHA: f32 = 1.6732;

/// Types of activation functions available
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActivationType {
    /// Logistic sigmoid: 1 / (1 + exp(-x))
    Logistic,
    /// Logistic rescaled into (-1, 1)
    Loggy,
    /// Rectified Linear Unit: max(0, x)
    Relu,
    /// Exponential linear unit
    Elu,
    /// ReLU with a 0.01 slope for negative inputs
    Relie,
    /// ReLU plus a 0.1 linear term
    Ramp,
    /// Identity
    Linear,
    /// Hyperbolic tangent
    Tanh,
    /// Piecewise linear approximation of the logistic
    Plse,
    /// Leaky ReLU with a 0.1 slope
    Leaky,
    /// Staircase function
    Stair,
    /// Hard tanh clipped into [0, 1]
    Hardtan,
    /// Leaky hard tanh
    Lhtan,
    /// Scaled exponential linear unit
    Selu,
    /// Elliot sigmoid into (0, 1)
    Elliot,
    /// Symmetric Elliot sigmoid into (-1, 1)
    SymmElliot,
    /// ln(1 + exp(x))
    Softplus,
    /// x / (1 + |x|)
    Softsign,
    /// Asymmetric logistic with a wide positive range
    AsymmLogistic,
}

impl ActivationType {
    /// All available activation functions
    pub const ALL: [ActivationType; 19] = [
        ActivationType::Logistic,
        ActivationType::Loggy,
        ActivationType::Relu,
        ActivationType::Elu,
        ActivationType::Relie,
        ActivationType::Ramp,
        ActivationType::Linear,
        ActivationType::Tanh,
        ActivationType::Plse,
        ActivationType::Leaky,
        ActivationType::Stair,
        ActivationType::Hardtan,
        ActivationType::Lhtan,
        ActivationType::Selu,
        ActivationType::Elliot,
        ActivationType::SymmElliot,
        ActivationType::Softplus,
        ActivationType::Softsign,
        ActivationType::AsymmLogistic,
    ];

    /// Configuration tag of the function
    pub fn name(&self) -> &'static str {
        match self {
            ActivationType::Logistic => "logistic",
            ActivationType::Loggy => "loggy",
            ActivationType::Relu => "relu",
            ActivationType::Elu => "elu",
            ActivationType::Relie => "relie",
            ActivationType::Ramp => "ramp",
            ActivationType::Linear => "linear",
            ActivationType::Tanh => "tanh",
            ActivationType::Plse => "plse",
            ActivationType::Leaky => "leaky",
            ActivationType::Stair => "stair",
            ActivationType::Hardtan => "hardtan",
            ActivationType::Lhtan => "lhtan",
            ActivationType::Selu => "selu",
            ActivationType::Elliot => "elliot",
            ActivationType::SymmElliot => "symm_elliot",
            ActivationType::Softplus => "softplus",
            ActivationType::Softsign => "softsign",
            ActivationType::AsymmLogistic => "asymm_logistic",
        }
    }

    /// Look up the `(value, gradient)` function pair
    pub fn functions(&self) -> (Transfer, Transfer) {
        match self {
            ActivationType::Logistic => (logistic, g_logistic),
            ActivationType::Loggy => (loggy, g_loggy),
            ActivationType::Relu => (relu, g_relu),
            ActivationType::Elu => (elu, g_elu),
            ActivationType::Relie => (relie, g_relie),
            ActivationType::Ramp => (ramp, g_ramp),
            ActivationType::Linear => (linear, g_linear),
            ActivationType::Tanh => (tanh, g_tanh),
            ActivationType::Plse => (plse, g_plse),
            ActivationType::Leaky => (leaky, g_leaky),
            ActivationType::Stair => (stair, g_stair),
            ActivationType::Hardtan => (hardtan, g_hardtan),
            ActivationType::Lhtan => (lhtan, g_lhtan),
            ActivationType::Selu => (selu, g_selu),
            ActivationType::Elliot => (elliot, g_elliot),
            ActivationType::SymmElliot => (symm_elliot, g_symm_elliot),
            ActivationType::Softplus => (softplus, g_softplus),
            ActivationType::Softsign => (softsign, g_softsign),
            ActivationType::AsymmLogistic => (asymm_logistic, g_asymm_logistic),
        }
    }

    /// Apply the activation function to a scalar
    pub fn activate(&self, x: f32) -> f32 {
        (self.functions().0)(x)
    }

    /// Derivative evaluated on an activated value
    pub fn gradient(&self, y: f32) -> f32 {
        (self.functions().1)(y)
    }

    /// Apply the activation in place to a whole matrix
    pub fn activate_inplace(&self, x: &mut Array2<f32>) {
        if *self == ActivationType::Linear {
            return;
        }
        let f = self.functions().0;
        x.mapv_inplace(f);
    }

    /// Apply the activation to a batch
    pub fn activate_batch(&self, x: &Array2<f32>) -> Array2<f32> {
        x.mapv(self.functions().0)
    }

    /// Derivative for a batch of activated values
    pub fn gradient_batch(&self, y: &Array2<f32>) -> Array2<f32> {
        y.mapv(self.functions().1)
    }
}

impl Default for ActivationType {
    fn default() -> Self {
        ActivationType::Linear
    }
}

impl fmt::Display for ActivationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ActivationType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let tag = s.trim().to_lowercase();
        let tag = match tag.as_str() {
            "sigmoid" => "logistic",
            "relu_leaky" => "leaky",
            other => other,
        };
        ActivationType::ALL
            .iter()
            .copied()
            .find(|a| a.name() == tag)
            .ok_or_else(|| Error::unknown_tag("activation", s))
    }
}

fn linear(x: f32) -> f32 {
    x
}

fn g_linear(_y: f32) -> f32 {
    1.0
}

fn stair(x: f32) -> f32 {
    let n = x.floor();
    if (n as i64) % 2 != 0 {
        (x - n) + (x * 0.5).floor()
    } else {
        (x * 0.5).floor()
    }
}

fn g_stair(y: f32) -> f32 {
    if y.floor() == y {
        0.0
    } else {
        1.0
    }
}

fn hardtan(x: f32) -> f32 {
    if x < -2.5 {
        0.0
    } else if x > 2.5 {
        1.0
    } else {
        0.2 * x + 0.5
    }
}

fn g_hardtan(y: f32) -> f32 {
    if y > -2.5 && y < 2.5 {
        0.2
    } else {
        0.0
    }
}

fn logistic(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

fn g_logistic(y: f32) -> f32 {
    (1.0 - y) * y
}

fn loggy(x: f32) -> f32 {
    2.0 / (1.0 + (-x).exp()) - 1.0
}

fn g_loggy(y: f32) -> f32 {
    let s = (y + 1.0) * 0.5;
    2.0 * (1.0 - s) * s
}

fn relu(x: f32) -> f32 {
    x.max(0.0)
}

fn g_relu(y: f32) -> f32 {
    if y > 0.0 {
        1.0
    } else {
        0.0
    }
}

fn elu(x: f32) -> f32 {
    if x >= 0.0 {
        x
    } else {
        x.exp_m1()
    }
}

fn g_elu(y: f32) -> f32 {
    if y >= 0.0 {
        1.0
    } else {
        y + 1.0
    }
}

fn relie(x: f32) -> f32 {
    if x > 0.0 {
        x
    } else {
        1e-2 * x
    }
}

fn g_relie(y: f32) -> f32 {
    if y > 0.0 {
        1.0
    } else {
        1e-2
    }
}

fn ramp(x: f32) -> f32 {
    x.max(0.0) + 0.1 * x
}

fn g_ramp(y: f32) -> f32 {
    if y > 0.0 {
        1.1
    } else {
        0.1
    }
}

fn leaky(x: f32) -> f32 {
    if x > 0.0 {
        x
    } else {
        LEAKY_COEFF * x
    }
}

fn g_leaky(y: f32) -> f32 {
    if y > 0.0 {
        1.0
    } else {
        LEAKY_COEFF
    }
}

fn tanh(x: f32) -> f32 {
    x.tanh()
}

fn g_tanh(y: f32) -> f32 {
    1.0 - y * y
}

fn plse(x: f32) -> f32 {
    if x < -4.0 {
        1e-2 * (x + 4.0)
    } else if x > 4.0 {
        1e-2 * (x - 4.0) + 1.0
    } else {
        0.125 * x + 0.5
    }
}

fn g_plse(y: f32) -> f32 {
    if y < 0.0 || y > 1.0 {
        1e-2
    } else {
        0.125
    }
}

fn lhtan(x: f32) -> f32 {
    if x < 0.0 {
        1e-3 * x
    } else if x > 1.0 {
        1e-3 * (x - 1.0) + 1.0
    } else {
        x
    }
}

fn g_lhtan(y: f32) -> f32 {
    if y > 0.0 && y < 1.0 {
        1.0
    } else {
        1e-3
    }
}

fn selu(x: f32) -> f32 {
    if x >= 0.0 {
        SELU_LAMBDA * x
    } else {
        SELU_LAMBDA * SELU_ALPHA * x.exp_m1()
    }
}

fn g_selu(y: f32) -> f32 {
    if y >= 0.0 {
        SELU_LAMBDA
    } else {
        y + SELU_LAMBDA * SELU_ALPHA
    }
}

fn elliot(x: f32) -> f32 {
    0.5 * ELLIOT_STEEPNESS * x / (1.0 + (x * ELLIOT_STEEPNESS).abs()) + 0.5
}

fn g_elliot(y: f32) -> f32 {
    let d = 1.0 + (y * ELLIOT_STEEPNESS).abs();
    0.5 * ELLIOT_STEEPNESS / (d * d)
}

fn symm_elliot(x: f32) -> f32 {
    x * ELLIOT_STEEPNESS / (1.0 + (x * ELLIOT_STEEPNESS).abs())
}

fn g_symm_elliot(y: f32) -> f32 {
    let d = 1.0 + (y * ELLIOT_STEEPNESS).abs();
    ELLIOT_STEEPNESS / (d * d)
}

fn softplus(x: f32) -> f32 {
    x.exp().ln_1p()
}

fn g_softplus(y: f32) -> f32 {
    let ey = y.exp();
    ey / (1.0 + ey)
}

fn softsign(x: f32) -> f32 {
    x / (x.abs() + 1.0)
}

fn g_softsign(y: f32) -> f32 {
    let d = y.abs() + 1.0;
    1.0 / (d * d)
}

fn asymm_logistic(x: f32) -> f32 {
    if x < 0.0 {
        -(2.0 / (1.0 + (2.0 * x).exp()) - 1.0)
    } else {
        50.0 * (2.0 / (1.0 + (-2.0 * x / 50.0).exp()) - 1.0)
    }
}

fn g_asymm_logistic(y: f32) -> f32 {
    let par = if y < 0.0 { -1.0 } else { 50.0 };
    let t = y / par;
    (t + 1.0) * (1.0 - t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_logistic() {
        let act = ActivationType::Logistic;
        let y = act.activate(0.0);
        assert_relative_eq!(y, 0.5, epsilon = 1e-6);
        assert_relative_eq!(act.gradient(y), 0.25, epsilon = 1e-6);
    }

    #[test]
    fn test_relu() {
        let x = Array2::from_shape_vec((1, 4), vec![-1.0, 0.0, 1.0, 2.0]).unwrap();
        let y = ActivationType::Relu.activate_batch(&x);
        assert_eq!(y.into_raw_vec(), vec![0.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_gradient_batch_matches_scalar() {
        let x = Array2::from_shape_vec((2, 2), vec![-2.0, 0.0, 0.5, 3.0]).unwrap();
        let act = ActivationType::Logistic;
        let y = act.activate_batch(&x);
        let grad = act.gradient_batch(&y);
        assert_eq!(grad.dim(), (2, 2));
        for (g, &yi) in grad.iter().zip(y.iter()) {
            assert_relative_eq!(*g, yi * (1.0 - yi), epsilon = 1e-6);
        }
    }

    #[test]
    fn test_tanh_gradient_matches_finite_difference() {
        let act = ActivationType::Tanh;
        let x = 0.3f32;
        let h = 1e-3f32;
        let numeric = (act.activate(x + h) - act.activate(x - h)) / (2.0 * h);
        assert_relative_eq!(act.gradient(act.activate(x)), numeric, epsilon = 1e-3);
    }

    #[test]
    fn test_linear_is_identity() {
        let mut x = Array2::from_shape_vec((2, 2), vec![-3.0, 0.5, 2.0, 7.0]).unwrap();
        let expected = x.clone();
        ActivationType::Linear.activate_inplace(&mut x);
        assert_eq!(x, expected);
        assert_eq!(ActivationType::Linear.gradient(123.0), 1.0);
    }

    #[test]
    fn test_bounded_functions() {
        for &x in &[-50.0f32, -1.0, 0.0, 1.0, 50.0] {
            let y = ActivationType::Softsign.activate(x);
            assert!(y > -1.0 && y < 1.0);
            let y = ActivationType::Elliot.activate(x);
            assert!((0.0..=1.0).contains(&y));
            let y = ActivationType::Hardtan.activate(x);
            assert!((0.0..=1.0).contains(&y));
        }
    }

    #[test]
    fn test_parse_tags() {
        assert_eq!("logistic".parse::<ActivationType>().unwrap(), ActivationType::Logistic);
        assert_eq!("Sigmoid".parse::<ActivationType>().unwrap(), ActivationType::Logistic);
        assert_eq!("symm_elliot".parse::<ActivationType>().unwrap(), ActivationType::SymmElliot);
        for act in ActivationType::ALL {
            assert_eq!(act.name().parse::<ActivationType>().unwrap(), act);
        }
        let err = "swishy".parse::<ActivationType>().unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }
}
