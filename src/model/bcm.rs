//! Bienenstock-Cooper-Munro plasticity
//!
//! Each output keeps a sliding threshold `theta`, an exponential moving
//! average of its mean squared response. Responses above the threshold
//! potentiate the incoming weights, responses below depress them.

use ndarray::{Array1, Array2, ArrayView2, Axis, Zip};
use serde::{Deserialize, Serialize};

use super::{PlasticityModel, PlasticityRule};
use crate::activation::ActivationType;
use crate::error::{Error, Result};
use crate::linalg::{gemm_nt, invert, PRECISION};

/// BCM model
pub type Bcm = PlasticityModel<BcmRule>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BcmParams {
    /// Transfer function applied to the (interacting) outputs
    pub activation: ActivationType,
    /// Strength of the lateral inhibition between outputs, 0 disables it
    pub interaction_strength: f32,
    /// Weight of the previous theta in its moving average, within [0, 1]
    pub memory_factor: f32,
}

impl Default for BcmParams {
    fn default() -> Self {
        Self {
            activation: ActivationType::Logistic,
            interaction_strength: 0.0,
            memory_factor: 0.5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BcmRule {
    activation: ActivationType,
    interaction_matrix: Array2<f32>,
    lateral: bool,
    memory_factor: f32,
}

impl BcmRule {
    /// (outputs x outputs) matrix applied to the raw responses
    pub fn interaction_matrix(&self) -> &Array2<f32> {
        &self.interaction_matrix
    }

    pub fn activation(&self) -> ActivationType {
        self.activation
    }

    pub fn memory_factor(&self) -> f32 {
        self.memory_factor
    }
}

/// Inverse of `M`, with `M[i][i] = 1` and `M[i][j] = -strength`.
fn interaction_matrix(outputs: usize, strength: f32) -> Result<Array2<f32>> {
    if strength == 0.0 {
        return Ok(Array2::eye(outputs));
    }
    let m = Array2::from_shape_fn((outputs, outputs), |(i, j)| if i == j { 1.0 } else { -strength });
    invert(&m).map_err(|_| {
        Error::InvalidConfiguration(format!(
            "interaction_strength {} makes the interaction matrix singular for {} outputs",
            strength, outputs
        ))
    })
}

impl PlasticityRule for BcmRule {
    type Params = BcmParams;

    fn new(outputs: usize, params: BcmParams) -> Result<Self> {
        if !(0.0..=1.0).contains(&params.memory_factor) {
            return Err(Error::InvalidConfiguration(format!(
                "memory_factor must lie in [0, 1], got {}",
                params.memory_factor
            )));
        }
        if !params.interaction_strength.is_finite() {
            return Err(Error::InvalidConfiguration(format!(
                "interaction_strength must be finite, got {}",
                params.interaction_strength
            )));
        }

        Ok(Self {
            activation: params.activation,
            interaction_matrix: interaction_matrix(outputs, params.interaction_strength)?,
            lateral: params.interaction_strength != 0.0,
            memory_factor: params.memory_factor,
        })
    }

    fn name(&self) -> &'static str {
        "bcm"
    }

    fn forward(&self, weights: &Array2<f32>, data: ArrayView2<f32>) -> Array2<f32> {
        let mut output = gemm_nt(weights, data);
        if self.lateral {
            output = self.interaction_matrix.dot(&output);
        }
        self.activation.activate_inplace(&mut output);
        output
    }

    fn weights_update(
        &self,
        data: ArrayView2<f32>,
        output: &Array2<f32>,
        _weights: &Array2<f32>,
        theta: &mut Array1<f32>,
    ) -> Array2<f32> {
        let batch_size = data.nrows().max(1) as f32;
        let outputs = output.nrows();
        if theta.len() != outputs {
            *theta = Array1::zeros(outputs);
        }

        let theta_batch =
            output.map_axis(Axis(1), |row| row.iter().map(|o| o * o).sum::<f32>() / row.len().max(1) as f32);
        let memory = self.memory_factor;
        Zip::from(&mut *theta)
            .and(&theta_batch)
            .for_each(|t, &tb| *t = memory * *t + (1.0 - memory) * tb);

        let mut phi = output.clone();
        Zip::from(phi.rows_mut()).and(&*theta).for_each(|mut row, &t| {
            row.mapv_inplace(|o| o * (o - t) / (t + PRECISION));
        });

        let mut grad = phi.dot(&data);
        grad.mapv_inplace(|g| -g / batch_size);
        grad
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn rule(outputs: usize, params: BcmParams) -> BcmRule {
        BcmRule::new(outputs, params).unwrap()
    }

    #[test]
    fn test_zero_interaction_is_identity() {
        let r = rule(4, BcmParams::default());
        assert_eq!(r.interaction_matrix(), &Array2::<f32>::eye(4));
    }

    #[test]
    fn test_interaction_matrix_inverse() {
        let params = BcmParams {
            interaction_strength: 0.2,
            ..BcmParams::default()
        };
        let r = rule(3, params);
        let m = Array2::from_shape_fn((3, 3), |(i, j)| if i == j { 1.0f32 } else { -0.2 });
        let identity = m.dot(r.interaction_matrix());
        for ((i, j), &x) in identity.indexed_iter() {
            assert_relative_eq!(x, if i == j { 1.0 } else { 0.0 }, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_singular_interaction_rejected() {
        let params = BcmParams {
            interaction_strength: 0.5,
            ..BcmParams::default()
        };
        let err = BcmRule::new(3, params).unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[test]
    fn test_invalid_memory_factor() {
        let params = BcmParams {
            memory_factor: 1.5,
            ..BcmParams::default()
        };
        assert!(BcmRule::new(2, params).is_err());
    }

    #[test]
    fn test_forward_applies_activation() {
        let r = rule(2, BcmParams::default());
        let w = array![[1.0f32, 0.0], [0.0, -1.0]];
        let x = array![[2.0f32, 3.0]];
        let out = r.forward(&w, x.view());
        assert_eq!(out.dim(), (2, 1));
        assert_relative_eq!(out[[0, 0]], ActivationType::Logistic.activate(2.0), epsilon = 1e-6);
        assert_relative_eq!(out[[1, 0]], ActivationType::Logistic.activate(-3.0), epsilon = 1e-6);
    }

    #[test]
    fn test_forward_with_lateral_interaction() {
        let params = BcmParams {
            interaction_strength: 0.2,
            ..BcmParams::default()
        };
        let r = rule(3, params);
        let w = array![[1.0f32, 0.5], [-0.5, 0.25], [0.0, 1.0]];
        let x = array![[1.0f32, 2.0], [-1.0, 0.5]];

        let m = Array2::from_shape_fn((3, 3), |(i, j)| if i == j { 1.0f32 } else { -0.2 });
        let expected = invert(&m)
            .unwrap()
            .dot(&w.dot(&x.t()))
            .mapv(|v| ActivationType::Logistic.activate(v));

        let out = r.forward(&w, x.view());
        assert_eq!(out.dim(), (3, 2));
        for (a, b) in out.iter().zip(expected.iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-5);
        }
        // differs from the plain response once outputs interact
        let plain = rule(3, BcmParams::default()).forward(&w, x.view());
        assert!(out.iter().zip(plain.iter()).any(|(a, b)| (a - b).abs() > 1e-3));
    }

    #[test]
    fn test_weights_update_hand_computed() {
        let r = rule(
            1,
            BcmParams {
                activation: ActivationType::Linear,
                memory_factor: 0.0,
                ..BcmParams::default()
            },
        );
        let x = array![[1.0f32, 0.0], [0.0, 1.0]];
        let output = array![[1.0f32, 3.0]];
        let mut theta = Array1::zeros(1);
        let grad = r.weights_update(x.view(), &output, &Array2::zeros((1, 2)), &mut theta);

        // theta = (1 + 9) / 2 = 5, phi = [1 * (1 - 5) / 5, 3 * (3 - 5) / 5]
        assert_relative_eq!(theta[0], 5.0, epsilon = 1e-6);
        assert_relative_eq!(grad[[0, 0]], 0.4, epsilon = 1e-6);
        assert_relative_eq!(grad[[0, 1]], 0.6, epsilon = 1e-6);
    }

    #[test]
    fn test_theta_moving_average() {
        let r = rule(1, BcmParams::default());
        let x = array![[1.0f32]];
        let mut theta = array![2.0f32];
        r.weights_update(x.view(), &array![[2.0f32]], &Array2::zeros((1, 1)), &mut theta);
        // 0.5 * 2 + 0.5 * 4
        assert_relative_eq!(theta[0], 3.0, epsilon = 1e-6);
    }
}
