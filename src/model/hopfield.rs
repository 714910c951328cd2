//! Krotov-Hopfield competitive plasticity
//!
//! For every sample the strongest output is pulled toward the input while
//! the k-th strongest is pushed away by `delta`. Weights live in a
//! Lebesgue `p`-norm space: before each batch they are mapped through
//! `sign(w)·|w|^(p-1)`.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut1, Axis, Zip};
use serde::{Deserialize, Serialize};

use super::{PlasticityModel, PlasticityRule};
use crate::error::{Error, Result};
use crate::linalg::{gemm_nt, max_abs, PRECISION};

/// Hopfield model
pub type Hopfield = PlasticityModel<HopfieldRule>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HopfieldParams {
    /// Anti-Hebbian strength applied to the k-th ranked output
    pub delta: f32,
    /// Lebesgue norm exponent
    pub p: f32,
    /// Rank of the inhibited output, in [2, outputs]
    pub k: usize,
}

impl Default for HopfieldParams {
    fn default() -> Self {
        Self {
            delta: 0.4,
            p: 2.0,
            k: 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HopfieldRule {
    delta: f32,
    p: f32,
    k: usize,
}

impl HopfieldRule {
    pub fn delta(&self) -> f32 {
        self.delta
    }

    pub fn p(&self) -> f32 {
        self.p
    }

    pub fn k(&self) -> usize {
        self.k
    }

    fn is_euclidean(&self) -> bool {
        self.p == 2.0
    }
}

#[inline]
fn lebesgue(w: f32, p: f32) -> f32 {
    if w == 0.0 {
        0.0
    } else {
        w.signum() * w.abs().powf(p - 1.0)
    }
}

impl PlasticityRule for HopfieldRule {
    type Params = HopfieldParams;

    fn new(outputs: usize, params: HopfieldParams) -> Result<Self> {
        if params.k < 2 {
            return Err(Error::InvalidConfiguration(format!(
                "k must be at least 2, got {}",
                params.k
            )));
        }
        if params.k > outputs {
            return Err(Error::InvalidConfiguration(format!(
                "k ({}) cannot exceed the number of outputs ({})",
                params.k, outputs
            )));
        }
        if !(params.p.is_finite() && params.p > 0.0) {
            return Err(Error::InvalidConfiguration(format!(
                "p must be a positive number, got {}",
                params.p
            )));
        }
        if !params.delta.is_finite() {
            return Err(Error::InvalidConfiguration(format!(
                "delta must be finite, got {}",
                params.delta
            )));
        }

        Ok(Self {
            delta: params.delta,
            p: params.p,
            k: params.k,
        })
    }

    fn name(&self) -> &'static str {
        "hopfield"
    }

    fn normalize_weights(&self, weights: &mut Array2<f32>) {
        if self.is_euclidean() {
            return;
        }
        let p = self.p;

        #[cfg(feature = "parallel")]
        weights.par_mapv_inplace(|w| lebesgue(w, p));

        #[cfg(not(feature = "parallel"))]
        weights.mapv_inplace(|w| lebesgue(w, p));
    }

    fn forward(&self, weights: &Array2<f32>, data: ArrayView2<f32>) -> Array2<f32> {
        gemm_nt(weights, data)
    }

    fn weights_update(
        &self,
        data: ArrayView2<f32>,
        output: &Array2<f32>,
        weights: &Array2<f32>,
        theta: &mut Array1<f32>,
    ) -> Array2<f32> {
        let (k, delta) = (self.k, self.delta);

        // yl: +1 on the winner, -delta on the k-th ranked output, per sample
        let mut yl = Array2::<f32>::zeros(output.dim());
        let rank = |mut y: ArrayViewMut1<f32>, o: ArrayView1<f32>| {
            let mut order: Vec<usize> = (0..o.len()).collect();
            order.sort_by(|&a, &b| o[b].total_cmp(&o[a]));
            y[order[0]] = 1.0;
            y[order[k - 1]] = -delta;
        };
        let zip = Zip::from(yl.columns_mut()).and(output.columns());

        #[cfg(feature = "parallel")]
        zip.par_for_each(rank);

        #[cfg(not(feature = "parallel"))]
        zip.for_each(rank);

        *theta = (&yl * output).sum_axis(Axis(1));

        let mut grad = yl.dot(&data);
        Zip::from(grad.rows_mut())
            .and(weights.rows())
            .and(&*theta)
            .for_each(|mut g, w, &t| g.scaled_add(-t, &w));

        let norm = max_abs(&grad).max(PRECISION);
        grad.mapv_inplace(|g| -g / norm);
        grad
    }

    /// Linear response of the Lebesgue-mapped weights
    fn predict(&self, weights: &Array2<f32>, data: ArrayView2<f32>) -> Array2<f32> {
        if self.is_euclidean() {
            return gemm_nt(weights, data);
        }
        let mut mapped = weights.clone();
        self.normalize_weights(&mut mapped);
        gemm_nt(&mapped, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_k_validation() {
        let err = HopfieldRule::new(10, HopfieldParams { k: 1, ..HopfieldParams::default() })
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));

        assert!(HopfieldRule::new(3, HopfieldParams { k: 4, ..HopfieldParams::default() }).is_err());
        assert!(HopfieldRule::new(3, HopfieldParams { k: 3, ..HopfieldParams::default() }).is_ok());
    }

    #[test]
    fn test_lebesgue_mapping() {
        let rule = HopfieldRule::new(2, HopfieldParams { p: 3.0, ..HopfieldParams::default() })
            .unwrap();
        let mut w = array![[2.0f32, -3.0], [0.0, 0.5]];
        rule.normalize_weights(&mut w);
        assert_relative_eq!(w[[0, 0]], 4.0, epsilon = 1e-6);
        assert_relative_eq!(w[[0, 1]], -9.0, epsilon = 1e-6);
        assert_eq!(w[[1, 0]], 0.0);
        assert_relative_eq!(w[[1, 1]], 0.25, epsilon = 1e-6);
    }

    #[test]
    fn test_euclidean_normalization_is_noop() {
        let rule = HopfieldRule::new(2, HopfieldParams::default()).unwrap();
        let mut w = array![[2.0f32, -3.0], [0.1, 0.5]];
        let expected = w.clone();
        rule.normalize_weights(&mut w);
        assert_eq!(w, expected);
    }

    #[test]
    fn test_weights_update_ranking() {
        let rule = HopfieldRule::new(3, HopfieldParams::default()).unwrap();
        let x = array![[1.0f32, 2.0]];
        let w = Array2::<f32>::zeros((3, 2));
        // one sample: output 2 wins, output 0 is second
        let output = array![[0.5f32], [0.1], [0.9]];
        let mut theta = Array1::zeros(3);
        let grad = rule.weights_update(x.view(), &output, &w, &mut theta);

        assert_relative_eq!(theta[0], -0.4 * 0.5, epsilon = 1e-6);
        assert_eq!(theta[1], 0.0);
        assert_relative_eq!(theta[2], 0.9, epsilon = 1e-6);

        // yl·X = [[-0.4, -0.8], [0, 0], [1, 2]], divided by 2 and negated
        assert_relative_eq!(grad[[2, 0]], -0.5, epsilon = 1e-6);
        assert_relative_eq!(grad[[2, 1]], -1.0, epsilon = 1e-6);
        assert_relative_eq!(grad[[0, 0]], 0.2, epsilon = 1e-6);
        assert_relative_eq!(grad[[0, 1]], 0.4, epsilon = 1e-6);
        assert_eq!(grad[[1, 0]], 0.0);
    }

    #[test]
    fn test_predict_does_not_mutate() {
        let rule = HopfieldRule::new(2, HopfieldParams { p: 3.0, ..HopfieldParams::default() })
            .unwrap();
        let w = array![[2.0f32, 0.0], [0.0, -1.0]];
        let x = array![[1.0f32, 1.0]];
        let out = rule.predict(&w, x.view());
        assert_relative_eq!(out[[0, 0]], 4.0, epsilon = 1e-6);
        assert_relative_eq!(out[[1, 0]], -1.0, epsilon = 1e-6);
        assert_eq!(w[[0, 0]], 2.0);
    }
}
