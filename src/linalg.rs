//! Dense kernels shared by the learning rules

use ndarray::{Array2, ArrayView2, Zip};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::{Error, Result};

/// Floor used to keep divisions by near-zero values finite
pub const PRECISION: f32 = 1e-30;

const PIVOT_TOLERANCE: f64 = 1e-10;

/// `a · bᵀ`, one output row per row of `a`.
///
/// Rows are computed independently and fan out over rayon when the
/// `parallel` feature is enabled.
pub fn gemm_nt(a: &Array2<f32>, b: ArrayView2<f32>) -> Array2<f32> {
    let mut out = Array2::<f32>::zeros((a.nrows(), b.nrows()));
    let zip = Zip::from(out.rows_mut()).and(a.rows());

    #[cfg(feature = "parallel")]
    zip.par_for_each(|mut row, w| row.assign(&b.dot(&w)));

    #[cfg(not(feature = "parallel"))]
    zip.for_each(|mut row, w| row.assign(&b.dot(&w)));

    out
}

/// Largest absolute value of the matrix (0 when empty)
pub fn max_abs(a: &Array2<f32>) -> f32 {
    #[cfg(feature = "parallel")]
    {
        a.par_iter().map(|x| x.abs()).reduce(|| 0.0, f32::max)
    }

    #[cfg(not(feature = "parallel"))]
    {
        a.iter().fold(0.0, |acc, x| acc.max(x.abs()))
    }
}

/// Inverse of a square matrix by Gauss-Jordan elimination with partial
/// pivoting. Accumulates in `f64`.
pub fn invert(matrix: &Array2<f32>) -> Result<Array2<f32>> {
    let n = matrix.nrows();
    if matrix.ncols() != n {
        return Err(Error::DimensionMismatch(format!(
            "cannot invert a non-square {}x{} matrix",
            n,
            matrix.ncols()
        )));
    }

    // [A | I]
    let mut augmented = Array2::<f64>::zeros((n, 2 * n));
    for i in 0..n {
        for j in 0..n {
            augmented[[i, j]] = matrix[[i, j]] as f64;
        }
        augmented[[i, n + i]] = 1.0;
    }

    for i in 0..n {
        let mut max_row = i;
        for k in (i + 1)..n {
            if augmented[[k, i]].abs() > augmented[[max_row, i]].abs() {
                max_row = k;
            }
        }

        let pivot = augmented[[max_row, i]];
        if pivot.abs() < PIVOT_TOLERANCE {
            return Err(Error::InvalidConfiguration(
                "singular matrix cannot be inverted".to_string(),
            ));
        }

        if max_row != i {
            for j in 0..(2 * n) {
                augmented.swap([i, j], [max_row, j]);
            }
        }

        for j in 0..(2 * n) {
            augmented[[i, j]] /= pivot;
        }

        for k in 0..n {
            if k != i {
                let factor = augmented[[k, i]];
                if factor == 0.0 {
                    continue;
                }
                for j in 0..(2 * n) {
                    augmented[[k, j]] -= factor * augmented[[i, j]];
                }
            }
        }
    }

    Ok(Array2::from_shape_fn((n, n), |(i, j)| augmented[[i, n + j]] as f32))
}
