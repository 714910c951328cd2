//! Plateau detection on the per-output theta values

use std::collections::VecDeque;

use ndarray::Array1;

/// Bounded FIFO of theta snapshots, one pushed per epoch.
#[derive(Debug, Clone)]
pub struct ConvergenceTracker {
    capacity: usize,
    atol: f32,
    history: VecDeque<Array1<f32>>,
}

impl ConvergenceTracker {
    pub fn new(capacity: usize, atol: f32) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            atol,
            history: VecDeque::with_capacity(capacity),
        }
    }

    /// Feed the theta of the epoch that just finished.
    ///
    /// Returns `true` once the history is full and every stored snapshot
    /// lies within `atol` of `theta` on every output. Otherwise the oldest
    /// snapshot is evicted (when full) and `theta` is recorded.
    pub fn check(&mut self, theta: &Array1<f32>) -> bool {
        if self.history.len() == self.capacity {
            let atol = self.atol;
            let converged = self.history.iter().all(|past| {
                past.len() == theta.len()
                    && past.iter().zip(theta.iter()).all(|(a, b)| (a - b).abs() < atol)
            });
            if converged {
                return true;
            }
            self.history.pop_front();
        }
        self.history.push_back(theta.clone());
        false
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
