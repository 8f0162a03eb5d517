//! Adam optimizer

use super::Optimizer;
use crate::Tensor;
use ndarray::{ArrayD, Zip};

/// Adam optimizer with bias-corrected moment estimates
///
/// m_t = β1 * m_{t-1} + (1 - β1) * g
/// v_t = β2 * v_{t-1} + (1 - β2) * g²
/// θ_t = θ_{t-1} - lr * m̂_t / (√v̂_t + ε), with m̂_t = m_t / (1 - β1^t), v̂_t = v_t / (1 - β2^t)
///
/// Moments are tracked per parameter position, so every call to [`Optimizer::step`]
/// must pass the same parameter list in the same order.
pub struct Adam {
    lr: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    t: u64,
    m: Vec<Option<ArrayD<f32>>>, // First moment
    v: Vec<Option<ArrayD<f32>>>, // Second moment
}

impl Adam {
    /// Create a new Adam optimizer
    pub fn new(lr: f32, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Self { lr, beta1, beta2, epsilon, t: 0, m: Vec::new(), v: Vec::new() }
    }
}

impl Optimizer for Adam {
    fn step(&mut self, params: &[Tensor]) {
        if self.m.len() < params.len() {
            self.m.resize(params.len(), None);
            self.v.resize(params.len(), None);
        }
        self.t += 1;

        let bias1 = 1.0 - self.beta1.powi(self.t as i32);
        let bias2 = 1.0 - self.beta2.powi(self.t as i32);
        let (beta1, beta2, lr, eps) = (self.beta1, self.beta2, self.lr, self.epsilon);

        for (i, param) in params.iter().enumerate() {
            let Some(grad) = param.grad() else {
                continue;
            };
            let m = self.m[i].get_or_insert_with(|| ArrayD::zeros(grad.raw_dim()));
            let v = self.v[i].get_or_insert_with(|| ArrayD::zeros(grad.raw_dim()));

            let mut data = param.data_mut();
            Zip::from(&mut *data)
                .and(m)
                .and(v)
                .and(&grad)
                .for_each(|theta, m, v, &g| {
                    *m = beta1 * *m + (1.0 - beta1) * g;
                    *v = beta2 * *v + (1.0 - beta2) * g * g;
                    let m_hat = *m / bias1;
                    let v_hat = *v / bias2;
                    *theta -= lr * m_hat / (v_hat.sqrt() + eps);
                });
        }
    }

    fn lr(&self) -> f32 {
        self.lr
    }

    fn set_lr(&mut self, lr: f32) {
        self.lr = lr;
    }
}
