//! Normalization autograd operations: batch_norm2d

use crate::autograd::{is_grad_enabled, BackwardOp, GradCell, Tensor};
use ndarray::{Array1, Array4, ArrayD, Axis, Ix4, Zip};
use std::rc::Rc;

/// Per-channel statistics of one normalized batch (biased variance)
#[derive(Debug, Clone)]
pub struct BatchStats {
    pub mean: Array1<f32>,
    pub var: Array1<f32>,
    /// Elements per channel (`N * H * W`)
    pub count: usize,
}

/// Batch normalization over the N, H, W axes of an NCHW tensor
///
/// BatchNorm(x) = gamma * (x - mean_c) / sqrt(var_c + epsilon) + beta
///
/// Uses the statistics of the batch itself and returns them so the caller can
/// maintain running averages.
pub fn batch_norm2d(x: &Tensor, gamma: &Tensor, beta: &Tensor, epsilon: f32) -> (Tensor, BatchStats) {
    let channels = check_operands(x, gamma, beta);

    let x_data = x.data();
    let x4 = x_data
        .view()
        .into_dimensionality::<Ix4>()
        .expect("checked NCHW above");
    let count = x4.len() / channels.max(1);

    let mut mean = Array1::zeros(channels);
    let mut var = Array1::zeros(channels);
    let mut normalized = Array4::zeros(x4.dim());

    for (c, (plane, mut norm_plane)) in x4
        .axis_iter(Axis(1))
        .zip(normalized.axis_iter_mut(Axis(1)))
        .enumerate()
    {
        let m = plane.mean().unwrap_or(0.0);
        let v = plane.mapv(|val| (val - m).powi(2)).mean().unwrap_or(0.0);
        let inv_std = 1.0 / (v + epsilon).sqrt();
        Zip::from(&mut norm_plane)
            .and(&plane)
            .for_each(|n, &val| *n = (val - m) * inv_std);
        mean[c] = m;
        var[c] = v;
    }
    drop(x_data);

    let inv_std = var.mapv(|v| 1.0 / (v + epsilon).sqrt());
    let data = scale_shift(&normalized, &gamma.data(), &beta.data());

    let requires_grad =
        is_grad_enabled() && (x.requires_grad() || gamma.requires_grad() || beta.requires_grad());
    let mut result = Tensor::new(data.into_dyn(), requires_grad);

    if requires_grad {
        let backward_op = Rc::new(BatchNormBackward {
            x: x.clone(),
            gamma: gamma.clone(),
            beta: beta.clone(),
            normalized,
            inv_std,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    (result, BatchStats { mean, var, count })
}

/// Batch normalization with fixed (running) statistics
///
/// Gradients still flow to `x`, `gamma` and `beta`, but the statistics are constants.
pub fn batch_norm2d_frozen(
    x: &Tensor,
    gamma: &Tensor,
    beta: &Tensor,
    mean: &Array1<f32>,
    var: &Array1<f32>,
    epsilon: f32,
) -> Tensor {
    let channels = check_operands(x, gamma, beta);
    assert!(
        mean.len() == channels && var.len() == channels,
        "batch_norm2d_frozen: running statistics must have {channels} entries"
    );

    let inv_std = var.mapv(|v| 1.0 / (v + epsilon).sqrt());
    let mut normalized = x
        .data()
        .view()
        .into_dimensionality::<Ix4>()
        .expect("checked NCHW above")
        .to_owned();
    for (c, mut plane) in normalized.axis_iter_mut(Axis(1)).enumerate() {
        let (m, s) = (mean[c], inv_std[c]);
        plane.mapv_inplace(|val| (val - m) * s);
    }
    let data = scale_shift(&normalized, &gamma.data(), &beta.data());

    let requires_grad =
        is_grad_enabled() && (x.requires_grad() || gamma.requires_grad() || beta.requires_grad());
    let mut result = Tensor::new(data.into_dyn(), requires_grad);

    if requires_grad {
        let backward_op = Rc::new(FrozenBatchNormBackward {
            x: x.clone(),
            gamma: gamma.clone(),
            beta: beta.clone(),
            normalized,
            inv_std,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

fn check_operands(x: &Tensor, gamma: &Tensor, beta: &Tensor) -> usize {
    let xs = x.shape();
    assert!(xs.len() == 4, "batch_norm2d input must be NCHW, got {xs:?}");
    let channels = xs[1];
    assert!(
        gamma.shape() == [channels] && beta.shape() == [channels],
        "batch_norm2d: gamma/beta must have shape [{channels}]"
    );
    channels
}

fn scale_shift(normalized: &Array4<f32>, gamma: &ArrayD<f32>, beta: &ArrayD<f32>) -> Array4<f32> {
    let mut out = normalized.clone();
    for ((mut plane, &g), &b) in out.axis_iter_mut(Axis(1)).zip(gamma.iter()).zip(beta.iter()) {
        plane.mapv_inplace(|val| g * val + b);
    }
    out
}

/// (∂L/∂gamma, ∂L/∂beta) per channel
fn affine_grads(grad: &Array4<f32>, normalized: &Array4<f32>) -> (Array1<f32>, Array1<f32>) {
    let channels = grad.dim().1;
    let mut grad_gamma = Array1::zeros(channels);
    let mut grad_beta = Array1::zeros(channels);
    for (c, (g, n)) in grad
        .axis_iter(Axis(1))
        .zip(normalized.axis_iter(Axis(1)))
        .enumerate()
    {
        grad_beta[c] = g.sum();
        grad_gamma[c] = (&g * &n).sum();
    }
    (grad_gamma, grad_beta)
}

fn grad_nchw(grad: &ArrayD<f32>) -> Array4<f32> {
    grad.view()
        .into_dimensionality::<Ix4>()
        .expect("gradient matches NCHW output")
        .to_owned()
}

struct BatchNormBackward {
    x: Tensor,
    gamma: Tensor,
    beta: Tensor,
    normalized: Array4<f32>,
    inv_std: Array1<f32>,
    result_grad: GradCell,
}

impl BackwardOp for BatchNormBackward {
    fn backward(&self) {
        let Some(grad) = self.result_grad.borrow().as_ref().map(grad_nchw) else {
            return;
        };

        let (grad_gamma, grad_beta) = affine_grads(&grad, &self.normalized);

        if self.x.requires_grad() {
            // ∂L/∂x = inv_std / m * (m * dx̂ - Σdx̂ - x̂ * Σ(dx̂ * x̂)), with dx̂ = dy * gamma
            let gamma = self.gamma.data();
            let mut grad_x = grad.clone();
            for (c, (mut gx, n)) in grad_x
                .axis_iter_mut(Axis(1))
                .zip(self.normalized.axis_iter(Axis(1)))
                .enumerate()
            {
                let m = gx.len() as f32;
                gx.mapv_inplace(|g| g * gamma[c]);
                let sum_dxhat = gx.sum();
                let sum_dxhat_xhat = (&gx * &n).sum();
                let k = self.inv_std[c] / m;
                Zip::from(&mut gx).and(&n).for_each(|d, &xh| {
                    *d = k * (m * *d - sum_dxhat - xh * sum_dxhat_xhat);
                });
            }
            drop(gamma);
            self.x.accumulate_grad(grad_x.into_dyn());
        }
        if self.gamma.requires_grad() {
            self.gamma.accumulate_grad(grad_gamma.into_dyn());
        }
        if self.beta.requires_grad() {
            self.beta.accumulate_grad(grad_beta.into_dyn());
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.x.clone(), self.gamma.clone(), self.beta.clone()]
    }
}

struct FrozenBatchNormBackward {
    x: Tensor,
    gamma: Tensor,
    beta: Tensor,
    normalized: Array4<f32>,
    inv_std: Array1<f32>,
    result_grad: GradCell,
}

impl BackwardOp for FrozenBatchNormBackward {
    fn backward(&self) {
        let Some(grad) = self.result_grad.borrow().as_ref().map(grad_nchw) else {
            return;
        };

        let (grad_gamma, grad_beta) = affine_grads(&grad, &self.normalized);

        if self.x.requires_grad() {
            let gamma = self.gamma.data();
            let mut grad_x = grad;
            for (c, mut gx) in grad_x.axis_iter_mut(Axis(1)).enumerate() {
                let k = gamma[c] * self.inv_std[c];
                gx.mapv_inplace(|g| g * k);
            }
            drop(gamma);
            self.x.accumulate_grad(grad_x.into_dyn());
        }
        if self.gamma.requires_grad() {
            self.gamma.accumulate_grad(grad_gamma.into_dyn());
        }
        if self.beta.requires_grad() {
            self.beta.accumulate_grad(grad_beta.into_dyn());
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.x.clone(), self.gamma.clone(), self.beta.clone()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_batch_norm_output_is_standardized() {
        let x = Tensor::new(
            Array4::from_shape_fn((2, 2, 3, 3), |(n, c, i, j)| {
                (n * 7 + c * 13 + i * 3 + j) as f32 * 0.5
            })
            .into_dyn(),
            false,
        );
        let (y, stats) = batch_norm2d(&x, &Tensor::ones(&[2], false), &Tensor::zeros(&[2], false), 1e-5);
        assert_eq!(stats.count, 18);

        let y4 = y.data().clone().into_dimensionality::<Ix4>().unwrap();
        for plane in y4.axis_iter(Axis(1)) {
            assert_abs_diff_eq!(plane.mean().unwrap(), 0.0, epsilon = 1e-5);
            let var = plane.mapv(|v| v * v).mean().unwrap();
            assert_abs_diff_eq!(var, 1.0, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_batch_norm_constant_channel_is_finite() {
        let x = Tensor::full(&[1, 1, 2, 2], 3.0, true);
        let (y, stats) = batch_norm2d(&x, &Tensor::ones(&[1], true), &Tensor::zeros(&[1], true), 1e-5);
        assert_abs_diff_eq!(stats.var[0], 0.0);
        assert!(y.data().iter().all(|v| v.is_finite() && v.abs() < 1e-6));
    }

    #[test]
    fn test_frozen_uses_given_statistics() {
        let x = Tensor::full(&[1, 1, 1, 2], 4.0, false);
        let y = batch_norm2d_frozen(
            &x,
            &Tensor::full(&[1], 2.0, false),
            &Tensor::full(&[1], 1.0, false),
            &Array1::from(vec![2.0]),
            &Array1::from(vec![4.0]),
            0.0,
        );
        // 2 * (4 - 2) / 2 + 1
        assert_eq!(y.to_vec(), vec![3.0, 3.0]);
    }
}
