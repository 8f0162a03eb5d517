//! Binary Cross-Entropy with Logits Loss for patch discrimination
//!
//! Combines a sigmoid activation with binary cross-entropy loss. Every
//! patch logit is an independent real/fake decision.
//!
//! # Formula
//!
//! Numerically stable computation:
//! ```text
//! L_i = max(x_i, 0) - x_i * t_i + log(1 + exp(-|x_i|))
//! L = mean(L_i) over all i
//! ```
//!
//! Gradient: `∂L/∂x_i = (σ(x_i) - t_i) / N`

use crate::autograd::{is_grad_enabled, BackwardOp, GradCell};
use crate::Tensor;
use ndarray::ArrayD;
use std::rc::Rc;

use super::LossFn;

/// Binary Cross-Entropy with Logits Loss.
///
/// # Example
///
/// ```
/// use glyphforge::train::{BCEWithLogitsLoss, LossFn};
/// use glyphforge::Tensor;
///
/// let logits = Tensor::from_vec(vec![2.0, -1.0, 0.5], true);
/// let real = Tensor::ones(&[3], false);
///
/// let loss = BCEWithLogitsLoss.forward(&logits, &real);
/// assert!(loss.item() > 0.0);
/// ```
pub struct BCEWithLogitsLoss;

impl BCEWithLogitsLoss {
    /// Numerically stable sigmoid: σ(x) = 1 / (1 + exp(-x))
    pub(crate) fn sigmoid(v: f32) -> f32 {
        if v >= 0.0 {
            1.0 / (1.0 + (-v).exp())
        } else {
            let exp_v = v.exp();
            exp_v / (1.0 + exp_v)
        }
    }

    /// Numerically stable BCE: max(x, 0) - x*t + log(1 + exp(-|x|))
    fn stable_bce(logit: f32, target: f32) -> f32 {
        logit.max(0.0) - logit * target + (-logit.abs()).exp().ln_1p()
    }
}

impl LossFn for BCEWithLogitsLoss {
    fn forward(&self, predictions: &Tensor, targets: &Tensor) -> Tensor {
        assert_eq!(
            predictions.shape(),
            targets.shape(),
            "Predictions and targets must have same shape"
        );

        let n = predictions.len() as f32;
        let (total, grad) = {
            let pred = predictions.data();
            let tgt = targets.data();
            let total: f32 = pred
                .iter()
                .zip(tgt.iter())
                .map(|(&logit, &target)| Self::stable_bce(logit, target))
                .sum();
            let mut grad = pred.mapv(Self::sigmoid);
            grad -= &*tgt;
            grad /= n;
            (total / n, grad)
        };

        let requires_grad = is_grad_enabled() && predictions.requires_grad();
        let mut loss = Tensor::from_vec(vec![total], requires_grad);

        if requires_grad {
            loss.set_backward_op(Rc::new(PointwiseLossBackward {
                predictions: predictions.clone(),
                local_grad: grad,
                result_grad: loss.grad_cell(),
            }));
        }

        loss
    }

    fn name(&self) -> &'static str {
        "BCEWithLogits"
    }
}

/// Backward op of a mean-reduced pointwise loss: `∂L/∂pred = upstream * local_grad`
pub(super) struct PointwiseLossBackward {
    pub(super) predictions: Tensor,
    pub(super) local_grad: ArrayD<f32>,
    pub(super) result_grad: GradCell,
}

impl BackwardOp for PointwiseLossBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            let upstream = grad.iter().next().copied().unwrap_or(0.0);
            self.predictions.accumulate_grad(&self.local_grad * upstream);
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.predictions.clone()]
    }
}
