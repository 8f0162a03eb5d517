//! Mean Absolute Error loss

use super::bce_with_logits::PointwiseLossBackward;
use super::LossFn;
use crate::autograd::is_grad_enabled;
use crate::Tensor;
use std::rc::Rc;

/// L1 Loss (Mean Absolute Error)
///
/// L = mean(|pred - target|), with ∂L/∂pred = sign(pred - target) / n and a zero
/// subgradient where they agree.
///
/// # Example
///
/// ```
/// use glyphforge::train::{L1Loss, LossFn};
/// use glyphforge::Tensor;
///
/// let pred = Tensor::from_vec(vec![1.0, 2.0, 3.0], true);
/// let target = Tensor::from_vec(vec![1.5, 2.5, 3.5], false);
///
/// let loss = L1Loss.forward(&pred, &target);
/// assert!((loss.item() - 0.5).abs() < 1e-6);
/// ```
pub struct L1Loss;

impl LossFn for L1Loss {
    fn forward(&self, predictions: &Tensor, targets: &Tensor) -> Tensor {
        assert_eq!(
            predictions.shape(),
            targets.shape(),
            "Predictions and targets must have same shape"
        );

        let diff = &*predictions.data() - &*targets.data();
        let mae = diff.mapv(f32::abs).mean().unwrap_or(0.0);

        let requires_grad = is_grad_enabled() && predictions.requires_grad();
        let mut loss = Tensor::from_vec(vec![mae], requires_grad);

        if requires_grad {
            let n = predictions.len() as f32;
            let local_grad = diff.mapv(|d| if d == 0.0 { 0.0 } else { d.signum() / n });
            loss.set_backward_op(Rc::new(PointwiseLossBackward {
                predictions: predictions.clone(),
                local_grad,
                result_grad: loss.grad_cell(),
            }));
        }

        loss
    }

    fn name(&self) -> &'static str {
        "L1"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::backward;

    #[test]
    fn test_l1_gradient_is_sign_over_n() {
        let pred = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], true);
        let target = Tensor::from_vec(vec![0.0, 2.0, 5.0, 4.5], false);

        let loss = L1Loss.forward(&pred, &target);
        assert!((loss.item() - 0.875).abs() < 1e-6);
        backward(&loss, None);

        let grad = pred.grad().unwrap();
        assert_eq!(grad.iter().copied().collect::<Vec<_>>(), vec![0.25, 0.0, -0.25, -0.25]);
    }

    #[test]
    fn test_l1_lambda_weighting() {
        let pred = Tensor::from_vec(vec![1.0, -1.0], true);
        let loss = L1Loss.forward(&pred, &Tensor::zeros(&[2], false));
        backward(&crate::autograd::scale(&loss, 100.0), None);
        assert_eq!(pred.grad().unwrap()[[0]], 50.0);
    }

    #[test]
    fn test_l1_identical_is_zero() {
        let pred = Tensor::full(&[1, 1, 4, 4], 0.3, true);
        assert_eq!(L1Loss.forward(&pred, &pred.detach()).item(), 0.0);
    }
}
