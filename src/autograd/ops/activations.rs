//! Activation function autograd operations: relu, leaky_relu, tanh

use crate::autograd::{is_grad_enabled, BackwardOp, GradCell, Tensor};
use ndarray::{ArrayD, Zip};
use std::rc::Rc;

/// ReLU activation
pub fn relu(a: &Tensor) -> Tensor {
    leaky_relu(a, 0.0)
}

/// Leaky ReLU: `x` for positive inputs, `negative_slope * x` otherwise
pub fn leaky_relu(a: &Tensor, negative_slope: f32) -> Tensor {
    let data = a
        .data()
        .mapv(|x| if x > 0.0 { x } else { negative_slope * x });
    let requires_grad = is_grad_enabled() && a.requires_grad();

    let mut result = Tensor::new(data, requires_grad);

    if requires_grad {
        let backward_op = Rc::new(LeakyReluBackward {
            a: a.clone(),
            negative_slope,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct LeakyReluBackward {
    a: Tensor,
    negative_slope: f32,
    result_grad: GradCell,
}

impl BackwardOp for LeakyReluBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            // ∂L/∂a = ∂L/∂out * (1 if a > 0 else slope)
            let mut grad_a = grad.clone();
            Zip::from(&mut grad_a)
                .and(&*self.a.data())
                .for_each(|g, &x| {
                    if x <= 0.0 {
                        *g *= self.negative_slope;
                    }
                });
            self.a.accumulate_grad(grad_a);
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone()]
    }
}

/// Hyperbolic tangent, saturating to (-1, 1)
pub fn tanh(a: &Tensor) -> Tensor {
    let data = a.data().mapv(f32::tanh);
    let requires_grad = is_grad_enabled() && a.requires_grad();

    let output = if requires_grad { Some(data.clone()) } else { None };
    let mut result = Tensor::new(data, requires_grad);

    if let Some(output) = output {
        let backward_op = Rc::new(TanhBackward {
            a: a.clone(),
            output,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct TanhBackward {
    a: Tensor,
    output: ArrayD<f32>,
    result_grad: GradCell,
}

impl BackwardOp for TanhBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            // ∂tanh/∂x = 1 - tanh²(x)
            let mut grad_a = grad.clone();
            Zip::from(&mut grad_a)
                .and(&self.output)
                .for_each(|g, &y| *g *= 1.0 - y * y);
            self.a.accumulate_grad(grad_a);
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone()]
    }
}
