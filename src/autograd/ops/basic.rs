//! Basic autograd operations: add, scale

use crate::autograd::{is_grad_enabled, BackwardOp, GradCell, Tensor};
use std::rc::Rc;

/// Add two tensors of identical shape
pub fn add(a: &Tensor, b: &Tensor) -> Tensor {
    assert_eq!(a.shape(), b.shape(), "add requires tensors of the same shape");
    let data = &*a.data() + &*b.data();
    let requires_grad = is_grad_enabled() && (a.requires_grad() || b.requires_grad());

    let mut result = Tensor::new(data, requires_grad);

    if requires_grad {
        let backward_op = Rc::new(AddBackward {
            a: a.clone(),
            b: b.clone(),
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct AddBackward {
    a: Tensor,
    b: Tensor,
    result_grad: GradCell,
}

impl BackwardOp for AddBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                self.a.accumulate_grad(grad.clone());
            }
            if self.b.requires_grad() {
                self.b.accumulate_grad(grad.clone());
            }
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone(), self.b.clone()]
    }
}

/// Scale tensor by a scalar
pub fn scale(a: &Tensor, factor: f32) -> Tensor {
    let data = &*a.data() * factor;
    let requires_grad = is_grad_enabled() && a.requires_grad();

    let mut result = Tensor::new(data, requires_grad);

    if requires_grad {
        let backward_op = Rc::new(ScaleBackward {
            a: a.clone(),
            factor,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct ScaleBackward {
    a: Tensor,
    factor: f32,
    result_grad: GradCell,
}

impl BackwardOp for ScaleBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            // ∂L/∂a = ∂L/∂out * factor
            self.a.accumulate_grad(grad * self.factor);
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone()]
    }
}
