//! Shape operations: channel concatenation

use crate::autograd::{is_grad_enabled, BackwardOp, GradCell, Tensor};
use ndarray::{concatenate, Axis, Slice};
use std::rc::Rc;

/// Concatenate two NCHW tensors along the channel axis
///
/// Batch and spatial extents must agree.
pub fn concat_channels(a: &Tensor, b: &Tensor) -> Tensor {
    let (sa, sb) = (a.shape(), b.shape());
    assert!(
        sa.len() == 4 && sb.len() == 4,
        "concat_channels expects NCHW tensors, got {sa:?} and {sb:?}"
    );
    assert!(
        sa[0] == sb[0] && sa[2] == sb[2] && sa[3] == sb[3],
        "concat_channels: batch/spatial mismatch between {sa:?} and {sb:?}"
    );

    let data = concatenate(Axis(1), &[a.data().view(), b.data().view()])
        .expect("shapes checked above");
    let requires_grad = is_grad_enabled() && (a.requires_grad() || b.requires_grad());

    let mut result = Tensor::new(data, requires_grad);

    if requires_grad {
        let backward_op = Rc::new(ConcatBackward {
            a: a.clone(),
            b: b.clone(),
            split: sa[1],
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct ConcatBackward {
    a: Tensor,
    b: Tensor,
    split: usize,
    result_grad: GradCell,
}

impl BackwardOp for ConcatBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                let grad_a = grad.slice_axis(Axis(1), Slice::from(..self.split));
                self.a.accumulate_grad(grad_a.to_owned());
            }
            if self.b.requires_grad() {
                let grad_b = grad.slice_axis(Axis(1), Slice::from(self.split..));
                self.b.accumulate_grad(grad_b.to_owned());
            }
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone(), self.b.clone()]
    }
}
