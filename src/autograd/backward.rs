//! Backward op trait and reverse-mode graph traversal

use crate::autograd::Tensor;
use ndarray::ArrayD;
use std::cell::Cell;
use std::collections::HashSet;

/// A differentiable operation recorded on the tape
pub trait BackwardOp {
    /// Read the gradient of this op's output and accumulate into its inputs
    ///
    /// Implementations only touch their direct inputs; graph traversal is
    /// driven by [`backward`].
    fn backward(&self);

    /// Tensors this op consumed
    fn inputs(&self) -> Vec<Tensor>;
}

thread_local! {
    static GRAD_ENABLED: Cell<bool> = const { Cell::new(true) };
}

/// Whether ops currently record backward ops
pub fn is_grad_enabled() -> bool {
    GRAD_ENABLED.with(Cell::get)
}

struct GradModeGuard {
    previous: bool,
}

impl Drop for GradModeGuard {
    fn drop(&mut self) {
        GRAD_ENABLED.with(|flag| flag.set(self.previous));
    }
}

/// Run `f` without recording the graph
///
/// Tensors produced inside never require gradients, regardless of their inputs.
pub fn no_grad<T>(f: impl FnOnce() -> T) -> T {
    let previous = GRAD_ENABLED.with(|flag| flag.replace(false));
    let _guard = GradModeGuard { previous };
    f()
}

/// Perform the backward pass from `tensor`
///
/// Seeds the output gradient (ones when `grad_output` is `None`), then visits
/// every node in reverse topological order so that a node shared by several
/// consumers propagates only after its gradient is complete.
pub fn backward(tensor: &Tensor, grad_output: Option<ArrayD<f32>>) {
    let seed = grad_output.unwrap_or_else(|| ArrayD::ones(tensor.shape()));
    tensor.set_grad(seed);

    for node in topological_order(tensor).iter().rev() {
        if let Some(op) = node.backward_op() {
            op.backward();
        }
    }
}

/// Nodes reachable from `root` through gradient-carrying edges, inputs first
fn topological_order(root: &Tensor) -> Vec<Tensor> {
    let mut visited = HashSet::new();
    let mut order = Vec::new();
    let mut stack = vec![(root.clone(), false)];

    while let Some((node, expanded)) = stack.pop() {
        if expanded {
            order.push(node);
            continue;
        }
        if !visited.insert(node.id()) {
            continue;
        }
        let inputs = node.backward_op().map(|op| op.inputs()).unwrap_or_default();
        stack.push((node, true));
        for input in inputs {
            if input.requires_grad() && !visited.contains(&input.id()) {
                stack.push((input, false));
            }
        }
    }

    order
}
