//! Tensor type with gradient tracking

use crate::autograd::BackwardOp;
use crate::{Error, Result};
use ndarray::{ArrayD, IxDyn};
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

/// Shared gradient slot of a tensor
pub type GradCell = Rc<RefCell<Option<ArrayD<f32>>>>;

/// N-dimensional f32 tensor participating in the autograd graph
///
/// Cloning a `Tensor` produces another handle to the same graph node: data,
/// gradient, and backward op are shared. Storage is always row-major
/// contiguous, so ops may reshape views without copying.
#[derive(Clone)]
pub struct Tensor {
    id: usize,
    data: Rc<RefCell<ArrayD<f32>>>,
    grad: GradCell,
    requires_grad: bool,
    backward_op: Option<Rc<dyn BackwardOp>>,
}

impl Tensor {
    /// Create a tensor from an ndarray
    pub fn new(data: ArrayD<f32>, requires_grad: bool) -> Self {
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            data: Rc::new(RefCell::new(standard_layout(data))),
            grad: Rc::new(RefCell::new(None)),
            requires_grad,
            backward_op: None,
        }
    }

    /// Create a 1-D tensor from a vector
    pub fn from_vec(data: Vec<f32>, requires_grad: bool) -> Self {
        let len = data.len();
        let array = ArrayD::from_shape_vec(IxDyn(&[len]), data)
            .expect("1-D shape always matches vector length");
        Self::new(array, requires_grad)
    }

    /// Create a tensor with an explicit shape
    pub fn from_shape_vec(shape: &[usize], data: Vec<f32>, requires_grad: bool) -> Result<Self> {
        let expected: usize = shape.iter().product();
        let got = data.len();
        let array = ArrayD::from_shape_vec(IxDyn(shape), data).map_err(|_| {
            Error::Shape(format!(
                "cannot build tensor of shape {shape:?} ({expected} elements) from {got} values"
            ))
        })?;
        Ok(Self::new(array, requires_grad))
    }

    /// Tensor filled with zeros
    pub fn zeros(shape: &[usize], requires_grad: bool) -> Self {
        Self::new(ArrayD::zeros(IxDyn(shape)), requires_grad)
    }

    /// Tensor filled with ones
    pub fn ones(shape: &[usize], requires_grad: bool) -> Self {
        Self::new(ArrayD::ones(IxDyn(shape)), requires_grad)
    }

    /// Tensor filled with a constant
    pub fn full(shape: &[usize], value: f32, requires_grad: bool) -> Self {
        Self::new(ArrayD::from_elem(IxDyn(shape), value), requires_grad)
    }

    /// Unique graph node identifier
    pub fn id(&self) -> usize {
        self.id
    }

    /// Shape of the tensor
    pub fn shape(&self) -> Vec<usize> {
        self.data.borrow().shape().to_vec()
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.data.borrow().len()
    }

    /// Check whether the tensor has no elements
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow the underlying data
    pub fn data(&self) -> Ref<'_, ArrayD<f32>> {
        self.data.borrow()
    }

    /// Mutably borrow the underlying data (optimizer updates, checkpoint restore)
    pub fn data_mut(&self) -> RefMut<'_, ArrayD<f32>> {
        self.data.borrow_mut()
    }

    /// Copy the data out as a flat row-major vector
    pub fn to_vec(&self) -> Vec<f32> {
        self.data.borrow().iter().copied().collect()
    }

    /// First element, for scalar losses
    pub fn item(&self) -> f32 {
        self.data.borrow().iter().next().copied().unwrap_or(f32::NAN)
    }

    /// Whether gradients flow into this tensor
    pub fn requires_grad(&self) -> bool {
        self.requires_grad
    }

    /// Current gradient (cloned)
    pub fn grad(&self) -> Option<ArrayD<f32>> {
        self.grad.borrow().clone()
    }

    /// Shared gradient slot, captured by backward ops producing this tensor
    pub fn grad_cell(&self) -> GradCell {
        Rc::clone(&self.grad)
    }

    /// Overwrite the gradient
    pub fn set_grad(&self, grad: ArrayD<f32>) {
        *self.grad.borrow_mut() = Some(standard_layout(grad));
    }

    /// Add to the gradient
    pub fn accumulate_grad(&self, grad: ArrayD<f32>) {
        let mut slot = self.grad.borrow_mut();
        match slot.as_mut() {
            Some(existing) => *existing += &grad,
            None => *slot = Some(standard_layout(grad)),
        }
    }

    /// Clear the gradient
    pub fn zero_grad(&self) {
        *self.grad.borrow_mut() = None;
    }

    /// Backward op that produced this tensor, if any
    pub fn backward_op(&self) -> Option<Rc<dyn BackwardOp>> {
        self.backward_op.clone()
    }

    /// Attach the backward op that produced this tensor
    pub fn set_backward_op(&mut self, op: Rc<dyn BackwardOp>) {
        self.backward_op = Some(op);
    }

    /// A new leaf sharing this tensor's data but cut off from the graph
    pub fn detach(&self) -> Tensor {
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            data: Rc::clone(&self.data),
            grad: Rc::new(RefCell::new(None)),
            requires_grad: false,
            backward_op: None,
        }
    }
}

fn standard_layout(array: ArrayD<f32>) -> ArrayD<f32> {
    if array.is_standard_layout() {
        array
    } else {
        array.as_standard_layout().into_owned()
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("id", &self.id)
            .field("shape", &self.shape())
            .field("requires_grad", &self.requires_grad)
            .field("has_grad", &self.grad.borrow().is_some())
            .finish()
    }
}
