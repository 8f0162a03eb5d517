//! Convolution autograd operations: conv2d, conv_transpose2d
//!
//! Both lower to GEMM through im2col / col2im on a per-sample basis.
//! Layouts follow the usual NCHW convention:
//!
//! - `conv2d` weight: `[out_channels, in_channels, k, k]`
//! - `conv_transpose2d` weight: `[in_channels, out_channels, k, k]`

use crate::autograd::{is_grad_enabled, BackwardOp, GradCell, Tensor};
use ndarray::{Array2, Array3, Array4, ArrayD, ArrayView2, ArrayView3, Axis, Ix4};
use std::rc::Rc;

/// Stride / padding of a square-kernel convolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvGeometry {
    /// Kernel size (square)
    pub kernel: usize,
    /// Stride in both directions
    pub stride: usize,
    /// Zero padding on every border
    pub padding: usize,
}

impl ConvGeometry {
    /// Create a geometry
    pub const fn new(kernel: usize, stride: usize, padding: usize) -> Self {
        Self { kernel, stride, padding }
    }

    /// Output extent of a convolution over `input` pixels, `None` if the kernel does not fit
    pub fn conv_out(&self, input: usize) -> Option<usize> {
        (input + 2 * self.padding)
            .checked_sub(self.kernel)
            .map(|span| span / self.stride + 1)
    }

    /// Output extent of a transposed convolution over `input` pixels
    pub fn conv_transpose_out(&self, input: usize) -> Option<usize> {
        ((input.checked_sub(1)?) * self.stride + self.kernel).checked_sub(2 * self.padding)
    }
}

fn as_nchw(a: &ArrayD<f32>) -> ndarray::ArrayView4<'_, f32> {
    a.view()
        .into_dimensionality::<Ix4>()
        .expect("convolution operands are NCHW")
}

fn as_matrix(a: &ArrayD<f32>, rows: usize, cols: usize) -> ArrayView2<'_, f32> {
    a.view()
        .into_shape_with_order((rows, cols))
        .expect("tensor storage is row-major contiguous")
}

/// Unfold `[C, H, W]` into `[C*k*k, out_h*out_w]` patch columns
fn im2col(
    input: ArrayView3<'_, f32>,
    geo: ConvGeometry,
    out_h: usize,
    out_w: usize,
) -> Array2<f32> {
    let (channels, height, width) = input.dim();
    let k = geo.kernel;
    let mut cols = Array2::zeros((channels * k * k, out_h * out_w));

    for c in 0..channels {
        for ki in 0..k {
            for kj in 0..k {
                let row = (c * k + ki) * k + kj;
                let mut dst = cols.row_mut(row);
                for oy in 0..out_h {
                    let Some(iy) = (oy * geo.stride + ki).checked_sub(geo.padding) else {
                        continue;
                    };
                    if iy >= height {
                        continue;
                    }
                    for ox in 0..out_w {
                        let Some(ix) = (ox * geo.stride + kj).checked_sub(geo.padding) else {
                            continue;
                        };
                        if ix < width {
                            dst[oy * out_w + ox] = input[[c, iy, ix]];
                        }
                    }
                }
            }
        }
    }

    cols
}

/// Fold patch columns back into `[C, H, W]`, summing overlaps (adjoint of [`im2col`])
fn col2im(
    cols: ArrayView2<'_, f32>,
    channels: usize,
    height: usize,
    width: usize,
    geo: ConvGeometry,
    out_h: usize,
    out_w: usize,
) -> Array3<f32> {
    let k = geo.kernel;
    let mut image = Array3::zeros((channels, height, width));

    for c in 0..channels {
        for ki in 0..k {
            for kj in 0..k {
                let row = cols.row((c * k + ki) * k + kj);
                for oy in 0..out_h {
                    let Some(iy) = (oy * geo.stride + ki).checked_sub(geo.padding) else {
                        continue;
                    };
                    if iy >= height {
                        continue;
                    }
                    for ox in 0..out_w {
                        let Some(ix) = (ox * geo.stride + kj).checked_sub(geo.padding) else {
                            continue;
                        };
                        if ix < width {
                            image[[c, iy, ix]] += row[oy * out_w + ox];
                        }
                    }
                }
            }
        }
    }

    image
}

fn add_channel_bias(out: &mut Array4<f32>, bias: &ArrayD<f32>) {
    for (mut plane, &b) in out.axis_iter_mut(Axis(1)).zip(bias.iter()) {
        plane += b;
    }
}

fn channel_sums(grad: ndarray::ArrayView4<'_, f32>) -> ArrayD<f32> {
    grad.sum_axis(Axis(3)).sum_axis(Axis(2)).sum_axis(Axis(0)).into_dyn()
}

/// 2-D convolution over an NCHW batch
///
/// `x`: `[N, C, H, W]`, `weight`: `[O, C, k, k]`, optional `bias`: `[O]`.
/// Returns `[N, O, H', W']` with `H' = (H + 2p - k) / s + 1`.
pub fn conv2d(x: &Tensor, weight: &Tensor, bias: Option<&Tensor>, geo: ConvGeometry) -> Tensor {
    let xs = x.shape();
    let ws = weight.shape();
    assert!(xs.len() == 4, "conv2d input must be NCHW, got {xs:?}");
    assert!(
        ws.len() == 4 && ws[1] == xs[1] && ws[2] == geo.kernel && ws[3] == geo.kernel,
        "conv2d weight {ws:?} incompatible with input {xs:?} and kernel {}",
        geo.kernel
    );
    let (n, c, h, w) = (xs[0], xs[1], xs[2], xs[3]);
    let o = ws[0];
    let out_h = geo
        .conv_out(h)
        .unwrap_or_else(|| panic!("conv2d kernel {} larger than padded height {h}", geo.kernel));
    let out_w = geo
        .conv_out(w)
        .unwrap_or_else(|| panic!("conv2d kernel {} larger than padded width {w}", geo.kernel));

    let mut out = Array4::zeros((n, o, out_h, out_w));
    {
        let x_data = x.data();
        let w_data = weight.data();
        let x4 = as_nchw(&x_data);
        let w2 = as_matrix(&w_data, o, c * geo.kernel * geo.kernel);
        for (sample, mut dst) in x4.outer_iter().zip(out.outer_iter_mut()) {
            let cols = im2col(sample, geo, out_h, out_w);
            let res = w2.dot(&cols);
            dst.assign(
                &res.into_shape_with_order((o, out_h, out_w))
                    .expect("GEMM result is contiguous"),
            );
        }
        if let Some(bias) = bias {
            add_channel_bias(&mut out, &bias.data());
        }
    }

    let requires_grad = is_grad_enabled()
        && (x.requires_grad() || weight.requires_grad() || bias.is_some_and(Tensor::requires_grad));

    let mut result = Tensor::new(out.into_dyn(), requires_grad);

    if requires_grad {
        let backward_op = Rc::new(Conv2dBackward {
            x: x.clone(),
            weight: weight.clone(),
            bias: bias.cloned(),
            geo,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct Conv2dBackward {
    x: Tensor,
    weight: Tensor,
    bias: Option<Tensor>,
    geo: ConvGeometry,
    result_grad: GradCell,
}

impl BackwardOp for Conv2dBackward {
    fn backward(&self) {
        let grad_ref = self.result_grad.borrow();
        let Some(grad) = grad_ref.as_ref() else {
            return;
        };
        let grad4 = as_nchw(grad);
        let (n, o, out_h, out_w) = grad4.dim();
        let xs = self.x.shape();
        let (c, h, w) = (xs[1], xs[2], xs[3]);
        let patch = c * self.geo.kernel * self.geo.kernel;

        let mut grad_x = self.x.requires_grad().then(|| Array4::<f32>::zeros((n, c, h, w)));
        let mut grad_w = Array2::<f32>::zeros((o, patch));

        {
            let x_data = self.x.data();
            let w_data = self.weight.data();
            let x4 = as_nchw(&x_data);
            let w2 = as_matrix(&w_data, o, patch);

            for (i, sample) in x4.outer_iter().enumerate() {
                let g = grad4
                    .index_axis(Axis(0), i)
                    .into_shape_with_order((o, out_h * out_w))
                    .expect("gradient storage is contiguous");
                if self.weight.requires_grad() {
                    let cols = im2col(sample, self.geo, out_h, out_w);
                    // ∂L/∂W = ∂L/∂Y · colsᵀ
                    grad_w += &g.dot(&cols.t());
                }
                if let Some(gx) = grad_x.as_mut() {
                    // ∂L/∂cols = Wᵀ · ∂L/∂Y, folded back onto the image
                    let dcols = w2.t().dot(&g);
                    let img = col2im(dcols.view(), c, h, w, self.geo, out_h, out_w);
                    gx.index_axis_mut(Axis(0), i).assign(&img);
                }
            }
        }

        if let Some(gx) = grad_x {
            self.x.accumulate_grad(gx.into_dyn());
        }
        if self.weight.requires_grad() {
            let ws = self.weight.shape();
            let gw = grad_w
                .into_shape_with_order(ws)
                .expect("weight gradient has weight's element count");
            self.weight.accumulate_grad(gw);
        }
        if let Some(bias) = self.bias.as_ref().filter(|b| b.requires_grad()) {
            bias.accumulate_grad(channel_sums(grad4));
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        let mut inputs = vec![self.x.clone(), self.weight.clone()];
        inputs.extend(self.bias.iter().cloned());
        inputs
    }
}

/// Transposed 2-D convolution (fractionally strided) over an NCHW batch
///
/// `x`: `[N, C_in, H, W]`, `weight`: `[C_in, C_out, k, k]`, optional `bias`: `[C_out]`.
/// Returns `[N, C_out, H', W']` with `H' = (H - 1) * s - 2p + k`.
pub fn conv_transpose2d(
    x: &Tensor,
    weight: &Tensor,
    bias: Option<&Tensor>,
    geo: ConvGeometry,
) -> Tensor {
    let xs = x.shape();
    let ws = weight.shape();
    assert!(xs.len() == 4, "conv_transpose2d input must be NCHW, got {xs:?}");
    assert!(
        ws.len() == 4 && ws[0] == xs[1] && ws[2] == geo.kernel && ws[3] == geo.kernel,
        "conv_transpose2d weight {ws:?} incompatible with input {xs:?} and kernel {}",
        geo.kernel
    );
    let (n, c_in, h, w) = (xs[0], xs[1], xs[2], xs[3]);
    let c_out = ws[1];
    let out_h = geo
        .conv_transpose_out(h)
        .unwrap_or_else(|| panic!("conv_transpose2d produces empty height from {h}"));
    let out_w = geo
        .conv_transpose_out(w)
        .unwrap_or_else(|| panic!("conv_transpose2d produces empty width from {w}"));
    let patch = c_out * geo.kernel * geo.kernel;

    let mut out = Array4::zeros((n, c_out, out_h, out_w));
    {
        let x_data = x.data();
        let w_data = weight.data();
        let x4 = as_nchw(&x_data);
        let w2 = as_matrix(&w_data, c_in, patch);
        for (sample, mut dst) in x4.outer_iter().zip(out.outer_iter_mut()) {
            let xm = sample
                .into_shape_with_order((c_in, h * w))
                .expect("input storage is contiguous");
            // Each input pixel scatters a weighted kernel into the output
            let cols = w2.t().dot(&xm);
            dst.assign(&col2im(cols.view(), c_out, out_h, out_w, geo, h, w));
        }
        if let Some(bias) = bias {
            add_channel_bias(&mut out, &bias.data());
        }
    }

    let requires_grad = is_grad_enabled()
        && (x.requires_grad() || weight.requires_grad() || bias.is_some_and(Tensor::requires_grad));

    let mut result = Tensor::new(out.into_dyn(), requires_grad);

    if requires_grad {
        let backward_op = Rc::new(ConvTranspose2dBackward {
            x: x.clone(),
            weight: weight.clone(),
            bias: bias.cloned(),
            geo,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct ConvTranspose2dBackward {
    x: Tensor,
    weight: Tensor,
    bias: Option<Tensor>,
    geo: ConvGeometry,
    result_grad: GradCell,
}

impl BackwardOp for ConvTranspose2dBackward {
    fn backward(&self) {
        let grad_ref = self.result_grad.borrow();
        let Some(grad) = grad_ref.as_ref() else {
            return;
        };
        let grad4 = as_nchw(grad);
        let xs = self.x.shape();
        let (n, c_in, h, w) = (xs[0], xs[1], xs[2], xs[3]);
        let c_out = grad4.dim().1;
        let patch = c_out * self.geo.kernel * self.geo.kernel;

        let mut grad_x = self.x.requires_grad().then(|| Array4::<f32>::zeros((n, c_in, h, w)));
        let mut grad_w = Array2::<f32>::zeros((c_in, patch));

        {
            let x_data = self.x.data();
            let w_data = self.weight.data();
            let x4 = as_nchw(&x_data);
            let w2 = as_matrix(&w_data, c_in, patch);

            for (i, sample) in x4.outer_iter().enumerate() {
                // The transposed conv's adjoint is an ordinary strided conv
                let dcols = im2col(grad4.index_axis(Axis(0), i), self.geo, h, w);
                if self.weight.requires_grad() {
                    let xm = sample
                        .into_shape_with_order((c_in, h * w))
                        .expect("input storage is contiguous");
                    grad_w += &xm.dot(&dcols.t());
                }
                if let Some(gx) = grad_x.as_mut() {
                    let gxm = w2.dot(&dcols);
                    gx.index_axis_mut(Axis(0), i).assign(
                        &gxm.into_shape_with_order((c_in, h, w))
                            .expect("GEMM result is contiguous"),
                    );
                }
            }
        }

        if let Some(gx) = grad_x {
            self.x.accumulate_grad(gx.into_dyn());
        }
        if self.weight.requires_grad() {
            let ws = self.weight.shape();
            let gw = grad_w
                .into_shape_with_order(ws)
                .expect("weight gradient has weight's element count");
            self.weight.accumulate_grad(gw);
        }
        if let Some(bias) = self.bias.as_ref().filter(|b| b.requires_grad()) {
            bias.accumulate_grad(channel_sums(grad4));
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        let mut inputs = vec![self.x.clone(), self.weight.clone()];
        inputs.extend(self.bias.iter().cloned());
        inputs
    }
}
