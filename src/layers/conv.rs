use crate::math::tensor::{matmul, transpose, Tensor};
use super::{Layer, Param};

/// Square-kernel 2-D convolution with stride 1 and "same" zero padding.
///
/// Input `[N, C, H, W]`, output `[N, O, H, W]`. Each sample is unfolded into
/// a `[C·k·k, H·W]` column matrix so both passes reduce to matrix products.
#[derive(Debug)]
pub struct Conv2d {
    pub in_channels: usize,
    pub out_channels: usize,
    pub kernel: usize,
    pub weights: Param,
    pub biases: Param,
    input_shape: Vec<usize>,
    columns: Vec<Vec<f64>>,
}

impl Conv2d {
    pub fn new(in_channels: usize, out_channels: usize, kernel: usize) -> Conv2d {
        assert!(kernel % 2 == 1, "kernel size must be odd");
        let fan_in = in_channels * kernel * kernel;
        Conv2d {
            in_channels,
            out_channels,
            kernel,
            weights: Param::new(Tensor::he(&[out_channels, in_channels, kernel, kernel], fan_in)),
            biases: Param::new(Tensor::zeros(&[out_channels])),
            input_shape: Vec::new(),
            columns: Vec::new(),
        }
    }

    fn patch_len(&self) -> usize {
        self.in_channels * self.kernel * self.kernel
    }
}

fn im2col(image: &[f64], channels: usize, height: usize, width: usize, kernel: usize) -> Vec<f64> {
    let pad = (kernel / 2) as isize;
    let hw = height * width;
    let mut cols = vec![0.0; channels * kernel * kernel * hw];
    for c in 0..channels {
        for ky in 0..kernel {
            for kx in 0..kernel {
                let row = (c * kernel + ky) * kernel + kx;
                for y in 0..height {
                    let sy = y as isize + ky as isize - pad;
                    if sy < 0 || sy >= height as isize {
                        continue;
                    }
                    for x in 0..width {
                        let sx = x as isize + kx as isize - pad;
                        if sx < 0 || sx >= width as isize {
                            continue;
                        }
                        cols[row * hw + y * width + x] =
                            image[(c * height + sy as usize) * width + sx as usize];
                    }
                }
            }
        }
    }
    cols
}

fn col2im(cols: &[f64], channels: usize, height: usize, width: usize, kernel: usize) -> Vec<f64> {
    let pad = (kernel / 2) as isize;
    let hw = height * width;
    let mut image = vec![0.0; channels * hw];
    for c in 0..channels {
        for ky in 0..kernel {
            for kx in 0..kernel {
                let row = (c * kernel + ky) * kernel + kx;
                for y in 0..height {
                    let sy = y as isize + ky as isize - pad;
                    if sy < 0 || sy >= height as isize {
                        continue;
                    }
                    for x in 0..width {
                        let sx = x as isize + kx as isize - pad;
                        if sx < 0 || sx >= width as isize {
                            continue;
                        }
                        image[(c * height + sy as usize) * width + sx as usize] +=
                            cols[row * hw + y * width + x];
                    }
                }
            }
        }
    }
    image
}

impl Layer for Conv2d {
    fn forward(&mut self, input: &Tensor) -> Tensor {
        assert_eq!(input.shape.len(), 4, "Conv2d expects [N, C, H, W]");
        let (n, c, h, w) = (input.shape[0], input.shape[1], input.shape[2], input.shape[3]);
        assert_eq!(c, self.in_channels, "Conv2d channel mismatch");

        let hw = h * w;
        let patch = self.patch_len();
        let mut out = Vec::with_capacity(n * self.out_channels * hw);
        self.columns.clear();

        for i in 0..n {
            let cols = im2col(input.item(i), c, h, w, self.kernel);
            let mut y = matmul(&self.weights.value.data, &cols, self.out_channels, patch, hw);
            for (o, plane) in y.chunks_mut(hw).enumerate() {
                let b = self.biases.value.data[o];
                for v in plane {
                    *v += b;
                }
            }
            out.extend_from_slice(&y);
            self.columns.push(cols);
        }

        self.input_shape = input.shape.clone();
        Tensor::from_vec(&[n, self.out_channels, h, w], out)
    }

    fn backward(&mut self, grad_output: &Tensor) -> Tensor {
        let (n, c, h, w) = (
            self.input_shape[0],
            self.input_shape[1],
            self.input_shape[2],
            self.input_shape[3],
        );
        let hw = h * w;
        let patch = self.patch_len();
        let weights_t = transpose(&self.weights.value.data, self.out_channels, patch);
        let mut grad_input = Vec::with_capacity(n * c * hw);

        for (i, cols) in self.columns.iter().enumerate() {
            let delta = grad_output.item(i);

            let cols_t = transpose(cols, patch, hw);
            let w_grad = matmul(delta, &cols_t, self.out_channels, hw, patch);
            for (g, v) in self.weights.grad.data.iter_mut().zip(w_grad) {
                *g += v;
            }
            for (o, plane) in delta.chunks(hw).enumerate() {
                self.biases.grad.data[o] += plane.iter().sum::<f64>();
            }

            let grad_cols = matmul(&weights_t, delta, patch, self.out_channels, hw);
            grad_input.extend(col2im(&grad_cols, c, h, w, self.kernel));
        }

        Tensor::from_vec(&self.input_shape, grad_input)
    }

    fn params_mut(&mut self) -> Vec<(String, &mut Param)> {
        vec![
            ("weight".to_string(), &mut self.weights),
            ("bias".to_string(), &mut self.biases),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn identity_kernel_reproduces_input() {
        let mut conv = Conv2d::new(1, 1, 3);
        conv.weights.value.fill(0.0);
        conv.weights.value.data[4] = 1.0; // centre tap
        let input = Tensor::from_vec(&[1, 1, 2, 2], vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(conv.forward(&input).data, input.data);
    }

    #[test]
    fn input_gradient_matches_finite_difference() {
        let mut conv = Conv2d::new(2, 3, 3);
        let input = Tensor::randn(&[2, 2, 4, 4]);

        let out = conv.forward(&input);
        let grad = conv.backward(&Tensor::full(&out.shape, 1.0));

        let h = 1e-6;
        let idx = 21;
        let mut plus = input.clone();
        plus.data[idx] += h;
        let mut minus = input.clone();
        minus.data[idx] -= h;
        let numeric = (conv.forward(&plus).sum() - conv.forward(&minus).sum()) / (2.0 * h);

        assert_abs_diff_eq!(grad.data[idx], numeric, epsilon = 1e-5);
    }
}
