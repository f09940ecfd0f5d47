use crate::math::tensor::Tensor;
use super::Layer;

/// `[N, ...]` → `[N, prod(...)]`.
#[derive(Debug, Default)]
pub struct Flatten {
    input_shape: Vec<usize>,
}

impl Flatten {
    pub fn new() -> Flatten {
        Flatten::default()
    }
}

impl Layer for Flatten {
    fn forward(&mut self, input: &Tensor) -> Tensor {
        self.input_shape = input.shape.clone();
        input.reshape(&[input.batch_size(), input.item_len()])
    }

    fn backward(&mut self, grad_output: &Tensor) -> Tensor {
        grad_output.reshape(&self.input_shape)
    }
}

/// Reshapes each item to `item_shape`, keeping the batch dimension.
#[derive(Debug)]
pub struct Reshape {
    item_shape: Vec<usize>,
    input_shape: Vec<usize>,
}

impl Reshape {
    pub fn new(item_shape: &[usize]) -> Reshape {
        Reshape { item_shape: item_shape.to_vec(), input_shape: Vec::new() }
    }
}

impl Layer for Reshape {
    fn forward(&mut self, input: &Tensor) -> Tensor {
        self.input_shape = input.shape.clone();
        let mut shape = vec![input.batch_size()];
        shape.extend_from_slice(&self.item_shape);
        input.reshape(&shape)
    }

    fn backward(&mut self, grad_output: &Tensor) -> Tensor {
        grad_output.reshape(&self.input_shape)
    }
}

/// Nearest-neighbour ×2 spatial upsampling.
#[derive(Debug, Default)]
pub struct Upsample {
    input_shape: Vec<usize>,
}

impl Upsample {
    pub fn new() -> Upsample {
        Upsample::default()
    }
}

impl Layer for Upsample {
    fn forward(&mut self, input: &Tensor) -> Tensor {
        let (n, c, h, w) = (input.shape[0], input.shape[1], input.shape[2], input.shape[3]);
        let (oh, ow) = (h * 2, w * 2);
        let mut out = Vec::with_capacity(n * c * oh * ow);
        for plane in input.data.chunks(h * w) {
            for y in 0..oh {
                for x in 0..ow {
                    out.push(plane[(y / 2) * w + x / 2]);
                }
            }
        }
        self.input_shape = input.shape.clone();
        Tensor::from_vec(&[n, c, oh, ow], out)
    }

    fn backward(&mut self, grad_output: &Tensor) -> Tensor {
        let (h, w) = (self.input_shape[2], self.input_shape[3]);
        let ow = w * 2;
        let mut grad = Tensor::zeros(&self.input_shape);
        for (plane, g_plane) in grad
            .data
            .chunks_mut(h * w)
            .zip(grad_output.data.chunks(4 * h * w))
        {
            for (i, g) in g_plane.iter().enumerate() {
                let (y, x) = (i / ow, i % ow);
                plane[(y / 2) * w + x / 2] += g;
            }
        }
        grad
    }
}
