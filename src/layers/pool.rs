use crate::math::tensor::Tensor;
use super::Layer;

/// 2×2 max pooling with stride 2. Odd trailing rows/columns are dropped.
#[derive(Debug, Default)]
pub struct MaxPool2d {
    input_shape: Vec<usize>,
    argmax: Vec<usize>,
}

impl MaxPool2d {
    pub fn new() -> MaxPool2d {
        MaxPool2d::default()
    }
}

impl Layer for MaxPool2d {
    fn forward(&mut self, input: &Tensor) -> Tensor {
        let (n, c, h, w) = (input.shape[0], input.shape[1], input.shape[2], input.shape[3]);
        let (oh, ow) = (h / 2, w / 2);
        let mut out = Vec::with_capacity(n * c * oh * ow);
        self.argmax.clear();

        for plane in 0..n * c {
            let base = plane * h * w;
            for y in 0..oh {
                for x in 0..ow {
                    let mut best = base + (2 * y) * w + 2 * x;
                    for (dy, dx) in [(0, 1), (1, 0), (1, 1)] {
                        let idx = base + (2 * y + dy) * w + 2 * x + dx;
                        if input.data[idx] > input.data[best] {
                            best = idx;
                        }
                    }
                    out.push(input.data[best]);
                    self.argmax.push(best);
                }
            }
        }

        self.input_shape = input.shape.clone();
        Tensor::from_vec(&[n, c, oh, ow], out)
    }

    fn backward(&mut self, grad_output: &Tensor) -> Tensor {
        let mut grad = Tensor::zeros(&self.input_shape);
        for (&idx, g) in self.argmax.iter().zip(&grad_output.data) {
            grad.data[idx] += g;
        }
        grad
    }
}

/// Averages each channel over its spatial extent: `[N, C, H, W]` → `[N, C]`.
#[derive(Debug, Default)]
pub struct GlobalAvgPool {
    input_shape: Vec<usize>,
}

impl GlobalAvgPool {
    pub fn new() -> GlobalAvgPool {
        GlobalAvgPool::default()
    }
}

impl Layer for GlobalAvgPool {
    fn forward(&mut self, input: &Tensor) -> Tensor {
        let (n, c) = (input.shape[0], input.shape[1]);
        let hw = input.shape[2] * input.shape[3];
        let data = input
            .data
            .chunks(hw)
            .map(|plane| plane.iter().sum::<f64>() / hw as f64)
            .collect();
        self.input_shape = input.shape.clone();
        Tensor::from_vec(&[n, c], data)
    }

    fn backward(&mut self, grad_output: &Tensor) -> Tensor {
        let hw = self.input_shape[2] * self.input_shape[3];
        let data = grad_output
            .data
            .iter()
            .flat_map(|&g| std::iter::repeat(g / hw as f64).take(hw))
            .collect();
        Tensor::from_vec(&self.input_shape, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_pool_routes_gradient_to_the_maximum() {
        let mut pool = MaxPool2d::new();
        let input = Tensor::from_vec(&[1, 1, 2, 2], vec![1.0, 5.0, 3.0, 2.0]);
        assert_eq!(pool.forward(&input).data, vec![5.0]);
        let grad = pool.backward(&Tensor::from_vec(&[1, 1, 1, 1], vec![2.0]));
        assert_eq!(grad.data, vec![0.0, 2.0, 0.0, 0.0]);
    }
}
