use rand::prelude::*;
use serde::{Serialize, Deserialize};
use std::f64::consts::PI;
use std::ops::{Add, Sub, Mul};

/// Dense row-major tensor of `f64` values.
///
/// Image batches use the `[N, C, H, W]` layout; dense activations use
/// `[N, features]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Tensor {
    pub shape: Vec<usize>,
    pub data: Vec<f64>,
}

impl Tensor {
    pub fn zeros(shape: &[usize]) -> Tensor {
        Tensor::full(shape, 0.0)
    }

    pub fn full(shape: &[usize], value: f64) -> Tensor {
        Tensor {
            shape: shape.to_vec(),
            data: vec![value; shape.iter().product()],
        }
    }

    pub fn from_vec(shape: &[usize], data: Vec<f64>) -> Tensor {
        assert_eq!(
            shape.iter().product::<usize>(),
            data.len(),
            "shape {:?} does not match {} elements",
            shape,
            data.len()
        );
        Tensor { shape: shape.to_vec(), data }
    }

    /// Samples a single value from N(0, 1) using the Box-Muller transform.
    pub fn sample_standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
        // Both draws live in (0, 1] so ln() never sees zero.
        let u1: f64 = 1.0 - rng.gen::<f64>();
        let u2: f64 = 1.0 - rng.gen::<f64>();
        (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    }

    /// Tensor of independent N(0, 1) samples.
    pub fn randn(shape: &[usize]) -> Tensor {
        Tensor::normal(shape, 1.0)
    }

    fn normal(shape: &[usize], std_dev: f64) -> Tensor {
        let mut rng = rand::thread_rng();
        let n = shape.iter().product();
        let data = (0..n)
            .map(|_| Tensor::sample_standard_normal(&mut rng) * std_dev)
            .collect();
        Tensor { shape: shape.to_vec(), data }
    }

    /// He initialization: samples from N(0, sqrt(2 / fan_in)).
    ///
    /// Recommended before ReLU layers. The variance 2/fan_in accounts for
    /// the fact that ReLU zeroes half of its inputs on average.
    pub fn he(shape: &[usize], fan_in: usize) -> Tensor {
        Tensor::normal(shape, (2.0 / fan_in as f64).sqrt())
    }

    /// Xavier (Glorot) initialization: samples from N(0, sqrt(1 / fan_in)).
    ///
    /// Recommended before Sigmoid/Tanh/Identity layers.
    pub fn xavier(shape: &[usize], fan_in: usize) -> Tensor {
        Tensor::normal(shape, (1.0 / fan_in as f64).sqrt())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Size of the leading (batch) dimension.
    pub fn batch_size(&self) -> usize {
        self.shape.first().copied().unwrap_or(0)
    }

    /// Number of elements in one item of the leading dimension.
    pub fn item_len(&self) -> usize {
        self.shape.iter().skip(1).product()
    }

    /// Borrow item `index` of the leading dimension as a flat slice.
    pub fn item(&self, index: usize) -> &[f64] {
        let n = self.item_len();
        &self.data[index * n..(index + 1) * n]
    }

    pub fn reshape(&self, shape: &[usize]) -> Tensor {
        Tensor::from_vec(shape, self.data.clone())
    }

    /// First `n` items of the leading dimension.
    pub fn narrow(&self, n: usize) -> Tensor {
        let n = n.min(self.batch_size());
        let mut shape = self.shape.clone();
        shape[0] = n;
        Tensor::from_vec(&shape, self.data[..n * self.item_len()].to_vec())
    }

    /// Concatenates tensors along the leading dimension.
    pub fn cat(parts: &[Tensor]) -> Tensor {
        assert!(!parts.is_empty(), "cat of zero tensors");
        let tail = &parts[0].shape[1..];
        let mut data = Vec::new();
        let mut lead = 0;
        for part in parts {
            assert_eq!(&part.shape[1..], tail, "Tensors are of incorrect sizes");
            lead += part.shape[0];
            data.extend_from_slice(&part.data);
        }
        let mut shape = vec![lead];
        shape.extend_from_slice(tail);
        Tensor::from_vec(&shape, data)
    }

    /// Stacks equally-shaped tensors into a new leading dimension.
    pub fn stack(items: &[Tensor]) -> Tensor {
        assert!(!items.is_empty(), "stack of zero tensors");
        let mut shape = vec![items.len()];
        shape.extend_from_slice(&items[0].shape);
        let mut data = Vec::with_capacity(items.len() * items[0].len());
        for item in items {
            assert_eq!(item.shape, items[0].shape, "Tensors are of incorrect sizes");
            data.extend_from_slice(&item.data);
        }
        Tensor::from_vec(&shape, data)
    }

    pub fn map<F>(&self, functor: F) -> Tensor
    where
        F: Fn(f64) -> f64,
    {
        Tensor {
            shape: self.shape.clone(),
            data: self.data.iter().map(|&x| functor(x)).collect(),
        }
    }

    pub fn zip_map<F>(&self, other: &Tensor, functor: F) -> Tensor
    where
        F: Fn(f64, f64) -> f64,
    {
        assert_eq!(self.shape, other.shape, "Tensors are of incorrect sizes");
        Tensor {
            shape: self.shape.clone(),
            data: self.data.iter().zip(&other.data).map(|(&a, &b)| functor(a, b)).collect(),
        }
    }

    pub fn add_assign(&mut self, other: &Tensor) {
        assert_eq!(self.shape, other.shape, "Tensors are of incorrect sizes");
        for (a, b) in self.data.iter_mut().zip(&other.data) {
            *a += b;
        }
    }

    pub fn scale_in_place(&mut self, factor: f64) {
        for x in &mut self.data {
            *x *= factor;
        }
    }

    pub fn fill(&mut self, value: f64) {
        for x in &mut self.data {
            *x = value;
        }
    }

    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    pub fn mean(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.sum() / self.data.len() as f64
    }

    pub fn min(&self) -> f64 {
        self.data.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn max(&self) -> f64 {
        self.data.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn norm_squared(&self) -> f64 {
        self.data.iter().map(|x| x * x).sum()
    }
}

impl Add for Tensor {
    type Output = Tensor;

    fn add(mut self, rhs: Self) -> Self::Output {
        self.add_assign(&rhs);
        self
    }
}

impl Sub for Tensor {
    type Output = Tensor;

    fn sub(self, rhs: Self) -> Self::Output {
        self.zip_map(&rhs, |a, b| a - b)
    }
}

impl Mul<f64> for Tensor {
    type Output = Tensor;

    fn mul(mut self, rhs: f64) -> Self::Output {
        self.scale_in_place(rhs);
        self
    }
}

/// Row-major `[rows, inner] x [inner, cols]` product on flat buffers.
pub fn matmul(a: &[f64], b: &[f64], rows: usize, inner: usize, cols: usize) -> Vec<f64> {
    let mut out = vec![0.0; rows * cols];
    for i in 0..rows {
        for k in 0..inner {
            let aik = a[i * inner + k];
            if aik == 0.0 {
                continue;
            }
            let b_row = &b[k * cols..(k + 1) * cols];
            let out_row = &mut out[i * cols..(i + 1) * cols];
            for (o, &bv) in out_row.iter_mut().zip(b_row) {
                *o += aik * bv;
            }
        }
    }
    out
}

/// Transpose of a row-major `[rows, cols]` buffer.
pub fn transpose(a: &[f64], rows: usize, cols: usize) -> Vec<f64> {
    let mut out = vec![0.0; rows * cols];
    for i in 0..rows {
        for j in 0..cols {
            out[j * rows + i] = a[i * cols + j];
        }
    }
    out
}
