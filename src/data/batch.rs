use crate::math::tensor::Tensor;

/// One decoded example.
#[derive(Debug, Clone)]
pub struct Sample {
    /// Normalised network input, `[C, H, W]`.
    pub image: Tensor,
    pub target: usize,
    /// Reconstruction target in `[0, 1]`, `[C, H, W]`; pair datasets only.
    pub target_image: Option<Tensor>,
}

/// A collated mini-batch.
#[derive(Debug, Clone)]
pub struct Batch {
    /// `[N, C, H, W]`
    pub images: Tensor,
    pub targets: Vec<usize>,
    /// `[N, C, H, W]`, present when every sample carried a target image.
    pub target_images: Option<Tensor>,
}

impl Batch {
    pub fn collate(samples: &[Sample]) -> Batch {
        let images: Vec<Tensor> = samples.iter().map(|s| s.image.clone()).collect();
        let target_images: Option<Vec<Tensor>> =
            samples.iter().map(|s| s.target_image.clone()).collect();
        Batch {
            images: Tensor::stack(&images),
            targets: samples.iter().map(|s| s.target).collect(),
            target_images: target_images.map(|t| Tensor::stack(&t)),
        }
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
