use image::{imageops::FilterType, DynamicImage, GenericImageView, RgbImage};
use rand::Rng;

use crate::{math::tensor::Tensor, util::image::rgb_to_tensor};

/// ImageNet channel statistics used to normalise network inputs.
pub const IMAGENET_MEAN: [f64; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f64; 3] = [0.229, 0.224, 0.225];

/// Geometry and normalisation applied to every decoded image.
#[derive(Debug, Clone, Copy)]
pub struct Transform {
    pub size: u32,
    /// Random resized crop + horizontal flip instead of resize + centre crop.
    pub augment: bool,
}

impl Transform {
    pub fn eval(size: u32) -> Transform {
        Transform { size, augment: false }
    }

    pub fn train(size: u32) -> Transform {
        Transform { size, augment: true }
    }

    /// Produces a `size × size` RGB image.
    pub fn geometry<R: Rng + ?Sized>(&self, img: &DynamicImage, rng: &mut R) -> RgbImage {
        if self.augment {
            let cropped = random_resized_crop(img, self.size, rng);
            if rng.gen_bool(0.5) {
                image::imageops::flip_horizontal(&cropped)
            } else {
                cropped
            }
        } else {
            resize_center_crop(img, self.size)
        }
    }

    /// Network input: geometry, then per-channel `(x - mean) / std`.
    pub fn apply<R: Rng + ?Sized>(&self, img: &DynamicImage, rng: &mut R) -> Tensor {
        normalize(rgb_to_tensor(&self.geometry(img, rng)))
    }
}

pub fn normalize(mut t: Tensor) -> Tensor {
    let plane = t.len() / 3;
    for (c, chunk) in t.data.chunks_mut(plane).enumerate() {
        for v in chunk {
            *v = (*v - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
        }
    }
    t
}

/// Resize the shorter side to `size · 256 / 224`, then take the centre
/// `size × size` crop.
fn resize_center_crop(img: &DynamicImage, size: u32) -> RgbImage {
    let short = size * 256 / 224;
    let (w, h) = img.dimensions();
    let (nw, nh) = if w <= h {
        (short, (h as u64 * short as u64 / w.max(1) as u64) as u32)
    } else {
        ((w as u64 * short as u64 / h.max(1) as u64) as u32, short)
    };
    let resized = img.resize_exact(nw.max(size), nh.max(size), FilterType::Triangle);
    let (rw, rh) = resized.dimensions();
    resized
        .crop_imm((rw - size) / 2, (rh - size) / 2, size, size)
        .to_rgb8()
}

/// Crop a random region covering 8–100% of the area with aspect ratio in
/// [3/4, 4/3], resized to `size × size`. Falls back to the centre crop.
fn random_resized_crop<R: Rng + ?Sized>(img: &DynamicImage, size: u32, rng: &mut R) -> RgbImage {
    let (w, h) = img.dimensions();
    let area = (w * h) as f64;
    for _ in 0..10 {
        let target_area = area * rng.gen_range(0.08..=1.0);
        let log_ratio = rng.gen_range((3.0f64 / 4.0).ln()..=(4.0f64 / 3.0).ln());
        let ratio = log_ratio.exp();
        let cw = (target_area * ratio).sqrt().round() as u32;
        let ch = (target_area / ratio).sqrt().round() as u32;
        if cw > 0 && ch > 0 && cw <= w && ch <= h {
            let x = rng.gen_range(0..=w - cw);
            let y = rng.gen_range(0..=h - ch);
            return img
                .crop_imm(x, y, cw, ch)
                .resize_exact(size, size, FilterType::Triangle)
                .to_rgb8();
        }
    }
    resize_center_crop(img, size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_transforms_yield_requested_size() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(50, 30, image::Rgb([10, 20, 30])));
        let mut rng = rand::thread_rng();
        for t in [Transform::eval(16), Transform::train(16)] {
            let out = t.apply(&img, &mut rng);
            assert_eq!(out.shape, vec![3, 16, 16]);
        }
    }

    #[test]
    fn normalization_centres_the_imagenet_mean() {
        let mean_pixel = Tensor::from_vec(&[3, 1, 1], IMAGENET_MEAN.to_vec());
        let out = normalize(mean_pixel);
        assert!(out.data.iter().all(|v| v.abs() < 1e-12));
    }
}
