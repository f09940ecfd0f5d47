//! Image decoding and PNG grid output.

use std::path::Path;

use image::{DynamicImage, Rgb, RgbImage};

use crate::{error::Result, math::tensor::Tensor};

/// Padding between grid cells, in pixels.
const GRID_PADDING: u32 = 2;

/// Opens an image file and converts it to 8-bit RGB.
pub fn load_rgb(path: &Path) -> Result<DynamicImage> {
    Ok(DynamicImage::ImageRgb8(image::open(path)?.to_rgb8()))
}

/// Converts an RGB image to a `[3, H, W]` tensor with values in [0, 1].
pub fn rgb_to_tensor(img: &RgbImage) -> Tensor {
    let (w, h) = img.dimensions();
    let plane = (w * h) as usize;
    let mut data = vec![0.0; 3 * plane];
    for (i, p) in img.pixels().enumerate() {
        for c in 0..3 {
            data[c * plane + i] = p.0[c] as f64 / 255.0;
        }
    }
    Tensor::from_vec(&[3, h as usize, w as usize], data)
}

/// Writes a `[N, C, H, W]` batch as one PNG grid, `nrow` images per row.
///
/// Single-channel images are rendered as grey. With `normalize` the whole
/// batch is min–max scaled to [0, 1] first; otherwise values are clamped.
pub fn save_image_grid(images: &Tensor, nrow: usize, normalize: bool, path: &Path) -> Result<()> {
    assert_eq!(images.shape.len(), 4, "save_image_grid expects [N, C, H, W]");
    let (n, c, h, w) = (images.shape[0], images.shape[1], images.shape[2], images.shape[3]);
    assert!(c == 1 || c == 3, "save_image_grid supports 1 or 3 channels");

    let (lo, hi) = if normalize { (images.min(), images.max()) } else { (0.0, 1.0) };
    let range = (hi - lo).max(1e-5);

    let cols = nrow.min(n).max(1) as u32;
    let rows = n.div_ceil(cols as usize) as u32;
    let cell_w = w as u32 + GRID_PADDING;
    let cell_h = h as u32 + GRID_PADDING;
    let mut grid = RgbImage::new(cols * cell_w + GRID_PADDING, rows * cell_h + GRID_PADDING);

    for k in 0..n {
        let item = images.item(k);
        let x0 = (k as u32 % cols) * cell_w + GRID_PADDING;
        let y0 = (k as u32 / cols) * cell_h + GRID_PADDING;
        for y in 0..h {
            for x in 0..w {
                let mut px = [0u8; 3];
                for (ch, v) in px.iter_mut().enumerate() {
                    let src = if c == 1 { 0 } else { ch };
                    let value = (item[(src * h + y) * w + x] - lo) / range;
                    *v = (value.clamp(0.0, 1.0) * 255.0 + 0.5) as u8;
                }
                grid.put_pixel(x0 + x as u32, y0 + y as u32, Rgb(px));
            }
        }
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    grid.save(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_dimensions_follow_nrow_and_padding() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid.png");
        save_image_grid(&Tensor::randn(&[5, 3, 4, 6]), 2, true, &path).unwrap();

        let img = image::open(&path).unwrap().to_rgb8();
        // 2 columns x 3 rows of 6x4 cells with 2px padding around each
        assert_eq!(img.dimensions(), (2 * 8 + 2, 3 * 6 + 2));
    }

    #[test]
    fn tensor_round_trips_pixel_values() {
        let img = RgbImage::from_fn(2, 1, |x, _| if x == 0 { Rgb([255, 0, 0]) } else { Rgb([0, 0, 255]) });
        let t = rgb_to_tensor(&img);
        assert_eq!(t.shape, vec![3, 1, 2]);
        assert_eq!(t.data, vec![1.0, 0.0, 0.0, 0.0, 0.0, 1.0]);
    }
}
