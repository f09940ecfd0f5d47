/// Canonical feature-map widths at the five similarity taps (VGG stage outputs).
pub const DEFAULT_KERNEL_SIZES: [f64; 5] = [64.0, 128.0, 256.0, 512.0, 512.0];

const STYLE_WEIGHT_SCALE: f64 = 1e3;

/// Per-layer weights `1e3 / width²`, the classic style-transfer weighting.
pub fn style_weights(kernel_sizes: &[f64]) -> Vec<f64> {
    kernel_sizes.iter().map(|n| STYLE_WEIGHT_SCALE / (n * n)).collect()
}

/// Combines per-layer style distances into one scalar:
///   mean(wᵢ · sᵢ) + Σ(nᵢ · wᵢ)
///
/// The second term is a constant offset; it does not affect gradients.
pub fn similarity_loss(similarity: &[f64], kernel_sizes: &[f64]) -> f64 {
    assert_eq!(
        similarity.len(),
        kernel_sizes.len(),
        "one similarity value per kernel size required"
    );
    let weights = style_weights(kernel_sizes);
    let weighted_mean = similarity.iter().zip(&weights).map(|(s, w)| s * w).sum::<f64>()
        / similarity.len() as f64;
    let offset: f64 = kernel_sizes.iter().zip(&weights).map(|(n, w)| n * w).sum();
    weighted_mean + offset
}

/// ∂ similarity_loss / ∂ sᵢ = wᵢ / layers
pub fn similarity_loss_derivative(kernel_sizes: &[f64]) -> Vec<f64> {
    let layers = kernel_sizes.len() as f64;
    style_weights(kernel_sizes).into_iter().map(|w| w / layers).collect()
}
