pub mod cross_entropy;
pub mod mse;
pub mod similarity;
pub mod vae;

pub use cross_entropy::CrossEntropyLoss;
pub use mse::MseLoss;
pub use similarity::{similarity_loss, DEFAULT_KERNEL_SIZES};
pub use vae::VaeLoss;
