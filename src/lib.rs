pub mod activation;
pub mod config;
pub mod data;
pub mod error;
pub mod layers;
pub mod loss;
pub mod math;
pub mod models;
pub mod network;
pub mod optim;
pub mod score;
pub mod train;
pub mod util;

// Convenience re-exports
pub use math::tensor::Tensor;
pub use activation::activation::ActivationFunction;
pub use config::ExperimentConfig;
pub use error::{HarnessError, Result};
pub use models::{catalog, CatalogEntry, Model};
pub use network::sequential::Sequential;
pub use train::{perf, run, run_autoencoder};
