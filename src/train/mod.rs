pub mod autoencoder;
pub mod checkpoint;
pub mod epoch_stats;
pub mod kl;
pub mod loop_fn;
pub mod metrics;
pub mod perf;
pub mod run;
pub mod train_config;

pub use autoencoder::{train_autoencoder, validate_autoencoder};
pub use checkpoint::{checkpoint_path, Checkpoint};
pub use epoch_stats::{AutoencoderEpochStats, EpochStats};
pub use kl::KlAnnealing;
pub use loop_fn::{train, validate};
pub use metrics::RunningMetrics;
pub use perf::{perf, PerfOptions, PerfOutcome};
pub use run::{evaluate_model, run, run_autoencoder, AutoencoderRunReport, DatasetScore, RunReport};
pub use train_config::{LoopOptions, RunConfig};
