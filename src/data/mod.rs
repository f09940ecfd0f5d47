pub mod batch;
pub mod image_folder;
pub mod loader;
pub mod source;
pub mod transforms;

pub use batch::{Batch, Sample};
pub use image_folder::{ImageFolderDataset, ImageFolderLoader};
pub use loader::{DataLoader, InMemoryLoader};
pub use source::{DatasetSource, ImageFolderSource, Split};
pub use transforms::Transform;
