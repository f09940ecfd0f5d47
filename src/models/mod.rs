pub mod catalog;
pub mod model;
pub mod resnet;
pub mod style;
pub mod vae;
pub mod vgg;

pub use catalog::{catalog, CatalogEntry, CatalogOptions};
pub use model::{Capabilities, ForwardOutput, Mode, Model, OutputGrad, ParamScope, Task};
