use crate::{
    activation::ActivationFunction,
    layers::{Activation, Conv2d, Dense, GlobalAvgPool, Layer, MaxPool2d, Param, Residual},
    math::tensor::Tensor,
    network::sequential::{scoped, Sequential},
};
use super::{
    model::{Capabilities, ForwardOutput, Mode, Model, OutputGrad, ParamScope, Task},
    vgg::TuneScope,
};

#[derive(Debug, Clone)]
pub struct ResNetConfig {
    pub base_width: usize,
    pub num_classes: usize,
    pub blocks_per_stage: usize,
    pub tune: TuneScope,
}

/// Two-stage residual network with basic (conv-relu-conv) blocks and a
/// global-average-pooled linear head.
pub struct ResNet {
    tune: TuneScope,
    features: Sequential,
    fc: Sequential,
    mode: Mode,
}

fn basic_block(width: usize) -> Sequential {
    Sequential::new()
        .with(Residual::new(
            Sequential::new()
                .with(Conv2d::new(width, width, 3))
                .with(Activation::relu())
                .with(Conv2d::new(width, width, 3)),
        ))
        .with(Activation::relu())
}

impl ResNet {
    pub fn new(config: ResNetConfig) -> ResNet {
        let w = config.base_width;
        let mut features = Sequential::new()
            .with(Conv2d::new(3, w, 3))
            .with(Activation::relu())
            .with(MaxPool2d::new());
        for _ in 0..config.blocks_per_stage {
            features = features.with(basic_block(w));
        }
        features = features
            .with(Conv2d::new(w, 2 * w, 3))
            .with(Activation::relu())
            .with(MaxPool2d::new());
        for _ in 0..config.blocks_per_stage {
            features = features.with(basic_block(2 * w));
        }
        features = features.with(GlobalAvgPool::new());

        let fc = Sequential::new().with(Dense::new(config.num_classes, 2 * w, ActivationFunction::Identity));
        ResNet { tune: config.tune, features, fc, mode: Mode::Train }
    }
}

impl Model for ResNet {
    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    fn mode(&self) -> Mode {
        self.mode
    }

    fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    fn forward(&mut self, images: &Tensor, task: Task) -> ForwardOutput {
        assert_eq!(task, Task::Classify, "ResNet models only classify");
        let features = self.features.forward(images);
        ForwardOutput::Classification { logits: self.fc.forward(&features) }
    }

    fn backward(&mut self, grad: OutputGrad) {
        let OutputGrad::Classification { logits } = grad else {
            panic!("ResNet models only produce logits");
        };
        let g = self.fc.backward(&logits);
        if self.tune == TuneScope::All {
            self.features.backward(&g);
        }
    }

    fn params_mut(&mut self, scope: ParamScope) -> Vec<(String, &mut Param)> {
        let include_features = match scope {
            ParamScope::All => true,
            ParamScope::Trainable => self.tune == TuneScope::All,
            ParamScope::Classifier => false,
            ParamScope::Autoencoder => return Vec::new(),
        };
        let mut params = Vec::new();
        if include_features {
            params.extend(scoped("features", self.features.params_mut()));
        }
        params.extend(scoped("fc", self.fc.params_mut()));
        params
    }
}
