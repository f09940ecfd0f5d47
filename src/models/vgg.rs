use crate::{
    activation::ActivationFunction,
    layers::{Activation, Conv2d, Dense, Flatten, InstanceNorm2d, Layer, MaxPool2d, Param},
    math::tensor::Tensor,
    network::sequential::{scoped, Sequential},
};
use super::{
    model::{Capabilities, ForwardOutput, Mode, Model, OutputGrad, ParamScope, Task},
    style::StyleDistance,
};

/// Convolutions per block in the VGG-19 layout.
const VGG19_CONVS: [usize; 5] = [2, 2, 4, 4, 4];
/// Block widths relative to the first block (64-128-256-512-512 at base 64).
const WIDTH_MULTIPLIERS: [usize; 5] = [1, 2, 4, 8, 8];

/// Where instance normalisation is inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormPlacement {
    None,
    /// After the first convolution only.
    Single,
    /// After every convolution.
    All,
}

/// Which part of the network the optimizer may update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TuneScope {
    Classifier,
    /// Everything from the first normalisation onwards; the first
    /// convolution stays frozen.
    AfterNorm,
    All,
}

#[derive(Debug, Clone)]
pub struct VggConfig {
    pub base_width: usize,
    pub input_size: usize,
    pub num_classes: usize,
    pub norm: NormPlacement,
    pub affine: bool,
    pub similarity: bool,
    pub tune: TuneScope,
}

/// Parameter prefix of the first convolution.
const FIRST_CONV: &str = "features.0.0.";

/// Five-block VGG-19-style classifier, optionally instance-normalised and
/// optionally reporting the style distance of every block's output.
pub struct Vgg {
    config: VggConfig,
    blocks: Vec<Sequential>,
    classifier: Sequential,
    style: Vec<StyleDistance>,
    mode: Mode,
}

impl Vgg {
    pub fn new(config: VggConfig) -> Vgg {
        assert!(
            config.input_size >= 32 && config.input_size % 32 == 0,
            "VGG input size must be a positive multiple of 32"
        );

        let mut blocks = Vec::with_capacity(VGG19_CONVS.len());
        let mut channels = 3;
        let mut first_conv = true;
        for (convs, mult) in VGG19_CONVS.iter().zip(WIDTH_MULTIPLIERS) {
            let width = config.base_width * mult;
            let mut block = Sequential::new();
            for _ in 0..*convs {
                block = block.with(Conv2d::new(channels, width, 3));
                let norm_here = match config.norm {
                    NormPlacement::None => false,
                    NormPlacement::Single => first_conv,
                    NormPlacement::All => true,
                };
                if norm_here {
                    block = block.with(InstanceNorm2d::new(width, config.affine));
                }
                block = block.with(Activation::relu());
                channels = width;
                first_conv = false;
            }
            blocks.push(block.with(MaxPool2d::new()));
        }

        let spatial = config.input_size / 32;
        let hidden = config.base_width * 16;
        let classifier = Sequential::new()
            .with(Flatten::new())
            .with(Dense::new(hidden, channels * spatial * spatial, ActivationFunction::ReLU))
            .with(Dense::new(config.num_classes, hidden, ActivationFunction::Identity));

        let style = (0..blocks.len()).map(|_| StyleDistance::new()).collect();
        Vgg { config, blocks, classifier, style, mode: Mode::Train }
    }
}

impl Model for Vgg {
    fn capabilities(&self) -> Capabilities {
        Capabilities { similarity: self.config.similarity, autoencoder: false }
    }

    fn mode(&self) -> Mode {
        self.mode
    }

    fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    fn forward(&mut self, images: &Tensor, task: Task) -> ForwardOutput {
        assert_eq!(task, Task::Classify, "VGG models only classify");

        let mut x = images.clone();
        let mut similarity = Vec::with_capacity(self.blocks.len());
        for (block, style) in self.blocks.iter_mut().zip(&mut self.style) {
            x = block.forward(&x);
            if self.config.similarity {
                similarity.push(style.forward(&x));
            }
        }
        let logits = self.classifier.forward(&x);

        if self.config.similarity {
            ForwardOutput::ClassificationWithSimilarity { logits, similarity }
        } else {
            ForwardOutput::Classification { logits }
        }
    }

    fn backward(&mut self, grad: OutputGrad) {
        let (logits, similarity) = match grad {
            OutputGrad::Classification { logits } => (logits, None),
            OutputGrad::ClassificationWithSimilarity { logits, similarity } => (logits, Some(similarity)),
            OutputGrad::Reconstruction { .. } => panic!("VGG models have no reconstruction output"),
        };

        let mut g = self.classifier.backward(&logits);
        // Frozen features: nothing below the classifier can change.
        if self.config.tune == TuneScope::Classifier {
            return;
        }
        for i in (0..self.blocks.len()).rev() {
            if let Some(sim) = &similarity {
                g.add_assign(&self.style[i].backward(sim[i]));
            }
            g = self.blocks[i].backward(&g);
        }
    }

    fn params_mut(&mut self, scope: ParamScope) -> Vec<(String, &mut Param)> {
        let include_features = match scope {
            ParamScope::All => true,
            ParamScope::Trainable => self.config.tune != TuneScope::Classifier,
            ParamScope::Classifier => false,
            ParamScope::Autoencoder => return Vec::new(),
        };
        let skip_first_conv = scope == ParamScope::Trainable && self.config.tune == TuneScope::AfterNorm;

        let mut params = Vec::new();
        if include_features {
            for (i, block) in self.blocks.iter_mut().enumerate() {
                params.extend(
                    scoped(&format!("features.{i}"), block.params_mut())
                        .into_iter()
                        .filter(|(name, _)| !(skip_first_conv && name.starts_with(FIRST_CONV))),
                );
            }
        }
        params.extend(scoped("classifier", self.classifier.params_mut()));
        params
    }
}
