use crate::{
    error::Result,
    layers::Param,
    math::tensor::Tensor,
    network::state::{collect_state, restore_state, StateDict},
};

/// Operating mode of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Train,
    Eval,
    /// Autoencoder phase: only the encoder/decoder learn.
    TrainAutoencoder,
    /// Classifier phase of an autoencoder: the encoder is frozen.
    TrainClassifier,
}

impl Mode {
    pub fn is_training(self) -> bool {
        !matches!(self, Mode::Eval)
    }
}

/// What a forward pass should compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Classify,
    Reconstruct,
}

/// Declared behaviour of a catalog model, consulted by the orchestrators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    /// Forward passes also report per-stage style distances.
    pub similarity: bool,
    /// Has an encoder/decoder pair and a latent classifier head.
    pub autoencoder: bool,
}

/// Which parameters an optimizer should see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamScope {
    All,
    /// Whatever the model's configuration and current mode leave unfrozen.
    Trainable,
    Classifier,
    Autoencoder,
}

/// Result of a forward pass.
#[derive(Debug, Clone)]
pub enum ForwardOutput {
    Classification {
        logits: Tensor,
    },
    ClassificationWithSimilarity {
        logits: Tensor,
        /// One style distance per similarity tap.
        similarity: Vec<f64>,
    },
    Reconstruction {
        reconstruction: Tensor,
        mu: Tensor,
        logvar: Tensor,
    },
}

/// Loss gradient w.r.t. each output of the matching [`ForwardOutput`].
#[derive(Debug, Clone)]
pub enum OutputGrad {
    Classification {
        logits: Tensor,
    },
    ClassificationWithSimilarity {
        logits: Tensor,
        similarity: Vec<f64>,
    },
    Reconstruction {
        reconstruction: Tensor,
        mu: Tensor,
        logvar: Tensor,
    },
}

pub trait Model {
    fn capabilities(&self) -> Capabilities;

    fn mode(&self) -> Mode;

    fn set_mode(&mut self, mode: Mode);

    fn forward(&mut self, images: &Tensor, task: Task) -> ForwardOutput;

    /// Back-propagates through the most recent forward pass, accumulating
    /// parameter gradients.
    fn backward(&mut self, grad: OutputGrad);

    fn params_mut(&mut self, scope: ParamScope) -> Vec<(String, &mut Param)>;

    fn zero_grad(&mut self) {
        for (_, p) in self.params_mut(ParamScope::All) {
            p.zero_grad();
        }
    }

    fn state_dict(&mut self) -> StateDict {
        collect_state(self.params_mut(ParamScope::All))
    }

    fn load_state_dict(&mut self, state: &StateDict) -> Result<()> {
        restore_state(self.params_mut(ParamScope::All), state)
    }

    /// Decodes `count` latent vectors drawn from N(0, I); autoencoders only.
    fn sample(&mut self, _count: usize) -> Option<Tensor> {
        None
    }
}
