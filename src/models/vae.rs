use crate::{
    activation::ActivationFunction,
    layers::{Activation, Conv2d, Dense, Flatten, Layer, MaxPool2d, Param, Reshape, Upsample},
    math::tensor::Tensor,
    network::sequential::{scoped, Sequential},
};
use super::model::{Capabilities, ForwardOutput, Mode, Model, OutputGrad, ParamScope, Task};

const LEAK: f64 = 0.2;

#[derive(Debug, Clone)]
pub struct VaeConfig {
    pub base_width: usize,
    pub input_size: usize,
    pub z_size: usize,
    pub num_classes: usize,
}

/// Convolutional variational autoencoder with a classifier on the latent mean.
///
/// Reconstruction: `x → encoder → (μ, log σ²) → z → decoder → x̂`, with
/// `z = μ + ε·σ` while training and `z = μ` in eval mode.
/// Classification: `x → encoder → μ → classifier`.
pub struct Vae {
    pub z_size: usize,
    encoder: Sequential,
    mu_head: Dense,
    logvar_head: Dense,
    latent_to_decoder: Dense,
    decoder: Sequential,
    classifier: Sequential,
    eps: Tensor,
    logvar: Tensor,
    mode: Mode,
}

impl Vae {
    pub fn new(config: VaeConfig) -> Vae {
        assert!(
            config.input_size >= 8 && config.input_size % 8 == 0,
            "VAE input size must be a positive multiple of 8"
        );
        let w = config.base_width;
        let leaky = || Activation::new(ActivationFunction::LeakyReLU { alpha: LEAK });

        let encoder = Sequential::new()
            .with(Conv2d::new(3, w, 3))
            .with(leaky())
            .with(MaxPool2d::new())
            .with(Conv2d::new(w, 2 * w, 3))
            .with(leaky())
            .with(MaxPool2d::new())
            .with(Conv2d::new(2 * w, 4 * w, 3))
            .with(leaky())
            .with(MaxPool2d::new())
            .with(Flatten::new());

        let spatial = config.input_size / 8;
        let feature_len = 4 * w * spatial * spatial;

        let decoder = Sequential::new()
            .with(Reshape::new(&[4 * w, spatial, spatial]))
            .with(Upsample::new())
            .with(Conv2d::new(4 * w, 2 * w, 3))
            .with(Activation::relu())
            .with(Upsample::new())
            .with(Conv2d::new(2 * w, w, 3))
            .with(Activation::relu())
            .with(Upsample::new())
            .with(Conv2d::new(w, 3, 3))
            .with(Activation::new(ActivationFunction::Sigmoid));

        let hidden = 16 * w;
        let classifier = Sequential::new()
            .with(Dense::new(hidden, config.z_size, ActivationFunction::ReLU))
            .with(Dense::new(config.num_classes, hidden, ActivationFunction::Identity));

        Vae {
            z_size: config.z_size,
            encoder,
            mu_head: Dense::new(config.z_size, feature_len, ActivationFunction::Identity),
            logvar_head: Dense::new(config.z_size, feature_len, ActivationFunction::Identity),
            latent_to_decoder: Dense::new(feature_len, config.z_size, ActivationFunction::ReLU),
            decoder,
            classifier,
            eps: Tensor::default(),
            logvar: Tensor::default(),
            mode: Mode::Train,
        }
    }

    fn samples_latent(&self) -> bool {
        matches!(self.mode, Mode::Train | Mode::TrainAutoencoder)
    }

    fn decode(&mut self, z: &Tensor) -> Tensor {
        let x = self.latent_to_decoder.forward(z);
        self.decoder.forward(&x)
    }
}

impl Model for Vae {
    fn capabilities(&self) -> Capabilities {
        Capabilities { similarity: false, autoencoder: true }
    }

    fn mode(&self) -> Mode {
        self.mode
    }

    fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    fn forward(&mut self, images: &Tensor, task: Task) -> ForwardOutput {
        let features = self.encoder.forward(images);
        let mu = self.mu_head.forward(&features);

        match task {
            Task::Classify => ForwardOutput::Classification { logits: self.classifier.forward(&mu) },
            Task::Reconstruct => {
                let logvar = self.logvar_head.forward(&features);
                self.eps = if self.samples_latent() {
                    Tensor::randn(&mu.shape)
                } else {
                    Tensor::zeros(&mu.shape)
                };
                let mut z = mu.clone();
                for ((zi, e), lv) in z.data.iter_mut().zip(&self.eps.data).zip(&logvar.data) {
                    *zi += e * (0.5 * lv).exp();
                }
                self.logvar = logvar.clone();
                let reconstruction = self.decode(&z);
                ForwardOutput::Reconstruction { reconstruction, mu, logvar }
            }
        }
    }

    fn backward(&mut self, grad: OutputGrad) {
        match grad {
            OutputGrad::Classification { logits } => {
                let g = self.classifier.backward(&logits);
                if self.mode == Mode::TrainClassifier {
                    return;
                }
                let g_features = self.mu_head.backward(&g);
                self.encoder.backward(&g_features);
            }
            OutputGrad::Reconstruction { reconstruction, mu, logvar } => {
                let g_latent = self.decoder.backward(&reconstruction);
                let g_z = self.latent_to_decoder.backward(&g_latent);

                // z = μ + ε·exp(½ log σ²)
                let g_mu = g_z.clone() + mu;
                let mut g_logvar = logvar;
                for (((g, gz), e), lv) in g_logvar
                    .data
                    .iter_mut()
                    .zip(&g_z.data)
                    .zip(&self.eps.data)
                    .zip(&self.logvar.data)
                {
                    *g += gz * e * 0.5 * (0.5 * lv).exp();
                }

                let mut g_features = self.mu_head.backward(&g_mu);
                g_features.add_assign(&self.logvar_head.backward(&g_logvar));
                self.encoder.backward(&g_features);
            }
            OutputGrad::ClassificationWithSimilarity { .. } => {
                panic!("autoencoder models have no similarity output")
            }
        }
    }

    fn params_mut(&mut self, scope: ParamScope) -> Vec<(String, &mut Param)> {
        let scope = match (scope, self.mode) {
            (ParamScope::Trainable, Mode::TrainAutoencoder) => ParamScope::Autoencoder,
            (ParamScope::Trainable, Mode::TrainClassifier) => ParamScope::Classifier,
            (ParamScope::Trainable, _) => ParamScope::All,
            (scope, _) => scope,
        };
        let autoencoder = matches!(scope, ParamScope::All | ParamScope::Autoencoder);
        let classifier = matches!(scope, ParamScope::All | ParamScope::Classifier);

        let mut params = Vec::new();
        if autoencoder {
            params.extend(scoped("encoder", self.encoder.params_mut()));
            params.extend(scoped("fc_mu", self.mu_head.params_mut()));
            params.extend(scoped("fc_logvar", self.logvar_head.params_mut()));
            params.extend(scoped("latent_to_decoder", self.latent_to_decoder.params_mut()));
            params.extend(scoped("decoder", self.decoder.params_mut()));
        }
        if classifier {
            params.extend(scoped("classifier", self.classifier.params_mut()));
        }
        params
    }

    fn sample(&mut self, count: usize) -> Option<Tensor> {
        let z = Tensor::randn(&[count, self.z_size]);
        Some(self.decode(&z))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vae() -> Vae {
        Vae::new(VaeConfig { base_width: 2, input_size: 16, z_size: 4, num_classes: 3 })
    }

    #[test]
    fn reconstruction_matches_input_shape_and_range() {
        let mut model = vae();
        let images = Tensor::randn(&[2, 3, 16, 16]);
        match model.forward(&images, Task::Reconstruct) {
            ForwardOutput::Reconstruction { reconstruction, mu, logvar } => {
                assert_eq!(reconstruction.shape, images.shape);
                assert!(reconstruction.data.iter().all(|v| (0.0..=1.0).contains(v)));
                assert_eq!(mu.shape, vec![2, 4]);
                assert_eq!(logvar.shape, vec![2, 4]);
            }
            other => panic!("unexpected output {other:?}"),
        }
    }

    #[test]
    fn eval_mode_reconstruction_is_deterministic() {
        let mut model = vae();
        model.set_mode(Mode::Eval);
        let images = Tensor::randn(&[1, 3, 16, 16]);
        let a = model.forward(&images, Task::Reconstruct);
        let b = model.forward(&images, Task::Reconstruct);
        match (a, b) {
            (
                ForwardOutput::Reconstruction { reconstruction: ra, .. },
                ForwardOutput::Reconstruction { reconstruction: rb, .. },
            ) => assert_eq!(ra, rb),
            _ => panic!("expected reconstructions"),
        }
    }

    #[test]
    fn trainable_scope_follows_the_phase() {
        let mut model = vae();
        model.set_mode(Mode::TrainAutoencoder);
        assert!(model
            .params_mut(ParamScope::Trainable)
            .iter()
            .all(|(n, _)| !n.starts_with("classifier")));
        model.set_mode(Mode::TrainClassifier);
        assert!(model
            .params_mut(ParamScope::Trainable)
            .iter()
            .all(|(n, _)| n.starts_with("classifier")));
    }

    #[test]
    fn samples_are_decoded_images() {
        let mut model = vae();
        assert_eq!(model.sample(5).unwrap().shape, vec![5, 3, 16, 16]);
    }
}
