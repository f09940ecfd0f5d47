use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, Result};
use super::{
    model::{Capabilities, Model},
    resnet::{ResNet, ResNetConfig},
    vae::{Vae, VaeConfig},
    vgg::{NormPlacement, TuneScope, Vgg, VggConfig},
};

/// Shape parameters shared by every catalog constructor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogOptions {
    pub num_classes: usize,
    pub input_size: usize,
    /// Channel count of the first convolution block.
    pub base_width: usize,
    pub z_size: usize,
}

/// A named model constructor together with the behaviour it declares.
#[derive(Clone)]
pub struct CatalogEntry {
    pub name: &'static str,
    pub capabilities: Capabilities,
    pub build: fn(&CatalogOptions) -> Box<dyn Model>,
}

impl CatalogEntry {
    pub fn build(&self, options: &CatalogOptions) -> Box<dyn Model> {
        (self.build)(options)
    }
}

impl std::fmt::Debug for CatalogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogEntry")
            .field("name", &self.name)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

fn vgg(o: &CatalogOptions, norm: NormPlacement, affine: bool, similarity: bool, tune: TuneScope) -> Box<dyn Model> {
    Box::new(Vgg::new(VggConfig {
        base_width: o.base_width,
        input_size: o.input_size,
        num_classes: o.num_classes,
        norm,
        affine,
        similarity,
        tune,
    }))
}

const PLAIN: Capabilities = Capabilities { similarity: false, autoencoder: false };
const SIMILARITY: Capabilities = Capabilities { similarity: true, autoencoder: false };
const AUTOENCODER: Capabilities = Capabilities { similarity: false, autoencoder: true };

/// Every model variant the harness knows how to train.
pub fn catalog() -> Vec<CatalogEntry> {
    vec![
        CatalogEntry {
            name: "vgg19_vanilla_tune_fc",
            capabilities: PLAIN,
            build: |o| vgg(o, NormPlacement::None, false, false, TuneScope::Classifier),
        },
        CatalogEntry {
            name: "vgg19_in_single_tune_after",
            capabilities: PLAIN,
            build: |o| vgg(o, NormPlacement::Single, false, false, TuneScope::AfterNorm),
        },
        CatalogEntry {
            name: "vgg19_vanilla_tune_all",
            capabilities: PLAIN,
            build: |o| vgg(o, NormPlacement::None, false, false, TuneScope::All),
        },
        CatalogEntry {
            name: "vgg19_in_single_tune_all",
            capabilities: PLAIN,
            build: |o| vgg(o, NormPlacement::Single, false, false, TuneScope::All),
        },
        CatalogEntry {
            name: "vgg19_in_affine_single_tune_all",
            capabilities: PLAIN,
            build: |o| vgg(o, NormPlacement::Single, true, false, TuneScope::All),
        },
        CatalogEntry {
            name: "vgg19_in_all_tune_all",
            capabilities: PLAIN,
            build: |o| vgg(o, NormPlacement::All, false, false, TuneScope::All),
        },
        CatalogEntry {
            name: "vgg19_vanilla_similarity_tune_all",
            capabilities: SIMILARITY,
            build: |o| vgg(o, NormPlacement::None, false, true, TuneScope::All),
        },
        CatalogEntry {
            name: "vgg19_in_single_similarity_tune_all",
            capabilities: SIMILARITY,
            build: |o| vgg(o, NormPlacement::Single, false, true, TuneScope::All),
        },
        // Reduced residual net; the name keeps checkpoints comparable.
        CatalogEntry {
            name: "resnet50_tune_fc",
            capabilities: PLAIN,
            build: |o| {
                Box::new(ResNet::new(ResNetConfig {
                    base_width: o.base_width,
                    num_classes: o.num_classes,
                    blocks_per_stage: 2,
                    tune: TuneScope::Classifier,
                }))
            },
        },
        CatalogEntry {
            name: "vae_autoencoder",
            capabilities: AUTOENCODER,
            build: |o| {
                Box::new(Vae::new(VaeConfig {
                    base_width: o.base_width,
                    input_size: o.input_size,
                    z_size: o.z_size,
                    num_classes: o.num_classes,
                }))
            },
        },
    ]
}

/// Keeps the entries named in `names`, in catalog order; an empty list
/// keeps everything.
pub fn select(entries: Vec<CatalogEntry>, names: &[String]) -> Result<Vec<CatalogEntry>> {
    if let Some(unknown) = names.iter().find(|n| !entries.iter().any(|e| e.name == n.as_str())) {
        return Err(HarnessError::UnknownModel(unknown.clone()));
    }
    if names.is_empty() {
        return Ok(entries);
    }
    Ok(entries.into_iter().filter(|e| names.iter().any(|n| n == e.name)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> CatalogOptions {
        CatalogOptions { num_classes: 5, input_size: 32, base_width: 2, z_size: 4 }
    }

    #[test]
    fn declared_capabilities_match_the_built_models() {
        for entry in catalog() {
            let model = entry.build(&options());
            assert_eq!(model.capabilities(), entry.capabilities, "{}", entry.name);
        }
    }

    #[test]
    fn select_filters_and_rejects_unknown_names() {
        let picked = select(catalog(), &["resnet50_tune_fc".to_string()]).unwrap();
        assert_eq!(picked.len(), 1);
        assert_eq!(select(catalog(), &[]).unwrap().len(), catalog().len());
        assert!(matches!(
            select(catalog(), &["lenet".to_string()]),
            Err(HarnessError::UnknownModel(name)) if name == "lenet"
        ));
    }
}
