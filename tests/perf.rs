mod common;

use common::StubSource;
use stylenet::models::catalog::select;
use stylenet::models::{catalog, CatalogOptions};
use stylenet::optim::{Optimizer, Sgd};
use stylenet::train::{checkpoint_path, perf, Checkpoint, LoopOptions, PerfOptions, PerfOutcome};

fn options() -> CatalogOptions {
    CatalogOptions { num_classes: 3, input_size: 32, base_width: 2, z_size: 4 }
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[test]
fn sweep_survives_missing_and_corrupt_checkpoints() {
    let dir = tempfile::tempdir().unwrap();
    let entries = select(
        catalog(),
        &names(&["vgg19_vanilla_tune_fc", "vgg19_vanilla_tune_all", "resnet50_tune_fc"]),
    )
    .unwrap();

    std::fs::write(checkpoint_path(dir.path(), "vgg19_vanilla_tune_all"), "{ truncated").unwrap();

    let resnet = entries.iter().find(|e| e.name == "resnet50_tune_fc").unwrap();
    let mut model = resnet.build(&options());
    Checkpoint {
        epoch: 7,
        train_top1_accuracy: Some(0.5),
        train_top5_accuracy: Some(0.9),
        train_loss: 1.2,
        validation_top1_accuracy: Some(0.4),
        validation_top5_accuracy: Some(0.8),
        validation_loss: 1.4,
        weights: model.state_dict(),
        optimizer_weights: Sgd::with_momentum(0.01, 0.9).state(),
    }
    .save_json(&checkpoint_path(dir.path(), resnet.name))
    .unwrap();
    drop(model);

    let perf_options = PerfOptions {
        model_directory: dir.path().to_path_buf(),
        dataset_names: names(&["miniimagenet"]),
        only_existing: false,
        loop_options: LoopOptions::default(),
    };
    let source = StubSource { size: 32, classes: 3, count: 4 };
    let mut lines = Vec::new();
    let outcomes = perf(&entries, &options(), &source, &perf_options, &mut |line: &str| lines.push(line.to_string()));

    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes[0].1, PerfOutcome::Missing);
    assert!(matches!(outcomes[1].1, PerfOutcome::Failed(_)));
    match &outcomes[2].1 {
        PerfOutcome::Loaded { epoch, evaluation } => {
            assert_eq!(*epoch, 7);
            assert_eq!(evaluation.len(), 1);
            assert_eq!(evaluation[0].dataset, "miniimagenet");
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(lines.contains(&"Checkpoint not available for model vgg19_vanilla_tune_fc".to_string()));
    assert!(lines.iter().any(|l| l.starts_with("Epoch: 7 Validation: Loss: 1.4000")));
    assert!(lines.iter().any(|l| l.starts_with("miniimagenet: Loss:")));
}

#[test]
fn only_existing_skips_evaluation_and_mismatched_weights_fail() {
    let dir = tempfile::tempdir().unwrap();
    let entries = select(catalog(), &names(&["resnet50_tune_fc", "vgg19_vanilla_tune_fc"])).unwrap();

    // A ResNet checkpoint saved under the VGG name cannot be loaded into VGG.
    let resnet = entries.iter().find(|e| e.name == "resnet50_tune_fc").unwrap();
    let weights = resnet.build(&options()).state_dict();
    for name in ["resnet50_tune_fc", "vgg19_vanilla_tune_fc"] {
        Checkpoint {
            epoch: 2,
            train_top1_accuracy: None,
            train_top5_accuracy: None,
            train_loss: 0.3,
            validation_top1_accuracy: None,
            validation_top5_accuracy: None,
            validation_loss: 0.4,
            weights: weights.clone(),
            optimizer_weights: Sgd::new(0.01).state(),
        }
        .save_json(&checkpoint_path(dir.path(), name))
        .unwrap();
    }

    let perf_options = PerfOptions {
        model_directory: dir.path().to_path_buf(),
        dataset_names: names(&["miniimagenet"]),
        only_existing: true,
        loop_options: LoopOptions::default(),
    };
    let source = StubSource { size: 32, classes: 3, count: 4 };
    let mut lines = Vec::new();
    let outcomes = perf(&entries, &options(), &source, &perf_options, &mut |line: &str| lines.push(line.to_string()));

    let by_name: Vec<(&str, &PerfOutcome)> = outcomes.iter().map(|(n, o)| (n.as_str(), o)).collect();
    let resnet_outcome = by_name.iter().find(|(n, _)| *n == "resnet50_tune_fc").unwrap().1;
    assert_eq!(resnet_outcome, &PerfOutcome::Loaded { epoch: 2, evaluation: Vec::new() });
    let vgg_outcome = by_name.iter().find(|(n, _)| *n == "vgg19_vanilla_tune_fc").unwrap().1;
    assert!(matches!(vgg_outcome, PerfOutcome::Failed(_)));
    assert!(lines.iter().any(|l| l == "Epoch: 2 Validation: Loss: 0.4000 Train: Loss: 0.3000"));
}
