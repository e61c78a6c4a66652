use anyhow::{bail, Context, Result};
use burn::{
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    tensor::{backend::AutodiffBackend, ElementConversion},
};
use burn_dataset::Dataset;
use signnet_core::{epoch_seed, seeded_rng, EpochMetrics, Validate};
use tracing::{debug, info};

use crate::{
    augment::Augmenter,
    batch::SignBatch,
    checkpoint::CheckpointStore,
    config::ClassifierConfig,
    dataset::DatasetSplits,
    evaluation::{evaluate_in_chunks, Evaluation},
    minibatch::random_mini_batches,
    model::{cross_entropy, TrafficSignNet},
    stage::Stage,
};

/// Everything a training run measured, handed back instead of accumulated on the model.
#[derive(Clone, Debug)]
pub struct TrainingReport {
    pub history: Vec<EpochMetrics>,
    /// Epochs at which a checkpoint was written.
    pub checkpoints: Vec<usize>,
    pub test: Evaluation,
}

pub struct TrainingOutcome<B: AutodiffBackend> {
    pub model: TrafficSignNet<B>,
    pub report: TrainingReport,
}

/// Train from freshly initialized weights, then evaluate the test split.
///
/// `config` is validated first, so a zero checkpoint interval or chunk size is an error
/// rather than a panic.
pub fn train<B: AutodiffBackend>(
    config: &ClassifierConfig,
    splits: &DatasetSplits,
    store: &CheckpointStore,
    device: &B::Device,
) -> Result<TrainingOutcome<B>> {
    config.validate()?;
    if splits.train.is_empty() {
        bail!("{}: training split is empty", Stage::DataLoading);
    }

    let mut model = TrafficSignNet::<B>::init(device, config.seed);
    let mut optimizer = AdamConfig::new()
        .with_epsilon(1e-8)
        .init::<B, TrafficSignNet<B>>();
    let augmenter = Augmenter::new(config.augmentation.clone());
    let mut rng = seeded_rng(config.seed.wrapping_add(1));

    let mut history = Vec::with_capacity(config.num_epochs);
    let mut checkpoints = Vec::new();

    for epoch in 0..config.num_epochs {
        let minibatches = random_mini_batches(
            splits.train.len(),
            config.minibatch_size,
            epoch_seed(config.seed, epoch),
        )
        .context(Stage::TrainingStep)?;
        debug!(
            epoch,
            minibatches = minibatches.len(),
            augmented_per_batch = augmenter.count(epoch),
            "starting epoch"
        );

        let mut weighted_cost = 0.0f64;
        for chunk in &minibatches {
            let mut items = splits.train.gather(chunk).context(Stage::TrainingStep)?;
            let augmented = augmenter.augment(&items, epoch, &mut rng);
            items.extend(augmented);

            let batch = SignBatch::<B>::from_items(device, &items).context(Stage::GraphBuild)?;
            let logits = model.forward_train(batch.images, config.keep_prob, &mut rng);
            let loss = cross_entropy(logits, batch.labels);
            let cost = loss.clone().into_scalar().elem::<f32>();
            if !cost.is_finite() {
                bail!("{}: cost diverged to {} at epoch {}", Stage::TrainingStep, cost, epoch);
            }

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optimizer.step(config.learning_rate, model, grads);
            weighted_cost += f64::from(cost) * chunk.len() as f64;
        }

        let cost = (weighted_cost / splits.train.len() as f64) as f32;
        let validation_accuracy = if splits.validation.is_empty() {
            None
        } else {
            let evaluation = evaluate_in_chunks(
                &model.valid(),
                &splits.validation,
                config.eval_chunk_size,
                config.seed,
                device,
            )
            .context(Stage::Evaluation)?;
            Some(evaluation.accuracy())
        };

        if config.verbose {
            match validation_accuracy {
                Some(accuracy) => info!(
                    "epoch {:03}: cost {:.4}, validation accuracy {:.2}%",
                    epoch,
                    cost,
                    accuracy * 100.0
                ),
                None => info!("epoch {:03}: cost {:.4}", epoch, cost),
            }
        }

        history.push(EpochMetrics {
            epoch,
            cost,
            validation_accuracy,
        });

        let last_epoch = epoch + 1 == config.num_epochs;
        if config.verbose && (epoch % config.checkpoint_interval == 0 || last_epoch) {
            store.save(&model, epoch).context(Stage::CheckpointSave)?;
            checkpoints.push(epoch);
        }
    }

    let test = evaluate_in_chunks(
        &model.valid(),
        &splits.test,
        config.eval_chunk_size,
        config.seed,
        device,
    )
    .context(Stage::Evaluation)?;
    info!("final test accuracy {:.2}%", test.accuracy() * 100.0);

    Ok(TrainingOutcome {
        model,
        report: TrainingReport {
            history,
            checkpoints,
            test,
        },
    })
}
