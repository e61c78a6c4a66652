//! The three run modes wired to the project directory layout.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use burn::{module::AutodiffModule, tensor::backend::Backend};
use burn_candle::CandleDevice;
use burn_dataset::Dataset;
use signnet_core::{
    ensure_report_file, seeded_rng, update_sections, ReportSection, RunMode, Validate,
    DEFAULT_REPORT_TEMPLATE,
};
use tracing::info;

use crate::{
    batch::images_tensor,
    checkpoint::CheckpointStore,
    config::ClassifierConfig,
    data,
    dataset::{train_validation_test_split, SignDataset},
    evaluation::{evaluate_in_chunks, Evaluation},
    inference::{predict_from_latest, TopK},
    model::TrafficSignNet,
    reporting,
    stage::Stage,
    training::{train, TrainingReport},
    InferenceBackend, TrainingBackend,
};

/// Index of the image whose activations are rendered.
const ACTIVATION_SAMPLE: usize = 20;

/// Where everything lives relative to the project root.
#[derive(Clone, Debug)]
pub struct ProjectPaths {
    pub train_images: PathBuf,
    pub test_images: PathBuf,
    pub models: PathBuf,
    pub new_images: PathBuf,
    pub sign_classes: PathBuf,
    pub config: PathBuf,
    pub report: PathBuf,
}

impl ProjectPaths {
    pub fn new(root: &Path) -> Self {
        Self {
            train_images: root.join("GTSRB/Final_Training/Images"),
            test_images: root.join("GTSRB/Final_Test/Images"),
            models: root.join("models/new"),
            new_images: root.join("NewTestImages"),
            sign_classes: root.join("sign_class"),
            config: root.join("experiment/config.json"),
            report: root.join("experiment/report.md"),
        }
    }
}

/// Train, checkpoint, evaluate on the test split and refresh the report.
pub fn run_train(paths: &ProjectPaths, config: &ClassifierConfig) -> Result<TrainingReport> {
    config.validate()?;
    let device = CandleDevice::Cpu;

    let train_raw = data::load_training_images(&paths.train_images).context(Stage::DataLoading)?;
    let test_raw = data::load_test_images(&paths.test_images).context(Stage::DataLoading)?;
    let distribution = train_raw.class_distribution();

    let mut rng = seeded_rng(config.seed);
    let splits =
        train_validation_test_split(train_raw, test_raw, config.validation_split_pct, &mut rng)
            .context(Stage::DataLoading)?;
    info!(
        train = splits.train.len(),
        validation = splits.validation.len(),
        test = splits.test.len(),
        "split dataset"
    );

    let store = CheckpointStore::new(&paths.models);
    let outcome = train::<TrainingBackend>(config, &splits, &store, &device)?;
    let model = outcome.model.valid();
    let report = outcome.report;

    let summary = format!(
        "Trained {} epochs; final test accuracy {:.2}%",
        report.history.len(),
        report.test.accuracy() * 100.0
    );
    let mut sections = vec![
        ReportSection::new("overview", reporting::render_overview(RunMode::Train, &summary)),
        ReportSection::new("configuration", reporting::render_configuration(config)),
        ReportSection::new(
            "class-distribution",
            reporting::render_class_distribution(&distribution),
        ),
        ReportSection::new(
            "learning-curve",
            reporting::render_learning_curve(&report.history),
        ),
    ];
    sections.extend(evaluation_sections(
        &model,
        &report.test,
        &splits.test,
        &splits.train,
        report.checkpoints.last().copied(),
        &device,
    )?);
    write_report(&paths.report, &sections)?;

    Ok(report)
}

/// Restore the latest checkpoint and evaluate it on the test split.
pub fn run_evaluate(paths: &ProjectPaths, config: &ClassifierConfig) -> Result<Evaluation> {
    config.validate()?;
    let device = CandleDevice::Cpu;

    let store = CheckpointStore::new(&paths.models);
    let (model, epoch) = store
        .restore_latest::<InferenceBackend>(&device)
        .context(Stage::CheckpointRestore)?;

    let test_raw = data::load_test_images(&paths.test_images).context(Stage::DataLoading)?;
    let test = SignDataset::from_labelled(test_raw.images, &test_raw.labels)
        .context(Stage::DataLoading)?;

    let evaluation = evaluate_in_chunks(&model, &test, config.eval_chunk_size, config.seed, &device)
        .context(Stage::Evaluation)?;
    info!(
        checkpoint = epoch,
        "test accuracy {:.2}%",
        evaluation.accuracy() * 100.0
    );

    let summary = format!(
        "Evaluated checkpoint from epoch {}; test accuracy {:.2}%",
        epoch,
        evaluation.accuracy() * 100.0
    );
    let mut sections = vec![ReportSection::new(
        "overview",
        reporting::render_overview(RunMode::Evaluate, &summary),
    )];
    sections.extend(evaluation_sections(
        &model,
        &evaluation,
        &test,
        &test,
        Some(epoch),
        &device,
    )?);
    write_report(&paths.report, &sections)?;

    Ok(evaluation)
}

/// Rank classes for every image in the new-images directory with the latest checkpoint.
pub fn run_predict(
    paths: &ProjectPaths,
    config: &ClassifierConfig,
) -> Result<Vec<(PathBuf, TopK)>> {
    config.validate()?;
    let device = CandleDevice::Cpu;

    let loaded = data::load_new_images(&paths.new_images).context(Stage::DataLoading)?;
    let (names, images): (Vec<PathBuf>, Vec<_>) = loaded.into_iter().unzip();

    let store = CheckpointStore::new(&paths.models);
    let (epoch, ranked) =
        predict_from_latest::<InferenceBackend>(&store, &images, config.top_k, &device)?;

    for (name, top) in names.iter().zip(&ranked) {
        info!(
            image = %name.display(),
            classes = ?top.classes,
            probabilities = ?top.probabilities,
            "top-{} prediction",
            config.top_k
        );
    }

    let predictions: Vec<(PathBuf, TopK)> = names.into_iter().zip(ranked).collect();
    let summary = format!(
        "Ranked {} new images with the checkpoint from epoch {}",
        predictions.len(),
        epoch
    );
    let sections = [
        ReportSection::new("overview", reporting::render_overview(RunMode::Predict, &summary)),
        ReportSection::new(
            "predictions",
            reporting::render_predictions(&predictions, &paths.sign_classes)
                .context(Stage::Reporting)?,
        ),
    ];
    write_report(&paths.report, &sections)?;

    Ok(predictions)
}

fn evaluation_sections<B: Backend>(
    model: &TrafficSignNet<B>,
    evaluation: &Evaluation,
    evaluated: &SignDataset,
    activation_source: &SignDataset,
    checkpoint_epoch: Option<usize>,
    device: &B::Device,
) -> Result<Vec<ReportSection>> {
    let mut sections = vec![
        ReportSection::new(
            "evaluation",
            reporting::render_evaluation(evaluation, checkpoint_epoch),
        ),
        ReportSection::new("confusion-matrix", reporting::render_confusion(evaluation)),
        ReportSection::new(
            "failed-cases",
            reporting::render_failed_cases(evaluation, evaluated).context(Stage::Reporting)?,
        ),
    ];

    let sample = ACTIVATION_SAMPLE.min(activation_source.len().saturating_sub(1));
    if let Some(item) = activation_source.items().get(sample) {
        let images = images_tensor(device, [&item.image].into_iter()).context(Stage::GraphBuild)?;
        let output = model.forward_with_activations(images);
        sections.push(ReportSection::new(
            "activations",
            reporting::render_activations(&output).context(Stage::Reporting)?,
        ));
    }

    Ok(sections)
}

fn write_report(path: &Path, sections: &[ReportSection]) -> Result<()> {
    ensure_report_file(path, DEFAULT_REPORT_TEMPLATE).context(Stage::Reporting)?;
    update_sections(path, sections).context(Stage::Reporting)?;
    info!(path = %path.display(), "updated report");
    Ok(())
}
