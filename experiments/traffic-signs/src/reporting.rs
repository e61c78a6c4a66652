//! Markdown renderers for the experiment notebook sections.

use std::{fmt::Write, path::Path};

use anyhow::{anyhow, Result};
use burn::tensor::backend::Backend;
use signnet_core::{
    encode_file_data_url, encode_luma_png_data_url, encode_rgb_png_data_url, markdown_table,
    normalize_to_unit, EpochMetrics, RunMode,
};

use crate::{
    config::ClassifierConfig,
    dataset::{SignDataset, IMAGE_SIZE, NUM_CLASSES},
    evaluation::Evaluation,
    inference::TopK,
    model::NetOutput,
};

pub const FAILED_CASE_LIMIT: usize = 25;
pub const FILTERS_PER_LAYER: usize = 15;
const TOP_CONFUSIONS: usize = 10;

pub fn render_overview(mode: RunMode, summary: &str) -> String {
    format!("- Mode: {}\n- {}\n", mode.label(), summary)
}

pub fn render_configuration(config: &ClassifierConfig) -> String {
    let jitter = &config.augmentation;
    format!(
        "- Seed: {}\n- Learning rate: {:.1e}\n- Epochs: {}\n- Minibatch size: {}\n\
         - Validation split: {}%\n- Evaluation chunk size: {}\n- Dropout keep probability: {}\n\
         - Checkpoint interval: {} epochs\n- Augmentation: {} samples at epoch 0, \
         rotation {}°, shear {}px, translation {}px\n",
        config.seed,
        config.learning_rate,
        config.num_epochs,
        config.minibatch_size,
        config.validation_split_pct,
        config.eval_chunk_size,
        config.keep_prob,
        config.checkpoint_interval,
        jitter.base_count,
        jitter.rotation_deg,
        jitter.shear_px,
        jitter.translation_px
    )
}

pub fn render_class_distribution(counts: &[usize; NUM_CLASSES]) -> String {
    let rows: Vec<Vec<String>> = counts
        .iter()
        .enumerate()
        .map(|(class, count)| vec![class.to_string(), count.to_string()])
        .collect();
    markdown_table(&["Class", "Training images"], &rows)
}

/// Cost and validation error per epoch.
pub fn render_learning_curve(history: &[EpochMetrics]) -> String {
    if history.is_empty() {
        return "No epochs were run.".to_string();
    }

    let rows: Vec<Vec<String>> = history
        .iter()
        .map(|metrics| {
            vec![
                metrics.epoch.to_string(),
                format!("{:.4}", metrics.cost),
                percent(metrics.validation_accuracy),
                percent(metrics.validation_error()),
            ]
        })
        .collect();
    markdown_table(
        &["Epoch", "Cost", "Validation accuracy", "Validation error"],
        &rows,
    )
}

pub fn render_evaluation(evaluation: &Evaluation, checkpoint_epoch: Option<usize>) -> String {
    let metrics = evaluation.metrics();
    let mut output = String::new();

    if let Some(epoch) = checkpoint_epoch {
        let _ = writeln!(&mut output, "- Checkpoint epoch: {}", epoch);
    }
    let _ = writeln!(
        &mut output,
        "- Test accuracy: {:.2}% over {} images in {} chunks\n",
        metrics.accuracy * 100.0,
        metrics.samples,
        evaluation.chunks.len()
    );

    let rows: Vec<Vec<String>> = evaluation
        .chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            vec![
                (i + 1).to_string(),
                chunk.total.to_string(),
                format!("{:.2}%", chunk.accuracy() * 100.0),
            ]
        })
        .collect();
    output.push_str(&markdown_table(&["Chunk", "Images", "Accuracy"], &rows));
    output
}

pub fn render_confusion(evaluation: &Evaluation) -> String {
    let matrix = evaluation.confusion_matrix();
    let mut output = String::from("### Per-class recall\n\n");

    let rows: Vec<Vec<String>> = (0..matrix.classes())
        .filter(|&class| matrix.support(class) > 0)
        .map(|class| {
            vec![
                class.to_string(),
                matrix.support(class).to_string(),
                percent(matrix.recall(class)),
            ]
        })
        .collect();
    output.push_str(&markdown_table(&["Class", "Images", "Recall"], &rows));

    let confusions = matrix.top_confusions(TOP_CONFUSIONS);
    output.push_str("\n### Most frequent confusions\n\n");
    if confusions.is_empty() {
        output.push_str("No misclassifications.\n");
    } else {
        let rows: Vec<Vec<String>> = confusions
            .iter()
            .map(|&(actual, predicted, count)| {
                vec![actual.to_string(), predicted.to_string(), count.to_string()]
            })
            .collect();
        output.push_str(&markdown_table(&["True", "Predicted", "Count"], &rows));
    }
    output
}

/// Gallery of misclassified images taken from `dataset` by evaluated index.
pub fn render_failed_cases(evaluation: &Evaluation, dataset: &SignDataset) -> Result<String> {
    let mut output = String::new();
    let size = IMAGE_SIZE as u32;

    for (shown, (index, prediction)) in evaluation.failures().take(FAILED_CASE_LIMIT).enumerate() {
        let item = dataset
            .items()
            .get(index)
            .ok_or_else(|| anyhow!("dataset index {} out of bounds", index))?;
        let url = encode_rgb_png_data_url(size, size, item.image.pixels())?;
        let _ = writeln!(
            &mut output,
            "- #{} (index {}): true {}, predicted {} ![failed case]({})",
            shown + 1,
            index,
            item.label.class(),
            prediction,
            url
        );
    }

    if output.is_empty() {
        output.push_str("No failed cases.");
    }
    Ok(output)
}

/// First filters of each ReLU activation for the first image in `output`.
pub fn render_activations<B: Backend>(output: &NetOutput<B>) -> Result<String> {
    let mut rendered = String::new();

    for (layer, activation) in output.activations.iter().enumerate() {
        let [_, channels, height, width] = activation.dims();
        let values = activation
            .clone()
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|err| anyhow!("failed to decode activations: {err:?}"))?;
        let plane = height * width;

        let _ = write!(&mut rendered, "### Layer {} ({} filters)\n\n", layer + 1, channels);
        for channel in 0..channels.min(FILTERS_PER_LAYER) {
            let map = normalize_to_unit(&values[channel * plane..(channel + 1) * plane]);
            let url = encode_luma_png_data_url(width as u32, height as u32, &map)?;
            let _ = write!(&mut rendered, "![filter {}]({}) ", channel, url);
        }
        rendered.push_str("\n\n");
    }

    Ok(rendered)
}

/// Top-k table per image, with class icons when `icon_dir/<class>.png` exists.
pub fn render_predictions(
    images: &[(impl AsRef<Path>, TopK)],
    icon_dir: &Path,
) -> Result<String> {
    let mut output = String::new();

    for (path, ranked) in images {
        let name = path
            .as_ref()
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let _ = writeln!(&mut output, "#### {}\n", name);

        let mut rows = Vec::with_capacity(ranked.classes.len());
        for (rank, (&class, &probability)) in
            ranked.classes.iter().zip(&ranked.probabilities).enumerate()
        {
            let icon_path = icon_dir.join(format!("{class}.png"));
            let icon = if icon_path.exists() {
                format!("![class {}]({})", class, encode_file_data_url(&icon_path)?)
            } else {
                String::new()
            };
            rows.push(vec![
                (rank + 1).to_string(),
                class.to_string(),
                format!("{:.4}", probability),
                icon,
            ]);
        }
        output.push_str(&markdown_table(&["Rank", "Class", "Probability", "Icon"], &rows));
        output.push('\n');
    }

    if output.is_empty() {
        output.push_str("No images found.");
    }
    Ok(output)
}

fn percent(value: Option<f32>) -> String {
    value
        .map(|v| format!("{:.2}%", v * 100.0))
        .unwrap_or_else(|| "n/a".to_string())
}

#[cfg(test)]
mod tests {
    use signnet_core::ChunkCounts;

    use super::*;
    use crate::dataset::{OneHot, SignImage, SignItem};

    fn evaluation() -> Evaluation {
        Evaluation {
            chunks: vec![ChunkCounts::new(1, 2)],
            order: vec![1, 0],
            predictions: vec![3, 5],
            truth: vec![3, 4],
            correct: vec![true, false],
        }
    }

    #[test]
    fn learning_curve_lists_every_epoch() {
        let history = vec![
            EpochMetrics {
                epoch: 0,
                cost: 3.5,
                validation_accuracy: Some(0.25),
            },
            EpochMetrics {
                epoch: 1,
                cost: 2.0,
                validation_accuracy: None,
            },
        ];
        let table = render_learning_curve(&history);

        assert!(table.contains("| 0 | 3.5000 | 25.00% | 75.00% |"));
        assert!(table.contains("| 1 | 2.0000 | n/a | n/a |"));
    }

    #[test]
    fn evaluation_reports_weighted_accuracy() {
        let text = render_evaluation(&evaluation(), Some(10));
        assert!(text.contains("- Checkpoint epoch: 10"));
        assert!(text.contains("50.00% over 2 images in 1 chunks"));
    }

    #[test]
    fn confusion_lists_misclassification() {
        let text = render_confusion(&evaluation());
        assert!(text.contains("| 4 | 5 | 1 |"));
        assert!(text.contains("| 3 | 1 | 100.00% |"));
    }

    #[test]
    fn failed_cases_embed_images() {
        let dataset = SignDataset::new(vec![
            SignItem {
                image: SignImage::filled(0.3),
                label: OneHot::new(4).unwrap(),
            },
            SignItem {
                image: SignImage::filled(0.6),
                label: OneHot::new(3).unwrap(),
            },
        ]);

        let text = render_failed_cases(&evaluation(), &dataset).unwrap();
        assert!(text.contains("(index 0): true 4, predicted 5"));
        assert!(text.contains("data:image/png;base64,"));
        assert_eq!(text.lines().count(), 1);
    }

    #[test]
    fn predictions_without_icons() {
        let ranked = TopK {
            classes: vec![14, 2],
            probabilities: vec![0.9, 0.05],
        };
        let dir = tempfile::tempdir().unwrap();
        let text = render_predictions(&[("NewTestImages/01.ppm", ranked)], dir.path()).unwrap();

        assert!(text.contains("#### 01.ppm"));
        assert!(text.contains("| 1 | 14 | 0.9000 |  |"));
    }
}
