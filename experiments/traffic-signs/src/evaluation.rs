use anyhow::Result;
use burn::tensor::backend::Backend;
use burn_dataset::Dataset;
use signnet_core::{ChunkCounts, ConfusionMatrix, EvaluationMetrics};

use crate::{
    batch::SignBatch,
    dataset::{SignDataset, NUM_CLASSES},
    minibatch::random_mini_batches,
    model::{accuracy_counts, class_ids, predictions, TrafficSignNet},
};

/// Per-sample outcome of a chunked pass over a dataset.
///
/// `order`, `predictions`, `truth` and `correct` are parallel and follow the shuffled
/// chunk order, so `order[i]` is the dataset index of the i-th evaluated sample.
#[derive(Clone, Debug, Default)]
pub struct Evaluation {
    pub chunks: Vec<ChunkCounts>,
    pub order: Vec<usize>,
    pub predictions: Vec<usize>,
    pub truth: Vec<usize>,
    pub correct: Vec<bool>,
}

impl Evaluation {
    pub fn metrics(&self) -> EvaluationMetrics {
        EvaluationMetrics::from_chunks(&self.chunks)
    }

    pub fn accuracy(&self) -> f32 {
        self.metrics().accuracy
    }

    pub fn confusion_matrix(&self) -> ConfusionMatrix {
        ConfusionMatrix::from_pairs(NUM_CLASSES, &self.truth, &self.predictions)
    }

    /// Dataset indices of misclassified samples with their predicted class.
    pub fn failures(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.correct
            .iter()
            .zip(self.order.iter().zip(&self.predictions))
            .filter(|(correct, _)| !**correct)
            .map(|(_, (&index, &prediction))| (index, prediction))
    }
}

/// Run inference over `dataset` in shuffled chunks of `chunk_size` with dropout disabled.
pub fn evaluate_in_chunks<B: Backend>(
    model: &TrafficSignNet<B>,
    dataset: &SignDataset,
    chunk_size: usize,
    seed: u64,
    device: &B::Device,
) -> Result<Evaluation> {
    let mut evaluation = Evaluation::default();

    for chunk in random_mini_batches(dataset.len(), chunk_size, seed)? {
        let items = dataset.gather(&chunk)?;
        let batch = SignBatch::<B>::from_items(device, &items)?;
        let logits = model.forward(batch.images);

        let (correct, total) = accuracy_counts(logits.clone(), batch.labels);
        let predicted = class_ids(predictions(logits))?;

        for (item, &prediction) in items.iter().zip(&predicted) {
            let truth = item.label.class();
            evaluation.truth.push(truth);
            evaluation.correct.push(truth == prediction);
        }
        evaluation.predictions.extend(predicted);
        evaluation.order.extend(chunk);
        evaluation.chunks.push(ChunkCounts::new(correct, total));
    }

    Ok(evaluation)
}
