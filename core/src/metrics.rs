use serde::{Deserialize, Serialize};

/// Summary of one training epoch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch: usize,
    pub cost: f32,
    /// `None` when the run has no validation split.
    pub validation_accuracy: Option<f32>,
}

impl EpochMetrics {
    pub fn validation_error(&self) -> Option<f32> {
        self.validation_accuracy.map(|accuracy| 1.0 - accuracy)
    }
}

/// Correct/total counts for one evaluated chunk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkCounts {
    pub correct: usize,
    pub total: usize,
}

impl ChunkCounts {
    pub fn new(correct: usize, total: usize) -> Self {
        Self { correct, total }
    }

    pub fn accuracy(&self) -> f32 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f32 / self.total as f32
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub accuracy: f32,
    pub samples: usize,
}

impl EvaluationMetrics {
    /// Sample-weighted aggregate, so a short trailing chunk counts for what it holds.
    pub fn from_chunks(chunks: &[ChunkCounts]) -> Self {
        let total = chunks.iter().fold(ChunkCounts::default(), |acc, chunk| {
            ChunkCounts::new(acc.correct + chunk.correct, acc.total + chunk.total)
        });

        Self {
            accuracy: total.accuracy(),
            samples: total.total,
        }
    }
}

/// Square count matrix indexed `[truth][prediction]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfusionMatrix {
    classes: usize,
    counts: Vec<usize>,
}

impl ConfusionMatrix {
    pub fn new(classes: usize) -> Self {
        Self {
            classes,
            counts: vec![0; classes * classes],
        }
    }

    /// Pairs with an out-of-range class are ignored.
    pub fn from_pairs(classes: usize, truth: &[usize], predictions: &[usize]) -> Self {
        let mut matrix = Self::new(classes);
        for (&actual, &predicted) in truth.iter().zip(predictions) {
            matrix.record(actual, predicted);
        }
        matrix
    }

    pub fn record(&mut self, actual: usize, predicted: usize) {
        if actual < self.classes && predicted < self.classes {
            self.counts[actual * self.classes + predicted] += 1;
        }
    }

    pub fn classes(&self) -> usize {
        self.classes
    }

    pub fn count(&self, actual: usize, predicted: usize) -> usize {
        self.counts[actual * self.classes + predicted]
    }

    pub fn support(&self, actual: usize) -> usize {
        let row = actual * self.classes;
        self.counts[row..row + self.classes].iter().sum()
    }

    /// Fraction of `actual` samples predicted correctly, `None` without support.
    pub fn recall(&self, actual: usize) -> Option<f32> {
        let support = self.support(actual);
        (support > 0).then(|| self.count(actual, actual) as f32 / support as f32)
    }

    /// Off-diagonal cells sorted by descending count, ties broken by class ids.
    pub fn top_confusions(&self, limit: usize) -> Vec<(usize, usize, usize)> {
        let mut cells = Vec::new();
        for actual in 0..self.classes {
            for predicted in 0..self.classes {
                let count = self.count(actual, predicted);
                if actual != predicted && count > 0 {
                    cells.push((actual, predicted, count));
                }
            }
        }
        cells.sort_by(|a, b| b.2.cmp(&a.2).then(a.0.cmp(&b.0)).then(a.1.cmp(&b.1)));
        cells.truncate(limit);
        cells
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weighted_accuracy_ignores_chunk_sizes_bias() {
        let chunks = [ChunkCounts::new(900, 1000), ChunkCounts::new(0, 10)];
        let metrics = EvaluationMetrics::from_chunks(&chunks);

        assert_eq!(metrics.samples, 1010);
        assert!((metrics.accuracy - 900.0 / 1010.0).abs() < 1e-6);
    }

    #[test]
    fn empty_evaluation_is_zero() {
        let metrics = EvaluationMetrics::from_chunks(&[]);
        assert_eq!(metrics.samples, 0);
        assert_eq!(metrics.accuracy, 0.0);
    }

    #[test]
    fn confusion_matrix_counts_pairs() {
        let matrix = ConfusionMatrix::from_pairs(3, &[0, 0, 1, 2, 2, 2], &[0, 1, 1, 2, 0, 0]);

        assert_eq!(matrix.count(0, 0), 1);
        assert_eq!(matrix.count(2, 0), 2);
        assert_eq!(matrix.support(2), 3);
        assert_eq!(matrix.recall(1), Some(1.0));
        assert_eq!(matrix.top_confusions(5), vec![(2, 0, 2), (0, 1, 1)]);
    }

    #[test]
    fn recall_without_support_is_none() {
        let matrix = ConfusionMatrix::from_pairs(4, &[0], &[0]);
        assert_eq!(matrix.recall(3), None);
    }
}
