use anyhow::{anyhow, Context, Result};
use burn::tensor::{activation::softmax, backend::Backend};

use crate::{
    batch::images_tensor,
    checkpoint::CheckpointStore,
    dataset::{SignImage, NUM_CLASSES},
    model::TrafficSignNet,
    stage::Stage,
};

/// Most probable classes for one image, highest probability first.
#[derive(Clone, Debug, PartialEq)]
pub struct TopK {
    pub classes: Vec<usize>,
    pub probabilities: Vec<f32>,
}

/// Softmax top-`k` for each image, dropout disabled.
pub fn top_k<B: Backend>(
    model: &TrafficSignNet<B>,
    images: &[SignImage],
    k: usize,
    device: &B::Device,
) -> Result<Vec<TopK>> {
    if images.is_empty() {
        return Ok(Vec::new());
    }

    let logits = model.forward(images_tensor(device, images.iter())?);
    let probabilities = softmax(logits, 1)
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|err| anyhow!("failed to decode probabilities: {err:?}"))?;

    Ok(probabilities
        .chunks_exact(NUM_CLASSES)
        .map(|row| rank(row, k))
        .collect())
}

/// Rebuild the network from the latest checkpoint and rank classes for `images`.
pub fn predict_from_latest<B: Backend>(
    store: &CheckpointStore,
    images: &[SignImage],
    k: usize,
    device: &B::Device,
) -> Result<(usize, Vec<TopK>)> {
    let (model, epoch) = store
        .restore_latest::<B>(device)
        .context(Stage::CheckpointRestore)?;
    let ranked = top_k(&model, images, k, device).context(Stage::Evaluation)?;
    Ok((epoch, ranked))
}

fn rank(row: &[f32], k: usize) -> TopK {
    let mut order: Vec<usize> = (0..row.len()).collect();
    order.sort_by(|&a, &b| row[b].total_cmp(&row[a]).then(a.cmp(&b)));
    order.truncate(k);

    TopK {
        probabilities: order.iter().map(|&class| row[class]).collect(),
        classes: order,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_orders_by_probability() {
        let ranked = rank(&[0.1, 0.5, 0.05, 0.3, 0.05], 3);
        assert_eq!(ranked.classes, vec![1, 3, 0]);
        assert_eq!(ranked.probabilities, vec![0.5, 0.3, 0.1]);
    }

    #[test]
    fn rank_breaks_ties_by_class_id() {
        let ranked = rank(&[0.25, 0.25, 0.25, 0.25], 2);
        assert_eq!(ranked.classes, vec![0, 1]);
    }

    #[test]
    fn rank_caps_at_class_count() {
        assert_eq!(rank(&[0.6, 0.4], 5).classes.len(), 2);
    }
}
