use anyhow::{ensure, Result};
use burn::tensor::{backend::Backend, Tensor, TensorData};

use crate::dataset::{SignImage, SignItem, CHANNELS, IMAGE_SIZE, NUM_CLASSES, PIXELS_PER_IMAGE};

#[derive(Clone, Debug)]
pub struct SignBatch<B: Backend> {
    /// `[batch, channels, height, width]`
    pub images: Tensor<B, 4>,
    /// One-hot, `[batch, classes]`
    pub labels: Tensor<B, 2>,
}

impl<B: Backend> SignBatch<B> {
    pub fn from_items(device: &B::Device, items: &[SignItem]) -> Result<Self> {
        ensure!(!items.is_empty(), "cannot build a batch from zero items");

        let mut labels = Vec::with_capacity(items.len() * NUM_CLASSES);
        for item in items {
            labels.extend_from_slice(item.label.values());
        }

        let images = images_tensor(device, items.iter().map(|item| &item.image))?;
        let labels = Tensor::<B, 2>::from_floats(
            TensorData::new(labels, [items.len(), NUM_CLASSES]),
            device,
        );

        Ok(Self { images, labels })
    }
}

/// Stack host images into a channels-first tensor.
pub fn images_tensor<'a, B: Backend>(
    device: &B::Device,
    images: impl ExactSizeIterator<Item = &'a SignImage>,
) -> Result<Tensor<B, 4>> {
    let count = images.len();
    ensure!(count > 0, "cannot build an image tensor from zero images");

    let mut values = Vec::with_capacity(count * PIXELS_PER_IMAGE);
    for image in images {
        values.extend_from_slice(image.pixels());
    }

    let hwc = Tensor::<B, 4>::from_floats(
        TensorData::new(values, [count, IMAGE_SIZE, IMAGE_SIZE, CHANNELS]),
        device,
    );
    // [n, h, w, c] -> [n, h, c, w] -> [n, c, h, w]
    Ok(hwc.swap_dims(2, 3).swap_dims(1, 2))
}
