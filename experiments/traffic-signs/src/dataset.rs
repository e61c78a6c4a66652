//! In-memory GTSRB splits.
//!
//! Images live on the host as interleaved HWC `f32` buffers and labels as one-hot
//! vectors; conversion to framework tensors happens per batch in [`crate::batch`].

use anyhow::{anyhow, bail, ensure, Result};
use burn_dataset::Dataset;
use rand::{rngs::StdRng, seq::index::sample as sample_indices};

pub const IMAGE_SIZE: usize = 30;
pub const CHANNELS: usize = 3;
pub const NUM_CLASSES: usize = 43;
pub const PIXELS_PER_IMAGE: usize = IMAGE_SIZE * IMAGE_SIZE * CHANNELS;

/// A preprocessed 30×30 RGB image, row-major with interleaved channels.
#[derive(Clone, Debug, PartialEq)]
pub struct SignImage {
    pixels: Vec<f32>,
}

impl SignImage {
    pub fn new(pixels: Vec<f32>) -> Result<Self> {
        ensure!(
            pixels.len() == PIXELS_PER_IMAGE,
            "image has {} values, expected {}x{}x{} = {}",
            pixels.len(),
            IMAGE_SIZE,
            IMAGE_SIZE,
            CHANNELS,
            PIXELS_PER_IMAGE
        );
        Ok(Self { pixels })
    }

    /// Wrap a buffer the caller built at the right size.
    pub(crate) fn from_raw(pixels: Vec<f32>) -> Self {
        debug_assert_eq!(pixels.len(), PIXELS_PER_IMAGE);
        Self { pixels }
    }

    pub fn filled(value: f32) -> Self {
        Self {
            pixels: vec![value; PIXELS_PER_IMAGE],
        }
    }

    pub fn pixels(&self) -> &[f32] {
        &self.pixels
    }

    pub fn pixel(&self, y: usize, x: usize, channel: usize) -> f32 {
        self.pixels[(y * IMAGE_SIZE + x) * CHANNELS + channel]
    }
}

/// Class id stored as a dense 43-way indicator vector.
#[derive(Clone, Debug, PartialEq)]
pub struct OneHot([f32; NUM_CLASSES]);

impl OneHot {
    pub fn new(label: usize) -> Result<Self> {
        if label >= NUM_CLASSES {
            bail!("label {} is outside [0, {}]", label, NUM_CLASSES - 1);
        }
        let mut values = [0.0; NUM_CLASSES];
        values[label] = 1.0;
        Ok(Self(values))
    }

    pub fn values(&self) -> &[f32; NUM_CLASSES] {
        &self.0
    }

    /// Arg-max of the vector; the first index wins on ties.
    pub fn class(&self) -> usize {
        self.0
            .iter()
            .enumerate()
            .fold((0, f32::NEG_INFINITY), |best, (i, &v)| {
                if v > best.1 {
                    (i, v)
                } else {
                    best
                }
            })
            .0
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SignItem {
    pub image: SignImage,
    pub label: OneHot,
}

/// Images with integer labels, as produced by the loaders.
#[derive(Clone, Debug, Default)]
pub struct RawImages {
    pub images: Vec<SignImage>,
    pub labels: Vec<usize>,
}

impl RawImages {
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Training images per class id.
    pub fn class_distribution(&self) -> [usize; NUM_CLASSES] {
        let mut counts = [0; NUM_CLASSES];
        for &label in &self.labels {
            if label < NUM_CLASSES {
                counts[label] += 1;
            }
        }
        counts
    }
}

#[derive(Clone, Debug, Default)]
pub struct SignDataset {
    items: Vec<SignItem>,
}

impl SignDataset {
    pub fn new(items: Vec<SignItem>) -> Self {
        Self { items }
    }

    /// One-hot encode `labels` and pair them with `images`.
    pub fn from_labelled(images: Vec<SignImage>, labels: &[usize]) -> Result<Self> {
        ensure!(
            images.len() == labels.len(),
            "{} images but {} labels",
            images.len(),
            labels.len()
        );
        let items = images
            .into_iter()
            .zip(labels)
            .map(|(image, &label)| {
                Ok(SignItem {
                    image,
                    label: OneHot::new(label)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { items })
    }

    pub fn items(&self) -> &[SignItem] {
        &self.items
    }

    pub fn gather(&self, indices: &[usize]) -> Result<Vec<SignItem>> {
        indices
            .iter()
            .map(|&index| {
                self.get(index)
                    .ok_or_else(|| anyhow!("dataset index {} out of bounds", index))
            })
            .collect()
    }
}

impl Dataset<SignItem> for SignDataset {
    fn get(&self, index: usize) -> Option<SignItem> {
        self.items.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

#[derive(Clone, Debug)]
pub struct DatasetSplits {
    pub train: SignDataset,
    pub validation: SignDataset,
    pub test: SignDataset,
}

/// Partition `0..len` into (train, validation) index lists.
///
/// Validation gets `floor(len * split_pct / 100)` indices drawn without replacement;
/// both lists come back in ascending order.
pub fn split_indices(
    len: usize,
    split_pct: u32,
    rng: &mut StdRng,
) -> Result<(Vec<usize>, Vec<usize>)> {
    if split_pct >= 100 {
        bail!("validation split must be below 100%, got {}%", split_pct);
    }

    let validation_len = len * split_pct as usize / 100;
    let mut is_validation = vec![false; len];
    for index in sample_indices(rng, len, validation_len).into_iter() {
        is_validation[index] = true;
    }

    let (validation, train): (Vec<usize>, Vec<usize>) =
        (0..len).partition(|&index| is_validation[index]);
    Ok((train, validation))
}

pub fn train_validation_test_split(
    train: RawImages,
    test: RawImages,
    split_pct: u32,
    rng: &mut StdRng,
) -> Result<DatasetSplits> {
    let full_train = SignDataset::from_labelled(train.images, &train.labels)?;
    let test = SignDataset::from_labelled(test.images, &test.labels)?;

    let (train_idx, validation_idx) = split_indices(full_train.len(), split_pct, rng)?;

    Ok(DatasetSplits {
        train: SignDataset::new(full_train.gather(&train_idx)?),
        validation: SignDataset::new(full_train.gather(&validation_idx)?),
        test,
    })
}
