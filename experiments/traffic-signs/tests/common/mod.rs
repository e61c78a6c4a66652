#![allow(dead_code)]

use traffic_signs::{
    dataset::{RawImages, SignImage, CHANNELS, IMAGE_SIZE, PIXELS_PER_IMAGE},
    AugmentationConfig, ClassifierConfig,
};

/// `count` images cycling through `classes`, each class a distinct colour stripe pattern.
pub fn synthetic(count: usize, classes: usize) -> RawImages {
    let mut raw = RawImages::default();
    for i in 0..count {
        let label = i % classes;
        let mut pixels = Vec::with_capacity(PIXELS_PER_IMAGE);
        for y in 0..IMAGE_SIZE {
            for x in 0..IMAGE_SIZE {
                for channel in 0..CHANNELS {
                    let stripe = if (x + y * label) % (label + 2) == 0 { 0.9 } else { 0.1 };
                    let tint = ((label * 3 + channel) % 5) as f32 / 5.0;
                    let noise = ((i * 7 + x * 3 + y) % 11) as f32 / 110.0 + i as f32 * 1e-4;
                    pixels.push((stripe * 0.6 + tint * 0.3 + noise).min(1.0));
                }
            }
        }
        raw.images.push(SignImage::new(pixels).unwrap());
        raw.labels.push(label);
    }
    raw
}

/// Settings small enough for CPU tests.
pub fn tiny_config() -> ClassifierConfig {
    ClassifierConfig {
        seed: 42,
        learning_rate: 1e-3,
        num_epochs: 1,
        minibatch_size: 5,
        validation_split_pct: 0,
        eval_chunk_size: 1000,
        verbose: false,
        augmentation: AugmentationConfig {
            base_count: 4,
            ..AugmentationConfig::default()
        },
        ..ClassifierConfig::default()
    }
}
