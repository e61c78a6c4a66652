use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use signnet_core::Validate;

/// Geometric jitter applied to sampled training images.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentationConfig {
    /// Augmented samples per minibatch at epoch 0; divided by `epoch + 1` afterwards.
    pub base_count: usize,
    /// Full rotation range in degrees, centred on zero.
    pub rotation_deg: f32,
    /// Full shear control-point range in pixels, centred on zero.
    pub shear_px: f32,
    /// Full translation range in pixels, centred on zero.
    pub translation_px: f32,
}

impl Default for AugmentationConfig {
    fn default() -> Self {
        Self {
            base_count: 50,
            rotation_deg: 3.0,
            shear_px: 3.0,
            translation_px: 3.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub seed: u64,
    pub learning_rate: f64,
    pub num_epochs: usize,
    pub minibatch_size: usize,
    /// Percentage of the training images held out for validation, in [0, 100).
    pub validation_split_pct: u32,
    pub eval_chunk_size: usize,
    pub keep_prob: f64,
    pub checkpoint_interval: usize,
    /// Enables validation logging and checkpointing.
    pub verbose: bool,
    pub top_k: usize,
    pub augmentation: AugmentationConfig,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            seed: 1337,
            learning_rate: 1e-4,
            num_epochs: 50,
            minibatch_size: 100,
            validation_split_pct: 5,
            eval_chunk_size: 1000,
            keep_prob: 0.5,
            checkpoint_interval: 5,
            verbose: true,
            top_k: 5,
            augmentation: AugmentationConfig::default(),
        }
    }
}

impl Validate for ClassifierConfig {
    fn validate(&self) -> Result<()> {
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            bail!("learning_rate must be a positive number, got {}", self.learning_rate);
        }
        if self.minibatch_size == 0 {
            bail!("minibatch_size must be at least 1");
        }
        if self.eval_chunk_size == 0 {
            bail!("eval_chunk_size must be at least 1");
        }
        if self.validation_split_pct >= 100 {
            bail!(
                "validation_split_pct must be below 100, got {}",
                self.validation_split_pct
            );
        }
        if !(self.keep_prob > 0.0 && self.keep_prob <= 1.0) {
            bail!("keep_prob must be in (0, 1], got {}", self.keep_prob);
        }
        if self.checkpoint_interval == 0 {
            bail!("checkpoint_interval must be at least 1");
        }
        if self.top_k == 0 {
            bail!("top_k must be at least 1");
        }
        let jitter = &self.augmentation;
        for (name, value) in [
            ("rotation_deg", jitter.rotation_deg),
            ("shear_px", jitter.shear_px),
            ("translation_px", jitter.translation_px),
        ] {
            if !(value >= 0.0 && value.is_finite()) {
                bail!("augmentation.{name} must be a non-negative number, got {value}");
            }
        }
        Ok(())
    }
}
