//! GTSRB traffic-sign classifier built on burn.
//!
//! The network, loss and optimizer run on the Candle CPU backend; everything around them
//! (splitting, minibatching, augmentation, checkpoints, batched evaluation and the report)
//! lives in this crate.

pub mod augment;
pub mod batch;
pub mod checkpoint;
pub mod config;
pub mod data;
pub mod dataset;
pub mod evaluation;
pub mod inference;
pub mod minibatch;
pub mod model;
pub mod pipeline;
pub mod reporting;
pub mod stage;
pub mod training;

use burn_autodiff::Autodiff;
use burn_candle::Candle;

pub type InferenceBackend = Candle<f32, i64>;
pub type TrainingBackend = Autodiff<InferenceBackend>;

pub use config::{AugmentationConfig, ClassifierConfig};
pub use pipeline::{run_evaluate, run_predict, run_train, ProjectPaths};
