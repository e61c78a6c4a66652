use std::fmt;

use clap::ValueEnum;

/// What a single invocation of an experiment binary does.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum RunMode {
    /// Train from scratch, checkpoint, then evaluate on the test split.
    #[default]
    Train,
    /// Restore the latest checkpoint and evaluate on the test split.
    Evaluate,
    /// Restore the latest checkpoint and rank classes for ad-hoc images.
    Predict,
}

impl RunMode {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Evaluate => "evaluate",
            Self::Predict => "predict",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
