use std::fmt;

/// Pipeline stage attached as error context, so a failed run says where it died.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Stage {
    DataLoading,
    GraphBuild,
    TrainingStep,
    CheckpointSave,
    CheckpointRestore,
    Evaluation,
    Reporting,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::DataLoading => "data loading",
            Self::GraphBuild => "graph build",
            Self::TrainingStep => "training step",
            Self::CheckpointSave => "checkpoint save",
            Self::CheckpointRestore => "checkpoint restore",
            Self::Evaluation => "evaluation",
            Self::Reporting => "reporting",
        };
        write!(f, "{label} failed")
    }
}
