use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use signnet_core::{load_or_init, RunMode};
use tracing::info;
use tracing_subscriber::EnvFilter;
use traffic_signs::{run_evaluate, run_predict, run_train, ClassifierConfig, ProjectPaths};

/// Train and evaluate the GTSRB traffic-sign classifier.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Project root holding GTSRB/, models/, NewTestImages/ and sign_class/.
    #[arg(long, default_value = ".")]
    root: PathBuf,
    /// What to do with the model.
    #[arg(short, long, value_enum, default_value_t = RunMode::Train)]
    mode: RunMode,
    /// Configuration file; created with defaults when missing.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let paths = ProjectPaths::new(&args.root);
    let config_path = args.config.unwrap_or_else(|| paths.config.clone());
    let config: ClassifierConfig = load_or_init(&config_path, ClassifierConfig::default)?;

    info!(
        mode = %args.mode,
        root = %args.root.display(),
        config = %config_path.display(),
        "running traffic-sign classifier"
    );

    match args.mode {
        RunMode::Train => {
            let report = run_train(&paths, &config)?;
            info!(
                epochs = report.history.len(),
                checkpoints = ?report.checkpoints,
                "final test accuracy {:.2}%",
                report.test.accuracy() * 100.0
            );
        }
        RunMode::Evaluate => {
            let evaluation = run_evaluate(&paths, &config)?;
            info!("final test accuracy {:.2}%", evaluation.accuracy() * 100.0);
        }
        RunMode::Predict => {
            let predictions = run_predict(&paths, &config)?;
            info!(images = predictions.len(), "predictions written to report");
        }
    }

    Ok(())
}
