use std::{fs, path::PathBuf};

use anyhow::{anyhow, Context, Result};
use burn::{
    module::Module,
    record::{FullPrecisionSettings, NamedMpkFileRecorder},
    tensor::backend::Backend,
};
use tracing::{debug, info};

use crate::model::TrafficSignNet;

const PREFIX: &str = "sign-net-";
const EXTENSION: &str = "mpk";

/// Epoch-tagged parameter snapshots in one directory. No locking: concurrent writers race.
#[derive(Clone, Debug)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, epoch: usize) -> PathBuf {
        self.dir.join(format!("{PREFIX}{epoch}.{EXTENSION}"))
    }

    pub fn save<B: Backend>(&self, model: &TrafficSignNet<B>, epoch: usize) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create directory {}", self.dir.display()))?;

        let path = self.path_for(epoch);
        model
            .clone()
            .save_file(path.clone(), &recorder())
            .map_err(|err| anyhow!("failed to save checkpoint {}: {err:?}", path.display()))?;

        info!(epoch, path = %path.display(), "saved checkpoint");
        Ok(path)
    }

    /// Epochs of every checkpoint present, ascending.
    pub fn epochs(&self) -> Result<Vec<usize>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut epochs = Vec::new();
        let entries = fs::read_dir(&self.dir)
            .with_context(|| format!("failed to list {}", self.dir.display()))?;
        for entry in entries {
            let entry = entry.with_context(|| format!("failed to list {}", self.dir.display()))?;
            if let Some(epoch) = parse_epoch(&entry.file_name().to_string_lossy()) {
                epochs.push(epoch);
            }
        }
        epochs.sort_unstable();
        Ok(epochs)
    }

    /// Highest epoch present, if any.
    pub fn latest(&self) -> Result<Option<usize>> {
        Ok(self.epochs()?.last().copied())
    }

    /// Build a fresh network and load the latest checkpoint into it.
    pub fn restore_latest<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Result<(TrafficSignNet<B>, usize)> {
        let epoch = self
            .latest()?
            .ok_or_else(|| anyhow!("no checkpoints found in {}", self.dir.display()))?;
        let model = self.restore(epoch, device)?;
        Ok((model, epoch))
    }

    pub fn restore<B: Backend>(
        &self,
        epoch: usize,
        device: &B::Device,
    ) -> Result<TrafficSignNet<B>> {
        let path = self.path_for(epoch);
        debug!(epoch, path = %path.display(), "restoring checkpoint");

        TrafficSignNet::<B>::init(device, 0)
            .load_file(path.clone(), &recorder(), device)
            .map_err(|err| anyhow!("failed to load checkpoint {}: {err:?}", path.display()))
    }
}

fn recorder() -> NamedMpkFileRecorder<FullPrecisionSettings> {
    NamedMpkFileRecorder::<FullPrecisionSettings>::new()
}

fn parse_epoch(file_name: &str) -> Option<usize> {
    file_name
        .strip_prefix(PREFIX)?
        .strip_suffix(EXTENSION)?
        .strip_suffix('.')?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_checkpoint_names() {
        assert_eq!(parse_epoch("sign-net-0.mpk"), Some(0));
        assert_eq!(parse_epoch("sign-net-45.mpk"), Some(45));
        assert_eq!(parse_epoch("sign-net-.mpk"), None);
        assert_eq!(parse_epoch("sign-net-3.json"), None);
        assert_eq!(parse_epoch("other-3.mpk"), None);
    }

    #[test]
    fn latest_picks_highest_epoch() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["sign-net-5.mpk", "sign-net-20.mpk", "sign-net-15.mpk", "notes.txt"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }

        let store = CheckpointStore::new(dir.path());
        assert_eq!(store.epochs().unwrap(), vec![5, 15, 20]);
        assert_eq!(store.latest().unwrap(), Some(20));
    }

    #[test]
    fn missing_directory_has_no_checkpoints() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("models/new"));
        assert_eq!(store.latest().unwrap(), None);
    }
}
