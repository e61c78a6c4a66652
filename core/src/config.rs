use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};

/// Sanity checks run on every configuration loaded from disk.
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Load a JSON configuration from disk, creating it with the provided initializer if missing.
///
/// Both freshly initialized and loaded values go through [`Validate::validate`] so a
/// hand-edited file with impossible settings fails before any work starts.
pub fn load_or_init<T, F>(path: &Path, initializer: F) -> Result<T>
where
    T: Serialize + DeserializeOwned + Validate,
    F: FnOnce() -> T,
{
    let value = if path.exists() {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse config from {}", path.display()))?
    } else {
        let value = initializer();
        save(path, &value)?;
        value
    };

    value
        .validate()
        .with_context(|| format!("invalid config in {}", path.display()))?;
    Ok(value)
}

/// Write a value as pretty JSON, creating parent directories as needed.
pub fn save<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    let serialized = serde_json::to_string_pretty(value)?;
    fs::write(path, serialized)
        .with_context(|| format!("failed to write config to {}", path.display()))?;
    Ok(())
}
