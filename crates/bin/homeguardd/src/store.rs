//! TOML settings store — one snapshot file per item category.

use std::path::PathBuf;

use homeguard_app::ports::SettingsStore;
use homeguard_domain::error::HomeguardError;
use homeguard_domain::item::{ItemConfig, ItemKind};
use serde::Serialize;
use tracing::info;

/// Writes settings snapshots under a directory, `<kind>.toml` each.
#[derive(Debug)]
pub struct TomlSettingsStore {
    dir: PathBuf,
}

impl TomlSettingsStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[derive(Serialize)]
struct Snapshot<'a> {
    items: &'a [ItemConfig],
}

impl SettingsStore for TomlSettingsStore {
    fn save(&self, kind: ItemKind, items: &[ItemConfig]) -> Result<(), HomeguardError> {
        let rendered = toml::to_string_pretty(&Snapshot { items })
            .map_err(|err| HomeguardError::Persistence(Box::new(err)))?;
        std::fs::create_dir_all(&self.dir)
            .map_err(|err| HomeguardError::Persistence(Box::new(err)))?;
        let path = self.dir.join(format!("{kind}.toml"));
        std::fs::write(&path, rendered)
            .map_err(|err| HomeguardError::Persistence(Box::new(err)))?;
        info!(path = %path.display(), count = items.len(), "settings snapshot written");
        Ok(())
    }
}
