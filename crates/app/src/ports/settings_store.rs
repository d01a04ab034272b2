//! Settings persistence port.

use homeguard_domain::error::HomeguardError;
use homeguard_domain::item::{ItemConfig, ItemKind};

/// Durable storage for item settings, written on explicit command only.
///
/// The pipeline never reads back through this port at runtime; persisted
/// settings are only loaded again at the next startup.
pub trait SettingsStore: Send + Sync {
    /// Overwrite the stored settings of one category with the given
    /// snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`HomeguardError::Persistence`] when the backing store
    /// cannot be written.
    fn save(&self, kind: ItemKind, items: &[ItemConfig]) -> Result<(), HomeguardError>;
}
