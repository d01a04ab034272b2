//! Port definitions (traits) implemented by the adapter crates.

mod outbound;
mod settings_store;

pub use outbound::Outbound;
pub use settings_store::SettingsStore;
