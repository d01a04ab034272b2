//! # homeguard-adapter-virtual
//!
//! In-memory implementations of the outbound and persistence ports.
//!
//! ## Responsibilities
//! - [`VirtualNode`]: an [`Outbound`] port that records every delivered
//!   message, for daemons without real hardware and for tests
//! - [`MemorySettingsStore`]: a [`SettingsStore`] that keeps snapshots in
//!   memory
//!
//! ## Dependency rule
//! Depends on `homeguard-app` for the port traits and on the domain crate.
//! Never depends on other adapters.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use homeguard_app::ports::{Outbound, SettingsStore};
use homeguard_domain::error::HomeguardError;
use homeguard_domain::item::{ItemConfig, ItemKind};
use homeguard_domain::message::Message;
use tracing::debug;

/// A node with no transport behind it.
///
/// Messages sent before [`start`](Self::start) are dropped, mirroring a
/// real node that refuses traffic until its connection handshake finishes.
#[derive(Debug, Default)]
pub struct VirtualNode {
    started: AtomicBool,
    sent: Mutex<Vec<(String, Message)>>,
}

impl VirtualNode {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Complete the startup handshake.
    pub fn start(&self) {
        self.started.store(true, Ordering::SeqCst);
    }

    /// Everything delivered so far, as `(sid, message)` pairs.
    #[must_use]
    pub fn sent(&self) -> Vec<(String, Message)> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drop the recorded deliveries.
    pub fn clear(&self) {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Outbound for VirtualNode {
    fn send(&self, sid: &str, msg: &Message) {
        if !self.started.load(Ordering::SeqCst) {
            debug!(sid, "virtual node not started, message dropped");
            return;
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((sid.to_string(), msg.clone()));
    }

    fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }
}

/// Keeps settings snapshots in memory, the latest one per category.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    saved: Mutex<BTreeMap<String, Vec<ItemConfig>>>,
}

impl MemorySettingsStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The last snapshot saved for a category, if any.
    #[must_use]
    pub fn saved(&self, kind: ItemKind) -> Option<Vec<ItemConfig>> {
        self.saved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind.to_string())
            .cloned()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn save(&self, kind: ItemKind, items: &[ItemConfig]) -> Result<(), HomeguardError> {
        self.saved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(kind.to_string(), items.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use homeguard_domain::item::{ElementSettings, ItemSettings};

    use super::*;

    #[test]
    fn should_drop_messages_until_started() {
        let node = VirtualNode::new();
        node.send("plug-1", &Message::new().with("state", "ON"));
        assert!(node.sent().is_empty());
        assert!(!node.is_started());

        node.start();
        node.send("plug-1", &Message::new().with("state", "ON"));
        assert_eq!(node.sent().len(), 1);
        assert!(node.is_started());
    }

    #[test]
    fn should_record_sid_with_each_message() {
        let node = VirtualNode::new();
        node.start();
        node.send("plug-1", &Message::new().with("state", "OFF"));
        let sent = node.sent();
        assert_eq!(sent[0].0, "plug-1");
    }

    #[test]
    fn should_keep_latest_snapshot_per_category() {
        let store = MemorySettingsStore::new();
        let first = vec![ItemConfig {
            id: homeguard_domain::id::ItemId::new("plug"),
            settings: ItemSettings::Element(ElementSettings::default()),
        }];
        store.save(ItemKind::Element, &first).unwrap();
        store.save(ItemKind::Element, &[]).unwrap();

        assert_eq!(store.saved(ItemKind::Element), Some(Vec::new()));
        assert_eq!(store.saved(ItemKind::Rule), None);
    }
}
