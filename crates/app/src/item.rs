//! Runtime items and the empty-sentinel item handle.
//!
//! An [`Item`] pairs an immutable identity with interior-mutable settings
//! and status, so producers (adapters, timers) and the driver loop can
//! share it through the registry without ownership cycles.

use std::sync::{Arc, PoisonError, RwLock};

use homeguard_domain::id::ItemId;
use homeguard_domain::item::{ItemKind, ItemSettings};
use homeguard_domain::message::Message;
use homeguard_domain::time;
use homeguard_domain::value::Value;

/// A live registered item.
#[derive(Debug)]
pub struct Item {
    id: ItemId,
    kind: ItemKind,
    settings: RwLock<ItemSettings>,
    status: RwLock<Message>,
}

impl Item {
    #[must_use]
    pub fn new(id: ItemId, settings: ItemSettings) -> Self {
        let kind = settings.kind();
        Self {
            id,
            kind,
            settings: RwLock::new(settings),
            status: RwLock::new(Message::new().with("error_buffer", Value::List(Vec::new()))),
        }
    }

    #[must_use]
    pub fn id(&self) -> &ItemId {
        &self.id
    }

    #[must_use]
    pub fn kind(&self) -> ItemKind {
        self.kind
    }

    /// Snapshot of the current settings.
    #[must_use]
    pub fn settings(&self) -> ItemSettings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Read access without cloning.
    pub fn with_settings<R>(&self, f: impl FnOnce(&ItemSettings) -> R) -> R {
        f(&self.settings.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Direct settings mutation, used by startup wiring (group/node
    /// membership). Runtime updates go through [`apply_settings`](Self::apply_settings).
    pub fn with_settings_mut<R>(&self, f: impl FnOnce(&mut ItemSettings) -> R) -> R {
        f(&mut self
            .settings
            .write()
            .unwrap_or_else(PoisonError::into_inner))
    }

    /// Apply a settings update from a payload; unknown keys are ignored.
    pub fn apply_settings(&self, update: &Message) {
        self.settings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .apply(update);
    }

    /// Snapshot of the current status.
    #[must_use]
    pub fn status(&self) -> Message {
        self.status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn status_value(&self, key: &str) -> Option<Value> {
        self.status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Upsert status keys (create-or-overwrite).
    pub fn update_status(&self, update: Message) {
        self.status
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .merge(update);
    }

    /// Append an entry to the `error_buffer` status list.
    pub fn push_error(&self, error: impl Into<String>) {
        let mut status = self.status.write().unwrap_or_else(PoisonError::into_inner);
        let mut buffer = match status.remove("error_buffer") {
            Some(Value::List(entries)) => entries,
            _ => Vec::new(),
        };
        buffer.push(Value::Text(error.into()));
        status.insert("error_buffer", Value::List(buffer));
    }

    /// Stamp the last-interaction time (any command touching this item).
    pub fn touch(&self) {
        self.update_status(Message::new().with("last_time_interaction", time::now()));
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.with_settings(ItemSettings::enabled)
    }

    /// Groups this item belongs to.
    #[must_use]
    pub fn groups(&self) -> Vec<ItemId> {
        self.with_settings(|s| s.groups().to_vec())
    }
}

/// A possibly-unresolved handle to an [`Item`].
///
/// Lookups that miss yield the empty sentinel instead of failing; every
/// pipeline step checks [`id()`](Self::id) (or [`is_resolved`](Self::is_resolved))
/// before use, so an unresolved reference degrades to a no-op.
#[derive(Debug, Clone, Default)]
pub struct ItemRef(Option<Arc<Item>>);

impl ItemRef {
    /// The unresolved sentinel.
    #[must_use]
    pub fn empty() -> Self {
        Self(None)
    }

    #[must_use]
    pub fn new(item: Arc<Item>) -> Self {
        Self(Some(item))
    }

    #[must_use]
    pub fn id(&self) -> Option<&ItemId> {
        self.0.as_ref().map(|item| item.id())
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.0.is_some()
    }

    #[must_use]
    pub fn is(&self, id: &ItemId) -> bool {
        self.id() == Some(id)
    }

    #[must_use]
    pub fn is_controller(&self) -> bool {
        self.0
            .as_ref()
            .is_some_and(|item| item.kind() == ItemKind::Controller)
    }

    #[must_use]
    pub fn item(&self) -> Option<&Arc<Item>> {
        self.0.as_ref()
    }
}
