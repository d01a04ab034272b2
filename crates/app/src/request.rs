//! Request — the unit of work flowing through the pipeline.

use homeguard_domain::command::Command;
use homeguard_domain::id::RequestId;
use homeguard_domain::message::Message;

use crate::item::ItemRef;

/// "Who asked, who should act, what action, with what data."
///
/// Requests are value-like: once queued they are owned by the driver loop
/// and never mutated concurrently. Invalid requests (unresolved sender or
/// target, missing command) are silently dropped at submission —
/// [`validate`](Self::validate) is the single choke point.
#[derive(Debug, Clone)]
pub struct Request {
    pub id: RequestId,
    pub sender: ItemRef,
    pub target: ItemRef,
    pub command: Option<Command>,
    /// Command arguments, as settled by rule evaluation.
    pub payload: Message,
    /// The raw inbound data, before any rule rewriting.
    pub message: Message,
}

impl Request {
    /// Start a request from its sender. Target, command, and data are
    /// filled in by the builder-style `with_*` methods.
    #[must_use]
    pub fn new(sender: ItemRef) -> Self {
        Self {
            id: RequestId::new(),
            sender,
            target: ItemRef::empty(),
            command: None,
            payload: Message::new(),
            message: Message::new(),
        }
    }

    #[must_use]
    pub fn with_target(mut self, target: ItemRef) -> Self {
        self.target = target;
        self
    }

    #[must_use]
    pub fn with_command(mut self, command: Command) -> Self {
        self.command = Some(command);
        self
    }

    #[must_use]
    pub fn with_payload(mut self, payload: Message) -> Self {
        self.payload = payload;
        self
    }

    #[must_use]
    pub fn with_message(mut self, message: Message) -> Self {
        self.message = message;
        self
    }

    /// A request is valid iff sender and target resolve and a command is
    /// present. Never errors.
    #[must_use]
    pub fn validate(&self) -> bool {
        self.sender.is_resolved() && self.target.is_resolved() && self.command.is_some()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use homeguard_domain::id::ItemId;
    use homeguard_domain::item::{ElementSettings, ItemSettings};

    use super::*;
    use crate::item::Item;

    fn resolved(id: &str) -> ItemRef {
        ItemRef::new(Arc::new(Item::new(
            ItemId::new(id),
            ItemSettings::Element(ElementSettings::default()),
        )))
    }

    #[test]
    fn should_validate_when_all_fields_are_present() {
        let rqt = Request::new(resolved("sensor"))
            .with_target(resolved("plug"))
            .with_command(Command::SetStatus);
        assert!(rqt.validate());
    }

    #[test]
    fn should_not_validate_with_unresolved_sender() {
        let rqt = Request::new(ItemRef::empty())
            .with_target(resolved("plug"))
            .with_command(Command::SetStatus);
        assert!(!rqt.validate());
    }

    #[test]
    fn should_not_validate_with_unresolved_target() {
        let rqt = Request::new(resolved("sensor")).with_command(Command::SetStatus);
        assert!(!rqt.validate());
    }

    #[test]
    fn should_not_validate_without_command() {
        let rqt = Request::new(resolved("sensor")).with_target(resolved("plug"));
        assert!(!rqt.validate());
    }
}
