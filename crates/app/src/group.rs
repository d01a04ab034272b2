//! Group fan-out — a request targeting a group becomes one request per
//! member.

use std::sync::Arc;

use homeguard_domain::message::Message;
use tracing::trace;

use crate::item::Item;
use crate::registry::Registry;
use crate::request::Request;

/// Payload key recording which group addressed the member.
const KEY_GROUP_TARGET: &str = "grouptarget";

/// Expand a group-targeted request into per-member copies. Disabled members
/// and the group itself are skipped; each copy carries the group id in its
/// payload so members can tell direct from group addressing.
#[must_use]
pub fn fan_out(registry: &Registry, group: &Arc<Item>, request: &Request) -> Vec<Request> {
    group.touch();
    let mut expanded = Vec::new();
    for member in registry.members_of(group.id()) {
        if member.id() == group.id() || !member.enabled() {
            continue;
        }
        let payload = request
            .payload
            .clone()
            .with(KEY_GROUP_TARGET, group.id().as_str());
        let mut copy = Request::new(request.sender.clone())
            .with_target(registry.resolve(member.id()))
            .with_payload(payload)
            .with_message(request.message.clone());
        if let Some(command) = request.command.clone() {
            copy = copy.with_command(command);
        }
        trace!(group = %group.id(), member = %member.id(), request = %copy.id, "group fan-out");
        expanded.push(copy);
    }
    expanded
}
