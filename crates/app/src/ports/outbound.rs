//! Outbound port, implemented by node adapters.

use homeguard_domain::message::Message;

/// Fire-and-forget delivery of a message to a device or channel behind a
/// node.
///
/// `sid` is the name the node's external service uses for the element,
/// already translated from the internal identifier. Delivery failures stay
/// inside the adapter; the pipeline never waits for an acknowledgement.
pub trait Outbound: Send + Sync {
    fn send(&self, sid: &str, msg: &Message);

    /// Whether the node has completed its startup handshake. The readiness
    /// gate of the mode machine polls this.
    fn is_started(&self) -> bool;
}
