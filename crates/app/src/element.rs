//! Element service — device-facing half of the pipeline.
//!
//! Translates raw node messages into internal features, stamps on/off and
//! connection times, builds the inbound request, and executes the commands
//! that target an element (`set_status`, `send_alert`, echoes).

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use homeguard_domain::command::Command;
use homeguard_domain::id::ItemId;
use homeguard_domain::item::{ElementSettings, ItemKind, ItemSettings};
use homeguard_domain::message::Message;
use homeguard_domain::time;
use homeguard_domain::value::Value;
use tracing::{debug, warn};

use crate::item::Item;
use crate::ports::Outbound;
use crate::registry::Registry;
use crate::request::Request;

/// Message keys elements use to address the pipeline instead of carrying
/// feature data.
const KEY_COMMAND: &str = "command";
const KEY_TARGET: &str = "target";

pub struct ElementService {
    registry: Arc<Registry>,
    outbound: RwLock<BTreeMap<ItemId, Arc<dyn Outbound>>>,
}

impl ElementService {
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            outbound: RwLock::new(BTreeMap::new()),
        }
    }

    /// Attach a node adapter's outbound port under the node's identifier.
    pub fn attach_node(&self, node: ItemId, port: Arc<dyn Outbound>) {
        self.outbound
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(node, port);
    }

    /// Whether every enabled node has an attached, started port. Vacuously
    /// true when no nodes are registered.
    #[must_use]
    pub fn nodes_ready(&self) -> bool {
        let ports = self.outbound.read().unwrap_or_else(PoisonError::into_inner);
        self.registry
            .of_kind(ItemKind::Node)
            .iter()
            .filter(|node| node.enabled())
            .all(|node| {
                ports
                    .get(node.id())
                    .is_some_and(|port| port.is_started())
            })
    }

    /// Turn a raw node message into an internal request.
    ///
    /// The message's feature keys are translated, on/off edges and the
    /// connection time are stamped into the element's status, and the
    /// `command`/`target` address keys are split off the data. The target
    /// defaults to the controller.
    #[must_use]
    pub fn inbound(&self, element: &Arc<Item>, raw: &Message) -> Request {
        let settings = element_settings(element);
        let mut translated = translate_in(&settings.features, raw);
        let command = translated
            .remove(KEY_COMMAND)
            .and_then(|v| v.as_str().map(Command::from));
        let target = translated
            .remove(KEY_TARGET)
            .and_then(|v| v.as_str().map(ItemId::new))
            .map_or_else(|| self.registry.controller(), |id| self.registry.resolve(&id));

        record_features(element, &translated);

        let mut request = Request::new(self.registry.resolve(element.id()))
            .with_target(target)
            .with_message(translated.clone())
            .with_payload(translated);
        if let Some(command) = command {
            request = request.with_command(command);
        }
        request
    }

    /// Execute a request whose target is an element.
    pub fn execute(&self, element: &Arc<Item>, request: &Request) {
        element.touch();
        match request.command.as_ref() {
            Some(Command::SetStatus) => self.set_status(element, &request.payload),
            Some(Command::SendAlert) => {
                self.send_to(element, &render_alert(&request.payload));
            }
            Some(Command::SetSettings) => element.apply_settings(&request.payload),
            Some(Command::GetStatus) => {
                if let Some(sender) = request.sender.item() {
                    self.send_to(sender, &status_echo(element));
                }
            }
            Some(Command::GetSettings) => {
                if let Some(sender) = request.sender.item() {
                    self.send_to(sender, &settings_echo(element));
                }
            }
            Some(Command::Dummy) | None => {}
            Some(other) => {
                debug!(element = %element.id(), command = %other, "command not handled by elements");
            }
        }
    }

    /// Drive the element's external state. An `onoff` write equal to the
    /// current status is dropped so the sweep does not re-send every tick.
    fn set_status(&self, element: &Arc<Item>, payload: &Message) {
        if let Some(wanted) = payload.get("onoff") {
            if element.status_value("onoff").as_ref() == Some(wanted) {
                return;
            }
        }
        self.send_to(element, payload);
    }

    /// Deliver a message to the device behind an element, translating
    /// feature names back to the external vocabulary. Elements without a
    /// node or an attached port drop the message.
    pub fn send_to(&self, element: &Arc<Item>, msg: &Message) {
        let settings = element_settings(element);
        let Some(node) = settings.node.as_ref() else {
            debug!(element = %element.id(), "no node configured, message dropped");
            return;
        };
        let Some(sid) = settings.sid.as_ref() else {
            warn!(element = %element.id(), node = %node, "no sid configured, message dropped");
            return;
        };
        let ports = self.outbound.read().unwrap_or_else(PoisonError::into_inner);
        let Some(port) = ports.get(node) else {
            warn!(element = %element.id(), node = %node, "node port not attached, message dropped");
            return;
        };
        port.send(sid, &translate_out(&settings.features, msg));
    }
}

fn element_settings(element: &Arc<Item>) -> ElementSettings {
    element.with_settings(|s| match s {
        ItemSettings::Element(e) => e.clone(),
        _ => ElementSettings::default(),
    })
}

/// Rename external feature keys to internal ones; unmapped keys pass
/// through unchanged.
#[must_use]
pub fn translate_in(features: &BTreeMap<String, String>, msg: &Message) -> Message {
    msg.iter()
        .map(|(key, value)| {
            let key = features.get(key).cloned().unwrap_or_else(|| key.clone());
            (key, value.clone())
        })
        .collect()
}

/// Rename internal feature keys back to the external vocabulary.
#[must_use]
pub fn translate_out(features: &BTreeMap<String, String>, msg: &Message) -> Message {
    let reverse: BTreeMap<&String, &String> =
        features.iter().map(|(ext, int)| (int, ext)).collect();
    msg.iter()
        .map(|(key, value)| {
            let key = reverse
                .get(key)
                .map_or_else(|| key.clone(), |ext| (*ext).clone());
            (key, value.clone())
        })
        .collect()
}

/// Upsert translated features into the element status, stamping on/off
/// edges and the connection time.
fn record_features(element: &Arc<Item>, translated: &Message) {
    let mut update = translated.clone();
    if let Some(onoff) = translated.get("onoff") {
        let previous = element.status_value("onoff");
        if previous.as_ref() != Some(onoff) {
            if onoff == &Value::from("ON") {
                update.insert("last_time_on", time::now());
            } else {
                update.insert("last_time_off", time::now());
            }
        }
    }
    update.insert("last_time_connexion", time::now());
    element.update_status(update);
}

/// Status echo sent back on `get_status`: every field, timestamps rendered
/// in the human display format.
pub(crate) fn status_echo(element: &Arc<Item>) -> Message {
    let mut echo = Message::new().with("item", element.id().as_str());
    for (key, value) in &element.status() {
        match value {
            Value::Time(ts) => echo.insert(key.clone(), time::format_status(ts)),
            other => echo.insert(key.clone(), other.clone()),
        }
    }
    echo
}

/// Settings echo sent back on `get_settings`.
pub(crate) fn settings_echo(element: &Arc<Item>) -> Message {
    let settings = element.settings();
    let json = serde_json::to_value(&settings).unwrap_or(serde_json::Value::Null);
    Message::from_json(&json).with("item", element.id().as_str())
}

/// Render an alert payload into the text line pushed to a channel element.
///
/// Keys off the payloads the pipeline produces: the transition broadcast
/// (`fsm_transition`) and the water/fire detection features.
#[must_use]
pub fn render_alert(payload: &Message) -> Message {
    let text = if let Some(state) = payload.get("fsm_transition").and_then(Value::as_str) {
        match state {
            "lock" => "System armed".to_string(),
            "run" => "System disarmed".to_string(),
            "detection" => "Alarm! Intrusion detected".to_string(),
            other => format!("System state: {other}"),
        }
    } else if payload.contains_key("water_detection") {
        "Alarm! Water leak detected".to_string()
    } else if payload.contains_key("fire_detection") {
        "Alarm! Smoke detected".to_string()
    } else {
        "Alert".to_string()
    };
    let stamp = time::format_status(&time::now());
    Message::new().with("text", format!("{text} {stamp}"))
}
