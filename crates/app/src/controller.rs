//! Controller — the hub of the pipeline.
//!
//! Owns the queue, the rule engine, the element service, the mode machine
//! state, and the detection counter. Adapters hand raw messages to
//! [`Controller::handle_inbound`]; the driver loop in [`crate::machine`]
//! drains the queue and calls back into [`Controller::execute`] for
//! controller-targeted requests and [`Controller::step_mode`] after each
//! tick.

use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use homeguard_domain::command::Command;
use homeguard_domain::id::ItemId;
use homeguard_domain::item::{ControllerSettings, ItemKind, ItemSettings};
use homeguard_domain::message::Message;
use homeguard_domain::mode::{Mode, TransitionSignals};
use homeguard_domain::time::{self, Timestamp};
use homeguard_domain::value::Value;
use tracing::{debug, error, info, warn};

use crate::element::{self, ElementService};
use crate::engine::RuleEngine;
use crate::ports::{Outbound, SettingsStore};
use crate::queue::RequestQueue;
use crate::registry::Registry;
use crate::request::Request;

/// Mode machine state, guarded as one unit.
#[derive(Debug)]
struct FsmState {
    current: Mode,
    signals: TransitionSignals,
    entered_at: Timestamp,
}

/// Dwelling detection state.
#[derive(Debug, Default)]
struct DetectionState {
    counter: u32,
    last_event: Option<Timestamp>,
}

pub struct Controller {
    registry: Arc<Registry>,
    queue: Arc<RequestQueue>,
    engine: RuleEngine,
    elements: ElementService,
    store: Arc<dyn SettingsStore>,
    fsm: Mutex<FsmState>,
    detection: Mutex<DetectionState>,
}

impl Controller {
    #[must_use]
    pub fn new(registry: Arc<Registry>, store: Arc<dyn SettingsStore>) -> Self {
        let queue = Arc::new(RequestQueue::new());
        let engine = RuleEngine::new(Arc::clone(&registry), Arc::clone(&queue));
        let elements = ElementService::new(Arc::clone(&registry));
        Self {
            registry,
            queue,
            engine,
            elements,
            store,
            fsm: Mutex::new(FsmState {
                current: Mode::Start,
                signals: TransitionSignals::default(),
                entered_at: time::now(),
            }),
            detection: Mutex::new(DetectionState::default()),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    #[must_use]
    pub fn queue(&self) -> &Arc<RequestQueue> {
        &self.queue
    }

    #[must_use]
    pub fn elements(&self) -> &ElementService {
        &self.elements
    }

    /// Attach a node adapter's outbound port.
    pub fn attach_node(&self, node: ItemId, port: Arc<dyn Outbound>) {
        self.elements.attach_node(node, port);
    }

    /// Snapshot of the controller settings.
    #[must_use]
    pub fn settings(&self) -> ControllerSettings {
        match self.registry.controller_item().settings() {
            ItemSettings::Controller(settings) => settings,
            _ => ControllerSettings::default(),
        }
    }

    #[must_use]
    pub fn mode(&self) -> Mode {
        self.fsm.lock().unwrap_or_else(PoisonError::into_inner).current
    }

    /// When the current mode was entered, for duration timeouts.
    #[must_use]
    pub fn mode_entered_at(&self) -> Timestamp {
        self.fsm
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entered_at
    }

    #[must_use]
    pub fn detection_count(&self) -> u32 {
        self.detection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .counter
    }

    /// Time of the last counted detection event.
    #[must_use]
    pub fn last_detection_at(&self) -> Option<Timestamp> {
        self.detection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last_event
    }

    /// Entry point for adapters: a raw message arrived for an element.
    ///
    /// Unknown or disabled elements drop the message; everything else goes
    /// through the rule engine, which decides what (if anything) is queued.
    pub fn handle_inbound(&self, element_id: &ItemId, raw: &Message) {
        let Some(element) = self.registry.get(element_id).map(Arc::clone) else {
            debug!(element = %element_id, "inbound from unknown element dropped");
            return;
        };
        if !element.enabled() {
            debug!(element = %element_id, "inbound from disabled element dropped");
            return;
        }
        let request = self.elements.inbound(&element, raw);
        let bypass = self
            .settings()
            .trace_bypass
            .is_some_and(|id| id == *element_id);
        if !bypass {
            debug!(
                request = %request.id,
                sender = %element_id,
                command = request.command.as_ref().map_or("-", Command::as_str),
                "inbound request"
            );
        }
        self.engine.submit(request);
    }

    /// Trusted internal path: queue an already-formed request, skipping the
    /// rule engine. Invalid requests are dropped.
    pub fn submit(&self, request: Request) {
        if request.validate() {
            self.queue.enqueue(request);
        } else {
            debug!(request = %request.id, "invalid internal request dropped");
        }
    }

    /// Submit a request through the rule engine, exactly as adapter traffic
    /// is. A request matching no enabled rule is dropped, so configuration
    /// decides whether this traffic flows at all.
    pub fn route(&self, request: Request) {
        self.engine.submit(request);
    }

    /// Execute a request whose target is the controller.
    pub fn execute(&self, request: &Request) {
        let item = self.registry.controller_item();
        item.touch();
        match request.command.as_ref() {
            Some(Command::UpdateFsm) => self.update_fsm(&request.payload),
            Some(Command::TimeoutFsm) => self.raise_timeout(),
            Some(Command::TimeoutDetection) => self.reset_detection("grace window elapsed"),
            Some(Command::DetectionEvent) => self.detection_event(request),
            Some(Command::UpdateTime) => {
                item.update_status(Message::new().with("time", time::now()));
            }
            Some(Command::UpdateTimelight) => {
                if let Some(timelight) = request.payload.get("timelight") {
                    item.update_status(Message::new().with("timelight", timelight.clone()));
                }
            }
            Some(Command::UpdateDoor) => self.update_aggregate(request, "door_open"),
            Some(Command::UpdateWindow) => self.update_aggregate(request, "window_open"),
            Some(Command::UpdateTemperature) => {
                if let Some(temperature) =
                    request.payload.get("temperature").and_then(Value::as_f64)
                {
                    item.update_status(Message::new().with("temperature", temperature));
                }
            }
            Some(Command::SetSettings) => item.apply_settings(&request.payload),
            Some(Command::SaveSettings) => self.save_settings(&request.payload),
            Some(Command::GetStatus) => {
                if let Some(sender) = request.sender.item() {
                    self.elements.send_to(sender, &element::status_echo(item));
                }
            }
            Some(Command::GetSettings) => {
                if let Some(sender) = request.sender.item() {
                    self.elements.send_to(sender, &element::settings_echo(item));
                }
            }
            Some(Command::GetList) => self.get_list(request),
            Some(Command::Dummy) | None => {}
            Some(other) => {
                debug!(command = %other, "command not handled by the controller");
            }
        }
    }

    /// Named transition request. The payload names the wanted mode under
    /// `state` (preferred) or `fsm_transition`.
    fn update_fsm(&self, payload: &Message) {
        let wanted = payload
            .get("state")
            .or_else(|| payload.get("fsm_transition"))
            .and_then(Value::as_str);
        let Some(name) = wanted else {
            debug!("update_fsm without a mode name");
            return;
        };
        match Mode::from_str(name) {
            Ok(mode) => {
                let mut fsm = self.fsm.lock().unwrap_or_else(PoisonError::into_inner);
                fsm.signals.transition = Some(mode);
            }
            Err(err) => warn!(%err, "update_fsm ignored"),
        }
    }

    fn raise_timeout(&self) {
        let mut fsm = self.fsm.lock().unwrap_or_else(PoisonError::into_inner);
        fsm.signals.timeout = true;
    }

    /// Accumulate a weighted detection event; tripping the threshold raises
    /// the detection transition and restarts the count.
    fn detection_event(&self, request: &Request) {
        let armed = request.sender.item().is_some_and(|sender| {
            sender.with_settings(|s| match s {
                ItemSettings::Element(e) => e.detection_enable,
                // The watchdog and tests raise events as the controller.
                ItemSettings::Controller(_) => true,
                _ => false,
            })
        });
        if !armed {
            debug!(
                sender = request.sender.id().map_or("-", ItemId::as_str),
                "detection event from non-detection sender dropped"
            );
            return;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let weight = request
            .payload
            .get("value")
            .and_then(Value::as_f64)
            .map_or(1, |value| value.max(0.0) as u32);
        let threshold = self.settings().detection_threshold;

        let tripped = {
            let mut detection = self.detection.lock().unwrap_or_else(PoisonError::into_inner);
            detection.counter += weight;
            detection.last_event = Some(time::now());
            info!(counter = detection.counter, threshold, "detection event");
            if detection.counter >= threshold {
                detection.counter = 0;
                true
            } else {
                false
            }
        };
        self.mirror_detection_count();
        if tripped {
            let mut fsm = self.fsm.lock().unwrap_or_else(PoisonError::into_inner);
            fsm.signals.transition = Some(Mode::Detection);
        }
    }

    /// Zero the detection counter.
    pub fn reset_detection(&self, reason: &str) {
        let mut detection = self.detection.lock().unwrap_or_else(PoisonError::into_inner);
        if detection.counter > 0 {
            info!(counter = detection.counter, reason, "detection counter reset");
        }
        detection.counter = 0;
        detection.last_event = None;
        drop(detection);
        self.mirror_detection_count();
    }

    fn mirror_detection_count(&self) {
        let counter = i64::from(self.detection_count());
        self.registry
            .controller_item()
            .update_status(Message::new().with("detection_counter", counter));
    }

    fn update_aggregate(&self, request: &Request, key: &str) {
        if let Some(open) = request.payload.get("open").and_then(Value::as_bool) {
            self.registry
                .controller_item()
                .update_status(Message::new().with(key, open));
        }
    }

    /// Persist the settings of one category, or of every category when the
    /// payload names none.
    fn save_settings(&self, payload: &Message) {
        let kinds: Vec<ItemKind> = match payload.get("kind").and_then(Value::as_str) {
            Some(name) => match serde_json::from_value(serde_json::Value::String(name.to_string()))
            {
                Ok(kind) => vec![kind],
                Err(_) => {
                    warn!(kind = name, "unknown settings category");
                    return;
                }
            },
            None => vec![
                ItemKind::Controller,
                ItemKind::Element,
                ItemKind::Node,
                ItemKind::Group,
                ItemKind::Rule,
                ItemKind::Timer,
            ],
        };
        for kind in kinds {
            let snapshot = self.registry.snapshot(kind);
            if let Err(err) = self.store.save(kind, &snapshot) {
                error!(%err, %kind, "settings persistence failed");
                self.registry
                    .controller_item()
                    .push_error(format!("save_failed_{kind}"));
            }
        }
    }

    /// Echo the identifiers of one category back to the sender.
    fn get_list(&self, request: &Request) {
        let Some(name) = request.payload.get("kind").and_then(Value::as_str) else {
            debug!("get_list without a category");
            return;
        };
        let Ok(kind) =
            serde_json::from_value::<ItemKind>(serde_json::Value::String(name.to_string()))
        else {
            warn!(kind = name, "unknown list category");
            return;
        };
        let ids: Vec<Value> = self
            .registry
            .ids_of_kind(kind)
            .into_iter()
            .map(|id| Value::from(id.as_str()))
            .collect();
        if let Some(sender) = request.sender.item() {
            self.elements.send_to(
                sender,
                &Message::new().with("kind", name).with("items", Value::List(ids)),
            );
        }
    }

    /// Advance the mode machine by one step.
    ///
    /// Pending signals are consumed only when a transition actually occurs;
    /// entering [`Mode::Lock`] restarts the detection count. Each committed
    /// transition is mirrored into the controller status and broadcast
    /// through the rule engine so configured channels get notified.
    pub fn step_mode(&self) -> Option<(Mode, Mode)> {
        let nodes_ready = self.elements.nodes_ready();
        let (from, to) = {
            let mut fsm = self.fsm.lock().unwrap_or_else(PoisonError::into_inner);
            let next = fsm.current.calculate(fsm.signals, nodes_ready);
            if next == fsm.current {
                return None;
            }
            let from = fsm.current;
            fsm.current = next;
            fsm.signals = TransitionSignals::default();
            fsm.entered_at = time::now();
            (from, next)
        };

        if to == Mode::Lock {
            self.reset_detection("armed");
        }
        self.registry.controller_item().update_status(
            Message::new()
                .with("state", to.as_str())
                .with("last_time_update_fsm", time::now()),
        );
        info!(from = %from, to = %to, "mode transition");

        let broadcast = Request::new(self.registry.controller())
            .with_message(Message::new().with("fsm_transition", to.as_str()));
        self.engine.submit(broadcast);
        Some((from, to))
    }

    #[cfg(test)]
    pub(crate) fn force_mode(&self, mode: Mode) {
        let mut fsm = self.fsm.lock().unwrap_or_else(PoisonError::into_inner);
        fsm.current = mode;
        fsm.signals = TransitionSignals::default();
        fsm.entered_at = time::now();
    }

    #[cfg(test)]
    pub(crate) fn pending_signals(&self) -> TransitionSignals {
        self.fsm.lock().unwrap_or_else(PoisonError::into_inner).signals
    }

    /// Resolve an item as a sender/target reference.
    #[must_use]
    pub fn resolve(&self, id: &ItemId) -> crate::item::ItemRef {
        self.registry.resolve(id)
    }
}
