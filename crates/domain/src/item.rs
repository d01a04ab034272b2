//! Item kinds and their typed settings.
//!
//! Settings are configuration-supplied and forward-compatible: the update
//! path applies known keys and silently ignores everything else. The
//! pipeline reads typed fields; only adapters see raw mappings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::id::ItemId;
use crate::message::Message;
use crate::rule::{Condition, TargetOverride};
use crate::value::Value;
use crate::{command::Command, rule::Rule};

/// The kind tag of a registered item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Controller,
    Element,
    Node,
    Group,
    Rule,
    Timer,
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Controller => "controller",
            Self::Element => "element",
            Self::Node => "node",
            Self::Group => "group",
            Self::Rule => "rule",
            Self::Timer => "timer",
        };
        f.write_str(name)
    }
}

/// Settings of a device-facing element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementSettings {
    pub enable: bool,
    /// Groups this element belongs to.
    pub groups: Vec<ItemId>,
    /// Element can be turned on/off.
    pub onoff_enable: bool,
    /// Element reports a battery level.
    pub battery_enable: bool,
    /// Element is turned off automatically after `timeout_value` seconds.
    pub timeout_enable: bool,
    /// Element can declare a detection.
    pub detection_enable: bool,
    /// Auto-off timeout in seconds.
    pub timeout_value: Option<u64>,
    /// Node this element communicates through.
    pub node: Option<ItemId>,
    /// Name the node uses for this element on the external service.
    pub sid: Option<String>,
    /// External → internal feature-name translation table.
    pub features: BTreeMap<String, String>,
}

impl Default for ElementSettings {
    fn default() -> Self {
        Self {
            enable: true,
            groups: Vec::new(),
            onoff_enable: false,
            battery_enable: false,
            timeout_enable: true,
            detection_enable: false,
            timeout_value: None,
            node: None,
            sid: None,
            features: BTreeMap::new(),
        }
    }
}

/// One element attached to a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMember {
    pub id: ItemId,
    pub sid: String,
}

/// Settings of a communication node (broker connection, chat bot).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSettings {
    pub enable: bool,
    pub groups: Vec<ItemId>,
    pub elements: Vec<NodeMember>,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            enable: true,
            groups: Vec::new(),
            elements: Vec::new(),
        }
    }
}

/// Settings of an element group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupSettings {
    pub enable: bool,
    pub groups: Vec<ItemId>,
    pub members: Vec<ItemId>,
}

impl Default for GroupSettings {
    fn default() -> Self {
        Self {
            enable: true,
            groups: Vec::new(),
            members: Vec::new(),
        }
    }
}

/// Settings of a periodic timer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerSettings {
    pub enable: bool,
    pub groups: Vec<ItemId>,
    /// Period of the timer's check routine, in seconds.
    pub period_secs: u64,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            enable: true,
            groups: Vec::new(),
            period_secs: 1,
        }
    }
}

/// Settings of the controller itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerSettings {
    pub enable: bool,
    pub groups: Vec<ItemId>,
    /// Detections required to declare an intrusion.
    pub detection_threshold: u32,
    /// Grace window (seconds) between detections while locked; elapsing it
    /// resets the counter.
    pub timeout_detection: Option<u64>,
    /// Per-mode duration (seconds) before the timeout signal is raised.
    /// Modes absent from the map never time out.
    pub timeout_state: BTreeMap<String, u64>,
    /// Group of on/off-capable elements watched by the auto-off sweep.
    pub group_onoff: Option<ItemId>,
    /// Group of door sensors.
    pub group_door: Option<ItemId>,
    /// Group of window sensors.
    pub group_window: Option<ItemId>,
    /// Group of temperature-reporting elements.
    pub group_temperature: Option<ItemId>,
    /// Feature names used to read the groups above.
    pub feature_onoff: Option<String>,
    pub feature_door: Option<String>,
    pub feature_window: Option<String>,
    pub feature_temperature: Option<String>,
    /// Sunrise time (`HH:MM:SS`) for the day/night flag.
    pub time_day: String,
    /// Sunset time (`HH:MM:SS`) for the day/night flag.
    pub time_night: String,
    /// Requests from this sender skip the per-request diagnostic trace
    /// (the system watchdog would flood it).
    pub trace_bypass: Option<ItemId>,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            enable: true,
            groups: Vec::new(),
            detection_threshold: 3,
            timeout_detection: None,
            timeout_state: BTreeMap::new(),
            group_onoff: None,
            group_door: None,
            group_window: None,
            group_temperature: None,
            feature_onoff: None,
            feature_door: None,
            feature_window: None,
            feature_temperature: None,
            time_day: "08:30:00".to_string(),
            time_night: "17:00:00".to_string(),
            trace_bypass: None,
        }
    }
}

/// Rule settings as they appear in configuration (the id comes from the
/// surrounding [`ItemConfig`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSettings {
    #[serde(rename = "enable")]
    pub enabled: bool,
    pub sender: Option<ItemId>,
    pub target: Option<TargetOverride>,
    pub command: Option<Command>,
    pub payload: Message,
    pub conditions: Vec<Condition>,
}

impl Default for RuleSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            sender: None,
            target: None,
            command: None,
            payload: Message::new(),
            conditions: Vec::new(),
        }
    }
}

impl RuleSettings {
    /// Materialize a [`Rule`] under the given identifier. `None` when the
    /// settings carry no sender filter — such a rule could never apply.
    #[must_use]
    pub fn into_rule(self, id: ItemId) -> Option<Rule> {
        let sender = self.sender?;
        Some(Rule {
            id,
            enabled: self.enabled,
            sender,
            target: self.target,
            command: self.command,
            payload: self.payload,
            conditions: self.conditions,
        })
    }
}

/// Kind-tagged settings, as supplied by the configuration source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ItemSettings {
    Controller(ControllerSettings),
    Element(ElementSettings),
    Node(NodeSettings),
    Group(GroupSettings),
    Rule(RuleSettings),
    Timer(TimerSettings),
}

impl ItemSettings {
    #[must_use]
    pub fn kind(&self) -> ItemKind {
        match self {
            Self::Controller(_) => ItemKind::Controller,
            Self::Element(_) => ItemKind::Element,
            Self::Node(_) => ItemKind::Node,
            Self::Group(_) => ItemKind::Group,
            Self::Rule(_) => ItemKind::Rule,
            Self::Timer(_) => ItemKind::Timer,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        match self {
            Self::Controller(s) => s.enable,
            Self::Element(s) => s.enable,
            Self::Node(s) => s.enable,
            Self::Group(s) => s.enable,
            Self::Rule(s) => s.enabled,
            Self::Timer(s) => s.enable,
        }
    }

    /// Groups the item belongs to.
    #[must_use]
    pub fn groups(&self) -> &[ItemId] {
        match self {
            Self::Controller(s) => &s.groups,
            Self::Element(s) => &s.groups,
            Self::Node(s) => &s.groups,
            Self::Group(s) => &s.groups,
            Self::Timer(s) => &s.groups,
            Self::Rule(_) => &[],
        }
    }

    /// Apply a settings update from a payload mapping. Known keys are
    /// updated, unknown keys are ignored (forward compatibility).
    pub fn apply(&mut self, update: &Message) {
        if let Some(enable) = update.get("enable").and_then(Value::as_bool) {
            match self {
                Self::Controller(s) => s.enable = enable,
                Self::Element(s) => s.enable = enable,
                Self::Node(s) => s.enable = enable,
                Self::Group(s) => s.enable = enable,
                Self::Rule(s) => s.enabled = enable,
                Self::Timer(s) => s.enable = enable,
            }
        }
        if let Some(groups) = update.get("groups").map(value_to_ids) {
            match self {
                Self::Controller(s) => s.groups = groups,
                Self::Element(s) => s.groups = groups,
                Self::Node(s) => s.groups = groups,
                Self::Group(s) => s.groups = groups,
                Self::Timer(s) => s.groups = groups,
                Self::Rule(_) => {}
            }
        }
        match self {
            Self::Element(s) => s.apply(update),
            Self::Timer(s) => {
                if let Some(period) = update.get("period_secs").and_then(as_seconds) {
                    s.period_secs = period;
                }
            }
            _ => {}
        }
    }
}

impl ElementSettings {
    fn apply(&mut self, update: &Message) {
        if let Some(v) = update.get("onoff_enable").and_then(Value::as_bool) {
            self.onoff_enable = v;
        }
        if let Some(v) = update.get("battery_enable").and_then(Value::as_bool) {
            self.battery_enable = v;
        }
        if let Some(v) = update.get("timeout_enable").and_then(Value::as_bool) {
            self.timeout_enable = v;
        }
        if let Some(v) = update.get("detection_enable").and_then(Value::as_bool) {
            self.detection_enable = v;
        }
        if let Some(v) = update.get("timeout_value").and_then(as_seconds) {
            self.timeout_value = Some(v);
        }
        if let Some(v) = update.get("node").and_then(Value::as_str) {
            self.node = Some(ItemId::new(v));
        }
        if let Some(v) = update.get("sid").and_then(Value::as_str) {
            self.sid = Some(v.to_string());
        }
    }
}

fn value_to_ids(value: &Value) -> Vec<ItemId> {
    match value {
        Value::List(values) => values
            .iter()
            .filter_map(|v| v.as_str().map(ItemId::new))
            .collect(),
        Value::Text(id) => vec![ItemId::new(id.as_str())],
        _ => Vec::new(),
    }
}

#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
fn as_seconds(value: &Value) -> Option<u64> {
    match value {
        Value::Int(i) if *i >= 0 => Some(*i as u64),
        Value::Float(f) if *f >= 0.0 => Some(*f as u64),
        _ => None,
    }
}

/// One `(kind, identifier, settings)` configuration triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemConfig {
    pub id: ItemId,
    #[serde(flatten)]
    pub settings: ItemSettings,
}
